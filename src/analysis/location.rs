// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! # Location Analysis
//!
//! Streaming analysis of a GPS track: cumulative distance and ascent, average
//! and current speed, kilometer and mile splits, distance records and heat
//! maps. [`LocationAnalyzer::analyze`] adds the speed variance and, when the
//! pace varied enough, the detected interval efforts.

use super::geo::haversine_distance;
use super::heat_map::{HeatMap, LocationCell, SpeedBucket};
use super::intervals::IntervalDetector;
use super::records::PersonalRecordSet;
use crate::config::analysis_config::{IntervalConfig, LocationConfig};
use crate::config::AnalysisConfig;
use crate::constants::{keys, units};
use crate::models::{ActivityType, AnalysisSummary, IntervalEffort, LocationSample, SpeedPoint};
use tracing::debug;

/// The speed graph only starts once this much distance is covered
const SPEED_GRAPH_MIN_DISTANCE_M: f64 = 1000.0;

/// Append-only (timestamp, cumulative distance) pairs, monotonic in time
#[derive(Debug, Clone, Default)]
pub struct DistanceRecord {
    entries: Vec<(u64, f64)>,
}

impl DistanceRecord {
    pub fn push(&mut self, timestamp_ms: u64, cumulative_m: f64) {
        self.entries.push((timestamp_ms, cumulative_m));
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn last(&self) -> Option<(u64, f64)> {
        self.entries.last().copied()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, (u64, f64)> {
        self.entries.iter()
    }

    /// Cumulative distance at the latest entry not after `timestamp_ms`
    pub fn distance_at(&self, timestamp_ms: u64) -> f64 {
        let idx = self.entries.partition_point(|(t, _)| *t <= timestamp_ms);
        if idx == 0 {
            0.0
        } else {
            self.entries[idx - 1].1
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LocationAnalyzerState {
    Init,
    Receiving,
    Analyzed,
}

#[derive(Debug)]
pub struct LocationAnalyzer {
    config: LocationConfig,
    interval_config: IntervalConfig,
    state: LocationAnalyzerState,
    speed_window_s: u64,
    /// Record distances in ascending order
    record_thresholds: Vec<(&'static str, f64)>,

    start_time_ms: Option<u64>,
    last: Option<LocationSample>,
    total_distance: f64,
    total_ascent: f64,
    avg_speed: Option<f64>,
    current_speed: Option<f64>,

    distances: DistanceRecord,
    km_splits: Vec<f64>,
    mile_splits: Vec<f64>,
    speed_graph: Vec<SpeedPoint>,
    records: PersonalRecordSet,
    location_heat_map: HeatMap<LocationCell>,
    speed_heat_map: HeatMap<SpeedBucket>,
}

impl LocationAnalyzer {
    pub fn new(activity_type: &ActivityType, config: &AnalysisConfig) -> Self {
        let speed_window_s = if activity_type.is_cycling() {
            config.location.cycling_speed_window_s
        } else {
            config.location.default_speed_window_s
        };

        Self {
            config: config.location.clone(),
            interval_config: config.intervals.clone(),
            state: LocationAnalyzerState::Init,
            speed_window_s,
            record_thresholds: record_thresholds(activity_type),
            start_time_ms: None,
            last: None,
            total_distance: 0.0,
            total_ascent: 0.0,
            avg_speed: None,
            current_speed: None,
            distances: DistanceRecord::default(),
            km_splits: Vec::new(),
            mile_splits: Vec::new(),
            speed_graph: Vec::new(),
            records: PersonalRecordSet::new(),
            location_heat_map: HeatMap::new(),
            speed_heat_map: HeatMap::new(),
        }
    }

    /// Feed the next fix. Returns false when the fix was rejected.
    pub fn append_location(&mut self, sample: &LocationSample) -> bool {
        if self.state == LocationAnalyzerState::Analyzed {
            debug!("Location appended after analysis; ignoring");
            return false;
        }
        if let Some(accuracy) = sample.horizontal_accuracy {
            if !(0.0..=self.config.max_horizontal_accuracy_m).contains(&accuracy) {
                return false;
            }
        }

        let Some(previous) = self.last.replace(sample.clone()) else {
            self.state = LocationAnalyzerState::Receiving;
            self.start_time_ms = Some(sample.timestamp_ms);
            return true;
        };

        let meters = haversine_distance(
            previous.latitude,
            previous.longitude,
            previous.altitude,
            sample.latitude,
            sample.longitude,
            sample.altitude,
        );
        self.total_distance += meters;
        self.distances.push(sample.timestamp_ms, self.total_distance);

        if sample.altitude > previous.altitude {
            self.total_ascent += sample.altitude - previous.altitude;
        }

        let elapsed_s = self.elapsed_seconds(sample.timestamp_ms);
        if elapsed_s > 0.0 {
            self.avg_speed = Some(self.total_distance / elapsed_s);
        }

        split_check(&mut self.km_splits, self.total_distance, units::METERS_PER_KILOMETER, elapsed_s);
        split_check(&mut self.mile_splits, self.total_distance, units::METERS_PER_MILE, elapsed_s);

        self.location_heat_map.append(LocationCell::new(
            sample.latitude,
            sample.longitude,
            self.config.heat_map_decimal_places,
        ));

        self.update_speeds();
        true
    }

    /// Walk the distance record backwards from the latest fix, refreshing the
    /// current speed and every distance record ending at that fix.
    ///
    /// A distance record only counts when the truncated distance covered
    /// equals the truncated record distance, so sparse tracks can miss one.
    pub fn update_speeds(&mut self) {
        let Some((last_time, last_distance)) = self.distances.last() else {
            return;
        };
        let window_s = self.speed_window_s;
        let longest_record = self
            .record_thresholds
            .last()
            .map(|(_, meters)| meters.trunc() + 1.0)
            .unwrap_or(0.0);

        let mut speed_found = false;
        for &(time, distance) in self.distances.iter().rev() {
            let elapsed_ms = last_time.saturating_sub(time);
            if elapsed_ms == 0 {
                continue;
            }
            let seconds = elapsed_ms as f64 / units::MILLIS_PER_SECOND;
            let meters = last_distance - distance;

            if !speed_found && seconds.trunc() as u64 == window_s {
                speed_found = true;
                let speed = meters / seconds;
                self.current_speed = Some(speed);
                self.records.offer_max(keys::BEST_SPEED, speed);

                let is_newer = self.speed_graph.last().map_or(true, |p| time > p.timestamp_ms);
                if self.total_distance >= SPEED_GRAPH_MIN_DISTANCE_M && is_newer {
                    self.speed_graph.push(SpeedPoint {
                        timestamp_ms: time,
                        speed,
                    });
                    self.speed_heat_map
                        .append(SpeedBucket::new(speed, self.config.speed_bucket_m_per_s));
                }
            }

            for &(name, threshold) in &self.record_thresholds {
                if meters < threshold {
                    break;
                }
                if meters.trunc() == threshold.trunc() {
                    self.records.offer_time(name, seconds);
                }
            }

            // Distances only grow walking backwards; nothing further can match
            let past_window = speed_found || seconds.trunc() as u64 > window_s;
            if past_window && meters >= longest_record {
                break;
            }
        }
    }

    /// Derive the location summary. Can be called more than once.
    pub fn analyze(&mut self) -> AnalysisSummary {
        self.state = LocationAnalyzerState::Analyzed;

        let mut summary = self.records.to_summary();
        summary.insert(keys::LONGEST_DISTANCE, self.total_distance);
        summary.insert(keys::TOTAL_ASCENT, self.total_ascent);
        if let Some(avg_speed) = self.avg_speed {
            summary.insert(keys::AVG_SPEED, avg_speed);
        }
        summary.insert_serialized(keys::MILE_SPLITS, &self.mile_splits);
        summary.insert_serialized(keys::KM_SPLITS, &self.km_splits);

        let mut intervals: Vec<IntervalEffort> = Vec::new();
        if self.speed_graph.len() > 1 {
            let variance = self.speed_variance();
            summary.insert(keys::SPEED_VARIANCE, variance);
            if variance > self.interval_config.speed_variance_gate {
                intervals = IntervalDetector::new(&self.interval_config)
                    .detect(&self.speed_graph, &self.distances);
            }
            debug!(
                variance,
                intervals = intervals.len(),
                "Speed graph analyzed"
            );
        }
        summary.insert_serialized(keys::INTERVALS, &intervals);

        summary.insert_serialized(keys::LOCATION_HEAT_MAP, &self.location_heat_map.location_entries());
        summary.insert_serialized(
            keys::SPEED_HEAT_MAP,
            &self.speed_heat_map.speed_entries(self.config.speed_bucket_m_per_s),
        );
        summary
    }

    /// Variance of the speed graph around its own mean. The graph starts
    /// after the first kilometer, so the activity average is not its center.
    fn speed_variance(&self) -> f64 {
        let n = self.speed_graph.len() as f64;
        let center = self.speed_graph.iter().map(|p| p.speed).sum::<f64>() / n;
        self.speed_graph
            .iter()
            .map(|p| (p.speed - center).powi(2))
            .sum::<f64>()
            / n
    }

    fn elapsed_seconds(&self, timestamp_ms: u64) -> f64 {
        self.start_time_ms
            .map(|start| timestamp_ms.saturating_sub(start) as f64 / units::MILLIS_PER_SECOND)
            .unwrap_or(0.0)
    }

    pub fn state(&self) -> LocationAnalyzerState {
        self.state
    }

    pub fn total_distance(&self) -> f64 {
        self.total_distance
    }

    pub fn total_ascent(&self) -> f64 {
        self.total_ascent
    }

    pub fn avg_speed(&self) -> Option<f64> {
        self.avg_speed
    }

    pub fn current_speed(&self) -> Option<f64> {
        self.current_speed
    }

    pub fn speed_graph(&self) -> &[SpeedPoint] {
        &self.speed_graph
    }

    pub fn km_splits(&self) -> &[f64] {
        &self.km_splits
    }

    pub fn mile_splits(&self) -> &[f64] {
        &self.mile_splits
    }

    pub fn distances(&self) -> &DistanceRecord {
        &self.distances
    }

    pub fn records(&self) -> &PersonalRecordSet {
        &self.records
    }

    pub fn start_time_ms(&self) -> Option<u64> {
        self.start_time_ms
    }

    pub fn last_time_ms(&self) -> Option<u64> {
        self.last.as_ref().map(|l| l.timestamp_ms)
    }
}

/// Keep one entry per whole unit covered: the elapsed time of the latest fix
/// inside that unit. Gaps that skip whole units repeat the current time.
fn split_check(splits: &mut Vec<f64>, total_distance: f64, unit_m: f64, elapsed_s: f64) {
    let whole_units = (total_distance / unit_m).floor() as usize;
    if splits.len() < whole_units + 1 {
        splits.resize(whole_units + 1, elapsed_s);
    } else {
        splits[whole_units] = elapsed_s;
    }
}

fn record_thresholds(activity_type: &ActivityType) -> Vec<(&'static str, f64)> {
    let mut thresholds = vec![
        (keys::BEST_1K, 1000.0),
        (keys::BEST_MILE, units::METERS_PER_MILE),
        (keys::BEST_5K, 5000.0),
        (keys::BEST_10K, 10_000.0),
    ];
    if activity_type.is_running() {
        thresholds.extend([
            (keys::BEST_15K, 15_000.0),
            (keys::BEST_HALF_MARATHON, 13.1 * units::METERS_PER_MILE),
            (keys::BEST_MARATHON, 26.2 * units::METERS_PER_MILE),
        ]);
    } else if activity_type.is_cycling() {
        thresholds.extend([
            (keys::BEST_METRIC_CENTURY, 100_000.0),
            (keys::BEST_CENTURY, 100.0 * units::METERS_PER_MILE),
        ]);
    }
    thresholds
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::geo::EARTH_RADIUS_M;

    /// Straight northward track at a constant speed, one fix per second
    fn straight_track(speed: f64, seconds: u64) -> Vec<LocationSample> {
        let step_deg = (speed / EARTH_RADIUS_M).to_degrees();
        (0..=seconds)
            .map(|t| LocationSample::new(t * 1000, 45.0 + step_deg * t as f64, -73.0, 0.0))
            .collect()
    }

    /// Northward track where `speeds[t]` is held during second `t`
    fn variable_track(speeds: &[f64]) -> Vec<LocationSample> {
        let mut latitude = 45.0;
        let mut track = vec![LocationSample::new(0, latitude, -73.0, 0.0)];
        for (t, speed) in speeds.iter().enumerate() {
            latitude += (speed / EARTH_RADIUS_M).to_degrees();
            track.push(LocationSample::new((t as u64 + 1) * 1000, latitude, -73.0, 0.0));
        }
        track
    }

    fn analyzer(activity_type: ActivityType) -> LocationAnalyzer {
        LocationAnalyzer::new(&activity_type, &AnalysisConfig::default())
    }

    #[test]
    fn test_accuracy_gate() {
        let mut analyzer = analyzer(ActivityType::Running);
        let poor = LocationSample::new(0, 45.0, -73.0, 0.0).with_accuracy(Some(60.0), None);
        assert!(!analyzer.append_location(&poor));
        assert_eq!(analyzer.state(), LocationAnalyzerState::Init);
        assert_eq!(analyzer.start_time_ms(), None);

        let good = LocationSample::new(0, 45.0, -73.0, 0.0).with_accuracy(Some(10.0), None);
        assert!(analyzer.append_location(&good));
        assert_eq!(analyzer.state(), LocationAnalyzerState::Receiving);

        let negative = LocationSample::new(1000, 45.001, -73.0, 0.0).with_accuracy(Some(-1.0), None);
        assert!(!analyzer.append_location(&negative));
        assert_eq!(analyzer.total_distance(), 0.0);
        assert_eq!(analyzer.last_time_ms(), Some(0));
    }

    #[test]
    fn test_distance_is_sum_of_pairwise_haversine() {
        let track = vec![
            LocationSample::new(0, 45.0, -73.0, 10.0),
            LocationSample::new(1000, 45.0001, -73.0001, 12.0),
            LocationSample::new(2000, 45.0003, -73.0001, 11.0),
            LocationSample::new(3000, 45.0004, -73.0003, 15.0),
        ];
        let mut analyzer = analyzer(ActivityType::Walking);
        let mut expected = 0.0;
        let mut previous_total = 0.0;
        for (i, sample) in track.iter().enumerate() {
            analyzer.append_location(sample);
            if i > 0 {
                let p = &track[i - 1];
                expected += haversine_distance(
                    p.latitude, p.longitude, p.altitude,
                    sample.latitude, sample.longitude, sample.altitude,
                );
            }
            assert!(analyzer.total_distance() >= previous_total);
            previous_total = analyzer.total_distance();
        }
        assert!((analyzer.total_distance() - expected).abs() < 1e-9);
        // Ascent counts only climbs: +2 then +4
        assert!((analyzer.total_ascent() - 6.0).abs() < 1e-9);
        assert_eq!(analyzer.distances().len(), 3);
    }

    #[test]
    fn test_splits_and_idempotent_analysis() {
        let mut analyzer = analyzer(ActivityType::Running);
        for sample in straight_track(5.0, 500) {
            analyzer.append_location(&sample);
        }

        // 2500 m: two whole kilometers plus the partial third
        assert_eq!(analyzer.km_splits().len(), 3);
        assert!((199.0..=200.0).contains(&analyzer.km_splits()[0]));
        assert_eq!(analyzer.mile_splits().len(), 2);

        let first = analyzer.analyze();
        let second = analyzer.analyze();
        assert_eq!(first.get(keys::KM_SPLITS), second.get(keys::KM_SPLITS));
        assert_eq!(first.get(keys::MILE_SPLITS), second.get(keys::MILE_SPLITS));
        assert_eq!(analyzer.state(), LocationAnalyzerState::Analyzed);
    }

    #[test]
    fn test_distance_records_use_truncated_crossing() {
        // 250 fixes at 4.002 m/s cover 1000.5 m
        let mut analyzer = analyzer(ActivityType::Running);
        for sample in straight_track(4.002, 600) {
            analyzer.append_location(&sample);
        }
        let best_1k = analyzer.records().get(keys::BEST_1K).unwrap();
        assert!((best_1k - 250.0).abs() < 1e-9);
        assert!((analyzer.current_speed().unwrap() - 4.002).abs() < 1e-6);
        assert!((analyzer.records().get(keys::BEST_SPEED).unwrap() - 4.002).abs() < 1e-6);

        // At 4.3 m/s no fix lands within the 1000th meter
        let mut sparse = analyzer_for_speed(4.3, 600);
        assert!(sparse.records().get(keys::BEST_1K).is_none());
        assert!(sparse.analyze().contains_key(keys::LONGEST_DISTANCE));
    }

    fn analyzer_for_speed(speed: f64, seconds: u64) -> LocationAnalyzer {
        let mut analyzer = analyzer(ActivityType::Running);
        for sample in straight_track(speed, seconds) {
            analyzer.append_location(&sample);
        }
        analyzer
    }

    #[test]
    fn test_speed_graph_starts_after_first_kilometer() {
        let analyzer = analyzer_for_speed(5.0, 300);
        let first = analyzer.speed_graph().first().unwrap();
        // 1 km is reached at 200 s; points carry the start of their window
        assert!(first.timestamp_ms >= (200 - 11) * 1000);
        assert!(analyzer
            .speed_graph()
            .windows(2)
            .all(|w| w[1].timestamp_ms > w[0].timestamp_ms));
    }

    #[test]
    fn test_steady_pace_has_no_intervals() {
        let mut analyzer = analyzer_for_speed(4.0, 1200);
        let summary = analyzer.analyze();
        assert!(summary.get_f64(keys::SPEED_VARIANCE).unwrap() <= 0.25);
        assert_eq!(summary.get(keys::INTERVALS), Some(&serde_json::json!([])));
    }

    #[test]
    fn test_slow_first_kilometer_does_not_open_the_interval_gate() {
        // 500 s at 2 m/s, then 30 minutes alternating 4.0 and 4.6 m/s in 40 s blocks
        let mut speeds = vec![2.0; 500];
        speeds.extend((0..1800).map(|t| if (t / 40) % 2 == 0 { 4.0 } else { 4.6 }));
        let mut analyzer = analyzer(ActivityType::Running);
        for sample in variable_track(&speeds) {
            analyzer.append_location(&sample);
        }

        let summary = analyzer.analyze();
        let variance = summary.get_f64(keys::SPEED_VARIANCE).unwrap();
        assert!(variance <= 0.25, "variance {variance}");
        assert!(analyzer.avg_speed().unwrap() < 4.0);
        assert_eq!(summary.get(keys::INTERVALS), Some(&serde_json::json!([])));
    }

    #[test]
    fn test_empty_track_summary() {
        let mut analyzer = analyzer(ActivityType::Running);
        let summary = analyzer.analyze();
        assert_eq!(summary.get_f64(keys::LONGEST_DISTANCE), Some(0.0));
        assert_eq!(summary.get(keys::INTERVALS), Some(&serde_json::json!([])));
        assert!(!summary.contains_key(keys::SPEED_VARIANCE));
    }

    #[test]
    fn test_cycling_uses_shorter_window_and_century_records() {
        let cycling = analyzer(ActivityType::Cycling);
        assert_eq!(cycling.speed_window_s, 7);
        assert!(cycling
            .record_thresholds
            .iter()
            .any(|(name, _)| *name == keys::BEST_CENTURY));
        assert!(!cycling
            .record_thresholds
            .iter()
            .any(|(name, _)| *name == keys::BEST_MARATHON));
        assert!(cycling
            .record_thresholds
            .windows(2)
            .all(|w| w[0].1 < w[1].1));
    }
}
