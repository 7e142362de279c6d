// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Streaming analyzers for scalar sensor streams
//!
//! Each sensor type gets its own [`SensorAnalyzer`] implementation built on the
//! shared [`SampleSeries`] accumulator. Use [`create_sensor_analyzer`] or
//! [`create_with_data`] to obtain one for a sensor type.

use super::power::PowerAnalyzer;
use super::records::PersonalRecordSet;
use crate::config::AnalysisConfig;
use crate::constants::keys;
use crate::errors::{AnalysisError, AnalysisResult};
use crate::models::{Activity, ActivityType, AnalysisSummary, SensorType};

/// Capability shared by every sensor analyzer
pub trait SensorAnalyzer: Send {
    fn sensor_type(&self) -> SensorType;

    /// Add one reading. Readings must arrive in non-decreasing time order.
    fn append(&mut self, timestamp_ms: u64, value: f64);

    /// Derive the summary entries for everything appended so far
    fn analyze(&self) -> AnalysisResult<AnalysisSummary>;
}

/// Running statistics over one scalar stream. O(1) per append.
#[derive(Debug, Clone, Default)]
pub struct SampleSeries {
    start_time_ms: Option<u64>,
    count: usize,
    sum: f64,
    avg: f64,
    max: Option<f64>,
    max_time_ms: Option<u64>,
    pub records: PersonalRecordSet,
}

impl SampleSeries {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, timestamp_ms: u64, value: f64) {
        if self.start_time_ms.is_none() {
            self.start_time_ms = Some(timestamp_ms);
        }

        self.count += 1;
        self.sum += value;
        self.avg = self.sum / self.count as f64;

        // First occurrence wins on ties
        if self.max.map_or(true, |max| value > max) {
            self.max = Some(value);
            self.max_time_ms = Some(timestamp_ms);
        }
    }

    pub fn count(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    pub fn average(&self) -> f64 {
        self.avg
    }

    pub fn max(&self) -> Option<f64> {
        self.max
    }

    pub fn max_time_ms(&self) -> Option<u64> {
        self.max_time_ms
    }

    pub fn start_time_ms(&self) -> Option<u64> {
        self.start_time_ms
    }

    /// Fails when a non-finite reading poisoned the running sum
    pub fn check_finite(&self, sensor: SensorType) -> AnalysisResult<()> {
        if self.sum.is_finite() {
            Ok(())
        } else {
            Err(AnalysisError::SensorFailure {
                sensor,
                reason: "non-finite readings in stream".to_string(),
            })
        }
    }

    /// The record table, plus max/avg under the given keys when any reading was seen
    pub fn summary_with(&self, max_key: &str, avg_key: &str, scale: f64) -> AnalysisSummary {
        let mut summary = self.records.to_summary();
        if let Some(max) = self.max {
            summary.insert(max_key, max * scale);
            summary.insert(avg_key, self.avg * scale);
        }
        summary
    }
}

/// Heart rate in beats per minute
#[derive(Debug, Default)]
pub struct HeartRateAnalyzer {
    series: SampleSeries,
}

impl HeartRateAnalyzer {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SensorAnalyzer for HeartRateAnalyzer {
    fn sensor_type(&self) -> SensorType {
        SensorType::HeartRate
    }

    fn append(&mut self, timestamp_ms: u64, value: f64) {
        self.series.append(timestamp_ms, value);
    }

    fn analyze(&self) -> AnalysisResult<AnalysisSummary> {
        self.series.check_finite(self.sensor_type())?;
        Ok(self
            .series
            .summary_with(keys::MAX_HEART_RATE, keys::AVG_HEART_RATE, 1.0))
    }
}

/// Cadence. Foot pods count one foot, so foot-based activities report double.
#[derive(Debug)]
pub struct CadenceAnalyzer {
    series: SampleSeries,
    is_foot_based: bool,
}

impl CadenceAnalyzer {
    pub fn new(activity_type: &ActivityType) -> Self {
        Self {
            series: SampleSeries::new(),
            is_foot_based: activity_type.is_foot_based(),
        }
    }
}

impl SensorAnalyzer for CadenceAnalyzer {
    fn sensor_type(&self) -> SensorType {
        SensorType::Cadence
    }

    fn append(&mut self, timestamp_ms: u64, value: f64) {
        self.series.append(timestamp_ms, value);
    }

    fn analyze(&self) -> AnalysisResult<AnalysisSummary> {
        self.series.check_finite(self.sensor_type())?;
        let scale = if self.is_foot_based { 2.0 } else { 1.0 };
        Ok(self
            .series
            .summary_with(keys::MAX_CADENCE, keys::AVG_CADENCE, scale))
    }
}

/// Accelerometer magnitude. Contributes only the shared record table.
#[derive(Debug, Default)]
pub struct AccelerometerAnalyzer {
    series: SampleSeries,
}

impl AccelerometerAnalyzer {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SensorAnalyzer for AccelerometerAnalyzer {
    fn sensor_type(&self) -> SensorType {
        SensorType::Accelerometer
    }

    fn append(&mut self, timestamp_ms: u64, value: f64) {
        self.series.append(timestamp_ms, value);
    }

    fn analyze(&self) -> AnalysisResult<AnalysisSummary> {
        self.series.check_finite(self.sensor_type())?;
        Ok(self.series.records.to_summary())
    }
}

/// Create an empty analyzer for the given sensor type
pub fn create_sensor_analyzer(
    sensor_type: SensorType,
    activity_type: &ActivityType,
    config: &AnalysisConfig,
) -> Box<dyn SensorAnalyzer> {
    match sensor_type {
        SensorType::Accelerometer => Box::new(AccelerometerAnalyzer::new()),
        SensorType::Cadence => Box::new(CadenceAnalyzer::new(activity_type)),
        SensorType::HeartRate => Box::new(HeartRateAnalyzer::new()),
        SensorType::Power => Box::new(PowerAnalyzer::new(&config.power)),
    }
}

/// Create an analyzer and feed it the activity's stream for that sensor type.
/// Returns `None` when the activity has no such stream.
pub fn create_with_data(
    sensor_type: SensorType,
    activity: &Activity,
    config: &AnalysisConfig,
) -> Option<Box<dyn SensorAnalyzer>> {
    if !activity.sensors.is_present(sensor_type) {
        return None;
    }

    let mut analyzer = create_sensor_analyzer(sensor_type, &activity.activity_type, config);
    match activity.sensors.scalar(sensor_type) {
        Some(samples) => {
            for sample in samples {
                analyzer.append(sample.timestamp_ms, sample.value);
            }
        }
        None => {
            for sample in &activity.sensors.accelerometer {
                analyzer.append(sample.timestamp_ms, sample.magnitude());
            }
        }
    }
    Some(analyzer)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SensorSample;

    #[test]
    fn test_running_average_and_maximum() {
        let mut series = SampleSeries::new();
        series.append(1_000, 10.0);
        assert_eq!(series.average(), 10.0);
        series.append(2_000, 20.0);
        series.append(3_000, 30.0);

        assert_eq!(series.average(), 20.0);
        assert_eq!(series.max(), Some(30.0));
        assert_eq!(series.max_time_ms(), Some(3_000));
        assert_eq!(series.start_time_ms(), Some(1_000));
    }

    #[test]
    fn test_first_maximum_wins_on_ties() {
        let mut series = SampleSeries::new();
        series.append(1_000, 150.0);
        series.append(2_000, 150.0);
        assert_eq!(series.max_time_ms(), Some(1_000));
    }

    #[test]
    fn test_heart_rate_keys_only_when_samples_present() {
        let empty = HeartRateAnalyzer::new();
        assert!(empty.analyze().unwrap().is_empty());

        let mut analyzer = HeartRateAnalyzer::new();
        analyzer.append(0, 120.0);
        analyzer.append(1_000, 160.0);
        let summary = analyzer.analyze().unwrap();
        assert_eq!(summary.get_f64(keys::MAX_HEART_RATE), Some(160.0));
        assert_eq!(summary.get_f64(keys::AVG_HEART_RATE), Some(140.0));
    }

    #[test]
    fn test_running_cadence_is_doubled() {
        let mut running = CadenceAnalyzer::new(&ActivityType::Running);
        let mut cycling = CadenceAnalyzer::new(&ActivityType::Cycling);
        for analyzer in [&mut running, &mut cycling] {
            analyzer.append(0, 80.0);
            analyzer.append(1_000, 90.0);
        }
        assert_eq!(running.analyze().unwrap().get_f64(keys::MAX_CADENCE), Some(180.0));
        assert_eq!(cycling.analyze().unwrap().get_f64(keys::AVG_CADENCE), Some(85.0));
    }

    #[test]
    fn test_non_finite_stream_fails_analysis() {
        let mut analyzer = HeartRateAnalyzer::new();
        analyzer.append(0, f64::NAN);
        assert!(matches!(
            analyzer.analyze(),
            Err(AnalysisError::SensorFailure { sensor: SensorType::HeartRate, .. })
        ));
    }

    #[test]
    fn test_factory_selects_by_sensor_type() {
        let config = AnalysisConfig::default();
        let mut activity = Activity::new("a", "u", ActivityType::Running);
        activity.sensors.heart_rate = vec![
            SensorSample { timestamp_ms: 0, value: 100.0 },
            SensorSample { timestamp_ms: 1_000, value: 110.0 },
        ];

        let analyzer = create_with_data(SensorType::HeartRate, &activity, &config).unwrap();
        assert_eq!(analyzer.sensor_type(), SensorType::HeartRate);
        assert_eq!(analyzer.analyze().unwrap().get_f64(keys::AVG_HEART_RATE), Some(105.0));

        assert!(create_with_data(SensorType::Power, &activity, &config).is_none());
        for sensor_type in SensorType::ALL {
            let analyzer = create_sensor_analyzer(sensor_type, &activity.activity_type, &config);
            assert_eq!(analyzer.sensor_type(), sensor_type);
        }
    }
}
