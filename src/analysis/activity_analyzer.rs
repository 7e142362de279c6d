// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! # Activity Analyzer
//!
//! Runs every analyzer over one activity and merges their output. This is the
//! CPU-bound part of a worker's job; it touches no shared state and checks the
//! worker's cancellation flag between coarse steps.

use super::hasher::ActivityHasher;
use super::intensity::IntensityCalculator;
use super::location::LocationAnalyzer;
use super::sensor::create_with_data;
use crate::config::AnalysisConfig;
use crate::constants::{keys, units};
use crate::errors::AnalysisResult;
use crate::logging::AppLogger;
use crate::models::{parse_activity_payload, Activity, AnalysisSummary, SensorType, SpeedPoint};
use crate::scheduler::worker::CancellationFlag;
use std::time::Instant;
use tracing::{debug, warn};

/// Everything derived from one activity, ready to persist
#[derive(Debug, Clone)]
pub struct ActivityAnalysis {
    pub summary: AnalysisSummary,
    pub speed_graph: Vec<SpeedPoint>,
    pub activity_hash: String,
    /// Seconds between the first and last sample of any stream
    pub duration_s: f64,
}

impl ActivityAnalysis {
    pub fn avg_speed(&self) -> Option<f64> {
        self.summary.get_f64(keys::AVG_SPEED)
    }

    pub fn normalized_power(&self) -> Option<f64> {
        self.summary.get_f64(keys::NORMALIZED_POWER)
    }

    /// Power-based score when both normalized power and FTP are known,
    /// otherwise pace-based when a threshold pace and a moving average exist
    pub fn intensity_score(&self, ftp: Option<f64>, threshold_pace_mps: Option<f64>) -> Option<f64> {
        if let (Some(np), Some(ftp)) = (self.normalized_power(), ftp) {
            return Some(IntensityCalculator::score_from_power(self.duration_s, np, Some(ftp)));
        }
        match (self.avg_speed(), threshold_pace_mps) {
            (Some(avg_speed), Some(threshold)) if avg_speed > 0.0 && threshold > 0.0 => Some(
                IntensityCalculator::estimate_from_pace(self.duration_s, avg_speed, threshold),
            ),
            _ => None,
        }
    }
}

pub struct ActivityAnalyzer<'a> {
    config: &'a AnalysisConfig,
}

impl<'a> ActivityAnalyzer<'a> {
    pub fn new(config: &'a AnalysisConfig) -> Self {
        Self { config }
    }

    /// Analyze a whole activity. Fails only when cancelled; a failing sensor
    /// stream is logged and left out of the summary.
    pub fn perform_analysis(
        &self,
        activity: &Activity,
        cancel: &CancellationFlag,
    ) -> AnalysisResult<ActivityAnalysis> {
        let started = Instant::now();
        let activity_id = activity.id.as_deref().unwrap_or("unknown");

        cancel.checkpoint()?;
        let mut location_analyzer = LocationAnalyzer::new(&activity.activity_type, self.config);
        let mut rejected = 0usize;
        for location in &activity.locations {
            if !location_analyzer.append_location(location) {
                rejected += 1;
            }
        }
        if rejected > 0 {
            debug!(activity.id = %activity_id, rejected, "Locations rejected by the accuracy gate");
        }
        let mut summary = location_analyzer.analyze();

        cancel.checkpoint()?;
        for sensor_type in SensorType::ALL {
            if let Some(analyzer) = create_with_data(sensor_type, activity, self.config) {
                match analyzer.analyze() {
                    Ok(sensor_summary) => summary.merge(sensor_summary),
                    Err(e) => warn!(
                        activity.id = %activity_id,
                        sensor.type = %sensor_type,
                        "Sensor analysis failed: {}", e
                    ),
                }
            }
            cancel.checkpoint()?;
        }

        let activity_hash = ActivityHasher::new(activity).hash();
        summary.insert(keys::ACTIVITY_HASH, activity_hash.clone());

        let duration_s = match (activity.first_timestamp_ms(), activity.last_timestamp_ms()) {
            (Some(first), Some(last)) => last.saturating_sub(first) as f64 / units::MILLIS_PER_SECOND,
            _ => 0.0,
        };

        for (name, value) in location_analyzer.records().iter() {
            AppLogger::log_record_update(activity_id, name, value);
        }
        AppLogger::log_performance_metric(
            "activity_analysis_ms",
            started.elapsed().as_secs_f64() * 1000.0,
            "ms",
        );

        Ok(ActivityAnalysis {
            summary,
            speed_graph: location_analyzer.speed_graph().to_vec(),
            activity_hash,
            duration_s,
        })
    }

    /// Decode a serialized activity and analyze it directly
    pub fn analyze_payload(&self, json: &str) -> AnalysisResult<ActivityAnalysis> {
        let activity = parse_activity_payload(json, self.config)?;
        self.perform_analysis(&activity, &CancellationFlag::new())
    }
}
