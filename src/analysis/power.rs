// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Power meter analysis: maximum, average, normalized power and best efforts

use super::sensor::{SampleSeries, SensorAnalyzer};
use crate::config::analysis_config::PowerConfig;
use crate::constants::{analysis, keys};
use crate::errors::AnalysisResult;
use crate::models::{AnalysisSummary, SensorSample, SensorType};

/// Best-effort windows reported for every power stream
const BEST_EFFORT_WINDOWS: [(&str, u64); 3] = [
    (keys::BEST_5_SEC_POWER, analysis::BEST_5_SEC_WINDOW_S),
    (keys::BEST_20_MIN_POWER, analysis::BEST_20_MIN_WINDOW_S),
    (keys::BEST_1_HOUR_POWER, analysis::BEST_1_HOUR_WINDOW_S),
];

#[derive(Debug)]
pub struct PowerAnalyzer {
    series: SampleSeries,
    readings: Vec<SensorSample>,
    normalized_power_window: usize,
}

impl PowerAnalyzer {
    pub fn new(config: &PowerConfig) -> Self {
        Self {
            series: SampleSeries::new(),
            readings: Vec::new(),
            normalized_power_window: config.normalized_power_window.max(1),
        }
    }

    pub fn normalized_power(&self) -> Option<f64> {
        normalized_power(&self.readings, self.normalized_power_window)
    }
}

impl SensorAnalyzer for PowerAnalyzer {
    fn sensor_type(&self) -> SensorType {
        SensorType::Power
    }

    fn append(&mut self, timestamp_ms: u64, value: f64) {
        self.series.append(timestamp_ms, value);
        self.readings.push(SensorSample { timestamp_ms, value });
    }

    fn analyze(&self) -> AnalysisResult<AnalysisSummary> {
        self.series.check_finite(self.sensor_type())?;

        let mut summary = self.series.summary_with(keys::MAX_POWER, keys::AVG_POWER, 1.0);
        if let Some(np) = self.normalized_power() {
            summary.insert(keys::NORMALIZED_POWER, np);
        }
        for (key, window_s) in BEST_EFFORT_WINDOWS {
            if let Some(best) = best_average_power(&self.readings, window_s) {
                summary.insert(key, best);
            }
        }
        Ok(summary)
    }
}

/// Normalized power:
/// 1) rolling mean over `window` samples
/// 2) average of the fourth powers
/// 3) fourth root
///
/// `None` when the stream is shorter than one window.
pub fn normalized_power(readings: &[SensorSample], window: usize) -> Option<f64> {
    if window == 0 || readings.len() < window {
        return None;
    }

    let mut sum = 0.0;
    let mut fourth_power_sum = 0.0;
    let mut rolled = 0usize;

    for (i, reading) in readings.iter().enumerate() {
        sum += reading.value;
        if i >= window {
            sum -= readings[i - window].value;
        }
        if i + 1 >= window {
            fourth_power_sum += (sum / window as f64).powi(4);
            rolled += 1;
        }
    }

    Some((fourth_power_sum / rolled as f64).powf(0.25))
}

/// Highest mean power over any run of consecutive readings spanning at least
/// `window_s` seconds. `None` when the stream is shorter than that.
pub fn best_average_power(readings: &[SensorSample], window_s: u64) -> Option<f64> {
    let window_ms = window_s * 1000;
    let mut prefix = Vec::with_capacity(readings.len() + 1);
    prefix.push(0.0);
    for reading in readings {
        prefix.push(prefix[prefix.len() - 1] + reading.value);
    }

    let mut best: Option<f64> = None;
    let mut left = 0;
    for right in 0..readings.len() {
        let end = readings[right].timestamp_ms;
        // Shrink to the shortest run that still spans the window
        while left < right && end.saturating_sub(readings[left + 1].timestamp_ms) >= window_ms {
            left += 1;
        }
        if end.saturating_sub(readings[left].timestamp_ms) < window_ms {
            continue;
        }
        let mean = (prefix[right + 1] - prefix[left]) / (right + 1 - left) as f64;
        if best.map_or(true, |b| mean > b) {
            best = Some(mean);
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stream(values: &[f64]) -> Vec<SensorSample> {
        values
            .iter()
            .enumerate()
            .map(|(i, &value)| SensorSample {
                timestamp_ms: i as u64 * 1000,
                value,
            })
            .collect()
    }

    #[test]
    fn test_normalized_power_of_steady_effort() {
        let readings = stream(&[250.0; 60]);
        let np = normalized_power(&readings, 30).unwrap();
        assert!((np - 250.0).abs() < 1e-9);
        assert!(normalized_power(&readings[..29], 30).is_none());
    }

    #[test]
    fn test_normalized_power_exceeds_average_for_surges() {
        let mut values = vec![150.0; 60];
        values.extend([350.0; 60]);
        let readings = stream(&values);
        let np = normalized_power(&readings, 30).unwrap();
        assert!(np > 250.0);
    }

    #[test]
    fn test_best_average_power_window() {
        let mut values = vec![100.0; 30];
        for v in &mut values[10..15] {
            *v = 300.0;
        }
        let readings = stream(&values);

        // Six readings at 1 Hz span five seconds
        let best = best_average_power(&readings, 5).unwrap();
        assert!((best - (5.0 * 300.0 + 100.0) / 6.0).abs() < 1e-9);
        assert!(best_average_power(&readings, 60).is_none());
    }

    #[test]
    fn test_power_summary_keys() {
        let mut analyzer = PowerAnalyzer::new(&PowerConfig::default());
        for (i, value) in [200.0; 40].iter().enumerate() {
            analyzer.append(i as u64 * 1000, *value);
        }
        let summary = analyzer.analyze().unwrap();
        assert_eq!(summary.get_f64(keys::MAX_POWER), Some(200.0));
        assert_eq!(summary.get_f64(keys::AVG_POWER), Some(200.0));
        assert!(summary.contains_key(keys::NORMALIZED_POWER));
        assert_eq!(summary.get_f64(keys::BEST_5_SEC_POWER), Some(200.0));
        assert!(!summary.contains_key(keys::BEST_20_MIN_POWER));
    }
}
