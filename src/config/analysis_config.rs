// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Analysis tunables: accuracy gate, speed windows, interval detection parameters

use crate::constants::analysis;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::Path;

/// Main analysis configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Raw activity type string to internal type name
    pub activity_types: HashMap<String, String>,
    pub location: LocationConfig,
    pub intervals: IntervalConfig,
    pub power: PowerConfig,
    /// Days kept in the rolling user histories
    pub rolling_history_days: i64,
}

/// Location track processing
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LocationConfig {
    /// Fixes with a horizontal accuracy outside [0, this] are dropped
    pub max_horizontal_accuracy_m: f64,
    pub cycling_speed_window_s: u64,
    pub default_speed_window_s: u64,
    pub heat_map_decimal_places: u32,
    pub speed_bucket_m_per_s: f64,
}

/// Interval/effort detection
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IntervalConfig {
    /// Speed graphs with a variance at or below this are not searched
    pub speed_variance_gate: f64,
    pub smoothing_window: usize,
    pub peak_min_prominence: f64,
    pub min_interval_duration_s: f64,
    pub max_clusters: usize,
}

/// Power analysis
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PowerConfig {
    pub normalized_power_window: usize,
    pub min_ftp_watts: f64,
}

impl AnalysisConfig {
    /// Load analysis configuration from file or use defaults
    pub fn load(path: Option<String>) -> Result<Self> {
        if let Some(config_path) = path {
            return Self::load_from_file(&config_path);
        }

        if Path::new("analysis_config.toml").exists() {
            return Self::load_from_file("analysis_config.toml");
        }

        Ok(Self::default())
    }

    /// Load configuration from a specific file
    pub fn load_from_file(path: &str) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read analysis config file: {}", path))?;

        let config: AnalysisConfig = toml::from_str(&content)
            .with_context(|| format!("Failed to parse analysis config file: {}", path))?;

        config.validate()?;
        Ok(config)
    }

    /// Reject values that would break the detectors
    pub fn validate(&self) -> Result<()> {
        if self.location.max_horizontal_accuracy_m < 0.0 {
            return Err(anyhow::anyhow!("max_horizontal_accuracy_m cannot be negative"));
        }
        if self.location.cycling_speed_window_s == 0 || self.location.default_speed_window_s == 0 {
            return Err(anyhow::anyhow!("speed windows must be at least one second"));
        }
        if self.location.speed_bucket_m_per_s <= 0.0 {
            return Err(anyhow::anyhow!("speed_bucket_m_per_s must be positive"));
        }
        if self.intervals.smoothing_window == 0 {
            return Err(anyhow::anyhow!("smoothing_window must be at least 1"));
        }
        if self.intervals.max_clusters == 0 {
            return Err(anyhow::anyhow!("max_clusters must be at least 1"));
        }
        if self.power.normalized_power_window == 0 {
            return Err(anyhow::anyhow!("normalized_power_window must be at least 1"));
        }
        Ok(())
    }

    /// Get the internal activity type name for a raw activity type
    pub fn map_activity_type(&self, raw: &str) -> Option<&str> {
        self.activity_types.get(raw).map(|s| s.as_str())
    }
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        let mut activity_types = HashMap::new();

        activity_types.insert("Run".to_string(), "running".to_string());
        activity_types.insert("Running".to_string(), "running".to_string());
        activity_types.insert("TrailRun".to_string(), "running".to_string());
        activity_types.insert("VirtualRun".to_string(), "running".to_string());
        activity_types.insert("Ride".to_string(), "cycling".to_string());
        activity_types.insert("Cycling".to_string(), "cycling".to_string());
        activity_types.insert("GravelRide".to_string(), "cycling".to_string());
        activity_types.insert("MountainBikeRide".to_string(), "cycling".to_string());
        activity_types.insert("VirtualRide".to_string(), "cycling".to_string());
        activity_types.insert("Walk".to_string(), "walking".to_string());
        activity_types.insert("Walking".to_string(), "walking".to_string());
        activity_types.insert("Hike".to_string(), "hiking".to_string());
        activity_types.insert("Hiking".to_string(), "hiking".to_string());
        activity_types.insert("Swim".to_string(), "swimming".to_string());
        activity_types.insert("Swimming".to_string(), "swimming".to_string());

        Self {
            activity_types,
            location: LocationConfig::default(),
            intervals: IntervalConfig::default(),
            power: PowerConfig::default(),
            rolling_history_days: analysis::ROLLING_HISTORY_DAYS,
        }
    }
}

impl Default for LocationConfig {
    fn default() -> Self {
        Self {
            max_horizontal_accuracy_m: analysis::MAX_HORIZONTAL_ACCURACY_M,
            cycling_speed_window_s: analysis::CYCLING_SPEED_WINDOW_S,
            default_speed_window_s: analysis::DEFAULT_SPEED_WINDOW_S,
            heat_map_decimal_places: analysis::HEAT_MAP_DECIMAL_PLACES,
            speed_bucket_m_per_s: analysis::SPEED_BUCKET_M_PER_S,
        }
    }
}

impl Default for IntervalConfig {
    fn default() -> Self {
        Self {
            speed_variance_gate: analysis::SPEED_VARIANCE_GATE,
            smoothing_window: analysis::SMOOTHING_WINDOW,
            peak_min_prominence: analysis::PEAK_MIN_PROMINENCE,
            min_interval_duration_s: analysis::MIN_INTERVAL_DURATION_S,
            max_clusters: analysis::MAX_INTERVAL_CLUSTERS,
        }
    }
}

impl Default for PowerConfig {
    fn default() -> Self {
        Self {
            normalized_power_window: analysis::NORMALIZED_POWER_WINDOW,
            min_ftp_watts: analysis::MIN_FTP_WATTS,
        }
    }
}
