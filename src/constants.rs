// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! # Constants Module
//!
//! Record-name vocabulary, unit conversions and analysis defaults.
//! The strings in [`keys`] are shared with external storage and must not change.

/// Result keys used in activity summaries and in external storage
pub mod keys {
    /// Distance records (lowest elapsed seconds wins)
    pub const BEST_1K: &str = "best-1K";
    pub const BEST_MILE: &str = "best-mile";
    pub const BEST_5K: &str = "best-5K";
    pub const BEST_10K: &str = "best-10K";
    pub const BEST_15K: &str = "best-15K";
    pub const BEST_HALF_MARATHON: &str = "best-half-marathon";
    pub const BEST_MARATHON: &str = "best-marathon";
    pub const BEST_METRIC_CENTURY: &str = "best-metric-century";
    pub const BEST_CENTURY: &str = "best-century";

    /// Highest current speed (m/s)
    pub const BEST_SPEED: &str = "best-speed";

    /// Sensor maxima and averages
    pub const MAX_HEART_RATE: &str = "max-heart-rate";
    pub const AVG_HEART_RATE: &str = "avg-heart-rate";
    pub const MAX_CADENCE: &str = "max-cadence";
    pub const AVG_CADENCE: &str = "avg-cadence";
    pub const MAX_POWER: &str = "max-power";
    pub const AVG_POWER: &str = "avg-power";
    pub const NORMALIZED_POWER: &str = "normalized-power";
    pub const BEST_5_SEC_POWER: &str = "best-5-sec-power";
    pub const BEST_20_MIN_POWER: &str = "best-20-min-power";
    pub const BEST_1_HOUR_POWER: &str = "best-1-hour-power";

    /// Location results
    pub const LONGEST_DISTANCE: &str = "longest-distance";
    pub const AVG_SPEED: &str = "avg-speed";
    pub const TOTAL_ASCENT: &str = "total-ascent";
    pub const MILE_SPLITS: &str = "mile-splits";
    pub const KM_SPLITS: &str = "km-splits";
    pub const SPEED_VARIANCE: &str = "speed-variance";
    pub const INTERVALS: &str = "intervals";
    pub const LOCATION_HEAT_MAP: &str = "location-heat-map";
    pub const SPEED_HEAT_MAP: &str = "speed-heat-map";

    /// Metadata list holding the speed graph
    pub const CURRENT_SPEED: &str = "current-speed";

    /// Whole-activity results
    pub const ACTIVITY_HASH: &str = "activity-hash";
    pub const INTENSITY_SCORE: &str = "intensity-score";
}

/// User setting names read and written by the pipeline
pub mod user_settings {
    /// Functional threshold power in watts
    pub const FTP: &str = "ftp";
    /// Threshold pace in meters per second
    pub const THRESHOLD_PACE: &str = "threshold-pace";
    /// Rolling list of observed maximum heart rates
    pub const MAX_HEART_RATE_HISTORY: &str = "estimated-max-heart-rate-history";
    /// Rolling list of best 20 minute power values
    pub const BEST_20_MIN_POWER_HISTORY: &str = "best-20-min-power-history";
}

/// Unit conversions
pub mod units {
    pub const METERS_PER_KILOMETER: f64 = 1000.0;
    pub const METERS_PER_MILE: f64 = 1609.34;
    pub const MILLIS_PER_SECOND: f64 = 1000.0;
    pub const SECONDS_PER_DAY: i64 = 86_400;
}

/// Default analysis parameters
pub mod analysis {
    /// Locations with a horizontal accuracy outside [0, this] are dropped
    pub const MAX_HORIZONTAL_ACCURACY_M: f64 = 50.0;

    /// Seconds of track averaged together for the current speed
    pub const CYCLING_SPEED_WINDOW_S: u64 = 7;
    pub const DEFAULT_SPEED_WINDOW_S: u64 = 11;

    /// Interval detection
    pub const SPEED_VARIANCE_GATE: f64 = 0.25;
    pub const SMOOTHING_WINDOW: usize = 4;
    pub const PEAK_MIN_PROMINENCE: f64 = 0.3;
    pub const MIN_INTERVAL_DURATION_S: f64 = 10.0;
    pub const MAX_INTERVAL_CLUSTERS: usize = 10;
    pub const KMEANS_MAX_ITERATIONS: usize = 100;

    /// Heat map quantization
    pub const HEAT_MAP_DECIMAL_PLACES: u32 = 4;
    pub const SPEED_BUCKET_M_PER_S: f64 = 0.1;

    /// Power analysis, in samples (power meters report at 1 Hz)
    pub const NORMALIZED_POWER_WINDOW: usize = 30;

    /// Power analysis windows, in seconds
    pub const BEST_5_SEC_WINDOW_S: u64 = 5;
    pub const BEST_20_MIN_WINDOW_S: u64 = 20 * 60;
    pub const BEST_1_HOUR_WINDOW_S: u64 = 60 * 60;

    /// Power floor below which the stress score is not computed
    pub const MIN_FTP_WATTS: f64 = 0.1;

    /// Rolling user history, roughly six months
    pub const ROLLING_HISTORY_DAYS: i64 = 182;
}

/// Scheduler defaults
pub mod scheduler {
    pub const DEFAULT_MAX_WORKER_THREADS: usize = 4;
    pub const DEFAULT_POLL_INTERVAL_MS: u64 = 1000;
}

/// Service identity used in logs
pub mod service {
    pub const SERVICE_NAME: &str = "pierre-activity-analysis";
    pub const SERVICE_VERSION: &str = env!("CARGO_PKG_VERSION");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_vocabulary_is_stable() {
        assert_eq!(keys::BEST_1K, "best-1K");
        assert_eq!(keys::BEST_HALF_MARATHON, "best-half-marathon");
        assert_eq!(keys::LONGEST_DISTANCE, "longest-distance");
        assert_eq!(keys::ACTIVITY_HASH, "activity-hash");
    }

    #[test]
    fn test_unit_conversions() {
        assert_eq!(units::METERS_PER_KILOMETER, 1000.0);
        assert!((units::METERS_PER_MILE * 26.2 - 42_164.7).abs() < 0.1);
    }
}
