// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Environment-based configuration for the analysis worker process

use crate::constants::scheduler;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::time::Duration;
use tracing::{info, warn};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerConfig {
    /// Maximum number of activities analyzed concurrently
    pub max_worker_threads: usize,
    /// Fallback tick of the dispatcher loop in milliseconds
    pub poll_interval_ms: u64,
    /// Optional TOML file with analysis tunables
    pub analysis_config_path: Option<String>,
    /// Log level
    pub log_level: String,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            max_worker_threads: scheduler::DEFAULT_MAX_WORKER_THREADS,
            poll_interval_ms: scheduler::DEFAULT_POLL_INTERVAL_MS,
            analysis_config_path: None,
            log_level: "info".to_string(),
        }
    }
}

impl WorkerConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        info!("Loading worker configuration from environment variables");

        // Load .env file if it exists
        if let Err(e) = dotenv::dotenv() {
            warn!("No .env file found or failed to load: {}", e);
        }

        let config = WorkerConfig {
            max_worker_threads: env_var_or(
                "MAX_WORKER_THREADS",
                &scheduler::DEFAULT_MAX_WORKER_THREADS.to_string(),
            )
            .parse()
            .context("Invalid MAX_WORKER_THREADS value")?,
            poll_interval_ms: env_var_or(
                "SCHEDULER_POLL_INTERVAL_MS",
                &scheduler::DEFAULT_POLL_INTERVAL_MS.to_string(),
            )
            .parse()
            .context("Invalid SCHEDULER_POLL_INTERVAL_MS value")?,
            analysis_config_path: env::var("ANALYSIS_CONFIG_PATH").ok(),
            log_level: env_var_or("RUST_LOG", "info"),
        };

        config.validate()?;
        info!("Worker configuration loaded successfully");
        Ok(config)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if self.max_worker_threads == 0 {
            return Err(anyhow::anyhow!("MAX_WORKER_THREADS must be at least 1"));
        }
        if self.poll_interval_ms == 0 {
            return Err(anyhow::anyhow!("SCHEDULER_POLL_INTERVAL_MS must be positive"));
        }
        Ok(())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Get a summary of the configuration for logging
    pub fn summary(&self) -> String {
        format!(
            "Activity Analysis Worker Configuration:\n\
             - Max Workers: {}\n\
             - Poll Interval: {} ms\n\
             - Analysis Config: {}\n\
             - Log Level: {}",
            self.max_worker_threads,
            self.poll_interval_ms,
            self.analysis_config_path.as_deref().unwrap_or("built-in defaults"),
            self.log_level
        )
    }
}

/// Get environment variable or default value
fn env_var_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_validation() {
        let mut config = WorkerConfig {
            max_worker_threads: 0,
            ..WorkerConfig::default()
        };
        assert!(config.validate().is_err());

        config.max_worker_threads = 2;
        assert!(config.validate().is_ok());

        config.poll_interval_ms = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_summary_mentions_defaults() {
        let config = WorkerConfig::default();
        let summary = config.summary();
        assert!(summary.contains("Max Workers: 4"));
        assert!(summary.contains("built-in defaults"));
        assert_eq!(config.poll_interval(), Duration::from_millis(1000));
    }
}
