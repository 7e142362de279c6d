// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Structured logging setup and analysis event helpers

use crate::constants::service;
use crate::models::DeferredTaskStatus;
use anyhow::Result;
use std::env;
use std::io;
use tracing::{error, info, warn};
use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter,
};

/// Logging configuration
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
    /// Output format (json, pretty, compact)
    pub format: LogFormat,
    /// Include source file and line numbers
    pub include_location: bool,
    /// Include thread information; useful when several workers interleave
    pub include_thread: bool,
    /// Emit span open/close events
    pub include_spans: bool,
    /// Service name for structured logging
    pub service_name: String,
    /// Environment (development, staging, production)
    pub environment: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum LogFormat {
    Json,
    Pretty,
    Compact,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Pretty,
            include_location: false,
            include_thread: false,
            include_spans: false,
            service_name: service::SERVICE_NAME.to_string(),
            environment: "development".to_string(),
        }
    }
}

impl LoggingConfig {
    /// Create logging configuration from environment variables
    pub fn from_env() -> Self {
        let level = env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());

        let format = match env::var("LOG_FORMAT").as_deref() {
            Ok("json") => LogFormat::Json,
            Ok("compact") => LogFormat::Compact,
            _ => LogFormat::Pretty,
        };

        let environment = env::var("ENVIRONMENT").unwrap_or_else(|_| "development".to_string());
        let is_production = environment == "production";

        Self {
            level,
            format,
            include_location: is_production || env::var("LOG_INCLUDE_LOCATION").is_ok(),
            include_thread: is_production || env::var("LOG_INCLUDE_THREAD").is_ok(),
            include_spans: env::var("LOG_INCLUDE_SPANS").is_ok(),
            service_name: env::var("SERVICE_NAME").unwrap_or_else(|_| service::SERVICE_NAME.to_string()),
            environment,
        }
    }

    fn span_events(&self) -> FmtSpan {
        if self.include_spans {
            FmtSpan::NEW | FmtSpan::CLOSE
        } else {
            FmtSpan::NONE
        }
    }

    /// Initialize the global tracing subscriber
    pub fn init(&self) -> Result<()> {
        let env_filter = EnvFilter::try_from_default_env()
            .or_else(|_| EnvFilter::try_new(&self.level))
            .unwrap_or_else(|_| EnvFilter::new("info"));

        let registry = tracing_subscriber::registry().with(env_filter);

        // Worker logs go to stderr so stdout stays clean for summaries
        match self.format {
            LogFormat::Json => {
                let layer = fmt::layer()
                    .json()
                    .with_file(self.include_location)
                    .with_line_number(self.include_location)
                    .with_thread_ids(self.include_thread)
                    .with_thread_names(self.include_thread)
                    .with_target(true)
                    .with_writer(io::stderr)
                    .with_span_events(self.span_events());
                registry.with(layer).try_init()?;
            }
            LogFormat::Pretty => {
                let layer = fmt::layer()
                    .with_file(self.include_location)
                    .with_line_number(self.include_location)
                    .with_thread_ids(self.include_thread)
                    .with_thread_names(self.include_thread)
                    .with_target(true)
                    .with_writer(io::stderr)
                    .with_span_events(self.span_events());
                registry.with(layer).try_init()?;
            }
            LogFormat::Compact => {
                let layer = fmt::layer()
                    .compact()
                    .with_target(false)
                    .with_writer(io::stderr)
                    .with_span_events(FmtSpan::NONE);
                registry.with(layer).try_init()?;
            }
        }

        info!(
            service.name = %self.service_name,
            service.version = %service::SERVICE_VERSION,
            environment = %self.environment,
            log.level = %self.level,
            log.format = ?self.format,
            "Activity analysis worker starting up"
        );

        Ok(())
    }
}

/// Initialize logging from environment
pub fn init_from_env() -> Result<()> {
    LoggingConfig::from_env().init()
}

/// Structured events emitted by the pipeline and the scheduler
pub struct AppLogger;

impl AppLogger {
    /// Log the outcome of one activity analysis
    pub fn log_analysis_event(activity_id: &str, event: &str, success: bool, details: Option<&str>) {
        if success {
            info!(
                activity.id = %activity_id,
                analysis.event = %event,
                analysis.details = details.unwrap_or(""),
                "Analysis event"
            );
        } else {
            error!(
                activity.id = %activity_id,
                analysis.event = %event,
                analysis.details = details.unwrap_or(""),
                "Analysis failure"
            );
        }
    }

    /// Log worker lifecycle changes
    pub fn log_worker_event(activity_id: &str, status: DeferredTaskStatus, running: usize, queued: usize) {
        info!(
            activity.id = %activity_id,
            worker.status = %status,
            worker.running = running,
            worker.queued = queued,
            "Worker event"
        );
    }

    /// Log a skipped step caused by missing data on the activity
    pub fn log_skipped_step(activity_id: Option<&str>, step: &str, reason: &str) {
        warn!(
            activity.id = activity_id.unwrap_or("unknown"),
            pipeline.step = %step,
            reason = %reason,
            "Pipeline step skipped"
        );
    }

    /// Log a personal record produced by an activity
    pub fn log_record_update(activity_id: &str, record: &str, value: f64) {
        info!(
            activity.id = %activity_id,
            record.name = %record,
            record.value = value,
            "Personal record"
        );
    }

    /// Log performance metrics
    pub fn log_performance_metric(metric_name: &str, value: f64, unit: &str) {
        info!(
            metric.name = %metric_name,
            metric.value = value,
            metric.unit = %unit,
            "Performance metric"
        );
    }
}
