// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Lifecycle of one activity analysis: load, analyze, persist, report status

use crate::analysis::{ActivityAnalysis, ActivityAnalyzer};
use crate::config::AnalysisConfig;
use crate::constants::{keys, units, user_settings};
use crate::errors::{AnalysisError, AnalysisResult};
use crate::logging::AppLogger;
use crate::models::{Activity, DeferredTaskStatus};
use crate::store::AnalysisStore;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Cooperative cancellation shared between the scheduler and one worker
#[derive(Debug, Clone, Default)]
pub struct CancellationFlag(Arc<AtomicBool>);

impl CancellationFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// `Err(Cancelled)` once the flag is set
    pub fn checkpoint(&self) -> AnalysisResult<()> {
        if self.is_cancelled() {
            Err(AnalysisError::Cancelled)
        } else {
            Ok(())
        }
    }
}

/// One entry of a rolling per-user history
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub value: f64,
    /// Activity start time, Unix seconds
    pub timestamp: i64,
}

/// Analyze one activity end to end. Errors are logged and turned into a
/// `Failed` task status; nothing is persisted for a cancelled analysis.
pub async fn run_analysis(
    activity_id: String,
    store: Arc<dyn AnalysisStore>,
    config: Arc<AnalysisConfig>,
    cancel: CancellationFlag,
) -> AnalysisResult<()> {
    let activity = match store.retrieve_activity(&activity_id).await? {
        Some(activity) => activity,
        None => {
            AppLogger::log_skipped_step(Some(&activity_id), "analysis", "activity not found");
            return Ok(());
        }
    };

    let task_id = Uuid::new_v4().to_string();
    let user_id = activity.user_id.clone();
    report_status(store.as_ref(), user_id.as_deref(), &task_id, &activity_id, DeferredTaskStatus::Started).await;

    let result = analyze_and_persist(&activity_id, activity, store.as_ref(), config, &cancel).await;

    let status = match &result {
        Ok(()) => {
            AppLogger::log_analysis_event(&activity_id, "analysis_complete", true, None);
            DeferredTaskStatus::Finished
        }
        Err(e) if e.is_cancellation() => {
            info!(activity.id = %activity_id, "Analysis cancelled; partial results discarded");
            DeferredTaskStatus::Failed
        }
        Err(e) => {
            AppLogger::log_analysis_event(&activity_id, "analysis_failed", false, Some(&e.to_string()));
            DeferredTaskStatus::Failed
        }
    };
    report_status(store.as_ref(), user_id.as_deref(), &task_id, &activity_id, status).await;
    result
}

async fn analyze_and_persist(
    activity_id: &str,
    activity: Activity,
    store: &dyn AnalysisStore,
    config: Arc<AnalysisConfig>,
    cancel: &CancellationFlag,
) -> AnalysisResult<()> {
    let blocking_cancel = cancel.clone();
    let rolling_history_days = config.rolling_history_days;
    let (activity, result) = tokio::task::spawn_blocking(move || {
        let result = ActivityAnalyzer::new(&config).perform_analysis(&activity, &blocking_cancel);
        (activity, result)
    })
    .await
    .map_err(|e| AnalysisError::WorkerPanicked(e.to_string()))?;
    let mut analysis = result?;

    cancel.checkpoint()?;
    persist_results(activity_id, &activity, &mut analysis, store, rolling_history_days).await
}

async fn persist_results(
    activity_id: &str,
    activity: &Activity,
    analysis: &mut ActivityAnalysis,
    store: &dyn AnalysisStore,
    rolling_history_days: i64,
) -> AnalysisResult<()> {
    let user_id = match activity.require_user_id() {
        Ok(user_id) => Some(user_id),
        Err(e) => {
            AppLogger::log_skipped_step(Some(activity_id), "intensity score and user history", &e.to_string());
            None
        }
    };

    if let Some(user_id) = user_id {
        let ftp = numeric_setting(store, user_id, user_settings::FTP).await?;
        let threshold_pace = numeric_setting(store, user_id, user_settings::THRESHOLD_PACE).await?;
        if let Some(score) = analysis.intensity_score(ftp, threshold_pace) {
            analysis.summary.insert(keys::INTENSITY_SCORE, score);
        }
    }

    if !store.create_activity_summary(activity_id, &analysis.summary).await? {
        warn!(activity.id = %activity_id, "Store declined the activity summary");
    }
    if !analysis.speed_graph.is_empty() {
        store
            .create_activity_metadata_list(activity_id, keys::CURRENT_SPEED, &analysis.speed_graph)
            .await?;
    }

    let start_time = match activity.start_time {
        Some(start_time) => Some(start_time),
        None => store.update_activity_start_time(activity).await?,
    };
    let end_time = activity
        .last_timestamp_ms()
        .and_then(|ms| i64::try_from(ms).ok())
        .and_then(DateTime::<Utc>::from_timestamp_millis);
    if let Some(end_time) = end_time {
        debug!(activity.id = %activity_id, end_time = %end_time.to_rfc3339(), "Updating activity end time");
        store.update_activity_end_time(activity, end_time.timestamp()).await?;
    }

    match (user_id, start_time) {
        (Some(user_id), Some(start_time)) => {
            let tracked = [
                (keys::MAX_HEART_RATE, user_settings::MAX_HEART_RATE_HISTORY),
                (keys::BEST_20_MIN_POWER, user_settings::BEST_20_MIN_POWER_HISTORY),
            ];
            for (summary_key, setting) in tracked {
                if let Some(value) = analysis.summary.get_f64(summary_key) {
                    update_rolling_history(store, user_id, setting, value, start_time, rolling_history_days)
                        .await?;
                }
            }
        }
        (Some(_), None) => AppLogger::log_skipped_step(Some(activity_id), "user history", "no start time"),
        (None, _) => {}
    }

    Ok(())
}

async fn numeric_setting(store: &dyn AnalysisStore, user_id: &str, key: &str) -> AnalysisResult<Option<f64>> {
    Ok(store
        .retrieve_user_setting(user_id, key)
        .await?
        .as_ref()
        .and_then(Value::as_f64))
}

/// Append `value` to a user's rolling history, replacing any entry with the
/// same timestamp and dropping entries older than the window
pub async fn update_rolling_history(
    store: &dyn AnalysisStore,
    user_id: &str,
    key: &str,
    value: f64,
    timestamp: i64,
    history_days: i64,
) -> AnalysisResult<()> {
    let existing = store.retrieve_user_setting(user_id, key).await?;
    let mut entries: Vec<HistoryEntry> = match existing {
        Some(raw) => serde_json::from_value(raw).unwrap_or_else(|e| {
            warn!(user.id = %user_id, setting = %key, "Discarding malformed history: {}", e);
            Vec::new()
        }),
        None => Vec::new(),
    };

    entries.retain(|entry| entry.timestamp != timestamp);
    entries.push(HistoryEntry { value, timestamp });
    entries.sort_by_key(|entry| entry.timestamp);

    let newest = entries.last().map_or(timestamp, |entry| entry.timestamp);
    let cutoff = newest - history_days * units::SECONDS_PER_DAY;
    entries.retain(|entry| entry.timestamp >= cutoff);

    store
        .update_user_setting(user_id, key, serde_json::to_value(&entries)?, timestamp)
        .await?;
    Ok(())
}

async fn report_status(
    store: &dyn AnalysisStore,
    user_id: Option<&str>,
    task_id: &str,
    activity_id: &str,
    status: DeferredTaskStatus,
) {
    let Some(user_id) = user_id else {
        AppLogger::log_skipped_step(Some(activity_id), "deferred task update", "no user ID");
        return;
    };
    if let Err(e) = store.update_deferred_task(user_id, task_id, activity_id, status).await {
        error!(activity.id = %activity_id, task.id = %task_id, "Failed to update deferred task: {}", e);
    }
}
