// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! # Storage Collaborators
//!
//! The pipeline reads activities and writes results through these traits.
//! Durable implementations live outside this crate; [`InMemoryStore`] backs
//! the worker binary and the tests.

use crate::constants::units;
use crate::models::{Activity, AnalysisSummary, DeferredTaskStatus, SpeedPoint};
use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use tokio::sync::RwLock;

#[async_trait]
pub trait ActivityStore: Send + Sync {
    async fn retrieve_activity(&self, activity_id: &str) -> Result<Option<Activity>>;

    async fn create_activity_summary(&self, activity_id: &str, summary: &AnalysisSummary) -> Result<bool>;

    /// Persist a time series attached to the activity, such as the speed graph
    async fn create_activity_metadata_list(
        &self,
        activity_id: &str,
        key: &str,
        list: &[SpeedPoint],
    ) -> Result<bool>;

    /// Work out and store the start time of an activity that lacks one.
    /// Returns the start time in Unix seconds, if it could be determined.
    async fn update_activity_start_time(&self, activity: &Activity) -> Result<Option<i64>>;

    async fn update_activity_end_time(&self, activity: &Activity, end_time_s: i64) -> Result<()>;

    async fn update_deferred_task(
        &self,
        user_id: &str,
        task_id: &str,
        activity_id: &str,
        status: DeferredTaskStatus,
    ) -> Result<()>;
}

#[async_trait]
pub trait UserSettingsStore: Send + Sync {
    async fn retrieve_user_setting(&self, user_id: &str, key: &str) -> Result<Option<Value>>;

    async fn update_user_setting(&self, user_id: &str, key: &str, value: Value, timestamp: i64) -> Result<()>;
}

/// Everything a worker needs from storage
pub trait AnalysisStore: ActivityStore + UserSettingsStore {}

impl<T: ActivityStore + UserSettingsStore> AnalysisStore for T {}

/// One deferred task status change
#[derive(Debug, Clone, PartialEq)]
pub struct TaskUpdate {
    pub user_id: String,
    pub task_id: String,
    pub activity_id: String,
    pub status: DeferredTaskStatus,
}

#[derive(Debug, Default)]
struct StoreState {
    activities: HashMap<String, Activity>,
    summaries: HashMap<String, AnalysisSummary>,
    metadata: HashMap<(String, String), Vec<SpeedPoint>>,
    start_times: HashMap<String, i64>,
    end_times: HashMap<String, i64>,
    task_updates: Vec<TaskUpdate>,
    user_settings: HashMap<(String, String), (Value, i64)>,
}

/// Process-local store
#[derive(Debug, Default)]
pub struct InMemoryStore {
    state: RwLock<StoreState>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace an activity. Activities without an ID are ignored.
    pub async fn insert_activity(&self, activity: Activity) -> Option<String> {
        let id = activity.id.clone()?;
        self.state.write().await.activities.insert(id.clone(), activity);
        Some(id)
    }

    pub async fn summary(&self, activity_id: &str) -> Option<AnalysisSummary> {
        self.state.read().await.summaries.get(activity_id).cloned()
    }

    pub async fn metadata_list(&self, activity_id: &str, key: &str) -> Option<Vec<SpeedPoint>> {
        self.state
            .read()
            .await
            .metadata
            .get(&(activity_id.to_string(), key.to_string()))
            .cloned()
    }

    pub async fn start_time(&self, activity_id: &str) -> Option<i64> {
        self.state.read().await.start_times.get(activity_id).copied()
    }

    pub async fn end_time(&self, activity_id: &str) -> Option<i64> {
        self.state.read().await.end_times.get(activity_id).copied()
    }

    /// Status history of every task that touched the activity, oldest first
    pub async fn task_history(&self, activity_id: &str) -> Vec<DeferredTaskStatus> {
        self.state
            .read()
            .await
            .task_updates
            .iter()
            .filter(|u| u.activity_id == activity_id)
            .map(|u| u.status)
            .collect()
    }
}

#[async_trait]
impl ActivityStore for InMemoryStore {
    async fn retrieve_activity(&self, activity_id: &str) -> Result<Option<Activity>> {
        Ok(self.state.read().await.activities.get(activity_id).cloned())
    }

    async fn create_activity_summary(&self, activity_id: &str, summary: &AnalysisSummary) -> Result<bool> {
        self.state
            .write()
            .await
            .summaries
            .insert(activity_id.to_string(), summary.clone());
        Ok(true)
    }

    async fn create_activity_metadata_list(
        &self,
        activity_id: &str,
        key: &str,
        list: &[SpeedPoint],
    ) -> Result<bool> {
        self.state
            .write()
            .await
            .metadata
            .insert((activity_id.to_string(), key.to_string()), list.to_vec());
        Ok(true)
    }

    async fn update_activity_start_time(&self, activity: &Activity) -> Result<Option<i64>> {
        let (Some(id), Some(first_ms)) = (activity.id.as_ref(), activity.first_timestamp_ms()) else {
            return Ok(None);
        };
        let start_time = (first_ms as f64 / units::MILLIS_PER_SECOND) as i64;
        self.state.write().await.start_times.insert(id.clone(), start_time);
        Ok(Some(start_time))
    }

    async fn update_activity_end_time(&self, activity: &Activity, end_time_s: i64) -> Result<()> {
        let id = activity
            .id
            .clone()
            .ok_or_else(|| anyhow::anyhow!("activity has no ID"))?;
        self.state.write().await.end_times.insert(id, end_time_s);
        Ok(())
    }

    async fn update_deferred_task(
        &self,
        user_id: &str,
        task_id: &str,
        activity_id: &str,
        status: DeferredTaskStatus,
    ) -> Result<()> {
        self.state.write().await.task_updates.push(TaskUpdate {
            user_id: user_id.to_string(),
            task_id: task_id.to_string(),
            activity_id: activity_id.to_string(),
            status,
        });
        Ok(())
    }
}

#[async_trait]
impl UserSettingsStore for InMemoryStore {
    async fn retrieve_user_setting(&self, user_id: &str, key: &str) -> Result<Option<Value>> {
        Ok(self
            .state
            .read()
            .await
            .user_settings
            .get(&(user_id.to_string(), key.to_string()))
            .map(|(value, _)| value.clone()))
    }

    async fn update_user_setting(&self, user_id: &str, key: &str, value: Value, timestamp: i64) -> Result<()> {
        self.state
            .write()
            .await
            .user_settings
            .insert((user_id.to_string(), key.to_string()), (value, timestamp));
        Ok(())
    }
}
