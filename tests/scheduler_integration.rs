// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Scheduler behavior under load: worker bound, deduplication, terminate

mod common;

use anyhow::Result;
use async_trait::async_trait;
use common::steady_ride;
use pierre_activity_analysis::config::{AnalysisConfig, WorkerConfig};
use pierre_activity_analysis::errors::AnalysisError;
use pierre_activity_analysis::models::{Activity, AnalysisSummary, DeferredTaskStatus, SpeedPoint};
use pierre_activity_analysis::scheduler::AnalysisScheduler;
use pierre_activity_analysis::store::{ActivityStore, AnalysisStore, InMemoryStore, UserSettingsStore};
use serde_json::Value;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Wraps the in-memory store and tracks how many retrievals overlap
struct SlowStore {
    inner: InMemoryStore,
    delay: Duration,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    retrievals: AtomicUsize,
}

impl SlowStore {
    fn new(delay: Duration) -> Self {
        Self {
            inner: InMemoryStore::new(),
            delay,
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
            retrievals: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl ActivityStore for SlowStore {
    async fn retrieve_activity(&self, activity_id: &str) -> Result<Option<Activity>> {
        self.retrievals.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        self.inner.retrieve_activity(activity_id).await
    }

    async fn create_activity_summary(&self, activity_id: &str, summary: &AnalysisSummary) -> Result<bool> {
        self.inner.create_activity_summary(activity_id, summary).await
    }

    async fn create_activity_metadata_list(
        &self,
        activity_id: &str,
        key: &str,
        list: &[SpeedPoint],
    ) -> Result<bool> {
        self.inner.create_activity_metadata_list(activity_id, key, list).await
    }

    async fn update_activity_start_time(&self, activity: &Activity) -> Result<Option<i64>> {
        self.inner.update_activity_start_time(activity).await
    }

    async fn update_activity_end_time(&self, activity: &Activity, end_time_s: i64) -> Result<()> {
        self.inner.update_activity_end_time(activity, end_time_s).await
    }

    async fn update_deferred_task(
        &self,
        user_id: &str,
        task_id: &str,
        activity_id: &str,
        status: DeferredTaskStatus,
    ) -> Result<()> {
        self.inner.update_deferred_task(user_id, task_id, activity_id, status).await
    }
}

#[async_trait]
impl UserSettingsStore for SlowStore {
    async fn retrieve_user_setting(&self, user_id: &str, key: &str) -> Result<Option<Value>> {
        self.inner.retrieve_user_setting(user_id, key).await
    }

    async fn update_user_setting(&self, user_id: &str, key: &str, value: Value, timestamp: i64) -> Result<()> {
        self.inner.update_user_setting(user_id, key, value, timestamp).await
    }
}

fn worker_config(max_worker_threads: usize) -> WorkerConfig {
    WorkerConfig {
        max_worker_threads,
        poll_interval_ms: 10,
        ..WorkerConfig::default()
    }
}

#[tokio::test]
async fn test_running_workers_never_exceed_limit() -> Result<()> {
    let store = Arc::new(SlowStore::new(Duration::from_millis(50)));
    let ids: Vec<String> = (0..8).map(|i| format!("ride-{i}")).collect();
    for id in &ids {
        store.inner.insert_activity(steady_ride(id, "u1", 200.0)).await;
    }

    let shared: Arc<dyn AnalysisStore> = store.clone();
    let scheduler = AnalysisScheduler::start(shared, AnalysisConfig::default(), &worker_config(3));
    for id in &ids {
        assert!(scheduler.enqueue(id).await?);
    }

    let status = scheduler.status().await;
    assert!(status.running <= 3);
    assert_eq!(status.max_workers, 3);

    scheduler.wait_until_idle().await;

    assert_eq!(store.retrievals.load(Ordering::SeqCst), ids.len());
    let peak = store.max_in_flight.load(Ordering::SeqCst);
    assert!((1..=3).contains(&peak), "peak concurrency {peak}");
    for id in &ids {
        assert!(store.inner.summary(id).await.is_some());
        assert_eq!(
            store.inner.task_history(id).await,
            vec![DeferredTaskStatus::Started, DeferredTaskStatus::Finished]
        );
    }

    scheduler.terminate().await;
    Ok(())
}

#[tokio::test]
async fn test_duplicate_enqueue_runs_once() -> Result<()> {
    let store = Arc::new(SlowStore::new(Duration::from_millis(100)));
    store.inner.insert_activity(steady_ride("ride-1", "u1", 200.0)).await;

    let shared: Arc<dyn AnalysisStore> = store.clone();
    let scheduler = AnalysisScheduler::start(shared, AnalysisConfig::default(), &worker_config(2));
    assert!(scheduler.enqueue("ride-1").await?);
    assert!(!scheduler.enqueue("ride-1").await?);

    // Still rejected once the worker has picked it up
    tokio::time::sleep(Duration::from_millis(30)).await;
    assert!(!scheduler.enqueue("ride-1").await?);

    scheduler.wait_until_idle().await;
    assert_eq!(store.retrievals.load(Ordering::SeqCst), 1);

    // A finished activity can be queued again
    assert!(scheduler.enqueue("ride-1").await?);
    scheduler.wait_until_idle().await;
    assert_eq!(store.retrievals.load(Ordering::SeqCst), 2);

    scheduler.terminate().await;
    Ok(())
}

#[tokio::test]
async fn test_terminate_cancels_running_and_drops_queued() -> Result<()> {
    let store = Arc::new(SlowStore::new(Duration::from_millis(200)));
    let ids: Vec<String> = (0..4).map(|i| format!("ride-{i}")).collect();
    for id in &ids {
        store.inner.insert_activity(steady_ride(id, "u1", 200.0)).await;
    }

    let shared: Arc<dyn AnalysisStore> = store.clone();
    let scheduler = AnalysisScheduler::start(shared, AnalysisConfig::default(), &worker_config(1));
    for id in &ids {
        scheduler.enqueue(id).await?;
    }
    tokio::time::sleep(Duration::from_millis(50)).await;

    scheduler.terminate().await;

    let status = scheduler.status().await;
    assert!(status.terminated);
    assert_eq!((status.queued, status.running), (0, 0));
    assert_eq!(store.retrievals.load(Ordering::SeqCst), 1);
    assert!(store.inner.summary("ride-0").await.is_none());
    assert_eq!(
        store.inner.task_history("ride-0").await,
        vec![DeferredTaskStatus::Started, DeferredTaskStatus::Failed]
    );
    for id in &ids[1..] {
        assert!(store.inner.task_history(id).await.is_empty());
    }

    assert!(matches!(
        scheduler.enqueue("ride-9").await,
        Err(AnalysisError::SchedulerTerminated)
    ));
    Ok(())
}
