// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! # Analysis Scheduler
//!
//! Bounded pool of analysis workers fed from a FIFO queue of activity IDs.
//!
//! The queue and the registry of running workers share one mutex. A
//! dispatcher task reaps finished workers and starts queued ones up to the
//! configured maximum; it wakes on enqueue, on worker completion and on
//! terminate, with the poll interval as a fallback tick. At most one worker
//! runs per activity ID.

pub mod worker;

use crate::config::{AnalysisConfig, WorkerConfig};
use crate::errors::{AnalysisError, AnalysisResult};
use crate::logging::AppLogger;
use crate::models::DeferredTaskStatus;
use crate::store::AnalysisStore;
use serde::Serialize;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, Notify};
use tokio::task::JoinHandle;
use tracing::{debug, error, info};
use worker::CancellationFlag;

/// Point-in-time view of the scheduler for monitoring
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SchedulerStatus {
    pub queued: usize,
    pub running: usize,
    pub max_workers: usize,
    pub terminated: bool,
}

struct RunningWorker {
    cancel: CancellationFlag,
    handle: JoinHandle<()>,
}

impl RunningWorker {
    fn is_live(&self) -> bool {
        !self.handle.is_finished()
    }
}

#[derive(Default)]
struct SchedulerState {
    queue: VecDeque<String>,
    running: HashMap<String, RunningWorker>,
    terminated: bool,
}

impl SchedulerState {
    fn live_workers(&self) -> usize {
        self.running.values().filter(|w| w.is_live()).count()
    }
}

struct Shared {
    state: Mutex<SchedulerState>,
    /// Wakes the dispatcher
    wake: Notify,
    /// Signalled whenever a worker finishes
    completed: Notify,
    store: Arc<dyn AnalysisStore>,
    config: Arc<AnalysisConfig>,
    max_workers: usize,
    poll_interval: Duration,
}

pub struct AnalysisScheduler {
    shared: Arc<Shared>,
    dispatcher: std::sync::Mutex<Option<JoinHandle<()>>>,
}

impl AnalysisScheduler {
    /// Start the scheduler and its dispatcher task. Must be called from
    /// within a Tokio runtime.
    pub fn start(
        store: Arc<dyn AnalysisStore>,
        analysis_config: AnalysisConfig,
        worker_config: &WorkerConfig,
    ) -> Self {
        let shared = Arc::new(Shared {
            state: Mutex::new(SchedulerState::default()),
            wake: Notify::new(),
            completed: Notify::new(),
            store,
            config: Arc::new(analysis_config),
            max_workers: worker_config.max_worker_threads.max(1),
            poll_interval: worker_config.poll_interval(),
        });

        info!(
            worker.max = shared.max_workers,
            poll_interval_ms = shared.poll_interval.as_millis() as u64,
            "Analysis scheduler started"
        );

        let dispatcher = tokio::spawn(dispatch_loop(shared.clone()));
        Self {
            shared,
            dispatcher: std::sync::Mutex::new(Some(dispatcher)),
        }
    }

    /// Queue an activity for analysis. Returns `Ok(false)` when the activity
    /// is already queued or being analyzed.
    pub async fn enqueue(&self, activity_id: &str) -> AnalysisResult<bool> {
        let mut state = self.shared.state.lock().await;
        if state.terminated {
            return Err(AnalysisError::SchedulerTerminated);
        }

        let queued = state.queue.iter().any(|id| id == activity_id);
        let running = state.running.get(activity_id).is_some_and(RunningWorker::is_live);
        if queued || running {
            debug!(activity.id = %activity_id, queued, running, "Activity already scheduled");
            return Ok(false);
        }

        state.queue.push_back(activity_id.to_string());
        drop(state);

        self.shared.wake.notify_one();
        Ok(true)
    }

    pub async fn status(&self) -> SchedulerStatus {
        let state = self.shared.state.lock().await;
        SchedulerStatus {
            queued: state.queue.len(),
            running: state.live_workers(),
            max_workers: self.shared.max_workers,
            terminated: state.terminated,
        }
    }

    /// Wait until the queue is empty and no worker is running
    pub async fn wait_until_idle(&self) {
        loop {
            let completed = self.shared.completed.notified();
            let status = self.status().await;
            if status.queued == 0 && status.running == 0 {
                return;
            }
            tokio::select! {
                _ = completed => {}
                _ = tokio::time::sleep(self.shared.poll_interval) => {}
            }
        }
    }

    /// Stop accepting work, cancel every running worker and wait for all of
    /// them to stop. Queued activities are dropped.
    pub async fn terminate(&self) {
        let mut state = self.shared.state.lock().await;
        state.terminated = true;
        let dropped = state.queue.len();
        state.queue.clear();

        for worker in state.running.values() {
            worker.cancel.cancel();
        }
        info!(
            worker.count = state.running.len(),
            queue.dropped = dropped,
            "Terminating analysis scheduler"
        );

        // Workers never take the scheduler lock, so waiting here cannot deadlock
        for (activity_id, worker) in state.running.iter_mut() {
            if let Err(e) = (&mut worker.handle).await {
                error!(activity.id = %activity_id, "Worker task did not stop cleanly: {}", e);
            }
        }
        state.running.clear();
        drop(state);

        self.shared.wake.notify_one();
        let dispatcher = self.dispatcher.lock().ok().and_then(|mut handle| handle.take());
        if let Some(dispatcher) = dispatcher {
            if let Err(e) = dispatcher.await {
                error!("Dispatcher task did not stop cleanly: {}", e);
            }
        }
        info!("Analysis scheduler terminated");
    }
}

impl Drop for AnalysisScheduler {
    fn drop(&mut self) {
        if let Ok(mut dispatcher) = self.dispatcher.lock() {
            if let Some(handle) = dispatcher.take() {
                handle.abort();
            }
        }
    }
}

async fn dispatch_loop(shared: Arc<Shared>) {
    loop {
        {
            let mut state = shared.state.lock().await;
            if state.terminated {
                break;
            }

            state.running.retain(|_, worker| worker.is_live());
            while state.running.len() < shared.max_workers {
                let Some(activity_id) = state.queue.pop_front() else {
                    break;
                };
                let worker = spawn_worker(&shared, activity_id.clone());
                state.running.insert(activity_id.clone(), worker);
                AppLogger::log_worker_event(
                    &activity_id,
                    DeferredTaskStatus::Started,
                    state.running.len(),
                    state.queue.len(),
                );
            }
        }

        tokio::select! {
            _ = shared.wake.notified() => {}
            _ = tokio::time::sleep(shared.poll_interval) => {}
        }
    }
    debug!("Dispatcher loop exited");
}

fn spawn_worker(shared: &Arc<Shared>, activity_id: String) -> RunningWorker {
    let cancel = CancellationFlag::new();
    let task_cancel = cancel.clone();
    let store = shared.store.clone();
    let config = shared.config.clone();
    let shared = shared.clone();

    let handle = tokio::spawn(async move {
        if let Err(e) = worker::run_analysis(activity_id.clone(), store, config, task_cancel).await {
            debug!(activity.id = %activity_id, "Worker ended with error: {}", e);
        }
        shared.completed.notify_waiters();
        shared.wake.notify_one();
    });

    RunningWorker { cancel, handle }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryStore;

    fn worker_config(max_worker_threads: usize) -> WorkerConfig {
        WorkerConfig {
            max_worker_threads,
            poll_interval_ms: 20,
            ..WorkerConfig::default()
        }
    }

    #[tokio::test]
    async fn test_enqueue_after_terminate_is_rejected() -> anyhow::Result<()> {
        let store: Arc<dyn AnalysisStore> = Arc::new(InMemoryStore::new());
        let scheduler = AnalysisScheduler::start(store, AnalysisConfig::default(), &worker_config(2));
        scheduler.terminate().await;

        assert!(matches!(
            scheduler.enqueue("a1").await,
            Err(AnalysisError::SchedulerTerminated)
        ));
        let status = scheduler.status().await;
        assert!(status.terminated);
        assert_eq!(status.running, 0);
        Ok(())
    }

    #[tokio::test]
    async fn test_unknown_activity_drains() -> anyhow::Result<()> {
        let store: Arc<dyn AnalysisStore> = Arc::new(InMemoryStore::new());
        let scheduler = AnalysisScheduler::start(store, AnalysisConfig::default(), &worker_config(1));

        assert!(scheduler.enqueue("missing").await?);
        scheduler.wait_until_idle().await;
        let status = scheduler.status().await;
        assert_eq!((status.queued, status.running, status.max_workers), (0, 0, 1));

        scheduler.terminate().await;
        Ok(())
    }
}
