// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! # Pierre Activity Analysis
//!
//! Post-upload analysis pipeline for recorded fitness activities. A bounded
//! pool of background workers takes activity IDs from a queue, derives
//! distance records, splits, speed graphs, interval efforts and sensor
//! statistics, and writes the results back through storage traits.
//!
//! ## Features
//!
//! - **Location analysis**: distance, ascent, km/mile splits, best efforts over
//!   standard race distances and a sliding-window current speed graph
//! - **Interval detection**: peak finding plus 1-D clustering over the speed graph
//! - **Sensor statistics**: heart rate, cadence, power (normalized power and
//!   best average power) and accelerometer streams behind one trait
//! - **Change detection**: SHA-512 content hash of the activity samples
//! - **Bounded scheduling**: deduplicated FIFO queue, configurable worker cap,
//!   cooperative cancellation on terminate
//!
//! ## Architecture
//!
//! - **Models**: activities, samples, summaries and payload decoding
//! - **Analysis**: streaming analyzers and the per-activity pipeline
//! - **Store**: async storage collaborators and an in-memory implementation
//! - **Scheduler**: queue, dispatcher and worker tasks
//! - **Config**: analysis tunables (TOML) and worker settings (environment)
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use pierre_activity_analysis::config::{AnalysisConfig, WorkerConfig};
//! use pierre_activity_analysis::models::{Activity, ActivityType};
//! use pierre_activity_analysis::scheduler::AnalysisScheduler;
//! use pierre_activity_analysis::store::{AnalysisStore, InMemoryStore};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let store = Arc::new(InMemoryStore::new());
//!     store
//!         .insert_activity(Activity::new("a1", "u1", ActivityType::Running))
//!         .await;
//!
//!     let shared: Arc<dyn AnalysisStore> = store.clone();
//!     let scheduler = AnalysisScheduler::start(
//!         shared,
//!         AnalysisConfig::load(None)?,
//!         &WorkerConfig::from_env()?,
//!     );
//!     scheduler.enqueue("a1").await?;
//!     scheduler.wait_until_idle().await;
//!
//!     println!("{:?}", store.summary("a1").await);
//!     scheduler.terminate().await;
//!     Ok(())
//! }
//! ```

/// Common data models for activities and analysis output
pub mod models;

/// Configuration management
pub mod config;

/// Application constants and result key names
pub mod constants;

/// Error types for analysis and scheduling
pub mod errors;

/// Structured logging configuration
pub mod logging;

/// Streaming analyzers and the per-activity pipeline
pub mod analysis;

/// Storage collaborators
pub mod store;

/// Bounded background analysis scheduler
pub mod scheduler;
