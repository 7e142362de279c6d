// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! # Activity Analysis Worker
//!
//! Loads serialized activities from disk into an in-memory store, runs them
//! through the analysis scheduler and prints each summary as JSON.

use anyhow::{Context, Result};
use clap::Parser;
use pierre_activity_analysis::{
    config::{AnalysisConfig, WorkerConfig},
    logging,
    models::parse_activity_payload,
    scheduler::AnalysisScheduler,
    store::{AnalysisStore, InMemoryStore},
};
use serde_json::json;
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(name = "activity-analysis-worker")]
#[command(author, version, about = "Analyze recorded activities with a bounded worker pool", long_about = None)]
struct Args {
    /// Activity JSON files to analyze
    #[arg(required = true)]
    files: Vec<PathBuf>,

    /// Analysis configuration file (TOML)
    #[arg(short, long)]
    config: Option<String>,

    /// Override MAX_WORKER_THREADS
    #[arg(short = 'w', long)]
    max_workers: Option<usize>,
}

#[tokio::main]
async fn main() -> Result<()> {
    logging::init_from_env()?;

    let args = Args::parse();

    let mut worker_config = WorkerConfig::from_env()?;
    if let Some(max_workers) = args.max_workers {
        worker_config.max_worker_threads = max_workers;
    }
    worker_config.validate()?;
    info!("{}", worker_config.summary());

    let config_path = args.config.or_else(|| worker_config.analysis_config_path.clone());
    let analysis_config = AnalysisConfig::load(config_path)?;

    let store = Arc::new(InMemoryStore::new());
    let mut activity_ids = Vec::with_capacity(args.files.len());
    for path in &args.files {
        let payload = fs::read_to_string(path)
            .with_context(|| format!("Failed to read activity file: {}", path.display()))?;
        let mut activity = parse_activity_payload(&payload, &analysis_config)
            .with_context(|| format!("Failed to decode activity file: {}", path.display()))?;

        if activity.id.is_none() {
            activity.id = path.file_stem().map(|stem| stem.to_string_lossy().into_owned());
        }
        match store.insert_activity(activity).await {
            Some(id) => activity_ids.push(id),
            None => warn!("Skipping {}: activity has no ID", path.display()),
        }
    }

    let shared: Arc<dyn AnalysisStore> = store.clone();
    let scheduler = AnalysisScheduler::start(shared, analysis_config, &worker_config);
    for activity_id in &activity_ids {
        if !scheduler.enqueue(activity_id).await? {
            warn!(activity.id = %activity_id, "Duplicate activity ID; analyzed once");
        }
    }

    scheduler.wait_until_idle().await;

    for activity_id in &activity_ids {
        let output = json!({
            "activity_id": activity_id,
            "summary": store.summary(activity_id).await.map(|summary| summary.to_json()),
            "task_history": store.task_history(activity_id).await,
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
    }

    scheduler.terminate().await;
    Ok(())
}
