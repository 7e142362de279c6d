// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Error types for the analysis pipeline and scheduler

use crate::models::SensorType;
use thiserror::Error;

/// Errors raised while analyzing an activity or scheduling analysis work
#[derive(Debug, Error)]
pub enum AnalysisError {
    /// A single reading could not be interpreted
    #[error("Malformed sample: {0}")]
    MalformedSample(String),

    /// The activity lacks data a pipeline step needs (ID, user ID, start time)
    #[error("Missing precondition: {0}")]
    MissingPrecondition(String),

    /// Analysis of one sensor stream failed
    #[error("Analysis of {sensor} data failed: {reason}")]
    SensorFailure { sensor: SensorType, reason: String },

    /// The worker's cancellation flag was observed at a checkpoint
    #[error("Analysis cancelled")]
    Cancelled,

    /// The scheduler no longer accepts work
    #[error("Scheduler has been terminated")]
    SchedulerTerminated,

    /// A storage collaborator call failed
    #[error("Store error: {0}")]
    Store(#[from] anyhow::Error),

    /// A serialized activity payload could not be decoded
    #[error("Invalid activity payload: {0}")]
    Payload(#[from] serde_json::Error),

    /// The blocking analysis task panicked or was aborted
    #[error("Analysis worker panicked: {0}")]
    WorkerPanicked(String),
}

impl AnalysisError {
    /// Whether the error is a cooperative cancellation rather than a failure
    pub fn is_cancellation(&self) -> bool {
        matches!(self, AnalysisError::Cancelled)
    }
}

pub type AnalysisResult<T> = Result<T, AnalysisError>;
