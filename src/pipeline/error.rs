//! Pipeline-specific error types.

use crate::types::StageKind;
use thiserror::Error;

/// Errors that can occur within the pipeline system.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Invalid pipeline configuration: {0}")]
    InvalidConfig(String),

    #[error("Queue '{0}' disconnected before end-of-stream")]
    QueueDisconnected(&'static str),

    #[error("Queue '{0}' read after end-of-stream")]
    AfterEndOfStream(&'static str),

    #[error("Timed out waiting on queue '{0}'")]
    Timeout(&'static str),

    #[error("Stage {0} panicked")]
    StagePanicked(StageKind),

    #[error("Failed to spawn stage thread: {0}")]
    Spawn(#[from] std::io::Error),

    #[error("Pipeline is missing its {0}")]
    MissingComponent(&'static str),
}

pub type PipelineResult<T> = std::result::Result<T, PipelineError>;
