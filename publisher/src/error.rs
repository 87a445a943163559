// ABOUTME: Typed error handling for the publishing pipeline
// ABOUTME: One taxonomy across handshake, signing, media, relay, and checkpoint failures

use crate::connection::ConnectionError;
use exodus_core::{CheckpointError, MediaError, SignError, TaskError};
use thiserror::Error;

/// Errors that can occur while driving a task through the pipeline.
#[derive(Debug, Error)]
pub enum PublishError {
    /// Remote-signing session could not be established or was torn down
    #[error("connection error: {0}")]
    Connection(#[from] ConnectionError),

    /// Signing failed after the gate exhausted its retries
    #[error("signing failed: {0}")]
    Signing(#[from] SignError),

    /// Media fetch or upload failed
    #[error("media error: {0}")]
    Media(#[from] MediaError),

    /// Zero relays accepted the event
    #[error("publish rejected by all relays: {0}")]
    QuorumFailed(String),

    /// Durable checkpoint write failed
    #[error("checkpoint error: {0}")]
    Checkpoint(#[from] CheckpointError),

    /// Task state machine violation
    #[error("task error: {0}")]
    Task(#[from] TaskError),
}

/// Result type for publisher operations.
pub type PublisherResult<T> = Result<T, PublishError>;
