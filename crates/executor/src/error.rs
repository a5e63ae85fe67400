//! Executor error types.

use thiserror::Error;

/// Errors raised while constructing an [`Executor`](crate::Executor).
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("concurrency limit must be a positive integer, got {0}")]
    InvalidConcurrency(usize),

    #[error("capacity probe reported no available processing units")]
    NoCapacity,

    #[error("executor must be created from within a tokio runtime")]
    NoRuntime,

    #[error("invalid value for {key}: {value:?}")]
    InvalidEnv { key: String, value: String },
}

/// Failure delivered through a single task's handle.
///
/// `Failed` carries exactly the error the work function produced.
#[derive(Debug, Error)]
pub enum TaskError<E> {
    #[error("task failed: {0}")]
    Failed(E),

    #[error("task panicked: {0}")]
    Panicked(String),

    #[error("task was cancelled before it started")]
    Cancelled,
}

impl<E> TaskError<E> {
    /// Returns the work function's own error, if that is what this is.
    pub fn into_failure(self) -> Option<E> {
        match self {
            TaskError::Failed(e) => Some(e),
            _ => None,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, TaskError::Cancelled)
    }

    pub fn is_panic(&self) -> bool {
        matches!(self, TaskError::Panicked(_))
    }
}
