//! Worker error types.

use thiserror::Error;

pub type WorkerResult<T> = Result<T, WorkerError>;

#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("Run failed: {0}")]
    RunFailed(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Step `{0}` timed out")]
    StepTimeout(String),

    #[error("Another run is in flight for this video and job kind")]
    GuardHeld,

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Storage error: {0}")]
    Storage(#[from] vido_storage::StorageError),

    #[error("Firestore error: {0}")]
    Firestore(#[from] vido_firestore::FirestoreError),

    #[error("Generation error: {0}")]
    Ai(#[from] vido_ai::AiError),

    #[error("Queue error: {0}")]
    Queue(#[from] vido_queue::QueueError),

    #[error("Transcript fetch failed: {0}")]
    Transcript(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl WorkerError {
    pub fn run_failed(msg: impl Into<String>) -> Self {
        Self::RunFailed(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::ConfigError(msg.into())
    }

    /// Whether redelivering the run could succeed. Missing rows, bad
    /// configuration and fenced-out runs never get better on retry.
    pub fn is_retryable(&self) -> bool {
        match self {
            WorkerError::Storage(_)
            | WorkerError::Firestore(_)
            | WorkerError::Queue(_)
            | WorkerError::Transcript(_)
            | WorkerError::StepTimeout(_)
            | WorkerError::RunFailed(_) => true,
            WorkerError::Ai(e) => e.is_retryable(),
            WorkerError::NotFound(_)
            | WorkerError::GuardHeld
            | WorkerError::ConfigError(_)
            | WorkerError::Json(_) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryability() {
        assert!(WorkerError::StepTimeout("upload-thumbnail".into()).is_retryable());
        assert!(WorkerError::run_failed("flaky").is_retryable());
        assert!(!WorkerError::not_found("video vid_1").is_retryable());
        assert!(!WorkerError::GuardHeld.is_retryable());
    }
}
