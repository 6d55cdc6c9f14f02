//! Generation provider error types.

use thiserror::Error;

pub type AiResult<T> = Result<T, AiError>;

#[derive(Debug, Error)]
pub enum AiError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Provider returned {0}: {1}")]
    Api(u16, String),

    #[error("Provider returned an empty result: {0}")]
    Empty(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl AiError {
    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn empty(msg: impl Into<String>) -> Self {
        Self::Empty(msg.into())
    }

    /// Generation and fetch failures are worth a bounded retry; config
    /// problems are not.
    pub fn is_retryable(&self) -> bool {
        match self {
            AiError::Network(_) => true,
            AiError::Api(status, _) => *status == 429 || *status >= 500,
            AiError::Empty(_) => true,
            AiError::Config(_) | AiError::Json(_) => false,
        }
    }
}
