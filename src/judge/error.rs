use thiserror::Error;

use crate::retry::Retryable;

/// Transport-level failure talking to the generative model.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BackendError {
    #[error("model '{model}' unavailable: {reason}")]
    Unavailable { model: String, reason: String },

    #[error("model call timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },
}

#[derive(Debug, Clone, Error)]
pub enum JudgeError {
    /// The backend could not be reached or did not answer in time.
    #[error("model unavailable: {0}")]
    ModelUnavailable(#[from] BackendError),

    /// The model kept answering with output that does not fit the verdict schema.
    #[error("model output violates the verdict schema: {reason}")]
    Schema { raw: String, reason: String },
}

impl Retryable for JudgeError {
    fn is_retryable(&self) -> bool {
        matches!(self, JudgeError::ModelUnavailable(_))
    }
}
