use thiserror::Error;

use crate::constants::DimValidationError;
use crate::retry::Retryable;

/// Errors from turning a fact into a query vector.
#[derive(Debug, Error)]
pub enum EmbeddingError {
    #[error("embedding service unreachable at {url}: {reason}")]
    Unreachable { url: String, reason: String },

    #[error("embedding request timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    #[error("embedding service returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("malformed embedding response: {reason}")]
    BadResponse { reason: String },

    #[error(transparent)]
    Dimension(#[from] DimValidationError),
}

impl Retryable for EmbeddingError {
    fn is_retryable(&self) -> bool {
        match self {
            EmbeddingError::Unreachable { .. } | EmbeddingError::Timeout { .. } => true,
            EmbeddingError::Status { status, .. } => *status >= 500 || *status == 429,
            _ => false,
        }
    }
}
