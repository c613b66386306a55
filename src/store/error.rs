use thiserror::Error;

use crate::retry::Retryable;

/// Errors returned by document store operations.
#[derive(Debug, Clone, Error)]
pub enum StoreError {
    /// Could not reach the store endpoint.
    #[error("failed to connect to document store at '{url}': {message}")]
    ConnectionFailed { url: String, message: String },

    /// The call did not complete within its deadline.
    #[error("document store call timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    /// The collection is missing or holds no chunks.
    #[error("collection '{collection}' is empty or missing")]
    EmptyIndex { collection: String },

    /// The store rejected or failed the query.
    #[error("search in '{collection}' failed: {message}")]
    SearchFailed { collection: String, message: String },
}

impl Retryable for StoreError {
    fn is_retryable(&self) -> bool {
        matches!(
            self,
            StoreError::ConnectionFailed { .. } | StoreError::Timeout { .. }
        )
    }
}
