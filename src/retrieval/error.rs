use thiserror::Error;

use crate::embedding::{EmbeddingError, RerankerError};
use crate::store::StoreError;

/// Retrieval failed after retries. Distinct from an empty (but successful) result.
#[derive(Debug, Error)]
pub enum RetrievalError {
    #[error("query embedding failed: {0}")]
    Embedding(#[from] EmbeddingError),

    #[error("document search failed: {0}")]
    Store(#[from] StoreError),

    #[error("reranking failed: {0}")]
    Rerank(#[from] RerankerError),
}
