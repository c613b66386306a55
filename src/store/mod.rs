//! Read-only access to the indexed document corpus.
//!
//! The corpus is chunked, embedded and indexed by an upstream job; this module only
//! searches it. [`QdrantDocumentStore`] is the production implementation.

pub mod error;
#[cfg(any(test, feature = "mock"))]
mod mock;
mod qdrant;


pub use error::StoreError;
#[cfg(any(test, feature = "mock"))]
pub use mock::MockDocumentStore;
pub use qdrant::QdrantDocumentStore;

use std::future::Future;

/// A corpus chunk returned by a search, with a store-specific score (higher is better).
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredChunk {
    /// Store-local chunk identifier, unique across the corpus.
    pub chunk_id: String,
    /// Citable identifier of the source document (its file name when known).
    pub doc_id: String,
    pub text: String,
    pub score: f32,
}

/// Search interface over the document corpus.
pub trait DocumentStore: Send + Sync {
    /// Nearest chunks to `vector`, best first.
    fn semantic_search(
        &self,
        vector: Vec<f32>,
        limit: usize,
    ) -> impl Future<Output = Result<Vec<ScoredChunk>, StoreError>> + Send;

    /// Chunks sharing terms with `query`, best first.
    fn lexical_search(
        &self,
        query: &str,
        limit: usize,
    ) -> impl Future<Output = Result<Vec<ScoredChunk>, StoreError>> + Send;
}

/// Sorts chunks best first, breaking score ties by chunk id so results are stable.
pub(crate) fn sort_by_score(chunks: &mut [ScoredChunk]) {
    chunks.sort_by(|a, b| {
        b.score
            .total_cmp(&a.score)
            .then_with(|| a.chunk_id.cmp(&b.chunk_id))
    });
}
