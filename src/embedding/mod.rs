//! Query embedding and cross-encoder reranking.
//!
//! - [`QueryEmbedder`] turns fact text into the vector space of the document index.
//! - [`reranker`] re-scores retrieved passages against the fact.

mod error;
#[cfg(any(test, feature = "mock"))]
mod mock;
mod ollama;
/// Cross-encoder reranker.
pub mod reranker;

#[cfg(test)]
mod tests;

pub use error::EmbeddingError;
#[cfg(any(test, feature = "mock"))]
pub use mock::MockEmbedder;
pub use ollama::OllamaEmbedder;
pub use reranker::{Reranker, RerankerConfig, RerankerError};

use std::future::Future;

/// Produces query vectors compatible with the document index.
pub trait QueryEmbedder: Send + Sync {
    fn embed_query(
        &self,
        text: &str,
    ) -> impl Future<Output = Result<Vec<f32>, EmbeddingError>> + Send;

    /// Dimension every returned vector has.
    fn dimension(&self) -> usize;
}
