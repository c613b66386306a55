//! Cross-cutting, shared constants.
//!
//! # Embedding Dimension
//!
//! The document index is built with `nomic-embed-text` (768 dims). Query vectors must
//! come from the same model, so the embedder validates every response against
//! [`DEFAULT_EMBEDDING_DIM`] via [`validate_embedding_dim`].

pub const DEFAULT_EMBEDDING_DIM: usize = 768;

/// Lowest score an assessment may carry.
pub const MIN_SCORE: u8 = 1;
/// Highest score an assessment may carry.
pub const MAX_SCORE: u8 = 100;

pub const DEFAULT_TOP_K: usize = 20;
pub const DEFAULT_RERANK_CANDIDATES: usize = 100;

pub const DEFAULT_SEMANTIC_WEIGHT: f32 = 0.7;
pub const DEFAULT_LEXICAL_WEIGHT: f32 = 0.3;

/// Total characters of evidence excerpts placed in one prompt.
pub const DEFAULT_MAX_CONTEXT_CHARS: usize = 24_000;
/// Characters kept from a single passage.
pub const DEFAULT_MAX_PASSAGE_CHARS: usize = 1_500;

pub const DEFAULT_RETRIEVAL_ATTEMPTS: u32 = 3;
pub const DEFAULT_BACKEND_ATTEMPTS: u32 = 5;
pub const DEFAULT_SCHEMA_RETRIES: u32 = 2;

/// Checkpoint commits between snapshots.
pub const DEFAULT_SNAPSHOT_INTERVAL: u32 = 50;

/// Sections in the complete catalog.
pub const EXPECTED_SECTIONS: usize = 12;
pub const DEFAULT_TEST_SAMPLE_SIZE: usize = EXPECTED_SECTIONS;

/// A query vector that cannot be compared against the index.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DimValidationError {
    #[error("embedding dimension cannot be zero")]
    ZeroDimension,

    #[error("dimension mismatch: index has {expected}, query has {actual}")]
    DimensionMismatch { expected: usize, actual: usize },
}

/// Validates that a runtime embedding dimension matches the expected dimension.
///
/// A query vector from a different model than the one that built the index would
/// search silently and return garbage, so mismatches are rejected up front.
///
/// # Example
///
/// ```
/// use litreview::constants::{validate_embedding_dim, DEFAULT_EMBEDDING_DIM};
///
/// validate_embedding_dim(768, DEFAULT_EMBEDDING_DIM).unwrap();
/// ```
pub fn validate_embedding_dim(actual: usize, expected: usize) -> Result<(), DimValidationError> {
    if actual == 0 {
        return Err(DimValidationError::ZeroDimension);
    }
    if actual != expected {
        return Err(DimValidationError::DimensionMismatch { expected, actual });
    }
    Ok(())
}
