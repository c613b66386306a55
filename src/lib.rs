//! Litreview library crate (used by the binary and integration tests).
//!
//! Reviews a catalog of stylized facts against an indexed literature corpus: for
//! each fact, retrieve evidence, ask a language model for a structured judgment,
//! validate it, commit it to a crash-safe checkpoint and publish it.
//!
//! ## Pipeline
//! - [`FactCatalog`] - Facts loaded from section tables
//! - [`EvidenceRetriever`] - Semantic / hybrid search plus cross-encoder reranking
//! - [`Judge`] - Prompting, strict verdict parsing, schema retries
//! - [`CheckpointStore`] - Append-only log with snapshots and a run lock
//! - [`ResultSink`] - Durable JSON documents and tabular export
//! - [`ReviewOrchestrator`] - Per-fact state machine, run report
//!
//! ## External Boundaries
//! - [`DocumentStore`] ([`QdrantDocumentStore`])
//! - [`QueryEmbedder`] ([`OllamaEmbedder`])
//! - [`ModelBackend`] ([`GenaiBackend`])
//!
//! ## Test/Mock Support
//! Mock implementations are available behind `#[cfg(any(test, feature = "mock"))]`.

pub mod assessment;
pub mod catalog;
pub mod checkpoint;
pub mod config;
pub mod constants;
pub mod embedding;
pub mod judge;
pub mod retrieval;
pub mod retry;
pub mod review;
pub mod sink;
pub mod store;
pub mod text;

pub use assessment::{Assessment, Confidence, SupportLevel, ValidationError};
pub use catalog::{CatalogLoadError, Fact, FactCatalog, SampleStrategy};
pub use checkpoint::{CheckpointError, CheckpointRecord, CheckpointStore};
pub use config::{ConfigError, ReviewConfig};
pub use constants::{DimValidationError, validate_embedding_dim};
pub use embedding::{
    EmbeddingError, OllamaEmbedder, QueryEmbedder, Reranker, RerankerConfig, RerankerError,
};
pub use judge::{
    Assessor, BackendError, GenaiBackend, Judge, JudgeConfig, JudgeError, ModelBackend,
    SchemaViolation, Verdict,
};
pub use retrieval::{
    EvidencePassage, EvidenceRetriever, EvidenceSource, RetrievalConfig, RetrievalError,
};
pub use retry::{RetryPolicy, Retryable};
pub use review::{
    FactFailure, FactState, FailureKind, ReviewError, ReviewOptions, ReviewOrchestrator,
    RunReport, RunState,
};
pub use sink::{
    AssessmentDocument, Destination, FileAssessmentStore, ResultSink, SinkError, TabularExport,
};
pub use store::{DocumentStore, QdrantDocumentStore, ScoredChunk, StoreError};

#[cfg(any(test, feature = "mock"))]
pub use embedding::MockEmbedder;
#[cfg(any(test, feature = "mock"))]
pub use judge::MockModelBackend;
#[cfg(any(test, feature = "mock"))]
pub use sink::MockDestination;
#[cfg(any(test, feature = "mock"))]
pub use store::MockDocumentStore;
