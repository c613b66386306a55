//! Evidence retrieval: semantic search, optional lexical fusion, optional reranking.
//!
//! ```text
//! fact ─► embed ─► semantic_search ─┐
//!    └──────────► lexical_search  ──┴► min-max + weighted sum ─► cross-encoder ─► top_k
//! ```
//!
//! Both searches run concurrently. Every store and embedding call is bounded by a
//! timeout and retried under the configured [`RetryPolicy`].

pub mod error;
pub mod fusion;

#[cfg(test)]
mod tests;

pub use error::RetrievalError;

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::catalog::Fact;
use crate::constants::{
    DEFAULT_LEXICAL_WEIGHT, DEFAULT_RERANK_CANDIDATES, DEFAULT_RETRIEVAL_ATTEMPTS,
    DEFAULT_SEMANTIC_WEIGHT,
};
use crate::embedding::{EmbeddingError, QueryEmbedder, Reranker, RerankerError};
use crate::retry::RetryPolicy;
use crate::store::{DocumentStore, ScoredChunk, StoreError, sort_by_score};

/// A ranked excerpt handed to the judge. Owned by one retrieval call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvidencePassage {
    pub source_document_id: String,
    pub passage_text: String,
    pub relevance_score: f32,
    /// 1-based position in the result.
    pub rank: u32,
    pub chunk_id: String,
}

#[derive(Debug, Clone)]
pub struct RetrievalConfig {
    pub semantic_weight: f32,
    pub lexical_weight: f32,
    /// Hits fetched per search, and passages re-scored by the cross-encoder.
    pub rerank_candidates: usize,
    /// Deadline for a single store or embedding call.
    pub call_timeout: Duration,
    pub retry: RetryPolicy,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            semantic_weight: DEFAULT_SEMANTIC_WEIGHT,
            lexical_weight: DEFAULT_LEXICAL_WEIGHT,
            rerank_candidates: DEFAULT_RERANK_CANDIDATES,
            call_timeout: Duration::from_secs(30),
            retry: RetryPolicy {
                max_attempts: DEFAULT_RETRIEVAL_ATTEMPTS,
                ..RetryPolicy::default()
            },
        }
    }
}

/// Anything that can produce ranked evidence for a fact.
pub trait EvidenceSource: Send + Sync {
    fn retrieve(
        &self,
        fact: &Fact,
        top_k: usize,
        use_hybrid: bool,
        use_rerank: bool,
    ) -> impl Future<Output = Result<Vec<EvidencePassage>, RetrievalError>> + Send;
}

pub struct EvidenceRetriever<S, E> {
    store: S,
    embedder: E,
    reranker: Arc<Reranker>,
    config: RetrievalConfig,
}

impl<S, E> EvidenceRetriever<S, E>
where
    S: DocumentStore,
    E: QueryEmbedder,
{
    pub fn new(store: S, embedder: E, reranker: Reranker, config: RetrievalConfig) -> Self {
        Self {
            store,
            embedder,
            reranker: Arc::new(reranker),
            config,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn embedder(&self) -> &E {
        &self.embedder
    }

    pub fn config(&self) -> &RetrievalConfig {
        &self.config
    }

    /// Returns at most `top_k` passages, best first, ranked from 1.
    ///
    /// `Ok(vec![])` means the store answered and nothing matched.
    #[instrument(
        skip_all,
        fields(fact_id = fact.id, top_k = top_k, hybrid = use_hybrid, rerank = use_rerank)
    )]
    pub async fn retrieve(
        &self,
        fact: &Fact,
        top_k: usize,
        use_hybrid: bool,
        use_rerank: bool,
    ) -> Result<Vec<EvidencePassage>, RetrievalError> {
        if top_k == 0 {
            return Ok(Vec::new());
        }

        let fetch = if use_hybrid || use_rerank {
            self.config.rerank_candidates.max(top_k)
        } else {
            top_k
        };

        let mut candidates = if use_hybrid {
            let (semantic, lexical) = tokio::join!(
                self.semantic(&fact.text, fetch),
                self.lexical(&fact.text, fetch)
            );
            fusion::fuse_weighted(
                semantic?,
                lexical?,
                self.config.semantic_weight,
                self.config.lexical_weight,
            )
        } else {
            self.semantic(&fact.text, fetch).await?
        };

        if use_rerank && !candidates.is_empty() {
            candidates.truncate(self.config.rerank_candidates.max(top_k));
            candidates = self.rerank(&fact.text, candidates).await?;
        }

        sort_by_score(&mut candidates);
        candidates.truncate(top_k);

        let passages: Vec<EvidencePassage> = candidates
            .into_iter()
            .enumerate()
            .map(|(i, chunk)| EvidencePassage {
                source_document_id: chunk.doc_id,
                passage_text: chunk.text,
                relevance_score: chunk.score,
                rank: i as u32 + 1,
                chunk_id: chunk.chunk_id,
            })
            .collect();

        debug!(
            passages = passages.len(),
            top_score = passages.first().map(|p| p.relevance_score),
            "Retrieved evidence"
        );
        Ok(passages)
    }

    async fn semantic(
        &self,
        text: &str,
        limit: usize,
    ) -> Result<Vec<ScoredChunk>, RetrievalError> {
        let timeout = self.config.call_timeout;

        let vector = self
            .config
            .retry
            .run("embed_query", |_| async move {
                tokio::time::timeout(timeout, self.embedder.embed_query(text))
                    .await
                    .unwrap_or(Err(EmbeddingError::Timeout {
                        timeout_ms: timeout.as_millis() as u64,
                    }))
            })
            .await?;

        let chunks = self
            .config
            .retry
            .run("semantic_search", |_| {
                let vector = vector.clone();
                async move {
                    tokio::time::timeout(timeout, self.store.semantic_search(vector, limit))
                        .await
                        .unwrap_or(Err(StoreError::Timeout {
                            timeout_ms: timeout.as_millis() as u64,
                        }))
                }
            })
            .await?;

        Ok(chunks)
    }

    async fn lexical(
        &self,
        text: &str,
        limit: usize,
    ) -> Result<Vec<ScoredChunk>, RetrievalError> {
        let timeout = self.config.call_timeout;

        let chunks = self
            .config
            .retry
            .run("lexical_search", |_| async move {
                tokio::time::timeout(timeout, self.store.lexical_search(text, limit))
                    .await
                    .unwrap_or(Err(StoreError::Timeout {
                        timeout_ms: timeout.as_millis() as u64,
                    }))
            })
            .await?;

        Ok(chunks)
    }

    /// Replaces candidate scores with cross-encoder scores. Runs on the blocking pool.
    async fn rerank(
        &self,
        query: &str,
        candidates: Vec<ScoredChunk>,
    ) -> Result<Vec<ScoredChunk>, RetrievalError> {
        let reranker = Arc::clone(&self.reranker);
        let query = query.to_string();
        let texts: Vec<String> = candidates.iter().map(|c| c.text.clone()).collect();

        let ranked = tokio::task::spawn_blocking(move || {
            let refs: Vec<&str> = texts.iter().map(String::as_str).collect();
            reranker.rerank(&query, &refs)
        })
        .await
        .map_err(|e| RerankerError::InferenceFailed {
            reason: e.to_string(),
        })??;

        let mut slots: Vec<Option<ScoredChunk>> = candidates.into_iter().map(Some).collect();
        let reranked: Vec<ScoredChunk> = ranked
            .into_iter()
            .filter_map(|(idx, score)| {
                let mut chunk = slots.get_mut(idx)?.take()?;
                chunk.score = score;
                Some(chunk)
            })
            .collect();

        Ok(reranked)
    }
}

impl<S, E> EvidenceSource for EvidenceRetriever<S, E>
where
    S: DocumentStore,
    E: QueryEmbedder,
{
    async fn retrieve(
        &self,
        fact: &Fact,
        top_k: usize,
        use_hybrid: bool,
        use_rerank: bool,
    ) -> Result<Vec<EvidencePassage>, RetrievalError> {
        EvidenceRetriever::retrieve(self, fact, top_k, use_hybrid, use_rerank).await
    }
}
