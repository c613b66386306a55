use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use parking_lot::{Mutex, RwLock};

use super::{DocumentStore, ScoredChunk, StoreError, sort_by_score};
use crate::text::{content_terms, term_recall};

/// In-memory document store for tests.
///
/// Chunks either carry a vector (scored by cosine similarity) or fixed per-search
/// scores. Failures queued with [`fail_next`](Self::fail_next) are returned by the
/// next calls of either search, in order.
#[derive(Default)]
pub struct MockDocumentStore {
    chunks: RwLock<Vec<MockChunk>>,
    failures: Mutex<VecDeque<StoreError>>,
    delay: Mutex<Option<Duration>>,
    semantic_calls: AtomicU32,
    lexical_calls: AtomicU32,
}

#[derive(Clone)]
struct MockChunk {
    chunk_id: String,
    doc_id: String,
    text: String,
    vector: Option<Vec<f32>>,
    semantic_score: Option<f32>,
    lexical_score: Option<f32>,
}

impl MockChunk {
    fn scored(&self, score: f32) -> ScoredChunk {
        ScoredChunk {
            chunk_id: self.chunk_id.clone(),
            doc_id: self.doc_id.clone(),
            text: self.text.clone(),
            score,
        }
    }
}

impl MockDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a chunk scored by cosine similarity against the query vector.
    pub fn insert(&self, chunk_id: &str, doc_id: &str, text: &str, vector: Vec<f32>) {
        self.chunks.write().push(MockChunk {
            chunk_id: chunk_id.to_string(),
            doc_id: doc_id.to_string(),
            text: text.to_string(),
            vector: Some(vector),
            semantic_score: None,
            lexical_score: None,
        });
    }

    /// Adds a chunk with fixed scores; `None` leaves it out of that search.
    pub fn insert_scored(
        &self,
        chunk_id: &str,
        doc_id: &str,
        text: &str,
        semantic_score: Option<f32>,
        lexical_score: Option<f32>,
    ) {
        self.chunks.write().push(MockChunk {
            chunk_id: chunk_id.to_string(),
            doc_id: doc_id.to_string(),
            text: text.to_string(),
            vector: None,
            semantic_score,
            lexical_score,
        });
    }

    pub fn fail_next(&self, err: StoreError) {
        self.failures.lock().push_back(err);
    }

    /// Every search sleeps this long before answering.
    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock() = Some(delay);
    }

    pub fn len(&self) -> usize {
        self.chunks.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.read().is_empty()
    }

    pub fn semantic_calls(&self) -> u32 {
        self.semantic_calls.load(Ordering::SeqCst)
    }

    pub fn lexical_calls(&self) -> u32 {
        self.lexical_calls.load(Ordering::SeqCst)
    }

    async fn before_call(&self) -> Result<(), StoreError> {
        let delay = *self.delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        match self.failures.lock().pop_front() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

impl DocumentStore for MockDocumentStore {
    async fn semantic_search(
        &self,
        vector: Vec<f32>,
        limit: usize,
    ) -> Result<Vec<ScoredChunk>, StoreError> {
        self.semantic_calls.fetch_add(1, Ordering::SeqCst);
        self.before_call().await?;

        let mut results: Vec<ScoredChunk> = self
            .chunks
            .read()
            .iter()
            .filter_map(|c| {
                let score = match (&c.vector, c.semantic_score) {
                    (_, Some(fixed)) => fixed,
                    (Some(v), None) => cosine_similarity(&vector, v),
                    (None, None) => return None,
                };
                Some(c.scored(score))
            })
            .collect();

        sort_by_score(&mut results);
        results.truncate(limit);
        Ok(results)
    }

    async fn lexical_search(
        &self,
        query: &str,
        limit: usize,
    ) -> Result<Vec<ScoredChunk>, StoreError> {
        self.lexical_calls.fetch_add(1, Ordering::SeqCst);
        self.before_call().await?;

        let query_terms = content_terms(query);
        let mut results: Vec<ScoredChunk> = self
            .chunks
            .read()
            .iter()
            .filter_map(|c| {
                let score = match (&c.vector, c.lexical_score) {
                    (_, Some(fixed)) => fixed,
                    (Some(_), None) => term_recall(&query_terms, &c.text),
                    (None, None) => return None,
                };
                (score > 0.0).then(|| c.scored(score))
            })
            .collect();

        sort_by_score(&mut results);
        results.truncate(limit);
        Ok(results)
    }
}

pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let dot_product: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        dot_product / (norm_a * norm_b)
    }
}
