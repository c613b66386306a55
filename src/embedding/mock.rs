use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};

use parking_lot::Mutex;

use super::{EmbeddingError, QueryEmbedder};

/// Deterministic in-process embedder for tests.
///
/// Vectors are derived from a blake3 hash of the text unless pinned with
/// [`with_vector`](Self::with_vector). Failures can be queued with
/// [`fail_next`](Self::fail_next).
#[derive(Debug)]
pub struct MockEmbedder {
    dimension: usize,
    pinned: Mutex<HashMap<String, Vec<f32>>>,
    queued_failures: Mutex<Vec<EmbeddingError>>,
    calls: AtomicU32,
}

impl MockEmbedder {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            pinned: Mutex::new(HashMap::new()),
            queued_failures: Mutex::new(Vec::new()),
            calls: AtomicU32::new(0),
        }
    }

    pub fn with_vector(self, text: &str, vector: Vec<f32>) -> Self {
        self.pinned.lock().insert(text.to_string(), vector);
        self
    }

    /// The next call fails with `err`. Queued failures are returned in order.
    pub fn fail_next(&self, err: EmbeddingError) {
        self.queued_failures.lock().push(err);
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    fn hashed_vector(&self, text: &str) -> Vec<f32> {
        let mut hasher = blake3::Hasher::new();
        hasher.update(text.as_bytes());
        let mut reader = hasher.finalize_xof();

        let mut buf = [0u8; 4];
        let mut vector = Vec::with_capacity(self.dimension);
        for _ in 0..self.dimension {
            reader.fill(&mut buf);
            let unit = u32::from_le_bytes(buf) as f32 / u32::MAX as f32;
            vector.push(unit * 2.0 - 1.0);
        }
        vector
    }
}

impl QueryEmbedder for MockEmbedder {
    async fn embed_query(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        {
            let mut failures = self.queued_failures.lock();
            if !failures.is_empty() {
                return Err(failures.remove(0));
            }
        }

        if let Some(vector) = self.pinned.lock().get(text) {
            return Ok(vector.clone());
        }
        Ok(self.hashed_vector(text))
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}
