use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use super::Destination;
use super::error::{SinkError, SinkResult};
use crate::assessment::Assessment;
use crate::catalog::Fact;

/// In-memory destination that can be told to fail for specific facts.
///
/// Clones share state, so a test can keep one handle after moving another into a
/// [`ResultSink`](super::ResultSink).
#[derive(Debug, Clone, Default)]
pub struct MockDestination {
    written: Arc<Mutex<Vec<(u32, u8)>>>,
    failing: Arc<Mutex<HashSet<u32>>>,
}

impl MockDestination {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every write for `fact_id` fail until [`recover`](Self::recover) is called.
    pub fn fail_for(&self, fact_id: u32) {
        self.failing.lock().insert(fact_id);
    }

    pub fn recover(&self, fact_id: u32) {
        self.failing.lock().remove(&fact_id);
    }

    /// `(fact_id, score)` of every successful write, in order.
    pub fn written(&self) -> Vec<(u32, u8)> {
        self.written.lock().clone()
    }

    pub fn written_ids(&self) -> Vec<u32> {
        self.written.lock().iter().map(|(id, _)| *id).collect()
    }
}

impl Destination for MockDestination {
    fn name(&self) -> &'static str {
        "mock"
    }

    fn write(
        &self,
        fact: &Fact,
        assessment: &Assessment,
        _processing_time: Option<Duration>,
    ) -> SinkResult<()> {
        if self.failing.lock().contains(&fact.id) {
            return Err(SinkError::RowNotFound {
                fact_id: fact.id,
                path: "mock".into(),
            });
        }
        self.written.lock().push((fact.id, assessment.score));
        Ok(())
    }
}
