//! Publication of committed assessments.
//!
//! Publishing happens after the checkpoint commit and is an idempotent overwrite
//! keyed by fact id, so a failed publish is repaired by publishing again.

mod durable;
pub mod error;
#[cfg(any(test, feature = "mock"))]
mod mock;
mod tabular;


pub use durable::{AssessmentDocument, FileAssessmentStore};
pub use error::{SinkError, SinkResult};
#[cfg(any(test, feature = "mock"))]
pub use mock::MockDestination;
pub use tabular::{EXPORT_COLUMNS, TabularExport};

use std::time::Duration;

use tracing::{debug, instrument, warn};

use crate::assessment::Assessment;
use crate::catalog::Fact;

/// A place assessments are published to.
pub trait Destination: Send + Sync {
    fn name(&self) -> &'static str;

    /// Writes (or overwrites) the assessment for `fact`.
    fn write(
        &self,
        fact: &Fact,
        assessment: &Assessment,
        processing_time: Option<Duration>,
    ) -> SinkResult<()>;
}

/// Fans each publish out to every destination.
#[derive(Default)]
pub struct ResultSink {
    destinations: Vec<Box<dyn Destination>>,
}

impl std::fmt::Debug for ResultSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names: Vec<&str> = self.destinations.iter().map(|d| d.name()).collect();
        f.debug_struct("ResultSink")
            .field("destinations", &names)
            .finish()
    }
}

impl ResultSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Durable JSON store plus tabular export, the production pair.
    pub fn standard(
        assessments_dir: impl Into<std::path::PathBuf>,
        csv_dir: impl Into<std::path::PathBuf>,
    ) -> Self {
        Self::new()
            .with_destination(FileAssessmentStore::new(assessments_dir))
            .with_destination(TabularExport::new(csv_dir))
    }

    pub fn with_destination(mut self, destination: impl Destination + 'static) -> Self {
        self.destinations.push(Box::new(destination));
        self
    }

    pub fn len(&self) -> usize {
        self.destinations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.destinations.is_empty()
    }

    /// Writes to every destination, even after one fails, and returns the first error.
    #[instrument(skip_all, fields(fact_id = fact.id))]
    pub fn publish(
        &self,
        fact: &Fact,
        assessment: &Assessment,
        processing_time: Option<Duration>,
    ) -> SinkResult<()> {
        let mut first_error = None;
        for destination in &self.destinations {
            match destination.write(fact, assessment, processing_time) {
                Ok(()) => debug!(destination = destination.name(), "Published"),
                Err(e) => {
                    warn!(destination = destination.name(), error = %e, "Publish failed");
                    first_error.get_or_insert(e);
                }
            }
        }
        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}
