use thiserror::Error;

use crate::checkpoint::CheckpointError;

/// Errors that abort a run. Per-fact failures are recorded in the report instead.
#[derive(Debug, Error)]
pub enum ReviewError {
    #[error("checkpoint failure: {0}")]
    Checkpoint(#[from] CheckpointError),
}

pub type ReviewResult<T> = Result<T, ReviewError>;
