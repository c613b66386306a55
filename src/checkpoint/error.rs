use std::path::PathBuf;

use thiserror::Error;

/// Errors returned by the checkpoint store. All of them abort the run.
#[derive(Error, Debug)]
pub enum CheckpointError {
    /// Another run holds the checkpoint lock.
    #[error("checkpoint at {path} is locked by another run")]
    Locked { path: PathBuf },

    #[error("checkpoint I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("checkpoint serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A log entry before the tail failed verification.
    #[error("corrupt checkpoint log {path} at line {line}: {reason}")]
    Corrupt {
        path: PathBuf,
        line: usize,
        reason: String,
    },

    #[error("corrupt checkpoint snapshot {path}: {reason}")]
    CorruptSnapshot { path: PathBuf, reason: String },

    #[error("commit for fact {expected} carries an assessment for fact {actual}")]
    FactMismatch { expected: u32, actual: u32 },

    #[error("fact {fact_id} has not been committed")]
    NotCommitted { fact_id: u32 },
}

pub type CheckpointResult<T> = Result<T, CheckpointError>;
