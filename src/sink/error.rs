use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while publishing an assessment. A failed publish leaves the fact
/// committed; it is published again on the next run.
#[derive(Error, Debug)]
pub enum SinkError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("failed to read or write table {path}: {source}")]
    Table {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("table {path} is missing column '{column}'")]
    MissingColumn { path: PathBuf, column: String },

    /// The fact's row is not in the table it was loaded from.
    #[error("fact {fact_id} has no row in {path}")]
    RowNotFound { fact_id: u32, path: PathBuf },
}

impl SinkError {
    pub(crate) fn io(path: impl Into<PathBuf>) -> impl FnOnce(std::io::Error) -> Self {
        let path = path.into();
        move |source| SinkError::Io { path, source }
    }
}

pub type SinkResult<T> = Result<T, SinkError>;
