//! Catalog error types.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that abort a run before any fact is processed.
#[derive(Debug, Error)]
pub enum CatalogLoadError {
    /// The catalog directory does not exist.
    #[error("fact source not found: {path}")]
    SourceMissing { path: PathBuf },

    /// The directory holds no fact tables, or tables with no fact rows.
    #[error("no facts found in {path}")]
    Empty { path: PathBuf },

    /// A table could not be read.
    #[error("failed to read fact table {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    /// A required column is absent from a table header.
    #[error("fact table {path} is missing column '{column}'")]
    MissingColumn { path: PathBuf, column: String },

    /// A fact id cell could not be parsed.
    #[error("invalid fact id '{value}' in {path}")]
    InvalidId { path: PathBuf, value: String },

    /// The same fact id appears more than once.
    #[error("duplicate fact id {id}")]
    DuplicateId { id: u32 },

    /// Fact ids do not form the sequence `1..=N`.
    #[error("fact ids are not contiguous: expected {expected}, found {found}")]
    NonContiguous { expected: u32, found: u32 },

    #[error("I/O error reading fact source: {0}")]
    Io(#[from] std::io::Error),
}

pub type CatalogResult<T> = Result<T, CatalogLoadError>;
