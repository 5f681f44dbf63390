//! Error types for the normalization transform.

use arrow::error::ArrowError;
use lakefill_source::{SchemaMismatch, SourceError};
use thiserror::Error;

/// Normalization result type.
pub type Result<T> = std::result::Result<T, EventsError>;

/// Normalization errors.
///
/// Unparsable invoice dates are not errors; they become nulls.
#[derive(Error, Debug)]
pub enum EventsError {
    /// Store unavailable, table missing, or query failure during extraction
    #[error(transparent)]
    Source(#[from] SourceError),

    /// Expected column absent from an extracted table
    #[error(transparent)]
    SchemaMismatch(#[from] SchemaMismatch),

    /// Arrow kernel failure (cast, take, batch assembly)
    #[error("Arrow error: {0}")]
    Arrow(#[from] ArrowError),
}

impl EventsError {
    /// The missing identifier, whichever layer detected it.
    pub fn schema_mismatch(&self) -> Option<&SchemaMismatch> {
        match self {
            EventsError::SchemaMismatch(mismatch) => Some(mismatch),
            EventsError::Source(SourceError::SchemaMismatch(mismatch)) => Some(mismatch),
            _ => None,
        }
    }
}
