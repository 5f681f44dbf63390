//! Error types for the source layer.

use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Source operation result type.
pub type Result<T> = std::result::Result<T, SourceError>;

/// What kind of identifier a [`SchemaMismatch`] is about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdentifierKind {
    Table,
    Column,
}

impl fmt::Display for IdentifierKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IdentifierKind::Table => f.write_str("Table"),
            IdentifierKind::Column => f.write_str("Column"),
        }
    }
}

/// An expected table or column is absent.
///
/// Carries the available identifiers so the operator can spot renames and
/// typos without opening the database.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind} not found: '{missing}' (available: {})", .available.join(", "))]
pub struct SchemaMismatch {
    pub kind: IdentifierKind,
    pub missing: String,
    pub available: Vec<String>,
}

impl SchemaMismatch {
    pub fn table(missing: impl Into<String>, available: Vec<String>) -> Self {
        Self {
            kind: IdentifierKind::Table,
            missing: missing.into(),
            available,
        }
    }

    pub fn column(missing: impl Into<String>, available: Vec<String>) -> Self {
        Self {
            kind: IdentifierKind::Column,
            missing: missing.into(),
            available,
        }
    }
}

/// Source errors.
#[derive(Error, Debug)]
pub enum SourceError {
    /// The store could not be opened at all.
    #[error("Source unavailable: {path}: {reason}")]
    Unavailable { path: PathBuf, reason: String },

    /// Expected table or column absent.
    #[error(transparent)]
    SchemaMismatch(#[from] SchemaMismatch),

    /// SQLite error while querying an open store
    #[error("Query error: {0}")]
    Query(#[from] rusqlite::Error),

    /// Arrow error while building in-memory tables
    #[error("Arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),
}

impl SourceError {
    /// Create an unavailable error.
    pub fn unavailable(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::Unavailable {
            path: path.into(),
            reason: reason.into(),
        }
    }
}
