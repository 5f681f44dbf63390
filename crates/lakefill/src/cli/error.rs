//! Helpful error types for CLI commands
//!
//! Every error includes:
//! - What went wrong
//! - Context about the situation
//! - Suggestions for how to fix it

use lakefill::InspectError;
use lakefill_events::EventsError;
use lakefill_sinks::SinkError;
use lakefill_source::{IdentifierKind, SchemaMismatch, SourceError};
use std::fmt;
use std::path::Path;

/// An error with helpful context and suggestions
#[derive(Debug, Clone)]
pub struct HelpfulError {
    pub message: String,
    pub context: Option<String>,
    pub suggestions: Vec<String>,
}

impl HelpfulError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            context: None,
            suggestions: Vec::new(),
        }
    }

    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestions.push(suggestion.into());
        self
    }

    pub fn with_suggestions(
        mut self,
        suggestions: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        self.suggestions.extend(suggestions.into_iter().map(|s| s.into()));
        self
    }

    // === Common error constructors ===

    /// Source database missing or unreadable
    pub fn source_unavailable(path: &Path, reason: &str) -> Self {
        Self::new(format!("Source database unavailable: {}", path.display()))
            .with_context(reason.to_string())
            .with_suggestions([
                format!("TRY: Check the file exists: ls -la {}", path.display()),
                "TRY: Point at the right file: --source-db PATH or LAKEFILL_SOURCE_DB".to_string(),
                "TRY: Verify it is a SQLite database: sqlite3 PATH '.tables'".to_string(),
            ])
    }

    /// Expected table or column absent
    pub fn schema_mismatch(mismatch: &SchemaMismatch) -> Self {
        let err = Self::new(format!("{} not found: '{}'", mismatch.kind, mismatch.missing))
            .with_context(format!("Available: {}", mismatch.available.join(", ")));
        match mismatch.kind {
            IdentifierKind::Table => err.with_suggestions([
                "TRY: Check the source database is the Chinook store".to_string(),
                "TRY: Map renamed tables in lakefill.toml, e.g. [mapping.invoice] table = \"Invoices\"".to_string(),
            ]),
            IdentifierKind::Column => err.with_suggestions([
                "TRY: Map renamed columns in lakefill.toml, e.g. [mapping.customer] city = \"Town\"".to_string(),
                "TRY: Bind the price explicitly: --price-column TABLE.COLUMN".to_string(),
            ]),
        }
    }

    /// Output location not writable
    pub fn unwritable(path: &Path, reason: &str) -> Self {
        Self::new(format!("Cannot write to {}", path.display()))
            .with_context(reason.to_string())
            .with_suggestions([
                format!("TRY: Check permissions: ls -la {}", path.display()),
                "TRY: Write somewhere else: --lake-root DIR or LAKEFILL_LAKE_ROOT".to_string(),
            ])
    }

    /// File does not exist
    pub fn file_not_found(path: &Path) -> Self {
        Self::new(format!("File not found: {}", path.display()))
            .with_context("The specified file does not exist")
            .with_suggestions([
                format!("TRY: Check if the file exists: ls -la {}", path.display()),
                format!(
                    "TRY: Look for partitions: ls {}",
                    path.parent()
                        .and_then(|p| p.parent())
                        .map(|p| p.display().to_string())
                        .unwrap_or_else(|| ".".to_string())
                ),
                "TRY: Run 'lakefill normalize' first to write the partition".to_string(),
            ])
    }

    /// Parquet error
    pub fn parquet_error(path: &Path, details: &str) -> Self {
        Self::new(format!("Parquet error: {}", details))
            .with_context(format!("Failed to read Parquet file: {}", path.display()))
            .with_suggestions([
                "TRY: Verify this is a valid Parquet file".to_string(),
                "TRY: Check if the file was fully written (not truncated)".to_string(),
            ])
    }

    /// Invalid run date
    pub fn invalid_run_date(input: &str) -> Self {
        Self::new(format!("Invalid run date: '{}'", input))
            .with_context("Run dates are calendar dates in YYYY-MM-DD form")
            .with_suggestion("TRY: --run-date 2024-01-31")
    }

    /// Upload target not configured
    pub fn missing_connection_string(var: &str) -> Self {
        Self::new("No upload target configured")
            .with_context(format!("{} is not set and --to-dir was not given", var))
            .with_suggestions([
                format!("TRY: export {}='DefaultEndpointsProtocol=https;AccountName=...;AccountKey=...'", var),
                "TRY: Dry-run into a local directory: lakefill upload --to-dir /tmp/lake-copy".to_string(),
            ])
    }
}

impl fmt::Display for HelpfulError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "ERROR: {}", self.message)?;

        if let Some(ctx) = &self.context {
            writeln!(f, "CONTEXT: {}", ctx)?;
        }

        if !self.suggestions.is_empty() {
            writeln!(f)?;
            for suggestion in &self.suggestions {
                writeln!(f, "  {}", suggestion)?;
            }
        }

        Ok(())
    }
}

impl std::error::Error for HelpfulError {}

/// Turn a failed run into the most specific helpful error available.
///
/// Errors that are already helpful pass through; known library errors
/// anywhere in the chain get a tailored message; anything else keeps its
/// full context chain.
pub fn to_helpful(err: &anyhow::Error) -> Option<HelpfulError> {
    for cause in err.chain() {
        if let Some(helpful) = cause.downcast_ref::<HelpfulError>() {
            return Some(helpful.clone());
        }
        if let Some(err) = cause.downcast_ref::<SourceError>() {
            return from_source(err);
        }
        if let Some(err) = cause.downcast_ref::<EventsError>() {
            match err {
                EventsError::Source(source) => return from_source(source),
                EventsError::SchemaMismatch(mismatch) => {
                    return Some(HelpfulError::schema_mismatch(mismatch))
                }
                EventsError::Arrow(_) => {}
            }
        }
        if let Some(mismatch) = cause.downcast_ref::<SchemaMismatch>() {
            return Some(HelpfulError::schema_mismatch(mismatch));
        }
        if let Some(SinkError::Unwritable { path, source }) = cause.downcast_ref::<SinkError>() {
            return Some(HelpfulError::unwritable(path, &source.to_string()));
        }
        if let Some(err) = cause.downcast_ref::<InspectError>() {
            return Some(match err {
                InspectError::NotFound { path } => HelpfulError::file_not_found(path),
                InspectError::Parquet { path, source } => {
                    HelpfulError::parquet_error(path, &source.to_string())
                }
                InspectError::UnknownColumn { column, available } => {
                    HelpfulError::new(format!("Column not found: '{}'", column))
                        .with_context(format!("Available: {}", available.join(", ")))
                        .with_suggestion("TRY: Omit --columns to preview every column")
                }
                other => HelpfulError::new(other.to_string()),
            });
        }
    }
    None
}

fn from_source(err: &SourceError) -> Option<HelpfulError> {
    match err {
        SourceError::Unavailable { path, reason } => {
            Some(HelpfulError::source_unavailable(path, reason))
        }
        SourceError::SchemaMismatch(mismatch) => Some(HelpfulError::schema_mismatch(mismatch)),
        _ => None,
    }
}
