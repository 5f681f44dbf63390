//! In-memory source tables.

use arrow::array::{ArrayRef, RecordBatch};
use arrow::datatypes::SchemaRef;

use crate::error::SchemaMismatch;

/// One fully extracted table.
///
/// Column lookups are case-insensitive, matching SQLite's own identifier rules.
#[derive(Debug, Clone)]
pub struct SourceTable {
    name: String,
    batch: RecordBatch,
}

impl SourceTable {
    pub fn new(name: impl Into<String>, batch: RecordBatch) -> Self {
        Self {
            name: name.into(),
            batch,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn num_rows(&self) -> usize {
        self.batch.num_rows()
    }

    pub fn schema(&self) -> SchemaRef {
        self.batch.schema()
    }

    pub fn record_batch(&self) -> &RecordBatch {
        &self.batch
    }

    pub fn into_record_batch(self) -> RecordBatch {
        self.batch
    }

    /// Column names in table order.
    pub fn column_names(&self) -> Vec<String> {
        self.batch
            .schema()
            .fields()
            .iter()
            .map(|f| f.name().clone())
            .collect()
    }

    /// Position and exact name of a column, ignoring ASCII case.
    pub fn position(&self, name: &str) -> Option<(usize, String)> {
        self.batch
            .schema()
            .fields()
            .iter()
            .enumerate()
            .find(|(_, f)| f.name().eq_ignore_ascii_case(name))
            .map(|(idx, f)| (idx, f.name().clone()))
    }

    /// Look up a column, ignoring ASCII case.
    pub fn find_column(&self, name: &str) -> Option<&ArrayRef> {
        self.position(name).map(|(idx, _)| self.batch.column(idx))
    }

    /// Look up a column, failing with the available column names.
    pub fn column(&self, name: &str) -> Result<&ArrayRef, SchemaMismatch> {
        self.find_column(name).ok_or_else(|| {
            SchemaMismatch::column(format!("{}.{}", self.name, name), self.column_names())
        })
    }
}
