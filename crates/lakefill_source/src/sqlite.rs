//! Read-only access to the legacy SQLite store.

use rusqlite::types::Value;
use rusqlite::{Connection, OpenFlags};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::convert::columns_to_batch;
use crate::error::{Result, SchemaMismatch, SourceError};
use crate::table::SourceTable;

const LIST_TABLES_SQL: &str = "SELECT name FROM sqlite_master \
     WHERE type = 'table' AND name NOT LIKE 'sqlite\\_%' ESCAPE '\\' \
     ORDER BY name";

/// Handle to the legacy store.
///
/// Opened read-only; a run never mutates the source.
pub struct SourceDb {
    conn: Connection,
    path: PathBuf,
}

impl SourceDb {
    /// Open an existing database (fails if not exists).
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        if !path.is_file() {
            return Err(SourceError::unavailable(path, "database file does not exist"));
        }

        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
        .map_err(|e| SourceError::unavailable(path, e.to_string()))?;

        // SQLite opens any file lazily; probe the catalog so garbage fails here.
        conn.query_row("SELECT count(*) FROM sqlite_master", [], |row| {
            row.get::<_, i64>(0)
        })
        .map_err(|e| SourceError::unavailable(path, e.to_string()))?;

        info!(path = %path.display(), "Source database opened");

        Ok(Self {
            conn,
            path: path.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Every non-system table, sorted by name.
    pub fn table_names(&self) -> Result<Vec<String>> {
        let mut stmt = self.conn.prepare(LIST_TABLES_SQL)?;
        let names = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(names)
    }

    /// Read a whole table into memory.
    ///
    /// The name is matched case-insensitively against the catalog; the
    /// returned table carries the catalog spelling.
    pub fn read_table(&self, name: &str) -> Result<SourceTable> {
        let tables = self.table_names()?;
        let resolved = match tables.iter().find(|t| t.eq_ignore_ascii_case(name)) {
            Some(found) => found.clone(),
            None => return Err(SchemaMismatch::table(name, tables).into()),
        };

        let sql = format!("SELECT * FROM {}", quote_identifier(&resolved));
        let mut stmt = self.conn.prepare(&sql)?;
        let column_names: Vec<String> = stmt
            .column_names()
            .into_iter()
            .map(String::from)
            .collect();

        let mut columns: Vec<Vec<Value>> = vec![Vec::new(); column_names.len()];
        let mut rows = stmt.query([])?;
        while let Some(row) = rows.next()? {
            for (idx, column) in columns.iter_mut().enumerate() {
                column.push(row.get::<_, Value>(idx)?);
            }
        }

        let batch = columns_to_batch(&column_names, &columns)?;
        debug!(
            table = %resolved,
            rows = batch.num_rows(),
            columns = column_names.len(),
            "Read source table"
        );

        Ok(SourceTable::new(resolved, batch))
    }
}

fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}
