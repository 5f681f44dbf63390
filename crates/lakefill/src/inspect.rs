//! Debug inspection of a written Parquet partition.

use arrow::util::display::{ArrayFormatter, FormatOptions};
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use parquet::errors::ParquetError;
use serde::Serialize;
use std::fs::File;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const DEFAULT_PREVIEW_ROWS: usize = 10;

#[derive(Debug, Error)]
pub enum InspectError {
    #[error("Partition file not found: {}", .path.display())]
    NotFound { path: PathBuf },

    #[error("Column not found: '{column}' (available: {})", .available.join(", "))]
    UnknownColumn {
        column: String,
        available: Vec<String>,
    },

    #[error("Cannot read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Parquet error in {}: {source}", .path.display())]
    Parquet {
        path: PathBuf,
        #[source]
        source: ParquetError,
    },

    #[error("Cannot render column values: {0}")]
    Arrow(#[from] arrow::error::ArrowError),
}

#[derive(Debug, Clone, Serialize)]
pub struct ColumnInfo {
    pub name: String,
    pub data_type: String,
    pub nullable: bool,
}

/// Schema, row count and leading rows of one partition.
#[derive(Debug, Clone, Serialize)]
pub struct PartitionPreview {
    pub path: PathBuf,
    pub columns: Vec<ColumnInfo>,
    pub total_rows: u64,
    /// Names of the previewed columns, in `rows` order.
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

/// Read the schema and first `rows` rows of a Parquet partition.
///
/// `columns` narrows the preview; names match case-insensitively. An empty
/// list previews every column. Nulls render as `null`.
pub fn inspect_partition(
    path: &Path,
    rows: usize,
    columns: &[String],
) -> Result<PartitionPreview, InspectError> {
    if !path.is_file() {
        return Err(InspectError::NotFound {
            path: path.to_path_buf(),
        });
    }

    let parquet_err = |source| InspectError::Parquet {
        path: path.to_path_buf(),
        source,
    };

    let file = File::open(path).map_err(|source| InspectError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let builder = ParquetRecordBatchReaderBuilder::try_new(file).map_err(parquet_err)?;
    let schema = builder.schema().clone();
    let total_rows = builder.metadata().file_metadata().num_rows().max(0) as u64;

    let all_names: Vec<String> = schema.fields().iter().map(|f| f.name().clone()).collect();
    let projection: Vec<usize> = if columns.is_empty() {
        (0..all_names.len()).collect()
    } else {
        columns
            .iter()
            .map(|wanted| {
                all_names
                    .iter()
                    .position(|name| name.eq_ignore_ascii_case(wanted))
                    .ok_or_else(|| InspectError::UnknownColumn {
                        column: wanted.clone(),
                        available: all_names.clone(),
                    })
            })
            .collect::<Result<_, _>>()?
    };
    let headers: Vec<String> = projection.iter().map(|&i| all_names[i].clone()).collect();

    let reader = builder
        .with_batch_size(rows.max(1))
        .build()
        .map_err(parquet_err)?;

    let options = FormatOptions::default().with_null("null");
    let mut preview_rows = Vec::with_capacity(rows);
    for batch in reader {
        if preview_rows.len() >= rows {
            break;
        }
        let batch = batch?.project(&projection)?;
        let formatters = batch
            .columns()
            .iter()
            .map(|col| ArrayFormatter::try_new(col.as_ref(), &options))
            .collect::<Result<Vec<_>, _>>()?;

        for row in 0..batch.num_rows() {
            if preview_rows.len() >= rows {
                break;
            }
            preview_rows.push(formatters.iter().map(|f| f.value(row).to_string()).collect());
        }
    }

    Ok(PartitionPreview {
        path: path.to_path_buf(),
        columns: schema
            .fields()
            .iter()
            .map(|f| ColumnInfo {
                name: f.name().clone(),
                data_type: f.data_type().to_string(),
                nullable: f.is_nullable(),
            })
            .collect(),
        total_rows,
        headers,
        rows: preview_rows,
    })
}
