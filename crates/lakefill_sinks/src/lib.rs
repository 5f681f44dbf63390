//! Partition writers for landed and cleaned datasets.
//!
//! A partition is staged in a hidden temp file next to its final path and
//! renamed into place once every batch is written, replacing whatever an
//! earlier run of the same day left there. A failed write removes the temp
//! file and leaves the previous partition untouched.

use anyhow::Context;
use arrow::array::RecordBatch;
use arrow::datatypes::{Schema, SchemaRef};
use parquet::arrow::arrow_writer::ArrowWriter;
use parquet::basic::Compression;
use parquet::file::properties::WriterProperties;
use std::fs::File;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info, warn};

mod partition;

pub use partition::{OutputFormat, PartitionTarget, RunDate, RunDateError};

/// Errors returned by partition writing.
#[derive(Debug, Error)]
pub enum SinkError {
    /// The destination cannot be created or written.
    #[error("Destination not writable: {}: {source}", .path.display())]
    Unwritable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("{message}")]
    Message { message: String },
    #[error("{message}")]
    Source {
        message: String,
        #[source]
        source: anyhow::Error,
    },
}

pub type SinkResult<T> = std::result::Result<T, SinkError>;

impl SinkError {
    fn unwritable(path: impl Into<PathBuf>) -> impl FnOnce(std::io::Error) -> SinkError {
        let path = path.into();
        move |source| SinkError::Unwritable { path, source }
    }
}

impl From<anyhow::Error> for SinkError {
    fn from(err: anyhow::Error) -> Self {
        SinkError::Source {
            message: format!("{:#}", err),
            source: err,
        }
    }
}

/// A committed partition file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputArtifact {
    pub dataset: String,
    pub path: PathBuf,
    pub rows: u64,
}

/// Write one partition, replacing any file an earlier run left at the same path.
///
/// Every batch must carry exactly `schema`'s column names and types. A
/// partition is written even when `batches` is empty, so an empty source
/// table still lands as a file carrying its schema.
pub fn write_partition(
    target: &PartitionTarget,
    schema: SchemaRef,
    batches: &[RecordBatch],
) -> SinkResult<OutputArtifact> {
    let dir = target.dir();
    std::fs::create_dir_all(&dir).map_err(SinkError::unwritable(&dir))?;

    let final_path = target.final_path();
    let (staged, file) = StagedFile::create(target.temp_path())?;
    debug!(
        dataset = target.dataset(),
        temp = %staged.path.display(),
        "Staging partition"
    );

    let mut writer = BatchWriter::open(target.format(), file, schema.clone())?;
    let mut rows = 0;
    for batch in batches {
        check_schema(batch, &schema, target.dataset())?;
        writer.write(batch)?;
        rows += batch.num_rows() as u64;
    }
    if batches.is_empty() {
        // CSV writes its header with the first batch
        writer.write(&RecordBatch::new_empty(schema))?;
    }
    writer.finish()?;
    staged.commit(&final_path)?;

    info!(
        dataset = target.dataset(),
        rows,
        path = %final_path.display(),
        "Committed partition"
    );
    Ok(OutputArtifact {
        dataset: target.dataset().to_string(),
        path: final_path,
        rows,
    })
}

/// Temp file removed on drop unless it was renamed into place.
struct StagedFile {
    path: PathBuf,
    committed: bool,
}

impl StagedFile {
    fn create(path: PathBuf) -> SinkResult<(Self, File)> {
        let file = File::create(&path).map_err(SinkError::unwritable(&path))?;
        Ok((
            Self {
                path,
                committed: false,
            },
            file,
        ))
    }

    fn commit(mut self, final_path: &Path) -> SinkResult<()> {
        std::fs::rename(&self.path, final_path).map_err(SinkError::unwritable(final_path))?;
        self.committed = true;
        Ok(())
    }
}

impl Drop for StagedFile {
    fn drop(&mut self) {
        if !self.committed && std::fs::remove_file(&self.path).is_ok() {
            warn!(path = %self.path.display(), "Partition write failed; removed temp file");
        }
    }
}

enum BatchWriter {
    Parquet(ArrowWriter<File>),
    Csv(arrow::csv::Writer<File>),
}

impl BatchWriter {
    fn open(format: OutputFormat, file: File, schema: SchemaRef) -> SinkResult<Self> {
        match format {
            OutputFormat::Parquet => {
                let props = WriterProperties::builder()
                    .set_compression(Compression::SNAPPY)
                    .build();
                let writer = ArrowWriter::try_new(file, schema, Some(props))
                    .context("Failed to create Parquet writer")?;
                Ok(BatchWriter::Parquet(writer))
            }
            OutputFormat::Csv => Ok(BatchWriter::Csv(
                arrow::csv::WriterBuilder::new().with_header(true).build(file),
            )),
        }
    }

    fn write(&mut self, batch: &RecordBatch) -> SinkResult<()> {
        match self {
            BatchWriter::Parquet(writer) => writer
                .write(batch)
                .context("Failed to write batch to Parquet")?,
            BatchWriter::Csv(writer) => writer
                .write(batch)
                .context("Failed to write batch to CSV")?,
        }
        Ok(())
    }

    fn finish(self) -> SinkResult<()> {
        match self {
            BatchWriter::Parquet(writer) => {
                writer.close().context("Failed to close Parquet writer")?;
            }
            // The CSV writer flushes when dropped
            BatchWriter::Csv(writer) => drop(writer),
        }
        Ok(())
    }
}

/// Column names and types must match exactly; the writers reject anything else.
fn check_schema(batch: &RecordBatch, declared: &Schema, dataset: &str) -> SinkResult<()> {
    let actual = batch.schema();
    let matches = actual.fields().len() == declared.fields().len()
        && actual
            .fields()
            .iter()
            .zip(declared.fields().iter())
            .all(|(a, d)| a.name() == d.name() && a.data_type() == d.data_type());
    if matches {
        return Ok(());
    }

    Err(SinkError::Message {
        message: format!(
            "Schema mismatch for dataset '{}': expected [{}], got [{}]",
            dataset,
            describe(declared),
            describe(&actual)
        ),
    })
}

fn describe(schema: &Schema) -> String {
    schema
        .fields()
        .iter()
        .map(|f| format!("{}: {}", f.name(), f.data_type()))
        .collect::<Vec<_>>()
        .join(", ")
}
