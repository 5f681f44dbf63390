//! Normalization stage: extract, build `user_events`, write the cleaned partition.

use anyhow::{Context, Result};
use lakefill_events::{normalize, NormalizeOptions, NormalizeStats, SourceTables, DATASET_NAME};
use lakefill_sinks::{write_partition, OutputArtifact, OutputFormat, PartitionTarget, RunDate};
use lakefill_source::SourceDb;
use std::path::Path;
use tracing::info;

/// What one normalization run produced.
#[derive(Debug, Clone)]
pub struct NormalizeReport {
    pub artifact: OutputArtifact,
    pub stats: NormalizeStats,
}

/// Write `<cleaned_root>/user_events/<run-date>/user_events.<ext>`.
pub fn run_normalize(
    db: &SourceDb,
    cleaned_root: &Path,
    run_date: RunDate,
    format: OutputFormat,
    options: &NormalizeOptions,
) -> Result<NormalizeReport> {
    let tables = SourceTables::extract(db, &options.mapping)?;
    let events = normalize(&tables, options)?;
    drop(tables);

    let target = PartitionTarget::new(cleaned_root, DATASET_NAME, run_date, format)
        .map_err(anyhow::Error::msg)?;
    let artifact = write_partition(&target, events.batch.schema(), &[events.batch])
        .with_context(|| format!("Failed to write {} partition", DATASET_NAME))?;

    info!(
        rows = artifact.rows,
        path = %artifact.path.display(),
        "Wrote user events"
    );

    Ok(NormalizeReport {
        artifact,
        stats: events.stats,
    })
}
