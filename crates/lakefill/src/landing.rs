//! Landing: raw snapshot of every source table.

use anyhow::{Context, Result};
use lakefill_sinks::{write_partition, OutputArtifact, OutputFormat, PartitionTarget, RunDate};
use lakefill_source::SourceDb;
use std::path::Path;
use tracing::info;

/// Copy every non-system table unmodified to
/// `<raw_root>/<table>/<run-date>/<table>.<ext>`.
///
/// Tables are landed in name order; the first failure aborts the run.
pub fn land_all(
    db: &SourceDb,
    raw_root: &Path,
    run_date: RunDate,
    format: OutputFormat,
) -> Result<Vec<OutputArtifact>> {
    let tables = db.table_names()?;
    info!(
        tables = tables.len(),
        run_date = %run_date,
        root = %raw_root.display(),
        "Landing source tables"
    );

    let mut artifacts = Vec::with_capacity(tables.len());
    for name in &tables {
        let table = db.read_table(name)?;
        let target = PartitionTarget::new(raw_root, table.name(), run_date, format)
            .map_err(anyhow::Error::msg)
            .with_context(|| format!("Cannot land table '{}'", table.name()))?;

        let schema = table.schema();
        let artifact = write_partition(&target, schema, &[table.into_record_batch()])
            .with_context(|| format!("Failed to land table '{}'", name))?;
        info!(
            table = %artifact.dataset,
            rows = artifact.rows,
            path = %artifact.path.display(),
            "Landed table"
        );
        artifacts.push(artifact);
    }

    Ok(artifacts)
}
