//! `lakefill inspect`: schema and leading rows of a partition.

use anyhow::Result;
use lakefill::{inspect_partition, LakeConfig, RunDate};
use lakefill_events::DATASET_NAME;
use lakefill_sinks::{OutputFormat, PartitionTarget};
use std::path::PathBuf;

use crate::cli::output::{print_json, print_table};

#[derive(Debug)]
pub struct InspectArgs {
    /// Partition file; defaults to the run date's `user_events` partition.
    pub path: Option<PathBuf>,
    pub run_date: RunDate,
    pub rows: usize,
    pub columns: Vec<String>,
    pub json: bool,
}

pub fn default_partition(config: &LakeConfig, run_date: RunDate) -> Result<PathBuf> {
    let target = PartitionTarget::new(
        config.cleaned_root(),
        DATASET_NAME,
        run_date,
        OutputFormat::Parquet,
    )
    .map_err(anyhow::Error::msg)?;
    Ok(target.final_path())
}

pub fn run(args: InspectArgs, config: &LakeConfig) -> Result<()> {
    let path = match args.path {
        Some(path) => path,
        None => default_partition(config, args.run_date)?,
    };
    let preview = inspect_partition(&path, args.rows, &args.columns)?;

    if args.json {
        return print_json(&serde_json::to_value(&preview)?);
    }

    println!("Loading: {}", preview.path.display());
    println!(
        "Columns: {}",
        preview
            .columns
            .iter()
            .map(|c| c.name.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    );
    print_table(&preview.headers, preview.rows.clone());
    print_table(
        &["column", "type", "nullable"],
        preview
            .columns
            .iter()
            .map(|c| vec![c.name.clone(), c.data_type.clone(), c.nullable.to_string()])
            .collect(),
    );
    println!("{} rows total", preview.total_rows);
    Ok(())
}
