//! `lakefill land`: snapshot every source table into the raw zone.

use anyhow::Result;
use lakefill::{land_all, LakeConfig, RunDate};
use lakefill_source::SourceDb;
use serde_json::json;

use crate::cli::output::{print_json, print_table};

#[derive(Debug)]
pub struct LandArgs {
    pub run_date: RunDate,
    pub json: bool,
}

pub fn run(args: LandArgs, config: &LakeConfig) -> Result<()> {
    let db = SourceDb::open(&config.source_db)?;
    let artifacts = land_all(&db, &config.raw_root(), args.run_date, config.format)?;

    if args.json {
        return print_json(&json!({
            "run_date": args.run_date.to_string(),
            "tables": artifacts
                .iter()
                .map(|a| json!({
                    "table": a.dataset,
                    "rows": a.rows,
                    "path": a.path.display().to_string(),
                }))
                .collect::<Vec<_>>(),
        }));
    }

    let total: u64 = artifacts.iter().map(|a| a.rows).sum();
    print_table(
        &["table", "rows", "path"],
        artifacts
            .iter()
            .map(|a| vec![a.dataset.clone(), a.rows.to_string(), a.path.display().to_string()])
            .collect(),
    );
    println!(
        "Landed {} tables ({} rows) for {}",
        artifacts.len(),
        total,
        args.run_date
    );
    Ok(())
}
