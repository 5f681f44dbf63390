//! `lakefill normalize`: build the cleaned `user_events` partition.

use anyhow::Result;
use lakefill::{run_normalize, LakeConfig, RunDate};
use lakefill_source::SourceDb;
use serde_json::json;

use crate::cli::output::print_json;

#[derive(Debug)]
pub struct NormalizeArgs {
    pub run_date: RunDate,
    pub json: bool,
}

pub fn run(args: NormalizeArgs, config: &LakeConfig) -> Result<()> {
    let options = config.normalize_options()?;
    let db = SourceDb::open(&config.source_db)?;
    let report = run_normalize(
        &db,
        &config.cleaned_root(),
        args.run_date,
        config.format,
        &options,
    )?;
    let stats = &report.stats;

    if args.json {
        return print_json(&json!({
            "run_date": args.run_date.to_string(),
            "path": report.artifact.path.display().to_string(),
            "rows": stats.rows,
            "users": stats.users,
            "trial_users": stats.trial_users,
            "unparsable_dates": stats.unparsable_dates,
            "fractional_quantities": stats.fractional_quantities,
            "unparsable_quantities": stats.unparsable_quantities,
            "duplicate_event_ids": stats.duplicate_event_ids,
            "price_column": stats.price_source.to_string(),
            "joins": stats
                .joins
                .steps
                .iter()
                .map(|s| json!({
                    "table": s.table.to_string(),
                    "matched": s.matched,
                    "unmatched": s.unmatched,
                    "duplicate_keys": s.duplicate_keys,
                }))
                .collect::<Vec<_>>(),
        }));
    }

    println!("Wrote {} events to {}", stats.rows, report.artifact.path.display());
    println!(
        "  users: {} ({} trial), price column: {}",
        stats.users, stats.trial_users, stats.price_source
    );
    if stats.unparsable_dates > 0 {
        println!("  unparsable invoice dates: {}", stats.unparsable_dates);
    }
    if stats.fractional_quantities + stats.unparsable_quantities > 0 {
        println!(
            "  quantities: {} fractional, {} unparsable",
            stats.fractional_quantities, stats.unparsable_quantities
        );
    }
    for step in stats.joins.steps.iter().filter(|s| s.unmatched > 0) {
        println!("  unmatched {} rows: {}", step.table, step.unmatched);
    }
    Ok(())
}
