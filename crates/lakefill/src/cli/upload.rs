//! `lakefill upload`: copy the lake tree to object storage.

use anyhow::{Context, Result};
use lakefill::upload::{azure_store, local_store, upload_tree, CONNECTION_STRING_ENV};
use lakefill::LakeConfig;
use object_store::ObjectStore;
use serde_json::json;
use std::path::PathBuf;
use std::sync::Arc;

use crate::cli::error::HelpfulError;
use crate::cli::output::{format_size, print_json};

#[derive(Debug)]
pub struct UploadArgs {
    /// Upload into this directory instead of Azure.
    pub to_dir: Option<PathBuf>,
    pub json: bool,
}

pub fn run(args: UploadArgs, config: &LakeConfig) -> Result<()> {
    if !config.lake_root.is_dir() {
        return Err(HelpfulError::new(format!(
            "Nothing to upload: {} does not exist",
            config.lake_root.display()
        ))
        .with_suggestions([
            "TRY: Run 'lakefill land' and 'lakefill normalize' first".to_string(),
            "TRY: Point at the lake: --lake-root DIR or LAKEFILL_LAKE_ROOT".to_string(),
        ])
        .into());
    }

    let (store, target): (Arc<dyn ObjectStore>, String) = match &args.to_dir {
        Some(dir) => (local_store(dir)?, dir.display().to_string()),
        None => {
            let conn = std::env::var(CONNECTION_STRING_ENV)
                .map_err(|_| HelpfulError::missing_connection_string(CONNECTION_STRING_ENV))?;
            (
                azure_store(&conn, &config.container)?,
                format!("azure container '{}'", config.container),
            )
        }
    };

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("Failed to start async runtime")?;
    let report = runtime.block_on(upload_tree(store.as_ref(), &config.lake_root))?;

    if args.json {
        return print_json(&json!({
            "target": target,
            "uploaded": report.objects.iter().map(|o| json!({
                "key": o.key,
                "bytes": o.bytes,
            })).collect::<Vec<_>>(),
            "skipped": report.skipped.iter().map(|p| p.display().to_string()).collect::<Vec<_>>(),
        }));
    }

    for object in &report.objects {
        println!("Uploaded {}", object.key);
    }
    println!(
        "Uploaded {} files ({}) to {}",
        report.objects.len(),
        format_size(report.total_bytes()),
        target
    );
    if !report.skipped.is_empty() {
        println!("Skipped {} staging files", report.skipped.len());
    }
    Ok(())
}
