//! Lakefill command-line launcher
//!
//! Each stage is its own subcommand and runs to completion synchronously.
//! The run date is resolved once here and passed down explicitly.

use anyhow::Result;
use clap::{Parser, Subcommand};
use lakefill::{ConfigOverrides, LakeConfig, OutputFormat};
use lakefill_logging::{ensure_logs_dir, init_logging, LogConfig};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::debug;

mod cli;

#[derive(Parser, Debug)]
#[command(
    name = "lakefill",
    version,
    about = "Land a legacy SQLite store into a date-partitioned data lake"
)]
struct Cli {
    /// Enable verbose logging (debug to stderr)
    #[arg(short = 'v', long, global = true)]
    verbose: bool,

    /// Config file (default: ./lakefill.toml when present)
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Legacy SQLite database
    #[arg(long, global = true, env = "LAKEFILL_SOURCE_DB", value_name = "PATH")]
    source_db: Option<PathBuf>,

    /// Root of the local data lake
    #[arg(long, global = true, env = "LAKEFILL_LAKE_ROOT", value_name = "DIR")]
    lake_root: Option<PathBuf>,

    /// Print a JSON summary instead of tables
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Snapshot every source table into <lake>/raw
    Land {
        /// Partition date, YYYY-MM-DD (default: today)
        #[arg(long)]
        run_date: Option<String>,

        /// Output format: parquet or csv
        #[arg(long)]
        format: Option<OutputFormat>,
    },

    /// Build <lake>/cleaned/user_events from the source tables
    Normalize {
        /// Partition date, YYYY-MM-DD (default: today)
        #[arg(long)]
        run_date: Option<String>,

        /// Output format: parquet or csv
        #[arg(long)]
        format: Option<OutputFormat>,

        /// Lifetime spend below this marks a trial user
        #[arg(long)]
        trial_threshold: Option<f64>,

        /// Bind unit_price to TABLE.COLUMN instead of the first *unitprice* column
        #[arg(long, value_name = "TABLE.COLUMN")]
        price_column: Option<String>,
    },

    /// Upload every file under the lake root to object storage
    Upload {
        /// Azure Blob Storage container
        #[arg(long)]
        container: Option<String>,

        /// Copy into a local directory instead of Azure
        #[arg(long, value_name = "DIR")]
        to_dir: Option<PathBuf>,
    },

    /// Show the schema and first rows of a Parquet partition
    Inspect {
        /// Partition file (default: the run date's user_events partition)
        path: Option<PathBuf>,

        /// Partition date used when no path is given
        #[arg(long)]
        run_date: Option<String>,

        /// Number of rows to preview
        #[arg(short = 'n', long, default_value_t = lakefill::inspect::DEFAULT_PREVIEW_ROWS)]
        rows: usize,

        /// Only preview these columns (comma-separated)
        #[arg(long, value_delimiter = ',')]
        columns: Vec<String>,
    },
}

impl Cli {
    fn overrides(&self) -> ConfigOverrides {
        let mut overrides = ConfigOverrides {
            source_db: self.source_db.clone(),
            lake_root: self.lake_root.clone(),
            ..ConfigOverrides::default()
        };
        match &self.command {
            Commands::Land { format, .. } => overrides.format = *format,
            Commands::Normalize {
                format,
                trial_threshold,
                price_column,
                ..
            } => {
                overrides.format = *format;
                overrides.trial_threshold = *trial_threshold;
                overrides.price_column = price_column.clone();
            }
            Commands::Upload { container, .. } => overrides.container = container.clone(),
            Commands::Inspect { .. } => {}
        }
        overrides
    }
}

fn run_command(cli: Cli) -> Result<()> {
    let config = LakeConfig::load(cli.config.as_deref())?.apply(cli.overrides())?;
    debug!(?config, "Resolved configuration");
    let json = cli.json;

    match cli.command {
        Commands::Land { run_date, .. } => cli::land::run(
            cli::land::LandArgs {
                run_date: cli::resolve_run_date(run_date.as_deref())?,
                json,
            },
            &config,
        ),
        Commands::Normalize { run_date, .. } => cli::normalize::run(
            cli::normalize::NormalizeArgs {
                run_date: cli::resolve_run_date(run_date.as_deref())?,
                json,
            },
            &config,
        ),
        Commands::Upload { to_dir, .. } => {
            cli::upload::run(cli::upload::UploadArgs { to_dir, json }, &config)
        }
        Commands::Inspect {
            path,
            run_date,
            rows,
            columns,
        } => cli::inspect::run(
            cli::inspect::InspectArgs {
                path,
                run_date: cli::resolve_run_date(run_date.as_deref())?,
                rows,
                columns,
                json,
            },
            &config,
        ),
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let log_dir = match ensure_logs_dir() {
        Ok(dir) => dir,
        Err(err) => {
            eprintln!("Warning: failed to create logs directory: {:#}", err);
            None
        }
    };
    if let Err(err) = init_logging(LogConfig {
        app_name: "lakefill",
        verbose: cli.verbose,
        log_dir,
    }) {
        eprintln!("Warning: logging disabled: {:#}", err);
    }

    match run_command(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            match cli::error::to_helpful(&err) {
                Some(helpful) => eprint!("{}", helpful),
                None => eprintln!("ERROR: {:#}", err),
            }
            ExitCode::from(1)
        }
    }
}
