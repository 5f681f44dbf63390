//! CLI module for lakefill
//!
//! One module per subcommand. Each resolves its paths from the layered
//! [`LakeConfig`](lakefill::LakeConfig) and prints a short summary on stdout.

pub mod error;
pub mod output;

pub mod inspect;
pub mod land;
pub mod normalize;
pub mod upload;

use anyhow::Result;
use lakefill::RunDate;

use crate::cli::error::HelpfulError;

/// The run date: `--run-date` when given, else today's local date.
pub fn resolve_run_date(flag: Option<&str>) -> Result<RunDate> {
    match flag {
        Some(text) => text
            .parse::<RunDate>()
            .map_err(|_| HelpfulError::invalid_run_date(text).into()),
        None => Ok(RunDate::today()),
    }
}
