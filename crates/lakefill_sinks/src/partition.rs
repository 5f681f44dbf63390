//! Run dates and partition paths.
//!
//! Every dataset lands under `<root>/<dataset>/<run-date>/<dataset>.<ext>`.
//! Re-running on the same date targets the same file, which is how a day's
//! partition gets replaced.

use chrono::NaiveDate;
use serde::Deserialize;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use thiserror::Error;

const RUN_DATE_FORMAT: &str = "%Y-%m-%d";

/// The date a run writes its partitions under.
///
/// Computed once per process and passed explicitly to every stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RunDate(NaiveDate);

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Invalid run date '{input}': expected YYYY-MM-DD")]
pub struct RunDateError {
    input: String,
}

impl RunDate {
    pub fn new(date: NaiveDate) -> Self {
        Self(date)
    }

    /// Local wall-clock date.
    pub fn today() -> Self {
        Self(chrono::Local::now().date_naive())
    }

    pub fn date(&self) -> NaiveDate {
        self.0
    }
}

impl fmt::Display for RunDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format(RUN_DATE_FORMAT))
    }
}

impl FromStr for RunDate {
    type Err = RunDateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        NaiveDate::parse_from_str(s.trim(), RUN_DATE_FORMAT)
            .map(RunDate)
            .map_err(|_| RunDateError {
                input: s.to_string(),
            })
    }
}

/// Columnar file format of a partition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Parquet,
    Csv,
}

impl OutputFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Parquet => "parquet",
            OutputFormat::Csv => "csv",
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "parquet" => Ok(OutputFormat::Parquet),
            "csv" => Ok(OutputFormat::Csv),
            other => Err(format!(
                "Unknown output format '{}' (expected parquet or csv)",
                other
            )),
        }
    }
}

/// Where one dataset's partition for one run date lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartitionTarget {
    root: PathBuf,
    dataset: String,
    run_date: RunDate,
    format: OutputFormat,
}

impl PartitionTarget {
    /// Fails if the dataset name is empty or would escape its directory.
    pub fn new(
        root: impl Into<PathBuf>,
        dataset: impl Into<String>,
        run_date: RunDate,
        format: OutputFormat,
    ) -> Result<Self, String> {
        let dataset = dataset.into();
        if dataset.is_empty()
            || dataset == "."
            || dataset == ".."
            || dataset.contains(['/', '\\'])
        {
            return Err(format!("Invalid dataset name: '{}'", dataset));
        }
        Ok(Self {
            root: root.into(),
            dataset,
            run_date,
            format,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn dataset(&self) -> &str {
        &self.dataset
    }

    pub fn run_date(&self) -> RunDate {
        self.run_date
    }

    pub fn format(&self) -> OutputFormat {
        self.format
    }

    /// `<root>/<dataset>/<run-date>`
    pub fn dir(&self) -> PathBuf {
        self.root
            .join(&self.dataset)
            .join(self.run_date.to_string())
    }

    /// `<dataset>.<ext>`
    pub fn file_name(&self) -> String {
        format!("{}.{}", self.dataset, self.format.extension())
    }

    pub fn final_path(&self) -> PathBuf {
        self.dir().join(self.file_name())
    }

    /// Hidden staging file next to the final path.
    pub fn temp_path(&self) -> PathBuf {
        self.dir().join(format!(".{}.tmp", self.file_name()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run_date() -> RunDate {
        "2025-12-13".parse().unwrap()
    }

    #[test]
    fn test_run_date_display() {
        let date = RunDate::new(NaiveDate::from_ymd_opt(2009, 1, 5).unwrap());
        assert_eq!(date.to_string(), "2009-01-05");
    }

    #[test]
    fn test_run_date_rejects_other_layouts() {
        assert!("13/12/2025".parse::<RunDate>().is_err());
        assert!("2025-13-01".parse::<RunDate>().is_err());
        let err = "yesterday".parse::<RunDate>().unwrap_err();
        assert!(err.to_string().contains("YYYY-MM-DD"));
    }

    #[test]
    fn test_partition_paths() {
        let target =
            PartitionTarget::new("data_lake/cleaned", "user_events", run_date(), OutputFormat::Parquet)
                .unwrap();
        assert_eq!(
            target.final_path(),
            PathBuf::from("data_lake/cleaned/user_events/2025-12-13/user_events.parquet")
        );
        assert_eq!(
            target.temp_path(),
            PathBuf::from("data_lake/cleaned/user_events/2025-12-13/.user_events.parquet.tmp")
        );
    }

    #[test]
    fn test_partition_rejects_path_like_dataset() {
        for bad in ["", "..", "a/b", "a\\b"] {
            assert!(
                PartitionTarget::new("root", bad, run_date(), OutputFormat::Csv).is_err(),
                "dataset {:?} should be rejected",
                bad
            );
        }
    }

    #[test]
    fn test_output_format_parsing() {
        assert_eq!("PARQUET".parse::<OutputFormat>().unwrap(), OutputFormat::Parquet);
        assert_eq!("csv".parse::<OutputFormat>().unwrap(), OutputFormat::Csv);
        assert!("orc".parse::<OutputFormat>().is_err());
        assert_eq!(OutputFormat::Csv.to_string(), "csv");
    }
}
