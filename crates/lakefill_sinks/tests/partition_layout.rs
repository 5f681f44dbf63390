//! Property tests for partition path layout.
//!
//! Every dataset/date pair must map to exactly one file at
//! `<root>/<dataset>/<YYYY-MM-DD>/<dataset>.<ext>`, and the date segment must
//! parse back to the same run date.

use chrono::NaiveDate;
use lakefill_sinks::{OutputFormat, PartitionTarget, RunDate};
use proptest::prelude::*;
use std::collections::HashSet;
use std::path::Path;

fn run_date_strategy() -> impl Strategy<Value = RunDate> {
    (1990i32..2100, 1u32..=12, 1u32..=28).prop_map(|(y, m, d)| {
        RunDate::new(NaiveDate::from_ymd_opt(y, m, d).unwrap())
    })
}

proptest! {
    #[test]
    fn partition_path_has_fixed_shape(
        dataset in "[A-Za-z][A-Za-z0-9_]{0,20}",
        run_date in run_date_strategy(),
    ) {
        let target = PartitionTarget::new("lake", dataset.clone(), run_date, OutputFormat::Parquet).unwrap();
        let path = target.final_path();

        let parts: Vec<String> = path
            .iter()
            .map(|p| p.to_string_lossy().into_owned())
            .collect();
        prop_assert_eq!(parts.len(), 4);
        prop_assert_eq!(&parts[0], "lake");
        prop_assert_eq!(&parts[1], &dataset);
        prop_assert_eq!(parts[2].len(), 10);
        prop_assert_eq!(parts[2].parse::<RunDate>().unwrap(), run_date);
        prop_assert_eq!(parts[3].clone(), format!("{}.parquet", dataset));

        // Temp file stays in the same directory so the final rename never crosses filesystems
        let temp_path = target.temp_path();
        let dir = target.dir();
        prop_assert_eq!(temp_path.parent(), Some(dir.as_path()));
    }
}

/// Distinct dates must never share a partition directory.
#[test]
fn test_no_collisions_across_a_decade() {
    let start = NaiveDate::from_ymd_opt(2015, 1, 1).unwrap();
    let mut dirs = HashSet::new();

    for offset in 0..3650 {
        let date = RunDate::new(start + chrono::Duration::days(offset));
        let target = PartitionTarget::new("lake", "user_events", date, OutputFormat::Csv).unwrap();
        assert!(
            dirs.insert(target.dir()),
            "Collision detected for run date {}",
            date
        );
    }

    assert_eq!(dirs.len(), 3650);
}

#[test]
fn test_format_follows_extension() {
    let date: RunDate = "2024-02-29".parse().unwrap();
    let target = PartitionTarget::new("lake", "Artist", date, OutputFormat::Csv).unwrap();
    assert_eq!(target.format(), OutputFormat::Csv);
    assert_eq!(target.final_path(), Path::new("lake/Artist/2024-02-29/Artist.csv"));
}
