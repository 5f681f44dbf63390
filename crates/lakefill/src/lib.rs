//! Lakefill - legacy store to data lake batch jobs.
//!
//! Stages, each run independently by a `lakefill` subcommand:
//! - **land**: snapshot every source table under `<lake>/raw`
//! - **normalize**: build `user_events` under `<lake>/cleaned`
//! - **upload**: copy the lake tree to object storage
//! - **inspect**: print the schema and leading rows of a partition

pub mod config;
pub mod inspect;
pub mod landing;
pub mod pipeline;
pub mod upload;

pub use config::{ConfigOverrides, LakeConfig};
pub use inspect::{inspect_partition, InspectError, PartitionPreview};
pub use landing::land_all;
pub use lakefill_sinks::{OutputArtifact, OutputFormat, RunDate};
pub use pipeline::{run_normalize, NormalizeReport};
pub use upload::{upload_tree, UploadReport};
