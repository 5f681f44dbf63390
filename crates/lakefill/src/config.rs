//! Layered run configuration.
//!
//! Built-in defaults, then an optional TOML file, then environment variables
//! and CLI flags (both resolved by clap, flags winning).

use anyhow::{Context, Result};
use lakefill_events::{EventMapping, NormalizeOptions, PriceBinding, DEFAULT_TRIAL_THRESHOLD};
use lakefill_sinks::OutputFormat;
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Config file picked up from the working directory when `--config` is absent.
pub const DEFAULT_CONFIG_FILE: &str = "lakefill.toml";
pub const DEFAULT_SOURCE_DB: &str = "legacy-db/Chinook_Sqlite.sqlite";
pub const DEFAULT_LAKE_ROOT: &str = "data_lake";
pub const DEFAULT_CONTAINER: &str = "data-lake";

pub const RAW_ZONE: &str = "raw";
pub const CLEANED_ZONE: &str = "cleaned";

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LakeConfig {
    pub source_db: PathBuf,
    pub lake_root: PathBuf,
    pub format: OutputFormat,
    pub trial_threshold: f64,
    /// `TABLE.COLUMN`; unset keeps the first-match heuristic.
    pub price_column: Option<String>,
    pub container: String,
    /// Per-table column names, for stores that drifted from Chinook.
    pub mapping: EventMapping,
}

impl Default for LakeConfig {
    fn default() -> Self {
        Self {
            source_db: PathBuf::from(DEFAULT_SOURCE_DB),
            lake_root: PathBuf::from(DEFAULT_LAKE_ROOT),
            format: OutputFormat::default(),
            trial_threshold: DEFAULT_TRIAL_THRESHOLD,
            price_column: None,
            container: DEFAULT_CONTAINER.to_string(),
            mapping: EventMapping::default(),
        }
    }
}

/// Values supplied on the command line or through the environment.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub source_db: Option<PathBuf>,
    pub lake_root: Option<PathBuf>,
    pub format: Option<OutputFormat>,
    pub trial_threshold: Option<f64>,
    pub price_column: Option<String>,
    pub container: Option<String>,
}

impl LakeConfig {
    /// Load `explicit`, or `lakefill.toml` in the working directory if present.
    ///
    /// An explicit path that does not exist is an error; a missing default
    /// file just means built-in defaults.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        match explicit {
            Some(path) => Self::from_file(path),
            None => {
                let path = Path::new(DEFAULT_CONFIG_FILE);
                if path.is_file() {
                    Self::from_file(path)
                } else {
                    Ok(Self::default())
                }
            }
        }
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        Self::from_toml(&content)
            .with_context(|| format!("Failed to parse config file {}", path.display()))
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        let config: LakeConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Apply CLI/env values over file values.
    pub fn apply(mut self, overrides: ConfigOverrides) -> Result<Self> {
        if let Some(source_db) = overrides.source_db {
            self.source_db = source_db;
        }
        if let Some(lake_root) = overrides.lake_root {
            self.lake_root = lake_root;
        }
        if let Some(format) = overrides.format {
            self.format = format;
        }
        if let Some(threshold) = overrides.trial_threshold {
            self.trial_threshold = threshold;
        }
        if let Some(price_column) = overrides.price_column {
            self.price_column = Some(price_column);
        }
        if let Some(container) = overrides.container {
            self.container = container;
        }
        self.validate()?;
        Ok(self)
    }

    fn validate(&self) -> Result<()> {
        if !self.trial_threshold.is_finite() {
            anyhow::bail!("trial_threshold must be a finite number, got {}", self.trial_threshold);
        }
        if self.container.trim().is_empty() {
            anyhow::bail!("container must not be empty");
        }
        self.price_binding()?;
        Ok(())
    }

    /// `<lake>/raw`
    pub fn raw_root(&self) -> PathBuf {
        self.lake_root.join(RAW_ZONE)
    }

    /// `<lake>/cleaned`
    pub fn cleaned_root(&self) -> PathBuf {
        self.lake_root.join(CLEANED_ZONE)
    }

    pub fn price_binding(&self) -> Result<PriceBinding> {
        match &self.price_column {
            None => Ok(PriceBinding::default()),
            Some(spec) => spec
                .parse::<PriceBinding>()
                .map_err(|e| anyhow::anyhow!("Invalid price_column: {}", e)),
        }
    }

    pub fn normalize_options(&self) -> Result<NormalizeOptions> {
        Ok(NormalizeOptions {
            mapping: self.mapping.clone().with_price(self.price_binding()?),
            trial_threshold: self.trial_threshold,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lakefill_events::SourceKind;

    #[test]
    fn test_defaults() {
        let config = LakeConfig::default();
        assert_eq!(config.source_db, PathBuf::from("legacy-db/Chinook_Sqlite.sqlite"));
        assert_eq!(config.raw_root(), PathBuf::from("data_lake/raw"));
        assert_eq!(config.cleaned_root(), PathBuf::from("data_lake/cleaned"));
        assert_eq!(config.format, OutputFormat::Parquet);
        assert_eq!(config.trial_threshold, 5.0);
        assert_eq!(config.container, "data-lake");
        assert_eq!(config.price_binding().unwrap(), PriceBinding::default());
    }

    #[test]
    fn test_toml_layer() {
        let config = LakeConfig::from_toml(
            r#"
            lake_root = "/srv/lake"
            format = "csv"
            price_column = "Track.UnitPrice"

            [mapping.customer]
            city = "Town"
            "#,
        )
        .unwrap();

        assert_eq!(config.lake_root, PathBuf::from("/srv/lake"));
        assert_eq!(config.format, OutputFormat::Csv);
        assert_eq!(config.source_db, PathBuf::from(DEFAULT_SOURCE_DB));
        assert_eq!(config.mapping.customer.city, "Town");
        assert_eq!(config.mapping.customer.country, "Country");

        let options = config.normalize_options().unwrap();
        assert_eq!(
            options.mapping.price,
            PriceBinding::Declared {
                source: SourceKind::Track,
                column: "UnitPrice".into()
            }
        );
    }

    #[test]
    fn test_toml_rejects_unknown_keys_and_bad_values() {
        assert!(LakeConfig::from_toml("lake_rot = \"x\"").is_err());
        assert!(LakeConfig::from_toml("format = \"json\"").is_err());
        assert!(LakeConfig::from_toml("price_column = \"UnitPrice\"").is_err());
    }

    #[test]
    fn test_overrides_win() {
        let config = LakeConfig::from_toml("lake_root = \"from-file\"\ntrial_threshold = 7.5")
            .unwrap()
            .apply(ConfigOverrides {
                lake_root: Some(PathBuf::from("from-cli")),
                container: Some("archive".into()),
                ..ConfigOverrides::default()
            })
            .unwrap();

        assert_eq!(config.lake_root, PathBuf::from("from-cli"));
        assert_eq!(config.trial_threshold, 7.5);
        assert_eq!(config.container, "archive");
    }

    #[test]
    fn test_override_validation() {
        let err = LakeConfig::default()
            .apply(ConfigOverrides {
                price_column: Some("Nowhere.Price".into()),
                ..ConfigOverrides::default()
            })
            .unwrap_err();
        assert!(err.to_string().contains("price_column"));
    }

    #[test]
    fn test_explicit_missing_file_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = LakeConfig::load(Some(&dir.path().join("missing.toml"))).unwrap_err();
        assert!(format!("{:#}", err).contains("missing.toml"));
    }
}
