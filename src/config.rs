//! Planner configuration file support
//!
//! Handles parsing of `ingest.toml` configuration files and environment
//! variable overrides.

use std::path::Path;

use anyhow::Context;
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::error::{ConfigError, ConfigResult};
use crate::models::deduplication::DeduplicationStrategy;
use crate::models::versioning::VersioningStrategy;

/// Default number of offending rows sampled by the rows probes
pub const DEFAULT_SAMPLE_ROW_COUNT: u64 = 20;

/// Default configuration filename
pub const CONFIG_FILENAME: &str = "ingest.toml";

/// Environment variable for the sample row count
pub const ENV_SAMPLE_ROW_COUNT: &str = "INGEST_SAMPLE_ROW_COUNT";

/// Environment variable for the ingest run id
pub const ENV_RUN_ID: &str = "INGEST_RUN_ID";

/// Environment variable for the deduplication strategy
pub const ENV_DEDUPLICATION: &str = "INGEST_DEDUPLICATION_STRATEGY";

/// Planner options section
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlannerOptions {
    /// Maximum rows returned by each rows probe
    #[serde(default = "default_sample_row_count")]
    pub sample_row_count: u64,

    /// Identifier of this ingestion run, used to name temp tables
    #[serde(default = "default_run_id")]
    pub ingest_run_id: String,

    /// Reference projected count aliases in `HAVING` instead of repeating the expression
    #[serde(default = "default_true")]
    pub use_alias_in_having: bool,

    /// Digest column for digest based merge conditions and data error probes
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub digest_field: Option<String>,
}

fn default_sample_row_count() -> u64 {
    DEFAULT_SAMPLE_ROW_COUNT
}

fn default_run_id() -> String {
    Uuid::new_v4().to_string()
}

fn default_true() -> bool {
    true
}

impl Default for PlannerOptions {
    fn default() -> Self {
        Self {
            sample_row_count: default_sample_row_count(),
            ingest_run_id: default_run_id(),
            use_alias_in_having: true,
            digest_field: None,
        }
    }
}

impl PlannerOptions {
    pub fn with_digest_field(mut self, digest_field: impl Into<String>) -> Self {
        self.digest_field = Some(digest_field.into());
        self
    }

    pub fn with_run_id(mut self, ingest_run_id: impl Into<String>) -> Self {
        self.ingest_run_id = ingest_run_id.into();
        self
    }

    pub fn with_sample_row_count(mut self, sample_row_count: u64) -> Self {
        self.sample_row_count = sample_row_count;
        self
    }
}

/// Deduplication section
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DeduplicationSection {
    #[serde(default)]
    pub strategy: DeduplicationStrategy,
}

/// Main configuration structure
///
/// Represents the `ingest.toml` configuration file format.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct IngestConfig {
    #[serde(default)]
    pub options: PlannerOptions,

    #[serde(default)]
    pub deduplication: DeduplicationSection,

    #[serde(default)]
    pub versioning: VersioningStrategy,
}

impl IngestConfig {
    /// Create a new default configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Load configuration from a file and apply environment overrides
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        let mut config = Self::parse(&content)
            .with_context(|| format!("Invalid config {}", path.display()))?;

        config.apply_env_overrides()?;
        info!(
            "Loaded ingest config from {} (run {})",
            path.display(),
            config.options.ingest_run_id
        );

        Ok(config)
    }

    /// Parse configuration from TOML string
    pub fn parse(content: &str) -> ConfigResult<Self> {
        let config: Self = toml::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Convert configuration to TOML string
    pub fn to_toml(&self) -> ConfigResult<String> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::Serialize(e.to_string()))
    }

    /// Reject values no plan can be built from
    pub fn validate(&self) -> ConfigResult<()> {
        if self.options.sample_row_count == 0 {
            return Err(ConfigError::InvalidValue {
                key: "sample_row_count",
                value: "0".to_string(),
            });
        }
        if self.options.ingest_run_id.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                key: "ingest_run_id",
                value: self.options.ingest_run_id.clone(),
            });
        }
        Ok(())
    }

    /// Apply environment variable overrides
    pub fn apply_env_overrides(&mut self) -> ConfigResult<()> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from any key lookup, using the `ENV_*` names as keys
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) -> ConfigResult<()> {
        // Sample row count
        if let Some(count) = lookup(ENV_SAMPLE_ROW_COUNT) {
            self.options.sample_row_count =
                count.parse().map_err(|_| ConfigError::InvalidValue {
                    key: ENV_SAMPLE_ROW_COUNT,
                    value: count.clone(),
                })?;
        }

        // Run id
        if let Some(run_id) = lookup(ENV_RUN_ID) {
            self.options.ingest_run_id = run_id;
        }

        // Deduplication strategy
        if let Some(strategy) = lookup(ENV_DEDUPLICATION) {
            self.deduplication.strategy = strategy
                .parse()
                .map_err(|_| ConfigError::InvalidValue {
                    key: ENV_DEDUPLICATION,
                    value: strategy.clone(),
                })?;
        }

        self.validate()
    }
}

/// Generate a sample configuration file content
pub fn sample_config() -> &'static str {
    r#"# Ingest versioning configuration

[options]
# Maximum offending rows returned by each rows probe
sample_row_count = 20
# Reference projected count aliases in HAVING clauses
use_alias_in_having = true
# Digest column compared by digest based merge conditions
digest_field = "digest"
# ingest_run_id defaults to a random UUID

[deduplication]
# "allow_duplicates" (default), "filter_duplicates" or "fail_on_duplicates"
strategy = "fail_on_duplicates"

[versioning]
# "no_versioning" (default), "max_version" or "all_versions"
type = "all_versions"
versioning_field = "version"
data_split_field_name = "data_split"
perform_stage_versioning = true

[versioning.merge_data_version_resolver]
# "digest_based" or "version_column_based"
type = "version_column_based"
version_comparator = "greater_than"
"#
}
