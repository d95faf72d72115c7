//! Versioning strategies
//!
//! A versioning strategy decides which staging rows survive when the same
//! primary key appears more than once in a batch, and how staging rows are
//! compared with the main table at merge time.

use serde::{Deserialize, Serialize};

use super::deduplication::DeduplicationStrategy;
use crate::error::{PlanError, PlanResult};
use crate::logical_plan::ComparisonOperator;

/// Default name of the data split column added by [`AllVersions`]
pub const DEFAULT_DATA_SPLIT_FIELD: &str = "ingest_data_split";

/// How a staging version must relate to the main version to win
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VersionComparator {
    GreaterThan,
    GreaterThanEqualTo,
}

impl VersionComparator {
    /// Operator applied as `staging.version <op> main.version`
    pub fn operator(self) -> ComparisonOperator {
        match self {
            VersionComparator::GreaterThan => ComparisonOperator::GreaterThan,
            VersionComparator::GreaterThanEqualTo => ComparisonOperator::GreaterThanEqualTo,
        }
    }
}

/// How the merge decides whether a staging row replaces a main row
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MergeDataVersionResolver {
    /// Replace whenever the digests differ
    DigestBased,
    /// Replace when the staging version wins the comparison
    VersionColumnBased {
        version_comparator: VersionComparator,
    },
}

/// No version column; duplicates may optionally fail the batch
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NoVersioning {
    #[serde(default)]
    pub fail_on_duplicate_primary_keys: bool,
}

/// Keep only the highest version of each primary key
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MaxVersion {
    pub versioning_field: String,
    #[serde(default = "default_true")]
    pub perform_stage_versioning: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub merge_data_version_resolver: Option<MergeDataVersionResolver>,
}

/// Keep every version, tagged with an ascending data split ordinal
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllVersions {
    pub versioning_field: String,
    #[serde(default = "default_data_split_field")]
    pub data_split_field_name: String,
    #[serde(default = "default_true")]
    pub perform_stage_versioning: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub merge_data_version_resolver: Option<MergeDataVersionResolver>,
}

fn default_true() -> bool {
    true
}

fn default_data_split_field() -> String {
    DEFAULT_DATA_SPLIT_FIELD.to_string()
}

impl MaxVersion {
    /// Stage versioning on, no resolver
    pub fn new(versioning_field: impl Into<String>) -> Self {
        Self {
            versioning_field: versioning_field.into(),
            perform_stage_versioning: true,
            merge_data_version_resolver: None,
        }
    }

    pub fn with_stage_versioning(mut self, perform_stage_versioning: bool) -> Self {
        self.perform_stage_versioning = perform_stage_versioning;
        self
    }

    pub fn with_resolver(mut self, resolver: MergeDataVersionResolver) -> Self {
        self.merge_data_version_resolver = Some(resolver);
        self
    }
}

impl AllVersions {
    /// Stage versioning on, default data split field, no resolver
    pub fn new(versioning_field: impl Into<String>) -> Self {
        Self {
            versioning_field: versioning_field.into(),
            data_split_field_name: default_data_split_field(),
            perform_stage_versioning: true,
            merge_data_version_resolver: None,
        }
    }

    pub fn with_data_split_field(mut self, data_split_field_name: impl Into<String>) -> Self {
        self.data_split_field_name = data_split_field_name.into();
        self
    }

    pub fn with_stage_versioning(mut self, perform_stage_versioning: bool) -> Self {
        self.perform_stage_versioning = perform_stage_versioning;
        self
    }

    pub fn with_resolver(mut self, resolver: MergeDataVersionResolver) -> Self {
        self.merge_data_version_resolver = Some(resolver);
        self
    }
}

/// Versioning strategy
///
/// # Example
///
/// ```rust
/// use ingest_versioning::models::versioning::{AllVersions, VersioningStrategy};
///
/// let strategy: VersioningStrategy = AllVersions::new("version")
///     .with_data_split_field("split")
///     .into();
/// assert_eq!(strategy.versioning_field(), Some("version"));
/// assert_eq!(strategy.data_split_field(), Some("split"));
/// assert!(strategy.is_temp_table_needed());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum VersioningStrategy {
    NoVersioning(NoVersioning),
    MaxVersion(MaxVersion),
    AllVersions(AllVersions),
}

impl Default for VersioningStrategy {
    fn default() -> Self {
        VersioningStrategy::NoVersioning(NoVersioning::default())
    }
}

impl From<NoVersioning> for VersioningStrategy {
    fn from(strategy: NoVersioning) -> Self {
        VersioningStrategy::NoVersioning(strategy)
    }
}

impl From<MaxVersion> for VersioningStrategy {
    fn from(strategy: MaxVersion) -> Self {
        VersioningStrategy::MaxVersion(strategy)
    }
}

impl From<AllVersions> for VersioningStrategy {
    fn from(strategy: AllVersions) -> Self {
        VersioningStrategy::AllVersions(strategy)
    }
}

impl VersioningStrategy {
    pub fn no_versioning(fail_on_duplicate_primary_keys: bool) -> Self {
        VersioningStrategy::NoVersioning(NoVersioning {
            fail_on_duplicate_primary_keys,
        })
    }

    pub fn name(&self) -> &'static str {
        match self {
            VersioningStrategy::NoVersioning(_) => "NoVersioning",
            VersioningStrategy::MaxVersion(_) => "MaxVersion",
            VersioningStrategy::AllVersions(_) => "AllVersions",
        }
    }

    /// Data split column name, present only for [`AllVersions`]
    pub fn data_split_field(&self) -> Option<&str> {
        match self {
            VersioningStrategy::NoVersioning(_) | VersioningStrategy::MaxVersion(_) => None,
            VersioningStrategy::AllVersions(all) => Some(all.data_split_field_name.as_str()),
        }
    }

    pub fn versioning_field(&self) -> Option<&str> {
        match self {
            VersioningStrategy::NoVersioning(_) => None,
            VersioningStrategy::MaxVersion(max) => Some(max.versioning_field.as_str()),
            VersioningStrategy::AllVersions(all) => Some(all.versioning_field.as_str()),
        }
    }

    /// Whether versioning runs over staging before the merge
    pub fn perform_stage_versioning(&self) -> bool {
        match self {
            VersioningStrategy::NoVersioning(_) => false,
            VersioningStrategy::MaxVersion(max) => max.perform_stage_versioning,
            VersioningStrategy::AllVersions(all) => all.perform_stage_versioning,
        }
    }

    /// Whether staging must be materialized into a temp table for versioning
    pub fn is_temp_table_needed(&self) -> bool {
        self.perform_stage_versioning()
    }

    /// Whether the duplicate primary key probes must run
    pub fn is_duplicate_pk_check_needed(&self) -> bool {
        match self {
            VersioningStrategy::NoVersioning(no) => no.fail_on_duplicate_primary_keys,
            VersioningStrategy::MaxVersion(_) | VersioningStrategy::AllVersions(_) => false,
        }
    }

    /// Whether the data error probes must run
    pub fn is_data_error_check_needed(&self) -> bool {
        self.perform_stage_versioning()
    }

    /// Resolver for versioned strategies, `None` for [`NoVersioning`] or when unset
    pub fn merge_data_version_resolver(&self) -> Option<&MergeDataVersionResolver> {
        match self {
            VersioningStrategy::NoVersioning(_) => None,
            VersioningStrategy::MaxVersion(max) => max.merge_data_version_resolver.as_ref(),
            VersioningStrategy::AllVersions(all) => all.merge_data_version_resolver.as_ref(),
        }
    }

    /// Reject `fail_on_duplicate_primary_keys` unless duplicates also fail the batch
    pub fn validate_deduplication(&self, deduplication: DeduplicationStrategy) -> PlanResult<()> {
        if self.is_duplicate_pk_check_needed() && !deduplication.fails_on_duplicates() {
            return Err(PlanError::InvalidDeduplicationPairing);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_versioning_accessors() {
        let strategy = VersioningStrategy::no_versioning(true);
        assert_eq!(strategy.name(), "NoVersioning");
        assert_eq!(strategy.versioning_field(), None);
        assert_eq!(strategy.data_split_field(), None);
        assert!(!strategy.is_temp_table_needed());
        assert!(strategy.is_duplicate_pk_check_needed());
        assert!(strategy.merge_data_version_resolver().is_none());
    }

    #[test]
    fn test_max_version_accessors() {
        let strategy: VersioningStrategy = MaxVersion::new("version")
            .with_resolver(MergeDataVersionResolver::DigestBased)
            .into();
        assert_eq!(strategy.versioning_field(), Some("version"));
        assert_eq!(strategy.data_split_field(), None);
        assert!(strategy.is_temp_table_needed());
        assert!(!strategy.is_duplicate_pk_check_needed());
        assert_eq!(
            strategy.merge_data_version_resolver(),
            Some(&MergeDataVersionResolver::DigestBased)
        );

        let deferred: VersioningStrategy =
            MaxVersion::new("version").with_stage_versioning(false).into();
        assert!(!deferred.is_temp_table_needed());
        assert!(!deferred.is_data_error_check_needed());
    }

    #[test]
    fn test_all_versions_default_split_field() {
        let strategy: VersioningStrategy = AllVersions::new("version").into();
        assert_eq!(strategy.data_split_field(), Some(DEFAULT_DATA_SPLIT_FIELD));
    }

    #[test]
    fn test_validate_deduplication_pairing() {
        let strict = VersioningStrategy::no_versioning(true);
        assert!(
            strict
                .validate_deduplication(DeduplicationStrategy::FailOnDuplicates)
                .is_ok()
        );
        assert_eq!(
            strict.validate_deduplication(DeduplicationStrategy::FilterDuplicates),
            Err(PlanError::InvalidDeduplicationPairing)
        );
        assert_eq!(
            strict.validate_deduplication(DeduplicationStrategy::AllowDuplicates),
            Err(PlanError::InvalidDeduplicationPairing)
        );

        let lenient = VersioningStrategy::no_versioning(false);
        assert!(
            lenient
                .validate_deduplication(DeduplicationStrategy::AllowDuplicates)
                .is_ok()
        );
    }

    #[test]
    fn test_comparator_operator() {
        assert_eq!(
            VersionComparator::GreaterThan.operator(),
            ComparisonOperator::GreaterThan
        );
        assert_eq!(
            VersionComparator::GreaterThanEqualTo.operator(),
            ComparisonOperator::GreaterThanEqualTo
        );
    }

    #[test]
    fn test_deserialize_tagged_strategy() {
        let json = r#"{
            "type": "all_versions",
            "versioning_field": "version",
            "data_split_field_name": "split",
            "merge_data_version_resolver": {
                "type": "version_column_based",
                "version_comparator": "greater_than_equal_to"
            }
        }"#;
        let strategy: VersioningStrategy = serde_json::from_str(json).unwrap();
        let VersioningStrategy::AllVersions(all) = strategy else {
            panic!("expected AllVersions");
        };
        assert!(all.perform_stage_versioning);
        assert_eq!(all.data_split_field_name, "split");
        assert_eq!(
            all.merge_data_version_resolver,
            Some(MergeDataVersionResolver::VersionColumnBased {
                version_comparator: VersionComparator::GreaterThanEqualTo
            })
        );
    }
}
