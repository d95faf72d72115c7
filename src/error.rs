//! Error types for plan construction and configuration
//!
//! Configuration errors surface while a plan is being built, before any
//! query runs. They are never retryable. Data errors discovered by running
//! the probe plans live in [`crate::quality`].

use thiserror::Error;

use crate::validation::identifiers::ValidationError;

/// Errors raised while building logical plans
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PlanError {
    /// `failOnDuplicatePrimaryKeys` paired with a deduplication strategy other than fail-on-duplicates
    #[error(
        "For failOnDuplicatePrimaryKeys, FailOnDuplicates must be selected as the DeduplicationStrategy"
    )]
    InvalidDeduplicationPairing,

    /// A versioned strategy was asked for a merge condition without a resolver
    #[error("mergeDataVersionResolver must be provided for {0} versioning strategy")]
    MissingMergeResolver(&'static str),

    /// Versioned strategies rank within primary keys, so at least one is needed
    #[error("Primary key list must not be empty")]
    EmptyPrimaryKeys,

    #[error("Versioning field cannot be a primary key")]
    VersioningFieldIsPrimaryKey,

    #[error("Versioning field [{0}] not found in Staging Schema")]
    VersioningFieldNotFound(String),

    #[error("Versioning field's data type [{0}] is not supported")]
    UnsupportedVersioningFieldType(String),

    /// Digest based conditions were requested without naming the digest column
    #[error("Digest field is required for digest based merge conditions")]
    MissingDigestField,

    /// Main and the staging dataset the merge reads resolve to the same qualifier
    #[error("Main and staging datasets are both referenced as [{0}]")]
    AmbiguousDatasetQualifier(String),

    /// A column the planner adds to staging already exists or is added twice
    #[error("Field [{0}] added by the planner already exists in Staging Schema")]
    InternalFieldConflict(String),

    /// A built plan references a column its source chain does not produce
    #[error("Field [{field}] is not present in dataset [{dataset}]")]
    UnresolvedField { field: String, dataset: String },

    #[error("Invalid identifier: {0}")]
    InvalidIdentifier(#[from] ValidationError),
}

/// Result type for plan construction
pub type PlanResult<T> = Result<T, PlanError>;

/// Errors raised while reading or writing planner configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to parse config: {0}")]
    Parse(String),

    #[error("Failed to serialize config: {0}")]
    Serialize(String),

    #[error("Invalid value for {key}: {value}")]
    InvalidValue { key: &'static str, value: String },
}

/// Result type for configuration operations
pub type ConfigResult<T> = Result<T, ConfigError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_match_reported_text() {
        assert_eq!(
            PlanError::VersioningFieldNotFound("version".to_string()).to_string(),
            "Versioning field [version] not found in Staging Schema"
        );
        assert_eq!(
            PlanError::EmptyPrimaryKeys.to_string(),
            "Primary key list must not be empty"
        );
    }

    #[test]
    fn test_validation_error_converts() {
        let err: PlanError = ValidationError::Empty("field name").into();
        assert!(matches!(err, PlanError::InvalidIdentifier(_)));
    }
}
