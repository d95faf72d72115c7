//! Deduplication strategies
//!
//! The strategies themselves are applied by an external handler before
//! versioning runs. The planner only needs to know whether a strategy
//! collapses rows into a counted representative, since that adds a count
//! column to the temp staging table.

use serde::{Deserialize, Serialize};

/// Name of the row-count column added by counting strategies
pub const DEFAULT_COUNT_FIELD: &str = "ingest_count";

/// Policy for exact duplicate rows in staging
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeduplicationStrategy {
    /// Keep duplicates as they are (default)
    #[default]
    AllowDuplicates,
    /// Collapse duplicates into one row carrying their count
    FilterDuplicates,
    /// Collapse duplicates, then fail the batch if any count exceeds one
    FailOnDuplicates,
}

impl DeduplicationStrategy {
    /// Count column this strategy adds, if any
    pub fn dedup_field(self) -> Option<&'static str> {
        match self {
            DeduplicationStrategy::AllowDuplicates => None,
            DeduplicationStrategy::FilterDuplicates | DeduplicationStrategy::FailOnDuplicates => {
                Some(DEFAULT_COUNT_FIELD)
            }
        }
    }

    /// Whether staging must be materialized before versioning
    pub fn is_temp_table_needed(self) -> bool {
        self.dedup_field().is_some()
    }

    pub fn fails_on_duplicates(self) -> bool {
        self == DeduplicationStrategy::FailOnDuplicates
    }
}

impl std::str::FromStr for DeduplicationStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "allow_duplicates" | "allow" => Ok(DeduplicationStrategy::AllowDuplicates),
            "filter_duplicates" | "filter" => Ok(DeduplicationStrategy::FilterDuplicates),
            "fail_on_duplicates" | "fail" => Ok(DeduplicationStrategy::FailOnDuplicates),
            _ => Err(format!(
                "Unknown deduplication strategy: {}. Use 'allow_duplicates', 'filter_duplicates' or 'fail_on_duplicates'.",
                s
            )),
        }
    }
}

impl std::fmt::Display for DeduplicationStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DeduplicationStrategy::AllowDuplicates => write!(f, "allow_duplicates"),
            DeduplicationStrategy::FilterDuplicates => write!(f, "filter_duplicates"),
            DeduplicationStrategy::FailOnDuplicates => write!(f, "fail_on_duplicates"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dedup_field() {
        assert_eq!(DeduplicationStrategy::AllowDuplicates.dedup_field(), None);
        assert_eq!(
            DeduplicationStrategy::FilterDuplicates.dedup_field(),
            Some(DEFAULT_COUNT_FIELD)
        );
        assert!(DeduplicationStrategy::FailOnDuplicates.is_temp_table_needed());
        assert!(!DeduplicationStrategy::AllowDuplicates.is_temp_table_needed());
    }

    #[test]
    fn test_from_str_round_trips_display() {
        for strategy in [
            DeduplicationStrategy::AllowDuplicates,
            DeduplicationStrategy::FilterDuplicates,
            DeduplicationStrategy::FailOnDuplicates,
        ] {
            assert_eq!(
                strategy.to_string().parse::<DeduplicationStrategy>(),
                Ok(strategy)
            );
        }
        assert_eq!(
            "Fail-On-Duplicates".parse::<DeduplicationStrategy>(),
            Ok(DeduplicationStrategy::FailOnDuplicates)
        );
        assert!("drop".parse::<DeduplicationStrategy>().is_err());
    }
}
