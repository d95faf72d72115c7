//! Data quality errors reported from executed probe plans
//!
//! The planner only builds probes. Once an orchestrator has run them, the
//! results come back here to be turned into a pass or a
//! [`DataQualityError`] carrying a bounded sample of offending rows.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

use crate::models::deduplication::DEFAULT_COUNT_FIELD;
use crate::versioning::error_checks::{
    ERROR_COUNT_ALIAS, MAX_DATA_ERRORS, MAX_DUPLICATES, MAX_PK_DUPLICATES, PK_COUNT_ALIAS,
};

/// A result row, column name to value
pub type Row = BTreeMap<String, serde_json::Value>;

/// Kind of data error a probe detects
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCategory {
    /// Exact duplicate rows under fail-on-duplicates
    Duplicates,
    /// Repeated primary keys under `fail_on_duplicate_primary_keys`
    DuplicatePrimaryKeys,
    /// Same primary key and version with different data
    DataVersionError,
}

impl ErrorCategory {
    pub fn message(self) -> &'static str {
        match self {
            ErrorCategory::Duplicates => {
                "Encountered Duplicates, Failing the batch as Fail on Duplicates is set as Deduplication strategy"
            }
            ErrorCategory::DuplicatePrimaryKeys => {
                "Encountered duplicate primary keys, Failing the batch as Fail on Duplicate Primary Keys is selected"
            }
            ErrorCategory::DataVersionError => {
                "Encountered Data errors (same PK, same version but different data), hence failing the batch"
            }
        }
    }

    /// Key under which the offending count is reported in [`DataError::details`]
    pub fn detail_key(self) -> &'static str {
        match self {
            ErrorCategory::Duplicates => "num_duplicates",
            ErrorCategory::DuplicatePrimaryKeys => "num_pk_duplicates",
            ErrorCategory::DataVersionError => "num_data_version_errors",
        }
    }
}

/// Probe plans the planner can build
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCheckKind {
    MaxDuplicates,
    DuplicateRows,
    MaxPkDuplicates,
    PkDuplicateRows,
    MaxDataErrors,
    DataErrorRows,
}

impl ErrorCheckKind {
    pub fn category(self) -> ErrorCategory {
        match self {
            ErrorCheckKind::MaxDuplicates | ErrorCheckKind::DuplicateRows => {
                ErrorCategory::Duplicates
            }
            ErrorCheckKind::MaxPkDuplicates | ErrorCheckKind::PkDuplicateRows => {
                ErrorCategory::DuplicatePrimaryKeys
            }
            ErrorCheckKind::MaxDataErrors | ErrorCheckKind::DataErrorRows => {
                ErrorCategory::DataVersionError
            }
        }
    }

    /// Column holding the single value a `max` probe returns
    pub fn max_alias(self) -> Option<&'static str> {
        match self {
            ErrorCheckKind::MaxDuplicates => Some(MAX_DUPLICATES),
            ErrorCheckKind::MaxPkDuplicates => Some(MAX_PK_DUPLICATES),
            ErrorCheckKind::MaxDataErrors => Some(MAX_DATA_ERRORS),
            ErrorCheckKind::DuplicateRows
            | ErrorCheckKind::PkDuplicateRows
            | ErrorCheckKind::DataErrorRows => None,
        }
    }

    /// Rows probe to run when this `max` probe exceeds one
    pub fn rows_probe(self) -> Option<ErrorCheckKind> {
        match self {
            ErrorCheckKind::MaxDuplicates => Some(ErrorCheckKind::DuplicateRows),
            ErrorCheckKind::MaxPkDuplicates => Some(ErrorCheckKind::PkDuplicateRows),
            ErrorCheckKind::MaxDataErrors => Some(ErrorCheckKind::DataErrorRows),
            ErrorCheckKind::DuplicateRows
            | ErrorCheckKind::PkDuplicateRows
            | ErrorCheckKind::DataErrorRows => None,
        }
    }

    /// Column of a rows probe holding the per-group count
    pub fn count_column(self) -> Option<&'static str> {
        match self {
            ErrorCheckKind::DuplicateRows => Some(DEFAULT_COUNT_FIELD),
            ErrorCheckKind::PkDuplicateRows => Some(PK_COUNT_ALIAS),
            ErrorCheckKind::DataErrorRows => Some(ERROR_COUNT_ALIAS),
            ErrorCheckKind::MaxDuplicates
            | ErrorCheckKind::MaxPkDuplicates
            | ErrorCheckKind::MaxDataErrors => None,
        }
    }
}

/// One offending record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataError {
    pub category: ErrorCategory,
    /// Identifying columns of the offending group
    pub record: Row,
    /// Counts keyed by [`ErrorCategory::detail_key`]
    #[serde(default)]
    pub details: BTreeMap<String, serde_json::Value>,
}

/// A batch failed because its data violates the configured strategies
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{message}")]
pub struct DataQualityError {
    pub category: ErrorCategory,
    pub message: String,
    pub errors: Vec<DataError>,
}

/// Read the single value of an executed `max` probe.
///
/// Returns `None` for a non-max probe, an empty result or a NULL value
/// (an empty staging table).
pub fn max_probe_value(kind: ErrorCheckKind, rows: &[Row]) -> Option<i64> {
    let alias = kind.max_alias()?;
    rows.first()?.get(alias).and_then(as_count)
}

fn as_count(value: &serde_json::Value) -> Option<i64> {
    value
        .as_i64()
        .or_else(|| value.as_u64().and_then(|v| i64::try_from(v).ok()))
        .or_else(|| value.as_f64().map(|v| v as i64))
}

/// Turn the rows of an executed rows probe into data errors.
///
/// The count column moves from the record into the details.
pub fn data_errors_from_rows(kind: ErrorCheckKind, rows: Vec<Row>) -> Vec<DataError> {
    let category = kind.category();
    let count_column = kind.count_column();
    rows.into_iter()
        .map(|mut record| {
            let mut details = BTreeMap::new();
            if let Some(count) = count_column.and_then(|column| record.remove(column)) {
                details.insert(category.detail_key().to_string(), count);
            }
            DataError {
                category,
                record,
                details,
            }
        })
        .collect()
}

/// Decide whether a batch passes a probe.
///
/// # Arguments
///
/// * `kind` - The `max` probe that was run
/// * `max_value` - Its result, see [`max_probe_value`]
/// * `sample_rows` - Rows of the matching rows probe, empty if it was not run
///
/// # Returns
///
/// `Ok(())` when the maximum is at most one, otherwise a
/// [`DataQualityError`] with the sampled rows.
pub fn check_probe(
    kind: ErrorCheckKind,
    max_value: Option<i64>,
    sample_rows: Vec<Row>,
) -> Result<(), DataQualityError> {
    if max_value.is_none_or(|max| max <= 1) {
        return Ok(());
    }

    let category = kind.category();
    let rows_kind = kind.rows_probe().unwrap_or(kind);
    let errors = data_errors_from_rows(rows_kind, sample_rows);
    warn!(
        "{:?} probe returned {:?}, failing batch with {} sampled errors",
        kind,
        max_value,
        errors.len()
    );
    Err(DataQualityError {
        category,
        message: category.message().to_string(),
        errors,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn row(pairs: &[(&str, serde_json::Value)]) -> Row {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn test_max_probe_value() {
        let rows = vec![row(&[(MAX_PK_DUPLICATES, json!(2))])];
        assert_eq!(max_probe_value(ErrorCheckKind::MaxPkDuplicates, &rows), Some(2));
        assert_eq!(max_probe_value(ErrorCheckKind::MaxDataErrors, &rows), None);
        assert_eq!(max_probe_value(ErrorCheckKind::PkDuplicateRows, &rows), None);

        let empty_table = vec![row(&[(MAX_DUPLICATES, serde_json::Value::Null)])];
        assert_eq!(max_probe_value(ErrorCheckKind::MaxDuplicates, &empty_table), None);
    }

    #[test]
    fn test_check_probe_passes_at_or_below_one() {
        assert!(check_probe(ErrorCheckKind::MaxDuplicates, None, vec![]).is_ok());
        assert!(check_probe(ErrorCheckKind::MaxDuplicates, Some(1), vec![]).is_ok());
    }

    #[test]
    fn test_check_probe_reports_sample() {
        let sample = vec![row(&[("id", json!(1)), (PK_COUNT_ALIAS, json!(2))])];
        let err = check_probe(ErrorCheckKind::MaxPkDuplicates, Some(2), sample).unwrap_err();

        assert_eq!(err.category, ErrorCategory::DuplicatePrimaryKeys);
        assert_eq!(
            err.to_string(),
            "Encountered duplicate primary keys, Failing the batch as Fail on Duplicate Primary Keys is selected"
        );
        assert_eq!(err.errors.len(), 1);
        assert_eq!(err.errors[0].record, row(&[("id", json!(1))]));
        assert_eq!(err.errors[0].details["num_pk_duplicates"], json!(2));
    }

    #[test]
    fn test_data_version_errors_keep_key_and_version() {
        let sample = vec![row(&[
            ("id", json!(1)),
            ("version", json!(3)),
            (ERROR_COUNT_ALIAS, json!(2)),
        ])];
        let errors = data_errors_from_rows(ErrorCheckKind::DataErrorRows, sample);
        assert_eq!(errors[0].category, ErrorCategory::DataVersionError);
        assert_eq!(errors[0].record.len(), 2);
        assert_eq!(errors[0].details["num_data_version_errors"], json!(2));
    }

    #[test]
    fn test_kind_pairs() {
        assert_eq!(
            ErrorCheckKind::MaxDataErrors.rows_probe(),
            Some(ErrorCheckKind::DataErrorRows)
        );
        assert_eq!(ErrorCheckKind::DataErrorRows.rows_probe(), None);
        assert_eq!(
            ErrorCheckKind::DuplicateRows.count_column(),
            Some(DEFAULT_COUNT_FIELD)
        );
    }
}
