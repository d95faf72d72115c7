//! Probe plans that detect duplicates and data errors in staging
//!
//! Each check comes as a pair. The `max` plan returns a single number and is
//! cheap to run; only when it exceeds one does the orchestrator run the
//! matching rows plan, which returns a bounded sample of offending groups.
//!
//! All builders return `None` when the check does not apply to the given
//! strategy.

use tracing::debug;

use crate::logical_plan::{
    Condition, Dataset, FunctionImpl, FunctionName, LogicalPlan, Selection, Value,
};
use crate::models::deduplication::DeduplicationStrategy;
use crate::models::versioning::VersioningStrategy;

/// Alias of the derived table the `max` probes aggregate over
pub const STAGE_ALIAS: &str = "stage";
/// Rows per primary key
pub const PK_COUNT_ALIAS: &str = "ingest_pk_count";
/// Distinct payloads per primary key and version
pub const DISTINCT_ROWS_ALIAS: &str = "ingest_distinct_rows";
/// Distinct payloads per primary key and version, in the rows probe
pub const ERROR_COUNT_ALIAS: &str = "ingest_error_count";

pub const MAX_DUPLICATES: &str = "MAX_DUPLICATES";
pub const MAX_PK_DUPLICATES: &str = "MAX_PK_DUPLICATES";
pub const MAX_DATA_ERRORS: &str = "MAX_DATA_ERRORS";

fn qualified_fields<'a>(dataset: &Dataset, names: impl IntoIterator<Item = &'a str>) -> Vec<Value> {
    let qualifier = dataset.qualifier();
    names
        .into_iter()
        .map(|name| Value::qualified(qualifier, name))
        .collect()
}

fn count_all() -> FunctionImpl {
    FunctionImpl::new(FunctionName::Count, vec![Value::All])
}

fn count_distinct(dataset: &Dataset, remaining_columns: &[String]) -> FunctionImpl {
    FunctionImpl::new(
        FunctionName::Count,
        vec![Value::distinct(qualified_fields(
            dataset,
            remaining_columns.iter().map(String::as_str),
        ))],
    )
}

/// `SELECT MAX(stage.<column>) AS <alias> FROM (<inner>) AS stage`
fn max_over_stage(inner: Selection, column: &str, alias: &str) -> LogicalPlan {
    let max = FunctionImpl::new(
        FunctionName::Max,
        vec![Value::qualified(Some(STAGE_ALIAS), column)],
    )
    .with_alias(alias);
    LogicalPlan::select(
        Selection::new(inner.with_alias(Some(STAGE_ALIAS.to_string())))
            .with_fields(vec![max.into()]),
    )
}

/// Largest dedup count in a deduplicated dataset.
///
/// `SELECT MAX(count) AS MAX_DUPLICATES FROM dataset`, only for
/// [`DeduplicationStrategy::FailOnDuplicates`].
pub fn derive_max_duplicates_plan(
    deduplication: DeduplicationStrategy,
    dataset: &Dataset,
) -> Option<LogicalPlan> {
    if !deduplication.fails_on_duplicates() {
        return None;
    }
    let count_field = deduplication.dedup_field()?;
    let max = FunctionImpl::new(
        FunctionName::Max,
        vec![Value::qualified(dataset.qualifier(), count_field)],
    )
    .with_alias(MAX_DUPLICATES);
    Some(LogicalPlan::select(
        Selection::new(dataset.clone()).with_fields(vec![max.into()]),
    ))
}

/// Sample of deduplicated rows whose count exceeds one.
///
/// Projects the primary keys and the count, or every column when there are
/// no primary keys.
pub fn derive_duplicate_rows_plan(
    deduplication: DeduplicationStrategy,
    dataset: &Dataset,
    primary_keys: &[String],
    sample_row_count: u64,
) -> Option<LogicalPlan> {
    if !deduplication.fails_on_duplicates() {
        return None;
    }
    let count_field = deduplication.dedup_field()?;
    let count = Value::qualified(dataset.qualifier(), count_field);

    let fields = if primary_keys.is_empty() {
        dataset.field_values()
    } else {
        let mut fields = qualified_fields(dataset, primary_keys.iter().map(String::as_str));
        fields.push(count.clone());
        fields
    };

    Some(LogicalPlan::select(
        Selection::new(dataset.clone())
            .with_fields(fields)
            .with_condition(Condition::greater_than(count, Value::literal(1)))
            .with_limit(sample_row_count),
    ))
}

/// Largest number of rows sharing a primary key.
///
/// `SELECT MAX(stage.pk_count) FROM (SELECT COUNT(*) AS pk_count FROM dataset
/// GROUP BY <pks>) AS stage`, only for `NoVersioning` with
/// `fail_on_duplicate_primary_keys`.
pub fn derive_max_duplicate_pk_count_plan(
    strategy: &VersioningStrategy,
    dataset: &Dataset,
    primary_keys: &[String],
) -> Option<LogicalPlan> {
    if !strategy.is_duplicate_pk_check_needed() || primary_keys.is_empty() {
        return None;
    }
    debug!("Building duplicate primary key probe over {}", dataset.display_name());

    let inner = Selection::new(dataset.clone())
        .with_fields(vec![count_all().with_alias(PK_COUNT_ALIAS).into()])
        .with_group_by(qualified_fields(
            dataset,
            primary_keys.iter().map(String::as_str),
        ));
    Some(max_over_stage(inner, PK_COUNT_ALIAS, MAX_PK_DUPLICATES))
}

/// Sample of primary keys that occur more than once.
///
/// `SELECT <pks>, COUNT(*) AS pk_count FROM dataset GROUP BY <pks>
/// HAVING COUNT(*) > 1 LIMIT <sample_row_count>`
pub fn derive_duplicate_pk_rows_plan(
    strategy: &VersioningStrategy,
    dataset: &Dataset,
    primary_keys: &[String],
    sample_row_count: u64,
) -> Option<LogicalPlan> {
    if !strategy.is_duplicate_pk_check_needed() || primary_keys.is_empty() {
        return None;
    }

    let keys = qualified_fields(dataset, primary_keys.iter().map(String::as_str));
    let mut fields = keys.clone();
    fields.push(count_all().with_alias(PK_COUNT_ALIAS).into());

    Some(LogicalPlan::select(
        Selection::new(dataset.clone())
            .with_fields(fields)
            .with_group_by(keys)
            .with_having(Condition::greater_than(
                count_all().into(),
                Value::literal(1),
            ))
            .with_limit(sample_row_count),
    ))
}

/// Primary keys plus versioning field, the grouping of the data error probes
fn data_error_keys<'a>(
    strategy: &'a VersioningStrategy,
    primary_keys: &'a [String],
    remaining_columns: &[String],
) -> Option<Vec<&'a str>> {
    if !strategy.is_data_error_check_needed() || remaining_columns.is_empty() {
        return None;
    }
    let versioning_field = strategy.versioning_field()?;
    let mut keys: Vec<&str> = primary_keys.iter().map(String::as_str).collect();
    keys.push(versioning_field);
    Some(keys)
}

/// Largest number of distinct payloads sharing a primary key and version.
///
/// `SELECT MAX(stage.distinct_rows) AS MAX_DATA_ERRORS FROM (SELECT
/// COUNT(DISTINCT(<remaining>)) AS distinct_rows FROM dataset GROUP BY <pks>,
/// <version>) AS stage`, only for versioned strategies that version staging.
pub fn derive_max_data_error_plan(
    strategy: &VersioningStrategy,
    dataset: &Dataset,
    primary_keys: &[String],
    remaining_columns: &[String],
) -> Option<LogicalPlan> {
    let keys = data_error_keys(strategy, primary_keys, remaining_columns)?;
    debug!("Building data error probe over {}", dataset.display_name());

    let inner = Selection::new(dataset.clone())
        .with_fields(vec![
            count_distinct(dataset, remaining_columns)
                .with_alias(DISTINCT_ROWS_ALIAS)
                .into(),
        ])
        .with_group_by(qualified_fields(dataset, keys));
    Some(max_over_stage(inner, DISTINCT_ROWS_ALIAS, MAX_DATA_ERRORS))
}

/// Sample of primary key and version pairs with more than one payload.
///
/// `SELECT <pks>, <version>, COUNT(DISTINCT(<remaining>)) AS error_count FROM
/// dataset GROUP BY <pks>, <version> HAVING error_count > 1 LIMIT n`. With
/// `use_alias_in_having` off, the count expression is repeated in `HAVING`
/// for engines that cannot reference projected aliases there.
pub fn derive_data_errors_plan(
    strategy: &VersioningStrategy,
    dataset: &Dataset,
    primary_keys: &[String],
    remaining_columns: &[String],
    sample_row_count: u64,
    use_alias_in_having: bool,
) -> Option<LogicalPlan> {
    let keys = qualified_fields(
        dataset,
        data_error_keys(strategy, primary_keys, remaining_columns)?,
    );

    let error_count = count_distinct(dataset, remaining_columns);
    let mut fields = keys.clone();
    fields.push(error_count.clone().with_alias(ERROR_COUNT_ALIAS).into());

    let having_left = if use_alias_in_having {
        Value::field(ERROR_COUNT_ALIAS)
    } else {
        error_count.into()
    };

    Some(LogicalPlan::select(
        Selection::new(dataset.clone())
            .with_fields(fields)
            .with_group_by(keys)
            .with_having(Condition::greater_than(having_left, Value::literal(1)))
            .with_limit(sample_row_count),
    ))
}
