//! Temp staging datasets and the deduplicate-then-version pipeline

use tracing::debug;

use super::naming::{TEMP_STAGING_PURPOSE, TempTableNameGenerator};
use crate::logical_plan::{Condition, Dataset, DatasetDefinition, Value};
use crate::models::deduplication::DeduplicationStrategy;
use crate::models::versioning::VersioningStrategy;
use crate::versioning::{derive_temp_staging_schema, derive_versioned_dataset};

/// Alias of the temp staging table when staging has none
pub const TEMP_STAGING_ALIAS: &str = "temp_staging";

/// Applies a deduplication strategy to staging.
///
/// Counting strategies are expected to return a [`Selection`] projecting
/// every staging column followed by the strategy's count column.
///
/// [`Selection`]: crate::logical_plan::Selection
pub trait DeduplicationHandler {
    fn deduplicate(&self, strategy: DeduplicationStrategy, staging: &Dataset) -> Dataset;
}

/// Deduplicate staging, then version the result.
///
/// When versioning runs over staging, a derived deduplicated selection takes
/// the staging qualifier (its alias, else its table name).
pub fn derive_deduped_and_versioned_dataset<H: DeduplicationHandler + ?Sized>(
    handler: &H,
    deduplication: DeduplicationStrategy,
    versioning: &VersioningStrategy,
    staging: &Dataset,
    primary_keys: &[String],
) -> Dataset {
    let mut deduped = handler.deduplicate(deduplication, staging);
    if versioning.is_temp_table_needed() && matches!(deduped, Dataset::Selection(_)) {
        deduped = deduped.with_alias(staging.qualifier().map(str::to_string));
    }
    derive_versioned_dataset(versioning, &deduped, primary_keys)
}

/// Physical temp table staging rows are materialized into.
///
/// Keeps the staging database, group and alias, falling back to
/// [`TEMP_STAGING_ALIAS`]; the name comes from `name_generator` and the
/// schema from [`derive_temp_staging_schema`].
pub fn temp_staging_dataset_definition(
    staging: &DatasetDefinition,
    deduplication: DeduplicationStrategy,
    versioning: &VersioningStrategy,
    ingest_run_id: &str,
    name_generator: &dyn TempTableNameGenerator,
) -> DatasetDefinition {
    let name = name_generator.generate(&staging.name, TEMP_STAGING_PURPOSE, ingest_run_id);
    debug!("Temp staging table for {} is {}", staging.name, name);
    DatasetDefinition {
        database: staging.database.clone(),
        group: staging.group.clone(),
        name,
        alias: Some(
            staging
                .alias
                .clone()
                .unwrap_or_else(|| TEMP_STAGING_ALIAS.to_string()),
        ),
        schema: derive_temp_staging_schema(&staging.schema, deduplication, versioning),
    }
}

/// Same table with every primary key flag cleared, used to create the temp table
pub fn without_primary_keys(dataset: &DatasetDefinition) -> DatasetDefinition {
    DatasetDefinition {
        schema: dataset.schema.without_primary_keys(),
        ..dataset.clone()
    }
}

/// `split >= lower AND split <= upper`, selecting one or more merge waves
pub fn data_split_in_range_condition(
    dataset: &Dataset,
    data_split_field: &str,
    lower: i64,
    upper: i64,
) -> Condition {
    let split = Value::qualified(dataset.qualifier(), data_split_field);
    Condition::and(vec![
        Condition::greater_than_equal_to(split.clone(), Value::literal(lower)),
        Condition::less_than_equal_to(split, Value::literal(upper)),
    ])
}
