//! Temp staging schema derivation

use crate::logical_plan::{DataType, Field, SchemaDefinition};
use crate::models::deduplication::DeduplicationStrategy;
use crate::models::versioning::VersioningStrategy;

/// Schema of the temp table staging rows are materialized into.
///
/// Copies every field and storage hint of `original`, then appends
/// - the dedup count column when the deduplication strategy counts rows
/// - the data split column for `AllVersions` with stage versioning, marked
///   as a primary key only if `original` has a primary key
///
/// # Example
///
/// ```rust
/// use ingest_versioning::logical_plan::{DataType, Field, SchemaDefinition};
/// use ingest_versioning::models::deduplication::DeduplicationStrategy;
/// use ingest_versioning::models::versioning::{AllVersions, VersioningStrategy};
/// use ingest_versioning::versioning::derive_temp_staging_schema;
///
/// let original = SchemaDefinition::new(vec![
///     Field::new("id", DataType::Int).with_primary_key(true),
///     Field::new("version", DataType::Int),
/// ]);
/// let strategy: VersioningStrategy = AllVersions::new("version").with_data_split_field("split").into();
/// let schema = derive_temp_staging_schema(&original, DeduplicationStrategy::FailOnDuplicates, &strategy);
/// assert_eq!(schema.fields.len(), 4);
/// assert!(schema.field("split").unwrap().primary_key);
/// ```
pub fn derive_temp_staging_schema(
    original: &SchemaDefinition,
    deduplication: DeduplicationStrategy,
    versioning: &VersioningStrategy,
) -> SchemaDefinition {
    let dedup_field = deduplication
        .dedup_field()
        .map(|name| Field::new(name, DataType::Int));

    let data_split_field = match versioning {
        VersioningStrategy::NoVersioning(_) | VersioningStrategy::MaxVersion(_) => None,
        VersioningStrategy::AllVersions(all) if all.perform_stage_versioning => Some(
            Field::new(all.data_split_field_name.as_str(), DataType::Int)
                .with_primary_key(original.has_primary_key()),
        ),
        VersioningStrategy::AllVersions(_) => None,
    };

    SchemaDefinition {
        fields: original
            .fields
            .iter()
            .cloned()
            .chain(dedup_field)
            .chain(data_split_field)
            .collect(),
        ..original.clone()
    }
}
