//! Row survivorship over staging
//!
//! Ranks staging rows by version within their primary key using
//! `DENSE_RANK`. [`MaxVersion`] keeps rank one, [`AllVersions`] keeps every
//! row and exposes the rank as its data split.
//!
//! [`MaxVersion`]: crate::models::versioning::MaxVersion
//! [`AllVersions`]: crate::models::versioning::AllVersions

use tracing::debug;

use crate::logical_plan::{
    Condition, Dataset, FieldValue, FunctionImpl, FunctionName, OrderedField, Selection,
    SortOrder, Value, WindowFunction,
};
use crate::models::versioning::VersioningStrategy;

/// Alias of the rank column used to filter the maximum version
pub const RANK_ALIAS: &str = "ingest_rank";

/// Apply the versioning strategy to a staging (or temp staging) dataset.
///
/// # Arguments
///
/// * `strategy` - Versioning strategy of the ingestion
/// * `dataset` - Dataset to version
/// * `primary_keys` - Primary keys, in order, used as the rank partition
///
/// # Returns
///
/// The dataset unchanged when the strategy does no stage versioning,
/// otherwise a [`Selection`] producing the surviving rows.
///
/// # Example
///
/// ```rust
/// use ingest_versioning::logical_plan::{DataType, Dataset, DatasetDefinition, Field, SchemaDefinition};
/// use ingest_versioning::models::versioning::VersioningStrategy;
/// use ingest_versioning::versioning::derive_versioned_dataset;
///
/// let staging: Dataset = DatasetDefinition::new(
///     "staging",
///     SchemaDefinition::new(vec![Field::new("id", DataType::Int).with_primary_key(true)]),
/// )
/// .into();
/// let strategy = VersioningStrategy::no_versioning(false);
/// assert_eq!(derive_versioned_dataset(&strategy, &staging, &["id".to_string()]), staging);
/// ```
pub fn derive_versioned_dataset(
    strategy: &VersioningStrategy,
    dataset: &Dataset,
    primary_keys: &[String],
) -> Dataset {
    match strategy {
        VersioningStrategy::NoVersioning(_) => dataset.clone(),
        VersioningStrategy::MaxVersion(max) if !max.perform_stage_versioning => {
            debug!("MaxVersion without stage versioning, staging passes through");
            dataset.clone()
        }
        VersioningStrategy::MaxVersion(max) => {
            debug!(
                "Filtering {} to the maximum {} per primary key",
                dataset.display_name(),
                max.versioning_field
            );
            max_version_selection(dataset, primary_keys, &max.versioning_field).into()
        }
        VersioningStrategy::AllVersions(all) if !all.perform_stage_versioning => {
            debug!("AllVersions without stage versioning, staging passes through");
            dataset.clone()
        }
        VersioningStrategy::AllVersions(all) => {
            debug!(
                "Splitting {} into {} by ascending {}",
                dataset.display_name(),
                all.data_split_field_name,
                all.versioning_field
            );
            all_versions_selection(
                dataset,
                primary_keys,
                &all.versioning_field,
                &all.data_split_field_name,
            )
            .into()
        }
    }
}

/// `DENSE_RANK() OVER (PARTITION BY <pks> ORDER BY <versioning_field> <order>)`
fn dense_rank(
    dataset: &Dataset,
    primary_keys: &[String],
    versioning_field: &str,
    order: SortOrder,
) -> WindowFunction {
    let qualifier = dataset.qualifier();
    WindowFunction::new(
        FunctionImpl::new(FunctionName::DenseRank, Vec::new()),
        primary_keys
            .iter()
            .map(|pk| FieldValue::qualified(qualifier, pk.as_str()))
            .collect(),
        vec![OrderedField {
            field: FieldValue::qualified(qualifier, versioning_field),
            order,
        }],
    )
}

fn max_version_selection(
    dataset: &Dataset,
    primary_keys: &[String],
    versioning_field: &str,
) -> Selection {
    let alias = dataset.qualifier().map(str::to_string);

    let mut ranked_fields = dataset.field_values();
    ranked_fields.push(
        dense_rank(dataset, primary_keys, versioning_field, SortOrder::Desc)
            .with_alias(RANK_ALIAS)
            .into(),
    );
    let ranked = Selection::new(dataset.clone())
        .with_fields(ranked_fields)
        .with_alias(alias.clone());

    Selection::new(ranked)
        .with_fields(dataset.field_values())
        .with_condition(Condition::equals(
            Value::qualified(alias.as_deref(), RANK_ALIAS),
            Value::literal(1),
        ))
        .with_alias(alias)
}

fn all_versions_selection(
    dataset: &Dataset,
    primary_keys: &[String],
    versioning_field: &str,
    data_split_field: &str,
) -> Selection {
    let mut fields = dataset.field_values();
    fields.push(
        dense_rank(dataset, primary_keys, versioning_field, SortOrder::Asc)
            .with_alias(data_split_field)
            .into(),
    );
    Selection::new(dataset.clone())
        .with_fields(fields)
        .with_alias(dataset.qualifier().map(str::to_string))
}
