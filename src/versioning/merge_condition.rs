//! Merge predicate between main and staging rows

use tracing::debug;

use crate::error::{PlanError, PlanResult};
use crate::logical_plan::{Condition, Dataset, Value};
use crate::models::versioning::{MergeDataVersionResolver, VersioningStrategy};

/// Condition under which a staging row replaces the matching main row.
///
/// - `NoVersioning` and digest based resolvers: `main.digest <> staging.digest`
/// - version column resolvers: `staging.version <comparator> main.version`
///
/// With `invert_comparison` the complement is returned. Comparators are
/// swapped for their complement rather than wrapped in a negation.
///
/// # Errors
///
/// [`PlanError::MissingMergeResolver`] when a versioned strategy has no
/// resolver, [`PlanError::MissingDigestField`] when a digest comparison is
/// needed but `digest_field` is `None`.
///
/// # Example
///
/// ```rust
/// use ingest_versioning::logical_plan::{Condition, DataType, Dataset, DatasetDefinition, Field, SchemaDefinition, Value};
/// use ingest_versioning::models::versioning::VersioningStrategy;
/// use ingest_versioning::versioning::derive_merge_condition;
///
/// let schema = SchemaDefinition::new(vec![Field::new("digest", DataType::Varchar)]);
/// let main: Dataset = DatasetDefinition::new("main", schema.clone()).with_alias("sink").into();
/// let staging: Dataset = DatasetDefinition::new("staging", schema).with_alias("stage").into();
///
/// let condition = derive_merge_condition(
///     &VersioningStrategy::no_versioning(false),
///     &main,
///     &staging,
///     false,
///     Some("digest"),
/// )
/// .unwrap();
/// assert_eq!(
///     condition,
///     Condition::not_equals(
///         Value::qualified(Some("sink"), "digest"),
///         Value::qualified(Some("stage"), "digest"),
///     )
/// );
/// ```
pub fn derive_merge_condition(
    strategy: &VersioningStrategy,
    main: &Dataset,
    staging: &Dataset,
    invert_comparison: bool,
    digest_field: Option<&str>,
) -> PlanResult<Condition> {
    let (resolver, versioning_field) = match strategy {
        VersioningStrategy::NoVersioning(_) => {
            return digest_condition(main, staging, invert_comparison, digest_field);
        }
        VersioningStrategy::MaxVersion(max) => (
            max.merge_data_version_resolver
                .ok_or(PlanError::MissingMergeResolver(strategy.name()))?,
            max.versioning_field.as_str(),
        ),
        VersioningStrategy::AllVersions(all) => (
            all.merge_data_version_resolver
                .ok_or(PlanError::MissingMergeResolver(strategy.name()))?,
            all.versioning_field.as_str(),
        ),
    };

    match resolver {
        MergeDataVersionResolver::DigestBased => {
            digest_condition(main, staging, invert_comparison, digest_field)
        }
        MergeDataVersionResolver::VersionColumnBased { version_comparator } => {
            let operator = if invert_comparison {
                version_comparator.operator().complement()
            } else {
                version_comparator.operator()
            };
            debug!(
                "Version column merge condition: staging.{} {} main.{}",
                versioning_field, operator, versioning_field
            );
            Ok(Condition::compare(
                Value::qualified(staging.qualifier(), versioning_field),
                operator,
                Value::qualified(main.qualifier(), versioning_field),
            ))
        }
    }
}

fn digest_condition(
    main: &Dataset,
    staging: &Dataset,
    invert_comparison: bool,
    digest_field: Option<&str>,
) -> PlanResult<Condition> {
    let digest = digest_field.ok_or(PlanError::MissingDigestField)?;
    debug!(
        "Digest based merge condition on {} (inverted: {})",
        digest, invert_comparison
    );
    let main_digest = Value::qualified(main.qualifier(), digest);
    let staging_digest = Value::qualified(staging.qualifier(), digest);
    Ok(if invert_comparison {
        Condition::equals(main_digest, staging_digest)
    } else {
        Condition::not_equals(main_digest, staging_digest)
    })
}
