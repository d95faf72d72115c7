//! Ingestion planner
//!
//! [`IngestPlanner`] ties the builders in [`crate::versioning`] to one
//! ingestion run: it validates the configuration up front, then hands out
//! the temp staging materialization plan, the probe plans and the merge
//! condition for the run.

pub mod naming;
pub mod staging;

use std::collections::{BTreeMap, HashSet};

use tracing::{debug, info, warn};

use crate::config::{IngestConfig, PlannerOptions};
use crate::error::{PlanError, PlanResult};
use crate::logical_plan::{
    Condition, Dataset, DatasetDefinition, LogicalPlan, Operation, SchemaDefinition, Value,
};
use crate::models::deduplication::DeduplicationStrategy;
use crate::models::versioning::VersioningStrategy;
use crate::quality::ErrorCheckKind;
use crate::validation::identifiers::{validate_identifier, validate_identifiers};
use crate::versioning::handler::RANK_ALIAS;
use crate::versioning::{
    derive_data_errors_plan, derive_duplicate_pk_rows_plan, derive_duplicate_rows_plan,
    derive_max_data_error_plan, derive_max_duplicate_pk_count_plan, derive_max_duplicates_plan,
    derive_merge_condition,
};

use naming::{HashedRunIdNameGenerator, TempTableNameGenerator};
pub use staging::{
    DeduplicationHandler, TEMP_STAGING_ALIAS, data_split_in_range_condition,
    derive_deduped_and_versioned_dataset, temp_staging_dataset_definition, without_primary_keys,
};

/// Main and staging tables of an ingestion
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Datasets {
    pub main: DatasetDefinition,
    pub staging: DatasetDefinition,
}

impl Datasets {
    pub fn new(main: DatasetDefinition, staging: DatasetDefinition) -> Self {
        Self { main, staging }
    }
}

/// Plans one ingestion run
///
/// # Example
///
/// ```rust
/// use ingest_versioning::config::PlannerOptions;
/// use ingest_versioning::logical_plan::{DataType, DatasetDefinition, Field, SchemaDefinition};
/// use ingest_versioning::models::deduplication::DeduplicationStrategy;
/// use ingest_versioning::models::versioning::{MaxVersion, MergeDataVersionResolver};
/// use ingest_versioning::planner::{Datasets, IngestPlanner};
///
/// let schema = SchemaDefinition::new(vec![
///     Field::new("id", DataType::Int).with_primary_key(true),
///     Field::new("name", DataType::Varchar),
///     Field::new("version", DataType::Int),
/// ]);
/// let datasets = Datasets::new(
///     DatasetDefinition::new("main", schema.clone()).with_alias("sink"),
///     DatasetDefinition::new("staging", schema).with_alias("stage"),
/// );
/// let planner = IngestPlanner::new(
///     datasets,
///     DeduplicationStrategy::AllowDuplicates,
///     MaxVersion::new("version")
///         .with_resolver(MergeDataVersionResolver::DigestBased)
///         .into(),
///     PlannerOptions::default().with_digest_field("digest"),
/// )
/// .unwrap();
///
/// assert_eq!(planner.primary_keys(), ["id".to_string()]);
/// assert!(planner.is_temp_table_needed());
/// assert!(planner.merge_condition(false).is_ok());
/// ```
pub struct IngestPlanner {
    datasets: Datasets,
    deduplication: DeduplicationStrategy,
    versioning: VersioningStrategy,
    options: PlannerOptions,
    primary_keys: Vec<String>,
    name_generator: Box<dyn TempTableNameGenerator + Send + Sync>,
}

impl std::fmt::Debug for IngestPlanner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IngestPlanner")
            .field("datasets", &self.datasets)
            .field("deduplication", &self.deduplication)
            .field("versioning", &self.versioning)
            .field("options", &self.options)
            .field("primary_keys", &self.primary_keys)
            .finish_non_exhaustive()
    }
}

impl IngestPlanner {
    /// Validate the configuration and create a planner.
    ///
    /// # Errors
    ///
    /// Any [`PlanError`] configuration error: invalid identifiers, an
    /// invalid deduplication pairing, missing primary keys for a strategy
    /// that needs them, or an unusable versioning field.
    pub fn new(
        datasets: Datasets,
        deduplication: DeduplicationStrategy,
        versioning: VersioningStrategy,
        options: PlannerOptions,
    ) -> PlanResult<Self> {
        validate_names(&datasets, &versioning, &options)?;

        let primary_keys = common_primary_keys(&datasets.main.schema, &datasets.staging.schema);

        let temp_table_needed =
            deduplication.is_temp_table_needed() || versioning.is_temp_table_needed();
        if let Err(e) = versioning
            .validate_deduplication(deduplication)
            .and_then(|()| validate_versioning(&versioning, &datasets.staging.schema, &primary_keys))
            .and_then(|()| {
                validate_internal_fields(deduplication, &versioning, &datasets.staging.schema)
            })
            .and_then(|()| validate_qualifiers(&datasets, temp_table_needed))
        {
            warn!(
                "Rejected {} with {} for {}: {}",
                versioning.name(),
                deduplication,
                datasets.staging.name,
                e
            );
            return Err(e);
        }

        info!(
            "Planning ingestion of {} into {} with {} and {}",
            datasets.staging.qualified_name(),
            datasets.main.qualified_name(),
            versioning.name(),
            deduplication
        );

        Ok(Self {
            datasets,
            deduplication,
            versioning,
            options,
            primary_keys,
            name_generator: Box::new(HashedRunIdNameGenerator),
        })
    }

    /// Create a planner from a loaded configuration
    pub fn from_config(datasets: Datasets, config: &IngestConfig) -> PlanResult<Self> {
        Self::new(
            datasets,
            config.deduplication.strategy,
            config.versioning.clone(),
            config.options.clone(),
        )
    }

    /// Replace the temp table name generator
    pub fn with_name_generator(
        mut self,
        name_generator: impl TempTableNameGenerator + Send + Sync + 'static,
    ) -> Self {
        self.name_generator = Box::new(name_generator);
        self
    }

    /// Primary keys shared by main and staging, in staging order
    pub fn primary_keys(&self) -> &[String] {
        &self.primary_keys
    }

    pub fn options(&self) -> &PlannerOptions {
        &self.options
    }

    pub fn versioning(&self) -> &VersioningStrategy {
        &self.versioning
    }

    pub fn deduplication(&self) -> DeduplicationStrategy {
        self.deduplication
    }

    /// Whether staging is materialized into a temp table before the merge
    pub fn is_temp_table_needed(&self) -> bool {
        self.deduplication.is_temp_table_needed() || self.versioning.is_temp_table_needed()
    }

    /// Temp staging table for this run
    pub fn temp_staging_dataset(&self) -> DatasetDefinition {
        temp_staging_dataset_definition(
            &self.datasets.staging,
            self.deduplication,
            &self.versioning,
            &self.options.ingest_run_id,
            self.name_generator.as_ref(),
        )
    }

    /// Temp staging table without primary key flags, for creating it
    pub fn temp_staging_dataset_without_pks(&self) -> DatasetDefinition {
        without_primary_keys(&self.temp_staging_dataset())
    }

    /// Dataset the probes and the merge read from
    pub fn effective_staging_dataset(&self) -> Dataset {
        if self.is_temp_table_needed() {
            self.temp_staging_dataset().into()
        } else {
            self.datasets.staging.clone().into()
        }
    }

    /// Staging deduplicated by `handler`, then versioned
    pub fn deduped_and_versioned_dataset<H: DeduplicationHandler + ?Sized>(
        &self,
        handler: &H,
    ) -> Dataset {
        derive_deduped_and_versioned_dataset(
            handler,
            self.deduplication,
            &self.versioning,
            &self.datasets.staging.clone().into(),
            &self.primary_keys,
        )
    }

    /// Plan filling the temp staging table.
    ///
    /// `DELETE FROM temp` followed by `INSERT INTO temp SELECT ...` over the
    /// deduplicated and versioned staging. Empty when no temp table is
    /// needed.
    pub fn plan_dedup_and_versioning<H: DeduplicationHandler + ?Sized>(
        &self,
        handler: &H,
    ) -> LogicalPlan {
        if !self.is_temp_table_needed() {
            debug!("No temp staging table needed");
            return LogicalPlan::default();
        }

        let temp = self.temp_staging_dataset();
        let fields = temp
            .schema
            .fields
            .iter()
            .map(|field| Value::field(field.name.as_str()))
            .collect();
        let source = self.deduped_and_versioned_dataset(handler);

        LogicalPlan::new(vec![
            Operation::Delete {
                target: temp.clone(),
                condition: None,
            },
            Operation::Insert {
                target: temp,
                fields,
                source,
            },
        ])
    }

    /// Columns compared by the data error probes.
    ///
    /// The digest alone when one is configured, otherwise every staging
    /// column that is not a primary key, the versioning field, the data
    /// split field or the dedup count.
    pub fn remaining_columns(&self) -> Vec<String> {
        if let Some(digest) = &self.options.digest_field {
            return vec![digest.clone()];
        }

        let excluded: HashSet<&str> = self
            .primary_keys
            .iter()
            .map(String::as_str)
            .chain(self.versioning.versioning_field())
            .chain(self.versioning.data_split_field())
            .chain(self.deduplication.dedup_field())
            .collect();

        self.datasets
            .staging
            .schema
            .fields
            .iter()
            .map(|field| field.name.as_str())
            .filter(|name| !excluded.contains(name))
            .map(str::to_string)
            .collect()
    }

    /// Every probe plan that applies to this run, keyed by kind
    pub fn error_check_plans(&self) -> BTreeMap<ErrorCheckKind, LogicalPlan> {
        let dataset = self.effective_staging_dataset();
        let primary_keys = &self.primary_keys;
        let sample = self.options.sample_row_count;
        let remaining = self.remaining_columns();

        let plans = [
            (
                ErrorCheckKind::MaxDuplicates,
                derive_max_duplicates_plan(self.deduplication, &dataset),
            ),
            (
                ErrorCheckKind::DuplicateRows,
                derive_duplicate_rows_plan(self.deduplication, &dataset, primary_keys, sample),
            ),
            (
                ErrorCheckKind::MaxPkDuplicates,
                derive_max_duplicate_pk_count_plan(&self.versioning, &dataset, primary_keys),
            ),
            (
                ErrorCheckKind::PkDuplicateRows,
                derive_duplicate_pk_rows_plan(&self.versioning, &dataset, primary_keys, sample),
            ),
            (
                ErrorCheckKind::MaxDataErrors,
                derive_max_data_error_plan(&self.versioning, &dataset, primary_keys, &remaining),
            ),
            (
                ErrorCheckKind::DataErrorRows,
                derive_data_errors_plan(
                    &self.versioning,
                    &dataset,
                    primary_keys,
                    &remaining,
                    sample,
                    self.options.use_alias_in_having,
                ),
            ),
        ];

        let plans: BTreeMap<_, _> = plans
            .into_iter()
            .filter_map(|(kind, plan)| plan.map(|plan| (kind, plan)))
            .collect();
        debug!(
            "Built {} error check plans: {:?}",
            plans.len(),
            plans.keys().collect::<Vec<_>>()
        );
        plans
    }

    /// Merge condition between main and the effective staging dataset
    pub fn merge_condition(&self, invert_comparison: bool) -> PlanResult<Condition> {
        derive_merge_condition(
            &self.versioning,
            &self.datasets.main.clone().into(),
            &self.effective_staging_dataset(),
            invert_comparison,
            self.options.digest_field.as_deref(),
        )
    }

    /// `split >= lower AND split <= upper`, or `None` unless staging is split
    pub fn data_split_in_range_condition(&self, lower: i64, upper: i64) -> Option<Condition> {
        if !self.versioning.perform_stage_versioning() {
            return None;
        }
        let split = self.versioning.data_split_field()?;
        Some(data_split_in_range_condition(
            &self.effective_staging_dataset(),
            split,
            lower,
            upper,
        ))
    }
}

/// Primary keys of staging that are also primary keys of main
fn common_primary_keys(main: &SchemaDefinition, staging: &SchemaDefinition) -> Vec<String> {
    let main_keys: HashSet<String> = main.primary_keys().into_iter().collect();
    staging
        .primary_keys()
        .into_iter()
        .filter(|key| main_keys.contains(key))
        .collect()
}

fn validate_names(
    datasets: &Datasets,
    versioning: &VersioningStrategy,
    options: &PlannerOptions,
) -> PlanResult<()> {
    for dataset in [&datasets.main, &datasets.staging] {
        validate_identifier("dataset name", &dataset.name)?;
        if let Some(alias) = &dataset.alias {
            validate_identifier("dataset alias", alias)?;
        }
        validate_identifiers(
            "field name",
            dataset.schema.fields.iter().map(|field| field.name.as_str()),
        )?;
    }
    validate_identifiers(
        "field name",
        versioning
            .versioning_field()
            .into_iter()
            .chain(versioning.data_split_field())
            .chain(options.digest_field.as_deref()),
    )?;
    Ok(())
}

fn validate_versioning(
    versioning: &VersioningStrategy,
    staging: &SchemaDefinition,
    primary_keys: &[String],
) -> PlanResult<()> {
    match versioning {
        VersioningStrategy::NoVersioning(no) => {
            if no.fail_on_duplicate_primary_keys && primary_keys.is_empty() {
                return Err(PlanError::EmptyPrimaryKeys);
            }
            Ok(())
        }
        VersioningStrategy::MaxVersion(_) | VersioningStrategy::AllVersions(_) => {
            if primary_keys.is_empty() {
                return Err(PlanError::EmptyPrimaryKeys);
            }
            let Some(versioning_field) = versioning.versioning_field() else {
                return Ok(());
            };
            if primary_keys.iter().any(|key| key == versioning_field) {
                return Err(PlanError::VersioningFieldIsPrimaryKey);
            }
            let field = staging
                .field(versioning_field)
                .ok_or_else(|| PlanError::VersioningFieldNotFound(versioning_field.to_string()))?;
            if !field.data_type().is_comparable() {
                return Err(PlanError::UnsupportedVersioningFieldType(
                    field.data_type().to_string(),
                ));
            }
            Ok(())
        }
    }
}

/// Columns added to staging by dedup and versioning must be new and distinct
fn validate_internal_fields(
    deduplication: DeduplicationStrategy,
    versioning: &VersioningStrategy,
    staging: &SchemaDefinition,
) -> PlanResult<()> {
    let stage_versioning = versioning.perform_stage_versioning();
    let split_field = versioning.data_split_field().filter(|_| stage_versioning);
    let rank_field = (stage_versioning && matches!(versioning, VersioningStrategy::MaxVersion(_)))
        .then_some(RANK_ALIAS);

    let mut added: Vec<&str> = Vec::new();
    for name in deduplication
        .dedup_field()
        .into_iter()
        .chain(split_field)
        .chain(rank_field)
    {
        if staging.field(name).is_some() || added.contains(&name) {
            return Err(PlanError::InternalFieldConflict(name.to_string()));
        }
        added.push(name);
    }
    Ok(())
}

/// Main and the staging dataset the merge reads must be told apart
fn validate_qualifiers(datasets: &Datasets, temp_table_needed: bool) -> PlanResult<()> {
    let main = datasets.main.alias.as_deref().unwrap_or(&datasets.main.name);
    let staging = match datasets.staging.alias.as_deref() {
        Some(alias) => alias,
        None if temp_table_needed => TEMP_STAGING_ALIAS,
        None => &datasets.staging.name,
    };
    if main == staging {
        return Err(PlanError::AmbiguousDatasetQualifier(main.to_string()));
    }
    Ok(())
}
