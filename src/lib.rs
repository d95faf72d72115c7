//! Ingest Versioning - Logical plan compiler for incremental ingestion
//!
//! Provides builders for:
//! - Versioning staging data (max version or all versions with data splits)
//! - Temp staging schemas for deduplicated and versioned batches
//! - Data quality probes (duplicates, duplicate primary keys, data version errors)
//! - Merge conditions between main and staging
//! - Planner configuration loaded from `ingest.toml`
//!
//! Everything here produces [`logical_plan::LogicalPlan`] values; executing
//! them is left to the caller.

pub mod config;
pub mod error;
pub mod logical_plan;
pub mod models;
pub mod planner;
pub mod quality;
pub mod validation;
pub mod versioning;

// Re-export commonly used types
pub use config::{IngestConfig, PlannerOptions};
pub use error::{ConfigError, ConfigResult, PlanError, PlanResult};
pub use logical_plan::{
    Condition, DataType, Dataset, DatasetDefinition, Field, LogicalPlan, Operation,
    SchemaDefinition, Selection, Value,
};
pub use models::{
    AllVersions, DeduplicationStrategy, MaxVersion, MergeDataVersionResolver, NoVersioning,
    VersionComparator, VersioningStrategy,
};
pub use planner::{Datasets, DeduplicationHandler, IngestPlanner};
pub use quality::{DataError, DataQualityError, ErrorCategory, ErrorCheckKind, check_probe};
