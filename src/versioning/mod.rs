//! Versioning and deduplication plan builders
//!
//! Pure functions from datasets and strategies to logical plan fragments:
//! - [`derive_versioned_dataset`] decides which staging rows survive
//! - the probe builders in [`error_checks`] detect duplicates and data errors
//! - [`derive_temp_staging_schema`] shapes the materialized temp table
//! - [`derive_merge_condition`] decides when a staging row replaces a main row

pub mod error_checks;
pub mod handler;
pub mod merge_condition;
pub mod schema;

pub use error_checks::{
    derive_data_errors_plan, derive_duplicate_pk_rows_plan, derive_duplicate_rows_plan,
    derive_max_data_error_plan, derive_max_duplicate_pk_count_plan, derive_max_duplicates_plan,
};
pub use handler::derive_versioned_dataset;
pub use merge_condition::derive_merge_condition;
pub use schema::derive_temp_staging_schema;
