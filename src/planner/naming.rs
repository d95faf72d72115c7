//! Temp table naming
//!
//! Concurrent ingestion runs against the same staging table must not share
//! a temp table, so every temp table name carries a run-derived suffix.

use sha2::{Digest, Sha256};

/// Purpose tag of the temp staging table
pub const TEMP_STAGING_PURPOSE: &str = "temp_staging";

/// Length of the run-derived suffix
const SUFFIX_LENGTH: usize = 6;

/// Produces collision-resistant temp table names
pub trait TempTableNameGenerator {
    fn generate(&self, base_name: &str, purpose: &str, ingest_run_id: &str) -> String;
}

/// Names temp tables `{base}_{purpose}_lp_{suffix}`, where the suffix is six
/// lowercase letters derived from a SHA-256 of the run id.
///
/// # Example
///
/// ```rust
/// use ingest_versioning::planner::naming::{HashedRunIdNameGenerator, TempTableNameGenerator};
///
/// let name = HashedRunIdNameGenerator.generate("staging", "temp_staging", "run-1");
/// assert!(name.starts_with("staging_temp_staging_lp_"));
/// assert_eq!(name.len(), "staging_temp_staging_lp_".len() + 6);
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct HashedRunIdNameGenerator;

impl TempTableNameGenerator for HashedRunIdNameGenerator {
    fn generate(&self, base_name: &str, purpose: &str, ingest_run_id: &str) -> String {
        format!("{}_{}_lp_{}", base_name, purpose, run_suffix(ingest_run_id))
    }
}

fn run_suffix(ingest_run_id: &str) -> String {
    let hash = Sha256::digest(ingest_run_id.as_bytes());
    hash.iter()
        .take(SUFFIX_LENGTH)
        .map(|byte| char::from(b'a' + byte % 26))
        .collect()
}
