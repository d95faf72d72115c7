//! Strategy models
//!
//! Configuration-level descriptions of how a batch is deduplicated and
//! versioned. Both enums serialize the way `ingest.toml` spells them.

pub mod deduplication;
pub mod versioning;

pub use deduplication::{DEFAULT_COUNT_FIELD, DeduplicationStrategy};
pub use versioning::{
    AllVersions, DEFAULT_DATA_SPLIT_FIELD, MaxVersion, MergeDataVersionResolver, NoVersioning,
    VersionComparator, VersioningStrategy,
};
