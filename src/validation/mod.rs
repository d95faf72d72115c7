//! Validation functionality
//!
//! Provides validation logic for:
//! - Identifier validation (field, dataset and alias names)

pub mod identifiers;

pub use identifiers::{ValidationError, ValidationResult, validate_identifier, validate_identifiers};
