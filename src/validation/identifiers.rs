//! Identifier validation for field, dataset and alias names.
//!
//! Every name the planner splices into a logical plan is checked here before
//! the plan is built.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Maximum length for any identifier
pub const MAX_IDENTIFIER_LENGTH: usize = 255;

/// Errors that can occur during identifier validation.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum ValidationError {
    /// Input is empty when a value is required
    #[error("{0} cannot be empty")]
    Empty(&'static str),

    /// Input exceeds maximum allowed length
    #[error("{field} exceeds maximum length (max: {max}, got: {actual})")]
    TooLong {
        field: &'static str,
        max: usize,
        actual: usize,
    },

    /// Input contains invalid characters
    #[error("{field} contains invalid characters: {reason}")]
    InvalidCharacters { field: &'static str, reason: String },

    /// Input has invalid format
    #[error("{0}: {1}")]
    InvalidFormat(&'static str, String),
}

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Validate an identifier used as a field, dataset or alias name.
///
/// # Rules
///
/// - Must not be empty
/// - Must not exceed 255 characters
/// - Must start with a letter or underscore
/// - May contain letters, digits, underscores and `$`
///
/// # Examples
///
/// ```
/// use ingest_versioning::validation::identifiers::validate_identifier;
///
/// assert!(validate_identifier("field name", "version").is_ok());
/// assert!(validate_identifier("field name", "data_split").is_ok());
/// assert!(validate_identifier("field name", "").is_err());
/// assert!(validate_identifier("field name", "1st").is_err());
/// assert!(validate_identifier("field name", "a;b").is_err());
/// ```
pub fn validate_identifier(kind: &'static str, name: &str) -> ValidationResult<()> {
    let Some(first_char) = name.chars().next() else {
        return Err(ValidationError::Empty(kind));
    };

    if name.len() > MAX_IDENTIFIER_LENGTH {
        return Err(ValidationError::TooLong {
            field: kind,
            max: MAX_IDENTIFIER_LENGTH,
            actual: name.len(),
        });
    }

    if !first_char.is_alphabetic() && first_char != '_' {
        return Err(ValidationError::InvalidFormat(
            kind,
            "must start with a letter or underscore".to_string(),
        ));
    }

    if let Some(c) = name
        .chars()
        .find(|c| !c.is_alphanumeric() && *c != '_' && *c != '$')
    {
        return Err(ValidationError::InvalidCharacters {
            field: kind,
            reason: format!("invalid character: '{}'", c),
        });
    }

    Ok(())
}

/// Validate every name in a list, stopping at the first failure.
pub fn validate_identifiers<'a>(
    kind: &'static str,
    names: impl IntoIterator<Item = &'a str>,
) -> ValidationResult<()> {
    names
        .into_iter()
        .try_for_each(|name| validate_identifier(kind, name))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_identifiers() {
        assert!(validate_identifier("field name", "id").is_ok());
        assert!(validate_identifier("field name", "_private").is_ok());
        assert!(validate_identifier("field name", "batch$id").is_ok());
        assert!(validate_identifier("field name", "Versión").is_ok());
    }

    #[test]
    fn test_empty_identifier() {
        assert_eq!(
            validate_identifier("field name", ""),
            Err(ValidationError::Empty("field name"))
        );
    }

    #[test]
    fn test_too_long_identifier() {
        let name = "a".repeat(MAX_IDENTIFIER_LENGTH + 1);
        assert!(matches!(
            validate_identifier("alias", &name),
            Err(ValidationError::TooLong { actual: 256, .. })
        ));
    }

    #[test]
    fn test_invalid_start_and_characters() {
        assert!(matches!(
            validate_identifier("field name", "9lives"),
            Err(ValidationError::InvalidFormat(..))
        ));
        assert!(matches!(
            validate_identifier("field name", "id; DROP TABLE x"),
            Err(ValidationError::InvalidCharacters { .. })
        ));
        assert!(matches!(
            validate_identifier("field name", "a.b"),
            Err(ValidationError::InvalidCharacters { .. })
        ));
    }

    #[test]
    fn test_validate_identifiers_stops_at_first_failure() {
        let err = validate_identifiers("primary key", ["id", "", "bad-name"]).unwrap_err();
        assert_eq!(err, ValidationError::Empty("primary key"));
    }
}
