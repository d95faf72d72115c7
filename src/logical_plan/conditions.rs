//! Boolean predicates over value expressions

use serde::{Deserialize, Serialize};

use super::values::{FieldValue, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ComparisonOperator {
    Equals,
    NotEquals,
    GreaterThan,
    GreaterThanEqualTo,
    LessThan,
    LessThanEqualTo,
}

impl ComparisonOperator {
    /// Operator that holds exactly when `self` does not
    pub fn complement(self) -> Self {
        match self {
            ComparisonOperator::Equals => ComparisonOperator::NotEquals,
            ComparisonOperator::NotEquals => ComparisonOperator::Equals,
            ComparisonOperator::GreaterThan => ComparisonOperator::LessThanEqualTo,
            ComparisonOperator::LessThanEqualTo => ComparisonOperator::GreaterThan,
            ComparisonOperator::GreaterThanEqualTo => ComparisonOperator::LessThan,
            ComparisonOperator::LessThan => ComparisonOperator::GreaterThanEqualTo,
        }
    }
}

impl std::fmt::Display for ComparisonOperator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let symbol = match self {
            ComparisonOperator::Equals => "=",
            ComparisonOperator::NotEquals => "<>",
            ComparisonOperator::GreaterThan => ">",
            ComparisonOperator::GreaterThanEqualTo => ">=",
            ComparisonOperator::LessThan => "<",
            ComparisonOperator::LessThanEqualTo => "<=",
        };
        write!(f, "{}", symbol)
    }
}

/// Boolean predicate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Condition {
    Comparison {
        left: Value,
        operator: ComparisonOperator,
        right: Value,
    },
    And { conditions: Vec<Condition> },
}

impl Condition {
    pub fn compare(left: Value, operator: ComparisonOperator, right: Value) -> Self {
        Condition::Comparison {
            left,
            operator,
            right,
        }
    }

    pub fn equals(left: Value, right: Value) -> Self {
        Self::compare(left, ComparisonOperator::Equals, right)
    }

    pub fn not_equals(left: Value, right: Value) -> Self {
        Self::compare(left, ComparisonOperator::NotEquals, right)
    }

    pub fn greater_than(left: Value, right: Value) -> Self {
        Self::compare(left, ComparisonOperator::GreaterThan, right)
    }

    pub fn greater_than_equal_to(left: Value, right: Value) -> Self {
        Self::compare(left, ComparisonOperator::GreaterThanEqualTo, right)
    }

    pub fn less_than(left: Value, right: Value) -> Self {
        Self::compare(left, ComparisonOperator::LessThan, right)
    }

    pub fn less_than_equal_to(left: Value, right: Value) -> Self {
        Self::compare(left, ComparisonOperator::LessThanEqualTo, right)
    }

    pub fn and(conditions: Vec<Condition>) -> Self {
        Condition::And { conditions }
    }

    /// All column references in this predicate
    pub fn referenced_fields(&self) -> Vec<&FieldValue> {
        match self {
            Condition::Comparison { left, right, .. } => {
                let mut fields = left.referenced_fields();
                fields.extend(right.referenced_fields());
                fields
            }
            Condition::And { conditions } => conditions
                .iter()
                .flat_map(|condition| condition.referenced_fields())
                .collect(),
        }
    }
}
