//! Value expressions of the logical plan
//!
//! A closed algebra of column references, literals, aggregate and window
//! functions. Transformers lower these to dialect-specific SQL.

use serde::{Deserialize, Serialize};

/// Reference to a column, optionally qualified by a dataset alias
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FieldValue {
    /// Alias of the dataset the column belongs to
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dataset_alias: Option<String>,
    pub field_name: String,
    /// Output name when projected
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,
}

impl FieldValue {
    /// Create an unqualified column reference
    pub fn new(field_name: impl Into<String>) -> Self {
        Self {
            dataset_alias: None,
            field_name: field_name.into(),
            alias: None,
        }
    }

    /// Create a column reference qualified by `dataset_alias` when one is given
    pub fn qualified(dataset_alias: Option<&str>, field_name: impl Into<String>) -> Self {
        Self {
            dataset_alias: dataset_alias.map(str::to_string),
            field_name: field_name.into(),
            alias: None,
        }
    }

    pub fn with_alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self
    }

    /// Name of the column this value produces when projected
    pub fn output_name(&self) -> &str {
        self.alias.as_deref().unwrap_or(&self.field_name)
    }
}

/// Literal value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectValue {
    pub value: serde_json::Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,
}

/// Functions the planner emits
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FunctionName {
    Count,
    Max,
    Min,
    Sum,
    DenseRank,
}

impl FunctionName {
    /// Whether the function collapses a group of rows into one value
    pub fn is_aggregate(self) -> bool {
        matches!(
            self,
            FunctionName::Count | FunctionName::Max | FunctionName::Min | FunctionName::Sum
        )
    }
}

impl std::fmt::Display for FunctionName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            FunctionName::Count => "COUNT",
            FunctionName::Max => "MAX",
            FunctionName::Min => "MIN",
            FunctionName::Sum => "SUM",
            FunctionName::DenseRank => "DENSE_RANK",
        };
        write!(f, "{}", name)
    }
}

/// Named function applied to argument values, e.g. `COUNT(*)` or `MAX(x)`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionImpl {
    pub name: FunctionName,
    #[serde(default)]
    pub arguments: Vec<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,
}

impl FunctionImpl {
    pub fn new(name: FunctionName, arguments: Vec<Value>) -> Self {
        Self {
            name,
            arguments,
            alias: None,
        }
    }

    pub fn with_alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self
    }
}

/// `DISTINCT(...)` wrapper requesting distinct counting over one or more values
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DistinctFunction {
    pub values: Vec<Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SortOrder {
    Asc,
    Desc,
}

/// A column plus its sort direction inside a window's `ORDER BY`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OrderedField {
    pub field: FieldValue,
    pub order: SortOrder,
}

/// `function() OVER (PARTITION BY ... ORDER BY ...)`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WindowFunction {
    pub function: FunctionImpl,
    #[serde(default)]
    pub partition_by: Vec<FieldValue>,
    #[serde(default)]
    pub order_by: Vec<OrderedField>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,
}

impl WindowFunction {
    pub fn new(
        function: FunctionImpl,
        partition_by: Vec<FieldValue>,
        order_by: Vec<OrderedField>,
    ) -> Self {
        Self {
            function,
            partition_by,
            order_by,
            alias: None,
        }
    }

    pub fn with_alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self
    }
}

/// Value expression
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Value {
    Field(FieldValue),
    Object(ObjectValue),
    Function(FunctionImpl),
    Distinct(DistinctFunction),
    Window(WindowFunction),
    /// Wildcard argument or projection (`*`)
    All,
}

impl Value {
    /// Unqualified column reference
    pub fn field(field_name: impl Into<String>) -> Self {
        Value::Field(FieldValue::new(field_name))
    }

    /// Column reference qualified by a dataset alias when one is given
    pub fn qualified(dataset_alias: Option<&str>, field_name: impl Into<String>) -> Self {
        Value::Field(FieldValue::qualified(dataset_alias, field_name))
    }

    pub fn literal(value: impl Into<serde_json::Value>) -> Self {
        Value::Object(ObjectValue {
            value: value.into(),
            alias: None,
        })
    }

    pub fn distinct(values: Vec<Value>) -> Self {
        Value::Distinct(DistinctFunction { values })
    }

    /// Name of the column this value produces when projected, if it has one
    pub fn output_name(&self) -> Option<&str> {
        match self {
            Value::Field(field) => Some(field.output_name()),
            Value::Object(object) => object.alias.as_deref(),
            Value::Function(function) => function.alias.as_deref(),
            Value::Window(window) => window.alias.as_deref(),
            Value::Distinct(_) | Value::All => None,
        }
    }

    /// All column references in this expression, depth first
    pub fn referenced_fields(&self) -> Vec<&FieldValue> {
        let mut fields = Vec::new();
        self.collect_fields(&mut fields);
        fields
    }

    fn collect_fields<'a>(&'a self, out: &mut Vec<&'a FieldValue>) {
        match self {
            Value::Field(field) => out.push(field),
            Value::Function(function) => function
                .arguments
                .iter()
                .for_each(|arg| arg.collect_fields(out)),
            Value::Distinct(distinct) => distinct
                .values
                .iter()
                .for_each(|value| value.collect_fields(out)),
            Value::Window(window) => {
                window
                    .function
                    .arguments
                    .iter()
                    .for_each(|arg| arg.collect_fields(out));
                out.extend(window.partition_by.iter());
                out.extend(window.order_by.iter().map(|ordered| &ordered.field));
            }
            Value::Object(_) | Value::All => {}
        }
    }
}

impl From<FieldValue> for Value {
    fn from(field: FieldValue) -> Self {
        Value::Field(field)
    }
}

impl From<FunctionImpl> for Value {
    fn from(function: FunctionImpl) -> Self {
        Value::Function(function)
    }
}

impl From<WindowFunction> for Value {
    fn from(window: WindowFunction) -> Self {
        Value::Window(window)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_output_names() {
        assert_eq!(Value::field("id").output_name(), Some("id"));
        assert_eq!(
            Value::Field(FieldValue::new("id").with_alias("key")).output_name(),
            Some("key")
        );
        let count = FunctionImpl::new(FunctionName::Count, vec![Value::All]);
        assert_eq!(Value::from(count.clone()).output_name(), None);
        assert_eq!(
            Value::from(count.with_alias("cnt")).output_name(),
            Some("cnt")
        );
        assert_eq!(Value::All.output_name(), None);
    }

    #[test]
    fn test_referenced_fields_walks_window_parts() {
        let window = WindowFunction::new(
            FunctionImpl::new(FunctionName::DenseRank, vec![]),
            vec![FieldValue::new("id")],
            vec![OrderedField {
                field: FieldValue::new("version"),
                order: SortOrder::Desc,
            }],
        )
        .with_alias("rnk");
        let value = Value::from(window);
        let names: Vec<&str> = value
            .referenced_fields()
            .iter()
            .map(|f| f.field_name.as_str())
            .collect();
        assert_eq!(names, vec!["id", "version"]);
    }

    #[test]
    fn test_referenced_fields_inside_distinct_count() {
        let count = FunctionImpl::new(
            FunctionName::Count,
            vec![Value::distinct(vec![Value::field("name"), Value::field("amount")])],
        );
        assert_eq!(Value::from(count).referenced_fields().len(), 2);
    }

    #[test]
    fn test_function_name_display() {
        assert_eq!(FunctionName::DenseRank.to_string(), "DENSE_RANK");
        assert!(FunctionName::Max.is_aggregate());
        assert!(!FunctionName::DenseRank.is_aggregate());
    }
}
