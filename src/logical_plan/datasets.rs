//! Datasets, fields and schemas
//!
//! A [`Dataset`] is either a physical table ([`DatasetDefinition`]) or a
//! derived [`Selection`] over another dataset. Chained selections form the
//! plan tree that transformers lower to SQL.

use serde::{Deserialize, Serialize};

use super::conditions::Condition;
use super::values::{FieldValue, Value};
use crate::error::{PlanError, PlanResult};

/// Column data types understood by the planner
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DataType {
    Int,
    Integer,
    BigInt,
    SmallInt,
    TinyInt,
    Float,
    Double,
    Real,
    Decimal,
    Numeric,
    Boolean,
    Char,
    Varchar,
    String,
    Text,
    Date,
    Time,
    Datetime,
    Timestamp,
    TimestampNtz,
    TimestampTz,
    Binary,
    Json,
    Variant,
    Array,
    Map,
}

impl DataType {
    /// Whether values of this type have a total order usable for versioning
    pub fn is_comparable(self) -> bool {
        !matches!(
            self,
            DataType::Boolean
                | DataType::Binary
                | DataType::Json
                | DataType::Variant
                | DataType::Array
                | DataType::Map
        )
    }
}

impl std::fmt::Display for DataType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            DataType::Int => "INT",
            DataType::Integer => "INTEGER",
            DataType::BigInt => "BIGINT",
            DataType::SmallInt => "SMALLINT",
            DataType::TinyInt => "TINYINT",
            DataType::Float => "FLOAT",
            DataType::Double => "DOUBLE",
            DataType::Real => "REAL",
            DataType::Decimal => "DECIMAL",
            DataType::Numeric => "NUMERIC",
            DataType::Boolean => "BOOLEAN",
            DataType::Char => "CHAR",
            DataType::Varchar => "VARCHAR",
            DataType::String => "STRING",
            DataType::Text => "TEXT",
            DataType::Date => "DATE",
            DataType::Time => "TIME",
            DataType::Datetime => "DATETIME",
            DataType::Timestamp => "TIMESTAMP",
            DataType::TimestampNtz => "TIMESTAMP_NTZ",
            DataType::TimestampTz => "TIMESTAMP_TZ",
            DataType::Binary => "BINARY",
            DataType::Json => "JSON",
            DataType::Variant => "VARIANT",
            DataType::Array => "ARRAY",
            DataType::Map => "MAP",
        };
        write!(f, "{}", name)
    }
}

/// Data type plus optional length and scale
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FieldType {
    pub data_type: DataType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub length: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scale: Option<u32>,
}

impl FieldType {
    pub fn of(data_type: DataType) -> Self {
        Self {
            data_type,
            length: None,
            scale: None,
        }
    }
}

/// Column of a dataset schema
///
/// # Example
///
/// ```rust
/// use ingest_versioning::logical_plan::{DataType, Field};
///
/// let id = Field::new("id", DataType::Int).with_primary_key(true);
/// assert!(id.primary_key);
/// assert!(!id.nullable);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Field {
    pub name: String,
    pub field_type: FieldType,
    /// Whether this column is part of the primary key (default: false)
    #[serde(default)]
    pub primary_key: bool,
    /// Whether the column allows NULL values (default: true)
    #[serde(default = "default_true")]
    pub nullable: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field_alias: Option<String>,
}

fn default_true() -> bool {
    true
}

impl Field {
    pub fn new(name: impl Into<String>, data_type: DataType) -> Self {
        Self {
            name: name.into(),
            field_type: FieldType::of(data_type),
            primary_key: false,
            nullable: true,
            field_alias: None,
        }
    }

    /// Mark or unmark the field as a primary key; keys are never nullable
    pub fn with_primary_key(mut self, primary_key: bool) -> Self {
        self.primary_key = primary_key;
        if primary_key {
            self.nullable = false;
        }
        self
    }

    pub fn data_type(&self) -> DataType {
        self.field_type.data_type
    }
}

/// Secondary index hint
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Index {
    pub index_name: String,
    pub columns: Vec<String>,
}

/// Shard key hint
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ShardSpecification {
    #[serde(default)]
    pub shard_keys: Vec<String>,
    #[serde(default)]
    pub is_sharded: bool,
}

/// Column store hint
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ColumnStoreSpecification {
    #[serde(default)]
    pub column_store: bool,
    #[serde(default)]
    pub column_store_keys: Vec<String>,
}

/// Ordered fields plus storage hints.
///
/// Indexes, shard and column-store specifications are carried through
/// derived schemas unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SchemaDefinition {
    pub fields: Vec<Field>,
    #[serde(default)]
    pub indexes: Vec<Index>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shard_specification: Option<ShardSpecification>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub column_store_specification: Option<ColumnStoreSpecification>,
}

impl SchemaDefinition {
    pub fn new(fields: Vec<Field>) -> Self {
        Self {
            fields,
            ..Default::default()
        }
    }

    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|field| field.name == name)
    }

    pub fn field_names(&self) -> Vec<String> {
        self.fields.iter().map(|field| field.name.clone()).collect()
    }

    /// Primary key names in schema order
    pub fn primary_keys(&self) -> Vec<String> {
        self.fields
            .iter()
            .filter(|field| field.primary_key)
            .map(|field| field.name.clone())
            .collect()
    }

    pub fn has_primary_key(&self) -> bool {
        self.fields.iter().any(|field| field.primary_key)
    }

    /// Copy of this schema with every primary key flag cleared
    pub fn without_primary_keys(&self) -> Self {
        Self {
            fields: self
                .fields
                .iter()
                .cloned()
                .map(|field| field.with_primary_key(false))
                .collect(),
            ..self.clone()
        }
    }
}

/// Physical table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatasetDefinition {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub database: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,
    pub schema: SchemaDefinition,
}

impl DatasetDefinition {
    pub fn new(name: impl Into<String>, schema: SchemaDefinition) -> Self {
        Self {
            database: None,
            group: None,
            name: name.into(),
            alias: None,
            schema,
        }
    }

    pub fn with_alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self
    }

    pub fn with_database(mut self, database: impl Into<String>) -> Self {
        self.database = Some(database.into());
        self
    }

    pub fn with_group(mut self, group: impl Into<String>) -> Self {
        self.group = Some(group.into());
        self
    }

    /// Fully qualified name, `database.group.name` with absent parts skipped
    pub fn qualified_name(&self) -> String {
        [self.database.as_deref(), self.group.as_deref(), Some(self.name.as_str())]
            .into_iter()
            .flatten()
            .collect::<Vec<_>>()
            .join(".")
    }
}

/// Relational source of a plan
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Dataset {
    Definition(DatasetDefinition),
    Selection(Box<Selection>),
}

impl Dataset {
    pub fn alias(&self) -> Option<&str> {
        match self {
            Dataset::Definition(definition) => definition.alias.as_deref(),
            Dataset::Selection(selection) => selection.alias.as_deref(),
        }
    }

    /// Same dataset under a different alias
    pub fn with_alias(self, alias: Option<String>) -> Self {
        match self {
            Dataset::Definition(mut definition) => {
                definition.alias = alias;
                Dataset::Definition(definition)
            }
            Dataset::Selection(mut selection) => {
                selection.alias = alias;
                Dataset::Selection(selection)
            }
        }
    }

    /// Name that qualifies this dataset's columns: the alias, or the table
    /// name of an unaliased physical table
    pub fn qualifier(&self) -> Option<&str> {
        match self {
            Dataset::Definition(definition) => {
                Some(definition.alias.as_deref().unwrap_or(&definition.name))
            }
            Dataset::Selection(selection) => selection.alias.as_deref(),
        }
    }

    /// Name used in diagnostics
    pub fn display_name(&self) -> String {
        match self {
            Dataset::Definition(definition) => definition.qualified_name(),
            Dataset::Selection(selection) => selection
                .alias
                .clone()
                .unwrap_or_else(|| format!("({})", selection.source.display_name())),
        }
    }

    /// Names of the columns this dataset produces, in order
    pub fn column_names(&self) -> Vec<String> {
        match self {
            Dataset::Definition(definition) => definition.schema.field_names(),
            Dataset::Selection(selection) => selection.column_names(),
        }
    }

    /// Output columns as column references qualified by [`Dataset::qualifier`]
    pub fn field_values(&self) -> Vec<Value> {
        let alias = self.qualifier();
        self.column_names()
            .into_iter()
            .map(|name| Value::qualified(alias, name))
            .collect()
    }

    /// Check that every column reference resolves through the source chain
    pub fn validate(&self) -> PlanResult<()> {
        match self {
            Dataset::Definition(_) => Ok(()),
            Dataset::Selection(selection) => selection.validate(),
        }
    }
}

impl From<DatasetDefinition> for Dataset {
    fn from(definition: DatasetDefinition) -> Self {
        Dataset::Definition(definition)
    }
}

impl From<Selection> for Dataset {
    fn from(selection: Selection) -> Self {
        Dataset::Selection(Box::new(selection))
    }
}

/// `SELECT fields FROM source WHERE condition GROUP BY ... HAVING ... LIMIT n`
///
/// # Example
///
/// ```rust
/// use ingest_versioning::logical_plan::{
///     Condition, DataType, Dataset, DatasetDefinition, Field, SchemaDefinition, Selection, Value,
/// };
///
/// let staging = DatasetDefinition::new(
///     "staging",
///     SchemaDefinition::new(vec![Field::new("id", DataType::Int)]),
/// )
/// .with_alias("stage");
/// let selection = Selection::new(staging)
///     .with_condition(Condition::greater_than(
///         Value::qualified(Some("stage"), "id"),
///         Value::literal(10),
///     ))
///     .with_limit(5);
/// assert!(selection.validate().is_ok());
/// assert_eq!(Dataset::from(selection).column_names(), vec!["id".to_string()]);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Selection {
    pub source: Dataset,
    pub fields: Vec<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub condition: Option<Condition>,
    #[serde(default)]
    pub group_by: Vec<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub having: Option<Condition>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,
}

impl Selection {
    /// `SELECT * FROM source`
    pub fn new(source: impl Into<Dataset>) -> Self {
        Self {
            source: source.into(),
            fields: vec![Value::All],
            condition: None,
            group_by: Vec::new(),
            having: None,
            limit: None,
            alias: None,
        }
    }

    pub fn with_fields(mut self, fields: Vec<Value>) -> Self {
        self.fields = fields;
        self
    }

    pub fn with_condition(mut self, condition: Condition) -> Self {
        self.condition = Some(condition);
        self
    }

    pub fn with_group_by(mut self, group_by: Vec<Value>) -> Self {
        self.group_by = group_by;
        self
    }

    pub fn with_having(mut self, having: Condition) -> Self {
        self.having = Some(having);
        self
    }

    pub fn with_limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn with_alias(mut self, alias: Option<String>) -> Self {
        self.alias = alias;
        self
    }

    /// Names of the projected columns; unnamed expressions are skipped
    pub fn column_names(&self) -> Vec<String> {
        self.fields
            .iter()
            .flat_map(|value| match value {
                Value::All => self.source.column_names(),
                other => other.output_name().map(str::to_string).into_iter().collect(),
            })
            .collect()
    }

    /// Check that every column reference resolves against the source.
    ///
    /// Projections, filters, grouping and window clauses may only name
    /// columns the source produces, qualified by the source's qualifier or
    /// not at all. `HAVING` may additionally name projected aliases.
    pub fn validate(&self) -> PlanResult<()> {
        self.source.validate()?;

        let source_columns = self.source.column_names();
        let scope = Scope {
            alias: self.source.qualifier(),
            columns: &source_columns,
            dataset: &self.source,
        };

        for value in self.fields.iter().chain(self.group_by.iter()) {
            scope.check(value.referenced_fields())?;
        }
        if let Some(condition) = &self.condition {
            scope.check(condition.referenced_fields())?;
        }

        if let Some(having) = &self.having {
            let mut having_columns = source_columns.clone();
            having_columns.extend(self.column_names());
            let having_scope = Scope {
                columns: &having_columns,
                ..scope
            };
            having_scope.check(having.referenced_fields())?;
        }

        Ok(())
    }
}

#[derive(Clone, Copy)]
struct Scope<'a> {
    alias: Option<&'a str>,
    columns: &'a [String],
    dataset: &'a Dataset,
}

impl Scope<'_> {
    fn check(&self, fields: Vec<&FieldValue>) -> PlanResult<()> {
        for field in fields {
            let qualifier_matches = match field.dataset_alias.as_deref() {
                None => true,
                Some(qualifier) => Some(qualifier) == self.alias,
            };
            if !qualifier_matches || !self.columns.contains(&field.field_name) {
                return Err(PlanError::UnresolvedField {
                    field: match &field.dataset_alias {
                        Some(qualifier) => format!("{}.{}", qualifier, field.field_name),
                        None => field.field_name.clone(),
                    },
                    dataset: self.dataset.display_name(),
                });
            }
        }
        Ok(())
    }
}
