//! Dialect-neutral logical plans
//!
//! Plans produced here are never executed by this crate. A transformer
//! lowers each [`Operation`] to engine-specific SQL.

pub mod conditions;
pub mod datasets;
pub mod values;

use serde::{Deserialize, Serialize};

use crate::error::PlanResult;

pub use conditions::{ComparisonOperator, Condition};
pub use datasets::{
    ColumnStoreSpecification, DataType, Dataset, DatasetDefinition, Field, FieldType, Index,
    SchemaDefinition, Selection, ShardSpecification,
};
pub use values::{
    DistinctFunction, FieldValue, FunctionImpl, FunctionName, ObjectValue, OrderedField,
    SortOrder, Value, WindowFunction,
};

/// Single relational operation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Operation {
    /// Read-only query, used for probes
    Select(Selection),
    /// `INSERT INTO target (fields) SELECT ... FROM source`
    Insert {
        target: DatasetDefinition,
        fields: Vec<Value>,
        source: Dataset,
    },
    /// `DELETE FROM target [WHERE condition]`
    Delete {
        target: DatasetDefinition,
        #[serde(skip_serializing_if = "Option::is_none")]
        condition: Option<Condition>,
    },
}

/// Ordered list of operations handed to a transformer
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct LogicalPlan {
    pub operations: Vec<Operation>,
}

impl LogicalPlan {
    pub fn new(operations: Vec<Operation>) -> Self {
        Self { operations }
    }

    /// Plan with a single `SELECT`
    pub fn select(selection: Selection) -> Self {
        Self::new(vec![Operation::Select(selection)])
    }

    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    /// The selection of a single-query plan
    pub fn as_selection(&self) -> Option<&Selection> {
        match self.operations.as_slice() {
            [Operation::Select(selection)] => Some(selection),
            _ => None,
        }
    }

    /// Check every column reference in every operation
    pub fn validate(&self) -> PlanResult<()> {
        self.operations.iter().try_for_each(|operation| match operation {
            Operation::Select(selection) => selection.validate(),
            Operation::Insert { source, .. } => source.validate(),
            Operation::Delete { .. } => Ok(()),
        })
    }
}
