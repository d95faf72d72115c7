//! Shared helpers for integration tests
//!
//! A small in-memory evaluator for logical plans so tests can check what a
//! plan returns over concrete rows instead of only its shape. Column
//! qualifiers are ignored inside a selection, since every selection reads a
//! single source.

#![allow(dead_code)]

use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};

use ingest_versioning::logical_plan::{
    ComparisonOperator, Condition, Dataset, DatasetDefinition, FunctionImpl, FunctionName,
    LogicalPlan, Operation, Selection, SortOrder, Value, WindowFunction,
};
use ingest_versioning::models::DeduplicationStrategy;
use ingest_versioning::models::deduplication::DEFAULT_COUNT_FIELD;
use ingest_versioning::planner::DeduplicationHandler;
use serde_json::Value as Json;

pub type Row = BTreeMap<String, Json>;

/// Build a row from column/value pairs
pub fn row(pairs: &[(&str, Json)]) -> Row {
    pairs
        .iter()
        .map(|(name, value)| (name.to_string(), value.clone()))
        .collect()
}

/// In-memory tables keyed by dataset name
#[derive(Debug, Default, Clone)]
pub struct Tables {
    tables: HashMap<String, Vec<Row>>,
}

impl Tables {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: &str, rows: Vec<Row>) -> Self {
        self.tables.insert(name.to_string(), rows);
        self
    }

    pub fn rows(&self, name: &str) -> &[Row] {
        self.tables.get(name).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Run every operation in order, returning the rows of the last `SELECT`
    pub fn execute(&mut self, plan: &LogicalPlan) -> Vec<Row> {
        let mut result = Vec::new();
        for operation in &plan.operations {
            match operation {
                Operation::Select(selection) => {
                    result = evaluate_selection(selection, self);
                }
                Operation::Insert {
                    target,
                    fields,
                    source,
                } => {
                    let rows: Vec<Row> = evaluate(source, self)
                        .iter()
                        .map(|source_row| {
                            fields
                                .iter()
                                .filter_map(|value| {
                                    let name = value.output_name()?.to_string();
                                    Some((name, scalar(value, source_row)))
                                })
                                .collect()
                        })
                        .collect();
                    self.tables
                        .entry(target.name.clone())
                        .or_default()
                        .extend(rows);
                }
                Operation::Delete { target, condition } => {
                    let rows = self.tables.entry(target.name.clone()).or_default();
                    match condition {
                        Some(condition) => rows.retain(|r| !holds(condition, &|v| scalar(v, r))),
                        None => rows.clear(),
                    }
                }
            }
        }
        result
    }
}

/// Rows produced by a dataset
pub fn evaluate(dataset: &Dataset, tables: &Tables) -> Vec<Row> {
    match dataset {
        Dataset::Definition(definition) => table_rows(definition, tables),
        Dataset::Selection(selection) => evaluate_selection(selection, tables),
    }
}

/// Rows produced by a single-`SELECT` plan
pub fn query(plan: &LogicalPlan, tables: &Tables) -> Vec<Row> {
    let selection = plan.as_selection().expect("single select plan");
    evaluate_selection(selection, tables)
}

fn table_rows(definition: &DatasetDefinition, tables: &Tables) -> Vec<Row> {
    let columns = definition.schema.field_names();
    tables
        .rows(&definition.name)
        .iter()
        .map(|r| {
            columns
                .iter()
                .map(|c| (c.clone(), r.get(c).cloned().unwrap_or(Json::Null)))
                .collect()
        })
        .collect()
}

fn evaluate_selection(selection: &Selection, tables: &Tables) -> Vec<Row> {
    let source_columns = selection.source.column_names();
    let mut rows = evaluate(&selection.source, tables);

    if let Some(condition) = &selection.condition {
        rows.retain(|r| holds(condition, &|v| scalar(v, r)));
    }

    let aggregated = !selection.group_by.is_empty()
        || selection.fields.iter().any(|value| is_aggregate(value));

    let mut output = if aggregated {
        aggregate(selection, &source_columns, rows)
    } else {
        project(selection, &source_columns, &rows)
    };

    if let Some(limit) = selection.limit {
        output.truncate(limit as usize);
    }
    output
}

fn is_aggregate(value: &Value) -> bool {
    matches!(value, Value::Function(function) if function.name.is_aggregate())
}

fn project(selection: &Selection, source_columns: &[String], rows: &[Row]) -> Vec<Row> {
    let windows: Vec<(usize, Vec<Json>)> = selection
        .fields
        .iter()
        .enumerate()
        .filter_map(|(i, value)| match value {
            Value::Window(window) => Some((i, window_values(window, rows))),
            _ => None,
        })
        .collect();

    rows.iter()
        .enumerate()
        .map(|(n, source_row)| {
            let mut out = Row::new();
            for (i, value) in selection.fields.iter().enumerate() {
                match value {
                    Value::All => {
                        for column in source_columns {
                            out.insert(column.clone(), lookup(source_row, column));
                        }
                    }
                    Value::Window(window) => {
                        let (_, computed) = windows
                            .iter()
                            .find(|(index, _)| *index == i)
                            .expect("window computed");
                        if let Some(alias) = &window.alias {
                            out.insert(alias.clone(), computed[n].clone());
                        }
                    }
                    other => {
                        if let Some(name) = other.output_name() {
                            out.insert(name.to_string(), scalar(other, source_row));
                        }
                    }
                }
            }
            out
        })
        .collect()
}

fn aggregate(selection: &Selection, source_columns: &[String], rows: Vec<Row>) -> Vec<Row> {
    let mut groups: Vec<(Vec<Json>, Vec<Row>)> = Vec::new();
    for r in rows {
        let key: Vec<Json> = selection.group_by.iter().map(|v| scalar(v, &r)).collect();
        match groups.iter_mut().find(|(k, _)| *k == key) {
            Some((_, members)) => members.push(r),
            None => groups.push((key, vec![r])),
        }
    }
    if groups.is_empty() && selection.group_by.is_empty() {
        groups.push((Vec::new(), Vec::new()));
    }

    groups
        .into_iter()
        .filter_map(|(_, members)| {
            let first = members.first().cloned().unwrap_or_default();
            let mut out = Row::new();
            for value in &selection.fields {
                match value {
                    Value::All => {
                        for column in source_columns {
                            out.insert(column.clone(), lookup(&first, column));
                        }
                    }
                    other => {
                        if let Some(name) = other.output_name() {
                            out.insert(name.to_string(), group_scalar(other, &members));
                        }
                    }
                }
            }

            if let Some(having) = &selection.having {
                let resolve = |v: &Value| match v {
                    Value::Field(field) if out.contains_key(&field.field_name) => {
                        out[&field.field_name].clone()
                    }
                    other => group_scalar(other, &members),
                };
                if !holds(having, &resolve) {
                    return None;
                }
            }
            Some(out)
        })
        .collect()
}

fn lookup(r: &Row, column: &str) -> Json {
    r.get(column).cloned().unwrap_or(Json::Null)
}

/// Value of a non-aggregate expression on one row
pub fn scalar(value: &Value, r: &Row) -> Json {
    match value {
        Value::Field(field) => lookup(r, &field.field_name),
        Value::Object(object) => object.value.clone(),
        other => panic!("not a scalar expression: {:?}", other),
    }
}

fn group_scalar(value: &Value, members: &[Row]) -> Json {
    match value {
        Value::Function(function) if function.name.is_aggregate() => {
            aggregate_function(function, members)
        }
        other => members
            .first()
            .map(|first| scalar(other, first))
            .unwrap_or(Json::Null),
    }
}

fn aggregate_function(function: &FunctionImpl, members: &[Row]) -> Json {
    match function.name {
        FunctionName::Count => match function.arguments.as_slice() {
            [Value::All] => Json::from(members.len()),
            [Value::Distinct(distinct)] => {
                let mut seen: Vec<Vec<Json>> = Vec::new();
                for r in members {
                    let tuple: Vec<Json> = distinct.values.iter().map(|v| scalar(v, r)).collect();
                    if tuple.iter().any(Json::is_null) || seen.contains(&tuple) {
                        continue;
                    }
                    seen.push(tuple);
                }
                Json::from(seen.len())
            }
            [argument] => {
                Json::from(members.iter().filter(|r| !scalar(argument, r).is_null()).count())
            }
            other => panic!("unsupported COUNT arguments: {:?}", other),
        },
        FunctionName::Max | FunctionName::Min => {
            let argument = &function.arguments[0];
            let wanted = if function.name == FunctionName::Max {
                Ordering::Greater
            } else {
                Ordering::Less
            };
            members
                .iter()
                .map(|r| scalar(argument, r))
                .filter(|v| !v.is_null())
                .reduce(|best, v| {
                    if compare(&v, &best) == Some(wanted) {
                        v
                    } else {
                        best
                    }
                })
                .unwrap_or(Json::Null)
        }
        FunctionName::Sum => {
            let argument = &function.arguments[0];
            let total: f64 = members
                .iter()
                .filter_map(|r| scalar(argument, r).as_f64())
                .sum();
            Json::from(total as i64)
        }
        other => panic!("not an aggregate: {}", other),
    }
}

fn window_values(window: &WindowFunction, rows: &[Row]) -> Vec<Json> {
    assert_eq!(window.function.name, FunctionName::DenseRank);
    let partition = |r: &Row| -> Vec<Json> {
        window
            .partition_by
            .iter()
            .map(|f| lookup(r, &f.field_name))
            .collect()
    };
    let order_key = |r: &Row| -> Vec<Json> {
        window
            .order_by
            .iter()
            .map(|o| lookup(r, &o.field.field_name))
            .collect()
    };
    let ordering = |a: &Vec<Json>, b: &Vec<Json>| -> Ordering {
        for ((x, y), ordered) in a.iter().zip(b).zip(&window.order_by) {
            let o = compare(x, y).unwrap_or(Ordering::Equal);
            let o = match ordered.order {
                SortOrder::Asc => o,
                SortOrder::Desc => o.reverse(),
            };
            if o != Ordering::Equal {
                return o;
            }
        }
        Ordering::Equal
    };

    rows.iter()
        .map(|r| {
            let key = partition(r);
            let mut distinct: Vec<Vec<Json>> = Vec::new();
            for other in rows.iter().filter(|other| partition(other) == key) {
                let k = order_key(other);
                if !distinct.contains(&k) {
                    distinct.push(k);
                }
            }
            distinct.sort_by(&ordering);
            let mine = order_key(r);
            let rank = distinct
                .iter()
                .position(|k| ordering(k, &mine) == Ordering::Equal)
                .expect("row in its own partition")
                + 1;
            Json::from(rank)
        })
        .collect()
}

/// Compare two JSON scalars; `None` when either is NULL or they are incomparable
pub fn compare(a: &Json, b: &Json) -> Option<Ordering> {
    match (a, b) {
        (Json::Number(x), Json::Number(y)) => x.as_f64()?.partial_cmp(&y.as_f64()?),
        (Json::String(x), Json::String(y)) => Some(x.cmp(y)),
        (Json::Bool(x), Json::Bool(y)) => Some(x.cmp(y)),
        _ => None,
    }
}

/// Evaluate a condition with SQL semantics, NULL comparisons being false
pub fn holds(condition: &Condition, resolve: &dyn Fn(&Value) -> Json) -> bool {
    match condition {
        Condition::Comparison {
            left,
            operator,
            right,
        } => {
            let Some(ordering) = compare(&resolve(left), &resolve(right)) else {
                return false;
            };
            match operator {
                ComparisonOperator::Equals => ordering == Ordering::Equal,
                ComparisonOperator::NotEquals => ordering != Ordering::Equal,
                ComparisonOperator::GreaterThan => ordering == Ordering::Greater,
                ComparisonOperator::GreaterThanEqualTo => ordering != Ordering::Less,
                ComparisonOperator::LessThan => ordering == Ordering::Less,
                ComparisonOperator::LessThanEqualTo => ordering != Ordering::Greater,
            }
        }
        Condition::And { conditions } => conditions.iter().all(|c| holds(c, resolve)),
    }
}

/// Evaluate a merge condition over a main row and a staging row, resolving
/// each column by its dataset qualifier
pub fn holds_for_pair(
    condition: &Condition,
    main_alias: &str,
    main: &Row,
    staging_alias: &str,
    staging: &Row,
) -> bool {
    holds(condition, &|value| match value {
        Value::Field(field) => match field.dataset_alias.as_deref() {
            Some(alias) if alias == main_alias => lookup(main, &field.field_name),
            Some(alias) if alias == staging_alias => lookup(staging, &field.field_name),
            other => panic!("unexpected qualifier {:?}", other),
        },
        other => scalar(other, staging),
    })
}

/// Deduplication by grouping on every staging column and counting
pub struct GroupingDeduplication;

impl DeduplicationHandler for GroupingDeduplication {
    fn deduplicate(&self, strategy: DeduplicationStrategy, staging: &Dataset) -> Dataset {
        let Some(count_field) = strategy.dedup_field() else {
            return staging.clone();
        };
        let columns = staging.field_values();
        let mut fields = columns.clone();
        fields.push(
            FunctionImpl::new(FunctionName::Count, vec![Value::All])
                .with_alias(count_field)
                .into(),
        );
        Selection::new(staging.clone())
            .with_fields(fields)
            .with_group_by(columns)
            .with_alias(Some("deduped".to_string()))
            .into()
    }
}

/// Sort rows by the given columns for order-independent assertions
pub fn sorted(mut rows: Vec<Row>, columns: &[&str]) -> Vec<Row> {
    rows.sort_by(|a, b| {
        for column in columns {
            let o = compare(&lookup(a, column), &lookup(b, column)).unwrap_or(Ordering::Equal);
            if o != Ordering::Equal {
                return o;
            }
        }
        Ordering::Equal
    });
    rows
}

/// Convenience: count column from the grouping dedup
pub fn count_of(r: &Row) -> Option<i64> {
    r.get(DEFAULT_COUNT_FIELD).and_then(Json::as_i64)
}
