// ABOUTME: Row and column helpers shared by the dump engine, load engine and formats
// ABOUTME: Projects rows into ordered values and normalizes driver boolean encodings

use crate::db::{Database, Row, Value};
use anyhow::Result;

/// Values of `row` in `keys` order; absent keys become `Null`.
pub fn project(row: &Row, keys: &[String]) -> Vec<Value> {
    keys.iter()
        .map(|key| row.get(key).cloned().unwrap_or(Value::Null))
        .collect()
}

pub fn project_all(rows: &[Row], keys: &[String]) -> Vec<Vec<Value>> {
    rows.iter().map(|row| project(row, keys)).collect()
}

/// Names of the boolean-typed columns of `table`, in declared order.
///
/// Fails with [`crate::error::SchemaError::TableNotFound`] for unknown tables.
pub fn boolean_columns(db: &dyn Database, table: &str) -> Result<Vec<String>> {
    Ok(db
        .columns(table)?
        .into_iter()
        .filter(|c| c.is_boolean())
        .map(|c| c.name)
        .collect())
}

/// Interpret a wire-level value of a boolean column.
///
/// Only `"t"`, `"1"` and the integer `1` are true. Any other encoding,
/// including `"true"` and `"yes"`, is false. NULL stays NULL.
pub fn coerce_boolean(value: &Value) -> Value {
    match value {
        Value::Bool(_) | Value::Null => value.clone(),
        Value::Text(s) => Value::Bool(s == "t" || s == "1"),
        Value::Int(i) => Value::Bool(*i == 1),
        Value::Float(_) | Value::Bytes(_) => Value::Bool(false),
    }
}

/// Rewrite the named columns of every row through [`coerce_boolean`].
/// Columns missing from a row are left absent.
pub fn coerce_booleans(rows: &mut [Row], columns: &[String]) {
    for row in rows.iter_mut() {
        for column in columns {
            if let Some(value) = row.get_mut(column) {
                if !value.is_bool() {
                    *value = coerce_boolean(value);
                }
            }
        }
    }
}

pub fn quote_table(db: &dyn Database, table: &str) -> String {
    db.quote_table_name(table)
}
