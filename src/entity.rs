//! Row-to-record mapping.
//!
//! A result row becomes a JSON object keyed by lower-cased column name,
//! which is then deserialized into any `serde::Deserialize` type. Record
//! fields therefore match columns by (snake_case) name, whatever case the
//! backend reports identifiers in.

use crate::db::{ColumnInfo, QueryResult, Row, Value};
use crate::error::{DbError, Result};
use serde::de::DeserializeOwned;
use serde_json::{Map, Number, Value as JsonValue};

/// Converts a single cell into its JSON form.
pub fn value_to_json(value: &Value) -> JsonValue {
    match value {
        Value::Null => JsonValue::Null,
        Value::Bool(b) => JsonValue::Bool(*b),
        Value::Int(i) => JsonValue::Number((*i).into()),
        Value::Float(f) => Number::from_f64(*f)
            .map(JsonValue::Number)
            .unwrap_or(JsonValue::Null),
        Value::Decimal(d) => match d.parse::<i64>() {
            Ok(i) => JsonValue::from(i),
            Err(_) => d
                .parse::<f64>()
                .ok()
                .and_then(Number::from_f64)
                .map(JsonValue::Number)
                .unwrap_or(JsonValue::Null),
        },
        Value::String(s) => JsonValue::String(s.clone()),
        Value::Bytes(b) => JsonValue::Array(b.iter().map(|byte| JsonValue::from(*byte)).collect()),
        Value::Date(d) => JsonValue::String(d.format("%Y-%m-%d").to_string()),
        Value::Timestamp(ts) => JsonValue::String(ts.format("%Y-%m-%dT%H:%M:%S%.f").to_string()),
    }
}

/// Converts a row into a JSON object keyed by lower-cased column name.
///
/// When two columns share a name, the first one wins.
pub fn row_to_json(columns: &[ColumnInfo], row: &Row) -> Map<String, JsonValue> {
    let mut object = Map::with_capacity(columns.len());
    for (column, value) in columns.iter().zip(row) {
        let key = column.name.to_lowercase();
        if !object.contains_key(&key) {
            object.insert(key, value_to_json(value));
        }
    }
    object
}

/// Builds a record from one row.
pub fn from_row<T: DeserializeOwned>(columns: &[ColumnInfo], row: &Row) -> Result<T> {
    serde_json::from_value(JsonValue::Object(row_to_json(columns, row)))
        .map_err(|e| DbError::mapping(e.to_string()))
}

impl QueryResult {
    /// Maps every row onto `T`.
    pub fn to_entities<T: DeserializeOwned>(&self) -> Result<Vec<T>> {
        self.rows
            .iter()
            .enumerate()
            .map(|(i, row)| self.map_row(i, row))
            .collect()
    }

    /// Maps the row at `index` onto `T`.
    pub fn entity<T: DeserializeOwned>(&self, index: usize) -> Result<T> {
        let row = self.row(index)?;
        self.map_row(index, row)
    }

    /// Every row as a JSON object, in row order.
    pub fn to_json_rows(&self) -> Vec<JsonValue> {
        self.rows
            .iter()
            .map(|row| JsonValue::Object(row_to_json(&self.columns, row)))
            .collect()
    }

    fn map_row<T: DeserializeOwned>(&self, index: usize, row: &Row) -> Result<T> {
        from_row(&self.columns, row).map_err(|e| match e {
            DbError::Mapping(msg) => DbError::mapping(format!("row {index}: {msg}")),
            other => other,
        })
    }
}
