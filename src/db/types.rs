//! Query result types for db-query.
//!
//! Defines the in-memory result container, its column metadata and the
//! value type used for both result cells and statement parameters.

use crate::error::{DbError, Result};
use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Represents the result of executing a SQL query.
///
/// Every row holds exactly one value per column, in column order.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct QueryResult {
    /// Column metadata for the result set.
    pub columns: Vec<ColumnInfo>,

    /// Rows of data.
    pub rows: Vec<Row>,

    /// Time taken to execute the query.
    #[serde(with = "duration_serde")]
    pub execution_time: Duration,
}

impl QueryResult {
    /// Creates a new empty query result.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a query result with the given columns and rows.
    pub fn with_data(columns: Vec<ColumnInfo>, rows: Vec<Row>) -> Self {
        debug_assert!(rows.iter().all(|r| r.len() == columns.len()));
        Self {
            columns,
            rows,
            execution_time: Duration::ZERO,
        }
    }

    /// Sets the execution time.
    pub fn with_execution_time(mut self, duration: Duration) -> Self {
        self.execution_time = duration;
        self
    }

    /// Returns true if the result set is empty.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Number of rows.
    pub fn size(&self) -> usize {
        self.rows.len()
    }

    /// Number of columns.
    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    /// Column names, in column order.
    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    /// SQL type names reported by the driver, in column order.
    pub fn type_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.data_type.as_str()).collect()
    }

    /// Value class names, in column order.
    pub fn class_names(&self) -> Vec<&'static str> {
        self.columns.iter().map(|c| c.value_kind.name()).collect()
    }

    /// Index of the first column called `name`.
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }

    /// Returns the row at `index`.
    pub fn row(&self, index: usize) -> Result<&Row> {
        self.rows
            .get(index)
            .ok_or_else(|| DbError::invalid_argument(format!("Invalid row number [{index}]")))
    }

    /// Returns the cell at `row` and `column`, where `column` is either a
    /// numeric index or a column name.
    pub fn get<C: ColumnIndex>(&self, row: usize, column: C) -> Result<&Value> {
        let col = column.index_in(&self.columns)?;
        self.row(row)?
            .get(col)
            .ok_or_else(|| DbError::invalid_argument(format!("Invalid column number [{col}]")))
    }

    /// Fills in the value class of untyped columns from their first non-null value.
    pub(crate) fn refine_untyped_columns(&mut self) {
        for (i, column) in self.columns.iter_mut().enumerate() {
            if column.value_kind != ValueKind::Null {
                continue;
            }
            if let Some(kind) = self
                .rows
                .iter()
                .map(|row| row[i].kind())
                .find(|kind| *kind != ValueKind::Null)
            {
                column.value_kind = kind;
            }
        }
    }
}

impl fmt::Display for QueryResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "COLUMNS:\n[{}]", self.column_names().join(", "))?;
        write!(f, "\nRECORDS:")?;
        for row in &self.rows {
            let cells: Vec<String> = row.iter().map(Value::to_display_string).collect();
            write!(f, "\n[{}]", cells.join(", "))?;
        }
        Ok(())
    }
}

/// A way of addressing a column in a [`QueryResult`]: by position or by name.
pub trait ColumnIndex {
    /// Resolves to a column position. Names resolve to their first match;
    /// positions are bounds-checked against the row by the caller.
    fn index_in(&self, columns: &[ColumnInfo]) -> Result<usize>;
}

impl ColumnIndex for usize {
    fn index_in(&self, _columns: &[ColumnInfo]) -> Result<usize> {
        Ok(*self)
    }
}

impl ColumnIndex for &str {
    fn index_in(&self, columns: &[ColumnInfo]) -> Result<usize> {
        if self.trim().is_empty() {
            return Err(DbError::invalid_argument("Invalid column name"));
        }
        columns
            .iter()
            .position(|c| c.name == *self)
            .ok_or_else(|| DbError::invalid_argument(format!("Invalid column name <{self}>")))
    }
}

impl ColumnIndex for String {
    fn index_in(&self, columns: &[ColumnInfo]) -> Result<usize> {
        self.as_str().index_in(columns)
    }
}

impl ColumnIndex for &String {
    fn index_in(&self, columns: &[ColumnInfo]) -> Result<usize> {
        self.as_str().index_in(columns)
    }
}

/// Metadata about a column in a result set.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ColumnInfo {
    /// Column name.
    pub name: String,

    /// Column SQL type, as reported by the driver.
    pub data_type: String,

    /// Kind of value the column decodes to.
    pub value_kind: ValueKind,
}

impl ColumnInfo {
    /// Creates a new column info with the given name and type.
    ///
    /// The value kind is derived from the SQL type name.
    pub fn new(name: impl Into<String>, data_type: impl Into<String>) -> Self {
        let data_type = data_type.into();
        let value_kind = ValueKind::for_sql_type(&data_type);
        Self {
            name: name.into(),
            data_type,
            value_kind,
        }
    }
}

/// A row of data from a query result.
pub type Row = Vec<Value>;

/// The Rust-side class of a value, shared by cells and column metadata.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum ValueKind {
    /// No value, or a column whose type is only known per value.
    #[default]
    Null,
    Bool,
    Int,
    Float,
    /// Exact decimal number, kept as its canonical text.
    Decimal,
    String,
    Bytes,
    Date,
    Timestamp,
}

impl ValueKind {
    /// Returns the name of the Rust type values of this kind carry.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool => "bool",
            Self::Int => "i64",
            Self::Float => "f64",
            Self::Decimal => "Decimal",
            Self::String => "String",
            Self::Bytes => "Vec<u8>",
            Self::Date => "NaiveDate",
            Self::Timestamp => "NaiveDateTime",
        }
    }

    /// Maps a driver SQL type name onto the kind its values decode to.
    ///
    /// Unknown type names decode as text; `NULL`, `VOID` and empty names
    /// (SQLite expressions) are decoded per value.
    pub fn for_sql_type(type_name: &str) -> Self {
        let upper = type_name.trim().to_uppercase();
        match upper.as_str() {
            "" | "NULL" | "VOID" => Self::Null,
            "BOOL" | "BOOLEAN" => Self::Bool,
            "INT2" | "INT4" | "INT8" | "SMALLINT" | "INT" | "INTEGER" | "BIGINT" | "OID" => {
                Self::Int
            }
            "FLOAT4" | "FLOAT8" | "REAL" | "DOUBLE" | "DOUBLE PRECISION" | "FLOAT" => Self::Float,
            "NUMERIC" | "DECIMAL" => Self::Decimal,
            "BYTEA" | "BLOB" => Self::Bytes,
            "DATE" => Self::Date,
            "TIMESTAMP" | "TIMESTAMPTZ" | "DATETIME" => Self::Timestamp,
            _ => Self::String,
        }
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Represents a single value from a database query or a statement parameter.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub enum Value {
    /// NULL value.
    #[default]
    Null,

    /// Boolean value.
    Bool(bool),

    /// Signed integer (up to i64).
    Int(i64),

    /// Floating point number.
    Float(f64),

    /// Exact decimal number as text, e.g. `-12.50`, `NaN` or `Infinity`.
    Decimal(String),

    /// Text/string value.
    String(String),

    /// Binary data.
    Bytes(Vec<u8>),

    /// Calendar date.
    Date(NaiveDate),

    /// Date and time without a time zone.
    Timestamp(NaiveDateTime),
}

impl Value {
    /// Returns true if this value is NULL.
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Returns the kind of this value.
    pub fn kind(&self) -> ValueKind {
        match self {
            Value::Null => ValueKind::Null,
            Value::Bool(_) => ValueKind::Bool,
            Value::Int(_) => ValueKind::Int,
            Value::Float(_) => ValueKind::Float,
            Value::Decimal(_) => ValueKind::Decimal,
            Value::String(_) => ValueKind::String,
            Value::Bytes(_) => ValueKind::Bytes,
            Value::Date(_) => ValueKind::Date,
            Value::Timestamp(_) => ValueKind::Timestamp,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Returns the value as an integer; decimals qualify when they have no
    /// fractional digits and fit in an `i64`.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            Value::Decimal(d) => d.parse().ok(),
            _ => None,
        }
    }

    /// Returns the value as a float; integers and decimals are widened.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Float(f) => Some(*f),
            Value::Int(i) => Some(*i as f64),
            Value::Decimal(d) => d.parse().ok(),
            _ => None,
        }
    }

    /// Returns the text of a decimal value.
    pub fn as_decimal(&self) -> Option<&str> {
        match self {
            Value::Decimal(d) => Some(d),
            _ => None,
        }
    }

    /// Creates a decimal value, checking that `text` is a plain decimal
    /// number (`[-+]digits[.digits]`) or one of `NaN`, `Infinity`, `-Infinity`.
    pub fn decimal(text: impl Into<String>) -> Result<Self> {
        let text = text.into();
        if is_decimal_text(&text) {
            Ok(Value::Decimal(text))
        } else {
            Err(DbError::invalid_argument(format!(
                "Invalid decimal value '{text}'"
            )))
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Value::Bytes(b) => Some(b),
            _ => None,
        }
    }

    pub fn as_date(&self) -> Option<NaiveDate> {
        match self {
            Value::Date(d) => Some(*d),
            Value::Timestamp(ts) => Some(ts.date()),
            _ => None,
        }
    }

    pub fn as_timestamp(&self) -> Option<NaiveDateTime> {
        match self {
            Value::Timestamp(ts) => Some(*ts),
            _ => None,
        }
    }

    /// Attempts to convert the value to a string representation.
    pub fn to_display_string(&self) -> String {
        match self {
            Value::Null => "NULL".to_string(),
            Value::Bool(b) => b.to_string(),
            Value::Int(i) => i.to_string(),
            Value::Float(f) => f.to_string(),
            Value::Decimal(d) => d.clone(),
            Value::String(s) => s.clone(),
            Value::Bytes(b) => format!("<{} bytes>", b.len()),
            Value::Date(d) => d.format("%Y-%m-%d").to_string(),
            Value::Timestamp(ts) => ts.format(TIMESTAMP_FORMAT).to_string(),
        }
    }
}

/// Text form used for timestamps in display output and inline SQL literals.
pub(crate) const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.f";

/// True for `NaN`, `Infinity`, `-Infinity` and `[-+]digits[.digits]`.
pub(crate) fn is_decimal_text(text: &str) -> bool {
    if matches!(text, "NaN" | "Infinity" | "-Infinity") {
        return true;
    }
    let unsigned = text.strip_prefix(|c| c == '-' || c == '+').unwrap_or(text);
    let (int_part, frac_part) = match unsigned.split_once('.') {
        Some((int_part, frac_part)) => (int_part, Some(frac_part)),
        None => (unsigned, None),
    };
    let digits = |s: &str| s.bytes().all(|b| b.is_ascii_digit());
    !int_part.is_empty()
        && digits(int_part)
        && frac_part.map_or(true, |f| !f.is_empty() && digits(f))
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_display_string())
    }
}

// Conversion implementations for common types
impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(v as i64)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<f32> for Value {
    fn from(v: f32) -> Self {
        Value::Float(v as f64)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::String(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}

impl From<Vec<u8>> for Value {
    fn from(v: Vec<u8>) -> Self {
        Value::Bytes(v)
    }
}

impl From<&[u8]> for Value {
    fn from(v: &[u8]) -> Self {
        Value::Bytes(v.to_vec())
    }
}

impl From<NaiveDate> for Value {
    fn from(v: NaiveDate) -> Self {
        Value::Date(v)
    }
}

impl From<NaiveDateTime> for Value {
    fn from(v: NaiveDateTime) -> Self {
        Value::Timestamp(v)
    }
}

impl<T> From<Option<T>> for Value
where
    T: Into<Value>,
{
    fn from(v: Option<T>) -> Self {
        match v {
            Some(val) => val.into(),
            None => Value::Null,
        }
    }
}

/// Serde support for Duration (not natively supported by serde).
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        duration.as_nanos().serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let nanos = u128::deserialize(deserializer)?;
        Ok(Duration::from_nanos(nanos as u64))
    }
}
