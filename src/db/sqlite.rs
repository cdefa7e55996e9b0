//! SQLite database client implementation.
//!
//! Provides the `SqliteClient` struct that implements the `DatabaseClient` trait
//! for SQLite databases using sqlx.

use crate::config::DataSourceConfig;
use crate::db::{
    ColumnInfo, DatabaseBackend, DatabaseClient, QueryResult, Row, Statement, Value, ValueKind,
};
use crate::error::{DbError, Result};
use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime};
use sqlx::query::Query;
use sqlx::sqlite::{
    Sqlite, SqliteArguments, SqliteColumn, SqliteConnectOptions, SqlitePool, SqlitePoolOptions,
    SqliteRow,
};
use sqlx::{Column as _, Executor as _, Row as _, Statement as _, TypeInfo as _, ValueRef as _};
use std::str::FromStr;
use std::time::{Duration, Instant};
use tracing::debug;

/// How long to wait for the connection to become free.
const ACQUIRE_TIMEOUT_SECS: u64 = 10;

/// How long SQLite waits on a locked database file.
const BUSY_TIMEOUT_SECS: u64 = 5;

/// SQLite database client.
///
/// Holds a single connection for its whole lifetime, so `sqlite::memory:`
/// databases survive between statements.
#[derive(Debug)]
pub struct SqliteClient {
    pool: SqlitePool,
}

impl SqliteClient {
    /// Creates a new SqliteClient from an existing connection pool.
    pub fn from_pool(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Opens the SQLite database described by `config`, creating the file if needed.
    pub async fn connect(config: &DataSourceConfig) -> Result<Self> {
        let conn_str = config.to_connection_string()?;
        let target = config.display_string();

        let options = SqliteConnectOptions::from_str(&conn_str)
            .map_err(|e| DbError::connection(&target, e))?
            .busy_timeout(Duration::from_secs(BUSY_TIMEOUT_SECS))
            .create_if_missing(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .acquire_timeout(Duration::from_secs(ACQUIRE_TIMEOUT_SECS))
            .connect_with(options)
            .await
            .map_err(|e| DbError::connection(&target, e))?;

        debug!("Opened SQLite database {}", target);
        Ok(Self { pool })
    }

    /// Opens a private in-memory database.
    pub async fn in_memory() -> Result<Self> {
        Self::connect(&DataSourceConfig::from_url("sqlite::memory:")?).await
    }

    /// Column metadata for a statement that returned no rows.
    async fn describe_columns(&self, sql: &str) -> Result<Vec<ColumnInfo>> {
        let prepared = (&self.pool).prepare(sql).await?;
        Ok(column_info(prepared.columns()))
    }
}

#[async_trait]
impl DatabaseClient for SqliteClient {
    fn backend(&self) -> DatabaseBackend {
        DatabaseBackend::Sqlite
    }

    async fn execute_query(&self, statement: &Statement) -> Result<QueryResult> {
        let start = Instant::now();
        let rows = build_query(statement).fetch_all(&self.pool).await?;
        let execution_time = start.elapsed();

        let columns = match rows.first() {
            Some(first) => column_info(first.columns()),
            // Statements that already ran may not prepare again (DDL, for one).
            None => self
                .describe_columns(statement.sql())
                .await
                .unwrap_or_else(|e| {
                    debug!("No column metadata for empty result: {}", e);
                    Vec::new()
                }),
        };

        let rows: Vec<Row> = rows.iter().map(|row| convert_row(row, &columns)).collect();

        let mut result = QueryResult::with_data(columns, rows).with_execution_time(execution_time);
        result.refine_untyped_columns();
        Ok(result)
    }

    async fn execute_update(&self, statement: &Statement) -> Result<u64> {
        let done = build_query(statement).execute(&self.pool).await?;
        Ok(done.rows_affected())
    }

    async fn execute_batch(&self, statements: &[Statement]) -> Result<Vec<u64>> {
        let mut conn = self.pool.acquire().await?;
        let mut counts = Vec::with_capacity(statements.len());
        for statement in statements {
            let done = build_query(statement).execute(&mut *conn).await?;
            counts.push(done.rows_affected());
        }
        Ok(counts)
    }

    async fn close(&self) -> Result<()> {
        self.pool.close().await;
        Ok(())
    }
}

/// Builds a sqlx query with every parameter bound in order.
fn build_query(statement: &Statement) -> Query<'_, Sqlite, SqliteArguments<'_>> {
    statement
        .params()
        .iter()
        .fold(sqlx::query(statement.sql()), |query, value| {
            bind_value(query, value)
        })
}

fn bind_value<'q>(
    query: Query<'q, Sqlite, SqliteArguments<'q>>,
    value: &Value,
) -> Query<'q, Sqlite, SqliteArguments<'q>> {
    match value {
        Value::Null => query.bind(None::<String>),
        Value::Bool(b) => query.bind(*b),
        Value::Int(i) => query.bind(*i),
        Value::Float(f) => query.bind(*f),
        // Numeric affinity turns the text back into a number on storage.
        Value::Decimal(d) => query.bind(d.clone()),
        Value::String(s) => query.bind(s.clone()),
        Value::Bytes(b) => query.bind(b.clone()),
        Value::Date(d) => query.bind(*d),
        Value::Timestamp(ts) => query.bind(*ts),
    }
}

fn column_info(columns: &[SqliteColumn]) -> Vec<ColumnInfo> {
    columns
        .iter()
        .map(|col| ColumnInfo::new(col.name(), col.type_info().name()))
        .collect()
}

/// Converts a sqlx SqliteRow to our Row type.
fn convert_row(row: &SqliteRow, columns: &[ColumnInfo]) -> Row {
    columns
        .iter()
        .enumerate()
        .map(|(i, col)| convert_value(row, i, col.value_kind))
        .collect()
}

/// Converts a single cell, decoding by the column's declared kind first.
///
/// SQLite stores values by storage class, not by declared type, so a cell
/// that does not decode as its column kind falls back to its storage class.
fn convert_value(row: &SqliteRow, index: usize, kind: ValueKind) -> Value {
    match row.try_get_raw(index) {
        Ok(raw) if !raw.is_null() => {}
        _ => return Value::Null,
    }

    let typed = match kind {
        ValueKind::Bool => row.try_get::<bool, _>(index).ok().map(Value::Bool),
        ValueKind::Int => row.try_get::<i64, _>(index).ok().map(Value::Int),
        ValueKind::Float => row.try_get::<f64, _>(index).ok().map(Value::Float),
        ValueKind::Decimal => decimal_by_storage_class(row, index),
        ValueKind::String => row.try_get::<String, _>(index).ok().map(Value::String),
        ValueKind::Bytes => row.try_get::<Vec<u8>, _>(index).ok().map(Value::Bytes),
        ValueKind::Date => row.try_get::<NaiveDate, _>(index).ok().map(Value::Date),
        ValueKind::Timestamp => row
            .try_get::<NaiveDateTime, _>(index)
            .ok()
            .map(Value::Timestamp),
        ValueKind::Null => None,
    };

    typed.unwrap_or_else(|| convert_by_storage_class(row, index))
}

/// Reads a NUMERIC/DECIMAL cell as decimal text, whatever class it was stored as.
fn decimal_by_storage_class(row: &SqliteRow, index: usize) -> Option<Value> {
    match convert_by_storage_class(row, index) {
        Value::Int(i) => Some(Value::Decimal(i.to_string())),
        Value::Float(f) if f.is_finite() => Some(Value::Decimal(f.to_string())),
        Value::String(s) => Value::decimal(s).ok(),
        _ => None,
    }
}

fn convert_by_storage_class(row: &SqliteRow, index: usize) -> Value {
    row.try_get::<i64, _>(index)
        .map(Value::Int)
        .or_else(|_| row.try_get::<f64, _>(index).map(Value::Float))
        .or_else(|_| row.try_get::<String, _>(index).map(Value::String))
        .or_else(|_| row.try_get::<Vec<u8>, _>(index).map(Value::Bytes))
        .unwrap_or(Value::Null)
}
