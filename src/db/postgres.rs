//! PostgreSQL database client implementation.
//!
//! Provides the `PostgresClient` struct that implements the `DatabaseClient` trait
//! for PostgreSQL databases using sqlx.

use crate::config::DataSourceConfig;
use crate::db::{ColumnInfo, DatabaseBackend, DatabaseClient, QueryResult, Row, Statement, Value};
use crate::error::{DbError, Result};
use async_trait::async_trait;
use crate::db::pg_types::{
    array_text_element, format_array, format_interval, PgDecimal, UntypedNull,
};
use crate::db::ValueKind;
use chrono::{DateTime, FixedOffset, NaiveDateTime, NaiveTime, Utc};
use sqlx::postgres::types::{Oid, PgInterval, PgTimeTz};
use sqlx::postgres::{
    PgArguments, PgColumn, PgPool, PgPoolOptions, PgRow, PgTypeInfo, PgTypeKind, Postgres,
};
use sqlx::query::Query;
use sqlx::types::{JsonValue, Uuid};
use sqlx::{Column as _, Executor as _, Row as _, Statement as _, TypeInfo as _, ValueRef as _};
use std::time::{Duration, Instant};
use tracing::debug;

/// How long to wait for the connection to become free.
const ACQUIRE_TIMEOUT_SECS: u64 = 10;

/// PostgreSQL database client.
#[derive(Debug)]
pub struct PostgresClient {
    pool: PgPool,
}

impl PostgresClient {
    /// Creates a new PostgresClient from an existing connection pool.
    ///
    /// This is primarily useful for testing.
    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connects to the PostgreSQL server described by `config`.
    pub async fn connect(config: &DataSourceConfig) -> Result<Self> {
        let conn_str = config.to_connection_string()?;
        let target = config.display_string();

        let pool = PgPoolOptions::new()
            .max_connections(1)
            .acquire_timeout(Duration::from_secs(ACQUIRE_TIMEOUT_SECS))
            .connect(&conn_str)
            .await
            .map_err(|e| DbError::connection(&target, e))?;

        debug!("Connected to PostgreSQL at {}", target);
        Ok(Self { pool })
    }

    /// Column metadata for a statement that returned no rows.
    async fn describe_columns(&self, sql: &str) -> Result<Vec<ColumnInfo>> {
        let prepared = (&self.pool).prepare(sql).await?;
        Ok(column_info(prepared.columns()))
    }
}

#[async_trait]
impl DatabaseClient for PostgresClient {
    fn backend(&self) -> DatabaseBackend {
        DatabaseBackend::Postgres
    }

    async fn execute_query(&self, statement: &Statement) -> Result<QueryResult> {
        let sql = statement.numbered_sql();
        let start = Instant::now();
        let rows = build_query(&sql, statement.params())
            .fetch_all(&self.pool)
            .await?;
        let execution_time = start.elapsed();

        let columns = match rows.first() {
            Some(first) => column_info(first.columns()),
            None => self.describe_columns(&sql).await?,
        };

        let rows = rows.iter().map(convert_row).collect::<Result<Vec<Row>>>()?;

        Ok(QueryResult::with_data(columns, rows).with_execution_time(execution_time))
    }

    async fn execute_update(&self, statement: &Statement) -> Result<u64> {
        let sql = statement.numbered_sql();
        let done = build_query(&sql, statement.params())
            .execute(&self.pool)
            .await?;
        Ok(done.rows_affected())
    }

    async fn execute_batch(&self, statements: &[Statement]) -> Result<Vec<u64>> {
        let mut conn = self.pool.acquire().await?;
        let mut counts = Vec::with_capacity(statements.len());
        for statement in statements {
            let sql = statement.numbered_sql();
            let done = build_query(&sql, statement.params())
                .execute(&mut *conn)
                .await?;
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
fn build_query<'q>(sql: &'q str, params: &[Value]) -> Query<'q, Postgres, PgArguments> {
    params
        .iter()
        .fold(sqlx::query(sql), |query, value| bind_value(query, value))
}

fn bind_value<'q>(
    query: Query<'q, Postgres, PgArguments>,
    value: &Value,
) -> Query<'q, Postgres, PgArguments> {
    match value {
        Value::Null => query.bind(UntypedNull),
        Value::Bool(b) => query.bind(*b),
        Value::Int(i) => query.bind(*i),
        Value::Float(f) => query.bind(*f),
        Value::Decimal(d) => query.bind(PgDecimal(d.clone())),
        Value::String(s) => query.bind(s.clone()),
        Value::Bytes(b) => query.bind(b.clone()),
        Value::Date(d) => query.bind(*d),
        Value::Timestamp(ts) => query.bind(*ts),
    }
}

fn column_info(columns: &[PgColumn]) -> Vec<ColumnInfo> {
    columns
        .iter()
        .map(|col| ColumnInfo::new(col.name(), col.type_info().name()))
        .collect()
}

/// Converts a sqlx PgRow to our Row type.
fn convert_row(row: &PgRow) -> Result<Row> {
    row.columns()
        .iter()
        .enumerate()
        .map(|(i, col)| convert_value(row, i, col.type_info()))
        .collect()
}

/// Converts a single column value from a PgRow to our Value type.
///
/// The value kind comes from the column type, the same way the column's
/// class name does. PostgreSQL decodes strictly by wire type, so widths
/// are then matched on the type name before widening. A type with no
/// decoding here is a driver error, never a silent NULL.
fn convert_value(row: &PgRow, index: usize, type_info: &PgTypeInfo) -> Result<Value> {
    if row.try_get_raw(index)?.is_null() {
        return Ok(Value::Null);
    }

    let type_name = type_info.name();
    let value = match ValueKind::for_sql_type(type_name) {
        ValueKind::Null => Value::Null,
        ValueKind::Bool => Value::Bool(row.try_get(index)?),
        ValueKind::Int => Value::Int(match type_name {
            "INT2" => row.try_get::<i16, _>(index)?.into(),
            "INT4" => row.try_get::<i32, _>(index)?.into(),
            "OID" => row.try_get::<Oid, _>(index)?.0.into(),
            _ => row.try_get::<i64, _>(index)?,
        }),
        ValueKind::Float => Value::Float(match type_name {
            "FLOAT4" => row.try_get::<f32, _>(index)?.into(),
            _ => row.try_get::<f64, _>(index)?,
        }),
        ValueKind::Decimal => Value::Decimal(row.try_get_unchecked::<PgDecimal, _>(index)?.0),
        ValueKind::Bytes => Value::Bytes(row.try_get(index)?),
        ValueKind::Date => Value::Date(row.try_get(index)?),
        ValueKind::Timestamp => Value::Timestamp(match type_name {
            "TIMESTAMPTZ" => row.try_get::<DateTime<Utc>, _>(index)?.naive_utc(),
            _ => row.try_get::<NaiveDateTime, _>(index)?,
        }),
        ValueKind::String => Value::String(decode_text(row, index, type_info)?),
    };
    Ok(value)
}

/// Renders a column with no dedicated value kind as text.
fn decode_text(row: &PgRow, index: usize, type_info: &PgTypeInfo) -> Result<String> {
    if matches!(type_info.kind(), PgTypeKind::Enum(_)) {
        return Ok(row.try_get_unchecked::<String, _>(index)?);
    }

    let text = match type_info.name() {
        "UUID" => row.try_get::<Uuid, _>(index)?.to_string(),
        "JSON" | "JSONB" => row.try_get::<JsonValue, _>(index)?.to_string(),
        "TIME" => row.try_get::<NaiveTime, _>(index)?.to_string(),
        "TIMETZ" => {
            let value = row.try_get::<PgTimeTz<NaiveTime, FixedOffset>, _>(index)?;
            format!("{}{}", value.time, value.offset)
        }
        "INTERVAL" => format_interval(&row.try_get::<PgInterval, _>(index)?),
        "XML" | "CITEXT" => row.try_get_unchecked::<String, _>(index)?,
        "BOOL[]" => format_array(row.try_get::<Vec<Option<bool>>, _>(index)?, |b| {
            (if b { "t" } else { "f" }).to_string()
        }),
        "INT2[]" => format_array(row.try_get::<Vec<Option<i16>>, _>(index)?, |v| v.to_string()),
        "INT4[]" => format_array(row.try_get::<Vec<Option<i32>>, _>(index)?, |v| v.to_string()),
        "INT8[]" => format_array(row.try_get::<Vec<Option<i64>>, _>(index)?, |v| v.to_string()),
        "FLOAT4[]" => format_array(row.try_get::<Vec<Option<f32>>, _>(index)?, |v| v.to_string()),
        "FLOAT8[]" => format_array(row.try_get::<Vec<Option<f64>>, _>(index)?, |v| v.to_string()),
        "NUMERIC[]" => format_array(
            row.try_get_unchecked::<Vec<Option<PgDecimal>>, _>(index)?,
            |d| d.0,
        ),
        "UUID[]" => format_array(row.try_get::<Vec<Option<Uuid>>, _>(index)?, |u| u.to_string()),
        "TEXT[]" | "VARCHAR[]" | "BPCHAR[]" | "NAME[]" => format_array(
            row.try_get::<Vec<Option<String>>, _>(index)?,
            array_text_element,
        ),
        _ => row.try_get::<String, _>(index)?,
    };
    Ok(text)
}
