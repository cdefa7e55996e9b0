//! db-query - A small facade over SQL databases.
//!
//! Runs select, update, batch and count statements against PostgreSQL or
//! SQLite and returns results as an in-memory table with column metadata,
//! or maps rows onto `serde` records.
//!
//! ```no_run
//! use db_query::{params, DataSourceConfig, DbQuery};
//!
//! # async fn demo() -> db_query::Result<()> {
//! let config = DataSourceConfig::from_url("sqlite::memory:")?;
//! let dbq = DbQuery::connect(&config).await?;
//! dbq.update("CREATE TABLE t (id INTEGER, name TEXT)").await?;
//! dbq.update_with("INSERT INTO t VALUES (?, ?)", &params![1, "one"]).await?;
//! let result = dbq.select("SELECT * FROM t").await?;
//! assert_eq!(result.get(0, "name")?.as_str(), Some("one"));
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod db;
pub mod entity;
pub mod error;
pub mod logging;
pub mod query;

pub use config::{Config, DataSourceConfig};
pub use db::{
    ColumnIndex, ColumnInfo, DatabaseBackend, DatabaseClient, QueryResult, Row, Statement, Value,
    ValueKind,
};
pub use error::{DbError, Result};
pub use query::DbQuery;
