//! Database abstraction layer for db-query.
//!
//! Provides a trait-based interface over the sqlx drivers, so the facade can
//! run against PostgreSQL or SQLite interchangeably.

mod pg_types;
mod postgres;
mod sqlite;
mod statement;
mod types;

pub use postgres::PostgresClient;
pub use sqlite::SqliteClient;
pub use statement::{split_script, sql_literal, Statement};
pub use types::{ColumnIndex, ColumnInfo, QueryResult, Row, Value, ValueKind};

use crate::config::DataSourceConfig;
use crate::error::Result;
use async_trait::async_trait;

/// Supported database backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DatabaseBackend {
    #[default]
    Postgres,
    Sqlite,
}

impl DatabaseBackend {
    /// Returns the backend as a string for config files and logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Postgres => "postgres",
            Self::Sqlite => "sqlite",
        }
    }

    /// Parses a backend from a driver identifier.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "postgres" | "postgresql" | "pg" => Some(Self::Postgres),
            "sqlite" | "sqlite3" => Some(Self::Sqlite),
            _ => None,
        }
    }

    /// Detects the backend from a connection URL's scheme.
    pub fn from_url(url: &str) -> Option<Self> {
        let (scheme, _) = url.split_once(':')?;
        match scheme.to_lowercase().as_str() {
            "postgres" | "postgresql" => Some(Self::Postgres),
            "sqlite" => Some(Self::Sqlite),
            _ => None,
        }
    }
}

impl std::fmt::Display for DatabaseBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Opens a database client for the given data source.
///
/// This is the central factory function for database connections.
pub async fn connect(config: &DataSourceConfig) -> Result<Box<dyn DatabaseClient>> {
    match config.backend()? {
        DatabaseBackend::Postgres => {
            let client = PostgresClient::connect(config).await?;
            Ok(Box::new(client))
        }
        DatabaseBackend::Sqlite => {
            let client = SqliteClient::connect(config).await?;
            Ok(Box::new(client))
        }
    }
}

/// Trait defining the interface for database clients.
///
/// All statement errors are the driver's own, wrapped in `DbError::Database`.
#[async_trait]
pub trait DatabaseClient: Send + Sync {
    /// The backend this client talks to.
    fn backend(&self) -> DatabaseBackend;

    /// Executes a statement and returns its rows.
    async fn execute_query(&self, statement: &Statement) -> Result<QueryResult>;

    /// Executes a statement and returns the number of affected rows.
    async fn execute_update(&self, statement: &Statement) -> Result<u64>;

    /// Executes statements in order on one connection, returning the affected
    /// row count of each. Stops at the first failing statement.
    async fn execute_batch(&self, statements: &[Statement]) -> Result<Vec<u64>>;

    /// Closes the database connection.
    async fn close(&self) -> Result<()>;
}
