//! Error types for db-query.
//!
//! Driver errors pass through unchanged inside [`DbError::Database`]; the
//! remaining variants cover the facade's own argument, mapping and
//! configuration checks.

use thiserror::Error;

/// Main error type for db-query operations.
#[derive(Error, Debug)]
pub enum DbError {
    /// Errors raised by the underlying driver while running a statement.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// The data source could not be opened.
    #[error("Connection error: cannot connect to {target}: {source}")]
    Connection {
        /// Display-safe description of the data source (no password).
        target: String,
        #[source]
        source: sqlx::Error,
    },

    /// A row/column reference or statement argument is invalid.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// A statement ran but its result does not have the expected shape.
    #[error("Query error: {0}")]
    Query(String),

    /// A result row could not be mapped onto a record type.
    #[error("Mapping error: {0}")]
    Mapping(String),

    /// Configuration errors (invalid config file, missing URL, unknown driver, etc.)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Internal errors (unexpected states, I/O around the CLI, etc.)
    #[error("Internal error: {0}")]
    Internal(String),
}

impl DbError {
    /// Creates a connection error for the given target.
    pub fn connection(target: impl Into<String>, source: sqlx::Error) -> Self {
        Self::Connection {
            target: target.into(),
            source,
        }
    }

    /// Creates an invalid-argument error with the given message.
    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        Self::InvalidArgument(msg.into())
    }

    /// Creates a query error with the given message.
    pub fn query(msg: impl Into<String>) -> Self {
        Self::Query(msg.into())
    }

    /// Creates a mapping error with the given message.
    pub fn mapping(msg: impl Into<String>) -> Self {
        Self::Mapping(msg.into())
    }

    /// Creates a configuration error with the given message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Creates an internal error with the given message.
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Returns the error category as a string for display purposes.
    pub fn category(&self) -> &'static str {
        match self {
            Self::Database(_) => "Database Error",
            Self::Connection { .. } => "Connection Error",
            Self::InvalidArgument(_) => "Invalid Argument",
            Self::Query(_) => "Query Error",
            Self::Mapping(_) => "Mapping Error",
            Self::Config(_) => "Configuration Error",
            Self::Internal(_) => "Internal Error",
        }
    }

    /// Returns the driver error behind this error, if any.
    pub fn driver_error(&self) -> Option<&sqlx::Error> {
        match self {
            Self::Database(e) | Self::Connection { source: e, .. } => Some(e),
            _ => None,
        }
    }
}

/// Result type alias using DbError.
pub type Result<T> = std::result::Result<T, DbError>;
