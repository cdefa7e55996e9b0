//! Statement execution for db-query.
//!
//! This module holds the facade callers use instead of talking to a
//! `DatabaseClient` directly.

pub mod executor;

pub use executor::DbQuery;
