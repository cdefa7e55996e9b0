//! Integration tests for db-query.

pub mod config_test;
pub mod postgres_test;
pub mod query_test;
