//! The statement-execution facade.
//!
//! `DbQuery` forwards statements to a [`DatabaseClient`] and hands back
//! either the generic [`QueryResult`] table or typed records.

use std::time::Instant;

use serde::de::DeserializeOwned;
use tracing::{debug, info};

use crate::config::DataSourceConfig;
use crate::db::{self, DatabaseBackend, DatabaseClient, QueryResult, Statement, Value};
use crate::error::{DbError, Result};

/// Runs select, update, batch and count statements against one data source.
pub struct DbQuery {
    client: Box<dyn DatabaseClient>,
}

impl DbQuery {
    /// Opens the data source and wraps it.
    pub async fn connect(config: &DataSourceConfig) -> Result<Self> {
        let client = db::connect(config).await?;
        info!(
            "Connected to {} data source {}",
            client.backend(),
            config.display_string()
        );
        Ok(Self { client })
    }

    /// Wraps an already open client.
    pub fn from_client(client: Box<dyn DatabaseClient>) -> Self {
        Self { client }
    }

    pub fn backend(&self) -> DatabaseBackend {
        self.client.backend()
    }

    /// Runs a query without parameters.
    pub async fn select(&self, sql: &str) -> Result<QueryResult> {
        self.run_query(Statement::new(sql)).await
    }

    /// Runs a query with `params` bound to its `?` placeholders.
    pub async fn select_with(&self, sql: &str, params: &[Value]) -> Result<QueryResult> {
        self.run_query(Statement::new(sql).with_params(params.to_vec()))
            .await
    }

    /// Runs a query with `params` written into the SQL text as literals.
    pub async fn select_substituted(&self, sql: &str, params: &[Value]) -> Result<QueryResult> {
        let statement = self.substitute(sql, params)?;
        self.run_query(statement).await
    }

    /// Runs a data-changing statement and returns the affected row count.
    pub async fn update(&self, sql: &str) -> Result<u64> {
        self.run_update(Statement::new(sql)).await
    }

    /// Like [`update`](Self::update), with `params` bound to its placeholders.
    pub async fn update_with(&self, sql: &str, params: &[Value]) -> Result<u64> {
        self.run_update(Statement::new(sql).with_params(params.to_vec()))
            .await
    }

    /// Like [`update`](Self::update), with `params` written into the SQL text.
    pub async fn update_substituted(&self, sql: &str, params: &[Value]) -> Result<u64> {
        let statement = self.substitute(sql, params)?;
        self.run_update(statement).await
    }

    /// Runs statements in order on one connection and returns each one's
    /// affected row count. Execution stops at the first failure.
    pub async fn batch<I, S>(&self, statements: I) -> Result<Vec<u64>>
    where
        I: IntoIterator<Item = S>,
        S: Into<Statement>,
    {
        let statements: Vec<Statement> = statements.into_iter().map(Into::into).collect();
        self.run_batch(&statements).await
    }

    /// Runs the same statement once per parameter set, on one connection.
    pub async fn batch_with(&self, sql: &str, param_sets: &[Vec<Value>]) -> Result<Vec<u64>> {
        let statements: Vec<Statement> = param_sets
            .iter()
            .map(|params| Statement::new(sql).with_params(params.clone()))
            .collect();
        self.run_batch(&statements).await
    }

    /// Runs a counting query and returns the integer in its first cell.
    pub async fn count(&self, sql: &str) -> Result<i64> {
        let result = self.select(sql).await?;
        first_cell_as_count(&result)
    }

    /// Like [`count`](Self::count), with `params` bound to its placeholders.
    pub async fn count_with(&self, sql: &str, params: &[Value]) -> Result<i64> {
        let result = self.select_with(sql, params).await?;
        first_cell_as_count(&result)
    }

    /// Runs a query and maps every row onto `T`.
    pub async fn entity_list<T: DeserializeOwned>(&self, sql: &str) -> Result<Vec<T>> {
        self.select(sql).await?.to_entities()
    }

    /// Like [`entity_list`](Self::entity_list), with bound parameters.
    pub async fn entity_list_with<T: DeserializeOwned>(
        &self,
        sql: &str,
        params: &[Value],
    ) -> Result<Vec<T>> {
        self.select_with(sql, params).await?.to_entities()
    }

    /// Runs a query and maps its first row onto `T`, if there is one.
    pub async fn first_entity<T: DeserializeOwned>(
        &self,
        sql: &str,
        params: &[Value],
    ) -> Result<Option<T>> {
        let result = self.select_with(sql, params).await?;
        if result.is_empty() {
            return Ok(None);
        }
        result.entity(0).map(Some)
    }

    /// Closes the underlying connection.
    pub async fn close(&self) -> Result<()> {
        self.client.close().await
    }

    fn substitute(&self, sql: &str, params: &[Value]) -> Result<Statement> {
        Statement::new(sql)
            .with_params(params.to_vec())
            .substitute(self.backend())
    }

    async fn run_query(&self, statement: Statement) -> Result<QueryResult> {
        debug!(
            "Executing query ({} params): {}",
            statement.params().len(),
            statement.sql()
        );
        let result = self.client.execute_query(&statement).await?;
        debug!(
            "Query returned {} rows x {} columns in {:?}",
            result.size(),
            result.column_count(),
            result.execution_time
        );
        Ok(result)
    }

    async fn run_update(&self, statement: Statement) -> Result<u64> {
        debug!(
            "Executing update ({} params): {}",
            statement.params().len(),
            statement.sql()
        );
        let start = Instant::now();
        let affected = self.client.execute_update(&statement).await?;
        debug!("Update affected {} rows in {:?}", affected, start.elapsed());
        Ok(affected)
    }

    async fn run_batch(&self, statements: &[Statement]) -> Result<Vec<u64>> {
        debug!("Executing batch of {} statements", statements.len());
        let start = Instant::now();
        let counts = self.client.execute_batch(statements).await?;
        debug!(
            "Batch affected {} rows in {:?}",
            counts.iter().sum::<u64>(),
            start.elapsed()
        );
        Ok(counts)
    }
}

fn first_cell_as_count(result: &QueryResult) -> Result<i64> {
    let row = result
        .rows
        .first()
        .ok_or_else(|| DbError::query("Count query returned no rows"))?;
    let cell = row
        .first()
        .ok_or_else(|| DbError::query("Count query returned no columns"))?;
    cell.as_i64().ok_or_else(|| {
        DbError::query(format!(
            "Count query returned a non-integer value: {}",
            cell.to_display_string()
        ))
    })
}
