//! Physical statement and connection seams
//!
//! Connection acquisition and pooling are owned by the caller's connection
//! layer. The executor only talks to these traits.

use std::sync::Arc;

use async_trait::async_trait;

use crate::{ParameterSet, Result, Value};

/// A prepared statement that accumulates parameter sets and runs them as one
/// physical batch
#[async_trait]
pub trait BatchStatement: Send + Sync {
    /// Bind one more parameter set to the pending batch
    fn add_parameter_set(&mut self, params: &[Value]) -> Result<()>;

    /// Run every pending parameter set.
    ///
    /// Returns one result code per parameter set, in the order they were added.
    async fn execute_batch(&mut self) -> Result<Vec<i64>>;

    /// Drop the pending parameter sets without running them
    fn clear_batch(&mut self) -> Result<()> {
        Ok(())
    }
}

/// A physical connection to one data source
#[async_trait]
pub trait ShardConnection: Send + Sync {
    /// Data source this connection belongs to
    fn data_source(&self) -> &str;

    /// Prepare a reusable batch statement for the given SQL
    async fn prepare_batch(&self, sql: &str) -> Result<Box<dyn BatchStatement>>;
}

/// Hands out connections by data source name
#[async_trait]
pub trait DataSourceProvider: Send + Sync {
    /// Acquire a connection to the named data source
    async fn connection(&self, data_source: &str) -> Result<Arc<dyn ShardConnection>>;

    /// Prepare a statement on a fresh connection and bind the given parameter
    /// sets to it
    async fn prepare_bound(
        &self,
        data_source: &str,
        sql: &str,
        parameter_sets: &[ParameterSet],
    ) -> Result<Box<dyn BatchStatement>> {
        let connection = self.connection(data_source).await?;
        bind_statement(connection.as_ref(), sql, parameter_sets).await
    }
}

/// Prepare `sql` on `connection` and bind every parameter set in order
pub async fn bind_statement(
    connection: &dyn ShardConnection,
    sql: &str,
    parameter_sets: &[ParameterSet],
) -> Result<Box<dyn BatchStatement>> {
    let mut statement = connection.prepare_batch(sql).await?;
    for params in parameter_sets {
        statement.add_parameter_set(params)?;
    }
    tracing::trace!(
        data_source = %connection.data_source(),
        sql = %sql,
        parameter_sets = parameter_sets.len(),
        "bound batch statement"
    );
    Ok(statement)
}
