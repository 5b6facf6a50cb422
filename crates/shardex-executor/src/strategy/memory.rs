//! Memory-strictly strategy

use std::sync::Arc;

use async_trait::async_trait;
use futures::FutureExt;
use shardex_core::{DataSourceProvider, Result, RouteKey, RouteUnit, ShardexError, SqlUnit};

use super::StatementStrategy;
use crate::ConnectionMode;
use crate::batch::{BatchExecuteUnit, ConnectionSlot, EventContext, UnitReport, execute_unit};
use crate::engine::WorkItem;

/// Keeps one prepared statement per route for the lifetime of the batch
///
/// Without a provider the strategy can only run units that were built with
/// their statement already attached.
#[derive(Default)]
pub struct MemoryStrictly {
    provider: Option<Arc<dyn DataSourceProvider>>,
}

impl MemoryStrictly {
    pub fn new(provider: Arc<dyn DataSourceProvider>) -> Self {
        Self {
            provider: Some(provider),
        }
    }

    fn provider(&self) -> Result<&Arc<dyn DataSourceProvider>> {
        self.provider.as_ref().ok_or_else(|| {
            ShardexError::Configuration(
                "memory-strictly execution needs a data source provider to open statements".into(),
            )
        })
    }
}

#[async_trait]
impl StatementStrategy for MemoryStrictly {
    fn connection_mode(&self) -> ConnectionMode {
        ConnectionMode::MemoryStrictly
    }

    async fn create_unit(&self, key: &RouteKey) -> Result<BatchExecuteUnit> {
        let statement = self
            .provider()?
            .prepare_bound(&key.data_source, &key.sql, &[])
            .await?;
        tracing::debug!(route = %key, "opened statement for new route");
        Ok(BatchExecuteUnit::new(
            RouteUnit::new(&key.data_source, SqlUnit::new(&key.sql)),
            statement,
        ))
    }

    fn plan(&self, units: Vec<BatchExecuteUnit>) -> Vec<Vec<BatchExecuteUnit>> {
        units.into_iter().map(|unit| vec![unit]).collect()
    }

    fn work_item(
        &self,
        group: Vec<BatchExecuteUnit>,
        context: EventContext,
    ) -> WorkItem<Vec<UnitReport>> {
        let provider = self.provider.clone();
        async move {
            let mut reports = Vec::with_capacity(group.len());
            for unit in group {
                // Units built without a statement borrow a connection here
                let connection: Option<ConnectionSlot> = match (&provider, unit.has_statement()) {
                    (Some(provider), false) => Some(
                        provider
                            .connection(unit.data_source())
                            .await
                            .map_err(Arc::new),
                    ),
                    _ => None,
                };
                reports.push(execute_unit(unit, connection.as_ref(), &context).await);
            }
            reports
        }
        .boxed()
    }
}
