//! Connection-strictly strategy

use std::sync::Arc;

use async_trait::async_trait;
use futures::FutureExt;
use shardex_core::{DataSourceProvider, Result, RouteKey, RouteUnit, SqlUnit};

use super::StatementStrategy;
use crate::ConnectionMode;
use crate::batch::{BatchExecuteUnit, ConnectionSlot, EventContext, UnitReport, execute_unit};
use crate::engine::WorkItem;

/// Prepares statements at flush time on a bounded number of connections per
/// data source
pub struct ConnectionStrictly {
    provider: Arc<dyn DataSourceProvider>,
    max_connections_per_query: usize,
}

impl ConnectionStrictly {
    pub fn new(provider: Arc<dyn DataSourceProvider>, max_connections_per_query: usize) -> Self {
        Self {
            provider,
            max_connections_per_query: max_connections_per_query.max(1),
        }
    }

    pub fn max_connections_per_query(&self) -> usize {
        self.max_connections_per_query
    }
}

/// Group units by data source, keeping first-seen order, then split each
/// data source's units into at most `max_groups` chunks of equal size
fn group_by_data_source(
    units: Vec<BatchExecuteUnit>,
    max_groups: usize,
) -> Vec<Vec<BatchExecuteUnit>> {
    let mut by_source: Vec<(String, Vec<BatchExecuteUnit>)> = Vec::new();
    for unit in units {
        match by_source
            .iter_mut()
            .find(|(data_source, _)| data_source == unit.data_source())
        {
            Some((_, group)) => group.push(unit),
            None => by_source.push((unit.data_source().to_string(), vec![unit])),
        }
    }

    let mut groups = Vec::new();
    for (_, units) in by_source {
        let chunk_size = units.len().div_ceil(max_groups);
        let mut units = units.into_iter().peekable();
        while units.peek().is_some() {
            groups.push(units.by_ref().take(chunk_size).collect());
        }
    }
    groups
}

#[async_trait]
impl StatementStrategy for ConnectionStrictly {
    fn connection_mode(&self) -> ConnectionMode {
        ConnectionMode::ConnectionStrictly
    }

    async fn create_unit(&self, key: &RouteKey) -> Result<BatchExecuteUnit> {
        Ok(BatchExecuteUnit::deferred(RouteUnit::new(
            &key.data_source,
            SqlUnit::new(&key.sql),
        )))
    }

    fn plan(&self, units: Vec<BatchExecuteUnit>) -> Vec<Vec<BatchExecuteUnit>> {
        group_by_data_source(units, self.max_connections_per_query)
    }

    fn work_item(
        &self,
        group: Vec<BatchExecuteUnit>,
        context: EventContext,
    ) -> WorkItem<Vec<UnitReport>> {
        let provider = self.provider.clone();
        async move {
            let needs_connection = group.iter().any(|unit| !unit.has_statement());
            let connection: Option<ConnectionSlot> = match group.first() {
                Some(unit) if needs_connection => {
                    tracing::trace!(
                        data_source = %unit.data_source(),
                        units = group.len(),
                        "acquiring connection for group"
                    );
                    Some(provider.connection(unit.data_source()).await.map_err(Arc::new))
                }
                _ => None,
            };

            let mut reports = Vec::with_capacity(group.len());
            for unit in group {
                reports.push(execute_unit(unit, connection.as_ref(), &context).await);
            }
            reports
        }
        .boxed()
    }
}
