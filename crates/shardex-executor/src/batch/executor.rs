//! Batch executor

use std::collections::HashMap;
use std::sync::Arc;

use shardex_core::{
    DataSourceProvider, DatabaseType, EventSink, ParameterSet, Result, RouteKey, RouteTarget,
    SqlType,
};

use super::{BatchExecuteUnit, BatchOutcome, EventContext, UnitReport, merge};
use crate::engine::{ExecuteEngine, ShardingExecuteEngine};
use crate::strategy::{ConnectionStrictly, MemoryStrictly, StatementStrategy};
use crate::{ConnectionMode, ExecutorConfig};

/// Accumulates one logical batched statement and executes it across shards
///
/// An executor is single use: [`execute_batch`](Self::execute_batch) takes
/// it by value, so a batch cannot be flushed twice.
pub struct BatchExecutor {
    database_type: DatabaseType,
    sql_type: SqlType,
    /// Number of logical entries added so far
    batch_count: usize,
    /// Units in first-seen route order
    units: Vec<BatchExecuteUnit>,
    positions: HashMap<RouteKey, usize>,
    strategy: Arc<dyn StatementStrategy>,
    engine: Arc<dyn ExecuteEngine<Vec<UnitReport>>>,
    events: Arc<dyn EventSink>,
    raise_on_failure: bool,
}

impl BatchExecutor {
    pub fn new(
        database_type: DatabaseType,
        sql_type: SqlType,
        strategy: Arc<dyn StatementStrategy>,
        engine: Arc<dyn ExecuteEngine<Vec<UnitReport>>>,
        events: Arc<dyn EventSink>,
    ) -> Self {
        Self {
            database_type,
            sql_type,
            batch_count: 0,
            units: Vec::new(),
            positions: HashMap::new(),
            strategy,
            engine,
            events,
            raise_on_failure: false,
        }
    }

    /// Build an executor with the strategy and engine described by `config`
    pub fn from_config(
        config: &ExecutorConfig,
        database_type: DatabaseType,
        sql_type: SqlType,
        provider: Arc<dyn DataSourceProvider>,
        events: Arc<dyn EventSink>,
    ) -> Result<Self> {
        config.validate()?;

        let strategy: Arc<dyn StatementStrategy> = match config.connection_mode() {
            ConnectionMode::MemoryStrictly => Arc::new(MemoryStrictly::new(provider)),
            ConnectionMode::ConnectionStrictly => Arc::new(ConnectionStrictly::new(
                provider,
                config.max_connections_per_query(),
            )),
        };
        let engine = Arc::new(ShardingExecuteEngine::from_config(config));

        tracing::debug!(
            connection_mode = ?config.connection_mode(),
            parallel_threshold = config.parallel_threshold(),
            max_parallelism = config.max_parallelism(),
            "created batch executor"
        );

        Ok(Self::new(database_type, sql_type, strategy, engine, events)
            .with_raise_on_failure(config.raise_on_failure()))
    }

    /// Return an error from `execute_batch` when any unit fails
    pub fn with_raise_on_failure(mut self, raise: bool) -> Self {
        self.raise_on_failure = raise;
        self
    }

    /// Replace the accumulated state with units assembled elsewhere.
    ///
    /// A `batch_count` of zero lets the merge derive the result length from
    /// the highest mapped index.
    pub fn with_units(mut self, batch_count: usize, units: Vec<BatchExecuteUnit>) -> Self {
        let mut positions = HashMap::with_capacity(units.len());
        for (position, unit) in units.iter().enumerate() {
            positions.entry(unit.key()).or_insert(position);
        }
        self.batch_count = batch_count;
        self.units = units;
        self.positions = positions;
        self
    }

    /// Add one logical batch entry.
    ///
    /// `targets` is the router's decision for this entry: every shard it has
    /// to reach, with the rewritten SQL and parameters for that shard. An
    /// entry that reaches no shard still takes a slot in the result.
    ///
    /// On error the entry is not counted and no unit keeps its parameters.
    #[tracing::instrument(
        skip(self, targets),
        fields(batch_index = self.batch_count, targets = targets.len())
    )]
    pub async fn add_batch(&mut self, targets: Vec<RouteTarget>) -> Result<()> {
        let mut touched = Vec::with_capacity(targets.len());
        for target in targets {
            let position = self.unit_position(target.key()).await?;
            touched.push((position, target.parameters));
        }

        let mut bound = Vec::with_capacity(touched.len());
        for (position, parameters) in touched {
            if let Err(error) = self.units[position].push_parameter_set(parameters) {
                self.unbind(&bound);
                return Err(error);
            }
            bound.push(position);
        }

        let global_index = self.batch_count;
        for position in bound {
            self.units[position].record_batch_entry(global_index);
        }
        self.batch_count += 1;
        Ok(())
    }

    /// Undo the parameter sets bound for an entry that was rejected
    fn unbind(&mut self, positions: &[usize]) {
        for &position in positions.iter().rev() {
            let unit = &mut self.units[position];
            if let Err(error) = unit.unbind_last() {
                tracing::error!(
                    route = %unit.key(),
                    error = %error,
                    "failed to unbind rejected batch entry"
                );
            }
        }
    }

    async fn unit_position(&mut self, key: RouteKey) -> Result<usize> {
        if let Some(&position) = self.positions.get(&key) {
            return Ok(position);
        }

        let unit = self.strategy.create_unit(&key).await?;
        let position = self.units.len();
        tracing::trace!(route = %key, position, "created execute unit");
        self.units.push(unit);
        self.positions.insert(key, position);
        Ok(position)
    }

    /// Discard every accumulated entry and unit
    pub fn clear_batch(&mut self) -> Result<()> {
        for unit in &mut self.units {
            unit.clear()?;
        }
        tracing::debug!(
            units = self.units.len(),
            batch_count = self.batch_count,
            "cleared batch"
        );
        self.units.clear();
        self.positions.clear();
        self.batch_count = 0;
        Ok(())
    }

    pub fn database_type(&self) -> DatabaseType {
        self.database_type
    }

    pub fn sql_type(&self) -> SqlType {
        self.sql_type
    }

    pub fn connection_mode(&self) -> ConnectionMode {
        self.strategy.connection_mode()
    }

    /// Number of logical entries added
    pub fn batch_count(&self) -> usize {
        self.batch_count
    }

    pub fn units(&self) -> &[BatchExecuteUnit] {
        &self.units
    }

    pub fn unit_count(&self) -> usize {
        self.units.len()
    }

    /// Parameter sets recorded for one route, empty if the route was never hit
    pub fn parameter_sets(&self, data_source: &str, sql: &str) -> &[ParameterSet] {
        self.positions
            .get(&RouteKey::new(data_source, sql))
            .map(|&position| self.units[position].parameter_sets())
            .unwrap_or_default()
    }

    /// Execute every unit and merge their result codes by logical index.
    ///
    /// Unit failures do not abort the batch. They are absorbed as zero
    /// contributions and listed in the outcome, unless the executor was told
    /// to raise on failure.
    #[tracing::instrument(
        skip(self),
        fields(
            batch_count = self.batch_count,
            unit_count = self.units.len(),
            mode = ?self.strategy.connection_mode()
        )
    )]
    pub async fn execute_batch(self) -> Result<BatchOutcome> {
        let Self {
            database_type,
            sql_type,
            batch_count,
            units,
            strategy,
            engine,
            events,
            raise_on_failure,
            ..
        } = self;

        // Routes created for rejected entries never received a parameter set
        let units: Vec<BatchExecuteUnit> = units.into_iter().filter(|u| !u.is_empty()).collect();
        if units.is_empty() {
            tracing::debug!("no units routed, returning zero results");
            return Ok(BatchOutcome::new(vec![0; batch_count], Vec::new()));
        }

        let context = EventContext::new(database_type, sql_type, events);
        let groups = strategy.plan(units);

        // Routes owned by each work item, for items that never report back
        let mut owners: Vec<Vec<(RouteKey, Vec<usize>)>> = Vec::with_capacity(groups.len());
        let mut items = Vec::with_capacity(groups.len());
        for group in groups {
            owners.push(
                group
                    .iter()
                    .map(|unit| (unit.key(), unit.index_map().to_vec()))
                    .collect(),
            );
            items.push(strategy.work_item(group, context.clone()));
        }

        let outcomes = engine.execute_all(items).await;
        debug_assert_eq!(
            outcomes.len(),
            owners.len(),
            "engine returned a different number of outcomes than work items"
        );

        let mut reports = Vec::new();
        for (owned, outcome) in owners.into_iter().zip(outcomes) {
            match outcome {
                Ok(unit_reports) => reports.extend(unit_reports),
                Err(error) => {
                    tracing::error!(
                        units = owned.len(),
                        error = %error,
                        "work item failed without reporting its units"
                    );
                    let error = Arc::new(error);
                    reports.extend(owned.into_iter().map(|(key, index_map)| {
                        UnitReport::failed(key, index_map, error.clone())
                    }));
                }
            }
        }

        let outcome = merge(batch_count, reports);
        if let Some(error) = outcome.failure_error() {
            tracing::warn!(error = %error, "batch completed with failed units");
            if raise_on_failure {
                return Err(error);
            }
        }
        Ok(outcome)
    }
}
