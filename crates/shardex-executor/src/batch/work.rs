//! Per-unit execution and event emission

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use shardex_core::{
    BatchStatement, DatabaseType, EventKind, EventSink, ExecutionEvent, RouteKey, ShardConnection,
    ShardexError, SqlType, bind_statement,
};

use super::BatchExecuteUnit;

/// A connection acquired for a work item, or the error that prevented it
pub type ConnectionSlot = std::result::Result<Arc<dyn ShardConnection>, Arc<ShardexError>>;

/// Annotations and sink shared by every event of one logical batch
#[derive(Clone)]
pub struct EventContext {
    database_type: DatabaseType,
    sql_type: SqlType,
    sink: Arc<dyn EventSink>,
}

impl EventContext {
    pub fn new(database_type: DatabaseType, sql_type: SqlType, sink: Arc<dyn EventSink>) -> Self {
        Self {
            database_type,
            sql_type,
            sink,
        }
    }

    pub fn database_type(&self) -> DatabaseType {
        self.database_type
    }

    pub fn sql_type(&self) -> SqlType {
        self.sql_type
    }

    /// One `BeforeExecute` event per local rank
    pub fn emit_before(&self, unit: &BatchExecuteUnit) {
        self.emit_per_rank(EventKind::BeforeExecute, unit, None);
    }

    /// One `ExecuteSuccess` event per local rank
    pub fn emit_success(&self, unit: &BatchExecuteUnit) {
        self.emit_per_rank(EventKind::ExecuteSuccess, unit, None);
    }

    /// One `ExecuteFailure` event per local rank, all carrying `error`
    pub fn emit_failure(&self, unit: &BatchExecuteUnit, error: &Arc<ShardexError>) {
        self.emit_per_rank(EventKind::ExecuteFailure, unit, Some(error));
    }

    fn emit_per_rank(
        &self,
        kind: EventKind,
        unit: &BatchExecuteUnit,
        error: Option<&Arc<ShardexError>>,
    ) {
        for params in unit.parameter_sets() {
            let mut event = ExecutionEvent::new(
                kind,
                self.database_type,
                self.sql_type,
                unit.data_source(),
                unit.sql(),
                params.clone(),
            );
            if let Some(error) = error {
                event = event.with_error(error.clone());
            }
            self.sink.emit(&event);
        }
    }
}

/// What one unit contributed to the batch
#[derive(Debug, Clone)]
pub struct UnitReport {
    pub key: RouteKey,
    pub index_map: Vec<usize>,
    /// Result codes per local rank, or the error that failed the unit
    pub result: std::result::Result<Vec<i64>, Arc<ShardexError>>,
}

impl UnitReport {
    pub fn failed(key: RouteKey, index_map: Vec<usize>, error: Arc<ShardexError>) -> Self {
        Self {
            key,
            index_map,
            result: Err(error),
        }
    }

    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }
}

/// Run one unit: emit before events, execute its statement and emit the
/// outcome events.
///
/// A unit without a held statement has it prepared on `connection`. Errors,
/// including a panic inside the driver, fail only this unit.
pub async fn execute_unit(
    mut unit: BatchExecuteUnit,
    connection: Option<&ConnectionSlot>,
    context: &EventContext,
) -> UnitReport {
    debug_assert!(
        unit.is_consistent(),
        "index map and parameter sets disagree for {}",
        unit.key()
    );
    context.emit_before(&unit);

    let held = unit.take_statement();
    let result = match AssertUnwindSafe(run_unit(&unit, held, connection))
        .catch_unwind()
        .await
    {
        Ok(result) => result,
        Err(_) => Err(Arc::new(ShardexError::Execution(format!(
            "driver panicked while executing {}",
            unit.key()
        )))),
    };

    match &result {
        Ok(codes) => {
            tracing::debug!(
                data_source = %unit.data_source(),
                sql = %unit.sql(),
                ranks = unit.len(),
                codes = ?codes,
                "execute unit succeeded"
            );
            context.emit_success(&unit);
        }
        Err(error) => {
            tracing::warn!(
                data_source = %unit.data_source(),
                sql = %unit.sql(),
                ranks = unit.len(),
                error = %error,
                "execute unit failed"
            );
            context.emit_failure(&unit, error);
        }
    }

    UnitReport {
        key: unit.key(),
        index_map: unit.index_map().to_vec(),
        result,
    }
}

async fn prepare(
    unit: &BatchExecuteUnit,
    connection: Option<&ConnectionSlot>,
) -> std::result::Result<Box<dyn BatchStatement>, Arc<ShardexError>> {
    match connection {
        Some(Ok(connection)) => {
            bind_statement(connection.as_ref(), unit.sql(), unit.parameter_sets())
                .await
                .map_err(Arc::new)
        }
        Some(Err(error)) => Err(error.clone()),
        None => Err(Arc::new(ShardexError::Statement(format!(
            "no statement or connection available for {}",
            unit.key()
        )))),
    }
}

/// Prepare the statement if the unit does not hold one, then run it
async fn run_unit(
    unit: &BatchExecuteUnit,
    held: Option<Box<dyn BatchStatement>>,
    connection: Option<&ConnectionSlot>,
) -> std::result::Result<Vec<i64>, Arc<ShardexError>> {
    let mut statement = match held {
        Some(statement) => statement,
        None => prepare(unit, connection).await?,
    };
    statement.execute_batch().await.map_err(Arc::new)
}
