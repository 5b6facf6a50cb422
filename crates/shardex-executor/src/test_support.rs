//! Mock connection layer and recording sink shared by the unit tests

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;
use shardex_core::{
    BatchStatement, DataSourceProvider, EventKind, EventSink, ExecutionEvent, ParameterSet,
    Result, RouteKey, ShardConnection, ShardexError, Value,
};

/// What a mock statement does when its batch is executed
#[derive(Debug, Clone)]
pub enum Behavior {
    /// Return these codes regardless of how many sets were bound
    Codes(Vec<i64>),
    /// Fail with a statement error carrying this message
    Fail(String),
    /// Panic inside `execute_batch`
    Panic,
}

#[derive(Default)]
struct ProviderState {
    behaviors: Mutex<HashMap<RouteKey, Behavior>>,
    refused: Mutex<HashSet<String>>,
    unpreparable: Mutex<HashSet<RouteKey>>,
    unbindable: Mutex<HashSet<String>>,
    prepare_panics: Mutex<HashSet<String>>,
    connections: AtomicUsize,
    prepared: AtomicUsize,
    cleared: AtomicUsize,
    executed: Mutex<Vec<(RouteKey, Vec<ParameterSet>)>>,
}

/// Data source provider backed by scripted statements
#[derive(Clone, Default)]
pub struct MockProvider {
    state: Arc<ProviderState>,
}

impl MockProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn script(&self, data_source: &str, sql: &str, behavior: Behavior) -> &Self {
        self.state
            .behaviors
            .lock()
            .insert(RouteKey::new(data_source, sql), behavior);
        self
    }

    /// Make every connection attempt to `data_source` fail
    pub fn refuse(&self, data_source: &str) -> &Self {
        self.state.refused.lock().insert(data_source.to_string());
        self
    }

    /// Make preparing `sql` on `data_source` fail
    pub fn reject_prepare(&self, data_source: &str, sql: &str) -> &Self {
        self.state
            .unpreparable
            .lock()
            .insert(RouteKey::new(data_source, sql));
        self
    }

    /// Make binding any parameter set on `data_source` fail
    pub fn reject_bind(&self, data_source: &str) -> &Self {
        self.state.unbindable.lock().insert(data_source.to_string());
        self
    }

    /// Make preparing any statement on `data_source` panic
    pub fn panic_on_prepare(&self, data_source: &str) -> &Self {
        self.state
            .prepare_panics
            .lock()
            .insert(data_source.to_string());
        self
    }

    pub fn connections_opened(&self) -> usize {
        self.state.connections.load(Ordering::SeqCst)
    }

    pub fn statements_prepared(&self) -> usize {
        self.state.prepared.load(Ordering::SeqCst)
    }

    pub fn statements_cleared(&self) -> usize {
        self.state.cleared.load(Ordering::SeqCst)
    }

    /// Parameter sets each statement held when it was executed
    pub fn executed(&self) -> Vec<(RouteKey, Vec<ParameterSet>)> {
        self.state.executed.lock().clone()
    }
}

#[async_trait]
impl DataSourceProvider for MockProvider {
    async fn connection(&self, data_source: &str) -> Result<Arc<dyn ShardConnection>> {
        if self.state.refused.lock().contains(data_source) {
            return Err(ShardexError::Connection(format!(
                "{} refused the connection",
                data_source
            )));
        }
        self.state.connections.fetch_add(1, Ordering::SeqCst);
        Ok(Arc::new(MockConnection {
            data_source: data_source.to_string(),
            state: self.state.clone(),
        }))
    }
}

pub struct MockConnection {
    data_source: String,
    state: Arc<ProviderState>,
}

#[async_trait]
impl ShardConnection for MockConnection {
    fn data_source(&self) -> &str {
        &self.data_source
    }

    async fn prepare_batch(&self, sql: &str) -> Result<Box<dyn BatchStatement>> {
        if self.state.prepare_panics.lock().contains(&self.data_source) {
            panic!("driver crashed while preparing");
        }
        let key = RouteKey::new(&self.data_source, sql);
        if self.state.unpreparable.lock().contains(&key) {
            return Err(ShardexError::Statement(format!("cannot prepare {}", sql)));
        }
        self.state.prepared.fetch_add(1, Ordering::SeqCst);
        let behavior = self.state.behaviors.lock().get(&key).cloned();
        Ok(Box::new(MockStatement {
            key,
            behavior,
            bound: Vec::new(),
            state: self.state.clone(),
        }))
    }
}

pub struct MockStatement {
    key: RouteKey,
    behavior: Option<Behavior>,
    bound: Vec<ParameterSet>,
    state: Arc<ProviderState>,
}

#[async_trait]
impl BatchStatement for MockStatement {
    fn add_parameter_set(&mut self, params: &[Value]) -> Result<()> {
        if self.state.unbindable.lock().contains(&self.key.data_source) {
            return Err(ShardexError::Statement(format!(
                "cannot bind parameters on {}",
                self.key.data_source
            )));
        }
        self.bound.push(params.to_vec());
        Ok(())
    }

    async fn execute_batch(&mut self) -> Result<Vec<i64>> {
        self.state
            .executed
            .lock()
            .push((self.key.clone(), self.bound.clone()));
        match &self.behavior {
            Some(Behavior::Codes(codes)) => Ok(codes.clone()),
            Some(Behavior::Fail(message)) => Err(ShardexError::Statement(message.clone())),
            Some(Behavior::Panic) => panic!("driver crashed"),
            None => Ok(vec![1; self.bound.len()]),
        }
    }

    fn clear_batch(&mut self) -> Result<()> {
        self.bound.clear();
        self.state.cleared.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Sink that keeps every event it receives
#[derive(Default)]
pub struct RecordingSink {
    events: Mutex<Vec<ExecutionEvent>>,
}

impl RecordingSink {
    pub fn events(&self) -> Vec<ExecutionEvent> {
        self.events.lock().clone()
    }

    pub fn of_kind(&self, kind: EventKind) -> Vec<ExecutionEvent> {
        self.events
            .lock()
            .iter()
            .filter(|event| event.kind == kind)
            .cloned()
            .collect()
    }
}

impl EventSink for RecordingSink {
    fn emit(&self, event: &ExecutionEvent) {
        self.events.lock().push(event.clone());
    }
}
