//! Execution events
//!
//! Every parameter set sent to a physical statement produces one
//! `BeforeExecute` event and one outcome event (`ExecuteSuccess` or
//! `ExecuteFailure`). Sinks consume them for auditing and observability; the
//! executor never looks at what a sink does with them.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{DatabaseType, ParameterSet, ShardexError, SqlType};

/// Lifecycle point an event was emitted at
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    BeforeExecute,
    ExecuteSuccess,
    ExecuteFailure,
}

/// A single execution notification for one parameter set on one data source
#[derive(Debug, Clone)]
pub struct ExecutionEvent {
    pub id: Uuid,
    pub kind: EventKind,
    pub database_type: DatabaseType,
    pub sql_type: SqlType,
    pub data_source: String,
    pub sql: String,
    pub parameters: ParameterSet,
    /// Set only for `ExecuteFailure`; shared by every failure event of the
    /// same unit
    pub error: Option<Arc<ShardexError>>,
    pub timestamp: DateTime<Utc>,
}

impl ExecutionEvent {
    pub fn new(
        kind: EventKind,
        database_type: DatabaseType,
        sql_type: SqlType,
        data_source: impl Into<String>,
        sql: impl Into<String>,
        parameters: ParameterSet,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind,
            database_type,
            sql_type,
            data_source: data_source.into(),
            sql: sql.into(),
            parameters,
            error: None,
            timestamp: Utc::now(),
        }
    }

    /// Attach the error that caused a failure event
    pub fn with_error(mut self, error: Arc<ShardexError>) -> Self {
        self.error = Some(error);
        self
    }
}

/// Receiver of execution events.
///
/// Events from units running concurrently may interleave; only the order
/// within one unit is guaranteed.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: &ExecutionEvent);
}

/// Discards every event
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopEventSink;

impl EventSink for NoopEventSink {
    fn emit(&self, _event: &ExecutionEvent) {}
}

/// Writes every event as a structured tracing record
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingEventSink;

impl EventSink for TracingEventSink {
    fn emit(&self, event: &ExecutionEvent) {
        let error = event
            .error
            .as_ref()
            .map(|e| e.to_string())
            .unwrap_or_default();
        match event.kind {
            EventKind::ExecuteFailure => tracing::warn!(
                event_id = %event.id,
                database_type = %event.database_type,
                sql_type = %event.sql_type,
                data_source = %event.data_source,
                sql = %event.sql,
                parameters = ?event.parameters,
                error = %error,
                "execute failure"
            ),
            kind => tracing::debug!(
                event_id = %event.id,
                kind = ?kind,
                database_type = %event.database_type,
                sql_type = %event.sql_type,
                data_source = %event.data_source,
                sql = %event.sql,
                parameters = ?event.parameters,
                "execution event"
            ),
        }
    }
}

/// Fans events out to every subscribed sink in subscription order
#[derive(Default)]
pub struct EventBus {
    sinks: RwLock<Vec<Arc<dyn EventSink>>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a sink
    pub fn subscribe(&self, sink: Arc<dyn EventSink>) {
        self.sinks.write().push(sink);
    }

    /// Number of registered sinks
    pub fn subscriber_count(&self) -> usize {
        self.sinks.read().len()
    }
}

impl EventSink for EventBus {
    fn emit(&self, event: &ExecutionEvent) {
        for sink in self.sinks.read().iter() {
            sink.emit(event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    #[derive(Default)]
    struct CountingSink {
        kinds: Mutex<Vec<EventKind>>,
    }

    impl EventSink for CountingSink {
        fn emit(&self, event: &ExecutionEvent) {
            self.kinds.lock().push(event.kind);
        }
    }

    fn event(kind: EventKind) -> ExecutionEvent {
        ExecutionEvent::new(
            kind,
            DatabaseType::MySql,
            SqlType::Dml,
            "ds_0",
            "DELETE FROM table_x WHERE id=?",
            vec![1.into()],
        )
    }

    #[test]
    fn test_event_bus_delivers_to_every_sink() {
        let bus = EventBus::new();
        let first = Arc::new(CountingSink::default());
        let second = Arc::new(CountingSink::default());
        bus.subscribe(first.clone());
        bus.subscribe(second.clone());
        assert_eq!(bus.subscriber_count(), 2);

        bus.emit(&event(EventKind::BeforeExecute));
        bus.emit(&event(EventKind::ExecuteSuccess));

        let expected = vec![EventKind::BeforeExecute, EventKind::ExecuteSuccess];
        assert_eq!(*first.kinds.lock(), expected);
        assert_eq!(*second.kinds.lock(), expected);
    }

    #[test]
    fn test_failure_event_carries_shared_error() {
        let error = Arc::new(ShardexError::Statement("lock wait timeout".into()));
        let a = event(EventKind::ExecuteFailure).with_error(error.clone());
        let b = event(EventKind::ExecuteFailure).with_error(error.clone());
        assert!(Arc::ptr_eq(a.error.as_ref().unwrap(), b.error.as_ref().unwrap()));
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn test_empty_bus_and_builtin_sinks_accept_events() {
        let bus = EventBus::new();
        bus.emit(&event(EventKind::BeforeExecute));
        NoopEventSink.emit(&event(EventKind::ExecuteSuccess));
        TracingEventSink.emit(&event(EventKind::ExecuteFailure));
    }
}
