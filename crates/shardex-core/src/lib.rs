//! Shardex Core - Shared vocabulary for sharded batch execution
//!
//! This crate provides the types and traits that the executor and its
//! collaborators agree on. It defines:
//!
//! - `BatchStatement`, `ShardConnection`, `DataSourceProvider` - Seams to the
//!   physical connection layer
//! - `RouteUnit`, `RouteTarget` - Output of the external router/rewriter
//! - `ExecutionEvent`, `EventSink`, `EventBus` - Execution lifecycle events
//! - Common types like `Value`, `DatabaseType`, `SqlType` and `ShardexError`

mod error;
pub mod event;
mod route;
mod statement;
mod types;

pub use error::*;
pub use event::{EventBus, EventKind, EventSink, ExecutionEvent, NoopEventSink, TracingEventSink};
pub use route::*;
pub use statement::*;
pub use types::*;
