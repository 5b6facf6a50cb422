//! Shardex Executor - Sharded batch statement execution
//!
//! This crate runs one logical batched SQL statement across many physical
//! shard statements and merges their result codes back into one array, as if
//! a single unsharded statement had run. It provides:
//!
//! - `BatchExecutor` - Accumulates logical entries and executes them
//! - `ExecuteEngine` / `ShardingExecuteEngine` - Inline or concurrent runner
//!   for work items
//! - `StatementStrategy` with `MemoryStrictly` and `ConnectionStrictly` -
//!   Statement lifecycle variants
//! - `ExecutorConfig` - TOML-loadable settings
//!
//! # Example
//!
//! ```ignore
//! use shardex_core::{DatabaseType, RouteTarget, SqlType, TracingEventSink};
//! use shardex_executor::{BatchExecutor, ExecutorConfig};
//!
//! let mut executor = BatchExecutor::from_config(
//!     &ExecutorConfig::default(),
//!     DatabaseType::MySql,
//!     SqlType::Dml,
//!     provider,
//!     Arc::new(TracingEventSink),
//! )?;
//! executor
//!     .add_batch(vec![RouteTarget::new("ds_0", "DELETE FROM t_order_0 WHERE id=?", [1.into()])])
//!     .await?;
//! let outcome = executor.execute_batch().await?;
//! ```

pub mod batch;
mod config;
pub mod engine;
pub mod logging;
pub mod strategy;

#[cfg(test)]
mod test_support;

pub use batch::{BatchExecuteUnit, BatchExecutor, BatchOutcome, UnitFailure, UnitReport};
pub use config::{ConnectionMode, ExecutorConfig};
pub use engine::{ExecuteEngine, ShardingExecuteEngine, WorkItem};
pub use strategy::{ConnectionStrictly, MemoryStrictly, StatementStrategy};
