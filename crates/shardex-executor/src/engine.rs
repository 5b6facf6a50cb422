//! Execute engine for batch work items
//!
//! The engine receives one boxed future per work item and runs them either
//! inline on the caller's task or concurrently on the tokio runtime, bounded
//! by a semaphore. Outcomes are returned in submission order.
//!
//! # Example
//!
//! ```ignore
//! use shardex_executor::engine::{ExecuteEngine, ShardingExecuteEngine};
//!
//! let engine = ShardingExecuteEngine::new(1, 8);
//! let outcomes = engine.execute_all(work_items).await;
//! ```

mod sharding_engine;


pub use sharding_engine::{ExecuteEngine, ShardingExecuteEngine, WorkItem};
