//! Statement lifecycle strategies
//!
//! Both strategies feed the same executor and merge. They differ in when a
//! physical statement is prepared and how units are grouped into work items:
//!
//! - [`MemoryStrictly`] prepares one statement per route as soon as the route
//!   is first seen, binds every parameter set immediately, and runs each unit
//!   as its own work item.
//! - [`ConnectionStrictly`] holds only parameter sets until the flush, then
//!   opens at most `max_connections_per_query` connections per data source
//!   and runs the units sharing a connection one after another.

mod connection;
mod memory;


use async_trait::async_trait;
use shardex_core::{Result, RouteKey};

use crate::ConnectionMode;
use crate::batch::{BatchExecuteUnit, EventContext, UnitReport};
use crate::engine::WorkItem;

pub use connection::ConnectionStrictly;
pub use memory::MemoryStrictly;

/// Policy for obtaining physical statements and grouping units for execution
#[async_trait]
pub trait StatementStrategy: Send + Sync {
    fn connection_mode(&self) -> ConnectionMode;

    /// Create the execute unit for a route seen for the first time
    async fn create_unit(&self, key: &RouteKey) -> Result<BatchExecuteUnit>;

    /// Partition units into groups; each group becomes one work item
    fn plan(&self, units: Vec<BatchExecuteUnit>) -> Vec<Vec<BatchExecuteUnit>>;

    /// Build the work item that executes one group
    fn work_item(
        &self,
        group: Vec<BatchExecuteUnit>,
        context: EventContext,
    ) -> WorkItem<Vec<UnitReport>>;
}
