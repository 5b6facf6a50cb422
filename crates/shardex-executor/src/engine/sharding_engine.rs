//! Execute engine implementation

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use async_trait::async_trait;
use futures::FutureExt;
use futures::future::BoxFuture;
use shardex_core::{Result, ShardexError};
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;

use crate::ExecutorConfig;

/// A zero-argument unit of work
pub type WorkItem<T> = BoxFuture<'static, T>;

/// Runs a collection of work items and reports one outcome per item
///
/// The returned vector has exactly one entry per submitted item, at the same
/// position. An `Err` entry means the item panicked or never produced a
/// value.
#[async_trait]
pub trait ExecuteEngine<T: Send + 'static>: Send + Sync {
    async fn execute_all(&self, items: Vec<WorkItem<T>>) -> Vec<Result<T>>;
}

/// Engine that runs small batches inline and larger ones on the tokio runtime
///
/// When the item count exceeds the parallel threshold, the first item runs
/// on the caller's task while the rest are spawned.
pub struct ShardingExecuteEngine {
    /// Item count at or below which everything runs inline
    parallel_threshold: usize,
    /// Bounds the number of items executing at once
    semaphore: Arc<Semaphore>,
    max_parallelism: usize,
}

impl ShardingExecuteEngine {
    pub fn new(parallel_threshold: usize, max_parallelism: usize) -> Self {
        let max_parallelism = max_parallelism.max(1);
        Self {
            parallel_threshold,
            semaphore: Arc::new(Semaphore::new(max_parallelism)),
            max_parallelism,
        }
    }

    pub fn from_config(config: &ExecutorConfig) -> Self {
        Self::new(config.parallel_threshold(), config.max_parallelism())
    }

    pub fn parallel_threshold(&self) -> usize {
        self.parallel_threshold
    }

    pub fn max_parallelism(&self) -> usize {
        self.max_parallelism
    }

    async fn run_permitted<T>(semaphore: Arc<Semaphore>, item: WorkItem<T>) -> Result<T> {
        let _permit = semaphore
            .acquire_owned()
            .await
            .map_err(|_| ShardexError::Execution("engine semaphore closed".into()))?;
        AssertUnwindSafe(item)
            .catch_unwind()
            .await
            .map_err(|_| ShardexError::Execution("work item panicked".into()))
    }
}

/// Spawned work items, aborted if dropped before they are joined
struct SpawnedItems<T>(Vec<JoinHandle<T>>);

impl<T> Drop for SpawnedItems<T> {
    fn drop(&mut self) {
        for handle in &self.0 {
            handle.abort();
        }
    }
}

impl Default for ShardingExecuteEngine {
    fn default() -> Self {
        Self::from_config(&ExecutorConfig::default())
    }
}

#[async_trait]
impl<T: Send + 'static> ExecuteEngine<T> for ShardingExecuteEngine {
    async fn execute_all(&self, items: Vec<WorkItem<T>>) -> Vec<Result<T>> {
        let total = items.len();
        let mut outcomes = Vec::with_capacity(total);

        if total <= self.parallel_threshold {
            tracing::trace!(items = total, "running work items inline");
            for item in items {
                outcomes.push(Self::run_permitted(self.semaphore.clone(), item).await);
            }
            return outcomes;
        }

        tracing::debug!(
            items = total,
            max_parallelism = self.max_parallelism,
            "running work items concurrently"
        );

        let mut items = items.into_iter();
        let first = items.next();
        let mut spawned = SpawnedItems(
            items
                .map(|item| tokio::spawn(Self::run_permitted(self.semaphore.clone(), item)))
                .collect::<Vec<JoinHandle<Result<T>>>>(),
        );

        if let Some(first) = first {
            outcomes.push(Self::run_permitted(self.semaphore.clone(), first).await);
        }

        for handle in spawned.0.iter_mut() {
            let outcome = match handle.await {
                Ok(outcome) => outcome,
                Err(e) => {
                    tracing::error!(error = %e, "work item did not complete");
                    Err(ShardexError::Execution(format!(
                        "work item did not complete: {}",
                        e
                    )))
                }
            };
            outcomes.push(outcome);
        }

        outcomes
    }
}
