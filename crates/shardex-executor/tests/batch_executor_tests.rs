//! End-to-end tests for sharded batch execution through the public API

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use pretty_assertions::assert_eq;
use shardex_core::{
    BatchStatement, DataSourceProvider, DatabaseType, EventBus, EventKind, EventSink,
    ExecutionEvent, Result, RouteTarget, ShardConnection, ShardexError, SqlType, Value,
};
use shardex_executor::logging;
use shardex_executor::{
    BatchExecutor, ConnectionMode, ExecuteEngine, ExecutorConfig, MemoryStrictly, UnitReport,
    WorkItem,
};

const DELETE: &str = "DELETE FROM t_order WHERE order_id=?";

/// Every shard deletes one row per parameter set, multiplied by a per-shard
/// factor so contributions can be told apart
#[derive(Clone, Default)]
struct ShardCluster {
    factors: HashMap<String, i64>,
    broken: Vec<String>,
}

impl ShardCluster {
    fn new(shards: &[(&str, i64)]) -> Self {
        Self {
            factors: shards
                .iter()
                .map(|(name, factor)| (name.to_string(), *factor))
                .collect(),
            broken: Vec::new(),
        }
    }

    fn broken(mut self, shard: &str) -> Self {
        self.broken.push(shard.to_string());
        self
    }
}

#[async_trait]
impl DataSourceProvider for ShardCluster {
    async fn connection(&self, data_source: &str) -> Result<Arc<dyn ShardConnection>> {
        let factor = self.factors.get(data_source).copied().ok_or_else(|| {
            ShardexError::Connection(format!("unknown data source {}", data_source))
        })?;
        Ok(Arc::new(ShardHandle {
            name: data_source.to_string(),
            factor,
            broken: self.broken.iter().any(|b| b == data_source),
        }))
    }
}

struct ShardHandle {
    name: String,
    factor: i64,
    broken: bool,
}

#[async_trait]
impl ShardConnection for ShardHandle {
    fn data_source(&self) -> &str {
        &self.name
    }

    async fn prepare_batch(&self, _sql: &str) -> Result<Box<dyn BatchStatement>> {
        Ok(Box::new(ShardStatement {
            factor: self.factor,
            broken: self.broken,
            pending: 0,
        }))
    }
}

struct ShardStatement {
    factor: i64,
    broken: bool,
    pending: usize,
}

#[async_trait]
impl BatchStatement for ShardStatement {
    fn add_parameter_set(&mut self, _params: &[Value]) -> Result<()> {
        self.pending += 1;
        Ok(())
    }

    async fn execute_batch(&mut self) -> Result<Vec<i64>> {
        tokio::time::sleep(Duration::from_millis(5)).await;
        if self.broken {
            return Err(ShardexError::Statement("table t_order is read only".into()));
        }
        Ok(vec![self.factor; self.pending])
    }
}

#[derive(Default)]
struct KindCounter {
    kinds: Mutex<Vec<EventKind>>,
}

impl KindCounter {
    fn count(&self, kind: EventKind) -> usize {
        self.kinds.lock().iter().filter(|k| **k == kind).count()
    }
}

impl EventSink for KindCounter {
    fn emit(&self, event: &ExecutionEvent) {
        self.kinds.lock().push(event.kind);
    }
}

fn broadcast(id: i64, shards: &[&str]) -> Vec<RouteTarget> {
    shards
        .iter()
        .map(|shard| RouteTarget::new(*shard, DELETE, [Value::from(id)]))
        .collect()
}

async fn run(
    config: ExecutorConfig,
    cluster: ShardCluster,
    events: Arc<dyn EventSink>,
    entries: Vec<Vec<RouteTarget>>,
) -> Result<Vec<i64>> {
    let mut executor = BatchExecutor::from_config(
        &config,
        DatabaseType::MySql,
        SqlType::Dml,
        Arc::new(cluster),
        events,
    )?;
    for targets in entries {
        executor.add_batch(targets).await?;
    }
    executor.execute_batch().await?.into_result()
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_broadcast_across_four_shards_concurrently() {
    logging::init_for_tests();
    let shards = ["ds_0", "ds_1", "ds_2", "ds_3"];
    let cluster = ShardCluster::new(&[("ds_0", 1), ("ds_1", 10), ("ds_2", 100), ("ds_3", 1000)]);
    let counter = Arc::new(KindCounter::default());
    let config = ExecutorConfig::default()
        .with_parallel_threshold(1)
        .with_max_parallelism(2);

    let entries = (1..=3).map(|id| broadcast(id, &shards)).collect();
    let results = run(config, cluster, counter.clone(), entries).await.unwrap();

    assert_eq!(results, vec![1111, 1111, 1111]);
    assert_eq!(counter.count(EventKind::BeforeExecute), 12);
    assert_eq!(counter.count(EventKind::ExecuteSuccess), 12);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_both_modes_merge_identically() {
    logging::init_for_tests();
    let cluster = ShardCluster::new(&[("ds_0", 2), ("ds_1", 3)]);
    let entries = || {
        vec![
            broadcast(1, &["ds_0"]),
            broadcast(2, &["ds_0", "ds_1"]),
            Vec::new(),
            broadcast(4, &["ds_1"]),
        ]
    };

    for mode in [ConnectionMode::MemoryStrictly, ConnectionMode::ConnectionStrictly] {
        let config = ExecutorConfig::new(mode).with_max_connections_per_query(2);
        let results = run(config, cluster.clone(), Arc::new(KindCounter::default()), entries())
            .await
            .unwrap();
        assert_eq!(results, vec![2, 5, 0, 3], "mode {:?}", mode);
    }
}

#[tokio::test]
async fn test_broken_shard_surfaces_through_event_bus_and_outcome() {
    logging::init_for_tests();
    let cluster = ShardCluster::new(&[("ds_0", 1), ("ds_1", 1)]).broken("ds_1");
    let bus = Arc::new(EventBus::new());
    let first = Arc::new(KindCounter::default());
    let second = Arc::new(KindCounter::default());
    bus.subscribe(first.clone());
    bus.subscribe(second.clone());

    let mut executor = BatchExecutor::from_config(
        &ExecutorConfig::default(),
        DatabaseType::MySql,
        SqlType::Dml,
        Arc::new(cluster),
        bus,
    )
    .unwrap();
    for id in [1, 2] {
        executor
            .add_batch(broadcast(id, &["ds_0", "ds_1"]))
            .await
            .unwrap();
    }

    let outcome = executor.execute_batch().await.unwrap();
    assert_eq!(outcome.results(), &[1, 1]);
    assert_eq!(outcome.failures().len(), 1);
    assert_eq!(outcome.failures()[0].data_source, "ds_1");
    assert_eq!(outcome.failures()[0].global_indices, vec![0, 1]);

    for sink in [&first, &second] {
        assert_eq!(sink.count(EventKind::ExecuteFailure), 2);
        assert_eq!(sink.count(EventKind::ExecuteSuccess), 2);
    }
}

#[tokio::test]
async fn test_config_file_drives_executor() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("executor.toml");
    std::fs::write(
        &path,
        r#"
connection_mode = "connection_strictly"
max_connections_per_query = 4
parallel_threshold = 0
raise_on_failure = true
"#,
    )
    .unwrap();

    let config = ExecutorConfig::from_file(&path).unwrap();
    assert_eq!(config.connection_mode(), ConnectionMode::ConnectionStrictly);

    let cluster = ShardCluster::new(&[("ds_0", 1)]).broken("ds_0");
    let err = run(
        config,
        cluster,
        Arc::new(KindCounter::default()),
        vec![broadcast(1, &["ds_0"])],
    )
    .await
    .unwrap_err();
    assert!(matches!(err, ShardexError::BatchFailed { failed_units: 1, .. }));
}

/// Engine that never gets a work item to report back
struct LostEngine;

#[async_trait]
impl ExecuteEngine<Vec<UnitReport>> for LostEngine {
    async fn execute_all(&self, items: Vec<WorkItem<Vec<UnitReport>>>) -> Vec<Result<Vec<UnitReport>>> {
        items
            .into_iter()
            .map(|_| Err(ShardexError::Execution("worker lost".into())))
            .collect()
    }
}

#[tokio::test]
async fn test_lost_work_item_counts_as_failure_of_its_units() {
    let cluster = ShardCluster::new(&[("ds_0", 7), ("ds_1", 7)]);
    let mut executor = BatchExecutor::new(
        DatabaseType::MySql,
        SqlType::Dml,
        Arc::new(MemoryStrictly::new(Arc::new(cluster))),
        Arc::new(LostEngine),
        Arc::new(KindCounter::default()),
    );
    executor
        .add_batch(broadcast(1, &["ds_0", "ds_1"]))
        .await
        .unwrap();

    let outcome = executor.execute_batch().await.unwrap();
    assert_eq!(outcome.results(), &[0]);
    assert_eq!(outcome.failures().len(), 2);
    assert!(
        outcome
            .failures()
            .iter()
            .all(|f| matches!(*f.error, ShardexError::Execution(_)))
    );
}
