//! Executor configuration

use std::path::Path;

use serde::{Deserialize, Serialize};
use shardex_core::{Result, ShardexError};

/// How physical statements are held while a logical batch accumulates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionMode {
    /// One prepared statement per route, kept open for the whole batch
    #[default]
    MemoryStrictly,
    /// Statements are prepared at flush time on a bounded number of
    /// connections per data source
    ConnectionStrictly,
}

/// Configuration for a batch executor
///
/// Controls the connection mode, the inline/concurrent switch of the execute
/// engine, and how unit failures are reported.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutorConfig {
    /// Statement lifecycle variant
    connection_mode: ConnectionMode,
    /// Upper bound of connections opened per data source (connection-strictly)
    max_connections_per_query: usize,
    /// Work-item count at or below which the engine runs everything inline
    parallel_threshold: usize,
    /// Maximum number of work items executing at the same time
    max_parallelism: usize,
    /// Return an aggregated error instead of a partial-success outcome
    raise_on_failure: bool,
}

impl ExecutorConfig {
    pub fn new(connection_mode: ConnectionMode) -> Self {
        Self {
            connection_mode,
            ..Self::default()
        }
    }

    /// Parse a TOML document and validate it
    pub fn from_toml_str(source: &str) -> Result<Self> {
        let config: Self = toml::from_str(source)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a TOML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path)?;
        tracing::debug!(path = %path.display(), "loading executor config");
        Self::from_toml_str(&source)
    }

    /// Reject values the engine cannot work with
    pub fn validate(&self) -> Result<()> {
        if self.max_connections_per_query == 0 {
            return Err(ShardexError::Configuration(
                "max_connections_per_query must be greater than 0".into(),
            ));
        }
        if self.max_parallelism == 0 {
            return Err(ShardexError::Configuration(
                "max_parallelism must be greater than 0".into(),
            ));
        }
        Ok(())
    }

    pub fn with_connection_mode(mut self, mode: ConnectionMode) -> Self {
        self.connection_mode = mode;
        self
    }

    pub fn with_max_connections_per_query(mut self, max: usize) -> Self {
        self.max_connections_per_query = max;
        self
    }

    pub fn with_parallel_threshold(mut self, threshold: usize) -> Self {
        self.parallel_threshold = threshold;
        self
    }

    pub fn with_max_parallelism(mut self, max: usize) -> Self {
        self.max_parallelism = max;
        self
    }

    pub fn with_raise_on_failure(mut self, raise: bool) -> Self {
        self.raise_on_failure = raise;
        self
    }

    pub fn connection_mode(&self) -> ConnectionMode {
        self.connection_mode
    }

    pub fn max_connections_per_query(&self) -> usize {
        self.max_connections_per_query
    }

    pub fn parallel_threshold(&self) -> usize {
        self.parallel_threshold
    }

    pub fn max_parallelism(&self) -> usize {
        self.max_parallelism
    }

    pub fn raise_on_failure(&self) -> bool {
        self.raise_on_failure
    }
}

impl Default for ExecutorConfig {
    /// Defaults:
    /// - connection_mode: memory strictly
    /// - max_connections_per_query: 1
    /// - parallel_threshold: 1 (a single-shard batch never leaves the caller's task)
    /// - max_parallelism: available CPU parallelism
    /// - raise_on_failure: false
    fn default() -> Self {
        Self {
            connection_mode: ConnectionMode::MemoryStrictly,
            max_connections_per_query: 1,
            parallel_threshold: 1,
            max_parallelism: std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(4),
            raise_on_failure: false,
        }
    }
}
