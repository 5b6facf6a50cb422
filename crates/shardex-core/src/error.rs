//! Error types for Shardex

use std::sync::Arc;

use thiserror::Error;

/// Core error type for Shardex operations
#[derive(Error, Debug)]
pub enum ShardexError {
    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Statement error: {0}")]
    Statement(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    /// A work item could not run to completion (task panic or join failure)
    #[error("Execution error: {0}")]
    Execution(String),

    /// One or more execute units failed while the rest of the batch completed
    #[error("Batch failed on {failed_units} execute unit(s), first error: {first_error}")]
    BatchFailed {
        failed_units: usize,
        first_error: Arc<ShardexError>,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Config parse error: {0}")]
    ConfigParse(#[from] toml::de::Error),
}

impl ShardexError {
    /// Whether the error originated on the physical connection rather than in
    /// the statement itself
    pub fn is_connection_error(&self) -> bool {
        matches!(self, ShardexError::Connection(_) | ShardexError::Io(_))
    }
}

/// Result type alias for Shardex operations
pub type Result<T> = std::result::Result<T, ShardexError>;
