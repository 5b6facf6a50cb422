//! Routed SQL units
//!
//! The router and rewriter live outside this workspace. What they hand over is
//! described here: which data source a statement goes to, the final SQL text,
//! and the parameter sets bound to it.

use serde::{Deserialize, Serialize};

use crate::{ParameterSet, Value};

/// Rewritten SQL together with the parameter sets bound to it
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SqlUnit {
    /// Final SQL text sent to the physical data source
    pub sql: String,
    /// Parameter sets in local-rank order
    pub parameter_sets: Vec<ParameterSet>,
}

impl SqlUnit {
    /// Create a SQL unit without any parameter sets
    pub fn new(sql: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            parameter_sets: Vec::new(),
        }
    }

    /// Append a parameter set
    pub fn with_parameters(mut self, parameters: ParameterSet) -> Self {
        self.parameter_sets.push(parameters);
        self
    }
}

/// One data source paired with one rewritten SQL statement
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RouteUnit {
    /// Data source identifier
    pub data_source: String,
    /// SQL and its bound parameter sets
    pub sql_unit: SqlUnit,
}

impl RouteUnit {
    /// Create a route unit
    pub fn new(data_source: impl Into<String>, sql_unit: SqlUnit) -> Self {
        Self {
            data_source: data_source.into(),
            sql_unit,
        }
    }

    /// The grouping key of this route
    pub fn key(&self) -> RouteKey {
        RouteKey::new(&self.data_source, &self.sql_unit.sql)
    }

    /// The SQL text
    pub fn sql(&self) -> &str {
        &self.sql_unit.sql
    }

    /// Parameter sets in local-rank order
    pub fn parameter_sets(&self) -> &[ParameterSet] {
        &self.sql_unit.parameter_sets
    }
}

/// Identity of a route: all entries with the same data source and SQL share
/// one execute unit
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RouteKey {
    pub data_source: String,
    pub sql: String,
}

impl RouteKey {
    pub fn new(data_source: impl Into<String>, sql: impl Into<String>) -> Self {
        Self {
            data_source: data_source.into(),
            sql: sql.into(),
        }
    }
}

impl std::fmt::Display for RouteKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}::{}", self.data_source, self.sql)
    }
}

/// One shard that a logical batch entry must be sent to, as decided by the
/// router
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteTarget {
    pub data_source: String,
    pub sql: String,
    pub parameters: ParameterSet,
}

impl RouteTarget {
    pub fn new(
        data_source: impl Into<String>,
        sql: impl Into<String>,
        parameters: impl IntoIterator<Item = Value>,
    ) -> Self {
        Self {
            data_source: data_source.into(),
            sql: sql.into(),
            parameters: parameters.into_iter().collect(),
        }
    }

    pub fn key(&self) -> RouteKey {
        RouteKey::new(&self.data_source, &self.sql)
    }
}
