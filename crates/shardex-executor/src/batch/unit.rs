//! Batch execute unit

use shardex_core::{BatchStatement, ParameterSet, Result, RouteKey, RouteUnit};

/// One physical statement together with the logical batch entries routed to it
///
/// `index_map[rank]` is the global logical index of the parameter set at
/// local `rank`. Both grow together, one entry per recorded batch entry.
pub struct BatchExecuteUnit {
    route: RouteUnit,
    statement: Option<Box<dyn BatchStatement>>,
    index_map: Vec<usize>,
}

impl BatchExecuteUnit {
    /// Create a unit around a statement that already has the route's
    /// parameter sets bound
    pub fn new(route: RouteUnit, statement: Box<dyn BatchStatement>) -> Self {
        Self {
            route,
            statement: Some(statement),
            index_map: Vec::new(),
        }
    }

    /// Create a unit whose statement is prepared when the batch is flushed
    pub fn deferred(route: RouteUnit) -> Self {
        Self {
            route,
            statement: None,
            index_map: Vec::new(),
        }
    }

    /// Record the global logical index of the next local rank.
    ///
    /// Ordering is not validated; callers append in `add_batch` order.
    pub fn record_batch_entry(&mut self, global_index: usize) {
        self.index_map.push(global_index);
    }

    pub fn route(&self) -> &RouteUnit {
        &self.route
    }

    pub fn key(&self) -> RouteKey {
        self.route.key()
    }

    pub fn data_source(&self) -> &str {
        &self.route.data_source
    }

    pub fn sql(&self) -> &str {
        self.route.sql()
    }

    /// Parameter sets in local-rank order
    pub fn parameter_sets(&self) -> &[ParameterSet] {
        self.route.parameter_sets()
    }

    /// Local rank to global logical index
    pub fn index_map(&self) -> &[usize] {
        &self.index_map
    }

    /// Number of local ranks
    pub fn len(&self) -> usize {
        self.index_map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index_map.is_empty()
    }

    /// Whether a physical statement is already held by this unit
    pub fn has_statement(&self) -> bool {
        self.statement.is_some()
    }

    /// Append a parameter set, binding it to the held statement if there is one
    pub(crate) fn push_parameter_set(&mut self, params: ParameterSet) -> Result<()> {
        if let Some(statement) = self.statement.as_mut() {
            statement.add_parameter_set(&params)?;
        }
        self.route.sql_unit.parameter_sets.push(params);
        Ok(())
    }

    /// Drop the newest parameter set, which must not have been recorded yet,
    /// and rebind the remaining sets on the held statement
    pub(crate) fn unbind_last(&mut self) -> Result<()> {
        self.route.sql_unit.parameter_sets.pop();
        if let Some(statement) = self.statement.as_mut() {
            statement.clear_batch()?;
            for params in &self.route.sql_unit.parameter_sets {
                statement.add_parameter_set(params)?;
            }
        }
        Ok(())
    }

    pub(crate) fn take_statement(&mut self) -> Option<Box<dyn BatchStatement>> {
        self.statement.take()
    }

    /// Drop pending parameter sets on the held statement
    pub(crate) fn clear(&mut self) -> Result<()> {
        if let Some(statement) = self.statement.as_mut() {
            statement.clear_batch()?;
        }
        self.route.sql_unit.parameter_sets.clear();
        self.index_map.clear();
        Ok(())
    }

    /// Both sequences describe the same local ranks
    pub(crate) fn is_consistent(&self) -> bool {
        self.index_map.len() == self.route.parameter_sets().len()
    }
}

impl std::fmt::Debug for BatchExecuteUnit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BatchExecuteUnit")
            .field("route", &self.route)
            .field("statement", &self.statement.is_some())
            .field("index_map", &self.index_map)
            .finish()
    }
}
