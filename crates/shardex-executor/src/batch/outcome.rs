//! Merged batch results

use std::sync::Arc;

use shardex_core::{Result, ShardexError};

use super::UnitReport;

/// An execute unit that failed, with the logical entries it owned
#[derive(Debug, Clone)]
pub struct UnitFailure {
    pub data_source: String,
    pub sql: String,
    /// Global logical indices that received a zero contribution
    pub global_indices: Vec<usize>,
    pub error: Arc<ShardexError>,
}

/// Result of a logical batch: one code per logical entry plus the failures
/// that were absorbed as zero contributions
#[derive(Debug, Clone, Default)]
pub struct BatchOutcome {
    results: Vec<i64>,
    failures: Vec<UnitFailure>,
}

impl BatchOutcome {
    pub fn new(results: Vec<i64>, failures: Vec<UnitFailure>) -> Self {
        Self { results, failures }
    }

    /// Merged result codes indexed by logical batch entry
    pub fn results(&self) -> &[i64] {
        &self.results
    }

    pub fn into_results(self) -> Vec<i64> {
        self.results
    }

    pub fn failures(&self) -> &[UnitFailure] {
        &self.failures
    }

    /// True when every unit succeeded
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }

    /// The aggregate error for the failed units, if any
    pub fn failure_error(&self) -> Option<ShardexError> {
        self.failures.first().map(|first| ShardexError::BatchFailed {
            failed_units: self.failures.len(),
            first_error: first.error.clone(),
        })
    }

    /// Merged codes, or the aggregate error if any unit failed
    pub fn into_result(self) -> Result<Vec<i64>> {
        match self.failure_error() {
            Some(error) => Err(error),
            None => Ok(self.results),
        }
    }
}

/// Sum every unit's result codes into the slot of the logical entry they
/// belong to. Failed units contribute nothing.
///
/// The result has `batch_count` slots, or one past the highest mapped index
/// when no batch count was established.
pub(crate) fn merge(batch_count: usize, reports: Vec<UnitReport>) -> BatchOutcome {
    let observed = reports
        .iter()
        .flat_map(|report| report.index_map.iter())
        .max()
        .map_or(0, |max| max + 1);
    debug_assert!(
        batch_count == 0 || batch_count >= observed,
        "batch count {} does not cover mapped index {}",
        batch_count,
        observed.saturating_sub(1)
    );

    let mut results = vec![0i64; batch_count.max(observed)];
    let mut failures = Vec::new();
    for report in reports {
        match report.result {
            Ok(codes) => {
                if codes.len() != report.index_map.len() {
                    tracing::warn!(
                        route = %report.key,
                        codes = codes.len(),
                        ranks = report.index_map.len(),
                        "driver returned a different number of result codes than parameter sets"
                    );
                }
                for (&global_index, code) in report.index_map.iter().zip(codes) {
                    results[global_index] += code;
                }
            }
            Err(error) => failures.push(UnitFailure {
                data_source: report.key.data_source,
                sql: report.key.sql,
                global_indices: report.index_map,
                error,
            }),
        }
    }

    BatchOutcome::new(results, failures)
}
