//! Batch orchestration
//!
//! A logical batch is accumulated entry by entry with
//! [`BatchExecutor::add_batch`]. Each entry is routed to one or more
//! `(data source, sql)` routes; every route owns one [`BatchExecuteUnit`]
//! that records the entry's parameter set and its global logical index.
//!
//! [`BatchExecutor::execute_batch`] runs every unit through the execute
//! engine, then sums the per-unit result codes back into one array indexed by
//! logical entry. A unit that fails contributes zero and is reported in
//! [`BatchOutcome::failures`].

mod executor;
mod outcome;
mod unit;
mod work;


pub use executor::BatchExecutor;
pub use outcome::{BatchOutcome, UnitFailure};
pub use unit::BatchExecuteUnit;
pub use work::{ConnectionSlot, EventContext, UnitReport, execute_unit};

pub(crate) use outcome::merge;
