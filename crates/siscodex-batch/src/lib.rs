//! The batch workflow behind planting and archiving term groups.
//!
//! [`BatchOrchestrator`] owns the current group snapshot, a [`Mode`] state
//! machine, and the checkbox [`Selection`]. Batches fan out one remote call
//! per selected group, wait for every call to settle, and reconcile the
//! outcome into counts plus a per-group error map.

pub mod error;
pub mod mode;
pub mod orchestrator;
pub mod selection;

pub use error::{Result, WorkflowError};
pub use mode::Mode;
pub use orchestrator::{
  BatchConfig, BatchCounts, BatchOrchestrator, BatchReport, WorkflowSnapshot,
};
pub use selection::Selection;

#[cfg(test)]
mod tests;
