//! Reconciliation layer
//!
//! Optimistic local mutations, their remote confirmation and rollback.

mod activity;
mod bulk;
mod engine;
mod error;
mod gate;
mod lessons;
mod moves;

#[cfg(test)]
mod tests;

pub use activity::{ActivityClass, ActivitySnapshot};
pub use bulk::BatchResult;
pub use engine::{EngineOptions, ReconcileEngine};
pub use error::{EngineError, EngineResult, Operation};
pub use moves::{reorder_ids, MoveIntent, MoveOutcome, MoveRequest, PendingMove};
