//! Domain models for Hades
//!
//! Operation records, per-kind state snapshots, resource kinds and rollback outcomes.

pub mod operation;
pub mod outcome;
pub mod resource;
pub mod snapshot;

pub use operation::{Operation, OperationState, OperationSummary};
pub use outcome::{RollbackAction, RollbackOutcome, RollbackReport};
pub use resource::{Compensation, ResourceKind};
pub use snapshot::{CapturedRow, ContainerSnapshot, FileSnapshot, RowSnapshot, StateSnapshot};
