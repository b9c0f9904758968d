//! Resource trackers
//!
//! One tracker per [`ResourceKind`]. A tracker captures state before and after
//! a command runs and knows how to compensate for it. Trackers never return
//! errors: capture problems are recorded inside the snapshot and rollback
//! problems come back as a failed [`RollbackOutcome`].

pub mod container_tracker;
pub mod file_tracker;
pub mod registry;
pub mod row_tracker;

pub use container_tracker::{ContainerRuntime, ContainerState, ContainerTracker, DockerCli};
pub use file_tracker::FileTracker;
pub use registry::TrackerRegistry;
pub use row_tracker::RowTracker;

use crate::classifier::Target;
use crate::models::{Compensation, ResourceKind, RollbackOutcome, StateSnapshot};
use async_trait::async_trait;

/// Capture and compensation contract for one resource kind
#[async_trait]
pub trait Tracker: Send + Sync {
    /// Kind of resource this tracker handles
    fn kind(&self) -> ResourceKind;

    /// Capture state before the command runs
    async fn capture_before(&self, target: &Target) -> StateSnapshot;

    /// Capture state after the command ran
    ///
    /// Only kinds whose after-state is useful return a snapshot.
    async fn capture_after(&self, _target: &Target) -> Option<StateSnapshot> {
        None
    }

    /// Run a compensating action against the before-snapshot
    async fn execute_rollback(
        &self,
        compensation: Compensation,
        before: &StateSnapshot,
    ) -> RollbackOutcome;
}
