//! # Hades - Compensating-Action Agent
//!
//! An automation actor registers every command with Hades *before* running
//! it. Hades classifies the command, captures the state of the resource it is
//! about to touch, and can later reverse the effect on request.
//!
//! ## Resource kinds
//!
//! - **Files** (`file_*`): byte-for-byte backups in the snapshot directory
//! - **Containers** (`docker_*`, `container_*`): running state via the runtime CLI
//! - **Database rows** (`sql_update`, `sql_delete`): the rows a statement matches
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use hades::{HadesConfig, RollbackEngine};
//!
//! # async fn example() -> hades::Result<()> {
//! let engine = RollbackEngine::from_config(&HadesConfig::default()).await?;
//!
//! let id = engine.track("echo port=8080 > app.conf", "file_write", None).await?;
//! // ... the actor runs the command ...
//! engine.complete(&id, true).await?;
//!
//! let outcome = engine.rollback(&id).await;
//! assert!(outcome.success);
//! # Ok(())
//! # }
//! ```
//!
//! Rollback failures are values ([`RollbackOutcome`]), never errors: a failed
//! rollback leaves the operation untouched so it can be retried.

pub mod api;
pub mod classifier;
pub mod cli;
pub mod config;
pub mod db;
pub mod engine;
pub mod hints;
pub mod logging;
pub mod models;
pub mod repositories;
pub mod trackers;

mod error;

pub use classifier::{classify, Classification, Target};
pub use config::HadesConfig;
pub use db::Database;
pub use engine::RollbackEngine;
pub use models::{
    Compensation, Operation, OperationState, OperationSummary, ResourceKind, RollbackAction,
    RollbackOutcome, RollbackReport, StateSnapshot,
};
pub use repositories::OperationRepository;
pub use trackers::{Tracker, TrackerRegistry};

pub use error::{HadesError, Result};
