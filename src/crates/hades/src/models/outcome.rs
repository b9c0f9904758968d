//! Rollback outcomes
//!
//! Every rollback attempt ends in a [`RollbackOutcome`]. Failures are data,
//! never errors, so one bad record cannot abort a batch.

use serde::{Deserialize, Serialize};

/// What a rollback attempt did (or why it did nothing)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RollbackAction {
    /// File content or row values written back
    Restored,
    /// File that did not exist before was removed
    Deleted,
    /// File that did not exist before is still absent
    AlreadyAbsent,
    /// Deleted rows inserted again
    Reinserted,
    StartedBackUp,
    StoppedBackDown,
    NoOpAlreadyCorrectState,
    MissingBackup,
    NoRowsToRestore,
    /// No record with that id
    NotFound,
    AlreadyRolledBack,
    /// Operation type has no compensating action
    NoStrategy,
    /// Nothing was captured at track time
    MissingTarget,
    /// Runtime, filesystem or row store call failed
    Failed,
}

impl RollbackAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Restored => "restored",
            Self::Deleted => "deleted",
            Self::AlreadyAbsent => "already_absent",
            Self::Reinserted => "reinserted",
            Self::StartedBackUp => "started_back_up",
            Self::StoppedBackDown => "stopped_back_down",
            Self::NoOpAlreadyCorrectState => "no_op_already_correct_state",
            Self::MissingBackup => "missing_backup",
            Self::NoRowsToRestore => "no_rows_to_restore",
            Self::NotFound => "not_found",
            Self::AlreadyRolledBack => "already_rolled_back",
            Self::NoStrategy => "no_strategy",
            Self::MissingTarget => "missing_target",
            Self::Failed => "failed",
        }
    }
}

impl std::fmt::Display for RollbackAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Result of one rollback attempt
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RollbackOutcome {
    pub success: bool,
    pub action: RollbackAction,
    pub detail: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rows_restored: Option<u64>,
}

impl RollbackOutcome {
    pub fn succeeded(action: RollbackAction, detail: impl Into<String>) -> Self {
        Self {
            success: true,
            action,
            detail: detail.into(),
            rows_restored: None,
        }
    }

    pub fn failed(action: RollbackAction, detail: impl Into<String>) -> Self {
        Self {
            success: false,
            action,
            detail: detail.into(),
            rows_restored: None,
        }
    }

    pub fn with_rows_restored(mut self, rows: u64) -> Self {
        self.rows_restored = Some(rows);
        self
    }
}

/// Outcome of one record in a batch rollback
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RollbackReport {
    pub operation_id: String,
    #[serde(flatten)]
    pub outcome: RollbackOutcome,
}
