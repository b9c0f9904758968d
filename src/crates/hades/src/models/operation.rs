//! Operation record model

use crate::models::snapshot::StateSnapshot;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Lifecycle state, derived from the record's fields
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationState {
    Tracked,
    Completed,
    RolledBack,
}

impl OperationState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Tracked => "tracked",
            Self::Completed => "completed",
            Self::RolledBack => "rolled_back",
        }
    }
}

impl std::fmt::Display for OperationState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One tracked command and its lifecycle
///
/// Stored in the operation log (`operations` table). `id`, `correlation_id`,
/// `operation_type`, `command` and `before_state` never change after insert.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Operation {
    /// Unique operation identifier (UUID string)
    pub id: String,

    /// External caller reference
    pub correlation_id: Option<String>,

    /// e.g. "file_write", "docker_stop", "sql_update"
    pub operation_type: String,

    /// Raw command text
    pub command: String,

    /// State captured at track time
    pub before_state: StateSnapshot,

    /// State captured at completion (file kind only)
    pub after_state: Option<StateSnapshot>,

    /// Advisory manual-reversal text; never executed
    pub rollback_hint: Option<String>,

    /// Success flag reported by the caller on completion
    pub success: Option<bool>,

    pub executed_at: DateTime<Utc>,

    pub completed_at: Option<DateTime<Utc>>,

    /// Monotonic: never returns to false
    pub rolled_back: bool,

    pub rolled_back_at: Option<DateTime<Utc>>,
}

impl Operation {
    /// Create a freshly tracked operation
    pub fn new(
        operation_type: impl Into<String>,
        command: impl Into<String>,
        correlation_id: Option<String>,
        before_state: StateSnapshot,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            correlation_id,
            operation_type: operation_type.into(),
            command: command.into(),
            before_state,
            after_state: None,
            rollback_hint: None,
            success: None,
            executed_at: Utc::now(),
            completed_at: None,
            rolled_back: false,
            rolled_back_at: None,
        }
    }

    pub fn state(&self) -> OperationState {
        if self.rolled_back {
            OperationState::RolledBack
        } else if self.completed_at.is_some() {
            OperationState::Completed
        } else {
            OperationState::Tracked
        }
    }

    pub fn summary(&self) -> OperationSummary {
        OperationSummary {
            id: self.id.clone(),
            operation_type: self.operation_type.clone(),
            command: self.command.clone(),
            executed_at: self.executed_at,
            state: self.state(),
            rolled_back: self.rolled_back,
        }
    }
}

/// Read-only projection used for listings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationSummary {
    pub id: String,
    pub operation_type: String,
    pub command: String,
    pub executed_at: DateTime<Utc>,
    pub state: OperationState,
    pub rolled_back: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_operation_is_tracked() {
        let op = Operation::new("file_write", "echo hi > /tmp/a", None, StateSnapshot::uncaptured("x"));
        assert_eq!(op.state(), OperationState::Tracked);
        assert!(!op.rolled_back);
        assert!(Uuid::parse_str(&op.id).is_ok());
    }

    #[test]
    fn test_state_derivation() {
        let mut op = Operation::new("docker_stop", "docker stop web", None, StateSnapshot::uncaptured("x"));
        op.completed_at = Some(Utc::now());
        assert_eq!(op.state(), OperationState::Completed);

        op.rolled_back = true;
        op.rolled_back_at = Some(Utc::now());
        assert_eq!(op.state(), OperationState::RolledBack);
        assert_eq!(op.summary().state, OperationState::RolledBack);
    }
}
