//! Resource kinds and the compensation each operation type maps to

use serde::{Deserialize, Serialize};

/// Kind of resource an operation touches
///
/// Determines which tracker and snapshot shape applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    File,
    Container,
    DatabaseRow,
}

impl ResourceKind {
    /// Every kind; the tracker registry must cover all of them
    pub const ALL: [ResourceKind; 3] = [Self::File, Self::Container, Self::DatabaseRow];

    /// Resolve the kind from the operation type prefix
    pub fn from_operation_type(operation_type: &str) -> Option<Self> {
        if operation_type.starts_with("file_") {
            Some(Self::File)
        } else if operation_type.starts_with("docker_") || operation_type.starts_with("container_") {
            Some(Self::Container)
        } else if operation_type.starts_with("sql_") {
            Some(Self::DatabaseRow)
        } else {
            None
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::File => "file",
            Self::Container => "container",
            Self::DatabaseRow => "database_row",
        }
    }
}

impl std::fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Compensating action selected by operation type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Compensation {
    /// Put a file back the way it was (any `file_*` type)
    RestoreFile,
    /// Start a container that a stop took down
    RestartStopped,
    /// Stop a container that a start brought up
    StopStarted,
    /// Write captured column values back after an UPDATE
    RestoreUpdatedRows,
    /// Re-insert rows removed by a DELETE
    ReinsertDeletedRows,
}

impl Compensation {
    /// Compensation for an operation type, or `None` when no strategy exists
    pub fn for_operation_type(operation_type: &str) -> Option<Self> {
        match ResourceKind::from_operation_type(operation_type)? {
            ResourceKind::File => Some(Self::RestoreFile),
            ResourceKind::Container => match container_verb(operation_type) {
                "stop" => Some(Self::RestartStopped),
                "start" => Some(Self::StopStarted),
                _ => None,
            },
            ResourceKind::DatabaseRow => match operation_type {
                "sql_update" => Some(Self::RestoreUpdatedRows),
                "sql_delete" => Some(Self::ReinsertDeletedRows),
                _ => None,
            },
        }
    }

    /// Resource kind whose tracker runs this compensation
    pub fn kind(&self) -> ResourceKind {
        match self {
            Self::RestoreFile => ResourceKind::File,
            Self::RestartStopped | Self::StopStarted => ResourceKind::Container,
            Self::RestoreUpdatedRows | Self::ReinsertDeletedRows => ResourceKind::DatabaseRow,
        }
    }
}

fn container_verb(operation_type: &str) -> &str {
    operation_type
        .strip_prefix("docker_")
        .or_else(|| operation_type.strip_prefix("container_"))
        .unwrap_or("")
}
