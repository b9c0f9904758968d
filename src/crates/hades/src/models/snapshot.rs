//! State snapshots, one variant per resource kind

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// One captured row: column name to value
pub type CapturedRow = BTreeMap<String, serde_json::Value>;

/// Captured state of a resource at a point in time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StateSnapshot {
    File(FileSnapshot),
    Container(ContainerSnapshot),
    Rows(RowSnapshot),
    /// Nothing could be captured; rollback will refuse
    Uncaptured { reason: String },
}

impl StateSnapshot {
    pub fn uncaptured(reason: impl Into<String>) -> Self {
        Self::Uncaptured {
            reason: reason.into(),
        }
    }

    pub fn is_captured(&self) -> bool {
        !matches!(self, Self::Uncaptured { .. })
    }
}

/// File state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileSnapshot {
    pub path: PathBuf,
    pub exists: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modified_at: Option<DateTime<Utc>>,
    /// SHA-256 of the content, lowercase hex
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_hash: Option<String>,
    /// Backup artifact; only set when the file existed at capture time
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backup_path: Option<PathBuf>,
    /// I/O error hit while capturing
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub captured_at: DateTime<Utc>,
}

impl FileSnapshot {
    /// Snapshot of a path that does not exist
    pub fn absent(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            exists: false,
            size: None,
            modified_at: None,
            content_hash: None,
            backup_path: None,
            error: None,
            captured_at: Utc::now(),
        }
    }
}

/// Container state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContainerSnapshot {
    /// Name or id the command referred to
    pub container: String,
    pub exists: bool,
    pub running: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub container_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub captured_at: DateTime<Utc>,
}

impl ContainerSnapshot {
    /// Snapshot of a container the runtime does not know
    pub fn absent(container: impl Into<String>, error: Option<String>) -> Self {
        Self {
            container: container.into(),
            exists: false,
            running: false,
            container_id: None,
            image: None,
            status: None,
            error,
            captured_at: Utc::now(),
        }
    }
}

/// Rows matched by a predicate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RowSnapshot {
    pub table: String,
    pub predicate: String,
    /// In the order the row store returned them
    pub rows: Vec<CapturedRow>,
    pub row_count: usize,
    pub captured_at: DateTime<Utc>,
}

impl RowSnapshot {
    pub fn new(table: impl Into<String>, predicate: impl Into<String>, rows: Vec<CapturedRow>) -> Self {
        Self {
            table: table.into(),
            predicate: predicate.into(),
            row_count: rows.len(),
            rows,
            captured_at: Utc::now(),
        }
    }
}
