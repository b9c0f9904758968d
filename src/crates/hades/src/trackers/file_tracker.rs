//! File tracker
//!
//! Captures a byte-for-byte backup of the target file into the snapshot
//! directory and restores it (or removes a file that did not exist) on
//! rollback. Backups are never garbage-collected.

use crate::classifier::Target;
use crate::models::{
    Compensation, FileSnapshot, ResourceKind, RollbackAction, RollbackOutcome, StateSnapshot,
};
use crate::trackers::Tracker;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::fs;
use tracing::{debug, info, warn};

/// Process-wide backup sequence; keeps names unique within one microsecond
static BACKUP_SEQUENCE: AtomicU64 = AtomicU64::new(0);

/// Tracker for `file_*` operations
#[derive(Debug, Clone)]
pub struct FileTracker {
    snapshot_dir: PathBuf,
}

impl FileTracker {
    pub fn new(snapshot_dir: impl Into<PathBuf>) -> Self {
        Self {
            snapshot_dir: snapshot_dir.into(),
        }
    }

    /// Create the snapshot directory if it is missing
    pub async fn ensure_snapshot_dir(&self) -> std::io::Result<()> {
        fs::create_dir_all(&self.snapshot_dir).await
    }

    /// Backup path for a file, e.g. `app.conf.20250101_120000_000001.3.bak`
    fn backup_path_for(&self, path: &Path) -> PathBuf {
        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "file".to_string());
        let stamp = Utc::now().format("%Y%m%d_%H%M%S_%6f");
        let sequence = BACKUP_SEQUENCE.fetch_add(1, Ordering::Relaxed);

        self.snapshot_dir
            .join(format!("{}.{}.{}.bak", file_name, stamp, sequence))
    }

    /// Errors only when it cannot be told whether the path exists
    async fn inspect(&self, path: &Path, with_backup: bool) -> std::io::Result<FileSnapshot> {
        let metadata = match fs::metadata(path).await {
            Ok(metadata) => metadata,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Ok(FileSnapshot::absent(path))
            }
            Err(e) => return Err(e),
        };

        let mut snapshot = FileSnapshot {
            path: path.to_path_buf(),
            exists: true,
            size: Some(metadata.len()),
            modified_at: metadata.modified().ok().map(DateTime::<Utc>::from),
            content_hash: None,
            backup_path: None,
            error: None,
            captured_at: Utc::now(),
        };

        if metadata.is_dir() {
            snapshot.error = Some("path is a directory; contents are not captured".to_string());
            return Ok(snapshot);
        }

        let content = match fs::read(path).await {
            Ok(content) => content,
            Err(e) => {
                snapshot.error = Some(e.to_string());
                return Ok(snapshot);
            }
        };
        snapshot.content_hash = Some(content_hash(&content));

        if with_backup {
            if let Err(e) = self.ensure_snapshot_dir().await {
                snapshot.error = Some(format!("Failed to create snapshot directory: {}", e));
                return Ok(snapshot);
            }
            let backup_path = self.backup_path_for(path);
            match fs::write(&backup_path, &content).await {
                Ok(()) => {
                    debug!(path = %path.display(), backup = %backup_path.display(), "File backed up");
                    snapshot.backup_path = Some(backup_path);
                }
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Failed to write backup");
                    snapshot.error = Some(format!("Failed to write backup: {}", e));
                }
            }
        }

        Ok(snapshot)
    }

    async fn restore(&self, before: &FileSnapshot) -> RollbackOutcome {
        let path = &before.path;

        if !before.exists {
            return match fs::remove_file(path).await {
                Ok(()) => {
                    info!(path = %path.display(), "Removed file that did not exist before");
                    RollbackOutcome::succeeded(
                        RollbackAction::Deleted,
                        format!("Removed {}", path.display()),
                    )
                }
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => RollbackOutcome::succeeded(
                    RollbackAction::AlreadyAbsent,
                    format!("{} is already absent", path.display()),
                ),
                Err(e) => RollbackOutcome::failed(
                    RollbackAction::Failed,
                    format!("Failed to remove {}: {}", path.display(), e),
                ),
            };
        }

        let Some(backup_path) = before.backup_path.as_ref() else {
            return RollbackOutcome::failed(
                RollbackAction::MissingBackup,
                format!("No backup was captured for {}", path.display()),
            );
        };

        if !fs::try_exists(backup_path).await.unwrap_or(false) {
            return RollbackOutcome::failed(
                RollbackAction::MissingBackup,
                format!("Backup {} no longer exists", backup_path.display()),
            );
        }

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            if let Err(e) = fs::create_dir_all(parent).await {
                return RollbackOutcome::failed(
                    RollbackAction::Failed,
                    format!("Failed to create {}: {}", parent.display(), e),
                );
            }
        }

        match fs::copy(backup_path, path).await {
            Ok(_) => {
                info!(path = %path.display(), backup = %backup_path.display(), "File restored");
                RollbackOutcome::succeeded(
                    RollbackAction::Restored,
                    format!("Restored {} from {}", path.display(), backup_path.display()),
                )
            }
            Err(e) => RollbackOutcome::failed(
                RollbackAction::Failed,
                format!("Failed to restore {}: {}", path.display(), e),
            ),
        }
    }
}

/// SHA-256 of some content, lowercase hex
pub fn content_hash(content: &[u8]) -> String {
    format!("{:x}", Sha256::digest(content))
}

#[async_trait]
impl Tracker for FileTracker {
    fn kind(&self) -> ResourceKind {
        ResourceKind::File
    }

    async fn capture_before(&self, target: &Target) -> StateSnapshot {
        match target {
            Target::File { path } => match self.inspect(Path::new(path), true).await {
                Ok(snapshot) => StateSnapshot::File(snapshot),
                Err(e) => {
                    warn!(path = %path, error = %e, "Failed to inspect file");
                    StateSnapshot::uncaptured(format!("Failed to inspect {}: {}", path, e))
                }
            },
            other => StateSnapshot::uncaptured(format!("file tracker cannot capture {:?}", other)),
        }
    }

    async fn capture_after(&self, target: &Target) -> Option<StateSnapshot> {
        match target {
            Target::File { path } => Some(match self.inspect(Path::new(path), false).await {
                Ok(snapshot) => StateSnapshot::File(snapshot),
                Err(e) => StateSnapshot::uncaptured(format!("Failed to inspect {}: {}", path, e)),
            }),
            _ => None,
        }
    }

    async fn execute_rollback(
        &self,
        compensation: Compensation,
        before: &StateSnapshot,
    ) -> RollbackOutcome {
        match (compensation, before) {
            (Compensation::RestoreFile, StateSnapshot::File(snapshot)) => {
                self.restore(snapshot).await
            }
            (Compensation::RestoreFile, _) => RollbackOutcome::failed(
                RollbackAction::MissingTarget,
                "No file snapshot was captured",
            ),
            (other, _) => RollbackOutcome::failed(
                RollbackAction::NoStrategy,
                format!("File tracker cannot run {:?}", other),
            ),
        }
    }
}
