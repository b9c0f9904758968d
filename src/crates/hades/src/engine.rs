//! Rollback engine
//!
//! Drives each operation through its lifecycle:
//!
//! ```text
//! track ──> Tracked ──complete──> Completed
//!              │                      │
//!              └──────rollback────────┴──> RolledBack (terminal)
//! ```
//!
//! A rollback that fails leaves the record untouched so it can be retried.
//! Rollbacks of the same id are serialized by a per-id async mutex, and the
//! terminal transition itself is a conditional update in the operation log.

use crate::classifier::{classify, Classification, Target};
use crate::config::HadesConfig;
use crate::db::Database;
use crate::error::{HadesError, Result};
use crate::hints::HintRules;
use crate::models::{
    Compensation, Operation, OperationSummary, RollbackAction, RollbackOutcome, RollbackReport,
    StateSnapshot,
};
use crate::repositories::OperationRepository;
use crate::trackers::{
    ContainerTracker, DockerCli, FileTracker, RowTracker, Tracker, TrackerRegistry,
};
use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// Operation lifecycle engine
pub struct RollbackEngine {
    repository: OperationRepository,
    registry: TrackerRegistry,
    hints: HintRules,
    locks: DashMap<String, Arc<Mutex<()>>>,
}

impl RollbackEngine {
    /// Build an engine; fails if any resource kind lacks a tracker
    pub fn new(
        repository: OperationRepository,
        registry: TrackerRegistry,
        hints: HintRules,
    ) -> Result<Self> {
        registry.validate()?;

        Ok(Self {
            repository,
            registry,
            hints,
            locks: DashMap::new(),
        })
    }

    /// Connect both stores, migrate the operation log and wire the default trackers
    pub async fn from_config(config: &HadesConfig) -> Result<Self> {
        let log = Arc::new(
            Database::initialize(&config.database.url, config.database.max_connections).await?,
        );
        let row_store = Arc::new(
            Database::connect(&config.row_store.url, config.row_store.max_connections).await?,
        );

        let file_tracker = FileTracker::new(&config.snapshots.dir);
        file_tracker.ensure_snapshot_dir().await.map_err(|e| {
            HadesError::Config(format!(
                "Failed to create snapshot directory {}: {}",
                config.snapshots.dir.display(),
                e
            ))
        })?;

        let registry = TrackerRegistry::new()
            .register(Arc::new(file_tracker))
            .register(Arc::new(ContainerTracker::new(Arc::new(DockerCli::from_config(
                &config.trackers.container,
            )))))
            .register(Arc::new(RowTracker::new(row_store)));

        Self::new(
            OperationRepository::new(log),
            registry,
            HintRules::from_config(&config.rollback),
        )
    }

    pub fn repository(&self) -> &OperationRepository {
        &self.repository
    }

    /// Check the operation log is reachable
    pub async fn health_check(&self) -> Result<()> {
        self.repository.database().health_check().await
    }

    /// Register a command before it runs; returns the new operation id
    pub async fn track(
        &self,
        command: &str,
        operation_type: &str,
        correlation_id: Option<String>,
    ) -> Result<String> {
        if operation_type.trim().is_empty() {
            return Err(HadesError::InvalidInput("operation_type must not be empty".to_string()));
        }
        if command.trim().is_empty() {
            return Err(HadesError::InvalidInput("command must not be empty".to_string()));
        }

        let classification = classify(operation_type, command);
        let before_state = self.capture_before(&classification).await;

        let operation = Operation::new(operation_type, command, correlation_id, before_state);
        self.repository.save(&operation).await?;

        info!(
            operation_id = %operation.id,
            operation_type = %operation.operation_type,
            captured = operation.before_state.is_captured(),
            "Operation tracked"
        );
        Ok(operation.id)
    }

    /// Record that the actor finished running a tracked command
    ///
    /// An unknown id, or a second completion of the same operation, is
    /// logged and ignored.
    pub async fn complete(&self, operation_id: &str, success: bool) -> Result<()> {
        let Some(operation) = self.repository.find_by_id(operation_id).await? else {
            warn!(operation_id = %operation_id, "Completion for unknown operation ignored");
            return Ok(());
        };
        if operation.completed_at.is_some() {
            warn!(operation_id = %operation_id, "Operation already completed; completion ignored");
            return Ok(());
        }

        let classification = classify(&operation.operation_type, &operation.command);
        let after_state = self.capture_after(&classification).await;
        let hint = self
            .hints
            .render(&operation.operation_type, &classification, &operation.command);

        let recorded = self
            .repository
            .record_completion(operation_id, after_state.as_ref(), Some(&hint), success)
            .await?;
        if !recorded {
            warn!(operation_id = %operation_id, "Operation completed concurrently; completion ignored");
            return Ok(());
        }

        info!(operation_id = %operation_id, success, "Operation completed");
        Ok(())
    }

    /// Reverse one operation
    ///
    /// Never errors: every failure, including persistence failures, comes back
    /// as an unsuccessful outcome.
    pub async fn rollback(&self, operation_id: &str) -> RollbackOutcome {
        let lock = self
            .locks
            .entry(operation_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();

        let outcome = {
            let _guard = lock.lock().await;
            self.rollback_locked(operation_id).await
        };

        // Drop the lock entry unless another rollback of this id is waiting on it
        self.locks
            .remove_if(operation_id, |_, entry| Arc::strong_count(entry) <= 2);

        if outcome.success {
            info!(operation_id = %operation_id, action = %outcome.action, "Rollback succeeded");
        } else {
            warn!(
                operation_id = %operation_id,
                action = %outcome.action,
                detail = %outcome.detail,
                "Rollback did not succeed"
            );
        }
        outcome
    }

    async fn rollback_locked(&self, operation_id: &str) -> RollbackOutcome {
        let operation = match self.repository.find_by_id(operation_id).await {
            Ok(Some(operation)) => operation,
            Ok(None) => {
                return RollbackOutcome::failed(
                    RollbackAction::NotFound,
                    format!("Operation {} not found", operation_id),
                )
            }
            Err(e) => {
                return RollbackOutcome::failed(
                    RollbackAction::Failed,
                    format!("Failed to load operation: {}", e),
                )
            }
        };

        if operation.rolled_back {
            return RollbackOutcome::failed(
                RollbackAction::AlreadyRolledBack,
                format!("Operation {} was already rolled back", operation_id),
            );
        }

        let Some(compensation) = Compensation::for_operation_type(&operation.operation_type) else {
            return RollbackOutcome::failed(
                RollbackAction::NoStrategy,
                format!("No rollback strategy for '{}'", operation.operation_type),
            );
        };

        if let StateSnapshot::Uncaptured { reason } = &operation.before_state {
            return RollbackOutcome::failed(
                RollbackAction::MissingTarget,
                format!("Nothing was captured before the operation: {}", reason),
            );
        }

        let Some(tracker) = self.registry.get(compensation.kind()) else {
            return RollbackOutcome::failed(
                RollbackAction::NoStrategy,
                format!("No tracker for {}", compensation.kind()),
            );
        };

        debug!(operation_id = %operation_id, ?compensation, "Dispatching compensation");
        let outcome = tracker
            .execute_rollback(compensation, &operation.before_state)
            .await;
        if !outcome.success {
            return outcome;
        }

        match self.repository.mark_rolled_back(operation_id).await {
            Ok(true) => outcome,
            Ok(false) => RollbackOutcome::failed(
                RollbackAction::AlreadyRolledBack,
                format!("Operation {} was already rolled back", operation_id),
            ),
            Err(e) => RollbackOutcome::failed(
                RollbackAction::Failed,
                format!(
                    "Compensation ran ({}) but the record could not be marked: {}",
                    outcome.action, e
                ),
            ),
        }
    }

    /// Reverse the `count` most recent operations not yet rolled back, newest first
    ///
    /// Each record is attempted independently; one failure does not stop the rest.
    pub async fn rollback_last(&self, count: u32) -> Result<Vec<RollbackReport>> {
        let operations = self.repository.list_recent_active(count).await?;

        let mut reports = Vec::with_capacity(operations.len());
        for operation in operations {
            let outcome = self.rollback(&operation.id).await;
            reports.push(RollbackReport {
                operation_id: operation.id,
                outcome,
            });
        }

        let succeeded = reports.iter().filter(|r| r.outcome.success).count();
        info!(requested = count, attempted = reports.len(), succeeded, "Batch rollback finished");
        Ok(reports)
    }

    /// Most recent operations first, rolled back ones included
    pub async fn list_recent(&self, limit: u32) -> Result<Vec<OperationSummary>> {
        let operations = self.repository.list_recent(limit).await?;
        Ok(operations.iter().map(Operation::summary).collect())
    }

    pub async fn get(&self, operation_id: &str) -> Result<Option<Operation>> {
        self.repository.find_by_id(operation_id).await
    }

    async fn capture_before(&self, classification: &Classification) -> StateSnapshot {
        let Some(kind) = classification.kind else {
            return StateSnapshot::uncaptured("operation type has no resource kind");
        };
        if let Target::Unknown { reason } = &classification.target {
            return StateSnapshot::uncaptured(reason.clone());
        }

        match self.registry.get(kind) {
            Some(tracker) => tracker.capture_before(&classification.target).await,
            None => StateSnapshot::uncaptured(format!("no tracker for {}", kind)),
        }
    }

    async fn capture_after(&self, classification: &Classification) -> Option<StateSnapshot> {
        let kind = classification.kind?;
        if !classification.target.is_known() {
            return None;
        }
        let tracker: Arc<dyn Tracker> = self.registry.get(kind)?;
        tracker.capture_after(&classification.target).await
    }
}

impl std::fmt::Debug for RollbackEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RollbackEngine")
            .field("registry", &self.registry)
            .field("in_flight", &self.locks.len())
            .finish()
    }
}
