//! Operation log repository

use crate::db::Database;
use crate::error::{HadesError, Result};
use crate::models::{Operation, StateSnapshot};
use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::Row;
use std::sync::Arc;

const OPERATION_COLUMNS: &str = "id, correlation_id, operation_type, command, before_state, \
     after_state, rollback_hint, success, executed_at, completed_at, rolled_back, rolled_back_at";

/// Repository for the `operations` table
#[derive(Clone, Debug)]
pub struct OperationRepository {
    db: Arc<Database>,
}

impl OperationRepository {
    /// Create a new operation repository
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    pub fn database(&self) -> &Arc<Database> {
        &self.db
    }

    /// Insert a freshly tracked operation
    pub async fn save(&self, operation: &Operation) -> Result<()> {
        let before_state = serde_json::to_string(&operation.before_state)?;
        let after_state = operation
            .after_state
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;

        sqlx::query(
            "INSERT INTO operations (id, correlation_id, operation_type, command, before_state,
                                     after_state, rollback_hint, success, executed_at,
                                     completed_at, rolled_back, rolled_back_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&operation.id)
        .bind(&operation.correlation_id)
        .bind(&operation.operation_type)
        .bind(&operation.command)
        .bind(before_state)
        .bind(after_state)
        .bind(&operation.rollback_hint)
        .bind(operation.success)
        .bind(format_timestamp(&operation.executed_at))
        .bind(operation.completed_at.as_ref().map(format_timestamp))
        .bind(operation.rolled_back)
        .bind(operation.rolled_back_at.as_ref().map(format_timestamp))
        .execute(self.db.pool())
        .await
        .map_err(|e| HadesError::Database(format!("Failed to save operation: {}", e)))?;

        Ok(())
    }

    /// Load an operation by ID
    pub async fn find_by_id(&self, id: &str) -> Result<Option<Operation>> {
        let query = format!("SELECT {} FROM operations WHERE id = ?", OPERATION_COLUMNS);
        let row = sqlx::query(&query)
            .bind(id)
            .fetch_optional(self.db.pool())
            .await
            .map_err(|e| HadesError::Database(format!("Failed to load operation: {}", e)))?;

        row.map(|row| operation_from_row(&row)).transpose()
    }

    /// Most recent operations first, rolled back ones included
    pub async fn list_recent(&self, limit: u32) -> Result<Vec<Operation>> {
        let query = format!(
            "SELECT {} FROM operations ORDER BY executed_at DESC, rowid DESC LIMIT ?",
            OPERATION_COLUMNS
        );
        let rows = sqlx::query(&query)
            .bind(i64::from(limit))
            .fetch_all(self.db.pool())
            .await
            .map_err(|e| HadesError::Database(format!("Failed to list operations: {}", e)))?;

        rows.iter().map(operation_from_row).collect()
    }

    /// Most recent operations that have not been rolled back
    pub async fn list_recent_active(&self, limit: u32) -> Result<Vec<Operation>> {
        let query = format!(
            "SELECT {} FROM operations
             WHERE rolled_back = 0
             ORDER BY executed_at DESC, rowid DESC
             LIMIT ?",
            OPERATION_COLUMNS
        );
        let rows = sqlx::query(&query)
            .bind(i64::from(limit))
            .fetch_all(self.db.pool())
            .await
            .map_err(|e| {
                HadesError::Database(format!("Failed to list active operations: {}", e))
            })?;

        rows.iter().map(operation_from_row).collect()
    }

    /// Record completion data
    ///
    /// Completion is written once; returns false when the id is unknown or
    /// the operation was already completed.
    pub async fn record_completion(
        &self,
        id: &str,
        after_state: Option<&StateSnapshot>,
        rollback_hint: Option<&str>,
        success: bool,
    ) -> Result<bool> {
        let after_state = after_state.map(serde_json::to_string).transpose()?;

        let result = sqlx::query(
            "UPDATE operations
             SET after_state = ?, rollback_hint = ?, success = ?, completed_at = ?
             WHERE id = ? AND completed_at IS NULL",
        )
        .bind(after_state)
        .bind(rollback_hint)
        .bind(success)
        .bind(format_timestamp(&Utc::now()))
        .bind(id)
        .execute(self.db.pool())
        .await
        .map_err(|e| HadesError::Database(format!("Failed to record completion: {}", e)))?;

        Ok(result.rows_affected() > 0)
    }

    /// Mark an operation rolled back
    ///
    /// Only flips records that are not rolled back yet; returns false when
    /// another caller got there first (or the id is unknown).
    pub async fn mark_rolled_back(&self, id: &str) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE operations
             SET rolled_back = 1, rolled_back_at = ?
             WHERE id = ? AND rolled_back = 0",
        )
        .bind(format_timestamp(&Utc::now()))
        .bind(id)
        .execute(self.db.pool())
        .await
        .map_err(|e| HadesError::Database(format!("Failed to mark operation rolled back: {}", e)))?;

        Ok(result.rows_affected() == 1)
    }

    /// Count operations in the log
    pub async fn count(&self) -> Result<i64> {
        let row = sqlx::query("SELECT COUNT(*) AS count FROM operations")
            .fetch_one(self.db.pool())
            .await
            .map_err(|e| HadesError::Database(format!("Failed to count operations: {}", e)))?;

        Ok(row.get("count"))
    }
}

fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_timestamp(value: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|e| HadesError::Database(format!("Invalid timestamp '{}': {}", value, e)))
}

fn operation_from_row(row: &SqliteRow) -> Result<Operation> {
    let before_state: String = row.get("before_state");
    let after_state: Option<String> = row.get("after_state");
    let executed_at: String = row.get("executed_at");
    let completed_at: Option<String> = row.get("completed_at");
    let rolled_back_at: Option<String> = row.get("rolled_back_at");

    Ok(Operation {
        id: row.get("id"),
        correlation_id: row.get("correlation_id"),
        operation_type: row.get("operation_type"),
        command: row.get("command"),
        before_state: serde_json::from_str(&before_state)?,
        after_state: after_state.as_deref().map(serde_json::from_str).transpose()?,
        rollback_hint: row.get("rollback_hint"),
        success: row.get("success"),
        executed_at: parse_timestamp(&executed_at)?,
        completed_at: completed_at.as_deref().map(parse_timestamp).transpose()?,
        rolled_back: row.get("rolled_back"),
        rolled_back_at: rolled_back_at.as_deref().map(parse_timestamp).transpose()?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{FileSnapshot, OperationState};

    async fn repository() -> OperationRepository {
        let db = Database::in_memory().await.unwrap();
        db.run_migrations().await.unwrap();
        OperationRepository::new(Arc::new(db))
    }

    fn operation(op_type: &str, command: &str) -> Operation {
        Operation::new(
            op_type,
            command,
            Some("job-7".to_string()),
            StateSnapshot::File(FileSnapshot::absent("/tmp/out.txt")),
        )
    }

    #[tokio::test]
    async fn test_save_and_find() {
        let repo = repository().await;
        let op = operation("file_write", "echo hi > /tmp/out.txt");
        repo.save(&op).await.unwrap();

        let loaded = repo.find_by_id(&op.id).await.unwrap().unwrap();
        assert_eq!(loaded.id, op.id);
        assert_eq!(loaded.correlation_id.as_deref(), Some("job-7"));
        assert_eq!(loaded.before_state, op.before_state);
        assert_eq!(loaded.state(), OperationState::Tracked);
        assert_eq!(loaded.executed_at.timestamp_micros(), op.executed_at.timestamp_micros());
    }

    #[tokio::test]
    async fn test_find_missing_returns_none() {
        let repo = repository().await;
        assert!(repo.find_by_id("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_record_completion() {
        let repo = repository().await;
        let op = operation("file_write", "echo hi > /tmp/out.txt");
        repo.save(&op).await.unwrap();

        let after = StateSnapshot::File(FileSnapshot::absent("/tmp/out.txt"));
        let updated = repo
            .record_completion(&op.id, Some(&after), Some("Restore it"), true)
            .await
            .unwrap();
        assert!(updated);

        let loaded = repo.find_by_id(&op.id).await.unwrap().unwrap();
        assert_eq!(loaded.state(), OperationState::Completed);
        assert_eq!(loaded.success, Some(true));
        assert_eq!(loaded.rollback_hint.as_deref(), Some("Restore it"));
        assert_eq!(loaded.after_state, Some(after));

        assert!(!repo.record_completion("missing", None, None, false).await.unwrap());
    }

    #[tokio::test]
    async fn test_record_completion_is_written_once() {
        let repo = repository().await;
        let op = operation("file_write", "echo hi > /tmp/out.txt");
        repo.save(&op).await.unwrap();

        let first = StateSnapshot::File(FileSnapshot::absent("/tmp/out.txt"));
        assert!(repo
            .record_completion(&op.id, Some(&first), Some("first"), true)
            .await
            .unwrap());
        let completed_at = repo.find_by_id(&op.id).await.unwrap().unwrap().completed_at;

        let second = StateSnapshot::uncaptured("later");
        assert!(!repo
            .record_completion(&op.id, Some(&second), Some("second"), false)
            .await
            .unwrap());

        let loaded = repo.find_by_id(&op.id).await.unwrap().unwrap();
        assert_eq!(loaded.after_state, Some(first));
        assert_eq!(loaded.success, Some(true));
        assert_eq!(loaded.rollback_hint.as_deref(), Some("first"));
        assert_eq!(loaded.completed_at, completed_at);
    }

    #[tokio::test]
    async fn test_mark_rolled_back_is_conditional() {
        let repo = repository().await;
        let op = operation("docker_stop", "docker stop web");
        repo.save(&op).await.unwrap();

        assert!(repo.mark_rolled_back(&op.id).await.unwrap());
        assert!(!repo.mark_rolled_back(&op.id).await.unwrap());

        let loaded = repo.find_by_id(&op.id).await.unwrap().unwrap();
        assert!(loaded.rolled_back);
        assert!(loaded.rolled_back_at.is_some());
    }

    #[tokio::test]
    async fn test_list_recent_orders_newest_first() {
        let repo = repository().await;
        let first = operation("file_write", "echo 1 > /tmp/a");
        let second = operation("file_write", "echo 2 > /tmp/b");
        let third = operation("file_write", "echo 3 > /tmp/c");
        for op in [&first, &second, &third] {
            repo.save(op).await.unwrap();
        }
        repo.mark_rolled_back(&third.id).await.unwrap();

        let recent: Vec<String> = repo
            .list_recent(10)
            .await
            .unwrap()
            .into_iter()
            .map(|op| op.id)
            .collect();
        assert_eq!(recent, vec![third.id.clone(), second.id.clone(), first.id.clone()]);

        let active: Vec<String> = repo
            .list_recent_active(1)
            .await
            .unwrap()
            .into_iter()
            .map(|op| op.id)
            .collect();
        assert_eq!(active, vec![second.id.clone()]);
        assert_eq!(repo.count().await.unwrap(), 3);
    }
}
