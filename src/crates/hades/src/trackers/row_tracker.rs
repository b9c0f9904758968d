//! Database row tracker
//!
//! Captures the rows an `UPDATE` or `DELETE` is about to touch and writes them
//! back on rollback. The WHERE predicate is interpolated into the capture
//! query verbatim, exactly as the caller wrote it, so it must come from a
//! trusted actor. Table and column names are checked as plain identifiers and
//! every value is bound as a parameter.

use crate::classifier::{first_statement, Target};
use crate::db::Database;
use crate::models::{
    CapturedRow, Compensation, ResourceKind, RollbackAction, RollbackOutcome, RowSnapshot,
    StateSnapshot,
};
use crate::trackers::Tracker;
use async_trait::async_trait;
use regex::Regex;
use serde_json::Value as JsonValue;
use sqlx::query::Query;
use sqlx::sqlite::{Sqlite, SqliteArguments, SqliteRow};
use sqlx::{Column, Row, TypeInfo, ValueRef};
use std::sync::{Arc, LazyLock};
use tracing::{debug, info, warn};

static IDENTIFIER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("valid identifier regex"));

/// Column used to address captured rows when restoring updates
const KEY_COLUMN: &str = "id";

pub fn is_identifier(name: &str) -> bool {
    IDENTIFIER_RE.is_match(name)
}

/// Tracker for `sql_*` operations against the row store
#[derive(Clone, Debug)]
pub struct RowTracker {
    store: Arc<Database>,
}

impl RowTracker {
    pub fn new(store: Arc<Database>) -> Self {
        Self { store }
    }

    async fn capture(&self, table: &str, predicate: &str) -> StateSnapshot {
        if !is_identifier(table) {
            return StateSnapshot::uncaptured(format!("'{}' is not a plain table name", table));
        }
        if first_statement(predicate).len() != predicate.trim().len() {
            return StateSnapshot::uncaptured("predicate holds more than one statement");
        }

        let query = format!("SELECT * FROM {} WHERE {}", table, predicate);
        match sqlx::query(&query).fetch_all(self.store.pool()).await {
            Ok(rows) => {
                let rows: Vec<CapturedRow> = rows.iter().map(row_to_map).collect();
                debug!(table = %table, rows = rows.len(), "Rows captured");
                StateSnapshot::Rows(RowSnapshot::new(table, predicate, rows))
            }
            Err(e) => {
                warn!(table = %table, error = %e, "Row capture failed");
                StateSnapshot::uncaptured(format!("Row capture failed: {}", e))
            }
        }
    }

    async fn restore_updated(&self, snapshot: &RowSnapshot) -> RollbackOutcome {
        if snapshot.rows.is_empty() {
            return RollbackOutcome::failed(
                RollbackAction::NoRowsToRestore,
                format!("No rows of {} were captured", snapshot.table),
            );
        }
        if let Err(detail) = check_identifiers(snapshot) {
            return RollbackOutcome::failed(RollbackAction::Failed, detail);
        }

        let mut tx = match self.store.pool().begin().await {
            Ok(tx) => tx,
            Err(e) => return row_store_failure("begin transaction", e),
        };

        let mut restored = 0u64;
        let mut skipped = 0usize;
        for row in &snapshot.rows {
            let Some(key) = row.get(KEY_COLUMN) else {
                skipped += 1;
                continue;
            };
            let columns: Vec<&String> = row.keys().filter(|c| c.as_str() != KEY_COLUMN).collect();
            if columns.is_empty() {
                skipped += 1;
                continue;
            }

            let assignments = columns
                .iter()
                .map(|c| format!("{} = ?", c))
                .collect::<Vec<_>>()
                .join(", ");
            let sql = format!(
                "UPDATE {} SET {} WHERE {} = ?",
                snapshot.table, assignments, KEY_COLUMN
            );

            let mut query = sqlx::query(&sql);
            for column in &columns {
                query = bind_value(query, &row[column.as_str()]);
            }
            query = bind_value(query, key);

            match query.execute(&mut *tx).await {
                Ok(result) => restored += result.rows_affected(),
                Err(e) => return row_store_failure("restore row", e),
            }
        }

        if let Err(e) = tx.commit().await {
            return row_store_failure("commit", e);
        }

        info!(table = %snapshot.table, restored, skipped, "Updated rows restored");
        let mut detail = format!("Restored {} row(s) of {}", restored, snapshot.table);
        if skipped > 0 {
            detail.push_str(&format!("; skipped {} row(s) without an {} column", skipped, KEY_COLUMN));
        }
        RollbackOutcome::succeeded(RollbackAction::Restored, detail).with_rows_restored(restored)
    }

    async fn reinsert_deleted(&self, snapshot: &RowSnapshot) -> RollbackOutcome {
        if snapshot.rows.is_empty() {
            return RollbackOutcome::failed(
                RollbackAction::NoRowsToRestore,
                format!("No rows of {} were captured", snapshot.table),
            );
        }
        if let Err(detail) = check_identifiers(snapshot) {
            return RollbackOutcome::failed(RollbackAction::Failed, detail);
        }

        let mut tx = match self.store.pool().begin().await {
            Ok(tx) => tx,
            Err(e) => return row_store_failure("begin transaction", e),
        };

        let mut inserted = 0u64;
        for row in &snapshot.rows {
            let columns: Vec<&str> = row.keys().map(String::as_str).collect();
            let placeholders = vec!["?"; columns.len()].join(", ");
            let sql = format!(
                "INSERT INTO {} ({}) VALUES ({})",
                snapshot.table,
                columns.join(", "),
                placeholders
            );

            let mut query = sqlx::query(&sql);
            for value in row.values() {
                query = bind_value(query, value);
            }

            match query.execute(&mut *tx).await {
                Ok(result) => inserted += result.rows_affected(),
                Err(e) => return row_store_failure("re-insert row", e),
            }
        }

        if let Err(e) = tx.commit().await {
            return row_store_failure("commit", e);
        }

        info!(table = %snapshot.table, inserted, "Deleted rows re-inserted");
        RollbackOutcome::succeeded(
            RollbackAction::Reinserted,
            format!("Re-inserted {} row(s) into {}", inserted, snapshot.table),
        )
        .with_rows_restored(inserted)
    }
}

#[async_trait]
impl Tracker for RowTracker {
    fn kind(&self) -> ResourceKind {
        ResourceKind::DatabaseRow
    }

    async fn capture_before(&self, target: &Target) -> StateSnapshot {
        match target {
            Target::Rows { table, predicate } => self.capture(table, predicate).await,
            other => StateSnapshot::uncaptured(format!("row tracker cannot capture {:?}", other)),
        }
    }

    async fn execute_rollback(
        &self,
        compensation: Compensation,
        before: &StateSnapshot,
    ) -> RollbackOutcome {
        let StateSnapshot::Rows(snapshot) = before else {
            return RollbackOutcome::failed(
                RollbackAction::MissingTarget,
                "No row snapshot was captured",
            );
        };

        match compensation {
            Compensation::RestoreUpdatedRows => self.restore_updated(snapshot).await,
            Compensation::ReinsertDeletedRows => self.reinsert_deleted(snapshot).await,
            other => RollbackOutcome::failed(
                RollbackAction::NoStrategy,
                format!("Row tracker cannot run {:?}", other),
            ),
        }
    }
}

fn row_store_failure(step: &str, error: sqlx::Error) -> RollbackOutcome {
    warn!(step, error = %error, "Row store compensation failed");
    RollbackOutcome::failed(
        RollbackAction::Failed,
        format!("Row store failed to {}: {}", step, error),
    )
}

fn check_identifiers(snapshot: &RowSnapshot) -> std::result::Result<(), String> {
    if !is_identifier(&snapshot.table) {
        return Err(format!("'{}' is not a plain table name", snapshot.table));
    }
    for row in &snapshot.rows {
        if let Some(column) = row.keys().find(|c| !is_identifier(c)) {
            return Err(format!("'{}' is not a plain column name", column));
        }
    }
    Ok(())
}

/// Decode one row into column name -> JSON value
fn row_to_map(row: &SqliteRow) -> CapturedRow {
    let mut map = CapturedRow::new();

    for column in row.columns() {
        let index = column.ordinal();
        let value = match row.try_get_raw(index) {
            Ok(raw) if raw.is_null() => JsonValue::Null,
            Ok(raw) => {
                let type_name = raw.type_info().name().to_ascii_uppercase();
                decode_value(row, index, &type_name)
            }
            Err(_) => JsonValue::Null,
        };
        map.insert(column.name().to_string(), value);
    }

    map
}

fn decode_value(row: &SqliteRow, index: usize, type_name: &str) -> JsonValue {
    match type_name {
        "INTEGER" | "INT" | "BIGINT" | "INT8" | "BOOLEAN" => row
            .try_get_unchecked::<i64, _>(index)
            .map(JsonValue::from)
            .unwrap_or(JsonValue::Null),
        "REAL" | "FLOAT" | "DOUBLE" | "NUMERIC" => row
            .try_get_unchecked::<f64, _>(index)
            .map(JsonValue::from)
            .unwrap_or(JsonValue::Null),
        "BLOB" => row
            .try_get_unchecked::<Vec<u8>, _>(index)
            .map(JsonValue::from)
            .unwrap_or(JsonValue::Null),
        _ => row
            .try_get_unchecked::<String, _>(index)
            .map(JsonValue::from)
            .unwrap_or(JsonValue::Null),
    }
}

/// Bind a captured JSON value with the closest SQLite type
fn bind_value<'q>(
    query: Query<'q, Sqlite, SqliteArguments<'q>>,
    value: &JsonValue,
) -> Query<'q, Sqlite, SqliteArguments<'q>> {
    match value {
        JsonValue::Null => query.bind(None::<String>),
        JsonValue::Bool(b) => query.bind(*b),
        JsonValue::Number(n) => match n.as_i64() {
            Some(i) => query.bind(i),
            None => query.bind(n.as_f64()),
        },
        JsonValue::String(s) => query.bind(s.clone()),
        JsonValue::Array(items) => match blob_bytes(items) {
            Some(bytes) => query.bind(bytes),
            None => query.bind(value.to_string()),
        },
        JsonValue::Object(_) => query.bind(value.to_string()),
    }
}

fn blob_bytes(items: &[JsonValue]) -> Option<Vec<u8>> {
    items
        .iter()
        .map(|item| item.as_u64().and_then(|n| u8::try_from(n).ok()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_identifier_check() {
        assert!(is_identifier("items"));
        assert!(is_identifier("_audit_log2"));
        assert!(!is_identifier("items; DROP TABLE x"));
        assert!(!is_identifier("2fast"));
        assert!(!is_identifier(""));
    }

    #[test]
    fn test_blob_bytes() {
        assert_eq!(blob_bytes(&[json!(1), json!(255)]), Some(vec![1, 255]));
        assert_eq!(blob_bytes(&[json!(1), json!(256)]), None);
        assert_eq!(blob_bytes(&[json!("a")]), None);
    }

    #[tokio::test]
    async fn test_capture_decodes_column_types() {
        let store = Database::in_memory().await.unwrap();
        sqlx::query(
            "CREATE TABLE things (id INTEGER PRIMARY KEY, name TEXT, price REAL, note TEXT, raw BLOB)",
        )
        .execute(store.pool())
        .await
        .unwrap();
        sqlx::query("INSERT INTO things VALUES (1, 'bolt', 0.25, NULL, x'0102')")
            .execute(store.pool())
            .await
            .unwrap();

        let tracker = RowTracker::new(Arc::new(store));
        let target = Target::Rows {
            table: "things".to_string(),
            predicate: "id = 1".to_string(),
        };
        let StateSnapshot::Rows(snapshot) = tracker.capture_before(&target).await else {
            panic!("expected row snapshot");
        };

        assert_eq!(snapshot.row_count, 1);
        let row = &snapshot.rows[0];
        assert_eq!(row["id"], json!(1));
        assert_eq!(row["name"], json!("bolt"));
        assert_eq!(row["price"], json!(0.25));
        assert_eq!(row["note"], JsonValue::Null);
        assert_eq!(row["raw"], json!([1, 2]));
    }

    #[tokio::test]
    async fn test_capture_rejects_non_identifier_table() {
        let tracker = RowTracker::new(Arc::new(Database::in_memory().await.unwrap()));
        let target = Target::Rows {
            table: "a b".to_string(),
            predicate: "1 = 1".to_string(),
        };
        assert!(!tracker.capture_before(&target).await.is_captured());
    }

    #[tokio::test]
    async fn test_capture_never_runs_a_second_statement() {
        let store = Arc::new(Database::in_memory().await.unwrap());
        sqlx::query("CREATE TABLE items (id INTEGER PRIMARY KEY, qty INTEGER)")
            .execute(store.pool())
            .await
            .unwrap();
        sqlx::query("INSERT INTO items VALUES (1, 5), (2, 7)")
            .execute(store.pool())
            .await
            .unwrap();

        let tracker = RowTracker::new(store.clone());
        let target = Target::Rows {
            table: "items".to_string(),
            predicate: "id = 1; DELETE FROM items WHERE id = 2".to_string(),
        };
        assert!(!tracker.capture_before(&target).await.is_captured());

        let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM items")
            .fetch_one(store.pool())
            .await
            .unwrap();
        assert_eq!(count.0, 2);
    }

    #[tokio::test]
    async fn test_capture_failure_is_uncaptured() {
        let tracker = RowTracker::new(Arc::new(Database::in_memory().await.unwrap()));
        let target = Target::Rows {
            table: "missing_table".to_string(),
            predicate: "id = 1".to_string(),
        };
        let snapshot = tracker.capture_before(&target).await;
        assert!(matches!(snapshot, StateSnapshot::Uncaptured { ref reason } if reason.contains("missing_table")));
    }

    #[tokio::test]
    async fn test_empty_capture_has_nothing_to_restore() {
        let tracker = RowTracker::new(Arc::new(Database::in_memory().await.unwrap()));
        let before = StateSnapshot::Rows(RowSnapshot::new("items", "id = 9", Vec::new()));

        for compensation in [Compensation::RestoreUpdatedRows, Compensation::ReinsertDeletedRows] {
            let outcome = tracker.execute_rollback(compensation, &before).await;
            assert!(!outcome.success);
            assert_eq!(outcome.action, RollbackAction::NoRowsToRestore);
        }
    }
}
