//! Command handlers for the `hades` binary

use crate::engine::RollbackEngine;
use crate::error::{HadesError, Result};
use crate::models::{OperationSummary, RollbackReport};
use colored::Colorize;
use tabled::{Table, Tabled};

/// Operation display row for table output
#[derive(Tabled)]
struct OperationRow {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "Type")]
    operation_type: String,
    #[tabled(rename = "State")]
    state: String,
    #[tabled(rename = "Executed")]
    executed: String,
    #[tabled(rename = "Command")]
    command: String,
}

impl From<OperationSummary> for OperationRow {
    fn from(summary: OperationSummary) -> Self {
        let command = if summary.command.chars().count() > 50 {
            format!("{}...", summary.command.chars().take(47).collect::<String>())
        } else {
            summary.command
        };

        Self {
            id: summary.id,
            operation_type: summary.operation_type,
            state: summary.state.to_string(),
            executed: summary.executed_at.format("%Y-%m-%d %H:%M:%S").to_string(),
            command,
        }
    }
}

/// Handle `hades list`
pub async fn handle_list(engine: &RollbackEngine, limit: u32) -> Result<()> {
    let operations = engine.list_recent(limit).await?;

    if operations.is_empty() {
        println!("{}", "No operations tracked".yellow());
        return Ok(());
    }

    let count = operations.len();
    let rows: Vec<OperationRow> = operations.into_iter().map(OperationRow::from).collect();
    println!("{}", Table::new(rows));
    println!("\n{} operation(s)", count);
    Ok(())
}

/// Handle `hades rollback --id`
///
/// Returns whether the rollback succeeded so the binary can set its exit code.
pub async fn handle_rollback(engine: &RollbackEngine, id: String) -> Result<bool> {
    let outcome = engine.rollback(&id).await;
    let success = outcome.success;
    let report = RollbackReport {
        operation_id: id,
        outcome,
    };
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(success)
}

/// Handle `hades rollback-last`
pub async fn handle_rollback_last(engine: &RollbackEngine, count: u32) -> Result<bool> {
    let reports = engine.rollback_last(count).await?;
    if reports.is_empty() {
        eprintln!("{}", "No operations to roll back".yellow());
    }
    let all_succeeded = reports.iter().all(|r| r.outcome.success);
    println!("{}", serde_json::to_string_pretty(&reports)?);
    Ok(all_succeeded)
}

/// Handle `hades track`
pub async fn handle_track(
    engine: &RollbackEngine,
    operation_type: String,
    command: String,
    correlation_id: Option<String>,
) -> Result<()> {
    let id = engine.track(&command, &operation_type, correlation_id).await?;
    println!("{}", id);
    Ok(())
}

/// Handle `hades complete`
pub async fn handle_complete(engine: &RollbackEngine, id: String, success: bool) -> Result<()> {
    engine.complete(&id, success).await?;
    eprintln!("{} {}", "✓ Completion recorded for".green(), id);
    Ok(())
}

/// Handle `hades show`
pub async fn handle_show(engine: &RollbackEngine, id: String) -> Result<()> {
    let operation = engine
        .get(&id)
        .await?
        .ok_or_else(|| HadesError::NotFound(format!("Operation {}", id)))?;

    println!("{}", serde_json::to_string_pretty(&operation)?);
    Ok(())
}
