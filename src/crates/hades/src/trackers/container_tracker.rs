//! Container tracker
//!
//! Records whether a container was running before a lifecycle command and
//! puts it back into that state on rollback. All runtime calls go through
//! [`ContainerRuntime`]; [`DockerCli`] shells out to the configured binary.

use crate::classifier::Target;
use crate::config::ContainerConfig;
use crate::error::{HadesError, Result};
use crate::models::{
    Compensation, ContainerSnapshot, ResourceKind, RollbackAction, RollbackOutcome, StateSnapshot,
};
use crate::trackers::Tracker;
use async_trait::async_trait;
use chrono::Utc;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, info, warn};

/// Container state as reported by the runtime
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerState {
    pub id: String,
    pub running: bool,
    pub status: String,
    pub image: String,
}

/// Container runtime operations needed for capture and compensation
#[async_trait]
pub trait ContainerRuntime: Send + Sync {
    /// Inspect a container; `Ok(None)` when the runtime does not know it
    async fn inspect(&self, name: &str) -> Result<Option<ContainerState>>;

    async fn start(&self, name: &str) -> Result<()>;

    async fn stop(&self, name: &str) -> Result<()>;
}

#[derive(Debug, Deserialize)]
struct InspectOutput {
    #[serde(rename = "Id")]
    id: String,
    #[serde(rename = "State")]
    state: InspectState,
    #[serde(rename = "Config")]
    config: Option<InspectConfig>,
}

#[derive(Debug, Deserialize)]
struct InspectState {
    #[serde(rename = "Status", default)]
    status: String,
    #[serde(rename = "Running", default)]
    running: bool,
}

#[derive(Debug, Deserialize)]
struct InspectConfig {
    #[serde(rename = "Image", default)]
    image: String,
}

/// Parse `docker inspect` JSON output (an array with one object)
pub fn parse_inspect_output(stdout: &str) -> Result<Option<ContainerState>> {
    let entries: Vec<InspectOutput> = serde_json::from_str(stdout)?;
    Ok(entries.into_iter().next().map(|entry| ContainerState {
        id: entry.id,
        running: entry.state.running,
        status: entry.state.status,
        image: entry.config.map(|c| c.image).unwrap_or_default(),
    }))
}

/// Runtime backed by the docker (or compatible) CLI
#[derive(Debug, Clone)]
pub struct DockerCli {
    binary: String,
    timeout: Option<Duration>,
}

impl DockerCli {
    pub fn new(binary: impl Into<String>, timeout: Option<Duration>) -> Self {
        Self {
            binary: binary.into(),
            timeout,
        }
    }

    pub fn from_config(config: &ContainerConfig) -> Self {
        Self::new(
            config.binary.clone(),
            config.command_timeout_secs.map(Duration::from_secs),
        )
    }

    async fn run(&self, args: &[&str]) -> Result<std::process::Output> {
        debug!(binary = %self.binary, ?args, "Running container runtime command");

        let mut command = Command::new(&self.binary);
        command.args(args).kill_on_drop(true);

        let output = match self.timeout {
            Some(limit) => tokio::time::timeout(limit, command.output())
                .await
                .map_err(|_| {
                    HadesError::Runtime(format!(
                        "{} {} timed out after {}s",
                        self.binary,
                        args.join(" "),
                        limit.as_secs()
                    ))
                })?,
            None => command.output().await,
        };

        output.map_err(|e| HadesError::Runtime(format!("Failed to run {}: {}", self.binary, e)))
    }

    async fn run_checked(&self, args: &[&str]) -> Result<()> {
        let output = self.run(args).await?;
        if output.status.success() {
            Ok(())
        } else {
            Err(HadesError::Runtime(
                String::from_utf8_lossy(&output.stderr).trim().to_string(),
            ))
        }
    }
}

#[async_trait]
impl ContainerRuntime for DockerCli {
    async fn inspect(&self, name: &str) -> Result<Option<ContainerState>> {
        let output = self.run(&["inspect", name]).await?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            if stderr.contains("No such") {
                return Ok(None);
            }
            return Err(HadesError::Runtime(stderr.trim().to_string()));
        }

        parse_inspect_output(&String::from_utf8_lossy(&output.stdout))
    }

    async fn start(&self, name: &str) -> Result<()> {
        self.run_checked(&["start", name]).await
    }

    async fn stop(&self, name: &str) -> Result<()> {
        self.run_checked(&["stop", name]).await
    }
}

/// Tracker for `docker_*` / `container_*` operations
#[derive(Clone)]
pub struct ContainerTracker {
    runtime: Arc<dyn ContainerRuntime>,
}

impl ContainerTracker {
    pub fn new(runtime: Arc<dyn ContainerRuntime>) -> Self {
        Self { runtime }
    }

    async fn snapshot(&self, name: &str) -> ContainerSnapshot {
        match self.runtime.inspect(name).await {
            Ok(Some(state)) => ContainerSnapshot {
                container: name.to_string(),
                exists: true,
                running: state.running,
                container_id: Some(state.id),
                image: Some(state.image),
                status: Some(state.status),
                error: None,
                captured_at: Utc::now(),
            },
            Ok(None) => ContainerSnapshot::absent(name, None),
            Err(e) => {
                warn!(container = %name, error = %e, "Container inspect failed");
                ContainerSnapshot::absent(name, Some(e.to_string()))
            }
        }
    }

    async fn compensate(
        &self,
        compensation: Compensation,
        before: &ContainerSnapshot,
    ) -> RollbackOutcome {
        let name = before.container.as_str();

        if !before.exists {
            return RollbackOutcome::succeeded(
                RollbackAction::NoOpAlreadyCorrectState,
                format!("Container {} did not exist before the operation", name),
            );
        }

        match compensation {
            Compensation::RestartStopped if before.running => match self.runtime.start(name).await {
                Ok(()) => {
                    info!(container = %name, "Container started back up");
                    RollbackOutcome::succeeded(
                        RollbackAction::StartedBackUp,
                        format!("Started container {}", name),
                    )
                }
                Err(e) => RollbackOutcome::failed(RollbackAction::Failed, e.to_string()),
            },
            Compensation::StopStarted if !before.running => match self.runtime.stop(name).await {
                Ok(()) => {
                    info!(container = %name, "Container stopped back down");
                    RollbackOutcome::succeeded(
                        RollbackAction::StoppedBackDown,
                        format!("Stopped container {}", name),
                    )
                }
                Err(e) => RollbackOutcome::failed(RollbackAction::Failed, e.to_string()),
            },
            Compensation::RestartStopped | Compensation::StopStarted => RollbackOutcome::succeeded(
                RollbackAction::NoOpAlreadyCorrectState,
                format!(
                    "Container {} was {} before the operation; nothing to do",
                    name,
                    if before.running { "running" } else { "not running" }
                ),
            ),
            other => RollbackOutcome::failed(
                RollbackAction::NoStrategy,
                format!("Container tracker cannot run {:?}", other),
            ),
        }
    }
}

#[async_trait]
impl Tracker for ContainerTracker {
    fn kind(&self) -> ResourceKind {
        ResourceKind::Container
    }

    async fn capture_before(&self, target: &Target) -> StateSnapshot {
        match target {
            Target::Container { name } => StateSnapshot::Container(self.snapshot(name).await),
            other => {
                StateSnapshot::uncaptured(format!("container tracker cannot capture {:?}", other))
            }
        }
    }

    async fn execute_rollback(
        &self,
        compensation: Compensation,
        before: &StateSnapshot,
    ) -> RollbackOutcome {
        match before {
            StateSnapshot::Container(snapshot) => self.compensate(compensation, snapshot).await,
            _ => RollbackOutcome::failed(
                RollbackAction::MissingTarget,
                "No container snapshot was captured",
            ),
        }
    }
}
