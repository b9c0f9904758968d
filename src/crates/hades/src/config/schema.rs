//! Configuration schema for the Hades rollback agent

use crate::error::{HadesError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Main Hades configuration
///
/// Built once at startup and handed to every component; nothing below the
/// loader reads the process environment.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct HadesConfig {
    /// Operation log database
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Row store that SQL operations run against
    #[serde(default)]
    pub row_store: RowStoreConfig,

    /// Backup artifact storage
    #[serde(default)]
    pub snapshots: SnapshotConfig,

    /// Tracker-specific settings
    #[serde(default)]
    pub trackers: TrackersConfig,

    /// HTTP server settings
    #[serde(default)]
    pub server: ServerConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Rollback hint templates
    #[serde(default)]
    pub rollback: RollbackConfig,
}

/// Operation log database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// SQLite connection string (supports `${VAR}` expansion)
    pub url: String,

    /// Maximum pooled connections
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "sqlite:hades.db?mode=rwc".to_string(),
            max_connections: default_max_connections(),
        }
    }
}

/// Row store configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RowStoreConfig {
    /// SQLite connection string (supports `${VAR}` expansion)
    pub url: String,

    /// Maximum pooled connections
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

impl Default for RowStoreConfig {
    fn default() -> Self {
        Self {
            url: "sqlite:rows.db?mode=rwc".to_string(),
            max_connections: default_max_connections(),
        }
    }
}

fn default_max_connections() -> u32 {
    5
}

/// Snapshot storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotConfig {
    /// Directory backup artifacts are written to
    pub dir: PathBuf,
}

impl Default for SnapshotConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("storage/snapshots/files"),
        }
    }
}

/// Tracker settings
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct TrackersConfig {
    /// Container runtime settings
    #[serde(default)]
    pub container: ContainerConfig,
}

/// Container runtime configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContainerConfig {
    /// Runtime CLI binary ("docker", "podman", ...)
    pub binary: String,

    /// Per-command timeout in seconds; unset means no limit
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command_timeout_secs: Option<u64>,
}

impl Default for ContainerConfig {
    fn default() -> Self {
        Self {
            binary: "docker".to_string(),
            command_timeout_secs: None,
        }
    }
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Bind address
    pub host: String,

    /// Bind port
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8008,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level: "trace", "debug", "info", "warn", "error"
    pub level: String,

    /// Log format: "compact", "pretty", "json"
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "compact".to_string(),
        }
    }
}

/// One rollback hint rule
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StrategyRule {
    /// Template with `{container}`, `{path}`, `{table}`, `{predicate}`, `{command}` placeholders
    pub template: String,

    /// Optional human description of the strategy
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl StrategyRule {
    fn new(template: &str, description: &str) -> Self {
        Self {
            template: template.to_string(),
            description: Some(description.to_string()),
        }
    }
}

/// Rollback hint configuration, keyed by operation type
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RollbackConfig {
    pub strategies: BTreeMap<String, StrategyRule>,
}

impl Default for RollbackConfig {
    fn default() -> Self {
        let mut strategies = BTreeMap::new();
        strategies.insert(
            "docker_stop".to_string(),
            StrategyRule::new("docker start {container}", "Start the stopped container again"),
        );
        strategies.insert(
            "docker_start".to_string(),
            StrategyRule::new("docker stop {container}", "Stop the started container again"),
        );
        strategies.insert(
            "file_write".to_string(),
            StrategyRule::new(
                "Restore {path} from its snapshot backup",
                "Copy the captured backup over the written file",
            ),
        );
        strategies.insert(
            "file_delete".to_string(),
            StrategyRule::new(
                "Restore {path} from its snapshot backup",
                "Recreate the deleted file from the captured backup",
            ),
        );
        strategies.insert(
            "sql_update".to_string(),
            StrategyRule::new(
                "Restore captured rows of {table} matching {predicate}",
                "Write every captured column value back, keyed by id",
            ),
        );
        strategies.insert(
            "sql_delete".to_string(),
            StrategyRule::new(
                "Re-insert captured rows into {table} matching {predicate}",
                "Insert every captured row verbatim",
            ),
        );
        Self { strategies }
    }
}

impl HadesConfig {
    /// Resolve environment variables in connection strings
    ///
    /// Supports ${VAR_NAME} syntax
    pub fn resolve_env_vars(&mut self) {
        self.database.url = Self::expand_env_var(&self.database.url);
        self.row_store.url = Self::expand_env_var(&self.row_store.url);
    }

    /// Expand environment variable in a string
    fn expand_env_var(value: &str) -> String {
        if value.starts_with("${") && value.ends_with('}') {
            let var_name = &value[2..value.len() - 1];
            std::env::var(var_name).unwrap_or_else(|_| value.to_string())
        } else {
            value.to_string()
        }
    }

    /// Reject configurations the agent cannot start with
    pub fn validate(&self) -> Result<()> {
        if self.database.url.trim().is_empty() {
            return Err(HadesError::Config("database.url must not be empty".to_string()));
        }
        if self.row_store.url.trim().is_empty() {
            return Err(HadesError::Config("row_store.url must not be empty".to_string()));
        }
        if self.database.max_connections == 0 || self.row_store.max_connections == 0 {
            return Err(HadesError::Config("max_connections must be at least 1".to_string()));
        }
        if self.trackers.container.binary.trim().is_empty() {
            return Err(HadesError::Config(
                "trackers.container.binary must not be empty".to_string(),
            ));
        }
        match self.logging.format.as_str() {
            "compact" | "pretty" | "json" => {}
            other => {
                return Err(HadesError::Config(format!(
                    "Unsupported logging.format '{}'. Expected compact, pretty or json",
                    other
                )))
            }
        }
        Ok(())
    }

    /// Bind address for the HTTP server
    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = HadesConfig::default();
        assert_eq!(config.database.url, "sqlite:hades.db?mode=rwc");
        assert_eq!(config.trackers.container.binary, "docker");
        assert_eq!(config.server.port, 8008);
        assert_eq!(config.logging.level, "info");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_default_strategies_cover_known_types() {
        let config = HadesConfig::default();
        for op in ["docker_stop", "docker_start", "file_write", "sql_update", "sql_delete"] {
            assert!(config.rollback.strategies.contains_key(op), "missing {}", op);
        }
        assert_eq!(
            config.rollback.strategies["docker_stop"].template,
            "docker start {container}"
        );
    }

    #[test]
    fn test_env_var_expansion() {
        let mut config = HadesConfig::default();
        config.row_store.url = "${HADES_TEST_ROW_URL}".to_string();

        std::env::set_var("HADES_TEST_ROW_URL", "sqlite::memory:");
        config.resolve_env_vars();
        std::env::remove_var("HADES_TEST_ROW_URL");

        assert_eq!(config.row_store.url, "sqlite::memory:");
    }

    #[test]
    fn test_unset_env_var_is_left_alone() {
        let mut config = HadesConfig::default();
        config.database.url = "${HADES_SURELY_UNSET_VAR}".to_string();
        config.resolve_env_vars();
        assert_eq!(config.database.url, "${HADES_SURELY_UNSET_VAR}");
    }

    #[test]
    fn test_validate_rejects_bad_format() {
        let mut config = HadesConfig::default();
        config.logging.format = "xml".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_container_config_deserializes() {
        let toml = r#"
            binary = "podman"
            command_timeout_secs = 30
        "#;

        let config: ContainerConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.binary, "podman");
        assert_eq!(config.command_timeout_secs, Some(30));
    }
}
