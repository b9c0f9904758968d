//! Configuration loader with layered sources
//!
//! Loads configuration from:
//! 1. Default values
//! 2. User-level config: ~/.hades/hades.toml
//! 3. Project-level config: ./.hades/hades.toml
//! 4. An explicit file passed on the command line
//! 5. `HADES_DB_URL`, `HADES_ROW_STORE_URL`, `HADES_SNAPSHOT_DIR`
//!
//! Later sources override earlier ones key by key.

use crate::config::schema::HadesConfig;
use crate::error::{HadesError, Result};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, info};

/// Configuration loader that layers user, project and explicit files
#[derive(Debug, Clone)]
pub struct ConfigLoader {
    user_config_path: Option<PathBuf>,
    project_config_path: PathBuf,
    explicit_path: Option<PathBuf>,
    read_env: bool,
}

impl ConfigLoader {
    /// Create a new config loader with the standard locations
    pub fn new() -> Self {
        Self {
            user_config_path: dirs::home_dir().map(|home| home.join(".hades").join("hades.toml")),
            project_config_path: PathBuf::from(".hades").join("hades.toml"),
            explicit_path: None,
            read_env: true,
        }
    }

    /// Loader that only reads the given file on top of defaults
    pub fn from_file(path: impl Into<PathBuf>) -> Self {
        Self {
            user_config_path: None,
            project_config_path: PathBuf::new(),
            explicit_path: Some(path.into()),
            read_env: false,
        }
    }

    /// Add an explicit config file applied after the standard locations
    pub fn with_explicit_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.explicit_path = Some(path.into());
        self
    }

    /// Load and validate the layered configuration
    pub async fn load(&self) -> Result<HadesConfig> {
        let mut merged = toml::Value::try_from(HadesConfig::default())
            .map_err(|e| HadesError::Config(format!("Failed to encode defaults: {}", e)))?;
        info!("Loading configuration with defaults");

        if let Some(ref user_path) = self.user_config_path {
            self.merge_optional(&mut merged, user_path, "user").await?;
        }
        self.merge_optional(&mut merged, &self.project_config_path, "project")
            .await?;

        if let Some(ref explicit) = self.explicit_path {
            // An explicitly requested file must exist
            let layer = Self::read_layer(explicit).await?;
            debug!(path = %explicit.display(), "Loaded explicit config");
            merge_values(&mut merged, layer);
        }

        let mut config: HadesConfig = merged
            .try_into()
            .map_err(|e| HadesError::Config(format!("Invalid configuration: {}", e)))?;

        if self.read_env {
            apply_env_overrides(&mut config);
        }
        config.resolve_env_vars();
        config.validate()?;

        info!("Configuration loaded successfully");
        Ok(config)
    }

    async fn merge_optional(&self, merged: &mut toml::Value, path: &Path, label: &str) -> Result<()> {
        if path.as_os_str().is_empty() || !path.exists() {
            debug!(path = %path.display(), source = label, "Config file not found, skipping");
            return Ok(());
        }
        let layer = Self::read_layer(path).await?;
        debug!(path = %path.display(), source = label, "Loaded config layer");
        merge_values(merged, layer);
        Ok(())
    }

    async fn read_layer(path: &Path) -> Result<toml::Value> {
        let content = fs::read_to_string(path).await.map_err(|e| {
            HadesError::Config(format!("Failed to read config {}: {}", path.display(), e))
        })?;

        toml::from_str(&content).map_err(|e| {
            HadesError::Config(format!("Failed to parse config {}: {}", path.display(), e))
        })
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

/// Deep-merge `layer` into `base`; tables merge recursively, everything else replaces
fn merge_values(base: &mut toml::Value, layer: toml::Value) {
    match (base, layer) {
        (toml::Value::Table(base_table), toml::Value::Table(layer_table)) => {
            for (key, value) in layer_table {
                match base_table.get_mut(&key) {
                    Some(existing) => merge_values(existing, value),
                    None => {
                        base_table.insert(key, value);
                    }
                }
            }
        }
        (slot, value) => *slot = value,
    }
}

fn apply_env_overrides(config: &mut HadesConfig) {
    if let Ok(url) = std::env::var("HADES_DB_URL") {
        config.database.url = url;
    }
    if let Ok(url) = std::env::var("HADES_ROW_STORE_URL") {
        config.row_store.url = url;
    }
    if let Ok(dir) = std::env::var("HADES_SNAPSHOT_DIR") {
        config.snapshots.dir = PathBuf::from(dir);
    }
}
