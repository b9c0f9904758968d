//! Configuration management for Hades
//!
//! Configuration is layered: defaults, then `~/.hades/hades.toml`, then
//! `./.hades/hades.toml`, then an explicit file. The resulting [`HadesConfig`]
//! is the only place process environment is consulted.

mod loader;
mod schema;

pub use loader::ConfigLoader;
pub use schema::{
    ContainerConfig, DatabaseConfig, HadesConfig, LoggingConfig, RollbackConfig, RowStoreConfig,
    ServerConfig, SnapshotConfig, StrategyRule, TrackersConfig,
};

use crate::Result;
use std::path::Path;

/// Load configuration from the standard locations, plus an optional explicit file
pub async fn load_config(explicit: Option<&Path>) -> Result<HadesConfig> {
    let loader = match explicit {
        Some(path) => ConfigLoader::new().with_explicit_path(path),
        None => ConfigLoader::new(),
    };
    loader.load().await
}
