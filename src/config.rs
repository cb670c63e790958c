//! Service configuration: defaults, then `limitguard.toml`, then `LIMITGUARD_*` env vars.

use anyhow::{Context, Result};
use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

const CONFIG_FILE: &str = "limitguard.toml";
const CONFIG_PATH_VAR: &str = "LIMITGUARD_CONFIG";
const ENV_PREFIX: &str = "LIMITGUARD";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct AppConfig {
    pub port: u16,
    /// Falls back to the platform data directory when unset.
    pub database_path: Option<PathBuf>,
    pub pool_max_size: usize,
    pub ctx_timeout_secs: u64,
    pub busy_timeout_ms: u64,
    pub log_json: bool,
    pub pod_name: String,
    pub api_version: String,
    pub env: String,
}

impl AppConfig {
    pub(crate) fn load() -> Result<Self> {
        let file = std::env::var_os(CONFIG_PATH_VAR).map(PathBuf::from);
        let config = build(file.as_deref(), Environment::with_prefix(ENV_PREFIX))
            .context("Failed to load configuration")?;
        Ok(config)
    }

    pub(crate) fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.ctx_timeout_secs)
    }

    pub(crate) fn busy_timeout(&self) -> Duration {
        Duration::from_millis(self.busy_timeout_ms)
    }

    pub(crate) fn database_path(&self) -> Result<PathBuf> {
        match &self.database_path {
            Some(path) => Ok(path.clone()),
            None => default_db_path(),
        }
    }
}

/// An explicit `file` must exist; the default `limitguard.toml` is optional.
fn build(file: Option<&Path>, env: Environment) -> Result<AppConfig, ConfigError> {
    let file_source = match file {
        Some(path) => File::from(path).required(true),
        None => File::with_name(CONFIG_FILE).required(false),
    };

    Config::builder()
        .set_default("port", 5000)?
        .set_default("pool_max_size", 10)?
        .set_default("ctx_timeout_secs", 5)?
        .set_default("busy_timeout_ms", 5000)?
        .set_default("log_json", false)?
        .set_default("pod_name", "limitguard")?
        .set_default("api_version", env!("CARGO_PKG_VERSION"))?
        .set_default("env", "dev")?
        .add_source(file_source)
        .add_source(env.try_parsing(true))
        .build()?
        .try_deserialize()
}

fn default_db_path() -> Result<PathBuf> {
    let proj_dirs = directories::ProjectDirs::from("com", "limitguard", "LimitGuard")
        .ok_or_else(|| anyhow::anyhow!("Could not determine data directory"))?;
    let data_dir = proj_dirs.data_dir();
    std::fs::create_dir_all(data_dir)
        .with_context(|| format!("Failed to create data directory: {}", data_dir.display()))?;
    Ok(data_dir.join("limitguard.db"))
}
