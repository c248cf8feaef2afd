//! Configuration management for scriptrun
//!
//! The effective configuration is the config file (or defaults when it is
//! missing) with command-line overrides applied on top.

pub mod schema;

pub use schema::Config;

use crate::error::{ScriptrunError, ScriptrunResult};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::debug;

/// Environment variable naming an alternative config file
pub const CONFIG_ENV: &str = "SCRIPTRUN_CONFIG";

/// Environment variable naming an alternative cache directory
pub const CACHE_DIR_ENV: &str = "SCRIPTRUN_CACHE_DIR";

/// Loads the config file and applies overrides
#[derive(Debug, Clone)]
pub struct ConfigManager {
    config_path: PathBuf,
    cache_dir: Option<PathBuf>,
}

impl ConfigManager {
    /// Create a new config manager with default path
    pub fn new() -> Self {
        Self {
            config_path: Self::default_config_path(),
            cache_dir: None,
        }
    }

    /// Create a config manager with a custom path
    pub fn with_path(path: PathBuf) -> Self {
        Self {
            config_path: path,
            cache_dir: None,
        }
    }

    /// Manager for an optional `--config` value, else the default path
    pub fn resolve(path: Option<PathBuf>) -> Self {
        path.map_or_else(Self::new, Self::with_path)
    }

    /// Use `dir` as the cache directory regardless of the config file
    pub fn cache_dir_override(mut self, dir: Option<PathBuf>) -> Self {
        if dir.is_some() {
            self.cache_dir = dir;
        }
        self
    }

    /// Get the default config file path
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("scriptrun")
            .join("config.toml")
    }

    /// Cache directory used when neither the config nor a flag sets one
    pub fn default_cache_dir() -> PathBuf {
        dirs::cache_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("scriptrun")
    }

    /// Load the effective configuration, falling back to defaults if the
    /// file is missing
    pub async fn load(&self) -> ScriptrunResult<Config> {
        let mut config = if self.config_path.exists() {
            self.load_from_file(&self.config_path).await?
        } else {
            debug!("Config file not found, using defaults");
            Config::default()
        };

        if let Some(dir) = &self.cache_dir {
            config.cache.dir = Some(dir.clone());
        }
        Ok(config)
    }

    /// Load configuration from a specific file.
    ///
    /// A relative `cache.dir` is taken relative to the file's directory.
    pub async fn load_from_file(&self, path: &Path) -> ScriptrunResult<Config> {
        let content = fs::read_to_string(path)
            .await
            .map_err(|e| ScriptrunError::io(format!("reading config from {}", path.display()), e))?;

        let invalid = |reason: String| ScriptrunError::ConfigInvalid {
            path: path.to_path_buf(),
            reason,
        };
        let mut config: Config = toml::from_str(&content).map_err(|e| invalid(e.to_string()))?;

        let extension = &config.cache.literal_extension;
        if extension.is_empty() || extension.contains(['.', '/', '\\']) {
            return Err(invalid(format!(
                "cache.literal_extension must be a bare extension, got {:?}",
                extension
            )));
        }

        if let (Some(dir), Some(base)) = (&config.cache.dir, path.parent()) {
            if dir.is_relative() {
                config.cache.dir = Some(base.join(dir));
            }
        }
        Ok(config)
    }

    /// Get the config file path
    pub fn path(&self) -> &Path {
        &self.config_path
    }
}

impl Default for ConfigManager {
    fn default() -> Self {
        Self::new()
    }
}
