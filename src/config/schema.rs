//! Configuration schema for scriptrun
//!
//! Configuration is stored at `~/.config/scriptrun/config.toml`

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

/// Root configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// General settings
    pub general: GeneralConfig,

    /// Script cache settings
    pub cache: CacheConfig,

    /// Process execution defaults
    pub process: ProcessConfig,

    /// Command prefix used to run a cached script, keyed by file extension.
    /// The script path is appended, then any user arguments.
    pub interpreters: BTreeMap<String, Vec<String>>,
}

impl Default for Config {
    fn default() -> Self {
        let mut interpreters = BTreeMap::new();
        interpreters.insert(
            "kts".to_string(),
            vec!["kotlinc".to_string(), "-script".to_string()],
        );
        // Programs are compiled next to the cached source on first run.
        interpreters.insert(
            "kt".to_string(),
            vec![
                "sh".to_string(),
                "-c".to_string(),
                r#"[ -f "$0.jar" ] || kotlinc "$0" -include-runtime -d "$0.jar" && exec java -jar "$0.jar" "$@""#
                    .to_string(),
            ],
        );
        interpreters.insert("sh".to_string(), vec!["sh".to_string()]);

        Self {
            general: GeneralConfig::default(),
            cache: CacheConfig::default(),
            process: ProcessConfig::default(),
            interpreters,
        }
    }
}

impl Config {
    /// Effective cache directory: configured value, else the platform cache dir
    pub fn cache_dir(&self) -> PathBuf {
        self.cache
            .dir
            .clone()
            .unwrap_or_else(super::ConfigManager::default_cache_dir)
    }

    /// Interpreter command prefix for a script extension
    pub fn interpreter(&self, extension: &str) -> Option<&[String]> {
        self.interpreters
            .get(extension)
            .map(Vec::as_slice)
            .filter(|argv| !argv.is_empty())
    }
}

/// General application settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Log format: "text" or "json"
    pub log_format: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_format: "text".to_string(),
        }
    }
}

/// Cache configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Cache directory (default: platform cache dir + "scriptrun")
    pub dir: Option<PathBuf>,

    /// Extension given to literal scripts
    pub literal_extension: String,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            dir: None,
            literal_extension: "kts".to_string(),
        }
    }
}

/// Process execution defaults
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessConfig {
    /// Kill commands still running after this many seconds (unset = wait forever)
    pub timeout_secs: Option<u64>,

    /// Environment overrides applied to every command
    pub env: BTreeMap<String, String>,
}

impl ProcessConfig {
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }
}
