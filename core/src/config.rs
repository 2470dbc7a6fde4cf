use std::{fs, path::Path};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub engine: EngineRuntimeConfig,
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        serde_json::from_str(&content)
            .with_context(|| format!("failed to parse config file {}", path.display()))
    }

    /// Loads the file when given a path, otherwise runs on defaults.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::load(path),
            None => Ok(Self::default()),
        }
    }
}

fn default_logging_dir() -> std::path::PathBuf {
    std::path::PathBuf::from("./logs")
}

fn default_logging_filter() -> String {
    "info".to_string()
}

fn default_logging_rotation() -> LoggingRotation {
    LoggingRotation::Daily
}

fn default_logging_retention_days() -> usize {
    14
}

fn default_enabled_true() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum LoggingRotation {
    Daily,
    Hourly,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_logging_dir")]
    pub dir: std::path::PathBuf,
    #[serde(default = "default_logging_filter")]
    pub filter: String,
    #[serde(default = "default_logging_rotation")]
    pub rotation: LoggingRotation,
    #[serde(default = "default_logging_retention_days")]
    pub retention_days: usize,
    #[serde(default = "default_enabled_true")]
    pub stderr_warn_enabled: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            dir: default_logging_dir(),
            filter: default_logging_filter(),
            rotation: default_logging_rotation(),
            retention_days: default_logging_retention_days(),
            stderr_warn_enabled: true,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EngineRuntimeConfig {
    /// SSML prosody rate the composed speech is wrapped in, e.g.
    /// "slow" or "95%".
    #[serde(default)]
    pub spoken_rate: Option<String>,
    /// Fixed seed for phrase picking; unset means entropy.
    #[serde(default)]
    pub rng_seed: Option<u64>,
}
