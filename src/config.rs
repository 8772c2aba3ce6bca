//! User configuration, read from `~/.config/litman/config.toml`.

use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

use crate::cite::DEFAULT_CITE_COMMANDS;

/// Environment variable that overrides the config file location.
pub const CONFIG_ENV: &str = "LITMAN_CONFIG";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Invalid config: {0}")]
    TomlError(#[from] toml::de::Error),
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Root of the item store.
    pub lit_dir: PathBuf,
    /// JSON table of journal abbreviations.
    pub journal_map: Option<PathBuf>,
    /// Citation commands recognised in document sources.
    pub cite_commands: Vec<String>,
    /// File extension scanned when a directory is given as input.
    pub source_extension: String,
    /// Keys whose titles are never re-cased.
    pub title_exceptions: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        let lit_dir = dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("~/.local/share"))
            .join("litman")
            .join("literature");

        Self {
            lit_dir,
            journal_map: None,
            cite_commands: DEFAULT_CITE_COMMANDS.iter().map(|c| c.to_string()).collect(),
            source_extension: "tex".to_string(),
            title_exceptions: Vec::new(),
        }
    }
}

impl Config {
    /// `$LITMAN_CONFIG` if set, otherwise `<config_dir>/litman/config.toml`.
    pub fn config_path() -> PathBuf {
        if let Ok(path) = std::env::var(CONFIG_ENV) {
            return PathBuf::from(path);
        }

        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("~/.config"))
            .join("litman")
            .join("config.toml")
    }

    /// Loads from [`config_path`](Self::config_path), falling back to
    /// defaults if the file doesn't exist.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&Self::config_path())
    }

    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::debug!("no config at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let contents = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&contents)?;
        Ok(config)
    }
}
