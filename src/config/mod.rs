//! Configuration module for sentiflow
//!
//! A pipeline is described by one [`PipelineConfig`], supplied at
//! construction and never changed afterwards. It can be loaded from a TOML
//! file; every section is optional and falls back to defaults.
//!
//! # Config File Location
//!
//! Without `--config`, the CLI looks for `pipeline.toml` in the
//! platform-appropriate config directory under `sentiflow`:
//!
//! - **Linux**: `~/.config/sentiflow/`
//! - **macOS**: `~/Library/Application Support/sentiflow/`
//! - **Windows**: `%APPDATA%\sentiflow\`
//!
//! # Example
//!
//! ```toml
//! [source]
//! min_delay_secs = 0.1
//! max_delay_secs = 2.0
//! max_items = 100
//!
//! [queues]
//! raw_capacity = 20
//! classified_capacity = 20
//!
//! [aggregator]
//! alpha = 0.1
//! recent_window = 5
//! ```

pub mod settings;

pub use settings::*;

use crate::error::{Result, SentiflowError};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Application identifier for config directories
pub const APP_ID: &str = "sentiflow";

/// Config filename
pub const CONFIG_FILE: &str = "pipeline.toml";

/// Get the path of the default config file, if the platform has a config dir
pub fn default_config_path() -> Option<PathBuf> {
    dirs_next::config_dir().map(|p| p.join(APP_ID).join(CONFIG_FILE))
}

/// Complete pipeline configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct PipelineConfig {
    #[serde(default)]
    pub source: SourceConfig,

    #[serde(default)]
    pub queues: QueueConfig,

    #[serde(default)]
    pub aggregator: AggregatorConfig,

    #[serde(default)]
    pub classifier: ClassifierConfig,
}

impl PipelineConfig {
    /// Create a new default configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Check every section
    pub fn validate(&self) -> Result<()> {
        self.source.validate()?;
        self.queues.validate()?;
        self.aggregator.validate()?;
        Ok(())
    }

    /// Parse a configuration from TOML text
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)
            .map_err(|e| SentiflowError::Config(format!("Failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Load a configuration file from disk
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            SentiflowError::Config(format!("Failed to read config file {:?}: {}", path, e))
        })?;

        Self::from_toml_str(&content).map_err(|e| e.with_context(format!("{:?}", path)))
    }

    /// Load the default config file, returning defaults if it is missing or
    /// unreadable
    pub fn load_or_default() -> Self {
        let Some(path) = default_config_path() else {
            return Self::default();
        };
        if !path.exists() {
            return Self::default();
        }
        Self::load(&path).unwrap_or_else(|e| {
            tracing::warn!("Failed to load config, using defaults: {}", e);
            Self::default()
        })
    }

    /// Save the configuration to disk as TOML
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                SentiflowError::Config(format!("Failed to create config directory: {}", e))
            })?;
        }

        let content = toml::to_string_pretty(self)
            .map_err(|e| SentiflowError::Config(format!("Failed to serialize config: {}", e)))?;

        std::fs::write(path, content).map_err(|e| {
            SentiflowError::Config(format!("Failed to write config file {:?}: {}", path, e))
        })
    }
}

// ==================== Tests ====================
