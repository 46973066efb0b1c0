//! Configuration management for toolscope

pub mod schema;

pub use schema::Config;

use crate::error::{ToolscopeError, ToolscopeResult};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Default configuration file name, looked up in the top directory
pub const CONFIG_FILE_NAME: &str = "toolscope.toml";

/// Environment variable overriding the debug flag
pub const DEBUG_ENV: &str = "TOOLSCOPE_DEBUG";

/// Environment variable overriding the cache flag
pub const CACHE_ENV: &str = "TOOLSCOPE_CACHE";

/// Configuration manager
pub struct ConfigManager {
    config_path: PathBuf,
}

impl ConfigManager {
    /// Create a config manager for the project rooted at `top`
    pub fn new(top: &Path) -> Self {
        Self {
            config_path: top.join(CONFIG_FILE_NAME),
        }
    }

    /// Create a config manager with a custom path
    pub fn with_path(path: PathBuf) -> Self {
        Self { config_path: path }
    }

    /// Load configuration, using defaults if the file does not exist.
    ///
    /// `TOOLSCOPE_DEBUG` and `TOOLSCOPE_CACHE` override the file.
    pub fn load(&self) -> ToolscopeResult<Config> {
        let mut config = if self.config_path.exists() {
            self.load_from_file(&self.config_path)?
        } else {
            debug!("Config file {} not found, using defaults", self.config_path.display());
            Config::default()
        };

        if let Some(flag) = env_flag(DEBUG_ENV) {
            config.debug = flag;
        }
        if let Some(flag) = env_flag(CACHE_ENV) {
            config.cache = flag;
        }

        Ok(config)
    }

    /// Load configuration from a specific file
    pub fn load_from_file(&self, path: &Path) -> ToolscopeResult<Config> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ToolscopeError::io(format!("reading config from {}", path.display()), e))?;

        toml::from_str(&content).map_err(|e| ToolscopeError::ConfigInvalid {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
    }

    /// Get the config file path
    pub fn path(&self) -> &Path {
        &self.config_path
    }
}

/// Resolve the tool cache file against the top directory
pub fn cache_file_path(config: &Config, top: &Path) -> PathBuf {
    if config.cache_file.is_absolute() {
        config.cache_file.clone()
    } else {
        top.join(&config.cache_file)
    }
}

fn env_flag(name: &str) -> Option<bool> {
    let value = std::env::var(name).ok()?;
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" | "" => Some(false),
        other => {
            debug!("Ignoring {}={}: not a boolean", name, other);
            None
        }
    }
}
