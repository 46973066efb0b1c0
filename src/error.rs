//! Error types for toolscope
//!
//! All modules use `ToolscopeResult<T>` as their return type. Only hard
//! failures live here: probe failures, duplicate registrations and
//! re-entrant generation are reported through the debug channel instead.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for toolscope operations
pub type ToolscopeResult<T> = Result<T, ToolscopeError>;

/// All errors that can occur in toolscope
#[derive(Error, Debug)]
pub enum ToolscopeError {
    // Tool resolution errors
    #[error("Tool not found: {name} (searched: {searched})")]
    ToolNotFound { name: String, searched: String },

    #[error("Tool cycle: {chain}")]
    ToolCycle { chain: String },

    #[error("Tool error: {file} does not export tool '{name}'")]
    ToolNotExported { name: String, file: PathBuf },

    #[error("Invalid tool file {path}: {reason}")]
    ToolFileInvalid { path: PathBuf, reason: String },

    #[error("Invalid tool parameter for {tool}: {reason}")]
    ToolParam { tool: String, reason: String },

    // Configuration errors
    #[error("Invalid configuration at {path}: {reason}")]
    ConfigInvalid { path: PathBuf, reason: String },

    #[error("Invalid tool cache at {path}: {reason}")]
    CacheInvalid { path: PathBuf, reason: String },

    #[error("Invalid project file {path}: {reason}")]
    ProjectInvalid { path: PathBuf, reason: String },

    #[error("Invalid pass-env pattern '{pattern}': {source}")]
    PassEnvPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    // IO errors
    #[error("IO error: {context}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Directory must be absolute: {0}")]
    RelativeDirectory(PathBuf),

    // Serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    // General errors
    #[error("Internal error: {0}")]
    Internal(String),

    #[error("{0}")]
    User(String),
}

impl ToolscopeError {
    /// Create an IO error with context
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    /// Create a tool-not-found error
    pub fn tool_not_found(name: impl Into<String>, searched: impl Into<String>) -> Self {
        Self::ToolNotFound {
            name: name.into(),
            searched: searched.into(),
        }
    }

    /// Get actionable hint for the error
    pub fn hint(&self) -> Option<&'static str> {
        match self {
            Self::ToolNotFound { .. } => {
                Some("Add a tool_<name>.toml file under the top directory or extend the toolpath")
            }
            Self::ToolNotExported { .. } => {
                Some("Each [[tool]] table must set `name` to the tool being requested")
            }
            Self::ToolCycle { .. } => {
                Some("Remove one of the tools from the other's `requires` list")
            }
            Self::CacheInvalid { .. } => Some("Run: toolscope cache clear"),
            _ => None,
        }
    }
}
