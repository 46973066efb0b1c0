//! Configuration schema for toolscope
//!
//! Configuration is stored at `{top}/toolscope.toml`

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Root configuration structure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Enable debug messages from the registries and caches
    pub debug: bool,

    /// Enable the persistent tool cache
    pub cache: bool,

    /// Tool cache file, relative to the top directory unless absolute
    pub cache_file: PathBuf,

    /// Declared configuration values copied into every generated environment
    pub variables: BTreeMap<String, String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            debug: false,
            cache: false,
            cache_file: PathBuf::from("tools.cache"),
            variables: BTreeMap::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_disable_cache_and_debug() {
        let config = Config::default();
        assert!(!config.debug);
        assert!(!config.cache);
        assert_eq!(config.cache_file, PathBuf::from("tools.cache"));
    }

    #[test]
    fn partial_file_keeps_defaults() {
        let config: Config = toml::from_str("cache = true\n[variables]\nOPT_PREFIX = \"/opt/local\"\n")
            .unwrap();
        assert!(config.cache);
        assert!(!config.debug);
        assert_eq!(config.variables["OPT_PREFIX"], "/opt/local");
    }
}
