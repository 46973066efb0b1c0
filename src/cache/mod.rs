//! Persistent tool cache
//!
//! A flat string key/value store kept in a TOML file (`tools.cache` by
//! default) so that expensive discovery work survives across invocations:
//!
//! | Key | Value |
//! |-----|-------|
//! | `default_tool_names` | platform default tool names, newline-joined |
//! | `tool_files` | discovered `tool_*.toml` paths, newline-joined |
//! | `probe_*` | probe results encoded as `<status>,<output>` |
//!
//! The file is read at most once per cache instance and rewritten after
//! every store. Two processes sharing one cache file are not coordinated;
//! the last writer wins.

use crate::error::{ToolscopeError, ToolscopeResult};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Key for the platform default tool names
pub const DEFAULT_TOOL_NAMES_KEY: &str = "default_tool_names";

/// Key for the discovered tool file list
pub const TOOL_FILES_KEY: &str = "tool_files";

/// Key/value cache, optionally backed by a file
#[derive(Debug, Default)]
pub struct ToolCache {
    path: Option<PathBuf>,
    values: BTreeMap<String, String>,
    loaded: bool,
}

impl ToolCache {
    /// In-memory cache that never touches the filesystem
    pub fn disabled() -> Self {
        Self {
            path: None,
            values: BTreeMap::new(),
            loaded: true,
        }
    }

    /// Cache backed by `path`. The file is read lazily on first access.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        Self {
            path: Some(path.into()),
            values: BTreeMap::new(),
            loaded: false,
        }
    }

    /// Backing file, if persistence is enabled
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Whether stored values survive the process
    pub fn is_persistent(&self) -> bool {
        self.path.is_some()
    }

    /// Look up a cached value
    pub fn lookup(&mut self, name: &str) -> ToolscopeResult<Option<String>> {
        self.ensure_loaded()?;
        let value = self.values.get(name).cloned();
        match &value {
            Some(v) => debug!("returning {} cached value: {}", name, v),
            None => debug!("no value cached for {}", name),
        }
        Ok(value)
    }

    /// Store a value and rewrite the backing file
    pub fn store(&mut self, name: &str, value: impl Into<String>) -> ToolscopeResult<()> {
        self.ensure_loaded()?;
        let value = value.into();
        debug!("Updated {} to value: {}", name, value);
        self.values.insert(name.to_string(), value);
        self.save()
    }

    /// All cached entries
    pub fn entries(&mut self) -> ToolscopeResult<&BTreeMap<String, String>> {
        self.ensure_loaded()?;
        Ok(&self.values)
    }

    /// Drop every entry, removing the backing file
    pub fn clear(&mut self) -> ToolscopeResult<()> {
        self.values.clear();
        self.loaded = true;
        if let Some(path) = &self.path {
            if path.exists() {
                std::fs::remove_file(path).map_err(|e| {
                    ToolscopeError::io(format!("removing tool cache {}", path.display()), e)
                })?;
            }
        }
        Ok(())
    }

    fn ensure_loaded(&mut self) -> ToolscopeResult<()> {
        if self.loaded {
            return Ok(());
        }
        self.loaded = true;

        let Some(path) = &self.path else {
            return Ok(());
        };
        if !path.exists() {
            debug!("Tool cache {} does not exist yet", path.display());
            return Ok(());
        }

        let content = std::fs::read_to_string(path)
            .map_err(|e| ToolscopeError::io(format!("reading tool cache {}", path.display()), e))?;
        self.values = toml::from_str(&content).map_err(|e| ToolscopeError::CacheInvalid {
            path: path.clone(),
            reason: e.to_string(),
        })?;
        debug!("Loaded {} entries from {}", self.values.len(), path.display());
        Ok(())
    }

    fn save(&self) -> ToolscopeResult<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                ToolscopeError::io(format!("creating cache directory {}", parent.display()), e)
            })?;
        }

        let content = toml::to_string(&self.values)?;
        std::fs::write(path, content)
            .map_err(|e| ToolscopeError::io(format!("writing tool cache {}", path.display()), e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn disabled_cache_keeps_values_in_memory() {
        let mut cache = ToolCache::disabled();
        cache.store("a", "1").unwrap();

        assert!(!cache.is_persistent());
        assert_eq!(cache.lookup("a").unwrap().as_deref(), Some("1"));
        assert!(cache.lookup("b").unwrap().is_none());
    }

    #[test]
    fn values_survive_reopen() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("tools.cache");

        let mut cache = ToolCache::open(&path);
        cache.store(TOOL_FILES_KEY, "/a/tool_x.toml\n/b/tool_y.toml").unwrap();
        cache.store("probe_x", "0,-I/usr/include/x").unwrap();

        let mut reopened = ToolCache::open(&path);
        assert_eq!(
            reopened.lookup(TOOL_FILES_KEY).unwrap().as_deref(),
            Some("/a/tool_x.toml\n/b/tool_y.toml")
        );
        assert_eq!(reopened.entries().unwrap().len(), 2);
    }

    #[test]
    fn file_is_read_once() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("tools.cache");
        std::fs::write(&path, "k = \"v\"\n").unwrap();

        let mut cache = ToolCache::open(&path);
        assert_eq!(cache.lookup("k").unwrap().as_deref(), Some("v"));

        // Later edits by another process are not observed
        std::fs::write(&path, "k = \"changed\"\n").unwrap();
        assert_eq!(cache.lookup("k").unwrap().as_deref(), Some("v"));
    }

    #[test]
    fn corrupt_file_is_an_error() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("tools.cache");
        std::fs::write(&path, "not = [valid").unwrap();

        let err = ToolCache::open(&path).lookup("k").unwrap_err();
        assert!(matches!(err, ToolscopeError::CacheInvalid { .. }));
    }

    #[test]
    fn clear_removes_file() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("tools.cache");
        let mut cache = ToolCache::open(&path);
        cache.store("k", "v").unwrap();
        assert!(path.exists());

        cache.clear().unwrap();
        assert!(!path.exists());
        assert!(cache.lookup("k").unwrap().is_none());
    }
}
