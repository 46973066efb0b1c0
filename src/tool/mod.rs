//! Tools: named customizations applied to environments
//!
//! A tool is resolved once per session through [`resolve::ToolResolver`]
//! and shared by every environment it is applied to. Applying a tool runs
//! it against one environment; tools that must only act once per
//! environment check for their own marker.

pub mod discover;
pub mod host;
pub mod manifest;
pub mod resolve;

use crate::env::Environment;
use crate::error::ToolscopeResult;
use crate::session::BuildSession;
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;

pub use discover::{ToolFileLister, WalkdirLister};
pub use host::{BuiltinHostTools, HostTools};
pub use manifest::{ManifestLoader, ManifestTool, ToolFileLoader};
pub use resolve::ToolResolver;

/// Keyword parameters given when a tool is requested
pub type ToolParams = BTreeMap<String, String>;

/// A customization applied to build environments
#[async_trait]
pub trait Tool: Send + Sync {
    /// Name the tool was published under
    fn name(&self) -> &str;

    /// Apply the tool to `env`
    async fn apply(&self, session: &mut BuildSession, env: &mut Environment) -> ToolscopeResult<()>;
}

/// Shared handle to a resolved tool
pub type SharedTool = Arc<dyn Tool>;

/// Tool built from a plain function over the environment
pub struct FnTool<F> {
    name: String,
    apply: F,
}

impl<F> FnTool<F>
where
    F: Fn(&mut Environment) -> ToolscopeResult<()> + Send + Sync + 'static,
{
    pub fn new(name: impl Into<String>, apply: F) -> Self {
        Self {
            name: name.into(),
            apply,
        }
    }

    /// Wrap in a [`SharedTool`]
    pub fn shared(name: impl Into<String>, apply: F) -> SharedTool {
        Arc::new(Self::new(name, apply))
    }
}

#[async_trait]
impl<F> Tool for FnTool<F>
where
    F: Fn(&mut Environment) -> ToolscopeResult<()> + Send + Sync + 'static,
{
    fn name(&self) -> &str {
        &self.name
    }

    async fn apply(&self, _session: &mut BuildSession, env: &mut Environment) -> ToolscopeResult<()> {
        (self.apply)(env)
    }
}

/// Tools explicitly published under a name, consulted before any search
#[derive(Default)]
pub struct ExportTable {
    tools: HashMap<String, SharedTool>,
}

impl ExportTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Publish `tool` under `name`, replacing any earlier export
    pub fn export(&mut self, name: impl Into<String>, tool: SharedTool) {
        self.tools.insert(name.into(), tool);
    }

    pub fn get(&self, name: &str) -> Option<SharedTool> {
        self.tools.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.tools.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

impl fmt::Debug for ExportTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.names()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn export_table_replaces_by_name() {
        let mut exports = ExportTable::new();
        let first = FnTool::shared("x", |_env: &mut Environment| Ok(()));
        let second = FnTool::shared("x", |_env: &mut Environment| Ok(()));

        exports.export("x", first);
        exports.export("x", second.clone());

        assert!(Arc::ptr_eq(&exports.get("x").unwrap(), &second));
        assert_eq!(exports.names(), vec!["x"]);
        assert!(exports.get("y").is_none());
    }
}
