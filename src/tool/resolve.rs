//! Tool resolution
//!
//! Resolves a tool name to a shared tool object. First match wins:
//! 1. Session tool cache (skipped when parameters are given)
//! 2. Export table
//! 3. `tool_<name>.toml` under the top directory
//! 4. Host tools (toolpath files, then builtins)
//!
//! Tools resolved without parameters are cached for the rest of the
//! session, so every environment requesting the same name shares one
//! object.

use super::discover::{matching_files, ToolFileLister, WalkdirLister};
use super::host::{BuiltinHostTools, HostTools};
use super::manifest::{ManifestLoader, ToolFileLoader};
use super::{ExportTable, SharedTool, ToolParams};
use crate::cache::{ToolCache, TOOL_FILES_KEY};
use crate::env::Environment;
use crate::error::{ToolscopeError, ToolscopeResult};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Session-wide tool resolver
pub struct ToolResolver {
    cache: HashMap<String, SharedTool>,
    exports: ExportTable,
    tool_files: Option<Vec<PathBuf>>,
    lister: Box<dyn ToolFileLister>,
    loader: Box<dyn ToolFileLoader>,
    host: Box<dyn HostTools>,
}

impl Default for ToolResolver {
    fn default() -> Self {
        Self::new(
            Box::new(WalkdirLister),
            Box::new(ManifestLoader),
            Box::new(BuiltinHostTools),
        )
    }
}

impl ToolResolver {
    pub fn new(
        lister: Box<dyn ToolFileLister>,
        loader: Box<dyn ToolFileLoader>,
        host: Box<dyn HostTools>,
    ) -> Self {
        Self {
            cache: HashMap::new(),
            exports: ExportTable::new(),
            tool_files: None,
            lister,
            loader,
            host,
        }
    }

    pub fn set_lister(&mut self, lister: Box<dyn ToolFileLister>) {
        self.lister = lister;
        self.tool_files = None;
    }

    pub fn set_loader(&mut self, loader: Box<dyn ToolFileLoader>) {
        self.loader = loader;
    }

    pub fn set_host(&mut self, host: Box<dyn HostTools>) {
        self.host = host;
    }

    pub fn host(&self) -> &dyn HostTools {
        self.host.as_ref()
    }

    pub fn exports(&self) -> &ExportTable {
        &self.exports
    }

    pub fn exports_mut(&mut self) -> &mut ExportTable {
        &mut self.exports
    }

    /// True if `name` has already been resolved without parameters
    pub fn is_cached(&self, name: &str) -> bool {
        self.cache.contains_key(name)
    }

    /// Resolve `name` for `env`.
    ///
    /// `toolpath` overrides the environment's toolpath for the host
    /// loader; relative entries are taken from the environment's directory.
    pub fn resolve(
        &mut self,
        store: &mut ToolCache,
        env: &Environment,
        name: &str,
        toolpath: Option<&[PathBuf]>,
        params: &ToolParams,
    ) -> ToolscopeResult<SharedTool> {
        if params.is_empty() {
            if let Some(tool) = self.cache.get(name) {
                return Ok(tool.clone());
            }
        }

        let tool = match self.find(store, env, name, toolpath, params)? {
            Some(tool) => tool,
            None => {
                return Err(ToolscopeError::tool_not_found(
                    name,
                    format!(
                        "exports, tool files under {}, toolpath, builtin tools",
                        env.top().display()
                    ),
                ))
            }
        };

        if params.is_empty() {
            self.cache.insert(name.to_string(), tool.clone());
        }
        Ok(tool)
    }

    fn find(
        &mut self,
        store: &mut ToolCache,
        env: &Environment,
        name: &str,
        toolpath: Option<&[PathBuf]>,
        params: &ToolParams,
    ) -> ToolscopeResult<Option<SharedTool>> {
        if let Some(tool) = self.exports.get(name) {
            debug!("Tool {} found in exports", name);
            return Ok(Some(tool));
        }

        let matches: Vec<PathBuf> = matching_files(self.tool_files(store, env.top())?, name)
            .into_iter()
            .cloned()
            .collect();
        if let Some(first) = matches.first() {
            if matches.len() > 1 {
                let others: Vec<String> = matches[1..]
                    .iter()
                    .map(|p| p.display().to_string())
                    .collect();
                warn!(
                    "Tool {} is defined by several files, using {} (ignoring {})",
                    name,
                    first.display(),
                    others.join(", ")
                );
            }

            debug!("Loading tool {} from {}", name, first.display());
            self.loader.load(first, &mut self.exports)?;
            return match self.exports.get(name) {
                Some(tool) => Ok(Some(tool)),
                None => Err(ToolscopeError::ToolNotExported {
                    name: name.to_string(),
                    file: first.clone(),
                }),
            };
        }

        let toolpath: Vec<PathBuf> = match toolpath {
            Some(dirs) => dirs.iter().map(|d| env.resolve_dir(d)).collect(),
            None => env.toolpath.iter().map(|d| env.resolve_dir(d)).collect(),
        };
        debug!("Loading tool {} from host, toolpath {:?}", name, toolpath);
        self.host.load(name, &toolpath, params)
    }

    /// Tool files under `root`, listed once per resolver. A persistent
    /// store keeps the list across sessions.
    pub fn tool_files(&mut self, store: &mut ToolCache, root: &Path) -> ToolscopeResult<&[PathBuf]> {
        if self.tool_files.is_none() {
            let files = match store.lookup(TOOL_FILES_KEY)? {
                Some(cached) => {
                    info!("Using cached tool file list");
                    cached
                        .lines()
                        .filter(|l| !l.is_empty())
                        .map(PathBuf::from)
                        .collect()
                }
                None => {
                    info!("Searching {} for tool files", root.display());
                    let files = self.lister.list(root)?;
                    let joined: Vec<String> =
                        files.iter().map(|f| f.display().to_string()).collect();
                    store.store(TOOL_FILES_KEY, joined.join("\n"))?;
                    files
                }
            };
            self.tool_files = Some(files);
        }
        Ok(self.tool_files.as_deref().unwrap_or_default())
    }
}

impl std::fmt::Debug for ToolResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut cached: Vec<&str> = self.cache.keys().map(String::as_str).collect();
        cached.sort_unstable();
        f.debug_struct("ToolResolver")
            .field("cached", &cached)
            .field("exports", &self.exports)
            .field("tool_files", &self.tool_files)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tool::FnTool;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct FixedLister {
        files: Vec<PathBuf>,
        calls: Arc<AtomicUsize>,
    }

    impl ToolFileLister for FixedLister {
        fn list(&self, _root: &Path) -> ToolscopeResult<Vec<PathBuf>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.files.clone())
        }
    }

    struct CountingLoader {
        calls: Arc<AtomicUsize>,
    }

    impl ToolFileLoader for CountingLoader {
        fn load(&self, path: &Path, exports: &mut ExportTable) -> ToolscopeResult<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let name = path
                .file_stem()
                .and_then(|s| s.to_str())
                .and_then(|s| s.strip_prefix("tool_"))
                .unwrap_or_default()
                .to_string();
            if name != "silent" {
                exports.export(name.clone(), FnTool::shared(name, |_env: &mut Environment| Ok(())));
            }
            Ok(())
        }
    }

    struct CountingHost {
        calls: Arc<AtomicUsize>,
    }

    impl HostTools for CountingHost {
        fn default_tool_names(&self, _platform: crate::env::Platform) -> Vec<String> {
            Vec::new()
        }

        fn load(
            &self,
            name: &str,
            _toolpath: &[PathBuf],
            _params: &ToolParams,
        ) -> ToolscopeResult<Option<SharedTool>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if name == "qt" {
                Ok(Some(FnTool::shared("qt", |_env: &mut Environment| Ok(()))))
            } else {
                Ok(None)
            }
        }
    }

    struct Counters {
        lister: Arc<AtomicUsize>,
        loader: Arc<AtomicUsize>,
        host: Arc<AtomicUsize>,
    }

    fn resolver(files: &[&str]) -> (ToolResolver, Counters) {
        let counters = Counters {
            lister: Arc::new(AtomicUsize::new(0)),
            loader: Arc::new(AtomicUsize::new(0)),
            host: Arc::new(AtomicUsize::new(0)),
        };
        let resolver = ToolResolver::new(
            Box::new(FixedLister {
                files: files.iter().map(PathBuf::from).collect(),
                calls: counters.lister.clone(),
            }),
            Box::new(CountingLoader {
                calls: counters.loader.clone(),
            }),
            Box::new(CountingHost {
                calls: counters.host.clone(),
            }),
        );
        (resolver, counters)
    }

    fn env() -> Environment {
        Environment::new("/proj", "app").unwrap()
    }

    #[test]
    fn same_name_resolves_to_same_object() {
        let (mut resolver, counters) = resolver(&["/proj/tools/tool_xmlrpc.toml"]);
        let mut store = ToolCache::disabled();
        let a = env();
        let b = Environment::new("/proj", "lib").unwrap();

        let first = resolver
            .resolve(&mut store, &a, "xmlrpc", None, &ToolParams::new())
            .unwrap();
        let second = resolver
            .resolve(&mut store, &b, "xmlrpc", None, &ToolParams::new())
            .unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(first.name(), "xmlrpc");
        assert_eq!(counters.loader.load(Ordering::SeqCst), 1);
        assert_eq!(counters.lister.load(Ordering::SeqCst), 1);
        assert!(resolver.is_cached("xmlrpc"));
    }

    #[test]
    fn exports_win_over_tool_files() {
        let (mut resolver, counters) = resolver(&["/proj/tool_boost.toml"]);
        let exported = FnTool::shared("boost", |_env: &mut Environment| Ok(()));
        resolver.exports_mut().export("boost", exported.clone());

        let tool = resolver
            .resolve(&mut ToolCache::disabled(), &env(), "boost", None, &ToolParams::new())
            .unwrap();

        assert!(Arc::ptr_eq(&tool, &exported));
        assert_eq!(counters.loader.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn params_bypass_cache() {
        let (mut resolver, counters) = resolver(&[]);
        let mut store = ToolCache::disabled();
        let qt4 = ToolParams::from([("version".to_string(), "4".to_string())]);
        let qt5 = ToolParams::from([("version".to_string(), "5".to_string())]);

        let first = resolver.resolve(&mut store, &env(), "qt", None, &qt4).unwrap();
        let second = resolver.resolve(&mut store, &env(), "qt", None, &qt5).unwrap();

        assert_eq!(counters.host.load(Ordering::SeqCst), 2);
        assert!(!Arc::ptr_eq(&first, &second));
        assert!(!resolver.is_cached("qt"));
    }

    #[test]
    fn first_of_several_files_is_loaded() {
        let (mut resolver, counters) =
            resolver(&["/proj/a/tool_dup.toml", "/proj/b/tool_dup.toml"]);
        resolver
            .resolve(&mut ToolCache::disabled(), &env(), "dup", None, &ToolParams::new())
            .unwrap();
        assert_eq!(counters.loader.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn file_that_does_not_export_errors() {
        let (mut resolver, _) = resolver(&["/proj/tool_silent.toml"]);
        let err = resolver
            .resolve(&mut ToolCache::disabled(), &env(), "silent", None, &ToolParams::new())
            .err()
            .unwrap();
        assert!(matches!(err, ToolscopeError::ToolNotExported { .. }));
    }

    #[test]
    fn unknown_tool_not_found() {
        let (mut resolver, counters) = resolver(&[]);
        let err = resolver
            .resolve(&mut ToolCache::disabled(), &env(), "nope", None, &ToolParams::new())
            .err()
            .unwrap();
        assert!(matches!(err, ToolscopeError::ToolNotFound { .. }));
        assert_eq!(counters.host.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn tool_file_list_persists_across_resolvers() {
        let temp = tempfile::TempDir::new().unwrap();
        let cache_file = temp.path().join("tools.cache");

        let (mut first, first_counters) = resolver(&["/proj/tool_xmlrpc.toml"]);
        let mut store = ToolCache::open(&cache_file);
        first.tool_files(&mut store, Path::new("/proj")).unwrap();
        assert_eq!(first_counters.lister.load(Ordering::SeqCst), 1);

        let (mut second, second_counters) = resolver(&[]);
        let mut reopened = ToolCache::open(&cache_file);
        let files = second
            .tool_files(&mut reopened, Path::new("/proj"))
            .unwrap()
            .to_vec();

        assert_eq!(files, vec![PathBuf::from("/proj/tool_xmlrpc.toml")]);
        assert_eq!(second_counters.lister.load(Ordering::SeqCst), 0);
    }
}
