//! Global and local build targets
//!
//! A build output registered under a symbolic name can be looked up from
//! any other directory of the same session. Every environment keeps its own
//! local map which is consulted before the session-wide one. Both maps are
//! write-once per name: the first registration wins and later attempts are
//! reported on the debug channel and dropped.

use crate::env::Environment;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

/// Prefix reserved for library targets
pub const LIBRARY_PREFIX: &str = "lib";

/// Handle to a build output owned by the host's output graph
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Node {
    path: PathBuf,
}

impl Node {
    /// Create a node for an absolute output path
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Absolute path of the output
    pub fn abspath(&self) -> &Path {
        &self.path
    }

    /// Directory containing the output
    pub fn dir(&self) -> &Path {
        self.path.parent().unwrap_or(Path::new("/"))
    }

    /// File name of the output
    pub fn name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.path.display())
    }
}

/// An entry in an environment's link list
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LibraryRef {
    /// Link by bare library name, found through the link search path
    Name(String),

    /// Link against a registered build output
    Node(Node),
}

impl fmt::Display for LibraryRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Name(name) => write!(f, "{}", name),
            Self::Node(node) => write!(f, "{}", node),
        }
    }
}

/// Write-once mapping from target name to node
#[derive(Debug, Default, Clone)]
pub struct TargetMap {
    targets: BTreeMap<String, Node>,
}

impl TargetMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `name` if it is unbound. Returns the existing node otherwise.
    pub fn bind(&mut self, name: &str, node: &Node) -> Result<(), &Node> {
        if self.targets.contains_key(name) {
            return Err(&self.targets[name]);
        }
        self.targets.insert(name.to_string(), node.clone());
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&Node> {
        self.targets.get(name)
    }

    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Node)> {
        self.targets.iter()
    }
}

/// Register `target` under `name` in both the global and the local map.
///
/// Only the first node of `target` is registered. Each map keeps its first
/// binding, so a name already bound globally still binds locally the first
/// time this environment registers it.
pub fn register(
    global: &mut TargetMap,
    env: &mut Environment,
    name: &str,
    target: &[Node],
) -> Option<Node> {
    let Some(node) = target.first().cloned() else {
        env.log_debug(format!("register({}): no target node given", name));
        return None;
    };

    match global.bind(name, &node) {
        Ok(()) => env.log_debug(format!("global target: {}={}", name, node)),
        Err(existing) => env.log_debug(format!(
            "{} global target already set to {}, not changed to {}.",
            name, existing, node
        )),
    }

    let message = match env.local_targets_mut().bind(name, &node) {
        Ok(()) => format!("local target: {}={}", name, node),
        Err(existing) => format!(
            "{} local target already set to {}, not changed to {}.",
            name, existing, node
        ),
    };
    env.log_debug(message);

    Some(node)
}

/// Look up a target, local map first
pub fn lookup(global: &TargetMap, env: &Environment, name: &str) -> Option<Node> {
    env.local_targets()
        .get(name)
        .or_else(|| global.get(name))
        .cloned()
}

/// Target name reserved for the library `base`
pub fn library_target_name(base: &str) -> String {
    format!("{}{}", LIBRARY_PREFIX, base)
}

/// Register a library output under `lib<base>`
pub fn register_library(
    global: &mut TargetMap,
    env: &mut Environment,
    base: &str,
    target: &[Node],
) -> Option<Node> {
    register(global, env, &library_target_name(base), target)
}

/// Link against library `name`.
///
/// A registered `lib<name>` target is linked as a node, so the library may
/// come from any directory of the session. Otherwise the bare name is
/// linked and `path`, if given, joins the link search path.
pub fn append_library(
    global: &TargetMap,
    env: &mut Environment,
    name: &str,
    path: Option<&Path>,
) {
    env.log_debug(format!("append_library looking for {}", name));
    env.deploy_shared_libs.push(name.to_string());

    match lookup(global, env, &library_target_name(name)) {
        Some(node) => {
            env.log_debug(format!("appending library node: {}", node));
            env.libs.push(LibraryRef::Node(node));
        }
        None => {
            env.libs.push(LibraryRef::Name(name.to_string()));
            if let Some(path) = path {
                env.libpath.push(path.to_path_buf());
            }
        }
    }
}

/// Link against shared library `name` by name.
///
/// The search directory is `path`, or else the directory of a registered
/// `lib<name>` target. It is added to both the link and runtime paths.
pub fn append_shared_library(
    global: &TargetMap,
    env: &mut Environment,
    name: &str,
    path: Option<&Path>,
) {
    env.deploy_shared_libs.push(name.to_string());
    let target = lookup(global, env, &library_target_name(name));
    env.log_debug(format!(
        "appending shared library node: {}",
        target.as_ref().map(ToString::to_string).unwrap_or_else(|| "None".into())
    ));

    let path = path
        .map(Path::to_path_buf)
        .or_else(|| target.as_ref().map(|t| t.dir().to_path_buf()));

    env.libs.push(LibraryRef::Name(name.to_string()));
    if let Some(path) = path {
        crate::env::append_unique(&mut env.libpath, [path.clone()]);
        crate::env::append_unique(&mut env.rpath, [path]);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn env_at(dir: &str) -> Environment {
        Environment::new("/proj", dir).unwrap()
    }

    #[test]
    fn first_registration_wins() {
        let mut global = TargetMap::new();
        let mut env = env_at("a");
        let a = Node::new("/proj/a/libfoo.a");
        let b = Node::new("/proj/b/libfoo.a");

        register(&mut global, &mut env, "libfoo", &[a.clone()]);
        register(&mut global, &mut env, "libfoo", &[b]);

        assert_eq!(lookup(&global, &env, "libfoo"), Some(a.clone()));
        assert_eq!(global.get("libfoo"), Some(&a));
        assert_eq!(global.len(), 1);
    }

    #[test]
    fn local_binding_shadows_global() {
        let mut global = TargetMap::new();
        let mut first = env_at("a");
        let mut second = env_at("b");
        let a = Node::new("/proj/a/libfoo.a");
        let b = Node::new("/proj/b/libfoo.a");

        register(&mut global, &mut first, "libfoo", &[a.clone()]);
        register(&mut global, &mut second, "libfoo", &[b.clone()]);

        assert_eq!(lookup(&global, &first, "libfoo"), Some(a.clone()));
        assert_eq!(lookup(&global, &second, "libfoo"), Some(b));
        assert_eq!(lookup(&global, &env_at("c"), "libfoo"), Some(a));
    }

    #[test]
    fn lookup_missing_is_none() {
        let global = TargetMap::new();
        assert!(lookup(&global, &env_at("a"), "libnothing").is_none());
    }

    #[test]
    fn empty_target_registers_nothing() {
        let mut global = TargetMap::new();
        let mut env = env_at("a");
        assert!(register(&mut global, &mut env, "libfoo", &[]).is_none());
        assert!(global.is_empty());
    }

    #[test]
    fn append_library_prefers_registered_node() {
        let mut global = TargetMap::new();
        let mut producer = env_at("lib");
        let node = Node::new("/proj/lib/libfoo.a");
        register_library(&mut global, &mut producer, "foo", &[node.clone()]);

        let mut consumer = env_at("app");
        append_library(&global, &mut consumer, "foo", Some(Path::new("/opt/lib")));

        assert_eq!(consumer.libs, vec![LibraryRef::Node(node)]);
        assert!(consumer.libpath.is_empty());
        assert_eq!(consumer.deploy_shared_libs, vec!["foo".to_string()]);
    }

    #[test]
    fn append_library_falls_back_to_name_and_path() {
        let global = TargetMap::new();
        let mut env = env_at("app");
        append_library(&global, &mut env, "xml2", Some(Path::new("/opt/lib")));

        assert_eq!(env.libs, vec![LibraryRef::Name("xml2".into())]);
        assert_eq!(env.libpath, vec![PathBuf::from("/opt/lib")]);
    }

    #[test]
    fn append_shared_library_uses_target_dir() {
        let mut global = TargetMap::new();
        let mut producer = env_at("util");
        register_library(
            &mut global,
            &mut producer,
            "util",
            &[Node::new("/proj/util/libutil.so")],
        );

        let mut env = env_at("app");
        append_shared_library(&global, &mut env, "util", None);
        append_shared_library(&global, &mut env, "util", None);

        assert_eq!(env.libpath, vec![PathBuf::from("/proj/util")]);
        assert_eq!(env.rpath, vec![PathBuf::from("/proj/util")]);
        assert_eq!(env.libs.len(), 2);
    }
}
