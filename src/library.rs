//! Library builders
//!
//! [`ArchiveBuilder`] stands in for the host's static and shared library
//! builders: it names the output and records a [`BuildStep`].
//! [`RegisteringLibraryBuilder`] wraps any builder so that every library
//! built with an explicit target name is also registered as `lib<name>` in
//! the session's global targets and the environment's local targets.

use crate::env::{BuildStep, Environment, Platform};
use crate::error::{ToolscopeError, ToolscopeResult};
use crate::targets::{self, Node, TargetMap};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

/// Kind of library a builder produces
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LibraryKind {
    Static,
    Shared,
}

impl LibraryKind {
    fn builder_name(&self) -> &'static str {
        match self {
            Self::Static => "StaticLibrary",
            Self::Shared => "SharedLibrary",
        }
    }

    fn file_name(&self, platform: Platform, base: &str) -> String {
        match (self, platform) {
            (Self::Static, _) => format!("lib{}.a", base),
            (Self::Shared, Platform::Darwin) => format!("lib{}.dylib", base),
            (Self::Shared, Platform::Win32) => format!("{}.dll", base),
            (Self::Shared, Platform::Posix) => format!("lib{}.so", base),
        }
    }
}

/// Produces library outputs in an environment
pub trait LibraryBuilder: Send + Sync {
    fn kind(&self) -> LibraryKind;

    /// Build `target` from `sources`, returning the output nodes.
    /// Without a target name the first source's stem is used.
    fn build(
        &self,
        targets: &mut TargetMap,
        env: &mut Environment,
        target: Option<&str>,
        sources: &[PathBuf],
    ) -> ToolscopeResult<Vec<Node>>;
}

/// Builder that names the output after the target and records the step
#[derive(Debug, Clone, Copy)]
pub struct ArchiveBuilder {
    kind: LibraryKind,
}

impl ArchiveBuilder {
    pub fn new(kind: LibraryKind) -> Self {
        Self { kind }
    }
}

impl LibraryBuilder for ArchiveBuilder {
    fn kind(&self) -> LibraryKind {
        self.kind
    }

    fn build(
        &self,
        _targets: &mut TargetMap,
        env: &mut Environment,
        target: Option<&str>,
        sources: &[PathBuf],
    ) -> ToolscopeResult<Vec<Node>> {
        let base = match target {
            Some(name) => name.to_string(),
            None => sources
                .first()
                .and_then(|s| s.file_stem())
                .map(|s| s.to_string_lossy().into_owned())
                .ok_or_else(|| {
                    ToolscopeError::User(format!(
                        "{} needs a target name or at least one source",
                        self.kind.builder_name()
                    ))
                })?,
        };

        let node = Node::new(env.dir().join(self.kind.file_name(env.platform(), &base)));
        let sources: Vec<PathBuf> = sources.iter().map(|s| env.resolve_dir(s)).collect();

        env.record_step(BuildStep {
            builder: self.kind.builder_name(),
            targets: vec![node.clone()],
            sources,
        });

        Ok(vec![node])
    }
}

/// Decorator registering every explicitly named library it builds
pub struct RegisteringLibraryBuilder {
    inner: Arc<dyn LibraryBuilder>,
}

impl RegisteringLibraryBuilder {
    pub fn new(inner: Arc<dyn LibraryBuilder>) -> Self {
        Self { inner }
    }
}

impl LibraryBuilder for RegisteringLibraryBuilder {
    fn kind(&self) -> LibraryKind {
        self.inner.kind()
    }

    fn build(
        &self,
        targets: &mut TargetMap,
        env: &mut Environment,
        target: Option<&str>,
        sources: &[PathBuf],
    ) -> ToolscopeResult<Vec<Node>> {
        env.log_debug(format!("library builder called for target({:?})", target));
        let nodes = self.inner.build(targets, env, target, sources)?;

        match target {
            Some(name) => {
                targets::register_library(targets, env, name, &nodes);
            }
            None => env.log_debug("library built without a target name, not registered"),
        }

        Ok(nodes)
    }
}

/// Static and shared library builders installed on an environment
#[derive(Clone)]
pub struct LibraryBuilders {
    pub static_lib: Arc<dyn LibraryBuilder>,
    pub shared_lib: Arc<dyn LibraryBuilder>,
}

impl LibraryBuilders {
    /// Plain builders wrapped in [`RegisteringLibraryBuilder`]
    pub fn registering() -> Self {
        let plain = Self::default();
        Self {
            static_lib: Arc::new(RegisteringLibraryBuilder::new(plain.static_lib)),
            shared_lib: Arc::new(RegisteringLibraryBuilder::new(plain.shared_lib)),
        }
    }
}

impl Default for LibraryBuilders {
    fn default() -> Self {
        Self {
            static_lib: Arc::new(ArchiveBuilder::new(LibraryKind::Static)),
            shared_lib: Arc::new(ArchiveBuilder::new(LibraryKind::Shared)),
        }
    }
}

impl fmt::Debug for LibraryBuilders {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LibraryBuilders")
            .field("static_lib", &self.static_lib.kind())
            .field("shared_lib", &self.shared_lib.kind())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn env(dir: &str) -> Environment {
        Environment::new("/proj", dir)
            .unwrap()
            .with_platform(Platform::Posix)
    }

    #[test]
    fn wrapper_matches_plain_builder_output() {
        let mut targets = TargetMap::new();
        let sources = [PathBuf::from("a.c"), PathBuf::from("b.c")];

        let mut plain_env = env("util");
        let plain = ArchiveBuilder::new(LibraryKind::Static)
            .build(&mut targets, &mut plain_env, Some("util"), &sources)
            .unwrap();

        let mut wrapped_env = env("util");
        let wrapped = LibraryBuilders::registering()
            .static_lib
            .build(&mut targets, &mut wrapped_env, Some("util"), &sources)
            .unwrap();

        assert_eq!(plain, wrapped);
        assert_eq!(plain_env.steps(), wrapped_env.steps());
        assert_eq!(plain[0].abspath(), PathBuf::from("/proj/util/libutil.a"));
        assert_eq!(
            wrapped_env.steps()[0].sources,
            vec![PathBuf::from("/proj/util/a.c"), PathBuf::from("/proj/util/b.c")]
        );
    }

    #[test]
    fn wrapper_registers_named_library() {
        let mut targets = TargetMap::new();
        let mut env = env("util");
        let nodes = LibraryBuilders::registering()
            .shared_lib
            .build(&mut targets, &mut env, Some("util"), &[PathBuf::from("u.c")])
            .unwrap();

        assert_eq!(targets.get("libutil"), Some(&nodes[0]));
        assert_eq!(env.local_targets().get("libutil"), Some(&nodes[0]));
        assert_eq!(nodes[0].name(), "libutil.so");
    }

    #[test]
    fn unnamed_library_is_not_registered() {
        let mut targets = TargetMap::new();
        let mut env = env("util");
        let nodes = LibraryBuilders::registering()
            .static_lib
            .build(&mut targets, &mut env, None, &[PathBuf::from("src/codec.c")])
            .unwrap();

        assert_eq!(nodes[0].name(), "libcodec.a");
        assert!(targets.is_empty());
    }

    #[test]
    fn plain_builder_does_not_register() {
        let mut targets = TargetMap::new();
        let mut env = env("util");
        LibraryBuilders::default()
            .static_lib
            .build(&mut targets, &mut env, Some("util"), &[PathBuf::from("u.c")])
            .unwrap();
        assert!(targets.is_empty());
    }

    #[test]
    fn no_name_and_no_sources_errors() {
        let mut targets = TargetMap::new();
        let mut env = env("util");
        assert!(ArchiveBuilder::new(LibraryKind::Static)
            .build(&mut targets, &mut env, None, &[])
            .is_err());
    }
}
