//! Declarative tool files
//!
//! A tool file holds one or more `[[tool]]` tables. Loading the file
//! publishes each table in the export table under its `name`:
//!
//! ```toml
//! [[tool]]
//! name = "xmlrpc"
//! requires = ["xercesc"]
//! cpppath = ["$OPT_PREFIX/include/xmlrpcpp"]
//! libpath = ["$OPT_PREFIX/lib"]
//! libs = ["xmlrpcpp"]
//! probes = ["pkg-config --cflags --libs xmlrpcpp"]
//! ```
//!
//! String values are expanded with [`Environment::subst`] when applied.

use super::{ExportTable, Tool};
use crate::env::{append_unique, Environment};
use crate::error::{ToolscopeError, ToolscopeResult};
use crate::session::BuildSession;
use crate::targets::LibraryRef;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// One `[[tool]]` table
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ToolSpec {
    /// Name the tool is exported under
    pub name: String,

    /// Tools applied before this one
    pub requires: Vec<String>,

    /// Construction variables, set before anything else is expanded
    pub vars: BTreeMap<String, String>,

    /// Execution environment entries for spawned commands
    pub env: BTreeMap<String, String>,

    pub cpppath: Vec<String>,
    pub cppdefines: Vec<String>,
    pub ccflags: Vec<String>,
    pub linkflags: Vec<String>,
    pub libpath: Vec<String>,
    pub libs: Vec<String>,
    pub rpath: Vec<String>,

    /// Libraries linked through the global targets, by base name
    pub libraries: Vec<String>,

    /// Probe command lines whose flags are merged when they succeed
    pub probes: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct ToolFile {
    tool: Vec<ToolSpec>,
}

/// Parse tool file content. Every table must be named.
pub fn parse_tool_file(path: &Path, content: &str) -> ToolscopeResult<Vec<ToolSpec>> {
    let file: ToolFile = toml::from_str(content).map_err(|e| ToolscopeError::ToolFileInvalid {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;

    if let Some(index) = file.tool.iter().position(|t| t.name.trim().is_empty()) {
        return Err(ToolscopeError::ToolFileInvalid {
            path: path.to_path_buf(),
            reason: format!("[[tool]] table {} has no name", index + 1),
        });
    }

    Ok(file.tool)
}

/// Read and parse a tool file
pub fn read_tool_file(path: &Path) -> ToolscopeResult<Vec<ToolSpec>> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| ToolscopeError::io(format!("reading tool file {}", path.display()), e))?;
    parse_tool_file(path, &content)
}

/// Loads a tool file, publishing what it defines in the export table
pub trait ToolFileLoader: Send + Sync {
    fn load(&self, path: &Path, exports: &mut ExportTable) -> ToolscopeResult<()>;
}

/// Loader for TOML tool files
#[derive(Debug, Default, Clone, Copy)]
pub struct ManifestLoader;

impl ToolFileLoader for ManifestLoader {
    fn load(&self, path: &Path, exports: &mut ExportTable) -> ToolscopeResult<()> {
        for spec in read_tool_file(path)? {
            let name = spec.name.clone();
            exports.export(name, Arc::new(ManifestTool::new(spec, path)));
        }
        Ok(())
    }
}

/// Tool defined by a `[[tool]]` table
#[derive(Debug, Clone)]
pub struct ManifestTool {
    spec: ToolSpec,
    source: PathBuf,
}

impl ManifestTool {
    pub fn new(spec: ToolSpec, source: impl Into<PathBuf>) -> Self {
        Self {
            spec,
            source: source.into(),
        }
    }

    pub fn spec(&self) -> &ToolSpec {
        &self.spec
    }

    /// File the tool was loaded from
    pub fn source(&self) -> &Path {
        &self.source
    }

    fn expand(env: &Environment, values: &[String]) -> Vec<String> {
        values
            .iter()
            .map(|v| env.subst(v))
            .filter(|v| !v.is_empty())
            .collect()
    }

    fn expand_dirs(env: &Environment, values: &[String]) -> Vec<PathBuf> {
        Self::expand(env, values)
            .into_iter()
            .map(|v| env.resolve_dir(Path::new(&v)))
            .collect()
    }
}

#[async_trait]
impl Tool for ManifestTool {
    fn name(&self) -> &str {
        &self.spec.name
    }

    async fn apply(&self, session: &mut BuildSession, env: &mut Environment) -> ToolscopeResult<()> {
        let spec = &self.spec;

        for (name, value) in &spec.vars {
            let value = env.subst(value);
            env.set(name.clone(), value);
        }

        if !spec.requires.is_empty() {
            let requires: Vec<&str> = spec.requires.iter().map(String::as_str).collect();
            session.require(env, &requires).await?;
        }

        for (name, value) in &spec.env {
            let value = env.subst(value);
            env.exec_env.insert(name.clone(), value);
        }

        let cpppath = Self::expand_dirs(env, &spec.cpppath);
        let libpath = Self::expand_dirs(env, &spec.libpath);
        let rpath = Self::expand_dirs(env, &spec.rpath);
        let cppdefines = Self::expand(env, &spec.cppdefines);
        let ccflags = Self::expand(env, &spec.ccflags);
        let linkflags = Self::expand(env, &spec.linkflags);
        let libs = Self::expand(env, &spec.libs);

        append_unique(&mut env.cpppath, cpppath);
        append_unique(&mut env.libpath, libpath);
        append_unique(&mut env.rpath, rpath);
        append_unique(&mut env.cppdefines, cppdefines);
        append_unique(&mut env.ccflags, ccflags);
        append_unique(&mut env.linkflags, linkflags);
        append_unique(&mut env.libs, libs.into_iter().map(LibraryRef::Name));

        for library in Self::expand(env, &spec.libraries) {
            session.append_library(env, &library, None);
        }

        for probe in Self::expand(env, &spec.probes) {
            if !session.parse_config(env, &probe).await {
                env.log_debug(format!("{}: probe '{}' failed", spec.name, probe));
            }
        }

        Ok(())
    }
}
