//! Project description for the CLI driver
//!
//! Each directory taking part in the build holds a `build.toml`:
//!
//! ```toml
//! global_tools = ["warnings"]
//! tools = ["xmlrpc"]
//! link = ["util"]
//!
//! [[library]]
//! name = "codec"
//! sources = ["codec.c"]
//! ```
//!
//! Generation runs in two passes. The first generates every environment
//! parents first and builds the declared libraries, registering them as
//! global targets. The second appends link libraries, so a directory may
//! link against a library declared in a directory generated after it.

use crate::env::Environment;
use crate::error::{ToolscopeError, ToolscopeResult};
use crate::session::BuildSession;
use crate::targets::Node;
use crate::tool::discover::EXCLUDED_DIRS;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use walkdir::WalkDir;

/// Per-directory project file
pub const PROJECT_FILE_NAME: &str = "build.toml";

/// Contents of one `build.toml`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DirectorySpec {
    /// Tools applied here and in every subdirectory
    pub global_tools: Vec<String>,

    /// Tools applied here only
    pub tools: Vec<String>,

    /// Directories searched for host tool files, relative to this one
    pub toolpath: Vec<PathBuf>,

    /// Construction variables set before generation
    pub vars: BTreeMap<String, String>,

    /// Libraries linked through the global targets
    pub link: Vec<String>,

    /// Shared libraries linked by name with a runtime search path
    pub shared_link: Vec<String>,

    /// Libraries built in this directory
    pub library: Vec<LibrarySpec>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LibrarySpec {
    pub name: String,
    #[serde(default)]
    pub sources: Vec<PathBuf>,
    #[serde(default)]
    pub shared: bool,
}

/// A directory with its `build.toml`
#[derive(Debug, Clone)]
pub struct ProjectDir {
    /// Directory relative to the top
    pub dir: PathBuf,
    pub spec: DirectorySpec,
}

/// Generated state of one directory
#[derive(Debug, Clone, Serialize)]
pub struct DirectoryReport {
    pub dir: String,
    pub tools: Vec<String>,
    pub built: Vec<Node>,
    pub libs: Vec<String>,
    pub cpppath: Vec<PathBuf>,
    pub cppdefines: Vec<String>,
    pub ccflags: Vec<String>,
    pub linkflags: Vec<String>,
    pub libpath: Vec<PathBuf>,
    pub rpath: Vec<PathBuf>,
    pub vars: BTreeMap<String, String>,
}

impl DirectoryReport {
    fn new(env: &Environment, built: Vec<Node>) -> Self {
        Self {
            dir: env.subdir(),
            tools: env.applied_tools().to_vec(),
            built,
            libs: env.libs.iter().map(ToString::to_string).collect(),
            cpppath: env.cpppath.clone(),
            cppdefines: env.cppdefines.clone(),
            ccflags: env.ccflags.clone(),
            linkflags: env.linkflags.clone(),
            libpath: env.libpath.clone(),
            rpath: env.rpath.clone(),
            vars: env.vars.clone(),
        }
    }
}

/// All project directories under a top directory
#[derive(Debug, Clone)]
pub struct Project {
    top: PathBuf,
    dirs: Vec<ProjectDir>,
}

impl Project {
    /// Find every `build.toml` under `top`, parents before children
    pub fn discover(top: &Path) -> ToolscopeResult<Self> {
        let mut dirs = Vec::new();

        let walker = WalkDir::new(top)
            .follow_links(false)
            .into_iter()
            .filter_entry(|entry| {
                !(entry.depth() > 0
                    && entry.file_type().is_dir()
                    && entry
                        .file_name()
                        .to_str()
                        .is_some_and(|name| EXCLUDED_DIRS.contains(&name) || name == "target"))
            });

        for entry in walker {
            let entry = entry.map_err(|e| {
                let context = format!("walking {} for project files", top.display());
                match e.into_io_error() {
                    Some(source) => ToolscopeError::io(context, source),
                    None => ToolscopeError::Internal(context),
                }
            })?;
            if !entry.file_type().is_file() || entry.file_name() != PROJECT_FILE_NAME {
                continue;
            }

            let path = entry.path();
            let dir = path
                .parent()
                .and_then(|p| p.strip_prefix(top).ok())
                .map(Path::to_path_buf)
                .unwrap_or_default();
            debug!("Found project file {}", path.display());
            dirs.push(ProjectDir {
                dir,
                spec: Self::load_spec(path)?,
            });
        }

        dirs.sort_by(|a, b| {
            a.dir
                .components()
                .count()
                .cmp(&b.dir.components().count())
                .then_with(|| a.dir.cmp(&b.dir))
        });

        Ok(Self {
            top: top.to_path_buf(),
            dirs,
        })
    }

    /// Parse one `build.toml`
    pub fn load_spec(path: &Path) -> ToolscopeResult<DirectorySpec> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ToolscopeError::io(format!("reading {}", path.display()), e))?;
        toml::from_str(&content).map_err(|e| ToolscopeError::ProjectInvalid {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
    }

    pub fn top(&self) -> &Path {
        &self.top
    }

    pub fn dirs(&self) -> &[ProjectDir] {
        &self.dirs
    }

    /// Generate every directory in `session`
    pub async fn generate(&self, session: &mut BuildSession) -> ToolscopeResult<Vec<DirectoryReport>> {
        info!("Generating {} directories under {}", self.dirs.len(), self.top.display());

        let mut generated: Vec<(Environment, Vec<Node>)> = Vec::with_capacity(self.dirs.len());
        for project_dir in &self.dirs {
            let spec = &project_dir.spec;
            let mut env = session
                .environment(&project_dir.dir)?
                .with_global_tools(spec.global_tools.iter().cloned())
                .with_tools(spec.tools.iter().cloned())
                .with_toolpath(spec.toolpath.iter().cloned());
            for (name, value) in &spec.vars {
                env.set(name.clone(), value.clone());
            }

            session.generate(&mut env).await?;

            let mut built = Vec::new();
            for library in &spec.library {
                let nodes = if library.shared {
                    session.shared_library(&mut env, Some(&library.name), &library.sources)?
                } else {
                    session.library(&mut env, Some(&library.name), &library.sources)?
                };
                built.extend(nodes);
            }
            generated.push((env, built));
        }

        let mut reports = Vec::with_capacity(generated.len());
        for (project_dir, (mut env, built)) in self.dirs.iter().zip(generated) {
            for name in &project_dir.spec.link {
                session.append_library(&mut env, name, None);
            }
            for name in &project_dir.spec.shared_link {
                session.append_shared_library(&mut env, name, None);
            }
            reports.push(DirectoryReport::new(&env, built));
        }

        Ok(reports)
    }
}
