//! Host tool loader
//!
//! Last stop of tool resolution. A tool not exported and not defined by a
//! tool file under the top directory is looked up here: first as
//! `<dir>/<name>.toml` in each toolpath directory, then among the builtin
//! compiler and linker tools.

use super::manifest::{read_tool_file, ManifestTool};
use super::{SharedTool, Tool, ToolParams};
use crate::env::{Environment, Platform};
use crate::error::{ToolscopeError, ToolscopeResult};
use crate::session::BuildSession;
use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::debug;

/// Names of the builtin host tools
pub const BUILTIN_TOOLS: &[&str] = &[
    "gcc",
    "g++",
    "clang",
    "clang++",
    "gnulink",
    "applelink",
    "ar",
    "mingw",
    "pkgconfig",
];

/// Host-provided tools and the default toolset
pub trait HostTools: Send + Sync {
    /// Tools every environment gets before anything else
    fn default_tool_names(&self, platform: Platform) -> Vec<String>;

    /// Load `name`, or `None` if the host has no such tool
    fn load(
        &self,
        name: &str,
        toolpath: &[PathBuf],
        params: &ToolParams,
    ) -> ToolscopeResult<Option<SharedTool>>;
}

/// Toolpath tool files plus the builtin tools
#[derive(Debug, Default, Clone, Copy)]
pub struct BuiltinHostTools;

impl BuiltinHostTools {
    fn from_toolpath(
        name: &str,
        toolpath: &[PathBuf],
        params: &ToolParams,
    ) -> ToolscopeResult<Option<SharedTool>> {
        let file_name = format!("{}.toml", name);
        let Some(path) = toolpath
            .iter()
            .map(|dir| dir.join(&file_name))
            .find(|path| path.is_file())
        else {
            return Ok(None);
        };

        debug!("Loading host tool {} from {}", name, path.display());
        let mut spec = read_tool_file(&path)?
            .into_iter()
            .find(|spec| spec.name == name)
            .ok_or_else(|| ToolscopeError::ToolNotExported {
                name: name.to_string(),
                file: path.clone(),
            })?;
        spec.vars.extend(params.clone());

        Ok(Some(Arc::new(ManifestTool::new(spec, path))))
    }

    fn builtin(name: &str, params: &ToolParams) -> ToolscopeResult<Option<SharedTool>> {
        let vars: &[(&str, &str)] = match name {
            "gcc" => &[("CC", "gcc")],
            "g++" => &[("CXX", "g++")],
            "clang" => &[("CC", "clang")],
            "clang++" => &[("CXX", "clang++")],
            "gnulink" => &[("LINK", "$CXX"), ("SHLINKFLAGS", "-shared")],
            "applelink" => &[("LINK", "$CXX"), ("SHLINKFLAGS", "-dynamiclib")],
            "ar" => &[("AR", "ar"), ("ARFLAGS", "rc")],
            "mingw" => &[
                ("CC", "gcc"),
                ("CXX", "g++"),
                ("LINK", "g++"),
                ("AR", "ar"),
                ("ARFLAGS", "rc"),
            ],
            "pkgconfig" => {
                let package = params.get("package").ok_or_else(|| ToolscopeError::ToolParam {
                    tool: name.to_string(),
                    reason: "missing required parameter 'package'".to_string(),
                })?;
                return Ok(Some(Arc::new(PkgConfigTool {
                    package: package.clone(),
                })));
            }
            _ => return Ok(None),
        };

        let mut settings: Vec<(String, String)> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        for (key, value) in params {
            match settings.iter_mut().find(|(k, _)| k == key) {
                Some(entry) => entry.1 = value.clone(),
                None => settings.push((key.clone(), value.clone())),
            }
        }

        Ok(Some(Arc::new(VarsTool {
            name: name.to_string(),
            vars: settings,
        })))
    }
}

impl HostTools for BuiltinHostTools {
    fn default_tool_names(&self, platform: Platform) -> Vec<String> {
        let names: &[&str] = match platform {
            Platform::Posix => &["gcc", "g++", "gnulink", "ar"],
            Platform::Darwin => &["clang", "clang++", "applelink", "ar"],
            Platform::Win32 => &["mingw"],
        };
        names.iter().map(|n| n.to_string()).collect()
    }

    fn load(
        &self,
        name: &str,
        toolpath: &[PathBuf],
        params: &ToolParams,
    ) -> ToolscopeResult<Option<SharedTool>> {
        if let Some(tool) = Self::from_toolpath(name, toolpath, params)? {
            return Ok(Some(tool));
        }
        Self::builtin(name, params)
    }
}

/// Builtin tool that sets construction variables
#[derive(Debug)]
struct VarsTool {
    name: String,
    vars: Vec<(String, String)>,
}

#[async_trait]
impl Tool for VarsTool {
    fn name(&self) -> &str {
        &self.name
    }

    async fn apply(&self, _session: &mut BuildSession, env: &mut Environment) -> ToolscopeResult<()> {
        for (name, value) in &self.vars {
            let value = env.subst(value);
            env.set(name.clone(), value);
        }
        Ok(())
    }
}

/// Builtin tool merging `pkg-config --cflags --libs <package>`
#[derive(Debug)]
struct PkgConfigTool {
    package: String,
}

#[async_trait]
impl Tool for PkgConfigTool {
    fn name(&self) -> &str {
        "pkgconfig"
    }

    async fn apply(&self, session: &mut BuildSession, env: &mut Environment) -> ToolscopeResult<()> {
        let command = format!("pkg-config --cflags --libs {}", self.package);
        if !session.parse_config(env, &command).await {
            env.log_debug(format!("pkg-config has no package {}", self.package));
        }
        Ok(())
    }
}
