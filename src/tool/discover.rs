//! Tool file discovery
//!
//! A tool named `X` may be defined by a file `tool_X.toml` anywhere under
//! the top directory. The tree is listed once per session (or once per
//! cache lifetime, when the persistent tool cache is enabled).

use crate::error::{ToolscopeError, ToolscopeResult};
use std::path::{Path, PathBuf};
use tracing::debug;
use walkdir::WalkDir;

/// File name prefix of tool files
pub const TOOL_FILE_PREFIX: &str = "tool_";

/// File extension of tool files
pub const TOOL_FILE_EXTENSION: &str = "toml";

/// Directories never searched for tool files
pub const EXCLUDED_DIRS: &[&str] = &[".git", ".svn", "site_scons", "apidocs"];

/// Lists candidate tool files under a root directory
pub trait ToolFileLister: Send + Sync {
    fn list(&self, root: &Path) -> ToolscopeResult<Vec<PathBuf>>;
}

/// Lists tool files by walking the filesystem in file-name order
#[derive(Debug, Default, Clone, Copy)]
pub struct WalkdirLister;

impl ToolFileLister for WalkdirLister {
    fn list(&self, root: &Path) -> ToolscopeResult<Vec<PathBuf>> {
        let mut matches = Vec::new();

        let walker = WalkDir::new(root)
            .follow_links(false)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|entry| {
                !(entry.depth() > 0
                    && entry.file_type().is_dir()
                    && entry
                        .file_name()
                        .to_str()
                        .is_some_and(|name| EXCLUDED_DIRS.contains(&name)))
            });

        for entry in walker {
            let entry = entry.map_err(|e| {
                let context = format!("walking {} for tool files", root.display());
                match e.into_io_error() {
                    Some(source) => ToolscopeError::io(context, source),
                    None => ToolscopeError::Internal(context),
                }
            })?;

            if entry.file_type().is_file()
                && entry.file_name().to_str().is_some_and(is_tool_file)
            {
                matches.push(entry.into_path());
            }
        }

        debug!("Found {} tool files under {}", matches.len(), root.display());
        Ok(matches)
    }
}

/// File name defining tool `name`
pub fn tool_file_name(name: &str) -> String {
    format!("{}{}.{}", TOOL_FILE_PREFIX, name, TOOL_FILE_EXTENSION)
}

/// True if `file_name` follows the tool file naming convention
pub fn is_tool_file(file_name: &str) -> bool {
    file_name
        .strip_prefix(TOOL_FILE_PREFIX)
        .and_then(|rest| rest.strip_suffix(TOOL_FILE_EXTENSION))
        .and_then(|rest| rest.strip_suffix('.'))
        .is_some_and(|name| !name.is_empty())
}

/// Files among `files` that define tool `name`, in discovery order
pub fn matching_files<'a>(files: &'a [PathBuf], name: &str) -> Vec<&'a PathBuf> {
    let wanted = tool_file_name(name);
    files
        .iter()
        .filter(|f| f.file_name().and_then(|n| n.to_str()) == Some(wanted.as_str()))
        .collect()
}
