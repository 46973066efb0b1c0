//! Tools command - list tool files and builtin tools

use crate::cli::args::{OutputFormat, ToolsArgs};
use crate::config::Config;
use crate::error::ToolscopeResult;
use crate::session::BuildSession;
use crate::tool::discover::{TOOL_FILE_EXTENSION, TOOL_FILE_PREFIX};
use crate::tool::host::BUILTIN_TOOLS;
use console::style;
use serde::Serialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Serialize)]
struct ToolEntry {
    name: String,
    source: String,
    path: Option<PathBuf>,
}

/// Execute the tools command
pub async fn execute(args: ToolsArgs, config: &Config, top: &Path) -> ToolscopeResult<()> {
    let mut session = BuildSession::new(config.clone(), top)?;

    let mut entries: Vec<ToolEntry> = session
        .tool_files()?
        .into_iter()
        .map(|path| ToolEntry {
            name: tool_name(&path),
            source: "file".to_string(),
            path: Some(path),
        })
        .collect();
    entries.extend(BUILTIN_TOOLS.iter().map(|name| ToolEntry {
        name: name.to_string(),
        source: "builtin".to_string(),
        path: None,
    }));

    match args.format {
        OutputFormat::Table => {
            println!("{:<24} {:<10} {}", "TOOL", "SOURCE", "PATH");
            println!("{}", "-".repeat(60));
            for entry in &entries {
                let path = entry
                    .path
                    .as_ref()
                    .map(|p| p.display().to_string())
                    .unwrap_or_default();
                println!(
                    "{:<24} {:<10} {}",
                    entry.name,
                    style(&entry.source).dim(),
                    path
                );
            }
        }
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&entries)?),
        OutputFormat::Plain => {
            for entry in &entries {
                println!("{}", entry.name);
            }
        }
    }

    Ok(())
}

fn tool_name(path: &Path) -> String {
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    file_name
        .strip_prefix(TOOL_FILE_PREFIX)
        .and_then(|rest| rest.strip_suffix(TOOL_FILE_EXTENSION))
        .and_then(|rest| rest.strip_suffix('.'))
        .unwrap_or(&file_name)
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tool_name_strips_convention() {
        assert_eq!(tool_name(Path::new("/src/tools/tool_xmlrpc.toml")), "xmlrpc");
        assert_eq!(tool_name(Path::new("odd.toml")), "odd.toml");
    }
}
