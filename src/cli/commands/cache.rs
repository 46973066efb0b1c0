//! Cache command - manage the persistent tool cache

use crate::cache::ToolCache;
use crate::cli::args::{CacheAction, CacheArgs, OutputFormat};
use crate::config::{cache_file_path, Config};
use crate::error::ToolscopeResult;
use console::style;
use std::collections::BTreeMap;
use std::path::Path;

/// Execute the cache command
pub async fn execute(args: CacheArgs, config: &Config, top: &Path) -> ToolscopeResult<()> {
    let path = cache_file_path(config, top);
    let mut cache = ToolCache::open(&path);

    match args.action {
        CacheAction::Show { format } => show(&mut cache, config, format),
        CacheAction::Path => {
            println!("{}", path.display());
            Ok(())
        }
        CacheAction::Clear => {
            cache.clear()?;
            println!("{} Cleared tool cache {}", style("[OK]").green(), path.display());
            Ok(())
        }
    }
}

fn show(cache: &mut ToolCache, config: &Config, format: OutputFormat) -> ToolscopeResult<()> {
    let entries = cache.entries()?;

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(entries)?),
        OutputFormat::Plain => {
            for name in entries.keys() {
                println!("{}", name);
            }
        }
        OutputFormat::Table => print_table(entries, config.cache),
    }

    Ok(())
}

fn print_table(entries: &BTreeMap<String, String>, enabled: bool) {
    if !enabled {
        println!(
            "{} tool cache is disabled (set cache = true or TOOLSCOPE_CACHE=1)",
            style("[WARN]").yellow()
        );
    }

    if entries.is_empty() {
        println!("No cached entries.");
        return;
    }

    for (name, value) in entries {
        println!("{}", style(name).bold());
        for line in value.lines() {
            println!("  {}", line);
        }
    }

    println!();
    println!("Total: {} entr{}", entries.len(), if entries.len() == 1 { "y" } else { "ies" });
}
