//! Generate command - generate every project directory

use crate::cli::args::{GenerateArgs, OutputFormat};
use crate::config::Config;
use crate::error::ToolscopeResult;
use crate::project::{DirectoryReport, Project};
use crate::session::BuildSession;
use console::style;
use std::path::{Path, PathBuf};

/// Execute the generate command
pub async fn execute(args: GenerateArgs, config: &Config, top: &Path) -> ToolscopeResult<()> {
    let project = Project::discover(top)?;
    if project.dirs().is_empty() {
        println!("No build.toml files found under {}", top.display());
        return Ok(());
    }

    let mut session = BuildSession::new(config.clone(), top)?;
    let reports = project.generate(&mut session).await?;

    match args.format {
        OutputFormat::Table => print_table(&reports),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&reports)?),
        OutputFormat::Plain => {
            for report in &reports {
                println!("{}: {}", report.dir, report.tools.join(" "));
            }
        }
    }

    Ok(())
}

fn print_table(reports: &[DirectoryReport]) {
    for report in reports {
        println!("{}", style(&report.dir).bold().cyan());
        print_row("tools", &report.tools);
        print_row("built", &report.built.iter().map(ToString::to_string).collect::<Vec<_>>());
        print_row("libs", &report.libs);
        print_row("cpppath", &display_paths(&report.cpppath));
        print_row("cppdefines", &report.cppdefines);
        print_row("ccflags", &report.ccflags);
        print_row("linkflags", &report.linkflags);
        print_row("libpath", &display_paths(&report.libpath));
        print_row("rpath", &display_paths(&report.rpath));
        println!();
    }
    println!("Total: {} director{}", reports.len(), if reports.len() == 1 { "y" } else { "ies" });
}

fn print_row(label: &str, values: &[String]) {
    if values.is_empty() {
        return;
    }
    println!("  {:<12} {}", style(label).dim(), values.join(" "));
}

fn display_paths(paths: &[PathBuf]) -> Vec<String> {
    paths.iter().map(|p| p.display().to_string()).collect()
}
