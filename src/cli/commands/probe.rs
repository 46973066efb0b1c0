//! Probe command - run a command through the probe cache

use crate::cli::args::ProbeArgs;
use crate::config::Config;
use crate::error::{ToolscopeError, ToolscopeResult};
use crate::session::BuildSession;
use console::style;
use std::path::Path;

/// Execute the probe command
pub async fn execute(args: ProbeArgs, config: &Config, top: &Path) -> ToolscopeResult<()> {
    let (script, rest) = args
        .command
        .split_first()
        .ok_or_else(|| ToolscopeError::User("No probe command given".to_string()))?;

    let mut session = BuildSession::new(config.clone(), top)?;
    let mut env = session.environment(&args.dir)?;
    env.set_debug(config.debug);

    let result = session
        .get_config(&mut env, &args.search_path, script, rest)
        .await;

    let status = if result.succeeded() {
        style(result.status.to_string()).green()
    } else {
        style(result.status.to_string()).red()
    };
    println!("status: {}", status);
    if !result.output.is_empty() {
        println!("{}", result.output);
    }

    Ok(())
}
