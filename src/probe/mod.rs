//! Cached probe commands
//!
//! Package-config style scripts (`pkg-config`, `xml2-config`, ...) are run
//! once per environment and argument list. The `(status, output)` pair is
//! kept in the environment's probe cache, and in the session's persistent
//! tool cache when that is enabled.
//!
//! A probe never fails hard: a missing command or a non-zero exit is
//! reported as a result so the calling tool can try something else.

pub mod flags;

use crate::cache::ToolCache;
use crate::env::{append_unique, Environment, Platform};
use flags::{filter_ldflags, ParsedFlags};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;
use tracing::warn;

/// Per-environment probe results keyed by [`probe_key`]
pub type ConfigCache = HashMap<String, ProbeResult>;

/// Exit status and trimmed standard output of a probe command
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeResult {
    pub status: i32,
    pub output: String,
}

impl ProbeResult {
    pub fn new(status: i32, output: impl Into<String>) -> Self {
        Self {
            status,
            output: output.into(),
        }
    }

    /// Result of a command that could not be run
    pub fn failed() -> Self {
        Self::new(-1, "")
    }

    pub fn succeeded(&self) -> bool {
        self.status == 0
    }

    /// Encode as `<status>,<output>` for the tool cache
    pub fn encode(&self) -> String {
        format!("{},{}", self.status, self.output)
    }

    /// Decode `<status>,<output>`. Text without a status prefix decodes
    /// with status -1.
    pub fn decode(text: &str) -> Self {
        if let Some((status, output)) = text.split_once(',') {
            if let Ok(status) = status.parse::<i32>() {
                return Self::new(status, output);
            }
        }
        Self::new(-1, text)
    }
}

/// Cache key for a command line: a readable sanitized form plus a digest of
/// the exact argument vector.
pub fn probe_key(script: &str, args: &[String]) -> String {
    let line = std::iter::once(script)
        .chain(args.iter().map(String::as_str))
        .collect::<Vec<_>>()
        .join(" ");
    let sanitized: String = line
        .chars()
        .map(|c| if c.is_alphanumeric() || c == '_' { c } else { '_' })
        .collect();

    let mut hasher = Sha256::new();
    hasher.update(script.as_bytes());
    for arg in args {
        hasher.update([0u8]);
        hasher.update(arg.as_bytes());
    }
    let digest = hasher.finalize();

    format!("probe_{}_{}", sanitized, hex::encode(&digest[..6]))
}

/// Run `script` with `args`, or return the cached result.
///
/// With non-empty `search_paths` the script must be found as an executable
/// in one of the existing paths, otherwise nothing is spawned and the
/// result is `(-1, "")`. With empty `search_paths` the script itself is
/// the program. The child gets the environment's `exec_env` only.
pub async fn get_config(
    cache: &mut ToolCache,
    env: &mut Environment,
    search_paths: &[PathBuf],
    script: &str,
    args: &[String],
) -> ProbeResult {
    let key = probe_key(script, args);

    if let Some(result) = env.config_cache().get(&key).cloned() {
        env.log_debug(format!("{}: cached: {:?}", key, result));
        return result;
    }

    if cache.is_persistent() {
        match cache.lookup(&key) {
            Ok(Some(stored)) => {
                let result = ProbeResult::decode(&stored);
                env.config_cache().insert(key, result.clone());
                return result;
            }
            Ok(None) => {}
            Err(e) => warn!("Ignoring tool cache for {}: {}", key, e),
        }
    }

    let Some(program) = locate(env, search_paths, script) else {
        env.log_debug(format!("{} not found", script));
        return ProbeResult::failed();
    };
    env.log_debug(format!("Found: {}", program.display()));

    let output = Command::new(&program)
        .args(args)
        .env_clear()
        .envs(&env.exec_env)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::inherit())
        .output()
        .await;

    let output = match output {
        Ok(output) => output,
        Err(e) => {
            env.log_debug(format!("{} could not be run: {}", program.display(), e));
            return ProbeResult::failed();
        }
    };

    let result = ProbeResult::new(
        output.status.code().unwrap_or(-1),
        String::from_utf8_lossy(&output.stdout).trim_end(),
    );
    env.log_debug(format!("   command: {:?}", result));

    env.config_cache().insert(key.clone(), result.clone());
    if cache.is_persistent() {
        if let Err(e) = cache.store(&key, result.encode()) {
            warn!("Failed to persist probe result {}: {}", key, e);
        }
    }

    result
}

fn locate(env: &Environment, search_paths: &[PathBuf], script: &str) -> Option<PathBuf> {
    if search_paths.is_empty() {
        return Some(PathBuf::from(script));
    }

    let existing: Vec<&PathBuf> = search_paths.iter().filter(|p| p.exists()).collect();
    env.log_debug(format!(
        "Checking for {} in {}",
        script,
        existing
            .iter()
            .map(|p| p.display().to_string())
            .collect::<Vec<_>>()
            .join(",")
    ));
    if existing.is_empty() {
        return None;
    }

    let paths = std::env::join_paths(existing).ok()?;
    which::which_in(script, Some(paths), env.dir()).ok()
}

fn split_command(command: &str) -> (String, Vec<String>) {
    let mut words = command.split_whitespace().map(str::to_string);
    let script = words.next().unwrap_or_default();
    (script, words.collect())
}

/// Run a whitespace-separated command line and return its output
pub async fn run_config(cache: &mut ToolCache, env: &mut Environment, command: &str) -> String {
    let (script, args) = split_command(command);
    get_config(cache, env, &[], &script, &args).await.output
}

/// True if the command line exits with status 0
pub async fn check_config(cache: &mut ToolCache, env: &mut Environment, command: &str) -> bool {
    let (script, args) = split_command(command);
    get_config(cache, env, &[], &script, &args)
        .await
        .succeeded()
}

/// Merge the command's output into the environment's flags if it
/// succeeds. Returns whether it succeeded.
pub async fn parse_config(
    cache: &mut ToolCache,
    env: &mut Environment,
    command: &str,
    unique: bool,
) -> bool {
    let (script, args) = split_command(command);
    let result = get_config(cache, env, &[], &script, &args).await;
    if !result.succeeded() {
        return false;
    }
    env.merge_flags(&ParsedFlags::parse(&result.output), unique);
    true
}

/// Find `script` under `<prefix>/bin` for each of `search_prefixes` and
/// return what it reports for `--prefix`.
///
/// With `apply_config` the script's `--cppflags --ldflags --libs` are
/// merged (system default library paths removed) and each remaining `-L`
/// directory becomes a runtime search path. Falls back to
/// `default_prefix` when the script reports nothing.
pub async fn parse_config_prefix(
    cache: &mut ToolCache,
    env: &mut Environment,
    script: &str,
    search_prefixes: &[&str],
    default_prefix: &str,
    apply_config: bool,
) -> String {
    let default_prefix = env.subst(default_prefix);
    if env.platform() == Platform::Win32 {
        return default_prefix;
    }

    let search_paths: Vec<PathBuf> = search_prefixes
        .iter()
        .filter(|p| !p.is_empty())
        .map(|p| PathBuf::from(env.subst(p)).join("bin"))
        .filter(|p| p.exists())
        .collect();

    let prefix = get_config(cache, env, &search_paths, script, &["--prefix".to_string()])
        .await
        .output;

    if apply_config {
        let args = ["--cppflags", "--ldflags", "--libs"].map(String::from);
        let flags = get_config(cache, env, &search_paths, script, &args).await.output;
        if flags.is_empty() {
            env.log_debug(format!("No flags from {}", script));
        } else {
            let flags = filter_ldflags(&flags);
            env.log_debug(format!("Merging {}", flags));
            env.merge_flags(&ParsedFlags::parse(&flags), true);
        }

        let ldflags = get_config(cache, env, &search_paths, script, &["--ldflags".to_string()])
            .await
            .output;
        let runtime_dirs: Vec<PathBuf> = filter_ldflags(&ldflags)
            .split_whitespace()
            .filter_map(|f| f.strip_prefix("-L"))
            .map(|dir| env.resolve_dir(Path::new(dir)))
            .collect();
        append_unique(&mut env.rpath, runtime_dirs);
    }

    if prefix.is_empty() {
        default_prefix
    } else {
        prefix
    }
}

/// Ask `pkg-config` in `/usr/bin` for the install prefix of `package`
pub async fn pkg_config_prefix(
    cache: &mut ToolCache,
    env: &mut Environment,
    package: &str,
    default_prefix: &str,
) -> String {
    let mut prefix = String::new();
    if env.platform() != Platform::Win32 {
        let args = ["--variable=prefix".to_string(), package.to_string()];
        prefix = get_config(cache, env, &[PathBuf::from("/usr/bin")], "pkg-config", &args)
            .await
            .output;
    }
    if prefix.is_empty() {
        env.subst(default_prefix)
    } else {
        prefix
    }
}
