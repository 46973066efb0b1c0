//! Build environments
//!
//! An [`Environment`] is the per-directory build context: construction
//! variables, compiler and linker flag lists, the execution environment
//! handed to spawned commands, and the state the session attaches to it
//! (local targets, probe results, library builders).

use crate::error::{ToolscopeError, ToolscopeResult};
use crate::library::LibraryBuilders;
use crate::probe::flags::ParsedFlags;
use crate::probe::ConfigCache;
use crate::scope::{normalize_path, DirKey};
use crate::targets::{LibraryRef, Node, TargetMap};
use regex::Regex;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use tracing::debug;

/// `PATH` given to spawned commands unless a tool overrides it
pub const DEFAULT_EXEC_PATH: &str = "/usr/local/bin:/opt/bin:/bin:/usr/bin";

/// Host variables passed through to every generated environment
pub const PASS_ENV_PATTERN: &str = r"CVS.*|SSH_.*|GIT_.*";

/// Platform an environment builds for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Platform {
    Posix,
    Darwin,
    Win32,
}

impl Platform {
    /// Platform of the running host
    pub fn host() -> Self {
        match std::env::consts::OS {
            "macos" => Self::Darwin,
            "windows" => Self::Win32,
            _ => Self::Posix,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Posix => "posix",
            Self::Darwin => "darwin",
            Self::Win32 => "win32",
        }
    }
}

/// One build step recorded by a builder
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildStep {
    pub builder: &'static str,
    pub targets: Vec<Node>,
    pub sources: Vec<PathBuf>,
}

/// Per-directory build context
#[derive(Debug)]
pub struct Environment {
    top: PathBuf,
    dir: PathBuf,
    platform: Platform,

    /// Scalar construction variables (`CC`, `OPT_PREFIX`, ...)
    pub vars: BTreeMap<String, String>,
    pub cpppath: Vec<PathBuf>,
    pub cppdefines: Vec<String>,
    pub ccflags: Vec<String>,
    pub linkflags: Vec<String>,
    pub libpath: Vec<PathBuf>,
    pub libs: Vec<LibraryRef>,
    pub rpath: Vec<PathBuf>,
    pub deploy_shared_libs: Vec<String>,

    /// Environment of spawned probe commands and build actions
    pub exec_env: BTreeMap<String, String>,

    /// Tools this directory declares for itself and every subdirectory
    pub global_tools: Vec<String>,
    /// Tools applied to this environment only, after the global ones
    pub tools: Vec<String>,
    /// Extra directories searched by the host tool loader
    pub toolpath: Vec<PathBuf>,

    global_tools_key: Option<DirKey>,
    local_targets: TargetMap,
    config_cache: ConfigCache,
    builders: LibraryBuilders,
    applied_tools: Vec<String>,
    steps: Vec<BuildStep>,
    generated: bool,
    debug: bool,
}

impl Environment {
    /// Create an environment for `dir`, resolved against the absolute `top`
    pub fn new(top: impl AsRef<Path>, dir: impl AsRef<Path>) -> ToolscopeResult<Self> {
        let top = top.as_ref();
        if !top.is_absolute() {
            return Err(ToolscopeError::RelativeDirectory(top.to_path_buf()));
        }
        let top = normalize_path(top);
        let dir = normalize_path(&top.join(dir.as_ref()));

        let mut exec_env = BTreeMap::new();
        exec_env.insert("PATH".to_string(), DEFAULT_EXEC_PATH.to_string());

        Ok(Self {
            top,
            dir,
            platform: Platform::host(),
            vars: BTreeMap::new(),
            cpppath: Vec::new(),
            cppdefines: Vec::new(),
            ccflags: Vec::new(),
            linkflags: Vec::new(),
            libpath: Vec::new(),
            libs: Vec::new(),
            rpath: Vec::new(),
            deploy_shared_libs: Vec::new(),
            exec_env,
            global_tools: Vec::new(),
            tools: Vec::new(),
            toolpath: Vec::new(),
            global_tools_key: None,
            local_targets: TargetMap::new(),
            config_cache: ConfigCache::new(),
            builders: LibraryBuilders::default(),
            applied_tools: Vec::new(),
            steps: Vec::new(),
            generated: false,
            debug: false,
        })
    }

    /// Declare global tools for this directory
    pub fn with_global_tools<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.global_tools.extend(names.into_iter().map(Into::into));
        self
    }

    /// Request tools for this environment only
    pub fn with_tools<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tools.extend(names.into_iter().map(Into::into));
        self
    }

    pub fn with_toolpath<I, P>(mut self, dirs: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        self.toolpath.extend(dirs.into_iter().map(Into::into));
        self
    }

    pub fn with_platform(mut self, platform: Platform) -> Self {
        self.platform = platform;
        self
    }

    pub fn with_var(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.vars.insert(name.into(), value.into());
        self
    }

    /// Top directory of the source tree
    pub fn top(&self) -> &Path {
        &self.top
    }

    /// Absolute directory of this environment
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn platform(&self) -> Platform {
        self.platform
    }

    /// Directory relative to the top, `root` for the top itself
    pub fn subdir(&self) -> String {
        match self.dir.strip_prefix(&self.top) {
            Ok(rel) if rel.as_os_str().is_empty() => "root".to_string(),
            Ok(rel) => rel.display().to_string(),
            Err(_) => self.dir.display().to_string(),
        }
    }

    pub fn is_generated(&self) -> bool {
        self.generated
    }

    /// Key this environment's global tools were declared under
    pub fn global_tools_key(&self) -> Option<&DirKey> {
        self.global_tools_key.as_ref()
    }

    /// Tool names applied so far, in application order
    pub fn applied_tools(&self) -> &[String] {
        &self.applied_tools
    }

    /// Build steps recorded by builders
    pub fn steps(&self) -> &[BuildStep] {
        &self.steps
    }

    pub fn local_targets(&self) -> &TargetMap {
        &self.local_targets
    }

    pub fn debug_enabled(&self) -> bool {
        self.debug
    }

    pub fn set_debug(&mut self, enabled: bool) {
        self.debug = enabled;
    }

    /// Emit a debug message tagged with this environment's directory
    pub fn log_debug(&self, msg: impl AsRef<str>) {
        if self.debug {
            debug!(subdir = %self.subdir(), "{}", msg.as_ref());
        }
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.vars.get(name).map(String::as_str)
    }

    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.vars.insert(name.into(), value.into());
    }

    /// Expand `$NAME` and `${NAME}` from construction variables.
    /// Unknown names expand to nothing.
    pub fn subst(&self, text: &str) -> String {
        static VAR: OnceLock<Regex> = OnceLock::new();
        let re = VAR.get_or_init(|| {
            Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)\}|\$([A-Za-z_][A-Za-z0-9_]*)")
                .expect("variable pattern is valid")
        });

        re.replace_all(text, |caps: &regex::Captures<'_>| {
            let name = caps
                .get(1)
                .or_else(|| caps.get(2))
                .map(|m| m.as_str())
                .unwrap_or_default();
            self.get(name).unwrap_or_default().to_string()
        })
        .into_owned()
    }

    /// Resolve `path` against this environment's directory
    pub fn resolve_dir(&self, path: &Path) -> PathBuf {
        normalize_path(&self.dir.join(path))
    }

    /// Put `path` first in the include path unless already present
    pub fn prepend_cpppath_unique(&mut self, path: impl Into<PathBuf>) {
        let path = path.into();
        if !self.cpppath.contains(&path) {
            self.cpppath.insert(0, path);
        }
    }

    /// Merge parsed compiler and linker flags
    pub fn merge_flags(&mut self, flags: &ParsedFlags, unique: bool) {
        let libs = flags.libs.iter().cloned().map(LibraryRef::Name);
        if unique {
            append_unique(&mut self.cpppath, flags.cpppath.iter().cloned());
            append_unique(&mut self.cppdefines, flags.cppdefines.iter().cloned());
            append_unique(&mut self.ccflags, flags.ccflags.iter().cloned());
            append_unique(&mut self.linkflags, flags.linkflags.iter().cloned());
            append_unique(&mut self.libpath, flags.libpath.iter().cloned());
            append_unique(&mut self.rpath, flags.rpath.iter().cloned());
            append_unique(&mut self.libs, libs);
        } else {
            self.cpppath.extend(flags.cpppath.iter().cloned());
            self.cppdefines.extend(flags.cppdefines.iter().cloned());
            self.ccflags.extend(flags.ccflags.iter().cloned());
            self.linkflags.extend(flags.linkflags.iter().cloned());
            self.libpath.extend(flags.libpath.iter().cloned());
            self.rpath.extend(flags.rpath.iter().cloned());
            self.libs.extend(libs);
        }
    }

    /// Copy host environment variables whose names match `pattern`
    /// (anchored at the start) into the execution environment.
    pub fn pass_env(&mut self, pattern: &str) -> ToolscopeResult<usize> {
        self.pass_env_from(pattern, std::env::vars())
    }

    /// [`Environment::pass_env`] over an explicit variable list
    pub fn pass_env_from<I>(&mut self, pattern: &str, vars: I) -> ToolscopeResult<usize>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let re = Regex::new(&format!("^(?:{})", pattern)).map_err(|source| {
            ToolscopeError::PassEnvPattern {
                pattern: pattern.to_string(),
                source,
            }
        })?;

        let mut passed = 0;
        for (name, value) in vars {
            if re.is_match(&name) {
                self.exec_env.insert(name, value);
                passed += 1;
            }
        }
        Ok(passed)
    }

    pub(crate) fn mark_generated(&mut self, debug: bool) {
        self.generated = true;
        self.debug = debug;
    }

    pub(crate) fn set_global_tools_key(&mut self, key: DirKey) {
        self.global_tools_key = Some(key);
    }

    pub(crate) fn local_targets_mut(&mut self) -> &mut TargetMap {
        &mut self.local_targets
    }

    pub(crate) fn config_cache(&mut self) -> &mut ConfigCache {
        &mut self.config_cache
    }

    pub(crate) fn builders(&self) -> &LibraryBuilders {
        &self.builders
    }

    pub(crate) fn install_builders(&mut self, builders: LibraryBuilders) {
        self.builders = builders;
    }

    pub(crate) fn record_applied(&mut self, name: &str) {
        self.applied_tools.push(name.to_string());
    }

    pub(crate) fn record_step(&mut self, step: BuildStep) {
        self.steps.push(step);
    }
}

/// Append each item not already in `list`
pub fn append_unique<T, I>(list: &mut Vec<T>, items: I)
where
    T: PartialEq,
    I: IntoIterator<Item = T>,
{
    for item in items {
        if !list.contains(&item) {
            list.push(item);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dir_resolves_against_top() {
        let env = Environment::new("/proj", "lib/../app").unwrap();
        assert_eq!(env.dir(), Path::new("/proj/app"));
        assert_eq!(env.subdir(), "app");
        assert_eq!(Environment::new("/proj", ".").unwrap().subdir(), "root");
    }

    #[test]
    fn relative_top_rejected() {
        assert!(matches!(
            Environment::new("proj", "a"),
            Err(ToolscopeError::RelativeDirectory(_))
        ));
    }

    #[test]
    fn subst_expands_both_forms() {
        let env = Environment::new("/proj", ".")
            .unwrap()
            .with_var("OPT_PREFIX", "/opt/local");

        assert_eq!(env.subst("$OPT_PREFIX/lib"), "/opt/local/lib");
        assert_eq!(env.subst("${OPT_PREFIX}64"), "/opt/local64");
        assert_eq!(env.subst("$MISSING/bin"), "/bin");
        assert_eq!(env.subst("plain"), "plain");
    }

    #[test]
    fn pass_env_is_anchored() {
        let mut env = Environment::new("/proj", ".").unwrap();
        let vars = vec![
            ("GIT_DIR".to_string(), "/g".to_string()),
            ("SSH_AUTH_SOCK".to_string(), "/s".to_string()),
            ("MY_GIT_THING".to_string(), "x".to_string()),
            ("HOME".to_string(), "/home/u".to_string()),
        ];

        let passed = env.pass_env_from(PASS_ENV_PATTERN, vars).unwrap();

        assert_eq!(passed, 2);
        assert_eq!(env.exec_env.get("GIT_DIR").map(String::as_str), Some("/g"));
        assert!(env.exec_env.contains_key("SSH_AUTH_SOCK"));
        assert!(!env.exec_env.contains_key("MY_GIT_THING"));
        assert!(!env.exec_env.contains_key("HOME"));
    }

    #[test]
    fn bad_pass_env_pattern_errors() {
        let mut env = Environment::new("/proj", ".").unwrap();
        assert!(env.pass_env_from("(", Vec::new()).is_err());
    }

    #[test]
    fn merge_flags_unique() {
        let mut env = Environment::new("/proj", ".").unwrap();
        let flags = ParsedFlags::parse("-I/usr/include/x -lx -lx -DX=1");

        env.merge_flags(&flags, true);
        env.merge_flags(&flags, true);

        assert_eq!(env.cpppath, vec![PathBuf::from("/usr/include/x")]);
        assert_eq!(env.libs, vec![LibraryRef::Name("x".into())]);
        assert_eq!(env.cppdefines, vec!["X=1".to_string()]);
    }

    #[test]
    fn merge_flags_not_unique_appends() {
        let mut env = Environment::new("/proj", ".").unwrap();
        let flags = ParsedFlags::parse("-lx");
        env.merge_flags(&flags, false);
        env.merge_flags(&flags, false);
        assert_eq!(env.libs.len(), 2);
    }

    #[test]
    fn prepend_cpppath_unique_keeps_single_entry() {
        let mut env = Environment::new("/proj", ".").unwrap();
        env.cpppath.push(PathBuf::from("/usr/include"));
        env.prepend_cpppath_unique("/proj");
        env.prepend_cpppath_unique("/proj");
        assert_eq!(
            env.cpppath,
            vec![PathBuf::from("/proj"), PathBuf::from("/usr/include")]
        );
    }
}
