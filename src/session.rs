//! Build sessions
//!
//! A [`BuildSession`] owns everything shared between the environments of
//! one build run: the directory-scoped global tools, the global targets,
//! the tool resolver and the persistent tool cache. It is passed
//! explicitly to every operation that reads or updates that state.
//!
//! [`BuildSession::generate`] prepares an environment exactly once:
//!
//! 1. copy declared configuration variables
//! 2. apply the platform default toolset
//! 3. prepend the top directory to the include path
//! 4. install the registering library builders
//! 5. pass through version-control and credential variables
//! 6. apply the inherited global tools, then the environment's own tools

use crate::cache::{ToolCache, DEFAULT_TOOL_NAMES_KEY};
use crate::config::{cache_file_path, Config};
use crate::env::{Environment, Platform, PASS_ENV_PATTERN};
use crate::error::{ToolscopeError, ToolscopeResult};
use crate::library::LibraryBuilders;
use crate::probe::{self, ProbeResult};
use crate::scope::{normalize_path, DirKey, GlobalTools};
use crate::targets::{self, Node, TargetMap};
use crate::tool::{
    HostTools, SharedTool, ToolFileLister, ToolFileLoader, ToolParams, ToolResolver,
};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Shared state of one build run
pub struct BuildSession {
    config: Config,
    top: PathBuf,
    platform: Platform,
    global_tools: GlobalTools,
    targets: TargetMap,
    resolver: ToolResolver,
    cache: ToolCache,
    default_tools: Option<Vec<SharedTool>>,
    applying: Vec<String>,
}

impl BuildSession {
    /// Create a session for the source tree at the absolute `top`
    pub fn new(config: Config, top: impl AsRef<Path>) -> ToolscopeResult<Self> {
        let top = top.as_ref();
        if !top.is_absolute() {
            return Err(ToolscopeError::RelativeDirectory(top.to_path_buf()));
        }
        let top = normalize_path(top);

        let cache = if config.cache {
            let path = cache_file_path(&config, &top);
            info!("Using tool cache {}", path.display());
            ToolCache::open(path)
        } else {
            ToolCache::disabled()
        };

        Ok(Self {
            config,
            top,
            platform: Platform::host(),
            global_tools: GlobalTools::new(),
            targets: TargetMap::new(),
            resolver: ToolResolver::default(),
            cache,
            default_tools: None,
            applying: Vec::new(),
        })
    }

    pub fn with_platform(mut self, platform: Platform) -> Self {
        self.platform = platform;
        self
    }

    /// Replace the tool file lister
    pub fn with_lister(mut self, lister: Box<dyn ToolFileLister>) -> Self {
        self.resolver.set_lister(lister);
        self
    }

    /// Replace the tool file loader
    pub fn with_loader(mut self, loader: Box<dyn ToolFileLoader>) -> Self {
        self.resolver.set_loader(loader);
        self
    }

    /// Replace the host tool collaborator
    pub fn with_host(mut self, host: Box<dyn HostTools>) -> Self {
        self.resolver.set_host(host);
        self.default_tools = None;
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn top(&self) -> &Path {
        &self.top
    }

    pub fn platform(&self) -> Platform {
        self.platform
    }

    pub fn global_tools(&self) -> &GlobalTools {
        &self.global_tools
    }

    pub fn targets(&self) -> &TargetMap {
        &self.targets
    }

    pub fn resolver(&self) -> &ToolResolver {
        &self.resolver
    }

    pub fn cache_mut(&mut self) -> &mut ToolCache {
        &mut self.cache
    }

    /// New ungenerated environment for `dir`, relative to the top
    pub fn environment(&self, dir: impl AsRef<Path>) -> ToolscopeResult<Environment> {
        Ok(Environment::new(&self.top, dir)?.with_platform(self.platform))
    }

    /// Prepare `env` for use. Generating an environment twice is a no-op.
    pub async fn generate(&mut self, env: &mut Environment) -> ToolscopeResult<()> {
        if env.is_generated() {
            env.log_debug("environment already generated, skipping");
            return Ok(());
        }
        env.mark_generated(self.config.debug);
        env.log_debug("generating environment");

        if let Err(err) = self.generate_steps(env).await {
            debug!(
                "Generation of {} failed, environment stays marked generated: {}",
                env.subdir(),
                err
            );
            return Err(err);
        }
        Ok(())
    }

    async fn generate_steps(&mut self, env: &mut Environment) -> ToolscopeResult<()> {
        for (name, value) in &self.config.variables {
            if env.get(name).is_none() {
                env.set(name.clone(), value.clone());
            }
        }

        for tool in self.default_tools(env)? {
            tool.apply(self, env).await?;
            env.record_applied(tool.name());
        }

        env.prepend_cpppath_unique(self.top.clone());
        env.install_builders(LibraryBuilders::registering());
        env.pass_env(PASS_ENV_PATTERN)?;

        let key = DirKey::new(env.dir())?;
        self.global_tools.declare(&key, env.global_tools.iter().cloned());
        env.set_global_tools_key(key.clone());

        let names = self.global_tools.effective_list(&key);
        env.log_debug(format!("applying global tools {:?}", names));
        for name in &names {
            self.tool(env, name, None, &ToolParams::new()).await?;
        }

        let own = env.tools.clone();
        for name in &own {
            self.tool(env, name, None, &ToolParams::new()).await?;
        }

        Ok(())
    }

    /// Default toolset, resolved once per session
    fn default_tools(&mut self, env: &Environment) -> ToolscopeResult<Vec<SharedTool>> {
        if let Some(tools) = &self.default_tools {
            return Ok(tools.clone());
        }

        let names: Vec<String> = match self.cache.lookup(DEFAULT_TOOL_NAMES_KEY)? {
            Some(cached) => cached
                .lines()
                .filter(|l| !l.is_empty())
                .map(str::to_string)
                .collect(),
            None => {
                let names = self.resolver.host().default_tool_names(self.platform);
                self.cache.store(DEFAULT_TOOL_NAMES_KEY, names.join("\n"))?;
                names
            }
        };
        debug!("Default tools for {}: {:?}", self.platform.as_str(), names);

        let toolpath: Vec<PathBuf> = env.toolpath.iter().map(|d| env.resolve_dir(d)).collect();
        let params = ToolParams::new();
        let mut tools = Vec::with_capacity(names.len());
        for name in &names {
            let tool = self
                .resolver
                .host()
                .load(name, &toolpath, &params)?
                .ok_or_else(|| ToolscopeError::tool_not_found(name, "host default toolset"))?;
            tools.push(tool);
        }

        self.default_tools = Some(tools.clone());
        Ok(tools)
    }

    /// Resolve tool `name` and apply it to `env`.
    ///
    /// The name is expanded with [`Environment::subst`] first. Tools given
    /// parameters are resolved afresh on every call. Requiring a tool that
    /// is still being applied fails with [`ToolscopeError::ToolCycle`].
    pub async fn tool(
        &mut self,
        env: &mut Environment,
        name: &str,
        toolpath: Option<&[PathBuf]>,
        params: &ToolParams,
    ) -> ToolscopeResult<()> {
        let name = env.subst(name);
        if self.applying.contains(&name) {
            let mut chain = self.applying.clone();
            chain.push(name);
            return Err(ToolscopeError::ToolCycle {
                chain: chain.join(" -> "),
            });
        }

        let tool = self
            .resolver
            .resolve(&mut self.cache, env, &name, toolpath, params)?;

        env.log_debug(format!("applying tool {}", name));
        self.applying.push(name.clone());
        let applied = tool.apply(self, env).await;
        self.applying.pop();
        applied?;

        env.record_applied(&name);
        Ok(())
    }

    /// Apply each of `names` to `env`, in order
    pub async fn require(&mut self, env: &mut Environment, names: &[&str]) -> ToolscopeResult<()> {
        for name in names {
            self.tool(env, name, None, &ToolParams::new()).await?;
        }
        Ok(())
    }

    /// Publish `tool` under `name` for later resolution
    pub fn export(&mut self, name: impl Into<String>, tool: SharedTool) {
        self.resolver.exports_mut().export(name, tool);
    }

    /// Tool names declared at `env`'s own directory, not inherited ones
    pub fn global_tools_for(&self, env: &Environment) -> Vec<String> {
        env.global_tools_key()
            .and_then(|key| self.global_tools.declared(key))
            .map(<[String]>::to_vec)
            .unwrap_or_default()
    }

    /// Tool files under the top directory
    pub fn tool_files(&mut self) -> ToolscopeResult<Vec<PathBuf>> {
        Ok(self.resolver.tool_files(&mut self.cache, &self.top)?.to_vec())
    }

    pub fn add_global_target(
        &mut self,
        env: &mut Environment,
        name: &str,
        target: &[Node],
    ) -> Option<Node> {
        targets::register(&mut self.targets, env, name, target)
    }

    pub fn get_global_target(&self, env: &Environment, name: &str) -> Option<Node> {
        targets::lookup(&self.targets, env, name)
    }

    pub fn add_library_target(
        &mut self,
        env: &mut Environment,
        base: &str,
        target: &[Node],
    ) -> Option<Node> {
        targets::register_library(&mut self.targets, env, base, target)
    }

    pub fn append_library(&self, env: &mut Environment, name: &str, path: Option<&Path>) {
        targets::append_library(&self.targets, env, name, path);
    }

    pub fn append_shared_library(&self, env: &mut Environment, name: &str, path: Option<&Path>) {
        targets::append_shared_library(&self.targets, env, name, path);
    }

    /// Build a static library with the environment's builder
    pub fn library(
        &mut self,
        env: &mut Environment,
        target: Option<&str>,
        sources: &[PathBuf],
    ) -> ToolscopeResult<Vec<Node>> {
        let builder = env.builders().static_lib.clone();
        builder.build(&mut self.targets, env, target, sources)
    }

    /// Build a shared library with the environment's builder
    pub fn shared_library(
        &mut self,
        env: &mut Environment,
        target: Option<&str>,
        sources: &[PathBuf],
    ) -> ToolscopeResult<Vec<Node>> {
        let builder = env.builders().shared_lib.clone();
        builder.build(&mut self.targets, env, target, sources)
    }

    pub async fn get_config(
        &mut self,
        env: &mut Environment,
        search_paths: &[PathBuf],
        script: &str,
        args: &[String],
    ) -> ProbeResult {
        probe::get_config(&mut self.cache, env, search_paths, script, args).await
    }

    pub async fn run_config(&mut self, env: &mut Environment, command: &str) -> String {
        probe::run_config(&mut self.cache, env, command).await
    }

    pub async fn check_config(&mut self, env: &mut Environment, command: &str) -> bool {
        probe::check_config(&mut self.cache, env, command).await
    }

    /// Merge a probe command's flags into `env`, without duplicates
    pub async fn parse_config(&mut self, env: &mut Environment, command: &str) -> bool {
        probe::parse_config(&mut self.cache, env, command, true).await
    }

    pub async fn parse_config_prefix(
        &mut self,
        env: &mut Environment,
        script: &str,
        search_prefixes: &[&str],
        default_prefix: &str,
        apply_config: bool,
    ) -> String {
        probe::parse_config_prefix(
            &mut self.cache,
            env,
            script,
            search_prefixes,
            default_prefix,
            apply_config,
        )
        .await
    }

    pub async fn pkg_config_prefix(
        &mut self,
        env: &mut Environment,
        package: &str,
        default_prefix: &str,
    ) -> String {
        probe::pkg_config_prefix(&mut self.cache, env, package, default_prefix).await
    }
}
