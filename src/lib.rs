//! Toolscope - scoped tool registry for per-directory build environments
//!
//! Shares state between the build environments of one source tree: tools
//! declared for a directory subtree, library targets any directory can
//! link against, tools resolved once per session, and cached results of
//! package probe commands.

pub mod cache;
pub mod cli;
pub mod config;
pub mod env;
pub mod error;
pub mod library;
pub mod probe;
pub mod project;
pub mod scope;
pub mod session;
pub mod targets;
pub mod tool;

pub use env::Environment;
pub use error::{ToolscopeError, ToolscopeResult};
pub use session::BuildSession;
