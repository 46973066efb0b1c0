//! Directory-scoped global tools
//!
//! Tool names are declared against the absolute directory of the
//! environment that declared them. An environment inherits every
//! declaration made at its own directory or at any ancestor directory,
//! outermost first, each name at most once.
//!
//! Ancestry is decided on path components, so a declaration at `/opt/foo`
//! applies to `/opt/foo/bar` but not to `/opt/foobar`.

use crate::error::{ToolscopeError, ToolscopeResult};
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::path::{Component, Path, PathBuf};

/// Absolute, lexically normalized directory used as a registry key
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DirKey(PathBuf);

impl DirKey {
    /// Build a key from an absolute path
    pub fn new(path: impl AsRef<Path>) -> ToolscopeResult<Self> {
        let path = path.as_ref();
        if !path.is_absolute() {
            return Err(ToolscopeError::RelativeDirectory(path.to_path_buf()));
        }
        Ok(Self(normalize_path(path)))
    }

    pub fn as_path(&self) -> &Path {
        &self.0
    }

    /// True if `other` is this directory or lies beneath it
    pub fn contains(&self, other: &DirKey) -> bool {
        other.0.starts_with(&self.0)
    }
}

impl fmt::Display for DirKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.display())
    }
}

/// Lexically remove `.` and `..` components without touching the filesystem
pub fn normalize_path(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    out.push(component);
                }
            }
            other => out.push(other),
        }
    }
    out
}

/// Tool declarations keyed by directory
#[derive(Debug, Default)]
pub struct GlobalTools {
    tools: BTreeMap<DirKey, Vec<String>>,
}

impl GlobalTools {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `names` to the declarations at `key`, creating the key if absent
    pub fn declare<I, S>(&mut self, key: &DirKey, names: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tools
            .entry(key.clone())
            .or_default()
            .extend(names.into_iter().map(Into::into));
    }

    /// Names declared exactly at `key`, in declaration order
    pub fn declared(&self, key: &DirKey) -> Option<&[String]> {
        self.tools.get(key).map(Vec::as_slice)
    }

    /// Every name applying at `key`: ancestor declarations before descendant
    /// ones, duplicates dropped after their first occurrence.
    pub fn effective_list(&self, key: &DirKey) -> Vec<String> {
        let mut seen = HashSet::new();
        let mut names = Vec::new();

        // Path ordering is component-wise, so ancestors iterate first
        for (_, declared) in self.tools.iter().filter(|(k, _)| k.contains(key)) {
            for name in declared {
                if seen.insert(name.as_str()) {
                    names.push(name.clone());
                }
            }
        }

        names
    }

    /// Registered keys in ancestor-first order
    pub fn keys(&self) -> impl Iterator<Item = &DirKey> {
        self.tools.keys()
    }
}
