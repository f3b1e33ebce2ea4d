//! Path mapping between the host directory and the sandbox workdir.

use std::path::{Component, Path, PathBuf};

/// Maps paths between the host directory backing a local sandbox and the
/// working directory seen by sandbox clients.
///
/// # Example
///
/// ```
/// use weaver_sandbox::PathMapper;
/// use std::path::PathBuf;
///
/// let mapper = PathMapper::new(
///     PathBuf::from("/tmp/weaver-root"),
///     PathBuf::from("/home/project"),
/// );
///
/// assert_eq!(
///     mapper.resolve("src/main.ts"),
///     Some(PathBuf::from("/tmp/weaver-root/src/main.ts"))
/// );
/// assert_eq!(mapper.resolve("/etc/passwd"), None);
/// assert_eq!(mapper.resolve("../escape"), None);
/// ```
#[derive(Debug, Clone)]
pub struct PathMapper {
    /// Host directory (e.g., /tmp/weaver-root)
    host_root: PathBuf,
    /// Sandbox workdir (e.g., /home/project)
    sandbox_root: PathBuf,
}

impl PathMapper {
    /// Create a new path mapper.
    pub fn new(host_root: PathBuf, sandbox_root: PathBuf) -> Self {
        Self {
            host_root,
            sandbox_root,
        }
    }

    /// Get the host root directory.
    pub fn host_root(&self) -> &Path {
        &self.host_root
    }

    /// Get the sandbox root directory.
    pub fn sandbox_root(&self) -> &Path {
        &self.sandbox_root
    }

    /// Convert a host path to a sandbox path.
    ///
    /// Returns `None` if the path is not under the host root.
    pub fn to_sandbox(&self, host_path: impl AsRef<Path>) -> Option<PathBuf> {
        host_path
            .as_ref()
            .strip_prefix(&self.host_root)
            .ok()
            .map(|relative| self.sandbox_root.join(relative))
    }

    /// Convert a sandbox path to a host path.
    ///
    /// Returns `None` if the path is not under the sandbox root.
    pub fn to_host(&self, sandbox_path: impl AsRef<Path>) -> Option<PathBuf> {
        sandbox_path
            .as_ref()
            .strip_prefix(&self.sandbox_root)
            .ok()
            .map(|relative| self.host_root.join(relative))
    }

    /// Resolve a client-supplied path to a host path.
    ///
    /// Relative paths are taken relative to the sandbox workdir. `..` is
    /// folded lexically first, so nothing can climb out of the workdir.
    pub fn resolve(&self, path: impl AsRef<Path>) -> Option<PathBuf> {
        let path = path.as_ref();
        let absolute = if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.sandbox_root.join(path)
        };
        self.to_host(normalize(&absolute)?)
    }

    /// Path of a host file relative to the sandbox workdir.
    pub fn relative(&self, host_path: impl AsRef<Path>) -> Option<PathBuf> {
        host_path
            .as_ref()
            .strip_prefix(&self.host_root)
            .ok()
            .map(Path::to_path_buf)
    }
}

/// Fold `.` and `..` components without touching the filesystem.
///
/// Returns `None` when `..` would climb above the root.
pub fn normalize(path: &Path) -> Option<PathBuf> {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() || out.as_os_str().is_empty() {
                    return None;
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    Some(out)
}
