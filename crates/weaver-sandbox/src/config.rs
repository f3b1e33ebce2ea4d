//! Configuration types for sandbox settings.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Working directory used inside the sandbox when none is configured.
pub const DEFAULT_WORKDIR: &str = "/home/project";

/// Name of the built-in OSC-emitting shell.
pub const DEFAULT_SHELL: &str = "jsh";

/// Main sandbox configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SandboxConfig {
    /// Address of a remote sandbox (`host:port`). `None` runs the local
    /// in-process sandbox.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,

    /// Token sent in the `auth` operation right after connecting.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auth_token: Option<String>,

    /// Host directory backing the local sandbox.
    pub root: PathBuf,

    /// Working directory inside the sandbox.
    pub workdir: String,

    /// Interactive shell settings
    pub shell: ShellConfig,
}

impl Default for SandboxConfig {
    fn default() -> Self {
        Self {
            url: None,
            auth_token: None,
            root: PathBuf::from("."),
            workdir: DEFAULT_WORKDIR.to_string(),
            shell: ShellConfig::default(),
        }
    }
}

impl SandboxConfig {
    /// Whether this configuration targets a remote sandbox
    pub fn is_remote(&self) -> bool {
        self.url.is_some()
    }

    /// Merge with another config (other takes precedence)
    pub fn merge(self, other: Self) -> Self {
        let defaults = Self::default();
        Self {
            url: other.url.or(self.url),
            auth_token: other.auth_token.or(self.auth_token),
            root: if other.root == defaults.root {
                self.root
            } else {
                other.root
            },
            workdir: if other.workdir == defaults.workdir {
                self.workdir
            } else {
                other.workdir
            },
            shell: self.shell.merge(other.shell),
        }
    }
}

/// Interactive shell configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ShellConfig {
    /// Command spawned for the interactive session
    pub command: String,
    /// Arguments for the shell command
    pub args: Vec<String>,
    /// Terminal columns
    pub cols: u16,
    /// Terminal rows
    pub rows: u16,
}

impl Default for ShellConfig {
    fn default() -> Self {
        Self {
            command: DEFAULT_SHELL.to_string(),
            args: vec!["--osc".to_string()],
            cols: 80,
            rows: 15,
        }
    }
}

impl ShellConfig {
    /// Merge with another config (other takes precedence)
    pub fn merge(self, other: Self) -> Self {
        let defaults = Self::default();
        Self {
            command: if other.command == defaults.command {
                self.command
            } else {
                other.command
            },
            args: if other.args == defaults.args {
                self.args
            } else {
                other.args
            },
            cols: if other.cols == defaults.cols {
                self.cols
            } else {
                other.cols
            },
            rows: if other.rows == defaults.rows {
                self.rows
            } else {
                other.rows
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = SandboxConfig::default();
        assert!(!config.is_remote());
        assert_eq!(config.workdir, DEFAULT_WORKDIR);
        assert_eq!(config.shell.command, DEFAULT_SHELL);
    }

    #[test]
    fn test_config_serialization() {
        let config = SandboxConfig {
            url: Some("127.0.0.1:7070".to_string()),
            ..Default::default()
        };
        let json = serde_json::to_string(&config).unwrap();
        let parsed: SandboxConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let parsed: SandboxConfig = serde_json::from_str(r#"{"shell": {"cols": 120}}"#).unwrap();
        assert_eq!(parsed.shell.cols, 120);
        assert_eq!(parsed.shell.rows, 15);
        assert_eq!(parsed.workdir, DEFAULT_WORKDIR);
    }

    #[test]
    fn test_merge_prefers_explicit_values() {
        let base = SandboxConfig {
            url: Some("10.0.0.1:7070".to_string()),
            workdir: "/srv/app".to_string(),
            ..Default::default()
        };
        let other = SandboxConfig {
            auth_token: Some("secret".to_string()),
            ..Default::default()
        };

        let merged = base.merge(other);
        assert_eq!(merged.url.as_deref(), Some("10.0.0.1:7070"));
        assert_eq!(merged.auth_token.as_deref(), Some("secret"));
        assert_eq!(merged.workdir, "/srv/app");
    }
}
