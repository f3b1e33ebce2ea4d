//! Configuration management for weaver.
//!
//! Configuration is loaded from multiple sources and merged:
//! 1. Global config: `~/.config/weaver/config.json`
//! 2. Environment variable: `WEAVER_CONFIG_CONTENT`
//! 3. Project config: `weaver.json` or `weaver.jsonc` in project directory
//! 4. Environment overrides: `WEAVER_SANDBOX_URL`, `WEAVER_SANDBOX_TOKEN`,
//!    `WEAVER_LOG_LEVEL`
//!
//! Supports JSONC (JSON with comments) and variable substitution:
//! - `{env:VAR_NAME}` - Substitute environment variable
//! - `{file:path}` - Substitute file contents

use crate::error::{ConfigError, CoreResult};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use weaver_sandbox::SandboxConfig;
use weaver_util::LogLevel;

/// Static regex for variable substitution, compiled once.
static VAR_REGEX: OnceLock<Option<regex::Regex>> = OnceLock::new();

fn var_regex() -> Option<&'static regex::Regex> {
    VAR_REGEX
        .get_or_init(|| regex::Regex::new(r"\{(env|file):([^}]+)\}").ok())
        .as_ref()
}

/// Main configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    /// JSON Schema reference.
    #[serde(rename = "$schema", skip_serializing_if = "Option::is_none")]
    pub schema: Option<String>,

    /// Log level (trace, debug, info, warn, error).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_level: Option<String>,

    /// Where actions run.
    pub sandbox: SandboxConfig,

    /// Action execution settings.
    pub executor: ExecutorConfig,

    /// Tag parser settings.
    pub parser: ParserConfig,
}

/// Action execution settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ExecutorConfig {
    /// Delay after firing a `start` action before the next action runs.
    pub start_grace_ms: u64,

    /// Shell used to run build commands (`<shell> -c <command>`).
    pub build_command_shell: String,

    /// Candidate build output directories, checked in order.
    pub build_output_dirs: Vec<String>,

    /// Write in-progress file content while it streams.
    pub stream_file_writes: bool,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            start_grace_ms: 2000,
            build_command_shell: "sh".to_string(),
            build_output_dirs: ["dist", "build", "out", ".next", "output"]
                .into_iter()
                .map(String::from)
                .collect(),
            stream_file_writes: true,
        }
    }
}

impl ExecutorConfig {
    /// Merge with another config (other takes precedence where it differs
    /// from the defaults)
    pub fn merge(self, other: Self) -> Self {
        let defaults = Self::default();
        Self {
            start_grace_ms: pick(self.start_grace_ms, other.start_grace_ms, defaults.start_grace_ms),
            build_command_shell: pick(
                self.build_command_shell,
                other.build_command_shell,
                defaults.build_command_shell,
            ),
            build_output_dirs: pick(
                self.build_output_dirs,
                other.build_output_dirs,
                defaults.build_output_dirs,
            ),
            stream_file_writes: pick(
                self.stream_file_writes,
                other.stream_file_writes,
                defaults.stream_file_writes,
            ),
        }
    }
}

/// Tag parser settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ParserConfig {
    /// Surface in-progress file action content as stream updates.
    pub stream_file_actions: bool,
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self {
            stream_file_actions: true,
        }
    }
}

impl ParserConfig {
    pub fn merge(self, other: Self) -> Self {
        Self {
            stream_file_actions: pick(
                self.stream_file_actions,
                other.stream_file_actions,
                Self::default().stream_file_actions,
            ),
        }
    }
}

fn pick<T: PartialEq>(base: T, other: T, default: T) -> T {
    if other == default {
        base
    } else {
        other
    }
}

impl Config {
    /// Load configuration from all sources.
    ///
    /// Loading order (later sources override earlier):
    /// 1. Global config from `~/.config/weaver/`
    /// 2. `WEAVER_CONFIG_CONTENT` environment variable
    /// 3. Project config from the project directory
    /// 4. `WEAVER_*` environment overrides
    ///
    /// Returns the merged config and the files it was read from.
    pub async fn load(project_dir: Option<&Path>) -> CoreResult<(Self, Vec<PathBuf>)> {
        let mut config = Config::default();
        let mut sources = Vec::new();

        if let Some(global_dir) = Self::global_config_dir() {
            for name in &["config.json", "config.jsonc", "weaver.json", "weaver.jsonc"] {
                let path = global_dir.join(name);
                if path.exists() {
                    let loaded = Self::load_file(&path).await?;
                    config = config.merge(loaded);
                    sources.push(path);
                    break;
                }
            }
        }

        if let Ok(content) = std::env::var("WEAVER_CONFIG_CONTENT") {
            let loaded = Self::parse_jsonc(&content, "<env>")?;
            config = config.merge(loaded);
        }

        if let Some(dir) = project_dir {
            for name in &["weaver.jsonc", "weaver.json"] {
                let path = dir.join(name);
                if path.exists() {
                    let loaded = Self::load_file(&path).await?;
                    config = config.merge(loaded);
                    sources.push(path);
                    break;
                }
            }
        }

        config.apply_env_overrides(|name| std::env::var(name).ok());
        config.validate()?;
        Ok((config, sources))
    }

    /// Get the global config directory.
    ///
    /// On Unix systems, prefers `~/.config/weaver` over the platform-specific
    /// directory.
    pub fn global_config_dir() -> Option<PathBuf> {
        #[cfg(unix)]
        {
            if let Some(home) = dirs::home_dir() {
                let xdg_config = home.join(".config").join("weaver");
                if xdg_config.exists() {
                    return Some(xdg_config);
                }
            }
        }

        dirs::config_dir().map(|d| d.join("weaver"))
    }

    /// Load configuration from a file.
    pub async fn load_file(path: &Path) -> CoreResult<Self> {
        let content = tokio::fs::read_to_string(path).await?;
        let content = Self::substitute_variables(&content, path)?;
        Self::parse_jsonc(&content, &path.display().to_string())
    }

    /// Effective log level, if one is configured and valid.
    pub fn log_level(&self) -> Option<LogLevel> {
        self.log_level.as_deref().and_then(LogLevel::parse)
    }

    fn apply_env_overrides(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let Some(url) = var("WEAVER_SANDBOX_URL").filter(|v| !v.is_empty()) {
            self.sandbox.url = Some(url);
        }
        if let Some(token) = var("WEAVER_SANDBOX_TOKEN").filter(|v| !v.is_empty()) {
            self.sandbox.auth_token = Some(token);
        }
        if let Some(level) = var("WEAVER_LOG_LEVEL").filter(|v| !v.is_empty()) {
            self.log_level = Some(level);
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if let Some(level) = &self.log_level {
            if LogLevel::parse(level).is_none() {
                return Err(ConfigError::Validation {
                    message: format!("unknown log level '{level}'"),
                });
            }
        }
        if !self.sandbox.workdir.starts_with('/') {
            return Err(ConfigError::Validation {
                message: format!(
                    "sandbox workdir must be absolute, got '{}'",
                    self.sandbox.workdir
                ),
            });
        }
        if self.executor.build_command_shell.trim().is_empty() {
            return Err(ConfigError::Validation {
                message: "executor.build_command_shell is empty".to_string(),
            });
        }
        Ok(())
    }

    /// Parse JSONC (JSON with comments).
    fn parse_jsonc(content: &str, source: &str) -> CoreResult<Self> {
        let stripped = Self::strip_comments(content);

        serde_json::from_str(&stripped).map_err(|e| {
            ConfigError::InvalidJson {
                path: source.to_string(),
                message: e.to_string(),
            }
            .into()
        })
    }

    /// Strip JSON comments.
    fn strip_comments(input: &str) -> String {
        let mut result = String::with_capacity(input.len());
        let mut chars = input.chars().peekable();
        let mut in_string = false;
        let mut escape_next = false;

        while let Some(c) = chars.next() {
            if escape_next {
                result.push(c);
                escape_next = false;
                continue;
            }

            if c == '\\' && in_string {
                result.push(c);
                escape_next = true;
                continue;
            }

            if c == '"' {
                in_string = !in_string;
                result.push(c);
                continue;
            }

            if in_string {
                result.push(c);
                continue;
            }

            if c == '/' {
                match chars.peek() {
                    Some('/') => {
                        chars.next();
                        for c in chars.by_ref() {
                            if c == '\n' {
                                result.push('\n');
                                break;
                            }
                        }
                        continue;
                    }
                    Some('*') => {
                        chars.next();
                        let mut prev = ' ';
                        for c in chars.by_ref() {
                            if prev == '*' && c == '/' {
                                break;
                            }
                            // Keep line numbers stable for error messages
                            if c == '\n' {
                                result.push('\n');
                            }
                            prev = c;
                        }
                        continue;
                    }
                    _ => {}
                }
            }

            result.push(c);
        }

        result
    }

    /// Substitute `{env:NAME}` and `{file:path}` references.
    ///
    /// File references resolve relative to the config file.
    fn substitute_variables(content: &str, config_path: &Path) -> CoreResult<String> {
        let Some(re) = var_regex() else {
            return Ok(content.to_string());
        };
        let config_dir = config_path.parent().unwrap_or(Path::new("."));

        let mut result = content.to_string();
        let mut last_error: Option<ConfigError> = None;

        for cap in re.captures_iter(content) {
            let (Some(full_match), Some(kind), Some(value)) = (cap.get(0), cap.get(1), cap.get(2))
            else {
                continue;
            };
            let value = value.as_str();

            let replacement = match kind.as_str() {
                "env" => match std::env::var(value) {
                    Ok(v) => v,
                    Err(_) => {
                        last_error = Some(ConfigError::EnvVarNotFound {
                            name: value.to_string(),
                        });
                        continue;
                    }
                },
                "file" => {
                    let file_path = config_dir.join(value);
                    match std::fs::read_to_string(&file_path) {
                        Ok(v) => v.trim().to_string(),
                        Err(_) => {
                            last_error = Some(ConfigError::FileRefNotFound {
                                path: file_path.display().to_string(),
                            });
                            continue;
                        }
                    }
                }
                _ => continue,
            };

            result = result.replace(full_match.as_str(), &replacement);
        }

        if let Some(e) = last_error {
            return Err(e.into());
        }

        Ok(result)
    }

    /// Merge another config into this one (other takes precedence).
    pub fn merge(mut self, other: Self) -> Self {
        if other.schema.is_some() {
            self.schema = other.schema;
        }
        if other.log_level.is_some() {
            self.log_level = other.log_level;
        }
        self.sandbox = self.sandbox.merge(other.sandbox);
        self.executor = self.executor.merge(other.executor);
        self.parser = self.parser.merge(other.parser);
        self
    }
}
