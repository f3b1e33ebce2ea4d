//! Action data model.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifies one action: the turn it came from and its position in it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ActionId {
    pub turn_id: String,
    pub seq: u32,
}

impl ActionId {
    pub fn new(turn_id: impl Into<String>, seq: u32) -> Self {
        Self {
            turn_id: turn_id.into(),
            seq,
        }
    }
}

impl fmt::Display for ActionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.turn_id, self.seq)
    }
}

/// The value of an action tag's `type` attribute.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionKind {
    File,
    Modify,
    Shell,
    Start,
    Build,
    /// Anything else, kept verbatim (empty when the attribute is missing).
    Unknown(String),
}

impl ActionKind {
    pub fn parse(value: &str) -> Self {
        match value {
            "file" => Self::File,
            "modify" => Self::Modify,
            "shell" => Self::Shell,
            "start" => Self::Start,
            "build" => Self::Build,
            other => Self::Unknown(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::File => "file",
            Self::Modify => "modify",
            Self::Shell => "shell",
            Self::Start => "start",
            Self::Build => "build",
            Self::Unknown(name) => name,
        }
    }

    /// Whether the tag must carry a `path` attribute.
    pub fn requires_path(&self) -> bool {
        matches!(self, Self::File | Self::Modify)
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One find/replace pair of a modify action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Modification {
    pub find: String,
    pub replace: String,
}

impl Modification {
    pub fn new(find: impl Into<String>, replace: impl Into<String>) -> Self {
        Self {
            find: find.into(),
            replace: replace.into(),
        }
    }
}

/// A machine-actionable instruction extracted from generated text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Action {
    /// Write the whole file.
    File { path: String, content: String },
    /// Patch an existing file in place.
    Modify {
        path: String,
        modifications: Vec<Modification>,
    },
    /// Run a command in the interactive shell and wait for it.
    Shell { command: String },
    /// Run a long-lived command (dev server) without waiting for it.
    Start { command: String },
    /// Run a build command in its own process.
    Build { command: String },
    /// A tag with an unrecognized type. Executes as a no-op.
    Unknown { kind: String, content: String },
}

impl Action {
    pub fn kind(&self) -> ActionKind {
        match self {
            Self::File { .. } => ActionKind::File,
            Self::Modify { .. } => ActionKind::Modify,
            Self::Shell { .. } => ActionKind::Shell,
            Self::Start { .. } => ActionKind::Start,
            Self::Build { .. } => ActionKind::Build,
            Self::Unknown { kind, .. } => ActionKind::Unknown(kind.clone()),
        }
    }

    /// Target path for file and modify actions.
    pub fn path(&self) -> Option<&str> {
        match self {
            Self::File { path, .. } | Self::Modify { path, .. } => Some(path),
            _ => None,
        }
    }

    /// Command line for shell, start and build actions.
    pub fn command(&self) -> Option<&str> {
        match self {
            Self::Shell { command } | Self::Start { command } | Self::Build { command } => {
                Some(command.trim_end())
            }
            _ => None,
        }
    }

    pub fn is_file(&self) -> bool {
        matches!(self, Self::File { .. })
    }

    /// Short description for logs and listings.
    pub fn summary(&self) -> String {
        match self {
            Self::File { path, content } => format!("write {path} ({} bytes)", content.len()),
            Self::Modify {
                path,
                modifications,
            } => format!("patch {path} ({} blocks)", modifications.len()),
            Self::Shell { command } | Self::Start { command } | Self::Build { command } => {
                format!("{} `{}`", self.kind(), command.trim_end())
            }
            Self::Unknown { kind, .. } => format!("unknown action '{kind}'"),
        }
    }
}
