//! Requests sent from the client to the sandbox.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A correlated request envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SandboxRequest {
    /// Caller-generated identifier, used exactly once.
    pub id: u64,
    /// The operation to perform.
    pub operation: Operation,
}

impl SandboxRequest {
    pub fn new(id: u64, operation: Operation) -> Self {
        Self { id, operation }
    }
}

/// Encoding of file content on the wire.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentEncoding {
    #[default]
    Utf8,
    Base64,
}

/// Pseudo-terminal dimensions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TerminalSize {
    pub cols: u16,
    pub rows: u16,
}

impl Default for TerminalSize {
    fn default() -> Self {
        Self { cols: 80, rows: 24 }
    }
}

/// A directory tree seeded by a single `mount` call.
pub type FileTree = BTreeMap<String, FileTreeNode>;

/// One node of a [`FileTree`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileTreeNode {
    File { contents: String },
    Directory(FileTree),
}

impl FileTreeNode {
    pub fn file(contents: impl Into<String>) -> Self {
        Self::File {
            contents: contents.into(),
        }
    }
}

/// Filesystem and process operations understood by a sandbox.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum Operation {
    /// Authenticate the connection. Must precede every other request.
    Auth { token: String },

    /// Read a file. The payload carries base64 content.
    ReadFile { path: String },

    /// Overwrite a file.
    WriteFile {
        path: String,
        content: String,
        #[serde(default)]
        encoding: ContentEncoding,
    },

    /// Create a directory.
    Mkdir {
        path: String,
        #[serde(default)]
        recursive: bool,
    },

    /// List a directory.
    Readdir {
        path: String,
        #[serde(default)]
        with_file_types: bool,
    },

    /// Remove a file or directory.
    #[serde(rename = "rm")]
    Remove {
        path: String,
        #[serde(default)]
        recursive: bool,
        #[serde(default)]
        force: bool,
    },

    /// Watch paths matching glob patterns.
    Watch { patterns: Vec<String> },

    /// Stop a watcher.
    Unwatch { watcher_id: String },

    /// Seed a whole directory tree.
    Mount {
        tree: FileTree,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        mount_point: Option<String>,
    },

    /// Start a process.
    Spawn {
        command: String,
        #[serde(default)]
        args: Vec<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        terminal: Option<TerminalSize>,
    },

    /// Write to a process's input.
    Stdin { pid: u32, data: String },

    /// Resize a process's terminal.
    Resize { pid: u32, cols: u16, rows: u16 },

    /// Terminate a process.
    Kill { pid: u32 },
}

impl Operation {
    /// Wire name of the operation, for logging.
    pub fn name(&self) -> &'static str {
        match self {
            Operation::Auth { .. } => "auth",
            Operation::ReadFile { .. } => "readFile",
            Operation::WriteFile { .. } => "writeFile",
            Operation::Mkdir { .. } => "mkdir",
            Operation::Readdir { .. } => "readdir",
            Operation::Remove { .. } => "rm",
            Operation::Watch { .. } => "watch",
            Operation::Unwatch { .. } => "unwatch",
            Operation::Mount { .. } => "mount",
            Operation::Spawn { .. } => "spawn",
            Operation::Stdin { .. } => "stdin",
            Operation::Resize { .. } => "resize",
            Operation::Kill { .. } => "kill",
        }
    }
}
