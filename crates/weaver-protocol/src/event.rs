//! Out-of-band events pushed by the sandbox.

use serde::{Deserialize, Serialize};
use std::fmt;

/// An uncorrelated notification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "kebab-case")]
pub enum SandboxEvent {
    /// A network port was opened or closed inside the sandbox.
    Port(PortEvent),
    /// A dev server is accepting connections.
    ServerReady(ServerReadyEvent),
    /// A message (typically an uncaught error) from the sandboxed preview.
    PreviewMessage(PreviewMessageEvent),
    /// A watched path changed.
    FileChange(FileChangeEvent),
    /// Sandbox-level error.
    Error(ErrorEvent),
    /// Output chunk from a spawned process.
    ProcessOutput(ProcessOutputEvent),
    /// A spawned process exited.
    ProcessExit(ProcessExitEvent),
}

impl SandboxEvent {
    /// Kind used to key listeners.
    pub fn kind(&self) -> EventKind {
        match self {
            SandboxEvent::Port(_) => EventKind::Port,
            SandboxEvent::ServerReady(_) => EventKind::ServerReady,
            SandboxEvent::PreviewMessage(_) => EventKind::PreviewMessage,
            SandboxEvent::FileChange(_) => EventKind::FileChange,
            SandboxEvent::Error(_) => EventKind::Error,
            SandboxEvent::ProcessOutput(_) => EventKind::ProcessOutput,
            SandboxEvent::ProcessExit(_) => EventKind::ProcessExit,
        }
    }
}

/// Listener key for [`SandboxEvent`]s.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Port,
    ServerReady,
    PreviewMessage,
    FileChange,
    Error,
    ProcessOutput,
    ProcessExit,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::Port => "port",
            EventKind::ServerReady => "server-ready",
            EventKind::PreviewMessage => "preview-message",
            EventKind::FileChange => "file-change",
            EventKind::Error => "error",
            EventKind::ProcessOutput => "process-output",
            EventKind::ProcessExit => "process-exit",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PortKind {
    Open,
    Close,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortEvent {
    pub port: u16,
    pub kind: PortKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerReadyEvent {
    pub port: u16,
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PreviewMessageEvent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preview_id: Option<String>,
    pub message: serde_json::Value,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileChangeKind {
    Add,
    Change,
    Remove,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileChangeEvent {
    pub watcher_id: String,
    pub path: String,
    pub kind: FileChangeKind,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorEvent {
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessOutputEvent {
    pub pid: u32,
    pub data: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessExitEvent {
    pub pid: u32,
    pub exit_code: i32,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_event_wire_shape() {
        let event = SandboxEvent::FileChange(FileChangeEvent {
            watcher_id: "wch_1".to_string(),
            path: "/home/project/src/a.ts".to_string(),
            kind: FileChangeKind::Change,
        });
        assert_eq!(
            serde_json::to_value(&event).unwrap(),
            json!({
                "event": "file-change",
                "data": {"watcherId": "wch_1", "path": "/home/project/src/a.ts", "kind": "change"}
            })
        );
    }

    #[test]
    fn test_kind_names_match_wire_tags() {
        let event = SandboxEvent::ProcessExit(ProcessExitEvent {
            pid: 1,
            exit_code: 0,
        });
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["event"], event.kind().as_str());
    }
}
