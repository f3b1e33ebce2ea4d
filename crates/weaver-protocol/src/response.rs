//! Responses sent from the sandbox back to the client.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Error body carried by a failed response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
}

impl ErrorBody {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
        }
    }
}

/// A reply correlated to a request by `id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SandboxResponse {
    pub id: u64,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorBody>,
}

impl SandboxResponse {
    /// Successful response with a payload.
    pub fn ok(id: u64, payload: Value) -> Self {
        Self {
            id,
            success: true,
            payload: Some(payload),
            error: None,
        }
    }

    /// Successful response without a payload.
    pub fn empty(id: u64) -> Self {
        Self {
            id,
            success: true,
            payload: None,
            error: None,
        }
    }

    /// Failed response.
    pub fn err(id: u64, code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            id,
            success: false,
            payload: None,
            error: Some(ErrorBody::new(code, message)),
        }
    }

    /// Split into the payload or the error body.
    ///
    /// A failed response without an error body is reported as `EUNKNOWN`.
    pub fn into_result(self) -> Result<Value, ErrorBody> {
        if self.success {
            Ok(self.payload.unwrap_or(Value::Null))
        } else {
            Err(self
                .error
                .unwrap_or_else(|| ErrorBody::new("EUNKNOWN", "request failed")))
        }
    }
}

/// Payload of `readFile`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReadFilePayload {
    /// Base64-encoded file bytes.
    pub content: String,
}

/// Kind of a directory entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    File,
    Directory,
}

/// One entry of a `readdir` payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirEntry {
    pub name: String,
    /// Present only when the request asked for file types.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<EntryKind>,
}

impl DirEntry {
    pub fn is_dir(&self) -> bool {
        self.kind == Some(EntryKind::Directory)
    }
}

/// Payload of `readdir`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReaddirPayload {
    pub entries: Vec<DirEntry>,
}

/// Payload of `watch`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WatchPayload {
    pub watcher_id: String,
}

/// Payload of `spawn`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpawnPayload {
    pub pid: u32,
}
