//! Wire types for the weaver sandbox protocol.
//!
//! This crate defines the envelopes exchanged between:
//! - the sandbox client (`weaver-sandbox`)
//! - a sandbox server (remote, or the local in-process one)
//!
//! Every envelope is one JSON object per line. Requests carry a
//! caller-generated `id`; responses echo it. Events carry an `event` tag
//! and no id.

mod event;
mod request;
mod response;

pub use event::*;
pub use request::*;
pub use response::*;

use serde::{Deserialize, Serialize};

/// Any message a sandbox server may send to a client.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ServerMessage {
    /// Reply to a correlated request.
    Response(SandboxResponse),
    /// Out-of-band notification.
    Event(SandboxEvent),
}

impl ServerMessage {
    /// Parse a single line of the wire format.
    pub fn parse(line: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(line)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_classifies_response() {
        let line = r#"{"id":7,"success":true,"payload":{"pid":3}}"#;
        match ServerMessage::parse(line).unwrap() {
            ServerMessage::Response(response) => {
                assert_eq!(response.id, 7);
                assert!(response.success);
            }
            other => panic!("expected response, got {other:?}"),
        }
    }

    #[test]
    fn test_classifies_event() {
        let line = r#"{"event":"server-ready","data":{"port":5173,"url":"http://localhost:5173"}}"#;
        match ServerMessage::parse(line).unwrap() {
            ServerMessage::Event(SandboxEvent::ServerReady(ready)) => {
                assert_eq!(ready.port, 5173);
            }
            other => panic!("expected server-ready, got {other:?}"),
        }
    }

    #[test]
    fn test_rejects_unknown_event() {
        let line = json!({"event": "telepathy", "data": {}}).to_string();
        assert!(ServerMessage::parse(&line).is_err());
    }
}
