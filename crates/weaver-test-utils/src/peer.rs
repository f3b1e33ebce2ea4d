//! A scripted sandbox server for protocol-level tests.
//!
//! [`ScriptedPeer`] sits on the far end of an in-memory pipe and lets a test
//! read the client's requests and write responses and events by hand, in
//! whatever order the test needs.

use serde_json::Value;
use std::time::Duration;
use tokio::io::{
    AsyncBufReadExt, AsyncWriteExt, BufReader, DuplexStream, Lines, ReadHalf, WriteHalf,
};
use weaver_protocol::{Operation, SandboxEvent, SandboxRequest, SandboxResponse, ServerMessage};
use weaver_sandbox::SandboxClient;

const PIPE_BUFFER: usize = 64 * 1024;
const REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

/// Server end of a client connection, driven by the test.
///
/// # Example
///
/// ```rust,ignore
/// let (client, mut peer) = ScriptedPeer::pair();
/// let read = tokio::spawn(async move { client.readdir("/").await });
///
/// let request = peer.expect_request().await;
/// peer.reply_ok(request.id, json!({"entries": ["a"]})).await;
/// ```
pub struct ScriptedPeer {
    lines: Lines<BufReader<ReadHalf<DuplexStream>>>,
    writer: WriteHalf<DuplexStream>,
}

impl ScriptedPeer {
    /// A connected client and the peer serving it.
    ///
    /// Must be called inside a tokio runtime.
    pub fn pair() -> (SandboxClient, Self) {
        let (client_end, server_end) = tokio::io::duplex(PIPE_BUFFER);
        let (reader, writer) = tokio::io::split(server_end);
        let peer = Self {
            lines: BufReader::new(reader).lines(),
            writer,
        };
        (SandboxClient::from_stream(client_end), peer)
    }

    /// The next request, or `None` once the client hung up.
    pub async fn next_request(&mut self) -> Option<SandboxRequest> {
        let line = self.lines.next_line().await.ok()??;
        Some(
            serde_json::from_str(&line)
                .unwrap_or_else(|e| panic!("Client sent invalid request {line}: {e}")),
        )
    }

    /// The next request. Panics if none arrives in time.
    pub async fn expect_request(&mut self) -> SandboxRequest {
        match tokio::time::timeout(REQUEST_TIMEOUT, self.next_request()).await {
            Ok(Some(request)) => request,
            Ok(None) => panic!("Client closed the connection instead of sending a request"),
            Err(_) => panic!("No request within {REQUEST_TIMEOUT:?}"),
        }
    }

    /// The next request's operation, after checking its wire name.
    pub async fn expect_operation(&mut self, name: &str) -> (u64, Operation) {
        let request = self.expect_request().await;
        assert_eq!(
            request.operation.name(),
            name,
            "unexpected operation: {:?}",
            request.operation
        );
        (request.id, request.operation)
    }

    pub async fn respond(&mut self, response: SandboxResponse) {
        self.send(&ServerMessage::Response(response)).await;
    }

    pub async fn reply_ok(&mut self, id: u64, payload: Value) {
        self.respond(SandboxResponse::ok(id, payload)).await;
    }

    pub async fn reply_empty(&mut self, id: u64) {
        self.respond(SandboxResponse::empty(id)).await;
    }

    pub async fn reply_err(&mut self, id: u64, code: &str, message: &str) {
        self.respond(SandboxResponse::err(id, code, message)).await;
    }

    pub async fn send_event(&mut self, event: SandboxEvent) {
        self.send(&ServerMessage::Event(event)).await;
    }

    /// Write a line exactly as given, e.g. to test malformed input.
    pub async fn send_raw(&mut self, line: &str) {
        self.writer
            .write_all(line.as_bytes())
            .await
            .expect("Failed to write to client");
        self.writer
            .write_all(b"\n")
            .await
            .expect("Failed to write to client");
        self.writer.flush().await.expect("Failed to flush");
    }

    /// Hang up on the client.
    pub async fn close(mut self) {
        let _ = self.writer.shutdown().await;
    }

    async fn send(&mut self, message: &ServerMessage) {
        let line = serde_json::to_string(message).expect("Failed to serialize message");
        self.send_raw(&line).await;
    }
}
