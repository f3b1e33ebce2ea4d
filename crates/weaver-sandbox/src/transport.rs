//! Newline-delimited JSON transport to a sandbox.
//!
//! One reader task and one writer task per connection. Requests are
//! correlated with responses through a map of pending completion handles;
//! when the connection goes away every entry in that map is rejected with
//! [`SandboxError::ConnectionClosed`] exactly once.

use crate::error::{SandboxError, SandboxResult};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};
use weaver_protocol::{Operation, SandboxEvent, SandboxRequest, ServerMessage};

type Completion = oneshot::Sender<SandboxResult<Value>>;

/// Requests awaiting a response.
#[derive(Default)]
struct PendingRequests {
    inner: Mutex<PendingMap>,
}

#[derive(Default)]
struct PendingMap {
    closed: bool,
    requests: HashMap<u64, Completion>,
}

impl PendingRequests {
    fn lock(&self) -> std::sync::MutexGuard<'_, PendingMap> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn register(&self, id: u64) -> SandboxResult<oneshot::Receiver<SandboxResult<Value>>> {
        let mut map = self.lock();
        if map.closed {
            return Err(SandboxError::ConnectionClosed);
        }
        let (tx, rx) = oneshot::channel();
        map.requests.insert(id, tx);
        Ok(rx)
    }

    /// Complete a request. Returns false when the id is unknown.
    fn resolve(&self, id: u64, result: SandboxResult<Value>) -> bool {
        let Some(sender) = self.lock().requests.remove(&id) else {
            return false;
        };
        // The caller may have stopped waiting
        let _ = sender.send(result);
        true
    }

    fn forget(&self, id: u64) {
        self.lock().requests.remove(&id);
    }

    /// Reject everything outstanding and refuse new registrations.
    fn close(&self) -> usize {
        let drained: Vec<Completion> = {
            let mut map = self.lock();
            map.closed = true;
            map.requests.drain().map(|(_, sender)| sender).collect()
        };
        let count = drained.len();
        for sender in drained {
            let _ = sender.send(Err(SandboxError::ConnectionClosed));
        }
        count
    }

    fn is_closed(&self) -> bool {
        self.lock().closed
    }
}

/// Handle to a running connection.
pub(crate) struct Transport {
    outgoing: mpsc::UnboundedSender<String>,
    next_id: AtomicU64,
    pending: Arc<PendingRequests>,
    shutdown: CancellationToken,
}

impl Transport {
    /// Start the I/O loops over a duplex byte stream.
    ///
    /// `on_event` runs on the reader task for every event, in arrival order.
    /// `on_close` runs once after the connection is torn down.
    pub(crate) fn spawn<S, E, C>(stream: S, on_event: E, on_close: C) -> Self
    where
        S: AsyncRead + AsyncWrite + Send + 'static,
        E: Fn(SandboxEvent) + Send + 'static,
        C: FnOnce() + Send + 'static,
    {
        let (reader, writer) = tokio::io::split(stream);
        let (outgoing, outgoing_rx) = mpsc::unbounded_channel::<String>();
        let pending = Arc::new(PendingRequests::default());
        let shutdown = CancellationToken::new();

        let reader_pending = Arc::clone(&pending);
        let reader_shutdown = shutdown.clone();
        tokio::spawn(async move {
            Self::reader_loop(reader, &reader_pending, &reader_shutdown, on_event).await;
            let rejected = reader_pending.close();
            if rejected > 0 {
                warn!(rejected, "Sandbox connection lost with requests outstanding");
            }
            reader_shutdown.cancel();
            on_close();
        });

        let writer_pending = Arc::clone(&pending);
        let writer_shutdown = shutdown.clone();
        tokio::spawn(async move {
            Self::writer_loop(writer, outgoing_rx, &writer_shutdown).await;
            writer_pending.close();
            writer_shutdown.cancel();
        });

        Self {
            outgoing,
            next_id: AtomicU64::new(1),
            pending,
            shutdown,
        }
    }

    async fn reader_loop<R, E>(
        reader: R,
        pending: &PendingRequests,
        shutdown: &CancellationToken,
        on_event: E,
    ) where
        R: AsyncRead + Unpin,
        E: Fn(SandboxEvent),
    {
        let mut lines = BufReader::new(reader).lines();

        loop {
            let next = tokio::select! {
                _ = shutdown.cancelled() => break,
                next = lines.next_line() => next,
            };

            match next {
                Ok(Some(line)) => {
                    if line.trim().is_empty() {
                        continue;
                    }
                    trace!("Received: {}", line);

                    match ServerMessage::parse(&line) {
                        Ok(ServerMessage::Response(response)) => {
                            let id = response.id;
                            let result = response.into_result().map_err(SandboxError::from);
                            if !pending.resolve(id, result) {
                                warn!(id, "Dropping response with unknown id");
                            }
                        }
                        Ok(ServerMessage::Event(event)) => on_event(event),
                        Err(e) => warn!("Failed to parse sandbox message: {} ({})", line, e),
                    }
                }
                Ok(None) => {
                    info!("Sandbox connection closed by peer");
                    break;
                }
                Err(e) => {
                    error!("Error reading from sandbox: {}", e);
                    break;
                }
            }
        }
    }

    async fn writer_loop<W>(
        mut writer: W,
        mut rx: mpsc::UnboundedReceiver<String>,
        shutdown: &CancellationToken,
    ) where
        W: AsyncWrite + Unpin,
    {
        loop {
            let msg = tokio::select! {
                _ = shutdown.cancelled() => break,
                msg = rx.recv() => match msg {
                    Some(msg) => msg,
                    None => break,
                },
            };

            trace!("Sending: {}", msg);
            if let Err(e) = writer.write_all(msg.as_bytes()).await {
                error!("Error writing to sandbox: {}", e);
                break;
            }
            if let Err(e) = writer.write_all(b"\n").await {
                error!("Error writing newline: {}", e);
                break;
            }
            if let Err(e) = writer.flush().await {
                error!("Error flushing sandbox stream: {}", e);
                break;
            }
        }
        let _ = writer.shutdown().await;
    }

    /// Send an operation and wait for its response payload.
    pub(crate) async fn request(&self, operation: Operation) -> SandboxResult<Value> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let name = operation.name();
        let rx = self.pending.register(id)?;

        let line = match serde_json::to_string(&SandboxRequest::new(id, operation)) {
            Ok(line) => line,
            Err(e) => {
                self.pending.forget(id);
                return Err(e.into());
            }
        };

        debug!(id, op = name, "Sending sandbox request");
        if self.outgoing.send(line).is_err() {
            self.pending.forget(id);
            return Err(SandboxError::ConnectionClosed);
        }

        rx.await.unwrap_or(Err(SandboxError::ConnectionClosed))
    }

    /// Tear down the connection, rejecting outstanding requests.
    pub(crate) fn close(&self) {
        let rejected = self.pending.close();
        if rejected > 0 {
            debug!(rejected, "Rejected pending sandbox requests on close");
        }
        self.shutdown.cancel();
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.shutdown.is_cancelled() || self.pending.is_closed()
    }
}

impl Drop for Transport {
    fn drop(&mut self) {
        self.close();
    }
}
