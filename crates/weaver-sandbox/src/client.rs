//! Client for the sandbox wire protocol.

use crate::error::{SandboxError, SandboxResult};
use crate::events::{EventHub, Subscription};
use crate::process::{ProcessInput, ProcessRegistry, SandboxProcess};
use crate::transport::Transport;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tokio::sync::broadcast;
use tracing::{debug, info};
use weaver_protocol::{
    ContentEncoding, DirEntry, EventKind, FileChangeEvent, FileTree, Operation, ReadFilePayload,
    ReaddirPayload, SandboxEvent, SpawnPayload, TerminalSize, WatchPayload,
};

/// Text encodings accepted by [`SandboxClient::read_text`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TextEncoding {
    /// Strict UTF-8; invalid sequences are an error.
    #[default]
    Utf8,
    /// UTF-8 with invalid sequences replaced by U+FFFD.
    Utf8Lossy,
    /// Little-endian UTF-16, optional BOM.
    Utf16Le,
    /// ISO-8859-1 (also used for ASCII).
    Latin1,
}

impl TextEncoding {
    pub fn as_str(&self) -> &'static str {
        match self {
            TextEncoding::Utf8 => "utf8",
            TextEncoding::Utf8Lossy => "utf8-lossy",
            TextEncoding::Utf16Le => "utf16le",
            TextEncoding::Latin1 => "latin1",
        }
    }

    /// Decode raw bytes.
    pub fn decode(&self, bytes: &[u8]) -> Result<String, String> {
        match self {
            TextEncoding::Utf8 => String::from_utf8(bytes.to_vec()).map_err(|e| e.to_string()),
            TextEncoding::Utf8Lossy => Ok(String::from_utf8_lossy(bytes).into_owned()),
            TextEncoding::Utf16Le => {
                if bytes.len() % 2 != 0 {
                    return Err(format!("odd byte length {}", bytes.len()));
                }
                let units: Vec<u16> = bytes
                    .chunks_exact(2)
                    .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
                    .collect();
                let units = units.strip_prefix(&[0xFEFF]).unwrap_or(&units);
                String::from_utf16(units).map_err(|e| e.to_string())
            }
            TextEncoding::Latin1 => Ok(bytes.iter().map(|&b| char::from(b)).collect()),
        }
    }
}

impl FromStr for TextEncoding {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "utf8" | "utf-8" => Ok(TextEncoding::Utf8),
            "utf8-lossy" | "utf-8-lossy" => Ok(TextEncoding::Utf8Lossy),
            "utf16le" | "utf-16le" | "ucs2" | "ucs-2" => Ok(TextEncoding::Utf16Le),
            "latin1" | "binary" | "ascii" | "iso-8859-1" => Ok(TextEncoding::Latin1),
            other => Err(format!("unsupported text encoding: {other}")),
        }
    }
}

impl fmt::Display for TextEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Flags for [`SandboxClient::remove`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RemoveOptions {
    pub recursive: bool,
    /// Succeed when the path does not exist.
    pub force: bool,
}

impl RemoveOptions {
    /// `rm -rf`
    pub fn recursive_force() -> Self {
        Self {
            recursive: true,
            force: true,
        }
    }
}

struct ClientInner {
    transport: Arc<Transport>,
    events: Arc<EventHub>,
    processes: Arc<ProcessRegistry>,
}

/// Connection to a sandbox.
///
/// Cheap to clone; clones share the same connection.
#[derive(Clone)]
pub struct SandboxClient {
    inner: Arc<ClientInner>,
}

impl SandboxClient {
    /// Run the protocol over an already established duplex stream.
    pub fn from_stream<S>(stream: S) -> Self
    where
        S: AsyncRead + AsyncWrite + Send + 'static,
    {
        let events = EventHub::new();
        let processes = Arc::new(ProcessRegistry::default());

        let route_events = Arc::clone(&events);
        let route_processes = Arc::clone(&processes);
        let close_processes = Arc::clone(&processes);
        let transport = Transport::spawn(
            stream,
            move |event| match event {
                SandboxEvent::ProcessOutput(output) => {
                    route_processes.route_output(output.pid, output.data)
                }
                SandboxEvent::ProcessExit(exit) => {
                    route_processes.route_exit(exit.pid, exit.exit_code)
                }
                other => route_events.emit(&other),
            },
            move || close_processes.close_all(),
        );

        Self {
            inner: Arc::new(ClientInner {
                transport: Arc::new(transport),
                events,
                processes,
            }),
        }
    }

    /// Connect to a sandbox listening on `addr` (`host:port`).
    pub async fn connect_tcp(addr: &str) -> SandboxResult<Self> {
        let stream = TcpStream::connect(addr)
            .await
            .map_err(|e| SandboxError::connection_failed(format!("{addr}: {e}")))?;
        stream.set_nodelay(true)?;
        info!(addr, "Connected to sandbox");
        Ok(Self::from_stream(stream))
    }

    async fn request(&self, operation: Operation) -> SandboxResult<Value> {
        self.inner.transport.request(operation).await
    }

    async fn request_as<T: DeserializeOwned>(&self, operation: Operation) -> SandboxResult<T> {
        let payload = self.request(operation).await?;
        Ok(serde_json::from_value(payload)?)
    }

    async fn request_unit(&self, operation: Operation) -> SandboxResult<()> {
        self.request(operation).await.map(|_| ())
    }

    /// Authenticate the connection. Must be the first request when the
    /// sandbox requires a token.
    pub async fn authenticate(&self, token: &str) -> SandboxResult<()> {
        self.request_unit(Operation::Auth {
            token: token.to_string(),
        })
        .await
    }

    /// Read a file as raw bytes.
    pub async fn read_file(&self, path: &str) -> SandboxResult<Vec<u8>> {
        let payload: ReadFilePayload = self
            .request_as(Operation::ReadFile {
                path: path.to_string(),
            })
            .await?;
        BASE64
            .decode(payload.content)
            .map_err(|e| SandboxError::protocol(format!("invalid base64 for '{path}': {e}")))
    }

    /// Read a file as text.
    pub async fn read_text(&self, path: &str, encoding: TextEncoding) -> SandboxResult<String> {
        let bytes = self.read_file(path).await?;
        encoding.decode(&bytes).map_err(|message| SandboxError::Decode {
            path: path.to_string(),
            encoding: encoding.as_str(),
            message,
        })
    }

    /// Overwrite a file with raw bytes.
    pub async fn write_file(&self, path: &str, content: &[u8]) -> SandboxResult<()> {
        self.request_unit(Operation::WriteFile {
            path: path.to_string(),
            content: BASE64.encode(content),
            encoding: ContentEncoding::Base64,
        })
        .await
    }

    /// Overwrite a file with UTF-8 text.
    pub async fn write_text(&self, path: &str, content: &str) -> SandboxResult<()> {
        self.request_unit(Operation::WriteFile {
            path: path.to_string(),
            content: content.to_string(),
            encoding: ContentEncoding::Utf8,
        })
        .await
    }

    pub async fn mkdir(&self, path: &str, recursive: bool) -> SandboxResult<()> {
        self.request_unit(Operation::Mkdir {
            path: path.to_string(),
            recursive,
        })
        .await
    }

    /// List entry names of a directory.
    pub async fn readdir(&self, path: &str) -> SandboxResult<Vec<String>> {
        let payload: ReaddirPayload = self
            .request_as(Operation::Readdir {
                path: path.to_string(),
                with_file_types: false,
            })
            .await?;
        Ok(payload.entries.into_iter().map(|entry| entry.name).collect())
    }

    /// List a directory with per-entry kinds.
    pub async fn readdir_with_types(&self, path: &str) -> SandboxResult<Vec<DirEntry>> {
        let payload: ReaddirPayload = self
            .request_as(Operation::Readdir {
                path: path.to_string(),
                with_file_types: true,
            })
            .await?;
        Ok(payload.entries)
    }

    pub async fn remove(&self, path: &str, options: RemoveOptions) -> SandboxResult<()> {
        self.request_unit(Operation::Remove {
            path: path.to_string(),
            recursive: options.recursive,
            force: options.force,
        })
        .await
    }

    /// Watch paths matching glob patterns.
    ///
    /// `listener` receives the changes for this watcher only. Dropping the
    /// handle stops local delivery; [`WatchHandle::unwatch`] also stops the
    /// watcher in the sandbox.
    pub async fn watch<F>(&self, patterns: Vec<String>, listener: F) -> SandboxResult<WatchHandle>
    where
        F: Fn(&FileChangeEvent) + Send + Sync + 'static,
    {
        let payload: WatchPayload = self.request_as(Operation::Watch { patterns }).await?;
        let watcher_id = payload.watcher_id;
        debug!(watcher_id = %watcher_id, "Watcher registered");

        let expected = watcher_id.clone();
        let subscription = self.on(EventKind::FileChange, move |event| {
            if let SandboxEvent::FileChange(change) = event {
                if change.watcher_id == expected {
                    listener(change);
                }
            }
        });

        Ok(WatchHandle {
            watcher_id,
            client: self.clone(),
            subscription,
        })
    }

    /// Stop a watcher by id.
    pub async fn unwatch(&self, watcher_id: &str) -> SandboxResult<()> {
        self.request_unit(Operation::Unwatch {
            watcher_id: watcher_id.to_string(),
        })
        .await
    }

    /// Seed a directory tree in one call.
    pub async fn mount(&self, tree: FileTree, mount_point: Option<&str>) -> SandboxResult<()> {
        self.request_unit(Operation::Mount {
            tree,
            mount_point: mount_point.map(str::to_string),
        })
        .await
    }

    /// Start a process.
    pub async fn spawn(
        &self,
        command: &str,
        args: &[String],
        terminal: Option<TerminalSize>,
    ) -> SandboxResult<SandboxProcess> {
        let payload: SpawnPayload = self
            .request_as(Operation::Spawn {
                command: command.to_string(),
                args: args.to_vec(),
                terminal,
            })
            .await?;
        let pid = payload.pid;
        debug!(pid, command, "Spawned sandbox process");

        let (output, exit) = self.inner.processes.claim(pid)?;
        let input = ProcessInput::new(pid, Arc::clone(&self.inner.transport));
        Ok(SandboxProcess::new(pid, input, output, exit))
    }

    /// Register a listener for one event kind.
    pub fn on<F>(&self, kind: EventKind, listener: F) -> Subscription
    where
        F: Fn(&SandboxEvent) + Send + Sync + 'static,
    {
        self.inner.events.on(kind, listener)
    }

    /// Receive every general event.
    pub fn subscribe_all(&self) -> broadcast::Receiver<SandboxEvent> {
        self.inner.events.subscribe_all()
    }

    /// Close the connection. Outstanding requests fail with
    /// [`SandboxError::ConnectionClosed`].
    pub fn close(&self) {
        self.inner.transport.close();
        self.inner.processes.close_all();
    }

    pub fn is_connected(&self) -> bool {
        !self.inner.transport.is_closed()
    }
}

impl fmt::Debug for SandboxClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SandboxClient")
            .field("connected", &self.is_connected())
            .finish()
    }
}

/// An active file watcher.
pub struct WatchHandle {
    watcher_id: String,
    client: SandboxClient,
    subscription: Subscription,
}

impl WatchHandle {
    /// Server-issued watcher id.
    pub fn id(&self) -> &str {
        &self.watcher_id
    }

    /// Stop the watcher in the sandbox and drop the local listener.
    pub async fn unwatch(self) -> SandboxResult<()> {
        self.subscription.unsubscribe();
        self.client.unwatch(&self.watcher_id).await
    }
}
