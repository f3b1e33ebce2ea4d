//! Local sandbox server.
//!
//! Serves the sandbox protocol against a host directory that is presented
//! to clients as the sandbox workdir. Used in-process when no remote
//! sandbox is configured, and over TCP by `weaver serve`.

mod jsh;
mod watch;

use crate::client::SandboxClient;
use crate::config::{SandboxConfig, DEFAULT_SHELL};
use crate::error::{SandboxError, SandboxResult};
use crate::path::PathMapper;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use jsh::{drain_pumps, exit_code, pump_output, LineShell};
use serde_json::Value;
use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::TcpListener;
use tokio::process::Command;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use watch::LocalWatcher;
use weaver_protocol::{
    ContentEncoding, DirEntry, EntryKind, ErrorBody, FileTree, FileTreeNode, Operation,
    ProcessExitEvent, ProcessOutputEvent, ReadFilePayload, ReaddirPayload, SandboxEvent,
    SandboxRequest, SandboxResponse, ServerMessage, SpawnPayload, WatchPayload,
};
use weaver_util::Identifier;

/// Buffer size of the in-process duplex pipe.
const DUPLEX_BUFFER: usize = 64 * 1024;

/// Serialized messages going to one client.
#[derive(Clone)]
pub(crate) struct Outbound(mpsc::UnboundedSender<String>);

impl Outbound {
    pub(crate) fn new(tx: mpsc::UnboundedSender<String>) -> Self {
        Self(tx)
    }

    fn send(&self, message: &ServerMessage) {
        match serde_json::to_string(message) {
            Ok(line) => {
                // Client gone; nothing to do
                let _ = self.0.send(line);
            }
            Err(e) => error!("Failed to serialize sandbox message: {}", e),
        }
    }

    fn respond(&self, response: SandboxResponse) {
        self.send(&ServerMessage::Response(response));
    }

    pub(crate) fn event(&self, event: SandboxEvent) {
        self.send(&ServerMessage::Event(event));
    }

    pub(crate) fn output(&self, pid: u32, data: impl Into<String>) {
        self.event(SandboxEvent::ProcessOutput(ProcessOutputEvent {
            pid,
            data: data.into(),
        }));
    }

    pub(crate) fn exit(&self, pid: u32, exit_code: i32) {
        self.event(SandboxEvent::ProcessExit(ProcessExitEvent { pid, exit_code }));
    }
}

/// Map an I/O error to a protocol error body.
fn io_error(e: &io::Error, path: &str) -> ErrorBody {
    let code = match e.kind() {
        io::ErrorKind::NotFound => "ENOENT",
        io::ErrorKind::PermissionDenied => "EACCES",
        io::ErrorKind::AlreadyExists => "EEXIST",
        io::ErrorKind::InvalidInput | io::ErrorKind::InvalidData => "EINVAL",
        _ => "EIO",
    };
    ErrorBody::new(code, format!("{path}: {e}"))
}

fn no_such_process(pid: u32) -> ErrorBody {
    ErrorBody::new("ESRCH", format!("no such process: {pid}"))
}

/// A sandbox backed by a host directory.
#[derive(Debug, Clone)]
pub struct LocalSandbox {
    mapper: Arc<PathMapper>,
    token: Option<String>,
}

impl LocalSandbox {
    /// Serve `host_root` as `workdir`.
    pub fn new(host_root: impl Into<PathBuf>, workdir: impl Into<PathBuf>) -> Self {
        Self {
            mapper: Arc::new(PathMapper::new(host_root.into(), workdir.into())),
            token: None,
        }
    }

    /// Require clients to authenticate with `token`.
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    /// Build from configuration. The root directory must exist.
    pub fn from_config(config: &SandboxConfig) -> SandboxResult<Self> {
        let root = std::fs::canonicalize(&config.root).map_err(|e| {
            SandboxError::InvalidPath(format!("{}: {e}", config.root.display()))
        })?;
        let mut sandbox = Self::new(root, &config.workdir);
        sandbox.token = config.auth_token.clone();
        Ok(sandbox)
    }

    pub fn mapper(&self) -> &PathMapper {
        &self.mapper
    }

    /// Start serving on an in-memory pipe and return a client for it.
    pub fn connect_in_process(&self) -> SandboxClient {
        let (client_end, server_end) = tokio::io::duplex(DUPLEX_BUFFER);
        let server = self.clone();
        tokio::spawn(async move {
            if let Err(e) = server.serve(server_end).await {
                warn!("In-process sandbox stopped: {}", e);
            }
        });
        SandboxClient::from_stream(client_end)
    }

    /// Bind `addr` and serve every incoming connection.
    pub async fn listen(&self, addr: &str) -> SandboxResult<()> {
        let listener = TcpListener::bind(addr).await?;
        self.serve_listener(listener).await
    }

    /// Serve connections accepted from `listener`.
    pub async fn serve_listener(&self, listener: TcpListener) -> SandboxResult<()> {
        info!(
            addr = %listener.local_addr()?,
            root = %self.mapper.host_root().display(),
            "Local sandbox listening"
        );
        loop {
            let (stream, peer) = listener.accept().await?;
            let _ = stream.set_nodelay(true);
            info!(%peer, "Sandbox client connected");
            let server = self.clone();
            tokio::spawn(async move {
                if let Err(e) = server.serve(stream).await {
                    warn!(%peer, "Sandbox connection failed: {}", e);
                }
                info!(%peer, "Sandbox client disconnected");
            });
        }
    }

    /// Serve one client over a duplex stream until it disconnects.
    pub async fn serve<S>(&self, stream: S) -> SandboxResult<()>
    where
        S: AsyncRead + AsyncWrite + Send + 'static,
    {
        let (reader, mut writer) = tokio::io::split(stream);
        let (tx, mut rx) = mpsc::unbounded_channel::<String>();

        let writer_task = tokio::spawn(async move {
            while let Some(line) = rx.recv().await {
                if writer.write_all(line.as_bytes()).await.is_err()
                    || writer.write_all(b"\n").await.is_err()
                    || writer.flush().await.is_err()
                {
                    break;
                }
            }
            let _ = writer.shutdown().await;
        });

        let mut connection = Connection::new(self.clone(), Outbound::new(tx));
        let mut lines = BufReader::new(reader).lines();
        let result = loop {
            match lines.next_line().await {
                Ok(Some(line)) => {
                    if !line.trim().is_empty() {
                        connection.dispatch(&line).await;
                    }
                }
                Ok(None) => break Ok(()),
                Err(e) => break Err(e.into()),
            }
        };

        connection.shutdown();
        drop(connection);
        let _ = writer_task.await;
        result
    }
}

struct LocalProcess {
    stdin: mpsc::UnboundedSender<String>,
    kill: CancellationToken,
    exited: CancellationToken,
}

impl LocalProcess {
    fn is_running(&self) -> bool {
        !self.exited.is_cancelled()
    }
}

/// Per-client state.
struct Connection {
    sandbox: LocalSandbox,
    out: Outbound,
    authenticated: bool,
    next_pid: u32,
    processes: HashMap<u32, LocalProcess>,
    watchers: HashMap<String, LocalWatcher>,
}

impl Connection {
    fn new(sandbox: LocalSandbox, out: Outbound) -> Self {
        let authenticated = sandbox.token.is_none();
        Self {
            sandbox,
            out,
            authenticated,
            next_pid: 1,
            processes: HashMap::new(),
            watchers: HashMap::new(),
        }
    }

    async fn dispatch(&mut self, line: &str) {
        let request: SandboxRequest = match serde_json::from_str(line) {
            Ok(request) => request,
            Err(e) => {
                // Answer if we can at least find the id
                let id = serde_json::from_str::<Value>(line)
                    .ok()
                    .and_then(|v| v.get("id").and_then(Value::as_u64));
                match id {
                    Some(id) => self.out.respond(SandboxResponse::err(
                        id,
                        "EINVAL",
                        format!("invalid request: {e}"),
                    )),
                    None => warn!("Ignoring malformed request: {}", line),
                }
                return;
            }
        };

        let id = request.id;
        let op = request.operation.name();
        debug!(id, op, "Handling sandbox request");

        let response = match self.handle(request.operation).await {
            Ok(Some(payload)) => SandboxResponse::ok(id, payload),
            Ok(None) => SandboxResponse::empty(id),
            Err(body) => {
                debug!(id, op, code = %body.code, "Sandbox request failed: {}", body.message);
                SandboxResponse::err(id, body.code, body.message)
            }
        };
        self.out.respond(response);
    }

    fn resolve(&self, path: &str) -> Result<PathBuf, ErrorBody> {
        self.sandbox
            .mapper
            .resolve(path)
            .ok_or_else(|| ErrorBody::new("EACCES", format!("{path}: outside of workspace")))
    }

    async fn handle(&mut self, operation: Operation) -> Result<Option<Value>, ErrorBody> {
        if let Operation::Auth { token } = &operation {
            return self.authenticate(token);
        }
        if !self.authenticated {
            return Err(ErrorBody::new("EAUTH", "authentication required"));
        }

        match operation {
            Operation::Auth { .. } => Ok(None),
            Operation::ReadFile { path } => {
                let host = self.resolve(&path)?;
                let bytes = tokio::fs::read(&host).await.map_err(|e| io_error(&e, &path))?;
                to_payload(ReadFilePayload {
                    content: BASE64.encode(bytes),
                })
            }
            Operation::WriteFile {
                path,
                content,
                encoding,
            } => {
                let host = self.resolve(&path)?;
                let bytes = match encoding {
                    ContentEncoding::Utf8 => content.into_bytes(),
                    ContentEncoding::Base64 => BASE64
                        .decode(content)
                        .map_err(|e| ErrorBody::new("EINVAL", format!("{path}: {e}")))?,
                };
                tokio::fs::write(&host, bytes)
                    .await
                    .map_err(|e| io_error(&e, &path))?;
                Ok(None)
            }
            Operation::Mkdir { path, recursive } => {
                let host = self.resolve(&path)?;
                let result = if recursive {
                    tokio::fs::create_dir_all(&host).await
                } else {
                    tokio::fs::create_dir(&host).await
                };
                result.map_err(|e| io_error(&e, &path))?;
                Ok(None)
            }
            Operation::Readdir {
                path,
                with_file_types,
            } => {
                let host = self.resolve(&path)?;
                let entries = read_dir(&host, with_file_types)
                    .await
                    .map_err(|e| io_error(&e, &path))?;
                to_payload(ReaddirPayload { entries })
            }
            Operation::Remove {
                path,
                recursive,
                force,
            } => {
                let host = self.resolve(&path)?;
                if host == self.sandbox.mapper.host_root() {
                    return Err(ErrorBody::new("EPERM", "refusing to remove the workdir"));
                }
                remove(&host, recursive, force)
                    .await
                    .map_err(|e| io_error(&e, &path))?;
                Ok(None)
            }
            Operation::Watch { patterns } => {
                let watcher_id = Identifier::watcher();
                let watcher = LocalWatcher::start(
                    watcher_id.clone(),
                    &patterns,
                    Arc::clone(&self.sandbox.mapper),
                    self.out.clone(),
                )
                .map_err(|e| ErrorBody::new("EINVAL", e.to_string()))?;
                self.watchers.insert(watcher_id.clone(), watcher);
                to_payload(WatchPayload { watcher_id })
            }
            Operation::Unwatch { watcher_id } => match self.watchers.remove(&watcher_id) {
                Some(_) => Ok(None),
                None => Err(ErrorBody::new(
                    "ENOENT",
                    format!("unknown watcher: {watcher_id}"),
                )),
            },
            Operation::Mount { tree, mount_point } => {
                let point = mount_point.unwrap_or_else(|| ".".to_string());
                let host = self.resolve(&point)?;
                mount(&host, &tree)
                    .await
                    .map_err(|e| io_error(&e, &point))?;
                Ok(None)
            }
            Operation::Spawn { command, args, .. } => {
                let pid = self.spawn(&command, &args)?;
                to_payload(SpawnPayload { pid })
            }
            Operation::Stdin { pid, data } => {
                let process = self.processes.get(&pid).ok_or_else(|| no_such_process(pid))?;
                process.stdin.send(data).map_err(|_| no_such_process(pid))?;
                Ok(None)
            }
            Operation::Resize { pid, .. } => {
                // No pseudo-terminal behind local processes
                match self.processes.get(&pid) {
                    Some(process) if process.is_running() => Ok(None),
                    _ => Err(no_such_process(pid)),
                }
            }
            Operation::Kill { pid } => match self.processes.get(&pid) {
                Some(process) if process.is_running() => {
                    process.kill.cancel();
                    Ok(None)
                }
                _ => Err(no_such_process(pid)),
            },
        }
    }

    fn authenticate(&mut self, token: &str) -> Result<Option<Value>, ErrorBody> {
        match &self.sandbox.token {
            Some(expected) if expected != token => {
                Err(ErrorBody::new("EACCES", "invalid authentication token"))
            }
            _ => {
                self.authenticated = true;
                Ok(None)
            }
        }
    }

    fn spawn(&mut self, command: &str, args: &[String]) -> Result<u32, ErrorBody> {
        // Exited processes only linger until the next spawn
        self.processes.retain(|_, process| process.is_running());
        let pid = self.next_pid;
        let cwd = self.sandbox.mapper.host_root().to_path_buf();
        let (stdin_tx, stdin_rx) = mpsc::unbounded_channel();
        let kill = CancellationToken::new();
        let exited = CancellationToken::new();
        let out = self.out.clone();

        if command == DEFAULT_SHELL {
            let shell = LineShell::new(pid, cwd, stdin_rx, kill.clone(), out.clone());
            let exited = exited.clone();
            tokio::spawn(async move {
                let code = shell.run().await;
                exited.cancel();
                out.exit(pid, code);
            });
        } else {
            let mut child = Command::new(command)
                .args(args)
                .current_dir(&cwd)
                .stdin(Stdio::piped())
                .stdout(Stdio::piped())
                .stderr(Stdio::piped())
                .kill_on_drop(true)
                .spawn()
                .map_err(|e| io_error(&e, command))?;

            let mut pumps = Vec::new();
            if let Some(stdout) = child.stdout.take() {
                pumps.push(pump_output(pid, stdout, out.clone()));
            }
            if let Some(stderr) = child.stderr.take() {
                pumps.push(pump_output(pid, stderr, out.clone()));
            }
            if let Some(mut stdin) = child.stdin.take() {
                let mut stdin_rx = stdin_rx;
                let exited = exited.clone();
                tokio::spawn(async move {
                    loop {
                        let data = tokio::select! {
                            _ = exited.cancelled() => break,
                            data = stdin_rx.recv() => match data {
                                Some(data) => data,
                                None => break,
                            },
                        };
                        if stdin.write_all(data.as_bytes()).await.is_err()
                            || stdin.flush().await.is_err()
                        {
                            break;
                        }
                    }
                });
            }

            let kill = kill.clone();
            let exited = exited.clone();
            tokio::spawn(async move {
                let code = tokio::select! {
                    status = child.wait() => match status {
                        Ok(status) => exit_code(status),
                        Err(e) => {
                            warn!(pid, "Failed to wait for process: {}", e);
                            -1
                        }
                    },
                    _ = kill.cancelled() => {
                        let _ = child.kill().await;
                        child.wait().await.map(exit_code).unwrap_or(-1)
                    }
                };
                drain_pumps(pumps).await;
                exited.cancel();
                out.exit(pid, code);
            });
        }

        debug!(pid, command, "Spawned local process");
        self.next_pid += 1;
        self.processes.insert(
            pid,
            LocalProcess {
                stdin: stdin_tx,
                kill,
                exited,
            },
        );
        Ok(pid)
    }

    /// Kill processes and stop watchers of a departing client.
    fn shutdown(&mut self) {
        for process in self.processes.values() {
            process.kill.cancel();
        }
        self.processes.clear();
        self.watchers.clear();
    }
}

fn to_payload<T: serde::Serialize>(payload: T) -> Result<Option<Value>, ErrorBody> {
    serde_json::to_value(payload)
        .map(Some)
        .map_err(|e| ErrorBody::new("EIO", e.to_string()))
}

async fn read_dir(path: &Path, with_file_types: bool) -> io::Result<Vec<DirEntry>> {
    let mut dir = tokio::fs::read_dir(path).await?;
    let mut entries = Vec::new();
    while let Some(entry) = dir.next_entry().await? {
        let kind = if with_file_types {
            let file_type = entry.file_type().await?;
            Some(if file_type.is_dir() {
                EntryKind::Directory
            } else {
                EntryKind::File
            })
        } else {
            None
        };
        entries.push(DirEntry {
            name: entry.file_name().to_string_lossy().into_owned(),
            kind,
        });
    }
    entries.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(entries)
}

async fn remove(path: &Path, recursive: bool, force: bool) -> io::Result<()> {
    let metadata = match tokio::fs::symlink_metadata(path).await {
        Ok(metadata) => metadata,
        Err(e) if force && e.kind() == io::ErrorKind::NotFound => return Ok(()),
        Err(e) => return Err(e),
    };
    if metadata.is_dir() {
        if recursive {
            tokio::fs::remove_dir_all(path).await
        } else {
            tokio::fs::remove_dir(path).await
        }
    } else {
        tokio::fs::remove_file(path).await
    }
}

async fn mount(root: &Path, tree: &FileTree) -> io::Result<()> {
    tokio::fs::create_dir_all(root).await?;
    // Iterative to avoid boxing a recursive future
    let mut stack: Vec<(PathBuf, &FileTree)> = vec![(root.to_path_buf(), tree)];
    while let Some((dir, tree)) = stack.pop() {
        for (name, node) in tree {
            if name.is_empty() || name.contains('/') || name == "." || name == ".." {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidInput,
                    format!("invalid entry name: {name:?}"),
                ));
            }
            let path = dir.join(name);
            match node {
                FileTreeNode::File { contents } => tokio::fs::write(&path, contents).await?,
                FileTreeNode::Directory(children) => {
                    tokio::fs::create_dir_all(&path).await?;
                    stack.push((path, children));
                }
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sandbox(dir: &tempfile::TempDir) -> LocalSandbox {
        LocalSandbox::new(dir.path(), "/home/project")
    }

    #[tokio::test]
    async fn test_write_read_round_trip_over_client() {
        let dir = tempfile::tempdir().unwrap();
        let client = sandbox(&dir).connect_in_process();

        client.mkdir("src/nested", true).await.unwrap();
        client
            .write_text("/home/project/src/nested/a.txt", "hello")
            .await
            .unwrap();
        assert_eq!(
            std::fs::read_to_string(dir.path().join("src/nested/a.txt")).unwrap(),
            "hello"
        );
        assert_eq!(client.read_file("src/nested/a.txt").await.unwrap(), b"hello");
    }

    #[tokio::test]
    async fn test_errors_carry_codes() {
        let dir = tempfile::tempdir().unwrap();
        let client = sandbox(&dir).connect_in_process();

        let err = client.read_file("missing.txt").await.unwrap_err();
        assert_eq!(err.code(), Some("ENOENT"));

        let err = client.read_file("../../etc/passwd").await.unwrap_err();
        assert_eq!(err.code(), Some("EACCES"));

        let err = client.write_text("no/such/dir/a.txt", "x").await.unwrap_err();
        assert_eq!(err.code(), Some("ENOENT"));
    }

    #[tokio::test]
    async fn test_readdir_and_remove() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("dist")).unwrap();
        std::fs::write(dir.path().join("dist/index.html"), "<html>").unwrap();
        std::fs::write(dir.path().join("package.json"), "{}").unwrap();
        let client = sandbox(&dir).connect_in_process();

        let entries = client.readdir_with_types(".").await.unwrap();
        assert_eq!(entries.len(), 2);
        assert!(entries[0].is_dir());
        assert_eq!(entries[0].name, "dist");
        assert_eq!(
            client.readdir("/home/project").await.unwrap(),
            vec!["dist".to_string(), "package.json".to_string()]
        );

        let err = client
            .remove("dist", crate::RemoveOptions::default())
            .await
            .unwrap_err();
        assert!(err.code().is_some());
        client
            .remove("dist", crate::RemoveOptions::recursive_force())
            .await
            .unwrap();
        client
            .remove("dist", crate::RemoveOptions::recursive_force())
            .await
            .unwrap();
        assert!(!dir.path().join("dist").exists());
    }

    #[tokio::test]
    async fn test_mount_tree() {
        let dir = tempfile::tempdir().unwrap();
        let client = sandbox(&dir).connect_in_process();

        let mut src = FileTree::new();
        src.insert("index.js".to_string(), FileTreeNode::file("console.log(1)"));
        let mut tree = FileTree::new();
        tree.insert("src".to_string(), FileTreeNode::Directory(src));
        tree.insert("README.md".to_string(), FileTreeNode::file("# app"));

        client.mount(tree, None).await.unwrap();
        assert_eq!(
            std::fs::read_to_string(dir.path().join("src/index.js")).unwrap(),
            "console.log(1)"
        );
        assert!(dir.path().join("README.md").exists());
    }

    #[tokio::test]
    async fn test_auth_required_when_token_set() {
        let dir = tempfile::tempdir().unwrap();
        let client = sandbox(&dir).with_token("s3cret").connect_in_process();

        let err = client.readdir(".").await.unwrap_err();
        assert_eq!(err.code(), Some("EAUTH"));

        let err = client.authenticate("wrong").await.unwrap_err();
        assert_eq!(err.code(), Some("EACCES"));

        client.authenticate("s3cret").await.unwrap();
        client.readdir(".").await.unwrap();
    }

    #[tokio::test]
    async fn test_spawn_process_output_and_exit() {
        let dir = tempfile::tempdir().unwrap();
        let client = sandbox(&dir).connect_in_process();

        let process = client
            .spawn("sh", &["-c".to_string(), "echo out; exit 4".to_string()], None)
            .await
            .unwrap();
        let (code, output) = process.wait_with_output().await.unwrap();
        assert_eq!(code, 4);
        assert!(output.contains("out"));
    }

    #[tokio::test]
    async fn test_spawn_missing_binary_fails() {
        let dir = tempfile::tempdir().unwrap();
        let client = sandbox(&dir).connect_in_process();

        let err = client
            .spawn("definitely-not-a-real-binary-xyz", &[], None)
            .await
            .unwrap_err();
        assert_eq!(err.code(), Some("ENOENT"));
    }

    #[tokio::test]
    async fn test_stdin_and_kill() {
        let dir = tempfile::tempdir().unwrap();
        let client = sandbox(&dir).connect_in_process();

        let mut process = client.spawn("cat", &[], None).await.unwrap();
        let mut output = process.take_output().unwrap();
        process.input().write("ping\n").await.unwrap();
        assert_eq!(output.recv().await.as_deref(), Some("ping\n"));

        process.kill().await.unwrap();
        let code = process.wait().await.unwrap();
        assert_ne!(code, 0);

        // Killing an exited process is an error
        let err = process.kill().await.unwrap_err();
        assert_eq!(err.code(), Some("ESRCH"));
    }

    #[tokio::test]
    async fn test_exited_processes_are_pruned_on_spawn() {
        let dir = tempfile::tempdir().unwrap();
        let (tx, _rx) = mpsc::unbounded_channel();
        let mut connection = Connection::new(sandbox(&dir), Outbound::new(tx));

        let first = connection
            .spawn("sh", &["-c".to_string(), "exit 0".to_string()])
            .unwrap();
        let exited = connection.processes[&first].exited.clone();
        exited.cancelled().await;

        let second = connection.spawn("cat", &[]).unwrap();
        assert!(!connection.processes.contains_key(&first));
        assert!(connection.processes[&second].is_running());
        connection.shutdown();
        assert!(connection.processes.is_empty());
    }

    #[tokio::test]
    async fn test_listeners_only_see_general_events() {
        let dir = tempfile::tempdir().unwrap();
        let client = sandbox(&dir).connect_in_process();
        let mut all = client.subscribe_all();

        let process = client
            .spawn("sh", &["-c".to_string(), "echo hi".to_string()], None)
            .await
            .unwrap();
        process.wait_with_output().await.unwrap();

        // Process plumbing never reaches general subscribers
        assert!(all.try_recv().is_err());
    }
}
