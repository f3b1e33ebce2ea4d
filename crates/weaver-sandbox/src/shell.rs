//! Interactive shell session with command-boundary recovery.
//!
//! The sandbox shell is one continuous stream. Its output is teed into a
//! display stream for terminals and an internal stream that is scanned for
//! the OSC markers in [`crate::osc`] to find where each command ends and
//! which exit code it produced.

use crate::client::SandboxClient;
use crate::config::ShellConfig;
use crate::error::{SandboxError, SandboxResult};
use crate::osc::{strip_ansi, OscScanner, Segment, EXIT, PROMPT};
use crate::process::{ProcessInput, SandboxProcess};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::{mpsc, watch, Mutex};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use weaver_protocol::TerminalSize;

/// Result of [`ShellSession::execute_command`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShellOutput {
    pub exit_code: i32,
    /// Output between the command write and its exit marker, escape
    /// sequences stripped.
    pub output: String,
    /// Another command interrupted this one before it exited.
    pub interrupted: bool,
}

impl ShellOutput {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// Fan-out of one output source into two independently paced receivers.
pub struct Tee {
    pub display: mpsc::UnboundedReceiver<String>,
    pub internal: mpsc::UnboundedReceiver<String>,
}

impl Tee {
    /// Start pumping `source`. `inspect` sees every chunk before it is
    /// forwarded. Both receivers close when the source does.
    pub fn spawn<F>(mut source: mpsc::UnboundedReceiver<String>, mut inspect: F) -> Self
    where
        F: FnMut(&str) + Send + 'static,
    {
        let (display_tx, display) = mpsc::unbounded_channel();
        let (internal_tx, internal) = mpsc::unbounded_channel();

        tokio::spawn(async move {
            while let Some(chunk) = source.recv().await {
                inspect(&chunk);
                // Either side may be gone; keep feeding the other
                let _ = display_tx.send(chunk.clone());
                let _ = internal_tx.send(chunk);
            }
        });

        Self { display, internal }
    }
}

/// Text collected while waiting for a marker.
struct Collected {
    text: String,
    last_exit_code: Option<i32>,
}

/// Internal side of the tee, parsed into segments.
struct MarkerReader {
    rx: mpsc::UnboundedReceiver<String>,
    scanner: OscScanner,
    queue: VecDeque<Segment>,
}

impl MarkerReader {
    fn new(rx: mpsc::UnboundedReceiver<String>) -> Self {
        Self {
            rx,
            scanner: OscScanner::new(),
            queue: VecDeque::new(),
        }
    }

    async fn next_segment(&mut self) -> Option<Segment> {
        loop {
            if let Some(segment) = self.queue.pop_front() {
                return Some(segment);
            }
            let chunk = self.rx.recv().await?;
            self.queue.extend(self.scanner.push(&chunk));
        }
    }

    /// Consume output until a marker named `name` appears.
    ///
    /// Text seen before the most recent prompt marker is discarded, so the
    /// collected text is what the current command printed. The exit code is
    /// the last one seen up to and including the awaited marker.
    async fn wait_for(&mut self, name: &str, abort: &CancellationToken) -> SandboxResult<Collected> {
        let mut collected = Collected {
            text: String::new(),
            last_exit_code: None,
        };

        loop {
            let segment = tokio::select! {
                _ = abort.cancelled() => return Err(SandboxError::Cancelled),
                segment = self.next_segment() => segment.ok_or(SandboxError::ShellExited)?,
            };

            match segment {
                Segment::Text(text) => collected.text.push_str(&text),
                Segment::Marker(marker) => {
                    if marker.code.is_some() {
                        collected.last_exit_code = marker.code;
                    }
                    if marker.is(name) {
                        return Ok(collected);
                    }
                    if marker.is(PROMPT) {
                        collected.text.clear();
                    }
                }
            }
        }
    }
}

/// The single interactive shell of a sandbox session.
pub struct ShellSession {
    process: SandboxProcess,
    input: ProcessInput,
    internal: Mutex<MarkerReader>,
    ready: watch::Receiver<bool>,
    /// Bumped by every command; lets a waiter tell it was interrupted.
    generation: AtomicU64,
}

impl ShellSession {
    /// Spawn the configured shell. Display output is discarded.
    pub async fn start(client: &SandboxClient, config: &ShellConfig) -> SandboxResult<Self> {
        let (session, _display) = Self::start_with_display(client, config).await?;
        Ok(session)
    }

    /// Spawn the configured shell and return the display side of the tee.
    pub async fn start_with_display(
        client: &SandboxClient,
        config: &ShellConfig,
    ) -> SandboxResult<(Self, mpsc::UnboundedReceiver<String>)> {
        let terminal = TerminalSize {
            cols: config.cols,
            rows: config.rows,
        };
        let mut process = client
            .spawn(&config.command, &config.args, Some(terminal))
            .await?;
        let output = process
            .take_output()
            .ok_or_else(|| SandboxError::protocol("shell output already taken"))?;
        info!(pid = process.pid(), command = %config.command, "Started interactive shell");

        let (ready_tx, ready) = watch::channel(false);
        let mut scanner = OscScanner::new();
        let tee = Tee::spawn(output, move |chunk| {
            if *ready_tx.borrow() {
                return;
            }
            let seen_prompt = scanner
                .push(chunk)
                .iter()
                .any(|segment| matches!(segment, Segment::Marker(m) if m.is(PROMPT)));
            if seen_prompt {
                ready_tx.send_replace(true);
            }
        });

        let input = process.input();
        let session = Self {
            process,
            input,
            internal: Mutex::new(MarkerReader::new(tee.internal)),
            ready,
            generation: AtomicU64::new(0),
        };
        Ok((session, tee.display))
    }

    pub fn pid(&self) -> u32 {
        self.process.pid()
    }

    /// Input sink of the shell.
    pub fn input(&self) -> ProcessInput {
        self.input.clone()
    }

    /// Resolves once the shell has shown its first prompt.
    pub async fn ready(&self) -> SandboxResult<()> {
        let mut ready = self.ready.clone();
        ready
            .wait_for(|ready| *ready)
            .await
            .map(|_| ())
            .map_err(|_| SandboxError::ShellExited)
    }

    pub async fn resize(&self, cols: u16, rows: u16) -> SandboxResult<()> {
        self.process.resize(cols, rows).await
    }

    /// Run a command and wait for it to finish.
    ///
    /// Whatever is running in the foreground is interrupted first. If
    /// `abort` fires, the command is interrupted and
    /// [`SandboxError::Cancelled`] is returned.
    pub async fn execute_command(
        &self,
        command: &str,
        abort: &CancellationToken,
    ) -> SandboxResult<ShellOutput> {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;

        // Releases a previous waiter (e.g. a dev server) before we queue up
        self.input.interrupt().await?;

        let mut reader = tokio::select! {
            _ = abort.cancelled() => return Err(SandboxError::Cancelled),
            reader = self.internal.lock() => reader,
        };

        let result = self.run_locked(&mut reader, command, abort).await;
        if matches!(result, Err(SandboxError::Cancelled)) {
            debug!(command, "Shell command aborted");
            if let Err(e) = self.input.interrupt().await {
                warn!("Failed to interrupt aborted command: {}", e);
            }
            return Err(SandboxError::Cancelled);
        }

        let collected = result?;
        let interrupted = self.generation.load(Ordering::SeqCst) != generation;
        let output = strip_ansi(&collected.text).replace("\r\n", "\n");
        let exit_code = collected
            .last_exit_code
            .ok_or_else(|| SandboxError::protocol("exit marker without code"))?;
        debug!(command, exit_code, interrupted, "Shell command finished");

        Ok(ShellOutput {
            exit_code,
            output,
            interrupted,
        })
    }

    async fn run_locked(
        &self,
        reader: &mut MarkerReader,
        command: &str,
        abort: &CancellationToken,
    ) -> SandboxResult<Collected> {
        reader.wait_for(PROMPT, abort).await?;
        debug!(command, "Submitting shell command");
        self.input.write(format!("{command}\n")).await?;
        reader.wait_for(EXIT, abort).await
    }
}
