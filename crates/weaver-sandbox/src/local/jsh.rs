//! A minimal line shell that reports command boundaries with OSC markers.
//!
//! Reads characters from its input, runs each completed line with `sh -c`
//! in the workdir, and prints an `exit` marker followed by a `prompt` marker
//! when the command finishes. Ctrl-C kills the foreground command (exit code
//! 130) or, when idle, just redraws the prompt. While a command runs, typed
//! lines are forwarded to its stdin.

use super::Outbound;
use crate::osc::{OscMarker, EXIT, PROMPT};
use std::collections::VecDeque;
use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::process::{ChildStdin, Command};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Exit code reported for an interrupted command.
pub(crate) const INTERRUPTED_EXIT_CODE: i32 = 130;

/// Exit code reported when the command could not be started.
const SPAWN_FAILED_EXIT_CODE: i32 = 127;

/// How long to wait for output pipes after the child exited.
const PIPE_DRAIN_TIMEOUT: Duration = Duration::from_millis(500);

fn marker(name: &str, code: Option<i32>) -> String {
    OscMarker {
        name: name.to_string(),
        code,
        extra: code.map(|_| "0".to_string()),
    }
    .encode()
}

fn prompt() -> String {
    format!("$ {}", marker(PROMPT, None))
}

/// Convert a process status to a shell-style exit code.
pub(crate) fn exit_code(status: ExitStatus) -> i32 {
    if let Some(code) = status.code() {
        return code;
    }
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return 128 + signal;
        }
    }
    -1
}

/// Forward everything read from `reader` as process output.
pub(crate) fn pump_output<R>(pid: u32, mut reader: R, out: Outbound) -> JoinHandle<()>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut buf = vec![0u8; 4096];
        loop {
            match reader.read(&mut buf).await {
                Ok(0) => break,
                Ok(n) => out.output(pid, String::from_utf8_lossy(&buf[..n]).into_owned()),
                Err(e) => {
                    debug!(pid, "Output pipe closed: {}", e);
                    break;
                }
            }
        }
    })
}

/// Wait for output pumps, giving up on pipes held open by grandchildren.
pub(crate) async fn drain_pumps(pumps: Vec<JoinHandle<()>>) {
    for pump in pumps {
        let abort = pump.abort_handle();
        if tokio::time::timeout(PIPE_DRAIN_TIMEOUT, pump).await.is_err() {
            abort.abort();
        }
    }
}

/// State of one running shell.
pub(crate) struct LineShell {
    pid: u32,
    cwd: PathBuf,
    input: mpsc::UnboundedReceiver<String>,
    pending: VecDeque<char>,
    kill: CancellationToken,
    out: Outbound,
}

impl LineShell {
    pub(crate) fn new(
        pid: u32,
        cwd: PathBuf,
        input: mpsc::UnboundedReceiver<String>,
        kill: CancellationToken,
        out: Outbound,
    ) -> Self {
        Self {
            pid,
            cwd,
            input,
            pending: VecDeque::new(),
            kill,
            out,
        }
    }

    /// Next input character. Cancel safe.
    async fn next_char(&mut self) -> Option<char> {
        loop {
            if let Some(c) = self.pending.pop_front() {
                return Some(c);
            }
            let data = self.input.recv().await?;
            self.pending.extend(data.chars());
        }
    }

    /// Run until killed or the input closes. Returns the shell's exit code.
    pub(crate) async fn run(mut self) -> i32 {
        self.out.output(self.pid, prompt());
        let kill = self.kill.clone();
        let mut line = String::new();

        loop {
            let c = tokio::select! {
                _ = kill.cancelled() => return INTERRUPTED_EXIT_CODE,
                c = self.next_char() => match c {
                    Some(c) => c,
                    None => return 0,
                },
            };

            match c {
                '\u{3}' => {
                    line.clear();
                    self.out.output(self.pid, format!("^C\r\n{}", prompt()));
                }
                '\r' | '\n' => {
                    let command = std::mem::take(&mut line);
                    if command.trim().is_empty() {
                        self.out.output(self.pid, format!("\r\n{}", prompt()));
                        continue;
                    }
                    let code = self.run_foreground(command.trim()).await;
                    if self.kill.is_cancelled() {
                        return INTERRUPTED_EXIT_CODE;
                    }
                    self.out.output(
                        self.pid,
                        format!("{}{}", marker(EXIT, Some(code)), prompt()),
                    );
                }
                '\u{7f}' | '\u{8}' => {
                    line.pop();
                }
                c => line.push(c),
            }
        }
    }

    async fn run_foreground(&mut self, command: &str) -> i32 {
        debug!(pid = self.pid, command, "jsh running command");
        let spawned = Command::new("sh")
            .arg("-c")
            .arg(command)
            .current_dir(&self.cwd)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn();

        let mut child = match spawned {
            Ok(child) => child,
            Err(e) => {
                self.out.output(self.pid, format!("jsh: {e}\r\n"));
                return SPAWN_FAILED_EXIT_CODE;
            }
        };

        let mut pumps = Vec::new();
        if let Some(stdout) = child.stdout.take() {
            pumps.push(pump_output(self.pid, stdout, self.out.clone()));
        }
        if let Some(stderr) = child.stderr.take() {
            pumps.push(pump_output(self.pid, stderr, self.out.clone()));
        }
        let mut stdin = child.stdin.take();
        let mut typed = String::new();
        let kill = self.kill.clone();

        let code = loop {
            tokio::select! {
                status = child.wait() => {
                    break match status {
                        Ok(status) => exit_code(status),
                        Err(e) => {
                            warn!(pid = self.pid, "Failed to wait for command: {}", e);
                            -1
                        }
                    };
                }
                _ = kill.cancelled() => {
                    let _ = child.kill().await;
                    break INTERRUPTED_EXIT_CODE;
                }
                c = self.next_char() => match c {
                    Some('\u{3}') => {
                        let _ = child.kill().await;
                        self.out.output(self.pid, "^C\r\n");
                        break INTERRUPTED_EXIT_CODE;
                    }
                    Some(c) => {
                        typed.push(c);
                        if c == '\n' || c == '\r' {
                            forward_line(&mut stdin, &std::mem::take(&mut typed)).await;
                        }
                    }
                    None => {
                        let _ = child.kill().await;
                        break INTERRUPTED_EXIT_CODE;
                    }
                },
            }
        };

        drop(stdin);
        drain_pumps(pumps).await;
        debug!(pid = self.pid, command, code, "jsh command finished");
        code
    }
}

async fn forward_line(stdin: &mut Option<ChildStdin>, line: &str) {
    let Some(pipe) = stdin.as_mut() else {
        return;
    };
    let line = line.replace('\r', "\n");
    if pipe.write_all(line.as_bytes()).await.is_err() || pipe.flush().await.is_err() {
        // Child closed its stdin
        *stdin = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::osc::{OscScanner, Segment};
    use weaver_protocol::{SandboxEvent, ServerMessage};

    struct Harness {
        input: mpsc::UnboundedSender<String>,
        output: mpsc::UnboundedReceiver<String>,
        scanner: OscScanner,
        kill: CancellationToken,
        shell: JoinHandle<i32>,
    }

    impl Harness {
        fn start(cwd: PathBuf) -> Self {
            let (input, input_rx) = mpsc::unbounded_channel();
            let (out_tx, output) = mpsc::unbounded_channel();
            let kill = CancellationToken::new();
            let shell = LineShell::new(1, cwd, input_rx, kill.clone(), Outbound::new(out_tx));
            Self {
                input,
                output,
                scanner: OscScanner::new(),
                kill,
                shell: tokio::spawn(shell.run()),
            }
        }

        /// Read until a marker named `name`; return text seen and the marker code.
        async fn until(&mut self, name: &str) -> (String, Option<i32>) {
            let mut text = String::new();
            loop {
                let line = self.output.recv().await.unwrap();
                let data = match ServerMessage::parse(&line).unwrap() {
                    ServerMessage::Event(SandboxEvent::ProcessOutput(o)) => o.data,
                    _ => continue,
                };
                for segment in self.scanner.push(&data) {
                    match segment {
                        Segment::Text(t) => text.push_str(&t),
                        Segment::Marker(m) if m.is(name) => return (text, m.code),
                        Segment::Marker(_) => {}
                    }
                }
            }
        }
    }

    #[tokio::test]
    async fn test_runs_commands_and_reports_exit_codes() {
        let dir = tempfile::tempdir().unwrap();
        let mut h = Harness::start(dir.path().to_path_buf());
        h.until(PROMPT).await;

        h.input.send("echo hello\n".to_string()).unwrap();
        let (text, code) = h.until(EXIT).await;
        assert_eq!(code, Some(0));
        assert!(text.contains("hello"));
        h.until(PROMPT).await;

        h.input.send("exit 3\n".to_string()).unwrap();
        let (_, code) = h.until(EXIT).await;
        assert_eq!(code, Some(3));

        h.kill.cancel();
        assert_eq!(h.shell.await.unwrap(), INTERRUPTED_EXIT_CODE);
    }

    #[tokio::test]
    async fn test_ctrl_c_interrupts_foreground_command() {
        let dir = tempfile::tempdir().unwrap();
        let mut h = Harness::start(dir.path().to_path_buf());
        h.until(PROMPT).await;

        h.input.send("sleep 30\n".to_string()).unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;
        h.input.send("\u{3}".to_string()).unwrap();

        let (_, code) = h.until(EXIT).await;
        assert_eq!(code, Some(INTERRUPTED_EXIT_CODE));
        h.until(PROMPT).await;
    }

    #[tokio::test]
    async fn test_ctrl_c_when_idle_redraws_prompt() {
        let dir = tempfile::tempdir().unwrap();
        let mut h = Harness::start(dir.path().to_path_buf());
        h.until(PROMPT).await;

        h.input.send("\u{3}".to_string()).unwrap();
        let (text, _) = h.until(PROMPT).await;
        assert!(text.contains("^C"));
    }

    #[tokio::test]
    async fn test_commands_run_in_workdir() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("marker.txt"), "found").unwrap();
        let mut h = Harness::start(dir.path().to_path_buf());
        h.until(PROMPT).await;

        h.input.send("cat marker.txt\n".to_string()).unwrap();
        let (text, code) = h.until(EXIT).await;
        assert_eq!(code, Some(0));
        assert!(text.contains("found"));
    }

    #[test]
    fn test_marker_rendering() {
        assert_eq!(marker(EXIT, Some(1)), "\x1b]654;exit=1:0\x07");
        assert_eq!(prompt(), "$ \x1b]654;prompt\x07");
    }
}
