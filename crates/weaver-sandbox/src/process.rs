//! Handles for processes spawned inside the sandbox.

use crate::error::{SandboxError, SandboxResult};
use crate::transport::Transport;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::{mpsc, watch};
use tracing::{debug, trace};
use weaver_protocol::Operation;

/// Ctrl-C as sent to a terminal.
pub const INTERRUPT: &str = "\u{3}";

/// Output and exit plumbing for one pid.
struct ProcessSlot {
    output_tx: Option<mpsc::UnboundedSender<String>>,
    output_rx: Option<mpsc::UnboundedReceiver<String>>,
    exit_tx: watch::Sender<Option<i32>>,
    claimed: bool,
}

impl ProcessSlot {
    fn new() -> Self {
        let (output_tx, output_rx) = mpsc::unbounded_channel();
        let (exit_tx, _) = watch::channel(None);
        Self {
            output_tx: Some(output_tx),
            output_rx: Some(output_rx),
            exit_tx,
            claimed: false,
        }
    }

    fn exited(&self) -> bool {
        self.exit_tx.borrow().is_some()
    }
}

/// Routes `process-output`/`process-exit` events to process handles.
///
/// Slots are created on first sight of a pid, so output that arrives before
/// the spawn response is buffered rather than lost.
#[derive(Default)]
pub(crate) struct ProcessRegistry {
    inner: Mutex<RegistryInner>,
}

#[derive(Default)]
struct RegistryInner {
    closed: bool,
    slots: HashMap<u32, ProcessSlot>,
}

impl ProcessRegistry {
    fn lock(&self) -> std::sync::MutexGuard<'_, RegistryInner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub(crate) fn route_output(&self, pid: u32, data: String) {
        let mut inner = self.lock();
        if inner.closed {
            return;
        }
        let slot = inner.slots.entry(pid).or_insert_with(ProcessSlot::new);
        match &slot.output_tx {
            Some(tx) => {
                trace!(pid, bytes = data.len(), "Process output");
                // Receiver dropped means nobody is reading; that's fine
                let _ = tx.send(data);
            }
            None => debug!(pid, "Dropping output after process exit"),
        }
    }

    pub(crate) fn route_exit(&self, pid: u32, exit_code: i32) {
        let mut inner = self.lock();
        if inner.closed {
            return;
        }
        let slot = inner.slots.entry(pid).or_insert_with(ProcessSlot::new);
        debug!(pid, exit_code, "Process exited");
        slot.output_tx = None;
        slot.exit_tx.send_replace(Some(exit_code));
        if slot.claimed {
            inner.slots.remove(&pid);
        }
    }

    /// Take the output receiver and an exit watcher for `pid`.
    pub(crate) fn claim(
        &self,
        pid: u32,
    ) -> SandboxResult<(mpsc::UnboundedReceiver<String>, watch::Receiver<Option<i32>>)> {
        let mut inner = self.lock();
        if inner.closed {
            return Err(SandboxError::ConnectionClosed);
        }
        let slot = inner.slots.entry(pid).or_insert_with(ProcessSlot::new);
        let output = slot
            .output_rx
            .take()
            .ok_or_else(|| SandboxError::protocol(format!("process {pid} already claimed")))?;
        let exit = slot.exit_tx.subscribe();
        slot.claimed = true;
        if slot.exited() {
            inner.slots.remove(&pid);
        }
        Ok((output, exit))
    }

    /// Drop every slot. Pending waiters observe a closed channel.
    pub(crate) fn close_all(&self) {
        let mut inner = self.lock();
        inner.closed = true;
        inner.slots.clear();
    }
}

/// Writable side of a sandbox process.
#[derive(Clone)]
pub struct ProcessInput {
    pid: u32,
    transport: Arc<Transport>,
}

impl ProcessInput {
    pub(crate) fn new(pid: u32, transport: Arc<Transport>) -> Self {
        Self { pid, transport }
    }

    /// Write raw data to the process.
    pub async fn write(&self, data: impl Into<String>) -> SandboxResult<()> {
        self.transport
            .request(Operation::Stdin {
                pid: self.pid,
                data: data.into(),
            })
            .await
            .map(|_| ())
    }

    /// Send Ctrl-C.
    pub async fn interrupt(&self) -> SandboxResult<()> {
        self.write(INTERRUPT).await
    }
}

/// A process running inside the sandbox.
pub struct SandboxProcess {
    pid: u32,
    input: ProcessInput,
    output: Option<mpsc::UnboundedReceiver<String>>,
    exit: watch::Receiver<Option<i32>>,
}

impl SandboxProcess {
    pub(crate) fn new(
        pid: u32,
        input: ProcessInput,
        output: mpsc::UnboundedReceiver<String>,
        exit: watch::Receiver<Option<i32>>,
    ) -> Self {
        Self {
            pid,
            input,
            output: Some(output),
            exit,
        }
    }

    pub fn pid(&self) -> u32 {
        self.pid
    }

    /// Input sink; clones share the same process.
    pub fn input(&self) -> ProcessInput {
        self.input.clone()
    }

    /// Take the incremental output stream. Returns `None` once taken.
    pub fn take_output(&mut self) -> Option<mpsc::UnboundedReceiver<String>> {
        self.output.take()
    }

    /// Exit code if the process has already exited.
    pub fn exit_code(&self) -> Option<i32> {
        *self.exit.borrow()
    }

    /// Wait for the process to exit.
    pub async fn wait(&self) -> SandboxResult<i32> {
        let mut exit = self.exit.clone();
        let code = *exit
            .wait_for(Option::is_some)
            .await
            .map_err(|_| SandboxError::ConnectionClosed)?;
        Ok(code.unwrap_or_default())
    }

    /// Drain all output until exit.
    pub async fn wait_with_output(mut self) -> SandboxResult<(i32, String)> {
        let mut collected = String::new();
        if let Some(mut output) = self.output.take() {
            while let Some(chunk) = output.recv().await {
                collected.push_str(&chunk);
            }
        }
        let code = self.wait().await?;
        Ok((code, collected))
    }

    /// Resize the process's terminal.
    pub async fn resize(&self, cols: u16, rows: u16) -> SandboxResult<()> {
        self.input
            .transport
            .request(Operation::Resize {
                pid: self.pid,
                cols,
                rows,
            })
            .await
            .map(|_| ())
    }

    /// Terminate the process.
    pub async fn kill(&self) -> SandboxResult<()> {
        self.input
            .transport
            .request(Operation::Kill { pid: self.pid })
            .await
            .map(|_| ())
    }
}

impl std::fmt::Debug for SandboxProcess {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SandboxProcess")
            .field("pid", &self.pid)
            .field("exit_code", &self.exit_code())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_output_before_claim_is_buffered() {
        let registry = ProcessRegistry::default();
        registry.route_output(7, "hello ".to_string());
        registry.route_output(7, "world".to_string());
        registry.route_exit(7, 0);

        let (mut output, exit) = registry.claim(7).unwrap();
        assert_eq!(output.recv().await.as_deref(), Some("hello "));
        assert_eq!(output.recv().await.as_deref(), Some("world"));
        assert_eq!(output.recv().await, None);
        assert_eq!(*exit.borrow(), Some(0));
    }

    #[tokio::test]
    async fn test_exit_after_claim() {
        let registry = ProcessRegistry::default();
        let (mut output, mut exit) = registry.claim(3).unwrap();

        registry.route_output(3, "x".to_string());
        registry.route_exit(3, 2);

        assert_eq!(output.recv().await.as_deref(), Some("x"));
        assert_eq!(output.recv().await, None);
        let code = *exit.wait_for(Option::is_some).await.unwrap();
        assert_eq!(code, Some(2));
    }

    #[test]
    fn test_double_claim_fails() {
        let registry = ProcessRegistry::default();
        let _first = registry.claim(1).unwrap();
        assert!(registry.claim(1).is_err());
    }

    #[tokio::test]
    async fn test_close_all_releases_waiters() {
        let registry = ProcessRegistry::default();
        let (mut output, mut exit) = registry.claim(9).unwrap();
        registry.close_all();

        assert_eq!(output.recv().await, None);
        assert!(exit.wait_for(Option::is_some).await.is_err());
        assert!(registry.claim(10).unwrap_err().is_connection_closed());
    }
}
