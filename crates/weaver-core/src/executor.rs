//! Serial action execution.
//!
//! A single worker task runs queued actions one at a time, in the order they
//! were enqueued. `start` actions are the exception: they are fired into the
//! background and the worker moves on after a short grace delay.

use crate::action::{Action, ActionId};
use crate::config::ExecutorConfig;
use crate::error::ActionError;
use crate::handlers::{self, HandlerContext};
use crate::registry::ActionRegistry;
use crate::sink::{Alert, AlertSink, DeploymentSink};
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use weaver_sandbox::SandboxSession;
use weaver_util::TimingGuard;

struct Job {
    id: ActionId,
    streaming: bool,
    done: oneshot::Sender<()>,
}

/// Queues actions and runs them one after another.
///
/// Must be created inside a tokio runtime. Dropping the executor lets the
/// worker finish the jobs already queued and then stop.
pub struct ActionExecutor {
    jobs: mpsc::UnboundedSender<Job>,
    /// Actions with a streaming write waiting in the queue.
    queued_streams: Arc<Mutex<HashSet<ActionId>>>,
    worker: JoinHandle<()>,
}

impl ActionExecutor {
    pub fn new(
        registry: Arc<ActionRegistry>,
        session: Arc<SandboxSession>,
        config: ExecutorConfig,
        alerts: Arc<dyn AlertSink>,
        deployments: Arc<dyn DeploymentSink>,
    ) -> Self {
        let (jobs, queue) = mpsc::unbounded_channel();
        let queued_streams = Arc::new(Mutex::new(HashSet::new()));
        let worker = Worker {
            registry,
            session,
            config: Arc::new(config),
            alerts,
            deployments,
            queued_streams: Arc::clone(&queued_streams),
        };

        Self {
            jobs,
            queued_streams,
            worker: tokio::spawn(worker.run(queue)),
        }
    }

    /// Queue an action. The receiver resolves once the worker is done with it.
    ///
    /// A streaming run writes the current content of an open file action
    /// without finishing it. Streaming runs for the same action coalesce:
    /// while one is queued, further requests resolve with it.
    pub fn enqueue(&self, id: ActionId, streaming: bool) -> oneshot::Receiver<()> {
        let (done, rx) = oneshot::channel();
        if streaming {
            let mut queued = self
                .queued_streams
                .lock()
                .unwrap_or_else(|e| e.into_inner());
            if !queued.insert(id.clone()) {
                debug!(action_id = %id, "Streaming write already queued");
                // The queued write picks up the latest content
                let _ = done.send(());
                return rx;
            }
        }

        if let Err(mpsc::error::SendError(job)) = self.jobs.send(Job {
            id,
            streaming,
            done,
        }) {
            warn!(action_id = %job.id, "Executor stopped, dropping action");
        }
        rx
    }

    /// Queue an action and wait until the worker is done with it.
    pub async fn run_action(&self, id: ActionId, streaming: bool) {
        let _ = self.enqueue(id, streaming).await;
    }

    /// Stop accepting work and wait for the queued jobs to finish.
    pub async fn shutdown(self) {
        drop(self.jobs);
        if let Err(e) = self.worker.await {
            error!("Executor worker failed: {}", e);
        }
    }
}

struct Worker {
    registry: Arc<ActionRegistry>,
    session: Arc<SandboxSession>,
    config: Arc<ExecutorConfig>,
    alerts: Arc<dyn AlertSink>,
    deployments: Arc<dyn DeploymentSink>,
    queued_streams: Arc<Mutex<HashSet<ActionId>>>,
}

impl Worker {
    async fn run(self, mut queue: mpsc::UnboundedReceiver<Job>) {
        while let Some(job) = queue.recv().await {
            if job.streaming {
                self.queued_streams
                    .lock()
                    .unwrap_or_else(|e| e.into_inner())
                    .remove(&job.id);
                self.stream(&job.id).await;
            } else {
                self.execute(&job.id).await;
            }
            let _ = job.done.send(());
        }
        debug!("Executor queue closed");
    }

    fn context(&self, abort: CancellationToken) -> HandlerContext {
        HandlerContext {
            session: Arc::clone(&self.session),
            config: Arc::clone(&self.config),
            abort,
        }
    }

    /// Write the current content of an open file action.
    async fn stream(&self, id: &ActionId) {
        if !self.config.stream_file_writes {
            return;
        }
        let Some(record) = self.registry.get(id) else {
            warn!(action_id = %id, "Streaming write for unknown action");
            return;
        };
        if record.executed || record.status.is_terminal() {
            return;
        }
        let Action::File { path, content } = &record.action else {
            return;
        };

        self.registry.start(id);
        let ctx = self.context(record.abort_signal());
        if let Err(e) = handlers::write_file(&ctx, path, content).await {
            // The final write decides the outcome
            debug!(action_id = %id, "Streaming write failed: {}", e);
        }
    }

    async fn execute(&self, id: &ActionId) {
        let Some(record) = self.registry.get(id) else {
            warn!(action_id = %id, "Run requested for unknown action");
            return;
        };
        if record.status.is_terminal() {
            debug!(action_id = %id, status = record.status.as_str(), "Skipping settled action");
            return;
        }
        if !self.registry.mark_executed(id) {
            debug!(action_id = %id, "Action already executed");
            return;
        }

        self.registry.start(id);
        let ctx = self.context(record.abort_signal());
        let kind = record.action.kind();
        debug!(action_id = %id, action = %record.action.summary(), "Running action");

        if let Action::Start { command } = &record.action {
            self.start_detached(id, command.trim(), ctx).await;
            return;
        }

        let _timing = TimingGuard::action(kind.as_str(), id);
        let result = match &record.action {
            Action::File { path, content } => handlers::write_file(&ctx, path, content).await,
            Action::Modify {
                path,
                modifications,
            } => handlers::modify_file(&ctx, path, modifications).await,
            Action::Shell { command } => handlers::run_shell(&ctx, command.trim()).await.map(|_| ()),
            Action::Build { command } => match handlers::run_build(&ctx, command.trim()).await {
                Ok(result) => {
                    self.deployments.deploy(result).await;
                    Ok(())
                }
                Err(e) => Err(e),
            },
            Action::Start { .. } => Ok(()),
            Action::Unknown { kind, .. } => {
                info!(action_id = %id, kind = %kind, "Skipping action of unknown type");
                Ok(())
            }
        };

        match result {
            Ok(()) => {
                self.registry.complete(id);
            }
            Err(ActionError::Cancelled) => {
                debug!(action_id = %id, "Action aborted");
                self.registry.abort(id);
            }
            Err(e) => {
                if e.is_recoverable() {
                    error!(action_id = %id, kind = %kind, "Action failed: {}", e);
                } else {
                    error!(action_id = %id, kind = %kind, "Action failed, sandbox is gone: {}", e);
                }
                if let ActionError::Command {
                    command,
                    exit_code,
                    output,
                } = &e
                {
                    let title = match kind.as_str() {
                        "build" => "Build Failed",
                        _ => "Command Failed",
                    };
                    self.alerts.alert(Alert::error(
                        title,
                        format!("`{command}` exited with code {exit_code}"),
                        output.clone(),
                    ));
                }
                self.registry.fail(id, e.to_string());
            }
        }
    }

    /// Fire a start action into the background and wait out the grace delay.
    async fn start_detached(&self, id: &ActionId, command: &str, ctx: HandlerContext) {
        let registry = Arc::clone(&self.registry);
        let alerts = Arc::clone(&self.alerts);
        let abort = ctx.abort.clone();
        let action_id = id.clone();
        let command = command.to_string();

        tokio::spawn(async move {
            let _timing = TimingGuard::action("start", &action_id)
                .with_warn_threshold(Duration::MAX);
            match handlers::run_start(&ctx, &command).await {
                Ok(output) => {
                    info!(
                        action_id = %action_id,
                        exit_code = output.exit_code,
                        interrupted = output.interrupted,
                        "Start command ended"
                    );
                }
                Err(ActionError::Cancelled) => {
                    debug!(action_id = %action_id, "Start action aborted");
                }
                Err(e) => {
                    error!(action_id = %action_id, "Start command failed: {}", e);
                    let content = e.output().unwrap_or_default().to_string();
                    alerts.alert(Alert::error(
                        "Dev Server Failed",
                        format!("`{command}` failed: {e}"),
                        content,
                    ));
                    // Only sticks if the grace delay has not passed yet
                    registry.fail(&action_id, e.to_string());
                }
            }
        });

        tokio::select! {
            _ = tokio::time::sleep(Duration::from_millis(self.config.start_grace_ms)) => {}
            _ = abort.cancelled() => {}
        }
        self.registry.complete(id);
    }
}
