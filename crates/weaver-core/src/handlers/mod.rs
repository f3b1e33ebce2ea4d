//! One handler per action kind.
//!
//! Handlers observe the action's abort signal at every sandbox round-trip and
//! return [`ActionError::Cancelled`] once it fires.

mod build;
mod file;
mod modify;
mod shell;

pub(crate) use build::run_build;
pub(crate) use file::write_file;
pub(crate) use modify::modify_file;
pub(crate) use shell::{run_shell, run_start};

use crate::config::ExecutorConfig;
use crate::error::{ActionError, ActionResult};
use std::future::Future;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use weaver_sandbox::{SandboxError, SandboxResult, SandboxSession};

/// What a handler gets to work with.
#[derive(Clone)]
pub(crate) struct HandlerContext {
    pub session: Arc<SandboxSession>,
    pub config: Arc<ExecutorConfig>,
    pub abort: CancellationToken,
}

impl HandlerContext {
    /// Run a sandbox call unless the action is aborted first.
    pub async fn cancellable<T, F>(&self, call: F) -> ActionResult<T>
    where
        F: Future<Output = SandboxResult<T>>,
    {
        tokio::select! {
            biased;
            _ = self.abort.cancelled() => Err(ActionError::Cancelled),
            result = call => result.map_err(from_sandbox),
        }
    }
}

/// Keep cancellation distinct from other sandbox failures.
pub(crate) fn from_sandbox(error: SandboxError) -> ActionError {
    match error {
        SandboxError::Cancelled => ActionError::Cancelled,
        other => ActionError::Sandbox(other),
    }
}

/// Attach the path to a failed filesystem call.
pub(crate) fn filesystem_error(path: &str, error: ActionError) -> ActionError {
    match error {
        ActionError::Sandbox(source) => ActionError::Filesystem {
            path: path.to_string(),
            source,
        },
        other => other,
    }
}
