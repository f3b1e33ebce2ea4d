//! Seams for the collaborators the executor reports to.
//!
//! Alerts go to whatever shows notifications to the user, and successful
//! builds go to whatever deploys them. Both default to logging.

use async_trait::async_trait;
use serde::Serialize;
use tracing::{error, info};

/// Severity of an alert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertType {
    Error,
}

/// A user-facing notification about an action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Alert {
    #[serde(rename = "type")]
    pub alert_type: AlertType,
    pub title: String,
    pub description: String,
    /// Captured process output.
    pub content: String,
}

impl Alert {
    pub fn error(
        title: impl Into<String>,
        description: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            alert_type: AlertType::Error,
            title: title.into(),
            description: description.into(),
            content: content.into(),
        }
    }
}

/// Receives alerts raised by the executor.
pub trait AlertSink: Send + Sync {
    fn alert(&self, alert: Alert);
}

/// Writes alerts to the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogAlertSink;

impl AlertSink for LogAlertSink {
    fn alert(&self, alert: Alert) {
        error!(
            alert_type = ?alert.alert_type,
            title = %alert.title,
            description = %alert.description,
            output_len = alert.content.len(),
            "{}",
            alert.title
        );
    }
}

/// Outcome of a successful build.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BuildResult {
    /// Absolute sandbox path of the build output directory.
    pub path: String,
    pub exit_code: i32,
    pub output: String,
}

/// Consumes build results, e.g. to deploy them.
#[async_trait]
pub trait DeploymentSink: Send + Sync {
    async fn deploy(&self, result: BuildResult);
}

/// Writes build results to the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogDeploymentSink;

#[async_trait]
impl DeploymentSink for LogDeploymentSink {
    async fn deploy(&self, result: BuildResult) {
        info!(
            path = %result.path,
            exit_code = result.exit_code,
            output_len = result.output.len(),
            "Build ready for deployment"
        );
    }
}
