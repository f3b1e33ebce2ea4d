//! Sinks that record what the executor reports.

use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use weaver_core::{Alert, AlertSink, BuildResult, DeploymentSink};

/// Records every alert it receives.
///
/// Clones share the same record.
#[derive(Debug, Clone, Default)]
pub struct RecordingAlertSink {
    alerts: Arc<Mutex<Vec<Alert>>>,
}

impl RecordingAlertSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// All alerts received so far.
    pub fn alerts(&self) -> Vec<Alert> {
        self.alerts.lock().unwrap().clone()
    }

    /// Titles of the alerts received so far, in order.
    pub fn titles(&self) -> Vec<String> {
        self.alerts
            .lock()
            .unwrap()
            .iter()
            .map(|alert| alert.title.clone())
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.alerts.lock().unwrap().is_empty()
    }
}

impl AlertSink for RecordingAlertSink {
    fn alert(&self, alert: Alert) {
        self.alerts.lock().unwrap().push(alert);
    }
}

/// Records every build result it receives.
#[derive(Debug, Clone, Default)]
pub struct RecordingDeploymentSink {
    builds: Arc<Mutex<Vec<BuildResult>>>,
}

impl RecordingDeploymentSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn builds(&self) -> Vec<BuildResult> {
        self.builds.lock().unwrap().clone()
    }
}

#[async_trait]
impl DeploymentSink for RecordingDeploymentSink {
    async fn deploy(&self, result: BuildResult) {
        self.builds.lock().unwrap().push(result);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_alert_sink_clones_share_record() {
        let sink = RecordingAlertSink::new();
        let clone = sink.clone();
        clone.alert(Alert::error("Command Failed", "exit 1", "boom"));

        assert_eq!(sink.titles(), vec!["Command Failed".to_string()]);
        assert_eq!(sink.alerts()[0].content, "boom");
    }

    #[tokio::test]
    async fn test_deployment_sink_records_builds() {
        let sink = RecordingDeploymentSink::new();
        sink.deploy(BuildResult {
            path: "/home/project/dist".to_string(),
            exit_code: 0,
            output: "built".to_string(),
        })
        .await;

        assert_eq!(sink.builds().len(), 1);
        assert_eq!(sink.builds()[0].path, "/home/project/dist");
    }
}
