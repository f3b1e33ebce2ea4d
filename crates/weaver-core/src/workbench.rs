//! Parser, registry and executor wired together for streamed turns.

use crate::config::Config;
use crate::executor::ActionExecutor;
use crate::parser::{ParsedAction, ParserListener, ParserOptions, StreamingParser};
use crate::registry::ActionRegistry;
use crate::sink::{AlertSink, DeploymentSink, LogAlertSink, LogDeploymentSink};
use std::sync::Arc;
use tracing::debug;
use weaver_sandbox::SandboxSession;

/// Turns streamed text into executed actions.
///
/// Feed it the cumulative text of a turn as it grows; it returns the visible
/// text and runs actions as their tags close.
pub struct Workbench {
    parser: StreamingParser,
    registry: Arc<ActionRegistry>,
    executor: ActionExecutor,
}

impl Workbench {
    /// Must be called inside a tokio runtime.
    pub fn new(
        session: Arc<SandboxSession>,
        config: &Config,
        alerts: Arc<dyn AlertSink>,
        deployments: Arc<dyn DeploymentSink>,
    ) -> Self {
        let registry = ActionRegistry::new();
        let executor = ActionExecutor::new(
            Arc::clone(&registry),
            session,
            config.executor.clone(),
            alerts,
            deployments,
        );
        Self {
            parser: StreamingParser::new(ParserOptions::from_config(&config.parser)),
            registry,
            executor,
        }
    }

    /// Workbench that reports alerts and builds to the log.
    pub fn with_log_sinks(session: Arc<SandboxSession>, config: &Config) -> Self {
        Self::new(
            session,
            config,
            Arc::new(LogAlertSink),
            Arc::new(LogDeploymentSink),
        )
    }

    /// Replace the parser options (e.g. a different action marker).
    pub fn with_parser_options(mut self, options: ParserOptions) -> Self {
        self.parser = StreamingParser::new(options);
        self
    }

    pub fn registry(&self) -> &Arc<ActionRegistry> {
        &self.registry
    }

    /// Parse more of a turn. Returns the newly visible text.
    pub fn feed(&mut self, turn_id: &str, text: &str) -> String {
        let mut dispatch = Dispatch {
            registry: &self.registry,
            executor: &self.executor,
        };
        self.parser.parse(turn_id, text, &mut dispatch)
    }

    /// Parse the final text of a turn and wait for its actions to settle.
    ///
    /// Actions left open are closed and run. `start` actions count as settled
    /// once their grace delay passed.
    pub async fn finish(&mut self, turn_id: &str, text: &str) -> String {
        let mut dispatch = Dispatch {
            registry: &self.registry,
            executor: &self.executor,
        };
        let output = self.parser.finish(turn_id, text, &mut dispatch);
        self.registry.wait_settled().await;
        debug!(turn_id, "Turn settled");
        output
    }

    /// Abort everything still pending or running.
    pub fn abort_all(&self) -> usize {
        self.registry.abort_all()
    }

    /// Wait for queued work and stop the executor.
    pub async fn shutdown(self) {
        self.executor.shutdown().await;
    }
}

/// Forwards parser notifications to the registry and executor.
struct Dispatch<'a> {
    registry: &'a ActionRegistry,
    executor: &'a ActionExecutor,
}

impl ParserListener for Dispatch<'_> {
    fn action_opened(&mut self, action: &ParsedAction) {
        self.registry.register(action.id.clone(), action.to_action());
    }

    fn action_stream(&mut self, action: &ParsedAction) {
        if self.registry.update_action(&action.id, action.to_action()) {
            let _ = self.executor.enqueue(action.id.clone(), true);
        }
    }

    fn action_closed(&mut self, action: &ParsedAction) {
        // Registration is idempotent; normally the open already did it
        self.registry.register(action.id.clone(), action.to_action());
        self.registry.update_action(&action.id, action.to_action());
        let _ = self.executor.enqueue(action.id.clone(), false);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::ActionStatus;
    use weaver_sandbox::SandboxConfig;

    fn workbench(dir: &tempfile::TempDir) -> Workbench {
        let mut config = Config::default();
        config.sandbox = SandboxConfig {
            root: dir.path().to_path_buf(),
            ..Default::default()
        };
        config.executor.start_grace_ms = 100;
        let session = Arc::new(SandboxSession::new(config.sandbox.clone()));
        Workbench::with_log_sinks(session, &config)
            .with_parser_options(ParserOptions::default().with_marker(|id| format!("[{id}]")))
    }

    #[tokio::test]
    async fn test_streamed_turn_executes_actions() {
        let dir = tempfile::tempdir().unwrap();
        let mut bench = workbench(&dir);
        let transcript = concat!(
            "Creating the app.\n",
            "<boltAction type=\"file\" path=\"src/index.js\">\n```js\nconsole.log(1);\n```\n</boltAction>\n",
            "<boltAction type=\"modify\" path=\"src/index.js\">\n",
            "<<<<<<< SEARCH\nconsole.log(1);\n=======\nconsole.log(2);\n>>>>>>> REPLACE\n",
            "</boltAction>\n",
            "<boltAction type=\"shell\">cat src/index.js > copy.txt</boltAction>\nDone."
        );

        let mut visible = String::new();
        let mut end = 0;
        while end < transcript.len() {
            end = (end + 7).min(transcript.len());
            visible.push_str(&bench.feed("trn_a", &transcript[..end]));
        }
        visible.push_str(&bench.finish("trn_a", transcript).await);

        assert_eq!(
            visible,
            "Creating the app.\n[trn_a:0]\n[trn_a:1]\n[trn_a:2]\nDone."
        );
        let statuses: Vec<ActionStatus> = bench
            .registry()
            .snapshot()
            .into_iter()
            .map(|record| record.status)
            .collect();
        assert_eq!(statuses, vec![ActionStatus::Complete; 3]);
        assert_eq!(
            std::fs::read_to_string(dir.path().join("copy.txt")).unwrap(),
            "console.log(2);\n"
        );
        bench.shutdown().await;
    }

    #[tokio::test]
    async fn test_finish_runs_unterminated_action() {
        let dir = tempfile::tempdir().unwrap();
        let mut bench = workbench(&dir);
        let text = "<boltAction type=\"file\" path=\"notes.md\"># Notes";

        bench.feed("trn_b", text);
        bench.finish("trn_b", text).await;
        assert_eq!(
            std::fs::read_to_string(dir.path().join("notes.md")).unwrap(),
            "# Notes\n"
        );
    }

    #[tokio::test]
    async fn test_failed_action_does_not_stop_turn() {
        let dir = tempfile::tempdir().unwrap();
        let mut bench = workbench(&dir);
        let text = concat!(
            "<boltAction type=\"shell\">exit 1</boltAction>",
            "<boltAction type=\"file\" path=\"ok.txt\">ok</boltAction>"
        );
        bench.finish("trn_c", text).await;

        let records = bench.registry().snapshot();
        assert!(matches!(records[0].status, ActionStatus::Failed { .. }));
        assert_eq!(records[1].status, ActionStatus::Complete);
        assert!(dir.path().join("ok.txt").exists());
    }
}
