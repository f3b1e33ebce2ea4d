//! `weaver run`: execute the actions of a transcript.

use anyhow::Context;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};
use weaver_core::{
    cumulative_chunks, ActionRecord, ActionStatus, Alert, AlertSink, Config, LogDeploymentSink,
    Workbench,
};
use weaver_sandbox::SandboxSession;
use weaver_util::Identifier;

/// Arguments of `weaver run`.
#[derive(Debug, Clone)]
pub struct RunOptions {
    pub file: PathBuf,
    pub root: Option<PathBuf>,
    pub sandbox_url: Option<String>,
    pub chunk_size: usize,
}

/// Prints alerts to stderr as they happen.
struct ConsoleAlertSink;

impl AlertSink for ConsoleAlertSink {
    fn alert(&self, alert: Alert) {
        warn!(title = %alert.title, description = %alert.description, "Alert raised");
        eprintln!("\n[{}] {}", alert.title, alert.description);
        if !alert.content.trim().is_empty() {
            eprintln!("{}", alert.content.trim_end());
        }
    }
}

/// Stream a transcript through a workbench and wait for its actions.
///
/// Fails when any action failed. Ctrl-C aborts whatever is still pending.
pub async fn handle_run(mut config: Config, options: RunOptions) -> anyhow::Result<()> {
    let transcript = tokio::fs::read_to_string(&options.file)
        .await
        .with_context(|| format!("Failed to read {}", options.file.display()))?;

    if let Some(root) = options.root {
        config.sandbox.root = root;
    }
    if let Some(url) = options.sandbox_url {
        config.sandbox.url = Some(url);
    }

    let session = Arc::new(SandboxSession::new(config.sandbox.clone()));
    let mut bench = Workbench::new(
        Arc::clone(&session),
        &config,
        Arc::new(ConsoleAlertSink),
        Arc::new(LogDeploymentSink),
    );
    let registry = Arc::clone(bench.registry());
    let turn_id = Identifier::turn();
    info!(
        session_id = session.id(),
        turn_id = %turn_id,
        file = %options.file.display(),
        "Running transcript"
    );

    let mut stdout = std::io::stdout();
    for chunk in cumulative_chunks(&transcript, options.chunk_size) {
        write!(stdout, "{}", bench.feed(&turn_id, chunk))?;
        stdout.flush()?;
    }

    let interrupted = tokio::select! {
        rest = bench.finish(&turn_id, &transcript) => {
            writeln!(stdout, "{rest}")?;
            false
        }
        _ = tokio::signal::ctrl_c() => {
            let aborted = registry.abort_all();
            warn!(aborted, "Interrupted, aborting pending actions");
            registry.wait_settled().await;
            true
        }
    };

    let records = registry.snapshot();
    print_summary(&records);

    bench.shutdown().await;
    session.close();

    if interrupted {
        anyhow::bail!("interrupted");
    }
    let failed = records
        .iter()
        .filter(|record| matches!(record.status, ActionStatus::Failed { .. }))
        .count();
    if failed > 0 {
        anyhow::bail!("{failed} of {} actions failed", records.len());
    }
    Ok(())
}

fn print_summary(records: &[ActionRecord]) {
    eprintln!();
    for record in records {
        let detail = match &record.status {
            ActionStatus::Failed { error } => format!(": {error}"),
            _ => String::new(),
        };
        eprintln!(
            "{:<10} {:<9} {}{}",
            record.id.to_string(),
            record.status.as_str(),
            record.action.summary(),
            detail
        );
    }
}
