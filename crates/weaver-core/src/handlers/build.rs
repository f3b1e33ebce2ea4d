use super::{from_sandbox, HandlerContext};
use crate::error::{ActionError, ActionResult};
use crate::sink::BuildResult;
use tracing::{debug, warn};
use weaver_sandbox::{strip_ansi, SandboxClient, SandboxError};

/// Run the build in its own process and locate its output directory.
pub(crate) async fn run_build(ctx: &HandlerContext, command: &str) -> ActionResult<BuildResult> {
    let client = ctx.cancellable(ctx.session.client()).await?;
    let args = vec!["-c".to_string(), command.to_string()];
    let mut process = ctx
        .cancellable(client.spawn(&ctx.config.build_command_shell, &args, None))
        .await?;
    debug!(pid = process.pid(), command, "Build started");

    let mut output_rx = process.take_output();
    let collect = async {
        let mut output = String::new();
        if let Some(rx) = output_rx.as_mut() {
            while let Some(chunk) = rx.recv().await {
                output.push_str(&chunk);
            }
        }
        let exit_code = process.wait().await?;
        Ok::<_, SandboxError>((exit_code, output))
    };

    let (exit_code, output) = tokio::select! {
        result = collect => result.map_err(from_sandbox)?,
        _ = ctx.abort.cancelled() => {
            if let Err(e) = process.kill().await {
                warn!(pid = process.pid(), "Failed to kill aborted build: {}", e);
            }
            return Err(ActionError::Cancelled);
        }
    };

    let output = strip_ansi(&output);
    if exit_code != 0 {
        return Err(ActionError::command(command, exit_code, output));
    }

    let path = output_dir(ctx, &client).await;
    debug!(path = %path, "Build finished");
    Ok(BuildResult {
        path,
        exit_code,
        output,
    })
}

/// First configured candidate that exists under the workdir, else the first
/// candidate.
async fn output_dir(ctx: &HandlerContext, client: &SandboxClient) -> String {
    let candidates = &ctx.config.build_output_dirs;
    let entries = match client.readdir_with_types(ctx.session.workdir()).await {
        Ok(entries) => entries,
        Err(e) => {
            warn!("Failed to list workdir for build output: {}", e);
            Vec::new()
        }
    };

    let found = candidates
        .iter()
        .find(|candidate| entries.iter().any(|e| e.is_dir() && &e.name == *candidate));
    let dir = found
        .or_else(|| candidates.first())
        .map_or(".", String::as_str);
    ctx.session.resolve_path(dir)
}
