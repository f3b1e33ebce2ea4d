use super::{from_sandbox, HandlerContext};
use crate::error::{ActionError, ActionResult};
use weaver_sandbox::ShellOutput;

async fn execute(ctx: &HandlerContext, command: &str) -> ActionResult<ShellOutput> {
    let shell = ctx.cancellable(ctx.session.shell()).await?;
    shell
        .execute_command(command, &ctx.abort)
        .await
        .map_err(from_sandbox)
}

/// Run a command in the interactive shell; non-zero exit is an error.
pub(crate) async fn run_shell(ctx: &HandlerContext, command: &str) -> ActionResult<ShellOutput> {
    let output = execute(ctx, command).await?;
    if !output.success() {
        return Err(ActionError::command(command, output.exit_code, output.output));
    }
    Ok(output)
}

/// Run a long-lived command in the interactive shell.
///
/// Returns once the command ends. Being interrupted by a later command is a
/// normal ending; any other non-zero exit is an error.
pub(crate) async fn run_start(ctx: &HandlerContext, command: &str) -> ActionResult<ShellOutput> {
    let output = execute(ctx, command).await?;
    if !output.success() && !output.interrupted {
        return Err(ActionError::command(command, output.exit_code, output.output));
    }
    Ok(output)
}
