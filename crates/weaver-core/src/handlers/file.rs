use super::{filesystem_error, HandlerContext};
use crate::error::{ActionError, ActionResult};
use std::path::Path;
use tracing::{debug, error};

/// Create the parent directory if needed and overwrite the file.
pub(crate) async fn write_file(ctx: &HandlerContext, path: &str, content: &str) -> ActionResult<()> {
    if path.trim().is_empty() {
        return Err(ActionError::Invalid("file action without a path".to_string()));
    }
    let client = ctx.cancellable(ctx.session.client()).await?;
    let full_path = ctx.session.resolve_path(path);

    if let Some(parent) = Path::new(&full_path).parent() {
        let parent = parent.to_string_lossy();
        if parent != ctx.session.workdir() && parent != "/" {
            ctx.cancellable(client.mkdir(&parent, true))
                .await
                .map_err(|e| {
                    error!(path = %parent, "Failed to create folder: {}", e);
                    filesystem_error(&parent, e)
                })?;
        }
    }

    ctx.cancellable(client.write_text(&full_path, content))
        .await
        .map_err(|e| {
            error!(path = %full_path, "Failed to write file: {}", e);
            filesystem_error(&full_path, e)
        })?;

    debug!(path = %full_path, bytes = content.len(), "File written");
    Ok(())
}
