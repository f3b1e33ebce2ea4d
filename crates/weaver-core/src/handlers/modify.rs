use super::{filesystem_error, HandlerContext};
use crate::action::Modification;
use crate::error::{ActionError, ActionResult};
use crate::patch;
use tracing::{debug, error};
use weaver_sandbox::TextEncoding;

/// Patch a file against its current content and write it back once.
///
/// If any block fails to apply the file is left as it was.
pub(crate) async fn modify_file(
    ctx: &HandlerContext,
    path: &str,
    modifications: &[Modification],
) -> ActionResult<()> {
    if path.trim().is_empty() {
        return Err(ActionError::Invalid("modify action without a path".to_string()));
    }
    let client = ctx.cancellable(ctx.session.client()).await?;
    let full_path = ctx.session.resolve_path(path);

    let original = ctx
        .cancellable(client.read_text(&full_path, TextEncoding::Utf8))
        .await?;

    let patched = patch::apply(&original, modifications).map_err(|source| {
        error!(path = %full_path, "Failed to apply modifications: {}", source);
        ActionError::Patch {
            path: full_path.clone(),
            source,
        }
    })?;

    if patched == original {
        debug!(path = %full_path, "Modifications left the file unchanged");
        return Ok(());
    }

    ctx.cancellable(client.write_text(&full_path, &patched))
        .await
        .map_err(|e| {
            error!(path = %full_path, "Failed to write file: {}", e);
            filesystem_error(&full_path, e)
        })?;

    debug!(path = %full_path, blocks = modifications.len(), "File patched");
    Ok(())
}
