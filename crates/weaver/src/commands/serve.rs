//! `weaver serve`: expose a project directory as a sandbox over TCP.

use anyhow::Context;
use std::path::PathBuf;
use tracing::info;
use weaver_core::Config;
use weaver_sandbox::LocalSandbox;

/// Serve `root` until interrupted.
///
/// Clients must authenticate when `sandbox.auth_token` is configured.
pub async fn handle_serve(config: Config, root: PathBuf, address: &str) -> anyhow::Result<()> {
    let mut sandbox_config = config.sandbox;
    sandbox_config.root = root;
    let sandbox = LocalSandbox::from_config(&sandbox_config)
        .with_context(|| format!("Cannot serve {}", sandbox_config.root.display()))?;

    println!(
        "Serving {} as {} on {}",
        sandbox.mapper().host_root().display(),
        sandbox_config.workdir,
        address
    );

    tokio::select! {
        result = sandbox.listen(address) => {
            result.with_context(|| format!("Sandbox server on {address} failed"))?;
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Shutting down sandbox server");
        }
    }
    Ok(())
}
