//! Explicitly owned sandbox session.

use crate::client::SandboxClient;
use crate::config::SandboxConfig;
use crate::error::{SandboxError, SandboxResult};
use crate::local::LocalSandbox;
use crate::shell::ShellSession;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::{debug, info};
use weaver_util::Identifier;

/// One workspace's connection to a sandbox plus its interactive shell.
///
/// The connection is opened on first use and the shell is spawned on first
/// use. There is no reconnect: once the transport is lost every call fails
/// with [`SandboxError::ConnectionClosed`] and the caller has to build a new
/// session.
pub struct SandboxSession {
    id: String,
    config: SandboxConfig,
    client: OnceCell<SandboxClient>,
    shell: OnceCell<Arc<ShellSession>>,
}

impl SandboxSession {
    pub fn new(config: SandboxConfig) -> Self {
        Self {
            id: Identifier::session(),
            config,
            client: OnceCell::new(),
            shell: OnceCell::new(),
        }
    }

    /// Wrap an already connected client.
    pub fn with_client(config: SandboxConfig, client: SandboxClient) -> Self {
        Self {
            id: Identifier::session(),
            config,
            client: OnceCell::new_with(Some(client)),
            shell: OnceCell::new(),
        }
    }

    /// Identifier used in logs.
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn config(&self) -> &SandboxConfig {
        &self.config
    }

    /// Working directory inside the sandbox.
    pub fn workdir(&self) -> &str {
        &self.config.workdir
    }

    /// Absolute sandbox path for `path` (relative paths join the workdir).
    pub fn resolve_path(&self, path: &str) -> String {
        if Path::new(path).is_absolute() {
            path.to_string()
        } else {
            Path::new(&self.config.workdir)
                .join(path)
                .to_string_lossy()
                .into_owned()
        }
    }

    /// The connected client, connecting on first call.
    pub async fn client(&self) -> SandboxResult<SandboxClient> {
        let client = self.client.get_or_try_init(|| self.connect()).await?;
        if !client.is_connected() {
            return Err(SandboxError::ConnectionClosed);
        }
        Ok(client.clone())
    }

    async fn connect(&self) -> SandboxResult<SandboxClient> {
        let client = match &self.config.url {
            Some(url) => SandboxClient::connect_tcp(url).await?,
            None => {
                let local = LocalSandbox::from_config(&self.config)?;
                info!(
                    session_id = %self.id,
                    root = %local.mapper().host_root().display(),
                    workdir = %self.config.workdir,
                    "Using local sandbox"
                );
                local.connect_in_process()
            }
        };

        if let Some(token) = &self.config.auth_token {
            debug!(session_id = %self.id, "Authenticating sandbox connection");
            client.authenticate(token).await?;
        }
        Ok(client)
    }

    /// The interactive shell, spawning it on first call.
    pub async fn shell(&self) -> SandboxResult<Arc<ShellSession>> {
        let client = self.client().await?;
        let shell = self
            .shell
            .get_or_try_init(|| async {
                let shell = ShellSession::start(&client, &self.config.shell).await?;
                shell.ready().await?;
                Ok::<_, SandboxError>(Arc::new(shell))
            })
            .await?;
        Ok(Arc::clone(shell))
    }

    /// Whether a live connection exists.
    pub fn is_connected(&self) -> bool {
        self.client.get().is_some_and(SandboxClient::is_connected)
    }

    /// Close the connection.
    pub fn close(&self) {
        if let Some(client) = self.client.get() {
            client.close();
        }
    }
}
