//! Sandbox access for weaver.
//!
//! This crate provides:
//! - [`SandboxClient`]: request/response + event transport to a sandbox
//! - [`SandboxProcess`]: handles for processes spawned inside it
//! - [`ShellSession`]: the interactive shell with OSC command boundaries
//! - [`SandboxSession`]: lazily connected, explicitly owned session
//! - [`LocalSandbox`]: a sandbox server backed by a host directory
//!
//! # Example
//!
//! ```no_run
//! use weaver_sandbox::{SandboxConfig, SandboxSession};
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn example() -> weaver_sandbox::SandboxResult<()> {
//! let session = SandboxSession::new(SandboxConfig::default());
//! let client = session.client().await?;
//! client.write_text("hello.txt", "hi\n").await?;
//!
//! let shell = session.shell().await?;
//! let output = shell
//!     .execute_command("cat hello.txt", &CancellationToken::new())
//!     .await?;
//! assert_eq!(output.exit_code, 0);
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod config;
pub mod error;
pub mod events;
pub mod local;
pub mod osc;
pub mod path;
pub mod process;
pub mod session;
pub mod shell;
mod transport;

pub use client::{RemoveOptions, SandboxClient, TextEncoding, WatchHandle};
pub use config::{SandboxConfig, ShellConfig, DEFAULT_SHELL, DEFAULT_WORKDIR};
pub use error::{SandboxError, SandboxResult};
pub use events::{EventHub, Subscription};
pub use local::LocalSandbox;
pub use osc::{strip_ansi, OscMarker, OscScanner, Segment};
pub use path::PathMapper;
pub use process::{ProcessInput, SandboxProcess};
pub use session::SandboxSession;
pub use shell::{ShellOutput, ShellSession, Tee};
