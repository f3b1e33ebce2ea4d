//! Core logic for weaver.
//!
//! This crate turns generated text into executed actions:
//! - [`StreamingParser`]: incremental action tag parser
//! - [`ActionRegistry`]: action records and status transitions
//! - [`ActionExecutor`]: serial execution against a sandbox
//! - [`Workbench`]: the three wired together for streamed turns
//! - [`Config`]: layered configuration

pub mod action;
pub mod config;
pub mod error;
pub mod executor;
mod handlers;
pub mod parser;
pub mod patch;
pub mod registry;
pub mod sink;
pub mod workbench;

pub use action::{Action, ActionId, ActionKind, Modification};
pub use config::{Config, ExecutorConfig, ParserConfig};
pub use error::{ActionError, ActionResult, ConfigError, CoreError, CoreResult};
pub use executor::ActionExecutor;
pub use parser::{
    cumulative_chunks, ParsedAction, ParserEvent, ParserListener, ParserOptions, StreamingParser,
};
pub use patch::PatchError;
pub use registry::{ActionRecord, ActionRegistry, ActionStatus, ActionUpdate};
pub use sink::{
    Alert, AlertSink, AlertType, BuildResult, DeploymentSink, LogAlertSink, LogDeploymentSink,
};
pub use workbench::Workbench;
