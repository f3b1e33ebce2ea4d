//! Command handlers for the weaver CLI.

pub mod config;
pub mod logging;
pub mod parse;
pub mod run;
pub mod serve;

pub use config::*;
pub use logging::*;
pub use parse::*;
pub use run::*;
pub use serve::*;
