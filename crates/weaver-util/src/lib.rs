//! Shared utilities for weaver.
//!
//! This crate provides common utilities used across the weaver workspace:
//! - ULID-based identifier generation
//! - Logging setup with tracing
//! - RAII timing for slow operations

pub mod id;
pub mod log;
pub mod timing;

pub use id::{IdPrefix, Identifier};
pub use log::{LogConfig, LogLevel};
pub use timing::TimingGuard;
