//! Testing utilities, fixtures, and scripted peers for weaver.
//!
//! This crate provides common testing infrastructure used across the weaver workspace:
//!
//! - **Fixtures**: Temporary projects and sample turn transcripts
//! - **Peers**: A scripted sandbox server for protocol-level tests
//! - **Sinks**: Alert and deployment sinks that record what they receive
//! - **Assertions**: Helpers for checking files and action outcomes
//!
//! # Example Usage
//!
//! ```rust,ignore
//! use weaver_test_utils::{fixtures::TestProject, sinks::RecordingAlertSink};
//!
//! #[tokio::test]
//! async fn test_turn_writes_files() {
//!     let project = TestProject::new()
//!         .with_file("package.json", "{}")
//!         .build();
//!
//!     let session = project.session();
//!     // Drive a Workbench against the session...
//!     assert!(project.file_exists("package.json"));
//! }
//! ```

pub mod assertions;
pub mod fixtures;
pub mod peer;
pub mod sinks;

// Re-export commonly used items
pub use fixtures::TestProject;
pub use weaver_core::cumulative_chunks;
pub use peer::ScriptedPeer;
pub use sinks::{RecordingAlertSink, RecordingDeploymentSink};
