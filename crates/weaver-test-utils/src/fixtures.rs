//! Test fixtures for creating reproducible test environments.
//!
//! Provides temporary project directories backed by a local sandbox,
//! and sample turn transcripts.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;
use weaver_core::Config;
use weaver_sandbox::{SandboxConfig, SandboxSession};

/// Grace delay used for `start` actions in test configs.
pub const TEST_START_GRACE_MS: u64 = 200;

/// A temporary test project with configurable file structure.
///
/// Creates a temporary directory that is automatically cleaned up
/// when the built project is dropped.
///
/// # Example
///
/// ```rust
/// use weaver_test_utils::fixtures::TestProject;
///
/// let project = TestProject::new()
///     .with_file("src/index.js", "console.log(1);\n")
///     .with_dir("dist")
///     .build();
///
/// assert!(project.file_exists("src/index.js"));
/// ```
pub struct TestProject {
    temp_dir: TempDir,
    files: HashMap<PathBuf, String>,
    dirs: Vec<PathBuf>,
}

impl TestProject {
    /// Create a new test project builder.
    pub fn new() -> Self {
        Self {
            temp_dir: TempDir::new().expect("Failed to create temp directory"),
            files: HashMap::new(),
            dirs: Vec::new(),
        }
    }

    /// Add a file to the project. Parent directories are created automatically.
    pub fn with_file(mut self, path: impl AsRef<Path>, contents: impl Into<String>) -> Self {
        self.files
            .insert(path.as_ref().to_path_buf(), contents.into());
        self
    }

    /// Add an empty directory to the project.
    pub fn with_dir(mut self, path: impl AsRef<Path>) -> Self {
        self.dirs.push(path.as_ref().to_path_buf());
        self
    }

    /// Add a minimal node project.
    pub fn with_node_project(self, name: &str) -> Self {
        let package_json = format!(
            r#"{{
  "name": "{name}",
  "scripts": {{ "build": "mkdir -p dist" }}
}}
"#
        );
        self.with_file("package.json", package_json)
            .with_file("src/index.js", "console.log('hello');\n")
    }

    /// Add a project-level weaver configuration file.
    pub fn with_config(self, config: &str) -> Self {
        self.with_file("weaver.json", config)
    }

    /// Build the project, creating all files and directories.
    pub fn build(self) -> BuiltTestProject {
        let root = self.temp_dir.path();

        for dir in &self.dirs {
            let full_path = root.join(dir);
            fs::create_dir_all(&full_path).unwrap_or_else(|e| {
                panic!("Failed to create directory {}: {}", full_path.display(), e)
            });
        }

        for (path, contents) in &self.files {
            let full_path = root.join(path);
            if let Some(parent) = full_path.parent() {
                fs::create_dir_all(parent).unwrap_or_else(|e| {
                    panic!(
                        "Failed to create parent directory for {}: {}",
                        full_path.display(),
                        e
                    )
                });
            }
            fs::write(&full_path, contents)
                .unwrap_or_else(|e| panic!("Failed to write file {}: {}", full_path.display(), e));
        }

        BuiltTestProject {
            temp_dir: self.temp_dir,
        }
    }
}

impl Default for TestProject {
    fn default() -> Self {
        Self::new()
    }
}

/// A built test project with files created on disk.
pub struct BuiltTestProject {
    temp_dir: TempDir,
}

impl BuiltTestProject {
    /// Host path of the project root.
    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Read a file relative to the project root.
    pub fn read_file(&self, path: impl AsRef<Path>) -> String {
        let full_path = self.path().join(path);
        fs::read_to_string(&full_path)
            .unwrap_or_else(|e| panic!("Failed to read file {}: {}", full_path.display(), e))
    }

    pub fn file_exists(&self, path: impl AsRef<Path>) -> bool {
        self.path().join(path).is_file()
    }

    pub fn dir_exists(&self, path: impl AsRef<Path>) -> bool {
        self.path().join(path).is_dir()
    }

    /// Write a file relative to the project root.
    pub fn write_file(&self, path: impl AsRef<Path>, contents: &str) {
        let full_path = self.path().join(path);
        if let Some(parent) = full_path.parent() {
            fs::create_dir_all(parent).expect("Failed to create parent directory");
        }
        fs::write(&full_path, contents)
            .unwrap_or_else(|e| panic!("Failed to write file {}: {}", full_path.display(), e));
    }

    /// Sandbox settings serving this project as the default workdir.
    pub fn sandbox_config(&self) -> SandboxConfig {
        SandboxConfig {
            root: self.path().to_path_buf(),
            ..Default::default()
        }
    }

    /// Full config for this project with a short `start` grace delay.
    pub fn config(&self) -> Config {
        let mut config = Config {
            sandbox: self.sandbox_config(),
            ..Default::default()
        };
        config.executor.start_grace_ms = TEST_START_GRACE_MS;
        config
    }

    /// A fresh local sandbox session over this project.
    pub fn session(&self) -> Arc<SandboxSession> {
        Arc::new(SandboxSession::new(self.sandbox_config()))
    }
}

/// Sample turn transcripts.
pub mod transcripts {
    /// Scaffolds a small app: a file, a modification and a shell command.
    pub const SCAFFOLD: &str = concat!(
        "I'll set up the project.\n\n",
        "<boltAction type=\"file\" path=\"src/app.js\">\n",
        "```javascript\n",
        "export const greeting = 'hello';\n",
        "```\n",
        "</boltAction>\n",
        "<boltAction type=\"modify\" path=\"src/app.js\">\n",
        "<<<<<<< SEARCH\n",
        "'hello'\n",
        "=======\n",
        "'hello, world'\n",
        ">>>>>>> REPLACE\n",
        "</boltAction>\n",
        "<boltAction type=\"shell\">\n",
        "cp src/app.js app.copy.js\n",
        "</boltAction>\n",
        "All set.",
    );

    /// A modification whose search text does not exist.
    pub const BAD_MODIFY: &str = concat!(
        "Updating the title.\n",
        "<boltAction type=\"modify\" path=\"index.html\">\n",
        "<<<<<<< SEARCH\n",
        "<title>Missing</title>\n",
        "=======\n",
        "<title>Weaver</title>\n",
        ">>>>>>> REPLACE\n",
        "</boltAction>\n",
    );

    /// Builds the project into `dist`.
    pub const BUILD: &str = concat!(
        "Building.\n",
        "<boltAction type=\"build\">mkdir -p dist && echo built</boltAction>\n",
    );

    /// Starts a long-running dev server.
    pub const DEV_SERVER: &str = concat!(
        "Starting the dev server.\n",
        "<boltAction type=\"start\">sleep 30</boltAction>\n",
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_project_builds_files_and_dirs() {
        let project = TestProject::new()
            .with_node_project("demo")
            .with_dir("public")
            .build();

        assert!(project.file_exists("package.json"));
        assert!(project.dir_exists("public"));
        assert!(project.read_file("package.json").contains("\"demo\""));
    }

    #[test]
    fn test_config_points_at_project() {
        let project = TestProject::new().build();
        let config = project.config();
        assert_eq!(config.sandbox.root, project.path());
        assert_eq!(config.executor.start_grace_ms, TEST_START_GRACE_MS);
    }
}
