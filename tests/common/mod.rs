//! Common test utilities and helpers
//!
//! This module provides shared utilities for integration tests.

#![allow(dead_code)]

use std::path::PathBuf;
use std::process::{Command, Output};
use tempfile::TempDir;

/// Test project context
///
/// A temporary working directory the packer runs in.
pub struct TestProject {
    /// Temporary directory for the test project
    pub dir: TempDir,
}

impl TestProject {
    /// Create a new test project in a temporary directory
    pub fn new() -> Self {
        Self {
            dir: TempDir::new().expect("Failed to create temp directory"),
        }
    }

    /// Get the path to the test project directory
    pub fn path(&self) -> PathBuf {
        self.dir.path().to_path_buf()
    }

    /// Create a file in the test project
    pub fn create_file(&self, name: &str, content: &str) {
        let path = self.dir.path().join(name);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).expect("Failed to create parent directories");
        }
        std::fs::write(path, content).expect("Failed to write file");
    }

    /// Create a directory in the test project
    pub fn create_dir(&self, name: &str) {
        let path = self.dir.path().join(name);
        std::fs::create_dir_all(path).expect("Failed to create directory");
    }

    /// Check if a file exists in the test project
    pub fn file_exists(&self, name: &str) -> bool {
        self.dir.path().join(name).exists()
    }

    /// Read a file from the test project
    pub fn read_file(&self, name: &str) -> String {
        std::fs::read_to_string(self.dir.path().join(name)).expect("Failed to read file")
    }

    /// Run the packer binary in the project directory
    pub fn run(&self, args: &[&str]) -> Output {
        Command::new(env!("CARGO_BIN_EXE_cxx-packer"))
            .current_dir(self.path())
            .env_remove("SYSTEM_NAME")
            .env_remove("RUST_LOG")
            .args(args)
            .output()
            .expect("Failed to execute cxx-packer")
    }
}

impl Default for TestProject {
    fn default() -> Self {
        Self::new()
    }
}

/// Small registry: a chain plus an independent package and a host dependency
pub const SAMPLE_REGISTRY: &str = r#"
[[packages]]
url = "https://example.com/libs/gflags.git"
branch = "v2.2.2"
dependencies = []
cmakename = "gflags"

[[packages]]
url = "https://example.com/libs/glog"
branch = "v0.6.0"
"c++" = 17
dependencies = ["gflags", "zlib"]
define = [["WITH_GTEST", "OFF"]]

[[packages]]
url = "https://example.com/libs/fmt"
dependencies = []

[[packages]]
url = "https://example.com/libs/spdlog"
dependencies = ["fmt", "glog"]
build_type = "RelWithDebInfo"
"#;

/// Registry whose dependencies form a cycle
pub const CYCLIC_REGISTRY: &str = r#"
[[packages]]
url = "https://example.com/A"
dependencies = ["B"]

[[packages]]
url = "https://example.com/B"
dependencies = ["A"]
"#;
