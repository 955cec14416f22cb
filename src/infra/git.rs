//! Git operations
//!
//! Source acquisition shells out to the `git` CLI (clone, pull and recursive
//! submodule sync); the resolved commit is read back with the gix crate.

use std::path::{Path, PathBuf};

use crate::error::CheckoutError;
use crate::infra::process::{CommandRunner, ShellCommand};

/// Packages whose nested submodules must be present on first checkout
pub const RECURSIVE_CLONE_PACKAGES: &[&str] = &["grpc", "protobuf"];

/// How a checkout was obtained
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckoutKind {
    /// Fresh clone
    Cloned,
    /// Existing directory pulled in place
    Updated,
}

/// Result of a checkout
#[derive(Debug, Clone)]
pub struct CheckoutResult {
    /// Path to the working tree
    pub path: PathBuf,
    /// Clone or update
    pub kind: CheckoutKind,
    /// Resolved HEAD commit, when readable
    pub commit: Option<String>,
}

/// Git repository operations
#[derive(Debug)]
pub struct GitOperations<'a, R: CommandRunner> {
    runner: &'a R,
}

impl<'a, R: CommandRunner> GitOperations<'a, R> {
    /// Create a new git operations handler
    pub fn new(runner: &'a R) -> Self {
        Self { runner }
    }

    /// Check out `url` at `branch` into `dest`
    ///
    /// An existing `dest` is updated in place (pull plus recursive submodule
    /// sync) instead of being re-cloned. Submodule sync failures are tolerated.
    pub fn checkout(
        &self,
        package: &str,
        url: &str,
        branch: &str,
        dest: &Path,
    ) -> Result<CheckoutResult, CheckoutError> {
        let kind = if dest.exists() {
            tracing::info!(
                "Directory {} already exists, pulling latest changes...",
                dest.display()
            );
            self.runner
                .run(&ShellCommand::new("git").arg("pull").current_dir(dest))
                .map_err(|e| CheckoutError::PullFailed {
                    path: dest.to_path_buf(),
                    error: e.to_string(),
                })?;

            if let Err(e) = self.runner.run(
                &ShellCommand::new("git")
                    .args(["submodule", "update", "--init", "--recursive"])
                    .current_dir(dest),
            ) {
                tracing::warn!("Submodule update failed in {}: {e}", dest.display());
            }
            CheckoutKind::Updated
        } else {
            tracing::info!("Cloning {url} (branch: {branch}) to {}", dest.display());
            self.runner
                .run(&clone_command(package, url, branch, dest))
                .map_err(|e| CheckoutError::CloneFailed {
                    url: url.to_string(),
                    branch: branch.to_string(),
                    error: e.to_string(),
                })?;
            CheckoutKind::Cloned
        };

        let commit = head_commit(dest);
        if let Some(ref sha) = commit {
            tracing::debug!("{package} checked out at {sha}");
        }

        Ok(CheckoutResult {
            path: dest.to_path_buf(),
            kind,
            commit,
        })
    }
}

/// Build the clone command, recursive for packages with nested submodules
pub fn clone_command(package: &str, url: &str, branch: &str, dest: &Path) -> ShellCommand {
    let mut cmd = ShellCommand::new("git").arg("clone");
    if RECURSIVE_CLONE_PACKAGES.contains(&package) {
        tracing::info!("Cloning {package} with submodules...");
        cmd = cmd.arg("--recursive");
    }
    cmd.args(["-b", branch, url]).arg(dest.display().to_string())
}

/// Resolve HEAD of the repository at `path` to a commit SHA
pub fn head_commit(path: &Path) -> Option<String> {
    let repo = gix::open(path).ok()?;
    let id = repo.head_id().ok()?;
    Some(id.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infra::process::RecordingRunner;
    use tempfile::TempDir;

    #[test]
    fn test_clone_command_plain() {
        let cmd = clone_command(
            "glog",
            "https://github.com/AI-Infra-Team/glog",
            "v0.6.0",
            Path::new("/b/glog"),
        );
        assert_eq!(
            cmd.display(),
            "git clone -b v0.6.0 https://github.com/AI-Infra-Team/glog /b/glog"
        );
    }

    #[test]
    fn test_clone_command_recursive_for_grpc() {
        let cmd = clone_command(
            "grpc",
            "https://github.com/grpc/grpc",
            "v1.50.2",
            Path::new("/b/grpc"),
        );
        assert!(cmd.args.contains(&"--recursive".to_string()));
    }

    #[test]
    fn test_checkout_clones_missing_directory() {
        let temp = TempDir::new().unwrap();
        let runner = RecordingRunner::new();
        let git = GitOperations::new(&runner);

        let dest = temp.path().join("gflags");
        let result = git
            .checkout("gflags", "https://example.com/gflags", "master", &dest)
            .unwrap();

        assert_eq!(result.kind, CheckoutKind::Cloned);
        assert!(result.commit.is_none());
        assert_eq!(runner.commands().len(), 1);
        assert_eq!(runner.commands()[0].args[0], "clone");
    }

    #[test]
    fn test_checkout_updates_existing_directory() {
        let temp = TempDir::new().unwrap();
        let dest = temp.path().join("gflags");
        std::fs::create_dir_all(&dest).unwrap();

        let runner = RecordingRunner::new().fail_on("submodule");
        let git = GitOperations::new(&runner);
        let result = git
            .checkout("gflags", "https://example.com/gflags", "master", &dest)
            .unwrap();

        assert_eq!(result.kind, CheckoutKind::Updated);
        assert_eq!(
            runner.lines(),
            vec!["git pull", "git submodule update --init --recursive"]
        );
    }

    #[test]
    fn test_checkout_clone_failure() {
        let temp = TempDir::new().unwrap();
        let runner = RecordingRunner::new().fail_on("git clone");
        let git = GitOperations::new(&runner);

        let err = git
            .checkout("x", "https://example.com/x", "main", &temp.path().join("x"))
            .unwrap_err();
        assert!(matches!(err, CheckoutError::CloneFailed { .. }));
    }

    #[test]
    fn test_head_commit_of_non_repository() {
        let temp = TempDir::new().unwrap();
        assert!(head_commit(temp.path()).is_none());
    }

    #[test]
    #[ignore = "requires network access - run with --ignored"]
    fn test_checkout_real_repository() {
        use crate::infra::process::SystemRunner;

        let temp = TempDir::new().unwrap();
        let runner = SystemRunner;
        let git = GitOperations::new(&runner);
        let result = git
            .checkout(
                "gflags",
                "https://github.com/gflags/gflags",
                "master",
                &temp.path().join("gflags"),
            )
            .unwrap();
        assert_eq!(result.commit.map(|c| c.len()), Some(40));
    }
}
