//! Pre-run cleanup
//!
//! Every run starts from a clean build root and logs directory. The install
//! prefix is wiped too, unless it is a protected system location.

use std::path::{Path, PathBuf};

use crate::core::build_env::{is_protected_prefix, BuildContext};
use crate::error::FilesystemError;
use crate::infra::filesystem;

/// Cleanup options
#[derive(Debug, Clone, Copy, Default)]
pub struct CleanOptions {
    /// Keep existing source checkouts (they are updated in place instead)
    pub keep_sources: bool,
}

/// Result of clean operation
#[derive(Debug, Default)]
pub struct CleanResult {
    /// Directories that were removed
    pub removed: Vec<PathBuf>,
    /// Directories left alone
    pub skipped: Vec<PathBuf>,
}

/// Remove the previous run's artifacts
///
/// A protected install prefix is skipped with a warning; installed files
/// there must be removed by hand. Each directory is attempted even when an
/// earlier one fails; the first failure is returned afterwards.
pub fn clean_previous_run(
    ctx: &BuildContext,
    options: CleanOptions,
) -> Result<CleanResult, FilesystemError> {
    let mut result = CleanResult::default();
    let mut first_error = None;
    let prefix = &ctx.install_prefix;

    let mut targets = Vec::with_capacity(3);
    if is_protected_prefix(prefix) {
        tracing::warn!("System directory cleanup skipped for safety: {}", prefix.display());
        tracing::warn!("Please manually remove installed files if needed");
        result.skipped.push(prefix.clone());
    } else {
        targets.push(prefix);
    }

    if options.keep_sources {
        tracing::info!("Keeping source checkouts in {}", ctx.build_root.display());
        result.skipped.push(ctx.build_root.clone());
    } else {
        targets.push(&ctx.build_root);
    }
    targets.push(&ctx.logs_dir);

    for path in targets {
        if let Err(e) = remove(path, &mut result) {
            tracing::warn!("{e}");
            first_error.get_or_insert(e);
        }
    }

    match first_error {
        Some(e) => Err(e),
        None => Ok(result),
    }
}

fn remove(path: &Path, result: &mut CleanResult) -> Result<(), FilesystemError> {
    if path.exists() {
        filesystem::remove_dir_all(path)?;
        tracing::debug!("Removed {}", path.display());
        result.removed.push(path.to_path_buf());
    } else {
        result.skipped.push(path.to_path_buf());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn context(temp: &TempDir, prefix: PathBuf) -> BuildContext {
        BuildContext::new(prefix, "ubuntu22.04")
            .with_build_root(temp.path().join("build"))
            .with_logs_dir(temp.path().join("output_logs"))
    }

    fn populate(temp: &TempDir) {
        for dir in ["output/lib", "build/glog", "output_logs"] {
            std::fs::create_dir_all(temp.path().join(dir)).unwrap();
        }
    }

    #[test]
    fn test_clean_removes_everything_for_local_prefix() {
        let temp = TempDir::new().unwrap();
        populate(&temp);
        let ctx = context(&temp, temp.path().join("output"));

        let result = clean_previous_run(&ctx, CleanOptions::default()).unwrap();

        assert_eq!(result.removed.len(), 3);
        assert!(!temp.path().join("output").exists());
        assert!(!temp.path().join("build").exists());
        assert!(!temp.path().join("output_logs").exists());
    }

    #[test]
    fn test_clean_skips_protected_prefix() {
        let temp = TempDir::new().unwrap();
        populate(&temp);
        let ctx = context(&temp, PathBuf::from("/usr/local"));

        let result = clean_previous_run(&ctx, CleanOptions::default()).unwrap();

        assert!(result.skipped.contains(&PathBuf::from("/usr/local")));
        assert!(!temp.path().join("build").exists());
        assert!(temp.path().join("output").exists());
    }

    #[test]
    fn test_clean_keeps_sources() {
        let temp = TempDir::new().unwrap();
        populate(&temp);
        let ctx = context(&temp, temp.path().join("output"));

        clean_previous_run(&ctx, CleanOptions { keep_sources: true }).unwrap();

        assert!(temp.path().join("build/glog").exists());
        assert!(!temp.path().join("output_logs").exists());
    }

    #[test]
    fn test_clean_on_fresh_tree() {
        let temp = TempDir::new().unwrap();
        let ctx = context(&temp, temp.path().join("output"));
        let result = clean_previous_run(&ctx, CleanOptions::default()).unwrap();
        assert!(result.removed.is_empty());
        assert_eq!(result.skipped.len(), 3);
    }

    #[test]
    fn test_clean_continues_past_a_failed_prefix() {
        let temp = TempDir::new().unwrap();
        populate(&temp);
        std::fs::write(temp.path().join("stale_prefix"), "not a directory").unwrap();
        std::fs::write(temp.path().join("output_logs/glog_build_errors.txt"), "old").unwrap();
        let ctx = context(&temp, temp.path().join("stale_prefix"));

        let err = clean_previous_run(&ctx, CleanOptions::default()).unwrap_err();

        assert!(matches!(err, FilesystemError::RemoveDir { .. }));
        assert!(!temp.path().join("build/glog").exists());
        assert!(!temp.path().join("output_logs").exists());
    }
}
