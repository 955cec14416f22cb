//! Failed-build diagnostics
//!
//! When a configure, compile or install step fails, whatever logs the build
//! system left behind are copied into `<logs>/<package>_build_errors/`
//! together with a short summary.

use std::path::{Path, PathBuf};

use crate::core::build_env::BuildContext;
use crate::error::{DiagnosticsError, FilesystemError};
use crate::infra::{clock, filesystem};

/// Logs copied from the package build directory: (relative source, saved name)
const BUILD_DIR_LOGS: &[(&str, &str)] = &[
    ("CMakeFiles/CMakeError.log", "CMakeError.log"),
    ("CMakeFiles/CMakeOutput.log", "CMakeOutput.log"),
    ("CMakeFiles/CMakeConfigureLog.yaml", "CMakeConfigureLog.yaml"),
    ("config.log", "config.log"),
];

/// Summary file name
pub const SUMMARY_FILE: &str = "error_summary.txt";

/// Diagnostics directory for a package
pub fn diagnostics_dir(logs_dir: &Path, package: &str) -> PathBuf {
    logs_dir.join(format!("{package}_build_errors"))
}

/// Copy the build logs of a failed package and write a summary
///
/// Returns the diagnostics directory. Missing logs are skipped; only a
/// failure to create the directory or write the summary is an error.
pub fn capture_build_logs(
    package: &str,
    source_dir: &Path,
    ctx: &BuildContext,
) -> Result<PathBuf, DiagnosticsError> {
    let wrap = |source: FilesystemError| DiagnosticsError::Capture {
        package: package.to_string(),
        source,
    };

    let dir = diagnostics_dir(&ctx.logs_dir, package);
    filesystem::create_dir_all(&dir).map_err(wrap)?;

    let build_dir = source_dir.join("build");
    let mut copied = Vec::new();

    for (relative, saved) in BUILD_DIR_LOGS {
        let from = build_dir.join(relative);
        if from.is_file() {
            copy_log(&from, &dir.join(saved), package, &mut copied);
        }
    }

    let root_config = source_dir.join("config.log");
    if root_config.is_file() {
        copy_log(&root_config, &dir.join("root_config.log"), package, &mut copied);
    }

    let summary = render_summary(package, source_dir, &build_dir, ctx, &copied);
    filesystem::write_file(&dir.join(SUMMARY_FILE), &summary).map_err(wrap)?;

    tracing::info!("Build error logs copied to: {}", dir.display());
    Ok(dir)
}

fn copy_log(from: &Path, to: &Path, package: &str, copied: &mut Vec<String>) {
    match std::fs::copy(from, to) {
        Ok(_) => {
            let name = to
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            tracing::info!("Copied {name} for {package}");
            copied.push(name);
        }
        Err(e) => tracing::warn!("Failed to copy {}: {e}", from.display()),
    }
}

fn render_summary(
    package: &str,
    source_dir: &Path,
    build_dir: &Path,
    ctx: &BuildContext,
    copied: &[String],
) -> String {
    let mut out = format!("Build Error Summary for {package}\n");
    out.push_str(&"=".repeat(50));
    out.push_str("\n\n");
    out.push_str(&format!("Package: {package}\n"));
    out.push_str(&format!("Source Directory: {}\n", source_dir.display()));
    out.push_str(&format!("Build Directory: {}\n", build_dir.display()));
    out.push_str(&format!("System: {}\n", ctx.system_name));
    out.push_str(&format!("Time: {}\n\n", clock::now_utc_display()));

    if copied.is_empty() {
        out.push_str("No build system logs were found.\n");
    } else {
        out.push_str("Captured logs:\n");
        for name in copied {
            out.push_str(&format!("  {name}\n"));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn context(temp: &TempDir) -> BuildContext {
        BuildContext::new(temp.path().join("out"), "ubuntu22.04")
            .with_logs_dir(temp.path().join("logs"))
    }

    #[test]
    fn test_capture_copies_cmake_and_autotools_logs() {
        let temp = TempDir::new().unwrap();
        let source = temp.path().join("build/glog");
        std::fs::create_dir_all(source.join("build/CMakeFiles")).unwrap();
        std::fs::write(source.join("build/CMakeFiles/CMakeError.log"), "boom").unwrap();
        std::fs::write(source.join("build/CMakeFiles/CMakeOutput.log"), "out").unwrap();
        std::fs::write(source.join("config.log"), "root").unwrap();

        let dir = capture_build_logs("glog", &source, &context(&temp)).unwrap();

        assert_eq!(dir, temp.path().join("logs/glog_build_errors"));
        assert_eq!(std::fs::read_to_string(dir.join("CMakeError.log")).unwrap(), "boom");
        assert!(dir.join("CMakeOutput.log").exists());
        assert_eq!(std::fs::read_to_string(dir.join("root_config.log")).unwrap(), "root");
        assert!(!dir.join("config.log").exists());

        let summary = std::fs::read_to_string(dir.join(SUMMARY_FILE)).unwrap();
        assert!(summary.contains("Package: glog"));
        assert!(summary.contains("System: ubuntu22.04"));
        assert!(summary.contains("Time: "));
        assert!(summary.contains("  CMakeError.log"));
    }

    #[test]
    fn test_capture_without_any_logs_writes_summary() {
        let temp = TempDir::new().unwrap();
        let source = temp.path().join("build/x");
        std::fs::create_dir_all(&source).unwrap();

        let dir = capture_build_logs("x", &source, &context(&temp)).unwrap();
        let summary = std::fs::read_to_string(dir.join(SUMMARY_FILE)).unwrap();
        assert!(summary.contains("No build system logs were found."));
    }

    #[cfg(unix)]
    #[test]
    fn test_capture_fails_when_logs_dir_unwritable() {
        let temp = TempDir::new().unwrap();
        let blocker = temp.path().join("logs");
        std::fs::write(&blocker, "not a dir").unwrap();

        let result = capture_build_logs("x", temp.path(), &context(&temp));
        assert!(matches!(result, Err(DiagnosticsError::Capture { .. })));
    }
}
