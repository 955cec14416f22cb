//! Run report
//!
//! Per-package outcomes in build order, written as `build_report.json`
//! (identifier to `{url, success, message}`) and a plain-text summary.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::config::defaults;
use crate::error::FilesystemError;
use crate::infra::filesystem;

/// Outcome of one package
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildResult {
    /// Source URL
    pub url: String,
    /// Whether build and install succeeded
    pub success: bool,
    /// Success detail or failure cause
    pub message: String,
    /// Checked-out commit, when known
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub commit: Option<String>,
}

impl BuildResult {
    /// Successful outcome
    pub fn success(url: &str, message: impl Into<String>) -> Self {
        Self {
            url: url.to_string(),
            success: true,
            message: message.into(),
            commit: None,
        }
    }

    /// Failed outcome
    pub fn failure(url: &str, message: impl Into<String>) -> Self {
        Self {
            url: url.to_string(),
            success: false,
            message: message.into(),
            commit: None,
        }
    }

    /// Attach the checked-out commit
    #[must_use]
    pub fn with_commit(mut self, commit: Option<String>) -> Self {
        self.commit = commit;
        self
    }
}

/// Ordered map of package identifier to outcome
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildReport {
    entries: Vec<(String, BuildResult)>,
}

impl BuildReport {
    /// Create an empty report
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an outcome, replacing an earlier one for the same package
    pub fn record(&mut self, package: &str, result: BuildResult) {
        if let Some(slot) = self.entries.iter_mut().find(|(name, _)| name == package) {
            slot.1 = result;
        } else {
            self.entries.push((package.to_string(), result));
        }
    }

    /// Outcome of a package
    pub fn get(&self, package: &str) -> Option<&BuildResult> {
        self.entries
            .iter()
            .find(|(name, _)| name == package)
            .map(|(_, r)| r)
    }

    /// Entries in recording order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &BuildResult)> {
        self.entries.iter().map(|(name, r)| (name.as_str(), r))
    }

    /// Package identifiers in recording order
    pub fn packages(&self) -> Vec<&str> {
        self.entries.iter().map(|(name, _)| name.as_str()).collect()
    }

    /// Number of recorded packages
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing was recorded
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of successful packages
    pub fn successful(&self) -> usize {
        self.entries.iter().filter(|(_, r)| r.success).count()
    }

    /// Number of failed packages
    pub fn failed(&self) -> usize {
        self.entries.iter().filter(|(_, r)| !r.success).count()
    }

    /// Whether every recorded package succeeded
    pub fn all_succeeded(&self) -> bool {
        self.failed() == 0
    }

    /// JSON form, keys in recording order
    pub fn to_json(&self) -> String {
        let map: serde_json::Map<String, serde_json::Value> = self
            .entries
            .iter()
            .map(|(name, r)| {
                let value = serde_json::to_value(r).unwrap_or(serde_json::Value::Null);
                (name.clone(), value)
            })
            .collect();
        serde_json::to_string_pretty(&serde_json::Value::Object(map)).unwrap_or_default()
    }

    /// Parse the JSON form
    pub fn from_json(content: &str) -> Result<Self, serde_json::Error> {
        let map: serde_json::Map<String, serde_json::Value> = serde_json::from_str(content)?;
        let entries = map
            .into_iter()
            .map(|(name, value)| serde_json::from_value(value).map(|r| (name, r)))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { entries })
    }

    /// Human-readable form
    pub fn to_text(&self) -> String {
        let mut out = String::from("Build Report\n");
        out.push_str(&"=".repeat(50));
        out.push_str("\n\n");

        for (name, result) in &self.entries {
            let status = if result.success { "SUCCESS" } else { "FAILED" };
            out.push_str(&format!("{name}: {status}\n"));
            out.push_str(&format!("  URL: {}\n", result.url));
            if let Some(ref commit) = result.commit {
                out.push_str(&format!("  Commit: {commit}\n"));
            }
            out.push_str(&format!("  Message: {}\n\n", result.message));
        }

        out.push_str(&format!(
            "Summary: {} successful, {} failed\n",
            self.successful(),
            self.failed()
        ));
        out
    }

    /// Write both report files into `dir`, plus a copy of the run log if given
    pub fn write(&self, dir: &Path, run_log: Option<&Path>) -> Result<Vec<PathBuf>, FilesystemError> {
        filesystem::create_dir_all(dir)?;

        let json = dir.join(defaults::REPORT_JSON);
        filesystem::write_file(&json, &self.to_json())?;
        let text = dir.join(defaults::REPORT_TEXT);
        filesystem::write_file(&text, &self.to_text())?;
        let mut written = vec![json, text];

        if let Some(log) = run_log.filter(|l| l.is_file()) {
            let dest = dir.join(defaults::RUN_LOG_FILE);
            if log != dest {
                std::fs::copy(log, &dest).map_err(|e| FilesystemError::CopyFile {
                    from: log.to_path_buf(),
                    to: dest.clone(),
                    error: e.to_string(),
                })?;
            }
            written.push(dest);
        }

        tracing::info!("Build report generated in {}", dir.display());
        Ok(written)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use tempfile::TempDir;

    fn sample() -> BuildReport {
        let mut report = BuildReport::new();
        report.record(
            "gflags",
            BuildResult::success("https://github.com/gflags/gflags", "Built successfully")
                .with_commit(Some("abc123".to_string())),
        );
        report.record(
            "glog",
            BuildResult::failure("https://github.com/google/glog", "Build failed"),
        );
        report
    }

    #[test]
    fn test_counts() {
        let report = sample();
        assert_eq!(report.successful(), 1);
        assert_eq!(report.failed(), 1);
        assert!(!report.all_succeeded());
        assert_eq!(report.packages(), vec!["gflags", "glog"]);
    }

    #[test]
    fn test_json_shape() {
        let json: serde_json::Value = serde_json::from_str(&sample().to_json()).unwrap();
        assert_eq!(json["glog"]["success"], false);
        assert_eq!(json["glog"]["message"], "Build failed");
        assert_eq!(json["gflags"]["url"], "https://github.com/gflags/gflags");
        assert_eq!(json["gflags"]["commit"], "abc123");
        assert!(json["glog"].get("commit").is_none());
    }

    #[test]
    fn test_json_keeps_order() {
        let parsed = BuildReport::from_json(&sample().to_json()).unwrap();
        assert_eq!(parsed, sample());
    }

    #[test]
    fn test_from_json_accepts_report_without_commit() {
        let parsed = BuildReport::from_json(
            r#"{"zlib": {"url": "https://x/zlib", "success": true, "message": "Built successfully"}}"#,
        )
        .unwrap();
        assert_eq!(parsed.successful(), 1);
        assert!(parsed.get("zlib").unwrap().commit.is_none());
    }

    #[test]
    fn test_text_report() {
        let text = sample().to_text();
        assert!(text.starts_with("Build Report\n"));
        assert!(text.contains("gflags: SUCCESS\n  URL: https://github.com/gflags/gflags\n"));
        assert!(text.contains("glog: FAILED\n"));
        assert!(text.contains("  Message: Build failed\n"));
        assert!(text.ends_with("Summary: 1 successful, 1 failed\n"));
    }

    #[test]
    fn test_record_replaces_existing() {
        let mut report = sample();
        report.record("glog", BuildResult::success("https://github.com/google/glog", "ok"));
        assert_eq!(report.len(), 2);
        assert!(report.all_succeeded());
    }

    #[test]
    fn test_write_files_and_copy_log() {
        let temp = TempDir::new().unwrap();
        let log = temp.path().join("run.log");
        std::fs::write(&log, "log line\n").unwrap();
        let out = temp.path().join("logs");

        let written = sample().write(&out, Some(&log)).unwrap();

        assert_eq!(written.len(), 3);
        assert!(out.join("build_report.json").exists());
        assert!(out.join("build_report.txt").exists());
        assert_eq!(std::fs::read_to_string(out.join("build.log")).unwrap(), "log line\n");
    }

    #[test]
    fn test_write_without_log() {
        let temp = TempDir::new().unwrap();
        let written = sample()
            .write(temp.path(), Some(&temp.path().join("missing.log")))
            .unwrap();
        assert_eq!(written.len(), 2);
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        /// Parsing a written report reproduces the recorded counts
        #[test]
        fn prop_counts_survive_json(outcomes in proptest::collection::vec(any::<bool>(), 0..20)) {
            let mut report = BuildReport::new();
            for (i, ok) in outcomes.iter().enumerate() {
                let url = format!("https://example.com/p{i}");
                let result = if *ok {
                    BuildResult::success(&url, "Built successfully")
                } else {
                    BuildResult::failure(&url, "Build failed")
                };
                report.record(&format!("p{i}"), result);
            }

            let parsed = BuildReport::from_json(&report.to_json()).unwrap();
            prop_assert_eq!(parsed.successful(), report.successful());
            prop_assert_eq!(parsed.failed(), report.failed());
            prop_assert_eq!(parsed.packages(), report.packages());
        }
    }
}
