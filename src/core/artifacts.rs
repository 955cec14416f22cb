//! Shared-library collection
//!
//! After every package has been installed, a few runtime libraries the
//! packaged libraries link against are copied out of the host's system
//! library directories into `<prefix>/lib`, so the output tree is
//! self-contained. Symlinks are followed so the copies are real files.

use regex::Regex;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::error::ArtifactError;
use crate::infra::filesystem;

/// Filename globs copied under their own name
pub const DYNAMIC_COPY: &[&str] = &[
    "*unwind*.so*",
    "libssl.so.1.1",
    "libcrypto.so.1.1",
    "libprotobuf.so.17.0.0",
];

/// Exact filenames copied under a new name: (found as, copied as)
pub const DYNAMIC_COPY_RENAME: &[(&str, &str)] = &[
    ("libgrpc++.so.1.16.1", "libgrpc++.so"),
    ("libgrpc.so.6.0.0", "libgrpc.so"),
    ("libgrpc.so.6.0.0", "libgrpc.so.6"),
    ("libssl.so.1.1", "libssl.so"),
    ("libcrypto.so.1.1", "libcrypto.so"),
    ("libprotobuf.so.17.0.0", "libprotobuf.so"),
    ("libprotobuf.so.17.0.0", "libprotobuf.so.17"),
];

/// Host directories searched, in order
pub const SYSTEM_LIB_DIRS: &[&str] = &[
    "/usr/lib",
    "/usr/lib/x86_64-linux-gnu",
    "/usr/lib64",
    "/usr/local/lib",
    "/usr/local/lib64",
    "/lib",
    "/lib/x86_64-linux-gnu",
    "/lib64",
];

/// What a collection pass did
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CollectionSummary {
    /// Files written into the output lib directory
    pub copied: Vec<PathBuf>,
    /// Globs that matched nothing
    pub unmatched_patterns: Vec<String>,
    /// Rename sources that were not found or could not be copied
    pub missing_renames: Vec<String>,
}

/// Translate a filename glob (`*`, `?`) into an anchored regex
pub fn glob_to_regex(pattern: &str) -> Result<Regex, ArtifactError> {
    let mut re = String::from("^");
    for c in pattern.chars() {
        match c {
            '*' => re.push_str(".*"),
            '?' => re.push('.'),
            other => re.push_str(&regex::escape(&other.to_string())),
        }
    }
    re.push('$');
    Regex::new(&re).map_err(|e| ArtifactError::InvalidPattern {
        pattern: pattern.to_string(),
        error: e.to_string(),
    })
}

/// Collects libraries from a set of search directories
#[derive(Debug, Clone)]
pub struct LibraryCollector {
    search_dirs: Vec<PathBuf>,
    patterns: Vec<String>,
    renames: Vec<(String, String)>,
}

impl Default for LibraryCollector {
    fn default() -> Self {
        Self {
            search_dirs: SYSTEM_LIB_DIRS.iter().map(PathBuf::from).collect(),
            patterns: DYNAMIC_COPY.iter().map(|p| (*p).to_string()).collect(),
            renames: DYNAMIC_COPY_RENAME
                .iter()
                .map(|(from, to)| ((*from).to_string(), (*to).to_string()))
                .collect(),
        }
    }
}

impl LibraryCollector {
    /// Collector over the standard system directories and tables
    pub fn new() -> Self {
        Self::default()
    }

    /// Search these directories instead
    #[must_use]
    pub fn with_search_dirs(mut self, dirs: Vec<PathBuf>) -> Self {
        self.search_dirs = dirs;
        self
    }

    /// Use these glob and rename tables instead
    #[must_use]
    pub fn with_tables(mut self, patterns: &[&str], renames: &[(&str, &str)]) -> Self {
        self.patterns = patterns.iter().map(|p| (*p).to_string()).collect();
        self.renames = renames
            .iter()
            .map(|(from, to)| ((*from).to_string(), (*to).to_string()))
            .collect();
        self
    }

    /// Copy matching libraries into `<install_prefix>/lib`
    ///
    /// Individual copy failures are logged and recorded in the summary; only
    /// an unusable pattern or output directory fails the pass.
    pub fn collect(&self, install_prefix: &Path) -> Result<CollectionSummary, ArtifactError> {
        tracing::info!("Copying dynamic libraries to output directory...");
        let lib_dir = install_prefix.join("lib");
        filesystem::create_dir_all(&lib_dir)?;

        let mut summary = CollectionSummary::default();

        tracing::info!("Stage 1: Copying files by pattern matching...");
        for pattern in &self.patterns {
            let re = glob_to_regex(pattern)?;
            let found = self.find_matching(&re);
            if found.is_empty() {
                tracing::warn!("No files found matching pattern '{pattern}'");
                summary.unmatched_patterns.push(pattern.clone());
                continue;
            }

            tracing::info!("Found {} files matching pattern '{pattern}'", found.len());
            for src in found {
                let Some(name) = src.file_name() else { continue };
                let dest = lib_dir.join(name);
                match filesystem::copy_resolved(&src, &dest) {
                    Ok(()) => {
                        tracing::info!("Copied: {} -> {}", src.display(), dest.display());
                        summary.copied.push(dest);
                    }
                    Err(e) => tracing::warn!("Failed to copy {}: {e}", src.display()),
                }
            }
        }

        tracing::info!("Stage 2: Copying and renaming specific files...");
        for (original, target) in &self.renames {
            let Some(src) = self
                .search_dirs
                .iter()
                .map(|dir| dir.join(original))
                .find(|candidate| candidate.exists())
            else {
                tracing::warn!("File not found for renaming: {original}");
                summary.missing_renames.push(original.clone());
                continue;
            };

            let dest = lib_dir.join(target);
            match filesystem::copy_resolved(&src, &dest) {
                Ok(()) => {
                    tracing::info!(
                        "Copied and renamed: {} -> {} (renamed from {original})",
                        src.display(),
                        dest.display()
                    );
                    summary.copied.push(dest);
                }
                Err(e) => {
                    tracing::warn!("Failed to copy {}: {e}", src.display());
                    summary.missing_renames.push(original.clone());
                }
            }
        }

        if !summary.unmatched_patterns.is_empty() {
            tracing::warn!(
                "Failed to find files for patterns: {:?}",
                summary.unmatched_patterns
            );
        }
        if !summary.missing_renames.is_empty() {
            tracing::warn!("Failed to find/rename files: {:?}", summary.missing_renames);
        }
        tracing::info!(
            "Dynamic library copy completed, {} files copied",
            summary.copied.len()
        );

        Ok(summary)
    }

    fn find_matching(&self, re: &Regex) -> Vec<PathBuf> {
        let mut found = Vec::new();
        for dir in self.search_dirs.iter().filter(|d| d.is_dir()) {
            for entry in WalkDir::new(dir)
                .min_depth(1)
                .max_depth(1)
                .sort_by_file_name()
                .into_iter()
                .filter_map(Result::ok)
            {
                if entry.file_type().is_dir() {
                    continue;
                }
                if re.is_match(&entry.file_name().to_string_lossy()) {
                    found.push(entry.into_path());
                }
            }
        }
        found
    }
}
