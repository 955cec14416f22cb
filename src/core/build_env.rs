//! Build context
//!
//! Everything a package build needs to know about its environment: where to
//! install, which compilers to use and which search paths earlier packages
//! have contributed. A context is never mutated; the driver derives a new one
//! after each successful package.

use std::path::{Path, PathBuf};

use crate::config::defaults;

/// Compiler flag variables inherited from the invoking environment
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InheritedFlags {
    /// `CPPFLAGS`
    pub cppflags: Option<String>,
    /// `CFLAGS`
    pub cflags: Option<String>,
    /// `CXXFLAGS`
    pub cxxflags: Option<String>,
    /// `LDFLAGS`
    pub ldflags: Option<String>,
}

impl InheritedFlags {
    /// Read the flag variables from the process environment
    pub fn from_env() -> Self {
        let read = |key: &str| std::env::var(key).ok().filter(|v| !v.is_empty());
        Self {
            cppflags: read("CPPFLAGS"),
            cflags: read("CFLAGS"),
            cxxflags: read("CXXFLAGS"),
            ldflags: read("LDFLAGS"),
        }
    }
}

/// Immutable build context threaded through every package build
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildContext {
    /// Shared install prefix
    pub install_prefix: PathBuf,
    /// Directory holding per-package source checkouts
    pub build_root: PathBuf,
    /// Directory receiving reports and diagnostics
    pub logs_dir: PathBuf,
    /// Target system identifier
    pub system_name: String,
    /// Parallel compile jobs
    pub jobs: usize,
    /// Whether install steps may use sudo
    pub use_sudo: bool,
    /// C compiler, when one was selected
    pub cc: Option<String>,
    /// C++ compiler, when one was selected
    pub cxx: Option<String>,
    /// Directories prepended to `PATH`
    pub path_prefix: Vec<PathBuf>,
    /// `PKG_CONFIG_PATH` entries, in order
    pub pkg_config_path: Vec<PathBuf>,
    /// Flag variables inherited from the caller
    pub inherited: InheritedFlags,
}

impl BuildContext {
    /// Create a context for a run
    pub fn new(install_prefix: PathBuf, system_name: &str) -> Self {
        Self {
            install_prefix,
            build_root: PathBuf::from(defaults::BUILD_DIR),
            logs_dir: PathBuf::from(defaults::OUTPUT_LOGS_DIR),
            system_name: system_name.to_string(),
            jobs: defaults::build_jobs(),
            use_sudo: false,
            cc: None,
            cxx: None,
            path_prefix: Vec::new(),
            pkg_config_path: Vec::new(),
            inherited: InheritedFlags::default(),
        }
    }

    /// Set the build root
    #[must_use]
    pub fn with_build_root(mut self, build_root: PathBuf) -> Self {
        self.build_root = build_root;
        self
    }

    /// Set the logs directory
    #[must_use]
    pub fn with_logs_dir(mut self, logs_dir: PathBuf) -> Self {
        self.logs_dir = logs_dir;
        self
    }

    /// Set the number of parallel jobs
    #[must_use]
    pub fn with_jobs(mut self, jobs: usize) -> Self {
        self.jobs = jobs.max(1);
        self
    }

    /// Allow sudo for installs into protected prefixes
    #[must_use]
    pub fn with_sudo(mut self, use_sudo: bool) -> Self {
        self.use_sudo = use_sudo;
        self
    }

    /// Set the compilers and extra `PATH` entries
    #[must_use]
    pub fn with_compilers(
        mut self,
        cc: Option<String>,
        cxx: Option<String>,
        path_prefix: Vec<PathBuf>,
    ) -> Self {
        self.cc = cc;
        self.cxx = cxx;
        self.path_prefix = path_prefix;
        self
    }

    /// Set the inherited flag variables
    #[must_use]
    pub fn with_inherited(mut self, inherited: InheritedFlags) -> Self {
        self.inherited = inherited;
        self
    }

    /// Derive a context whose `PKG_CONFIG_PATH` also covers `dirs`
    ///
    /// Entries already present are not repeated.
    #[must_use]
    pub fn with_pkg_config_dirs(&self, dirs: &[PathBuf]) -> Self {
        let mut next = self.clone();
        for dir in dirs {
            if !next.pkg_config_path.contains(dir) {
                next.pkg_config_path.push(dir.clone());
            }
        }
        next
    }

    /// Source checkout directory of a package
    pub fn source_dir(&self, package: &str) -> PathBuf {
        self.build_root.join(package)
    }

    /// Whether install steps must be elevated
    pub fn needs_sudo_for_install(&self) -> bool {
        self.use_sudo && is_protected_prefix(&self.install_prefix)
    }

    /// Environment passed to every build command
    pub fn process_env(&self) -> Vec<(String, String)> {
        let mut env = Vec::new();

        if let Some(ref cc) = self.cc {
            env.push(("CC".to_string(), cc.clone()));
        }
        if let Some(ref cxx) = self.cxx {
            env.push(("CXX".to_string(), cxx.clone()));
        }

        if !self.pkg_config_path.is_empty() {
            let mut entries: Vec<String> = self
                .pkg_config_path
                .iter()
                .map(|p| p.display().to_string())
                .collect();
            if let Ok(existing) = std::env::var("PKG_CONFIG_PATH") {
                if !existing.is_empty() {
                    entries.push(existing);
                }
            }
            env.push(("PKG_CONFIG_PATH".to_string(), entries.join(":")));
        }

        if !self.path_prefix.is_empty() {
            let mut entries: Vec<String> = self
                .path_prefix
                .iter()
                .map(|p| p.display().to_string())
                .collect();
            if let Ok(existing) = std::env::var("PATH") {
                entries.push(existing);
            }
            env.push(("PATH".to_string(), entries.join(":")));
        }

        env
    }
}

/// Whether a prefix is a system location that must never be wiped and
/// may need elevated privileges to write
pub fn is_protected_prefix(prefix: &Path) -> bool {
    prefix == Path::new(defaults::SYSTEM_INSTALL_PREFIX)
        || prefix.starts_with("/usr")
        || prefix.starts_with("/opt")
}
