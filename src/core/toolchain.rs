//! Compiler selection
//!
//! manylinux images ship GCC 10 as devtoolset-10; other systems are expected
//! to provide `gcc-10`/`g++-10` in a standard bin directory. When neither is
//! found the build falls back to the system default compiler.

use std::path::{Path, PathBuf};

/// devtoolset-10 binary directory on manylinux images
pub const DEVTOOLSET_BIN: &str = "/opt/rh/devtoolset-10/root/usr/bin";

/// Directories searched for `gcc-10`/`g++-10`
pub const GCC10_SEARCH_DIRS: &[&str] = &["/usr/bin", "/usr/local/bin", "/opt/gcc/bin"];

/// Chosen compilers
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompilerSelection {
    /// C compiler path
    pub cc: Option<String>,
    /// C++ compiler path
    pub cxx: Option<String>,
    /// Directories to prepend to `PATH`
    pub path_prefix: Vec<PathBuf>,
}

impl CompilerSelection {
    /// Fill unselected compilers from `CC`/`CXX` in the environment
    #[must_use]
    pub fn or_env(mut self) -> Self {
        if self.cc.is_none() {
            self.cc = std::env::var("CC").ok().filter(|v| !v.is_empty());
        }
        if self.cxx.is_none() {
            self.cxx = std::env::var("CXX").ok().filter(|v| !v.is_empty());
        }
        self
    }
}

/// Select compilers for a system using the standard locations
pub fn select_compilers(system_name: &str) -> CompilerSelection {
    let dirs: Vec<&Path> = GCC10_SEARCH_DIRS.iter().map(Path::new).collect();
    select_compilers_in(system_name, Path::new(DEVTOOLSET_BIN), &dirs)
}

/// Select compilers, probing the given directories
pub fn select_compilers_in(
    system_name: &str,
    devtoolset_bin: &Path,
    search_dirs: &[&Path],
) -> CompilerSelection {
    tracing::info!("Setting up compiler environment...");
    let mut selection = CompilerSelection::default();

    if system_name.starts_with("manylinux") {
        tracing::info!("Setting up devtoolset-10 compiler environment...");
        selection.cc = executable(&devtoolset_bin.join("gcc"));
        selection.cxx = executable(&devtoolset_bin.join("g++"));
        if devtoolset_bin.is_dir() {
            selection.path_prefix.push(devtoolset_bin.to_path_buf());
        }
        if selection.cc.is_none() {
            tracing::warn!("devtoolset-10 gcc not found, using system default");
        }
        if selection.cxx.is_none() {
            tracing::warn!("devtoolset-10 g++ not found, using system default");
        }
    } else {
        tracing::info!("Setting up gcc-10/g++-10 compiler environment...");
        for dir in search_dirs {
            if selection.cc.is_none() {
                selection.cc = executable(&dir.join("gcc-10"));
            }
            if selection.cxx.is_none() {
                selection.cxx = executable(&dir.join("g++-10"));
            }
            if selection.cc.is_some() && selection.cxx.is_some() {
                break;
            }
        }
        if selection.cc.is_none() {
            tracing::warn!("gcc-10 not found, using system default");
        }
        if selection.cxx.is_none() {
            tracing::warn!("g++-10 not found, using system default");
        }
    }

    if let Some(ref cc) = selection.cc {
        tracing::info!("Set CC={cc}");
    }
    if let Some(ref cxx) = selection.cxx {
        tracing::info!("Set CXX={cxx}");
    }
    selection
}

#[cfg(unix)]
fn executable(path: &Path) -> Option<String> {
    use std::os::unix::fs::PermissionsExt;
    let meta = std::fs::metadata(path).ok()?;
    (meta.is_file() && meta.permissions().mode() & 0o111 != 0).then(|| path.display().to_string())
}

#[cfg(not(unix))]
fn executable(path: &Path) -> Option<String> {
    path.is_file().then(|| path.display().to_string())
}
