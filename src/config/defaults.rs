//! Default configuration values

/// Per-package source checkouts, relative to the working directory
pub const BUILD_DIR: &str = "build";

/// Local install prefix used by `local` runs
pub const OUTPUT_DIR: &str = "output";

/// Reports, run log and per-package diagnostics
pub const OUTPUT_LOGS_DIR: &str = "output_logs";

/// Install prefix used by `system` runs
pub const SYSTEM_INSTALL_PREFIX: &str = "/usr/local";

/// Upper bound for `make -j`
pub const MAX_BUILD_JOBS: usize = 4;

/// Environment variable consulted when `--system-name` is absent
pub const SYSTEM_NAME_ENV: &str = "SYSTEM_NAME";

/// Default run log file name
pub const RUN_LOG_FILE: &str = "build.log";

/// Machine-readable report file name
pub const REPORT_JSON: &str = "build_report.json";

/// Human-readable report file name
pub const REPORT_TEXT: &str = "build_report.txt";

/// Container output mount on the host
pub const CONTAINER_MOUNT_DIR: &str = "./.output";

/// Container logs mount on the host
pub const CONTAINER_LOGS_DIR: &str = "./.output_logs";

/// Working directory inside the build container
pub const CONTAINER_WORKSPACE: &str = "/workspace";

/// Tag of the image built for containerized runs
pub const CONTAINER_IMAGE_NAME: &str = "cxx-packer-builder";

/// Docker build context directory
pub const CONTAINER_CONTEXT_DIR: &str = ".img_build";

/// Bounded parallelism for compile steps: `min(available cores, MAX_BUILD_JOBS)`
pub fn build_jobs() -> usize {
    num_cpus::get().clamp(1, MAX_BUILD_JOBS)
}
