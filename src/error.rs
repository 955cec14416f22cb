//! Error types for cxx-packer
//!
//! Domain-specific error types using thiserror.

use std::path::PathBuf;
use thiserror::Error;

/// Registry definition errors
#[derive(Error, Debug)]
pub enum RegistryError {
    /// Two entries resolve to the same package identifier
    #[error("Package '{name}' is defined more than once (second source: {url})")]
    DuplicatePackage { name: String, url: String },

    /// Source URL has no usable last path component
    #[error("Cannot derive a package name from source '{url}'")]
    InvalidSource { url: String },

    /// Unknown build type
    #[error("Package '{package}' has unknown build type '{value}'")]
    InvalidBuildType { package: String, value: String },

    /// Parse error
    #[error("Failed to parse registry: {0}")]
    ParseError(String),

    /// IO error while reading a registry file
    #[error("IO error for '{path}': {error}")]
    IoError { path: PathBuf, error: String },
}

/// Dependency resolution errors
#[derive(Error, Debug)]
pub enum ResolverError {
    /// Circular dependency detected
    #[error("Circular dependency detected involving '{package}': {}", cycle.join(" -> "))]
    CircularDependency { package: String, cycle: Vec<String> },
}

/// Source checkout errors
#[derive(Error, Debug)]
pub enum CheckoutError {
    /// Failed to clone repository
    #[error("Failed to clone '{url}' (branch {branch}): {error}")]
    CloneFailed {
        url: String,
        branch: String,
        error: String,
    },

    /// Failed to update an existing checkout
    #[error("Failed to update existing checkout at '{path}': {error}")]
    PullFailed { path: PathBuf, error: String },
}

/// Build step errors
#[derive(Error, Debug)]
pub enum BuildError {
    /// A build step exited non-zero or could not be spawned
    #[error("{step} failed for package '{package}': {error}")]
    StepFailed {
        package: String,
        step: String,
        error: String,
    },

    /// Source checkout failed
    #[error("Checkout failed for package '{package}': {source}")]
    Checkout {
        package: String,
        source: CheckoutError,
    },

    /// Filesystem preparation failed
    #[error("Failed to prepare build tree for '{package}': {source}")]
    Prepare {
        package: String,
        source: FilesystemError,
    },
}

/// Diagnostic capture errors
#[derive(Error, Debug)]
pub enum DiagnosticsError {
    /// Logs could not be copied or the summary written
    #[error("Failed to capture build logs for '{package}': {source}")]
    Capture {
        package: String,
        source: FilesystemError,
    },
}

/// External process errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ProcessError {
    /// Process could not be started
    #[error("Failed to run '{command}': {error}")]
    SpawnFailed { command: String, error: String },

    /// Process exited with a non-zero status
    #[error("Command failed with exit code {code:?}: {command}")]
    NonZeroExit { command: String, code: Option<i32> },
}

/// Errors from best-effort post-build steps
#[derive(Error, Debug)]
pub enum ArtifactError {
    /// Invalid glob pattern
    #[error("Invalid library pattern '{pattern}': {error}")]
    InvalidPattern { pattern: String, error: String },

    /// Filesystem error
    #[error(transparent)]
    Filesystem(#[from] FilesystemError),
}

/// Run configuration errors, raised before any build side effect
#[derive(Error, Debug)]
pub enum ConfigError {
    /// No system identifier given
    #[error(
        "System name is required. Specify it via --system-name or the SYSTEM_NAME environment variable (available: {})",
        available.join(", ")
    )]
    MissingSystemName { available: Vec<String> },

    /// System identifier not known to the container image map
    #[error("Unknown system name '{name}'. Available options: {}", available.join(", "))]
    UnknownSystem { name: String, available: Vec<String> },

    /// Architecture not available for a system
    #[error("Architecture '{arch}' not supported for system '{system}'. Available architectures: {}", available.join(", "))]
    UnsupportedArch {
        system: String,
        arch: String,
        available: Vec<String>,
    },
}

/// Container run errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ContainerError {
    /// Neither docker nor podman available
    #[error("Container runtime not available. Install Docker or Podman first")]
    RuntimeNotAvailable,

    /// Image build failed
    #[error("Failed to build image '{image}': {message}")]
    ImageBuildFailed { image: String, message: String },

    /// Container execution failed
    #[error("Container execution failed: {message}")]
    ExecutionFailed { message: String },
}

/// Filesystem errors
#[derive(Error, Debug)]
pub enum FilesystemError {
    /// Failed to create directory
    #[error("Failed to create directory '{path}': {error}")]
    CreateDir { path: PathBuf, error: String },

    /// Failed to remove directory
    #[error("Failed to remove directory '{path}': {error}")]
    RemoveDir { path: PathBuf, error: String },

    /// Failed to write file
    #[error("Failed to write file '{path}': {error}")]
    WriteFile { path: PathBuf, error: String },

    /// Failed to read file
    #[error("Failed to read file '{path}': {error}")]
    ReadFile { path: PathBuf, error: String },

    /// Failed to copy file
    #[error("Failed to copy '{from}' to '{to}': {error}")]
    CopyFile {
        from: PathBuf,
        to: PathBuf,
        error: String,
    },
}
