//! Container runtime for isolated builds
//!
//! Drives Docker or Podman through the [`CommandRunner`] seam: build the
//! packer image, run it with the output and logs directories bind-mounted,
//! and remove it afterwards.

use std::path::Path;

use crate::core::container::ContainerPlan;
use crate::error::ContainerError;
use crate::infra::process::{CommandRunner, ShellCommand};

/// Proxy variables forwarded into the container when set on the host
pub const PROXY_VARS: &[&str] = &[
    "http_proxy",
    "https_proxy",
    "ftp_proxy",
    "HTTP_PROXY",
    "HTTPS_PROXY",
    "FTP_PROXY",
    "no_proxy",
    "NO_PROXY",
];

/// Container runtime type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContainerRuntime {
    /// Docker container runtime
    Docker,
    /// Podman container runtime
    Podman,
}

impl ContainerRuntime {
    /// Get the command name for this runtime
    pub fn command(&self) -> &'static str {
        match self {
            ContainerRuntime::Docker => "docker",
            ContainerRuntime::Podman => "podman",
        }
    }

    /// First runtime found in PATH, Docker preferred
    pub fn detect() -> Option<Self> {
        [Self::Docker, Self::Podman]
            .into_iter()
            .find(|runtime| which::which(runtime.command()).is_ok())
    }
}

impl std::fmt::Display for ContainerRuntime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.command())
    }
}

/// Whether the current process runs as root
#[cfg(unix)]
pub fn is_root() -> bool {
    use std::os::unix::fs::MetadataExt;
    std::fs::metadata("/proc/self")
        .map(|m| m.uid() == 0)
        .unwrap_or(false)
}

/// Whether the current process runs as root
#[cfg(not(unix))]
pub fn is_root() -> bool {
    false
}

/// `-e VAR=value` arguments for every proxy variable `lookup` knows
pub fn proxy_env_args<F>(lookup: F) -> Vec<String>
where
    F: Fn(&str) -> Option<String>,
{
    let mut args = Vec::new();
    for var in PROXY_VARS {
        if let Some(value) = lookup(var) {
            tracing::info!("Found proxy variable: {var}={value}");
            args.push("-e".to_string());
            args.push(format!("{var}={value}"));
        }
    }
    args
}

/// Builds and runs packer images
pub struct ContainerEngine<'a, R: CommandRunner> {
    runner: &'a R,
    runtime: ContainerRuntime,
    sudo: bool,
    proxy_args: Vec<String>,
}

impl<'a, R: CommandRunner> ContainerEngine<'a, R> {
    /// Create an engine; `sudo` prefixes every runtime call with `sudo -E`
    pub fn new(runner: &'a R, runtime: ContainerRuntime, sudo: bool) -> Self {
        Self {
            runner,
            runtime,
            sudo,
            proxy_args: proxy_env_args(|var| std::env::var(var).ok()),
        }
    }

    /// Forward these `-e` arguments instead of the host's proxy variables
    #[must_use]
    pub fn with_proxy_args(mut self, args: Vec<String>) -> Self {
        self.proxy_args = args;
        self
    }

    fn command(&self) -> ShellCommand {
        if self.sudo {
            ShellCommand::new("sudo").args(["-E", self.runtime.command()])
        } else {
            ShellCommand::new(self.runtime.command())
        }
    }

    /// `<runtime> build --platform P -t IMAGE CONTEXT`
    pub fn build_command(&self, plan: &ContainerPlan) -> ShellCommand {
        self.command()
            .args(["build", "--platform"])
            .arg(plan.platform())
            .args(["-t", plan.build_image.as_str()])
            .arg(plan.context_dir.display().to_string())
    }

    /// `<runtime> run --rm --platform P [-e proxy..] --mount .. --privileged IMAGE`
    pub fn run_command(&self, plan: &ContainerPlan) -> ShellCommand {
        let mut cmd = self
            .command()
            .args(["run", "--rm", "--platform"])
            .arg(plan.platform())
            .args(self.proxy_args.iter().cloned());
        for (source, target) in plan.container_mounts() {
            cmd = cmd.arg("--mount").arg(format!(
                "type=bind,source={},target={target}",
                source.display()
            ));
        }
        cmd.arg("--privileged").arg(plan.build_image.as_str())
    }

    /// Build the packer image from a prepared context
    pub fn build_image(&self, plan: &ContainerPlan) -> Result<(), ContainerError> {
        tracing::info!(
            "Building image {} for {} on {}",
            plan.build_image,
            plan.system_name,
            plan.platform()
        );
        self.runner
            .run(&self.build_command(plan))
            .map_err(|e| ContainerError::ImageBuildFailed {
                image: plan.build_image.clone(),
                message: e.to_string(),
            })?;
        tracing::info!("Image {} built successfully", plan.build_image);
        Ok(())
    }

    /// Run the build container to completion
    pub fn run_container(&self, plan: &ContainerPlan) -> Result<(), ContainerError> {
        tracing::info!("Running container with image: {}", plan.build_image);
        self.runner
            .run(&self.run_command(plan))
            .map_err(|e| ContainerError::ExecutionFailed {
                message: e.to_string(),
            })
    }

    /// Remove the packer image, best-effort
    pub fn remove_image(&self, image: &str) {
        match self.runner.run(&self.command().args(["rmi", image])) {
            Ok(()) => tracing::info!("Image {image} removed"),
            Err(e) => tracing::warn!("Failed to remove image {image}: {e}"),
        }
    }
}

/// Remove the build context directory, best-effort
pub fn remove_context(context_dir: &Path) {
    match crate::infra::filesystem::remove_dir_all(context_dir) {
        Ok(()) => tracing::info!("Build directory {} removed", context_dir.display()),
        Err(e) => tracing::warn!("{e}"),
    }
}
