//! CLI command implementations
//!
//! Each command is implemented in its own submodule.

pub mod build;
pub mod container;
pub mod order;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Args, Subcommand};

use crate::config::defaults;
use crate::core::registry::Registry;
use crate::infra::filesystem;

/// Options shared by every command
#[derive(Debug, Clone)]
pub struct GlobalOptions {
    /// Registry file, built-in table when `None`
    pub registry: Option<PathBuf>,
    /// Run log file
    pub log_file: PathBuf,
    /// Draw a progress bar over the build order
    pub show_progress: bool,
}

/// Options of the `local` and `system` builds
#[derive(Args, Debug, Clone, Default)]
pub struct BuildArgs {
    /// Target system (e.g. ubuntu22.04, manylinux_2014)
    #[arg(long, env = defaults::SYSTEM_NAME_ENV)]
    pub system_name: Option<String>,

    /// Do not install the system package list
    #[arg(long)]
    pub skip_system_packages: bool,

    /// Keep existing source checkouts and update them in place
    #[arg(long)]
    pub keep_sources: bool,

    /// Parallel compile jobs (defaults to the core count, at most 4)
    #[arg(short, long)]
    pub jobs: Option<usize>,

    /// Record commands instead of running them; directories and reports are still written
    #[arg(long)]
    pub dry_run: bool,
}

/// Options of the `container` build
#[derive(Args, Debug, Clone)]
pub struct ContainerArgs {
    /// Target system (auto-detected from the host when absent)
    #[arg(long, env = defaults::SYSTEM_NAME_ENV)]
    pub system_name: Option<String>,

    /// Base image (derived from the system and architecture when absent)
    #[arg(long)]
    pub image: Option<String>,

    /// Target architecture: amd64, arm64 or arm (host architecture when absent)
    #[arg(long)]
    pub arch: Option<String>,

    /// Host directory receiving the installed tree
    #[arg(long, default_value = defaults::CONTAINER_MOUNT_DIR)]
    pub mount_dir: PathBuf,

    /// Host directory receiving reports and logs
    #[arg(long, default_value = defaults::CONTAINER_LOGS_DIR)]
    pub logs_dir: PathBuf,

    /// Keep the build image after the run
    #[arg(long)]
    pub keep_image: bool,

    /// Record runtime commands instead of running them
    #[arg(long)]
    pub dry_run: bool,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Build every package into ./output as the current user
    Local(BuildArgs),

    /// Build every package into /usr/local (sudo when not root)
    System(BuildArgs),

    /// Build inside a container, with output and logs mounted from the host
    Container(ContainerArgs),

    /// Print the resolved build order without building anything
    Order,
}

impl Commands {
    /// Execute the command
    pub async fn run(self, globals: GlobalOptions) -> Result<()> {
        let current_dir = std::env::current_dir()?;
        match self {
            Self::Local(args) => {
                build::execute(&current_dir, build::InstallMode::Local, args, globals).await
            }
            Self::System(args) => {
                build::execute(&current_dir, build::InstallMode::System, args, globals).await
            }
            Self::Container(args) => container::execute(&current_dir, args, globals).await,
            Self::Order => order::execute(&current_dir, globals.registry.as_deref()),
        }
    }
}

/// Load the registry file, or the built-in table
pub fn load_registry(project_dir: &Path, path: Option<&Path>) -> Result<Registry> {
    match path {
        Some(path) => {
            let path = filesystem::absolutize(project_dir, path);
            tracing::info!("Loading registry from {}", path.display());
            Registry::load(&path)
                .with_context(|| format!("Failed to load registry {}", path.display()))
        }
        None => Registry::builtin().context("Failed to load the built-in registry"),
    }
}
