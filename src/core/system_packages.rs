//! Host preparation and system package installation
//!
//! Both steps are best-effort: they return a `Result` and the caller decides
//! whether a failure is worth more than a warning.

use crate::config::systems::{packages_for_system, PackageManager};
use crate::error::ProcessError;
use crate::infra::process::{CommandRunner, ShellCommand};

/// Packages installed per package-manager invocation
pub const INSTALL_BATCH_SIZE: usize = 20;

/// Repository that is routinely broken on manylinux images
const MANYLINUX_DISABLED_REPO: &str = "--disablerepo=centos-sclo-sclo";

/// Result of installing the system package list
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InstallOutcome {
    /// Packages installed (in a batch or individually)
    pub installed: Vec<String>,
    /// Packages that could not be installed
    pub failed: Vec<String>,
}

fn is_manylinux(system_name: &str) -> bool {
    system_name.starts_with("manylinux")
}

fn argv(parts: &[&str]) -> ShellCommand {
    ShellCommand::from_argv(parts)
}

/// Run a command whose failure is only logged
fn tolerated<R: CommandRunner>(runner: &R, cmd: &ShellCommand) {
    if let Err(e) = runner.run(cmd) {
        tracing::warn!("{e}");
    }
}

/// Prepare the host for building: base tools and, on manylinux, devtoolset-10
pub fn prepare_system<R: CommandRunner>(
    runner: &R,
    system_name: &str,
    sudo: bool,
) -> Result<(), ProcessError> {
    tracing::info!("Setting up system environment for: {system_name}");

    if system_name.starts_with("ubuntu") {
        tracing::info!("Setting up Ubuntu environment...");
        tolerated(
            runner,
            &argv(&["ln", "-fs", "/usr/share/zoneinfo/UTC", "/etc/localtime"]).with_sudo(sudo),
        );
        runner.run(&argv(&["apt-get", "update"]).with_sudo(sudo))?;
        runner.run(
            &argv(&["apt-get", "install", "-y"])
                .args([
                    "python3",
                    "python3-pip",
                    "sudo",
                    "wget",
                    "curl",
                    "git",
                    "build-essential",
                    "tzdata",
                ])
                .envs([("DEBIAN_FRONTEND".to_string(), "noninteractive".to_string())])
                .with_sudo(sudo),
        )?;
    } else if is_manylinux(system_name) {
        tracing::info!("Setting up ManyLinux environment...");
        let yum_install = |pkgs: &[&str]| {
            argv(&["yum", "install", "-y", "--skip-broken", MANYLINUX_DISABLED_REPO])
                .args(pkgs.iter().copied())
                .with_sudo(sudo)
        };

        tolerated(runner, &argv(&["yum", "install", "-y", "epel-release"]).with_sudo(sudo));
        tolerated(runner, &argv(&["yum", "install", "-y", "centos-release-scl"]).with_sudo(sudo));
        tolerated(
            runner,
            &argv(&["yum", "update", "-y", "--skip-broken", MANYLINUX_DISABLED_REPO]).with_sudo(sudo),
        );
        tolerated(
            runner,
            &yum_install(&["python3", "python3-pip", "sudo", "wget", "curl", "git"]),
        );
        tolerated(
            runner,
            &argv(&["yum", "groupinstall", "-y", "Development Tools", "--skip-broken"]).with_sudo(sudo),
        );
        tracing::info!("Attempting to install devtoolset-10...");
        tolerated(
            runner,
            &yum_install(&["devtoolset-10-gcc", "devtoolset-10-gcc-c++", "devtoolset-10-binutils"]),
        );
        tolerated(runner, &yum_install(&["cmake3"]));
        tolerated(
            runner,
            &argv(&["ln", "-sf", "/usr/bin/cmake3", "/usr/bin/cmake"]).with_sudo(sudo),
        );
    } else if which::which("apt-get").is_ok() {
        tracing::info!("Setting up generic Linux environment (apt)...");
        runner.run(&argv(&["apt-get", "update"]).with_sudo(sudo))?;
        runner.run(
            &argv(&["apt-get", "install", "-y", "python3", "git", "build-essential"])
                .envs([("DEBIAN_FRONTEND".to_string(), "noninteractive".to_string())])
                .with_sudo(sudo),
        )?;
    } else if which::which("yum").is_ok() {
        tracing::info!("Setting up generic Linux environment (yum)...");
        runner.run(&argv(&["yum", "update", "-y"]).with_sudo(sudo))?;
        runner.run(&argv(&["yum", "install", "-y", "python3", "git"]).with_sudo(sudo))?;
        runner.run(&argv(&["yum", "groupinstall", "-y", "Development Tools"]).with_sudo(sudo))?;
    } else {
        tracing::warn!("Unknown package manager, skipping system setup");
    }

    tracing::info!("System environment setup completed");
    Ok(())
}

fn install_prefix_for(manager: PackageManager, system_name: &str) -> Vec<&'static str> {
    let mut cmd = manager.install_command().to_vec();
    if manager == PackageManager::Yum && is_manylinux(system_name) {
        cmd.extend(["--skip-broken", MANYLINUX_DISABLED_REPO]);
    }
    cmd
}

/// Install the system package list for `system_name`
///
/// Packages go in batches; a failed batch is retried one package at a
/// time. An index update failure aborts except on manylinux, where broken
/// repositories are common.
pub fn install_system_packages<R: CommandRunner>(
    runner: &R,
    system_name: &str,
    sudo: bool,
) -> Result<InstallOutcome, ProcessError> {
    tracing::info!("Installing system packages for {system_name}...");
    let mut outcome = InstallOutcome::default();

    let Some(set) = packages_for_system(system_name) else {
        tracing::warn!("Skipping package installation - no configuration for {system_name}");
        return Ok(outcome);
    };

    let manager = set.manager;
    tracing::info!("Using package manager: {manager}");
    tracing::info!("Installing {} packages...", set.packages.len());

    let mut update = manager.update_command().to_vec();
    if manager == PackageManager::Yum && is_manylinux(system_name) {
        update.extend(["--skip-broken", MANYLINUX_DISABLED_REPO]);
    }
    if let Err(e) = runner.run(&argv(&update).with_sudo(sudo)) {
        tracing::warn!("Package list update failed: {e}");
        if !is_manylinux(system_name) {
            return Err(e);
        }
    }

    let install = install_prefix_for(manager, system_name);
    for (index, batch) in set.packages.chunks(INSTALL_BATCH_SIZE).enumerate() {
        let cmd = argv(&install).args(batch.iter().copied()).with_sudo(sudo);
        if runner.run(&cmd).is_ok() {
            tracing::info!("Successfully installed batch {}: {batch:?}", index + 1);
            outcome.installed.extend(batch.iter().map(|p| (*p).to_string()));
            continue;
        }

        tracing::warn!("Failed to install batch {}: {batch:?}", index + 1);
        for package in batch {
            let single = argv(&install).arg(*package).with_sudo(sudo);
            if runner.run(&single).is_ok() {
                tracing::info!("Successfully installed individual package: {package}");
                outcome.installed.push((*package).to_string());
            } else if is_manylinux(system_name) {
                tracing::info!("Skipping unavailable package {package} in manylinux environment");
                outcome.failed.push((*package).to_string());
            } else {
                tracing::error!("Package {package} installation failed in {system_name}");
                outcome.failed.push((*package).to_string());
            }
        }
    }

    tracing::info!("System packages installation completed");
    Ok(outcome)
}
