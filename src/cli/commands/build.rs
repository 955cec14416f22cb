//! Build command implementation
//!
//! Implements `cxx-packer local` and `cxx-packer system`: resolve, clean,
//! prepare the host, then drive every package through checkout, configure,
//! compile and install. The report is written whether or not the build
//! succeeds.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};

use super::{load_registry, BuildArgs, GlobalOptions};
use crate::cli::output::{self, status, BuildBar};
use crate::config::{defaults, systems};
use crate::core::build_env::{BuildContext, InheritedFlags};
use crate::core::builder::{BuildDriver, BuildOutcome, BuildProgress, NoProgress};
use crate::core::clean::{self, CleanOptions};
use crate::core::registry::Registry;
use crate::core::resolver::resolve;
use crate::core::{cmake_config, system_packages, toolchain};
use crate::error::ConfigError;
use crate::infra::filesystem;
use crate::infra::process::{CommandRunner, RecordingRunner, SystemRunner};
use crate::infra::sandbox::is_root;

/// Where packages are installed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstallMode {
    /// `./output`, no privilege elevation
    Local,
    /// `/usr/local`, sudo when not root
    System,
}

impl InstallMode {
    /// Install prefix for this mode
    pub fn install_prefix(self, project_dir: &Path) -> PathBuf {
        match self {
            Self::Local => project_dir.join(defaults::OUTPUT_DIR),
            Self::System => PathBuf::from(defaults::SYSTEM_INSTALL_PREFIX),
        }
    }
}

/// Execute the build command
pub async fn execute(
    project_dir: &Path,
    mode: InstallMode,
    args: BuildArgs,
    globals: GlobalOptions,
) -> Result<()> {
    let project_dir = project_dir.to_path_buf();
    tokio::task::spawn_blocking(move || run_build(&project_dir, mode, &args, &globals))
        .await
        .context("Build task failed")?
}

/// Validate the system name; absent or empty is a configuration error
pub fn require_system_name(system_name: Option<&str>) -> Result<String, ConfigError> {
    match system_name.map(str::trim) {
        Some(name) if !name.is_empty() => Ok(name.to_string()),
        _ => Err(ConfigError::MissingSystemName {
            available: systems::known_systems(),
        }),
    }
}

/// Initial build context for a run
pub fn build_context(
    project_dir: &Path,
    mode: InstallMode,
    system_name: &str,
    jobs: Option<usize>,
) -> BuildContext {
    let compilers = toolchain::select_compilers(system_name).or_env();
    let mut ctx = BuildContext::new(mode.install_prefix(project_dir), system_name)
        .with_build_root(project_dir.join(defaults::BUILD_DIR))
        .with_logs_dir(project_dir.join(defaults::OUTPUT_LOGS_DIR))
        .with_sudo(mode == InstallMode::System && !is_root())
        .with_compilers(compilers.cc, compilers.cxx, compilers.path_prefix)
        .with_inherited(InheritedFlags::from_env());
    if let Some(jobs) = jobs {
        ctx = ctx.with_jobs(jobs.max(1));
    }
    ctx
}

/// Run a whole build; configuration errors surface before any side effect
fn run_build(
    project_dir: &Path,
    mode: InstallMode,
    args: &BuildArgs,
    globals: &GlobalOptions,
) -> Result<()> {
    let system_name = require_system_name(args.system_name.as_deref())?;
    let registry = load_registry(project_dir, globals.registry.as_deref())?;
    let resolved = resolve(&registry).context("Failed to resolve the build order")?;

    let ctx = build_context(project_dir, mode, &system_name, args.jobs);
    tracing::info!("Using install prefix: {}", ctx.install_prefix.display());
    tracing::info!("Using sudo: {}", ctx.use_sudo);
    tracing::info!("Using {} parallel jobs", ctx.jobs);

    let outcome = if args.dry_run {
        let runner = RecordingRunner::new();
        let outcome = run_pipeline(&runner, &registry, &resolved.order, ctx, args, globals)?;
        for line in runner.lines() {
            println!("{line}");
        }
        outcome
    } else {
        if let Err(e) = clean::clean_previous_run(
            &ctx,
            CleanOptions {
                keep_sources: args.keep_sources,
            },
        ) {
            tracing::warn!("Cleanup incomplete: {e}");
        }
        run_pipeline(&SystemRunner, &registry, &resolved.order, ctx, args, globals)?
    };

    let log_file = filesystem::absolutize(project_dir, &globals.log_file);
    let written = outcome
        .report
        .write(&outcome.context.logs_dir, Some(&log_file))
        .context("Failed to write the build report")?;
    for path in &written {
        tracing::info!("Wrote {}", path.display());
    }

    print_summary(&outcome);

    let failure = outcome
        .report
        .iter()
        .find(|(_, result)| !result.success)
        .map(|(name, result)| (name.to_string(), result.message.clone()));
    match failure {
        Some((name, message)) => bail!("Build failed for package '{name}': {message}"),
        None => {
            println!(
                "{} All {} packages built into {}",
                status::SUCCESS,
                outcome.report.len(),
                outcome.context.install_prefix.display()
            );
            Ok(())
        }
    }
}

/// Host preparation, then the driver
fn run_pipeline<R: CommandRunner>(
    runner: &R,
    registry: &Registry,
    order: &[String],
    ctx: BuildContext,
    args: &BuildArgs,
    globals: &GlobalOptions,
) -> Result<BuildOutcome> {
    if args.skip_system_packages {
        tracing::info!("Skipping system package installation");
    } else {
        if let Err(e) = system_packages::prepare_system(runner, &ctx.system_name, ctx.use_sudo) {
            tracing::warn!("System setup incomplete: {e}");
        }
        match system_packages::install_system_packages(runner, &ctx.system_name, ctx.use_sudo) {
            Ok(outcome) if !outcome.failed.is_empty() => {
                tracing::warn!("System packages not installed: {:?}", outcome.failed);
            }
            Ok(_) => {}
            Err(e) => tracing::warn!("System package installation failed: {e}"),
        }
    }

    filesystem::create_dir_all(&ctx.build_root)?;
    filesystem::create_dir_all(&ctx.logs_dir)?;
    cmake_config::clean_generated_configs(&ctx.install_prefix);

    let bar = globals
        .show_progress
        .then(|| BuildBar::new(output::create_build_bar(order.len() as u64)));
    let progress: &dyn BuildProgress = match bar {
        Some(ref bar) => bar,
        None => &NoProgress,
    };

    let outcome = BuildDriver::new(runner, registry, ctx)
        .with_progress(progress)
        .run(order);

    if let Some(bar) = bar {
        bar.finish(outcome.success());
    }
    Ok(outcome)
}

fn print_summary(outcome: &BuildOutcome) {
    println!();
    for (name, result) in outcome.report.iter() {
        let glyph = if result.success {
            status::SUCCESS
        } else {
            status::ERROR
        };
        println!("{glyph} {name}: {}", result.message);
    }
    println!(
        "\nSummary: {} successful, {} failed",
        outcome.report.successful(),
        outcome.report.failed()
    );
    if let Some(ref post) = outcome.post_pass {
        if let Some(ref libraries) = post.libraries {
            println!("{} {} runtime libraries collected", status::INFO, libraries.copied.len());
        }
        println!("{} {} CMake config files generated", status::INFO, post.cmake_configs.len());
    }
    println!(
        "{} Reports in {}",
        status::INFO,
        outcome.context.logs_dir.display()
    );
}
