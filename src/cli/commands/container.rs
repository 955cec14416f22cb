//! Container command implementation
//!
//! Implements `cxx-packer container`: build an image carrying this binary
//! and the target's system packages, run `local` inside it with the output
//! and logs directories mounted from the host, then summarize.

use std::path::Path;

use anyhow::{Context, Result};

use super::{ContainerArgs, GlobalOptions};
use crate::cli::output::status;
use crate::core::container::{self, ContainerPlan};
use crate::error::ContainerError;
use crate::infra::filesystem;
use crate::infra::process::{CommandRunner, RecordingRunner, SystemRunner};
use crate::infra::sandbox::{self, is_root, ContainerEngine, ContainerRuntime};

/// Execute the container command
pub async fn execute(project_dir: &Path, args: ContainerArgs, globals: GlobalOptions) -> Result<()> {
    let project_dir = project_dir.to_path_buf();
    tokio::task::spawn_blocking(move || run(&project_dir, &args, &globals))
        .await
        .context("Container task failed")?
}

/// Resolve system, architecture and image into a plan
pub fn plan(project_dir: &Path, args: &ContainerArgs, globals: &GlobalOptions) -> Result<ContainerPlan> {
    let system_name = match args.system_name.as_deref().map(str::trim) {
        Some(name) if !name.is_empty() => name.to_string(),
        _ => {
            let detected = container::detect_host_system();
            tracing::info!("Auto-detected system: {detected}");
            detected
        }
    };
    let arch = match args.arch {
        Some(ref arch) => arch.clone(),
        None => {
            let detected = container::detect_architecture();
            tracing::info!("Auto-detected architecture: {detected}");
            detected
        }
    };

    let plan = ContainerPlan::new(&system_name, &arch, args.image.as_deref())?
        .with_dirs(
            filesystem::absolutize(project_dir, &args.mount_dir),
            filesystem::absolutize(project_dir, &args.logs_dir),
        )
        .with_context_dir(project_dir.join(crate::config::defaults::CONTAINER_CONTEXT_DIR))
        .with_registry(
            globals
                .registry
                .as_deref()
                .map(|path| filesystem::absolutize(project_dir, path)),
        );
    tracing::info!("Will use image: {}", plan.base_image);
    Ok(plan)
}

fn run(project_dir: &Path, args: &ContainerArgs, globals: &GlobalOptions) -> Result<()> {
    let plan = plan(project_dir, args, globals)?;

    let runtime = match ContainerRuntime::detect() {
        Some(runtime) => runtime,
        None if args.dry_run => ContainerRuntime::Docker,
        None => return Err(ContainerError::RuntimeNotAvailable.into()),
    };

    println!("Starting containerized build process...");
    println!("System name: {}", plan.system_name);
    println!("Architecture: {}", plan.arch);
    println!("Output directory: {}", plan.mount_dir.display());
    println!("Logs directory: {}", plan.logs_dir.display());

    filesystem::create_dir_all(&plan.mount_dir)?;
    filesystem::create_dir_all(&plan.logs_dir)?;
    let binary = std::env::current_exe().context("Failed to locate the cxx-packer binary")?;
    plan.prepare_context(&binary)
        .context("Failed to prepare the image build context")?;

    let result = if args.dry_run {
        let runner = RecordingRunner::new();
        let result = drive(&runner, runtime, &plan, args.keep_image);
        for line in runner.lines() {
            println!("{line}");
        }
        result
    } else {
        drive(&SystemRunner, runtime, &plan, args.keep_image)
    };

    match result {
        Ok(()) => {
            println!("\n{} Build completed successfully for {}", status::SUCCESS, plan.system_name);
            println!("{} Results are available in: {}", status::INFO, plan.mount_dir.display());
            println!("{} Check {} for detailed results", status::INFO, container::SUMMARY_FILE);
            Ok(())
        }
        Err(e) => {
            println!("\n{} Build failed for {}. Check the logs for details.", status::ERROR, plan.system_name);
            Err(e.into())
        }
    }
}

/// Build, run, summarize and clean up
fn drive<R: CommandRunner>(
    runner: &R,
    runtime: ContainerRuntime,
    plan: &ContainerPlan,
    keep_image: bool,
) -> Result<(), ContainerError> {
    let engine = ContainerEngine::new(runner, runtime, !is_root());

    let result = engine.build_image(plan).and_then(|()| {
        let run = engine.run_container(plan);
        if let Err(e) = plan.write_summary() {
            tracing::warn!("Failed to write build summary: {e}");
        }
        run
    });

    if keep_image {
        tracing::info!("Keeping image {}", plan.build_image);
    } else {
        engine.remove_image(&plan.build_image);
        sandbox::remove_context(&plan.context_dir);
    }
    result
}
