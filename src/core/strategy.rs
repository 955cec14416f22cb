//! Build-system adapters
//!
//! A checked-out package is driven through one of three strategies:
//! its own custom command, CMake, or autotools. [`detect`] picks the
//! strategy from the package spec and the source tree; [`BuildStrategy::execute`]
//! runs it and hands back the context later packages should build with.

use std::path::Path;

use crate::core::build_env::BuildContext;
use crate::core::diagnostics;
use crate::core::flags::BuildParameters;
use crate::core::registry::PackageSpec;
use crate::error::{BuildError, ProcessError};
use crate::infra::filesystem;
use crate::infra::process::{CommandRunner, ShellCommand};

/// Files marking an autotools project
pub const AUTOTOOLS_MARKERS: &[&str] = &[
    "configure",
    "autogen.sh",
    "bootstrap",
    "configure.ac",
    "configure.in",
];

/// How configure scripts are produced before `./configure`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Bootstrap {
    /// Run a script shipped with the sources (`./autogen.sh`, `./bootstrap`)
    Script(String),
    /// Regenerate with `autoreconf -fiv`
    Autoreconf,
}

/// Build strategy of a package
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BuildStrategy {
    /// Package-declared shell command template
    Custom(String),
    /// CMake out-of-source build in `<source>/build`
    CMake,
    /// In-tree autotools build
    Autotools {
        /// Step run before `./configure`, if any
        bootstrap: Option<Bootstrap>,
    },
}

impl std::fmt::Display for BuildStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Custom(_) => write!(f, "custom command"),
            Self::CMake => write!(f, "cmake"),
            Self::Autotools { .. } => write!(f, "autotools"),
        }
    }
}

/// Pick the strategy for a checked-out package
///
/// A declared custom command wins outright. Otherwise `CMakeLists.txt`
/// selects CMake, any autotools marker selects autotools, and anything else
/// falls back to CMake.
pub fn detect(spec: &PackageSpec, source_dir: &Path) -> BuildStrategy {
    if let Some(ref template) = spec.custom_command {
        return BuildStrategy::Custom(template.clone());
    }

    if source_dir.join("CMakeLists.txt").exists() {
        return BuildStrategy::CMake;
    }

    if AUTOTOOLS_MARKERS.iter().any(|m| source_dir.join(m).exists()) {
        let bootstrap = if source_dir.join("autogen.sh").exists() {
            Some(Bootstrap::Script("./autogen.sh".to_string()))
        } else if source_dir.join("bootstrap").exists() {
            Some(Bootstrap::Script("./bootstrap".to_string()))
        } else if !source_dir.join("configure").exists()
            && (source_dir.join("configure.ac").exists() || source_dir.join("configure.in").exists())
        {
            Some(Bootstrap::Autoreconf)
        } else {
            None
        };
        return BuildStrategy::Autotools { bootstrap };
    }

    tracing::warn!("Unknown build system for {}, trying CMake...", spec.name);
    BuildStrategy::CMake
}

/// Substitute `{install_prefix}` and `{cpu_count}` in a custom command template
pub fn render_custom_command(template: &str, install_prefix: &Path, jobs: usize) -> String {
    template
        .replace("{install_prefix}", &install_prefix.display().to_string())
        .replace("{cpu_count}", &jobs.to_string())
}

impl BuildStrategy {
    /// Build and install the package
    ///
    /// `ctx` is the context the package builds with; on success the returned
    /// context additionally carries the pkg-config directories the package
    /// exposed under the prefix. CMake and autotools failures capture
    /// diagnostics before the error is returned.
    pub fn execute<R: CommandRunner>(
        &self,
        runner: &R,
        spec: &PackageSpec,
        params: &BuildParameters,
        ctx: &BuildContext,
    ) -> Result<BuildContext, BuildError> {
        let source_dir = ctx.source_dir(&spec.name);
        let build_ctx = ctx.with_pkg_config_dirs(&params.pkg_config_dirs);
        let env = build_ctx.process_env();

        let result = match self {
            Self::Custom(template) => {
                let script = render_custom_command(template, &ctx.install_prefix, ctx.jobs);
                let cmd = ShellCommand::shell(script)
                    .current_dir(&source_dir)
                    .envs(env);
                return runner
                    .run(&cmd)
                    .map(|()| build_ctx)
                    .map_err(|e| step_failed(spec, "custom command", &e));
            }
            Self::CMake => build_cmake(runner, spec, params, &build_ctx, &source_dir, &env),
            Self::Autotools { bootstrap } => build_autotools(
                runner,
                spec,
                params,
                &build_ctx,
                &source_dir,
                &env,
                bootstrap.as_ref(),
            ),
        };

        match result {
            Ok(()) => {
                tracing::info!("Successfully built and installed {}", spec.name);
                Ok(build_ctx)
            }
            Err(e) => {
                tracing::error!("Failed to build {}: {e}", spec.name);
                if let Err(capture) = diagnostics::capture_build_logs(&spec.name, &source_dir, ctx)
                {
                    tracing::warn!("{capture}");
                }
                Err(e)
            }
        }
    }
}

fn step_failed(spec: &PackageSpec, step: &str, error: &ProcessError) -> BuildError {
    BuildError::StepFailed {
        package: spec.name.clone(),
        step: step.to_string(),
        error: error.to_string(),
    }
}

fn build_cmake<R: CommandRunner>(
    runner: &R,
    spec: &PackageSpec,
    params: &BuildParameters,
    ctx: &BuildContext,
    source_dir: &Path,
    env: &[(String, String)],
) -> Result<(), BuildError> {
    let build_dir = source_dir.join("build");
    filesystem::create_dir_all(&build_dir).map_err(|source| BuildError::Prepare {
        package: spec.name.clone(),
        source,
    })?;

    let step = |name: &str, cmd: ShellCommand| {
        runner
            .run(&cmd.current_dir(&build_dir).envs(env.iter().cloned()))
            .map_err(|e| step_failed(spec, name, &e))
    };

    step(
        "configure",
        ShellCommand::new("cmake").arg("..").args(params.cmake_args()),
    )?;
    step(
        "compile",
        ShellCommand::new("make").arg(format!("-j{}", ctx.jobs)),
    )?;
    step(
        "install",
        ShellCommand::new("make")
            .arg("install")
            .with_sudo(ctx.needs_sudo_for_install()),
    )
}

fn build_autotools<R: CommandRunner>(
    runner: &R,
    spec: &PackageSpec,
    params: &BuildParameters,
    ctx: &BuildContext,
    source_dir: &Path,
    env: &[(String, String)],
    bootstrap: Option<&Bootstrap>,
) -> Result<(), BuildError> {
    let step = |name: &str, cmd: ShellCommand| {
        runner
            .run(&cmd.current_dir(source_dir).envs(env.iter().cloned()))
            .map_err(|e| step_failed(spec, name, &e))
    };

    match bootstrap {
        Some(Bootstrap::Script(script)) => step("bootstrap", ShellCommand::new(script.as_str()))?,
        Some(Bootstrap::Autoreconf) => {
            step("bootstrap", ShellCommand::new("autoreconf").arg("-fiv"))?;
        }
        None => {}
    }

    step(
        "configure",
        ShellCommand::new("./configure").args(params.configure_args()),
    )?;
    step(
        "compile",
        ShellCommand::new("make").arg(format!("-j{}", ctx.jobs)),
    )?;
    step(
        "install",
        ShellCommand::new("make")
            .arg("install")
            .with_sudo(ctx.needs_sudo_for_install()),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::flags::{compute_build_parameters, BuiltPackageSet};
    use crate::core::registry::Registry;
    use crate::infra::process::RecordingRunner;
    use std::path::PathBuf;
    use tempfile::TempDir;

    struct Fixture {
        temp: TempDir,
        ctx: BuildContext,
    }

    impl Fixture {
        fn new() -> Self {
            let temp = TempDir::new().unwrap();
            let ctx = BuildContext::new(temp.path().join("out"), "ubuntu22.04")
                .with_build_root(temp.path().join("build"))
                .with_logs_dir(temp.path().join("logs"))
                .with_jobs(4);
            Self { temp, ctx }
        }

        fn source(&self, name: &str, files: &[&str]) -> PathBuf {
            let dir = self.ctx.source_dir(name);
            std::fs::create_dir_all(&dir).unwrap();
            for file in files {
                std::fs::write(dir.join(file), "").unwrap();
            }
            dir
        }
    }

    fn spec(name: &str) -> PackageSpec {
        PackageSpec::new(&format!("https://example.com/{name}")).unwrap()
    }

    fn params(spec: &PackageSpec, ctx: &BuildContext) -> BuildParameters {
        let registry = Registry::new(vec![spec.clone()]).unwrap();
        compute_build_parameters(spec, &registry, &BuiltPackageSet::new(), ctx)
    }

    // ============================================
    // Detection
    // ============================================

    #[test]
    fn test_custom_command_wins_over_cmake() {
        let fx = Fixture::new();
        let dir = fx.source("boost", &["CMakeLists.txt"]);
        let spec = spec("boost").with_custom_command("./b2 install");
        assert_eq!(
            detect(&spec, &dir),
            BuildStrategy::Custom("./b2 install".to_string())
        );
    }

    #[test]
    fn test_cmake_detected_before_autotools() {
        let fx = Fixture::new();
        let dir = fx.source("x", &["CMakeLists.txt", "configure"]);
        assert_eq!(detect(&spec("x"), &dir), BuildStrategy::CMake);
    }

    #[test]
    fn test_autotools_bootstrap_selection() {
        let fx = Fixture::new();

        let dir = fx.source("a", &["autogen.sh", "configure.ac"]);
        assert_eq!(
            detect(&spec("a"), &dir),
            BuildStrategy::Autotools {
                bootstrap: Some(Bootstrap::Script("./autogen.sh".to_string()))
            }
        );

        let dir = fx.source("b", &["configure.in"]);
        assert_eq!(
            detect(&spec("b"), &dir),
            BuildStrategy::Autotools {
                bootstrap: Some(Bootstrap::Autoreconf)
            }
        );

        let dir = fx.source("c", &["configure", "configure.ac"]);
        assert_eq!(
            detect(&spec("c"), &dir),
            BuildStrategy::Autotools { bootstrap: None }
        );

        let dir = fx.source("d", &["bootstrap"]);
        assert_eq!(
            detect(&spec("d"), &dir),
            BuildStrategy::Autotools {
                bootstrap: Some(Bootstrap::Script("./bootstrap".to_string()))
            }
        );
    }

    #[test]
    fn test_unknown_layout_falls_back_to_cmake() {
        let fx = Fixture::new();
        let dir = fx.source("plain", &["Makefile"]);
        assert_eq!(detect(&spec("plain"), &dir), BuildStrategy::CMake);
    }

    // ============================================
    // Execution
    // ============================================

    #[test]
    fn test_render_custom_command() {
        let rendered = render_custom_command(
            "./b2 install --prefix={install_prefix} -j{cpu_count}",
            Path::new("/out"),
            4,
        );
        assert_eq!(rendered, "./b2 install --prefix=/out -j4");
    }

    #[test]
    fn test_custom_command_runs_in_source_root() {
        let fx = Fixture::new();
        let dir = fx.source("boost_full", &[]);
        let spec = spec("boost_full").with_custom_command("./b2 --prefix={install_prefix}");
        let runner = RecordingRunner::new();

        let strategy = detect(&spec, &dir);
        strategy
            .execute(&runner, &spec, &params(&spec, &fx.ctx), &fx.ctx)
            .unwrap();

        let commands = runner.commands();
        assert_eq!(commands.len(), 1);
        assert_eq!(commands[0].program, "sh");
        assert_eq!(
            commands[0].args[1],
            format!("./b2 --prefix={}", fx.ctx.install_prefix.display())
        );
        assert_eq!(commands[0].cwd.as_deref(), Some(dir.as_path()));
    }

    #[test]
    fn test_cmake_steps_in_build_dir() {
        let fx = Fixture::new();
        let dir = fx.source("gflags", &["CMakeLists.txt"]);
        let spec = spec("gflags");
        let runner = RecordingRunner::new();

        BuildStrategy::CMake
            .execute(&runner, &spec, &params(&spec, &fx.ctx), &fx.ctx)
            .unwrap();

        let commands = runner.commands();
        assert_eq!(commands.len(), 3);
        assert_eq!(commands[0].program, "cmake");
        assert_eq!(commands[0].args[0], "..");
        assert!(commands[0].args.contains(&"-DBUILD_TESTING=OFF".to_string()));
        assert_eq!(runner.lines()[1], "make -j4");
        assert_eq!(runner.lines()[2], "make install");
        assert!(commands.iter().all(|c| c.cwd.as_deref() == Some(dir.join("build").as_path())));
        assert!(dir.join("build").is_dir());
    }

    #[test]
    fn test_install_uses_sudo_for_protected_prefix() {
        let fx = Fixture::new();
        fx.source("gflags", &["CMakeLists.txt"]);
        let ctx = BuildContext {
            install_prefix: PathBuf::from("/usr/local"),
            ..fx.ctx.clone()
        }
        .with_sudo(true);
        let spec = spec("gflags");
        let runner = RecordingRunner::new();

        BuildStrategy::CMake
            .execute(&runner, &spec, &params(&spec, &ctx), &ctx)
            .unwrap();

        assert_eq!(runner.lines()[2], "sudo make install");
        assert!(!runner.commands()[1].sudo);
    }

    #[test]
    fn test_autotools_steps_in_source_dir() {
        let fx = Fixture::new();
        let dir = fx.source("rdma", &["autogen.sh"]);
        let spec = spec("rdma");
        let runner = RecordingRunner::new();

        detect(&spec, &dir)
            .execute(&runner, &spec, &params(&spec, &fx.ctx), &fx.ctx)
            .unwrap();

        let lines = runner.lines();
        assert_eq!(lines[0], "./autogen.sh");
        assert!(lines[1].starts_with(&format!(
            "./configure --prefix={}",
            fx.ctx.install_prefix.display()
        )));
        assert_eq!(lines[2], "make -j4");
        assert_eq!(lines[3], "make install");
        assert!(runner
            .commands()
            .iter()
            .all(|c| c.cwd.as_deref() == Some(dir.as_path())));
    }

    #[test]
    fn test_failed_configure_captures_diagnostics_and_stops() {
        let fx = Fixture::new();
        let dir = fx.source("glog", &["CMakeLists.txt"]);
        std::fs::create_dir_all(dir.join("build/CMakeFiles")).unwrap();
        std::fs::write(dir.join("build/CMakeFiles/CMakeError.log"), "error").unwrap();

        let spec = spec("glog");
        let runner = RecordingRunner::new().fail_on("cmake ..");
        let err = BuildStrategy::CMake
            .execute(&runner, &spec, &params(&spec, &fx.ctx), &fx.ctx)
            .unwrap_err();

        assert!(matches!(err, BuildError::StepFailed { ref step, .. } if step == "configure"));
        assert_eq!(runner.commands().len(), 1);
        let diag = fx.temp.path().join("logs/glog_build_errors");
        assert!(diag.join("CMakeError.log").exists());
        assert!(diag.join(diagnostics::SUMMARY_FILE).exists());
    }

    #[test]
    fn test_failed_custom_command_has_no_diagnostics() {
        let fx = Fixture::new();
        fx.source("boost_full", &[]);
        let spec = spec("boost_full").with_custom_command("./b2");
        let runner = RecordingRunner::new().fail_on("b2");

        let err = detect(&spec, &fx.ctx.source_dir("boost_full"))
            .execute(&runner, &spec, &params(&spec, &fx.ctx), &fx.ctx)
            .unwrap_err();
        assert!(matches!(err, BuildError::StepFailed { ref step, .. } if step == "custom command"));
        assert!(!fx.temp.path().join("logs/boost_full_build_errors").exists());
    }

    #[test]
    fn test_execute_returns_context_with_pkg_config_dirs() {
        let fx = Fixture::new();
        fx.source("glog", &["CMakeLists.txt"]);
        let pc = fx.ctx.install_prefix.join("lib/pkgconfig");
        std::fs::create_dir_all(&pc).unwrap();

        let gflags = spec("gflags");
        let glog = spec("glog").with_dependencies(&["gflags"]);
        let registry = Registry::new(vec![gflags, glog.clone()]).unwrap();
        let built: BuiltPackageSet = ["gflags".to_string()].into_iter().collect();
        let params = compute_build_parameters(&glog, &registry, &built, &fx.ctx);

        let runner = RecordingRunner::new();
        let next = BuildStrategy::CMake
            .execute(&runner, &glog, &params, &fx.ctx)
            .unwrap();

        assert_eq!(next.pkg_config_path, vec![pc.clone()]);
        assert!(fx.ctx.pkg_config_path.is_empty());
        let env = &runner.commands()[0].env;
        assert!(env
            .iter()
            .any(|(k, v)| k == "PKG_CONFIG_PATH" && v.starts_with(&pc.display().to_string())));
    }
}
