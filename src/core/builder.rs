//! Build orchestration logic
//!
//! Walks the resolved order one package at a time: checkout, parameter
//! computation, strategy detection and execution. The first failure stops
//! the run. When every package succeeds, runtime libraries are collected
//! and the generated CMake configs are written.

use std::path::PathBuf;

use crate::core::artifacts::{CollectionSummary, LibraryCollector};
use crate::core::build_env::BuildContext;
use crate::core::cmake_config;
use crate::core::flags::{compute_build_parameters, BuiltPackageSet};
use crate::core::registry::{PackageSpec, Registry};
use crate::core::report::{BuildReport, BuildResult};
use crate::core::strategy::{self, BuildStrategy};
use crate::error::BuildError;
use crate::infra::git::GitOperations;
use crate::infra::process::{CommandRunner, ShellCommand};

/// Lifecycle of a package within a run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PackageState {
    /// Not reached yet
    Pending,
    /// Currently building
    Building,
    /// Built and installed
    Built,
    /// Checkout or build failed
    Failed,
}

impl std::fmt::Display for PackageState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Building => write!(f, "building"),
            Self::Built => write!(f, "built"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

/// Receives driver progress events
pub trait BuildProgress {
    /// A package moved to [`PackageState::Building`]
    fn started(&self, _package: &str, _position: usize, _total: usize) {}

    /// A package reached a terminal state
    fn finished(&self, _package: &str, _result: &BuildResult) {}
}

/// Progress sink that ignores every event
#[derive(Debug, Default, Clone, Copy)]
pub struct NoProgress;

impl BuildProgress for NoProgress {}

/// What the post-build pass produced
#[derive(Debug, Clone, Default)]
pub struct PostPassSummary {
    /// Library collection result, `None` when the pass failed
    pub libraries: Option<CollectionSummary>,
    /// Generated CMake config files
    pub cmake_configs: Vec<PathBuf>,
}

/// Result of a driver run
#[derive(Debug)]
pub struct BuildOutcome {
    /// Per-package results, in build order, up to the first failure
    pub report: BuildReport,
    /// Final state of every package in the order
    pub states: Vec<(String, PackageState)>,
    /// Context after the last successful package
    pub context: BuildContext,
    /// Post-pass output, present only when every package was built
    pub post_pass: Option<PostPassSummary>,
}

impl BuildOutcome {
    /// Whether every package was built
    pub fn success(&self) -> bool {
        self.states.iter().all(|(_, s)| *s == PackageState::Built)
    }

    /// State of a package
    pub fn state(&self, package: &str) -> Option<PackageState> {
        self.states
            .iter()
            .find(|(name, _)| name == package)
            .map(|(_, s)| *s)
    }
}

/// Sequential, fail-fast build driver
pub struct BuildDriver<'a, R: CommandRunner> {
    runner: &'a R,
    registry: &'a Registry,
    context: BuildContext,
    collector: LibraryCollector,
    progress: &'a dyn BuildProgress,
}

impl<'a, R: CommandRunner> BuildDriver<'a, R> {
    /// Create a driver starting from `context`
    pub fn new(runner: &'a R, registry: &'a Registry, context: BuildContext) -> Self {
        Self {
            runner,
            registry,
            context,
            collector: LibraryCollector::new(),
            progress: &NoProgress,
        }
    }

    /// Use a custom library collector for the post-pass
    #[must_use]
    pub fn with_collector(mut self, collector: LibraryCollector) -> Self {
        self.collector = collector;
        self
    }

    /// Report progress to `progress`
    #[must_use]
    pub fn with_progress(mut self, progress: &'a dyn BuildProgress) -> Self {
        self.progress = progress;
        self
    }

    /// Build every package of `order`, stopping at the first failure
    pub fn run(mut self, order: &[String]) -> BuildOutcome {
        tracing::info!("Starting to build all packages...");
        tracing::info!("Build order: {order:?}");

        let mut states: Vec<(String, PackageState)> = order
            .iter()
            .map(|name| (name.clone(), PackageState::Pending))
            .collect();
        let mut built = BuiltPackageSet::new();
        let mut report = BuildReport::new();

        for (index, name) in order.iter().enumerate() {
            states[index].1 = PackageState::Building;
            self.progress.started(name, index, order.len());

            let (result, next) = match self.registry.get(name) {
                Some(spec) => self.build_package(spec, &built),
                None => (
                    BuildResult::failure("", format!("Package '{name}' is not in the registry")),
                    None,
                ),
            };

            self.progress.finished(name, &result);
            report.record(name, result.clone());

            match next {
                Some(context) => {
                    self.context = context;
                    built.insert(name.clone());
                    states[index].1 = PackageState::Built;
                }
                None => {
                    states[index].1 = PackageState::Failed;
                    tracing::error!("BUILD FAILED: {name}");
                    tracing::error!("Error message: {}", result.message);
                    tracing::error!("Build process terminated due to failure");
                    return BuildOutcome {
                        report,
                        states,
                        context: self.context,
                        post_pass: None,
                    };
                }
            }
        }

        let post_pass = self.post_pass();
        BuildOutcome {
            report,
            states,
            context: self.context,
            post_pass: Some(post_pass),
        }
    }

    /// Build one package; the context is returned only on success
    fn build_package(
        &self,
        spec: &PackageSpec,
        built: &BuiltPackageSet,
    ) -> (BuildResult, Option<BuildContext>) {
        let ctx = &self.context;
        let source_dir = ctx.source_dir(&spec.name);
        tracing::info!("Building package: {}", spec.name);
        tracing::debug!("Configuration: {spec:?}");

        let git = GitOperations::new(self.runner);
        let checkout = match git.checkout(&spec.name, &spec.url, &spec.branch, &source_dir) {
            Ok(checkout) => checkout,
            Err(source) => {
                let err = BuildError::Checkout {
                    package: spec.name.clone(),
                    source,
                };
                tracing::error!("{err}");
                return (
                    BuildResult::failure(&spec.url, "Failed to clone repository"),
                    None,
                );
            }
        };

        self.refresh_linker_cache();

        let params = compute_build_parameters(spec, self.registry, built, ctx);
        let strategy = strategy::detect(spec, &source_dir);
        tracing::info!("Using {strategy} build for {}", spec.name);

        let custom = matches!(strategy, BuildStrategy::Custom(_));
        let (result, next) = match strategy.execute(self.runner, spec, &params, ctx) {
            Ok(next) if custom => (
                BuildResult::success(&spec.url, "Built successfully (custom command)"),
                Some(next),
            ),
            Ok(next) => (BuildResult::success(&spec.url, "Built successfully"), Some(next)),
            Err(e) if custom => (
                BuildResult::failure(&spec.url, format!("Build failed (custom command): {e}")),
                None,
            ),
            Err(e) => (
                BuildResult::failure(&spec.url, format!("Build failed: {e}")),
                None,
            ),
        };

        (result.with_commit(checkout.commit), next)
    }

    /// `ldconfig`, best-effort
    fn refresh_linker_cache(&self) {
        let cmd = ShellCommand::new("ldconfig").with_sudo(self.context.use_sudo);
        if let Err(e) = self.runner.run(&cmd) {
            tracing::warn!("Failed to update ldconfig cache: {e}");
        }
    }

    /// Library collection and CMake config generation, both best-effort
    fn post_pass(&self) -> PostPassSummary {
        let prefix = &self.context.install_prefix;
        let mut summary = PostPassSummary::default();

        match self.collector.collect(prefix) {
            Ok(collected) => {
                if !collected.copied.is_empty() {
                    self.refresh_linker_cache();
                }
                summary.libraries = Some(collected);
            }
            Err(e) => tracing::error!("Failed to copy dynamic libraries: {e}"),
        }

        match cmake_config::generate_cmake_configs(prefix) {
            Ok(files) => summary.cmake_configs = files,
            Err(e) => tracing::error!("Failed to generate CMake config files: {e}"),
        }

        self.refresh_linker_cache();
        summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::resolver::resolve;
    use crate::infra::process::RecordingRunner;
    use std::cell::RefCell;
    use tempfile::TempDir;

    struct Fixture {
        temp: TempDir,
        registry: Registry,
    }

    impl Fixture {
        fn new(specs: Vec<PackageSpec>) -> Self {
            Self {
                temp: TempDir::new().unwrap(),
                registry: Registry::new(specs).unwrap(),
            }
        }

        fn context(&self) -> BuildContext {
            BuildContext::new(self.temp.path().join("output"), "ubuntu22.04")
                .with_build_root(self.temp.path().join("build"))
                .with_logs_dir(self.temp.path().join("output_logs"))
                .with_jobs(2)
        }

        fn collector(&self) -> LibraryCollector {
            LibraryCollector::new().with_search_dirs(vec![self.temp.path().join("syslib")])
        }

        fn order(&self) -> Vec<String> {
            resolve(&self.registry).unwrap().order
        }

        fn run(&self, runner: &RecordingRunner) -> BuildOutcome {
            BuildDriver::new(runner, &self.registry, self.context())
                .with_collector(self.collector())
                .run(&self.order())
        }
    }

    fn spec(name: &str, deps: &[&str]) -> PackageSpec {
        PackageSpec::new(&format!("https://example.com/{name}"))
            .unwrap()
            .with_dependencies(deps)
    }

    #[derive(Default)]
    struct Events(RefCell<Vec<String>>);

    impl BuildProgress for Events {
        fn started(&self, package: &str, position: usize, total: usize) {
            self.0.borrow_mut().push(format!("start {package} {position}/{total}"));
        }

        fn finished(&self, package: &str, result: &BuildResult) {
            self.0.borrow_mut().push(format!("done {package} {}", result.success));
        }
    }

    // ============================================
    // Full success
    // ============================================

    #[test]
    fn test_all_packages_built_in_order() {
        let fx = Fixture::new(vec![spec("A", &[]), spec("B", &["A"]), spec("C", &["B"])]);
        let runner = RecordingRunner::new();

        let outcome = fx.run(&runner);

        assert!(outcome.success());
        assert_eq!(outcome.report.packages(), vec!["A", "B", "C"]);
        assert_eq!(outcome.report.successful(), 3);
        assert_eq!(
            outcome.report.get("A").unwrap().message,
            "Built successfully"
        );

        let clones: Vec<String> = runner
            .lines()
            .into_iter()
            .filter(|l| l.starts_with("git clone"))
            .collect();
        assert_eq!(clones.len(), 3);
        assert!(clones[0].contains("/build/A"));
        assert!(clones[2].contains("/build/C"));
    }

    #[test]
    fn test_post_pass_runs_after_success() {
        let fx = Fixture::new(vec![spec("A", &[])]);
        let runner = RecordingRunner::new();

        let outcome = fx.run(&runner);

        let post = outcome.post_pass.unwrap();
        assert!(post.libraries.is_some());
        assert_eq!(post.cmake_configs.len(), 9);
        assert!(fx
            .temp
            .path()
            .join("output/lib/cmake/Protobuf/Protobuf-config.cmake")
            .exists());
        assert_eq!(runner.lines().last().unwrap(), "ldconfig");
    }

    #[test]
    fn test_dependent_receives_discovery_variables() {
        let fx = Fixture::new(vec![
            spec("protobuf", &[]).with_cmake_name("Protobuf"),
            spec("grpc", &["protobuf", "zlib"]),
        ]);
        let runner = RecordingRunner::new();

        fx.run(&runner);

        let configures: Vec<_> = runner
            .commands()
            .into_iter()
            .filter(|c| c.program == "cmake")
            .collect();
        assert_eq!(configures.len(), 2);
        assert!(!configures[0].args.iter().any(|a| a.starts_with("-DProtobuf_DIR")));
        assert!(configures[1]
            .args
            .iter()
            .any(|a| a.starts_with("-DProtobuf_DIR=")));
        assert!(!configures[1].args.iter().any(|a| a.contains("zlib_")));
    }

    #[test]
    fn test_custom_command_message() {
        let fx = Fixture::new(vec![spec("boost", &[]).with_custom_command("./b2 -j{cpu_count}")]);
        let runner = RecordingRunner::new();

        let outcome = fx.run(&runner);

        assert_eq!(
            outcome.report.get("boost").unwrap().message,
            "Built successfully (custom command)"
        );
        assert!(runner.lines().iter().any(|l| l == "sh -c './b2 -j2'"));
    }

    // ============================================
    // Fail-fast
    // ============================================

    #[test]
    fn test_stops_at_first_failure() {
        let fx = Fixture::new(vec![
            spec("A", &[]),
            spec("X", &[]).with_define("X_BROKEN", "ON"),
            spec("independent", &[]),
        ]);
        let runner = RecordingRunner::new().fail_on("-DX_BROKEN=ON");

        let outcome = fx.run(&runner);

        assert!(!outcome.success());
        assert_eq!(outcome.report.packages(), vec!["A", "X"]);
        let message = &outcome.report.get("X").unwrap().message;
        assert!(message.starts_with("Build failed: configure failed for package 'X'"));
        assert!(message.contains("exit code Some(1)"));
        assert!(outcome.report.get("independent").is_none());
        assert_eq!(outcome.state("X"), Some(PackageState::Failed));
        assert_eq!(outcome.state("independent"), Some(PackageState::Pending));
        assert!(outcome.post_pass.is_none());
        assert!(!runner.lines().iter().any(|l| l.contains("independent")));
    }

    #[test]
    fn test_clone_failure_message() {
        let fx = Fixture::new(vec![spec("A", &[]), spec("B", &["A"])]);
        let runner = RecordingRunner::new().fail_on("example.com/A");

        let outcome = fx.run(&runner);

        let a = outcome.report.get("A").unwrap();
        assert!(!a.success);
        assert_eq!(a.message, "Failed to clone repository");
        assert_eq!(a.url, "https://example.com/A");
        assert_eq!(outcome.report.len(), 1);
    }

    #[test]
    fn test_custom_command_failure_message() {
        let fx = Fixture::new(vec![spec("boost", &[]).with_custom_command("./b2")]);
        let runner = RecordingRunner::new().fail_on("./b2");

        let outcome = fx.run(&runner);

        let message = &outcome.report.get("boost").unwrap().message;
        assert!(message.starts_with("Build failed (custom command): "));
    }

    #[test]
    fn test_ldconfig_failure_is_not_fatal() {
        let fx = Fixture::new(vec![spec("A", &[])]);
        let runner = RecordingRunner::new().fail_on("ldconfig");
        assert!(fx.run(&runner).success());
    }

    #[test]
    fn test_progress_events() {
        let fx = Fixture::new(vec![spec("A", &[]), spec("B", &[]).with_define("B_BROKEN", "ON")]);
        let runner = RecordingRunner::new().fail_on("-DB_BROKEN=ON");
        let events = Events::default();

        BuildDriver::new(&runner, &fx.registry, fx.context())
            .with_collector(fx.collector())
            .with_progress(&events)
            .run(&fx.order());

        assert_eq!(
            *events.0.borrow(),
            vec!["start A 0/2", "done A true", "start B 1/2", "done B false"]
        );
    }

    #[test]
    fn test_context_carries_pkg_config_dirs_forward() {
        let fx = Fixture::new(vec![spec("A", &[]), spec("B", &["A"])]);
        std::fs::create_dir_all(fx.temp.path().join("output/lib/pkgconfig")).unwrap();
        let runner = RecordingRunner::new();

        let outcome = fx.run(&runner);

        assert_eq!(
            outcome.context.pkg_config_path,
            vec![fx.temp.path().join("output/lib/pkgconfig")]
        );
    }
}
