//! Flag and path propagation
//!
//! Computes the compiler flags, linker flags and CMake discovery variables a
//! package needs to find dependencies already installed under the shared
//! prefix. Computation is pure apart from probing which prefix
//! subdirectories exist, so repeated calls with the same inputs agree.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use crate::core::build_env::{BuildContext, InheritedFlags};
use crate::core::registry::{BuildType, PackageSpec, Registry};

/// Position-independent code plus warning suppression applied to every CMake build
pub const BASE_FLAGS: &[&str] = &["-fPIC", "-Wno-pedantic", "-Wno-error=pedantic"];

/// Flags applied to every autotools build
pub const AUTOTOOLS_BASE_FLAGS: &[&str] = &["-fPIC"];

/// Package identifiers that finished build-and-install in this run
pub type BuiltPackageSet = HashSet<String>;

/// Everything needed to configure one package
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildParameters {
    /// Package identifier
    pub package: String,
    /// Build type
    pub build_type: BuildType,
    /// Shared install prefix
    pub install_prefix: PathBuf,
    /// C compiler override
    pub cc: Option<String>,
    /// C++ compiler override
    pub cxx: Option<String>,
    /// Declared C++ standard
    pub cxx_standard: Option<u32>,
    /// Whether the package declares any dependency
    pub has_dependencies: bool,
    /// Package-specific extra flags
    pub extra_flags: Vec<String>,
    /// `-I` flags for the shared prefix
    pub include_flags: Vec<String>,
    /// `-L` flags for the shared prefix
    pub linker_flags: Vec<String>,
    /// `CMAKE_PREFIX_PATH` entries
    pub prefix_path: Vec<PathBuf>,
    /// `<Name>_DIR`/`<Name>_ROOT` variables for built dependencies
    pub discovery_vars: Vec<(String, String)>,
    /// Package defines, in declaration order
    pub defines: Vec<(String, String)>,
    /// Whether to pass `-DBUILD_TESTING=OFF`
    pub disable_tests: bool,
    /// pkg-config directories under the prefix that dependents should see
    pub pkg_config_dirs: Vec<PathBuf>,
    /// Flag variables inherited from the caller
    pub inherited: InheritedFlags,
}

/// Compute the build parameters of `spec` given the packages built so far
///
/// Discovery variables are emitted only for dependencies that are both
/// defined in the registry and present in `built`; anything else is assumed
/// to be provided by the host.
pub fn compute_build_parameters(
    spec: &PackageSpec,
    registry: &Registry,
    built: &BuiltPackageSet,
    ctx: &BuildContext,
) -> BuildParameters {
    let prefix = ctx.install_prefix.as_path();
    let prefix_str = prefix.display().to_string();
    let has_dependencies = !spec.dependencies.is_empty();

    let extra_flags = spec
        .cflags_ext
        .as_deref()
        .map(|f| f.split_whitespace().map(str::to_string).collect())
        .unwrap_or_default();

    let mut params = BuildParameters {
        package: spec.name.clone(),
        build_type: spec.build_type,
        install_prefix: prefix.to_path_buf(),
        cc: ctx.cc.clone(),
        cxx: ctx.cxx.clone(),
        cxx_standard: spec.cxx_standard,
        has_dependencies,
        extra_flags,
        include_flags: Vec::new(),
        linker_flags: Vec::new(),
        prefix_path: Vec::new(),
        discovery_vars: Vec::new(),
        defines: spec.defines.clone(),
        disable_tests: !spec.defines_test_control(),
        pkg_config_dirs: Vec::new(),
        inherited: ctx.inherited.clone(),
    };

    if !has_dependencies {
        return params;
    }

    params.prefix_path.push(prefix.to_path_buf());
    params
        .prefix_path
        .extend(existing_subdirs(prefix, &["lib64/cmake", "lib/cmake"]));

    params.include_flags.push(format!("-I{prefix_str}/include"));
    params.linker_flags.push(format!("-L{prefix_str}/lib"));
    params.linker_flags.push(format!("-L{prefix_str}/lib64"));

    for dep in &spec.dependencies {
        let Some(dep_spec) = registry.get(dep) else {
            continue;
        };
        if !built.contains(dep) {
            tracing::debug!("Dependency {dep} of {} not built yet, skipping discovery variables", spec.name);
            continue;
        }

        let cmake_name = dep_spec.discovery_name();
        let mut push = |key: String| {
            if !params.discovery_vars.iter().any(|(k, _)| *k == key) {
                params.discovery_vars.push((key, prefix_str.clone()));
            }
        };
        push(format!("{cmake_name}_DIR"));
        push(format!("{cmake_name}_ROOT"));
        if cmake_name != dep.as_str() {
            push(format!("{dep}_DIR"));
            push(format!("{dep}_ROOT"));
        }
        push(format!("{}_ROOT", cmake_name.to_uppercase()));
    }

    params.pkg_config_dirs = existing_subdirs(prefix, &["lib/pkgconfig", "lib64/pkgconfig"]);
    params
}

fn existing_subdirs(prefix: &Path, subdirs: &[&str]) -> Vec<PathBuf> {
    subdirs
        .iter()
        .map(|s| prefix.join(s))
        .filter(|p| p.exists())
        .collect()
}

impl BuildParameters {
    fn std_flag(&self) -> Option<String> {
        self.cxx_standard.map(|std| format!("-std=c++{std}"))
    }

    /// `CMAKE_C_FLAGS` value
    pub fn cmake_c_flags(&self) -> String {
        BASE_FLAGS
            .iter()
            .map(|f| (*f).to_string())
            .chain(self.extra_flags.iter().cloned())
            .chain(self.include_flags.iter().cloned())
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// `CMAKE_CXX_FLAGS` value
    pub fn cmake_cxx_flags(&self) -> String {
        BASE_FLAGS
            .iter()
            .map(|f| (*f).to_string())
            .chain(self.extra_flags.iter().cloned())
            .chain(self.std_flag())
            .chain(self.include_flags.iter().cloned())
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Arguments for the CMake configure step, after the source directory
    pub fn cmake_args(&self) -> Vec<String> {
        let prefix = self.install_prefix.display().to_string();
        let mut args = Vec::new();

        if let Some(ref cc) = self.cc {
            args.push(format!("-DCMAKE_C_COMPILER={cc}"));
        }
        if let Some(ref cxx) = self.cxx {
            args.push(format!("-DCMAKE_CXX_COMPILER={cxx}"));
        }
        args.push(format!("-DCMAKE_BUILD_TYPE={}", self.build_type));
        args.push(format!("-DCMAKE_INSTALL_PREFIX={prefix}"));

        if self.has_dependencies {
            let prefix_path: Vec<String> = self
                .prefix_path
                .iter()
                .map(|p| p.display().to_string())
                .collect();
            args.push(format!("-DCMAKE_PREFIX_PATH={}", prefix_path.join(";")));

            let linker = self.linker_flags.join(" ");
            args.push(format!("-DCMAKE_EXE_LINKER_FLAGS={linker}"));
            args.push(format!("-DCMAKE_SHARED_LINKER_FLAGS={linker}"));

            args.extend(
                self.discovery_vars
                    .iter()
                    .map(|(key, value)| format!("-D{key}={value}")),
            );
        } else if let Some(std) = self.cxx_standard {
            args.push(format!("-DCMAKE_CXX_STANDARD={std}"));
            args.push("-DCMAKE_CXX_STANDARD_REQUIRED=ON".to_string());
        }

        args.push(format!("-DCMAKE_C_FLAGS={}", self.cmake_c_flags()));
        args.push(format!("-DCMAKE_CXX_FLAGS={}", self.cmake_cxx_flags()));

        args.extend(
            self.defines
                .iter()
                .map(|(key, value)| format!("-D{key}={value}")),
        );

        if self.disable_tests {
            args.push("-DBUILD_TESTING=OFF".to_string());
        }

        args
    }

    /// Arguments for `./configure`
    ///
    /// Inherited `CPPFLAGS`/`CFLAGS`/`CXXFLAGS`/`LDFLAGS` come first, the
    /// computed flags are appended after them.
    pub fn configure_args(&self) -> Vec<String> {
        let mut args = vec![format!("--prefix={}", self.install_prefix.display())];

        if let Some(ref cc) = self.cc {
            args.push(format!("CC={cc}"));
        }
        if let Some(ref cxx) = self.cxx {
            args.push(format!("CXX={cxx}"));
        }

        let base = || {
            AUTOTOOLS_BASE_FLAGS
                .iter()
                .map(|f| (*f).to_string())
                .chain(self.extra_flags.iter().cloned())
        };

        let cppflags: Vec<String> = AUTOTOOLS_BASE_FLAGS
            .iter()
            .map(|f| (*f).to_string())
            .chain(self.include_flags.iter().cloned())
            .collect();
        let cflags: Vec<String> = base().chain(self.include_flags.iter().cloned()).collect();
        let cxxflags: Vec<String> = base()
            .chain(self.std_flag())
            .chain(self.include_flags.iter().cloned())
            .collect();

        let inherited = &self.inherited;
        args.push(format!("CPPFLAGS={}", merge(inherited.cppflags.as_deref(), &cppflags)));
        args.push(format!("CFLAGS={}", merge(inherited.cflags.as_deref(), &cflags)));
        args.push(format!("CXXFLAGS={}", merge(inherited.cxxflags.as_deref(), &cxxflags)));

        let ldflags = merge(inherited.ldflags.as_deref(), &self.linker_flags);
        if !ldflags.is_empty() {
            args.push(format!("LDFLAGS={ldflags}"));
        }

        args
    }
}

fn merge(existing: Option<&str>, computed: &[String]) -> String {
    existing
        .map(str::trim)
        .filter(|e| !e.is_empty())
        .map(str::to_string)
        .into_iter()
        .chain(computed.iter().cloned())
        .collect::<Vec<_>>()
        .join(" ")
}
