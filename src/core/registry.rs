//! Package registry
//!
//! The static, declarative table of libraries to build. A registry is loaded
//! once at startup (built-in table or a TOML file) and never mutated.
//!
//! # File format
//!
//! ```toml
//! [[packages]]
//! url = "https://github.com/grpc/grpc"
//! branch = "v1.50.2"
//! "c++" = 17
//! dependencies = ["protobuf"]
//! build_type = "Release"
//! cmakename = "gRPC"
//! define = [["gRPC_BUILD_TESTS", "OFF"]]
//! cflags_ext = "-Wno-error"
//! custom_command = "./build.sh --prefix={install_prefix} -j{cpu_count}"
//! ```

use serde::Deserialize;
use std::path::Path;
use std::str::FromStr;

use crate::error::RegistryError;

/// Registry compiled into the binary
pub const BUILTIN_REGISTRY: &str = include_str!("../../registry/default.toml");

/// Build configuration passed to the build system
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BuildType {
    /// Optimized build
    #[default]
    Release,
    /// Debug build
    Debug,
    /// Optimized with debug info
    RelWithDebInfo,
    /// Size-optimized
    MinSizeRel,
}

impl FromStr for BuildType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Release" | "release" => Ok(Self::Release),
            "Debug" | "debug" => Ok(Self::Debug),
            "RelWithDebInfo" => Ok(Self::RelWithDebInfo),
            "MinSizeRel" => Ok(Self::MinSizeRel),
            other => Err(other.to_string()),
        }
    }
}

impl std::fmt::Display for BuildType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Release => write!(f, "Release"),
            Self::Debug => write!(f, "Debug"),
            Self::RelWithDebInfo => write!(f, "RelWithDebInfo"),
            Self::MinSizeRel => write!(f, "MinSizeRel"),
        }
    }
}

/// One library in the registry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageSpec {
    /// Package identifier (last path component of the source URL)
    pub name: String,
    /// Git source URL
    pub url: String,
    /// Branch or tag to check out
    pub branch: String,
    /// Required C++ standard (17, 20, ...)
    pub cxx_standard: Option<u32>,
    /// Build type
    pub build_type: BuildType,
    /// Package identifiers this package needs installed first
    pub dependencies: Vec<String>,
    /// `-D<KEY>=<VALUE>` defines, in declaration order
    pub defines: Vec<(String, String)>,
    /// Extra compiler flags appended to C and C++ flags
    pub cflags_ext: Option<String>,
    /// Shell command template replacing build-system detection
    pub custom_command: Option<String>,
    /// Name used by CMake's `find_package`, when it differs from `name`
    pub cmake_name: Option<String>,
}

impl PackageSpec {
    /// Create a spec with defaults from a source URL
    pub fn new(url: &str) -> Result<Self, RegistryError> {
        Ok(Self {
            name: package_name_from_url(url)?,
            url: url.to_string(),
            branch: default_branch(),
            cxx_standard: None,
            build_type: BuildType::default(),
            dependencies: Vec::new(),
            defines: Vec::new(),
            cflags_ext: None,
            custom_command: None,
            cmake_name: None,
        })
    }

    /// Set the branch
    #[must_use]
    pub fn with_branch(mut self, branch: &str) -> Self {
        self.branch = branch.to_string();
        self
    }

    /// Set the C++ standard
    #[must_use]
    pub fn with_cxx_standard(mut self, standard: u32) -> Self {
        self.cxx_standard = Some(standard);
        self
    }

    /// Set the dependencies
    #[must_use]
    pub fn with_dependencies(mut self, deps: &[&str]) -> Self {
        self.dependencies = deps.iter().map(|d| (*d).to_string()).collect();
        self
    }

    /// Add a define
    #[must_use]
    pub fn with_define(mut self, key: &str, value: &str) -> Self {
        self.defines.push((key.to_string(), value.to_string()));
        self
    }

    /// Set extra compiler flags
    #[must_use]
    pub fn with_cflags(mut self, flags: &str) -> Self {
        self.cflags_ext = Some(flags.to_string());
        self
    }

    /// Set a custom build command template
    #[must_use]
    pub fn with_custom_command(mut self, template: &str) -> Self {
        self.custom_command = Some(template.to_string());
        self
    }

    /// Set the CMake discovery name
    #[must_use]
    pub fn with_cmake_name(mut self, name: &str) -> Self {
        self.cmake_name = Some(name.to_string());
        self
    }

    /// Name under which CMake discovers this package
    pub fn discovery_name(&self) -> &str {
        self.cmake_name.as_deref().unwrap_or(&self.name)
    }

    /// Whether the package controls `BUILD_TESTING` itself
    pub fn defines_test_control(&self) -> bool {
        self.defines.iter().any(|(key, _)| key.contains("BUILD_TESTING"))
    }
}

/// Derive the package identifier from a source URL
pub fn package_name_from_url(url: &str) -> Result<String, RegistryError> {
    let last = url.trim_end_matches('/').rsplit('/').next().unwrap_or("");
    let name = last.strip_suffix(".git").unwrap_or(last);
    if name.is_empty() || name.contains(':') {
        return Err(RegistryError::InvalidSource {
            url: url.to_string(),
        });
    }
    Ok(name.to_string())
}

fn default_branch() -> String {
    "master".to_string()
}

/// Registry file layout
#[derive(Debug, Deserialize)]
struct RegistryFile {
    #[serde(default)]
    packages: Vec<PackageEntry>,
}

/// One `[[packages]]` table
#[derive(Debug, Deserialize)]
struct PackageEntry {
    url: String,
    #[serde(default = "default_branch")]
    branch: String,
    #[serde(default, rename = "c++", alias = "cxx_standard")]
    cxx_standard: Option<u32>,
    #[serde(default)]
    dependencies: Vec<String>,
    #[serde(default)]
    build_type: Option<String>,
    #[serde(default)]
    cmakename: Option<String>,
    #[serde(default)]
    define: Vec<(String, String)>,
    #[serde(default)]
    cflags_ext: Option<String>,
    #[serde(default)]
    custom_command: Option<String>,
}

impl PackageEntry {
    fn into_spec(self) -> Result<PackageSpec, RegistryError> {
        let name = package_name_from_url(&self.url)?;
        let build_type = match self.build_type {
            Some(value) => value
                .parse()
                .map_err(|value| RegistryError::InvalidBuildType {
                    package: name.clone(),
                    value,
                })?,
            None => BuildType::default(),
        };

        Ok(PackageSpec {
            name,
            url: self.url,
            branch: self.branch,
            cxx_standard: self.cxx_standard,
            build_type,
            dependencies: self.dependencies,
            defines: self.define,
            cflags_ext: self.cflags_ext.filter(|f| !f.trim().is_empty()),
            custom_command: self.custom_command.filter(|c| !c.trim().is_empty()),
            cmake_name: self.cmakename,
        })
    }
}

/// Ordered, immutable set of package specs with unique identifiers
#[derive(Debug, Clone, Default)]
pub struct Registry {
    packages: Vec<PackageSpec>,
}

impl Registry {
    /// Create a registry, rejecting duplicate identifiers
    pub fn new(packages: Vec<PackageSpec>) -> Result<Self, RegistryError> {
        for (i, spec) in packages.iter().enumerate() {
            if packages[..i].iter().any(|p| p.name == spec.name) {
                return Err(RegistryError::DuplicatePackage {
                    name: spec.name.clone(),
                    url: spec.url.clone(),
                });
            }
        }
        Ok(Self { packages })
    }

    /// The built-in registry
    pub fn builtin() -> Result<Self, RegistryError> {
        Self::from_toml(BUILTIN_REGISTRY)
    }

    /// Parse a registry from TOML text
    pub fn from_toml(content: &str) -> Result<Self, RegistryError> {
        let file: RegistryFile =
            toml::from_str(content).map_err(|e| RegistryError::ParseError(e.to_string()))?;
        let specs = file
            .packages
            .into_iter()
            .map(PackageEntry::into_spec)
            .collect::<Result<Vec<_>, _>>()?;
        Self::new(specs)
    }

    /// Load a registry file
    pub fn load(path: &Path) -> Result<Self, RegistryError> {
        let content = std::fs::read_to_string(path).map_err(|e| RegistryError::IoError {
            path: path.to_path_buf(),
            error: e.to_string(),
        })?;
        Self::from_toml(&content)
    }

    /// Look up a package by identifier
    pub fn get(&self, name: &str) -> Option<&PackageSpec> {
        self.packages.iter().find(|p| p.name == name)
    }

    /// Whether a package identifier is defined
    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Packages in declaration order
    pub fn iter(&self) -> impl Iterator<Item = &PackageSpec> {
        self.packages.iter()
    }

    /// Number of packages
    pub fn len(&self) -> usize {
        self.packages.len()
    }

    /// Whether the registry is empty
    pub fn is_empty(&self) -> bool {
        self.packages.is_empty()
    }
}
