//! Containerized build planning
//!
//! Everything needed to run a `local` build inside a throwaway container:
//! base image selection, architecture and host-system detection, the
//! generated Dockerfile, and the `build_summary.txt` written next to the
//! mounted output once the container exits.

use std::path::{Path, PathBuf};

use regex::Regex;
use walkdir::WalkDir;

use crate::config::defaults;
use crate::config::systems::{
    known_systems, packages_for_system, PackageManager, SystemImage, SYSTEM_IMAGES,
};
use crate::core::report::BuildReport;
use crate::error::{ConfigError, FilesystemError};
use crate::infra::{clock, filesystem};

/// Packages per `RUN` line in the generated Dockerfile
pub const DOCKERFILE_BATCH_SIZE: usize = 10;

/// Summary file written into the output mount
pub const SUMMARY_FILE: &str = "build_summary.txt";

/// Packages installed when a system has no package table
const FALLBACK_PACKAGES: &[&str] = &["build-essential", "cmake", "git", "python3", "python3-pip"];

/// Binary name inside the image
const PACKER_BINARY: &str = "cxx-packer";

/// Registry file name inside the image
const PACKER_REGISTRY: &str = "registry.toml";

/// Normalize a machine name (`uname -m` style) to an image architecture
pub fn normalize_architecture(machine: &str) -> String {
    match machine.to_lowercase().as_str() {
        "x86_64" | "amd64" => "amd64".to_string(),
        "aarch64" | "arm64" => "arm64".to_string(),
        "armv7l" | "armv6l" | "arm" => "arm".to_string(),
        other => {
            tracing::warn!("Unknown architecture '{other}', defaulting to amd64");
            "amd64".to_string()
        }
    }
}

/// Architecture of the host
pub fn detect_architecture() -> String {
    normalize_architecture(std::env::consts::ARCH)
}

/// Guess the system identifier from `/etc/os-release` content
///
/// Ubuntu maps to its release (22.04 for unknown releases), RPM-based
/// distributions map to `manylinux_2014`. Anything else falls back to
/// `ubuntu22.04`.
pub fn detect_system_name(os_release: Option<&str>) -> String {
    if let Some(content) = os_release {
        if let Some(id) = os_release_field(content, "ID").map(|id| id.to_lowercase()) {
            let version = os_release_field(content, "VERSION_ID").unwrap_or_default();
            match id.as_str() {
                "ubuntu" if version.starts_with("20.04") => return "ubuntu20.04".to_string(),
                "ubuntu" => return "ubuntu22.04".to_string(),
                "centos" | "rhel" | "fedora" => return "manylinux_2014".to_string(),
                _ => {}
            }
        }
    }

    tracing::warn!("Could not detect system automatically, using ubuntu22.04 as default");
    "ubuntu22.04".to_string()
}

/// Value of `KEY=value` in os-release content, quotes stripped
fn os_release_field(content: &str, key: &str) -> Option<String> {
    let re = Regex::new(&format!(r#"(?m)^{key}=["']?([^"'\n]+)["']?\s*$"#)).ok()?;
    let value = re.captures(content)?.get(1)?.as_str().trim().to_string();
    Some(value)
}

/// Read `/etc/os-release` and detect the host system
pub fn detect_host_system() -> String {
    let content = std::fs::read_to_string("/etc/os-release").ok();
    detect_system_name(content.as_deref())
}

/// Base image for a system and architecture
pub fn image_for_system(system_name: &str, arch: &str) -> Result<String, ConfigError> {
    tracing::debug!("Getting image for system: {system_name}, architecture: {arch}");
    let image = SYSTEM_IMAGES
        .iter()
        .find(|(name, _)| *name == system_name)
        .map(|(_, image)| image)
        .ok_or_else(|| ConfigError::UnknownSystem {
            name: system_name.to_string(),
            available: known_systems(),
        })?;

    match image {
        SystemImage::Single(image) => Ok((*image).to_string()),
        SystemImage::PerArch(images) => images
            .iter()
            .find(|(a, _)| *a == arch)
            .map(|(_, image)| (*image).to_string())
            .ok_or_else(|| ConfigError::UnsupportedArch {
                system: system_name.to_string(),
                arch: arch.to_string(),
                available: images.iter().map(|(a, _)| (*a).to_string()).collect(),
            }),
    }
}

/// `--platform` value for an architecture
pub fn platform_for_arch(arch: &str) -> String {
    match arch {
        "amd64" => "linux/amd64".to_string(),
        "arm64" => "linux/arm64".to_string(),
        "arm" => "linux/arm/v7".to_string(),
        other => format!("linux/{other}"),
    }
}

/// A fully resolved containerized build
#[derive(Debug, Clone)]
pub struct ContainerPlan {
    /// Target system identifier
    pub system_name: String,
    /// Target architecture
    pub arch: String,
    /// Base image the build image derives from
    pub base_image: String,
    /// Tag of the build image
    pub build_image: String,
    /// Host directory mounted as the container's output
    pub mount_dir: PathBuf,
    /// Host directory mounted as the container's logs
    pub logs_dir: PathBuf,
    /// Working directory inside the container
    pub workspace: String,
    /// Docker build context on the host
    pub context_dir: PathBuf,
    /// Registry file shipped into the image, if any
    pub registry: Option<PathBuf>,
}

impl ContainerPlan {
    /// Plan a build for `system_name` on `arch`
    ///
    /// An explicit `image` overrides the image map; otherwise the
    /// system/arch pair must be known.
    pub fn new(system_name: &str, arch: &str, image: Option<&str>) -> Result<Self, ConfigError> {
        let base_image = match image {
            Some(image) => {
                if !SYSTEM_IMAGES.iter().any(|(name, _)| *name == system_name) {
                    return Err(ConfigError::UnknownSystem {
                        name: system_name.to_string(),
                        available: known_systems(),
                    });
                }
                image.to_string()
            }
            None => image_for_system(system_name, arch)?,
        };

        Ok(Self {
            system_name: system_name.to_string(),
            arch: arch.to_string(),
            base_image,
            build_image: defaults::CONTAINER_IMAGE_NAME.to_string(),
            mount_dir: PathBuf::from(defaults::CONTAINER_MOUNT_DIR),
            logs_dir: PathBuf::from(defaults::CONTAINER_LOGS_DIR),
            workspace: defaults::CONTAINER_WORKSPACE.to_string(),
            context_dir: PathBuf::from(defaults::CONTAINER_CONTEXT_DIR),
            registry: None,
        })
    }

    /// Set the host output and logs directories
    #[must_use]
    pub fn with_dirs(mut self, mount_dir: PathBuf, logs_dir: PathBuf) -> Self {
        self.mount_dir = mount_dir;
        self.logs_dir = logs_dir;
        self
    }

    /// Set the build context directory
    #[must_use]
    pub fn with_context_dir(mut self, context_dir: PathBuf) -> Self {
        self.context_dir = context_dir;
        self
    }

    /// Ship a registry file into the image
    #[must_use]
    pub fn with_registry(mut self, registry: Option<PathBuf>) -> Self {
        self.registry = registry;
        self
    }

    /// `--platform` value
    pub fn platform(&self) -> String {
        platform_for_arch(&self.arch)
    }

    /// Command the container runs
    pub fn container_command(&self) -> Vec<String> {
        let mut cmd = vec![
            PACKER_BINARY.to_string(),
            "local".to_string(),
            "--system-name".to_string(),
            self.system_name.clone(),
        ];
        if self.registry.is_some() {
            cmd.push("--registry".to_string());
            cmd.push(PACKER_REGISTRY.to_string());
        }
        cmd
    }

    /// Container paths the output and logs mounts land on
    pub fn container_mounts(&self) -> [(PathBuf, String); 2] {
        [
            (
                self.mount_dir.clone(),
                format!("{}/{}", self.workspace, defaults::OUTPUT_DIR),
            ),
            (
                self.logs_dir.clone(),
                format!("{}/{}", self.workspace, defaults::OUTPUT_LOGS_DIR),
            ),
        ]
    }

    /// Generated Dockerfile
    pub fn dockerfile(&self) -> String {
        let (manager, packages) = match packages_for_system(&self.system_name) {
            Some(set) => (set.manager, set.packages),
            None => {
                tracing::warn!(
                    "No package config for {}, using ubuntu defaults",
                    self.system_name
                );
                (PackageManager::Apt, FALLBACK_PACKAGES)
            }
        };

        let mut out = format!("FROM {}\n\n", self.base_image);

        out.push_str("ENV TZ=UTC\n");
        if manager == PackageManager::Apt {
            out.push_str("ENV DEBIAN_FRONTEND=noninteractive\n");
            out.push_str("RUN ln -snf /usr/share/zoneinfo/$TZ /etc/localtime && echo $TZ > /etc/timezone\n");
        }

        out.push_str(&format!("\nRUN {}\n", manager.update_command().join(" ")));
        let install = manager.install_command().join(" ");
        for batch in packages.chunks(DOCKERFILE_BATCH_SIZE) {
            out.push_str(&format!("RUN {install} {}\n", batch.join(" ")));
        }
        out.push_str(&format!("RUN {}\n\n", manager.cleanup_command()));

        out.push_str(&format!("WORKDIR {}\n\n", self.workspace));
        out.push_str(&format!("COPY {PACKER_BINARY} /usr/local/bin/{PACKER_BINARY}\n"));
        if self.registry.is_some() {
            out.push_str(&format!("COPY {PACKER_REGISTRY} {PACKER_REGISTRY}\n"));
        }

        let cmd = self
            .container_command()
            .iter()
            .map(|part| format!("\"{part}\""))
            .collect::<Vec<_>>()
            .join(", ");
        out.push_str(&format!("\nCMD [{cmd}]\n"));
        out
    }

    /// Populate the build context: Dockerfile, packer binary, registry
    pub fn prepare_context(&self, packer_binary: &Path) -> Result<(), FilesystemError> {
        tracing::info!("Preparing build context...");
        filesystem::remove_dir_all(&self.context_dir)?;
        filesystem::create_dir_all(&self.context_dir)?;

        filesystem::copy_resolved(packer_binary, &self.context_dir.join(PACKER_BINARY))?;
        if let Some(ref registry) = self.registry {
            filesystem::copy_resolved(registry, &self.context_dir.join(PACKER_REGISTRY))?;
        }

        let dockerfile = self.context_dir.join("Dockerfile");
        filesystem::write_file(&dockerfile, &self.dockerfile())?;
        tracing::info!("Dockerfile created at {}", dockerfile.display());
        Ok(())
    }

    /// Render `build_summary.txt`
    ///
    /// `report` is the container's parsed `build_report.json`, or the reason
    /// it could not be read.
    pub fn render_summary(
        &self,
        time: &str,
        report: Result<&BuildReport, &str>,
        output_files: &[String],
    ) -> String {
        let mut out = String::from("C++ Packer Build Summary\n");
        out.push_str(&"=".repeat(50));
        out.push_str("\n\n");
        out.push_str(&format!("Build Time: {time}\n"));
        out.push_str(&format!("Build Image: {}\n", self.build_image));
        out.push_str(&format!("Base Image: {}\n", self.base_image));
        out.push_str(&format!("System Name: {}\n", self.system_name));
        out.push_str(&format!("Host Architecture: {}\n", detect_architecture()));
        out.push_str(&format!("Target Architecture: {}\n", self.arch));
        out.push_str(&format!("Output Directory: {}\n", self.mount_dir.display()));
        out.push_str(&format!("Logs Directory: {}\n\n", self.logs_dir.display()));

        match report {
            Ok(report) => {
                out.push_str(&format!(
                    "Build Results: {}/{} packages successful\n\n",
                    report.successful(),
                    report.len()
                ));
                out.push_str("Package Status:\n");
                out.push_str(&"-".repeat(30));
                out.push('\n');
                for (name, result) in report.iter() {
                    let glyph = if result.success { "✓" } else { "✗" };
                    out.push_str(&format!("{glyph} {name}: {}\n", result.message));
                }
            }
            Err(reason) => out.push_str(&format!("{reason}\n")),
        }

        out.push_str("\n\nOutput Files:\n");
        out.push_str(&"-".repeat(20));
        out.push('\n');
        for name in output_files {
            out.push_str(&format!("- {name}\n"));
        }
        out
    }

    /// Write `build_summary.txt` into the output mount
    pub fn write_summary(&self) -> Result<PathBuf, FilesystemError> {
        let report_path = self.logs_dir.join(defaults::REPORT_JSON);
        let parsed = if report_path.exists() {
            filesystem::read_file(&report_path).map(|content| {
                BuildReport::from_json(&content)
                    .map_err(|e| format!("Error reading build report: {e}"))
            })?
        } else {
            Err("Build report not found".to_string())
        };

        let files: Vec<String> = WalkDir::new(&self.mount_dir)
            .min_depth(1)
            .max_depth(1)
            .sort_by_file_name()
            .into_iter()
            .filter_map(Result::ok)
            .map(|entry| entry.file_name().to_string_lossy().into_owned())
            .filter(|name| name != SUMMARY_FILE)
            .collect();

        let summary = self.render_summary(
            &clock::now_utc_display(),
            parsed.as_ref().map_err(String::as_str),
            &files,
        );
        let path = self.mount_dir.join(SUMMARY_FILE);
        filesystem::write_file(&path, &summary)?;
        tracing::info!("Build summary saved to {}", path.display());
        Ok(path)
    }
}
