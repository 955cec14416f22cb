//! Generated CMake package configs
//!
//! Some consumers look for gRPC and Protobuf through `find_package` names the
//! upstream installs do not provide. For each name in [`GENERATED_CONFIGS`] a
//! `Find<Name>.cmake`, `<Name>-config.cmake` and `<Name>-config-version.cmake`
//! are written into `<prefix>/lib/cmake/<Name>/`.

use std::path::{Path, PathBuf};

use crate::error::FilesystemError;
use crate::infra::filesystem;

const GRPC_TEMPLATE: &str = include_str!("../../templates/cmake/grpc.cmake.in");
const PROTOBUF_TEMPLATE: &str = include_str!("../../templates/cmake/protobuf.cmake.in");
const VERSION_TEMPLATE: &str = include_str!("../../templates/cmake/config-version.cmake.in");

/// Version reported by generated version files
pub const GENERATED_VERSION: &str = "1.0.0";

/// Discovery names with a generated config, and their template
pub const GENERATED_CONFIGS: &[(&str, &str)] = &[
    ("grpc++", GRPC_TEMPLATE),
    ("gRPC", GRPC_TEMPLATE),
    ("Protobuf", PROTOBUF_TEMPLATE),
];

fn render(template: &str, name: &str) -> String {
    template
        .replace("@NAME@", name)
        .replace("@VERSION@", GENERATED_VERSION)
}

fn cmake_dir(install_prefix: &Path) -> PathBuf {
    install_prefix.join("lib").join("cmake")
}

/// Write the config files, returning every file written
pub fn generate_cmake_configs(install_prefix: &Path) -> Result<Vec<PathBuf>, FilesystemError> {
    tracing::info!("Generating CMake config files...");
    let mut written = Vec::new();

    for (name, template) in GENERATED_CONFIGS {
        let dir = cmake_dir(install_prefix).join(name);
        let config = render(template, name);

        let files = [
            (dir.join(format!("Find{name}.cmake")), config.clone()),
            (dir.join(format!("{name}-config.cmake")), config),
            (
                dir.join(format!("{name}-config-version.cmake")),
                render(VERSION_TEMPLATE, name),
            ),
        ];
        for (path, content) in files {
            filesystem::write_file(&path, &content)?;
            written.push(path);
        }
        tracing::info!("Generated CMake config for {name} in {}", dir.display());
    }

    tracing::info!("Generated {} CMake config files", written.len());
    Ok(written)
}

/// Remove previously generated config directories
///
/// Run before building so stale configs never shadow the ones a fresh
/// package build installs. Returns the directories removed.
pub fn clean_generated_configs(install_prefix: &Path) -> Vec<PathBuf> {
    tracing::info!("Cleaning up previously generated CMake config files...");
    let base = cmake_dir(install_prefix);
    if !base.exists() {
        tracing::info!("No CMake config directory found, skipping cleanup");
        return Vec::new();
    }

    let mut removed = Vec::new();
    for (name, _) in GENERATED_CONFIGS {
        let dir = base.join(name);
        if !dir.exists() {
            continue;
        }
        match filesystem::remove_dir_all(&dir) {
            Ok(()) => {
                tracing::info!("Cleaned CMake config directory for {name}: {}", dir.display());
                removed.push(dir);
            }
            Err(e) => tracing::warn!("{e}"),
        }
    }

    if removed.is_empty() {
        tracing::info!("No CMake config files to clean");
    }
    removed
}
