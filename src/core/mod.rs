//! Core business logic module
//!
//! Registry, dependency resolution, flag propagation and the build driver.
//! External processes are reached only through
//! [`crate::infra::process::CommandRunner`].
//!
//! # Submodules
//!
//! - [`registry`] - Package registry (built-in table or TOML file)
//! - [`resolver`] - Dependency resolution
//! - [`build_env`] - Build context threaded through the driver
//! - [`toolchain`] - Compiler selection
//! - [`flags`] - Flag and path propagation
//! - [`strategy`] - Build-system detection and execution
//! - [`builder`] - Build orchestration logic
//! - [`diagnostics`] - Failure log capture
//! - [`report`] - Build report
//! - [`artifacts`] - Shared-library collection
//! - [`cmake_config`] - Generated CMake package configs
//! - [`system_packages`] - Host preparation and system packages
//! - [`clean`] - Pre-run cleanup
//! - [`container`] - Containerized build planning

pub mod artifacts;
pub mod build_env;
pub mod builder;
pub mod clean;
pub mod cmake_config;
pub mod container;
pub mod diagnostics;
pub mod flags;
pub mod registry;
pub mod report;
pub mod resolver;
pub mod strategy;
pub mod system_packages;
pub mod toolchain;
