//! cxx-packer - build orchestrator for native C/C++ library dependencies
//!
//! Resolves a registry of source packages into a dependency-first order,
//! then clones, configures, builds and installs each one into a common
//! prefix, threading include paths, linker paths and CMake discovery hints
//! from every installed package to its dependents.
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - [`cli`] - Command-line interface parsing and output formatting
//! - [`core`] - Business logic
//! - [`infra`] - Infrastructure layer (filesystem, git, processes, containers)
//! - [`config`] - Configuration and constants
//! - [`error`] - Error types and handling

pub mod cli;
pub mod config;
pub mod core;
pub mod error;
pub mod infra;

#[cfg(test)]
pub mod test_utils;
