//! Command-line interface module
//!
//! This module handles argument parsing and output formatting.
//! It contains no business logic - that belongs in the [`crate::core`] module.

pub mod commands;
pub mod output;

use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;

use crate::config::defaults;
use commands::{Commands, GlobalOptions};

/// cxx-packer - build native C/C++ dependencies from source
///
/// Clones, configures, builds and installs a registry of libraries in
/// dependency order into a single prefix.
#[derive(Parser, Debug)]
#[command(name = "cxx-packer")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Enable verbose output (-v for info, -vv for debug, -vvv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Run log file, copied into the logs directory when the build ends
    #[arg(long, global = true, default_value = defaults::RUN_LOG_FILE)]
    pub log_file: PathBuf,

    /// Package registry file (the built-in table is used when absent)
    #[arg(long, global = true)]
    pub registry: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

impl Cli {
    /// Level for terminal logging
    pub fn console_level(&self) -> tracing::Level {
        if self.quiet {
            return tracing::Level::ERROR;
        }
        match self.verbose {
            0 => tracing::Level::WARN,
            1 => tracing::Level::INFO,
            2 => tracing::Level::DEBUG,
            _ => tracing::Level::TRACE,
        }
    }

    /// Level for the run log, never less detailed than INFO
    pub fn file_level(&self) -> tracing::Level {
        match self.verbose {
            0 | 1 => tracing::Level::INFO,
            2 => tracing::Level::DEBUG,
            _ => tracing::Level::TRACE,
        }
    }

    /// Run log path, for commands that build
    pub fn run_log(&self) -> Option<&PathBuf> {
        match self.command {
            Some(Commands::Local(_) | Commands::System(_) | Commands::Container(_)) => {
                Some(&self.log_file)
            }
            _ => None,
        }
    }

    /// Execute the CLI command
    pub async fn run(self) -> Result<()> {
        let globals = GlobalOptions {
            registry: self.registry,
            log_file: self.log_file,
            show_progress: !self.quiet && self.verbose == 0,
        };

        if let Some(cmd) = self.command {
            cmd.run(globals).await
        } else {
            // No subcommand provided, show help
            use clap::CommandFactory;
            let mut cmd = Self::command();
            cmd.print_help()?;
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("cxx-packer").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn test_levels() {
        let cli = parse(&["order"]);
        assert_eq!(cli.console_level(), tracing::Level::WARN);
        assert_eq!(cli.file_level(), tracing::Level::INFO);

        let cli = parse(&["-vv", "order"]);
        assert_eq!(cli.console_level(), tracing::Level::DEBUG);
        assert_eq!(cli.file_level(), tracing::Level::DEBUG);

        let cli = parse(&["order", "-q"]);
        assert_eq!(cli.console_level(), tracing::Level::ERROR);
    }

    #[test]
    fn test_run_log_only_for_builds() {
        assert!(parse(&["order"]).run_log().is_none());
        let cli = parse(&["--log-file", "x.log", "local", "--system-name", "ubuntu22.04"]);
        assert_eq!(cli.run_log(), Some(&PathBuf::from("x.log")));
    }

    #[test]
    fn test_global_registry_after_subcommand() {
        let cli = parse(&["order", "--registry", "deps.toml"]);
        assert_eq!(cli.registry, Some(PathBuf::from("deps.toml")));
    }
}
