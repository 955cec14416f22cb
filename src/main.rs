//! cxx-packer CLI - build native C/C++ dependencies from source
//!
//! Entry point for the cxx-packer command-line application.

use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;

use cxx_packer::cli::output::display_error;
use cxx_packer::cli::Cli;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Terminal output honours RUST_LOG; the run log always keeps INFO and up
    let console = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_filter(EnvFilter::from_default_env().add_directive(cli.console_level().into()));

    let run_log = cli.run_log().and_then(|path| match std::fs::File::create(path) {
        Ok(file) => Some(
            tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(Arc::new(file))
                .with_filter(LevelFilter::from_level(cli.file_level())),
        ),
        Err(e) => {
            eprintln!("Cannot open run log {}: {e}", path.display());
            None
        }
    });

    tracing_subscriber::registry().with(console).with(run_log).init();

    // Run the command and handle errors
    match cli.run().await {
        Ok(()) => Ok(()),
        Err(e) => {
            display_error(&e);
            std::process::exit(1);
        }
    }
}
