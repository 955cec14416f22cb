//! Output formatting and progress indicators
//!
//! This module provides utilities for displaying progress bars
//! and formatted messages to the user.

use indicatif::{ProgressBar, ProgressStyle};

use crate::core::builder::BuildProgress;
use crate::core::report::BuildResult;

/// Create a progress bar for build steps
pub fn create_build_bar(total: u64) -> ProgressBar {
    let pb = ProgressBar::new(total);
    let style = ProgressStyle::default_bar()
        .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} packages ({msg})")
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▓▒░");
    pb.set_style(style);
    pb
}

/// Progress bar driven by the build driver
#[derive(Debug)]
pub struct BuildBar {
    bar: ProgressBar,
}

impl BuildBar {
    /// Wrap a progress bar
    pub fn new(bar: ProgressBar) -> Self {
        Self { bar }
    }

    /// Finish the bar, keeping it on screen
    pub fn finish(&self, success: bool) {
        if success {
            self.bar.finish_with_message("done");
        } else {
            self.bar.abandon();
        }
    }
}

impl BuildProgress for BuildBar {
    fn started(&self, package: &str, _position: usize, _total: usize) {
        self.bar.set_message(package.to_string());
    }

    fn finished(&self, package: &str, result: &BuildResult) {
        self.bar.inc(1);
        if !result.success {
            self.bar.set_message(format!("{package} failed"));
        }
    }
}

/// Print an error and its causes to stderr
pub fn display_error(error: &anyhow::Error) {
    eprintln!("{} Error: {error}", status::ERROR);
    for cause in error.chain().skip(1) {
        eprintln!("  Caused by: {cause}");
    }
}

/// Status message prefixes
pub mod status {
    /// Success prefix (green checkmark)
    pub const SUCCESS: &str = "✓";

    /// Error prefix (red X)
    pub const ERROR: &str = "✗";

    /// Warning prefix (yellow triangle)
    pub const WARNING: &str = "⚠";

    /// Info prefix (blue circle)
    pub const INFO: &str = "ℹ";
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_bar_tracks_packages() {
        let bar = BuildBar::new(create_build_bar(2));
        bar.started("zlib", 0, 2);
        bar.finished("zlib", &BuildResult::success("u", "Built successfully"));
        bar.started("glog", 1, 2);
        bar.finished("glog", &BuildResult::failure("u", "Build failed"));

        assert_eq!(bar.bar.position(), 2);
        assert_eq!(bar.bar.message(), "glog failed");
        bar.finish(false);
    }
}
