//! Infrastructure layer
//!
//! Handles all I/O operations: filesystem, git and external processes.

pub mod clock;
pub mod filesystem;
pub mod git;
pub mod process;
pub mod sandbox;
