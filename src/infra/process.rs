//! External process execution
//!
//! Every configure/compile/install/checkout step goes through a
//! [`CommandRunner`]. Exit status is the only success signal; there is no
//! timeout, a hung tool blocks the run.

use std::cell::RefCell;
use std::path::{Path, PathBuf};
use std::process::Command;

use crate::error::ProcessError;

/// A fully described external command
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShellCommand {
    /// Program to execute
    pub program: String,
    /// Arguments
    pub args: Vec<String>,
    /// Working directory
    pub cwd: Option<PathBuf>,
    /// Extra environment variables
    pub env: Vec<(String, String)>,
    /// Prefix with `sudo`
    pub sudo: bool,
}

impl ShellCommand {
    /// Create a command for a program
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            cwd: None,
            env: Vec::new(),
            sudo: false,
        }
    }

    /// Run a script through `sh -c`
    pub fn shell(script: impl Into<String>) -> Self {
        Self::new("sh").arg("-c").arg(script)
    }

    /// Build from an argv slice (first element is the program)
    pub fn from_argv(argv: &[&str]) -> Self {
        let mut iter = argv.iter();
        let program = iter.next().copied().unwrap_or("true");
        Self::new(program).args(iter.copied())
    }

    /// Append an argument
    #[must_use]
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Append several arguments
    #[must_use]
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Set the working directory
    #[must_use]
    pub fn current_dir(mut self, dir: &Path) -> Self {
        self.cwd = Some(dir.to_path_buf());
        self
    }

    /// Add environment variables
    #[must_use]
    pub fn envs<I>(mut self, vars: I) -> Self
    where
        I: IntoIterator<Item = (String, String)>,
    {
        self.env.extend(vars);
        self
    }

    /// Request privilege elevation
    #[must_use]
    pub fn with_sudo(mut self, sudo: bool) -> Self {
        self.sudo = sudo;
        self
    }

    /// Human-readable command line, as logged
    pub fn display(&self) -> String {
        let mut parts = Vec::with_capacity(self.args.len() + 2);
        if self.sudo {
            parts.push("sudo".to_string());
        }
        parts.push(self.program.clone());
        parts.extend(self.args.iter().map(|a| {
            if a.contains(char::is_whitespace) {
                format!("'{a}'")
            } else {
                a.clone()
            }
        }));
        parts.join(" ")
    }

    fn to_command(&self) -> Command {
        let mut cmd = if self.sudo {
            let mut cmd = Command::new("sudo");
            cmd.arg(&self.program);
            cmd
        } else {
            Command::new(&self.program)
        };
        cmd.args(&self.args);
        if let Some(ref cwd) = self.cwd {
            cmd.current_dir(cwd);
        }
        for (key, value) in &self.env {
            cmd.env(key, value);
        }
        cmd
    }
}

/// Executes external commands
pub trait CommandRunner {
    /// Run a command to completion; `Ok` only on a zero exit status
    fn run(&self, command: &ShellCommand) -> Result<(), ProcessError>;
}

/// Runs commands on the host, inheriting stdio
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemRunner;

impl CommandRunner for SystemRunner {
    fn run(&self, command: &ShellCommand) -> Result<(), ProcessError> {
        let line = command.display();
        tracing::info!("Running command: {line}");
        if let Some(ref cwd) = command.cwd {
            tracing::info!("Working directory: {}", cwd.display());
        }

        let status = command
            .to_command()
            .status()
            .map_err(|e| ProcessError::SpawnFailed {
                command: line.clone(),
                error: e.to_string(),
            })?;

        if status.success() {
            Ok(())
        } else {
            tracing::error!("Command failed with exit code {:?}: {line}", status.code());
            Err(ProcessError::NonZeroExit {
                command: line,
                code: status.code(),
            })
        }
    }
}

/// Records commands instead of running them
///
/// Used for `--dry-run` and in tests. Commands whose display line contains
/// one of the configured failure patterns report a non-zero exit.
#[derive(Debug, Default)]
pub struct RecordingRunner {
    commands: RefCell<Vec<ShellCommand>>,
    fail_patterns: Vec<String>,
}

impl RecordingRunner {
    /// Create a runner where every command succeeds
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail every command whose command line contains `pattern`
    #[must_use]
    pub fn fail_on(mut self, pattern: impl Into<String>) -> Self {
        self.fail_patterns.push(pattern.into());
        self
    }

    /// Commands recorded so far
    pub fn commands(&self) -> Vec<ShellCommand> {
        self.commands.borrow().clone()
    }

    /// Command lines recorded so far
    pub fn lines(&self) -> Vec<String> {
        self.commands.borrow().iter().map(ShellCommand::display).collect()
    }
}

impl CommandRunner for RecordingRunner {
    fn run(&self, command: &ShellCommand) -> Result<(), ProcessError> {
        let line = command.display();
        tracing::info!("[dry-run] {line}");
        self.commands.borrow_mut().push(command.clone());

        if self.fail_patterns.iter().any(|p| line.contains(p.as_str())) {
            return Err(ProcessError::NonZeroExit {
                command: line,
                code: Some(1),
            });
        }
        Ok(())
    }
}
