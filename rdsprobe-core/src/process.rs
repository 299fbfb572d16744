//! External command invocation.
//!
//! The `aws` and `pulumi` CLIs are reached through [`CommandRunner`] so the
//! resolvers can be exercised without either tool installed. The working
//! directory of a command is part of its [`CommandSpec`]; nothing here
//! changes the working directory of the current process.

use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::debug;

/// A command line to spawn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    /// Executable name or path
    pub program: String,
    /// Arguments, passed without shell interpretation
    pub args: Vec<String>,
    /// Working directory for the child; inherits ours when `None`
    pub current_dir: Option<PathBuf>,
}

impl CommandSpec {
    /// Starts a spec for `program` with no arguments.
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            current_dir: None,
        }
    }

    /// Appends arguments.
    #[must_use]
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Sets the child's working directory.
    #[must_use]
    pub fn current_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.current_dir = Some(dir.as_ref().to_path_buf());
        self
    }
}

impl fmt::Display for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.program)?;
        for arg in &self.args {
            write!(f, " {arg}")?;
        }
        Ok(())
    }
}

/// Captured result of a finished command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    /// Whether the exit status was zero
    pub success: bool,
    /// Exit code, if the process exited normally
    pub code: Option<i32>,
    /// Standard output, lossily decoded
    pub stdout: String,
    /// Standard error, lossily decoded
    pub stderr: String,
}

impl CommandOutput {
    /// Builds a successful output with the given stdout.
    pub fn ok(stdout: impl Into<String>) -> Self {
        Self {
            success: true,
            code: Some(0),
            stdout: stdout.into(),
            stderr: String::new(),
        }
    }

    /// Builds a failed output with the given exit code and stderr.
    pub fn failed(code: i32, stderr: impl Into<String>) -> Self {
        Self {
            success: false,
            code: Some(code),
            stdout: String::new(),
            stderr: stderr.into(),
        }
    }

    /// Short description of a failed run: first stderr line or the exit code.
    pub fn failure_summary(&self) -> String {
        let first_line = self.stderr.lines().map(str::trim).find(|l| !l.is_empty());
        match (first_line, self.code) {
            (Some(line), _) => line.to_string(),
            (None, Some(code)) => format!("exited with status {code}"),
            (None, None) => "terminated by signal".to_string(),
        }
    }
}

/// Spawns a command and waits for it to finish.
pub trait CommandRunner {
    /// Runs `spec` to completion, capturing its output.
    ///
    /// # Errors
    /// Returns the spawn error when the program cannot be started.
    fn run(&self, spec: &CommandSpec) -> io::Result<CommandOutput>;
}

/// Runs commands with `std::process::Command`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemRunner;

impl CommandRunner for SystemRunner {
    fn run(&self, spec: &CommandSpec) -> io::Result<CommandOutput> {
        debug!("Running `{}`", spec);

        let mut command = Command::new(&spec.program);
        command.args(&spec.args);
        if let Some(dir) = &spec.current_dir {
            command.current_dir(dir);
        }

        let output = command.output()?;
        Ok(CommandOutput {
            success: output.status.success(),
            code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_command_spec_display() {
        let spec = CommandSpec::new("pulumi").args(["stack", "output", "sqlServerEndpoint"]);
        assert_eq!(spec.to_string(), "pulumi stack output sqlServerEndpoint");
        assert_eq!(spec.current_dir, None);
    }

    #[test]
    fn test_failure_summary_prefers_stderr() {
        let output = CommandOutput::failed(255, "\nerror: no stack selected\nmore");
        assert_eq!(output.failure_summary(), "error: no stack selected");

        let output = CommandOutput::failed(3, "");
        assert_eq!(output.failure_summary(), "exited with status 3");
    }

    #[test]
    fn test_system_runner_missing_program() {
        let spec = CommandSpec::new("rdsprobe-definitely-not-installed");
        let err = SystemRunner.run(&spec).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
    }

    #[cfg(unix)]
    #[test]
    fn test_system_runner_working_directory_is_child_only() {
        let dir = tempfile::tempdir().unwrap();
        let before = std::env::current_dir().unwrap();

        let spec = CommandSpec::new("pwd").current_dir(dir.path());
        let output = SystemRunner.run(&spec).unwrap();

        assert!(output.success);
        let reported = std::fs::canonicalize(output.stdout.trim()).unwrap();
        assert_eq!(reported, std::fs::canonicalize(dir.path()).unwrap());
        assert_eq!(std::env::current_dir().unwrap(), before);
    }
}
