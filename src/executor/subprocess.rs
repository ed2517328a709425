//! Subprocess execution for native service-manager tools.
//!
//! Provides utilities for running external commands with:
//! - No shell interpretation (direct exec)
//! - Captured stdout/stderr folded into error messages
//! - Optional piped stdin (for `sudo tee` style installs)
//! - A foregrounded variant that inherits the caller's stdio

use std::collections::HashMap;
use std::io::Write;
use std::process::{Command, Output, Stdio};

use tracing::{debug, warn};

use crate::error::ServiceError;

/// Result of a subprocess execution.
#[derive(Debug, Clone)]
pub struct SubprocessResult {
    /// Whether the command exited successfully (exit code 0).
    pub success: bool,
    /// The exit code, if available.
    pub exit_code: Option<i32>,
    /// Captured stdout as a string.
    pub stdout: String,
    /// Captured stderr as a string.
    pub stderr: String,
}

impl SubprocessResult {
    /// Create a SubprocessResult from a std::process::Output.
    fn from_output(output: Output) -> Self {
        Self {
            success: output.status.success(),
            exit_code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        }
    }

    /// Return the result if the command succeeded, otherwise wrap the
    /// captured output into an error describing `what` failed.
    pub fn success_or(self, what: &str) -> Result<SubprocessResult, ServiceError> {
        if self.success {
            return Ok(self);
        }
        let detail = if self.stderr.trim().is_empty() {
            self.stdout.trim().to_string()
        } else {
            self.stderr.trim().to_string()
        };
        warn!(what = %what, detail = %detail, "Subprocess failed");
        Err(ServiceError::execution_failed(format!(
            "{} failed: {}",
            what, detail
        )))
    }
}

/// Builder for subprocess execution.
pub struct SubprocessBuilder {
    program: String,
    args: Vec<String>,
    env: HashMap<String, String>,
    stdin_data: Option<Vec<u8>>,
}

impl SubprocessBuilder {
    /// Create a new subprocess builder.
    pub fn new(program: &str) -> Self {
        Self {
            program: program.to_string(),
            args: Vec::new(),
            env: HashMap::new(),
            stdin_data: None,
        }
    }

    /// Add arguments to the command.
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.args.extend(args.into_iter().map(|s| s.as_ref().to_string()));
        self
    }

    /// Add a single argument.
    pub fn arg(mut self, arg: &str) -> Self {
        self.args.push(arg.to_string());
        self
    }

    /// Set an environment variable.
    pub fn env(mut self, key: &str, value: &str) -> Self {
        self.env.insert(key.to_string(), value.to_string());
        self
    }

    /// Pipe the given bytes to the child's stdin.
    pub fn stdin_data(mut self, data: impl Into<Vec<u8>>) -> Self {
        self.stdin_data = Some(data.into());
        self
    }

    /// Execute the command, capturing stdout and stderr, and wait for
    /// completion. Service control operations block on one subprocess at a
    /// time, so no timeout is enforced here.
    pub fn run(self) -> Result<SubprocessResult, ServiceError> {
        debug!(
            program = %self.program,
            args = ?self.args,
            "Executing subprocess"
        );

        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args);
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());
        cmd.stdin(if self.stdin_data.is_some() {
            Stdio::piped()
        } else {
            Stdio::null()
        });

        for (key, value) in &self.env {
            cmd.env(key, value);
        }

        let mut child = cmd.spawn().map_err(|e| {
            ServiceError::execution_failed(format!("Failed to spawn {}: {}", self.program, e))
        })?;

        if let Some(data) = &self.stdin_data {
            // stdin is piped above whenever stdin_data is set
            let mut stdin = child.stdin.take().expect("child stdin is piped");
            stdin.write_all(data).map_err(|e| {
                ServiceError::execution_failed(format!(
                    "Failed to write to stdin of {}: {}",
                    self.program, e
                ))
            })?;
        }

        let output = child.wait_with_output().map_err(|e| {
            ServiceError::execution_failed(format!(
                "Failed to get output from {}: {}",
                self.program, e
            ))
        })?;

        let result = SubprocessResult::from_output(output);
        debug!(
            success = result.success,
            exit_code = ?result.exit_code,
            "Subprocess completed"
        );
        Ok(result)
    }

    /// Execute the command with the caller's stdin/stdout/stderr inherited
    /// and block until it exits. Used for foregrounded log streaming, where
    /// the native tool writes directly to the operator's terminal and an
    /// interrupt reaches the whole foreground process group.
    pub fn run_foreground(self) -> Result<(), ServiceError> {
        debug!(
            program = %self.program,
            args = ?self.args,
            "Executing foregrounded subprocess"
        );

        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args);
        for (key, value) in &self.env {
            cmd.env(key, value);
        }

        let status = cmd.status().map_err(|e| {
            ServiceError::execution_failed(format!("Failed to spawn {}: {}", self.program, e))
        })?;

        // An interrupted pager/stream exits non-zero; only a spawn failure
        // or an immediate tool error is worth surfacing.
        debug!(exit_code = ?status.code(), "Foregrounded subprocess exited");
        Ok(())
    }
}

/// Run a command with the given arguments, capturing output.
///
/// This is a convenience function for simple command execution.
pub fn run_command(program: &str, args: &[&str]) -> Result<SubprocessResult, ServiceError> {
    SubprocessBuilder::new(program)
        .args(args.iter().copied())
        .run()
}
