//! Centralized command execution with consistent error handling.
//!
//! Every external program distpack starts (container runtimes, mostly) goes
//! through [`Cmd`], so stderr is always captured and long-running invocations
//! can be bounded by a timeout.

use anyhow::{bail, Result};
use std::process::{Command, Output, Stdio};
use std::time::Duration;

/// Result of a command execution.
#[derive(Debug, Clone)]
pub struct CommandResult {
    /// Exit code, or -1 if terminated by signal.
    pub code: i32,
    /// Captured stdout as a string.
    pub stdout: String,
    /// Captured stderr as a string.
    pub stderr: String,
}

impl CommandResult {
    /// Returns true if the command exited successfully.
    pub fn success(&self) -> bool {
        self.code == 0
    }

    /// Get stdout, trimmed of whitespace.
    pub fn stdout_trimmed(&self) -> &str {
        self.stdout.trim()
    }

    /// Get stderr, trimmed of whitespace.
    pub fn stderr_trimmed(&self) -> &str {
        self.stderr.trim()
    }

    /// Stdout followed by stderr, for log capture.
    pub fn combined(&self) -> String {
        let mut logs = self.stdout.clone();
        if !self.stderr.is_empty() {
            if !logs.is_empty() && !logs.ends_with('\n') {
                logs.push('\n');
            }
            logs.push_str(&self.stderr);
        }
        logs
    }
}

/// Why a command could not produce a [`CommandResult`].
#[derive(Debug, thiserror::Error)]
pub enum SpawnError {
    #[error("'{0}' not found. Is it installed?")]
    NotFound(String),

    #[error("'{program}' did not finish within {}s", .after.as_secs())]
    TimedOut { program: String, after: Duration },

    #[error("failed to execute '{program}': {source}")]
    Io {
        program: String,
        #[source]
        source: std::io::Error,
    },
}

/// Builder for configuring command execution.
pub struct Cmd {
    program: String,
    args: Vec<String>,
    timeout: Option<Duration>,
    /// If true, don't fail on non-zero exit.
    allow_fail: bool,
    /// Custom error message prefix.
    error_prefix: Option<String>,
}

impl Cmd {
    /// Create a new command builder.
    pub fn new(program: impl AsRef<str>) -> Self {
        Self {
            program: program.as_ref().to_string(),
            args: Vec::new(),
            timeout: None,
            allow_fail: false,
            error_prefix: None,
        }
    }

    /// Add a single argument.
    pub fn arg(mut self, arg: impl AsRef<str>) -> Self {
        self.args.push(arg.as_ref().to_string());
        self
    }

    /// Add multiple arguments.
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for arg in args {
            self.args.push(arg.as_ref().to_string());
        }
        self
    }

    /// Kill the child if it has not exited after `timeout`.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Allow non-zero exit codes without failing.
    pub fn allow_fail(mut self) -> Self {
        self.allow_fail = true;
        self
    }

    /// Set a custom error message prefix.
    pub fn error_msg(mut self, msg: impl AsRef<str>) -> Self {
        self.error_prefix = Some(msg.as_ref().to_string());
        self
    }

    /// The program and its arguments, shell-style, for logging.
    pub fn display(&self) -> String {
        let mut line = self.program.clone();
        for arg in &self.args {
            line.push(' ');
            if arg.contains(char::is_whitespace) {
                line.push_str(&format!("{:?}", arg));
            } else {
                line.push_str(arg);
            }
        }
        line
    }

    /// Run the command and capture output, reporting spawn problems as a
    /// typed [`SpawnError`]. Non-zero exit is not an error here.
    pub fn capture(self) -> std::result::Result<CommandResult, SpawnError> {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args);
        cmd.stdin(Stdio::null());

        let output = match self.timeout {
            Some(limit) => output_with_timeout(cmd, &self.program, limit)?,
            None => cmd.output().map_err(|e| spawn_error(&self.program, e))?,
        };

        Ok(CommandResult {
            code: output.status.code().unwrap_or(-1),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }

    /// Run the command and capture output.
    pub fn run(self) -> Result<CommandResult> {
        let program = self.program.clone();
        let allow_fail = self.allow_fail;
        let prefix = self
            .error_prefix
            .clone()
            .unwrap_or_else(|| format!("'{}' failed", program));

        let result = self.capture()?;

        if !allow_fail && !result.success() {
            let stderr = result.stderr_trimmed();
            if stderr.is_empty() {
                bail!("{} (exit code {})", prefix, result.code);
            } else {
                bail!("{} (exit code {}):\n{}", prefix, result.code, stderr);
            }
        }

        Ok(result)
    }
}

fn spawn_error(program: &str, err: std::io::Error) -> SpawnError {
    if err.kind() == std::io::ErrorKind::NotFound {
        SpawnError::NotFound(program.to_string())
    } else {
        SpawnError::Io {
            program: program.to_string(),
            source: err,
        }
    }
}

fn output_with_timeout(
    cmd: Command,
    program: &str,
    limit: Duration,
) -> std::result::Result<Output, SpawnError> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|e| spawn_error(program, e))?;

    runtime.block_on(async {
        let mut cmd = tokio::process::Command::from(cmd);
        cmd.kill_on_drop(true);
        match tokio::time::timeout(limit, cmd.output()).await {
            Ok(output) => output.map_err(|e| spawn_error(program, e)),
            Err(_) => Err(SpawnError::TimedOut {
                program: program.to_string(),
                after: limit,
            }),
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_success() {
        let result = Cmd::new("echo").arg("hello").run().unwrap();
        assert!(result.success());
        assert_eq!(result.stdout_trimmed(), "hello");
    }

    #[test]
    fn test_run_failure_includes_stderr() {
        let err = Cmd::new("ls")
            .arg("/nonexistent_path_12345")
            .run()
            .unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("No such file") || msg.contains("cannot access"));
    }

    #[test]
    fn test_allow_fail_keeps_exit_code() {
        let result = Cmd::new("false").allow_fail().run().unwrap();
        assert!(!result.success());
        assert_eq!(result.code, 1);
    }

    #[test]
    fn test_custom_error_message() {
        let err = Cmd::new("false")
            .error_msg("Container build step failed")
            .run()
            .unwrap_err();
        assert!(err.to_string().contains("Container build step failed"));
    }

    #[test]
    fn test_missing_program_is_not_found() {
        let err = Cmd::new("nonexistent_program_12345").capture().unwrap_err();
        assert!(matches!(err, SpawnError::NotFound(_)));
    }

    #[test]
    fn test_timeout_kills_child() {
        let err = Cmd::new("sleep")
            .arg("5")
            .timeout(Duration::from_millis(200))
            .capture()
            .unwrap_err();
        assert!(matches!(err, SpawnError::TimedOut { .. }));
    }

    #[test]
    fn test_timeout_not_hit() {
        let result = Cmd::new("echo")
            .arg("quick")
            .timeout(Duration::from_secs(10))
            .capture()
            .unwrap();
        assert_eq!(result.stdout_trimmed(), "quick");
    }

    #[test]
    fn test_combined_output() {
        let result = Cmd::new("sh")
            .args(["-c", "echo out; echo err >&2"])
            .run()
            .unwrap();
        let logs = result.combined();
        assert!(logs.contains("out"));
        assert!(logs.contains("err"));
    }

    #[test]
    fn test_display_quotes_whitespace() {
        let cmd = Cmd::new("sh").args(["-c", "echo hi"]);
        assert_eq!(cmd.display(), "sh -c \"echo hi\"");
    }
}
