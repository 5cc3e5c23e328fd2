//! Container runtimes as opaque command executors.
//!
//! A runtime takes one composed shell script plus the host directories to
//! bind, and reports the exit code and captured output. Nothing else about
//! the runtime is assumed, so podman, docker and test doubles are
//! interchangeable.

use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

use crate::process::{Cmd, SpawnError};

/// Container path of the read-only workspace.
pub const WORKSPACE_MOUNT: &str = "/src";
/// Container path of the read-only staging directory (patched manifest).
pub const STAGE_MOUNT: &str = "/stage";
/// Container path of the writable output directory.
pub const OUTPUT_MOUNT: &str = "/out";

/// Host directories bound into the build container.
#[derive(Debug, Clone)]
pub struct Mounts {
    pub workspace: PathBuf,
    pub stage: PathBuf,
    pub output: PathBuf,
}

impl Mounts {
    fn check(&self) -> Result<(), InvokeError> {
        for dir in [&self.workspace, &self.stage, &self.output] {
            if !dir.is_dir() {
                return Err(InvokeError::InvalidMount(dir.clone()));
            }
        }
        Ok(())
    }
}

/// Exit status and captured output of one container run.
#[derive(Debug, Clone)]
pub struct Invocation {
    pub exit_code: i32,
    pub logs: String,
}

impl Invocation {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// Why a runtime could not run the script at all.
#[derive(Debug, thiserror::Error)]
pub enum InvokeError {
    #[error("container runtime '{0}' is not installed")]
    NotFound(String),

    #[error("container run timed out after {}s", .0.as_secs())]
    TimedOut(Duration),

    #[error("cannot mount {}: not a directory", .0.display())]
    InvalidMount(PathBuf),

    #[error("container runtime failed to start: {0}")]
    Io(String),
}

/// An isolated command executor.
pub trait ContainerRuntime {
    /// Name used in logs and diagnostics.
    fn id(&self) -> &str;

    /// Run `script` with `mounts` bound and wait for it to exit.
    fn invoke(&self, script: &str, mounts: &Mounts) -> Result<Invocation, InvokeError>;
}

/// A runtime driven through its `run` subcommand (podman, docker, nerdctl).
#[derive(Debug, Clone)]
pub struct CliRuntime {
    program: String,
    image: String,
    timeout: Duration,
}

impl CliRuntime {
    pub fn new(program: impl Into<String>, image: impl Into<String>, timeout: Duration) -> Self {
        Self {
            program: program.into(),
            image: image.into(),
            timeout,
        }
    }

    /// The full command line for a script.
    pub fn command(&self, script: &str, mounts: &Mounts) -> Cmd {
        Cmd::new(&self.program)
            .args(["run", "--rm", "--security-opt", "label=disable"])
            .arg("-v")
            .arg(bind(&mounts.workspace, WORKSPACE_MOUNT, true))
            .arg("-v")
            .arg(bind(&mounts.stage, STAGE_MOUNT, true))
            .arg("-v")
            .arg(bind(&mounts.output, OUTPUT_MOUNT, false))
            .arg(&self.image)
            .args(["sh", "-c", script])
            .timeout(self.timeout)
            .allow_fail()
    }
}

impl ContainerRuntime for CliRuntime {
    fn id(&self) -> &str {
        &self.program
    }

    fn invoke(&self, script: &str, mounts: &Mounts) -> Result<Invocation, InvokeError> {
        mounts.check()?;
        let cmd = self.command(script, mounts);
        debug!("{}", cmd.display());

        let result = cmd.capture().map_err(|e| match e {
            SpawnError::NotFound(program) => InvokeError::NotFound(program),
            SpawnError::TimedOut { after, .. } => InvokeError::TimedOut(after),
            other => InvokeError::Io(other.to_string()),
        })?;

        Ok(Invocation {
            exit_code: result.code,
            logs: result.combined(),
        })
    }
}

fn bind(host: &Path, container: &str, read_only: bool) -> String {
    let mode = if read_only { ":ro" } else { "" };
    format!("{}:{}{}", host.display(), container, mode)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn mounts(dir: &TempDir) -> Mounts {
        let mounts = Mounts {
            workspace: dir.path().join("ws"),
            stage: dir.path().join("stage"),
            output: dir.path().join("out"),
        };
        for d in [&mounts.workspace, &mounts.stage, &mounts.output] {
            std::fs::create_dir_all(d).unwrap();
        }
        mounts
    }

    #[test]
    fn test_command_line_binds_mounts() {
        let dir = TempDir::new().unwrap();
        let m = mounts(&dir);
        let runtime = CliRuntime::new("podman", "archlinux:base-devel", Duration::from_secs(5));
        let line = runtime.command("true", &m).display();

        assert!(line.starts_with("podman run --rm"));
        assert!(line.contains(&format!("{}:/src:ro", m.workspace.display())));
        assert!(line.contains(&format!("{}:/stage:ro", m.stage.display())));
        assert!(line.contains(&format!("{}:/out ", m.output.display())));
        assert!(line.ends_with("archlinux:base-devel sh -c true"));
    }

    #[test]
    fn test_missing_runtime_is_not_found() {
        let dir = TempDir::new().unwrap();
        let runtime = CliRuntime::new("nonexistent-runtime-12345", "img", Duration::from_secs(5));
        let err = runtime.invoke("true", &mounts(&dir)).unwrap_err();
        assert!(matches!(err, InvokeError::NotFound(_)));
    }

    #[test]
    fn test_missing_mount_is_rejected_before_spawn() {
        let dir = TempDir::new().unwrap();
        let mut m = mounts(&dir);
        m.workspace = dir.path().join("absent");
        let runtime = CliRuntime::new("podman", "img", Duration::from_secs(5));
        let err = runtime.invoke("true", &m).unwrap_err();
        assert!(matches!(err, InvokeError::InvalidMount(_)));
    }
}
