//! Shared test utilities for distpack tests.

#![allow(dead_code)]

use std::cell::RefCell;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

use distpack::build::script::{BUILD_DIR, PKG_DEST};
use distpack::config::Config;
use distpack::runtime::{ContainerRuntime, Invocation, InvokeError, Mounts, OUTPUT_MOUNT};

pub const SAMPLE_PKGBUILD: &str = "\
# Maintainer: Test <test@example.invalid>
pkgname=winetricks
pkgver=0.0.1
pkgrel=1
pkgdesc='Work around problems in Wine'
arch=('x86_64')
depends=('wine')
makedepends=('cargo')
source=(\"https://example.invalid/winetricks-$pkgver.tar.gz\")
sha256sums=('0123456789abcdef')

package() {
  install -Dm755 target/release/winetricks \"$pkgdir/usr/bin/winetricks\"
}
";

pub const SAMPLE_SPEC: &str = "\
Name:           winetricks
Version:        0.0.1
Release:        1%{?dist}
Summary:        Work around problems in Wine
License:        LGPLv2+
Source0:        https://example.invalid/winetricks-%{version}.tar.gz
BuildRequires:  cargo
Requires:       wine >= 8.0, cabextract

%description
Work around problems in Wine.

%files
/usr/bin/winetricks
";

pub const SAMPLE_CARGO_TOML: &str = "\
[package]
name = \"winetricks\"
version = \"2.3.1\"
edition = \"2021\"
";

/// Test environment with a temporary workspace.
pub struct TestEnv {
    /// Temporary directory (kept alive for lifetime of TestEnv)
    pub _temp_dir: TempDir,
    /// Workspace root
    pub workspace: PathBuf,
}

impl TestEnv {
    /// Workspace with a project manifest and an Arch manifest.
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let workspace = temp_dir.path().join("workspace");
        fs::create_dir_all(&workspace).expect("Failed to create workspace");
        fs::write(workspace.join("Cargo.toml"), SAMPLE_CARGO_TOML)
            .expect("Failed to write Cargo.toml");
        fs::write(workspace.join("PKGBUILD"), SAMPLE_PKGBUILD).expect("Failed to write PKGBUILD");

        Self {
            _temp_dir: temp_dir,
            workspace,
        }
    }

    /// Same workspace with an RPM spec next to the PKGBUILD.
    pub fn with_rpm_spec() -> Self {
        let env = Self::new();
        fs::write(env.workspace.join("winetricks.spec"), SAMPLE_SPEC)
            .expect("Failed to write spec");
        env
    }

    /// Configuration from explicit variables only (the process environment
    /// is ignored).
    pub fn config(&self, vars: &[(&str, &str)]) -> Config {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_vars(&self.workspace, &vars).expect("Failed to build config")
    }

    pub fn path(&self, rel: &str) -> PathBuf {
        self.workspace.join(rel)
    }
}

/// What a [`FakeRuntime`] does on one invocation.
#[derive(Debug, Clone)]
pub enum Reply {
    /// Exit with this code.
    Exit(i32),
    /// Drop a package into the output mount, then exit with this code.
    Produce {
        exit_code: i32,
        file_name: String,
        content: Vec<u8>,
    },
    /// Copy the workspace the way the container does, let the packaging
    /// tool write `file_name`, then run the script's own collect step on the
    /// host with container paths mapped to temp directories.
    Package {
        file_name: String,
        content: Vec<u8>,
    },
    /// Behave like a runtime that is not installed.
    Missing,
}

impl Reply {
    pub fn produce(file_name: &str, content: &[u8]) -> Self {
        Reply::Produce {
            exit_code: 0,
            file_name: file_name.to_string(),
            content: content.to_vec(),
        }
    }

    pub fn package(file_name: &str, content: &[u8]) -> Self {
        Reply::Package {
            file_name: file_name.to_string(),
            content: content.to_vec(),
        }
    }
}

/// One recorded invocation.
#[derive(Debug, Clone)]
pub struct Call {
    pub script: String,
    pub mounts: Mounts,
    /// Files in the stage mount at invocation time, by name.
    pub staged: HashMap<String, String>,
}

/// Container runtime replaying scripted replies. Runs out as exit 1.
pub struct FakeRuntime {
    id: String,
    replies: RefCell<Vec<Reply>>,
    calls: RefCell<Vec<Call>>,
}

impl FakeRuntime {
    pub fn new(id: &str, replies: Vec<Reply>) -> Self {
        let mut replies = replies;
        replies.reverse();
        Self {
            id: id.to_string(),
            replies: RefCell::new(replies),
            calls: RefCell::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.borrow().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.borrow().len()
    }
}

impl ContainerRuntime for FakeRuntime {
    fn id(&self) -> &str {
        &self.id
    }

    fn invoke(&self, script: &str, mounts: &Mounts) -> Result<Invocation, InvokeError> {
        self.calls.borrow_mut().push(Call {
            script: script.to_string(),
            mounts: mounts.clone(),
            staged: read_dir_files(&mounts.stage),
        });

        let reply = self.replies.borrow_mut().pop().unwrap_or(Reply::Exit(1));
        match reply {
            Reply::Exit(exit_code) => Ok(Invocation {
                exit_code,
                logs: format!("{}: exit {}", self.id, exit_code),
            }),
            Reply::Produce {
                exit_code,
                file_name,
                content,
            } => {
                fs::write(mounts.output.join(&file_name), content)
                    .map_err(|e| InvokeError::Io(e.to_string()))?;
                Ok(Invocation {
                    exit_code,
                    logs: format!("{}: produced {}", self.id, file_name),
                })
            }
            Reply::Package { file_name, content } => {
                run_collect_step(script, mounts, &file_name, &content)
                    .map_err(|e| InvokeError::Io(e.to_string()))
            }
            Reply::Missing => Err(InvokeError::NotFound(self.id.clone())),
        }
    }
}

/// Lines after the "collecting packages" marker of a composed script.
pub fn collect_step(script: &str) -> String {
    script
        .lines()
        .skip_while(|line| !line.contains("collecting packages"))
        .skip(1)
        .collect::<Vec<_>>()
        .join("\n")
}

fn run_collect_step(
    script: &str,
    mounts: &Mounts,
    file_name: &str,
    content: &[u8],
) -> std::io::Result<Invocation> {
    let scratch = TempDir::new()?;
    let build = scratch.path().join("build");
    let dest = scratch.path().join("pkgdest");

    let copied = Command::new("cp")
        .arg("-a")
        .arg(&mounts.workspace)
        .arg(&build)
        .status()?;
    assert!(copied.success(), "copying the workspace failed");
    fs::create_dir_all(&dest)?;
    fs::write(dest.join(file_name), content)?;

    let collect = collect_step(script)
        .replace(PKG_DEST, &dest.to_string_lossy())
        .replace(BUILD_DIR, &build.to_string_lossy())
        .replace(OUTPUT_MOUNT, &mounts.output.to_string_lossy());
    let output = Command::new("sh").arg("-c").arg(&collect).output()?;
    Ok(Invocation {
        exit_code: output.status.code().unwrap_or(-1),
        logs: format!(
            "{}{}",
            String::from_utf8_lossy(&output.stdout),
            String::from_utf8_lossy(&output.stderr)
        ),
    })
}

fn read_dir_files(dir: &Path) -> HashMap<String, String> {
    let mut files = HashMap::new();
    if let Ok(entries) = fs::read_dir(dir) {
        for entry in entries.flatten() {
            if let Ok(content) = fs::read_to_string(entry.path()) {
                files.insert(entry.file_name().to_string_lossy().into_owned(), content);
            }
        }
    }
    files
}

/// Assert that a file exists.
pub fn assert_file_exists(path: &Path) {
    assert!(path.exists(), "File should exist: {}", path.display());
}

/// Assert that a file contains the given text.
pub fn assert_file_contains(path: &Path, needle: &str) {
    let content = fs::read_to_string(path)
        .unwrap_or_else(|e| panic!("Failed to read {}: {}", path.display(), e));
    assert!(
        content.contains(needle),
        "{} should contain {:?}, got:\n{}",
        path.display(),
        needle,
        content
    );
}
