//! Shell scripts run inside the build container.
//!
//! A script prepares the container (toolchain, build user, writable copy of
//! the read-only workspace, staged manifest, missing binaries), runs the
//! packaging tool and copies the packages to the output mount. Each failing
//! step exits with its own code so a failed attempt can be explained.

use std::path::{Path, PathBuf};

use super::strategy::InvocationMode;
use crate::format::PackageFormat;
use crate::runtime::{OUTPUT_MOUNT, STAGE_MOUNT, WORKSPACE_MOUNT};

/// Writable copy of the workspace inside the container.
pub const BUILD_DIR: &str = "/build";
/// Unprivileged account the packaging tool runs as.
pub const BUILD_USER: &str = "builder";
/// Fresh directory the packaging tool writes packages to. Only this
/// directory is collected into the output mount.
pub const PKG_DEST: &str = "/pkgdest";

pub const EXIT_SETUP_FAILED: i32 = 3;
pub const EXIT_BINARIES_MISSING: i32 = 4;
pub const EXIT_PACKAGING_FAILED: i32 = 5;

/// Explain an exit code of a composed script.
pub fn describe_exit(code: i32) -> String {
    match code {
        EXIT_SETUP_FAILED => format!("exit code {}: container setup failed", code),
        EXIT_BINARIES_MISSING => {
            format!("exit code {}: expected binaries missing after build", code)
        }
        EXIT_PACKAGING_FAILED => format!("exit code {}: packaging tool failed", code),
        -1 => "terminated by signal".to_string(),
        other => format!("exit code {}", other),
    }
}

/// Everything needed to compose a build script.
#[derive(Debug, Clone)]
pub struct ScriptPlan {
    pub format: PackageFormat,
    /// Manifest path relative to the workspace root.
    pub manifest: PathBuf,
    /// Binaries expected under `target/release` before packaging.
    pub binaries: Vec<String>,
}

impl ScriptPlan {
    /// Plan for `manifest`, made relative to `workspace` when it lives there.
    pub fn new(
        format: PackageFormat,
        workspace: &Path,
        manifest: &Path,
        binaries: Vec<String>,
    ) -> Self {
        let manifest = manifest
            .strip_prefix(workspace)
            .map(Path::to_path_buf)
            .unwrap_or_else(|_| {
                manifest
                    .file_name()
                    .map(PathBuf::from)
                    .unwrap_or_else(|| PathBuf::from(format.default_manifest("package")))
            });
        Self {
            format,
            manifest,
            binaries,
        }
    }

    fn manifest_name(&self) -> String {
        self.manifest
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    fn manifest_in_build(&self) -> String {
        format!("{}/{}", BUILD_DIR, self.manifest.display())
    }

    fn manifest_dir_in_build(&self) -> String {
        match self.manifest.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => {
                format!("{}/{}", BUILD_DIR, parent.display())
            }
            _ => BUILD_DIR.to_string(),
        }
    }

    /// Compose the script for one invocation mode.
    pub fn compose(&self, mode: InvocationMode) -> String {
        let mut lines = Vec::new();
        lines.extend(self.toolchain_lines());
        lines.extend(self.workspace_lines());
        lines.extend(self.binary_lines());
        lines.extend(self.package_lines(mode));
        lines.join("\n") + "\n"
    }

    fn toolchain_lines(&self) -> Vec<String> {
        let install = match self.format {
            PackageFormat::Arch => "pacman -Sy --noconfirm --needed base-devel rust git sudo",
            PackageFormat::Rpm => "dnf install -y rpm-build rust cargo gcc",
        };
        vec![
            step("installing toolchain"),
            format!(
                "{} >/dev/null 2>&1 || {}",
                install,
                step("toolchain install failed, continuing with what is present")
            ),
            step("creating build user"),
            format!(
                "id {user} >/dev/null 2>&1 || useradd -m {user} || exit {code}",
                user = BUILD_USER,
                code = EXIT_SETUP_FAILED
            ),
            format!(
                "mkdir -p /etc/sudoers.d && echo '{} ALL=(ALL) NOPASSWD: ALL' > /etc/sudoers.d/{} || true",
                BUILD_USER, BUILD_USER
            ),
        ]
    }

    fn workspace_lines(&self) -> Vec<String> {
        let staged = format!("{}/{}", STAGE_MOUNT, self.manifest_name());
        vec![
            step("copying workspace"),
            format!(
                "rm -rf {build} && cp -a {src} {build} || exit {code}",
                build = BUILD_DIR,
                src = WORKSPACE_MOUNT,
                code = EXIT_SETUP_FAILED
            ),
            format!(
                "if [ -f {staged} ]; then cp {staged} {target} || exit {code}; fi",
                staged = quote(&staged),
                target = quote(&self.manifest_in_build()),
                code = EXIT_SETUP_FAILED
            ),
            format!(
                "chown -R {} {} || exit {}",
                BUILD_USER, BUILD_DIR, EXIT_SETUP_FAILED
            ),
            format!(
                "rm -rf {dest} && mkdir -p {dest} && chown {user} {dest} || exit {code}",
                dest = PKG_DEST,
                user = BUILD_USER,
                code = EXIT_SETUP_FAILED
            ),
        ]
    }

    fn binary_lines(&self) -> Vec<String> {
        if self.binaries.is_empty() {
            return Vec::new();
        }
        let names = self
            .binaries
            .iter()
            .map(|b| quote(b))
            .collect::<Vec<_>>()
            .join(" ");
        let cargo = as_builder(&format!("cd {} && cargo build --release", BUILD_DIR));
        vec![
            step("checking binaries"),
            "missing=0".to_string(),
            format!(
                "for bin in {names}; do [ -x \"{build}/target/release/$bin\" ] || missing=1; done",
                names = names,
                build = BUILD_DIR
            ),
            format!(
                "if [ \"$missing\" = 1 ]; then {}; {} || exit {}; fi",
                step("building missing binaries"),
                cargo,
                EXIT_BINARIES_MISSING
            ),
            format!(
                "for bin in {names}; do [ -x \"{build}/target/release/$bin\" ] || {{ echo \"missing binary: $bin\"; exit {code}; }}; done",
                names = names,
                build = BUILD_DIR,
                code = EXIT_BINARIES_MISSING
            ),
        ]
    }

    fn package_lines(&self, mode: InvocationMode) -> Vec<String> {
        let (build, collect) = match self.format {
            PackageFormat::Arch => {
                let flags = match mode {
                    InvocationMode::Strict => "-s --noconfirm",
                    InvocationMode::Relaxed => "-d --skipinteg --ignorearch --noconfirm",
                };
                (
                    format!(
                        "cd {} && PKGDEST={} makepkg -f {}",
                        self.manifest_dir_in_build(),
                        PKG_DEST,
                        flags
                    ),
                    format!(
                        "find {} -name '*.{}' -exec cp {{}} {}/ \\;",
                        PKG_DEST,
                        self.format.extension(),
                        OUTPUT_MOUNT
                    ),
                )
            }
            PackageFormat::Rpm => {
                let flags = match mode {
                    InvocationMode::Strict => "-bb",
                    InvocationMode::Relaxed => "-bb --nodeps --nocheck",
                };
                (
                    format!(
                        "cd {build} && rpmbuild {flags} --define '_topdir {dest}/rpmbuild' --define '_sourcedir {build}' {manifest}",
                        build = BUILD_DIR,
                        dest = PKG_DEST,
                        flags = flags,
                        manifest = self.manifest_in_build()
                    ),
                    format!(
                        "find {}/rpmbuild/RPMS -name '*.rpm' -exec cp {{}} {}/ \\;",
                        PKG_DEST, OUTPUT_MOUNT
                    ),
                )
            }
        };
        vec![
            step(&format!("packaging ({})", mode)),
            format!("{} || exit {}", as_builder(&build), EXIT_PACKAGING_FAILED),
            step("collecting packages"),
            collect,
        ]
    }
}

fn step(message: &str) -> String {
    format!("echo {}", quote(&format!("==> distpack: {}", message)))
}

fn as_builder(command: &str) -> String {
    format!("su {} -c {}", BUILD_USER, quote(command))
}

/// Single-quote a string for POSIX sh.
pub fn quote(s: &str) -> String {
    format!("'{}'", s.replace('\'', r"'\''"))
}
