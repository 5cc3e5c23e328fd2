//! Configuration management for distpack.
//!
//! Reads configuration from the workspace `.env` file and environment
//! variables. Environment variables take precedence over `.env`, and
//! command-line flags take precedence over both.

use anyhow::{bail, Context, Result};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::format::PackageFormat;

/// Project packaged when nothing else is configured.
pub const DEFAULT_PROJECT: &str = "winetricks";

/// Upper bound for one container invocation.
pub const DEFAULT_BUILD_TIMEOUT: Duration = Duration::from_secs(3600);

/// distpack configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Workspace root (the mounted, read-only source tree)
    pub workspace: PathBuf,
    /// Project name used for artifact patterns and the canonical name
    pub project_name: String,
    /// Package format to produce
    pub format: PackageFormat,
    /// Packaging manifest override (default depends on format)
    pub manifest: Option<PathBuf>,
    /// Project manifest the version is read from
    pub project_manifest: PathBuf,
    /// Release reference, e.g. `refs/tags/v1.2.3`
    pub release_ref: Option<String>,
    /// Dependency removed from the manifest before building
    pub strip_dependency: Option<String>,
    /// Clear source/checksum lists before building
    pub strip_source: bool,
    /// Container runtime tried first
    pub primary_runtime: String,
    /// Container runtime tried when the primary fails
    pub secondary_runtime: String,
    /// Container image override (default depends on format)
    pub image: Option<String>,
    /// Bound on each container invocation
    pub build_timeout: Duration,
    /// Directory the canonical artifact is published to
    pub output_dir: PathBuf,
    /// Binaries that must exist before packaging
    pub binaries: Vec<String>,
}

impl Config {
    /// Load configuration from `<workspace>/.env` and the environment.
    pub fn load(workspace: &Path) -> Result<Self> {
        let mut vars = HashMap::new();

        let env_path = workspace.join(".env");
        if env_path.exists() {
            let entries = dotenvy::from_path_iter(&env_path)
                .with_context(|| format!("Failed to read {}", env_path.display()))?;
            for entry in entries {
                let (key, value) =
                    entry.with_context(|| format!("Invalid line in {}", env_path.display()))?;
                vars.insert(key, value);
            }
        }

        for (key, value) in std::env::vars() {
            vars.insert(key, value);
        }

        Self::from_vars(workspace, &vars)
    }

    /// Build configuration from an explicit variable map.
    pub fn from_vars(workspace: &Path, vars: &HashMap<String, String>) -> Result<Self> {
        let get = |key: &str| {
            vars.get(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        let resolve = |value: String| {
            let path = PathBuf::from(value);
            if path.is_absolute() {
                path
            } else {
                workspace.join(path)
            }
        };

        let project_name = get("DISTPACK_PROJECT").unwrap_or_else(|| DEFAULT_PROJECT.to_string());

        let format = match get("DISTPACK_FORMAT") {
            Some(value) => value.parse()?,
            None => PackageFormat::Arch,
        };

        let build_timeout = match get("DISTPACK_BUILD_TIMEOUT") {
            Some(value) => {
                let secs: u64 = value.parse().with_context(|| {
                    format!("DISTPACK_BUILD_TIMEOUT must be seconds, got '{}'", value)
                })?;
                Duration::from_secs(secs)
            }
            None => DEFAULT_BUILD_TIMEOUT,
        };

        let strip_source = match get("DISTPACK_STRIP_SOURCE") {
            Some(value) => parse_bool(&value)?,
            None => false,
        };

        let binaries = get("DISTPACK_BINARIES")
            .map(|list| {
                list.split(',')
                    .map(str::trim)
                    .filter(|b| !b.is_empty())
                    .map(String::from)
                    .collect()
            })
            .unwrap_or_else(|| vec![project_name.clone()]);

        Ok(Self {
            workspace: workspace.to_path_buf(),
            format,
            manifest: get("DISTPACK_MANIFEST").map(resolve),
            project_manifest: get("DISTPACK_PROJECT_MANIFEST")
                .map(resolve)
                .unwrap_or_else(|| workspace.join("Cargo.toml")),
            release_ref: get("DISTPACK_RELEASE_REF").or_else(|| get("GITHUB_REF")),
            strip_dependency: get("DISTPACK_STRIP_DEPENDENCY"),
            strip_source,
            primary_runtime: get("DISTPACK_PRIMARY_RUNTIME")
                .unwrap_or_else(|| "podman".to_string()),
            secondary_runtime: get("DISTPACK_SECONDARY_RUNTIME")
                .unwrap_or_else(|| "docker".to_string()),
            image: get("DISTPACK_IMAGE"),
            build_timeout,
            output_dir: get("DISTPACK_OUTPUT_DIR")
                .map(resolve)
                .unwrap_or_else(|| workspace.to_path_buf()),
            binaries,
            project_name,
        })
    }

    /// Packaging manifest for the configured format.
    pub fn manifest_path(&self) -> PathBuf {
        self.manifest.clone().unwrap_or_else(|| {
            self.workspace
                .join(self.format.default_manifest(&self.project_name))
        })
    }

    /// Container image for the configured format.
    pub fn image(&self) -> String {
        self.image
            .clone()
            .unwrap_or_else(|| self.format.default_image().to_string())
    }

    /// Print configuration for debugging.
    pub fn print(&self) {
        println!("Configuration:");
        println!("  WORKSPACE: {}", self.workspace.display());
        println!("  DISTPACK_PROJECT: {}", self.project_name);
        println!("  DISTPACK_FORMAT: {}", self.format);
        println!("  DISTPACK_MANIFEST: {}", self.manifest_path().display());
        println!("  DISTPACK_PROJECT_MANIFEST: {}", self.project_manifest.display());
        println!(
            "  DISTPACK_RELEASE_REF: {}",
            self.release_ref.as_deref().unwrap_or("(none)")
        );
        println!(
            "  DISTPACK_STRIP_DEPENDENCY: {}",
            self.strip_dependency.as_deref().unwrap_or("(none)")
        );
        println!("  DISTPACK_STRIP_SOURCE: {}", self.strip_source);
        println!(
            "  Runtimes: {} -> {}",
            self.primary_runtime, self.secondary_runtime
        );
        println!("  DISTPACK_IMAGE: {}", self.image());
        println!("  DISTPACK_BUILD_TIMEOUT: {}s", self.build_timeout.as_secs());
        println!("  DISTPACK_OUTPUT_DIR: {}", self.output_dir.display());
        println!("  DISTPACK_BINARIES: {}", self.binaries.join(","));
    }
}

fn parse_bool(value: &str) -> Result<bool> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => bail!("Expected a boolean, got '{}'", other),
    }
}
