//! Output package formats.

use anyhow::{bail, Result};
use serde::Serialize;
use std::fmt;
use std::str::FromStr;

use crate::manifest::ManifestFormat;

/// Distribution package format to produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum PackageFormat {
    /// Arch Linux package built with makepkg
    Arch,
    /// RPM package built with rpmbuild
    Rpm,
}

impl PackageFormat {
    /// Extension chain of produced packages, without the leading dot.
    pub fn extension(&self) -> &'static str {
        match self {
            PackageFormat::Arch => "pkg.tar.zst",
            PackageFormat::Rpm => "rpm",
        }
    }

    /// Manifest file name used when none is configured.
    pub fn default_manifest(&self, project: &str) -> String {
        match self {
            PackageFormat::Arch => "PKGBUILD".to_string(),
            PackageFormat::Rpm => format!("{}.spec", project),
        }
    }

    /// Container image used when none is configured.
    pub fn default_image(&self) -> &'static str {
        match self {
            PackageFormat::Arch => "docker.io/library/archlinux:base-devel",
            PackageFormat::Rpm => "registry.fedoraproject.org/fedora:latest",
        }
    }

    pub fn manifest_format(&self) -> ManifestFormat {
        match self {
            PackageFormat::Arch => ManifestFormat::Arch,
            PackageFormat::Rpm => ManifestFormat::Rpm,
        }
    }
}

impl fmt::Display for PackageFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PackageFormat::Arch => write!(f, "arch"),
            PackageFormat::Rpm => write!(f, "rpm"),
        }
    }
}

impl FromStr for PackageFormat {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "arch" | "pacman" | "pkgbuild" => Ok(PackageFormat::Arch),
            "rpm" | "fedora" => Ok(PackageFormat::Rpm),
            other => bail!("Unknown package format '{}' (expected 'arch' or 'rpm')", other),
        }
    }
}
