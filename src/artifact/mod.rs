//! Built package discovery and publishing.
//!
//! Artifacts are never created here: [`locate`] finds what the container
//! build left behind and [`publish`] gives it its canonical name.

pub mod locate;
pub mod publish;

use serde::Serialize;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

pub use locate::{find, locate, SearchPlan};
pub use publish::{canonical_name, publish};

/// Kind of installable package.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ArtifactKind {
    ArchPackage,
    RpmPackage,
}

impl ArtifactKind {
    /// Classify a file name. Signatures and source RPMs are not artifacts.
    pub fn from_file_name(name: &str) -> Option<Self> {
        if name.contains(".pkg.tar.") && !name.ends_with(".sig") {
            Some(ArtifactKind::ArchPackage)
        } else if name.ends_with(".rpm") && !name.ends_with(".src.rpm") {
            Some(ArtifactKind::RpmPackage)
        } else {
            None
        }
    }
}

impl fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArtifactKind::ArchPackage => write!(f, "Arch package"),
            ArtifactKind::RpmPackage => write!(f, "RPM package"),
        }
    }
}

/// A package file produced by the build.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Artifact {
    pub path: PathBuf,
    pub kind: ArtifactKind,
    pub size_bytes: u64,
}

impl Artifact {
    /// Describe an existing package file. Returns None for files that are
    /// not packages or cannot be read.
    pub fn from_path(path: &Path) -> Option<Self> {
        let name = path.file_name()?.to_str()?;
        let kind = ArtifactKind::from_file_name(name)?;
        let size_bytes = fs::metadata(path).ok()?.len();
        Some(Self {
            path: path.to_path_buf(),
            kind,
            size_bytes,
        })
    }

    pub fn file_name(&self) -> Option<&str> {
        self.path.file_name()?.to_str()
    }

    /// Extension chain kept in the canonical name (`pkg.tar.zst`, `rpm`).
    pub fn extension_chain(&self) -> Option<&str> {
        let name = self.file_name()?;
        match self.kind {
            ArtifactKind::ArchPackage => name.find(".pkg.tar.").map(|i| &name[i + 1..]),
            ArtifactKind::RpmPackage => Some("rpm"),
        }
    }

    /// Size for log lines.
    pub fn size_display(&self) -> String {
        let size = self.size_bytes as f64;
        if size >= 1_048_576.0 {
            format!("{:.2} MB", size / 1_048_576.0)
        } else if size >= 1024.0 {
            format!("{:.1} KB", size / 1024.0)
        } else {
            format!("{} bytes", self.size_bytes)
        }
    }
}
