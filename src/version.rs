//! Package version resolution.
//!
//! A release tag (`refs/tags/v1.2.3`) wins, then the first
//! `version = "..."` line of the project manifest, then [`DEFAULT_VERSION`].
//! Resolution never fails and never returns an empty string.

use regex::Regex;
use serde::Serialize;
use std::fmt;
use std::fs;
use std::path::Path;
use std::sync::OnceLock;

/// Version used when neither the release reference nor the manifest yields one.
pub const DEFAULT_VERSION: &str = "0.1.0";

/// Where a resolved version came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum VersionSource {
    ReleaseTag,
    Manifest,
    Default,
}

impl fmt::Display for VersionSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VersionSource::ReleaseTag => write!(f, "release tag"),
            VersionSource::Manifest => write!(f, "project manifest"),
            VersionSource::Default => write!(f, "default"),
        }
    }
}

fn tag_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^refs/tags/v(.+)$").expect("valid tag regex"))
}

fn manifest_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"^\s*version\s*=\s*"([^"]*)""#).expect("valid version regex")
    })
}

/// Resolve the package version.
pub fn resolve(release_ref: Option<&str>, manifest_path: &Path) -> String {
    resolve_with_source(release_ref, manifest_path).0
}

/// Resolve the package version and report which input produced it.
pub fn resolve_with_source(
    release_ref: Option<&str>,
    manifest_path: &Path,
) -> (String, VersionSource) {
    if let Some(version) = release_ref.and_then(version_from_ref) {
        return (version, VersionSource::ReleaseTag);
    }

    let from_manifest = fs::read_to_string(manifest_path)
        .ok()
        .and_then(|content| version_from_manifest(&content));
    match from_manifest {
        Some(version) => (version, VersionSource::Manifest),
        None => (DEFAULT_VERSION.to_string(), VersionSource::Default),
    }
}

/// Captured suffix of a `refs/tags/v<version>` reference, verbatim.
pub fn version_from_ref(release_ref: &str) -> Option<String> {
    tag_pattern()
        .captures(release_ref)
        .map(|caps| caps[1].to_string())
}

/// Value of the first `version = "..."` line, whitespace-trimmed.
/// An empty value counts as a miss.
pub fn version_from_manifest(content: &str) -> Option<String> {
    let caps = content
        .lines()
        .find_map(|line| manifest_pattern().captures(line))?;
    let version = caps[1].trim();
    if version.is_empty() {
        None
    } else {
        Some(version.to_string())
    }
}
