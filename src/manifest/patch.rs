//! Applying a version bump and strip options to a manifest on disk.
//!
//! [`transform`] is pure. [`patch`] loads, transforms, writes the result once
//! to its commit point and reads it back to verify the version line. A failed
//! verification is a warning: packaging usually still works with the old
//! version.

use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

use super::{ManifestDocument, ManifestFormat};
use crate::common::write_file_with_dirs;

/// What to change besides the version.
#[derive(Debug, Clone, Default)]
pub struct PatchOptions {
    /// Dependency token to remove from the dependency lists.
    pub strip_dependency: Option<String>,
    /// Clear source and checksum lists (build output is already on disk).
    pub strip_source: bool,
    /// Compute and verify the result without writing it.
    pub dry_run: bool,
    /// Where to write the result. Defaults to the manifest itself.
    pub commit_to: Option<PathBuf>,
    /// Dialect for manifests whose file name does not reveal it.
    pub format: Option<ManifestFormat>,
}

/// Result of a patch.
#[derive(Debug, Clone)]
pub struct PatchOutcome {
    /// The version line was found after the patch.
    pub applied: bool,
    /// The patched document differs from the original.
    pub changed: bool,
    /// File the document was written to (None on dry run).
    pub written_to: Option<PathBuf>,
    /// Non-fatal problems, in the order they were found.
    pub warnings: Vec<String>,
    /// The patched document.
    pub document: ManifestDocument,
}

/// Apply the version and options to a document.
pub fn transform(
    doc: &ManifestDocument,
    version: &str,
    options: &PatchOptions,
) -> ManifestDocument {
    let mut patched = doc.with_version(version);
    if let Some(token) = options.strip_dependency.as_deref() {
        patched = patched.without_dependency(token);
    }
    if options.strip_source {
        patched = patched.without_sources();
    }
    patched
}

/// Patch the manifest at `manifest_path`.
///
/// Errors only when the manifest cannot be read or the result cannot be
/// written; a missing version line afterwards is reported in `warnings`.
pub fn patch(manifest_path: &Path, version: &str, options: &PatchOptions) -> Result<PatchOutcome> {
    let original = ManifestDocument::load_or(manifest_path, options.format)?;
    let document = transform(&original, version, options);
    let changed = document != original;
    let mut warnings = Vec::new();

    if let Some(token) = options.strip_dependency.as_deref() {
        if original.without_dependency(token) == original {
            warnings.push(format!(
                "dependency '{}' not found in {}",
                token,
                manifest_path.display()
            ));
        }
    }

    if options.dry_run {
        let applied = document.has_version(version);
        if !applied {
            warnings.push(missing_version_warning(manifest_path, version));
        }
        return Ok(PatchOutcome {
            applied,
            changed,
            written_to: None,
            warnings,
            document,
        });
    }

    let target = options
        .commit_to
        .clone()
        .unwrap_or_else(|| manifest_path.to_path_buf());
    if changed || target != manifest_path {
        write_file_with_dirs(&target, document.text())
            .with_context(|| format!("Failed to write patched manifest {}", target.display()))?;
    }

    let written = fs::read_to_string(&target)
        .with_context(|| format!("Failed to re-read patched manifest {}", target.display()))?;
    let applied = ManifestDocument::new(document.format(), written).has_version(version);
    if !applied {
        warnings.push(missing_version_warning(&target, version));
    }

    Ok(PatchOutcome {
        applied,
        changed,
        written_to: Some(target),
        warnings,
        document,
    })
}

fn missing_version_warning(path: &Path, version: &str) -> String {
    format!(
        "version {} not present in {} after patch; continuing with existing version",
        version,
        path.display()
    )
}
