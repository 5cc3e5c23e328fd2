//! Canonical naming of the located package.

use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use super::Artifact;

/// `<project>-<version>.<extension chain>` for an artifact.
pub fn canonical_name(artifact: &Artifact, project: &str, version: &str) -> Option<String> {
    let ext = artifact.extension_chain()?;
    Some(format!("{}-{}.{}", project, version, ext))
}

/// Copy the artifact into `output_dir` under its canonical name, or rename
/// it in place when it already lives there.
///
/// Never fails: if the copy or rename goes wrong the artifact is still
/// usable where it is, so its original path is returned instead.
pub fn publish(artifact: &Artifact, output_dir: &Path, project: &str, version: &str) -> PathBuf {
    let Some(name) = canonical_name(artifact, project, version) else {
        warn!(
            "Cannot derive a canonical name for {}; leaving it in place",
            artifact.path.display()
        );
        return artifact.path.clone();
    };
    let canonical = output_dir.join(name);

    match copy_and_rename(artifact, output_dir, &canonical) {
        Ok(()) => {
            info!("Published {}", canonical.display());
            canonical
        }
        Err(e) => {
            warn!(
                "Failed to publish artifact ({:#}); it remains at {}",
                e,
                artifact.path.display()
            );
            artifact.path.clone()
        }
    }
}

fn copy_and_rename(artifact: &Artifact, output_dir: &Path, canonical: &Path) -> Result<()> {
    if same_file(&artifact.path, canonical) {
        return Ok(());
    }
    fs::create_dir_all(output_dir)
        .with_context(|| format!("Failed to create {}", output_dir.display()))?;

    if in_dir(&artifact.path, output_dir) {
        return fs::rename(&artifact.path, canonical).with_context(|| {
            format!(
                "Failed to rename {} to {}",
                artifact.path.display(),
                canonical.display()
            )
        });
    }

    // Copy under a hidden name, then rename into place.
    let partial = partial_path(canonical)?;
    fs::copy(&artifact.path, &partial).with_context(|| {
        format!(
            "Failed to copy {} to {}",
            artifact.path.display(),
            partial.display()
        )
    })?;
    if let Err(e) = fs::rename(&partial, canonical) {
        let _ = fs::remove_file(&partial);
        return Err(e).with_context(|| {
            format!("Failed to rename {} to {}", partial.display(), canonical.display())
        });
    }
    Ok(())
}

fn partial_path(canonical: &Path) -> Result<PathBuf> {
    let name = canonical
        .file_name()
        .context("Canonical path has no file name")?;
    Ok(canonical.with_file_name(format!(".{}.partial", name.to_string_lossy())))
}

fn in_dir(path: &Path, dir: &Path) -> bool {
    match (path.parent(), fs::canonicalize(dir)) {
        (Some(parent), Ok(dir)) => fs::canonicalize(parent).map_or(false, |p| p == dir),
        _ => false,
    }
}

fn same_file(a: &Path, b: &Path) -> bool {
    match (fs::canonicalize(a), fs::canonicalize(b)) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}
