//! Removal of build outputs.

use anyhow::{Context, Result};
use globset::{Glob, GlobSet, GlobSetBuilder};
use std::fs;
use std::path::{Path, PathBuf};

use crate::config::Config;
use crate::format::PackageFormat;
use crate::pipeline::WORK_DIR;

/// Globs matching canonical artifacts of `project` in any format.
fn canonical_globs(project: &str) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for format in [PackageFormat::Arch, PackageFormat::Rpm] {
        let pattern = format!("{}-[0-9]*.{}", project, format.extension());
        builder.add(Glob::new(&pattern).with_context(|| format!("Invalid glob {}", pattern))?);
    }
    Ok(builder.build()?)
}

/// Canonical artifacts directly inside `output_dir`.
pub fn canonical_artifacts(output_dir: &Path, project: &str) -> Result<Vec<PathBuf>> {
    if !output_dir.is_dir() {
        return Ok(Vec::new());
    }
    let globs = canonical_globs(project)?;
    let mut found = Vec::new();
    for entry in fs::read_dir(output_dir)
        .with_context(|| format!("Failed to read {}", output_dir.display()))?
    {
        let entry = entry?;
        if entry.file_type()?.is_file() && globs.is_match(entry.file_name()) {
            found.push(entry.path());
        }
    }
    found.sort();
    Ok(found)
}

/// Remove the per-run scratch directory and published artifacts.
/// Returns what was removed.
pub fn clean_outputs(config: &Config) -> Result<Vec<PathBuf>> {
    let mut removed = Vec::new();

    let work_dir = config.output_dir.join(WORK_DIR);
    if work_dir.exists() {
        println!("Removing {}...", work_dir.display());
        fs::remove_dir_all(&work_dir)
            .with_context(|| format!("Failed to remove {}", work_dir.display()))?;
        removed.push(work_dir);
    }

    for artifact in canonical_artifacts(&config.output_dir, &config.project_name)? {
        println!("Removing {}...", artifact.display());
        fs::remove_file(&artifact)
            .with_context(|| format!("Failed to remove {}", artifact.display()))?;
        removed.push(artifact);
    }

    if removed.is_empty() {
        println!("Nothing to clean.");
    } else {
        println!("Clean complete.");
    }
    Ok(removed)
}
