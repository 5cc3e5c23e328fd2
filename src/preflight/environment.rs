//! Workspace checks (manifests, output directory).

use std::fs;
use std::path::Path;

use crate::config::Config;
use crate::manifest::{ManifestDocument, ManifestFormat};

use super::types::CheckResult;

/// Check the manifests and output directory.
pub fn check_workspace(config: &Config) -> Vec<CheckResult> {
    let mut results = Vec::new();

    if config.workspace.is_dir() {
        results.push(CheckResult::pass_with(
            "workspace",
            &config.workspace.display().to_string(),
        ));
    } else {
        results.push(CheckResult::fail(
            "workspace",
            &format!("{} is not a directory", config.workspace.display()),
        ));
    }

    results.push(check_packaging_manifest(
        &config.manifest_path(),
        config.format.manifest_format(),
    ));

    // The version falls back to a default without it.
    if config.project_manifest.is_file() {
        results.push(CheckResult::pass_with(
            "project manifest",
            &config.project_manifest.display().to_string(),
        ));
    } else {
        results.push(CheckResult::warn(
            "project manifest",
            &format!(
                "{} not found; version will come from the release ref or the default",
                config.project_manifest.display()
            ),
        ));
    }

    results.push(check_writable(&config.output_dir));
    results
}

fn check_packaging_manifest(path: &Path, format: ManifestFormat) -> CheckResult {
    let name = "packaging manifest";
    match ManifestDocument::load_or(path, Some(format)) {
        Ok(doc) => match doc.version() {
            Some(version) => CheckResult::pass_with(
                name,
                &format!("{} ({}, version {})", path.display(), doc.format(), version),
            ),
            None => CheckResult::warn(
                name,
                &format!("{} has no version field to patch", path.display()),
            ),
        },
        Err(e) => CheckResult::fail(name, &format!("{:#}", e)),
    }
}

fn check_writable(dir: &Path) -> CheckResult {
    let name = "output directory writable";
    let Some(existing) = dir.ancestors().find(|p| p.is_dir()) else {
        return CheckResult::fail(name, &format!("No existing parent of {}", dir.display()));
    };
    let marker = existing.join(".distpack-preflight");
    match fs::write(&marker, "test") {
        Ok(()) => {
            let _ = fs::remove_file(&marker);
            if existing == dir {
                CheckResult::pass_with(name, &dir.display().to_string())
            } else {
                CheckResult::pass_with(
                    name,
                    &format!("{} (will be created under {})", dir.display(), existing.display()),
                )
            }
        }
        Err(e) => CheckResult::fail(
            name,
            &format!("Cannot write to {}: {}", existing.display(), e),
        ),
    }
}
