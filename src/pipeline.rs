//! The packaging pipeline.
//!
//! version -> manifest patch -> container build -> locate -> publish.
//!
//! Only two conditions fail a run: every build strategy failed, or the
//! build claimed success and no package can be found. Everything else
//! (unknown version, unpatchable manifest, failed rename) is recorded in
//! the diagnostics and the run continues.

use anyhow::Result;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};

use crate::artifact::{self, locate::list_tree, SearchPlan};
use crate::build::{AttemptRecord, BuildSpec, ContainerBuildRunner};
use crate::common::{prepare_work_dir, write_file_with_dirs};
use crate::config::Config;
use crate::format::PackageFormat;
use crate::manifest::{self, PatchOptions};
use crate::runtime::ContainerRuntime;
use crate::timing::Timer;
use crate::version::{self, VersionSource};

/// Per-run scratch directory, created under the output directory.
pub const WORK_DIR: &str = ".distpack";
/// Holds the patched manifest; mounted read-only into the container.
pub const STAGE_DIR: &str = "stage";
/// Receives the packages; mounted writable into the container.
pub const BUILD_OUTPUT_DIR: &str = "out";
pub const REPORT_FILE: &str = "build-report.json";
/// Container output of the last attempt that ran.
pub const BUILD_LOG_FILE: &str = "build.log";

/// Depth and size of the directory listing attached to a failed run.
const LISTING_DEPTH: usize = 3;
const LISTING_ENTRIES: usize = 200;

/// Knobs that do not come from [`Config`].
#[derive(Debug, Clone, Default)]
pub struct PipelineOptions {
    /// Write the patched manifest over the workspace copy instead of staging it.
    pub in_place: bool,
}

/// Terminal value of a run.
#[derive(Debug, Clone, Serialize)]
pub struct PipelineResult {
    pub succeeded: bool,
    pub final_artifact: Option<PathBuf>,
    pub diagnostics: Vec<String>,
    pub project: String,
    pub format: PackageFormat,
    pub version: String,
    pub version_source: VersionSource,
    pub attempts: Vec<AttemptRecord>,
}

impl PipelineResult {
    /// Exit code for the process.
    pub fn exit_code(&self) -> i32 {
        if self.succeeded {
            0
        } else {
            1
        }
    }
}

/// Directory layout of one run.
#[derive(Debug, Clone)]
pub struct WorkDirs {
    pub root: PathBuf,
    pub stage: PathBuf,
    pub output: PathBuf,
}

impl WorkDirs {
    pub fn under(output_dir: &Path) -> Self {
        let root = output_dir.join(WORK_DIR);
        Self {
            stage: root.join(STAGE_DIR),
            output: root.join(BUILD_OUTPUT_DIR),
            root,
        }
    }

    /// Recreate the scratch tree so no earlier run leaks into this one.
    pub fn prepare(&self) -> Result<()> {
        let parent = self.root.parent().unwrap_or_else(|| Path::new("."));
        prepare_work_dir(parent, WORK_DIR)?;
        prepare_work_dir(&self.root, STAGE_DIR)?;
        prepare_work_dir(&self.root, BUILD_OUTPUT_DIR)?;
        Ok(())
    }

    pub fn report(&self) -> PathBuf {
        self.root.join(REPORT_FILE)
    }
}

/// Search plan used after a build: the container output first, then the
/// output directory, then the whole workspace. Packages published by earlier
/// runs are not candidates.
pub fn search_plan(config: &Config, dirs: &WorkDirs) -> SearchPlan {
    let mut roots = vec![dirs.output.clone()];
    if config.output_dir != config.workspace {
        roots.push(config.output_dir.clone());
    }
    SearchPlan::for_project(&config.project_name, config.format, roots, &config.workspace)
        .skipping_published(&config.project_name)
}

/// Run every stage. `Err` means the host could not be prepared at all;
/// build and discovery failures are reported through the result.
pub fn run(
    config: &Config,
    options: &PipelineOptions,
    primary: &dyn ContainerRuntime,
    secondary: &dyn ContainerRuntime,
) -> Result<PipelineResult> {
    let dirs = WorkDirs::under(&config.output_dir);
    dirs.prepare()?;
    let mut diagnostics = Vec::new();

    // Version
    let timer = Timer::start("version");
    let (version, version_source) =
        version::resolve_with_source(config.release_ref.as_deref(), &config.project_manifest);
    info!("Version {} (from {})", version, version_source);
    if version_source == VersionSource::Default {
        diagnostics.push(format!(
            "no release tag or manifest version found; using default {}",
            version
        ));
    }
    timer.finish();

    let spec = BuildSpec {
        version: version.clone(),
        project_name: config.project_name.clone(),
        strip_dependency: config.strip_dependency.clone(),
        strip_source: config.strip_source,
        format: config.format,
    };

    // Manifest
    let timer = Timer::start("patch");
    let manifest_path = config.manifest_path();
    diagnostics.extend(patch_stage(&spec, &manifest_path, &dirs, options));
    timer.finish();

    // Build
    let timer = Timer::start("build");
    let runner = ContainerBuildRunner::new(&manifest_path, &dirs.stage, &dirs.output)
        .with_binaries(config.binaries.clone());
    let outcome = runner.run(&spec, &config.workspace, primary, secondary);
    timer.finish();
    diagnostics.extend(outcome.attempts.iter().map(AttemptRecord::summary));
    let log_path = dirs.root.join(BUILD_LOG_FILE);
    if let Err(e) = write_file_with_dirs(&log_path, &outcome.logs) {
        warn!("Failed to write build log: {:#}", e);
    }

    let mut result = PipelineResult {
        succeeded: false,
        final_artifact: None,
        diagnostics,
        project: spec.project_name.clone(),
        format: spec.format,
        version,
        version_source,
        attempts: outcome.attempts.clone(),
    };

    if !outcome.succeeded {
        error!("Build failed; no strategy produced a package");
        result
            .diagnostics
            .push("build failed: every build strategy was exhausted".to_string());
        if let Some(last) = outcome.attempts.iter().rev().find(|a| !a.log_tail.is_empty()) {
            result
                .diagnostics
                .push(format!("last output of attempt {}:", last.index));
            result
                .diagnostics
                .extend(last.log_tail.iter().map(|l| format!("  {}", l)));
        }
        result
            .diagnostics
            .extend(failure_listing(&search_plan(config, &dirs)));
        write_report(&dirs, &result);
        return Ok(result);
    }

    // Locate
    let timer = Timer::start("locate");
    let plan = search_plan(config, &dirs);
    let located = artifact::locate(&plan);
    timer.finish();

    let Some(found) = located else {
        error!("Build reported success but no package was found");
        result
            .diagnostics
            .push("no artifact found after a successful build".to_string());
        result.diagnostics.extend(failure_listing(&plan));
        write_report(&dirs, &result);
        return Ok(result);
    };
    info!("Found {} ({})", found.path.display(), found.kind);

    // Publish
    let timer = Timer::start("publish");
    let published = artifact::publish(
        &found,
        &config.output_dir,
        &spec.project_name,
        &spec.version,
    );
    timer.finish();
    if published == found.path {
        if let Some(name) = artifact::canonical_name(&found, &spec.project_name, &spec.version) {
            if found.file_name() != Some(name.as_str()) {
                result.diagnostics.push(format!(
                    "could not publish as {}; artifact left at {}",
                    name,
                    found.path.display()
                ));
            }
        }
    }

    let size = artifact::Artifact::from_path(&published)
        .map(|a| a.size_display())
        .unwrap_or_else(|| "unknown size".to_string());
    info!("Artifact: {} ({})", published.display(), size);

    result.succeeded = true;
    result.final_artifact = Some(published);
    write_report(&dirs, &result);
    Ok(result)
}

/// Patch the manifest into the staging directory (or in place). Never fails
/// the run; problems come back as diagnostics.
fn patch_stage(
    spec: &BuildSpec,
    manifest_path: &Path,
    dirs: &WorkDirs,
    options: &PipelineOptions,
) -> Vec<String> {
    let commit_to = if options.in_place {
        None
    } else {
        manifest_path.file_name().map(|name| dirs.stage.join(name))
    };
    let patch_options = PatchOptions {
        strip_dependency: spec.strip_dependency.clone(),
        strip_source: spec.strip_source,
        dry_run: false,
        commit_to,
        format: Some(spec.format.manifest_format()),
    };

    match manifest::patch(manifest_path, &spec.version, &patch_options) {
        Ok(outcome) => {
            for warning in &outcome.warnings {
                warn!("{}", warning);
            }
            if let Some(path) = &outcome.written_to {
                info!(
                    "Patched manifest written to {} (changed: {})",
                    path.display(),
                    outcome.changed
                );
            }
            outcome.warnings
        }
        Err(e) => {
            warn!("Manifest patch skipped: {:#}", e);
            vec![format!("manifest patch skipped: {:#}", e)]
        }
    }
}

/// Search attempts plus a bounded listing of each place that was searched.
fn failure_listing(plan: &SearchPlan) -> Vec<String> {
    let mut lines = vec!["searched (in order):".to_string()];
    lines.extend(plan.describe().into_iter().map(|a| format!("  {}", a)));

    let listed = plan.roots.iter().chain(plan.fallback_root.iter());
    for root in listed {
        if !root.is_dir() {
            lines.push(format!("{}: does not exist", root.display()));
            continue;
        }
        lines.push(format!("contents of {}:", root.display()));
        lines.extend(
            list_tree(root, LISTING_DEPTH, LISTING_ENTRIES)
                .into_iter()
                .map(|l| format!("  {}", l)),
        );
    }
    lines
}

fn write_report(dirs: &WorkDirs, result: &PipelineResult) {
    let path = dirs.report();
    let written = serde_json::to_string_pretty(result)
        .map_err(anyhow::Error::from)
        .and_then(|json| write_file_with_dirs(&path, json));
    match written {
        Ok(()) => info!("Build report: {}", path.display()),
        Err(e) => warn!("Failed to write build report {}: {:#}", path.display(), e),
    }
}
