//! Container build with runtime and strictness fallback.
//!
//! The runner walks a chain of [`Strategy`] values (by default primary
//! strict, primary relaxed, secondary strict, secondary relaxed). Each
//! attempt runs a composed script in one runtime; the first attempt that
//! exits 0 ends the chain. The workspace is mounted read-only and the
//! script builds from a writable copy, so attempts never see each other's
//! leftovers in the source tree.
//!
//! # Modules
//!
//! - `script`: shell script composition per package format and mode
//! - `strategy`: strategies, attempt results and the fallback policy

pub mod script;
pub mod strategy;

use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{error, info, warn};

use crate::format::PackageFormat;
use crate::runtime::{ContainerRuntime, Mounts};

pub use script::ScriptPlan;
pub use strategy::{
    AttemptRecord, AttemptResult, AttemptStatus, FallbackPolicy, InvocationMode, RuntimeSlot,
    Strategy,
};

/// Inputs of one pipeline run. Built once, never changed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildSpec {
    pub version: String,
    pub project_name: String,
    pub strip_dependency: Option<String>,
    pub strip_source: bool,
    pub format: PackageFormat,
}

/// Result of walking the strategy chain.
#[derive(Debug, Clone)]
pub struct BuildOutcome {
    pub succeeded: bool,
    /// Output of the successful attempt, or of the last one that ran.
    pub logs: String,
    pub attempts: Vec<AttemptRecord>,
}

impl BuildOutcome {
    pub fn failed_attempts(&self) -> impl Iterator<Item = &AttemptRecord> {
        self.attempts.iter().filter(|a| a.failed())
    }
}

/// Runs the packaging build in containers.
#[derive(Debug, Clone)]
pub struct ContainerBuildRunner {
    manifest: PathBuf,
    stage_dir: PathBuf,
    output_dir: PathBuf,
    binaries: Vec<String>,
    chain: Vec<Strategy>,
    policy: FallbackPolicy,
}

impl ContainerBuildRunner {
    /// Runner for the manifest at `manifest` (host path). The patched copy
    /// is expected in `stage_dir`; packages are collected into `output_dir`.
    pub fn new(
        manifest: impl Into<PathBuf>,
        stage_dir: impl Into<PathBuf>,
        output_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            manifest: manifest.into(),
            stage_dir: stage_dir.into(),
            output_dir: output_dir.into(),
            binaries: Vec::new(),
            chain: Strategy::default_chain(),
            policy: FallbackPolicy::default(),
        }
    }

    /// Binaries that must exist under `target/release` before packaging.
    pub fn with_binaries(mut self, binaries: Vec<String>) -> Self {
        self.binaries = binaries;
        self
    }

    pub fn with_chain(mut self, chain: Vec<Strategy>) -> Self {
        self.chain = chain;
        self
    }

    pub fn with_policy(mut self, policy: FallbackPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Walk the chain until an attempt succeeds, a fatal error occurs, or
    /// the chain is exhausted.
    pub fn run(
        &self,
        spec: &BuildSpec,
        workspace: &Path,
        primary: &dyn ContainerRuntime,
        secondary: &dyn ContainerRuntime,
    ) -> BuildOutcome {
        let plan = ScriptPlan::new(spec.format, workspace, &self.manifest, self.binaries.clone());
        let mounts = Mounts {
            workspace: workspace.to_path_buf(),
            stage: self.stage_dir.clone(),
            output: self.output_dir.clone(),
        };
        info!(
            "Building {} {} as {} package ({} strategies)",
            spec.project_name,
            spec.version,
            spec.format,
            self.chain.len()
        );

        let total = self.chain.len();
        let mut attempts = Vec::with_capacity(total);
        let mut unavailable: Vec<RuntimeSlot> = Vec::new();
        let mut last_logs = String::new();

        for (i, strategy) in self.chain.iter().enumerate() {
            let runtime = match strategy.slot {
                RuntimeSlot::Primary => primary,
                RuntimeSlot::Secondary => secondary,
            };
            let mut record = AttemptRecord {
                index: i + 1,
                total,
                strategy: *strategy,
                runtime: runtime.id().to_string(),
                status: AttemptStatus::Skipped,
                reason: None,
                duration_ms: 0,
                log_tail: Vec::new(),
            };

            if unavailable.contains(&strategy.slot) {
                record.reason = Some(format!("{} is unavailable", runtime.id()));
                info!("{}", record.summary());
                attempts.push(record);
                continue;
            }

            info!(
                attempt = i + 1,
                total,
                runtime = runtime.id(),
                mode = %strategy.mode,
                "Starting build attempt"
            );
            let start = Instant::now();
            let result = AttemptResult::from_invocation(
                runtime.invoke(&plan.compose(strategy.mode), &mounts),
            );
            record.duration_ms = start.elapsed().as_millis() as u64;
            record.status = result.status();

            match result {
                AttemptResult::Succeeded { logs } => {
                    info!("{}", record.summary());
                    attempts.push(record);
                    return BuildOutcome {
                        succeeded: true,
                        logs,
                        attempts,
                    };
                }
                AttemptResult::Recoverable { reason, logs } => {
                    record.reason = Some(reason);
                    record.log_tail = strategy::log_tail(&logs);
                    warn!("{}", record.summary());
                    last_logs = logs;
                }
                AttemptResult::Unavailable { reason } => {
                    record.reason = Some(reason);
                    warn!("{}", record.summary());
                    if self.policy.skip_unavailable_runtime {
                        unavailable.push(strategy.slot);
                    }
                }
                AttemptResult::Fatal { reason } => {
                    record.reason = Some(reason);
                    error!("{}", record.summary());
                    attempts.push(record);
                    return BuildOutcome {
                        succeeded: false,
                        logs: last_logs,
                        attempts,
                    };
                }
            }
            attempts.push(record);
        }

        error!("All {} build strategies failed", total);
        BuildOutcome {
            succeeded: false,
            logs: last_logs,
            attempts,
        }
    }
}
