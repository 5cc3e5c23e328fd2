//! Build strategies and how their attempts are judged.

use serde::Serialize;
use std::fmt;

use super::script::describe_exit;
use crate::runtime::{Invocation, InvokeError};

/// Lines of container output kept per failed attempt.
const LOG_TAIL_LINES: usize = 20;

/// Which of the two configured runtimes a strategy uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RuntimeSlot {
    Primary,
    Secondary,
}

/// How strictly the packaging tool checks dependencies and integrity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum InvocationMode {
    Strict,
    Relaxed,
}

impl fmt::Display for InvocationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InvocationMode::Strict => write!(f, "strict"),
            InvocationMode::Relaxed => write!(f, "relaxed"),
        }
    }
}

/// One entry of the fallback chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Strategy {
    pub slot: RuntimeSlot,
    pub mode: InvocationMode,
}

impl Strategy {
    pub const fn new(slot: RuntimeSlot, mode: InvocationMode) -> Self {
        Self { slot, mode }
    }

    /// Stable name such as `primary-strict`.
    pub fn name(&self) -> String {
        let slot = match self.slot {
            RuntimeSlot::Primary => "primary",
            RuntimeSlot::Secondary => "secondary",
        };
        format!("{}-{}", slot, self.mode)
    }

    /// Primary strict, primary relaxed, secondary strict, secondary relaxed.
    pub fn default_chain() -> Vec<Strategy> {
        vec![
            Strategy::new(RuntimeSlot::Primary, InvocationMode::Strict),
            Strategy::new(RuntimeSlot::Primary, InvocationMode::Relaxed),
            Strategy::new(RuntimeSlot::Secondary, InvocationMode::Strict),
            Strategy::new(RuntimeSlot::Secondary, InvocationMode::Relaxed),
        ]
    }
}

/// What one attempt produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttemptResult {
    /// The script exited 0.
    Succeeded { logs: String },
    /// The script ran and failed; the next strategy may do better.
    Recoverable { reason: String, logs: String },
    /// The runtime itself could not be used. Recoverable, but other modes
    /// of the same runtime will fail the same way.
    Unavailable { reason: String },
    /// Nothing later in the chain can succeed.
    Fatal { reason: String },
}

impl AttemptResult {
    /// Judge a runtime invocation.
    pub fn from_invocation(result: Result<Invocation, InvokeError>) -> Self {
        match result {
            Ok(run) if run.success() => AttemptResult::Succeeded { logs: run.logs },
            Ok(run) => AttemptResult::Recoverable {
                reason: describe_exit(run.exit_code),
                logs: run.logs,
            },
            Err(e @ InvokeError::TimedOut(_)) => AttemptResult::Recoverable {
                reason: e.to_string(),
                logs: String::new(),
            },
            Err(e @ (InvokeError::NotFound(_) | InvokeError::Io(_))) => {
                AttemptResult::Unavailable {
                    reason: e.to_string(),
                }
            }
            Err(e @ InvokeError::InvalidMount(_)) => AttemptResult::Fatal {
                reason: e.to_string(),
            },
        }
    }

    pub fn status(&self) -> AttemptStatus {
        match self {
            AttemptResult::Succeeded { .. } => AttemptStatus::Succeeded,
            AttemptResult::Recoverable { .. } => AttemptStatus::Failed,
            AttemptResult::Unavailable { .. } => AttemptStatus::Unavailable,
            AttemptResult::Fatal { .. } => AttemptStatus::Fatal,
        }
    }
}

/// Outcome of an attempt as recorded in the build report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AttemptStatus {
    Succeeded,
    Failed,
    Unavailable,
    /// Not run because its runtime was already found unusable.
    Skipped,
    Fatal,
}

/// Rules for walking the chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FallbackPolicy {
    /// Skip the remaining strategies of a runtime once it is unavailable.
    pub skip_unavailable_runtime: bool,
}

impl Default for FallbackPolicy {
    fn default() -> Self {
        Self {
            skip_unavailable_runtime: true,
        }
    }
}

/// One attempt, kept for diagnostics.
#[derive(Debug, Clone, Serialize)]
pub struct AttemptRecord {
    /// 1-based position in the chain.
    pub index: usize,
    pub total: usize,
    pub strategy: Strategy,
    pub runtime: String,
    pub status: AttemptStatus,
    pub reason: Option<String>,
    pub duration_ms: u64,
    /// Last lines of container output for failed attempts.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub log_tail: Vec<String>,
}

impl AttemptRecord {
    pub fn failed(&self) -> bool {
        self.status != AttemptStatus::Succeeded && self.status != AttemptStatus::Skipped
    }

    /// `attempt 2/4 (podman, relaxed) failed: exit code 5: packaging tool failed`
    pub fn summary(&self) -> String {
        let verb = match self.status {
            AttemptStatus::Succeeded => "succeeded",
            AttemptStatus::Failed => "failed",
            AttemptStatus::Unavailable => "unavailable",
            AttemptStatus::Skipped => "skipped",
            AttemptStatus::Fatal => "aborted",
        };
        let mut line = format!(
            "attempt {}/{} ({}, {}) {}",
            self.index, self.total, self.runtime, self.strategy.mode, verb
        );
        if let Some(reason) = &self.reason {
            line.push_str(": ");
            line.push_str(reason);
        }
        line
    }
}

pub(crate) fn log_tail(logs: &str) -> Vec<String> {
    let lines: Vec<&str> = logs.lines().filter(|l| !l.trim().is_empty()).collect();
    let start = lines.len().saturating_sub(LOG_TAIL_LINES);
    lines[start..].iter().map(|l| l.to_string()).collect()
}
