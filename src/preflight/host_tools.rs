//! Container runtime availability checks.

use std::time::Duration;

use crate::config::Config;
use crate::process::Cmd;

use super::types::{CheckResult, CheckStatus};

/// Check the configured runtimes are on PATH. One of the two is enough to
/// build; a missing second runtime only loses the fallback.
pub fn check_runtimes(config: &Config) -> Vec<CheckResult> {
    let mut results = vec![check_runtime(&config.primary_runtime, "primary runtime")];

    if config.secondary_runtime == config.primary_runtime {
        results.push(CheckResult::skip(
            &config.secondary_runtime,
            "secondary runtime is the same as the primary",
        ));
    } else {
        results.push(check_runtime(&config.secondary_runtime, "secondary runtime"));
    }

    let any_available = results.iter().any(|r| r.status == CheckStatus::Pass);
    if any_available {
        // A single missing runtime is only a warning.
        for result in &mut results {
            if result.status == CheckStatus::Fail {
                result.status = CheckStatus::Warn;
            }
        }
    }

    results
}

fn check_runtime(program: &str, role: &str) -> CheckResult {
    match which::which(program) {
        Ok(path) => {
            let details = match runtime_version(program) {
                Some(version) => format!("{} ({})", version, path.display()),
                None => path.display().to_string(),
            };
            CheckResult::pass_with(program, &details)
        }
        Err(_) => CheckResult::fail(
            program,
            &format!("Not found on PATH ({}). Install podman or docker.", role),
        ),
    }
}

/// First line of `<program> --version`, if it answers.
fn runtime_version(program: &str) -> Option<String> {
    let result = Cmd::new(program)
        .arg("--version")
        .timeout(Duration::from_secs(10))
        .error_msg(format!("{} --version failed", program))
        .run()
        .ok()?;
    result.stdout_trimmed().lines().next().map(String::from)
}
