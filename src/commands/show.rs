//! Show command - displays information.

use anyhow::{bail, Context, Result};
use std::fs;

use distpack::config::Config;
use distpack::pipeline::WorkDirs;

/// Show target for the show command.
pub enum ShowTarget {
    /// Show configuration
    Config,
    /// Show the report of the last build
    Report,
}

/// Execute the show command.
pub fn cmd_show(target: ShowTarget, config: &Config) -> Result<()> {
    match target {
        ShowTarget::Config => {
            config.print();
        }
        ShowTarget::Report => {
            let path = WorkDirs::under(&config.output_dir).report();
            if !path.exists() {
                bail!("No build report at {}. Run 'distpack build' first.", path.display());
            }
            let content = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            let report: serde_json::Value = serde_json::from_str(&content)
                .with_context(|| format!("Invalid build report {}", path.display()))?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
    }
    Ok(())
}
