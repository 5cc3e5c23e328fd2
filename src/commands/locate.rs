//! Locate command - runs only the artifact search.

use anyhow::{bail, Result};

use distpack::artifact;
use distpack::config::Config;
use distpack::pipeline::{self, WorkDirs};

/// Execute the locate command.
pub fn cmd_locate(config: &Config) -> Result<()> {
    let dirs = WorkDirs::under(&config.output_dir);
    let plan = pipeline::search_plan(config, &dirs);

    match artifact::locate(&plan) {
        Some(found) => {
            println!(
                "{} ({}, {})",
                found.path.display(),
                found.kind,
                found.size_display()
            );
            Ok(())
        }
        None => {
            println!("Searched (in order):");
            for attempt in plan.describe() {
                println!("  {}", attempt);
            }
            bail!("No {} package found", config.format)
        }
    }
}
