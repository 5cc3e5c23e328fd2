//! Patch command - runs only the manifest patch stage.

use anyhow::Result;

use distpack::config::Config;
use distpack::manifest::{self, PatchOptions};
use distpack::version;

/// Command-line options for the patch command.
#[derive(Debug, Default)]
pub struct PatchArgs {
    pub version: Option<String>,
    pub dry_run: bool,
    pub strip_dependency: Option<String>,
    pub strip_source: bool,
}

/// Execute the patch command. A dry run prints the patched manifest
/// instead of writing it.
pub fn cmd_patch(config: &Config, args: &PatchArgs) -> Result<()> {
    let version = match &args.version {
        Some(v) => v.clone(),
        None => version::resolve(config.release_ref.as_deref(), &config.project_manifest),
    };
    let options = PatchOptions {
        strip_dependency: args
            .strip_dependency
            .clone()
            .or_else(|| config.strip_dependency.clone()),
        strip_source: args.strip_source || config.strip_source,
        dry_run: args.dry_run,
        commit_to: None,
        format: Some(config.format.manifest_format()),
    };

    let manifest_path = config.manifest_path();
    let outcome = manifest::patch(&manifest_path, &version, &options)?;

    for warning in &outcome.warnings {
        eprintln!("[WARN] {}", warning);
    }

    if args.dry_run {
        print!("{}", outcome.document.text());
        return Ok(());
    }

    if outcome.changed {
        println!("Patched {} (version {})", manifest_path.display(), version);
    } else {
        println!("{} already up to date (version {})", manifest_path.display(), version);
    }
    Ok(())
}
