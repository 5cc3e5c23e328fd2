//! distpack - packages a built application as Arch and RPM packages.
//!
//! Runs the distribution packaging tool inside a container, falling back
//! from the primary to the secondary runtime and from strict to relaxed
//! checks, then publishes the package under a canonical name.

mod commands;

use anyhow::{Context, Result};
use clap::{ArgAction, Parser, Subcommand};
use std::path::PathBuf;

use distpack::config::Config;
use distpack::format::PackageFormat;
use distpack::logging;

#[derive(Parser)]
#[command(name = "distpack")]
#[command(about = "Containerized Arch/RPM packaging with runtime fallback")]
#[command(
    after_help = "QUICK START:\n  distpack preflight  Check runtimes and manifests\n  distpack build      Build and publish the package\n  distpack clean      Remove build outputs"
)]
struct Cli {
    /// Workspace root containing the project and its packaging manifest
    #[arg(long, global = true, default_value = ".")]
    workspace: PathBuf,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the package and publish it under its canonical name
    Build {
        /// Package format (default: DISTPACK_FORMAT or arch)
        #[arg(long, value_enum)]
        format: Option<PackageFormat>,
        /// Release reference, e.g. refs/tags/v1.2.3
        #[arg(long)]
        release_ref: Option<String>,
        /// Remove this dependency from the manifest before building
        #[arg(long)]
        strip_dependency: Option<String>,
        /// Clear source and checksum lists before building
        #[arg(long)]
        strip_source: bool,
        /// Directory the package is published to (default: workspace)
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Timeout per container run in seconds (default: 3600)
        #[arg(long)]
        timeout: Option<u64>,
        /// Patch the workspace manifest itself instead of a staged copy
        #[arg(long)]
        in_place: bool,
    },

    /// Print the resolved package version
    Version {
        /// Release reference, e.g. refs/tags/v1.2.3
        #[arg(long)]
        release_ref: Option<String>,
    },

    /// Patch the packaging manifest (version, dependency, sources)
    Patch {
        /// Version to write (default: resolved version)
        #[arg(long)]
        version: Option<String>,
        /// Print the patched manifest instead of writing it
        #[arg(long)]
        dry_run: bool,
        /// Remove this dependency from the manifest
        #[arg(long)]
        strip_dependency: Option<String>,
        /// Clear source and checksum lists
        #[arg(long)]
        strip_source: bool,
    },

    /// Find the built package without building
    Locate,

    /// Run preflight checks (runtimes, manifests, output directory)
    Preflight {
        /// Fail if any checks fail (exit code 1)
        #[arg(long)]
        strict: bool,
    },

    /// Show information
    Show {
        #[command(subcommand)]
        what: ShowTarget,
    },

    /// Remove the staging directory and published packages
    Clean,
}

#[derive(Subcommand)]
enum ShowTarget {
    /// Show current configuration
    Config,
    /// Show the report of the last build
    Report,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init(cli.verbose);

    let workspace = std::fs::canonicalize(&cli.workspace)
        .with_context(|| format!("Workspace {} not found", cli.workspace.display()))?;
    let config = Config::load(&workspace)?;

    match cli.command {
        Commands::Build {
            format,
            release_ref,
            strip_dependency,
            strip_source,
            output,
            timeout,
            in_place,
        } => {
            let args = commands::build::BuildArgs {
                format,
                release_ref,
                strip_dependency,
                strip_source,
                output,
                timeout,
                in_place,
            };
            commands::cmd_build(&config, &args)?;
        }

        Commands::Version { release_ref } => {
            commands::cmd_version(&config, release_ref.as_deref());
        }

        Commands::Patch {
            version,
            dry_run,
            strip_dependency,
            strip_source,
        } => {
            let args = commands::patch::PatchArgs {
                version,
                dry_run,
                strip_dependency,
                strip_source,
            };
            commands::cmd_patch(&config, &args)?;
        }

        Commands::Locate => {
            commands::cmd_locate(&config)?;
        }

        Commands::Preflight { strict } => {
            commands::cmd_preflight(&config, strict)?;
        }

        Commands::Show { what } => {
            let show_target = match what {
                ShowTarget::Config => commands::show::ShowTarget::Config,
                ShowTarget::Report => commands::show::ShowTarget::Report,
            };
            commands::cmd_show(show_target, &config)?;
        }

        Commands::Clean => {
            commands::cmd_clean(&config)?;
        }
    }

    Ok(())
}
