//! CLI command handlers.
//!
//! Each submodule handles a specific CLI command:
//! - `build` - Run the full packaging pipeline
//! - `version` - Print the resolved version
//! - `patch` - Patch the packaging manifest
//! - `locate` - Find a built package
//! - `preflight` - Run preflight checks
//! - `show` - Display information
//! - `clean` - Remove build outputs

pub mod build;
mod clean;
mod locate;
pub mod patch;
mod preflight;
pub mod show;
mod version;

pub use build::cmd_build;
pub use clean::cmd_clean;
pub use locate::cmd_locate;
pub use patch::cmd_patch;
pub use preflight::cmd_preflight;
pub use show::cmd_show;
pub use version::cmd_version;
