//! Version command - prints the resolved package version.

use distpack::config::Config;
use distpack::version;

/// Execute the version command.
pub fn cmd_version(config: &Config, release_ref: Option<&str>) {
    let release_ref = release_ref.or(config.release_ref.as_deref());
    let (version, source) = version::resolve_with_source(release_ref, &config.project_manifest);
    println!("{}", version);
    eprintln!("(from {})", source);
}
