//! Build command - runs the full packaging pipeline.

use anyhow::{bail, Result};
use std::path::PathBuf;
use std::time::{Duration, Instant};

use distpack::config::Config;
use distpack::format::PackageFormat;
use distpack::pipeline::{self, PipelineOptions};
use distpack::runtime::CliRuntime;
use distpack::timing::format_duration;

/// Command-line overrides for a build.
#[derive(Debug, Default)]
pub struct BuildArgs {
    pub format: Option<PackageFormat>,
    pub release_ref: Option<String>,
    pub strip_dependency: Option<String>,
    pub strip_source: bool,
    pub output: Option<PathBuf>,
    pub timeout: Option<u64>,
    pub in_place: bool,
}

impl BuildArgs {
    /// Layer the flags over the loaded configuration.
    pub fn apply(&self, config: &mut Config) {
        if let Some(format) = self.format {
            config.format = format;
        }
        if let Some(release_ref) = &self.release_ref {
            config.release_ref = Some(release_ref.clone());
        }
        if let Some(token) = &self.strip_dependency {
            config.strip_dependency = Some(token.clone());
        }
        if self.strip_source {
            config.strip_source = true;
        }
        if let Some(output) = &self.output {
            config.output_dir = if output.is_absolute() {
                output.clone()
            } else {
                config.workspace.join(output)
            };
        }
        if let Some(secs) = self.timeout {
            config.build_timeout = Duration::from_secs(secs);
        }
    }
}

/// Execute the build command.
pub fn cmd_build(config: &Config, args: &BuildArgs) -> Result<()> {
    let mut config = config.clone();
    args.apply(&mut config);

    let image = config.image();
    let primary = CliRuntime::new(&config.primary_runtime, &image, config.build_timeout);
    let secondary = CliRuntime::new(&config.secondary_runtime, &image, config.build_timeout);

    println!(
        "Packaging {} as {} in {} (runtimes: {} -> {})",
        config.project_name, config.format, image, config.primary_runtime, config.secondary_runtime
    );

    let started = Instant::now();
    let options = PipelineOptions {
        in_place: args.in_place,
    };
    let result = pipeline::run(&config, &options, &primary, &secondary)?;

    if !result.diagnostics.is_empty() {
        println!("\nDiagnostics:");
        for line in &result.diagnostics {
            println!("  {}", line);
        }
    }

    match &result.final_artifact {
        Some(path) if result.succeeded => {
            println!(
                "\n=== Package ready in {} ===\n  {}",
                format_duration(started.elapsed()),
                path.display()
            );
            Ok(())
        }
        _ => bail!(
            "Packaging {} {} failed. See the diagnostics above.",
            result.project,
            result.version
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::path::Path;

    #[test]
    fn test_flags_override_config() {
        let mut config = Config::from_vars(Path::new("/ws"), &HashMap::new()).unwrap();
        let args = BuildArgs {
            format: Some(PackageFormat::Rpm),
            release_ref: Some("refs/tags/v2.0".to_string()),
            output: Some(PathBuf::from("dist")),
            timeout: Some(60),
            strip_source: true,
            ..Default::default()
        };
        args.apply(&mut config);

        assert_eq!(config.format, PackageFormat::Rpm);
        assert_eq!(config.release_ref.as_deref(), Some("refs/tags/v2.0"));
        assert_eq!(config.output_dir, PathBuf::from("/ws/dist"));
        assert_eq!(config.build_timeout, Duration::from_secs(60));
        assert!(config.strip_source);
        assert_eq!(config.manifest_path(), PathBuf::from("/ws/winetricks.spec"));
    }

    #[test]
    fn test_no_flags_keep_config() {
        let mut config = Config::from_vars(Path::new("/ws"), &HashMap::new()).unwrap();
        let before = format!("{:?}", config);
        BuildArgs::default().apply(&mut config);
        assert_eq!(format!("{:?}", config), before);
    }
}
