//! Clean command - removes build outputs.

use anyhow::Result;

use distpack::clean;
use distpack::config::Config;

/// Execute the clean command.
pub fn cmd_clean(config: &Config) -> Result<()> {
    clean::clean_outputs(config)?;
    Ok(())
}
