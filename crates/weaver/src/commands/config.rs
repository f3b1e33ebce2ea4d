//! `weaver config`: show the merged configuration.

use std::path::PathBuf;
use weaver_core::Config;

/// Print where the configuration came from and what it resolved to.
pub fn handle_config(config: &Config, sources: &[PathBuf]) -> anyhow::Result<()> {
    println!("Configuration sources:");
    if sources.is_empty() {
        println!("  (none)");
    } else {
        for source in sources {
            println!("  {}", source.display());
        }
    }
    println!();

    println!("Current configuration:");
    println!("{}", serde_json::to_string_pretty(config)?);

    Ok(())
}
