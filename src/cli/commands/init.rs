//! Initialize command.

use console::style;

use crate::cli::helpers::open_store;
use crate::config::Config;

/// Initialize the data directory and database.
pub async fn cmd_init(config: &Config) -> anyhow::Result<()> {
    open_store(config).await?;

    println!(
        "{} Initialized munidata in {}",
        style("✓").green(),
        config.data_dir().display()
    );
    println!("  Database: {}", config.database_url());
    if let Some(dir) = config.diagnostics_dir() {
        println!("  Diagnostics: {}", dir.display());
    }
    Ok(())
}
