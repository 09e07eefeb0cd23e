//! Configuration management CLI commands.
//!
//! Provides `config show`, `config path` and `config init`.

use chunkcache::config::{config_file_path, format_size, ConfigFile};
use clap::Subcommand;
use console::style;

use crate::error::CliError;

/// Config subcommands.
#[derive(Debug, Subcommand)]
pub enum ConfigCommands {
    /// Show the effective configuration (file values over defaults)
    Show,

    /// Show the configuration file path
    Path,

    /// Create the configuration file with defaults if it doesn't exist
    Init,
}

/// Run a config subcommand.
pub fn run(command: ConfigCommands) -> Result<(), CliError> {
    match command {
        ConfigCommands::Show => run_show(),
        ConfigCommands::Path => run_path(),
        ConfigCommands::Init => run_init(),
    }
}

fn run_show() -> Result<(), CliError> {
    let path = config_file_path();
    let config = ConfigFile::load_from(&path)?;

    if path.exists() {
        println!("{} {}", style("Configuration file:").bold(), path.display());
    } else {
        println!(
            "{} {} {}",
            style("Configuration file:").bold(),
            path.display(),
            style("(not found, showing defaults)").dim()
        );
    }
    println!();

    for line in describe(&config) {
        println!("{}", line);
    }

    Ok(())
}

fn run_path() -> Result<(), CliError> {
    println!("{}", config_file_path().display());
    Ok(())
}

fn run_init() -> Result<(), CliError> {
    let path = config_file_path();

    if ConfigFile::ensure_exists_at(&path)? {
        println!("{} Created {}", style("✓").green(), path.display());
        println!();
        println!("Edit this file to customize cache capacity, eviction weights and logging.");
    } else {
        println!(
            "{} {} already exists, leaving it unchanged",
            style("!").yellow(),
            path.display()
        );
    }

    Ok(())
}

/// Render the configuration as INI-style lines.
fn describe(config: &ConfigFile) -> Vec<String> {
    vec![
        "[cache]".to_string(),
        format!("  capacity = {}", format_size(config.cache.capacity)),
        String::new(),
        "[cost]".to_string(),
        format!(
            "  recency_half_life_secs = {}",
            config.cost.recency_half_life.as_secs_f64()
        ),
        format!("  frequency_weight = {}", config.cost.frequency_weight),
        format!("  cost_weight = {}", config.cost.cost_weight),
        String::new(),
        "[logging]".to_string(),
        format!("  directory = {}", config.logging.directory.display()),
        format!("  file = {}", config.logging.file),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_describe_defaults() {
        let lines = describe(&ConfigFile::default());

        assert!(lines.contains(&"[cache]".to_string()));
        assert!(lines.contains(&"  capacity = 512MB".to_string()));
        assert!(lines.contains(&"  recency_half_life_secs = 60".to_string()));
        assert!(lines.contains(&"  file = chunkcache.log".to_string()));
    }
}
