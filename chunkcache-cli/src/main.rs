//! chunkcache CLI - Command-line interface
//!
//! Runs synthetic workloads against the chunkcache compute gateway and
//! manages the user configuration file.

mod commands;
mod error;

use clap::{Parser, Subcommand};

use commands::config::ConfigCommands;
use commands::simulate::SimulateArgs;

#[derive(Parser)]
#[command(name = "chunkcache")]
#[command(version, about = "Cost-aware cache for lazily computed array chunks", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Drive a synthetic concurrent workload through a cache and report statistics
    Simulate(SimulateArgs),

    /// Manage the configuration file (~/.chunkcache/config.ini)
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

fn main() {
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Simulate(args) => commands::simulate::run(args),
        Commands::Config { command } => commands::config::run(command),
    };

    if let Err(e) = result {
        e.exit();
    }
}
