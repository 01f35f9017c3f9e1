use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Subcommand)]
pub enum Command {
    /// Download per-day market CSV files and combine them
    DailyFiles,
    /// Fetch day-ahead prices from the statistical API in windows
    DayAhead,
    /// Compute daylight minutes per day for a fixed coordinate
    Sunlight,
    /// Run all three pipelines, one after the other
    All,
}

#[derive(Debug, Clone, Serialize, Deserialize, Parser)]
#[command(name = "grid-etl")]
#[command(about = "Download electricity prices and daylight data into CSV files")]
pub struct CliConfig {
    /// Path to TOML configuration file (built-in defaults when absent)
    #[arg(short, long, default_value = "grid-etl.toml")]
    pub config: String,

    /// Override the output directory from the config file
    #[arg(long)]
    pub output_path: Option<String>,

    #[arg(short, long, help = "Enable verbose output")]
    pub verbose: bool,

    #[arg(long, help = "Log CPU and memory usage per phase")]
    pub monitor: bool,

    #[arg(long, help = "Emit logs as JSON lines")]
    pub json_logs: bool,

    /// Print the resolved configuration without fetching anything
    #[arg(long)]
    pub dry_run: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_subcommand_and_flags() {
        let cli = CliConfig::parse_from([
            "grid-etl",
            "--config",
            "custom.toml",
            "--verbose",
            "day-ahead",
        ]);
        assert_eq!(cli.config, "custom.toml");
        assert!(cli.verbose);
        assert!(!cli.monitor);
        assert_eq!(cli.command, Command::DayAhead);
    }

    #[test]
    fn test_default_config_path() {
        let cli = CliConfig::parse_from(["grid-etl", "sunlight"]);
        assert_eq!(cli.config, "grid-etl.toml");
        assert_eq!(cli.command, Command::Sunlight);
        assert!(cli.output_path.is_none());
    }
}
