use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "bulwark")]
#[command(version = "0.1.0")]
#[command(about = "Resilience and adaptive risk regulation for a trading agent", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Directory holding default.toml and per-environment overrides
    #[arg(short, long, default_value = "config", env = "BULWARK_CONFIG_DIR")]
    pub config_dir: PathBuf,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Load and validate configuration, print a summary without secrets
    CheckConfig,

    /// Show the persisted emergency state
    Status,

    /// Feed a JSON array of trade outcomes through a full core and print the report
    Replay {
        /// Path to a JSON file: [{"asset": "...", "won": true, ...}, ...]
        file: PathBuf,

        /// Also print per-hour and per-asset breakdowns
        #[arg(long)]
        breakdown: bool,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_replay() {
        let cli = Cli::parse_from(["bulwark", "--config-dir", "/etc/bulwark", "replay", "trades.json", "--breakdown"]);
        assert_eq!(cli.config_dir, PathBuf::from("/etc/bulwark"));
        match cli.command {
            Commands::Replay { file, breakdown } => {
                assert_eq!(file, PathBuf::from("trades.json"));
                assert!(breakdown);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_parse_check_config() {
        let cli = Cli::parse_from(["bulwark", "check-config"]);
        assert!(matches!(cli.command, Commands::CheckConfig));
    }
}
