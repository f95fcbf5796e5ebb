use clap::{Parser, Subcommand};

use crate::config::DEFAULT_CONFIG_PATH;

#[derive(Parser)]
#[command(name = "rsi-sentinel")]
#[command(about = "Samples RSI across a symbol universe and reports threshold crossings")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    #[arg(short, long, global = true, default_value = DEFAULT_CONFIG_PATH)]
    pub config: String,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the ingestion and reporting loops until Ctrl-C
    Run,

    /// Sample the universe once and append the round to history
    Sample,

    /// Classify the latest snapshot and deliver one report
    Report {
        /// Print the alert instead of delivering it
        #[arg(long)]
        dry_run: bool,
    },

    /// Open the terminal dashboard over the recorded history
    Dashboard,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_report_dry_run_with_config() {
        let cli = Cli::parse_from(["rsi-sentinel", "report", "--dry-run", "-c", "alt.json"]);
        assert_eq!(cli.config, "alt.json");
        assert!(matches!(cli.command, Commands::Report { dry_run: true }));
    }

    #[test]
    fn config_defaults_to_assets() {
        let cli = Cli::parse_from(["rsi-sentinel", "run"]);
        assert_eq!(cli.config, DEFAULT_CONFIG_PATH);
        assert!(matches!(cli.command, Commands::Run));
    }
}
