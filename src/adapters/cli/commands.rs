//! CLI Commands
//!
//! Argument definitions for every subcommand. Execution lives in `main.rs`.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Listing Sniper - buys Bybit spot listings announced on Telegram
#[derive(Parser, Debug)]
#[command(
    name = "listing-sniper",
    version = env!("CARGO_PKG_VERSION"),
    author = env!("CARGO_PKG_AUTHORS"),
    about = "Buys on exchange listing announcements and places take-profit orders on Bybit spot",
    long_about = "Listing Sniper watches Telegram channels for futures-launch and spot-listing \
                  announcements, market-buys every announced ticker on Bybit spot and places a \
                  take-profit sell sized by the token's market capitalization."
)]
pub struct CliApp {
    /// The command to execute
    #[command(subcommand)]
    pub command: Command,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Enable debug logging
    #[arg(long, global = true)]
    pub debug: bool,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Watch the configured channels and trade on announcements
    Run(RunCmd),

    /// Parse an announcement offline and show what would be traded
    Parse(ParseCmd),

    /// Look up a token's market cap through the provider chain
    MarketCap(MarketCapCmd),

    /// Show non-zero wallet balances
    Balance(BalanceCmd),
}

/// Start the pipeline
#[derive(Parser, Debug)]
pub struct RunCmd {
    /// Path to configuration file
    #[arg(short, long, value_name = "FILE", default_value = "config/example.toml")]
    pub config: PathBuf,
}

/// Offline announcement parsing
#[derive(Parser, Debug)]
pub struct ParseCmd {
    /// Announcement text
    #[arg(value_name = "TEXT")]
    pub text: String,

    /// Quote asset the pairs are denominated in
    #[arg(short, long, value_name = "ASSET", default_value = "USDT")]
    pub quote: String,
}

/// Market cap lookup
#[derive(Parser, Debug)]
pub struct MarketCapCmd {
    /// Token symbol (e.g., PEPE)
    #[arg(value_name = "SYMBOL")]
    pub symbol: String,

    /// Path to configuration file
    #[arg(short, long, value_name = "FILE", default_value = "config/example.toml")]
    pub config: PathBuf,
}

/// Wallet balance listing
#[derive(Parser, Debug)]
pub struct BalanceCmd {
    /// Path to configuration file
    #[arg(short, long, value_name = "FILE", default_value = "config/example.toml")]
    pub config: PathBuf,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_run_with_config() {
        let app = CliApp::try_parse_from(["listing-sniper", "run", "--config", "prod.toml", "-v"]).unwrap();
        assert!(app.verbose);
        match app.command {
            Command::Run(cmd) => assert_eq!(cmd.config, PathBuf::from("prod.toml")),
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_parse_command_defaults_quote() {
        let app = CliApp::try_parse_from(["listing-sniper", "parse", "Bybit will list PEPEUSDT"]).unwrap();
        match app.command {
            Command::Parse(cmd) => {
                assert_eq!(cmd.text, "Bybit will list PEPEUSDT");
                assert_eq!(cmd.quote, "USDT");
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_market_cap_subcommand_name() {
        let app = CliApp::try_parse_from(["listing-sniper", "market-cap", "PEPE", "--debug"]).unwrap();
        assert!(app.debug);
        assert!(matches!(app.command, Command::MarketCap(ref cmd) if cmd.symbol == "PEPE"));
    }
}
