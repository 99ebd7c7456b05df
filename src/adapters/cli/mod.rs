//! CLI Adapter
//!
//! Command-line interface for the listing sniper.
//! Uses clap derive macros for argument parsing.

mod commands;

pub use commands::{BalanceCmd, CliApp, Command, MarketCapCmd, ParseCmd, RunCmd};
