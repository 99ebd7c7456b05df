//! Listing Sniper - Announcement-driven Bybit spot trading bot
//!
//! Watches Telegram for listing announcements, buys and places take-profit exits.

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use rust_decimal::Decimal;
use tokio::sync::watch;
use tracing_subscriber::{fmt, EnvFilter};

use listing_sniper::adapters::cli::{BalanceCmd, CliApp, Command, MarketCapCmd, ParseCmd};
use listing_sniper::adapters::{BybitClient, BybitConfig, CoinGeckoClient, CoinMarketCapClient, TelegramSource};
use listing_sniper::application::{MarketCapResolver, OrderExecutor, SignalDispatcher, Supervisor};
use listing_sniper::config::{load_config, Config};
use listing_sniper::domain::SignalParser;
use listing_sniper::ports::{ExchangePort, MarketCapProvider};

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if it exists (secrets go here, not in config.toml)
    dotenvy::dotenv().ok();

    let app = CliApp::parse();

    let config = match config_path(&app.command) {
        Some(path) => Some(
            load_config(path)
                .with_context(|| format!("Failed to load configuration from {}", path.display()))?,
        ),
        None => None,
    };

    init_logging(
        app.verbose,
        app.debug,
        config.as_ref().map(|c| c.logging.level.as_str()),
    );

    match (app.command, config) {
        (Command::Run(_), Some(config)) => run_command(config).await,
        (Command::Parse(cmd), _) => parse_command(cmd),
        (Command::MarketCap(cmd), Some(config)) => market_cap_command(cmd, config).await,
        (Command::Balance(cmd), Some(config)) => balance_command(cmd, config).await,
        _ => anyhow::bail!("Command requires a configuration file"),
    }
}

fn config_path(command: &Command) -> Option<&Path> {
    match command {
        Command::Run(cmd) => Some(&cmd.config),
        Command::MarketCap(cmd) => Some(&cmd.config),
        Command::Balance(cmd) => Some(&cmd.config),
        Command::Parse(_) => None,
    }
}

/// RUST_LOG wins, then --debug / --verbose, then `[logging] level`
fn init_logging(verbose: bool, debug: bool, config_level: Option<&str>) {
    let level = if debug {
        "debug"
    } else if verbose {
        "info"
    } else {
        config_level.unwrap_or("info")
    };

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("{},hyper=warn,reqwest=warn", level)));

    fmt().with_env_filter(filter).with_target(false).init();
}

fn build_exchange(config: &Config) -> Result<BybitClient> {
    let bybit = &config.bybit;
    let client = BybitClient::with_config(BybitConfig {
        api_base_url: bybit.api_url.clone(),
        api_key: bybit.get_api_key()?,
        api_secret: bybit.get_api_secret()?,
        recv_window_ms: bybit.recv_window_ms,
        timeout: bybit.timeout(),
    })
    .context("Failed to create Bybit client")?;
    Ok(client)
}

fn build_resolver(config: &Config) -> Result<MarketCapResolver> {
    let section = &config.market_cap;
    let mut providers: Vec<Arc<dyn MarketCapProvider>> = Vec::new();

    match section.get_cmc_api_key() {
        Some(key) => providers.push(Arc::new(
            CoinMarketCapClient::new(&section.cmc_api_url, key, section.timeout())
                .context("Failed to create CoinMarketCap client")?,
        )),
        None => tracing::warn!("CMC_API_KEY not set, using CoinGecko only"),
    }

    providers.push(Arc::new(
        CoinGeckoClient::new(&section.coingecko_api_url, section.timeout())
            .context("Failed to create CoinGecko client")?,
    ));

    Ok(MarketCapResolver::new(providers))
}

async fn run_command(config: Config) -> Result<()> {
    tracing::info!("Starting listing sniper...");

    let exchange: Arc<dyn ExchangePort> = Arc::new(build_exchange(&config)?);
    let resolver = build_resolver(&config)?;
    let providers = resolver.provider_names();
    let executor = OrderExecutor::new(exchange, config.trading.cooldown());
    let dispatcher = Arc::new(
        SignalDispatcher::from_config(&config, resolver, executor)
            .context("Failed to build signal parser")?,
    );

    let source = Arc::new(
        TelegramSource::new(config.telegram.get_bot_token()?, config.telegram.poll_timeout_secs)
            .context("Failed to create Telegram source")?,
    );

    tracing::info!(
        "Watching {} channel(s), budget {} {} per announcement, providers {:?}",
        config.telegram.channels.len(),
        config.trading.initial_target,
        config.trading.quote_asset,
        providers
    );

    // Setup Ctrl+C handler
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        tracing::info!("Shutdown signal received");
        let _ = shutdown_tx.send(true);
    });

    Supervisor::new(config.supervisor.restart_delay())
        .run(source, dispatcher, shutdown_rx)
        .await;

    tracing::info!("Listing sniper stopped");
    Ok(())
}

fn parse_command(cmd: ParseCmd) -> Result<()> {
    let parser = SignalParser::new(&cmd.quote).context("Invalid quote asset")?;

    match parser.parse(&cmd.text) {
        Some(parsed) => {
            println!("Signal: {}", parsed.signal_type);
            for instrument in &parsed.instruments {
                println!("  {}", instrument);
            }
        }
        None => println!("No tradable announcement found"),
    }

    Ok(())
}

async fn market_cap_command(cmd: MarketCapCmd, config: Config) -> Result<()> {
    let resolver = build_resolver(&config)?;
    let symbol = cmd.symbol.trim().to_uppercase();

    match resolver.resolve(&symbol).await {
        Some(cap) => println!("{}: ${}", symbol, cap.round_dp(0)),
        None => anyhow::bail!("No market cap available for {}", symbol),
    }

    Ok(())
}

async fn balance_command(_cmd: BalanceCmd, config: Config) -> Result<()> {
    let exchange = build_exchange(&config)?;

    let balances = exchange
        .wallet_balance(&config.bybit.account_type)
        .await
        .context("Failed to get wallet balance")?;

    println!("Account: {}", config.bybit.account_type);
    for balance in balances.iter().filter(|b| b.wallet_balance > Decimal::ZERO) {
        println!("  {:<10} {}", balance.coin, balance.wallet_balance);
    }

    Ok(())
}
