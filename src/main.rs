//! Position Engine - Command Line Entry Point
//!
//! Previews pari-mutuel bets and shows derived positions from the on-disk
//! snapshot cache.

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use rust_decimal::Decimal;
use std::str::FromStr;
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

use position_engine::common::clock::elapsed_ms;
use position_engine::config::load_config;
use position_engine::{
    Address, Amount, CacheKey, CacheStore, EngineConfig, JsonFileCacheStore, PoolState,
    PricingEngine, Side, TradePreviewCalculator,
};

/// CLI arguments for the application
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "config.toml")]
    config: String,

    /// Log level (trace, debug, info, warn, error); overrides the config file
    #[arg(long)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Quote a bet against a pool
    Preview {
        /// YES pool size in collateral units
        #[arg(long)]
        yes_pool: String,

        /// NO pool size in collateral units
        #[arg(long)]
        no_pool: String,

        /// Side to bet on (yes or no)
        #[arg(long)]
        side: Side,

        /// Stake in collateral units
        #[arg(long)]
        amount: String,
    },

    /// Show the derived position cached for a market and user
    Show {
        /// Market contract address
        #[arg(long)]
        market: Address,

        /// User address
        #[arg(long)]
        user: Address,
    },
}

fn parse_level(level: &str) -> Level {
    match level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    }
}

/// Parse a collateral quantity strictly; the CLI rejects what previews would zero out
fn parse_units(text: &str, decimals: u32) -> Result<Amount> {
    let value = Decimal::from_str(text.trim())
        .with_context(|| format!("invalid amount {:?}", text))?;
    if value.is_sign_negative() {
        return Err(anyhow!("amount {} must not be negative", text));
    }
    Amount::from_units(value, decimals)
        .ok_or_else(|| anyhow!("amount {} is out of range", text))
}

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command line arguments
    let args = Args::parse();

    // Load environment variables from .env file if present
    dotenvy::dotenv().ok();

    let config = load_config(Some(args.config.as_str()))?;

    // Initialize logging
    let level = parse_level(args.log_level.as_deref().unwrap_or(&config.settings.log_level));

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(true)
        .with_writer(std::io::stderr)
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    info!("Configuration file: {}", args.config);

    match args.command {
        Command::Preview {
            yes_pool,
            no_pool,
            side,
            amount,
        } => preview(&config, &yes_pool, &no_pool, side, &amount),
        Command::Show { market, user } => show(&config, market, user).await,
    }
}

fn preview(
    config: &EngineConfig,
    yes_pool: &str,
    no_pool: &str,
    side: Side,
    amount: &str,
) -> Result<()> {
    let decimals = config.collateral.decimals;
    let pool = PoolState::with_reserves(
        parse_units(yes_pool, decimals)?,
        parse_units(no_pool, decimals)?,
    );
    let quote = TradePreviewCalculator::preview(&pool, side, parse_units(amount, decimals)?);

    let symbol = &config.collateral.symbol;
    println!("Side:              {}", quote.side);
    println!(
        "Stake:             {} {}",
        quote.proposed_amount.to_units(decimals),
        symbol
    );
    println!(
        "YES probability:   {}% -> {}%",
        quote.current_probability_percent.round_dp(2),
        quote.new_probability_percent.round_dp(2)
    );
    println!("Price impact:      {}%", quote.price_impact_percent.round_dp(2));
    println!(
        "Expected payout:   {} {}",
        quote.expected_payout.to_units(decimals),
        symbol
    );

    let side_probability = match side {
        Side::Yes => quote.new_probability_percent,
        Side::No => Decimal::ONE_HUNDRED - quote.new_probability_percent,
    };
    match PricingEngine::implied_decimal_odds(side_probability) {
        Some(odds) => println!("Implied odds:      {}", odds.round_dp(2)),
        None => println!("Implied odds:      N/A"),
    }
    Ok(())
}

async fn show(config: &EngineConfig, market: Address, user: Address) -> Result<()> {
    let store = JsonFileCacheStore::new(&config.cache.directory);
    let key = CacheKey::new(market, user);

    let snapshot = store.get(&key).await?.ok_or_else(|| {
        anyhow!(
            "no cached position for {} in {}",
            key,
            store.directory().display()
        )
    })?;

    let age_ms = elapsed_ms(snapshot.observed_at, chrono::Utc::now());
    if age_ms >= config.refresh.staleness_bound_ms {
        warn!("Cached position is {} s old", age_ms / 1000);
    }

    let pool = &snapshot.pool;
    let holdings = &snapshot.holdings;
    let output = serde_json::json!({
        "market": snapshot.market_id,
        "user": snapshot.user_id,
        "observed_at": snapshot.observed_at,
        "age_ms": age_ms,
        "position": PricingEngine::derive_position(&snapshot),
        "potential_winnings": {
            "yes": PricingEngine::potential_winnings(pool, Side::Yes, holdings.yes_balance),
            "no": PricingEngine::potential_winnings(pool, Side::No, holdings.no_balance),
        },
        "liquidity_withdrawal":
            PricingEngine::liquidity_withdrawal(pool, holdings.liquidity_shares),
    });
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}
