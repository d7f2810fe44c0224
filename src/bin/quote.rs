//! Quote
//!
//! Prints the quote table for a contract fixture.
//!
//! Use `-f` to pick a fixture under `fixtures/contracts`
//! Use `-g` to override the general discount (percent points)
//! Use `-t` to type a target total (e.g. "900 TRY") and derive the general discount from it

use std::{
    io::{self, Write},
    path::PathBuf,
    time::Instant,
};

use anyhow::Result;
use clap::{Parser, ValueEnum};
use rust_decimal::Decimal;
use tracing::{debug, info};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use subscription_pricing::{
    config::PricingConfig,
    discounts::{from_points, percent_points},
    exchange::RateBook,
    fixtures::{Fixture, contracts::parse_price},
    summary,
};

/// Log output format.
#[derive(Clone, Copy, Debug, ValueEnum)]
enum LogFormat {
    /// Compact, human-readable logs.
    Compact,

    /// Structured JSON logs.
    Json,
}

/// Render a subscription or contract quote
#[derive(Debug, Parser)]
#[command(name = "quote", about = "Render a pricing quote for a contract fixture", long_about = None)]
struct QuoteArgs {
    /// Contract fixture name
    #[arg(short, long, default_value = "sozlesme")]
    fixture: String,

    /// Directory holding the `contracts` fixture folder
    #[arg(long, env = "PRICING_FIXTURES", default_value = "./fixtures")]
    fixtures_dir: PathBuf,

    /// General discount in percent points, replacing the fixture's
    #[arg(short, long)]
    general_discount: Option<Decimal>,

    /// Target total for one currency group (e.g. "900 TRY")
    #[arg(short, long)]
    target: Option<String>,

    /// Pricing config YAML
    #[arg(short, long, env = "PRICING_CONFIG")]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, env = "RUST_LOG", default_value = "info")]
    log_level: String,

    /// Log format (compact, json)
    #[arg(long, env = "LOG_FORMAT", value_enum, default_value_t = LogFormat::Compact)]
    log_format: LogFormat,
}

/// `--log-level` already falls back to `RUST_LOG`, so the environment is not read again.
fn log_filter(args: &QuoteArgs) -> Result<EnvFilter> {
    Ok(EnvFilter::try_new(&args.log_level)?)
}

fn init_logging(args: &QuoteArgs) -> Result<()> {
    let registry = tracing_subscriber::registry().with(log_filter(args)?);

    match args.log_format {
        LogFormat::Compact => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .compact()
                    .with_target(true)
                    .with_writer(io::stderr),
            )
            .try_init()?,
        LogFormat::Json => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_target(true)
                    .with_writer(io::stderr),
            )
            .try_init()?,
    }

    Ok(())
}

/// Quote entry point
pub fn main() -> Result<()> {
    let args = QuoteArgs::parse();

    init_logging(&args)?;

    let config = args
        .config
        .as_deref()
        .map(PricingConfig::load)
        .transpose()?
        .unwrap_or_default();

    debug!(?config, "pricing config loaded");

    let mut fixture = Fixture::with_base_path(&args.fixtures_dir);

    fixture.load_contract(&args.fixture)?;

    let mut session = fixture.session(&config)?;
    let mut rates = RateBook::from_config(&config)?;

    session.refresh_rates(&mut rates, &fixture, Instant::now())?;

    if let Some(points) = args.general_discount {
        session.set_general_discount(from_points(points))?;
    }

    if let Some(typed) = args.target.as_deref() {
        let now = Instant::now();

        session.edit_target_total(parse_price(typed)?, now);

        if let Some(percent) = session.poll(now + config.debounce_window())? {
            info!(
                typed,
                percent = %percent_points(percent),
                "general discount derived from target total"
            );
        }
    }

    let totals = session.aggregate()?;

    let stdout = io::stdout();
    let mut handle = stdout.lock();

    if let Some(title) = fixture.title() {
        writeln!(handle, "\n {title}")?;
    }

    summary::write_to(&mut handle, session.lines(), &totals)?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use testresult::TestResult;

    use super::*;

    #[test]
    fn log_filter_follows_the_log_level_flag() -> TestResult {
        let args =
            QuoteArgs::try_parse_from(["quote", "--log-level", "subscription_pricing=debug"])?;

        assert_eq!(log_filter(&args)?.to_string(), "subscription_pricing=debug");

        Ok(())
    }

    #[test]
    fn invalid_log_level_is_an_error() -> TestResult {
        let args =
            QuoteArgs::try_parse_from(["quote", "--log-level", "subscription_pricing=loud"])?;

        assert!(log_filter(&args).is_err());

        Ok(())
    }
}
