//! CLI argument definitions for stockfeed.
//!
//! # Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `price` | Latest price for one or more tickers |
//! | `series` | Historical bars for one ticker |
//!
//! # Examples
//!
//! ```bash
//! stockfeed price AAPL MSFT GOOGL
//! stockfeed price AAPL --providers yahoo,finnhub --deadline-secs 5
//! stockfeed series AAPL --interval weekly --lookback 12 --json
//! ```

use clap::{Args, Parser, Subcommand};
use stockfeed_market_data::Interval;

#[derive(Debug, Parser)]
#[command(
    name = "stockfeed",
    version,
    about = "Normalized stock quotes from Alpha Vantage, Yahoo Finance and Finnhub"
)]
pub struct Cli {
    /// Comma-separated provider order, e.g. `yahoo,finnhub`.
    ///
    /// Defaults to STOCKFEED_PROVIDERS, then ALPHA_VANTAGE,YAHOO,FINNHUB.
    #[arg(long, global = true)]
    pub providers: Option<String>,

    /// Give up on a request after this many seconds, across all providers.
    #[arg(long, global = true)]
    pub deadline_secs: Option<u64>,

    /// Print one JSON object per line instead of text.
    #[arg(long, global = true, default_value_t = false)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Fetch the latest price for each ticker, concurrently.
    Price(PriceArgs),

    /// Fetch the most recent bars for a ticker.
    Series(SeriesArgs),
}

#[derive(Debug, Args)]
pub struct PriceArgs {
    /// Ticker symbols, e.g. AAPL BRK.B
    #[arg(required = true)]
    pub tickers: Vec<String>,
}

#[derive(Debug, Args)]
pub struct SeriesArgs {
    pub ticker: String,

    /// daily, weekly or monthly
    #[arg(long, default_value = "daily")]
    pub interval: Interval,

    /// Number of most recent bars to return.
    #[arg(long, default_value_t = 30)]
    pub lookback: usize,
}
