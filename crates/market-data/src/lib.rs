//! Stockfeed Market Data Crate
//!
//! This crate provides normalized stock quotes and historical series on top
//! of several free market data APIs, with per-provider rate limiting and
//! fallback between providers.
//!
//! # Overview
//!
//! The market data crate supports:
//! - Multiple providers: Alpha Vantage, Yahoo Finance, Finnhub
//! - Latest price and daily/weekly/monthly bars in one normalized shape
//! - Token-bucket rate limiting per provider, fair across concurrent callers
//! - Bounded retries for transient failures, then fallback to the next provider
//!
//! # Architecture
//!
//! ```text
//! +------------------+
//! |     Caller       |  (CLI, service, ...)
//! +------------------+
//!          |
//!          v
//! +------------------+     +------------------+
//! | MarketDataClient | --> |   RateLimiter    |  (one bucket per provider)
//! +------------------+     +------------------+
//!          |
//!          v
//! +------------------+     +------------------+
//! | Provider Adapter | --> |  HttpTransport   |  (one GET per call)
//! +------------------+     +------------------+
//!          |
//!          v
//! +------------------+
//! |  Quote / Series  |  (normalized, oldest bar first)
//! +------------------+
//! ```
//!
//! # Core Types
//!
//! - [`MarketDataClient`] - Fallback/retry client over configured providers
//! - [`ClientConfig`] - Provider selection, keys and limits, usually from env
//! - [`Quote`] - Latest price with currency and source
//! - [`Series`] / [`Bar`] - Historical OHLCV bars
//! - [`MarketDataError`] - Every failure a caller can see
//!
//! # Example
//!
//! ```no_run
//! use stockfeed_market_data::{ClientConfig, Interval, MarketDataClient};
//!
//! # async fn run() -> Result<(), stockfeed_market_data::MarketDataError> {
//! let client = MarketDataClient::from_config(ClientConfig::from_env()?)?;
//!
//! let quote = client.get_price("AAPL").await?;
//! println!("{} {} {}", quote.ticker(), quote.price(), quote.currency());
//!
//! let series = client.get_series("MSFT", Interval::Weekly, 12).await?;
//! println!("{} bars from {}", series.len(), series.source());
//! # Ok(())
//! # }
//! ```

pub mod clock;
pub mod config;
pub mod errors;
pub mod models;
pub mod provider;
pub mod registry;
pub mod series;

// Re-export all public types from models
pub use models::{Bar, Interval, ProviderId, Quote, Series, Ticker, DEFAULT_CURRENCY};

pub use clock::{Clock, SystemClock};
pub use config::{ClientConfig, ConfigError, ProviderConfig, RetryPolicy};
pub use errors::{MarketDataError, ParseFailure, RetryClass};

// Re-export provider types
pub use provider::alpha_vantage::AlphaVantageProvider;
pub use provider::finnhub::FinnhubProvider;
pub use provider::yahoo::YahooProvider;
pub use provider::{HttpTransport, MarketDataProvider, RateLimit, ReqwestTransport};

// Re-export registry types
pub use registry::{
    FetchDiagnostics, MarketDataClient, ProviderAttempt, ProviderPreference, RateLimiter,
    SkipReason,
};
