//! Market data provider abstractions and implementations.
//!
//! This module contains:
//! - The `MarketDataProvider` trait that all providers implement
//! - The HTTP transport seam adapters issue their single call through
//! - Concrete provider implementations (Alpha Vantage, Yahoo, Finnhub)
//!
//! # Architecture
//!
//! The provider system is designed to be:
//! - **Provider-agnostic**: The client only sees `MarketDataProvider`
//! - **Closed**: Providers are a `ProviderId` enum, and every interval mapping
//!   is an exhaustive `match`
//! - **Testable**: Adapters take an `HttpTransport` and a `Clock`, so payload
//!   handling is exercised without network or real time

mod http;
mod rate_limit;
mod traits;

pub mod alpha_vantage;
pub mod finnhub;
pub mod yahoo;

use std::sync::Arc;

use chrono::{DateTime, Utc};
use num_traits::FromPrimitive;
use rust_decimal::Decimal;

use crate::clock::Clock;
use crate::config::ProviderConfig;
use crate::errors::{MarketDataError, ParseFailure};
use crate::models::ProviderId;

// Re-exports
pub use http::{mask_secret, HttpError, HttpRequest, HttpResponse, HttpTransport, ReqwestTransport};
pub use rate_limit::RateLimit;
pub use traits::MarketDataProvider;

/// Build the adapter for `config.id()`.
pub fn build_provider(
    config: ProviderConfig,
    transport: Arc<dyn HttpTransport>,
    clock: Arc<dyn Clock>,
) -> Result<Arc<dyn MarketDataProvider>, MarketDataError> {
    let provider: Arc<dyn MarketDataProvider> = match config.id() {
        ProviderId::AlphaVantage => Arc::new(alpha_vantage::AlphaVantageProvider::new(
            config, transport, clock,
        )?),
        ProviderId::YahooFinance => {
            Arc::new(yahoo::YahooProvider::new(config, transport, clock)?)
        }
        ProviderId::Finnhub => Arc::new(finnhub::FinnhubProvider::new(config, transport, clock)?),
    };
    Ok(provider)
}

/// Convert a JSON float to `Decimal`, rejecting NaN and infinities.
pub(crate) fn decimal_from_f64(
    provider: ProviderId,
    field: &str,
    value: f64,
) -> Result<Decimal, MarketDataError> {
    Decimal::from_f64(value)
        .map(|d| d.normalize())
        .ok_or_else(|| {
            MarketDataError::parse(
                provider,
                ParseFailure::InvalidValue {
                    field: field.to_string(),
                    value: value.to_string(),
                },
            )
        })
}

/// Unix seconds to UTC, `None` for zero or out-of-range values.
pub(crate) fn unix_to_utc(seconds: i64) -> Option<DateTime<Utc>> {
    if seconds <= 0 {
        return None;
    }
    DateTime::from_timestamp(seconds, 0)
}
