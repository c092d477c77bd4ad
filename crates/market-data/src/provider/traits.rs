//! Market data provider trait definitions.
//!
//! This module defines the core `MarketDataProvider` trait that all
//! market data providers must implement.

use async_trait::async_trait;

use crate::errors::MarketDataError;
use crate::models::{Interval, ProviderId, Quote, Series, Ticker};

use super::rate_limit::RateLimit;

/// Trait for market data providers.
///
/// An adapter translates a normalized request into exactly one HTTP call to
/// its upstream and parses the answer back into the normalized model. It
/// never retries; the client owns retries so rate accounting stays in one
/// place.
///
/// # Example
///
/// ```ignore
/// use async_trait::async_trait;
/// use stockfeed_market_data::provider::{MarketDataProvider, RateLimit};
///
/// struct MyProvider {
///     api_key: String,
/// }
///
/// #[async_trait]
/// impl MarketDataProvider for MyProvider {
///     fn id(&self) -> ProviderId {
///         ProviderId::Finnhub
///     }
///
///     fn rate_limit(&self) -> RateLimit {
///         RateLimit::per_minute(60)
///     }
///
///     // ... implement fetch methods
/// }
/// ```
#[async_trait]
pub trait MarketDataProvider: Send + Sync {
    /// Which upstream this adapter talks to.
    fn id(&self) -> ProviderId;

    /// Request ceiling the client enforces before each call.
    fn rate_limit(&self) -> RateLimit;

    /// Fetch the latest price for a ticker.
    ///
    /// # Errors
    ///
    /// - `Transport` when no response or a non-2xx response came back
    /// - `RateLimited` when the upstream signaled quota exhaustion
    /// - `Parse` when the 2xx payload lacks a positive price
    async fn fetch_quote(&self, ticker: &Ticker) -> Result<Quote, MarketDataError>;

    /// Fetch up to `lookback` of the most recent bars at `interval`.
    ///
    /// The result is ordered oldest-to-newest. A successful call with no bars
    /// fails with `Parse(EmptySeries)`.
    async fn fetch_series(
        &self,
        ticker: &Ticker,
        interval: Interval,
        lookback: usize,
    ) -> Result<Series, MarketDataError>;
}
