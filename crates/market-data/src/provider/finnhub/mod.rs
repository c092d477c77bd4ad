//! Finnhub market data provider implementation.
//!
//! This module provides market data from Finnhub API:
//! - Latest prices via the /quote endpoint
//! - Daily, weekly and monthly candles via /stock/candle
//!
//! Finnhub free tier is limited to 60 API calls per minute.
//! API documentation: https://finnhub.io/docs/api

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::Url;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::clock::Clock;
use crate::config::ProviderConfig;
use crate::errors::{MarketDataError, ParseFailure};
use crate::models::{Bar, Interval, ProviderId, Quote, Series, Ticker};
use crate::provider::http::{fetch_body, parse_json, HttpRequest, HttpTransport};
use crate::provider::{decimal_from_f64, unix_to_utc, MarketDataProvider, RateLimit};
use crate::series;

const PROVIDER_ID: ProviderId = ProviderId::Finnhub;

const TOKEN_HEADER: &str = "X-Finnhub-Token";

// ============================================================================
// API Response Structures
// ============================================================================

/// Response from /quote endpoint
#[derive(Debug, Deserialize)]
struct QuoteResponse {
    /// Current price
    c: Option<f64>,
    /// Timestamp (Unix)
    t: Option<i64>,
    /// Present instead of data on quota or access errors
    error: Option<String>,
    // Note: d, dp, h, l, o, pc exist but are not part of the normalized quote
}

/// Response from /stock/candle endpoint
#[derive(Debug, Deserialize)]
struct CandleResponse {
    /// Status: "ok" or "no_data"
    s: Option<String>,
    /// Close prices
    c: Option<Vec<f64>>,
    /// High prices
    #[serde(default)]
    h: Vec<f64>,
    /// Low prices
    #[serde(default)]
    l: Vec<f64>,
    /// Open prices
    #[serde(default)]
    o: Vec<f64>,
    /// Volume
    #[serde(default)]
    v: Vec<f64>,
    /// Timestamps (Unix)
    #[serde(default)]
    t: Vec<i64>,
    error: Option<String>,
}

// ============================================================================
// Finnhub Provider
// ============================================================================

/// Finnhub market data provider.
pub struct FinnhubProvider {
    config: ProviderConfig,
    transport: Arc<dyn HttpTransport>,
    clock: Arc<dyn Clock>,
}

impl FinnhubProvider {
    /// Create a new Finnhub provider. Fails if the API key is missing.
    pub fn new(
        config: ProviderConfig,
        transport: Arc<dyn HttpTransport>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, MarketDataError> {
        config.validate()?;
        Ok(Self {
            config,
            transport,
            clock,
        })
    }

    fn resolution(interval: Interval) -> &'static str {
        match interval {
            Interval::Daily => "D",
            Interval::Weekly => "W",
            Interval::Monthly => "M",
        }
    }

    /// Make an authenticated GET request. The token travels in a header,
    /// never in the URL.
    async fn fetch(
        &self,
        endpoint: &str,
        params: &[(&str, String)],
    ) -> Result<String, MarketDataError> {
        let url = Url::parse_with_params(&format!("{}{}", self.config.base_url(), endpoint), params)
            .map_err(|e| MarketDataError::validation(format!("invalid Finnhub URL: {}", e)))?;

        let api_key = self.config.api_key().unwrap_or_default();
        let request =
            HttpRequest::get(url, self.config.timeout()).with_header(TOKEN_HEADER, api_key);

        fetch_body(self.transport.as_ref(), PROVIDER_ID, request, Some(api_key)).await
    }

    /// Finnhub reports quota problems as `{"error": "API limit reached..."}`.
    fn check_api_error(error: &Option<String>) -> Result<(), MarketDataError> {
        if let Some(msg) = error {
            if msg.to_lowercase().contains("limit") {
                return Err(MarketDataError::RateLimited {
                    provider: PROVIDER_ID,
                });
            }
            warn!("Finnhub error: {}", msg);
        }
        Ok(())
    }

    fn parse_quote(&self, ticker: &Ticker, body: &str) -> Result<Quote, MarketDataError> {
        let response: QuoteResponse = parse_json(PROVIDER_ID, body)?;
        Self::check_api_error(&response.error)?;

        let close = response
            .c
            .ok_or_else(|| MarketDataError::missing_field(PROVIDER_ID, "c"))?;
        let price = decimal_from_f64(PROVIDER_ID, "c", close)?;

        // Unknown symbols come back as all zeros, including t.
        let timestamp = response
            .t
            .and_then(unix_to_utc)
            .unwrap_or_else(|| self.clock.utc_now());

        Quote::new(ticker.clone(), price, None, timestamp, PROVIDER_ID)
            .map_err(|reason| MarketDataError::parse(PROVIDER_ID, reason))
    }

    fn parse_candles(body: &str) -> Result<Vec<Bar>, MarketDataError> {
        let response: CandleResponse = parse_json(PROVIDER_ID, body)?;
        Self::check_api_error(&response.error)?;

        let status = response
            .s
            .as_deref()
            .ok_or_else(|| MarketDataError::missing_field(PROVIDER_ID, "s"))?;
        if status == "no_data" {
            return Err(MarketDataError::parse(PROVIDER_ID, ParseFailure::EmptySeries));
        }

        let closes = response
            .c
            .ok_or_else(|| MarketDataError::missing_field(PROVIDER_ID, "c"))?;

        let len = response.t.len();
        if closes.len() != len
            || response.o.len() != len
            || response.h.len() != len
            || response.l.len() != len
        {
            return Err(MarketDataError::parse(
                PROVIDER_ID,
                ParseFailure::Malformed("candle array lengths do not match".to_string()),
            ));
        }

        let mut bars = Vec::with_capacity(len);
        for i in 0..len {
            let date = unix_to_utc(response.t[i])
                .ok_or_else(|| {
                    MarketDataError::parse(
                        PROVIDER_ID,
                        ParseFailure::InvalidValue {
                            field: "t".to_string(),
                            value: response.t[i].to_string(),
                        },
                    )
                })?
                .date_naive();

            let volume = response
                .v
                .get(i)
                .filter(|v| v.is_finite() && **v >= 0.0)
                .map(|v| v.round() as u64);

            bars.push(Bar {
                date,
                open: decimal_from_f64(PROVIDER_ID, "o", response.o[i])?,
                high: decimal_from_f64(PROVIDER_ID, "h", response.h[i])?,
                low: decimal_from_f64(PROVIDER_ID, "l", response.l[i])?,
                close: decimal_from_f64(PROVIDER_ID, "c", closes[i])?,
                volume,
            });
        }

        Ok(bars)
    }
}

#[async_trait]
impl MarketDataProvider for FinnhubProvider {
    fn id(&self) -> ProviderId {
        PROVIDER_ID
    }

    fn rate_limit(&self) -> RateLimit {
        RateLimit::per_minute(self.config.requests_per_minute())
    }

    async fn fetch_quote(&self, ticker: &Ticker) -> Result<Quote, MarketDataError> {
        let body = self
            .fetch("/quote", &[("symbol", ticker.to_string())])
            .await?;
        self.parse_quote(ticker, &body)
    }

    async fn fetch_series(
        &self,
        ticker: &Ticker,
        interval: Interval,
        lookback: usize,
    ) -> Result<Series, MarketDataError> {
        let to = self.clock.utc_now();
        let from = to - interval.lookback_window(lookback);

        let body = self
            .fetch(
                "/stock/candle",
                &[
                    ("symbol", ticker.to_string()),
                    ("resolution", Self::resolution(interval).to_string()),
                    ("from", from.timestamp().to_string()),
                    ("to", to.timestamp().to_string()),
                ],
            )
            .await?;

        let bars = series::normalize(Self::parse_candles(&body)?, lookback)
            .map_err(|reason| MarketDataError::parse(PROVIDER_ID, reason))?;

        debug!("Finnhub returned {} {} bars for {}", bars.len(), interval, ticker);

        Series::new(ticker.clone(), interval, PROVIDER_ID, bars)
            .map_err(|reason| MarketDataError::parse(PROVIDER_ID, reason))
    }
}
