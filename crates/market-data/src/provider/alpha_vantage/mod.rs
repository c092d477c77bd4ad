//! Alpha Vantage market data provider implementation.
//!
//! This module provides market data from Alpha Vantage API:
//! - Latest prices via the GLOBAL_QUOTE endpoint
//! - Daily, weekly and monthly bars via TIME_SERIES_DAILY / _WEEKLY / _MONTHLY
//!
//! Note: Alpha Vantage free tier is limited to 5 API calls per minute, and it
//! reports quota exhaustion as a 200 response with a "Note" or "Information"
//! field instead of HTTP 429.

use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use log::{debug, warn};
use reqwest::Url;
use rust_decimal::Decimal;
use serde::Deserialize;

use crate::clock::Clock;
use crate::config::ProviderConfig;
use crate::errors::{MarketDataError, ParseFailure};
use crate::models::{Bar, Interval, ProviderId, Quote, Series, Ticker};
use crate::provider::http::{fetch_body, mask_secret, parse_json, HttpRequest, HttpTransport};
use crate::provider::{MarketDataProvider, RateLimit};
use crate::series;

const PROVIDER_ID: ProviderId = ProviderId::AlphaVantage;

/// Largest lookback served by `outputsize=compact`.
const COMPACT_OUTPUT_SIZE: usize = 100;

/// Alpha Vantage market data provider.
pub struct AlphaVantageProvider {
    config: ProviderConfig,
    transport: Arc<dyn HttpTransport>,
    clock: Arc<dyn Clock>,
}

// ============================================================================
// Response structures for Alpha Vantage API
// ============================================================================

/// GLOBAL_QUOTE response
#[derive(Debug, Deserialize)]
struct GlobalQuoteResponse {
    #[serde(rename = "Global Quote")]
    global_quote: Option<GlobalQuote>,
    #[serde(rename = "Error Message")]
    error_message: Option<String>,
    #[serde(rename = "Note")]
    note: Option<String>,
    #[serde(rename = "Information")]
    information: Option<String>,
}

/// Invalid symbols come back as an empty `"Global Quote": {}` object.
#[derive(Debug, Deserialize)]
struct GlobalQuote {
    #[serde(rename = "05. price")]
    price: Option<String>,
    #[serde(rename = "07. latest trading day")]
    latest_trading_day: Option<String>,
}

/// TIME_SERIES_* response. Each function names its payload differently, so
/// the payload is picked out of `sections` by the requested interval's key.
#[derive(Debug, Deserialize)]
struct TimeSeriesResponse {
    #[serde(flatten)]
    sections: HashMap<String, serde_json::Value>,
    #[serde(rename = "Error Message")]
    error_message: Option<String>,
    #[serde(rename = "Note")]
    note: Option<String>,
    #[serde(rename = "Information")]
    information: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SeriesEntry {
    #[serde(rename = "1. open")]
    open: String,
    #[serde(rename = "2. high")]
    high: String,
    #[serde(rename = "3. low")]
    low: String,
    #[serde(rename = "4. close")]
    close: String,
    #[serde(rename = "5. volume")]
    volume: Option<String>,
}

// ============================================================================
// Implementation
// ============================================================================

impl AlphaVantageProvider {
    /// Create a new Alpha Vantage provider. Fails if the API key is missing.
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

    fn api_key(&self) -> &str {
        self.config.api_key().unwrap_or_default()
    }

    /// Function name and payload key for each interval.
    fn series_function(interval: Interval) -> (&'static str, &'static str) {
        match interval {
            Interval::Daily => ("TIME_SERIES_DAILY", "Time Series (Daily)"),
            Interval::Weekly => ("TIME_SERIES_WEEKLY", "Weekly Time Series"),
            Interval::Monthly => ("TIME_SERIES_MONTHLY", "Monthly Time Series"),
        }
    }

    /// Issue one query and return the raw body.
    async fn query(&self, params: &[(&str, &str)]) -> Result<String, MarketDataError> {
        let url = Url::parse_with_params(
            self.config.base_url(),
            params.iter().copied().chain([("apikey", self.api_key())]),
        )
        .map_err(|e| MarketDataError::validation(format!("invalid Alpha Vantage URL: {}", e)))?;

        let request = HttpRequest::get(url, self.config.timeout());
        fetch_body(
            self.transport.as_ref(),
            PROVIDER_ID,
            request,
            Some(self.api_key()),
        )
        .await
    }

    /// Check for the error fields Alpha Vantage returns in place of data.
    ///
    /// Quota notes become `RateLimited`. Anything else is only logged; the
    /// caller then fails on the missing payload field.
    fn check_api_error(
        &self,
        symbol: &str,
        error_message: &Option<String>,
        note: &Option<String>,
        information: &Option<String>,
    ) -> Result<(), MarketDataError> {
        for msg in [note, information].into_iter().flatten() {
            let lower = msg.to_lowercase();
            if lower.contains("api call frequency")
                || lower.contains("rate limit")
                || lower.contains("requests per day")
            {
                return Err(MarketDataError::RateLimited {
                    provider: PROVIDER_ID,
                });
            }
            warn!(
                "Alpha Vantage note for {}: {}",
                symbol,
                mask_secret(msg, Some(self.api_key()))
            );
        }

        if let Some(msg) = error_message {
            warn!(
                "Alpha Vantage error for {}: {}",
                symbol,
                mask_secret(msg, Some(self.api_key()))
            );
        }

        Ok(())
    }

    /// Parse a date string in YYYY-MM-DD format.
    fn parse_date(date_str: &str) -> Result<NaiveDate, MarketDataError> {
        NaiveDate::parse_from_str(date_str, "%Y-%m-%d").map_err(|_| invalid("date", date_str))
    }

    /// Parse a decimal value from a string.
    fn parse_decimal(field: &str, s: &str) -> Result<Decimal, MarketDataError> {
        Decimal::from_str(s.trim()).map_err(|_| invalid(field, s))
    }

    fn to_bar(date: &str, entry: &SeriesEntry) -> Result<Bar, MarketDataError> {
        let volume = match entry.volume.as_deref() {
            Some(v) => Some(v.trim().parse::<u64>().map_err(|_| invalid("5. volume", v))?),
            None => None,
        };

        Ok(Bar {
            date: Self::parse_date(date)?,
            open: Self::parse_decimal("1. open", &entry.open)?,
            high: Self::parse_decimal("2. high", &entry.high)?,
            low: Self::parse_decimal("3. low", &entry.low)?,
            close: Self::parse_decimal("4. close", &entry.close)?,
            volume,
        })
    }

    fn parse_quote(&self, ticker: &Ticker, body: &str) -> Result<Quote, MarketDataError> {
        let response: GlobalQuoteResponse = parse_json(PROVIDER_ID, body)?;
        self.check_api_error(
            ticker.as_str(),
            &response.error_message,
            &response.note,
            &response.information,
        )?;

        let quote = response
            .global_quote
            .ok_or_else(|| MarketDataError::missing_field(PROVIDER_ID, "Global Quote"))?;
        let price = quote
            .price
            .as_deref()
            .ok_or_else(|| MarketDataError::missing_field(PROVIDER_ID, "05. price"))?;
        let price = Self::parse_decimal("05. price", price)?;

        let timestamp = quote
            .latest_trading_day
            .as_deref()
            .and_then(|d| Self::parse_date(d).ok())
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .map(|dt| DateTime::<Utc>::from_naive_utc_and_offset(dt, Utc))
            .unwrap_or_else(|| self.clock.utc_now());

        Quote::new(ticker.clone(), price, None, timestamp, PROVIDER_ID)
            .map_err(|reason| MarketDataError::parse(PROVIDER_ID, reason))
    }

    fn parse_series(
        &self,
        ticker: &Ticker,
        interval: Interval,
        lookback: usize,
        body: &str,
    ) -> Result<Series, MarketDataError> {
        let response: TimeSeriesResponse = parse_json(PROVIDER_ID, body)?;
        self.check_api_error(
            ticker.as_str(),
            &response.error_message,
            &response.note,
            &response.information,
        )?;

        let (_, key) = Self::series_function(interval);
        let mut sections = response.sections;
        let payload = sections
            .remove(key)
            .ok_or_else(|| MarketDataError::missing_field(PROVIDER_ID, key))?;
        let time_series: HashMap<String, SeriesEntry> =
            serde_json::from_value(payload).map_err(|e| {
                MarketDataError::parse(PROVIDER_ID, ParseFailure::Malformed(e.to_string()))
            })?;

        let bars = time_series
            .iter()
            .map(|(date, entry)| Self::to_bar(date, entry))
            .collect::<Result<Vec<_>, _>>()?;

        let bars = series::normalize(bars, lookback)
            .map_err(|reason| MarketDataError::parse(PROVIDER_ID, reason))?;

        debug!(
            "Alpha Vantage returned {} {} bars for {}",
            bars.len(),
            interval,
            ticker
        );

        Series::new(ticker.clone(), interval, PROVIDER_ID, bars)
            .map_err(|reason| MarketDataError::parse(PROVIDER_ID, reason))
    }
}

fn invalid(field: &str, value: &str) -> MarketDataError {
    MarketDataError::parse(
        PROVIDER_ID,
        ParseFailure::InvalidValue {
            field: field.to_string(),
            value: value.to_string(),
        },
    )
}

#[async_trait]
impl MarketDataProvider for AlphaVantageProvider {
    fn id(&self) -> ProviderId {
        PROVIDER_ID
    }

    fn rate_limit(&self) -> RateLimit {
        RateLimit::per_minute(self.config.requests_per_minute())
    }

    async fn fetch_quote(&self, ticker: &Ticker) -> Result<Quote, MarketDataError> {
        let body = self
            .query(&[("function", "GLOBAL_QUOTE"), ("symbol", ticker.as_str())])
            .await?;
        self.parse_quote(ticker, &body)
    }

    async fn fetch_series(
        &self,
        ticker: &Ticker,
        interval: Interval,
        lookback: usize,
    ) -> Result<Series, MarketDataError> {
        let (function, _) = Self::series_function(interval);
        let output_size = if lookback <= COMPACT_OUTPUT_SIZE {
            "compact"
        } else {
            "full"
        };

        let body = self
            .query(&[
                ("function", function),
                ("symbol", ticker.as_str()),
                ("outputsize", output_size),
            ])
            .await?;
        self.parse_series(ticker, interval, lookback, &body)
    }
}
