//! Yahoo Finance market data provider.
//!
//! This provider uses the public Yahoo Finance v8 chart API for both the
//! latest price and historical bars. No API key is required.

mod models;

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::Url;
use tracing::{debug, warn};
use urlencoding::encode;

use crate::clock::Clock;
use crate::config::ProviderConfig;
use crate::errors::{MarketDataError, ParseFailure};
use crate::models::{Bar, Interval, ProviderId, Quote, Series, Ticker};
use crate::provider::http::{fetch_body, parse_json, HttpRequest, HttpTransport};
use crate::provider::{decimal_from_f64, unix_to_utc, MarketDataProvider, RateLimit};
use crate::series;

use models::{YahooChartResponse, YahooChartResult};

const PROVIDER_ID: ProviderId = ProviderId::YahooFinance;

const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36";

// ============================================================================
// Yahoo Provider
// ============================================================================

/// Yahoo Finance market data provider.
pub struct YahooProvider {
    config: ProviderConfig,
    transport: Arc<dyn HttpTransport>,
    clock: Arc<dyn Clock>,
}

impl YahooProvider {
    /// Create a new Yahoo Finance provider.
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

    /// Yahoo spells share classes with a dash (`BRK-B`).
    fn yahoo_symbol(ticker: &Ticker) -> String {
        ticker.as_str().replace('.', "-")
    }

    fn interval_param(interval: Interval) -> &'static str {
        match interval {
            Interval::Daily => "1d",
            Interval::Weekly => "1wk",
            Interval::Monthly => "1mo",
        }
    }

    fn chart_url(
        &self,
        ticker: &Ticker,
        params: &[(&str, String)],
    ) -> Result<Url, MarketDataError> {
        let base = format!(
            "{}/v8/finance/chart/{}",
            self.config.base_url(),
            encode(&Self::yahoo_symbol(ticker))
        );
        Url::parse_with_params(&base, params)
            .map_err(|e| MarketDataError::validation(format!("invalid Yahoo URL: {}", e)))
    }

    async fn fetch_chart(&self, url: Url) -> Result<YahooChartResult, MarketDataError> {
        let request = HttpRequest::get(url, self.config.timeout())
            .with_header("user-agent", USER_AGENT);
        let body = fetch_body(self.transport.as_ref(), PROVIDER_ID, request, None).await?;

        let response: YahooChartResponse = parse_json(PROVIDER_ID, &body)?;

        if let Some(error) = &response.chart.error {
            warn!(
                "Yahoo chart error: {} - {}",
                error.code.as_deref().unwrap_or("unknown"),
                error.description.as_deref().unwrap_or("")
            );
        }

        response
            .chart
            .result
            .and_then(|results| results.into_iter().next())
            .ok_or_else(|| MarketDataError::missing_field(PROVIDER_ID, "chart.result"))
    }

    // ========================================================================
    // Payload conversion
    // ========================================================================

    fn to_quote(
        &self,
        ticker: &Ticker,
        result: YahooChartResult,
    ) -> Result<Quote, MarketDataError> {
        let meta = result
            .meta
            .ok_or_else(|| MarketDataError::missing_field(PROVIDER_ID, "meta"))?;

        let price = meta
            .regular_market_price
            .ok_or_else(|| MarketDataError::missing_field(PROVIDER_ID, "regularMarketPrice"))?;
        let price = decimal_from_f64(PROVIDER_ID, "regularMarketPrice", price)?;

        let timestamp = meta
            .regular_market_time
            .and_then(unix_to_utc)
            .unwrap_or_else(|| self.clock.utc_now());

        Quote::new(ticker.clone(), price, meta.currency, timestamp, PROVIDER_ID)
            .map_err(|reason| MarketDataError::parse(PROVIDER_ID, reason))
    }

    /// Zip the parallel arrays into bars, skipping sessions with null prices.
    fn to_bars(result: YahooChartResult) -> Result<Vec<Bar>, MarketDataError> {
        let quote = result
            .indicators
            .and_then(|i| i.quote.into_iter().next())
            .unwrap_or_default();

        let rows = result.timestamp.len();
        if rows > 0
            && [&quote.open, &quote.high, &quote.low, &quote.close]
                .iter()
                .any(|column| column.len() != rows)
        {
            return Err(MarketDataError::parse(
                PROVIDER_ID,
                ParseFailure::Malformed(format!(
                    "indicator arrays do not match {} timestamps",
                    rows
                )),
            ));
        }

        let mut bars = Vec::with_capacity(rows);
        let mut skipped = 0usize;
        for (i, ts) in result.timestamp.iter().enumerate() {
            let (Some(open), Some(high), Some(low), Some(close)) =
                (quote.open[i], quote.high[i], quote.low[i], quote.close[i])
            else {
                skipped += 1;
                continue;
            };

            let date = unix_to_utc(*ts)
                .ok_or_else(|| {
                    MarketDataError::parse(
                        PROVIDER_ID,
                        ParseFailure::InvalidValue {
                            field: "timestamp".to_string(),
                            value: ts.to_string(),
                        },
                    )
                })?
                .date_naive();

            bars.push(Bar {
                date,
                open: decimal_from_f64(PROVIDER_ID, "open", open)?,
                high: decimal_from_f64(PROVIDER_ID, "high", high)?,
                low: decimal_from_f64(PROVIDER_ID, "low", low)?,
                close: decimal_from_f64(PROVIDER_ID, "close", close)?,
                volume: quote.volume.get(i).copied().flatten(),
            });
        }

        if skipped > 0 {
            debug!("Yahoo: skipped {} bars with null prices", skipped);
        }

        Ok(bars)
    }
}

#[async_trait]
impl MarketDataProvider for YahooProvider {
    fn id(&self) -> ProviderId {
        PROVIDER_ID
    }

    fn rate_limit(&self) -> RateLimit {
        RateLimit::per_minute(self.config.requests_per_minute())
    }

    async fn fetch_quote(&self, ticker: &Ticker) -> Result<Quote, MarketDataError> {
        let url = self.chart_url(
            ticker,
            &[("interval", "1d".to_string()), ("range", "5d".to_string())],
        )?;
        let result = self.fetch_chart(url).await?;
        self.to_quote(ticker, result)
    }

    async fn fetch_series(
        &self,
        ticker: &Ticker,
        interval: Interval,
        lookback: usize,
    ) -> Result<Series, MarketDataError> {
        let end = self.clock.utc_now();
        let start = end - interval.lookback_window(lookback);

        let url = self.chart_url(
            ticker,
            &[
                ("interval", Self::interval_param(interval).to_string()),
                ("period1", start.timestamp().to_string()),
                ("period2", end.timestamp().to_string()),
                ("includePrePost", "false".to_string()),
            ],
        )?;
        let result = self.fetch_chart(url).await?;

        let bars = series::normalize(Self::to_bars(result)?, lookback)
            .map_err(|reason| MarketDataError::parse(PROVIDER_ID, reason))?;

        debug!(
            "Yahoo returned {} {} bars for {} ending {}",
            bars.len(),
            interval,
            ticker,
            end.date_naive()
        );

        Series::new(ticker.clone(), interval, PROVIDER_ID, bars)
            .map_err(|reason| MarketDataError::parse(PROVIDER_ID, reason))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::{HttpError, HttpResponse};
    use chrono::{DateTime, TimeZone, Utc};
    use futures::future::BoxFuture;
    use rust_decimal_macros::dec;
    use std::sync::Mutex;
    use std::time::Duration;
    use tokio::time::Instant;

    #[derive(Debug)]
    struct FixedClock(DateTime<Utc>);

    impl Clock for FixedClock {
        fn now(&self) -> Instant {
            Instant::now()
        }

        fn utc_now(&self) -> DateTime<Utc> {
            self.0
        }

        fn sleep(&self, duration: Duration) -> BoxFuture<'static, ()> {
            Box::pin(tokio::time::sleep(duration))
        }
    }

    struct StubTransport {
        status: u16,
        body: String,
        requests: Mutex<Vec<HttpRequest>>,
    }

    #[async_trait]
    impl HttpTransport for StubTransport {
        async fn get(&self, request: HttpRequest) -> Result<HttpResponse, HttpError> {
            self.requests.lock().unwrap().push(request);
            Ok(HttpResponse::new(self.status, self.body.clone()))
        }
    }

    fn setup(status: u16, body: &str) -> (YahooProvider, Arc<StubTransport>) {
        let transport = Arc::new(StubTransport {
            status,
            body: body.to_string(),
            requests: Mutex::new(Vec::new()),
        });
        let clock = FixedClock(Utc.with_ymd_and_hms(2024, 1, 10, 0, 0, 0).unwrap());
        let provider = YahooProvider::new(
            ProviderConfig::defaults(ProviderId::YahooFinance),
            transport.clone(),
            Arc::new(clock),
        )
        .unwrap();
        (provider, transport)
    }

    #[test]
    fn test_interval_param_is_total() {
        assert_eq!(YahooProvider::interval_param(Interval::Daily), "1d");
        assert_eq!(YahooProvider::interval_param(Interval::Weekly), "1wk");
        assert_eq!(YahooProvider::interval_param(Interval::Monthly), "1mo");
    }

    #[tokio::test]
    async fn test_fetch_quote() {
        let json = r#"{"chart": {"result": [{
            "meta": {"currency": "USD", "symbol": "AAPL", "regularMarketPrice": 185.92, "regularMarketTime": 1704488401},
            "timestamp": [1704488400],
            "indicators": {"quote": [{"open": [181.99], "high": [182.76], "low": [180.17], "close": [181.18], "volume": [62303300]}]}
        }], "error": null}}"#;
        let (provider, transport) = setup(200, json);

        let quote = provider
            .fetch_quote(&Ticker::parse("AAPL").unwrap())
            .await
            .unwrap();

        assert_eq!(quote.price(), dec!(185.92));
        assert_eq!(quote.currency(), "USD");
        assert_eq!(quote.source(), ProviderId::YahooFinance);
        assert_eq!(quote.timestamp().timestamp(), 1704488401);

        let requests = transport.requests.lock().unwrap();
        assert_eq!(requests.len(), 1);
        assert!(requests[0]
            .url
            .as_str()
            .starts_with("https://query1.finance.yahoo.com/v8/finance/chart/AAPL?"));
        let query: Vec<(String, String)> = requests[0]
            .url
            .query_pairs()
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();
        assert!(query.contains(&("interval".to_string(), "1d".to_string())));
        assert!(query.contains(&("range".to_string(), "5d".to_string())));
        assert!(requests[0].headers.iter().any(|(name, _)| *name == "user-agent"));
    }

    #[tokio::test]
    async fn test_share_class_symbol_uses_dash() {
        let json = r#"{"chart": {"result": [{"meta": {"regularMarketPrice": 410.5}}], "error": null}}"#;
        let (provider, transport) = setup(200, json);

        provider
            .fetch_quote(&Ticker::parse("BRK.B").unwrap())
            .await
            .unwrap();

        let requests = transport.requests.lock().unwrap();
        assert!(requests[0].url.path().ends_with("/chart/BRK-B"));
    }

    #[tokio::test]
    async fn test_missing_price_is_parse_error() {
        let json = r#"{"chart": {"result": [{"meta": {"currency": "USD"}}], "error": null}}"#;
        let (provider, _) = setup(200, json);

        let err = provider
            .fetch_quote(&Ticker::parse("AAPL").unwrap())
            .await
            .unwrap_err();
        match err {
            MarketDataError::Parse { reason, .. } => assert_eq!(
                reason,
                ParseFailure::MissingField("regularMarketPrice".to_string())
            ),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_chart_error_is_missing_result() {
        let json = r#"{"chart": {"result": null, "error": {"code": "Not Found", "description": "No data found, symbol may be delisted"}}}"#;
        let (provider, _) = setup(200, json);

        let err = provider
            .fetch_quote(&Ticker::parse("ZZZZ").unwrap())
            .await
            .unwrap_err();
        match err {
            MarketDataError::Parse { reason, .. } => {
                assert_eq!(reason, ParseFailure::MissingField("chart.result".to_string()))
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_fetch_series_skips_null_rows() {
        let json = r#"{"chart": {"result": [{
            "meta": {"currency": "USD"},
            "timestamp": [1704205800, 1704292200, 1704378600, 1704465000],
            "indicators": {"quote": [{
                "open":   [187.15, 184.22, null, 181.99],
                "high":   [188.44, 185.88, null, 182.76],
                "low":    [183.89, 183.43, null, 180.17],
                "close":  [185.64, 184.25, null, 181.18],
                "volume": [82488700, 58414500, null, 62303300]
            }]}
        }], "error": null}}"#;
        let (provider, transport) = setup(200, json);

        let series = provider
            .fetch_series(&Ticker::parse("AAPL").unwrap(), Interval::Daily, 10)
            .await
            .unwrap();

        assert_eq!(series.len(), 3);
        assert_eq!(series.first().date.to_string(), "2024-01-02");
        assert_eq!(series.last().date.to_string(), "2024-01-05");
        assert_eq!(series.last().volume, Some(62303300));
        assert!(series.bars().windows(2).all(|w| w[0].date < w[1].date));

        let requests = transport.requests.lock().unwrap();
        let url = requests[0].url.as_str();
        assert!(url.contains("interval=1d"));
        // 10 daily bars -> 21 day window ending 2024-01-10
        assert!(url.contains("period1=1703030400"));
        assert!(url.contains("period2=1704844800"));
    }

    #[tokio::test]
    async fn test_no_timestamps_is_empty_series() {
        let json = r#"{"chart": {"result": [{"meta": {"currency": "USD"}, "indicators": {"quote": [{}]}}], "error": null}}"#;
        let (provider, _) = setup(200, json);

        let err = provider
            .fetch_series(&Ticker::parse("AAPL").unwrap(), Interval::Monthly, 3)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            MarketDataError::Parse {
                reason: ParseFailure::EmptySeries,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_mismatched_arrays_are_malformed() {
        let json = r#"{"chart": {"result": [{
            "timestamp": [1704205800, 1704292200],
            "indicators": {"quote": [{"open": [1.0], "high": [1.0], "low": [1.0], "close": [1.0]}]}
        }], "error": null}}"#;
        let (provider, _) = setup(200, json);

        let err = provider
            .fetch_series(&Ticker::parse("AAPL").unwrap(), Interval::Daily, 3)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            MarketDataError::Parse {
                reason: ParseFailure::Malformed(_),
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_not_found_status_is_transport_error() {
        let (provider, _) = setup(404, r#"{"chart": {"result": null}}"#);

        let err = provider
            .fetch_quote(&Ticker::parse("ZZZZ").unwrap())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            MarketDataError::Transport {
                status: Some(404),
                ..
            }
        ));
    }
}
