//! Yahoo Finance chart API response models.
//!
//! The v8 chart endpoint serves both the latest price (in `meta`) and the
//! historical bars (parallel arrays under `indicators.quote[0]`).

use serde::Deserialize;

/// Main response wrapper for the chart API
#[derive(Debug, Deserialize)]
pub struct YahooChartResponse {
    pub chart: YahooChart,
}

#[derive(Debug, Deserialize)]
pub struct YahooChart {
    pub result: Option<Vec<YahooChartResult>>,
    pub error: Option<YahooChartError>,
}

/// Error object, e.g. `{"code": "Not Found", "description": "No data found, symbol may be delisted"}`
#[derive(Debug, Deserialize)]
pub struct YahooChartError {
    pub code: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct YahooChartResult {
    pub meta: Option<YahooChartMeta>,
    /// Unix seconds, one per bar. Absent when the range has no data.
    #[serde(default)]
    pub timestamp: Vec<i64>,
    pub indicators: Option<YahooIndicators>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct YahooChartMeta {
    pub currency: Option<String>,
    pub symbol: Option<String>,
    pub regular_market_price: Option<f64>,
    pub regular_market_time: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct YahooIndicators {
    #[serde(default)]
    pub quote: Vec<YahooIndicatorQuote>,
}

/// Parallel OHLCV arrays. Entries are null for sessions without trades.
#[derive(Debug, Default, Deserialize)]
pub struct YahooIndicatorQuote {
    #[serde(default)]
    pub open: Vec<Option<f64>>,
    #[serde(default)]
    pub high: Vec<Option<f64>>,
    #[serde(default)]
    pub low: Vec<Option<f64>>,
    #[serde(default)]
    pub close: Vec<Option<f64>>,
    #[serde(default)]
    pub volume: Vec<Option<u64>>,
}
