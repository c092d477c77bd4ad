use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;

use super::{ProviderId, Ticker};
use crate::errors::ParseFailure;

/// Currency assumed when the provider does not report one.
pub const DEFAULT_CURRENCY: &str = "USD";

/// Latest price for a ticker, normalized across providers.
///
/// Immutable once constructed; `price` is always strictly positive.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Quote {
    ticker: Ticker,
    price: Decimal,
    currency: String,
    timestamp: DateTime<Utc>,
    source: ProviderId,
}

impl Quote {
    /// Build a quote, rejecting non-positive prices.
    ///
    /// A `None` or blank currency falls back to [`DEFAULT_CURRENCY`]. Reported
    /// codes keep their case: Yahoo quotes London listings in `GBp` (pence).
    pub fn new(
        ticker: Ticker,
        price: Decimal,
        currency: Option<String>,
        timestamp: DateTime<Utc>,
        source: ProviderId,
    ) -> Result<Self, ParseFailure> {
        if price <= Decimal::ZERO {
            return Err(ParseFailure::NonPositivePrice(price));
        }

        let currency = currency
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty())
            .unwrap_or_else(|| DEFAULT_CURRENCY.to_string());

        Ok(Self {
            ticker,
            price,
            currency,
            timestamp,
            source,
        })
    }

    pub fn ticker(&self) -> &Ticker {
        &self.ticker
    }

    pub fn price(&self) -> Decimal {
        self.price
    }

    pub fn currency(&self) -> &str {
        &self.currency
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    /// Provider that produced this quote.
    pub fn source(&self) -> ProviderId {
        self.source
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn aapl() -> Ticker {
        Ticker::parse("AAPL").unwrap()
    }

    #[test]
    fn test_quote_new() {
        let quote = Quote::new(
            aapl(),
            dec!(150.25),
            None,
            Utc::now(),
            ProviderId::YahooFinance,
        )
        .unwrap();
        assert_eq!(quote.price(), dec!(150.25));
        assert_eq!(quote.currency(), "USD");
        assert_eq!(quote.source(), ProviderId::YahooFinance);
    }

    #[test]
    fn test_quote_keeps_reported_currency() {
        let quote = Quote::new(
            aapl(),
            dec!(1),
            Some(" CAD ".to_string()),
            Utc::now(),
            ProviderId::YahooFinance,
        )
        .unwrap();
        assert_eq!(quote.currency(), "CAD");

        let quote = Quote::new(
            Ticker::parse("VOD.L").unwrap(),
            dec!(71.02),
            Some("GBp".to_string()),
            Utc::now(),
            ProviderId::YahooFinance,
        )
        .unwrap();
        assert_eq!(quote.currency(), "GBp");

        let quote = Quote::new(
            aapl(),
            dec!(1),
            Some("  ".to_string()),
            Utc::now(),
            ProviderId::YahooFinance,
        )
        .unwrap();
        assert_eq!(quote.currency(), "USD");
    }

    #[test]
    fn test_quote_rejects_zero_and_negative() {
        let err = Quote::new(aapl(), dec!(0), None, Utc::now(), ProviderId::Finnhub).unwrap_err();
        assert_eq!(err, ParseFailure::NonPositivePrice(dec!(0)));

        let err =
            Quote::new(aapl(), dec!(-1.5), None, Utc::now(), ProviderId::Finnhub).unwrap_err();
        assert_eq!(err, ParseFailure::NonPositivePrice(dec!(-1.5)));
    }
}
