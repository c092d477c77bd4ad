use std::fmt::{Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::config::ConfigError;

/// Upstream market data sources this crate can talk to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProviderId {
    AlphaVantage,
    #[serde(rename = "YAHOO")]
    YahooFinance,
    Finnhub,
}

impl ProviderId {
    /// Default fallback order.
    pub const ALL: [Self; 3] = [Self::AlphaVantage, Self::YahooFinance, Self::Finnhub];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::AlphaVantage => "ALPHA_VANTAGE",
            Self::YahooFinance => "YAHOO",
            Self::Finnhub => "FINNHUB",
        }
    }

    /// Prefix for the per-provider environment variables (`<PREFIX>_API_KEY`, ...).
    pub const fn env_prefix(self) -> &'static str {
        match self {
            Self::AlphaVantage => "ALPHA_VANTAGE",
            Self::YahooFinance => "YAHOO",
            Self::Finnhub => "FINNHUB",
        }
    }

    pub const fn requires_api_key(self) -> bool {
        match self {
            Self::AlphaVantage | Self::Finnhub => true,
            Self::YahooFinance => false,
        }
    }
}

impl Display for ProviderId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderId {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "alpha_vantage" | "alphavantage" => Ok(Self::AlphaVantage),
            "yahoo" | "yahoo_finance" | "yahoofinance" => Ok(Self::YahooFinance),
            "finnhub" => Ok(Self::Finnhub),
            other => Err(ConfigError::UnknownProvider(other.to_owned())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_aliases() {
        assert_eq!("ALPHA_VANTAGE".parse::<ProviderId>().unwrap(), ProviderId::AlphaVantage);
        assert_eq!("alphavantage".parse::<ProviderId>().unwrap(), ProviderId::AlphaVantage);
        assert_eq!(" yahoo ".parse::<ProviderId>().unwrap(), ProviderId::YahooFinance);
        assert_eq!("Yahoo_Finance".parse::<ProviderId>().unwrap(), ProviderId::YahooFinance);
        assert_eq!("finnhub".parse::<ProviderId>().unwrap(), ProviderId::Finnhub);
    }

    #[test]
    fn test_parse_unknown() {
        let err = "polygon".parse::<ProviderId>().unwrap_err();
        assert_eq!(err, ConfigError::UnknownProvider("polygon".to_string()));
    }

    #[test]
    fn test_display_round_trips_through_parse() {
        for id in ProviderId::ALL {
            assert_eq!(id.to_string().parse::<ProviderId>().unwrap(), id);
        }
    }

    #[test]
    fn test_serde_uses_canonical_ids() {
        assert_eq!(
            serde_json::to_string(&ProviderId::YahooFinance).unwrap(),
            "\"YAHOO\""
        );
        assert_eq!(
            serde_json::to_string(&ProviderId::AlphaVantage).unwrap(),
            "\"ALPHA_VANTAGE\""
        );
    }
}
