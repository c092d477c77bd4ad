use std::fmt::{Display, Formatter};
use std::str::FromStr;
use std::sync::Arc;

use serde::{Serialize, Serializer};

use crate::errors::MarketDataError;

const MAX_TICKER_LEN: usize = 12;

/// Uppercase exchange symbol, e.g. `AAPL` or `BRK.B`.
///
/// Input is trimmed and uppercased. Letters and digits only, with single
/// `.` or `-` separators between them. Provider-specific spellings are the
/// adapters' concern.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Ticker(Arc<str>);

impl Ticker {
    pub fn parse(raw: &str) -> Result<Self, MarketDataError> {
        let symbol = raw.trim().to_ascii_uppercase();

        if symbol.is_empty() {
            return Err(MarketDataError::validation("ticker must not be empty"));
        }
        if symbol.len() > MAX_TICKER_LEN {
            return Err(MarketDataError::validation(format!(
                "ticker '{}' is longer than {} characters",
                symbol, MAX_TICKER_LEN
            )));
        }

        let valid_chars = symbol
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '.' || c == '-');
        let valid_separators = symbol
            .split(['.', '-'])
            .all(|segment| !segment.is_empty());

        if !valid_chars || !valid_separators {
            return Err(MarketDataError::validation(format!(
                "ticker '{}' must be alphanumeric",
                symbol
            )));
        }

        Ok(Self(Arc::from(symbol)))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for Ticker {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Ticker {
    type Err = MarketDataError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::parse(value)
    }
}

impl AsRef<str> for Ticker {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Serialize for Ticker {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}
