use std::fmt::{Display, Formatter};
use std::str::FromStr;

use chrono::Duration;
use serde::{Deserialize, Serialize};

use crate::errors::MarketDataError;

/// Upper bound on the bars a request window is sized for.
const MAX_WINDOW_BARS: usize = 100_000;

/// Bar spacing of a historical series.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Interval {
    Daily,
    Weekly,
    Monthly,
}

impl Interval {
    pub const ALL: [Self; 3] = [Self::Daily, Self::Weekly, Self::Monthly];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Daily => "daily",
            Self::Weekly => "weekly",
            Self::Monthly => "monthly",
        }
    }

    /// Calendar span wide enough to hold `lookback` bars of this interval,
    /// with slack for weekends and holidays.
    pub fn lookback_window(self, lookback: usize) -> Duration {
        let lookback = lookback.min(MAX_WINDOW_BARS) as i64;
        let days = match self {
            Self::Daily => lookback * 7 / 5 + 7,
            Self::Weekly => lookback * 7 + 7,
            Self::Monthly => lookback * 31 + 31,
        };
        Duration::days(days)
    }
}

impl Display for Interval {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Interval {
    type Err = MarketDataError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "daily" | "day" | "d" => Ok(Self::Daily),
            "weekly" | "week" | "w" => Ok(Self::Weekly),
            "monthly" | "month" | "m" => Ok(Self::Monthly),
            other => Err(MarketDataError::validation(format!(
                "unknown interval '{}', expected daily, weekly or monthly",
                other
            ))),
        }
    }
}
