use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Serialize;

use super::{Interval, ProviderId, Ticker};
use crate::errors::ParseFailure;

/// One OHLCV point of a historical series. Dates are UTC calendar days.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Bar {
    pub date: NaiveDate,
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub close: Decimal,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub volume: Option<u64>,
}

/// Bars for one ticker and interval, oldest first.
///
/// Never empty, and dates are strictly ascending.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Series {
    ticker: Ticker,
    interval: Interval,
    source: ProviderId,
    bars: Vec<Bar>,
}

impl Series {
    /// Wrap already-ordered bars. Use [`crate::series::normalize`] first for raw
    /// provider output.
    pub fn new(
        ticker: Ticker,
        interval: Interval,
        source: ProviderId,
        bars: Vec<Bar>,
    ) -> Result<Self, ParseFailure> {
        if bars.is_empty() {
            return Err(ParseFailure::EmptySeries);
        }
        if let Some(pair) = bars.windows(2).find(|pair| pair[0].date >= pair[1].date) {
            return Err(if pair[0].date == pair[1].date {
                ParseFailure::DuplicateTimestamp(pair[1].date)
            } else {
                ParseFailure::Malformed(format!(
                    "bars out of order at {} -> {}",
                    pair[0].date, pair[1].date
                ))
            });
        }

        Ok(Self {
            ticker,
            interval,
            source,
            bars,
        })
    }

    pub fn ticker(&self) -> &Ticker {
        &self.ticker
    }

    pub fn interval(&self) -> Interval {
        self.interval
    }

    pub fn source(&self) -> ProviderId {
        self.source
    }

    pub fn bars(&self) -> &[Bar] {
        &self.bars
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    /// Always false for a constructed series; present for API symmetry.
    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    pub fn first(&self) -> &Bar {
        &self.bars[0]
    }

    pub fn last(&self) -> &Bar {
        &self.bars[self.bars.len() - 1]
    }

    pub fn into_bars(self) -> Vec<Bar> {
        self.bars
    }
}
