//! Historical series normalization.
//!
//! Providers disagree on ordering (Alpha Vantage is newest-first, Yahoo and
//! Finnhub oldest-first) and on how much history they send back. Every adapter
//! funnels its raw bars through [`normalize`] so the client always hands out
//! the same shape: oldest-to-newest, no duplicate dates, trimmed to the
//! requested lookback.

use crate::errors::ParseFailure;
use crate::models::Bar;

/// Sort raw bars ascending, reject duplicates, and keep the newest `lookback`.
///
/// An empty input is a [`ParseFailure::EmptySeries`]; a provider that answers
/// successfully with no data has a gap, not a legitimately empty history.
pub fn normalize(mut bars: Vec<Bar>, lookback: usize) -> Result<Vec<Bar>, ParseFailure> {
    if bars.is_empty() {
        return Err(ParseFailure::EmptySeries);
    }

    bars.sort_by_key(|bar| bar.date);

    if let Some(pair) = bars.windows(2).find(|pair| pair[0].date == pair[1].date) {
        return Err(ParseFailure::DuplicateTimestamp(pair[0].date));
    }

    if lookback > 0 && bars.len() > lookback {
        bars.drain(..bars.len() - lookback);
    }

    Ok(bars)
}
