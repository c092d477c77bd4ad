//! Market data models
//!
//! This module contains the core data types for market data operations:
//! - `ticker` - Validated uppercase symbol (Ticker)
//! - `provider_id` - Closed set of upstream sources (ProviderId)
//! - `interval` - Bar spacing for historical series (Interval)
//! - `quote` - Latest price (Quote)
//! - `series` - Historical bars (Bar, Series)

mod interval;
mod provider_id;
mod quote;
mod series;
mod ticker;

pub use interval::Interval;
pub use provider_id::ProviderId;
pub use quote::{Quote, DEFAULT_CURRENCY};
pub use series::{Bar, Series};
pub use ticker::Ticker;
