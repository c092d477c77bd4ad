//! Error types and retry classification for the market data crate.
//!
//! This module provides:
//! - [`MarketDataError`]: The main error enum for all market data operations
//! - [`ParseFailure`]: Why a 2xx provider payload could not be normalized
//! - [`RetryClass`]: Classification for determining retry behavior

mod retry;

pub use retry::RetryClass;

use std::time::Duration;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use thiserror::Error;

use crate::config::ConfigError;
use crate::models::ProviderId;
use crate::registry::FetchDiagnostics;

/// Why a successful (2xx) response could not be turned into a normalized result.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseFailure {
    /// The documented success field is absent. Providers that put an error
    /// string in place of data end up here too.
    #[error("missing field '{0}'")]
    MissingField(String),

    /// The provider answered with zero bars.
    #[error("empty series")]
    EmptySeries,

    /// Price present but zero or negative.
    #[error("non-positive price {0}")]
    NonPositivePrice(Decimal),

    /// A field is present but its value cannot be interpreted.
    #[error("invalid value for '{field}': {value}")]
    InvalidValue { field: String, value: String },

    /// Two bars share the same date.
    #[error("duplicate timestamp {0}")]
    DuplicateTimestamp(NaiveDate),

    /// The body is not the JSON shape we expect at all.
    #[error("malformed payload: {0}")]
    Malformed(String),
}

/// Errors that can occur during market data operations.
///
/// Each variant is classified into a [`RetryClass`] via the [`retry_class`](Self::retry_class)
/// method, which determines how the client handles the error.
#[derive(Error, Debug, Clone)]
pub enum MarketDataError {
    /// The HTTP call failed, timed out, or came back with a non-2xx status.
    /// `status` is `None` when no response was received.
    #[error("Transport error from {provider}{}: {message}", display_status(.status))]
    Transport {
        provider: ProviderId,
        status: Option<u16>,
        message: String,
    },

    /// The provider answered 2xx but the payload was unusable.
    #[error("Parse error from {provider}: {reason}")]
    Parse {
        provider: ProviderId,
        reason: ParseFailure,
    },

    /// The provider signaled quota exhaustion (HTTP 429 or a quota note in the body).
    #[error("Rate limited: {provider}")]
    RateLimited { provider: ProviderId },

    /// Every provider in the chain was tried and failed.
    #[error("All providers exhausted: {0}")]
    AllProvidersExhausted(FetchDiagnostics),

    /// The client could not be constructed from its configuration.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// The request is invalid before any provider is contacted.
    #[error("Validation failed: {message}")]
    ValidationFailed { message: String },

    /// A caller-imposed deadline expired before any provider succeeded.
    #[error("Timed out after {after:?}")]
    Timeout { after: Duration },
}

fn display_status(status: &Option<u16>) -> String {
    match status {
        Some(code) => format!(" (HTTP {})", code),
        None => String::new(),
    }
}

impl MarketDataError {
    pub(crate) fn parse(provider: ProviderId, reason: ParseFailure) -> Self {
        Self::Parse { provider, reason }
    }

    pub(crate) fn missing_field(provider: ProviderId, field: impl Into<String>) -> Self {
        Self::parse(provider, ParseFailure::MissingField(field.into()))
    }

    pub(crate) fn validation(message: impl Into<String>) -> Self {
        Self::ValidationFailed {
            message: message.into(),
        }
    }

    /// Returns the retry classification for this error.
    ///
    /// # Examples
    ///
    /// ```
    /// use stockfeed_market_data::errors::{MarketDataError, ParseFailure, RetryClass};
    /// use stockfeed_market_data::ProviderId;
    ///
    /// let error = MarketDataError::RateLimited { provider: ProviderId::YahooFinance };
    /// assert_eq!(error.retry_class(), RetryClass::WithBackoff);
    ///
    /// let error = MarketDataError::Parse {
    ///     provider: ProviderId::AlphaVantage,
    ///     reason: ParseFailure::EmptySeries,
    /// };
    /// assert_eq!(error.retry_class(), RetryClass::NextProvider);
    /// ```
    pub fn retry_class(&self) -> RetryClass {
        match self {
            Self::Transport { .. } | Self::RateLimited { .. } => RetryClass::WithBackoff,

            Self::Parse { .. } => RetryClass::NextProvider,

            Self::AllProvidersExhausted(_)
            | Self::Config(_)
            | Self::ValidationFailed { .. }
            | Self::Timeout { .. } => RetryClass::Never,
        }
    }

    /// The provider this error originated from, if it came from a single provider.
    pub fn provider(&self) -> Option<ProviderId> {
        match self {
            Self::Transport { provider, .. }
            | Self::Parse { provider, .. }
            | Self::RateLimited { provider } => Some(*provider),
            _ => None,
        }
    }
}
