//! Per-provider attempt tracking for fallback diagnostics.

use std::fmt;

use crate::errors::MarketDataError;
use crate::models::ProviderId;

/// Why a provider was skipped without being called.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SkipReason {
    /// The caller asked for a provider the client was not built with.
    NotConfigured,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::NotConfigured => f.write_str("not configured"),
        }
    }
}

/// Record of a single provider during a fetch.
#[derive(Clone, Debug)]
pub struct ProviderAttempt {
    pub provider: ProviderId,
    /// Number of adapter calls made, retries included.
    pub calls: u32,
    pub skipped: Option<SkipReason>,
    /// Final error after retries were spent.
    pub error: Option<MarketDataError>,
}

/// Ordered record of every provider a fetch touched.
#[derive(Clone, Debug, Default)]
pub struct FetchDiagnostics {
    pub attempts: Vec<ProviderAttempt>,
}

impl FetchDiagnostics {
    pub fn new() -> Self {
        Self {
            attempts: Vec::new(),
        }
    }

    pub fn record_skip(&mut self, provider: ProviderId, reason: SkipReason) {
        self.attempts.push(ProviderAttempt {
            provider,
            calls: 0,
            skipped: Some(reason),
            error: None,
        });
    }

    pub fn record_error(&mut self, provider: ProviderId, calls: u32, error: MarketDataError) {
        self.attempts.push(ProviderAttempt {
            provider,
            calls,
            skipped: None,
            error: Some(error),
        });
    }

    /// Summary for logging/debugging.
    pub fn summary(&self) -> String {
        self.attempts
            .iter()
            .map(|a| {
                if let Some(skip) = &a.skipped {
                    format!("{}: SKIPPED ({})", a.provider, skip)
                } else if let Some(err) = &a.error {
                    format!("{}: ERROR after {} call(s) ({})", a.provider, a.calls, err)
                } else {
                    format!("{}: UNKNOWN", a.provider)
                }
            })
            .collect::<Vec<_>>()
            .join(" -> ")
    }

    pub fn skip_reasons(&self) -> Vec<(ProviderId, &SkipReason)> {
        self.attempts
            .iter()
            .filter_map(|a| a.skipped.as_ref().map(|s| (a.provider, s)))
            .collect()
    }

    pub fn errors(&self) -> Vec<(ProviderId, &MarketDataError)> {
        self.attempts
            .iter()
            .filter_map(|a| a.error.as_ref().map(|e| (a.provider, e)))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.attempts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.attempts.is_empty()
    }
}

impl fmt::Display for FetchDiagnostics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.attempts.is_empty() {
            return f.write_str("no providers attempted");
        }
        f.write_str(&self.summary())
    }
}
