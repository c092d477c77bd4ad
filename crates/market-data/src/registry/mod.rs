//! Provider orchestration.
//!
//! This module provides:
//! - The normalized client with preference ordering and fallback
//! - Rate limiting per provider
//! - Diagnostics of every provider a request touched

mod client;
mod diagnostics;
mod rate_limiter;

pub use client::{MarketDataClient, ProviderPreference};
pub use diagnostics::{FetchDiagnostics, ProviderAttempt, SkipReason};
pub use rate_limiter::RateLimiter;
