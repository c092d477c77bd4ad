//! Rate limiting configuration advertised by providers.

/// Rate limiting configuration for a provider.
///
/// Controls how aggressively we can call a provider to avoid
/// hitting their rate limits and getting blocked.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RateLimit {
    /// Maximum requests allowed per minute. Also the bucket capacity.
    pub requests_per_minute: u32,
}

impl RateLimit {
    pub const fn per_minute(requests_per_minute: u32) -> Self {
        Self {
            requests_per_minute,
        }
    }
}

impl Default for RateLimit {
    fn default() -> Self {
        Self::per_minute(60)
    }
}
