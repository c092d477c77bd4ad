//! Token bucket rate limiter for market data providers.
//!
//! Each provider gets its own [`RateLimiter`] with capacity equal to its
//! requests-per-minute ceiling and a refill rate of capacity / 60s. Limiters
//! never share a lock, so providers don't slow each other down.
//!
//! Waiters are served in arrival order: the bucket lives behind a fair async
//! mutex and a waiter keeps the lock while it sleeps for the next token, so
//! a later caller cannot slip in ahead of it.

use std::sync::Arc;
use std::time::Duration;

use log::debug;
use tokio::sync::Mutex;
use tokio::time::Instant;

use crate::clock::Clock;
use crate::models::ProviderId;
use crate::provider::RateLimit;

/// Float slack so a bucket refilled for exactly the computed wait counts as full.
const TOKEN_EPSILON: f64 = 1e-9;

/// Token bucket for a single provider.
#[derive(Debug)]
struct TokenBucket {
    /// Current number of available tokens.
    tokens: f64,
    /// Last time the bucket was updated.
    last_update: Instant,
    /// Token refill rate (tokens per second).
    rate: f64,
    /// Maximum bucket capacity.
    capacity: f64,
}

impl TokenBucket {
    /// Create a full bucket holding `requests_per_minute` tokens.
    fn new(requests_per_minute: u32, now: Instant) -> Self {
        let capacity = f64::from(requests_per_minute.max(1));
        Self {
            tokens: capacity,
            last_update: now,
            rate: capacity / 60.0,
            capacity,
        }
    }

    /// Refill tokens based on elapsed time.
    fn refill(&mut self, now: Instant) {
        let elapsed = now.saturating_duration_since(self.last_update).as_secs_f64();
        self.tokens = (self.tokens + elapsed * self.rate).min(self.capacity);
        self.last_update = now;
    }

    /// Try to take a token. Returns true if one was available.
    fn try_acquire(&mut self, now: Instant) -> bool {
        self.refill(now);

        if self.tokens + TOKEN_EPSILON >= 1.0 {
            self.tokens = (self.tokens - 1.0).max(0.0);
            true
        } else {
            false
        }
    }

    /// Calculate the wait time until a token becomes available.
    fn time_until_available(&self) -> Duration {
        let tokens_needed = (1.0 - self.tokens).max(0.0);
        Duration::from_secs_f64(tokens_needed / self.rate)
    }
}

/// Rate limiter for one provider.
pub struct RateLimiter {
    provider: ProviderId,
    bucket: Mutex<TokenBucket>,
    clock: Arc<dyn Clock>,
}

impl RateLimiter {
    pub fn new(provider: ProviderId, limit: RateLimit, clock: Arc<dyn Clock>) -> Self {
        let bucket = TokenBucket::new(limit.requests_per_minute, clock.now());
        Self {
            provider,
            bucket: Mutex::new(bucket),
            clock,
        }
    }

    pub fn provider(&self) -> ProviderId {
        self.provider
    }

    /// Wait until a token is available, then consume it.
    ///
    /// Never fails; it only delays. Concurrent callers are granted tokens in
    /// the order they called `acquire`.
    pub async fn acquire(&self) {
        let mut bucket = self.bucket.lock().await;

        loop {
            if bucket.try_acquire(self.clock.now()) {
                debug!("Rate limiter: acquired token for '{}'", self.provider);
                return;
            }

            let wait_time = bucket.time_until_available();
            debug!(
                "Rate limiter: waiting {:?} for provider '{}'",
                wait_time, self.provider
            );
            self.clock.sleep(wait_time).await;
        }
    }

    /// Try to acquire a token without waiting.
    ///
    /// Returns false when the bucket is empty or another caller is already
    /// queued for it.
    pub fn try_acquire(&self) -> bool {
        match self.bucket.try_lock() {
            Ok(mut bucket) => bucket.try_acquire(self.clock.now()),
            Err(_) => false,
        }
    }

    /// Tokens currently available. Reports zero while a waiter holds the bucket.
    pub fn remaining_tokens(&self) -> f64 {
        match self.bucket.try_lock() {
            Ok(mut bucket) => {
                bucket.refill(self.clock.now());
                bucket.tokens
            }
            Err(_) => 0.0,
        }
    }
}

impl std::fmt::Debug for RateLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimiter")
            .field("provider", &self.provider)
            .finish_non_exhaustive()
    }
}
