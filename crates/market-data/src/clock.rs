//! Time source shared by the rate limiter, retry backoff and adapters.
//!
//! [`SystemClock`] is backed by tokio's timer, so tests can run it under
//! `#[tokio::test(start_paused = true)]` and move time with
//! `tokio::time::advance` instead of sleeping for real.

use std::fmt::Debug;
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::future::BoxFuture;
use futures::FutureExt;
use tokio::time::Instant;

pub trait Clock: Send + Sync + Debug {
    /// Monotonic instant used for token accounting.
    fn now(&self) -> Instant;

    /// Wall-clock time used for request windows and quote timestamps.
    fn utc_now(&self) -> DateTime<Utc>;

    fn sleep(&self, duration: Duration) -> BoxFuture<'static, ()>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn utc_now(&self) -> DateTime<Utc> {
        Utc::now()
    }

    fn sleep(&self, duration: Duration) -> BoxFuture<'static, ()> {
        tokio::time::sleep(duration).boxed()
    }
}
