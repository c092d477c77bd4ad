//! Normalized market data client.
//!
//! The client walks providers in preference order, gating every adapter call
//! on that provider's rate limiter and applying the retry class of each
//! failure:
//! - transient failures (`Transport`, `RateLimited`) retry the same provider
//!   a bounded number of times with a fixed backoff
//! - `Parse` failures move straight to the next provider
//! - terminal failures return at once

use std::sync::Arc;
use std::time::Duration;

use futures::future::BoxFuture;
use log::{debug, info, warn};

use super::{FetchDiagnostics, RateLimiter, SkipReason};
use crate::clock::{Clock, SystemClock};
use crate::config::{ClientConfig, ConfigError, RetryPolicy};
use crate::errors::{MarketDataError, RetryClass};
use crate::models::{Interval, ProviderId, Quote, Series, Ticker};
use crate::provider::{build_provider, MarketDataProvider, ReqwestTransport};

/// Which providers to try, and in what order.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum ProviderPreference {
    /// Every configured provider, in configured order.
    #[default]
    Default,
    /// Exactly one provider.
    Single(ProviderId),
    /// The listed providers in this order. Repeats are ignored.
    Ordered(Vec<ProviderId>),
}

impl From<ProviderId> for ProviderPreference {
    fn from(id: ProviderId) -> Self {
        ProviderPreference::Single(id)
    }
}

impl From<Vec<ProviderId>> for ProviderPreference {
    fn from(ids: Vec<ProviderId>) -> Self {
        ProviderPreference::Ordered(ids)
    }
}

struct ProviderSlot {
    provider: Arc<dyn MarketDataProvider>,
    limiter: Arc<RateLimiter>,
}

impl ProviderSlot {
    fn id(&self) -> ProviderId {
        self.provider.id()
    }
}

/// Entry point for quotes and series across all configured providers.
pub struct MarketDataClient {
    providers: Vec<ProviderSlot>,
    retry: RetryPolicy,
    clock: Arc<dyn Clock>,
}

impl MarketDataClient {
    /// Build real adapters over HTTP from a validated configuration.
    pub fn from_config(config: ClientConfig) -> Result<Self, MarketDataError> {
        config.validate()?;

        let transport = Arc::new(ReqwestTransport::new());
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);

        let providers = config
            .providers
            .into_iter()
            .map(|provider| build_provider(provider, transport.clone(), clock.clone()))
            .collect::<Result<Vec<_>, _>>()?;

        Self::with_clock(providers, config.retry, clock)
    }

    pub fn new(
        providers: Vec<Arc<dyn MarketDataProvider>>,
        retry: RetryPolicy,
    ) -> Result<Self, MarketDataError> {
        Self::with_clock(providers, retry, Arc::new(SystemClock))
    }

    /// Create a client whose limiters and backoff run on `clock`.
    ///
    /// A provider listed twice keeps its first position.
    pub fn with_clock(
        providers: Vec<Arc<dyn MarketDataProvider>>,
        retry: RetryPolicy,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, MarketDataError> {
        let mut slots: Vec<ProviderSlot> = Vec::with_capacity(providers.len());
        for provider in providers {
            let id = provider.id();
            if slots.iter().any(|slot| slot.id() == id) {
                warn!("Provider '{}' registered twice, keeping the first", id);
                continue;
            }
            let limiter = Arc::new(RateLimiter::new(id, provider.rate_limit(), clock.clone()));
            slots.push(ProviderSlot { provider, limiter });
        }

        if slots.is_empty() {
            return Err(ConfigError::NoProviders.into());
        }

        Ok(Self {
            providers: slots,
            retry,
            clock,
        })
    }

    /// Configured providers in default order.
    pub fn providers(&self) -> Vec<ProviderId> {
        self.providers.iter().map(ProviderSlot::id).collect()
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        self.retry
    }

    /// Rate limiter for a configured provider.
    pub fn limiter(&self, provider: ProviderId) -> Option<&Arc<RateLimiter>> {
        self.slot(provider).map(|slot| &slot.limiter)
    }

    /// Latest price using the default provider order.
    pub async fn get_price(&self, ticker: &str) -> Result<Quote, MarketDataError> {
        self.get_price_from(ticker, &ProviderPreference::Default).await
    }

    pub async fn get_price_from(
        &self,
        ticker: &str,
        preference: &ProviderPreference,
    ) -> Result<Quote, MarketDataError> {
        let ticker = Ticker::parse(ticker)?;
        let plan = self.plan(preference)?;

        self.with_fallback(&ticker, "quote", plan, |provider| {
            provider.fetch_quote(&ticker)
        })
        .await
    }

    /// The newest `lookback` bars using the default provider order.
    pub async fn get_series(
        &self,
        ticker: &str,
        interval: Interval,
        lookback: usize,
    ) -> Result<Series, MarketDataError> {
        self.get_series_from(ticker, interval, lookback, &ProviderPreference::Default).await
    }

    pub async fn get_series_from(
        &self,
        ticker: &str,
        interval: Interval,
        lookback: usize,
        preference: &ProviderPreference,
    ) -> Result<Series, MarketDataError> {
        let ticker = Ticker::parse(ticker)?;
        if lookback == 0 {
            return Err(MarketDataError::validation("lookback must be at least 1"));
        }
        let plan = self.plan(preference)?;

        self.with_fallback(&ticker, "series", plan, |provider| {
            provider.fetch_series(&ticker, interval, lookback)
        })
        .await
    }

    /// [`get_price_from`](Self::get_price_from) bounded by an overall deadline.
    ///
    /// On expiry the in-flight attempt is dropped and no further providers
    /// are tried.
    pub async fn get_price_within(
        &self,
        ticker: &str,
        preference: &ProviderPreference,
        deadline: Duration,
    ) -> Result<Quote, MarketDataError> {
        tokio::time::timeout(deadline, self.get_price_from(ticker, preference))
            .await
            .map_err(|_| MarketDataError::Timeout { after: deadline })?
    }

    /// [`get_series_from`](Self::get_series_from) bounded by an overall deadline.
    pub async fn get_series_within(
        &self,
        ticker: &str,
        interval: Interval,
        lookback: usize,
        preference: &ProviderPreference,
        deadline: Duration,
    ) -> Result<Series, MarketDataError> {
        tokio::time::timeout(
            deadline,
            self.get_series_from(ticker, interval, lookback, preference),
        )
        .await
        .map_err(|_| MarketDataError::Timeout { after: deadline })?
    }

    fn slot(&self, provider: ProviderId) -> Option<&ProviderSlot> {
        self.providers.iter().find(|slot| slot.id() == provider)
    }

    /// Resolve a preference into the providers to walk, in order.
    ///
    /// Providers the client was not built with stay in the plan with no slot
    /// so they can be reported as skipped.
    fn plan(
        &self,
        preference: &ProviderPreference,
    ) -> Result<Vec<(ProviderId, Option<&ProviderSlot>)>, MarketDataError> {
        let ids = match preference {
            ProviderPreference::Default => self.providers(),
            ProviderPreference::Single(id) => vec![*id],
            ProviderPreference::Ordered(ids) => {
                if ids.is_empty() {
                    return Err(MarketDataError::validation(
                        "provider preference must name at least one provider",
                    ));
                }
                let mut unique = Vec::with_capacity(ids.len());
                for id in ids {
                    if !unique.contains(id) {
                        unique.push(*id);
                    }
                }
                unique
            }
        };

        Ok(ids.into_iter().map(|id| (id, self.slot(id))).collect())
    }

    async fn with_fallback<'a, T, F>(
        &'a self,
        ticker: &Ticker,
        request: &str,
        plan: Vec<(ProviderId, Option<&'a ProviderSlot>)>,
        call: F,
    ) -> Result<T, MarketDataError>
    where
        F: Fn(&'a dyn MarketDataProvider) -> BoxFuture<'a, Result<T, MarketDataError>>,
    {
        let mut diagnostics = FetchDiagnostics::new();

        for (provider_id, slot) in plan {
            let Some(slot) = slot else {
                warn!(
                    "Provider '{}' requested for {} {} but not configured, skipping",
                    provider_id, request, ticker
                );
                diagnostics.record_skip(provider_id, SkipReason::NotConfigured);
                continue;
            };

            let mut calls: u32 = 0;
            loop {
                slot.limiter.acquire().await;
                calls += 1;
                debug!(
                    "Fetching {} for {} from '{}' (attempt {})",
                    request, ticker, provider_id, calls
                );

                let error = match call(slot.provider.as_ref()).await {
                    Ok(value) => {
                        info!(
                            "Fetched {} for {} from '{}' after {} call(s)",
                            request, ticker, provider_id, calls
                        );
                        return Ok(value);
                    }
                    Err(error) => error,
                };

                match error.retry_class() {
                    RetryClass::Never => {
                        info!(
                            "Terminal error from '{}' for {}: {}, not retrying",
                            provider_id, ticker, error
                        );
                        return Err(error);
                    }
                    RetryClass::WithBackoff if calls <= self.retry.max_retries => {
                        warn!(
                            "Provider '{}' failed for {}: {}, retrying in {:?}",
                            provider_id, ticker, error, self.retry.backoff
                        );
                        self.clock.sleep(self.retry.backoff).await;
                    }
                    RetryClass::WithBackoff | RetryClass::NextProvider => {
                        warn!(
                            "Provider '{}' failed for {}: {}, trying next provider",
                            provider_id, ticker, error
                        );
                        diagnostics.record_error(provider_id, calls, error);
                        break;
                    }
                }
            }
        }

        warn!(
            "All providers failed for {} {}: {}",
            request,
            ticker,
            diagnostics.summary()
        );
        Err(MarketDataError::AllProvidersExhausted(diagnostics))
    }
}

impl std::fmt::Debug for MarketDataClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MarketDataClient")
            .field("providers", &self.providers())
            .field("retry", &self.retry)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ParseFailure;
    use crate::models::Bar;
    use crate::provider::RateLimit;
    use async_trait::async_trait;
    use chrono::{NaiveDate, Utc};
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::time::Instant;

    #[derive(Clone, Copy)]
    enum Behavior {
        Succeed(Decimal),
        ParseError,
        TransportError,
        /// Rate limited on the first call, then succeeds.
        RateLimitedOnce(Decimal),
        Hang,
    }

    struct MockProvider {
        id: ProviderId,
        requests_per_minute: u32,
        behavior: Behavior,
        call_count: AtomicUsize,
    }

    impl MockProvider {
        fn new(id: ProviderId, behavior: Behavior) -> Arc<Self> {
            Arc::new(Self {
                id,
                requests_per_minute: 600,
                behavior,
                call_count: AtomicUsize::new(0),
            })
        }

        fn with_rate(id: ProviderId, requests_per_minute: u32, behavior: Behavior) -> Arc<Self> {
            Arc::new(Self {
                id,
                requests_per_minute,
                behavior,
                call_count: AtomicUsize::new(0),
            })
        }

        fn calls(&self) -> usize {
            self.call_count.load(Ordering::SeqCst)
        }

        async fn outcome(&self) -> Result<Decimal, MarketDataError> {
            let call = self.call_count.fetch_add(1, Ordering::SeqCst);
            match self.behavior {
                Behavior::Succeed(price) => Ok(price),
                Behavior::ParseError => {
                    Err(MarketDataError::missing_field(self.id, "price"))
                }
                Behavior::TransportError => Err(MarketDataError::Transport {
                    provider: self.id,
                    status: Some(503),
                    message: "Service Unavailable".to_string(),
                }),
                Behavior::RateLimitedOnce(price) => {
                    if call == 0 {
                        Err(MarketDataError::RateLimited { provider: self.id })
                    } else {
                        Ok(price)
                    }
                }
                Behavior::Hang => std::future::pending().await,
            }
        }
    }

    #[async_trait]
    impl MarketDataProvider for MockProvider {
        fn id(&self) -> ProviderId {
            self.id
        }

        fn rate_limit(&self) -> RateLimit {
            RateLimit::per_minute(self.requests_per_minute)
        }

        async fn fetch_quote(&self, ticker: &Ticker) -> Result<Quote, MarketDataError> {
            let price = self.outcome().await?;
            Quote::new(ticker.clone(), price, None, Utc::now(), self.id)
                .map_err(|reason| MarketDataError::parse(self.id, reason))
        }

        async fn fetch_series(
            &self,
            ticker: &Ticker,
            interval: Interval,
            lookback: usize,
        ) -> Result<Series, MarketDataError> {
            let close = self.outcome().await?;
            let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
            let bars = (0..10u64)
                .map(|day| Bar {
                    date: start + chrono::Duration::days(day as i64),
                    open: close,
                    high: close,
                    low: close,
                    close: close + Decimal::from(day),
                    volume: Some(1_000),
                })
                .collect();
            let bars = crate::series::normalize(bars, lookback)
                .map_err(|reason| MarketDataError::parse(self.id, reason))?;
            Series::new(ticker.clone(), interval, self.id, bars)
                .map_err(|reason| MarketDataError::parse(self.id, reason))
        }
    }

    fn client(providers: Vec<Arc<MockProvider>>) -> MarketDataClient {
        let providers = providers
            .into_iter()
            .map(|p| p as Arc<dyn MarketDataProvider>)
            .collect();
        MarketDataClient::new(providers, RetryPolicy::default()).unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_provider_succeeds() {
        let alpha = MockProvider::new(ProviderId::AlphaVantage, Behavior::Succeed(dec!(189.5)));
        let yahoo = MockProvider::new(ProviderId::YahooFinance, Behavior::Succeed(dec!(190)));
        let client = client(vec![alpha.clone(), yahoo.clone()]);

        let quote = client.get_price("aapl").await.unwrap();

        assert_eq!(quote.source(), ProviderId::AlphaVantage);
        assert_eq!(quote.price(), dec!(189.5));
        assert_eq!(quote.ticker().as_str(), "AAPL");
        assert_eq!(quote.currency(), "USD");
        assert_eq!(alpha.calls(), 1);
        assert_eq!(yahoo.calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_parse_error_advances_without_retry() {
        let alpha = MockProvider::new(ProviderId::AlphaVantage, Behavior::ParseError);
        let yahoo = MockProvider::new(ProviderId::YahooFinance, Behavior::Succeed(dec!(190)));
        let client = client(vec![alpha.clone(), yahoo.clone()]);

        let start = Instant::now();
        let quote = client.get_price("AAPL").await.unwrap();

        assert_eq!(quote.source(), ProviderId::YahooFinance);
        assert_eq!(alpha.calls(), 1);
        assert_eq!(yahoo.calls(), 1);
        // No backoff was slept.
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_all_transport_errors_exhaust_with_one_reason_per_provider() {
        let providers: Vec<_> = ProviderId::ALL
            .iter()
            .map(|id| MockProvider::new(*id, Behavior::TransportError))
            .collect();
        let client = client(providers.clone());

        let start = Instant::now();
        let err = client.get_price("MSFT").await.unwrap_err();

        let MarketDataError::AllProvidersExhausted(diagnostics) = err else {
            panic!("expected AllProvidersExhausted, got {:?}", err);
        };
        assert_eq!(diagnostics.len(), 3);
        for (attempt, id) in diagnostics.attempts.iter().zip(ProviderId::ALL) {
            assert_eq!(attempt.provider, id);
            assert_eq!(attempt.calls, 2);
            assert!(matches!(
                attempt.error,
                Some(MarketDataError::Transport {
                    status: Some(503),
                    ..
                })
            ));
        }
        for provider in &providers {
            assert_eq!(provider.calls(), 2);
        }
        // One backoff per provider.
        assert!(start.elapsed() >= Duration::from_millis(1500));
    }

    #[tokio::test(start_paused = true)]
    async fn test_rate_limited_retries_same_provider() {
        let finnhub =
            MockProvider::new(ProviderId::Finnhub, Behavior::RateLimitedOnce(dec!(42.1)));
        let yahoo = MockProvider::new(ProviderId::YahooFinance, Behavior::Succeed(dec!(1)));
        let client = client(vec![finnhub.clone(), yahoo.clone()]);

        let quote = client.get_price("IBM").await.unwrap();

        assert_eq!(quote.source(), ProviderId::Finnhub);
        assert_eq!(finnhub.calls(), 2);
        assert_eq!(yahoo.calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_retries_advances_after_one_call() {
        let alpha = MockProvider::new(ProviderId::AlphaVantage, Behavior::TransportError);
        let yahoo = MockProvider::new(ProviderId::YahooFinance, Behavior::Succeed(dec!(5)));
        let providers: Vec<Arc<dyn MarketDataProvider>> = vec![alpha.clone(), yahoo.clone()];
        let retry = RetryPolicy {
            max_retries: 0,
            backoff: Duration::from_millis(500),
        };
        let client = MarketDataClient::new(providers, retry).unwrap();

        let quote = client.get_price("AAPL").await.unwrap();
        assert_eq!(quote.source(), ProviderId::YahooFinance);
        assert_eq!(alpha.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_preference_order_and_unconfigured_provider() {
        let alpha = MockProvider::new(ProviderId::AlphaVantage, Behavior::Succeed(dec!(1)));
        let yahoo = MockProvider::new(ProviderId::YahooFinance, Behavior::ParseError);
        let client = client(vec![alpha.clone(), yahoo.clone()]);

        let preference = ProviderPreference::Ordered(vec![
            ProviderId::Finnhub,
            ProviderId::YahooFinance,
            ProviderId::YahooFinance,
        ]);
        let err = client.get_price_from("AAPL", &preference).await.unwrap_err();

        let MarketDataError::AllProvidersExhausted(diagnostics) = err else {
            panic!("expected AllProvidersExhausted, got {:?}", err);
        };
        assert_eq!(diagnostics.len(), 2);
        assert_eq!(
            diagnostics.skip_reasons(),
            vec![(ProviderId::Finnhub, &SkipReason::NotConfigured)]
        );
        assert_eq!(diagnostics.errors()[0].0, ProviderId::YahooFinance);
        assert_eq!(yahoo.calls(), 1);
        assert_eq!(alpha.calls(), 0);

        let quote = client
            .get_price_from("AAPL", &ProviderId::AlphaVantage.into())
            .await
            .unwrap();
        assert_eq!(quote.source(), ProviderId::AlphaVantage);
    }

    #[tokio::test(start_paused = true)]
    async fn test_validation_errors_never_reach_providers() {
        let alpha = MockProvider::new(ProviderId::AlphaVantage, Behavior::Succeed(dec!(1)));
        let client = client(vec![alpha.clone()]);

        let err = client
            .get_price_from("AAPL", &ProviderPreference::Ordered(vec![]))
            .await
            .unwrap_err();
        assert!(matches!(err, MarketDataError::ValidationFailed { .. }));

        let err = client.get_price("").await.unwrap_err();
        assert!(matches!(err, MarketDataError::ValidationFailed { .. }));

        let err = client
            .get_series("AAPL", Interval::Daily, 0)
            .await
            .unwrap_err();
        assert!(matches!(err, MarketDataError::ValidationFailed { .. }));

        assert_eq!(alpha.calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline_expiry_times_out() {
        let alpha = MockProvider::new(ProviderId::AlphaVantage, Behavior::Hang);
        let yahoo = MockProvider::new(ProviderId::YahooFinance, Behavior::Succeed(dec!(1)));
        let client = client(vec![alpha.clone(), yahoo.clone()]);

        let err = client
            .get_price_within("AAPL", &ProviderPreference::Default, Duration::from_secs(2))
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            MarketDataError::Timeout { after } if after == Duration::from_secs(2)
        ));
        assert_eq!(alpha.calls(), 1);
        assert_eq!(yahoo.calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_series_fallback_trims_to_lookback() {
        let alpha = MockProvider::new(ProviderId::AlphaVantage, Behavior::ParseError);
        let yahoo = MockProvider::new(ProviderId::YahooFinance, Behavior::Succeed(dec!(100)));
        let client = client(vec![alpha.clone(), yahoo.clone()]);

        let series = client
            .get_series_within(
                "AAPL",
                Interval::Daily,
                3,
                &ProviderPreference::Default,
                Duration::from_secs(30),
            )
            .await
            .unwrap();

        assert_eq!(series.source(), ProviderId::YahooFinance);
        assert_eq!(series.len(), 3);
        assert_eq!(series.last().close, dec!(109));
        assert_eq!(series.first().date, NaiveDate::from_ymd_opt(2024, 1, 8).unwrap());
        assert_eq!(alpha.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_requests_share_one_bucket() {
        let yahoo =
            MockProvider::with_rate(ProviderId::YahooFinance, 2, Behavior::Succeed(dec!(1)));
        let client = Arc::new(client(vec![yahoo.clone()]));

        let start = Instant::now();
        let tickers = ["AAPL", "MSFT", "GOOGL"];
        let results = futures::future::join_all(
            tickers.iter().map(|ticker| client.get_price(ticker)),
        )
        .await;

        assert!(results.iter().all(Result::is_ok));
        assert_eq!(yahoo.calls(), 3);
        // Capacity 2, so the third call waits for one refill (30s).
        assert!(start.elapsed() >= Duration::from_secs(30));
    }

    #[test]
    fn test_client_requires_providers() {
        let err = MarketDataClient::new(Vec::new(), RetryPolicy::default()).unwrap_err();
        assert!(matches!(
            err,
            MarketDataError::Config(ConfigError::NoProviders)
        ));
    }

    #[test]
    fn test_duplicate_registration_keeps_first() {
        let first = MockProvider::new(ProviderId::Finnhub, Behavior::ParseError);
        let second = MockProvider::new(ProviderId::Finnhub, Behavior::Succeed(dec!(1)));
        let client = client(vec![first, second]);

        assert_eq!(client.providers(), vec![ProviderId::Finnhub]);
        assert!(client.limiter(ProviderId::Finnhub).is_some());
        assert!(client.limiter(ProviderId::YahooFinance).is_none());
    }

    #[test]
    fn test_parse_failure_is_not_retried_by_class() {
        let err = MarketDataError::parse(ProviderId::Finnhub, ParseFailure::EmptySeries);
        assert_eq!(err.retry_class(), RetryClass::NextProvider);
    }
}
