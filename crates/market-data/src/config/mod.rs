//! Client configuration.
//!
//! Provider credentials and limits are read once, when the client is built.
//! A missing key for a selected provider fails construction; there is no
//! partially-configured client.

use std::fmt::{Debug, Formatter};
use std::time::Duration;

use thiserror::Error;

use crate::models::ProviderId;

/// Environment variable selecting providers and their default order.
pub const PROVIDERS_ENV: &str = "STOCKFEED_PROVIDERS";
pub const MAX_RETRIES_ENV: &str = "STOCKFEED_MAX_RETRIES";
pub const RETRY_BACKOFF_ENV: &str = "STOCKFEED_RETRY_BACKOFF_MS";

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);
const DEFAULT_MAX_RETRIES: u32 = 1;
const DEFAULT_BACKOFF: Duration = Duration::from_millis(500);

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("missing required key {key}")]
    MissingKey { key: String },

    #[error("invalid value for {key}: '{value}'")]
    InvalidValue { key: String, value: String },

    #[error("unknown provider '{0}'")]
    UnknownProvider(String),

    #[error("no providers configured")]
    NoProviders,
}

/// Connection settings for one upstream provider.
#[derive(Clone, PartialEq, Eq)]
pub struct ProviderConfig {
    id: ProviderId,
    base_url: String,
    api_key: Option<String>,
    requests_per_minute: u32,
    timeout: Duration,
}

impl ProviderConfig {
    /// Settings with the provider's public endpoint and free-tier limits.
    pub fn defaults(id: ProviderId) -> Self {
        let (base_url, requests_per_minute) = match id {
            ProviderId::AlphaVantage => ("https://www.alphavantage.co/query", 5),
            ProviderId::YahooFinance => ("https://query1.finance.yahoo.com", 60),
            ProviderId::Finnhub => ("https://finnhub.io/api/v1", 60),
        };

        Self {
            id,
            base_url: base_url.to_string(),
            api_key: None,
            requests_per_minute,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_requests_per_minute(mut self, requests_per_minute: u32) -> Self {
        self.requests_per_minute = requests_per_minute;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn id(&self) -> ProviderId {
        self.id
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn api_key(&self) -> Option<&str> {
        self.api_key.as_deref()
    }

    pub fn requests_per_minute(&self) -> u32 {
        self.requests_per_minute
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Name of the environment variable holding this provider's key.
    pub fn api_key_var(&self) -> String {
        format!("{}_API_KEY", self.id.env_prefix())
    }

    /// Check the settings a provider needs before any request is made.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.id.requires_api_key() && self.api_key().map_or(true, str::is_empty) {
            return Err(ConfigError::MissingKey {
                key: self.api_key_var(),
            });
        }
        if self.requests_per_minute == 0 {
            return Err(ConfigError::InvalidValue {
                key: format!("{}_REQUESTS_PER_MINUTE", self.id.env_prefix()),
                value: "0".to_string(),
            });
        }
        if reqwest::Url::parse(&self.base_url).is_err() {
            return Err(ConfigError::InvalidValue {
                key: format!("{}_BASE_URL", self.id.env_prefix()),
                value: self.base_url.clone(),
            });
        }
        Ok(())
    }
}

impl Debug for ProviderConfig {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("id", &self.id)
            .field("base_url", &self.base_url)
            .field("api_key", &self.api_key.as_ref().map(|_| "***"))
            .field("requests_per_minute", &self.requests_per_minute)
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// Same-provider retry bound for transient failures.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            backoff: DEFAULT_BACKOFF,
        }
    }
}

/// Everything needed to build a [`crate::MarketDataClient`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClientConfig {
    /// Selected providers, in default fallback order.
    pub providers: Vec<ProviderConfig>,
    pub retry: RetryPolicy,
}

impl ClientConfig {
    pub fn new(providers: Vec<ProviderConfig>) -> Self {
        Self {
            providers,
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Load from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load from an arbitrary key lookup. Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        let selected = match get(PROVIDERS_ENV) {
            Some(list) => parse_provider_list(&list)?,
            None => ProviderId::ALL.to_vec(),
        };

        let mut providers = Vec::with_capacity(selected.len());
        for id in selected {
            let prefix = id.env_prefix();
            let mut provider = ProviderConfig::defaults(id);

            if let Some(key) = get(&format!("{}_API_KEY", prefix)) {
                provider = provider.with_api_key(key);
            }
            if let Some(url) = get(&format!("{}_BASE_URL", prefix)) {
                provider = provider.with_base_url(url);
            }
            let rpm_key = format!("{}_REQUESTS_PER_MINUTE", prefix);
            if let Some(rpm) = get(&rpm_key) {
                provider = provider.with_requests_per_minute(parse_number(&rpm_key, &rpm)?);
            }
            let timeout_key = format!("{}_TIMEOUT_MS", prefix);
            if let Some(timeout) = get(&timeout_key) {
                let millis: u64 = parse_number(&timeout_key, &timeout)?;
                provider = provider.with_timeout(Duration::from_millis(millis));
            }

            providers.push(provider);
        }

        let mut retry = RetryPolicy::default();
        if let Some(value) = get(MAX_RETRIES_ENV) {
            retry.max_retries = parse_number(MAX_RETRIES_ENV, &value)?;
        }
        if let Some(value) = get(RETRY_BACKOFF_ENV) {
            retry.backoff = Duration::from_millis(parse_number(RETRY_BACKOFF_ENV, &value)?);
        }

        let config = Self { providers, retry };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.providers.is_empty() {
            return Err(ConfigError::NoProviders);
        }
        self.providers.iter().try_for_each(ProviderConfig::validate)
    }
}

/// Parse a comma-separated provider list, dropping repeats.
pub fn parse_provider_list(list: &str) -> Result<Vec<ProviderId>, ConfigError> {
    let mut ids = Vec::new();
    for name in list.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        let id: ProviderId = name.parse()?;
        if !ids.contains(&id) {
            ids.push(id);
        }
    }
    if ids.is_empty() {
        return Err(ConfigError::NoProviders);
    }
    Ok(ids)
}

fn parse_number<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, ConfigError> {
    value.parse().map_err(|_| ConfigError::InvalidValue {
        key: key.to_string(),
        value: value.to_string(),
    })
}
