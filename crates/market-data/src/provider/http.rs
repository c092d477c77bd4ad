//! HTTP transport seam used by every adapter.
//!
//! Adapters never talk to `reqwest` directly. They describe one GET as an
//! [`HttpRequest`] and hand it to an [`HttpTransport`]; production code uses
//! [`ReqwestTransport`], tests plug in canned responses.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{StatusCode, Url};
use serde::de::DeserializeOwned;
use thiserror::Error;
use tracing::debug;

use crate::errors::{MarketDataError, ParseFailure};
use crate::models::ProviderId;

/// Placeholder substituted for API keys in logs and error messages.
pub const MASK: &str = "***";

/// A single outbound GET.
#[derive(Clone, Debug)]
pub struct HttpRequest {
    pub url: Url,
    pub headers: Vec<(&'static str, String)>,
    pub timeout: Duration,
}

impl HttpRequest {
    pub fn get(url: Url, timeout: Duration) -> Self {
        Self {
            url,
            headers: Vec::new(),
            timeout,
        }
    }

    pub fn with_header(mut self, name: &'static str, value: impl Into<String>) -> Self {
        self.headers.push((name, value.into()));
        self
    }
}

/// Status and body of a completed exchange, whatever the status code.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

impl HttpResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }
}

/// The exchange never produced a response.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HttpError {
    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    #[error("{0}")]
    Connection(String),
}

#[async_trait]
pub trait HttpTransport: Send + Sync {
    async fn get(&self, request: HttpRequest) -> Result<HttpResponse, HttpError>;
}

/// `reqwest`-backed transport.
#[derive(Clone, Debug, Default)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn get(&self, request: HttpRequest) -> Result<HttpResponse, HttpError> {
        let timeout = request.timeout;
        let mut builder = self.client.get(request.url).timeout(timeout);
        for (name, value) in request.headers {
            builder = builder.header(name, value);
        }

        let classify = |e: reqwest::Error| {
            if e.is_timeout() {
                HttpError::Timeout(timeout)
            } else {
                // The URL may carry a query-string key.
                HttpError::Connection(e.without_url().to_string())
            }
        };

        let response = builder.send().await.map_err(classify)?;
        let status = response.status().as_u16();
        let body = response.text().await.map_err(classify)?;

        Ok(HttpResponse { status, body })
    }
}

/// Replace every occurrence of `secret` in `text` with [`MASK`].
pub fn mask_secret(text: &str, secret: Option<&str>) -> String {
    match secret {
        Some(secret) if !secret.is_empty() => text.replace(secret, MASK),
        _ => text.to_string(),
    }
}

/// Issue one GET and return the body of a 2xx response.
///
/// Failures are classified here so every adapter maps them the same way:
/// no response becomes `Transport` without a status, 429 becomes
/// `RateLimited`, any other non-2xx becomes `Transport` with the status.
pub(crate) async fn fetch_body(
    transport: &dyn HttpTransport,
    provider: ProviderId,
    request: HttpRequest,
    secret: Option<&str>,
) -> Result<String, MarketDataError> {
    debug!(
        "{} GET {}",
        provider,
        mask_secret(request.url.as_str(), secret)
    );

    let response = transport
        .get(request)
        .await
        .map_err(|e| MarketDataError::Transport {
            provider,
            status: None,
            message: mask_secret(&e.to_string(), secret),
        })?;

    if response.status == StatusCode::TOO_MANY_REQUESTS.as_u16() {
        return Err(MarketDataError::RateLimited { provider });
    }

    if !(200..300).contains(&response.status) {
        let reason = StatusCode::from_u16(response.status)
            .ok()
            .and_then(|s| s.canonical_reason())
            .unwrap_or("unexpected status");
        return Err(MarketDataError::Transport {
            provider,
            status: Some(response.status),
            message: reason.to_string(),
        });
    }

    Ok(response.body)
}

/// Deserialize a 2xx body, mapping non-JSON to a `Malformed` parse failure.
pub(crate) fn parse_json<T: DeserializeOwned>(
    provider: ProviderId,
    body: &str,
) -> Result<T, MarketDataError> {
    serde_json::from_str(body)
        .map_err(|e| MarketDataError::parse(provider, ParseFailure::Malformed(e.to_string())))
}
