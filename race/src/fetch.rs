//! HTTP GET guarded by a race against a timer.
//!
//! The request and the full body read run as the primary operation, so the
//! timeout covers the complete response. Any HTTP status counts as a resolved
//! response; only transport failures are errors.

use std::time::Duration;

use reqwest::{Client, StatusCode};
use thiserror::Error;
use tricks_types::{DEFAULT_FETCH_TIMEOUT, LoserPolicy, RaceError, RaceOutcome};
use url::Url;

use crate::race::race;

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("url must not be empty or whitespace-only")]
    EmptyUrl,
    #[error("failed to parse URL {url:?}: {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },
    #[error("unsupported URL scheme {scheme:?}, expected http or https")]
    UnsupportedScheme { scheme: String },
    #[error("failed to build HTTP client: {0}")]
    ClientBuild(#[source] reqwest::Error),
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),
}

/// A validated GET request with an optional timeout.
#[derive(Debug, Clone)]
pub struct FetchRequest {
    url: Url,
    timeout: Option<Duration>,
}

impl FetchRequest {
    pub fn new(url: impl AsRef<str>) -> Result<Self, FetchError> {
        let raw = url.as_ref();
        if raw.trim().is_empty() {
            return Err(FetchError::EmptyUrl);
        }

        let parsed = Url::parse(raw.trim()).map_err(|source| FetchError::InvalidUrl {
            url: raw.to_string(),
            source,
        })?;

        match parsed.scheme() {
            "http" | "https" => Ok(Self {
                url: parsed,
                timeout: None,
            }),
            other => Err(FetchError::UnsupportedScheme {
                scheme: other.to_string(),
            }),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    #[must_use]
    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Effective timeout, falling back to [`DEFAULT_FETCH_TIMEOUT`].
    #[must_use]
    pub fn timeout(&self) -> Duration {
        self.timeout.unwrap_or(DEFAULT_FETCH_TIMEOUT)
    }
}

/// A response that arrived before the timer.
#[derive(Debug, Clone)]
pub struct FetchResponse {
    pub status: StatusCode,
    /// URL after redirects.
    pub final_url: Url,
    pub body: String,
}

impl FetchResponse {
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }
}

/// Build the HTTP client used for fetches.
pub fn build_client(user_agent: &str, use_system_proxy: bool) -> Result<Client, FetchError> {
    let mut builder = Client::builder().user_agent(user_agent);
    if !use_system_proxy {
        builder = builder.no_proxy();
    }
    builder.build().map_err(FetchError::ClientBuild)
}

/// GET `request.url()`, racing the whole exchange against `request.timeout()`.
///
/// With [`LoserPolicy::Detach`] a timed-out request is left in flight and its
/// result is discarded.
pub async fn fetch_with_timeout(
    client: &Client,
    request: FetchRequest,
    policy: LoserPolicy,
) -> Result<FetchResponse, RaceError<FetchError>> {
    let limit = request.timeout();
    let url = request.url;
    tracing::debug!(url = %url, timeout_ms = limit.as_millis(), "Fetching with timeout");

    let client = client.clone();
    let op = async move {
        let response = client.get(url).send().await?;
        let status = response.status();
        let final_url = response.url().clone();
        let body = response.text().await?;
        Ok::<_, FetchError>(FetchResponse {
            status,
            final_url,
            body,
        })
    };

    let result = race(op, limit, policy)
        .await
        .and_then(RaceOutcome::into_result);

    if let Err(err) = &result {
        tracing::debug!(error = %err, timeout = err.is_timeout(), "Fetch did not complete");
    }
    result
}
