//! HTTP transport abstraction.
//!
//! [`RateLimitedFetcher`](crate::fetcher::RateLimitedFetcher) talks to the
//! network through [`HttpTransport`]. [`ReqwestTransport`] is the production
//! implementation; [`ScriptedTransport`] replays canned responses for offline
//! runs and tests.

use async_trait::async_trait;
use filings_core::{FilingError, RequestConfig, Result};
use reqwest::header::{HeaderMap, USER_AGENT};
use std::collections::{HashMap, VecDeque};
use std::fmt::Debug;
use std::sync::Mutex;
use tracing::trace;

/// Status and body of an HTTP response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    /// HTTP status code.
    pub status: u16,
    /// Decoded response body.
    pub body: String,
}

impl HttpResponse {
    /// Creates a response.
    #[must_use]
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    /// Creates a `200 OK` response.
    #[must_use]
    pub fn ok(body: impl Into<String>) -> Self {
        Self::new(200, body)
    }
}

/// Performs a single HTTP GET.
///
/// Implementations return `Ok` for every response that arrived, whatever its
/// status; only failures to obtain a response at all are errors.
#[async_trait]
pub trait HttpTransport: Send + Sync + Debug {
    /// Issues a GET for `url` with `headers`.
    async fn get(&self, url: &str, headers: &HeaderMap) -> Result<HttpResponse>;
}

/// [`HttpTransport`] backed by a `reqwest::Client`.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    /// Builds a client with the configured User-Agent and timeout.
    ///
    /// # Errors
    /// Returns [`FilingError::Other`] if the client cannot be built.
    pub fn new(config: &RequestConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(config.user_agent())
            .timeout(config.timeout)
            .build()
            .map_err(|e| FilingError::Other(format!("Failed to build HTTP client: {e}")))?;
        Ok(Self { client })
    }

    /// Wraps a pre-configured client.
    #[must_use]
    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn get(&self, url: &str, headers: &HeaderMap) -> Result<HttpResponse> {
        let response = self
            .client
            .get(url)
            .headers(headers.clone())
            .send()
            .await
            .map_err(classify_reqwest_error)?;

        let status = response.status().as_u16();
        let body = response.text().await.map_err(classify_reqwest_error)?;
        Ok(HttpResponse { status, body })
    }
}

fn classify_reqwest_error(e: reqwest::Error) -> FilingError {
    if e.is_builder() {
        FilingError::InvalidParameter(e.to_string())
    } else if e.is_timeout() {
        FilingError::TransientNetwork(format!("timeout: {e}"))
    } else if e.is_connect() {
        FilingError::TransientNetwork(format!("connect: {e}"))
    } else if e.is_decode() || e.is_body() {
        FilingError::TransientNetwork(format!("body: {e}"))
    } else {
        FilingError::TransientNetwork(e.to_string())
    }
}

/// Replays canned responses keyed by exact URL.
///
/// Responses queued for a URL are served in order and the last one repeats.
/// Unknown URLs answer `404`. Every request is counted, and the most recent
/// User-Agent is recorded.
#[derive(Debug, Default)]
pub struct ScriptedTransport {
    routes: Mutex<HashMap<String, VecDeque<Result<HttpResponse>>>>,
    hits: Mutex<HashMap<String, usize>>,
    last_user_agent: Mutex<Option<String>>,
}

impl ScriptedTransport {
    /// Creates a transport with no routes.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues a response for `url`.
    pub fn push(&self, url: impl Into<String>, response: Result<HttpResponse>) -> &Self {
        if let Ok(mut routes) = self.routes.lock() {
            routes.entry(url.into()).or_default().push_back(response);
        }
        self
    }

    /// Queues a response with the given status and body.
    pub fn respond(&self, url: impl Into<String>, status: u16, body: impl Into<String>) -> &Self {
        self.push(url, Ok(HttpResponse::new(status, body)))
    }

    /// Queues a transport-level failure.
    pub fn fail(&self, url: impl Into<String>, error: FilingError) -> &Self {
        self.push(url, Err(error))
    }

    /// Number of requests issued for `url`.
    #[must_use]
    pub fn hits(&self, url: &str) -> usize {
        self.hits
            .lock()
            .map(|hits| hits.get(url).copied().unwrap_or(0))
            .unwrap_or(0)
    }

    /// Total number of requests issued.
    #[must_use]
    pub fn total_hits(&self) -> usize {
        self.hits
            .lock()
            .map(|hits| hits.values().sum())
            .unwrap_or(0)
    }

    /// User-Agent header of the most recent request.
    #[must_use]
    pub fn last_user_agent(&self) -> Option<String> {
        self.last_user_agent.lock().ok().and_then(|ua| ua.clone())
    }
}

#[async_trait]
impl HttpTransport for ScriptedTransport {
    async fn get(&self, url: &str, headers: &HeaderMap) -> Result<HttpResponse> {
        trace!(url, "Scripted request");
        if let Ok(mut hits) = self.hits.lock() {
            *hits.entry(url.to_string()).or_default() += 1;
        }
        if let Ok(mut last) = self.last_user_agent.lock() {
            *last = headers
                .get(USER_AGENT)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string);
        }

        let mut routes = self
            .routes
            .lock()
            .map_err(|e| FilingError::Other(e.to_string()))?;
        match routes.get_mut(url) {
            Some(queue) if queue.len() > 1 => queue
                .pop_front()
                .unwrap_or_else(|| Ok(HttpResponse::new(404, ""))),
            Some(queue) => queue
                .front()
                .cloned()
                .unwrap_or_else(|| Ok(HttpResponse::new(404, ""))),
            None => Ok(HttpResponse::new(404, "")),
        }
    }
}
