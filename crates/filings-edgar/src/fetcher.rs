//! Identified, rate-limited HTTP fetching with bounded retries.

use crate::transport::{HttpTransport, ReqwestTransport};
use filings_core::{FilingError, RequestConfig, Result, retry};
use reqwest::header::{ACCEPT, HeaderMap, HeaderValue, USER_AGENT};
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::{Instant, sleep};
use tracing::{debug, instrument};

/// Accept header for JSON endpoints.
pub const ACCEPT_JSON: &str = "application/json";

/// Accept header for HTML and plain-text endpoints.
pub const ACCEPT_TEXT: &str = "text/html,text/plain;q=0.9,*/*;q=0.8";

/// Rate limiter state.
#[derive(Debug)]
struct RateLimiter {
    last_request: Instant,
    min_interval: Duration,
}

impl RateLimiter {
    fn new(min_interval: Duration) -> Self {
        let now = Instant::now();
        Self {
            last_request: now.checked_sub(min_interval).unwrap_or(now),
            min_interval,
        }
    }

    async fn wait(&mut self) {
        let elapsed = self.last_request.elapsed();
        if elapsed < self.min_interval {
            sleep(self.min_interval - elapsed).await;
        }
        self.last_request = Instant::now();
    }
}

/// Issues GETs against SEC hosts.
///
/// Every request carries the configured User-Agent and passes through one
/// shared rate limiter, so clones of a fetcher never exceed the ceiling
/// together. Failures are retried according to the configured
/// [`RetryPolicy`](filings_core::RetryPolicy).
#[derive(Debug, Clone)]
pub struct RateLimitedFetcher {
    transport: Arc<dyn HttpTransport>,
    rate_limiter: Arc<Mutex<RateLimiter>>,
    config: RequestConfig,
}

impl RateLimitedFetcher {
    /// Creates a fetcher backed by `reqwest`.
    ///
    /// # Errors
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(config: RequestConfig) -> Result<Self> {
        let transport = ReqwestTransport::new(&config)?;
        Ok(Self::with_transport(config, Arc::new(transport)))
    }

    /// Creates a fetcher over a custom transport.
    #[must_use]
    pub fn with_transport(config: RequestConfig, transport: Arc<dyn HttpTransport>) -> Self {
        Self {
            transport,
            rate_limiter: Arc::new(Mutex::new(RateLimiter::new(config.min_interval))),
            config,
        }
    }

    /// The request configuration in use.
    #[must_use]
    pub fn config(&self) -> &RequestConfig {
        &self.config
    }

    fn headers(&self, accept: &str) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        let user_agent = HeaderValue::from_str(self.config.user_agent())
            .map_err(|e| FilingError::InvalidParameter(format!("Invalid User-Agent: {e}")))?;
        let accept = HeaderValue::from_str(accept)
            .map_err(|e| FilingError::InvalidParameter(format!("Invalid Accept header: {e}")))?;
        headers.insert(USER_AGENT, user_agent);
        headers.insert(ACCEPT, accept);
        Ok(headers)
    }

    /// Fetches `url` and runs `parse` over the body of a successful response.
    ///
    /// `parse` runs inside the retry loop, so a body missing the structure it
    /// requires ([`FilingError::MalformedResponse`]) is retried like a network
    /// failure.
    ///
    /// # Errors
    /// Returns the first fatal error (`NotFound`, `Blocked`, ...) or
    /// [`FilingError::Exhausted`] once the retry budget is spent.
    #[instrument(skip(self, parse))]
    pub async fn fetch_with<T, P>(&self, url: &str, accept: &str, parse: P) -> Result<T>
    where
        P: Fn(&str) -> Result<T>,
    {
        let headers = self.headers(accept)?;
        let headers = &headers;
        let parse = &parse;

        retry(&self.config.retry, url, move |attempt| async move {
            self.rate_limiter.lock().await.wait().await;

            let response = match self.transport.get(url, headers).await {
                Ok(response) => response,
                Err(e) => {
                    debug!(attempt, error = %e, "Request failed");
                    return Err(e);
                }
            };
            debug!(attempt, status = response.status, "Response received");

            check_status(response.status, url)?;
            parse(&response.body)
        })
        .await
    }

    /// Fetches `url` as text.
    ///
    /// # Errors
    /// See [`Self::fetch_with`].
    pub async fn fetch_text(&self, url: &str) -> Result<String> {
        self.fetch_with(url, ACCEPT_TEXT, |body| Ok(body.to_string()))
            .await
    }

    /// Fetches `url` and deserializes the JSON body.
    ///
    /// A body that does not deserialize into `T` is a retryable
    /// [`FilingError::MalformedResponse`].
    ///
    /// # Errors
    /// See [`Self::fetch_with`].
    pub async fn fetch_json<T: DeserializeOwned>(&self, url: &str) -> Result<T> {
        self.fetch_with(url, ACCEPT_JSON, |body| {
            serde_json::from_str(body)
                .map_err(|e| FilingError::MalformedResponse(format!("Invalid JSON: {e}")))
        })
        .await
    }
}

/// Maps an HTTP status onto the error taxonomy.
pub(crate) fn check_status(status: u16, url: &str) -> Result<()> {
    match status {
        200..=299 => Ok(()),
        404 | 410 => Err(FilingError::NotFound(format!("HTTP {status} for {url}"))),
        429 => Err(FilingError::blocked(status, "rate limited (HTTP 429)")),
        400..=499 => Err(FilingError::blocked(status, format!("HTTP {status}"))),
        500..=599 => Err(FilingError::TransientNetwork(format!("HTTP {status}"))),
        _ => Err(FilingError::MalformedResponse(format!(
            "Unexpected HTTP {status}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::ScriptedTransport;
    use filings_core::RetryPolicy;
    use serde::Deserialize;

    const URL: &str = "https://data.sec.gov/test.json";

    fn fetcher(transport: &Arc<ScriptedTransport>, attempts: u32) -> RateLimitedFetcher {
        let config = RequestConfig::new("FilingsTest", "ops@example.com")
            .unwrap()
            .with_min_interval(Duration::ZERO)
            .with_retry(RetryPolicy::new(attempts, Duration::from_millis(1), 2.0));
        RateLimitedFetcher::with_transport(config, transport.clone())
    }

    #[derive(Debug, Deserialize)]
    struct Doc {
        name: String,
    }

    #[test]
    fn test_check_status() {
        assert!(check_status(200, URL).is_ok());
        assert!(matches!(check_status(404, URL), Err(FilingError::NotFound(_))));
        assert!(matches!(check_status(410, URL), Err(FilingError::NotFound(_))));

        let limited = check_status(429, URL).unwrap_err();
        assert!(limited.is_retryable());

        let forbidden = check_status(403, URL).unwrap_err();
        assert!(matches!(forbidden, FilingError::Blocked { status: Some(403), .. }));
        assert!(!forbidden.is_retryable());

        assert!(check_status(503, URL).unwrap_err().is_retryable());
    }

    #[tokio::test]
    async fn test_recovers_after_server_error() {
        let transport = Arc::new(ScriptedTransport::new());
        transport
            .respond(URL, 503, "")
            .respond(URL, 200, r#"{"name":"Apple Inc."}"#);

        let doc: Doc = fetcher(&transport, 4).fetch_json(URL).await.unwrap();
        assert_eq!(doc.name, "Apple Inc.");
        assert_eq!(transport.hits(URL), 2);
    }

    #[tokio::test]
    async fn test_not_found_is_not_retried() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.respond(URL, 404, "");

        let err = fetcher(&transport, 4).fetch_text(URL).await.unwrap_err();
        assert!(matches!(err, FilingError::NotFound(_)));
        assert_eq!(transport.hits(URL), 1);
    }

    #[tokio::test]
    async fn test_rate_limited_until_exhausted() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.respond(URL, 429, "");

        let err = fetcher(&transport, 3).fetch_text(URL).await.unwrap_err();
        match err {
            FilingError::Exhausted { attempts, last } => {
                assert_eq!(attempts, 3);
                assert!(matches!(*last, FilingError::Blocked { status: Some(429), .. }));
            }
            other => panic!("expected Exhausted, got {other:?}"),
        }
        assert_eq!(transport.hits(URL), 3);
    }

    #[tokio::test]
    async fn test_malformed_json_is_retried() {
        let transport = Arc::new(ScriptedTransport::new());
        transport
            .respond(URL, 200, "<html>Request Rate Threshold Exceeded</html>")
            .respond(URL, 200, r#"{"name":"Apple Inc."}"#);

        let doc: Doc = fetcher(&transport, 2).fetch_json(URL).await.unwrap();
        assert_eq!(doc.name, "Apple Inc.");
        assert_eq!(transport.hits(URL), 2);
    }

    #[tokio::test]
    async fn test_transport_failure_is_retried() {
        let transport = Arc::new(ScriptedTransport::new());
        transport
            .fail(URL, FilingError::TransientNetwork("connection reset".into()))
            .respond(URL, 200, "ok");

        let body = fetcher(&transport, 2).fetch_text(URL).await.unwrap();
        assert_eq!(body, "ok");
    }

    #[tokio::test]
    async fn test_sends_user_agent() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.respond(URL, 200, "ok");

        fetcher(&transport, 1).fetch_text(URL).await.unwrap();
        assert_eq!(
            transport.last_user_agent().as_deref(),
            Some("FilingsTest / ops@example.com")
        );
    }

    #[tokio::test]
    async fn test_clones_share_rate_limit() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.respond(URL, 200, "ok");
        let config = RequestConfig::new("FilingsTest", "ops@example.com")
            .unwrap()
            .with_min_interval(Duration::from_millis(30))
            .with_retry(RetryPolicy::new(1, Duration::from_millis(1), 1.0));
        let a = RateLimitedFetcher::with_transport(config, transport.clone());
        let b = a.clone();

        let start = Instant::now();
        a.fetch_text(URL).await.unwrap();
        b.fetch_text(URL).await.unwrap();
        a.fetch_text(URL).await.unwrap();

        // First dispatch is immediate; the next two each wait out the interval.
        assert!(start.elapsed() >= Duration::from_millis(60));
    }

    #[tokio::test]
    async fn test_concurrent_workers_share_one_ceiling() {
        let transport = Arc::new(ScriptedTransport::new());
        transport.respond(URL, 200, "ok");
        let config = RequestConfig::new("FilingsTest", "ops@example.com")
            .unwrap()
            .with_min_interval(Duration::from_millis(30))
            .with_retry(RetryPolicy::new(1, Duration::from_millis(1), 1.0));
        let fetcher = RateLimitedFetcher::with_transport(config, transport.clone());

        let start = Instant::now();
        let workers = (0..4).map(|_| {
            let fetcher = fetcher.clone();
            async move { fetcher.fetch_text(URL).await }
        });
        let results = futures::future::join_all(workers).await;

        assert!(results.iter().all(|r| r.as_deref() == Ok("ok")));
        assert_eq!(transport.hits(URL), 4);
        assert!(start.elapsed() >= Duration::from_millis(90));
    }
}
