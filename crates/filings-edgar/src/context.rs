//! Shared plumbing handed to every resolver and adapter.

use crate::endpoints::EdgarEndpoints;
use crate::fetcher::RateLimitedFetcher;
use filings_cache::ResponseCache;
use filings_core::CacheTtls;
use std::sync::Arc;

/// One fetcher, one cache and one set of endpoints.
///
/// Cloning is cheap and clones share the rate limiter and the cache, so a
/// resolver and several adapters built from the same context cooperate on
/// both.
#[derive(Debug, Clone)]
pub struct EdgarContext {
    /// Rate-limited HTTP access.
    pub fetcher: RateLimitedFetcher,
    /// Response cache shared by every component.
    pub cache: Arc<ResponseCache>,
    /// Upstream base URLs.
    pub endpoints: Arc<EdgarEndpoints>,
    /// Per-resource cache lifetimes.
    pub ttls: CacheTtls,
}

impl EdgarContext {
    /// Creates a context with a fresh cache, default endpoints and default TTLs.
    #[must_use]
    pub fn new(fetcher: RateLimitedFetcher) -> Self {
        Self {
            fetcher,
            cache: Arc::new(ResponseCache::new()),
            endpoints: Arc::new(EdgarEndpoints::default()),
            ttls: CacheTtls::default(),
        }
    }

    /// Replaces the endpoints.
    #[must_use]
    pub fn with_endpoints(mut self, endpoints: EdgarEndpoints) -> Self {
        self.endpoints = Arc::new(endpoints);
        self
    }

    /// Shares an existing cache.
    #[must_use]
    pub fn with_cache(mut self, cache: Arc<ResponseCache>) -> Self {
        self.cache = cache;
        self
    }

    /// Replaces the cache lifetimes.
    #[must_use]
    pub fn with_ttls(mut self, ttls: CacheTtls) -> Self {
        self.ttls = ttls;
        self
    }
}
