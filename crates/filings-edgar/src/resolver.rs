//! Ticker to CIK resolution.
//!
//! Resolution tries an ordered list of [`ResolveStrategy`] values and stops at
//! the first match. The company search strategy scrapes its CIK out of HTML
//! with an ordered list of [`CikExtractor`]s; every candidate must be an exact
//! ten-digit key before it is trusted.

use crate::context::EdgarContext;
use crate::fetcher::ACCEPT_JSON;
use filings_core::{Cik, CompanyIdentity, FilingError, Result};
use regex::Regex;
use serde::Deserialize;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, LazyLock};
use tracing::{debug, instrument, warn};

const DIRECTORY_CACHE_KEY: &str = "ticker_directory";

static DATA_URL_CIK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(?:edgar/data/|CIK=)(\d+)").expect("valid data URL pattern")
});

static COMPANY_HEADER_CIK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?is)class="companyName"[^>]*>.*?CIK\D{0,200}?(\d+)"#)
        .expect("valid company header pattern")
});

static COMPANY_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"class="companyName"[^>]*>\s*([^<]+?)\s*<"#).expect("valid company name pattern")
});

/// A way of locating a CIK in company search markup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CikExtractor {
    /// A ten-digit token in an `edgar/data/...` path or a `CIK=` parameter.
    DataUrlPath,
    /// A CIK-labelled token following the company header.
    CompanyHeader,
}

impl CikExtractor {
    /// Extraction order used when none is configured.
    pub const DEFAULT_ORDER: [Self; 2] = [Self::DataUrlPath, Self::CompanyHeader];

    /// Returns the first candidate in `markup` that is a valid ten-digit CIK.
    #[must_use]
    pub fn extract(self, markup: &str) -> Option<Cik> {
        let pattern = match self {
            Self::DataUrlPath => &*DATA_URL_CIK,
            Self::CompanyHeader => &*COMPANY_HEADER_CIK,
        };
        pattern
            .captures_iter(markup)
            .filter_map(|caps| caps.get(1))
            .find_map(|m| Cik::parse_strict(m.as_str()))
    }
}

/// Resolution strategies, tried in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolveStrategy {
    /// Exact ticker match in the SEC ticker directory.
    TickerDirectory,
    /// CIK scraped from the company search page.
    CompanySearch,
}

impl fmt::Display for ResolveStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TickerDirectory => write!(f, "ticker directory"),
            Self::CompanySearch => write!(f, "company search"),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum CikValue {
    Number(u64),
    Text(String),
}

#[derive(Debug, Deserialize)]
struct DirectoryEntry {
    #[serde(alias = "cik_str")]
    cik: CikValue,
    ticker: String,
    title: String,
}

/// The directory is published as an object keyed by row index; a plain array
/// is accepted too.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum DirectoryDocument {
    Keyed(HashMap<String, DirectoryEntry>),
    List(Vec<DirectoryEntry>),
}

/// Parsed ticker directory.
#[derive(Debug, Clone, Default)]
pub struct TickerDirectory {
    by_ticker: HashMap<String, CompanyIdentity>,
    by_cik: HashMap<Cik, CompanyIdentity>,
}

impl TickerDirectory {
    /// Parses the directory JSON.
    ///
    /// Entries with an unusable CIK are skipped.
    ///
    /// # Errors
    /// Returns [`FilingError::MalformedResponse`] if the body is not a
    /// directory or contains no usable entries.
    pub fn parse(body: &str) -> Result<Self> {
        let document: DirectoryDocument = serde_json::from_str(body)
            .map_err(|e| FilingError::MalformedResponse(format!("Invalid ticker directory: {e}")))?;
        let entries: Vec<DirectoryEntry> = match document {
            DirectoryDocument::Keyed(map) => {
                let mut rows: Vec<_> = map.into_iter().collect();
                rows.sort_by_key(|(key, _)| key.parse::<u64>().unwrap_or(u64::MAX));
                rows.into_iter().map(|(_, entry)| entry).collect()
            }
            DirectoryDocument::List(list) => list,
        };

        let mut directory = Self::default();
        for entry in entries {
            let cik = match &entry.cik {
                CikValue::Number(n) => Cik::from_number(*n),
                CikValue::Text(s) => Cik::new(s),
            };
            let Ok(cik) = cik else {
                debug!(ticker = %entry.ticker, "Skipping directory entry with invalid CIK");
                continue;
            };
            let ticker = entry.ticker.trim().to_uppercase();
            if ticker.is_empty() {
                continue;
            }
            let identity = CompanyIdentity::new(cik.clone(), entry.title).with_ticker(&ticker);
            directory
                .by_cik
                .entry(cik)
                .or_insert_with(|| identity.clone());
            directory.by_ticker.entry(ticker).or_insert(identity);
        }

        if directory.is_empty() {
            return Err(FilingError::MalformedResponse(
                "Ticker directory has no entries".into(),
            ));
        }
        Ok(directory)
    }

    /// Looks up a ticker, ignoring case.
    #[must_use]
    pub fn by_ticker(&self, ticker: &str) -> Option<&CompanyIdentity> {
        self.by_ticker.get(&ticker.trim().to_uppercase())
    }

    /// Looks up a CIK. The first listed ticker wins when a company has several.
    #[must_use]
    pub fn by_cik(&self, cik: &Cik) -> Option<&CompanyIdentity> {
        self.by_cik.get(cik)
    }

    /// Number of tickers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.by_ticker.len()
    }

    /// Returns true if the directory has no tickers.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.by_ticker.is_empty()
    }
}

/// Resolves tickers and CIKs to [`CompanyIdentity`] values.
#[derive(Debug, Clone)]
pub struct IdentityResolver {
    ctx: EdgarContext,
    strategies: Vec<ResolveStrategy>,
    extractors: Vec<CikExtractor>,
}

impl IdentityResolver {
    /// Creates a resolver using the directory first, then company search.
    #[must_use]
    pub fn new(ctx: EdgarContext) -> Self {
        Self {
            ctx,
            strategies: vec![ResolveStrategy::TickerDirectory, ResolveStrategy::CompanySearch],
            extractors: CikExtractor::DEFAULT_ORDER.to_vec(),
        }
    }

    /// Replaces the strategy order.
    #[must_use]
    pub fn with_strategies(mut self, strategies: Vec<ResolveStrategy>) -> Self {
        self.strategies = strategies;
        self
    }

    /// Replaces the CIK extractor order used by company search.
    #[must_use]
    pub fn with_extractors(mut self, extractors: Vec<CikExtractor>) -> Self {
        self.extractors = extractors;
        self
    }

    /// Fetches (or reads from cache) the ticker directory.
    ///
    /// # Errors
    /// Any failure to obtain a usable directory is reported as
    /// [`FilingError::Blocked`].
    pub async fn ticker_directory(&self) -> Result<Arc<TickerDirectory>> {
        let url = self.ctx.endpoints.ticker_directory_url();
        self.ctx
            .cache
            .get_or_fetch(DIRECTORY_CACHE_KEY, self.ctx.ttls.directory, || async {
                let directory = self
                    .ctx
                    .fetcher
                    .fetch_with(&url, ACCEPT_JSON, TickerDirectory::parse)
                    .await
                    .map_err(|e| match e {
                        FilingError::NotFound(_) => {
                            FilingError::blocked(404, "ticker directory unavailable")
                        }
                        FilingError::Exhausted { .. } | FilingError::MalformedResponse(_) => {
                            FilingError::Blocked {
                                status: None,
                                reason: format!("ticker directory unavailable: {e}"),
                            }
                        }
                        other => other,
                    })?;
                debug!(tickers = directory.len(), "Loaded ticker directory");
                Ok(Arc::new(directory))
            })
            .await
    }

    /// Resolves a ticker symbol.
    ///
    /// Successful resolutions are cached per ticker.
    ///
    /// # Errors
    /// - [`FilingError::InvalidParameter`] for a malformed ticker
    /// - [`FilingError::NotFound`] if every strategy ran and none matched
    /// - [`FilingError::Blocked`] if none matched and at least one strategy
    ///   failed upstream
    #[instrument(skip(self))]
    pub async fn resolve(&self, ticker: &str) -> Result<CompanyIdentity> {
        let ticker = normalize_ticker(ticker)?;
        let key = format!("resolve:{ticker}");
        self.ctx
            .cache
            .get_or_fetch(&key, self.ctx.ttls.identity, || self.resolve_uncached(&ticker))
            .await
    }

    async fn resolve_uncached(&self, ticker: &str) -> Result<CompanyIdentity> {
        let mut failures = Vec::new();

        for strategy in &self.strategies {
            match self.try_strategy(*strategy, ticker).await {
                Ok(Some(identity)) => {
                    debug!(%strategy, cik = %identity.cik, "Resolved ticker");
                    return Ok(identity);
                }
                Ok(None) => debug!(%strategy, "No match"),
                Err(e) => {
                    warn!(%strategy, error = %e, "Resolution strategy failed");
                    failures.push(format!("{strategy}: {e}"));
                }
            }
        }

        if failures.is_empty() {
            Err(FilingError::NotFound(format!(
                "No company found for ticker {ticker}"
            )))
        } else {
            Err(FilingError::Blocked {
                status: None,
                reason: format!("could not resolve {ticker} ({})", failures.join("; ")),
            })
        }
    }

    async fn try_strategy(
        &self,
        strategy: ResolveStrategy,
        ticker: &str,
    ) -> Result<Option<CompanyIdentity>> {
        match strategy {
            ResolveStrategy::TickerDirectory => {
                let directory = self.ticker_directory().await?;
                Ok(directory.by_ticker(ticker).cloned())
            }
            ResolveStrategy::CompanySearch => {
                let url = self.ctx.endpoints.company_search_url(ticker)?;
                let page = self.ctx.fetcher.fetch_text(&url).await?;
                Ok(self.extract_identity(&page, ticker))
            }
        }
    }

    fn extract_identity(&self, page: &str, ticker: &str) -> Option<CompanyIdentity> {
        let cik = self
            .extractors
            .iter()
            .find_map(|extractor| extractor.extract(page))?;
        let name = COMPANY_NAME
            .captures(page)
            .and_then(|caps| caps.get(1))
            .map_or_else(|| ticker.to_string(), |m| m.as_str().to_string());
        Some(CompanyIdentity::new(cik, name).with_ticker(ticker))
    }

    /// Resolves either a numeric CIK (one to ten digits) or a ticker.
    ///
    /// A CIK is not checked upstream; its display name comes from the ticker
    /// directory when available and falls back to the CIK itself.
    ///
    /// # Errors
    /// See [`Self::resolve`].
    #[instrument(skip(self))]
    pub async fn resolve_identifier(&self, input: &str) -> Result<CompanyIdentity> {
        let trimmed = input.trim();
        if trimmed.is_empty() || !trimmed.bytes().all(|b| b.is_ascii_digit()) {
            return self.resolve(trimmed).await;
        }

        let cik = Cik::new(trimmed)?;
        match self.ticker_directory().await {
            Ok(directory) => Ok(directory
                .by_cik(&cik)
                .cloned()
                .unwrap_or_else(|| CompanyIdentity::new(cik.clone(), cik.as_str()))),
            Err(e) => {
                warn!(%cik, error = %e, "Ticker directory unavailable, using CIK as name");
                Ok(CompanyIdentity::new(cik.clone(), cik.as_str()))
            }
        }
    }
}

fn normalize_ticker(raw: &str) -> Result<String> {
    let ticker = raw.trim().to_uppercase();
    let valid = !ticker.is_empty()
        && ticker.len() <= 12
        && ticker
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '.' || c == '-');
    if valid {
        Ok(ticker)
    } else {
        Err(FilingError::InvalidParameter(format!("Invalid ticker: {raw:?}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::testing::scripted_context;

    const DIRECTORY: &str = r#"[
        {"ticker": "AAPL", "cik": "320193", "title": "Apple Inc."},
        {"ticker": "MSFT", "cik": "789019", "title": "MICROSOFT CORP"}
    ]"#;

    const SEC_DIRECTORY: &str = r#"{
        "0": {"cik_str": 320193, "ticker": "AAPL", "title": "Apple Inc."},
        "1": {"cik_str": 1652044, "ticker": "GOOGL", "title": "Alphabet Inc."},
        "2": {"cik_str": 1652044, "ticker": "GOOG", "title": "Alphabet Inc."}
    }"#;

    const SEARCH_PAGE: &str = r#"<html><body>
        <div class="companyInfo">
          <span class="companyName">BERKSHIRE HATHAWAY INC <acronym title="Central Index Key">CIK</acronym>#:
            <a href="/cgi-bin/browse-edgar?action=getcompany&amp;CIK=0001067983&amp;owner=exclude&amp;count=40">0001067983 (see all company filings)</a>
          </span>
        </div>
        </body></html>"#;

    const HEADER_ONLY_PAGE: &str = r#"<span class="companyName">ACME HOLDINGS <acronym>CIK</acronym>#: 0000012345</span>"#;

    const NO_MATCH_PAGE: &str =
        "<html><body><h1>No matching companies.</h1></body></html>";

    #[test]
    fn test_data_url_extractor_requires_ten_digits() {
        let markup = r#"<a href="/Archives/edgar/data/320193/x.htm"></a>
                        <a href="/Archives/edgar/data/0000320193/y.htm"></a>"#;
        assert_eq!(
            CikExtractor::DataUrlPath.extract(markup).unwrap().as_str(),
            "0000320193"
        );
        assert!(
            CikExtractor::DataUrlPath
                .extract(r#"<a href="/edgar/data/320193/">"#)
                .is_none()
        );
    }

    #[test]
    fn test_company_header_extractor() {
        assert_eq!(
            CikExtractor::CompanyHeader
                .extract(HEADER_ONLY_PAGE)
                .unwrap()
                .as_str(),
            "0000012345"
        );
        assert!(CikExtractor::DataUrlPath.extract(HEADER_ONLY_PAGE).is_none());
        assert!(CikExtractor::CompanyHeader.extract(NO_MATCH_PAGE).is_none());
    }

    #[test]
    fn test_parse_sec_directory_shape() {
        let directory = TickerDirectory::parse(SEC_DIRECTORY).unwrap();
        assert_eq!(directory.len(), 3);
        assert_eq!(
            directory.by_ticker("googl").unwrap().cik.as_str(),
            "0001652044"
        );
        let alphabet = directory.by_cik(&Cik::new("1652044").unwrap()).unwrap();
        assert_eq!(alphabet.ticker.as_deref(), Some("GOOGL"));
    }

    #[test]
    fn test_parse_rejects_empty_directory() {
        assert!(matches!(
            TickerDirectory::parse("[]"),
            Err(FilingError::MalformedResponse(_))
        ));
        assert!(matches!(
            TickerDirectory::parse("<html>"),
            Err(FilingError::MalformedResponse(_))
        ));
    }

    #[tokio::test]
    async fn test_resolves_ticker_from_directory() {
        let (ctx, transport) = scripted_context(2);
        transport.respond(ctx.endpoints.ticker_directory_url(), 200, DIRECTORY);
        let resolver = IdentityResolver::new(ctx);

        let identity = resolver.resolve("AAPL").await.unwrap();
        assert_eq!(identity.cik.as_str(), "0000320193");
        assert_eq!(identity.name, "Apple Inc.");
        assert_eq!(identity.ticker.as_deref(), Some("AAPL"));

        let lower = resolver.resolve("msft").await.unwrap();
        assert_eq!(lower.cik.as_str(), "0000789019");
        assert_eq!(transport.total_hits(), 1);
    }

    #[tokio::test]
    async fn test_resolution_is_cached() {
        let (ctx, transport) = scripted_context(2);
        let directory_url = ctx.endpoints.ticker_directory_url();
        transport.respond(&directory_url, 200, DIRECTORY);
        let resolver = IdentityResolver::new(ctx);

        resolver.resolve("AAPL").await.unwrap();
        resolver.resolve(" aapl ").await.unwrap();
        assert_eq!(transport.hits(&directory_url), 1);
    }

    #[tokio::test]
    async fn test_falls_back_to_company_search() {
        let (ctx, transport) = scripted_context(2);
        transport.respond(ctx.endpoints.ticker_directory_url(), 200, DIRECTORY);
        transport.respond(
            ctx.endpoints.company_search_url("BRK.A").unwrap(),
            200,
            SEARCH_PAGE,
        );
        let resolver = IdentityResolver::new(ctx);

        let identity = resolver.resolve("brk.a").await.unwrap();
        assert_eq!(identity.cik.as_str(), "0001067983");
        assert_eq!(identity.name, "BERKSHIRE HATHAWAY INC");
        assert_eq!(identity.ticker.as_deref(), Some("BRK.A"));
    }

    #[tokio::test]
    async fn test_search_falls_through_to_header_extractor() {
        let (ctx, transport) = scripted_context(1);
        transport.respond(
            ctx.endpoints.company_search_url("ACME").unwrap(),
            200,
            HEADER_ONLY_PAGE,
        );
        let resolver =
            IdentityResolver::new(ctx).with_strategies(vec![ResolveStrategy::CompanySearch]);

        let identity = resolver.resolve("ACME").await.unwrap();
        assert_eq!(identity.cik.as_str(), "0000012345");
        assert_eq!(identity.name, "ACME HOLDINGS");
    }

    #[tokio::test]
    async fn test_no_match_anywhere_is_not_found() {
        let (ctx, transport) = scripted_context(2);
        transport.respond(ctx.endpoints.ticker_directory_url(), 200, DIRECTORY);
        transport.respond(
            ctx.endpoints.company_search_url("ZZZZ").unwrap(),
            200,
            NO_MATCH_PAGE,
        );
        let resolver = IdentityResolver::new(ctx);

        let err = resolver.resolve("ZZZZ").await.unwrap_err();
        assert!(matches!(err, FilingError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_upstream_failure_without_match_is_blocked() {
        let (ctx, transport) = scripted_context(2);
        transport.respond(ctx.endpoints.ticker_directory_url(), 503, "");
        transport.respond(
            ctx.endpoints.company_search_url("ZZZZ").unwrap(),
            200,
            NO_MATCH_PAGE,
        );
        let resolver = IdentityResolver::new(ctx);

        let err = resolver.resolve("ZZZZ").await.unwrap_err();
        assert!(matches!(err, FilingError::Blocked { .. }), "{err:?}");
    }

    #[tokio::test]
    async fn test_directory_failure_does_not_hide_search_match() {
        let (ctx, transport) = scripted_context(1);
        transport.respond(ctx.endpoints.ticker_directory_url(), 404, "");
        transport.respond(
            ctx.endpoints.company_search_url("BRK.A").unwrap(),
            200,
            SEARCH_PAGE,
        );
        let resolver = IdentityResolver::new(ctx);

        let identity = resolver.resolve("BRK.A").await.unwrap();
        assert_eq!(identity.cik.as_str(), "0001067983");
    }

    #[tokio::test]
    async fn test_invalid_ticker() {
        let (ctx, transport) = scripted_context(1);
        let resolver = IdentityResolver::new(ctx);

        assert!(matches!(
            resolver.resolve("  ").await,
            Err(FilingError::InvalidParameter(_))
        ));
        assert!(matches!(
            resolver.resolve("A&B").await,
            Err(FilingError::InvalidParameter(_))
        ));
        assert_eq!(transport.total_hits(), 0);
    }

    #[tokio::test]
    async fn test_resolve_identifier_accepts_cik() {
        let (ctx, transport) = scripted_context(1);
        transport.respond(ctx.endpoints.ticker_directory_url(), 200, DIRECTORY);
        let resolver = IdentityResolver::new(ctx);

        let apple = resolver.resolve_identifier("320193").await.unwrap();
        assert_eq!(apple.name, "Apple Inc.");
        assert_eq!(apple.ticker.as_deref(), Some("AAPL"));

        let unknown = resolver.resolve_identifier("0000000042").await.unwrap();
        assert_eq!(unknown.name, "0000000042");
        assert_eq!(unknown.ticker, None);

        let by_ticker = resolver.resolve_identifier("MSFT").await.unwrap();
        assert_eq!(by_ticker.cik.as_str(), "0000789019");
    }

    #[tokio::test]
    async fn test_resolve_identifier_survives_directory_outage() {
        let (ctx, transport) = scripted_context(1);
        transport.respond(ctx.endpoints.ticker_directory_url(), 403, "");
        let resolver = IdentityResolver::new(ctx);

        let identity = resolver.resolve_identifier("320193").await.unwrap();
        assert_eq!(identity.cik.as_str(), "0000320193");
        assert_eq!(identity.name, "0000320193");
    }
}
