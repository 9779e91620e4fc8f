//! The assembled engine.

use crate::aggregator::{AggregateOptions, AggregateReport, WatchlistAggregator};
use crate::fallback::FallbackSource;
use crate::watchlists::WatchlistService;
use filings_cache::ResponseCache;
use filings_core::{
    CacheTtls, CompanyIdentity, FilingError, FilingFilter, FilingRecord, FilingSource,
    MetricPoint, RequestConfig, Result, RetryPolicy, SortOrder, Summarizer, Summary,
    WatchlistStore, normalize, summarize_with_retry,
};
use filings_edgar::{
    BrowseAdapter, BulkIndexAdapter, CompanyFacts, EdgarContext, EdgarEndpoints, FactsAdapter,
    HeadlineMetric, HttpTransport, IdentityResolver, IndexPeriod, RateLimitedFetcher,
    extract, extract_headline,
};
use serde::Serialize;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument};

/// A company and its filings.
#[derive(Debug, Clone, Serialize)]
pub struct CompanyFilings {
    /// The resolved company.
    pub identity: CompanyIdentity,
    /// Its filings after normalization, filtering and sorting.
    pub records: Vec<FilingRecord>,
}

/// Builder for [`FilingEngine`].
#[derive(Debug)]
pub struct EngineBuilder {
    config: RequestConfig,
    endpoints: EdgarEndpoints,
    ttls: CacheTtls,
    transport: Option<Arc<dyn HttpTransport>>,
    cache: Option<Arc<ResponseCache>>,
}

impl EngineBuilder {
    /// Starts from a request configuration with default endpoints and TTLs.
    #[must_use]
    pub fn new(config: RequestConfig) -> Self {
        Self {
            config,
            endpoints: EdgarEndpoints::default(),
            ttls: CacheTtls::default(),
            transport: None,
            cache: None,
        }
    }

    /// Overrides the upstream base URLs.
    #[must_use]
    pub fn endpoints(mut self, endpoints: EdgarEndpoints) -> Self {
        self.endpoints = endpoints;
        self
    }

    /// Overrides the cache lifetimes.
    #[must_use]
    pub const fn ttls(mut self, ttls: CacheTtls) -> Self {
        self.ttls = ttls;
        self
    }

    /// Uses a custom HTTP transport instead of `reqwest`.
    #[must_use]
    pub fn transport(mut self, transport: Arc<dyn HttpTransport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Shares an existing response cache.
    #[must_use]
    pub fn cache(mut self, cache: Arc<ResponseCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Builds the engine.
    ///
    /// # Errors
    /// Returns an error if the HTTP client cannot be built.
    pub fn build(self) -> Result<FilingEngine> {
        let fetcher = match self.transport {
            Some(transport) => RateLimitedFetcher::with_transport(self.config, transport),
            None => RateLimitedFetcher::new(self.config)?,
        };
        let mut ctx = EdgarContext::new(fetcher)
            .with_endpoints(self.endpoints)
            .with_ttls(self.ttls);
        if let Some(cache) = self.cache {
            ctx = ctx.with_cache(cache);
        }
        Ok(FilingEngine::from_context(ctx))
    }
}

/// Resolves companies and retrieves their filings and metrics.
///
/// One fetcher (and so one rate limit) and one cache serve every operation.
/// Company filings come from the facts document, falling back to the browse
/// page when the facts document lists none.
#[derive(Debug, Clone)]
pub struct FilingEngine {
    ctx: EdgarContext,
    resolver: IdentityResolver,
    facts: FactsAdapter,
    source: Arc<dyn FilingSource>,
    aggregator: WatchlistAggregator,
}

impl FilingEngine {
    /// Starts building an engine.
    #[must_use]
    pub fn builder(config: RequestConfig) -> EngineBuilder {
        EngineBuilder::new(config)
    }

    /// Builds an engine with defaults.
    ///
    /// # Errors
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(config: RequestConfig) -> Result<Self> {
        EngineBuilder::new(config).build()
    }

    /// Assembles an engine around an existing context.
    #[must_use]
    pub fn from_context(ctx: EdgarContext) -> Self {
        let facts = FactsAdapter::new(ctx.clone());
        let browse = BrowseAdapter::new(ctx.clone());
        let source: Arc<dyn FilingSource> =
            Arc::new(FallbackSource::new(Arc::new(facts.clone()), Arc::new(browse)));
        Self {
            resolver: IdentityResolver::new(ctx.clone()),
            aggregator: WatchlistAggregator::new(Arc::clone(&source)),
            ctx,
            facts,
            source,
        }
    }

    /// Shared plumbing.
    #[must_use]
    pub fn context(&self) -> &EdgarContext {
        &self.ctx
    }

    /// The identity resolver.
    #[must_use]
    pub fn resolver(&self) -> &IdentityResolver {
        &self.resolver
    }

    /// The facts-then-browse filing source.
    #[must_use]
    pub fn source(&self) -> Arc<dyn FilingSource> {
        Arc::clone(&self.source)
    }

    /// The multi-company aggregator.
    #[must_use]
    pub fn aggregator(&self) -> &WatchlistAggregator {
        &self.aggregator
    }

    /// Resolves a ticker.
    ///
    /// # Errors
    /// See [`IdentityResolver::resolve`].
    pub async fn resolve(&self, ticker: &str) -> Result<CompanyIdentity> {
        self.resolver.resolve(ticker).await
    }

    /// Resolves a ticker or a numeric CIK.
    ///
    /// # Errors
    /// See [`IdentityResolver::resolve_identifier`].
    pub async fn resolve_identifier(&self, input: &str) -> Result<CompanyIdentity> {
        self.resolver.resolve_identifier(input).await
    }

    /// Normalized filings for a resolved company, in source order.
    ///
    /// # Errors
    /// Returns the source's error.
    pub async fn list_filings(&self, identity: &CompanyIdentity) -> Result<Vec<FilingRecord>> {
        let records = self.source.list_filings(&identity.cik).await?;
        Ok(normalize(records, &identity.name))
    }

    /// Resolves `identifier` and returns its filtered, sorted filings.
    ///
    /// # Errors
    /// Returns resolution or retrieval errors.
    #[instrument(skip(self, filter))]
    pub async fn company_filings(
        &self,
        identifier: &str,
        filter: &FilingFilter,
        sort: SortOrder,
    ) -> Result<CompanyFilings> {
        let identity = self.resolve_identifier(identifier).await?;
        let mut records = filter.apply(self.list_filings(&identity).await?);
        sort.apply(&mut records);
        info!(company = identity.label(), count = records.len(), "Company filings");
        Ok(CompanyFilings { identity, records })
    }

    /// The company facts document for `identifier`.
    ///
    /// # Errors
    /// Returns resolution or retrieval errors.
    pub async fn company_facts(&self, identifier: &str) -> Result<Arc<CompanyFacts>> {
        let identity = self.resolve_identifier(identifier).await?;
        self.facts.company_facts(&identity.cik).await
    }

    /// Latest value of `concept_tag` in `unit`.
    ///
    /// # Errors
    /// Returns [`FilingError::NotFound`] if the concept or unit is absent.
    #[instrument(skip(self))]
    pub async fn latest_metric(
        &self,
        identifier: &str,
        concept_tag: &str,
        unit: &str,
    ) -> Result<MetricPoint> {
        let facts = self.company_facts(identifier).await?;
        extract(&facts, concept_tag, unit)
    }

    /// Every headline metric the company reports. Metrics it does not report
    /// are left out.
    ///
    /// # Errors
    /// Returns resolution or retrieval errors.
    pub async fn headline_metrics(
        &self,
        identifier: &str,
    ) -> Result<Vec<(HeadlineMetric, MetricPoint)>> {
        let facts = self.company_facts(identifier).await?;
        let mut points = Vec::new();
        for metric in HeadlineMetric::ALL {
            match extract_headline(&facts, metric) {
                Ok(point) => points.push((metric, point)),
                Err(FilingError::NotFound(_)) => debug!(%metric, "Not reported"),
                Err(e) => return Err(e),
            }
        }
        Ok(points)
    }

    /// One quarter of the master index, filtered.
    ///
    /// # Errors
    /// Returns [`FilingError::Cancelled`] if `token` fired before the request,
    /// or retrieval errors.
    pub async fn quarterly_index(
        &self,
        period: IndexPeriod,
        filter: &FilingFilter,
        token: &CancellationToken,
    ) -> Result<Vec<FilingRecord>> {
        let adapter = BulkIndexAdapter::new(self.ctx.clone(), period);
        let index = adapter.fetch_quarter_cancellable(period, token).await?;
        Ok(index.iter().filter(|r| filter.matches(r)).cloned().collect())
    }

    /// Aggregates filings for several companies.
    pub async fn aggregate(
        &self,
        identities: &[CompanyIdentity],
        options: &AggregateOptions,
    ) -> AggregateReport {
        self.aggregator.aggregate(identities, options).await
    }

    /// A watchlist service over `store` that aggregates through this engine.
    #[must_use]
    pub fn watchlists(&self, store: Arc<dyn WatchlistStore>) -> WatchlistService {
        WatchlistService::new(store, self.aggregator.clone())
    }

    /// Fetches a filing's document as text.
    ///
    /// # Errors
    /// Returns retrieval errors.
    pub async fn document_text(&self, record: &FilingRecord) -> Result<String> {
        self.ctx.fetcher.fetch_text(record.document_url()).await
    }

    /// Fetches a filing's document and summarizes it.
    ///
    /// The summarizer runs under `policy`, separately from the fetch retries.
    ///
    /// # Errors
    /// Returns retrieval or summarization errors.
    pub async fn summarize_filing(
        &self,
        summarizer: &dyn Summarizer,
        policy: &RetryPolicy,
        record: &FilingRecord,
        instruction: &str,
    ) -> Result<Summary> {
        let text = self.document_text(record).await?;
        summarize_with_retry(summarizer, policy, &text, instruction).await
    }
}
