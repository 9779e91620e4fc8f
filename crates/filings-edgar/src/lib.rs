#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/factordynamics/filings/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

//! SEC EDGAR access.
//!
//! # Example
//!
//! ```no_run
//! use filings_core::{FilingSource, RequestConfig};
//! use filings_edgar::{EdgarContext, FactsAdapter, IdentityResolver, RateLimitedFetcher};
//!
//! # async fn example() -> filings_core::Result<()> {
//! let config = RequestConfig::new("FilingsDashboard", "ops@example.com")?;
//! let ctx = EdgarContext::new(RateLimitedFetcher::new(config)?);
//!
//! let apple = IdentityResolver::new(ctx.clone()).resolve("AAPL").await?;
//! let filings = FactsAdapter::new(ctx).list_filings(&apple.cik).await?;
//! println!("{} filings for {}", filings.len(), apple.name);
//! # Ok(())
//! # }
//! ```

/// HTML company browse page adapter.
pub mod browse;
/// Quarterly master index adapter.
pub mod bulk;
/// Shared fetcher, cache and endpoints.
pub mod context;
/// Upstream base URLs.
pub mod endpoints;
/// Company facts document and adapter.
pub mod facts;
/// Rate-limited fetching with retries.
pub mod fetcher;
/// XBRL metric extraction.
pub mod metrics;
/// Ticker and CIK resolution.
pub mod resolver;
/// HTTP transport seam.
pub mod transport;

pub use browse::{BrowseAdapter, parse_filing_table};
pub use bulk::{
    BulkIndexAdapter, BulkIndexReport, FIRST_INDEX_YEAR, IndexPeriod, LAST_INDEX_YEAR,
    MASTER_INDEX_HEADER_LINES, Quarter, parse_master_index,
};
pub use context::EdgarContext;
pub use endpoints::EdgarEndpoints;
pub use facts::{CompanyFacts, ConceptFacts, FactValue, FactsAdapter};
pub use fetcher::RateLimitedFetcher;
pub use metrics::{HeadlineMetric, extract, extract_headline};
pub use resolver::{CikExtractor, IdentityResolver, ResolveStrategy, TickerDirectory};
pub use transport::{HttpResponse, HttpTransport, ReqwestTransport, ScriptedTransport};
