#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/factordynamics/filings/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

//! Company resolution and SEC filing retrieval.
//!
//! This crate re-exports the core types, the cache and the EDGAR adapters, and
//! assembles them into a [`FilingEngine`].
//!
//! # Features
//!
//! - `sqlite` - SQLite-backed watchlist persistence
//!
//! # Example
//!
//! ```rust,ignore
//! use filings::{FilingEngine, FilingFilter, RequestConfig, SortOrder};
//!
//! #[tokio::main]
//! async fn main() -> filings::Result<()> {
//!     let engine = FilingEngine::new(RequestConfig::new("FilingsDashboard", "ops@example.com")?)?;
//!
//!     let filter = FilingFilter::new().with_form_types(["10-K", "10-Q"]);
//!     let apple = engine.company_filings("AAPL", &filter, SortOrder::FilingDateDesc).await?;
//!     for filing in &apple.records {
//!         println!("{} {} {}", filing.filing_date(), filing.form_type(), filing.document_url());
//!     }
//!
//!     Ok(())
//! }
//! ```

// Core types and traits
pub use filings_core::*;

// Cache and watchlist stores
#[cfg(feature = "sqlite")]
pub use filings_cache::SqliteWatchlistStore;
pub use filings_cache::{InMemoryWatchlistStore, ResponseCache};

// EDGAR access
pub use filings_edgar::{
    BrowseAdapter, BulkIndexAdapter, BulkIndexReport, CompanyFacts, EdgarContext, EdgarEndpoints,
    FactsAdapter, HeadlineMetric, HttpTransport, IdentityResolver, IndexPeriod, Quarter,
    RateLimitedFetcher, ScriptedTransport,
};

mod aggregator;
mod engine;
mod fallback;
mod watchlists;

pub use aggregator::{
    AggregateOptions, AggregateReport, CompanyFailure, DEFAULT_CONCURRENCY, MAX_CONCURRENCY,
    WatchlistAggregator,
};
pub use engine::{CompanyFilings, EngineBuilder, FilingEngine};
pub use fallback::FallbackSource;
pub use tokio_util::sync::CancellationToken;
pub use watchlists::WatchlistService;
