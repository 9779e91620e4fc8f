#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/factordynamics/filings/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

//! Core types and traits for SEC filing retrieval.
//!
//! This crate provides the foundational abstractions shared by every other crate:
//!
//! - [`FilingRecord`](types::FilingRecord) and [`CompanyIdentity`](types::CompanyIdentity) - The unit of exchange
//! - [`FilingError`](error::FilingError) - Error taxonomy with retry classification
//! - [`RequestConfig`](config::RequestConfig) and [`RetryPolicy`](config::RetryPolicy) - Explicit configuration
//! - [`retry`](retry::retry) - Bounded exponential backoff
//! - [`normalize`](normalize::normalize) - Deduplication and name backfill
//! - [`FilingSource`](source::FilingSource) - Polymorphic filing sources
//! - [`WatchlistStore`](source::WatchlistStore) and [`Summarizer`](source::Summarizer) - Collaborator seams

/// Request, retry and cache TTL configuration.
pub mod config;
/// Error types for filing operations.
pub mod error;
/// Post-hoc filters over filing lists.
pub mod filter;
/// Deduplication and sorting of filing lists.
pub mod normalize;
/// Retry state machine.
pub mod retry;
/// Source and collaborator traits.
pub mod source;
/// Core data types (Cik, FilingRecord, MetricPoint, etc.).
pub mod types;

// Re-export commonly used items at crate root
pub use config::{CacheTtls, RequestConfig, RetryPolicy};
pub use error::{FilingError, Result};
pub use filter::FilingFilter;
pub use normalize::{SortOrder, normalize};
pub use retry::{FetchPhase, RetryState, retry};
pub use source::{FilingSource, NamedLists, Summarizer, WatchlistStore, summarize_with_retry};
pub use types::{
    Cik, Citation, CompanyIdentity, FilingIdentity, FilingRecord, MetricPoint, SourceAdapter,
    Summary, WatchlistMembership,
};
