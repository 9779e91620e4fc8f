#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/factordynamics/filings/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

//! Caching and watchlist persistence for filing retrieval.
//!
//! - [`ResponseCache`] - TTL cache with single-flight de-duplication per key
//! - [`InMemoryWatchlistStore`] - Watchlists held in memory, for tests and batch jobs
//! - [`SqliteWatchlistStore`] - Persistent watchlists (requires `sqlite` feature)

/// Single-flight response cache.
pub mod memory;
/// In-memory watchlist store.
pub mod watchlist;

/// SQLite-based watchlist store.
#[cfg(feature = "sqlite")]
pub mod sqlite;

// Re-export the trait for convenience
pub use filings_core::WatchlistStore;

pub use memory::ResponseCache;
pub use watchlist::InMemoryWatchlistStore;

#[cfg(feature = "sqlite")]
pub use sqlite::SqliteWatchlistStore;
