//! Traits at the seams of the engine.
//!
//! - [`FilingSource`] - Anything that can list filings for a CIK
//! - [`WatchlistStore`] - Persistence collaborator for named company lists
//! - [`Summarizer`] - Text-in/text-out summarization collaborator

use async_trait::async_trait;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt::Debug;

use crate::{
    config::RetryPolicy,
    error::Result,
    retry::retry,
    types::{Cik, CompanyIdentity, FilingRecord, SourceAdapter, Summary},
};

/// A source of filing records for a single company.
#[async_trait]
pub trait FilingSource: Send + Sync + Debug {
    /// Returns the name of this source (e.g., "EDGAR company facts").
    fn name(&self) -> &str;

    /// Returns which adapter kind this source is.
    fn kind(&self) -> SourceAdapter;

    /// Lists the filings this source knows for `cik`.
    ///
    /// An empty list means the upstream reported no filings; failures are
    /// always returned as errors.
    async fn list_filings(&self, cik: &Cik) -> Result<Vec<FilingRecord>>;
}

/// Named company lists grouped by user scope.
pub type NamedLists = BTreeMap<String, BTreeSet<CompanyIdentity>>;

/// Persistence for users' named watchlists.
///
/// Implementations own the storage format; callers only see this shape.
#[async_trait]
pub trait WatchlistStore: Send + Sync + Debug {
    /// Loads every list saved under `user_scope`.
    async fn load_named_lists(&self, user_scope: &str) -> Result<NamedLists>;

    /// Replaces the members of list `name` under `user_scope`.
    async fn save_named_list(
        &self,
        user_scope: &str,
        name: &str,
        members: &BTreeSet<CompanyIdentity>,
    ) -> Result<()>;
}

/// Summarizes extracted filing text.
#[async_trait]
pub trait Summarizer: Send + Sync + Debug {
    /// Summarizes `document_text` following a natural-language `instruction`.
    async fn summarize(&self, document_text: &str, instruction: &str) -> Result<Summary>;
}

/// Calls `summarizer` under its own retry policy.
///
/// # Errors
/// Returns the summarizer's fatal error, or `Exhausted` once `policy` is spent.
pub async fn summarize_with_retry(
    summarizer: &dyn Summarizer,
    policy: &RetryPolicy,
    document_text: &str,
    instruction: &str,
) -> Result<Summary> {
    retry(policy, "summarize", |_| {
        summarizer.summarize(document_text, instruction)
    })
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FilingError;
    use crate::types::Citation;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    #[derive(Debug, Default)]
    struct FlakySummarizer {
        calls: AtomicU32,
    }

    #[async_trait]
    impl Summarizer for FlakySummarizer {
        async fn summarize(&self, document_text: &str, _instruction: &str) -> Result<Summary> {
            if self.calls.fetch_add(1, Ordering::SeqCst) == 0 {
                return Err(FilingError::TransientNetwork("HTTP 503".into()));
            }
            Ok(Summary {
                text: format!("{} chars summarized", document_text.len()),
                citations: vec![Citation {
                    uri: "https://www.sec.gov/".into(),
                    title: "SEC".into(),
                }],
            })
        }
    }

    #[tokio::test]
    async fn test_summarize_retries_independently() {
        let summarizer = FlakySummarizer::default();
        let policy = RetryPolicy::new(3, Duration::from_millis(1), 2.0);

        let summary = summarize_with_retry(&summarizer, &policy, "risk factors", "Summarize")
            .await
            .unwrap();

        assert_eq!(summary.text, "12 chars summarized");
        assert_eq!(summary.citations.len(), 1);
        assert_eq!(summarizer.calls.load(Ordering::SeqCst), 2);
    }
}
