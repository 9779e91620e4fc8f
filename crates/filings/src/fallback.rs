//! Primary/fallback composition of filing sources.

use async_trait::async_trait;
use filings_core::{Cik, FilingRecord, FilingSource, Result, SourceAdapter};
use std::sync::Arc;
use tracing::debug;

/// Lists filings from `primary`, switching to `fallback` only when the primary
/// succeeds with an empty list.
///
/// Results are never merged. Errors from the primary are returned as they are;
/// a failure is not an empty list.
#[derive(Debug, Clone)]
pub struct FallbackSource {
    primary: Arc<dyn FilingSource>,
    fallback: Arc<dyn FilingSource>,
    name: String,
}

impl FallbackSource {
    /// Composes two sources.
    #[must_use]
    pub fn new(primary: Arc<dyn FilingSource>, fallback: Arc<dyn FilingSource>) -> Self {
        let name = format!("{} (fallback: {})", primary.name(), fallback.name());
        Self {
            primary,
            fallback,
            name,
        }
    }
}

#[async_trait]
impl FilingSource for FallbackSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> SourceAdapter {
        self.primary.kind()
    }

    async fn list_filings(&self, cik: &Cik) -> Result<Vec<FilingRecord>> {
        let records = self.primary.list_filings(cik).await?;
        if !records.is_empty() {
            return Ok(records);
        }

        debug!(
            %cik,
            primary = self.primary.name(),
            fallback = self.fallback.name(),
            "Primary source returned no filings, using fallback"
        );
        self.fallback.list_filings(cik).await
    }
}
