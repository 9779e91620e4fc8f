//! Multi-company filing aggregation.

use filings_core::{
    CompanyIdentity, FilingError, FilingFilter, FilingRecord, FilingSource, Result, SortOrder,
    normalize,
};
use futures::stream::{self, StreamExt};
use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

/// Default number of companies fetched at once.
pub const DEFAULT_CONCURRENCY: usize = 3;

/// Upper bound on concurrent companies.
pub const MAX_CONCURRENCY: usize = 8;

/// How an aggregation runs and what it returns.
#[derive(Debug, Clone)]
pub struct AggregateOptions {
    /// Companies fetched at once; clamped to `1..=MAX_CONCURRENCY`.
    pub concurrency: usize,
    /// Applied to the merged records.
    pub filter: FilingFilter,
    /// Applied once every company has finished.
    pub sort: SortOrder,
    /// Stops dispatching further companies when cancelled.
    pub cancel: Option<CancellationToken>,
}

impl Default for AggregateOptions {
    fn default() -> Self {
        Self {
            concurrency: DEFAULT_CONCURRENCY,
            filter: FilingFilter::default(),
            sort: SortOrder::default(),
            cancel: None,
        }
    }
}

impl AggregateOptions {
    /// Default options.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the worker count.
    #[must_use]
    pub const fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }

    /// Sets the post-hoc filter.
    #[must_use]
    pub fn with_filter(mut self, filter: FilingFilter) -> Self {
        self.filter = filter;
        self
    }

    /// Sets the final ordering.
    #[must_use]
    pub const fn with_sort(mut self, sort: SortOrder) -> Self {
        self.sort = sort;
        self
    }

    /// Sets the cancellation token.
    #[must_use]
    pub fn with_cancel(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    fn workers(&self) -> usize {
        self.concurrency.clamp(1, MAX_CONCURRENCY)
    }
}

/// A company whose filings could not be retrieved.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompanyFailure {
    /// The company.
    pub identity: CompanyIdentity,
    /// Why it failed.
    #[serde(serialize_with = "serialize_error")]
    pub error: FilingError,
}

fn serialize_error<S: serde::Serializer>(
    error: &FilingError,
    serializer: S,
) -> std::result::Result<S::Ok, S::Error> {
    serializer.collect_str(error)
}

/// Result of an aggregation: successes and failures side by side.
#[derive(Debug, Clone, Default, Serialize)]
pub struct AggregateReport {
    /// Filtered, sorted records from every company that succeeded.
    pub records: Vec<FilingRecord>,
    /// Companies that failed, in input order.
    pub failures: Vec<CompanyFailure>,
    /// Companies never dispatched because of cancellation, in input order.
    pub skipped: Vec<CompanyIdentity>,
    /// True if the cancellation token fired.
    pub cancelled: bool,
    /// Distinct companies requested.
    pub total: usize,
}

impl AggregateReport {
    /// Number of companies that returned filings (possibly none).
    #[must_use]
    pub fn succeeded(&self) -> usize {
        self.total - self.failures.len() - self.skipped.len()
    }

    /// A [`FilingError::PartialBatch`] if any company failed.
    #[must_use]
    pub fn warning(&self) -> Option<FilingError> {
        (!self.failures.is_empty()).then(|| FilingError::PartialBatch {
            failed: self.failures.len(),
            total: self.total,
        })
    }

    /// Turns a batch in which every company failed into its first error.
    ///
    /// # Errors
    /// Returns the first failure when nothing succeeded and nothing was skipped.
    pub fn into_result(self) -> Result<Self> {
        let nothing_succeeded = self.succeeded() == 0 && self.skipped.is_empty();
        match self.failures.first() {
            Some(first) if nothing_succeeded => Err(first.error.clone()),
            _ => Ok(self),
        }
    }
}

enum Outcome {
    Fetched(CompanyIdentity, Result<Vec<FilingRecord>>),
    Skipped(CompanyIdentity),
}

/// Fetches filings for many companies through one [`FilingSource`].
#[derive(Debug, Clone)]
pub struct WatchlistAggregator {
    source: Arc<dyn FilingSource>,
}

impl WatchlistAggregator {
    /// Creates an aggregator over `source`.
    #[must_use]
    pub fn new(source: Arc<dyn FilingSource>) -> Self {
        Self { source }
    }

    /// Lists filings for every company in `identities`.
    ///
    /// Duplicate companies (same CIK) are fetched once. Each company's records
    /// are deduplicated and backfilled with its name. One company failing
    /// never aborts the others; its error is recorded in
    /// [`AggregateReport::failures`]. Filtering and sorting happen after every
    /// company has finished.
    #[instrument(skip_all, fields(companies = identities.len()))]
    pub async fn aggregate(
        &self,
        identities: &[CompanyIdentity],
        options: &AggregateOptions,
    ) -> AggregateReport {
        let mut seen = HashSet::new();
        let unique: Vec<CompanyIdentity> = identities
            .iter()
            .filter(|identity| seen.insert(identity.cik.clone()))
            .cloned()
            .collect();
        let total = unique.len();
        let cancel = options.cancel.clone().unwrap_or_default();

        let mut outcomes: Vec<(usize, Outcome)> = stream::iter(unique.into_iter().enumerate())
            .map(|(index, identity)| {
                let cancel = cancel.clone();
                async move {
                    if cancel.is_cancelled() {
                        debug!(cik = %identity.cik, "Cancelled before dispatch");
                        return (index, Outcome::Skipped(identity));
                    }
                    let result = self
                        .source
                        .list_filings(&identity.cik)
                        .await
                        .map(|records| normalize(records, &identity.name));
                    (index, Outcome::Fetched(identity, result))
                }
            })
            .buffer_unordered(options.workers())
            .collect()
            .await;
        outcomes.sort_by_key(|(index, _)| *index);

        let mut report = AggregateReport {
            total,
            cancelled: cancel.is_cancelled(),
            ..AggregateReport::default()
        };
        for (_, outcome) in outcomes {
            match outcome {
                Outcome::Fetched(identity, Ok(records)) => {
                    debug!(company = identity.label(), count = records.len(), "Fetched");
                    report.records.extend(records);
                }
                Outcome::Fetched(identity, Err(error)) => {
                    warn!(company = identity.label(), %error, "Company failed");
                    report.failures.push(CompanyFailure { identity, error });
                }
                Outcome::Skipped(identity) => report.skipped.push(identity),
            }
        }

        report.records = options.filter.apply(std::mem::take(&mut report.records));
        options.sort.apply(&mut report.records);

        info!(
            records = report.records.len(),
            failed = report.failures.len(),
            skipped = report.skipped.len(),
            cancelled = report.cancelled,
            "Aggregation finished"
        );
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::NaiveDate;
    use filings_core::{Cik, SourceAdapter};
    use std::collections::HashMap;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    /// Serves canned records per CIK, tracking peak concurrency.
    #[derive(Debug, Default)]
    struct StubSource {
        responses: HashMap<String, Result<Vec<FilingRecord>>>,
        in_flight: AtomicUsize,
        peak: AtomicUsize,
        calls: Mutex<Vec<String>>,
        cancel_after_first: Option<CancellationToken>,
    }

    impl StubSource {
        fn with(mut self, cik: &str, result: Result<Vec<FilingRecord>>) -> Self {
            self.responses
                .insert(Cik::new(cik).unwrap().as_str().to_string(), result);
            self
        }
    }

    #[async_trait]
    impl FilingSource for StubSource {
        fn name(&self) -> &str {
            "stub"
        }

        fn kind(&self) -> SourceAdapter {
            SourceAdapter::Facts
        }

        async fn list_filings(&self, cik: &Cik) -> Result<Vec<FilingRecord>> {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            self.calls.lock().unwrap().push(cik.to_string());
            if let Some(token) = &self.cancel_after_first {
                token.cancel();
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            self.responses
                .get(cik.as_str())
                .cloned()
                .unwrap_or_else(|| Ok(Vec::new()))
        }
    }

    fn record(cik: &str, form: &str, day: u32) -> FilingRecord {
        FilingRecord::new(
            Cik::new(cik).unwrap(),
            form,
            NaiveDate::from_ymd_opt(2024, 3, day).unwrap(),
            format!("https://www.sec.gov/{cik}/{form}/{day}"),
            SourceAdapter::Facts,
        )
    }

    fn identity(cik: &str, name: &str) -> CompanyIdentity {
        CompanyIdentity::new(Cik::new(cik).unwrap(), name)
    }

    #[tokio::test]
    async fn test_one_failure_does_not_abort_batch() {
        let source = StubSource::default()
            .with("1", Ok(vec![record("1", "10-K", 1)]))
            .with(
                "2",
                Err(FilingError::Exhausted {
                    attempts: 4,
                    last: Box::new(FilingError::TransientNetwork("reset".into())),
                }),
            )
            .with("3", Ok(vec![record("3", "10-Q", 5), record("3", "8-K", 3)]));
        let aggregator = WatchlistAggregator::new(Arc::new(source));
        let companies = [identity("1", "One"), identity("2", "Two"), identity("3", "Three")];

        let report = aggregator
            .aggregate(&companies, &AggregateOptions::default())
            .await;

        assert_eq!(report.records.len(), 3);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].identity.name, "Two");
        assert_eq!(report.succeeded(), 2);
        assert_eq!(
            report.warning(),
            Some(FilingError::PartialBatch { failed: 1, total: 3 })
        );

        // Sorted newest first across companies, names backfilled.
        let days: Vec<u32> = report
            .records
            .iter()
            .map(|r| chrono::Datelike::day(&r.filing_date()))
            .collect();
        assert_eq!(days, vec![5, 3, 1]);
        assert_eq!(report.records[0].company_name(), "Three");

        let json = serde_json::to_value(&report).unwrap();
        assert!(
            json["failures"][0]["error"]
                .as_str()
                .unwrap()
                .starts_with("Gave up after 4 attempts")
        );
    }

    #[tokio::test]
    async fn test_filter_and_sort_apply_to_merged_records() {
        let source = StubSource::default()
            .with("1", Ok(vec![record("1", "10-K", 1), record("1", "8-K", 9)]))
            .with("2", Ok(vec![record("2", "10-k", 4)]));
        let aggregator = WatchlistAggregator::new(Arc::new(source));
        let options = AggregateOptions::new()
            .with_filter(FilingFilter::new().with_form_types(["10-K"]))
            .with_sort(SortOrder::FilingDateAsc);

        let report = aggregator
            .aggregate(&[identity("1", "One"), identity("2", "Two")], &options)
            .await;

        let forms: Vec<&str> = report.records.iter().map(FilingRecord::form_type).collect();
        assert_eq!(forms, vec!["10-K", "10-k"]);
        assert!(report.warning().is_none());
    }

    #[tokio::test]
    async fn test_concurrency_is_bounded() {
        let mut source = StubSource::default();
        for cik in 1..=10 {
            source = source.with(&cik.to_string(), Ok(Vec::new()));
        }
        let source = Arc::new(source);
        let aggregator = WatchlistAggregator::new(source.clone());
        let companies: Vec<_> = (1..=10)
            .map(|cik| identity(&cik.to_string(), "Co"))
            .collect();

        let report = aggregator
            .aggregate(&companies, &AggregateOptions::new().with_concurrency(2))
            .await;

        assert_eq!(report.succeeded(), 10);
        assert!(source.peak.load(Ordering::SeqCst) <= 2);

        let clamped = AggregateOptions::new().with_concurrency(100);
        assert_eq!(clamped.workers(), MAX_CONCURRENCY);
        assert_eq!(AggregateOptions::new().with_concurrency(0).workers(), 1);
    }

    #[tokio::test]
    async fn test_duplicate_companies_fetched_once() {
        let source = Arc::new(StubSource::default().with("1", Ok(vec![record("1", "10-K", 1)])));
        let aggregator = WatchlistAggregator::new(source.clone());

        let report = aggregator
            .aggregate(
                &[identity("1", "One"), identity("0000000001", "One again")],
                &AggregateOptions::default(),
            )
            .await;

        assert_eq!(report.total, 1);
        assert_eq!(report.records.len(), 1);
        assert_eq!(source.calls.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_cancellation_stops_new_dispatches() {
        let token = CancellationToken::new();
        let source = StubSource {
            cancel_after_first: Some(token.clone()),
            ..StubSource::default()
        };
        let source = Arc::new(source);
        let aggregator = WatchlistAggregator::new(source.clone());
        let companies: Vec<_> = (1..=5)
            .map(|cik| identity(&cik.to_string(), "Co"))
            .collect();

        let report = aggregator
            .aggregate(
                &companies,
                &AggregateOptions::new()
                    .with_concurrency(1)
                    .with_cancel(token),
            )
            .await;

        assert!(report.cancelled);
        assert_eq!(source.calls.lock().unwrap().len(), 1);
        assert_eq!(report.skipped.len(), 4);
        assert_eq!(report.skipped[0].cik.as_str(), "0000000002");
        assert!(report.failures.is_empty());
    }

    #[tokio::test]
    async fn test_all_failed_into_result() {
        let source = StubSource::default().with("1", Err(FilingError::NotFound("gone".into())));
        let aggregator = WatchlistAggregator::new(Arc::new(source));

        let report = aggregator
            .aggregate(&[identity("1", "One")], &AggregateOptions::default())
            .await;
        assert!(matches!(report.into_result(), Err(FilingError::NotFound(_))));
    }
}
