//! Quarterly `master.idx` bulk index.

use crate::context::EdgarContext;
use crate::fetcher::ACCEPT_TEXT;
use async_trait::async_trait;
use chrono::{Datelike, NaiveDate};
use filings_core::{Cik, FilingError, FilingRecord, FilingSource, Result, SourceAdapter};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::{Arc, LazyLock};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

/// Lines preceding the first data row of a master index.
pub const MASTER_INDEX_HEADER_LINES: usize = 11;

/// First year with a full-text index.
pub const FIRST_INDEX_YEAR: i32 = 1993;

/// Last year [`IndexPeriod::new`] accepts.
pub const LAST_INDEX_YEAR: i32 = 9999;

const COLUMN_HEADER: &str = "CIK|Company Name|Form Type|Date Filed|Filename";

static ACCESSION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d{10}-\d{2}-\d{6}$").expect("valid accession pattern"));

/// Calendar quarter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Quarter {
    /// January to March.
    Q1,
    /// April to June.
    Q2,
    /// July to September.
    Q3,
    /// October to December.
    Q4,
}

impl Quarter {
    /// Quarter number, 1 to 4.
    #[must_use]
    pub const fn number(self) -> u8 {
        match self {
            Self::Q1 => 1,
            Self::Q2 => 2,
            Self::Q3 => 3,
            Self::Q4 => 4,
        }
    }

    /// Parses a quarter number.
    ///
    /// # Errors
    /// Returns [`FilingError::InvalidParameter`] outside 1 to 4.
    pub fn from_number(n: u8) -> Result<Self> {
        match n {
            1 => Ok(Self::Q1),
            2 => Ok(Self::Q2),
            3 => Ok(Self::Q3),
            4 => Ok(Self::Q4),
            _ => Err(FilingError::InvalidParameter(format!(
                "Quarter must be 1-4, got {n}"
            ))),
        }
    }

    fn next(self) -> Option<Self> {
        match self {
            Self::Q1 => Some(Self::Q2),
            Self::Q2 => Some(Self::Q3),
            Self::Q3 => Some(Self::Q4),
            Self::Q4 => None,
        }
    }
}

/// A year and quarter of the full index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct IndexPeriod {
    year: i32,
    quarter: Quarter,
}

impl IndexPeriod {
    /// Creates a period.
    ///
    /// # Errors
    /// Returns [`FilingError::InvalidParameter`] for a year outside
    /// [`FIRST_INDEX_YEAR`]..=[`LAST_INDEX_YEAR`] or an invalid quarter.
    pub fn new(year: i32, quarter: u8) -> Result<Self> {
        if !(FIRST_INDEX_YEAR..=LAST_INDEX_YEAR).contains(&year) {
            return Err(FilingError::InvalidParameter(format!(
                "Full index years run {FIRST_INDEX_YEAR} to {LAST_INDEX_YEAR}, got {year}"
            )));
        }
        Ok(Self {
            year,
            quarter: Quarter::from_number(quarter)?,
        })
    }

    /// The period containing `date`.
    #[must_use]
    pub fn containing(date: NaiveDate) -> Self {
        let quarter = match date.month() {
            1..=3 => Quarter::Q1,
            4..=6 => Quarter::Q2,
            7..=9 => Quarter::Q3,
            _ => Quarter::Q4,
        };
        Self {
            year: date.year(),
            quarter,
        }
    }

    /// Year.
    #[must_use]
    pub const fn year(&self) -> i32 {
        self.year
    }

    /// Quarter.
    #[must_use]
    pub const fn quarter(&self) -> Quarter {
        self.quarter
    }

    /// The following quarter.
    #[must_use]
    pub fn next(&self) -> Self {
        match self.quarter.next() {
            Some(quarter) => Self {
                year: self.year,
                quarter,
            },
            None => Self {
                year: self.year + 1,
                quarter: Quarter::Q1,
            },
        }
    }

    /// Every period from `self` through `last`, inclusive.
    #[must_use]
    pub fn through(&self, last: Self) -> Vec<Self> {
        let mut periods = Vec::new();
        let mut current = *self;
        while current <= last {
            periods.push(current);
            current = current.next();
        }
        periods
    }
}

impl fmt::Display for IndexPeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} QTR{}", self.year, self.quarter.number())
    }
}

/// Parses a master index file.
///
/// The first [`MASTER_INDEX_HEADER_LINES`] lines are skipped. A file shorter
/// than that yields no records. Each remaining line must have exactly five
/// `|`-separated fields with a numeric CIK and a `YYYY-MM-DD` date; other
/// lines are skipped.
///
/// # Errors
/// Returns [`FilingError::MalformedResponse`] if a full-length file lacks the
/// column header, which is what an HTML error page looks like.
pub fn parse_master_index(text: &str, archives_base: &str) -> Result<Vec<FilingRecord>> {
    let lines: Vec<&str> = text.lines().collect();
    if lines.len() < MASTER_INDEX_HEADER_LINES {
        warn!(
            lines = lines.len(),
            "Master index shorter than its header, treating as empty"
        );
        return Ok(Vec::new());
    }

    let (header, rows) = lines.split_at(MASTER_INDEX_HEADER_LINES);
    if !header.iter().any(|line| line.trim() == COLUMN_HEADER) {
        return Err(FilingError::MalformedResponse(
            "Master index header is missing its column line".into(),
        ));
    }

    let archives_base = archives_base.trim_end_matches('/');
    let mut skipped = 0usize;
    let records: Vec<FilingRecord> = rows
        .iter()
        .filter(|line| !line.trim().is_empty())
        .filter_map(|line| {
            let record = parse_row(line, archives_base);
            if record.is_none() {
                skipped += 1;
            }
            record
        })
        .collect();

    if skipped > 0 {
        debug!(skipped, "Skipped malformed master index lines");
    }
    Ok(records)
}

fn parse_row(line: &str, archives_base: &str) -> Option<FilingRecord> {
    let fields: Vec<&str> = line.split('|').map(str::trim).collect();
    let [cik, company, form, date, filename] = fields.as_slice() else {
        return None;
    };
    let cik = Cik::new(cik).ok()?;
    let date = NaiveDate::parse_from_str(date, "%Y-%m-%d").ok()?;
    if form.is_empty() || filename.is_empty() {
        return None;
    }

    let url = format!("{archives_base}/{}", filename.trim_start_matches('/'));
    let mut record = FilingRecord::new(cik, *form, date, url, SourceAdapter::BulkIndex)
        .with_company_name(*company);

    let stem = filename
        .rsplit('/')
        .next()
        .and_then(|name| name.split('.').next())
        .unwrap_or_default();
    if ACCESSION.is_match(stem) {
        record = record.with_accession(stem);
    }
    Some(record)
}

/// Outcome of fetching several quarters.
#[derive(Debug, Clone, Default)]
pub struct BulkIndexReport {
    /// Records from every completed quarter, in period order.
    pub records: Vec<FilingRecord>,
    /// Quarters that were fetched.
    pub completed: Vec<IndexPeriod>,
    /// True if cancellation stopped the range early.
    pub cancelled: bool,
}

/// Filings from the quarterly master index.
#[derive(Debug, Clone)]
pub struct BulkIndexAdapter {
    ctx: EdgarContext,
    period: IndexPeriod,
}

impl BulkIndexAdapter {
    /// Creates an adapter whose [`FilingSource`] view covers `period`.
    #[must_use]
    pub fn new(ctx: EdgarContext, period: IndexPeriod) -> Self {
        Self { ctx, period }
    }

    /// The period listed by [`FilingSource::list_filings`].
    #[must_use]
    pub fn period(&self) -> IndexPeriod {
        self.period
    }

    /// Fetches (or reads from cache) one quarter's index.
    ///
    /// # Errors
    /// Returns fetch errors; a quarter not yet published is `NotFound`.
    #[instrument(skip(self))]
    pub async fn fetch_quarter(&self, period: IndexPeriod) -> Result<Arc<Vec<FilingRecord>>> {
        let key = format!("bulk:{}:Q{}", period.year(), period.quarter().number());
        let url = self
            .ctx
            .endpoints
            .master_index_url(period.year(), period.quarter().number());
        let archives_base = self.ctx.endpoints.archives_base.clone();

        self.ctx
            .cache
            .get_or_fetch(&key, self.ctx.ttls.bulk_index, || async {
                let records = self
                    .ctx
                    .fetcher
                    .fetch_with(&url, ACCEPT_TEXT, |body| {
                        parse_master_index(body, &archives_base)
                    })
                    .await?;
                info!(count = records.len(), "Parsed master index");
                Ok(Arc::new(records))
            })
            .await
    }

    /// Like [`Self::fetch_quarter`], but refuses to start once `token` is
    /// cancelled. A request already dispatched runs to completion.
    ///
    /// # Errors
    /// Returns [`FilingError::Cancelled`] if the token was cancelled first.
    pub async fn fetch_quarter_cancellable(
        &self,
        period: IndexPeriod,
        token: &CancellationToken,
    ) -> Result<Arc<Vec<FilingRecord>>> {
        if token.is_cancelled() {
            debug!(%period, "Cancelled before dispatch");
            return Err(FilingError::Cancelled);
        }
        self.fetch_quarter(period).await
    }

    /// Fetches `periods` in order, stopping before the next quarter once
    /// `token` is cancelled.
    ///
    /// # Errors
    /// Returns the first fetch error.
    pub async fn fetch_range(
        &self,
        periods: &[IndexPeriod],
        token: &CancellationToken,
    ) -> Result<BulkIndexReport> {
        let mut report = BulkIndexReport::default();
        for period in periods {
            match self.fetch_quarter_cancellable(*period, token).await {
                Ok(records) => {
                    report.records.extend(records.iter().cloned());
                    report.completed.push(*period);
                }
                Err(FilingError::Cancelled) => {
                    report.cancelled = true;
                    break;
                }
                Err(e) => return Err(e),
            }
        }
        Ok(report)
    }
}

#[async_trait]
impl FilingSource for BulkIndexAdapter {
    fn name(&self) -> &str {
        "EDGAR master index"
    }

    fn kind(&self) -> SourceAdapter {
        SourceAdapter::BulkIndex
    }

    async fn list_filings(&self, cik: &Cik) -> Result<Vec<FilingRecord>> {
        let index = self.fetch_quarter(self.period).await?;
        Ok(index.iter().filter(|r| r.cik() == cik).cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::testing::scripted_context;

    const ARCHIVES: &str = "https://www.sec.gov/Archives";

    const MASTER_INDEX: &str = "\
Description:           Master Index of EDGAR Dissemination Feed
Last Data Received:    September 30, 2024
Comments:              webmaster@sec.gov
Anonymous FTP:         ftp://ftp.sec.gov/edgar/
Cloud HTTP:            https://www.sec.gov/Archives/




CIK|Company Name|Form Type|Date Filed|Filename
--------------------------------------------------------------------------------
1000045|NICHOLAS FINANCIAL INC|10-Q|2024-08-14|edgar/data/1000045/0000950170-24-095001.txt
320193|Apple Inc.|10-Q|2024-08-02|edgar/data/320193/0000320193-24-000081.txt
320193|Apple Inc.|8-K|2024-08-01|edgar/data/320193/0000320193-24-000080.txt
this line is not an index row
789019|MICROSOFT CORP|10-K|not-a-date|edgar/data/789019/0000950170-24-087843.txt
";

    #[test]
    fn test_parses_rows_after_header() {
        let records = parse_master_index(MASTER_INDEX, ARCHIVES).unwrap();
        assert_eq!(records.len(), 3);

        let first = &records[0];
        assert_eq!(first.cik().as_str(), "0001000045");
        assert_eq!(first.company_name(), "NICHOLAS FINANCIAL INC");
        assert_eq!(first.form_type(), "10-Q");
        assert_eq!(
            first.document_url(),
            "https://www.sec.gov/Archives/edgar/data/1000045/0000950170-24-095001.txt"
        );
        assert_eq!(first.accession_number(), Some("0000950170-24-095001"));
        assert_eq!(first.source_adapter(), SourceAdapter::BulkIndex);
    }

    #[test]
    fn test_short_file_is_empty() {
        let short = "Description: Master Index\nComments: webmaster@sec.gov\n";
        assert!(parse_master_index(short, ARCHIVES).unwrap().is_empty());
        assert!(parse_master_index("", ARCHIVES).unwrap().is_empty());
    }

    #[test]
    fn test_header_only_is_empty() {
        let header: String = MASTER_INDEX
            .lines()
            .take(MASTER_INDEX_HEADER_LINES)
            .map(|l| format!("{l}\n"))
            .collect();
        assert!(parse_master_index(&header, ARCHIVES).unwrap().is_empty());
    }

    #[test]
    fn test_error_page_is_malformed() {
        let page = "<html>\n".repeat(20);
        assert!(matches!(
            parse_master_index(&page, ARCHIVES),
            Err(FilingError::MalformedResponse(_))
        ));
    }

    #[test]
    fn test_period_validation_and_range() {
        assert!(IndexPeriod::new(2024, 5).is_err());
        assert!(IndexPeriod::new(1980, 1).is_err());
        assert!(IndexPeriod::new(i32::MAX, 4).is_err());
        assert!(IndexPeriod::new(LAST_INDEX_YEAR + 1, 1).is_err());

        let last = IndexPeriod::new(LAST_INDEX_YEAR, 4).unwrap();
        assert_eq!(last.through(last), vec![last]);
        assert_eq!(last.next().year(), LAST_INDEX_YEAR + 1);

        let start = IndexPeriod::new(2023, 3).unwrap();
        let end = IndexPeriod::new(2024, 2).unwrap();
        let periods = start.through(end);
        assert_eq!(periods.len(), 4);
        assert_eq!(periods[2], IndexPeriod::new(2024, 1).unwrap());
        assert_eq!(periods[3].to_string(), "2024 QTR2");

        let date = NaiveDate::from_ymd_opt(2024, 8, 2).unwrap();
        assert_eq!(IndexPeriod::containing(date), IndexPeriod::new(2024, 3).unwrap());
    }

    #[tokio::test]
    async fn test_list_filings_filters_by_cik() {
        let (ctx, transport) = scripted_context(1);
        let period = IndexPeriod::new(2024, 3).unwrap();
        transport.respond(ctx.endpoints.master_index_url(2024, 3), 200, MASTER_INDEX);
        let adapter = BulkIndexAdapter::new(ctx, period);

        let apple = adapter
            .list_filings(&Cik::new("320193").unwrap())
            .await
            .unwrap();
        assert_eq!(apple.len(), 2);
        assert!(apple.iter().all(|r| r.company_name() == "Apple Inc."));

        let none = adapter
            .list_filings(&Cik::new("42").unwrap())
            .await
            .unwrap();
        assert!(none.is_empty());
        assert_eq!(transport.total_hits(), 1);
    }

    #[tokio::test]
    async fn test_cancelled_token_stops_before_dispatch() {
        let (ctx, transport) = scripted_context(1);
        let q3 = IndexPeriod::new(2024, 3).unwrap();
        transport.respond(ctx.endpoints.master_index_url(2024, 3), 200, MASTER_INDEX);
        let adapter = BulkIndexAdapter::new(ctx, q3);

        let token = CancellationToken::new();
        token.cancel();
        assert!(matches!(
            adapter.fetch_quarter_cancellable(q3, &token).await,
            Err(FilingError::Cancelled)
        ));

        let report = adapter.fetch_range(&[q3, q3.next()], &token).await.unwrap();
        assert!(report.cancelled);
        assert!(report.completed.is_empty());
        assert_eq!(transport.total_hits(), 0);
    }

    #[tokio::test]
    async fn test_fetch_range_collects_quarters() {
        let (ctx, transport) = scripted_context(1);
        let q2 = IndexPeriod::new(2024, 2).unwrap();
        let q3 = q2.next();
        transport.respond(ctx.endpoints.master_index_url(2024, 2), 200, MASTER_INDEX);
        transport.respond(ctx.endpoints.master_index_url(2024, 3), 200, "");
        let adapter = BulkIndexAdapter::new(ctx, q3);

        let report = adapter
            .fetch_range(&[q2, q3], &CancellationToken::new())
            .await
            .unwrap();
        assert!(!report.cancelled);
        assert_eq!(report.completed, vec![q2, q3]);
        assert_eq!(report.records.len(), 3);
    }
}
