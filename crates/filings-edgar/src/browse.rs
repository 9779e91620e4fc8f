//! Filings scraped from the company browse page.

use crate::context::EdgarContext;
use crate::fetcher::ACCEPT_TEXT;
use async_trait::async_trait;
use chrono::NaiveDate;
use filings_core::{Cik, FilingError, FilingRecord, FilingSource, Result, SourceAdapter};
use regex::Regex;
use reqwest::Url;
use scraper::{ElementRef, Html, Selector};
use std::sync::LazyLock;
use tracing::{debug, instrument, trace};

static FILING_TABLE: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("table.tableFile2").expect("valid table selector"));
static ROW: LazyLock<Selector> = LazyLock::new(|| Selector::parse("tr").expect("valid row selector"));
static CELL: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("td").expect("valid cell selector"));
static LINK: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("a[href]").expect("valid link selector"));

static ACCESSION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"Acc-no:\s*(\d{10}-\d{2}-\d{6})").expect("valid accession pattern")
});

fn cell_text(cell: &ElementRef<'_>) -> String {
    cell.text().collect::<String>().replace('\u{a0}', " ")
}

/// Parses the first `table.tableFile2` of a browse page.
///
/// Columns are form type, links, description and filing date. Links are
/// resolved against `base`. Rows without a link or with an unparseable date
/// are skipped.
///
/// # Errors
/// - [`FilingError::NotFound`] if the page says the company has no filings
/// - [`FilingError::MalformedResponse`] if the table is missing otherwise
pub fn parse_filing_table(html: &str, base: &Url, cik: &Cik) -> Result<Vec<FilingRecord>> {
    let document = Html::parse_document(html);
    let Some(table) = document.select(&FILING_TABLE).next() else {
        if html.contains("No matching") {
            return Err(FilingError::NotFound(format!("No browse listing for CIK {cik}")));
        }
        return Err(FilingError::MalformedResponse(
            "Browse page has no filing table".into(),
        ));
    };

    let mut records = Vec::new();
    for row in table.select(&ROW) {
        let cells: Vec<ElementRef<'_>> = row.select(&CELL).collect();
        if cells.len() < 4 {
            continue;
        }

        let form = cell_text(&cells[0]);
        let form = form.trim();
        let Some(href) = cells[1]
            .select(&LINK)
            .next()
            .and_then(|a| a.value().attr("href"))
        else {
            trace!(form, "Skipping row without link");
            continue;
        };
        let Ok(url) = base.join(href) else {
            trace!(href, "Skipping row with unusable link");
            continue;
        };
        let Ok(date) = NaiveDate::parse_from_str(cell_text(&cells[3]).trim(), "%Y-%m-%d") else {
            trace!(form, "Skipping row with unparseable date");
            continue;
        };
        if form.is_empty() {
            continue;
        }

        let description = cell_text(&cells[2]);
        let mut record = FilingRecord::new(cik.clone(), form, date, url, SourceAdapter::Browse);
        if let Some(accession) = ACCESSION.captures(&description).and_then(|c| c.get(1)) {
            record = record.with_accession(accession.as_str());
        }
        records.push(record);
    }

    Ok(records)
}

/// Filings from the HTML company browse page.
#[derive(Debug, Clone)]
pub struct BrowseAdapter {
    ctx: EdgarContext,
}

impl BrowseAdapter {
    /// Creates an adapter.
    #[must_use]
    pub fn new(ctx: EdgarContext) -> Self {
        Self { ctx }
    }
}

#[async_trait]
impl FilingSource for BrowseAdapter {
    fn name(&self) -> &str {
        "EDGAR browse page"
    }

    fn kind(&self) -> SourceAdapter {
        SourceAdapter::Browse
    }

    #[instrument(skip(self))]
    async fn list_filings(&self, cik: &Cik) -> Result<Vec<FilingRecord>> {
        let key = format!("browse:{cik}");
        let url = self.ctx.endpoints.browse_url(cik);
        let base = Url::parse(&self.ctx.endpoints.www_base)
            .map_err(|e| FilingError::InvalidParameter(format!("Invalid base URL: {e}")))?;

        self.ctx
            .cache
            .get_or_fetch(&key, self.ctx.ttls.browse, || async {
                let records = self
                    .ctx
                    .fetcher
                    .fetch_with(&url, ACCEPT_TEXT, |body| parse_filing_table(body, &base, cik))
                    .await?;
                debug!(count = records.len(), "Browse filings");
                Ok(records)
            })
            .await
    }
}
