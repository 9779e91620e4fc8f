//! Company facts document and the filings embedded in it.

use crate::context::EdgarContext;
use crate::endpoints::EdgarEndpoints;
use async_trait::async_trait;
use chrono::NaiveDate;
use filings_core::{Cik, FilingRecord, FilingSource, Result, SourceAdapter};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, instrument};

/// Per-company XBRL facts document.
///
/// `facts` is required; a document without it is rejected as malformed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompanyFacts {
    /// Registrant name.
    #[serde(default)]
    pub entity_name: String,
    /// Taxonomy (`us-gaap`, `dei`, ...) to concept tag to reported values.
    pub facts: BTreeMap<String, BTreeMap<String, ConceptFacts>>,
    /// Filing list, when the document carries one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filings: Option<EmbeddedFilings>,
}

/// Values reported for one concept, grouped by unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConceptFacts {
    /// Human-readable label.
    #[serde(default)]
    pub label: Option<String>,
    /// Concept description.
    #[serde(default)]
    pub description: Option<String>,
    /// Unit (`USD`, `shares`, `USD/shares`, ...) to values.
    #[serde(default)]
    pub units: BTreeMap<String, Vec<FactValue>>,
}

/// A single reported value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FactValue {
    /// Start of the reporting period, for duration concepts.
    #[serde(default)]
    pub start: Option<NaiveDate>,
    /// End of the reporting period.
    pub end: NaiveDate,
    /// Reported value, kept as the exact JSON number.
    pub val: serde_json::Number,
    /// Accession number of the reporting filing.
    #[serde(default)]
    pub accn: Option<String>,
    /// Fiscal year.
    #[serde(default)]
    pub fy: Option<i32>,
    /// Fiscal period (`FY`, `Q1`, ...).
    #[serde(default)]
    pub fp: Option<String>,
    /// Form type of the reporting filing.
    #[serde(default)]
    pub form: Option<String>,
    /// Date the reporting filing was accepted.
    #[serde(default)]
    pub filed: Option<NaiveDate>,
    /// Calendar frame (`CY2023Q4I`, ...).
    #[serde(default)]
    pub frame: Option<String>,
}

/// Wrapper around the columnar filing list.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmbeddedFilings {
    /// Most recent filings.
    #[serde(default)]
    pub recent: Option<RecentFilings>,
}

/// Column-oriented filing list; row `i` is the `i`th element of every column.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecentFilings {
    /// Accession numbers.
    #[serde(default)]
    pub accession_number: Vec<String>,
    /// Filing dates (`YYYY-MM-DD`).
    #[serde(default)]
    pub filing_date: Vec<String>,
    /// Form types.
    #[serde(default)]
    pub form: Vec<String>,
    /// Primary document file names.
    #[serde(default)]
    pub primary_document: Vec<String>,
}

impl CompanyFacts {
    /// Converts the embedded filing list into records.
    ///
    /// Rows without an accession number, form type or parseable date are
    /// skipped. Returns an empty list when the document has no filing list.
    #[must_use]
    pub fn filing_records(&self, cik: &Cik, endpoints: &EdgarEndpoints) -> Vec<FilingRecord> {
        let Some(recent) = self.filings.as_ref().and_then(|f| f.recent.as_ref()) else {
            return Vec::new();
        };

        let rows = recent
            .accession_number
            .len()
            .min(recent.filing_date.len())
            .min(recent.form.len());

        (0..rows)
            .filter_map(|i| {
                let accession = recent.accession_number[i].trim();
                let form = recent.form[i].trim();
                if accession.is_empty() || form.is_empty() {
                    return None;
                }
                let date = NaiveDate::parse_from_str(recent.filing_date[i].trim(), "%Y-%m-%d").ok()?;
                let url = match recent.primary_document.get(i).map(|d| d.trim()) {
                    Some(doc) if !doc.is_empty() => {
                        endpoints.filing_document_url(cik, accession, doc)
                    }
                    _ => endpoints.filing_index_url(cik, accession),
                };
                Some(
                    FilingRecord::new(cik.clone(), form, date, url, SourceAdapter::Facts)
                        .with_accession(accession)
                        .with_company_name(&self.entity_name),
                )
            })
            .collect()
    }
}

/// Filings from the company facts document.
#[derive(Debug, Clone)]
pub struct FactsAdapter {
    ctx: EdgarContext,
}

impl FactsAdapter {
    /// Creates an adapter.
    #[must_use]
    pub fn new(ctx: EdgarContext) -> Self {
        Self { ctx }
    }

    /// Fetches (or reads from cache) the facts document for `cik`.
    ///
    /// The cached document is shared with metric extraction.
    ///
    /// # Errors
    /// Returns fetch errors; a document without `facts` is
    /// [`FilingError::MalformedResponse`](filings_core::FilingError::MalformedResponse).
    #[instrument(skip(self))]
    pub async fn company_facts(&self, cik: &Cik) -> Result<Arc<CompanyFacts>> {
        let key = format!("facts:{cik}");
        let url = self.ctx.endpoints.company_facts_url(cik);
        self.ctx
            .cache
            .get_or_fetch(&key, self.ctx.ttls.facts, || async {
                let facts: CompanyFacts = self.ctx.fetcher.fetch_json(&url).await?;
                debug!(
                    entity = %facts.entity_name,
                    taxonomies = facts.facts.len(),
                    "Fetched company facts"
                );
                Ok(Arc::new(facts))
            })
            .await
    }
}

#[async_trait]
impl FilingSource for FactsAdapter {
    fn name(&self) -> &str {
        "EDGAR company facts"
    }

    fn kind(&self) -> SourceAdapter {
        SourceAdapter::Facts
    }

    async fn list_filings(&self, cik: &Cik) -> Result<Vec<FilingRecord>> {
        let facts = self.company_facts(cik).await?;
        let records = facts.filing_records(cik, &self.ctx.endpoints);
        debug!(%cik, count = records.len(), "Facts filings");
        Ok(records)
    }
}
