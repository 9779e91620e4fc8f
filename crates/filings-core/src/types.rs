//! Core data types for filing retrieval.
//!
//! This module defines the fundamental data structures:
//!
//! - [`Cik`] - Validated, zero-padded Central Index Key
//! - [`CompanyIdentity`] - A company keyed by CIK with display hints
//! - [`FilingRecord`] - One normalized filing
//! - [`FilingIdentity`] - The deduplication key of a filing
//! - [`SourceAdapter`] - Which upstream source produced a record
//! - [`MetricPoint`] - A single reported financial value
//! - [`WatchlistMembership`] - A named set of companies
//! - [`Summary`] and [`Citation`] - Summarization collaborator output

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeSet;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

use crate::error::{FilingError, Result};

/// A Central Index Key, always stored zero-padded to ten digits.
///
/// Padding is idempotent: `Cik::new(cik.as_str())` yields the same value.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Cik(String);

impl Cik {
    /// Number of digits in a canonical CIK.
    pub const LEN: usize = 10;

    /// Parses a loosely formatted CIK and pads it to ten digits.
    ///
    /// Accepts surrounding whitespace and an optional `CIK` prefix. The digits
    /// themselves must number between one and ten.
    ///
    /// # Errors
    /// Returns [`FilingError::InvalidParameter`] for empty, non-numeric or
    /// over-long input.
    pub fn new(raw: &str) -> Result<Self> {
        let trimmed = raw.trim();
        let digits = trimmed
            .strip_prefix("CIK")
            .or_else(|| trimmed.strip_prefix("cik"))
            .unwrap_or(trimmed)
            .trim();

        if digits.is_empty() || digits.len() > Self::LEN {
            return Err(FilingError::InvalidParameter(format!("Invalid CIK: {raw:?}")));
        }
        if !digits.bytes().all(|b| b.is_ascii_digit()) {
            return Err(FilingError::InvalidParameter(format!("Invalid CIK: {raw:?}")));
        }

        Ok(Self(format!("{digits:0>10}")))
    }

    /// Accepts only an exact ten-digit numeric token.
    ///
    /// Used to validate CIKs scraped out of markup, where a shorter digit run is
    /// more likely a false match than an unpadded key.
    #[must_use]
    pub fn parse_strict(token: &str) -> Option<Self> {
        (token.len() == Self::LEN && token.bytes().all(|b| b.is_ascii_digit()))
            .then(|| Self(token.to_string()))
    }

    /// Builds a CIK from its numeric value.
    ///
    /// # Errors
    /// Returns [`FilingError::InvalidParameter`] if the number has more than ten digits.
    pub fn from_number(value: u64) -> Result<Self> {
        Self::new(&value.to_string())
    }

    /// Returns the padded ten-digit form.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the CIK without leading zeros, as used in archive paths.
    #[must_use]
    pub fn unpadded(&self) -> &str {
        let stripped = self.0.trim_start_matches('0');
        if stripped.is_empty() { "0" } else { stripped }
    }
}

impl fmt::Display for Cik {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Cik {
    type Err = FilingError;

    fn from_str(s: &str) -> Result<Self> {
        Self::new(s)
    }
}

impl TryFrom<String> for Cik {
    type Error = FilingError;

    fn try_from(value: String) -> Result<Self> {
        Self::new(&value)
    }
}

impl From<Cik> for String {
    fn from(cik: Cik) -> Self {
        cik.0
    }
}

/// A company, keyed by CIK.
///
/// `ticker` and `name` are display hints that may be stale; equality, ordering
/// and hashing consider the CIK only.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CompanyIdentity {
    /// Canonical Central Index Key.
    pub cik: Cik,
    /// Ticker symbol, if known.
    #[serde(default)]
    pub ticker: Option<String>,
    /// Display name.
    pub name: String,
}

impl CompanyIdentity {
    /// Creates an identity without a ticker.
    #[must_use]
    pub fn new(cik: Cik, name: impl Into<String>) -> Self {
        Self {
            cik,
            ticker: None,
            name: name.into(),
        }
    }

    /// Sets the ticker symbol (uppercased).
    #[must_use]
    pub fn with_ticker(mut self, ticker: impl Into<String>) -> Self {
        self.ticker = Some(ticker.into().to_uppercase());
        self
    }

    /// Label for logs and user messages: the ticker if known, else the CIK.
    #[must_use]
    pub fn label(&self) -> &str {
        self.ticker.as_deref().unwrap_or(self.cik.as_str())
    }
}

impl PartialEq for CompanyIdentity {
    fn eq(&self, other: &Self) -> bool {
        self.cik == other.cik
    }
}

impl Eq for CompanyIdentity {}

impl Hash for CompanyIdentity {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.cik.hash(state);
    }
}

impl PartialOrd for CompanyIdentity {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for CompanyIdentity {
    fn cmp(&self, other: &Self) -> Ordering {
        self.cik.cmp(&other.cik)
    }
}

/// The upstream source a [`FilingRecord`] was produced by.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SourceAdapter {
    /// Structured per-company facts document.
    Facts,
    /// Scraped company browse page.
    Browse,
    /// Quarterly master index.
    BulkIndex,
}

impl fmt::Display for SourceAdapter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Facts => "facts",
            Self::Browse => "browse",
            Self::BulkIndex => "bulk-index",
        };
        f.write_str(name)
    }
}

/// The key two filings are considered duplicates under.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum FilingIdentity {
    /// Keyed by accession number.
    Accession {
        /// Filer CIK.
        cik: Cik,
        /// Accession number, e.g. `0000320193-24-000123`.
        accession: String,
    },
    /// Keyed by document URL when no accession number is known.
    Document {
        /// Filer CIK.
        cik: Cik,
        /// Absolute document URL.
        url: String,
    },
}

/// A single normalized filing.
///
/// Fields are private; records are built once with [`FilingRecord::new`] and the
/// `with_*` methods and never modified afterwards.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilingRecord {
    cik: Cik,
    company_name: String,
    form_type: String,
    filing_date: NaiveDate,
    document_url: String,
    accession_number: Option<String>,
    source_adapter: SourceAdapter,
}

impl FilingRecord {
    /// Creates a record with an empty company name and no accession number.
    #[must_use]
    pub fn new(
        cik: Cik,
        form_type: impl Into<String>,
        filing_date: NaiveDate,
        document_url: impl Into<String>,
        source_adapter: SourceAdapter,
    ) -> Self {
        Self {
            cik,
            company_name: String::new(),
            form_type: form_type.into().trim().to_string(),
            filing_date,
            document_url: document_url.into(),
            accession_number: None,
            source_adapter,
        }
    }

    /// Sets the accession number. Blank values are ignored.
    #[must_use]
    pub fn with_accession(mut self, accession: impl Into<String>) -> Self {
        let accession = accession.into().trim().to_string();
        self.accession_number = (!accession.is_empty()).then_some(accession);
        self
    }

    /// Sets the company name.
    #[must_use]
    pub fn with_company_name(mut self, name: impl Into<String>) -> Self {
        self.company_name = name.into().trim().to_string();
        self
    }

    /// Filer CIK.
    #[must_use]
    pub fn cik(&self) -> &Cik {
        &self.cik
    }

    /// Filer name; empty if the producing adapter did not know it.
    #[must_use]
    pub fn company_name(&self) -> &str {
        &self.company_name
    }

    /// Form type, e.g. `10-K`.
    #[must_use]
    pub fn form_type(&self) -> &str {
        &self.form_type
    }

    /// Date the filing was accepted.
    #[must_use]
    pub fn filing_date(&self) -> NaiveDate {
        self.filing_date
    }

    /// Absolute URL of the filing document or index.
    #[must_use]
    pub fn document_url(&self) -> &str {
        &self.document_url
    }

    /// Accession number, when the source exposed one.
    #[must_use]
    pub fn accession_number(&self) -> Option<&str> {
        self.accession_number.as_deref()
    }

    /// The source that produced this record.
    #[must_use]
    pub fn source_adapter(&self) -> SourceAdapter {
        self.source_adapter
    }

    /// Deduplication key: `(cik, accession)` if known, else `(cik, url)`.
    #[must_use]
    pub fn identity(&self) -> FilingIdentity {
        match &self.accession_number {
            Some(accession) => FilingIdentity::Accession {
                cik: self.cik.clone(),
                accession: accession.clone(),
            },
            None => FilingIdentity::Document {
                cik: self.cik.clone(),
                url: self.document_url.clone(),
            },
        }
    }
}

/// The latest reported value of a financial concept.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricPoint {
    /// XBRL concept tag, e.g. `Revenues`.
    pub concept_tag: String,
    /// Unit of measure, e.g. `USD`.
    pub unit: String,
    /// Reported value.
    pub value: Decimal,
    /// End of the reporting period.
    pub period_end: NaiveDate,
}

/// A user's named list of companies.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WatchlistMembership {
    /// Name of the list.
    pub list_name: String,
    /// Companies on the list.
    pub members: BTreeSet<CompanyIdentity>,
}

impl WatchlistMembership {
    /// Creates an empty list.
    #[must_use]
    pub fn new(list_name: impl Into<String>) -> Self {
        Self {
            list_name: list_name.into(),
            members: BTreeSet::new(),
        }
    }
}

/// A source reference returned by the summarization collaborator.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Citation {
    /// Referenced URI.
    pub uri: String,
    /// Title of the referenced page.
    pub title: String,
}

/// Prose produced by the summarization collaborator.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Summary {
    /// Summary text.
    pub text: String,
    /// Optional citations.
    #[serde(default)]
    pub citations: Vec<Citation>,
}
