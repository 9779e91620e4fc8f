//! Base URLs of the SEC services.

use filings_core::{Cik, FilingError, Result};
use reqwest::Url;
use serde::{Deserialize, Serialize};

/// SEC data API base URL.
pub const DEFAULT_DATA_BASE: &str = "https://data.sec.gov";

/// SEC website base URL.
pub const DEFAULT_WWW_BASE: &str = "https://www.sec.gov";

/// SEC archives base URL.
pub const DEFAULT_ARCHIVES_BASE: &str = "https://www.sec.gov/Archives";

/// Where each upstream lives. Point these at a mirror or a test fixture server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EdgarEndpoints {
    /// Base of the JSON data API (company facts).
    pub data_base: String,
    /// Base of the website (ticker directory, browse pages).
    pub www_base: String,
    /// Base of the archives (indexes and documents).
    pub archives_base: String,
}

impl Default for EdgarEndpoints {
    fn default() -> Self {
        Self {
            data_base: DEFAULT_DATA_BASE.to_string(),
            www_base: DEFAULT_WWW_BASE.to_string(),
            archives_base: DEFAULT_ARCHIVES_BASE.to_string(),
        }
    }
}

impl EdgarEndpoints {
    /// Uses one host for everything, with the SEC's path layout.
    #[must_use]
    pub fn with_host(host: &str) -> Self {
        let host = host.trim_end_matches('/');
        Self {
            data_base: host.to_string(),
            www_base: host.to_string(),
            archives_base: format!("{host}/Archives"),
        }
    }

    /// Ticker to CIK directory.
    #[must_use]
    pub fn ticker_directory_url(&self) -> String {
        format!("{}/files/company_tickers.json", self.www_base)
    }

    /// Company name search page.
    ///
    /// # Errors
    /// Returns [`FilingError::InvalidParameter`] if the base URL is invalid.
    pub fn company_search_url(&self, query: &str) -> Result<String> {
        let url = Url::parse_with_params(
            &format!("{}/cgi-bin/browse-edgar", self.www_base),
            &[
                ("company", query),
                ("owner", "exclude"),
                ("action", "getcompany"),
            ],
        )
        .map_err(|e| FilingError::InvalidParameter(format!("Invalid search URL: {e}")))?;
        Ok(url.into())
    }

    /// Company facts document.
    #[must_use]
    pub fn company_facts_url(&self, cik: &Cik) -> String {
        format!("{}/api/xbrl/companyfacts/CIK{}.json", self.data_base, cik)
    }

    /// Company browse page listing recent filings.
    #[must_use]
    pub fn browse_url(&self, cik: &Cik) -> String {
        format!(
            "{}/cgi-bin/browse-edgar?action=getcompany&CIK={}&type=&dateb=&owner=include&count=40",
            self.www_base, cik
        )
    }

    /// Quarterly master index.
    #[must_use]
    pub fn master_index_url(&self, year: i32, quarter: u8) -> String {
        format!(
            "{}/edgar/full-index/{year}/QTR{quarter}/master.idx",
            self.archives_base
        )
    }

    /// Archive URL of a filing's primary document.
    #[must_use]
    pub fn filing_document_url(&self, cik: &Cik, accession: &str, primary_document: &str) -> String {
        format!(
            "{}/edgar/data/{}/{}/{}",
            self.archives_base,
            cik.unpadded(),
            accession.replace('-', ""),
            primary_document
        )
    }

    /// Archive URL of a filing's index page.
    #[must_use]
    pub fn filing_index_url(&self, cik: &Cik, accession: &str) -> String {
        format!(
            "{}/edgar/data/{}/{}/{accession}-index.htm",
            self.archives_base,
            cik.unpadded(),
            accession.replace('-', ""),
        )
    }
}
