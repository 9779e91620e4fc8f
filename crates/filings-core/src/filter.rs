//! Post-hoc filters applied to merged filing lists.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::types::{Cik, FilingRecord};

/// Filter over form type, company and filing date.
///
/// Empty criteria match everything. Date bounds are inclusive and form types
/// compare case-insensitively.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilingFilter {
    /// Accepted form types; empty accepts all.
    pub form_types: Vec<String>,
    /// Accepted filers; empty accepts all.
    pub ciks: Vec<Cik>,
    /// Earliest filing date.
    pub filed_from: Option<NaiveDate>,
    /// Latest filing date.
    pub filed_to: Option<NaiveDate>,
}

impl FilingFilter {
    /// Creates a filter that accepts every record.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Restricts to the given form types.
    #[must_use]
    pub fn with_form_types<I, S>(mut self, forms: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.form_types = forms
            .into_iter()
            .map(|f| f.into().trim().to_string())
            .filter(|f| !f.is_empty())
            .collect();
        self
    }

    /// Restricts to the given companies.
    #[must_use]
    pub fn with_ciks(mut self, ciks: impl IntoIterator<Item = Cik>) -> Self {
        self.ciks = ciks.into_iter().collect();
        self
    }

    /// Restricts to filings on or after `from` and on or before `to`.
    #[must_use]
    pub const fn with_date_range(mut self, from: Option<NaiveDate>, to: Option<NaiveDate>) -> Self {
        self.filed_from = from;
        self.filed_to = to;
        self
    }

    /// Returns true if no criterion is set.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.form_types.is_empty()
            && self.ciks.is_empty()
            && self.filed_from.is_none()
            && self.filed_to.is_none()
    }

    /// Returns true if `record` satisfies every criterion.
    #[must_use]
    pub fn matches(&self, record: &FilingRecord) -> bool {
        if !self.form_types.is_empty()
            && !self
                .form_types
                .iter()
                .any(|f| f.eq_ignore_ascii_case(record.form_type()))
        {
            return false;
        }

        if !self.ciks.is_empty() && !self.ciks.contains(record.cik()) {
            return false;
        }

        let date = record.filing_date();
        self.filed_from.is_none_or(|from| date >= from)
            && self.filed_to.is_none_or(|to| date <= to)
    }

    /// Keeps only matching records.
    #[must_use]
    pub fn apply(&self, records: Vec<FilingRecord>) -> Vec<FilingRecord> {
        if self.is_empty() {
            return records;
        }
        records.into_iter().filter(|r| self.matches(r)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::SourceAdapter;

    fn record(cik: &str, form: &str, y: i32, m: u32, d: u32) -> FilingRecord {
        FilingRecord::new(
            Cik::new(cik).unwrap(),
            form,
            NaiveDate::from_ymd_opt(y, m, d).unwrap(),
            format!("https://example.com/{cik}/{form}/{y}{m}{d}"),
            SourceAdapter::BulkIndex,
        )
    }

    #[test]
    fn test_empty_filter_accepts_all() {
        let records = vec![record("1", "10-K", 2024, 1, 1), record("2", "4", 2024, 1, 2)];
        assert_eq!(FilingFilter::new().apply(records).len(), 2);
    }

    #[test]
    fn test_form_type_is_case_insensitive() {
        let filter = FilingFilter::new().with_form_types(["10-k", " 8-K "]);
        assert!(filter.matches(&record("1", "10-K", 2024, 1, 1)));
        assert!(filter.matches(&record("1", "8-K", 2024, 1, 1)));
        assert!(!filter.matches(&record("1", "10-K/A", 2024, 1, 1)));
    }

    #[test]
    fn test_company_and_inclusive_date_range() {
        let from = NaiveDate::from_ymd_opt(2024, 2, 1);
        let to = NaiveDate::from_ymd_opt(2024, 2, 29);
        let filter = FilingFilter::new()
            .with_ciks([Cik::new("320193").unwrap()])
            .with_date_range(from, to);

        assert!(filter.matches(&record("320193", "10-Q", 2024, 2, 1)));
        assert!(filter.matches(&record("320193", "10-Q", 2024, 2, 29)));
        assert!(!filter.matches(&record("320193", "10-Q", 2024, 3, 1)));
        assert!(!filter.matches(&record("789019", "10-Q", 2024, 2, 10)));
    }

    #[test]
    fn test_open_ended_date_bounds() {
        let since = FilingFilter::new().with_date_range(NaiveDate::from_ymd_opt(2024, 2, 1), None);
        assert!(!since.matches(&record("1", "10-Q", 2024, 1, 31)));
        assert!(since.matches(&record("1", "10-Q", 2030, 1, 1)));

        let until = FilingFilter::new().with_date_range(None, NaiveDate::from_ymd_opt(2024, 2, 1));
        assert!(until.matches(&record("1", "10-Q", 1994, 1, 3)));
        assert!(!until.matches(&record("1", "10-Q", 2024, 2, 2)));
    }
}
