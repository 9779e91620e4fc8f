//! Filing normalization: deduplication, name backfill and explicit sorting.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::types::FilingRecord;

/// Deduplicates `records` and backfills `company_name` onto records that lack one.
///
/// Records are deduplicated by [`FilingRecord::identity`]; the first occurrence
/// wins and input order is otherwise preserved. No sort is applied.
#[must_use]
pub fn normalize(records: Vec<FilingRecord>, company_name: &str) -> Vec<FilingRecord> {
    let mut seen = HashSet::with_capacity(records.len());
    let mut out = Vec::with_capacity(records.len());

    for record in records {
        if !seen.insert(record.identity()) {
            continue;
        }
        let record = if record.company_name().is_empty() && !company_name.trim().is_empty() {
            record.with_company_name(company_name)
        } else {
            record
        };
        out.push(record);
    }

    out
}

/// Ordering requested by a display context.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SortOrder {
    /// Newest filings first.
    #[default]
    FilingDateDesc,
    /// Oldest filings first.
    FilingDateAsc,
    /// Leave the order as produced.
    Unsorted,
}

impl SortOrder {
    /// Sorts `records` in place. The sort is stable.
    pub fn apply(self, records: &mut [FilingRecord]) {
        match self {
            Self::FilingDateDesc => records.sort_by(|a, b| b.filing_date().cmp(&a.filing_date())),
            Self::FilingDateAsc => records.sort_by_key(FilingRecord::filing_date),
            Self::Unsorted => {}
        }
    }
}
