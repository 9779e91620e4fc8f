//! Latest reported value of an XBRL concept.

use crate::facts::CompanyFacts;
use filings_core::{FilingError, MetricPoint, Result};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::cmp::Reverse;
use std::fmt;
use std::str::FromStr;

/// Taxonomies searched first, in this order. Any others follow alphabetically.
const PREFERRED_TAXONOMIES: [&str; 3] = ["us-gaap", "ifrs-full", "dei"];

fn taxonomy_order(facts: &CompanyFacts) -> Vec<&str> {
    let mut order: Vec<&str> = PREFERRED_TAXONOMIES
        .iter()
        .copied()
        .filter(|t| facts.facts.contains_key(*t))
        .collect();
    order.extend(
        facts
            .facts
            .keys()
            .map(String::as_str)
            .filter(|t| !PREFERRED_TAXONOMIES.contains(t)),
    );
    order
}

/// Returns the value of `concept_tag` in `unit` with the latest period end.
///
/// The tag may carry a taxonomy prefix (`us-gaap:Revenues`); without one every
/// taxonomy is searched. Units compare case-insensitively. Among values sharing
/// the latest period end, the highest-precedence taxonomy wins, then the value
/// reported last.
///
/// # Errors
/// - [`FilingError::NotFound`] if the concept or unit is absent
/// - [`FilingError::MalformedResponse`] if the value is not a decimal number
pub fn extract(facts: &CompanyFacts, concept_tag: &str, unit: &str) -> Result<MetricPoint> {
    let (taxonomy, tag) = match concept_tag.split_once(':') {
        Some((taxonomy, tag)) => (Some(taxonomy), tag),
        None => (None, concept_tag),
    };

    // Ranked by taxonomy precedence: on an equal period end the earlier
    // taxonomy wins, and within one taxonomy the later report wins.
    let latest = taxonomy_order(facts)
        .into_iter()
        .filter(|t| taxonomy.is_none_or(|wanted| wanted == *t))
        .enumerate()
        .filter_map(|(rank, t)| Some((rank, facts.facts.get(t)?.get(tag)?)))
        .flat_map(|(rank, concept)| {
            concept
                .units
                .iter()
                .filter(|(u, _)| u.eq_ignore_ascii_case(unit))
                .flat_map(move |(_, v)| v.iter().map(move |value| (rank, value)))
        })
        .max_by_key(|(rank, value)| (value.end, Reverse(*rank)))
        .map(|(_, value)| value);

    let Some(latest) = latest else {
        return Err(FilingError::NotFound(format!(
            "No {concept_tag} values in {unit} for {}",
            facts.entity_name
        )));
    };

    Ok(MetricPoint {
        concept_tag: concept_tag.to_string(),
        unit: unit.to_string(),
        value: to_decimal(&latest.val)?,
        period_end: latest.end,
    })
}

fn to_decimal(number: &serde_json::Number) -> Result<Decimal> {
    let text = number.to_string();
    Decimal::from_str(&text)
        .or_else(|_| Decimal::from_scientific(&text))
        .map_err(|e| FilingError::MalformedResponse(format!("Unusable fact value {text}: {e}")))
}

/// Commonly requested figures, each backed by alternative XBRL tags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HeadlineMetric {
    /// Total revenue.
    Revenue,
    /// Net income (loss).
    NetIncome,
    /// Total assets.
    TotalAssets,
    /// Total liabilities.
    TotalLiabilities,
    /// Stockholders' equity.
    StockholdersEquity,
    /// Net cash from operating activities.
    OperatingCashFlow,
    /// Diluted earnings per share.
    EpsDiluted,
    /// Common shares outstanding.
    SharesOutstanding,
    /// Cash and cash equivalents.
    Cash,
}

impl HeadlineMetric {
    /// Every headline metric.
    pub const ALL: [Self; 9] = [
        Self::Revenue,
        Self::NetIncome,
        Self::TotalAssets,
        Self::TotalLiabilities,
        Self::StockholdersEquity,
        Self::OperatingCashFlow,
        Self::EpsDiluted,
        Self::SharesOutstanding,
        Self::Cash,
    ];

    /// Candidate tags, most specific first.
    #[must_use]
    pub const fn tags(self) -> &'static [&'static str] {
        match self {
            Self::Revenue => &[
                "Revenues",
                "RevenueFromContractWithCustomerExcludingAssessedTax",
                "SalesRevenueNet",
                "RevenueFromContractWithCustomerIncludingAssessedTax",
            ],
            Self::NetIncome => &[
                "NetIncomeLoss",
                "ProfitLoss",
                "NetIncomeLossAvailableToCommonStockholdersBasic",
            ],
            Self::TotalAssets => &["Assets"],
            Self::TotalLiabilities => &["Liabilities"],
            Self::StockholdersEquity => &[
                "StockholdersEquity",
                "StockholdersEquityIncludingPortionAttributableToNoncontrollingInterest",
            ],
            Self::OperatingCashFlow => &[
                "NetCashProvidedByUsedInOperatingActivities",
                "CashProvidedByUsedInOperatingActivities",
            ],
            Self::EpsDiluted => &["EarningsPerShareDiluted"],
            Self::SharesOutstanding => &[
                "CommonStockSharesOutstanding",
                "EntityCommonStockSharesOutstanding",
            ],
            Self::Cash => &[
                "CashAndCashEquivalentsAtCarryingValue",
                "Cash",
                "CashCashEquivalentsAndShortTermInvestments",
            ],
        }
    }

    /// Unit the metric is reported in.
    #[must_use]
    pub const fn unit(self) -> &'static str {
        match self {
            Self::EpsDiluted => "USD/shares",
            Self::SharesOutstanding => "shares",
            _ => "USD",
        }
    }

    /// Stable name, as accepted by [`FromStr`].
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Revenue => "revenue",
            Self::NetIncome => "net_income",
            Self::TotalAssets => "total_assets",
            Self::TotalLiabilities => "total_liabilities",
            Self::StockholdersEquity => "stockholders_equity",
            Self::OperatingCashFlow => "operating_cash_flow",
            Self::EpsDiluted => "eps_diluted",
            Self::SharesOutstanding => "shares_outstanding",
            Self::Cash => "cash",
        }
    }
}

impl fmt::Display for HeadlineMetric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for HeadlineMetric {
    type Err = FilingError;

    fn from_str(s: &str) -> Result<Self> {
        let wanted = s.trim().to_lowercase().replace('-', "_");
        Self::ALL
            .into_iter()
            .find(|m| m.name() == wanted)
            .ok_or_else(|| FilingError::InvalidParameter(format!("Unknown metric: {s:?}")))
    }
}

/// Extracts a headline metric, trying its tags in order.
///
/// # Errors
/// Returns [`FilingError::NotFound`] if no tag has a value in the metric's unit.
pub fn extract_headline(facts: &CompanyFacts, metric: HeadlineMetric) -> Result<MetricPoint> {
    for tag in metric.tags() {
        match extract(facts, tag, metric.unit()) {
            Ok(point) => return Ok(point),
            Err(FilingError::NotFound(_)) => continue,
            Err(e) => return Err(e),
        }
    }
    Err(FilingError::NotFound(format!(
        "No {metric} reported by {}",
        facts.entity_name
    )))
}
