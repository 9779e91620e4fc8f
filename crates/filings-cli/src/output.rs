//! Text and JSON rendering.

use filings::{
    AggregateReport, CompanyFilings, CompanyIdentity, FilingError, FilingRecord, HeadlineMetric,
    MetricPoint, Result, WatchlistMembership,
};
use serde::Serialize;

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    let text = serde_json::to_string_pretty(value)
        .map_err(|e| FilingError::Other(format!("Failed to encode output: {e}")))?;
    println!("{text}");
    Ok(())
}

fn limited(records: &[FilingRecord], limit: Option<usize>) -> &[FilingRecord] {
    &records[..limit.unwrap_or(records.len()).min(records.len())]
}

fn print_records(records: &[FilingRecord]) {
    for r in records {
        println!(
            "{}  {:<10} {:<40} {}",
            r.filing_date(),
            r.form_type(),
            r.company_name(),
            r.document_url()
        );
    }
}

pub(crate) fn identity(identity: &CompanyIdentity, json: bool) -> Result<()> {
    if json {
        return print_json(identity);
    }
    match &identity.ticker {
        Some(ticker) => println!("{ticker}  {}  {}", identity.cik, identity.name),
        None => println!("{}  {}", identity.cik, identity.name),
    }
    Ok(())
}

pub(crate) fn company_filings(
    filings: &CompanyFilings,
    limit: Option<usize>,
    json: bool,
) -> Result<()> {
    let shown = limited(&filings.records, limit);
    if json {
        #[derive(Serialize)]
        struct Out<'a> {
            identity: &'a CompanyIdentity,
            records: &'a [FilingRecord],
        }
        return print_json(&Out {
            identity: &filings.identity,
            records: shown,
        });
    }
    println!(
        "{} (CIK {}): {} filings",
        filings.identity.name,
        filings.identity.cik,
        filings.records.len()
    );
    print_records(shown);
    Ok(())
}

pub(crate) fn records(records: &[FilingRecord], limit: Option<usize>, json: bool) -> Result<()> {
    let shown = limited(records, limit);
    if json {
        return print_json(shown);
    }
    println!("{} filings", records.len());
    print_records(shown);
    Ok(())
}

pub(crate) fn metric(point: &MetricPoint, json: bool) -> Result<()> {
    if json {
        return print_json(point);
    }
    println!(
        "{} = {} {} (period ending {})",
        point.concept_tag, point.value, point.unit, point.period_end
    );
    Ok(())
}

#[derive(Serialize)]
struct HeadlineRow<'a> {
    metric: HeadlineMetric,
    #[serde(flatten)]
    point: &'a MetricPoint,
}

pub(crate) fn headline_metrics(points: &[(HeadlineMetric, MetricPoint)], json: bool) -> Result<()> {
    if json {
        let rows: Vec<_> = points
            .iter()
            .map(|(metric, point)| HeadlineRow {
                metric: *metric,
                point,
            })
            .collect();
        return print_json(&rows);
    }
    if points.is_empty() {
        println!("No headline metrics reported");
    }
    for (metric, point) in points {
        println!(
            "{:<22} {:>20} {:<8} {}",
            metric.to_string(),
            point.value,
            point.unit,
            point.period_end
        );
    }
    Ok(())
}

pub(crate) fn watchlists(lists: &[WatchlistMembership], json: bool) -> Result<()> {
    if json {
        return print_json(lists);
    }
    if lists.is_empty() {
        println!("No watchlists");
    }
    for list in lists {
        println!("{} ({} companies)", list.list_name, list.members.len());
        for member in &list.members {
            println!("  {:<8} {}  {}", member.label(), member.cik, member.name);
        }
    }
    Ok(())
}

pub(crate) fn aggregate_report(
    report: &AggregateReport,
    limit: Option<usize>,
    json: bool,
) -> Result<()> {
    if json {
        return print_json(report);
    }
    println!(
        "{} of {} companies, {} filings",
        report.succeeded(),
        report.total,
        report.records.len()
    );
    print_records(limited(&report.records, limit));

    if let Some(warning) = report.warning() {
        eprintln!("warning: {warning}");
        eprintln!("{}", warning.remedy());
    }
    for failure in &report.failures {
        eprintln!("  {}: {}", failure.identity.label(), failure.error);
    }
    if report.cancelled {
        eprintln!(
            "warning: cancelled, {} companies not fetched",
            report.skipped.len()
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use filings::{Cik, SourceAdapter};

    fn record(day: u32) -> FilingRecord {
        FilingRecord::new(
            Cik::new("320193").unwrap(),
            "10-Q",
            NaiveDate::from_ymd_opt(2024, 1, day).unwrap(),
            "https://www.sec.gov/doc.htm",
            SourceAdapter::Browse,
        )
    }

    #[test]
    fn test_limited() {
        let records = vec![record(1), record(2), record(3)];
        assert_eq!(limited(&records, None).len(), 3);
        assert_eq!(limited(&records, Some(2)).len(), 2);
        assert_eq!(limited(&records, Some(10)).len(), 3);
        assert!(limited(&records, Some(0)).is_empty());
    }

    #[test]
    fn test_headline_row_flattens_point() {
        let point = MetricPoint {
            concept_tag: "Revenues".into(),
            unit: "USD".into(),
            value: "383285000000".parse().unwrap(),
            period_end: NaiveDate::from_ymd_opt(2023, 9, 30).unwrap(),
        };
        let row = HeadlineRow {
            metric: HeadlineMetric::ALL[0],
            point: &point,
        };
        let value = serde_json::to_value(&row).unwrap();
        assert_eq!(value["concept_tag"], "Revenues");
        assert_eq!(value["period_end"], "2023-09-30");
        assert!(value.get("metric").is_some());
    }
}
