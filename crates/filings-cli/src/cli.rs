//! Command-line arguments.

use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use filings::{Cik, FilingFilter, SortOrder};
use std::path::PathBuf;

/// Resolve companies and retrieve their SEC filings.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub(crate) struct Cli {
    /// Identifying User-Agent, "<app> / <email>"
    #[arg(long, env = "FILINGS_USER_AGENT", global = true)]
    pub(crate) user_agent: Option<String>,

    /// SQLite file holding watchlists
    #[arg(long, env = "FILINGS_DB", default_value = "filings.db", global = true)]
    pub(crate) db: PathBuf,

    /// Watchlist owner
    #[arg(long, env = "FILINGS_SCOPE", default_value = "default", global = true)]
    pub(crate) scope: String,

    /// Print JSON instead of text
    #[arg(long, global = true)]
    pub(crate) json: bool,

    #[command(subcommand)]
    pub(crate) command: Command,
}

#[derive(Subcommand, Debug)]
pub(crate) enum Command {
    /// Resolve a ticker (or CIK) to a company
    Resolve {
        /// Ticker symbol or CIK
        identifier: String,
    },
    /// List a company's filings
    Filings {
        /// Ticker symbol or CIK
        identifier: String,
        #[command(flatten)]
        filter: FilterArgs,
        /// Oldest first
        #[arg(long)]
        oldest_first: bool,
    },
    /// Latest value of an XBRL concept, or every headline metric
    Metric {
        /// Ticker symbol or CIK
        identifier: String,
        /// Concept tag, e.g. NetIncomeLoss or us-gaap:Assets
        tag: Option<String>,
        /// Unit of the concept
        #[arg(long, default_value = "USD")]
        unit: String,
    },
    /// Filings in one quarter of the master index
    Index {
        /// Year
        year: i32,
        /// Quarter (1-4)
        quarter: u8,
        #[command(flatten)]
        filter: FilterArgs,
        /// Restrict to a filer (repeatable)
        #[arg(long = "cik")]
        ciks: Vec<String>,
    },
    /// Manage and aggregate named company lists
    Watchlist {
        #[command(subcommand)]
        action: WatchlistAction,
    },
}

#[derive(Subcommand, Debug)]
pub(crate) enum WatchlistAction {
    /// Replace a list with the given companies
    Save {
        /// List name
        name: String,
        /// Tickers or CIKs
        #[arg(required = true)]
        identifiers: Vec<String>,
    },
    /// Add a company to a list
    Add {
        /// List name
        name: String,
        /// Ticker or CIK
        identifier: String,
    },
    /// Remove a company from a list
    Remove {
        /// List name
        name: String,
        /// Ticker or CIK
        identifier: String,
    },
    /// Show one list, or every list
    Show {
        /// List name
        name: Option<String>,
    },
    /// Fetch filings for every company on a list
    Aggregate {
        /// List name
        name: String,
        #[command(flatten)]
        filter: FilterArgs,
        /// Companies fetched at once (1-8)
        #[arg(long, default_value_t = filings::DEFAULT_CONCURRENCY)]
        concurrency: usize,
        /// Oldest first
        #[arg(long)]
        oldest_first: bool,
    },
}

impl Command {
    /// True for commands that stop dispatching new requests on Ctrl-C. Every
    /// other command exits on Ctrl-C as usual.
    pub(crate) const fn cancels_on_interrupt(&self) -> bool {
        matches!(
            self,
            Self::Watchlist {
                action: WatchlistAction::Aggregate { .. }
            }
        )
    }
}

/// Filters shared by listing commands.
#[derive(Args, Debug, Clone, Default)]
pub(crate) struct FilterArgs {
    /// Form type to keep (repeatable)
    #[arg(long = "form")]
    pub(crate) forms: Vec<String>,
    /// Earliest filing date (YYYY-MM-DD)
    #[arg(long)]
    pub(crate) since: Option<NaiveDate>,
    /// Latest filing date (YYYY-MM-DD)
    #[arg(long)]
    pub(crate) until: Option<NaiveDate>,
    /// Print at most this many filings
    #[arg(long)]
    pub(crate) limit: Option<usize>,
}

impl FilterArgs {
    pub(crate) fn to_filter(&self) -> FilingFilter {
        FilingFilter::new()
            .with_form_types(self.forms.iter().cloned())
            .with_date_range(self.since, self.until)
    }

    pub(crate) fn to_filter_with_ciks(&self, ciks: Vec<Cik>) -> FilingFilter {
        self.to_filter().with_ciks(ciks)
    }
}

pub(crate) const fn sort_order(oldest_first: bool) -> SortOrder {
    if oldest_first {
        SortOrder::FilingDateAsc
    } else {
        SortOrder::FilingDateDesc
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parses_filings_filters() {
        let cli = Cli::try_parse_from([
            "filings",
            "--user-agent",
            "App / a@b.co",
            "filings",
            "AAPL",
            "--form",
            "10-K",
            "--form",
            "10-Q",
            "--since",
            "2024-01-01",
            "--limit",
            "5",
        ])
        .unwrap();

        let Command::Filings { identifier, filter, oldest_first } = cli.command else {
            panic!("expected filings command");
        };
        assert_eq!(identifier, "AAPL");
        assert!(!oldest_first);
        assert_eq!(filter.forms, vec!["10-K", "10-Q"]);
        assert_eq!(filter.limit, Some(5));
        assert_eq!(
            filter.to_filter().filed_from,
            NaiveDate::from_ymd_opt(2024, 1, 1)
        );
    }

    #[test]
    fn test_only_aggregation_handles_interrupt() {
        let parse = |args: &[&str]| Cli::try_parse_from(args).unwrap().command;

        assert!(parse(&["filings", "watchlist", "aggregate", "tech"]).cancels_on_interrupt());
        assert!(!parse(&["filings", "index", "2024", "3"]).cancels_on_interrupt());
        assert!(!parse(&["filings", "filings", "AAPL"]).cancels_on_interrupt());
        assert!(!parse(&["filings", "watchlist", "show"]).cancels_on_interrupt());
    }

    #[test]
    fn test_watchlist_save_requires_members() {
        assert!(Cli::try_parse_from(["filings", "watchlist", "save", "tech"]).is_err());
    }
}
