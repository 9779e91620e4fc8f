//! `filings` command-line tool.

mod cli;
mod output;

use clap::Parser;
use cli::{Cli, Command, WatchlistAction, sort_order};
use filings::{
    AggregateOptions, CancellationToken, Cik, CompanyIdentity, FilingEngine, FilingError,
    IndexPeriod, RequestConfig, Result, SqliteWatchlistStore, WatchlistService,
};
use std::collections::BTreeSet;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{debug, warn};
use tracing_subscriber::{EnvFilter, fmt};

fn setup_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt().with_env_filter(filter).with_writer(std::io::stderr).init();
    debug!("Logging initialized");
}

#[tokio::main]
async fn main() -> ExitCode {
    setup_logging();
    let cli = Cli::parse();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            eprintln!("{}", e.remedy());
            ExitCode::FAILURE
        }
    }
}

fn engine(cli: &Cli) -> Result<FilingEngine> {
    let user_agent = cli.user_agent.as_deref().ok_or_else(|| {
        FilingError::InvalidParameter(
            "A User-Agent is required: pass --user-agent \"<app> / <email>\" or set FILINGS_USER_AGENT"
                .into(),
        )
    })?;
    FilingEngine::new(RequestConfig::from_user_agent(user_agent)?)
}

/// Cancels `token` on Ctrl-C. This replaces the default SIGINT exit, so it is
/// only installed for commands that check the token between requests.
fn cancel_on_interrupt(token: &CancellationToken) {
    let token = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, finishing companies already in flight");
            token.cancel();
        }
    });
}

async fn run(cli: Cli) -> Result<()> {
    let engine = engine(&cli)?;
    let json = cli.json;
    let token = CancellationToken::new();
    if cli.command.cancels_on_interrupt() {
        cancel_on_interrupt(&token);
    }

    match &cli.command {
        Command::Resolve { identifier } => {
            let identity = engine.resolve_identifier(identifier).await?;
            output::identity(&identity, json)
        }
        Command::Filings {
            identifier,
            filter,
            oldest_first,
        } => {
            let filings = engine
                .company_filings(identifier, &filter.to_filter(), sort_order(*oldest_first))
                .await?;
            output::company_filings(&filings, filter.limit, json)
        }
        Command::Metric {
            identifier,
            tag,
            unit,
        } => match tag {
            Some(tag) => {
                let point = engine.latest_metric(identifier, tag, unit).await?;
                output::metric(&point, json)
            }
            None => {
                let points = engine.headline_metrics(identifier).await?;
                output::headline_metrics(&points, json)
            }
        },
        Command::Index {
            year,
            quarter,
            filter,
            ciks,
        } => {
            let period = IndexPeriod::new(*year, *quarter)?;
            let ciks = ciks
                .iter()
                .map(|c| Cik::new(c))
                .collect::<Result<Vec<_>>>()?;
            let records = engine
                .quarterly_index(period, &filter.to_filter_with_ciks(ciks), &token)
                .await?;
            output::records(&records, filter.limit, json)
        }
        Command::Watchlist { action } => {
            let store = SqliteWatchlistStore::new(&cli.db)?;
            let service = engine.watchlists(Arc::new(store));
            watchlist(&engine, &service, &cli.scope, action, token, json).await
        }
    }
}

async fn watchlist(
    engine: &FilingEngine,
    service: &WatchlistService,
    scope: &str,
    action: &WatchlistAction,
    token: CancellationToken,
    json: bool,
) -> Result<()> {
    match action {
        WatchlistAction::Save { name, identifiers } => {
            let mut members = BTreeSet::new();
            for identifier in identifiers {
                members.insert(engine.resolve_identifier(identifier).await?);
            }
            service.save(scope, name, &members).await?;
            let membership = service.get(scope, name).await?;
            output::watchlists(std::slice::from_ref(&membership), json)
        }
        WatchlistAction::Add { name, identifier } => {
            let identity = engine.resolve_identifier(identifier).await?;
            let membership = service.add_member(scope, name, identity).await?;
            output::watchlists(std::slice::from_ref(&membership), json)
        }
        WatchlistAction::Remove { name, identifier } => {
            let identity = resolve_member(engine, service, scope, name, identifier).await?;
            if !service.remove_member(scope, name, &identity.cik).await? {
                return Err(FilingError::NotFound(format!(
                    "{} is not on {name:?}",
                    identity.label()
                )));
            }
            let membership = service.get(scope, name).await?;
            output::watchlists(std::slice::from_ref(&membership), json)
        }
        WatchlistAction::Show { name } => {
            let lists = match name {
                Some(name) => vec![service.get(scope, name).await?],
                None => service
                    .lists(scope)
                    .await?
                    .into_iter()
                    .map(|(list_name, members)| filings::WatchlistMembership {
                        list_name,
                        members,
                    })
                    .collect(),
            };
            output::watchlists(&lists, json)
        }
        WatchlistAction::Aggregate {
            name,
            filter,
            concurrency,
            oldest_first,
        } => {
            let options = AggregateOptions::new()
                .with_concurrency(*concurrency)
                .with_filter(filter.to_filter())
                .with_sort(sort_order(*oldest_first))
                .with_cancel(token);
            let report = service.aggregate_list(scope, name, &options).await?;
            output::aggregate_report(&report, filter.limit, json)?;
            report.into_result().map(|_| ())
        }
    }
}

/// Finds the list member an identifier refers to, preferring a ticker match
/// among current members over a fresh resolution.
async fn resolve_member(
    engine: &FilingEngine,
    service: &WatchlistService,
    scope: &str,
    name: &str,
    identifier: &str,
) -> Result<CompanyIdentity> {
    let membership = service.get(scope, name).await?;
    let wanted = identifier.trim();
    if let Some(member) = membership.members.iter().find(|m| {
        m.ticker
            .as_deref()
            .is_some_and(|t| t.eq_ignore_ascii_case(wanted))
    }) {
        return Ok(member.clone());
    }
    engine.resolve_identifier(wanted).await
}
