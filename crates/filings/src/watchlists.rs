//! Named watchlists backed by a [`WatchlistStore`].

use crate::aggregator::{AggregateOptions, AggregateReport, WatchlistAggregator};
use filings_core::{
    Cik, CompanyIdentity, FilingError, NamedLists, Result, WatchlistMembership, WatchlistStore,
};
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{debug, instrument};

/// Reads, edits and aggregates users' named company lists.
#[derive(Debug, Clone)]
pub struct WatchlistService {
    store: Arc<dyn WatchlistStore>,
    aggregator: WatchlistAggregator,
}

impl WatchlistService {
    /// Creates a service.
    #[must_use]
    pub fn new(store: Arc<dyn WatchlistStore>, aggregator: WatchlistAggregator) -> Self {
        Self { store, aggregator }
    }

    /// Every list saved under `user_scope`.
    ///
    /// # Errors
    /// Returns store errors.
    pub async fn lists(&self, user_scope: &str) -> Result<NamedLists> {
        self.store.load_named_lists(user_scope).await
    }

    /// One list.
    ///
    /// # Errors
    /// Returns [`FilingError::NotFound`] if no list has that name.
    pub async fn get(&self, user_scope: &str, name: &str) -> Result<WatchlistMembership> {
        let name = validate_name(name)?;
        let mut lists = self.lists(user_scope).await?;
        let members = lists
            .remove(name)
            .ok_or_else(|| FilingError::NotFound(format!("No watchlist named {name:?}")))?;
        Ok(WatchlistMembership {
            list_name: name.to_string(),
            members,
        })
    }

    /// Replaces a list's members, creating the list if needed.
    ///
    /// # Errors
    /// Returns [`FilingError::InvalidParameter`] for a blank name, or store errors.
    #[instrument(skip(self, members), fields(count = members.len()))]
    pub async fn save(
        &self,
        user_scope: &str,
        name: &str,
        members: &BTreeSet<CompanyIdentity>,
    ) -> Result<()> {
        let name = validate_name(name)?;
        self.store.save_named_list(user_scope, name, members).await
    }

    /// Adds a company, creating the list if needed. An existing entry for the
    /// same CIK is replaced.
    ///
    /// # Errors
    /// Returns store errors.
    pub async fn add_member(
        &self,
        user_scope: &str,
        name: &str,
        identity: CompanyIdentity,
    ) -> Result<WatchlistMembership> {
        let name = validate_name(name)?;
        let mut members = self
            .lists(user_scope)
            .await?
            .remove(name)
            .unwrap_or_default();
        members.replace(identity);
        self.store.save_named_list(user_scope, name, &members).await?;
        debug!(list = name, count = members.len(), "Added watchlist member");
        Ok(WatchlistMembership {
            list_name: name.to_string(),
            members,
        })
    }

    /// Removes a company. Returns true if it was a member.
    ///
    /// # Errors
    /// Returns [`FilingError::NotFound`] if the list does not exist.
    pub async fn remove_member(&self, user_scope: &str, name: &str, cik: &Cik) -> Result<bool> {
        let mut membership = self.get(user_scope, name).await?;
        let before = membership.members.len();
        membership.members.retain(|m| &m.cik != cik);
        let removed = membership.members.len() != before;
        if removed {
            self.store
                .save_named_list(user_scope, &membership.list_name, &membership.members)
                .await?;
        }
        Ok(removed)
    }

    /// Aggregates filings for every member of a list.
    ///
    /// # Errors
    /// Returns [`FilingError::NotFound`] if the list does not exist.
    #[instrument(skip(self, options))]
    pub async fn aggregate_list(
        &self,
        user_scope: &str,
        name: &str,
        options: &AggregateOptions,
    ) -> Result<AggregateReport> {
        let membership = self.get(user_scope, name).await?;
        let members: Vec<CompanyIdentity> = membership.members.into_iter().collect();
        Ok(self.aggregator.aggregate(&members, options).await)
    }
}

fn validate_name(name: &str) -> Result<&str> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(FilingError::InvalidParameter(
            "Watchlist name must not be empty".into(),
        ));
    }
    Ok(trimmed)
}
