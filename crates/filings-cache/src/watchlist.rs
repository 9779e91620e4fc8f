//! In-memory watchlist store.

use async_trait::async_trait;
use filings_core::{CompanyIdentity, NamedLists, Result, WatchlistStore};
use std::collections::{BTreeSet, HashMap};
use tokio::sync::RwLock;
use tracing::{debug, instrument};

/// Watchlists kept in process memory.
///
/// Useful for tests and batch jobs; data is lost when the store is dropped.
#[derive(Debug, Default)]
pub struct InMemoryWatchlistStore {
    scopes: RwLock<HashMap<String, NamedLists>>,
}

impl InMemoryWatchlistStore {
    /// Create a new empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl WatchlistStore for InMemoryWatchlistStore {
    #[instrument(skip(self))]
    async fn load_named_lists(&self, user_scope: &str) -> Result<NamedLists> {
        let lists = self
            .scopes
            .read()
            .await
            .get(user_scope)
            .cloned()
            .unwrap_or_default();
        debug!(count = lists.len(), "Loaded watchlists");
        Ok(lists)
    }

    #[instrument(skip(self, members), fields(count = members.len()))]
    async fn save_named_list(
        &self,
        user_scope: &str,
        name: &str,
        members: &BTreeSet<CompanyIdentity>,
    ) -> Result<()> {
        self.scopes
            .write()
            .await
            .entry(user_scope.to_string())
            .or_default()
            .insert(name.to_string(), members.clone());
        debug!("Saved watchlist");
        Ok(())
    }
}
