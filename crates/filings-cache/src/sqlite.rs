//! SQLite-based watchlist store.

use async_trait::async_trait;
use chrono::Utc;
use filings_core::{CompanyIdentity, FilingError, NamedLists, Result, WatchlistStore};
use rusqlite::{Connection, params};
use std::collections::BTreeSet;
use std::path::Path;
use std::sync::Mutex;
use tracing::{debug, instrument};

/// Watchlists persisted in a SQLite database file.
///
/// Each `(user_scope, list_name)` pair is one row; members are stored as a JSON
/// array of [`CompanyIdentity`] values.
#[derive(Debug)]
pub struct SqliteWatchlistStore {
    conn: Mutex<Connection>,
}

impl SqliteWatchlistStore {
    /// Open (or create) a store at the given path.
    ///
    /// # Arguments
    /// * `path` - Path to the SQLite database file
    ///
    /// # Errors
    /// Returns an error if the database cannot be opened or schema creation fails.
    pub fn new(path: impl AsRef<Path>) -> Result<Self> {
        let conn = Connection::open(path).map_err(|e| FilingError::Storage(e.to_string()))?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.initialize_schema()?;
        Ok(store)
    }

    /// Create an in-memory store.
    ///
    /// Useful for testing; data is lost when the store is dropped.
    ///
    /// # Errors
    /// Returns an error if schema creation fails.
    pub fn in_memory() -> Result<Self> {
        let conn =
            Connection::open_in_memory().map_err(|e| FilingError::Storage(e.to_string()))?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.initialize_schema()?;
        Ok(store)
    }

    fn initialize_schema(&self) -> Result<()> {
        let conn = self
            .conn
            .lock()
            .map_err(|e| FilingError::Storage(e.to_string()))?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS watchlists (
                user_scope TEXT NOT NULL,
                list_name TEXT NOT NULL,
                members_json TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                PRIMARY KEY (user_scope, list_name)
            )",
            [],
        )
        .map_err(|e| FilingError::Storage(e.to_string()))?;

        debug!("SQLite watchlist schema initialized");
        Ok(())
    }
}

#[async_trait]
impl WatchlistStore for SqliteWatchlistStore {
    #[instrument(skip(self))]
    async fn load_named_lists(&self, user_scope: &str) -> Result<NamedLists> {
        let conn = self
            .conn
            .lock()
            .map_err(|e| FilingError::Storage(e.to_string()))?;

        let mut stmt = conn
            .prepare(
                "SELECT list_name, members_json FROM watchlists
                 WHERE user_scope = ?1
                 ORDER BY list_name ASC",
            )
            .map_err(|e| FilingError::Storage(e.to_string()))?;

        let rows = stmt
            .query_map(params![user_scope], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
            })
            .map_err(|e| FilingError::Storage(e.to_string()))?;

        let mut lists = NamedLists::new();
        for row in rows {
            let (name, json) = row.map_err(|e| FilingError::Storage(e.to_string()))?;
            let members: BTreeSet<CompanyIdentity> = serde_json::from_str(&json).map_err(|e| {
                FilingError::Storage(format!("Corrupt members for list {name:?}: {e}"))
            })?;
            lists.insert(name, members);
        }

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
        let json =
            serde_json::to_string(members).map_err(|e| FilingError::Storage(e.to_string()))?;
        let now = Utc::now().to_rfc3339();

        let conn = self
            .conn
            .lock()
            .map_err(|e| FilingError::Storage(e.to_string()))?;

        conn.execute(
            "INSERT OR REPLACE INTO watchlists (user_scope, list_name, members_json, updated_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![user_scope, name, json, now],
        )
        .map_err(|e| FilingError::Storage(e.to_string()))?;

        debug!("Saved watchlist");
        Ok(())
    }
}
