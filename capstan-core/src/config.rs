use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use sqlx::sqlite::{
    SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions, SqliteSynchronous,
};

// A store config object, designed to be passable across API boundaries
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct StoreConfig {
    pub db_url: String,
    pub busy_timeout_seconds: Option<u64>, // Default to 5
    pub acquire_timeout_seconds: Option<u64>, // Default to 30
}

impl StoreConfig {
    pub fn new(db_url: &str) -> Self {
        Self {
            db_url: db_url.to_owned(),
            busy_timeout_seconds: None,
            acquire_timeout_seconds: None,
        }
    }

    /// Open the embedded store. The pool is capped at a single connection:
    /// every mutation on the queue is serialized through it, which is what
    /// makes the engine's select-and-update transitions atomic without any
    /// further locking.
    pub async fn connect(&self) -> Result<SqlitePool, sqlx::Error> {
        let options = SqliteConnectOptions::from_str(&self.db_url)?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .busy_timeout(Duration::from_secs(self.busy_timeout_seconds.unwrap_or(5)));

        SqlitePoolOptions::new()
            .max_connections(1)
            .acquire_timeout(Duration::from_secs(
                self.acquire_timeout_seconds.unwrap_or(30),
            ))
            .connect_with(options)
            .await
    }
}
