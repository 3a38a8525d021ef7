//! SQLite handle for the conversation log.
//!
//! One connection behind a mutex, opened in WAL mode.  Every query is
//! shipped to the blocking pool with [`Database::call`] so a slow disk never
//! stalls a chat turn.

use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use rusqlite::Connection;
use tracing::{debug, info};

use crate::error::{StoreError, StoreResult};
use crate::migration;

const PRAGMAS: &[(&str, &str)] = &[
    ("journal_mode", "WAL"),
    ("synchronous", "NORMAL"),
    ("foreign_keys", "ON"),
];

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    /// Open (or create) the database file.  Blocking.
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        let path = path.as_ref();
        info!(path = %path.display(), "opening conversation database");
        Self::configure(Connection::open(path)?)
    }

    pub fn open_in_memory() -> StoreResult<Self> {
        Self::configure(Connection::open_in_memory()?)
    }

    /// Open the file on the blocking pool and migrate it to the latest
    /// schema.
    pub async fn open_and_migrate(path: impl AsRef<Path> + Send + 'static) -> StoreResult<Self> {
        let db = tokio::task::spawn_blocking(move || Self::open(path)).await??;
        db.run_migrations().await?;
        Ok(db)
    }

    pub async fn run_migrations(&self) -> StoreResult<()> {
        self.call(migration::migrate).await
    }

    /// Run `f` with the connection on the blocking pool.
    pub async fn call<F, T>(&self, f: F) -> StoreResult<T>
    where
        F: FnOnce(&Connection) -> StoreResult<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let guard = conn
                .lock()
                .map_err(|_| StoreError::Unavailable("database connection lock poisoned".into()))?;
            f(&guard)
        })
        .await?
    }

    fn configure(conn: Connection) -> StoreResult<Self> {
        for (name, value) in PRAGMAS {
            conn.pragma_update(None, name, value)?;
        }
        conn.busy_timeout(BUSY_TIMEOUT)?;
        debug!("sqlite pragmas applied");
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn in_memory_database_migrates() {
        let db = Database::open_in_memory().unwrap();
        db.run_migrations().await.unwrap();

        let tables: i64 = db
            .call(|conn| {
                Ok(conn.query_row(
                    "SELECT count(*) FROM sqlite_master WHERE type = 'table' \
                     AND name IN ('sessions', 'messages')",
                    [],
                    |row| row.get(0),
                )?)
            })
            .await
            .unwrap();
        assert_eq!(tables, 2);
    }

    #[tokio::test]
    async fn foreign_keys_are_enforced() {
        let db = Database::open_in_memory().unwrap();
        let enabled: i64 = db
            .call(|conn| Ok(conn.pragma_query_value(None, "foreign_keys", |row| row.get(0))?))
            .await
            .unwrap();
        assert_eq!(enabled, 1);
    }

    #[tokio::test]
    async fn file_database_is_created_and_reopened() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("concierge.db");
        drop(Database::open_and_migrate(path.clone()).await.unwrap());
        assert!(path.exists());

        let db = Database::open_and_migrate(path).await.unwrap();
        let version = db.call(migration::schema_version).await.unwrap();
        assert_eq!(version, migration::latest_version());
    }
}
