//! Schema migrations for the conversation log.
//!
//! The schema version lives in SQLite's `user_version` pragma.  Each
//! migration runs in its own transaction together with the version bump, so
//! a failed step leaves the database at the previous version.

use rusqlite::Connection;
use tracing::{debug, info, warn};

use crate::error::{StoreError, StoreResult};

struct Migration {
    version: u32,
    description: &'static str,
    sql: &'static str,
}

/// Append only; versions must keep increasing.
static MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        description: "conversation log: sessions and messages",
        sql: r#"
            CREATE TABLE sessions (
                id            TEXT PRIMARY KEY,
                message_count INTEGER NOT NULL DEFAULT 0,
                created_at    INTEGER NOT NULL,
                updated_at    INTEGER NOT NULL
            );

            CREATE TABLE messages (
                id          INTEGER PRIMARY KEY AUTOINCREMENT,
                session_id  TEXT NOT NULL REFERENCES sessions(id) ON DELETE CASCADE,
                sender      TEXT NOT NULL CHECK(sender IN ('guest','bot')),
                content     TEXT NOT NULL,
                intent      TEXT,
                confidence  REAL,
                entities    TEXT NOT NULL DEFAULT '{}',
                created_at  INTEGER NOT NULL
            );
            CREATE INDEX idx_messages_session ON messages(session_id);
        "#,
    },
    Migration {
        version: 2,
        description: "intent analytics: index messages by intent",
        sql: "CREATE INDEX idx_messages_intent ON messages(intent);",
    },
];

/// Newest schema version this build knows about.
pub fn latest_version() -> u32 {
    MIGRATIONS.last().map_or(0, |m| m.version)
}

/// Schema version recorded in the database (0 for a fresh file).
pub fn schema_version(conn: &Connection) -> StoreResult<u32> {
    let version: u32 = conn.pragma_query_value(None, "user_version", |row| row.get(0))?;
    Ok(version)
}

/// Bring the schema up to [`latest_version`].
///
/// Synchronous; [`Database`](crate::Database) calls it on the blocking pool.
pub fn migrate(conn: &Connection) -> StoreResult<()> {
    let from = schema_version(conn)?;
    if from > latest_version() {
        return Err(StoreError::Migration {
            version: from,
            message: format!("database is newer than this build (v{})", latest_version()),
        });
    }

    let mut applied = 0;
    for migration in MIGRATIONS.iter().filter(|m| m.version > from) {
        step(conn, migration)?;
        applied += 1;
    }

    if applied == 0 {
        debug!(version = from, "conversation schema up to date");
    } else {
        info!(from, to = latest_version(), applied, "conversation schema migrated");
    }
    Ok(())
}

fn step(conn: &Connection, migration: &Migration) -> StoreResult<()> {
    let failed = |e: rusqlite::Error| StoreError::Migration {
        version: migration.version,
        message: e.to_string(),
    };

    debug!(version = migration.version, description = migration.description, "applying migration");
    let tx = conn.unchecked_transaction().map_err(failed)?;
    if let Err(e) = tx.execute_batch(migration.sql) {
        warn!(version = migration.version, error = %e, "migration failed; rolling back");
        return Err(failed(e));
    }
    tx.pragma_update(None, "user_version", migration.version)
        .map_err(failed)?;
    tx.commit().map_err(failed)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn conn() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        conn.pragma_update(None, "foreign_keys", "ON").unwrap();
        conn
    }

    #[test]
    fn versions_increase() {
        assert!(MIGRATIONS.windows(2).all(|w| w[1].version > w[0].version));
        assert_eq!(latest_version(), 2);
    }

    #[test]
    fn fresh_database_reaches_latest_and_stays_there() {
        let conn = conn();
        assert_eq!(schema_version(&conn).unwrap(), 0);
        migrate(&conn).unwrap();
        migrate(&conn).unwrap();
        assert_eq!(schema_version(&conn).unwrap(), latest_version());
    }

    #[test]
    fn newer_database_is_refused() {
        let conn = conn();
        conn.pragma_update(None, "user_version", 99).unwrap();
        assert!(matches!(
            migrate(&conn),
            Err(StoreError::Migration { version: 99, .. })
        ));
    }

    #[test]
    fn sender_must_be_guest_or_bot() {
        let conn = conn();
        migrate(&conn).unwrap();
        conn.execute(
            "INSERT INTO sessions (id, created_at, updated_at) VALUES ('s1', 0, 0)",
            [],
        )
        .unwrap();
        let result = conn.execute(
            "INSERT INTO messages (session_id, sender, content, created_at) \
             VALUES ('s1', 'system', 'hi', 0)",
            [],
        );
        assert!(result.is_err());
    }
}
