//! Conversation persistence.
//!
//! The engine logs every exchange through the [`MessageStore`] trait.  Two
//! implementations are provided: [`SessionStore`] (SQLite via [`Database`])
//! and [`InMemoryMessageStore`] for tests and ephemeral CLI sessions.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};
use uuid::Uuid;

use crate::db::Database;
use crate::error::{StoreError, StoreResult};

// ═══════════════════════════════════════════════════════════════════════
//  Types
// ═══════════════════════════════════════════════════════════════════════

/// Who authored a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Sender {
    Guest,
    Bot,
}

impl Sender {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Guest => "guest",
            Self::Bot => "bot",
        }
    }

    fn parse(raw: &str) -> Option<Self> {
        match raw {
            "guest" => Some(Self::Guest),
            "bot" => Some(Self::Bot),
            _ => None,
        }
    }
}

/// A message about to be appended to a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewMessage {
    pub session_id: String,
    pub sender: Sender,
    pub content: String,
    /// Classified intent, for bot replies.
    pub intent: Option<String>,
    pub confidence: Option<f64>,
    pub entities: HashMap<String, String>,
}

impl NewMessage {
    /// A guest utterance with no classification attached.
    pub fn guest(session_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            sender: Sender::Guest,
            content: content.into(),
            intent: None,
            confidence: None,
            entities: HashMap::new(),
        }
    }

    /// A bot reply annotated with the intent that produced it.
    pub fn bot(
        session_id: impl Into<String>,
        content: impl Into<String>,
        intent: impl Into<String>,
        confidence: f64,
        entities: HashMap<String, String>,
    ) -> Self {
        Self {
            session_id: session_id.into(),
            sender: Sender::Bot,
            content: content.into(),
            intent: Some(intent.into()),
            confidence: Some(confidence),
            entities,
        }
    }
}

/// A message as read back from a store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredMessage {
    pub id: i64,
    pub session_id: String,
    pub sender: Sender,
    pub content: String,
    pub intent: Option<String>,
    pub confidence: Option<f64>,
    pub entities: HashMap<String, String>,
    /// Unix timestamp (seconds).
    pub created_at: i64,
}

// ═══════════════════════════════════════════════════════════════════════
//  MessageStore
// ═══════════════════════════════════════════════════════════════════════

/// Session creation and message logging.
///
/// Callers treat every operation as best-effort: a failure is logged and
/// the conversation continues.
#[async_trait]
pub trait MessageStore: Send + Sync {
    /// Create a new session and return its id.
    async fn create_session(&self) -> StoreResult<String>;

    /// Append a message to an existing session.
    async fn append_message(&self, message: NewMessage) -> StoreResult<()>;

    /// All messages of a session, oldest first.
    async fn messages(&self, session_id: &str) -> StoreResult<Vec<StoredMessage>>;
}

// ═══════════════════════════════════════════════════════════════════════
//  SessionStore (SQLite)
// ═══════════════════════════════════════════════════════════════════════

/// SQLite-backed [`MessageStore`].
#[derive(Clone)]
pub struct SessionStore {
    db: Database,
}

impl SessionStore {
    /// Create a store backed by a migrated `db`.
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Number of messages recorded for a session.
    #[instrument(skip(self))]
    pub async fn message_count(&self, session_id: &str) -> StoreResult<i64> {
        let session_id = session_id.to_string();
        self.db
            .call(move |conn| {
                conn.query_row(
                    "SELECT message_count FROM sessions WHERE id = ?1",
                    rusqlite::params![session_id],
                    |row| row.get(0),
                )
                .map_err(|e| match e {
                    rusqlite::Error::QueryReturnedNoRows => StoreError::NotFound {
                        entity: "session",
                        id: session_id.clone(),
                    },
                    other => StoreError::Sqlite(other),
                })
            })
            .await
    }

    /// Delete a session and its messages (cascade).
    #[instrument(skip(self))]
    pub async fn delete(&self, session_id: &str) -> StoreResult<()> {
        let session_id = session_id.to_string();
        self.db
            .call(move |conn| {
                let deleted = conn.execute(
                    "DELETE FROM sessions WHERE id = ?1",
                    rusqlite::params![session_id],
                )?;
                if deleted == 0 {
                    return Err(StoreError::NotFound {
                        entity: "session",
                        id: session_id,
                    });
                }
                Ok(())
            })
            .await
    }
}

#[async_trait]
impl MessageStore for SessionStore {
    #[instrument(skip(self))]
    async fn create_session(&self) -> StoreResult<String> {
        let id = Uuid::now_v7().to_string();
        let now = Utc::now().timestamp();
        let session_id = id.clone();

        self.db
            .call(move |conn| {
                conn.execute(
                    "INSERT INTO sessions (id, message_count, created_at, updated_at) \
                     VALUES (?1, 0, ?2, ?2)",
                    rusqlite::params![session_id, now],
                )?;
                Ok(())
            })
            .await?;

        debug!(session_id = %id, "session created");
        Ok(id)
    }

    #[instrument(skip(self, message), fields(session_id = %message.session_id))]
    async fn append_message(&self, message: NewMessage) -> StoreResult<()> {
        let entities = serde_json::to_string(&message.entities)?;
        let now = Utc::now().timestamp();

        self.db
            .call(move |conn| {
                // Counter bump and row insert land together or not at all.
                let tx = conn.unchecked_transaction()?;
                let updated = tx.execute(
                    "UPDATE sessions SET message_count = message_count + 1, updated_at = ?2 \
                     WHERE id = ?1",
                    rusqlite::params![message.session_id, now],
                )?;
                if updated == 0 {
                    return Err(StoreError::NotFound {
                        entity: "session",
                        id: message.session_id,
                    });
                }

                tx.execute(
                    "INSERT INTO messages (session_id, sender, content, intent, confidence, entities, created_at) \
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                    rusqlite::params![
                        message.session_id,
                        message.sender.as_str(),
                        message.content,
                        message.intent,
                        message.confidence,
                        entities,
                        now
                    ],
                )?;
                tx.commit()?;
                Ok(())
            })
            .await
    }

    #[instrument(skip(self))]
    async fn messages(&self, session_id: &str) -> StoreResult<Vec<StoredMessage>> {
        let session_id = session_id.to_string();
        self.db
            .call(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT id, session_id, sender, content, intent, confidence, entities, created_at \
                     FROM messages WHERE session_id = ?1 ORDER BY created_at ASC, id ASC",
                )?;
                let rows = stmt
                    .query_map(rusqlite::params![session_id], |row| {
                        Ok((
                            row.get::<_, i64>(0)?,
                            row.get::<_, String>(1)?,
                            row.get::<_, String>(2)?,
                            row.get::<_, String>(3)?,
                            row.get::<_, Option<String>>(4)?,
                            row.get::<_, Option<f64>>(5)?,
                            row.get::<_, String>(6)?,
                            row.get::<_, i64>(7)?,
                        ))
                    })?
                    .collect::<Result<Vec<_>, _>>()?;

                rows.into_iter()
                    .map(
                        |(id, session_id, sender, content, intent, confidence, entities, created_at)| {
                            let sender = Sender::parse(&sender).ok_or_else(|| {
                                StoreError::InvalidArgument(format!("unknown sender `{sender}`"))
                            })?;
                            Ok(StoredMessage {
                                id,
                                session_id,
                                sender,
                                content,
                                intent,
                                confidence,
                                entities: serde_json::from_str(&entities)?,
                                created_at,
                            })
                        },
                    )
                    .collect()
            })
            .await
    }
}

// ═══════════════════════════════════════════════════════════════════════
//  InMemoryMessageStore
// ═══════════════════════════════════════════════════════════════════════

/// Process-local [`MessageStore`]; contents are lost on drop.
#[derive(Debug, Default)]
pub struct InMemoryMessageStore {
    sessions: Mutex<HashMap<String, Vec<StoredMessage>>>,
}

impl InMemoryMessageStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of sessions created so far.
    pub fn session_count(&self) -> usize {
        self.sessions.lock().map(|s| s.len()).unwrap_or(0)
    }

    fn lock(&self) -> StoreResult<std::sync::MutexGuard<'_, HashMap<String, Vec<StoredMessage>>>> {
        self.sessions
            .lock()
            .map_err(|e| StoreError::Unavailable(format!("mutex poisoned: {e}")))
    }
}

#[async_trait]
impl MessageStore for InMemoryMessageStore {
    async fn create_session(&self) -> StoreResult<String> {
        let id = Uuid::now_v7().to_string();
        self.lock()?.insert(id.clone(), Vec::new());
        debug!(session_id = %id, "in-memory session created");
        Ok(id)
    }

    async fn append_message(&self, message: NewMessage) -> StoreResult<()> {
        let mut sessions = self.lock()?;
        let log = sessions
            .get_mut(&message.session_id)
            .ok_or_else(|| StoreError::NotFound {
                entity: "session",
                id: message.session_id.clone(),
            })?;

        let id = log.len() as i64 + 1;
        log.push(StoredMessage {
            id,
            session_id: message.session_id,
            sender: message.sender,
            content: message.content,
            intent: message.intent,
            confidence: message.confidence,
            entities: message.entities,
            created_at: Utc::now().timestamp(),
        });
        Ok(())
    }

    async fn messages(&self, session_id: &str) -> StoreResult<Vec<StoredMessage>> {
        self.lock()?
            .get(session_id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound {
                entity: "session",
                id: session_id.to_string(),
            })
    }
}

// ═══════════════════════════════════════════════════════════════════════
//  Tests
// ═══════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;

    async fn sqlite_store() -> SessionStore {
        let db = Database::open_in_memory().unwrap();
        db.run_migrations().await.unwrap();
        SessionStore::new(db)
    }

    #[tokio::test]
    async fn sqlite_append_and_read_back() {
        let store = sqlite_store().await;
        let session_id = store.create_session().await.unwrap();

        store
            .append_message(NewMessage::guest(&session_id, "any rooms tonight?"))
            .await
            .unwrap();

        let mut entities = HashMap::new();
        entities.insert("date".to_string(), "tonight".to_string());
        store
            .append_message(NewMessage::bot(
                &session_id,
                "Here are our available rooms.",
                "CheckRoomAvailability",
                0.98,
                entities.clone(),
            ))
            .await
            .unwrap();

        let messages = store.messages(&session_id).await.unwrap();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].sender, Sender::Guest);
        assert!(messages[0].intent.is_none());
        assert_eq!(messages[1].intent.as_deref(), Some("CheckRoomAvailability"));
        assert_eq!(messages[1].entities, entities);
        assert_eq!(store.message_count(&session_id).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn sqlite_append_to_unknown_session_fails() {
        let store = sqlite_store().await;
        let result = store
            .append_message(NewMessage::guest("missing", "hello"))
            .await;
        assert!(matches!(result, Err(StoreError::NotFound { .. })));
    }

    #[tokio::test]
    async fn sqlite_failed_insert_leaves_count_untouched() {
        let db = Database::open_in_memory().unwrap();
        db.run_migrations().await.unwrap();
        let store = SessionStore::new(db.clone());
        let session_id = store.create_session().await.unwrap();

        db.call(|conn| {
            conn.execute_batch(
                "CREATE TRIGGER reject_messages BEFORE INSERT ON messages \
                 BEGIN SELECT RAISE(ABORT, 'rejected'); END;",
            )?;
            Ok(())
        })
        .await
        .unwrap();

        let result = store
            .append_message(NewMessage::guest(&session_id, "hello"))
            .await;
        assert!(matches!(result, Err(StoreError::Sqlite(_))));
        assert_eq!(store.message_count(&session_id).await.unwrap(), 0);
        assert!(store.messages(&session_id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn sqlite_delete_cascades_messages() {
        let store = sqlite_store().await;
        let session_id = store.create_session().await.unwrap();
        store
            .append_message(NewMessage::guest(&session_id, "hi"))
            .await
            .unwrap();

        store.delete(&session_id).await.unwrap();
        assert!(store.messages(&session_id).await.unwrap().is_empty());
        assert!(store.delete(&session_id).await.is_err());
    }

    #[tokio::test]
    async fn in_memory_store_orders_messages() {
        let store = InMemoryMessageStore::new();
        let session_id = store.create_session().await.unwrap();
        assert_eq!(store.session_count(), 1);

        for text in ["one", "two", "three"] {
            store
                .append_message(NewMessage::guest(&session_id, text))
                .await
                .unwrap();
        }

        let contents: Vec<String> = store
            .messages(&session_id)
            .await
            .unwrap()
            .into_iter()
            .map(|m| m.content)
            .collect();
        assert_eq!(contents, vec!["one", "two", "three"]);
    }

    #[tokio::test]
    async fn in_memory_unknown_session_is_not_found() {
        let store = InMemoryMessageStore::new();
        assert!(store.messages("nope").await.is_err());
        assert!(
            store
                .append_message(NewMessage::guest("nope", "hi"))
                .await
                .is_err()
        );
    }
}
