//! Store errors, shared by the catalog and the conversation log.

use thiserror::Error;

pub type StoreResult<T> = Result<T, StoreError>;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// Catalog documents and the `entities` column are JSON.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("migration to v{version} failed: {message}")]
    Migration { version: u32, message: String },

    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The collaborator cannot serve requests right now (offline backend,
    /// poisoned lock).  Callers degrade instead of failing the turn.
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// A `spawn_blocking` task panicked or was cancelled.
    #[error("blocking task failed: {0}")]
    Background(#[from] tokio::task::JoinError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_names_the_entity() {
        let err = StoreError::NotFound {
            entity: "session",
            id: "abc".into(),
        };
        assert_eq!(err.to_string(), "session not found: abc");
    }

    #[tokio::test]
    async fn panicked_task_converts() {
        let handle: tokio::task::JoinHandle<()> = tokio::spawn(async { panic!("boom") });
        let join_err = handle.await.unwrap_err();
        let err: StoreError = join_err.into();
        assert!(matches!(err, StoreError::Background(_)));
    }
}
