//! # concierge-store
//!
//! Collaborators consumed by the Concierge conversation engine:
//!
//! - **Content catalog**: rooms, menu, amenities, departments and FAQ
//!   entries behind the read-only [`ContentCatalog`] trait, with the
//!   in-memory [`StaticCatalog`].
//! - **Conversation log**: session creation and message logging behind the
//!   async [`MessageStore`] trait, implemented by the SQLite-backed
//!   [`SessionStore`] and by [`InMemoryMessageStore`].
//!
//! ```ignore
//! use concierge_store::{Database, MessageStore, SessionStore};
//!
//! let db = Database::open_and_migrate("data/concierge.db").await?;
//! let store = SessionStore::new(db);
//! let session_id = store.create_session().await?;
//! ```

pub mod catalog;
pub mod db;
pub mod error;
pub mod migration;
pub mod session;

// ── re-exports ───────────────────────────────────────────────────────

pub use catalog::{
    Amenity, CatalogDocument, ContentCatalog, Department, FaqEntry, MenuItem, Room, StaticCatalog,
};
pub use db::Database;
pub use error::{StoreError, StoreResult};
pub use session::{
    InMemoryMessageStore, MessageStore, NewMessage, Sender, SessionStore, StoredMessage,
};
