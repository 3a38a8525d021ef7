//! Concierge language kernel.
//!
//! This crate turns raw guest text into structured meaning:
//!
//! - **[`normalizer`]** -- Lowercasing, whitespace collapsing and a fixed
//!   dictionary of hospitality misspellings.
//! - **[`catalog`]** -- The ordered, weighted [`IntentCatalog`] and the closed
//!   [`Module`] enum that owns each intent.
//! - **[`classifier`]** -- Aho-Corasick phrase containment, Levenshtein typo
//!   tolerance and context-aware follow-ups.
//! - **[`entities`]** -- Regex extraction of dates, room types, guest counts,
//!   meals, times, room numbers and price limits.
//! - **[`context`]** -- The immutable per-session [`SessionContext`] snapshot.
//! - **[`error`]** -- Catalog and classifier build errors via [`thiserror`].
//!
//! Classification is synchronous and allocation-light; an
//! [`IntentClassifier`] is `Send + Sync` and meant to be shared behind an
//! `Arc`.

pub mod catalog;
pub mod classifier;
pub mod context;
pub mod entities;
pub mod error;
pub mod normalizer;

// Re-export the most commonly used types at the crate root for convenience.
pub use catalog::{IntentCatalog, IntentDefinition, Module};
pub use classifier::{
    Classification, DECLINE, FALLBACK, IntentClassifier, MatchSource, PRICING_FOLLOW_UP,
};
pub use context::{SessionContext, SlotBag};
pub use entities::extract_entities;
pub use error::{KernelError, Result};
pub use normalizer::normalize;
