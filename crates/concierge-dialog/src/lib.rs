//! # concierge-dialog
//!
//! Conversation management for the Concierge assistant:
//!
//! - **Flows**: declarative multi-step dialogues ([`FlowDefinition`]) with
//!   per-step validators, retries and data-driven branching, executed by the
//!   [`FlowEngine`].  Built-in hotel flows live in [`builtin`].
//! - **Policy**: the [`FallbackPolicy`] turns low-confidence turns into a
//!   clarifying question, a category menu, or a hand-off to staff.
//! - **Routing**: [`responder`] maps an intent to templated text or a UI
//!   action token.
//! - **Turn pipeline**: [`Concierge`] ties it all together against the
//!   content catalog and message store.
//!
//! ```ignore
//! use std::sync::Arc;
//! use concierge_dialog::{Concierge, EngineConfig};
//! use concierge_store::{InMemoryMessageStore, StaticCatalog};
//!
//! let concierge = Concierge::new(
//!     EngineConfig::default(),
//!     Arc::new(StaticCatalog::hotel_defaults()),
//!     Arc::new(InMemoryMessageStore::new()),
//! )?;
//! let ctx = concierge.start_session().await;
//! let turn = concierge.handle_turn(&ctx, "any rooms for tonight?").await;
//! println!("{}", turn.response.response_text);
//! ```

pub mod builtin;
pub mod concierge;
pub mod config;
pub mod engine;
pub mod error;
pub mod flow;
pub mod policy;
pub mod registry;
pub mod responder;

pub use concierge::{Concierge, TurnOutcome, TurnResponse};
pub use config::EngineConfig;
pub use engine::{FlowEngine, FlowStart, FlowSweeper};
pub use error::{DialogError, Result};
pub use flow::{
    BranchRule, FlowAction, FlowDefinition, FlowErrorCode, FlowInstance, FlowStatus, FlowStep,
    NextStep, StepKind, StepOutcome, Validator,
};
pub use policy::{FallbackPolicy, InputRejection, PolicyDecision};
pub use registry::FlowRegistry;
pub use responder::{ActionToken, ResponseDescriptor, ResponseType};
