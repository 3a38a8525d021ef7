//! The turn pipeline.
//!
//! [`Concierge`] wires the classifier, the flow engine, the fallback policy
//! and the response router together and talks to the content catalog and
//! message store collaborators.  One call to [`Concierge::handle_turn`]
//! handles one guest message:
//!
//! ```text
//! input check ─▶ active flow? ──yes──▶ FlowEngine::process_input
//!                     │no
//!                     ▼
//!               classify ─▶ policy ─▶ start flow | route + enrich
//! ```
//!
//! Message-store failures are logged and never abort a turn.

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use tracing::{debug, info, warn};
use uuid::Uuid;

use concierge_kernel::normalizer::contains_phrase;
use concierge_kernel::{Classification, IntentClassifier, Module, SessionContext, SlotBag, normalize};
use concierge_store::{ContentCatalog, MessageStore, NewMessage, Room, StoreResult};

use crate::config::EngineConfig;
use crate::engine::{FlowEngine, FlowSweeper};
use crate::error::{DialogError, Result};
use crate::flow::{FlowErrorCode, FlowInstance, StepOutcome};
use crate::policy::{FallbackPolicy, PolicyDecision};
use crate::registry::FlowRegistry;
use crate::responder::{self, ActionToken, ResponseDescriptor, ResponseType};

/// Phrases that abandon the active flow.
const CANCEL_PHRASES: &[&str] = &[
    "cancel",
    "stop",
    "quit",
    "never mind",
    "nevermind",
    "start over",
    "quit booking",
    "cancel booking",
    "cancel order",
];

const MAX_CANCEL_WORDS: usize = 4;

const INVALID_INPUT_INTENT: &str = "invalid_input";
const SYSTEM_ERROR_INTENT: &str = "system_error";

/// What the guest sees for one turn, plus telemetry fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TurnResponse {
    pub intent: String,
    pub confidence: f64,
    pub entities: HashMap<String, String>,
    pub response_text: String,
    pub response_type: ResponseType,
    pub action: Option<ActionToken>,
    pub response_data: Option<Value>,
    /// Machine-readable failure code; never shown to the guest.
    pub error_code: Option<String>,
}

impl TurnResponse {
    fn new(
        intent: impl Into<String>,
        confidence: f64,
        entities: HashMap<String, String>,
        descriptor: ResponseDescriptor,
    ) -> Self {
        Self {
            intent: intent.into(),
            confidence,
            entities,
            response_text: descriptor.text,
            response_type: descriptor.response_type,
            action: descriptor.action,
            response_data: descriptor.data,
            error_code: None,
        }
    }

    fn from_classification(classification: &Classification, descriptor: ResponseDescriptor) -> Self {
        Self::new(
            classification.intent.clone(),
            classification.confidence,
            classification.entities.clone(),
            descriptor,
        )
    }

    fn with_error_code(mut self, code: impl Into<String>) -> Self {
        self.error_code = Some(code.into());
        self
    }
}

/// Result of a turn: the response and the session snapshot for the next
/// turn.
#[derive(Debug, Clone)]
pub struct TurnOutcome {
    pub response: TurnResponse,
    pub context: SessionContext,
}

// ═══════════════════════════════════════════════════════════════════════
//  Concierge
// ═══════════════════════════════════════════════════════════════════════

pub struct Concierge {
    classifier: Arc<IntentClassifier>,
    engine: FlowEngine,
    policy: FallbackPolicy,
    catalog: Arc<dyn ContentCatalog>,
    store: Arc<dyn MessageStore>,
    config: EngineConfig,
}

impl Concierge {
    /// Build a concierge with the hotel intent catalog and built-in flows.
    pub fn new(
        config: EngineConfig,
        catalog: Arc<dyn ContentCatalog>,
        store: Arc<dyn MessageStore>,
    ) -> Result<Self> {
        let classifier = IntentClassifier::hospitality()?;
        let registry = FlowRegistry::hospitality()?;
        Ok(Self::with_parts(config, classifier, registry, catalog, store))
    }

    /// Build a concierge from custom parts.
    pub fn with_parts(
        config: EngineConfig,
        classifier: IntentClassifier,
        registry: FlowRegistry,
        catalog: Arc<dyn ContentCatalog>,
        store: Arc<dyn MessageStore>,
    ) -> Self {
        let engine = FlowEngine::new(registry, Arc::clone(&catalog), &config);
        Self {
            classifier: Arc::new(classifier),
            engine,
            policy: FallbackPolicy::new(&config),
            catalog,
            store,
            config,
        }
    }

    pub fn classifier(&self) -> &IntentClassifier {
        &self.classifier
    }

    pub fn engine(&self) -> &FlowEngine {
        &self.engine
    }

    pub fn registry(&self) -> &FlowRegistry {
        self.engine.registry()
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Start the background sweeper for idle flow instances.
    pub fn spawn_sweeper(&self) -> FlowSweeper {
        FlowSweeper::spawn(self.engine.clone(), self.config.sweep_interval())
    }

    /// Open a new session.  Falls back to a local id if the store fails.
    pub async fn start_session(&self) -> SessionContext {
        let session_id = match self.store.create_session().await {
            Ok(id) => id,
            Err(e) => {
                let id = Uuid::now_v7().to_string();
                warn!(error = %e, session_id = %id, "session store unavailable; using local session id");
                id
            }
        };
        info!(session_id = %session_id, "session started");
        SessionContext::new(session_id)
    }

    /// Handle one guest message.
    pub async fn handle_turn(&self, context: &SessionContext, text: &str) -> TurnOutcome {
        let context = context.with_visit();
        self.log(NewMessage::guest(&context.session_id, text)).await;

        let (response, context) = self.respond(&context, text);

        debug!(
            session_id = %context.session_id,
            intent = %response.intent,
            confidence = response.confidence,
            response_type = ?response.response_type,
            error_code = ?response.error_code,
            "turn handled"
        );
        self.log(NewMessage::bot(
            &context.session_id,
            response.response_text.clone(),
            response.intent.clone(),
            response.confidence,
            response.entities.clone(),
        ))
        .await;

        TurnOutcome { response, context }
    }

    // -- Pipeline stages ----------------------------------------------------

    fn respond(&self, context: &SessionContext, text: &str) -> (TurnResponse, SessionContext) {
        if let Err(rejection) = self.policy.check_input(text) {
            debug!(session_id = %context.session_id, code = rejection.code(), "input rejected");
            let response = TurnResponse::new(
                INVALID_INPUT_INTENT,
                0.0,
                HashMap::new(),
                responder::input_rejected(rejection),
            )
            .with_error_code(rejection.code());
            return (response, context.clone());
        }

        let mut context = context.clone();
        if let Some(instance_id) = context.current_flow_id.clone() {
            match self.continue_flow(&context, &instance_id, text) {
                Some(turn) => return turn,
                None => {
                    debug!(instance_id = %instance_id, "flow instance gone; classifying normally");
                    context = context.with_flow(None);
                }
            }
        }

        self.classify_turn(&context, text)
    }

    /// Route input to the session's flow.  `None` means the instance no
    /// longer exists (swept or already finished).
    fn continue_flow(
        &self,
        context: &SessionContext,
        instance_id: &str,
        text: &str,
    ) -> Option<(TurnResponse, SessionContext)> {
        let instance = self.engine.get(instance_id).filter(FlowInstance::is_active)?;
        let intent = format!("flow:{}", instance.flow_id);

        if is_cancel_request(text) {
            return match self.engine.cancel(instance_id) {
                Ok(_) => Some((
                    TurnResponse::new(intent, 1.0, HashMap::new(), responder::flow_cancelled()),
                    context.with_flow(None),
                )),
                Err(e) => Some(self.system_error(context, e)),
            };
        }

        match self.engine.process_input(instance_id, text) {
            Ok(outcome) => Some(self.flow_turn(context, &instance, intent, outcome)),
            Err(DialogError::InstanceNotFound { .. } | DialogError::FlowNotActive { .. }) => None,
            Err(e) => Some(self.system_error(context, e)),
        }
    }

    fn flow_turn(
        &self,
        context: &SessionContext,
        instance: &FlowInstance,
        intent: String,
        outcome: StepOutcome,
    ) -> (TurnResponse, SessionContext) {
        if outcome.error == Some(FlowErrorCode::MaxRetriesExceeded) {
            warn!(
                session_id = %context.session_id,
                flow_id = %instance.flow_id,
                "flow retries exhausted; escalating"
            );
            let mut descriptor = self.escalation();
            descriptor.text = format!("{} {}", outcome.message, descriptor.text);
            let response = TurnResponse::new(intent, 1.0, HashMap::new(), descriptor)
                .with_error_code(FlowErrorCode::MaxRetriesExceeded.as_str());
            return (response, context.with_flow(None));
        }

        let descriptor = ResponseDescriptor {
            response_type: ResponseType::Flow,
            text: outcome.message.clone(),
            action: None,
            data: Some(json!({
                "flow_id": instance.flow_id,
                "instance_id": instance.id,
                "next_step": outcome.next_step,
                "completed": outcome.completed,
            })),
        };
        let mut response = TurnResponse::new(intent, 1.0, HashMap::new(), descriptor);
        if let Some(code) = outcome.error {
            response = response.with_error_code(code.as_str());
        }

        let context = if outcome.completed {
            let slots = self.slots_from(&outcome.data);
            info!(
                session_id = %context.session_id,
                flow_id = %instance.flow_id,
                "flow finished; slots updated"
            );
            context.with_flow(None).with_slots(&slots)
        } else {
            context.clone()
        };
        (response, context)
    }

    fn classify_turn(&self, context: &SessionContext, text: &str) -> (TurnResponse, SessionContext) {
        let classification = self.classifier.classify(text, context);
        let (decision, next) = self.policy.evaluate(&classification, context);

        match decision {
            PolicyDecision::Clarify => (
                TurnResponse::from_classification(&classification, responder::clarify()),
                next,
            ),
            PolicyDecision::Menu => (
                TurnResponse::from_classification(&classification, responder::menu()),
                next,
            ),
            PolicyDecision::Escalate => {
                warn!(
                    session_id = %context.session_id,
                    fallback_count = next.fallback_count,
                    "repeated low-confidence turns; escalating"
                );
                (
                    TurnResponse::from_classification(&classification, self.escalation()),
                    next,
                )
            }
            PolicyDecision::Proceed => self.proceed(&classification, next),
        }
    }

    fn proceed(
        &self,
        classification: &Classification,
        context: SessionContext,
    ) -> (TurnResponse, SessionContext) {
        if let Some(flow) = self.registry().for_intent(&classification.intent) {
            return match self.engine.start_flow(
                &flow.id,
                &context.session_id,
                classification.entities.clone(),
            ) {
                Ok(start) => {
                    let descriptor = ResponseDescriptor {
                        response_type: ResponseType::Flow,
                        text: start.message,
                        action: None,
                        data: Some(json!({
                            "flow_id": flow.id,
                            "instance_id": start.instance.id,
                            "next_step": start
                                .instance
                                .is_active()
                                .then(|| flow.steps[start.instance.step_index].id.clone()),
                            "completed": !start.instance.is_active(),
                        })),
                    };
                    let flow_ref = start.instance.is_active().then(|| start.instance.id.clone());
                    (
                        TurnResponse::from_classification(classification, descriptor),
                        context.with_flow(flow_ref),
                    )
                }
                Err(e) => self.system_error(&context, e),
            };
        }

        let faqs = if classification.module == Module::Faq {
            match self.catalog.faqs() {
                Ok(faqs) => faqs,
                Err(e) => {
                    warn!(error = %e, "catalog unavailable for FAQ lookup");
                    return self.degraded(classification, context);
                }
            }
        } else {
            Vec::new()
        };

        let descriptor = responder::route(classification, &faqs);
        match self.enrich(descriptor, classification) {
            Ok(descriptor) => (
                TurnResponse::from_classification(classification, descriptor),
                context,
            ),
            Err(e) => {
                warn!(error = %e, intent = %classification.intent, "catalog unavailable");
                self.degraded(classification, context)
            }
        }
    }

    // -- Catalog enrichment -------------------------------------------------

    /// Attach catalog listings to an action response.
    fn enrich(
        &self,
        mut descriptor: ResponseDescriptor,
        classification: &Classification,
    ) -> StoreResult<ResponseDescriptor> {
        let Some(action) = descriptor.action else {
            return Ok(descriptor);
        };
        let mut data = match descriptor.data.take() {
            Some(Value::Object(map)) => map,
            _ => Map::new(),
        };

        match action {
            ActionToken::ShowRooms => {
                let rooms = self.matching_rooms(&classification.entities)?;
                if rooms.is_empty() {
                    descriptor.text =
                        "Sorry, nothing matches that exactly. Here is everything we have available:"
                            .to_string();
                    data.insert("rooms".into(), json!(self.catalog.available_rooms()?));
                } else {
                    data.insert("rooms".into(), json!(rooms));
                }
            }
            ActionToken::ShowMenu => {
                let menu = self.catalog.menu()?;
                let filtered: Vec<_> = match classification.entities.get("meal") {
                    Some(meal) => menu
                        .iter()
                        .filter(|m| m.category.eq_ignore_ascii_case(meal))
                        .cloned()
                        .collect(),
                    None => Vec::new(),
                };
                let items = if filtered.is_empty() { menu } else { filtered };
                data.insert("items".into(), json!(items));
            }
            ActionToken::ShowAmenities => {
                let spa_only = data.get("category").and_then(Value::as_str) == Some("spa");
                let amenities = if spa_only {
                    self.catalog.spa_services()?
                } else {
                    self.catalog.amenities()?
                };
                data.insert("amenities".into(), json!(amenities));
            }
            ActionToken::ShowContactSupport => {
                data.insert("departments".into(), json!(self.catalog.departments()?));
            }
        }

        descriptor.data = Some(Value::Object(data));
        Ok(descriptor)
    }

    /// Available rooms filtered by the price, type and party-size entities.
    fn matching_rooms(&self, entities: &HashMap<String, String>) -> StoreResult<Vec<Room>> {
        let rooms = match entities.get("max_price").and_then(|p| p.parse::<f64>().ok()) {
            Some(max_price) => self.catalog.rooms_under(max_price)?,
            None => self.catalog.available_rooms()?,
        };
        let room_type = entities.get("room_type");
        let guests = entities.get("guests").and_then(|g| g.parse::<u32>().ok());
        Ok(rooms
            .into_iter()
            .filter(|r| room_type.is_none_or(|t| r.room_type.eq_ignore_ascii_case(t)))
            .filter(|r| guests.is_none_or(|g| r.max_guests >= g))
            .collect())
    }

    /// Slot values worth remembering from a finished flow's data bag.
    fn slots_from(&self, data: &HashMap<String, String>) -> SlotBag {
        let get = |key: &str| data.get(key).cloned();

        let room_type = get("upgrade_selection")
            .or_else(|| get("room_selection"))
            .and_then(|id| match self.catalog.room(&id) {
                Ok(room) => room.map(|r| r.room_type),
                Err(e) => {
                    warn!(error = %e, room_id = %id, "room lookup failed");
                    None
                }
            })
            .or_else(|| get("room_type"));

        SlotBag {
            guest_name: get("guest_name"),
            room_type,
            dates: get("check_in_date").or_else(|| get("date")),
            room_number: get("room_number").or_else(|| get("maintenance_details")),
        }
    }

    // -- Canned responses ---------------------------------------------------

    fn escalation(&self) -> ResponseDescriptor {
        match self.catalog.departments() {
            Ok(departments) => responder::escalation(&departments),
            Err(e) => {
                warn!(error = %e, "department directory unavailable");
                responder::degraded()
            }
        }
    }

    fn degraded(
        &self,
        classification: &Classification,
        context: SessionContext,
    ) -> (TurnResponse, SessionContext) {
        let response = TurnResponse::from_classification(classification, responder::degraded())
            .with_error_code("SERVICE_UNAVAILABLE");
        (response, context)
    }

    fn system_error(&self, context: &SessionContext, error: DialogError) -> (TurnResponse, SessionContext) {
        warn!(session_id = %context.session_id, error = %error, code = error.code(), "turn failed");
        let response = TurnResponse::new(SYSTEM_ERROR_INTENT, 0.0, HashMap::new(), responder::degraded())
            .with_error_code(error.code());
        (response, context.with_flow(None))
    }

    async fn log(&self, message: NewMessage) {
        let session_id = message.session_id.clone();
        if let Err(e) = self.store.append_message(message).await {
            warn!(session_id = %session_id, error = %e, "failed to log message");
        }
    }
}

/// Short messages only, so a complaint that mentions "stop" still reaches
/// the flow.
fn is_cancel_request(text: &str) -> bool {
    let normalized = normalize(text);
    normalized.split_whitespace().count() <= MAX_CANCEL_WORDS
        && CANCEL_PHRASES.iter().any(|p| contains_phrase(&normalized, p))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cancel_phrases_match_whole_words() {
        assert!(is_cancel_request("Cancel"));
        assert!(is_cancel_request("please stop"));
        assert!(is_cancel_request("never mind, start over"));
        assert!(!is_cancel_request("the bus stops nearby"));
        assert!(!is_cancel_request("the tap in my bathroom will not stop dripping"));
        assert!(!is_cancel_request("dlx-201"));
    }
}
