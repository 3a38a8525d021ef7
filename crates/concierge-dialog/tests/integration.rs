//! End-to-end conversations through the turn pipeline.

use std::sync::Arc;

use async_trait::async_trait;

use concierge_dialog::{
    ActionToken, Concierge, EngineConfig, FlowStatus, ResponseType, TurnOutcome,
};
use concierge_kernel::SessionContext;
use concierge_store::{
    Amenity, ContentCatalog, Department, FaqEntry, InMemoryMessageStore, MenuItem, MessageStore,
    NewMessage, Room, Sender, StaticCatalog, StoreError, StoreResult, StoredMessage,
};

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

fn concierge_with_store(store: Arc<InMemoryMessageStore>) -> Concierge {
    Concierge::new(
        EngineConfig::default(),
        Arc::new(StaticCatalog::hotel_defaults()),
        store,
    )
    .expect("built-in catalog and flows are valid")
}

fn concierge() -> Concierge {
    concierge_with_store(Arc::new(InMemoryMessageStore::new()))
}

/// Run a sequence of guest messages and return every outcome.
async fn converse(concierge: &Concierge, inputs: &[&str]) -> Vec<TurnOutcome> {
    let mut ctx = concierge.start_session().await;
    let mut outcomes = Vec::new();
    for input in inputs {
        let outcome = concierge.handle_turn(&ctx, input).await;
        ctx = outcome.context.clone();
        outcomes.push(outcome);
    }
    outcomes
}

struct DownCatalog;

impl ContentCatalog for DownCatalog {
    fn rooms(&self) -> StoreResult<Vec<Room>> {
        Err(StoreError::Unavailable("catalog offline".into()))
    }
    fn menu(&self) -> StoreResult<Vec<MenuItem>> {
        Err(StoreError::Unavailable("catalog offline".into()))
    }
    fn amenities(&self) -> StoreResult<Vec<Amenity>> {
        Err(StoreError::Unavailable("catalog offline".into()))
    }
    fn departments(&self) -> StoreResult<Vec<Department>> {
        Err(StoreError::Unavailable("catalog offline".into()))
    }
    fn faqs(&self) -> StoreResult<Vec<FaqEntry>> {
        Err(StoreError::Unavailable("catalog offline".into()))
    }
}

struct DownStore;

#[async_trait]
impl MessageStore for DownStore {
    async fn create_session(&self) -> StoreResult<String> {
        Err(StoreError::Unavailable("store offline".into()))
    }
    async fn append_message(&self, _message: NewMessage) -> StoreResult<()> {
        Err(StoreError::Unavailable("store offline".into()))
    }
    async fn messages(&self, _session_id: &str) -> StoreResult<Vec<StoredMessage>> {
        Err(StoreError::Unavailable("store offline".into()))
    }
}

// ---------------------------------------------------------------------------
// Classification scenarios
// ---------------------------------------------------------------------------

#[tokio::test]
async fn rooms_for_tonight_shows_rooms() {
    let outcomes = converse(&concierge(), &["Hi, any rooms for tonight?"]).await;
    let turn = &outcomes[0];
    let r = &turn.response;

    assert_eq!(r.intent, "CheckRoomAvailability");
    assert!(r.confidence >= 0.8);
    assert_eq!(r.entities.get("date").map(String::as_str), Some("tonight"));
    assert_eq!(r.response_type, ResponseType::Action);
    assert_eq!(r.action, Some(ActionToken::ShowRooms));

    let rooms = r.response_data.as_ref().unwrap()["rooms"].as_array().unwrap();
    assert!(!rooms.is_empty());
    assert!(rooms.iter().all(|room| room["available"] == true));
    assert_eq!(turn.context.last_intent(), Some("CheckRoomAvailability"));
}

#[tokio::test]
async fn do_you_have_any_rooms_for_tonight_is_high_confidence() {
    let outcomes = converse(&concierge(), &["Do you have any rooms for tonight?"]).await;
    let r = &outcomes[0].response;

    assert_eq!(r.intent, "CheckRoomAvailability");
    assert!(r.confidence >= 0.9, "confidence {}", r.confidence);
    assert_eq!(r.entities.get("date").map(String::as_str), Some("tonight"));
    assert_eq!(r.action, Some(ActionToken::ShowRooms));
}

#[tokio::test]
async fn misspelled_breakfast_menu_shows_breakfast_items() {
    let outcomes = converse(&concierge(), &["brekfast menu plz"]).await;
    let turn = &outcomes[0];
    let r = &turn.response;

    assert_eq!(r.intent, "RequestRoomService");
    assert_eq!(r.entities.get("meal").map(String::as_str), Some("breakfast"));
    assert_eq!(r.action, Some(ActionToken::ShowMenu));

    let items = r.response_data.as_ref().unwrap()["items"].as_array().unwrap();
    assert_eq!(items.len(), 2);
    assert!(items.iter().all(|i| i["category"] == "breakfast"));
}

#[tokio::test]
async fn price_filter_narrows_rooms() {
    let outcomes = converse(&concierge(), &["show me rooms under $150"]).await;
    let turn = &outcomes[0];
    let rooms = turn.response.response_data.as_ref().unwrap()["rooms"]
        .as_array()
        .unwrap()
        .clone();
    let ids: Vec<&str> = rooms.iter().map(|r| r["id"].as_str().unwrap()).collect();
    assert_eq!(ids, vec!["std-101", "std-102"]);
}

#[tokio::test]
async fn three_garbled_messages_escalate() {
    let outcomes = converse(&concierge(), &["asdfghjkl", "qwertyuiop", "zxcvbnm"]).await;

    let types: Vec<ResponseType> = outcomes.iter().map(|o| o.response.response_type).collect();
    assert_eq!(
        types,
        vec![ResponseType::Fallback, ResponseType::Fallback, ResponseType::Escalation]
    );
    assert!(outcomes[1].response.response_text.contains("1. "));

    let last = &outcomes[2];
    assert_eq!(last.context.fallback_count, 3);
    assert_eq!(last.response.action, Some(ActionToken::ShowContactSupport));
    let departments = last.response.response_data.as_ref().unwrap()["departments"]
        .as_array()
        .unwrap();
    assert!(departments.iter().any(|d| d["name"] == "Front Desk"));
}

#[tokio::test]
async fn confident_intent_resets_escalation() {
    let outcomes = converse(&concierge(), &["asdfghjkl", "qwertyuiop", "zxcvbnm", "hello"]).await;
    let last = &outcomes[3];
    assert_eq!(last.response.intent, "Greeting");
    assert_eq!(last.response.response_type, ResponseType::Text);
    assert_eq!(last.context.fallback_count, 0);
}

#[tokio::test]
async fn faq_question_is_answered() {
    let outcomes = converse(&concierge(), &["What time is check-in?"]).await;
    let turn = &outcomes[0];
    assert_eq!(turn.response.intent, "HotelFaq");
    assert_eq!(turn.response.response_type, ResponseType::Text);
    assert!(turn.response.response_text.starts_with("Check-in starts at 3:00 pm"));
}

#[tokio::test]
async fn pricing_follow_up_shows_rooms() {
    let outcomes = converse(&concierge(), &["any rooms available?", "how much?"]).await;
    let r = &outcomes[1].response;
    assert_eq!(r.intent, "PricingFollowUp");
    assert_eq!(
        r.entities.get("context_intent").map(String::as_str),
        Some("CheckRoomAvailability")
    );
    assert_eq!(r.action, Some(ActionToken::ShowRooms));
}

#[tokio::test]
async fn amenity_info_lists_every_amenity() {
    let concierge = concierge();
    let outcomes = converse(&concierge, &["what spa services do you have"]).await;
    let r = &outcomes[0].response;
    assert_eq!(r.intent, "AmenityInfo");
    assert_eq!(r.action, Some(ActionToken::ShowAmenities));
    let amenities = r.response_data.as_ref().unwrap()["amenities"].as_array().unwrap();
    assert_eq!(amenities.len(), 7);
}

// ---------------------------------------------------------------------------
// Input validation
// ---------------------------------------------------------------------------

#[tokio::test]
async fn empty_and_oversized_input_are_rejected() {
    let concierge = concierge();
    let ctx = SessionContext {
        fallback_count: 1,
        ..concierge.start_session().await
    };

    let empty = concierge.handle_turn(&ctx, "   ").await;
    assert_eq!(empty.response.error_code.as_deref(), Some("EMPTY_INPUT"));
    assert_eq!(empty.response.response_type, ResponseType::Error);
    assert_eq!(empty.context.fallback_count, 1);

    let long = concierge.handle_turn(&ctx, &"a".repeat(1001)).await;
    assert_eq!(long.response.error_code.as_deref(), Some("INPUT_TOO_LONG"));
    assert_eq!(long.context.fallback_count, 1);
}

// ---------------------------------------------------------------------------
// Flows
// ---------------------------------------------------------------------------

#[tokio::test]
async fn unknown_room_keeps_the_booking_step() {
    let concierge = concierge();
    let outcomes = converse(&concierge, &["I'd like to book a room", "xyz-999"]).await;

    let start = &outcomes[0];
    assert_eq!(start.response.intent, "BookRoom");
    assert_eq!(start.response.response_type, ResponseType::Flow);
    assert!(start.response.response_text.contains("Which room"));
    let instance_id = start.context.current_flow_id.clone().expect("flow started");

    let retry = &outcomes[1];
    assert_eq!(retry.response.intent, "flow:room_booking");
    assert_eq!(retry.response.error_code.as_deref(), Some("ROOM_NOT_AVAILABLE"));
    assert_eq!(
        retry.response.response_data.as_ref().unwrap()["next_step"],
        "room_selection"
    );
    assert_eq!(retry.context.current_flow_id.as_deref(), Some(instance_id.as_str()));

    let instance = concierge.engine().get(&instance_id).unwrap();
    assert_eq!(instance.step_index, 0);
    assert_eq!(instance.metadata.retry_count, 1);
}

#[tokio::test]
async fn completed_booking_fills_slots() {
    let concierge = concierge();
    let outcomes = converse(
        &concierge,
        &[
            "book a room",
            "dlx-201",
            "12/24",
            "3",
            "2",
            "Ada Lovelace",
            "ada@example.com",
            "yes",
        ],
    )
    .await;

    let last = outcomes.last().unwrap();
    assert_eq!(last.response.response_type, ResponseType::Flow);
    assert_eq!(last.response.response_data.as_ref().unwrap()["completed"], true);
    assert!(last.response.response_text.contains("PAY-"));

    let ctx = &last.context;
    assert!(ctx.current_flow_id.is_none());
    assert_eq!(ctx.slots.guest_name.as_deref(), Some("Ada Lovelace"));
    assert_eq!(ctx.slots.room_type.as_deref(), Some("deluxe"));
    assert!(ctx.slots.dates.is_some());

    // Next message is classified again.
    let next = concierge.handle_turn(ctx, "thanks").await;
    assert_eq!(next.response.intent, "Thanks");
}

#[tokio::test]
async fn retry_exhaustion_escalates() {
    let concierge = concierge();
    let outcomes =
        converse(&concierge, &["book a room", "xyz-999", "xyz-999", "xyz-999"]).await;

    let last = outcomes.last().unwrap();
    assert_eq!(last.response.response_type, ResponseType::Escalation);
    assert_eq!(last.response.error_code.as_deref(), Some("MAX_RETRIES_EXCEEDED"));
    assert_eq!(last.response.action, Some(ActionToken::ShowContactSupport));
    assert!(last.context.current_flow_id.is_none());

    let instance_id = outcomes[0].context.current_flow_id.clone().unwrap();
    assert_eq!(
        concierge.engine().get(&instance_id).unwrap().status,
        FlowStatus::Error
    );
}

#[tokio::test]
async fn cancel_abandons_the_flow() {
    let concierge = concierge();
    let outcomes = converse(&concierge, &["book a massage", "cancel"]).await;

    let instance_id = outcomes[0].context.current_flow_id.clone().unwrap();
    assert!(instance_id.starts_with("spa_booking:"));

    let cancelled = &outcomes[1];
    assert_eq!(cancelled.response.intent, "flow:spa_booking");
    assert!(cancelled.response.response_text.contains("cancelled"));
    assert!(cancelled.context.current_flow_id.is_none());
    assert_eq!(
        concierge.engine().get(&instance_id).unwrap().status,
        FlowStatus::Cancelled
    );
}

#[tokio::test]
async fn swept_instance_falls_back_to_classification() {
    let concierge = concierge();
    let outcomes = converse(&concierge, &["order food"]).await;
    let ctx = outcomes[0].context.clone();
    assert!(ctx.current_flow_id.is_some());

    let later = chrono::Utc::now() + chrono::Duration::hours(1);
    assert_eq!(concierge.engine().sweep_expired(later), 1);

    let turn = concierge.handle_turn(&ctx, "hello").await;
    assert_eq!(turn.response.intent, "Greeting");
    assert!(turn.context.current_flow_id.is_none());
}

#[tokio::test]
async fn complaint_flow_logs_a_ticket() {
    let outcomes = converse(
        &concierge(),
        &[
            "I want to file a complaint",
            "The shower in my room is broken",
            "305",
            "high",
            "555-123-4567",
        ],
    )
    .await;
    let last = outcomes.last().unwrap();
    assert!(last.response.response_text.contains("TKT-"));
    assert_eq!(last.context.slots.room_number.as_deref(), Some("305"));
}

// ---------------------------------------------------------------------------
// Collaborators
// ---------------------------------------------------------------------------

#[tokio::test]
async fn every_turn_is_logged() {
    let store = Arc::new(InMemoryMessageStore::new());
    let concierge = concierge_with_store(Arc::clone(&store));
    let mut ctx = concierge.start_session().await;
    for input in ["hello", "any rooms for tonight?"] {
        ctx = concierge.handle_turn(&ctx, input).await.context;
    }
    assert_eq!(ctx.visit_count, 2);

    let messages = store.messages(&ctx.session_id).await.unwrap();
    assert_eq!(messages.len(), 4);
    assert_eq!(messages[0].sender, Sender::Guest);
    assert_eq!(messages[1].sender, Sender::Bot);
    assert_eq!(messages[1].intent.as_deref(), Some("Greeting"));
    assert_eq!(store.session_count(), 1);
}

#[tokio::test]
async fn store_outage_does_not_break_the_conversation() {
    let concierge = Concierge::new(
        EngineConfig::default(),
        Arc::new(StaticCatalog::hotel_defaults()),
        Arc::new(DownStore),
    )
    .unwrap();
    let ctx = concierge.start_session().await;
    assert!(!ctx.session_id.is_empty());

    let turn = concierge.handle_turn(&ctx, "hello").await;
    assert_eq!(turn.response.intent, "Greeting");
}

#[tokio::test]
async fn catalog_outage_degrades_to_contact_support() {
    let concierge = Concierge::new(
        EngineConfig::default(),
        Arc::new(DownCatalog),
        Arc::new(InMemoryMessageStore::new()),
    )
    .unwrap();
    let ctx = concierge.start_session().await;

    let turn = concierge.handle_turn(&ctx, "any rooms for tonight?").await;
    assert_eq!(turn.response.error_code.as_deref(), Some("SERVICE_UNAVAILABLE"));
    assert_eq!(turn.response.action, Some(ActionToken::ShowContactSupport));
    assert!(turn.response.response_text.contains("front desk"));

    let turn = concierge.handle_turn(&ctx, "What time is check-in?").await;
    assert_eq!(turn.response.error_code.as_deref(), Some("SERVICE_UNAVAILABLE"));
}
