//! Response routing.
//!
//! Maps a classification to a [`ResponseDescriptor`]: what kind of reply to
//! render, its text, and an optional UI action token with filter data.  The
//! router never fetches anything; the turn pipeline enriches action
//! responses from the catalog afterwards.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

use concierge_kernel::normalizer::contains_phrase;
use concierge_kernel::{Classification, DECLINE, FALLBACK, Module, PRICING_FOLLOW_UP};
use concierge_store::{Department, FaqEntry};

use crate::policy::InputRejection;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseType {
    Text,
    Action,
    Flow,
    Fallback,
    Escalation,
    Error,
}

/// UI action a client renders alongside the text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionToken {
    ShowRooms,
    ShowMenu,
    ShowAmenities,
    ShowContactSupport,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseDescriptor {
    pub response_type: ResponseType,
    pub text: String,
    pub action: Option<ActionToken>,
    pub data: Option<Value>,
}

impl ResponseDescriptor {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            response_type: ResponseType::Text,
            text: text.into(),
            action: None,
            data: None,
        }
    }

    pub fn action(action: ActionToken, text: impl Into<String>, data: Option<Value>) -> Self {
        Self {
            response_type: ResponseType::Action,
            text: text.into(),
            action: Some(action),
            data,
        }
    }

    fn with_type(mut self, response_type: ResponseType) -> Self {
        self.response_type = response_type;
        self
    }
}

/// Menu categories offered on repeated fallbacks.
pub const MENU_CATEGORIES: &[&str] = &[
    "Room availability and booking",
    "Room service and dining",
    "Spa and amenities",
    "Hotel information (check-in, wifi, parking)",
    "Billing and payments",
    "Speak to our staff",
];

// ═══════════════════════════════════════════════════════════════════════
//  Routing
// ═══════════════════════════════════════════════════════════════════════

/// Build the reply for a confidently classified intent.
///
/// `faqs` is only consulted for [`Module::Faq`].
pub fn route(classification: &Classification, faqs: &[FaqEntry]) -> ResponseDescriptor {
    let intent = classification.intent.as_str();
    match classification.module {
        Module::Faq => match find_faq(&classification.normalized_text, faqs) {
            Some(hit) => ResponseDescriptor {
                response_type: ResponseType::Text,
                text: hit.entry.answer.clone(),
                action: None,
                data: Some(json!({
                    "category": hit.entry.category,
                    "question": hit.entry.question,
                    "score": hit.score,
                })),
            },
            None => ResponseDescriptor::text(
                "I don't have that information to hand, but our front desk (ext. 0) will be happy to help.",
            ),
        },
        Module::Booking => ResponseDescriptor::action(
            ActionToken::ShowRooms,
            "Here are the rooms we have available:",
            filters(classification, &["max_price", "room_type", "guests", "date"]),
        ),
        Module::Food => ResponseDescriptor::action(
            ActionToken::ShowMenu,
            "Here's our in-room dining menu:",
            filters(classification, &["meal"]),
        ),
        Module::Amenity => {
            if intent == "BookSpa" {
                ResponseDescriptor::action(
                    ActionToken::ShowAmenities,
                    "Here are our spa treatments:",
                    Some(json!({ "category": "spa" })),
                )
            } else {
                ResponseDescriptor::action(
                    ActionToken::ShowAmenities,
                    "Here's what the hotel offers:",
                    None,
                )
            }
        }
        Module::Support => {
            let text = if intent == "FileComplaint" {
                "I'm sorry about that. Our Guest Relations team can sort it out right away:"
            } else {
                "Here's how to reach our team:"
            };
            ResponseDescriptor::action(ActionToken::ShowContactSupport, text, None)
        }
        Module::Payment => payment_response(classification),
        Module::General => ResponseDescriptor::text(general_text(intent)),
    }
}

fn payment_response(classification: &Classification) -> ResponseDescriptor {
    if classification.intent != PRICING_FOLLOW_UP {
        return ResponseDescriptor::text(
            "We accept all major credit cards, debit cards and cash at the front desk. \
             A deposit is taken at check-in and your final bill is settled at check-out.",
        );
    }

    let previous = classification
        .entities
        .get("context_intent")
        .map(String::as_str)
        .unwrap_or_default();
    match previous {
        "CheckRoomAvailability" | "BookRoom" => ResponseDescriptor::action(
            ActionToken::ShowRooms,
            "Nightly rates depend on the room type. Here are our available rooms with prices:",
            filters(classification, &["max_price", "room_type", "guests"]),
        ),
        "RequestRoomService" | "PlaceOrder" => ResponseDescriptor::action(
            ActionToken::ShowMenu,
            "Every dish is listed with its price:",
            None,
        ),
        "BookSpa" => ResponseDescriptor::action(
            ActionToken::ShowAmenities,
            "Here are our spa treatments and their prices:",
            Some(json!({ "category": "spa" })),
        ),
        "AmenityInfo" => ResponseDescriptor::action(
            ActionToken::ShowAmenities,
            "Most facilities are free for guests. Paid services are listed with their prices:",
            None,
        ),
        _ => ResponseDescriptor::text(
            "For detailed pricing, our front desk (ext. 0) can give you an exact quote.",
        ),
    }
}

fn general_text(intent: &str) -> &'static str {
    match intent {
        "Greeting" => {
            "Hello and welcome! I can help with room bookings, dining, spa appointments \
             and anything else about your stay. How can I help?"
        }
        "Thanks" => "You're welcome! Is there anything else I can do for you?",
        "Goodbye" => "Goodbye, and enjoy your stay!",
        "Help" => {
            "I can check room availability and make bookings, order room service, \
             book spa treatments, answer questions about the hotel, and put you in \
             touch with our staff. What would you like to do?"
        }
        DECLINE => "No problem. Let me know if there's anything else I can help with.",
        FALLBACK => "I'm not sure I understood. Could you rephrase that?",
        _ => "How else can I help you today?",
    }
}

/// Copy the named entities into a JSON object, or `None` if none are set.
fn filters(classification: &Classification, keys: &[&str]) -> Option<Value> {
    let map: Map<String, Value> = keys
        .iter()
        .filter_map(|k| {
            classification
                .entities
                .get(*k)
                .map(|v| (k.to_string(), Value::String(v.clone())))
        })
        .collect();
    (!map.is_empty()).then_some(Value::Object(map))
}

// ═══════════════════════════════════════════════════════════════════════
//  FAQ lookup
// ═══════════════════════════════════════════════════════════════════════

pub const QUESTION_MATCH_SCORE: f64 = 0.95;
pub const KEYWORD_MATCH_SCORE: f64 = 0.85;

#[derive(Debug, Clone, PartialEq)]
pub struct FaqHit<'a> {
    pub entry: &'a FaqEntry,
    pub score: f64,
}

/// Find the best FAQ for `text`: a question match beats a keyword match,
/// and earlier entries win ties.
pub fn find_faq<'a>(text: &str, faqs: &'a [FaqEntry]) -> Option<FaqHit<'a>> {
    let query = strip_punctuation(text);
    if query.is_empty() {
        return None;
    }

    let mut best: Option<FaqHit<'a>> = None;
    for entry in faqs {
        let question = strip_punctuation(&entry.question.to_lowercase());
        let score = if question.contains(&query) || query.contains(&question) {
            QUESTION_MATCH_SCORE
        } else if entry
            .keywords
            .iter()
            .any(|k| contains_phrase(&query, &k.to_lowercase()))
        {
            KEYWORD_MATCH_SCORE
        } else {
            continue;
        };
        if best.as_ref().is_none_or(|b| score > b.score) {
            best = Some(FaqHit { entry, score });
        }
    }
    best
}

fn strip_punctuation(text: &str) -> String {
    text.trim()
        .trim_matches(|c: char| c.is_ascii_punctuation())
        .trim()
        .to_string()
}

// ═══════════════════════════════════════════════════════════════════════
//  Fallback, escalation and error replies
// ═══════════════════════════════════════════════════════════════════════

pub fn clarify() -> ResponseDescriptor {
    ResponseDescriptor::text(
        "I'm not quite sure what you mean. Are you asking about rooms, dining, \
         the spa, or something else?",
    )
    .with_type(ResponseType::Fallback)
}

pub fn menu() -> ResponseDescriptor {
    let lines: Vec<String> = MENU_CATEGORIES
        .iter()
        .enumerate()
        .map(|(i, c)| format!("{}. {c}", i + 1))
        .collect();
    ResponseDescriptor {
        response_type: ResponseType::Fallback,
        text: format!(
            "Sorry, I'm still not following. Here's what I can help with:\n{}",
            lines.join("\n")
        ),
        action: None,
        data: Some(json!({ "categories": MENU_CATEGORIES })),
    }
}

/// Hand-off to staff, listing department contacts.
pub fn escalation(departments: &[Department]) -> ResponseDescriptor {
    ResponseDescriptor {
        response_type: ResponseType::Escalation,
        text: "I'm sorry I couldn't help with that. Please reach out to one of our team \
               members directly and they'll take care of you:"
            .to_string(),
        action: Some(ActionToken::ShowContactSupport),
        data: Some(json!({ "departments": departments })),
    }
}

pub fn input_rejected(rejection: InputRejection) -> ResponseDescriptor {
    let text = match rejection {
        InputRejection::Empty => "It looks like your message was empty. How can I help you today?",
        InputRejection::TooLong => {
            "That message is a little long for me. Could you summarize what you need in a sentence or two?"
        }
    };
    ResponseDescriptor::text(text).with_type(ResponseType::Error)
}

/// Reply used when a collaborator (catalog, flow engine) fails.
pub fn degraded() -> ResponseDescriptor {
    ResponseDescriptor {
        response_type: ResponseType::Error,
        text: "Sorry, I can't look that up right now. Please contact our front desk \
               (ext. 0) and they'll help you straight away."
            .to_string(),
        action: Some(ActionToken::ShowContactSupport),
        data: None,
    }
}

pub fn flow_cancelled() -> ResponseDescriptor {
    ResponseDescriptor::text(
        "No problem, I've cancelled that. Is there anything else I can help with?",
    )
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use concierge_kernel::MatchSource;
    use concierge_store::{ContentCatalog, StaticCatalog};

    use super::*;

    fn classification(intent: &str, module: Module, text: &str) -> Classification {
        Classification {
            intent: intent.to_string(),
            module,
            confidence: 0.9,
            entities: HashMap::new(),
            source: MatchSource::Pattern,
            normalized_text: text.to_string(),
        }
    }

    fn faqs() -> Vec<FaqEntry> {
        StaticCatalog::hotel_defaults().faqs().unwrap()
    }

    #[test]
    fn faq_question_match_beats_keyword() {
        let faqs = faqs();
        let hit = find_faq("what time is check-out?", &faqs).unwrap();
        assert_eq!(hit.score, QUESTION_MATCH_SCORE);
        assert!(hit.entry.answer.contains("11:00 am"));

        let hit = find_faq("do you have a garage", &faqs).unwrap();
        assert_eq!(hit.score, KEYWORD_MATCH_SCORE);
        assert_eq!(hit.entry.question, "Is there parking?");

        assert!(find_faq("do you sell umbrellas", &faqs).is_none());
    }

    #[test]
    fn faq_without_answer_refers_to_front_desk() {
        let c = classification("HotelFaq", Module::Faq, "what time is the gala");
        let r = route(&c, &faqs());
        assert_eq!(r.response_type, ResponseType::Text);
        assert!(r.text.contains("front desk"));
    }

    #[test]
    fn modules_map_to_actions() {
        let cases = [
            ("CheckRoomAvailability", Module::Booking, Some(ActionToken::ShowRooms)),
            ("RequestRoomService", Module::Food, Some(ActionToken::ShowMenu)),
            ("AmenityInfo", Module::Amenity, Some(ActionToken::ShowAmenities)),
            ("ContactSupport", Module::Support, Some(ActionToken::ShowContactSupport)),
            ("PaymentInquiry", Module::Payment, None),
            ("Greeting", Module::General, None),
        ];
        for (intent, module, action) in cases {
            let r = route(&classification(intent, module, ""), &[]);
            assert_eq!(r.action, action, "{intent}");
        }
    }

    #[test]
    fn spa_requests_filter_amenities() {
        let r = route(&classification("BookSpa", Module::Amenity, ""), &[]);
        assert_eq!(r.data, Some(json!({ "category": "spa" })));
    }

    #[test]
    fn booking_filters_come_from_entities() {
        let mut c = classification("CheckRoomAvailability", Module::Booking, "");
        c.entities.insert("max_price".into(), "200".into());
        c.entities.insert("meal".into(), "dinner".into());
        let r = route(&c, &[]);
        assert_eq!(r.data, Some(json!({ "max_price": "200" })));
    }

    #[test]
    fn pricing_follow_up_uses_prior_intent() {
        let mut c = classification(PRICING_FOLLOW_UP, Module::Payment, "how much");
        c.entities.insert("context_intent".into(), "BookRoom".into());
        assert_eq!(route(&c, &[]).action, Some(ActionToken::ShowRooms));

        c.entities.insert("context_intent".into(), "Greeting".into());
        let r = route(&c, &[]);
        assert_eq!(r.action, None);
        assert!(r.text.contains("front desk"));
    }

    #[test]
    fn menu_is_numbered() {
        let r = menu();
        assert_eq!(r.response_type, ResponseType::Fallback);
        assert!(r.text.contains("1. Room availability"));
        assert!(r.text.contains(&format!("{}. ", MENU_CATEGORIES.len())));
    }

    #[test]
    fn escalation_lists_departments() {
        let departments = StaticCatalog::hotel_defaults().departments().unwrap();
        let r = escalation(&departments);
        assert_eq!(r.response_type, ResponseType::Escalation);
        assert_eq!(r.action, Some(ActionToken::ShowContactSupport));
        assert_eq!(r.data.unwrap()["departments"].as_array().unwrap().len(), departments.len());
    }

    #[test]
    fn action_tokens_serialize_snake_case() {
        assert_eq!(
            serde_json::to_string(&ActionToken::ShowContactSupport).unwrap(),
            "\"show_contact_support\""
        );
    }
}
