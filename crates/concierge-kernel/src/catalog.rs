//! Intent catalog.
//!
//! An [`IntentCatalog`] is the static, ordered list of [`IntentDefinition`]s
//! the classifier scores against.  Declaration order is significant: when
//! two intents reach the same confidence, the one declared first wins.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::error::{KernelError, Result};

// ---------------------------------------------------------------------------
// Module
// ---------------------------------------------------------------------------

/// The functional area that owns an intent.
///
/// Response routing matches exhaustively on this enum, so adding a module is
/// a compile-time-checked change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Module {
    /// Canned answers from the FAQ table.
    Faq,
    /// Hand-off to staff and complaint handling.
    Support,
    /// Billing and pricing questions.
    Payment,
    /// Room availability and reservations.
    Booking,
    /// Room service and dining.
    Food,
    /// Spa, pool, gym and other facilities.
    Amenity,
    /// Greetings, thanks, help and anything without a domain.
    General,
}

impl Module {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Faq => "faq",
            Self::Support => "support",
            Self::Payment => "payment",
            Self::Booking => "booking",
            Self::Food => "food",
            Self::Amenity => "amenity",
            Self::General => "general",
        }
    }
}

impl std::fmt::Display for Module {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// IntentDefinition
// ---------------------------------------------------------------------------

/// A single classifiable intent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntentDefinition {
    /// Intent name as reported to callers (e.g. `CheckRoomAvailability`).
    pub name: String,
    /// Trigger phrases, lowercase.
    pub patterns: Vec<String>,
    /// Multiplier applied per matched pattern.
    pub weight: f64,
    /// Confidence reported for a single weak match.
    pub base_confidence: f64,
    pub module: Module,
}

impl IntentDefinition {
    /// Build a definition; patterns are lowercased.
    pub fn new(
        name: impl Into<String>,
        module: Module,
        base_confidence: f64,
        weight: f64,
        patterns: &[&str],
    ) -> Self {
        Self {
            name: name.into(),
            patterns: patterns.iter().map(|p| p.trim().to_lowercase()).collect(),
            weight,
            base_confidence,
            module,
        }
    }

    fn validate(&self) -> Result<()> {
        let invalid = |reason: &str| KernelError::InvalidIntent {
            name: self.name.clone(),
            reason: reason.to_string(),
        };

        if self.name.trim().is_empty() {
            return Err(invalid("name is empty"));
        }
        if self.patterns.is_empty() || self.patterns.iter().any(|p| p.is_empty()) {
            return Err(invalid("patterns must be non-empty"));
        }
        if !(0.0..=1.0).contains(&self.base_confidence) {
            return Err(invalid("base confidence must be within [0, 1]"));
        }
        if !self.weight.is_finite() || self.weight < 0.0 {
            return Err(invalid("weight must be a finite, non-negative number"));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// IntentCatalog
// ---------------------------------------------------------------------------

/// Ordered, validated set of intent definitions.
#[derive(Debug, Clone)]
pub struct IntentCatalog {
    intents: Vec<IntentDefinition>,
}

impl IntentCatalog {
    /// Validate and wrap a list of definitions.
    pub fn new(intents: Vec<IntentDefinition>) -> Result<Self> {
        let mut seen = HashSet::new();
        for intent in &intents {
            intent.validate()?;
            if !seen.insert(intent.name.as_str()) {
                return Err(KernelError::DuplicateIntent {
                    name: intent.name.clone(),
                });
            }
        }
        Ok(Self { intents })
    }

    /// The built-in hotel assistant catalog.
    pub fn hospitality() -> Self {
        Self {
            intents: hospitality_intents(),
        }
    }

    pub fn intents(&self) -> &[IntentDefinition] {
        &self.intents
    }

    pub fn get(&self, name: &str) -> Option<&IntentDefinition> {
        self.intents.iter().find(|i| i.name == name)
    }

    /// Owning module of a catalog intent.
    pub fn module_of(&self, name: &str) -> Option<Module> {
        self.get(name).map(|i| i.module)
    }

    pub fn len(&self) -> usize {
        self.intents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.intents.is_empty()
    }
}

fn hospitality_intents() -> Vec<IntentDefinition> {
    use Module::*;

    vec![
        IntentDefinition::new(
            "CheckRoomAvailability",
            Booking,
            0.8,
            1.0,
            &[
                "room availability",
                "rooms available",
                "available rooms",
                "any rooms",
                "rooms for tonight",
                "do you have rooms",
                "vacancy",
                "vacancies",
                "free rooms",
                "show me rooms",
            ],
        ),
        IntentDefinition::new(
            "BookRoom",
            Booking,
            0.8,
            1.0,
            &[
                "book a room",
                "reserve a room",
                "make a reservation",
                "room reservation",
                "book room",
                "i want to stay",
                "booking a room",
            ],
        ),
        IntentDefinition::new(
            "RequestRoomService",
            Food,
            0.75,
            1.0,
            &[
                "room service",
                "breakfast",
                "lunch",
                "dinner",
                "menu",
                "hungry",
                "something to eat",
            ],
        ),
        IntentDefinition::new(
            "PlaceOrder",
            Food,
            0.8,
            1.0,
            &[
                "place an order",
                "i want to order",
                "order food",
                "order breakfast",
                "order lunch",
                "order dinner",
            ],
        ),
        IntentDefinition::new(
            "BookSpa",
            Amenity,
            0.8,
            1.0,
            &[
                "book a massage",
                "spa appointment",
                "spa reservation",
                "book spa",
                "book a spa",
                "massage",
                "facial",
                "spa treatment",
            ],
        ),
        IntentDefinition::new(
            "AmenityInfo",
            Amenity,
            0.75,
            0.8,
            &[
                "amenities",
                "facilities",
                "what services",
                "gym",
                "fitness center",
                "spa services",
                "shuttle",
            ],
        ),
        IntentDefinition::new(
            "FileComplaint",
            Support,
            0.8,
            1.0,
            &[
                "complaint",
                "complain",
                "not working",
                "broken",
                "problem with",
                "issue with",
                "unhappy",
                "dirty",
                "leaking",
                "speak to a manager",
            ],
        ),
        IntentDefinition::new(
            "ContactSupport",
            Support,
            0.75,
            1.0,
            &[
                "contact",
                "speak to someone",
                "talk to a human",
                "front desk",
                "reception",
                "phone number",
            ],
        ),
        IntentDefinition::new(
            "PaymentInquiry",
            Payment,
            0.75,
            1.0,
            &[
                "payment",
                "pay by",
                "pay with",
                "credit card",
                "invoice",
                "my bill",
                "deposit",
            ],
        ),
        IntentDefinition::new(
            "HotelFaq",
            Faq,
            0.75,
            1.0,
            &[
                "check-in",
                "check in",
                "check-out",
                "check out",
                "wifi",
                "internet",
                "parking",
                "pets",
                "pet policy",
                "cancellation policy",
                "breakfast served",
                "what time",
                "pool",
            ],
        ),
        IntentDefinition::new(
            "Help",
            General,
            0.8,
            1.0,
            &["help", "what can you do", "options", "assist me"],
        ),
        IntentDefinition::new(
            "Greeting",
            General,
            0.85,
            0.5,
            &["hello", "hi", "hey", "good morning", "good afternoon", "good evening"],
        ),
        IntentDefinition::new(
            "Thanks",
            General,
            0.85,
            0.5,
            &["thank you", "thanks", "appreciate it", "cheers"],
        ),
        IntentDefinition::new(
            "Goodbye",
            General,
            0.85,
            0.5,
            &["goodbye", "bye", "see you", "good night"],
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hospitality_catalog_is_valid() {
        let catalog = IntentCatalog::new(hospitality_intents()).expect("built-in catalog valid");
        assert_eq!(catalog.len(), IntentCatalog::hospitality().len());
        assert_eq!(catalog.module_of("BookRoom"), Some(Module::Booking));
        assert_eq!(catalog.module_of("nope"), None);
    }

    #[test]
    fn patterns_are_lowercased() {
        let def = IntentDefinition::new("X", Module::General, 0.5, 1.0, &["  Hello There "]);
        assert_eq!(def.patterns, vec!["hello there"]);
    }

    #[test]
    fn duplicate_names_rejected() {
        let a = IntentDefinition::new("A", Module::General, 0.5, 1.0, &["a"]);
        let result = IntentCatalog::new(vec![a.clone(), a]);
        assert!(matches!(result, Err(KernelError::DuplicateIntent { .. })));
    }

    #[test]
    fn out_of_range_confidence_rejected() {
        let bad = IntentDefinition::new("A", Module::General, 1.5, 1.0, &["a"]);
        assert!(matches!(
            IntentCatalog::new(vec![bad]),
            Err(KernelError::InvalidIntent { .. })
        ));
    }

    #[test]
    fn empty_pattern_list_rejected() {
        let bad = IntentDefinition::new("A", Module::General, 0.5, 1.0, &[]);
        assert!(IntentCatalog::new(vec![bad]).is_err());
    }

    #[test]
    fn module_names_are_snake_case() {
        assert_eq!(Module::Faq.to_string(), "faq");
        assert_eq!(serde_json::to_string(&Module::Amenity).unwrap(), "\"amenity\"");
    }
}
