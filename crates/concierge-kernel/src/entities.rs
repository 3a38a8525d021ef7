//! Regex-based entity extraction.
//!
//! Rules run in a fixed order over normalized text.  Each rule writes one
//! entity key; when a rule matches several times the last match wins.

use std::collections::HashMap;
use std::sync::LazyLock;

use regex::Regex;

use crate::catalog::Module;

macro_rules! static_regex {
    ($name:ident, $pattern:expr) => {
        static $name: LazyLock<Regex> =
            LazyLock::new(|| Regex::new($pattern).expect("entity pattern is a valid regex"));
    };
}

static_regex!(
    RELATIVE_DATE,
    r"\b(tonight|this evening|tomorrow|(?:this |next )?weekend|next week)\b"
);
static_regex!(NUMERIC_DATE, r"\b(\d{1,2}[/-]\d{1,2}(?:[/-]\d{2,4})?)\b");
static_regex!(
    MONTH_DATE,
    r"\b(jan(?:uary)?|feb(?:ruary)?|mar(?:ch)?|apr(?:il)?|may|june?|july?|aug(?:ust)?|sep(?:t(?:ember)?)?|oct(?:ober)?|nov(?:ember)?|dec(?:ember)?)\s+(\d{1,2})(?:st|nd|rd|th)?\b"
);
static_regex!(
    ROOM_TYPE,
    r"\b(standard|deluxe|suite|family|presidential)\b"
);
static_regex!(
    BED_TYPE,
    r"\b(king|queen|twin|double|single)(?:[- ]size)?\s+beds?\b"
);
static_regex!(GUESTS, r"\b(\d+)\s*(?:guests?|persons?|people|adults?)\b");
static_regex!(MEAL, r"\b(breakfast|brunch|lunch|dinner|dessert|snack)\b");
static_regex!(TIME, r"\b(\d{1,2}):(\d{2})\s*(am|pm)\b");
static_regex!(
    ROOM_NUMBER,
    r"\broom\s*(?:number\s*|no\.?\s*|#\s*)?(\d{3,4})\b"
);
static_regex!(
    MAX_PRICE,
    r"\b(?:under|below|less than|max(?:imum)?|up to)\s*\$?\s*(\d+)\b"
);

/// Extract structured values from (normalized) guest text.
///
/// `module` is the owning module of the classified intent; meal entities are
/// only produced for food requests.
pub fn extract_entities(text: &str, module: Module) -> HashMap<String, String> {
    let mut entities = HashMap::new();

    // Dates: relative phrases first, explicit dates override.
    if let Some(m) = RELATIVE_DATE.captures_iter(text).last() {
        let raw = &m[1];
        let value = if raw.ends_with("weekend") {
            "weekend"
        } else if raw == "this evening" {
            "tonight"
        } else {
            raw
        };
        entities.insert("date".to_string(), value.to_string());
    }
    if let Some(m) = NUMERIC_DATE.captures_iter(text).last() {
        entities.insert("date".to_string(), m[1].to_string());
    }
    if let Some(m) = MONTH_DATE.captures_iter(text).last() {
        entities.insert("date".to_string(), format!("{} {}", &m[1], &m[2]));
    }

    if let Some(m) = ROOM_TYPE.captures_iter(text).last() {
        entities.insert("room_type".to_string(), m[1].to_string());
    }
    if let Some(m) = BED_TYPE.captures_iter(text).last() {
        entities.insert("bed_type".to_string(), m[1].to_string());
    }
    if let Some(m) = GUESTS.captures_iter(text).last() {
        entities.insert("guests".to_string(), m[1].to_string());
    }
    if module == Module::Food {
        if let Some(m) = MEAL.captures_iter(text).last() {
            entities.insert("meal".to_string(), m[1].to_string());
        }
    }
    if let Some(m) = TIME.captures_iter(text).last() {
        entities.insert("time".to_string(), format!("{}:{} {}", &m[1], &m[2], &m[3]));
    }
    if let Some(m) = ROOM_NUMBER.captures_iter(text).last() {
        entities.insert("room_number".to_string(), m[1].to_string());
    }
    if let Some(m) = MAX_PRICE.captures_iter(text).last() {
        entities.insert("max_price".to_string(), m[1].to_string());
    }

    if !entities.is_empty() {
        tracing::debug!(count = entities.len(), "entities extracted");
    }
    entities
}

#[cfg(test)]
mod tests {
    use super::*;

    fn get<'a>(e: &'a HashMap<String, String>, key: &str) -> Option<&'a str> {
        e.get(key).map(String::as_str)
    }

    #[test]
    fn relative_dates() {
        let e = extract_entities("any rooms for tonight", Module::Booking);
        assert_eq!(get(&e, "date"), Some("tonight"));

        let e = extract_entities("a suite next weekend", Module::Booking);
        assert_eq!(get(&e, "date"), Some("weekend"));
        assert_eq!(get(&e, "room_type"), Some("suite"));

        let e = extract_entities("something next week", Module::Booking);
        assert_eq!(get(&e, "date"), Some("next week"));
    }

    #[test]
    fn explicit_dates_override_relative_ones() {
        let e = extract_entities("tomorrow, i mean 12/24", Module::Booking);
        assert_eq!(get(&e, "date"), Some("12/24"));

        let e = extract_entities("arriving march 3rd", Module::Booking);
        assert_eq!(get(&e, "date"), Some("march 3"));
    }

    #[test]
    fn guests_beds_and_price() {
        let e = extract_entities(
            "a deluxe room with a king size bed for 2 adults under $200",
            Module::Booking,
        );
        assert_eq!(get(&e, "room_type"), Some("deluxe"));
        assert_eq!(get(&e, "bed_type"), Some("king"));
        assert_eq!(get(&e, "guests"), Some("2"));
        assert_eq!(get(&e, "max_price"), Some("200"));
    }

    #[test]
    fn meal_only_for_food_module() {
        let e = extract_entities("breakfast please", Module::Food);
        assert_eq!(get(&e, "meal"), Some("breakfast"));

        let e = extract_entities("when is breakfast served", Module::Faq);
        assert_eq!(get(&e, "meal"), None);
    }

    #[test]
    fn time_and_room_number() {
        let e = extract_entities("dinner to room 305 at 7:30 pm", Module::Food);
        assert_eq!(get(&e, "time"), Some("7:30 pm"));
        assert_eq!(get(&e, "room_number"), Some("305"));
        assert_eq!(get(&e, "meal"), Some("dinner"));

        let e = extract_entities("room #1204 is noisy", Module::Support);
        assert_eq!(get(&e, "room_number"), Some("1204"));
    }

    #[test]
    fn last_match_wins_within_a_category() {
        let e = extract_entities("a standard or maybe a suite", Module::Booking);
        assert_eq!(get(&e, "room_type"), Some("suite"));
    }

    #[test]
    fn nothing_to_extract() {
        assert!(extract_entities("hello there", Module::General).is_empty());
    }
}
