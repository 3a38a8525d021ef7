//! Text normalization.
//!
//! Guest input is lowercased, whitespace-collapsed, and run through a fixed
//! dictionary of hospitality-domain misspellings before any matching
//! happens.  The helpers in this module ([`words`], [`contains_phrase`]) are
//! shared by the classifier and the entity extractor so both see the same
//! token boundaries.

use std::sync::LazyLock;

use regex::{Captures, Regex};

/// Known misspelling → canonical replacement, matched on whole words.
static CORRECTIONS: &[(&str, &str)] = &[
    ("brekfast", "breakfast"),
    ("breakfst", "breakfast"),
    ("breakfeast", "breakfast"),
    ("lunchh", "lunch"),
    ("diner", "dinner"),
    ("resturant", "restaurant"),
    ("restaraunt", "restaurant"),
    ("reservaton", "reservation"),
    ("resevation", "reservation"),
    ("reservtion", "reservation"),
    ("bookin", "booking"),
    ("avaliable", "available"),
    ("availble", "available"),
    ("availabilty", "availability"),
    ("accomodation", "accommodation"),
    ("amenites", "amenities"),
    ("ammenities", "amenities"),
    ("masage", "massage"),
    ("massge", "massage"),
    ("tomorow", "tomorrow"),
    ("tommorow", "tomorrow"),
    ("tommorrow", "tomorrow"),
    ("tonite", "tonight"),
    ("2night", "tonight"),
    ("chek", "check"),
    ("checkin", "check-in"),
    ("checkout", "check-out"),
    ("wi-fi", "wifi"),
    ("wify", "wifi"),
    ("pasword", "password"),
    ("parkng", "parking"),
    ("towles", "towels"),
    ("complant", "complaint"),
    ("recieve", "receive"),
    ("pirce", "price"),
    ("prise", "price"),
    ("rm", "room"),
    ("plz", "please"),
    ("pls", "please"),
    ("thx", "thanks"),
    ("ty", "thank you"),
    ("u", "you"),
    ("ur", "your"),
];

static CORRECTION_RE: LazyLock<Regex> = LazyLock::new(|| {
    let alternation = CORRECTIONS
        .iter()
        .map(|(wrong, _)| regex::escape(wrong))
        .collect::<Vec<_>>()
        .join("|");
    Regex::new(&format!(r"\b(?:{alternation})\b")).expect("correction dictionary is a valid regex")
});

/// Lowercase, collapse whitespace and apply spelling corrections.
///
/// Pure and infallible: input with nothing to correct comes back lowercased
/// and trimmed.
pub fn normalize(text: &str) -> String {
    let collapsed = text
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase();

    CORRECTION_RE
        .replace_all(&collapsed, |caps: &Captures<'_>| {
            let found = &caps[0];
            CORRECTIONS
                .iter()
                .find(|(wrong, _)| *wrong == found)
                .map(|(_, right)| (*right).to_string())
                .unwrap_or_else(|| found.to_string())
        })
        .into_owned()
}

/// Split text into words, stripping leading/trailing punctuation.
///
/// Inner hyphens and apostrophes survive (`check-in`, `don't`).
pub fn words(text: &str) -> Vec<&str> {
    text.split_whitespace()
        .map(|w| w.trim_matches(|c: char| !c.is_alphanumeric()))
        .filter(|w| !w.is_empty())
        .collect()
}

/// Whether `phrase` occurs in `text` on word boundaries.
pub fn contains_phrase(text: &str, phrase: &str) -> bool {
    if phrase.is_empty() {
        return false;
    }
    text.match_indices(phrase)
        .any(|(start, _)| on_word_boundary(text, start, start + phrase.len()))
}

/// Whether the byte span `[start, end)` of `text` is delimited by
/// non-alphanumeric characters (or the ends of the string).
pub fn on_word_boundary(text: &str, start: usize, end: usize) -> bool {
    let before_ok = text[..start]
        .chars()
        .next_back()
        .is_none_or(|c| !c.is_alphanumeric());
    let after_ok = text[end..]
        .chars()
        .next()
        .is_none_or(|c| !c.is_alphanumeric());
    before_ok && after_ok
}
