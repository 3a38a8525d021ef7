//! Intent classification.
//!
//! Scoring runs in three tiers:
//!
//! | Tier | Technique |
//! |------|-----------|
//! | 1 | Phrase containment via [`aho_corasick`], accepted on word boundaries |
//! | 1 | Fuzzy token match (Levenshtein) for out-of-vocabulary words |
//! | 2 | Context follow-ups (pricing, affirmation, negation) |
//! | 3 | `fallback` at confidence 0.1 |
//!
//! Tier 1 counts matched patterns per intent; confidence grows with the
//! count and is capped at [`MAX_CONFIDENCE`].  Tier 2 only runs when no
//! pattern matched anywhere.

use std::collections::{HashMap, HashSet};

use aho_corasick::AhoCorasick;
use serde::{Deserialize, Serialize};

use crate::catalog::{IntentCatalog, Module};
use crate::context::SessionContext;
use crate::entities::extract_entities;
use crate::error::{KernelError, Result};
use crate::normalizer::{contains_phrase, normalize, on_word_boundary, words};

/// Name reported when nothing matched.
pub const FALLBACK: &str = "fallback";
/// Short negative answer to a previous prompt.
pub const DECLINE: &str = "Decline";
/// Price question about whatever was discussed last.
pub const PRICING_FOLLOW_UP: &str = "PricingFollowUp";

pub const FALLBACK_CONFIDENCE: f64 = 0.1;
pub const MAX_CONFIDENCE: f64 = 0.98;
const PRICING_CONFIDENCE: f64 = 0.85;
const AFFIRMATION_CONFIDENCE: f64 = 0.90;
const DECLINE_CONFIDENCE: f64 = 0.88;

/// Follow-up answers longer than this are not treated as yes/no.
const MAX_SHORT_REPLY_WORDS: usize = 4;

const PRICE_WORDS: &[&str] = &[
    "price", "prices", "cost", "costs", "how much", "rate", "rates", "fee", "charge", "expensive",
    "cheap",
];

const AFFIRMATIONS: &[&str] = &[
    "yes", "yeah", "yep", "yup", "ok", "okay", "sure", "of course", "please do", "sounds good",
    "go ahead", "absolutely", "definitely", "alright",
];

const NEGATIONS: &[&str] = &[
    "no",
    "nope",
    "nah",
    "no thanks",
    "no thank you",
    "not now",
    "not really",
    "never mind",
];

// ---------------------------------------------------------------------------
// Classification
// ---------------------------------------------------------------------------

/// Which tier produced a classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchSource {
    Pattern,
    FollowUp,
    Fallback,
}

/// Result of classifying one guest utterance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Classification {
    pub intent: String,
    pub module: Module,
    /// Always within `[0, 1]`.
    pub confidence: f64,
    pub entities: HashMap<String, String>,
    pub source: MatchSource,
    /// The text after normalization, as it was matched.
    pub normalized_text: String,
}

impl Classification {
    pub fn is_fallback(&self) -> bool {
        self.source == MatchSource::Fallback
    }
}

// ---------------------------------------------------------------------------
// IntentClassifier
// ---------------------------------------------------------------------------

/// A pattern's tokens, split once at build time.
struct PatternTokens {
    intent: usize,
    tokens: Vec<String>,
}

/// Scores guest input against an [`IntentCatalog`].
///
/// Building compiles one Aho-Corasick automaton over every pattern in the
/// catalog; classification is then read-only, so a classifier can be shared
/// behind an `Arc`.
pub struct IntentClassifier {
    catalog: IntentCatalog,
    automaton: AhoCorasick,
    /// Indexed by automaton pattern id.
    patterns: Vec<PatternTokens>,
    /// Every token that appears in some pattern.
    vocabulary: HashSet<String>,
}

impl IntentClassifier {
    pub fn new(catalog: IntentCatalog) -> Result<Self> {
        let mut phrases = Vec::new();
        let mut patterns = Vec::new();
        let mut vocabulary = HashSet::new();

        for (intent_idx, intent) in catalog.intents().iter().enumerate() {
            for pattern in &intent.patterns {
                let tokens: Vec<String> = pattern.split_whitespace().map(str::to_string).collect();
                vocabulary.extend(tokens.iter().cloned());
                phrases.push(pattern.as_str());
                patterns.push(PatternTokens {
                    intent: intent_idx,
                    tokens,
                });
            }
        }

        let automaton = AhoCorasick::new(&phrases).map_err(|e| KernelError::ClassifierBuild {
            reason: e.to_string(),
        })?;

        tracing::debug!(
            intents = catalog.len(),
            patterns = patterns.len(),
            "intent classifier built"
        );

        Ok(Self {
            catalog,
            automaton,
            patterns,
            vocabulary,
        })
    }

    /// Classifier over the built-in hotel catalog.
    pub fn hospitality() -> Result<Self> {
        Self::new(IntentCatalog::hospitality())
    }

    pub fn catalog(&self) -> &IntentCatalog {
        &self.catalog
    }

    /// Resolve the owning module of an intent name, including the synthetic
    /// follow-up intents.
    pub fn module_of(&self, intent: &str) -> Module {
        self.catalog.module_of(intent).unwrap_or(match intent {
            PRICING_FOLLOW_UP => Module::Payment,
            _ => Module::General,
        })
    }

    /// Classify `text` in the light of the session so far.
    ///
    /// Deterministic: the same text and context always produce the same
    /// classification.
    pub fn classify(&self, text: &str, context: &SessionContext) -> Classification {
        let normalized = normalize(text);
        let matched = self.matched_patterns(&normalized);

        if let Some(best) = self.best_intent(&matched) {
            let (intent_idx, confidence) = best;
            let def = &self.catalog.intents()[intent_idx];
            tracing::debug!(
                intent = %def.name,
                confidence,
                "pattern classification"
            );
            return Classification {
                intent: def.name.clone(),
                module: def.module,
                confidence,
                entities: extract_entities(&normalized, def.module),
                source: MatchSource::Pattern,
                normalized_text: normalized,
            };
        }

        if let Some(classification) = self.follow_up(&normalized, context) {
            tracing::debug!(
                intent = %classification.intent,
                confidence = classification.confidence,
                "follow-up classification"
            );
            return classification;
        }

        tracing::debug!(text = %normalized, "no intent matched");
        Classification {
            intent: FALLBACK.to_string(),
            module: Module::General,
            confidence: FALLBACK_CONFIDENCE,
            entities: HashMap::new(),
            source: MatchSource::Fallback,
            normalized_text: normalized,
        }
    }

    // -- Private helpers ----------------------------------------------------

    /// Ids of every pattern that matched, by containment or fuzzily.
    fn matched_patterns(&self, normalized: &str) -> HashSet<usize> {
        let mut matched: HashSet<usize> = self
            .automaton
            .find_overlapping_iter(normalized)
            .filter(|m| on_word_boundary(normalized, m.start(), m.end()))
            .map(|m| m.pattern().as_usize())
            .collect();

        let input_words = words(normalized);
        for (id, pattern) in self.patterns.iter().enumerate() {
            if !matched.contains(&id) && self.fuzzy_matches(&pattern.tokens, &input_words) {
                tracing::trace!(pattern = %pattern.tokens.join(" "), "fuzzy pattern match");
                matched.insert(id);
            }
        }
        matched
    }

    /// A pattern matches fuzzily when every token is satisfied and at least
    /// one token is long enough to be compared by edit distance.
    fn fuzzy_matches(&self, tokens: &[String], input: &[&str]) -> bool {
        let mut has_long_token = false;
        for token in tokens {
            let token_len = token.chars().count();
            let satisfied = if token_len <= 3 {
                input.iter().any(|w| w == token)
            } else {
                has_long_token = true;
                input.iter().any(|w| self.is_typo_of(w, token))
            };
            if !satisfied {
                return false;
            }
        }
        has_long_token
    }

    fn is_typo_of(&self, word: &str, token: &str) -> bool {
        if word == token {
            return true;
        }
        // Known words are never typos of other known words ("hello" vs "help").
        if word.chars().count() <= 3 || self.vocabulary.contains(word) {
            return false;
        }
        match levenshtein(word, token) {
            1 => true,
            // Two edits keep the first letter and need a five letter word
            // ("much" is not "lunch", "mind" is not "menu").
            2 => word.chars().count() >= 5 && word.chars().next() == token.chars().next(),
            _ => false,
        }
    }

    /// Highest-confidence intent among matched patterns; ties keep the
    /// catalog's declaration order.
    fn best_intent(&self, matched: &HashSet<usize>) -> Option<(usize, f64)> {
        let mut counts = vec![0usize; self.catalog.len()];
        for &id in matched {
            counts[self.patterns[id].intent] += 1;
        }

        let mut best: Option<(usize, f64)> = None;
        for (idx, def) in self.catalog.intents().iter().enumerate() {
            let count = counts[idx];
            if count == 0 {
                continue;
            }
            let confidence =
                (def.base_confidence + count as f64 * def.weight * 0.1).clamp(0.0, MAX_CONFIDENCE);
            if best.is_none_or(|(_, c)| confidence > c) {
                best = Some((idx, confidence));
            }
        }
        best
    }

    fn follow_up(&self, normalized: &str, context: &SessionContext) -> Option<Classification> {
        let input_words = words(normalized);
        let previous = context.last_intent();

        if let Some(previous) = previous {
            if PRICE_WORDS.iter().any(|p| contains_phrase(normalized, p)) {
                let mut entities = extract_entities(normalized, Module::Payment);
                entities.insert("context_intent".to_string(), previous.to_string());
                return Some(self.follow_up_classification(
                    PRICING_FOLLOW_UP,
                    Module::Payment,
                    PRICING_CONFIDENCE,
                    entities,
                    normalized,
                ));
            }
        }

        if input_words.is_empty() || input_words.len() > MAX_SHORT_REPLY_WORDS {
            return None;
        }

        if let Some(previous) = previous {
            if starts_with_any(&input_words, AFFIRMATIONS) {
                let module = self.module_of(previous);
                let mut entities = extract_entities(normalized, module);
                entities.insert("confirmation".to_string(), "yes".to_string());
                return Some(self.follow_up_classification(
                    previous,
                    module,
                    AFFIRMATION_CONFIDENCE,
                    entities,
                    normalized,
                ));
            }
        }

        if starts_with_any(&input_words, NEGATIONS) {
            return Some(self.follow_up_classification(
                DECLINE,
                Module::General,
                DECLINE_CONFIDENCE,
                extract_entities(normalized, Module::General),
                normalized,
            ));
        }

        None
    }

    fn follow_up_classification(
        &self,
        intent: &str,
        module: Module,
        confidence: f64,
        entities: HashMap<String, String>,
        normalized: &str,
    ) -> Classification {
        Classification {
            intent: intent.to_string(),
            module,
            confidence,
            entities,
            source: MatchSource::FollowUp,
            normalized_text: normalized.to_string(),
        }
    }
}

/// Whether the word sequence begins with one of `phrases`.
fn starts_with_any(input: &[&str], phrases: &[&str]) -> bool {
    phrases.iter().any(|phrase| {
        let phrase_words: Vec<&str> = phrase.split_whitespace().collect();
        input.len() >= phrase_words.len() && input[..phrase_words.len()] == phrase_words[..]
    })
}

/// Character-level Levenshtein distance.
pub fn levenshtein(a: &str, b: &str) -> usize {
    let b_chars: Vec<char> = b.chars().collect();
    let mut row: Vec<usize> = (0..=b_chars.len()).collect();

    for (i, ca) in a.chars().enumerate() {
        let mut diagonal = row[0];
        row[0] = i + 1;
        for (j, cb) in b_chars.iter().enumerate() {
            let above = row[j + 1];
            row[j + 1] = if ca == *cb {
                diagonal
            } else {
                1 + diagonal.min(above).min(row[j])
            };
            diagonal = above;
        }
    }
    row[b_chars.len()]
}
