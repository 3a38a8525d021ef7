//! Fallback and escalation policy.
//!
//! Decides what to do with a classification based on its confidence and on
//! how many low-confidence turns the session has had in a row.

use serde::{Deserialize, Serialize};

use concierge_kernel::{Classification, SessionContext};

use crate::config::EngineConfig;

/// What the turn pipeline should do with a classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PolicyDecision {
    /// Confident enough: act on the intent.
    Proceed,
    /// First miss: ask an open clarifying question.
    Clarify,
    /// Repeated misses: offer a numbered menu of categories.
    Menu,
    /// Too many misses: hand the guest to staff.
    Escalate,
}

/// Input rejected before classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InputRejection {
    Empty,
    TooLong,
}

impl InputRejection {
    pub fn code(self) -> &'static str {
        match self {
            Self::Empty => "EMPTY_INPUT",
            Self::TooLong => "INPUT_TOO_LONG",
        }
    }
}

#[derive(Debug, Clone)]
pub struct FallbackPolicy {
    confidence_threshold: f64,
    escalation_threshold: u32,
    max_input_length: usize,
}

impl FallbackPolicy {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            confidence_threshold: config.confidence_threshold,
            escalation_threshold: config.escalation_threshold.max(1),
            max_input_length: config.max_input_length,
        }
    }

    pub fn escalation_threshold(&self) -> u32 {
        self.escalation_threshold
    }

    /// Reject empty or oversized input.  Does not touch any counter.
    pub fn check_input(&self, text: &str) -> Result<(), InputRejection> {
        if text.trim().is_empty() {
            Err(InputRejection::Empty)
        } else if text.chars().count() > self.max_input_length {
            Err(InputRejection::TooLong)
        } else {
            Ok(())
        }
    }

    /// Decide on a classification and return the updated context.
    ///
    /// A confident intent resets the fallback counter and is remembered; a
    /// miss increments the counter up to the escalation threshold, so once
    /// escalated the session stays escalated until a confident intent.
    pub fn evaluate(
        &self,
        classification: &Classification,
        context: &SessionContext,
    ) -> (PolicyDecision, SessionContext) {
        if classification.confidence >= self.confidence_threshold {
            return (
                PolicyDecision::Proceed,
                context.with_intent(&classification.intent),
            );
        }

        let next = context.with_fallback(self.escalation_threshold);
        let decision = if next.is_escalated(self.escalation_threshold) {
            PolicyDecision::Escalate
        } else if next.fallback_count == 1 {
            PolicyDecision::Clarify
        } else {
            PolicyDecision::Menu
        };

        tracing::debug!(
            session_id = %context.session_id,
            confidence = classification.confidence,
            fallback_count = next.fallback_count,
            ?decision,
            "low-confidence turn"
        );
        (decision, next)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use concierge_kernel::{MatchSource, Module};

    use super::*;

    fn classification(confidence: f64) -> Classification {
        Classification {
            intent: if confidence >= 0.65 { "Help" } else { "fallback" }.to_string(),
            module: Module::General,
            confidence,
            entities: HashMap::new(),
            source: MatchSource::Pattern,
            normalized_text: String::new(),
        }
    }

    fn policy() -> FallbackPolicy {
        FallbackPolicy::new(&EngineConfig::default())
    }

    #[test]
    fn confident_intent_proceeds_and_resets() {
        let ctx = SessionContext::new("s").with_fallback(3).with_fallback(3);
        let (decision, next) = policy().evaluate(&classification(0.9), &ctx);
        assert_eq!(decision, PolicyDecision::Proceed);
        assert_eq!(next.fallback_count, 0);
        assert_eq!(next.last_intent(), Some("Help"));
    }

    #[test]
    fn threshold_is_inclusive() {
        let (decision, _) = policy().evaluate(&classification(0.65), &SessionContext::new("s"));
        assert_eq!(decision, PolicyDecision::Proceed);
    }

    #[test]
    fn misses_escalate_at_threshold() {
        let policy = policy();
        let ctx = SessionContext::new("s");

        let (d1, ctx) = policy.evaluate(&classification(0.1), &ctx);
        let (d2, ctx) = policy.evaluate(&classification(0.1), &ctx);
        let (d3, ctx) = policy.evaluate(&classification(0.1), &ctx);
        assert_eq!(
            [d1, d2, d3],
            [PolicyDecision::Clarify, PolicyDecision::Menu, PolicyDecision::Escalate]
        );
        assert_eq!(ctx.fallback_count, 3);

        // Sticky, and the counter does not grow past the threshold.
        let (d4, ctx) = policy.evaluate(&classification(0.1), &ctx);
        assert_eq!(d4, PolicyDecision::Escalate);
        assert_eq!(ctx.fallback_count, 3);
    }

    #[test]
    fn misses_do_not_touch_intent_history() {
        let ctx = SessionContext::new("s").with_intent("BookRoom");
        let (_, next) = policy().evaluate(&classification(0.2), &ctx);
        assert_eq!(next.previous_intents, vec!["BookRoom"]);
    }

    #[test]
    fn input_checks() {
        let policy = policy();
        assert_eq!(policy.check_input("   "), Err(InputRejection::Empty));
        assert_eq!(policy.check_input(&"a".repeat(1001)), Err(InputRejection::TooLong));
        assert_eq!(policy.check_input(&"a".repeat(1000)), Ok(()));
        assert_eq!(InputRejection::TooLong.code(), "INPUT_TOO_LONG");
    }
}
