//! Per-conversation session context.
//!
//! [`SessionContext`] is an immutable snapshot: every `with_*` method
//! returns a new value and leaves the receiver untouched.  The caller owns
//! the current snapshot and threads it from one turn to the next.

use serde::{Deserialize, Serialize};

/// How many recent intents are remembered for follow-up resolution.
pub const MAX_PREVIOUS_INTENTS: usize = 3;

/// Values the guest has told us during the conversation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotBag {
    pub guest_name: Option<String>,
    pub room_type: Option<String>,
    pub dates: Option<String>,
    pub room_number: Option<String>,
}

impl SlotBag {
    /// Overlay `other` on `self`: present values in `other` win.
    pub fn merged(&self, other: &SlotBag) -> SlotBag {
        SlotBag {
            guest_name: other.guest_name.clone().or_else(|| self.guest_name.clone()),
            room_type: other.room_type.clone().or_else(|| self.room_type.clone()),
            dates: other.dates.clone().or_else(|| self.dates.clone()),
            room_number: other.room_number.clone().or_else(|| self.room_number.clone()),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.guest_name.is_none()
            && self.room_type.is_none()
            && self.dates.is_none()
            && self.room_number.is_none()
    }
}

/// Conversation state carried across turns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionContext {
    pub session_id: String,
    /// Most recent confidently classified intents, oldest first.
    pub previous_intents: Vec<String>,
    /// Consecutive low-confidence turns.
    pub fallback_count: u32,
    /// Turns handled in this session.
    pub visit_count: u32,
    /// Flow instance currently driving the conversation, if any.
    pub current_flow_id: Option<String>,
    #[serde(default)]
    pub slots: SlotBag,
}

impl SessionContext {
    pub fn new(session_id: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            previous_intents: Vec::new(),
            fallback_count: 0,
            visit_count: 0,
            current_flow_id: None,
            slots: SlotBag::default(),
        }
    }

    pub fn last_intent(&self) -> Option<&str> {
        self.previous_intents.last().map(String::as_str)
    }

    /// Record a successfully resolved intent; resets the fallback counter.
    pub fn with_intent(&self, intent: &str) -> Self {
        let mut next = self.clone();
        next.previous_intents.push(intent.to_string());
        if next.previous_intents.len() > MAX_PREVIOUS_INTENTS {
            let excess = next.previous_intents.len() - MAX_PREVIOUS_INTENTS;
            next.previous_intents.drain(..excess);
        }
        next.fallback_count = 0;
        next
    }

    /// Count one more low-confidence turn, saturating at `cap`.
    pub fn with_fallback(&self, cap: u32) -> Self {
        let mut next = self.clone();
        next.fallback_count = next.fallback_count.saturating_add(1).min(cap);
        next
    }

    pub fn with_fallbacks_reset(&self) -> Self {
        let mut next = self.clone();
        next.fallback_count = 0;
        next
    }

    pub fn with_visit(&self) -> Self {
        let mut next = self.clone();
        next.visit_count = next.visit_count.saturating_add(1);
        next
    }

    pub fn with_flow(&self, instance_id: Option<String>) -> Self {
        let mut next = self.clone();
        next.current_flow_id = instance_id;
        next
    }

    pub fn with_slots(&self, slots: &SlotBag) -> Self {
        let mut next = self.clone();
        next.slots = self.slots.merged(slots);
        next
    }

    /// Whether the fallback counter has reached the escalation threshold.
    pub fn is_escalated(&self, threshold: u32) -> bool {
        self.fallback_count >= threshold
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshots_are_not_mutated() {
        let ctx = SessionContext::new("s1");
        let next = ctx.with_intent("Greeting").with_visit();
        assert!(ctx.previous_intents.is_empty());
        assert_eq!(ctx.visit_count, 0);
        assert_eq!(next.last_intent(), Some("Greeting"));
        assert_eq!(next.visit_count, 1);
    }

    #[test]
    fn previous_intents_are_bounded() {
        let ctx = ["A", "B", "C", "D", "E"]
            .iter()
            .fold(SessionContext::new("s"), |ctx, i| ctx.with_intent(i));
        assert_eq!(ctx.previous_intents, vec!["C", "D", "E"]);
    }

    #[test]
    fn fallback_counter_caps_and_resets() {
        let ctx = SessionContext::new("s")
            .with_fallback(3)
            .with_fallback(3)
            .with_fallback(3)
            .with_fallback(3);
        assert_eq!(ctx.fallback_count, 3);
        assert!(ctx.is_escalated(3));

        let ctx = ctx.with_intent("Help");
        assert_eq!(ctx.fallback_count, 0);
        assert!(!ctx.is_escalated(3));
    }

    #[test]
    fn slots_merge_keeps_existing_values() {
        let ctx = SessionContext::new("s").with_slots(&SlotBag {
            guest_name: Some("Ada".into()),
            ..SlotBag::default()
        });
        let ctx = ctx.with_slots(&SlotBag {
            room_number: Some("305".into()),
            ..SlotBag::default()
        });
        assert_eq!(ctx.slots.guest_name.as_deref(), Some("Ada"));
        assert_eq!(ctx.slots.room_number.as_deref(), Some("305"));
    }

    #[test]
    fn context_round_trips_through_json() {
        let ctx = SessionContext::new("s").with_intent("BookRoom").with_flow(Some("f".into()));
        let json = serde_json::to_string(&ctx).unwrap();
        let back: SessionContext = serde_json::from_str(&json).unwrap();
        assert_eq!(back, ctx);
    }
}
