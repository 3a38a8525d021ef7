//! Flow definition registry.
//!
//! Definitions are validated on registration and stored behind an `Arc`, so
//! the engine and the turn pipeline share one registry without copying step
//! lists around.  Backed by [`DashMap`] like the instance table.

use std::sync::Arc;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;

use crate::builtin;
use crate::error::{DialogError, Result};
use crate::flow::FlowDefinition;

/// Concurrent registry of flow definitions.
///
/// Cheaply cloneable (`Arc`-backed) and `Send + Sync`.
#[derive(Clone, Default)]
pub struct FlowRegistry {
    flows: Arc<DashMap<String, Arc<FlowDefinition>>>,
}

impl FlowRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry preloaded with the hotel flows (room booking, spa
    /// booking, room service, complaint escalation).
    pub fn hospitality() -> Result<Self> {
        let registry = Self::new();
        for flow in builtin::hospitality_flows() {
            registry.register(flow)?;
        }
        Ok(registry)
    }

    /// Validate and add a definition.
    pub fn register(&self, flow: FlowDefinition) -> Result<()> {
        flow.validate()?;
        match self.flows.entry(flow.id.clone()) {
            Entry::Occupied(_) => Err(DialogError::DuplicateFlow { flow_id: flow.id }),
            Entry::Vacant(slot) => {
                tracing::debug!(
                    flow_id = %flow.id,
                    steps = flow.steps.len(),
                    triggers = ?flow.trigger_intents,
                    "flow registered"
                );
                slot.insert(Arc::new(flow));
                Ok(())
            }
        }
    }

    pub fn get(&self, flow_id: &str) -> Option<Arc<FlowDefinition>> {
        self.flows.get(flow_id).map(|entry| Arc::clone(entry.value()))
    }

    /// The flow an intent starts, if any.  When several flows claim the
    /// same intent the one with the smallest id wins.
    pub fn for_intent(&self, intent: &str) -> Option<Arc<FlowDefinition>> {
        self.list()
            .into_iter()
            .find(|flow| flow.trigger_intents.iter().any(|t| t == intent))
    }

    /// All definitions, sorted by id.
    pub fn list(&self) -> Vec<Arc<FlowDefinition>> {
        let mut flows: Vec<_> = self.flows.iter().map(|e| Arc::clone(e.value())).collect();
        flows.sort_by(|a, b| a.id.cmp(&b.id));
        flows
    }

    pub fn len(&self) -> usize {
        self.flows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.flows.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flow::FlowStep;

    #[test]
    fn hospitality_flows_register() {
        let registry = FlowRegistry::hospitality().expect("built-in flows are valid");
        assert_eq!(registry.len(), 4);
        let ids: Vec<String> = registry.list().iter().map(|f| f.id.clone()).collect();
        assert_eq!(
            ids,
            vec!["complaint_escalation", "room_booking", "room_service", "spa_booking"]
        );
    }

    #[test]
    fn intents_map_to_flows() {
        let registry = FlowRegistry::hospitality().unwrap();
        assert_eq!(registry.for_intent("BookRoom").unwrap().id, "room_booking");
        assert_eq!(registry.for_intent("BookSpa").unwrap().id, "spa_booking");
        assert_eq!(registry.for_intent("PlaceOrder").unwrap().id, "room_service");
        assert_eq!(
            registry.for_intent("FileComplaint").unwrap().id,
            "complaint_escalation"
        );
        assert!(registry.for_intent("Greeting").is_none());
    }

    #[test]
    fn duplicate_ids_rejected() {
        let registry = FlowRegistry::new();
        let flow = FlowDefinition::new("f", "F").with_steps(vec![FlowStep::display("d", "hi")]);
        registry.register(flow.clone()).unwrap();
        assert!(matches!(
            registry.register(flow),
            Err(DialogError::DuplicateFlow { .. })
        ));
    }

    #[test]
    fn concurrent_duplicates_register_once() {
        let registry = FlowRegistry::new();
        let flow = FlowDefinition::new("f", "F").with_steps(vec![FlowStep::display("d", "hi")]);
        let accepted = std::thread::scope(|scope| {
            let handles: Vec<_> = (0..8)
                .map(|_| scope.spawn(|| registry.register(flow.clone()).is_ok()))
                .collect();
            handles
                .into_iter()
                .map(|h| h.join().unwrap())
                .filter(|ok| *ok)
                .count()
        });
        assert_eq!(accepted, 1);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn invalid_definitions_rejected() {
        let registry = FlowRegistry::new();
        let flow = FlowDefinition::new("f", "F")
            .with_steps(vec![FlowStep::input("a", "?").goto("missing")]);
        let err = registry.register(flow).unwrap_err();
        assert_eq!(err.code(), "INVALID_STEP");
        assert!(registry.is_empty());
    }

    #[test]
    fn clones_share_state() {
        let registry = FlowRegistry::new();
        let clone = registry.clone();
        clone
            .register(FlowDefinition::new("f", "F").with_steps(vec![FlowStep::display("d", "hi")]))
            .unwrap();
        assert!(registry.get("f").is_some());
    }
}
