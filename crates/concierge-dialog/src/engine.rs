//! Flow execution engine.
//!
//! The engine owns every live [`FlowInstance`] in a [`DashMap`] keyed by
//! instance id.  Each call locks only the entry it touches, so the turn
//! pipeline and the background [`FlowSweeper`] can share one engine.
//!
//! Lifecycle of an instance:
//!
//! ```text
//! start_flow ──▶ Active ──(valid input)──▶ ... ──▶ Completed
//!                  │  └──(invalid × max_retries)──▶ Error
//!                  └──(cancel / replaced / swept)──▶ Cancelled
//! ```

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use concierge_store::ContentCatalog;

use crate::config::EngineConfig;
use crate::error::{DialogError, Result};
use crate::flow::{
    FlowDefinition, FlowErrorCode, FlowInstance, FlowMetadata, FlowStatus, NextStep, StepKind,
    StepOutcome, Verdict,
};
use crate::registry::FlowRegistry;

/// Result of starting a flow: the new instance and the opening message.
#[derive(Debug, Clone)]
pub struct FlowStart {
    pub instance: FlowInstance,
    /// Prompts of any leading display/action steps followed by the first
    /// prompt that needs an answer.
    pub message: String,
}

// ---------------------------------------------------------------------------
// FlowEngine
// ---------------------------------------------------------------------------

/// Drives flow instances through their definitions.
///
/// Cheaply cloneable; clones share the same instance table.
#[derive(Clone)]
pub struct FlowEngine {
    registry: FlowRegistry,
    catalog: Arc<dyn ContentCatalog>,
    instances: Arc<DashMap<String, FlowInstance>>,
    timeout: chrono::TimeDelta,
    default_max_retries: u32,
}

impl FlowEngine {
    pub fn new(
        registry: FlowRegistry,
        catalog: Arc<dyn ContentCatalog>,
        config: &EngineConfig,
    ) -> Self {
        Self {
            registry,
            catalog,
            instances: Arc::new(DashMap::new()),
            timeout: config.flow_timeout(),
            default_max_retries: config.default_max_retries.max(1),
        }
    }

    pub fn registry(&self) -> &FlowRegistry {
        &self.registry
    }

    /// Start `flow_id` for a session, seeding the data bag with
    /// `initial_data`.
    ///
    /// Any active instance the session already has is cancelled first.
    pub fn start_flow(
        &self,
        flow_id: &str,
        session_id: &str,
        initial_data: HashMap<String, String>,
    ) -> Result<FlowStart> {
        let definition = self
            .registry
            .get(flow_id)
            .ok_or_else(|| DialogError::FlowNotFound {
                flow_id: flow_id.to_string(),
            })?;

        if let Some(previous) = self.active_for_session(session_id) {
            info!(
                instance_id = %previous.id,
                session_id,
                "replacing active flow instance"
            );
            self.cancel(&previous.id)?;
        }

        let now = Utc::now();
        let id = self.unique_instance_id(flow_id, session_id, now);
        let mut instance = FlowInstance {
            id: id.clone(),
            flow_id: flow_id.to_string(),
            session_id: session_id.to_string(),
            step_index: 0,
            data: initial_data,
            status: FlowStatus::Active,
            metadata: FlowMetadata {
                start_time: now,
                last_activity: now,
                retry_count: 0,
                error_reason: None,
            },
        };

        let messages = advance(&mut instance, &definition, Some(0))?;

        info!(
            instance_id = %id,
            flow_id,
            session_id,
            status = ?instance.status,
            "flow started"
        );

        self.instances.insert(id, instance.clone());
        Ok(FlowStart {
            instance,
            message: messages.join(" "),
        })
    }

    /// Feed the guest's answer to the step an instance is waiting on.
    pub fn process_input(&self, instance_id: &str, input: &str) -> Result<StepOutcome> {
        let mut entry =
            self.instances
                .get_mut(instance_id)
                .ok_or_else(|| DialogError::InstanceNotFound {
                    instance_id: instance_id.to_string(),
                })?;
        let instance = entry.value_mut();

        if !instance.is_active() {
            return Err(DialogError::FlowNotActive {
                instance_id: instance_id.to_string(),
                status: instance.status,
            });
        }

        let definition =
            self.registry
                .get(&instance.flow_id)
                .ok_or_else(|| DialogError::FlowNotFound {
                    flow_id: instance.flow_id.clone(),
                })?;
        let step = definition
            .steps
            .get(instance.step_index)
            .ok_or_else(|| DialogError::InvalidStep {
                flow_id: definition.id.clone(),
                step: instance.step_index.to_string(),
            })?;

        instance.metadata.last_activity = Utc::now();

        let verdict = match &step.validator {
            Some(validator) => validator.validate(input, self.catalog.as_ref())?,
            None => Verdict::Accept(input.trim().to_string()),
        };

        let (value, details) = match verdict {
            Verdict::Accept(value) => (value, Vec::new()),
            Verdict::AcceptWith { value, details } => (value, details),
            Verdict::Reject(failure) => {
                let max_retries = step.max_retries.unwrap_or(self.default_max_retries);
                instance.metadata.retry_count += 1;
                debug!(
                    instance_id,
                    step = %step.id,
                    code = %failure.code,
                    retry = instance.metadata.retry_count,
                    max = max_retries,
                    "step input rejected"
                );

                if instance.metadata.retry_count >= max_retries {
                    instance.status = FlowStatus::Error;
                    instance.metadata.error_reason = Some(format!(
                        "max retries exceeded at step `{}` ({})",
                        step.id, failure.code
                    ));
                    warn!(instance_id, step = %step.id, "flow failed after max retries");
                    return Ok(StepOutcome {
                        success: false,
                        message: "I'm having trouble with that. Let me connect you with someone who can help."
                            .to_string(),
                        data: instance.data.clone(),
                        next_step: None,
                        completed: false,
                        error: Some(FlowErrorCode::MaxRetriesExceeded),
                    });
                }

                return Ok(StepOutcome {
                    success: false,
                    message: step.error_message.clone().unwrap_or(failure.message),
                    data: instance.data.clone(),
                    next_step: Some(step.id.clone()),
                    completed: false,
                    error: Some(failure.code),
                });
            }
        };

        debug!(instance_id, step = %step.id, "step input accepted");
        for (suffix, detail) in details {
            instance.data.insert(format!("{}_{suffix}", step.id), detail);
        }
        instance.data.insert(step.id.clone(), value);
        instance.metadata.retry_count = 0;

        let target = next_index(&definition, instance.step_index, &instance.data);
        let messages = advance(instance, &definition, target)?;
        let completed = instance.status == FlowStatus::Completed;
        if completed {
            info!(instance_id, flow_id = %definition.id, "flow completed");
        }

        Ok(StepOutcome {
            success: true,
            message: messages.join(" "),
            data: instance.data.clone(),
            next_step: (!completed).then(|| definition.steps[instance.step_index].id.clone()),
            completed,
            error: None,
        })
    }

    /// Cancel an instance.  Cancelling a finished instance is a no-op.
    pub fn cancel(&self, instance_id: &str) -> Result<FlowInstance> {
        let mut entry =
            self.instances
                .get_mut(instance_id)
                .ok_or_else(|| DialogError::InstanceNotFound {
                    instance_id: instance_id.to_string(),
                })?;
        if entry.is_active() {
            entry.status = FlowStatus::Cancelled;
            entry.metadata.last_activity = Utc::now();
            info!(instance_id, "flow cancelled");
        }
        Ok(entry.clone())
    }

    pub fn get(&self, instance_id: &str) -> Option<FlowInstance> {
        self.instances.get(instance_id).map(|e| e.value().clone())
    }

    /// The session's active instance, if it has one.
    pub fn active_for_session(&self, session_id: &str) -> Option<FlowInstance> {
        self.instances
            .iter()
            .find(|e| e.session_id == session_id && e.is_active())
            .map(|e| e.value().clone())
    }

    /// The rendered prompt of the step an instance is waiting on.
    pub fn current_prompt(&self, instance_id: &str) -> Result<String> {
        let instance = self
            .get(instance_id)
            .ok_or_else(|| DialogError::InstanceNotFound {
                instance_id: instance_id.to_string(),
            })?;
        let definition =
            self.registry
                .get(&instance.flow_id)
                .ok_or_else(|| DialogError::FlowNotFound {
                    flow_id: instance.flow_id.clone(),
                })?;
        let step = definition
            .steps
            .get(instance.step_index)
            .ok_or_else(|| DialogError::InvalidStep {
                flow_id: definition.id.clone(),
                step: instance.step_index.to_string(),
            })?;
        Ok(step.render_prompt(&instance.data))
    }

    /// Drop every instance idle for longer than the configured timeout.
    /// Returns how many were removed.
    pub fn sweep_expired(&self, now: DateTime<Utc>) -> usize {
        // A timeout reaching past the start of representable time never expires.
        let Some(cutoff) = now.checked_sub_signed(self.timeout) else {
            return 0;
        };
        let before = self.instances.len();
        self.instances.retain(|id, instance| {
            let keep = instance.metadata.last_activity >= cutoff;
            if !keep && instance.is_active() {
                debug!(instance_id = %id, "expiring idle flow instance");
            }
            keep
        });
        let removed = before.saturating_sub(self.instances.len());
        if removed > 0 {
            info!(removed, "swept expired flow instances");
        }
        removed
    }

    pub fn active_count(&self) -> usize {
        self.instances.iter().filter(|e| e.is_active()).count()
    }

    // -- Private helpers ----------------------------------------------------

    fn unique_instance_id(&self, flow_id: &str, session_id: &str, now: DateTime<Utc>) -> String {
        let mut millis = now.timestamp_millis();
        loop {
            let id = format!("{flow_id}:{session_id}:{millis}");
            if !self.instances.contains_key(&id) {
                return id;
            }
            millis += 1;
        }
    }
}

/// Index of the step that follows `index`, or `None` when the flow ends.
fn next_index(
    definition: &FlowDefinition,
    index: usize,
    data: &HashMap<String, String>,
) -> Option<usize> {
    let step = &definition.steps[index];
    let target = match &step.next {
        NextStep::Default => return (index + 1 < definition.steps.len()).then_some(index + 1),
        NextStep::Finish => return None,
        NextStep::Goto(target) => target.as_str(),
        NextStep::Branch(rule) => rule.resolve(data),
    };
    let resolved = definition.step_index(target);
    if resolved.is_none() {
        warn!(
            flow_id = %definition.id,
            step = %step.id,
            missing = target,
            "jump target missing; completing flow"
        );
    }
    resolved
}

/// Move to `target`, running display and action steps until a step needs
/// input or the flow ends.  Returns the guest-facing messages produced.
fn advance(
    instance: &mut FlowInstance,
    definition: &FlowDefinition,
    mut target: Option<usize>,
) -> Result<Vec<String>> {
    let mut messages = Vec::new();
    // Each step can be auto-run at most once per advance.
    let mut budget = definition.steps.len();

    while let Some(index) = target {
        let step = definition
            .steps
            .get(index)
            .ok_or_else(|| DialogError::InvalidStep {
                flow_id: definition.id.clone(),
                step: index.to_string(),
            })?;
        instance.step_index = index;

        match step.kind {
            StepKind::Display | StepKind::Action => {
                if budget == 0 {
                    return Err(DialogError::InvalidStep {
                        flow_id: definition.id.clone(),
                        step: step.id.clone(),
                    });
                }
                budget -= 1;

                let value = match step.action {
                    Some(action) if step.kind == StepKind::Action => action.perform(&instance.data),
                    _ => "shown".to_string(),
                };
                instance.data.insert(step.id.clone(), value);
                messages.push(step.render_prompt(&instance.data));
                target = next_index(definition, index, &instance.data);
            }
            StepKind::Input | StepKind::Choice | StepKind::Confirmation => {
                messages.push(step.render_prompt(&instance.data));
                return Ok(messages);
            }
        }
    }

    instance.status = FlowStatus::Completed;
    Ok(messages)
}

// ---------------------------------------------------------------------------
// FlowSweeper
// ---------------------------------------------------------------------------

/// Background task that periodically calls [`FlowEngine::sweep_expired`].
pub struct FlowSweeper {
    shutdown: Arc<AtomicBool>,
    notify: Arc<Notify>,
    handle: JoinHandle<()>,
}

impl FlowSweeper {
    /// Spawn the sweeper on the current tokio runtime.
    pub fn spawn(engine: FlowEngine, interval: Duration) -> Self {
        let shutdown = Arc::new(AtomicBool::new(false));
        let notify = Arc::new(Notify::new());

        let task_shutdown = Arc::clone(&shutdown);
        let task_notify = Arc::clone(&notify);
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            // The first tick completes immediately.
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        if task_shutdown.load(Ordering::Acquire) {
                            break;
                        }
                        engine.sweep_expired(Utc::now());
                    }
                    _ = task_notify.notified() => break,
                }
            }
            debug!("flow sweeper stopped");
        });

        info!(interval_secs = interval.as_secs(), "flow sweeper started");
        Self {
            shutdown,
            notify,
            handle,
        }
    }

    /// Stop the sweeper and wait for it to exit.
    pub async fn shutdown(self) {
        self.shutdown.store(true, Ordering::Release);
        self.notify.notify_one();
        if let Err(e) = self.handle.await {
            warn!(error = %e, "flow sweeper task failed");
        }
    }
}
