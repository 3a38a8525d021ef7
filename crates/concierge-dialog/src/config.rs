//! Engine tuning knobs.
//!
//! Every field has a default, so an empty `[engine]` table (or none at all)
//! yields the canonical configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Thresholds and timeouts for the conversation engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Minimum confidence for an intent to be acted on.
    pub confidence_threshold: f64,
    /// Inputs longer than this (in characters) are rejected.
    pub max_input_length: usize,
    /// Consecutive fallbacks before the guest is handed to staff.
    pub escalation_threshold: u32,
    /// Idle flow instances older than this are swept.
    pub flow_timeout_secs: u64,
    /// How often the background sweeper runs.
    pub sweep_interval_secs: u64,
    /// Retries allowed per step when a step does not set its own.
    pub default_max_retries: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            confidence_threshold: 0.65,
            max_input_length: 1000,
            escalation_threshold: 3,
            flow_timeout_secs: 30 * 60,
            sweep_interval_secs: 5 * 60,
            default_max_retries: 3,
        }
    }
}

impl EngineConfig {
    /// Saturates at `TimeDelta::MAX` for timeouts chrono cannot represent.
    pub fn flow_timeout(&self) -> chrono::TimeDelta {
        i64::try_from(self.flow_timeout_secs)
            .ok()
            .and_then(chrono::TimeDelta::try_seconds)
            .unwrap_or(chrono::TimeDelta::MAX)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs.max(1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_json_fills_defaults() {
        let config: EngineConfig =
            serde_json::from_str(r#"{"escalation_threshold": 5}"#).unwrap();
        assert_eq!(config.escalation_threshold, 5);
        assert_eq!(config.confidence_threshold, 0.65);
        assert_eq!(config.flow_timeout(), chrono::Duration::minutes(30));
    }

    #[test]
    fn huge_flow_timeout_saturates() {
        let config = EngineConfig {
            flow_timeout_secs: u64::MAX,
            ..EngineConfig::default()
        };
        assert_eq!(config.flow_timeout(), chrono::TimeDelta::MAX);

        let config = EngineConfig {
            flow_timeout_secs: i64::MAX as u64 / 1000 + 1,
            ..EngineConfig::default()
        };
        assert_eq!(config.flow_timeout(), chrono::TimeDelta::MAX);
    }

    #[test]
    fn zero_sweep_interval_is_clamped() {
        let config = EngineConfig {
            sweep_interval_secs: 0,
            ..EngineConfig::default()
        };
        assert_eq!(config.sweep_interval(), Duration::from_secs(1));
    }
}
