//! Dialog error types.
//!
//! Validation failures inside a flow are *not* errors: they come back as a
//! [`StepOutcome`](crate::flow::StepOutcome) with an error code so the guest
//! can retry.  [`DialogError`] covers the structural failures that abort a
//! turn.

use crate::flow::FlowStatus;

/// Unified error type for the dialog layer.
#[derive(Debug, thiserror::Error)]
pub enum DialogError {
    // -- Registry errors -----------------------------------------------------
    /// No flow definition is registered under this id.
    #[error("flow not found: {flow_id}")]
    FlowNotFound { flow_id: String },

    /// A flow definition failed registration checks.
    #[error("invalid flow `{flow_id}`: {reason}")]
    InvalidFlow { flow_id: String, reason: String },

    /// A flow with the same id is already registered.
    #[error("duplicate flow: {flow_id}")]
    DuplicateFlow { flow_id: String },

    // -- Engine errors -------------------------------------------------------
    /// No flow instance exists with this id (never started, or swept).
    #[error("flow instance not found: {instance_id}")]
    InstanceNotFound { instance_id: String },

    /// The instance points at a step its definition does not have.
    #[error("invalid step {step} in flow `{flow_id}`")]
    InvalidStep { flow_id: String, step: String },

    /// Input was sent to an instance that already finished.
    #[error("flow instance {instance_id} is not active (status: {status:?})")]
    FlowNotActive {
        instance_id: String,
        status: FlowStatus,
    },

    // -- Upstream crate errors -----------------------------------------------
    /// An error propagated from the language kernel.
    #[error("kernel error: {0}")]
    Kernel(#[from] concierge_kernel::KernelError),

    /// A content catalog or message store call failed.
    #[error("store error: {0}")]
    Store(#[from] concierge_store::StoreError),
}

impl DialogError {
    /// Stable machine-readable code, reported in turn responses.
    pub fn code(&self) -> &'static str {
        match self {
            Self::FlowNotFound { .. } | Self::InstanceNotFound { .. } => "FLOW_NOT_FOUND",
            Self::InvalidFlow { .. } | Self::InvalidStep { .. } => "INVALID_STEP",
            Self::DuplicateFlow { .. } => "DUPLICATE_FLOW",
            Self::FlowNotActive { .. } => "FLOW_NOT_ACTIVE",
            Self::Kernel(_) => "INTERNAL_ERROR",
            Self::Store(_) => "SERVICE_UNAVAILABLE",
        }
    }
}

/// Convenience alias used throughout the dialog crate.
pub type Result<T> = std::result::Result<T, DialogError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_instance_reports_flow_not_found() {
        let err = DialogError::InstanceNotFound {
            instance_id: "room_booking:s:1".into(),
        };
        assert_eq!(err.code(), "FLOW_NOT_FOUND");
        assert!(err.to_string().contains("room_booking:s:1"));
    }

    #[test]
    fn structural_codes() {
        let err = DialogError::InvalidStep {
            flow_id: "f".into(),
            step: "7".into(),
        };
        assert_eq!(err.code(), "INVALID_STEP");

        let err = DialogError::FlowNotActive {
            instance_id: "i".into(),
            status: FlowStatus::Error,
        };
        assert_eq!(err.code(), "FLOW_NOT_ACTIVE");
    }
}
