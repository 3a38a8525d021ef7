//! Kernel error types.
//!
//! Classification itself never fails; these errors surface while building
//! an intent catalog or a classifier at startup.

/// Unified error type for the language kernel.
#[derive(Debug, thiserror::Error)]
pub enum KernelError {
    /// An intent definition violates a catalog invariant.
    #[error("invalid intent `{name}`: {reason}")]
    InvalidIntent { name: String, reason: String },

    /// Two intent definitions share the same name.
    #[error("duplicate intent: {name}")]
    DuplicateIntent { name: String },

    /// Building the pattern automaton failed.
    #[error("classifier build error: {reason}")]
    ClassifierBuild { reason: String },
}

/// Convenience alias used throughout the kernel crate.
pub type Result<T> = std::result::Result<T, KernelError>;
