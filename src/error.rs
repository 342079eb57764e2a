//! Error types for the batch iterator mediator.
//!

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum MediationError {
    /// The split expression could not be evaluated against the envelope
    #[error("Error evaluating split expression {expression}: {reason}")]
    SelectorEvaluation { expression: String, reason: String },

    /// The split expression produced something other than an element
    #[error("Error splitting message with expression {expression} - result not an element")]
    SelectorType { expression: String },

    /// Cloning an envelope or message context failed
    #[error("Error creating an iterated copy of the message: {reason}")]
    ContextClone { reason: String },

    /// Payload preservation was requested but the attach path resolved to nothing usable
    #[error(
        "Error in attaching the split elements: unable to get the attach path specified by the expression {attach_path}"
    )]
    AttachPath { attach_path: String },

    /// A sequential target failed while mediating a batch
    #[error("Exception occurred while executing sequential iteration for batch {batch_index}: {reason}")]
    TargetFailure { batch_index: usize, reason: String },

    /// A fault already raised by the host framework; never wrapped
    #[error("{0}")]
    Fault(String),

    #[error("Exception occurred while executing the batch iterator mediator: {0}")]
    Internal(String),
}

impl MediationError {
    /// Whether this error is a host fault that must travel unchanged
    pub fn is_fault(&self) -> bool {
        matches!(self, MediationError::Fault(_))
    }

    /// Wrap a target-side error observed while dispatching `batch_index`.
    ///
    /// Faults pass through as-is; everything else becomes a [`MediationError::TargetFailure`].
    pub fn from_target(batch_index: usize, error: MediationError) -> Self {
        match error {
            fault @ MediationError::Fault(_) => fault,
            other => MediationError::TargetFailure {
                batch_index,
                reason: other.to_string(),
            },
        }
    }
}

pub type MediationResult<T> = std::result::Result<T, MediationError>;
