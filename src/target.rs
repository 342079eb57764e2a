//! # Dispatch Targets
//!
//! A target is the downstream processor each derived message is handed to: an
//! inline or named sequence, or an endpoint. Its dispatch mode decides whether
//! the mediator waits for it.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::context::MessageContext;
use crate::error::MediationResult;

/// Downstream processor for derived messages
#[async_trait]
pub trait Target: Send + Sync {
    /// `true` when each message is handed off without waiting for completion
    fn is_asynchronous(&self) -> bool;

    /// Mediate one derived message.
    ///
    /// Returns whether mediation of that message should continue. Fault handlers
    /// and properties recorded on `context` before an error is returned are
    /// visible to the caller.
    async fn mediate(&self, context: &mut MessageContext) -> MediationResult<bool>;
}

/// Declarative description of a target, as persisted in a mediator definition
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TargetDescriptor {
    /// Named sequence reference
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sequence: Option<String>,
    /// Named endpoint reference
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
    /// Destination address override
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub soap_action: Option<String>,
    #[serde(default = "default_asynchronous")]
    pub asynchronous: bool,
}

fn default_asynchronous() -> bool {
    true
}

impl TargetDescriptor {
    pub fn sequence(name: impl Into<String>) -> Self {
        Self {
            sequence: Some(name.into()),
            endpoint: None,
            to: None,
            soap_action: None,
            asynchronous: true,
        }
    }

    pub fn endpoint(name: impl Into<String>) -> Self {
        Self {
            sequence: None,
            endpoint: Some(name.into()),
            to: None,
            soap_action: None,
            asynchronous: true,
        }
    }

    pub fn sequential(mut self) -> Self {
        self.asynchronous = false;
        self
    }

    /// Whether the descriptor names anything to dispatch to
    pub fn is_resolvable(&self) -> bool {
        self.sequence.is_some() || self.endpoint.is_some()
    }
}
