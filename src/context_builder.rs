//! # Derived Context Builder
//!
//! Turns one [`ElementBatch`] into a complete message context ready for
//! dispatch: a copy of the original context carrying sequence and correlation
//! properties, with a fresh copy of the envelope template holding the batch.
//!
//! Two payload policies decide where the batch goes:
//!
//! - **Preserve**: the template keeps the original payload (minus the extracted
//!   elements) and the batch is appended under the node the attach path
//!   resolves to.
//! - **Replace**: the body's first element is dropped and the batch is wrapped
//!   in a single `<batch>` element placed in the body.

use std::fmt;
use std::sync::Arc;

use tracing::debug;

use crate::batcher::ElementBatch;
use crate::cloner::MessageCloner;
use crate::constants::{aggregate_correlation_key, message_sequence_key, BATCH_ELEMENT};
use crate::context::{MessageContext, SequenceMarker};
use crate::document::{Document, NodeId};
use crate::error::{MediationError, MediationResult};
use crate::expression::PathExpression;

/// Where the batch elements are placed in each derived envelope
#[derive(Clone)]
pub enum PayloadPolicy {
    /// Keep the original payload and append the batch under `attach_path`
    Preserve { attach_path: Arc<dyn PathExpression> },
    /// Replace the payload with a `<batch>` wrapper
    Replace,
}

impl PayloadPolicy {
    pub fn preserves_payload(&self) -> bool {
        matches!(self, PayloadPolicy::Preserve { .. })
    }

    pub fn attach_path(&self) -> Option<&Arc<dyn PathExpression>> {
        match self {
            PayloadPolicy::Preserve { attach_path } => Some(attach_path),
            PayloadPolicy::Replace => None,
        }
    }
}

impl fmt::Debug for PayloadPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PayloadPolicy::Preserve { attach_path } => f
                .debug_struct("Preserve")
                .field("attach_path", &attach_path.expression())
                .finish(),
            PayloadPolicy::Replace => f.write_str("Replace"),
        }
    }
}

/// Builds one derived context per batch
#[derive(Clone)]
pub struct DerivedContextBuilder {
    mediator_id: Option<String>,
    policy: PayloadPolicy,
    cloner: Arc<dyn MessageCloner>,
}

impl fmt::Debug for DerivedContextBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DerivedContextBuilder")
            .field("mediator_id", &self.mediator_id)
            .field("policy", &self.policy)
            .finish()
    }
}

impl DerivedContextBuilder {
    pub fn new(
        mediator_id: Option<String>,
        policy: PayloadPolicy,
        cloner: Arc<dyn MessageCloner>,
    ) -> Self {
        Self {
            mediator_id,
            policy,
            cloner,
        }
    }

    pub fn policy(&self) -> &PayloadPolicy {
        &self.policy
    }

    /// Prepare the envelope every derived envelope is cloned from.
    ///
    /// Under [`PayloadPolicy::Replace`] the body is emptied once here so each
    /// clone starts from an empty body.
    pub fn prepare_template(&self, template: &mut Document) {
        if self.policy.preserves_payload() {
            return;
        }
        if let Some(body) = template.body() {
            template.remove_children(body);
        }
    }

    /// Build the derived context for batch `batch_index` of `batch_count`
    pub fn build(
        &self,
        original: &MessageContext,
        batch_index: usize,
        batch_count: usize,
        template: &Document,
        batch: ElementBatch,
    ) -> MediationResult<MessageContext> {
        let mut derived = self.cloner.clone_context(original)?;
        self.set_sequence_properties(original, batch_index, batch_count, &mut derived);

        let mut envelope = self.cloner.clone_envelope(template)?;
        match &self.policy {
            PayloadPolicy::Preserve { attach_path } => {
                attach_preserved(original, attach_path.as_ref(), &mut envelope, batch)?
            }
            PayloadPolicy::Replace => wrap_in_body(&mut envelope, batch),
        }

        derived.set_envelope(envelope);
        Ok(derived)
    }

    fn set_sequence_properties(
        &self,
        original: &MessageContext,
        batch_index: usize,
        batch_count: usize,
        derived: &mut MessageContext,
    ) {
        let id = self.mediator_id.as_deref();
        if let Some(id) = id {
            // correlation back to the original, for aggregation downstream
            derived.set_property(aggregate_correlation_key(id), original.message_id());
        }
        derived.set_property(
            message_sequence_key(id),
            SequenceMarker::new(batch_index, batch_count).to_string(),
        );
    }
}

fn attach_preserved(
    original: &MessageContext,
    attach_path: &dyn PathExpression,
    envelope: &mut Document,
    batch: ElementBatch,
) -> MediationResult<()> {
    let attach_error = || MediationError::AttachPath {
        attach_path: attach_path.expression().to_string(),
    };

    let target: NodeId = attach_path
        .evaluate(envelope, original)?
        .first_node()
        .filter(|id| envelope.is_element(*id))
        .ok_or_else(attach_error)?;

    for element in batch.into_elements() {
        envelope
            .adopt(target, element)
            .map_err(|_| attach_error())?;
    }
    Ok(())
}

fn wrap_in_body(envelope: &mut Document, batch: ElementBatch) {
    let Some(body) = envelope.body() else {
        debug!("Envelope has no body, batch elements dropped");
        return;
    };

    if let Some(first) = envelope.first_child_element(body) {
        envelope.detach(first);
    }

    let wrapper = envelope.append_element(body, BATCH_ELEMENT);
    for element in batch.into_elements() {
        if let Err(element) = envelope.adopt(wrapper, element) {
            debug!(element = element.name(), "Batch wrapper rejected element, dropped");
        }
    }
}
