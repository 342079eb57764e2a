//! Copying of envelopes and message contexts.

use crate::context::MessageContext;
use crate::document::Document;
use crate::error::MediationResult;

/// Produces copies that share no mutable state with their source
pub trait MessageCloner: Send + Sync {
    fn clone_envelope(&self, envelope: &Document) -> MediationResult<Document>;

    /// Copy a context without its payload; the copy gets a new message id.
    fn clone_context(&self, context: &MessageContext) -> MediationResult<MessageContext>;
}

/// In-memory structural cloner
#[derive(Debug, Clone, Copy, Default)]
pub struct StructuralCloner;

impl MessageCloner for StructuralCloner {
    fn clone_envelope(&self, envelope: &Document) -> MediationResult<Document> {
        Ok(envelope.clone())
    }

    fn clone_context(&self, context: &MessageContext) -> MediationResult<MessageContext> {
        Ok(context.clone_without_envelope())
    }
}
