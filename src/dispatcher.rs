//! # Batch Dispatcher
//!
//! Sends one derived context per batch to the target, in batch order.
//!
//! ## Dispatch modes
//!
//! - **Parallel** (asynchronous target): each derived context is moved into its
//!   own tokio task and the loop moves on immediately. The dispatcher never
//!   waits for, or learns the outcome of, those tasks.
//! - **Sequential** (synchronous target): each batch is mediated to completion
//!   before the next one is built. The first failure copies the failed
//!   context's fault stack and named properties back onto the original and
//!   aborts the remaining batches.

use std::fmt;
use std::sync::Arc;

use tokio::runtime::Handle;
use tracing::{debug, instrument, warn};

use crate::batcher::ElementBatch;
use crate::context::MessageContext;
use crate::context_builder::DerivedContextBuilder;
use crate::document::Document;
use crate::error::{MediationError, MediationResult};
use crate::logging::log_batch_operation;
use crate::propagation::propagate_failure;
use crate::target::Target;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchMode {
    Parallel,
    Sequential,
}

impl DispatchMode {
    pub fn of(target: &dyn Target) -> Self {
        if target.is_asynchronous() {
            DispatchMode::Parallel
        } else {
            DispatchMode::Sequential
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DispatchMode::Parallel => "parallel",
            DispatchMode::Sequential => "sequential",
        }
    }
}

impl fmt::Display for DispatchMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What one dispatch run did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatchSummary {
    pub mode: DispatchMode,
    pub batch_count: usize,
    /// Batches handed to the target (submitted or completed)
    pub dispatched: usize,
}

#[derive(Debug, Clone)]
pub struct BatchDispatcher {
    mediator_id: Option<String>,
    builder: DerivedContextBuilder,
}

impl BatchDispatcher {
    pub fn new(mediator_id: Option<String>, builder: DerivedContextBuilder) -> Self {
        Self {
            mediator_id,
            builder,
        }
    }

    pub fn builder(&self) -> &DerivedContextBuilder {
        &self.builder
    }

    /// Build and dispatch every batch against `template`.
    ///
    /// `original` is only written to when a sequential batch fails.
    #[instrument(skip_all, fields(message_id = %original.message_id(), batch_count = batches.len()))]
    pub async fn dispatch(
        &self,
        original: &mut MessageContext,
        target: &Arc<dyn Target>,
        template: &Document,
        batches: Vec<ElementBatch>,
    ) -> MediationResult<DispatchSummary> {
        let mode = DispatchMode::of(target.as_ref());
        let batch_count = batches.len();
        let mut summary = DispatchSummary {
            mode,
            batch_count,
            dispatched: 0,
        };

        for (batch_index, batch) in batches.into_iter().enumerate() {
            log_batch_operation(
                self.mediator_id.as_deref(),
                original.message_id(),
                batch_index,
                batch_count,
                batch.len(),
                mode.as_str(),
                "submitting",
            );

            let derived = self
                .builder
                .build(original, batch_index, batch_count, template, batch)?;

            match mode {
                DispatchMode::Parallel => submit(Arc::clone(target), derived, batch_index)?,
                DispatchMode::Sequential => {
                    mediate_in_order(original, target.as_ref(), derived, batch_index).await?
                }
            }
            summary.dispatched += 1;
        }

        debug!(
            mode = %mode,
            dispatched = summary.dispatched,
            "Batch dispatch completed"
        );
        Ok(summary)
    }
}

/// Hand `derived` to the target on its own task
fn submit(
    target: Arc<dyn Target>,
    derived: MessageContext,
    batch_index: usize,
) -> MediationResult<()> {
    let handle = Handle::try_current().map_err(|e| {
        MediationError::Internal(format!("parallel dispatch requires a tokio runtime: {e}"))
    })?;

    handle.spawn(async move {
        let mut derived = derived;
        if let Err(error) = target.mediate(&mut derived).await {
            warn!(
                batch = batch_index + 1,
                message_id = derived.message_id(),
                error = %error,
                "Parallel batch mediation failed"
            );
        }
    });
    Ok(())
}

async fn mediate_in_order(
    original: &mut MessageContext,
    target: &dyn Target,
    mut derived: MessageContext,
    batch_index: usize,
) -> MediationResult<()> {
    match target.mediate(&mut derived).await {
        Ok(_) => Ok(()),
        Err(error) => {
            propagate_failure(original, &derived);
            Err(MediationError::from_target(batch_index, error))
        }
    }
}
