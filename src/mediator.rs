//! # Batch Iterator Mediator
//!
//! Entry point the host mediation engine calls once per inbound message.
//!
//! ## Flow
//!
//! 1. Clone the inbound envelope, so the original message is never modified
//! 2. Extract (detach) the elements selected by the split expression
//! 3. Under the replace policy, empty the body of the cloned envelope once
//! 4. Partition the elements into batches of the configured size
//! 5. Build and dispatch one derived message per batch
//! 6. Return whether mediation of the original message continues; when it
//!    does not, the original's default response is suppressed
//!
//! ## Usage
//!
//! ```rust
//! use std::sync::Arc;
//! use async_trait::async_trait;
//! use batch_iterator::{
//!     BatchIteratorConfig, BatchIteratorMediator, Document, ElementPath, MediationResult,
//!     MessageContext, Target, TargetDescriptor,
//! };
//!
//! struct Sink;
//!
//! #[async_trait]
//! impl Target for Sink {
//!     fn is_asynchronous(&self) -> bool {
//!         false
//!     }
//!
//!     async fn mediate(&self, context: &mut MessageContext) -> MediationResult<bool> {
//!         println!("{}", context.envelope());
//!         Ok(true)
//!     }
//! }
//!
//! # tokio_test::block_on(async {
//! let config = BatchIteratorConfig::new(
//!     Arc::new(ElementPath::parse("//order")?),
//!     Arc::new(Sink),
//!     TargetDescriptor::sequence("sink").sequential(),
//! )
//! .with_batch_size(10);
//! let mediator = BatchIteratorMediator::new(config);
//!
//! let mut context = MessageContext::new(Document::envelope());
//! let continue_parent = mediator.mediate(&mut context).await?;
//! assert!(!continue_parent);
//! # Ok::<(), batch_iterator::MediationError>(())
//! # }).unwrap();
//! ```

use std::fmt;
use std::sync::Arc;

use tracing::{debug, enabled, instrument, trace, Level};

use crate::batcher::{batch_elements, normalize_batch_size};
use crate::cloner::{MessageCloner, StructuralCloner};
use crate::config::MediatorDefinition;
use crate::constants::definition::DEFAULT_BATCH_SIZE;
use crate::context::MessageContext;
use crate::context_builder::{DerivedContextBuilder, PayloadPolicy};
use crate::dispatcher::{BatchDispatcher, DispatchSummary};
use crate::error::MediationResult;
use crate::expression::{extract_elements, PathExpression};
use crate::logging::log_mediation_error;
use crate::target::{Target, TargetDescriptor};

/// Immutable mediator configuration
#[derive(Clone)]
pub struct BatchIteratorConfig {
    pub id: Option<String>,
    pub description: Option<String>,
    /// Split expression
    pub expression: Arc<dyn PathExpression>,
    /// Configured batch size; normalized per call, never rewritten
    pub batch_size: Option<i64>,
    pub continue_parent: bool,
    pub payload: PayloadPolicy,
    pub target: Arc<dyn Target>,
    /// Persisted description of `target`
    pub target_descriptor: TargetDescriptor,
}

impl BatchIteratorConfig {
    pub fn new(
        expression: Arc<dyn PathExpression>,
        target: Arc<dyn Target>,
        target_descriptor: TargetDescriptor,
    ) -> Self {
        Self {
            id: None,
            description: None,
            expression,
            batch_size: None,
            continue_parent: false,
            payload: PayloadPolicy::Replace,
            target,
            target_descriptor,
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_batch_size(mut self, batch_size: i64) -> Self {
        self.batch_size = Some(batch_size);
        self
    }

    pub fn with_continue_parent(mut self, continue_parent: bool) -> Self {
        self.continue_parent = continue_parent;
        self
    }

    /// Keep the original payload and append each batch under `attach_path`
    pub fn preserving_payload(mut self, attach_path: Arc<dyn PathExpression>) -> Self {
        self.payload = PayloadPolicy::Preserve { attach_path };
        self
    }
}

impl fmt::Debug for BatchIteratorConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BatchIteratorConfig")
            .field("id", &self.id)
            .field("expression", &self.expression.expression())
            .field("batch_size", &self.batch_size)
            .field("continue_parent", &self.continue_parent)
            .field("payload", &self.payload)
            .field("target", &self.target_descriptor)
            .finish()
    }
}

/// Splits a message into element batches and dispatches one derived message per batch
#[derive(Clone)]
pub struct BatchIteratorMediator {
    config: BatchIteratorConfig,
    cloner: Arc<dyn MessageCloner>,
    dispatcher: BatchDispatcher,
}

impl fmt::Debug for BatchIteratorMediator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BatchIteratorMediator")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl BatchIteratorMediator {
    pub fn new(config: BatchIteratorConfig) -> Self {
        Self::with_cloner(config, Arc::new(StructuralCloner))
    }

    pub fn with_cloner(config: BatchIteratorConfig, cloner: Arc<dyn MessageCloner>) -> Self {
        let builder = DerivedContextBuilder::new(
            config.id.clone(),
            config.payload.clone(),
            Arc::clone(&cloner),
        );
        let dispatcher = BatchDispatcher::new(config.id.clone(), builder);
        Self {
            config,
            cloner,
            dispatcher,
        }
    }

    pub fn config(&self) -> &BatchIteratorConfig {
        &self.config
    }

    /// Persisted form of this mediator
    pub fn definition(&self) -> MediatorDefinition {
        MediatorDefinition {
            id: self.config.id.clone(),
            description: self.config.description.clone(),
            expression: self.config.expression.expression().to_string(),
            batch_size: Some(
                self.config
                    .batch_size
                    .map(|size| size.to_string())
                    .unwrap_or_else(|| DEFAULT_BATCH_SIZE.to_string()),
            ),
            continue_parent: self.config.continue_parent,
            preserve_payload: self.config.payload.preserves_payload(),
            attach_path: self
                .config
                .payload
                .attach_path()
                .map(|path| path.expression().to_string()),
            target: self.config.target_descriptor.clone(),
        }
    }

    /// Split, batch and dispatch `context`.
    ///
    /// Returns whether mediation of `context` should continue. Errors are
    /// returned to the caller; host faults come back exactly as raised.
    #[instrument(skip_all, fields(mediator_id = self.config.id.as_deref(), message_id = %context.message_id()))]
    pub async fn mediate(&self, context: &mut MessageContext) -> MediationResult<bool> {
        debug!("Start : BatchIterate mediator");
        if enabled!(Level::TRACE) {
            trace!(envelope = %context.envelope(), "Message");
        }

        match self.split_and_dispatch(context).await {
            Ok(summary) => debug!(
                mode = %summary.mode,
                batches = summary.batch_count,
                dispatched = summary.dispatched,
                "Batches dispatched"
            ),
            Err(error) => {
                if !error.is_fault() {
                    log_mediation_error(
                        self.config.id.as_deref(),
                        context.message_id(),
                        "mediate",
                        &error.to_string(),
                    );
                }
                return Err(error);
            }
        }

        if !self.config.continue_parent {
            context.suppress_response();
        }

        debug!("End : BatchIterate mediator");
        Ok(self.config.continue_parent)
    }

    async fn split_and_dispatch(
        &self,
        context: &mut MessageContext,
    ) -> MediationResult<DispatchSummary> {
        // work on a copy; the original may continue through mediation
        let mut envelope = self.cloner.clone_envelope(context.envelope())?;

        let expression = self.config.expression.as_ref();
        let items = extract_elements(&mut envelope, context, expression)?;
        debug!(
            expression = expression.expression(),
            elements = items.len(),
            "Splitting with expression resulted in {} elements",
            items.len()
        );

        self.dispatcher.builder().prepare_template(&mut envelope);

        let batch_size = normalize_batch_size(self.config.batch_size);
        let batches = batch_elements(items, batch_size, expression.expression())?;

        self.dispatcher
            .dispatch(context, &self.config.target, &envelope, batches)
            .await
    }
}
