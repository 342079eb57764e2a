//! # Mediator Factory
//!
//! Compiles a [`MediatorDefinition`] into a runnable [`BatchIteratorMediator`].
//!
//! Two collaborators turn text into behavior:
//!
//! - an [`ExpressionEngine`] compiles the split expression and attach path
//! - a [`TargetResolver`] turns the target descriptor into a [`Target`]
//!
//! [`TargetRegistry`] is an in-memory resolver keyed by sequence and endpoint
//! name; the dispatch mode always comes from the descriptor.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;

use crate::cloner::{MessageCloner, StructuralCloner};
use crate::config::{ConfigResult, ConfigurationError, MediatorDefinition};
use crate::constants::definition::ROOT_TAG_NAME;
use crate::context::MessageContext;
use crate::error::MediationResult;
use crate::expression::{ElementPath, PathExpression};
use crate::mediator::{BatchIteratorConfig, BatchIteratorMediator};
use crate::target::{Target, TargetDescriptor};

/// Compiles expression text
pub trait ExpressionEngine: Send + Sync {
    fn compile(&self, expression: &str) -> MediationResult<Arc<dyn PathExpression>>;
}

/// Compiles expressions as [`ElementPath`]s
#[derive(Debug, Clone, Copy, Default)]
pub struct ElementPathEngine;

impl ExpressionEngine for ElementPathEngine {
    fn compile(&self, expression: &str) -> MediationResult<Arc<dyn PathExpression>> {
        Ok(Arc::new(ElementPath::parse(expression)?))
    }
}

/// Resolves target descriptors
pub trait TargetResolver: Send + Sync {
    fn resolve(&self, descriptor: &TargetDescriptor) -> ConfigResult<Arc<dyn Target>>;
}

/// Named sequences and endpoints available to definitions
#[derive(Default, Clone)]
pub struct TargetRegistry {
    sequences: HashMap<String, Arc<dyn Target>>,
    endpoints: HashMap<String, Arc<dyn Target>>,
}

impl TargetRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_sequence(&mut self, name: impl Into<String>, target: Arc<dyn Target>) {
        self.sequences.insert(name.into(), target);
    }

    pub fn register_endpoint(&mut self, name: impl Into<String>, target: Arc<dyn Target>) {
        self.endpoints.insert(name.into(), target);
    }
}

impl TargetResolver for TargetRegistry {
    fn resolve(&self, descriptor: &TargetDescriptor) -> ConfigResult<Arc<dyn Target>> {
        // a sequence takes precedence over an endpoint
        let (kind, name, registered) = match (&descriptor.sequence, &descriptor.endpoint) {
            (Some(name), _) => ("sequence", name, self.sequences.get(name)),
            (None, Some(name)) => ("endpoint", name, self.endpoints.get(name)),
            (None, None) => {
                return Err(ConfigurationError::missing_field(
                    "target.sequence or target.endpoint",
                    "target descriptor",
                ))
            }
        };

        let inner = registered
            .cloned()
            .ok_or_else(|| ConfigurationError::UnresolvedTarget {
                target: format!("{kind} '{name}'"),
                reason: format!("no {kind} registered under that name"),
            })?;

        Ok(Arc::new(RegisteredTarget {
            inner,
            asynchronous: descriptor.asynchronous,
        }))
    }
}

/// Registered target run in the dispatch mode its descriptor asks for
struct RegisteredTarget {
    inner: Arc<dyn Target>,
    asynchronous: bool,
}

#[async_trait]
impl Target for RegisteredTarget {
    fn is_asynchronous(&self) -> bool {
        self.asynchronous
    }

    async fn mediate(&self, context: &mut MessageContext) -> MediationResult<bool> {
        self.inner.mediate(context).await
    }
}

/// Builds mediators from definitions
#[derive(Clone)]
pub struct MediatorFactory {
    engine: Arc<dyn ExpressionEngine>,
    resolver: Arc<dyn TargetResolver>,
    cloner: Arc<dyn MessageCloner>,
}

impl MediatorFactory {
    pub fn new(engine: Arc<dyn ExpressionEngine>, resolver: Arc<dyn TargetResolver>) -> Self {
        Self {
            engine,
            resolver,
            cloner: Arc::new(StructuralCloner),
        }
    }

    /// Factory using [`ElementPathEngine`] and the given registry
    pub fn with_registry(registry: TargetRegistry) -> Self {
        Self::new(Arc::new(ElementPathEngine), Arc::new(registry))
    }

    pub fn with_cloner(mut self, cloner: Arc<dyn MessageCloner>) -> Self {
        self.cloner = cloner;
        self
    }

    pub fn create(&self, definition: &MediatorDefinition) -> ConfigResult<BatchIteratorMediator> {
        definition.validate()?;

        let expression = self.compile("expression", &definition.expression)?;
        let target = self.resolver.resolve(&definition.target)?;

        let mut config =
            BatchIteratorConfig::new(expression, target, definition.target.clone())
                .with_continue_parent(definition.continue_parent);
        config.id = definition.id.clone();
        config.description = definition.description.clone();
        config.batch_size = definition.parsed_batch_size()?;

        if definition.preserve_payload {
            let attach_path = definition.attach_path.as_deref().ok_or_else(|| {
                ConfigurationError::missing_field(
                    "attachPath",
                    format!("{ROOT_TAG_NAME} definition with preservePayload"),
                )
            })?;
            config = config.preserving_payload(self.compile("attachPath", attach_path)?);
        }

        info!(
            id = config.id.as_deref(),
            expression = %definition.expression,
            batch_size = definition.batch_size_or_default(),
            continue_parent = config.continue_parent,
            preserve_payload = definition.preserve_payload,
            "Batch iterator mediator created"
        );

        Ok(BatchIteratorMediator::with_cloner(
            config,
            Arc::clone(&self.cloner),
        ))
    }

    fn compile(&self, field: &str, expression: &str) -> ConfigResult<Arc<dyn PathExpression>> {
        self.engine
            .compile(expression)
            .map_err(|e| ConfigurationError::InvalidExpression {
                field: field.to_string(),
                expression: expression.to_string(),
                reason: e.to_string(),
            })
    }
}
