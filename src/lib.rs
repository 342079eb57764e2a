#![allow(clippy::doc_markdown)] // Allow technical terms like XPath, SOAP in docs
#![allow(clippy::missing_errors_doc)] // Allow public functions without # Errors sections
#![allow(clippy::must_use_candidate)] // Allow methods without must_use when context is clear

//! # Batch Iterator
//!
//! Split-and-dispatch mediator for message mediation pipelines.
//!
//! ## Overview
//!
//! The batch iterator selects repeating elements in a message envelope with a
//! path expression, groups them into fixed-size batches and sends one derived
//! message per batch to a downstream target. Derived messages carry a sequence
//! marker (`<index>$<count>`) and a correlation property so an aggregator can
//! reassemble the results.
//!
//! ## Key Features
//!
//! - **Two payload policies**: keep the original payload and attach each batch
//!   under an attach path, or replace the payload with a `<batch>` wrapper
//! - **Parallel or sequential dispatch**, chosen by the target
//! - **Failure propagation**: a failed sequential batch hands its fault
//!   handlers and named properties back to the original message
//! - **Declarative definitions** loaded from YAML and compiled by a factory
//!
//! ## Module Organization
//!
//! - [`mediator`] - Mediator entry point and runtime configuration
//! - [`document`] - Envelope document model
//! - [`context`] - Message and operation contexts
//! - [`expression`] - Path expression seam and the built-in element path
//! - [`batcher`] - Partitioning of extracted elements
//! - [`context_builder`] - Derived context construction
//! - [`dispatcher`] - Parallel and sequential dispatch
//! - [`propagation`] - Failure propagation onto the original message
//! - [`config`] - Persisted mediator definitions
//! - [`factory`] - Definition compilation
//! - [`error`] - Structured error handling
//! - [`logging`] - Structured logging
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use batch_iterator::{DefinitionLoader, MediatorFactory, TargetRegistry};
//!
//! # fn example(registry: TargetRegistry) -> Result<(), Box<dyn std::error::Error>> {
//! batch_iterator::logging::init_structured_logging();
//!
//! let definition = DefinitionLoader::from_yaml_str(
//!     "inline",
//!     "expression: //order\nbatchSize: \"10\"\ntarget:\n  sequence: process_orders\n",
//! )?;
//! let mediator = MediatorFactory::with_registry(registry).create(&definition)?;
//! println!("{:?}", mediator.config());
//! # Ok(())
//! # }
//! ```

pub mod batcher;
pub mod cloner;
pub mod config;
pub mod constants;
pub mod context;
pub mod context_builder;
pub mod dispatcher;
pub mod document;
pub mod error;
pub mod expression;
pub mod factory;
pub mod logging;
pub mod mediator;
pub mod propagation;
pub mod target;

pub use batcher::{batch_elements, normalize_batch_size, ElementBatch};
pub use cloner::{MessageCloner, StructuralCloner};
pub use config::{ConfigResult, ConfigurationError, DefinitionLoader, MediatorDefinition};
pub use context::{
    FaultHandler, MessageContext, OperationContext, PropertyKey, PropertyValue, SequenceMarker,
};
pub use context_builder::{DerivedContextBuilder, PayloadPolicy};
pub use dispatcher::{BatchDispatcher, DispatchMode, DispatchSummary};
pub use document::{Detached, Document, Element, NodeId};
pub use error::{MediationError, MediationResult};
pub use expression::{extract_elements, ElementPath, PathExpression, PathMatch, SelectorItem};
pub use factory::{
    ElementPathEngine, ExpressionEngine, MediatorFactory, TargetRegistry, TargetResolver,
};
pub use mediator::{BatchIteratorConfig, BatchIteratorMediator};
pub use propagation::propagate_failure;
pub use target::{Target, TargetDescriptor};
