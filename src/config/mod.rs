//! # Mediator Definitions
//!
//! Persisted form of a batch iterator mediator. A definition carries the same
//! fields as the runtime mediator with expressions and target references kept
//! as text; [`crate::factory::MediatorFactory`] compiles it into a mediator and
//! [`crate::mediator::BatchIteratorMediator::definition`] turns a mediator back
//! into one.
//!
//! ## Format
//!
//! ```yaml
//! id: order_split
//! expression: //order
//! batchSize: "25"
//! continueParent: true
//! preservePayload: true
//! attachPath: //orders
//! target:
//!   sequence: process_orders
//!   asynchronous: false
//! ```
//!
//! `batchSize` is a base-10 integer, accepted as a string or a number and
//! always written as a string. It defaults to `"1"`.

pub mod error;
pub mod loader;

use serde::{Deserialize, Deserializer, Serialize};

use crate::constants::definition::{ATT_BATCH_SIZE, DEFAULT_BATCH_SIZE, ROOT_TAG_NAME};
use crate::target::TargetDescriptor;

pub use error::{ConfigResult, ConfigurationError};
pub use loader::DefinitionLoader;

/// Accept `batchSize` both as `3` and as `"3"`
fn deserialize_batch_size<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    use serde::de::Error;
    use serde_json::Value;

    let value: Option<Value> = Option::deserialize(deserializer)?;

    match value {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Number(n)) => Ok(Some(n.to_string())),
        Some(Value::String(s)) => Ok(Some(s)),
        Some(other) => Err(D::Error::custom(format!(
            "batchSize must be an integer, got {other}"
        ))),
    }
}

fn is_false(value: &bool) -> bool {
    !*value
}

/// Declarative mediator definition
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediatorDefinition {
    /// Mediator identifier, scopes the sequence and correlation properties
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Split expression selecting the elements to batch
    pub expression: String,

    #[serde(
        default,
        deserialize_with = "deserialize_batch_size",
        skip_serializing_if = "Option::is_none"
    )]
    pub batch_size: Option<String>,

    #[serde(default)]
    pub continue_parent: bool,

    #[serde(default, skip_serializing_if = "is_false")]
    pub preserve_payload: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attach_path: Option<String>,

    pub target: TargetDescriptor,
}

impl MediatorDefinition {
    pub fn new(expression: impl Into<String>, target: TargetDescriptor) -> Self {
        Self {
            id: None,
            description: None,
            expression: expression.into(),
            batch_size: None,
            continue_parent: false,
            preserve_payload: false,
            attach_path: None,
            target,
        }
    }

    /// Batch size as configured; `None` when absent.
    ///
    /// Zero and negative values are returned unchanged and normalized per call.
    pub fn parsed_batch_size(&self) -> ConfigResult<Option<i64>> {
        self.batch_size
            .as_deref()
            .map(|raw| {
                raw.trim().parse::<i64>().map_err(|e| {
                    ConfigurationError::invalid_value(
                        ATT_BATCH_SIZE,
                        raw,
                        format!("must be a base-10 integer ({e})"),
                    )
                })
            })
            .transpose()
    }

    /// Batch size in its persisted form
    pub fn batch_size_or_default(&self) -> &str {
        self.batch_size.as_deref().unwrap_or(DEFAULT_BATCH_SIZE)
    }

    /// Check structural requirements that do not need an expression engine
    pub fn validate(&self) -> ConfigResult<()> {
        if self.expression.trim().is_empty() {
            return Err(ConfigurationError::missing_field(
                "expression",
                format!("{ROOT_TAG_NAME} definition"),
            ));
        }

        self.parsed_batch_size()?;

        if self.preserve_payload
            && self
                .attach_path
                .as_deref()
                .map_or(true, |path| path.trim().is_empty())
        {
            return Err(ConfigurationError::missing_field(
                "attachPath",
                format!("{ROOT_TAG_NAME} definition with preservePayload"),
            ));
        }

        if !self.target.is_resolvable() {
            return Err(ConfigurationError::missing_field(
                "target.sequence or target.endpoint",
                format!("{ROOT_TAG_NAME} definition"),
            ));
        }

        Ok(())
    }
}
