//! Configuration Error Types
//!
//! Errors raised while loading, validating and compiling mediator definitions.

use thiserror::Error;

/// Configuration-related errors with detailed context
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigurationError {
    /// Missing required definition field
    #[error("Missing required configuration field '{field}' in {context}")]
    MissingRequiredField { field: String, context: String },

    /// Invalid definition value
    #[error("Invalid value '{value}' for field '{field}': {context}")]
    InvalidValue {
        field: String,
        value: String,
        context: String,
    },

    /// Invalid YAML in a definition document
    #[error("Invalid YAML in definition '{source_name}': {error}")]
    InvalidYaml { source_name: String, error: String },

    /// File I/O errors during definition loading
    #[error("Failed to read definition file '{file_path}': {error}")]
    FileReadError { file_path: String, error: String },

    /// Serializing a definition failed
    #[error("Failed to serialize definition: {error}")]
    SerializationError { error: String },

    /// An expression in the definition could not be compiled
    #[error("Invalid expression '{expression}' for field '{field}': {reason}")]
    InvalidExpression {
        field: String,
        expression: String,
        reason: String,
    },

    /// The target descriptor does not resolve to a target
    #[error("Unable to resolve target {target}: {reason}")]
    UnresolvedTarget { target: String, reason: String },
}

impl ConfigurationError {
    pub fn missing_field(field: impl Into<String>, context: impl Into<String>) -> Self {
        Self::MissingRequiredField {
            field: field.into(),
            context: context.into(),
        }
    }

    pub fn invalid_value(
        field: impl Into<String>,
        value: impl Into<String>,
        context: impl Into<String>,
    ) -> Self {
        Self::InvalidValue {
            field: field.into(),
            value: value.into(),
            context: context.into(),
        }
    }

    pub fn invalid_yaml<E: std::fmt::Display>(source_name: impl Into<String>, error: E) -> Self {
        Self::InvalidYaml {
            source_name: source_name.into(),
            error: error.to_string(),
        }
    }

    pub fn file_read_error<E: std::fmt::Display>(file_path: impl Into<String>, error: E) -> Self {
        Self::FileReadError {
            file_path: file_path.into(),
            error: error.to_string(),
        }
    }
}

pub type ConfigResult<T> = Result<T, ConfigurationError>;
