//! Definition Loader
//!
//! Reads mediator definitions from YAML documents and writes them back.

use std::path::Path;

use tracing::debug;

use super::error::{ConfigResult, ConfigurationError};
use super::MediatorDefinition;

const MAX_DEFINITION_FILE_SIZE: u64 = 1024 * 1024; // 1MB limit

/// Loads and saves [`MediatorDefinition`]s
#[derive(Debug, Clone, Copy, Default)]
pub struct DefinitionLoader;

impl DefinitionLoader {
    /// Parse and validate a definition from YAML text
    pub fn from_yaml_str(source_name: &str, yaml: &str) -> ConfigResult<MediatorDefinition> {
        let definition: MediatorDefinition = serde_yaml::from_str(yaml)
            .map_err(|e| ConfigurationError::invalid_yaml(source_name, e))?;

        definition.validate()?;

        debug!(
            source = source_name,
            id = definition.id.as_deref(),
            expression = %definition.expression,
            batch_size = definition.batch_size_or_default(),
            "Mediator definition loaded"
        );
        Ok(definition)
    }

    /// Load a definition from a YAML file
    pub fn from_file(path: &Path) -> ConfigResult<MediatorDefinition> {
        let contents = Self::read_definition_file_safely(path)?;
        Self::from_yaml_str(&path.display().to_string(), &contents)
    }

    pub fn to_yaml_string(definition: &MediatorDefinition) -> ConfigResult<String> {
        serde_yaml::to_string(definition).map_err(|e| ConfigurationError::SerializationError {
            error: e.to_string(),
        })
    }

    pub fn write_file(definition: &MediatorDefinition, path: &Path) -> ConfigResult<()> {
        let yaml = Self::to_yaml_string(definition)?;
        std::fs::write(path, yaml)
            .map_err(|e| ConfigurationError::file_read_error(path.display().to_string(), e))
    }

    /// Read a definition file with a size limit and a regular-file check
    fn read_definition_file_safely(path: &Path) -> ConfigResult<String> {
        let metadata = std::fs::metadata(path)
            .map_err(|e| ConfigurationError::file_read_error(path.display().to_string(), e))?;

        if metadata.len() > MAX_DEFINITION_FILE_SIZE {
            return Err(ConfigurationError::invalid_value(
                "file_size",
                metadata.len().to_string(),
                format!(
                    "Definition file too large ({} bytes > {} bytes limit)",
                    metadata.len(),
                    MAX_DEFINITION_FILE_SIZE
                ),
            ));
        }

        if !metadata.is_file() {
            return Err(ConfigurationError::invalid_value(
                "file_type",
                "directory or special file",
                "Definition path must point to a regular file",
            ));
        }

        std::fs::read_to_string(path)
            .map_err(|e| ConfigurationError::file_read_error(path.display().to_string(), e))
    }
}
