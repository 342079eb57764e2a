//! # Message Context
//!
//! In-flight processing state for one message: identity, payload envelope,
//! keyed properties and the fault handler stack.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::Value;
use uuid::Uuid;

use crate::constants::{MESSAGE_SEQUENCE_DELIMITER, RESPONSE_SKIP, RESPONSE_WRITTEN};
use crate::document::Document;

/// Property value, free-form JSON
pub type PropertyValue = Value;

/// Key of a message property.
///
/// Named keys are the user-visible properties; handle keys are opaque slots
/// assigned by the host runtime and are never copied between contexts.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PropertyKey {
    Name(String),
    Handle(u64),
}

impl PropertyKey {
    pub fn as_name(&self) -> Option<&str> {
        match self {
            PropertyKey::Name(name) => Some(name),
            PropertyKey::Handle(_) => None,
        }
    }
}

impl From<&str> for PropertyKey {
    fn from(name: &str) -> Self {
        PropertyKey::Name(name.to_string())
    }
}

impl From<String> for PropertyKey {
    fn from(name: String) -> Self {
        PropertyKey::Name(name)
    }
}

impl fmt::Display for PropertyKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PropertyKey::Name(name) => f.write_str(name),
            PropertyKey::Handle(handle) => write!(f, "#{handle}"),
        }
    }
}

/// Named fault handler registered on a message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FaultHandler {
    name: String,
}

impl FaultHandler {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

/// Transport-level operation state shared by a message and all of its copies
#[derive(Debug, Default)]
pub struct OperationContext {
    properties: Mutex<HashMap<String, String>>,
}

impl OperationContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_property(&self, key: impl Into<String>, value: impl Into<String>) {
        self.properties.lock().insert(key.into(), value.into());
    }

    pub fn property(&self, key: &str) -> Option<String> {
        self.properties.lock().get(key).cloned()
    }
}

/// Unit of in-flight processing state
#[derive(Debug, Clone)]
pub struct MessageContext {
    message_id: String,
    envelope: Document,
    properties: HashMap<PropertyKey, PropertyValue>,
    fault_stack: Vec<FaultHandler>,
    operation: Option<Arc<OperationContext>>,
}

impl MessageContext {
    /// Create a context with a fresh message id around `envelope`
    pub fn new(envelope: Document) -> Self {
        Self {
            message_id: generate_message_id(),
            envelope,
            properties: HashMap::new(),
            fault_stack: Vec::new(),
            operation: None,
        }
    }

    pub fn with_message_id(mut self, message_id: impl Into<String>) -> Self {
        self.message_id = message_id.into();
        self
    }

    pub fn with_operation_context(mut self, operation: Arc<OperationContext>) -> Self {
        self.operation = Some(operation);
        self
    }

    pub fn message_id(&self) -> &str {
        &self.message_id
    }

    pub fn envelope(&self) -> &Document {
        &self.envelope
    }

    pub fn envelope_mut(&mut self) -> &mut Document {
        &mut self.envelope
    }

    /// Install a new payload, returning the previous one
    pub fn set_envelope(&mut self, envelope: Document) -> Document {
        std::mem::replace(&mut self.envelope, envelope)
    }

    pub fn property(&self, key: &PropertyKey) -> Option<&PropertyValue> {
        self.properties.get(key)
    }

    /// Named property as a string slice, if it holds a string
    pub fn property_str(&self, name: &str) -> Option<&str> {
        self.properties
            .get(&PropertyKey::from(name))
            .and_then(Value::as_str)
    }

    pub fn set_property(&mut self, key: impl Into<PropertyKey>, value: impl Into<PropertyValue>) {
        self.properties.insert(key.into(), value.into());
    }

    pub fn remove_property(&mut self, key: &PropertyKey) -> Option<PropertyValue> {
        self.properties.remove(key)
    }

    pub fn properties(&self) -> impl Iterator<Item = (&PropertyKey, &PropertyValue)> {
        self.properties.iter()
    }

    /// Fault handlers, oldest first; the last entry is the active handler
    pub fn fault_stack(&self) -> &[FaultHandler] {
        &self.fault_stack
    }

    pub fn push_fault_handler(&mut self, handler: FaultHandler) {
        self.fault_stack.push(handler);
    }

    pub fn pop_fault_handler(&mut self) -> Option<FaultHandler> {
        self.fault_stack.pop()
    }

    pub fn clear_fault_stack(&mut self) {
        self.fault_stack.clear();
    }

    pub fn operation_context(&self) -> Option<&Arc<OperationContext>> {
        self.operation.as_ref()
    }

    /// Tell the transport not to write the default response.
    ///
    /// No-op when the message has no operation context.
    pub fn suppress_response(&mut self) {
        if let Some(operation) = &self.operation {
            operation.set_property(RESPONSE_WRITTEN, RESPONSE_SKIP);
        }
    }

    pub fn is_response_suppressed(&self) -> bool {
        self.operation
            .as_ref()
            .and_then(|operation| operation.property(RESPONSE_WRITTEN))
            .is_some_and(|value| value == RESPONSE_SKIP)
    }

    /// Copy everything but the payload into a context with a new message id.
    ///
    /// The copy starts with an empty envelope; the operation context handle is
    /// shared with this context.
    pub fn clone_without_envelope(&self) -> Self {
        Self {
            message_id: generate_message_id(),
            envelope: Document::envelope(),
            properties: self.properties.clone(),
            fault_stack: self.fault_stack.clone(),
            operation: self.operation.clone(),
        }
    }
}

fn generate_message_id() -> String {
    format!("urn:uuid:{}", Uuid::new_v4())
}

/// Position of a derived message within its split, `<index>$<count>`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SequenceMarker {
    pub index: usize,
    pub count: usize,
}

impl SequenceMarker {
    pub fn new(index: usize, count: usize) -> Self {
        Self { index, count }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        let (index, count) = raw.split_once(MESSAGE_SEQUENCE_DELIMITER)?;
        let index = index.trim().parse().ok()?;
        let count = count.trim().parse().ok()?;
        (index < count).then_some(Self { index, count })
    }

    pub fn is_last(&self) -> bool {
        self.index + 1 == self.count
    }
}

impl fmt::Display for SequenceMarker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{MESSAGE_SEQUENCE_DELIMITER}{}", self.index, self.count)
    }
}
