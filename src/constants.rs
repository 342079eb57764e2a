//! # Mediator Constants
//!
//! Property keys, delimiters and names shared between the mediator, the
//! derived contexts it produces and the persisted definition format.

/// Property carrying `<index>$<count>` on every derived context
pub const MESSAGE_SEQUENCE: &str = "MESSAGE_SEQUENCE";

/// Property prefix carrying the original message id for aggregation
pub const AGGREGATE_CORRELATION: &str = "AGGREGATE_CORRELATION";

/// Separator between batch index and batch count in the sequence property
pub const MESSAGE_SEQUENCE_DELIMITER: &str = "$";

/// Wrapper element name used when the original payload is not preserved
pub const BATCH_ELEMENT: &str = "batch";

/// Operation property telling the transport whether a response was written
pub const RESPONSE_WRITTEN: &str = "RESPONSE_WRITTEN";

/// Value of [`RESPONSE_WRITTEN`] that suppresses the default response
pub const RESPONSE_SKIP: &str = "SKIP";

/// Envelope element names
pub mod envelope {
    pub const ENVELOPE: &str = "Envelope";
    pub const BODY: &str = "Body";
}

/// Names used by the persisted mediator definition
pub mod definition {
    pub const ROOT_TAG_NAME: &str = "batchIterator";
    pub const ATT_BATCH_SIZE: &str = "batchSize";
    pub const DEFAULT_BATCH_SIZE: &str = "1";
}

/// Scoped sequence key, `MESSAGE_SEQUENCE.<id>` when the mediator has an id
pub fn message_sequence_key(mediator_id: Option<&str>) -> String {
    match mediator_id {
        Some(id) => format!("{MESSAGE_SEQUENCE}.{id}"),
        None => MESSAGE_SEQUENCE.to_string(),
    }
}

/// `AGGREGATE_CORRELATION.<id>`
pub fn aggregate_correlation_key(mediator_id: &str) -> String {
    format!("{AGGREGATE_CORRELATION}.{mediator_id}")
}
