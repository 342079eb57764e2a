//! Copies failure state from a derived context back onto its original.
//!
//! A derived context is discarded once its batch is done, so when a sequential
//! target fails the fault handlers and properties it accumulated would be lost
//! along with it. Copying them onto the original lets the original's fault
//! handling run against the state the failing batch left behind.

use tracing::debug;

use crate::context::{MessageContext, PropertyKey};

/// Replace `original`'s fault stack with `derived`'s and copy over every
/// named property, overwriting existing values. Handle-keyed properties stay
/// where they are.
pub fn propagate_failure(original: &mut MessageContext, derived: &MessageContext) {
    original.clear_fault_stack();
    for handler in derived.fault_stack() {
        original.push_fault_handler(handler.clone());
    }

    let mut copied = 0usize;
    for (key, value) in derived.properties() {
        if let PropertyKey::Name(_) = key {
            original.set_property(key.clone(), value.clone());
            copied += 1;
        }
    }

    debug!(
        message_id = original.message_id(),
        derived_message_id = derived.message_id(),
        fault_handlers = original.fault_stack().len(),
        properties = copied,
        "Propagated failed batch state to original message"
    );
}
