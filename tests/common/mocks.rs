use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use batch_iterator::constants::MESSAGE_SEQUENCE;
use batch_iterator::{
    Document, FaultHandler, MediationError, MediationResult, MessageContext, SequenceMarker,
    Target,
};
use parking_lot::Mutex;
use tokio::sync::mpsc;

/// What a mock target saw for one derived message
#[derive(Debug, Clone)]
pub struct MockMediation {
    pub message_id: String,
    pub envelope: Document,
    pub properties: HashMap<String, String>,
}

impl MockMediation {
    fn capture(context: &MessageContext) -> Self {
        let properties = context
            .properties()
            .filter_map(|(key, value)| {
                let name = key.as_name()?;
                let value = value.as_str()?;
                Some((name.to_string(), value.to_string()))
            })
            .collect();
        Self {
            message_id: context.message_id().to_string(),
            envelope: context.envelope().clone(),
            properties,
        }
    }
}

/// Sequential target that records every derived message
#[derive(Debug, Default)]
pub struct RecordingTarget {
    pub mediations: Mutex<Vec<MockMediation>>,
}

impl RecordingTarget {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn mediations(&self) -> Vec<MockMediation> {
        self.mediations.lock().clone()
    }

    pub fn call_count(&self) -> usize {
        self.mediations.lock().len()
    }
}

#[async_trait]
impl Target for RecordingTarget {
    fn is_asynchronous(&self) -> bool {
        false
    }

    async fn mediate(&self, context: &mut MessageContext) -> MediationResult<bool> {
        self.mediations.lock().push(MockMediation::capture(context));
        Ok(true)
    }
}

/// Asynchronous target that reports each derived message on a channel
#[derive(Debug)]
pub struct ChannelTarget {
    sender: mpsc::UnboundedSender<MockMediation>,
    fail_on_batch: Option<usize>,
}

impl ChannelTarget {
    pub fn new() -> (Arc<Self>, mpsc::UnboundedReceiver<MockMediation>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        let target = Self {
            sender,
            fail_on_batch: None,
        };
        (Arc::new(target), receiver)
    }

    /// Asynchronous target that fails the batch whose unscoped
    /// `MESSAGE_SEQUENCE` index is `batch_index`, after reporting it and
    /// recording a fault handler and a property on the derived context
    pub fn failing_on(
        batch_index: usize,
    ) -> (Arc<Self>, mpsc::UnboundedReceiver<MockMediation>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        let target = Self {
            sender,
            fail_on_batch: Some(batch_index),
        };
        (Arc::new(target), receiver)
    }
}

#[async_trait]
impl Target for ChannelTarget {
    fn is_asynchronous(&self) -> bool {
        true
    }

    async fn mediate(&self, context: &mut MessageContext) -> MediationResult<bool> {
        let _ = self.sender.send(MockMediation::capture(context));

        let batch_index = context
            .property_str(MESSAGE_SEQUENCE)
            .and_then(SequenceMarker::parse)
            .map(|marker| marker.index);
        if batch_index.is_some() && batch_index == self.fail_on_batch {
            context.push_fault_handler(FaultHandler::new("async_fault_sequence"));
            context.set_property("ERROR_MESSAGE", "asynchronous batch failed");
            return Err(MediationError::Internal(
                "asynchronous batch failed".to_string(),
            ));
        }
        Ok(true)
    }
}

/// Sequential target that fails on one batch.
///
/// Before failing it installs a fault handler and sets a property on the
/// derived context, the way an error path in a sequence would.
#[derive(Debug)]
pub struct FailingTarget {
    pub fail_on_call: usize,
    pub raise_fault: bool,
    pub calls: Mutex<usize>,
}

impl FailingTarget {
    pub fn new(fail_on_call: usize) -> Arc<Self> {
        Arc::new(Self {
            fail_on_call,
            raise_fault: false,
            calls: Mutex::new(0),
        })
    }

    /// Fail with a host fault instead of a plain error
    pub fn raising_fault(fail_on_call: usize) -> Arc<Self> {
        Arc::new(Self {
            fail_on_call,
            raise_fault: true,
            calls: Mutex::new(0),
        })
    }

    pub fn call_count(&self) -> usize {
        *self.calls.lock()
    }
}

#[async_trait]
impl Target for FailingTarget {
    fn is_asynchronous(&self) -> bool {
        false
    }

    async fn mediate(&self, context: &mut MessageContext) -> MediationResult<bool> {
        let call = {
            let mut calls = self.calls.lock();
            let call = *calls;
            *calls += 1;
            call
        };

        if call != self.fail_on_call {
            return Ok(true);
        }

        context.push_fault_handler(FaultHandler::new("batch_fault_sequence"));
        context.set_property("ERROR_MESSAGE", format!("batch {call} failed"));

        if self.raise_fault {
            Err(MediationError::Fault(format!("fault in batch {call}")))
        } else {
            Err(MediationError::Internal(format!("batch {call} failed")))
        }
    }
}
