mod common;

use std::sync::Arc;
use std::time::Duration;

use batch_iterator::constants::{
    aggregate_correlation_key, message_sequence_key, BATCH_ELEMENT, MESSAGE_SEQUENCE,
};
use batch_iterator::{
    BatchIteratorConfig, BatchIteratorMediator, Document, ElementPath, FaultHandler,
    MediationError, MediationResult, MessageCloner, MessageContext, SequenceMarker,
    TargetDescriptor,
};
use common::*;

fn sequence_markers(target: &RecordingTarget, key: &str) -> Vec<SequenceMarker> {
    target
        .mediations()
        .iter()
        .map(|mediation| {
            SequenceMarker::parse(&mediation.properties[key]).expect("valid sequence marker")
        })
        .collect()
}

#[tokio::test]
async fn test_batch_sizes_determine_target_calls() {
    for (batch_size, expected_calls) in [(3, 3), (4, 2), (1, 7), (7, 1), (10, 1)] {
        let target = RecordingTarget::new();
        let mediator = BatchIteratorMediator::new(iterable_config(target.clone(), batch_size));
        let mut context = iterable_context(7);

        mediator.mediate(&mut context).await.unwrap();

        assert_eq!(
            target.call_count(),
            expected_calls,
            "batch size {batch_size}"
        );
    }
}

#[tokio::test]
async fn test_batches_preserve_element_order() {
    let target = RecordingTarget::new();
    let mediator = BatchIteratorMediator::new(iterable_config(target.clone(), 3));
    let mut context = iterable_context(7);

    mediator.mediate(&mut context).await.unwrap();

    let batches: Vec<Vec<usize>> = target
        .mediations()
        .iter()
        .map(|mediation| iterable_indexes(&mediation.envelope))
        .collect();
    assert_eq!(batches, vec![vec![0, 1, 2], vec![3, 4, 5], vec![6]]);
}

#[tokio::test]
async fn test_non_positive_batch_size_behaves_like_one() {
    for batch_size in [0, -1, -25] {
        let target = RecordingTarget::new();
        let mediator = BatchIteratorMediator::new(iterable_config(target.clone(), batch_size));
        let mut context = iterable_context(4);

        mediator.mediate(&mut context).await.unwrap();

        assert_eq!(target.call_count(), 4);
        // the configured value is left as it was
        assert_eq!(mediator.config().batch_size, Some(batch_size));
    }
}

#[tokio::test]
async fn test_no_matches_dispatches_nothing() {
    let target = RecordingTarget::new();
    let mediator = BatchIteratorMediator::new(iterable_config(target.clone(), 3));
    let mut context = iterable_context(0);

    let continue_parent = mediator.mediate(&mut context).await.unwrap();

    assert!(!continue_parent);
    assert_eq!(target.call_count(), 0);
}

#[tokio::test]
async fn test_replace_policy_wraps_batch_in_body() {
    let target = RecordingTarget::new();
    let mediator = BatchIteratorMediator::new(iterable_config(target.clone(), 3));
    let mut context = iterable_context(7);

    mediator.mediate(&mut context).await.unwrap();

    for mediation in target.mediations() {
        let envelope = &mediation.envelope;
        let body = envelope.body().unwrap();
        let children: Vec<_> = envelope.child_elements(body).collect();

        assert_eq!(children.len(), 1);
        assert_eq!(envelope.name(children[0]), Some(BATCH_ELEMENT));
        // the original payload root is gone
        assert!(ElementPath::parse("//root").unwrap().select(envelope).is_empty());
        assert!(envelope
            .child_elements(children[0])
            .all(|child| envelope.name(child) == Some("iterable")));
    }
}

#[tokio::test]
async fn test_preserve_policy_attaches_under_attach_path() {
    let target = RecordingTarget::new();
    let config = iterable_config(target.clone(), 4)
        .preserving_payload(Arc::new(ElementPath::parse("//root").unwrap()));
    let mediator = BatchIteratorMediator::new(config);

    let mut context = iterable_context(7);
    let body = context.envelope().body().unwrap();
    let header = context.envelope_mut().append_element(body, "header");
    context.envelope_mut().append_text(header, "kept");

    mediator.mediate(&mut context).await.unwrap();

    let mediations = target.mediations();
    assert_eq!(mediations.len(), 2);
    for (mediation, expected) in mediations.iter().zip([vec![0, 1, 2, 3], vec![4, 5, 6]]) {
        let envelope = &mediation.envelope;
        let root = ElementPath::parse("/Envelope/Body/root").unwrap().select(envelope);
        assert_eq!(root.len(), 1);
        assert_eq!(iterable_indexes(envelope), expected);
        assert!(envelope
            .child_elements(root[0])
            .all(|child| envelope.name(child) == Some("iterable")));
        let header = ElementPath::parse("/Envelope/Body/header").unwrap().select(envelope);
        assert_eq!(envelope.text_content(header[0]), "kept");
    }
}

#[tokio::test]
async fn test_unresolvable_attach_path_fails() {
    let target = RecordingTarget::new();
    let config = iterable_config(target.clone(), 2)
        .preserving_payload(Arc::new(ElementPath::parse("//missing").unwrap()));
    let mediator = BatchIteratorMediator::new(config);
    let mut context = iterable_context(3);

    let error = mediator.mediate(&mut context).await.unwrap_err();

    assert_eq!(
        error,
        MediationError::AttachPath {
            attach_path: "//missing".to_string()
        }
    );
    assert_eq!(target.call_count(), 0);
}

#[tokio::test]
async fn test_original_message_is_not_modified() {
    let target = RecordingTarget::new();
    let mediator = BatchIteratorMediator::new(iterable_config(target.clone(), 2));
    let mut context = iterable_context(5);
    let before = context.envelope().to_string();

    mediator.mediate(&mut context).await.unwrap();

    assert_eq!(context.envelope().to_string(), before);
    assert_eq!(iterable_indexes(context.envelope()), vec![0, 1, 2, 3, 4]);
}

#[tokio::test]
async fn test_sequence_and_correlation_properties() {
    let target = RecordingTarget::new();
    let mediator =
        BatchIteratorMediator::new(iterable_config(target.clone(), 3).with_id("orders"));
    let mut context = iterable_context(7);
    let original_id = context.message_id().to_string();

    mediator.mediate(&mut context).await.unwrap();

    let sequence_key = message_sequence_key(Some("orders"));
    let markers = sequence_markers(&target, &sequence_key);
    assert_eq!(
        markers,
        vec![
            SequenceMarker::new(0, 3),
            SequenceMarker::new(1, 3),
            SequenceMarker::new(2, 3)
        ]
    );
    assert!(markers[2].is_last());

    let correlation_key = aggregate_correlation_key("orders");
    for mediation in target.mediations() {
        assert_eq!(mediation.properties[&correlation_key], original_id);
        assert_ne!(mediation.message_id, original_id);
    }
}

#[tokio::test]
async fn test_unscoped_sequence_property_without_id() {
    let target = RecordingTarget::new();
    let mediator = BatchIteratorMediator::new(iterable_config(target.clone(), 5));
    let mut context = iterable_context(7);

    mediator.mediate(&mut context).await.unwrap();

    let markers = sequence_markers(&target, MESSAGE_SEQUENCE);
    assert_eq!(markers, vec![SequenceMarker::new(0, 2), SequenceMarker::new(1, 2)]);
    assert!(target
        .mediations()
        .iter()
        .all(|mediation| !mediation.properties.keys().any(|k| k.starts_with("AGGREGATE"))));
}

#[tokio::test]
async fn test_continue_parent_false_suppresses_response() {
    let target = RecordingTarget::new();
    let mediator = BatchIteratorMediator::new(iterable_config(target.clone(), 3));
    let mut context = iterable_context(7);

    let continue_parent = mediator.mediate(&mut context).await.unwrap();

    assert!(!continue_parent);
    assert!(context.is_response_suppressed());
}

#[tokio::test]
async fn test_continue_parent_true_keeps_response() {
    let target = RecordingTarget::new();
    let mediator = BatchIteratorMediator::new(
        iterable_config(target.clone(), 3).with_continue_parent(true),
    );
    let mut context = iterable_context(7);

    let continue_parent = mediator.mediate(&mut context).await.unwrap();

    assert!(continue_parent);
    assert!(!context.is_response_suppressed());
}

#[tokio::test]
async fn test_sequential_failure_propagates_and_stops() {
    let target = FailingTarget::new(1);
    let mediator = BatchIteratorMediator::new(iterable_config(target.clone(), 2));
    let mut context = iterable_context(7);
    context.push_fault_handler(FaultHandler::new("original_fault_sequence"));

    let error = mediator.mediate(&mut context).await.unwrap_err();

    assert!(matches!(
        error,
        MediationError::TargetFailure { batch_index: 1, .. }
    ));
    // batches 2 and 3 never reach the target
    assert_eq!(target.call_count(), 2);
    // the failed batch's fault stack is copied back onto the original
    assert_eq!(
        context.fault_stack(),
        &[
            FaultHandler::new("original_fault_sequence"),
            FaultHandler::new("batch_fault_sequence")
        ]
    );
    assert_eq!(context.property_str("ERROR_MESSAGE"), Some("batch 1 failed"));
    assert!(!context.is_response_suppressed());
}

#[tokio::test]
async fn test_faults_pass_through_unwrapped() {
    let target = FailingTarget::raising_fault(0);
    let mediator = BatchIteratorMediator::new(iterable_config(target.clone(), 3));
    let mut context = iterable_context(7);

    let error = mediator.mediate(&mut context).await.unwrap_err();

    assert_eq!(error, MediationError::Fault("fault in batch 0".to_string()));
    assert_eq!(target.call_count(), 1);
    assert_eq!(context.fault_stack().len(), 1);
}

#[tokio::test]
async fn test_parallel_dispatch_reaches_every_batch() {
    let (target, mut receiver) = ChannelTarget::new();
    let mediator = BatchIteratorMediator::new(iterable_config(target, 2).with_id("parallel"));
    let mut context = iterable_context(7);

    let continue_parent = mediator.mediate(&mut context).await.unwrap();
    assert!(!continue_parent);

    let sequence_key = message_sequence_key(Some("parallel"));
    let mut seen = Vec::new();
    for _ in 0..4 {
        let mediation = tokio::time::timeout(Duration::from_secs(5), receiver.recv())
            .await
            .expect("batch delivered in time")
            .expect("channel open");
        let marker = SequenceMarker::parse(&mediation.properties[&sequence_key]).unwrap();
        assert_eq!(marker.count, 4);
        seen.push((marker.index, iterable_indexes(&mediation.envelope)));
    }
    seen.sort();

    assert_eq!(
        seen,
        vec![
            (0, vec![0, 1]),
            (1, vec![2, 3]),
            (2, vec![4, 5]),
            (3, vec![6]),
        ]
    );
}

#[tokio::test]
async fn test_parallel_failure_is_not_observed() {
    let (target, mut receiver) = ChannelTarget::failing_on(0);
    let mediator = BatchIteratorMediator::new(iterable_config(target, 2));
    let mut context = iterable_context(7);
    context.push_fault_handler(FaultHandler::new("original_fault_sequence"));
    context.set_property("status", "received");

    let continue_parent = mediator.mediate(&mut context).await.unwrap();
    assert!(!continue_parent);

    // every batch is still submitted, including those after the failing one
    let mut indexes = Vec::new();
    for _ in 0..4 {
        let mediation = tokio::time::timeout(Duration::from_secs(5), receiver.recv())
            .await
            .expect("batch delivered in time")
            .expect("channel open");
        let marker = SequenceMarker::parse(&mediation.properties[MESSAGE_SEQUENCE]).unwrap();
        indexes.push(marker.index);
    }
    indexes.sort_unstable();
    assert_eq!(indexes, vec![0, 1, 2, 3]);

    // let the failing task finish before inspecting the original
    tokio::task::yield_now().await;

    assert_eq!(
        context.fault_stack(),
        &[FaultHandler::new("original_fault_sequence")]
    );
    assert_eq!(context.property_str("status"), Some("received"));
    assert_eq!(context.property_str("ERROR_MESSAGE"), None);
}

#[tokio::test]
async fn test_text_match_is_rejected() {
    let target = RecordingTarget::new();
    let config = BatchIteratorConfig::new(
        Arc::new(TextSelector),
        target.clone(),
        TargetDescriptor::sequence("test").sequential(),
    );
    let mediator = BatchIteratorMediator::new(config);
    let mut context = iterable_context(3);

    let error = mediator.mediate(&mut context).await.unwrap_err();

    assert_eq!(
        error,
        MediationError::SelectorType {
            expression: "//iterable/text()".to_string()
        }
    );
    assert_eq!(target.call_count(), 0);
}

#[tokio::test]
async fn test_clone_failure_is_reported() {
    let target = RecordingTarget::new();
    let mediator = BatchIteratorMediator::with_cloner(
        iterable_config(target.clone(), 3),
        Arc::new(BrokenCloner),
    );
    let mut context = iterable_context(3);

    let error = mediator.mediate(&mut context).await.unwrap_err();

    assert!(matches!(error, MediationError::ContextClone { .. }));
    assert_eq!(target.call_count(), 0);
}

/// Selects the text node of every `<iterable>`
#[derive(Debug)]
struct TextSelector;

impl batch_iterator::PathExpression for TextSelector {
    fn expression(&self) -> &str {
        "//iterable/text()"
    }

    fn evaluate(
        &self,
        document: &Document,
        _context: &MessageContext,
    ) -> MediationResult<batch_iterator::PathMatch> {
        let texts = ElementPath::parse("//iterable")
            .unwrap()
            .select(document)
            .into_iter()
            .flat_map(|id| document.children(id).to_vec())
            .filter(|id| !document.is_element(*id))
            .collect();
        Ok(batch_iterator::PathMatch::NodeSet(texts))
    }
}

struct BrokenCloner;

impl MessageCloner for BrokenCloner {
    fn clone_envelope(&self, _envelope: &Document) -> MediationResult<Document> {
        Err(MediationError::ContextClone {
            reason: "envelope could not be copied".to_string(),
        })
    }

    fn clone_context(&self, context: &MessageContext) -> MediationResult<MessageContext> {
        Ok(context.clone_without_envelope())
    }
}
