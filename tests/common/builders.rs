use std::sync::Arc;

use batch_iterator::{
    BatchIteratorConfig, Document, ElementPath, MessageContext, OperationContext, Target,
    TargetDescriptor,
};

/// Envelope whose body holds `<root>` with `count` `<iterable>` children.
///
/// Each child carries an `index` attribute and its index as text.
pub fn iterable_envelope(count: usize) -> Document {
    let mut document = Document::envelope();
    let body = document.body().expect("envelope has a body");
    let root = document.append_element(body, "root");
    for index in 0..count {
        let iterable = document.append_element(root, "iterable");
        document.set_attribute(iterable, "index", index.to_string());
        document.append_text(iterable, index.to_string());
    }
    document
}

/// Context over [`iterable_envelope`] with an operation context attached
pub fn iterable_context(count: usize) -> MessageContext {
    MessageContext::new(iterable_envelope(count))
        .with_operation_context(Arc::new(OperationContext::new()))
}

/// Config splitting on `//iterable` with the given batch size
pub fn iterable_config(target: Arc<dyn Target>, batch_size: i64) -> BatchIteratorConfig {
    let descriptor = if target.is_asynchronous() {
        TargetDescriptor::sequence("test")
    } else {
        TargetDescriptor::sequence("test").sequential()
    };
    BatchIteratorConfig::new(
        Arc::new(ElementPath::parse("//iterable").expect("valid path")),
        target,
        descriptor,
    )
    .with_batch_size(batch_size)
}

/// `index` attributes of the `<iterable>` elements in `document`, in order
pub fn iterable_indexes(document: &Document) -> Vec<usize> {
    ElementPath::parse("//iterable")
        .expect("valid path")
        .select(document)
        .into_iter()
        .filter_map(|id| document.attribute(id, "index"))
        .filter_map(|index| index.parse().ok())
        .collect()
}
