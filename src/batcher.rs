//! # Batcher
//!
//! Partitions the elements extracted from a message into contiguous,
//! order-preserving batches of a fixed size.

use std::num::NonZeroUsize;

use crate::document::Element;
use crate::error::{MediationError, MediationResult};
use crate::expression::SelectorItem;

/// Ordered group of at most `batch_size` elements
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ElementBatch {
    elements: Vec<Element>,
}

impl ElementBatch {
    pub fn new(elements: Vec<Element>) -> Self {
        Self { elements }
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    pub fn elements(&self) -> &[Element] {
        &self.elements
    }

    pub fn into_elements(self) -> Vec<Element> {
        self.elements
    }
}

/// Batch size in effect for one call; absent, zero and negative sizes mean 1
pub fn normalize_batch_size(configured: Option<i64>) -> NonZeroUsize {
    configured
        .and_then(|size| usize::try_from(size).ok())
        .and_then(NonZeroUsize::new)
        .unwrap_or(NonZeroUsize::MIN)
}

/// Split `items` into batches of `batch_size`.
///
/// Every item must be an element; the first non-element aborts batching with
/// [`MediationError::SelectorType`] naming `expression`.
pub fn batch_elements(
    items: Vec<SelectorItem>,
    batch_size: NonZeroUsize,
    expression: &str,
) -> MediationResult<Vec<ElementBatch>> {
    let size = batch_size.get();
    let mut batches: Vec<ElementBatch> = Vec::with_capacity(items.len().div_ceil(size));

    for (position, item) in items.into_iter().enumerate() {
        let element = item
            .into_element()
            .ok_or_else(|| MediationError::SelectorType {
                expression: expression.to_string(),
            })?;

        if position % size == 0 {
            batches.push(ElementBatch::default());
        }
        if let Some(batch) = batches.last_mut() {
            batch.elements.push(element);
        }
    }

    Ok(batches)
}
