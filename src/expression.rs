//! # Path Expressions
//!
//! Seam between the mediator and whatever expression language the host uses to
//! address parts of an envelope. The mediator only needs two things from it:
//! evaluating an expression against a document, and extracting (detaching) the
//! nodes an expression selects.
//!
//! [`ElementPath`] is a small built-in matcher for slash-separated element
//! names with `*` wildcards and `//` descendant steps. Anything richer is
//! plugged in through [`PathExpression`].

use std::collections::{HashMap, HashSet};
use std::fmt;

use serde_json::Value;
use tracing::debug;

use crate::context::MessageContext;
use crate::document::{Detached, Document, Element, NodeId};
use crate::error::{MediationError, MediationResult};

/// Outcome of evaluating a path expression
#[derive(Debug, Clone, PartialEq)]
pub enum PathMatch {
    Node(NodeId),
    NodeSet(Vec<NodeId>),
    /// Scalar result such as a string, number or boolean
    Value(Value),
    Empty,
}

impl PathMatch {
    /// First node of the match, if the match selects nodes at all
    pub fn first_node(&self) -> Option<NodeId> {
        match self {
            PathMatch::Node(id) => Some(*id),
            PathMatch::NodeSet(ids) => ids.first().copied(),
            PathMatch::Value(_) | PathMatch::Empty => None,
        }
    }
}

/// An expression that can be evaluated against a document
pub trait PathExpression: Send + Sync + fmt::Debug {
    /// Source text of the expression
    fn expression(&self) -> &str;

    fn evaluate(&self, document: &Document, context: &MessageContext)
        -> MediationResult<PathMatch>;
}

/// One item produced by extracting an expression's matches
#[derive(Debug, Clone, PartialEq)]
pub enum SelectorItem {
    Element(Element),
    Text(String),
    Value(Value),
}

impl SelectorItem {
    pub fn into_element(self) -> Option<Element> {
        match self {
            SelectorItem::Element(element) => Some(element),
            SelectorItem::Text(_) | SelectorItem::Value(_) => None,
        }
    }
}

/// Evaluate `expression` and detach every matched node from `document`.
///
/// Matched elements come back as standalone [`Element`]s in match order. A
/// match nested inside another match is returned as its own item and is no
/// longer part of the enclosing element. Text nodes and scalar results are
/// returned as-is so the caller can reject them.
pub fn extract_elements(
    document: &mut Document,
    context: &MessageContext,
    expression: &dyn PathExpression,
) -> MediationResult<Vec<SelectorItem>> {
    let matched = expression.evaluate(document, context)?;
    let ids = match matched {
        PathMatch::Node(id) => vec![id],
        PathMatch::NodeSet(ids) => ids,
        PathMatch::Value(value) => return Ok(vec![SelectorItem::Value(value)]),
        PathMatch::Empty => return Ok(Vec::new()),
    };

    if ids.contains(&document.root()) {
        return Err(MediationError::SelectorEvaluation {
            expression: expression.expression().to_string(),
            reason: "the document root cannot be split out".to_string(),
        });
    }

    // innermost and last matches first, so an enclosing match is detached
    // only after everything nested in it is gone
    let position = document_positions(document);
    let mut detach_order: Vec<usize> = (0..ids.len()).collect();
    detach_order.sort_by_key(|slot| std::cmp::Reverse(position.get(&ids[*slot]).copied()));

    let mut detached: Vec<Option<SelectorItem>> = vec![None; ids.len()];
    for slot in detach_order {
        let id = ids[slot];
        detached[slot] = match document.detach(id) {
            Some(Detached::Element(element)) => Some(SelectorItem::Element(element)),
            Some(Detached::Text(text)) => Some(SelectorItem::Text(text)),
            None => {
                debug!(
                    node = id.index(),
                    expression = expression.expression(),
                    "Match already detached"
                );
                None
            }
        };
    }
    Ok(detached.into_iter().flatten().collect())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Axis {
    Child,
    Descendant,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Step {
    axis: Axis,
    name: Option<String>,
}

impl Step {
    fn matches(&self, document: &Document, id: NodeId) -> bool {
        match (&self.name, document.name(id)) {
            (_, None) => false,
            (None, Some(_)) => true,
            (Some(wanted), Some(name)) => wanted == name,
        }
    }
}

/// Element path such as `//order`, `/Envelope/Body/*` or `Body/orders/order`.
///
/// Absolute paths start at the document itself, so their first step names the
/// root element. Relative paths start at the root element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElementPath {
    expression: String,
    absolute: bool,
    steps: Vec<Step>,
}

impl ElementPath {
    pub fn parse(expression: &str) -> MediationResult<Self> {
        let invalid = |reason: &str| MediationError::SelectorEvaluation {
            expression: expression.to_string(),
            reason: reason.to_string(),
        };

        let trimmed = expression.trim();
        if trimmed.is_empty() {
            return Err(invalid("expression is empty"));
        }

        let absolute = trimmed.starts_with('/');
        let body = trimmed.strip_prefix('/').unwrap_or(trimmed);

        let mut steps = Vec::new();
        let mut axis = Axis::Child;
        for segment in body.split('/') {
            if segment.is_empty() {
                if axis == Axis::Descendant {
                    return Err(invalid("too many consecutive '/'"));
                }
                axis = Axis::Descendant;
                continue;
            }
            if !segment
                .chars()
                .all(|c| c.is_alphanumeric() || matches!(c, '_' | '-' | '.' | ':' | '*'))
                || (segment.contains('*') && segment != "*")
            {
                return Err(invalid(&format!("unsupported step '{segment}'")));
            }
            steps.push(Step {
                axis,
                name: (segment != "*").then(|| segment.to_string()),
            });
            axis = Axis::Child;
        }

        if steps.is_empty() || axis == Axis::Descendant {
            return Err(invalid("expression must end with an element step"));
        }

        Ok(Self {
            expression: trimmed.to_string(),
            absolute,
            steps,
        })
    }

    /// Matching element ids in document order
    pub fn select(&self, document: &Document) -> Vec<NodeId> {
        // `None` stands for the document node above the root element
        let mut current: Vec<Option<NodeId>> = if self.absolute {
            vec![None]
        } else {
            vec![Some(document.root())]
        };

        for step in &self.steps {
            let mut seen = HashSet::new();
            let mut next = Vec::new();
            for context_node in &current {
                let candidates = match (step.axis, context_node) {
                    (Axis::Child, None) => vec![document.root()],
                    (Axis::Child, Some(id)) => document.child_elements(*id).collect(),
                    (Axis::Descendant, None) => {
                        let root = document.root();
                        std::iter::once(root)
                            .chain(document.descendants(root))
                            .collect()
                    }
                    (Axis::Descendant, Some(id)) => document.descendants(*id),
                };
                for candidate in candidates {
                    if step.matches(document, candidate) && seen.insert(candidate) {
                        next.push(Some(candidate));
                    }
                }
            }
            current = next;
        }

        let selected: HashSet<NodeId> = current.into_iter().flatten().collect();
        document_order(document)
            .into_iter()
            .filter(|id| selected.contains(id))
            .collect()
    }
}

fn document_order(document: &Document) -> Vec<NodeId> {
    let root = document.root();
    std::iter::once(root)
        .chain(document.descendants(root))
        .collect()
}

/// Document-order position of every attached node
fn document_positions(document: &Document) -> HashMap<NodeId, usize> {
    document_order(document)
        .into_iter()
        .enumerate()
        .map(|(position, id)| (id, position))
        .collect()
}

impl PathExpression for ElementPath {
    fn expression(&self) -> &str {
        &self.expression
    }

    fn evaluate(
        &self,
        document: &Document,
        _context: &MessageContext,
    ) -> MediationResult<PathMatch> {
        Ok(PathMatch::NodeSet(self.select(document)))
    }
}

impl fmt::Display for ElementPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.expression)
    }
}
