//! # Document Model
//!
//! Arena-backed element tree used as the message payload.
//!
//! Nodes live in a flat `Vec` and refer to each other through [`NodeId`]
//! indexes. Detaching a subtree removes its index from the parent's child list
//! and moves the nodes into a standalone [`Element`]; attaching moves them into
//! the receiving arena. Cloning a [`Document`] copies only the nodes still
//! reachable from the root into a fresh arena, so a clone never shares nodes
//! with its source and never carries detached subtrees along.

use std::fmt;

use quick_xml::escape::escape;

use crate::constants::envelope::{BODY, ENVELOPE};

/// Index of a node within one [`Document`] arena
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

impl NodeId {
    /// Get the raw arena index
    pub fn index(self) -> usize {
        self.0
    }
}

#[derive(Debug, Clone)]
enum NodeData {
    Element {
        name: String,
        attributes: Vec<(String, String)>,
    },
    Text(String),
}

#[derive(Debug, Clone)]
struct Node {
    data: NodeData,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

impl Node {
    fn element(name: impl Into<String>, parent: Option<NodeId>) -> Self {
        Self {
            data: NodeData::Element {
                name: name.into(),
                attributes: Vec::new(),
            },
            parent,
            children: Vec::new(),
        }
    }
}

/// Mutable ordered tree of elements and text nodes
#[derive(Debug)]
pub struct Document {
    nodes: Vec<Node>,
    root: NodeId,
}

impl Document {
    /// Create a document holding a single root element
    pub fn new(root_name: impl Into<String>) -> Self {
        Self {
            nodes: vec![Node::element(root_name, None)],
            root: NodeId(0),
        }
    }

    /// Create an empty `Envelope/Body` document
    pub fn envelope() -> Self {
        let mut document = Self::new(ENVELOPE);
        let root = document.root();
        document.append_element(root, BODY);
        document
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    /// First child element of the root named `Body`
    pub fn body(&self) -> Option<NodeId> {
        self.child_elements(self.root)
            .find(|id| self.name(*id) == Some(BODY))
    }

    /// Number of node slots in the arena, detached ones included
    pub fn arena_len(&self) -> usize {
        self.nodes.len()
    }

    pub fn contains(&self, id: NodeId) -> bool {
        id.0 < self.nodes.len()
    }

    pub fn is_element(&self, id: NodeId) -> bool {
        matches!(
            self.nodes.get(id.0).map(|node| &node.data),
            Some(NodeData::Element { .. })
        )
    }

    /// Element name, `None` for text nodes
    pub fn name(&self, id: NodeId) -> Option<&str> {
        match &self.nodes.get(id.0)?.data {
            NodeData::Element { name, .. } => Some(name.as_str()),
            NodeData::Text(_) => None,
        }
    }

    /// Text of a text node, `None` for elements
    pub fn text(&self, id: NodeId) -> Option<&str> {
        match &self.nodes.get(id.0)?.data {
            NodeData::Text(text) => Some(text.as_str()),
            NodeData::Element { .. } => None,
        }
    }

    /// Concatenated text of `id` and all of its descendants
    pub fn text_content(&self, id: NodeId) -> String {
        let mut content = String::new();
        if let Some(text) = self.text(id) {
            content.push_str(text);
        }
        for descendant in self.descendants(id) {
            if let Some(text) = self.text(descendant) {
                content.push_str(text);
            }
        }
        content
    }

    pub fn attribute(&self, id: NodeId, key: &str) -> Option<&str> {
        match &self.nodes.get(id.0)?.data {
            NodeData::Element { attributes, .. } => attributes
                .iter()
                .find(|(name, _)| name == key)
                .map(|(_, value)| value.as_str()),
            NodeData::Text(_) => None,
        }
    }

    pub fn set_attribute(&mut self, id: NodeId, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        if let Some(NodeData::Element { attributes, .. }) =
            self.nodes.get_mut(id.0).map(|node| &mut node.data)
        {
            match attributes.iter_mut().find(|(name, _)| *name == key) {
                Some(entry) => entry.1 = value,
                None => attributes.push((key, value)),
            }
        }
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes.get(id.0)?.parent
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.nodes
            .get(id.0)
            .map(|node| node.children.as_slice())
            .unwrap_or(&[])
    }

    pub fn child_elements(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        self.children(id)
            .iter()
            .copied()
            .filter(move |child| self.is_element(*child))
    }

    pub fn first_child_element(&self, id: NodeId) -> Option<NodeId> {
        self.child_elements(id).next()
    }

    /// All nodes below `id` in document order, excluding `id` itself
    pub fn descendants(&self, id: NodeId) -> Vec<NodeId> {
        let mut ordered = Vec::new();
        let mut stack: Vec<NodeId> = self.children(id).iter().rev().copied().collect();
        while let Some(current) = stack.pop() {
            ordered.push(current);
            stack.extend(self.children(current).iter().rev().copied());
        }
        ordered
    }

    /// Create a new element as the last child of `parent`
    pub fn append_element(&mut self, parent: NodeId, name: impl Into<String>) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(Node::element(name, Some(parent)));
        self.link_child(parent, id);
        id
    }

    /// Create a new text node as the last child of `parent`
    pub fn append_text(&mut self, parent: NodeId, text: impl Into<String>) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(Node {
            data: NodeData::Text(text.into()),
            parent: Some(parent),
            children: Vec::new(),
        });
        self.link_child(parent, id);
        id
    }

    fn link_child(&mut self, parent: NodeId, child: NodeId) {
        if let Some(node) = self.nodes.get_mut(parent.0) {
            node.children.push(child);
        }
    }

    fn unlink(&mut self, id: NodeId) -> bool {
        let Some(parent) = self.parent(id) else {
            return false;
        };
        if let Some(node) = self.nodes.get_mut(parent.0) {
            if let Some(position) = node.children.iter().rposition(|child| *child == id) {
                node.children.remove(position);
            }
        }
        if let Some(node) = self.nodes.get_mut(id.0) {
            node.parent = None;
        }
        true
    }

    /// Detach the subtree rooted at `id` from its parent.
    ///
    /// Returns `None` for the document root and for nodes that are already
    /// detached. Detached text nodes come back as [`Detached::Text`].
    pub fn detach(&mut self, id: NodeId) -> Option<Detached> {
        if id == self.root || !self.unlink(id) {
            return None;
        }
        if self.is_element(id) {
            Some(Detached::Element(Element {
                fragment: self.take_subtree(id),
            }))
        } else {
            let text = self.text(id).unwrap_or_default().to_string();
            Some(Detached::Text(text))
        }
    }

    /// Drop every child of `id`
    pub fn remove_children(&mut self, id: NodeId) {
        let children: Vec<NodeId> = self.children(id).to_vec();
        for child in children {
            self.unlink(child);
        }
    }

    /// Move a detached element under `parent`, returning its new id.
    ///
    /// Gives the element back when `parent` is not an element of this document.
    pub fn adopt(&mut self, parent: NodeId, element: Element) -> Result<NodeId, Element> {
        if !self.is_element(parent) {
            return Err(element);
        }
        Ok(self.graft(parent, element.fragment))
    }

    /// Append `fragment`'s nodes under `parent`, which must be an element
    fn graft(&mut self, parent: NodeId, fragment: Document) -> NodeId {
        let offset = self.nodes.len();
        let grafted_root = NodeId(offset + fragment.root.0);
        self.nodes.extend(fragment.nodes.into_iter().map(|node| Node {
            data: node.data,
            parent: node.parent.map(|p| NodeId(p.0 + offset)),
            children: node.children.iter().map(|c| NodeId(c.0 + offset)).collect(),
        }));

        self.nodes[grafted_root.0].parent = Some(parent);
        self.link_child(parent, grafted_root);
        grafted_root
    }

    /// Move the subtree at `id` into a fresh arena whose root is `id`'s node
    fn take_subtree(&mut self, id: NodeId) -> Document {
        rebuild(id, |source| {
            let node = &mut self.nodes[source.0];
            node.parent = None;
            (
                std::mem::replace(&mut node.data, NodeData::Text(String::new())),
                std::mem::take(&mut node.children),
            )
        })
    }

    /// Serialize the subtree at `id` as XML text
    pub fn to_xml(&self, id: NodeId) -> String {
        let mut out = String::new();
        self.write_node(id, &mut out);
        out
    }

    fn write_node(&self, id: NodeId, out: &mut String) {
        let Some(node) = self.nodes.get(id.0) else {
            return;
        };
        match &node.data {
            NodeData::Text(text) => out.push_str(&escape(text.as_str())),
            NodeData::Element { name, attributes } => {
                out.push('<');
                out.push_str(name);
                for (key, value) in attributes {
                    out.push_str(&format!(" {key}=\"{}\"", escape(value.as_str())));
                }
                if node.children.is_empty() {
                    out.push_str("/>");
                    return;
                }
                out.push('>');
                for child in &node.children {
                    self.write_node(*child, out);
                }
                out.push_str(&format!("</{name}>"));
            }
        }
    }
}

/// Copies only the nodes reachable from the root, so detached and removed
/// subtrees are left behind and node ids are renumbered in document order.
impl Clone for Document {
    fn clone(&self) -> Self {
        rebuild(self.root, |source| {
            let node = &self.nodes[source.0];
            (node.data.clone(), node.children.clone())
        })
    }
}

/// Build a compact arena from the subtree at `root`, visiting in document order.
///
/// `visit` yields a node's data and its child ids in the source arena.
fn rebuild(root: NodeId, mut visit: impl FnMut(NodeId) -> (NodeData, Vec<NodeId>)) -> Document {
    let mut rebuilt = Document {
        nodes: Vec::new(),
        root: NodeId(0),
    };
    let mut pending = vec![(root, None::<NodeId>)];

    while let Some((source, parent)) = pending.pop() {
        let (data, children) = visit(source);
        let moved = NodeId(rebuilt.nodes.len());
        rebuilt.nodes.push(Node {
            data,
            parent,
            children: Vec::new(),
        });
        if let Some(parent) = parent {
            rebuilt.nodes[parent.0].children.push(moved);
        }
        pending.extend(children.into_iter().rev().map(|child| (child, Some(moved))));
    }

    rebuilt
}

impl fmt::Display for Document {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_xml(self.root))
    }
}


/// Result of detaching a node from a document
#[derive(Debug, Clone, PartialEq)]
pub enum Detached {
    Element(Element),
    Text(String),
}

/// Standalone element subtree, not attached to any document
#[derive(Debug, Clone)]
pub struct Element {
    fragment: Document,
}

impl Element {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            fragment: Document::new(name),
        }
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        let root = self.fragment.root();
        self.fragment.set_attribute(root, key, value);
        self
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        let root = self.fragment.root();
        self.fragment.append_text(root, text);
        self
    }

    pub fn with_child(mut self, child: Element) -> Self {
        let root = self.fragment.root();
        self.fragment.graft(root, child.fragment);
        self
    }

    pub fn name(&self) -> &str {
        self.fragment.name(self.fragment.root()).unwrap_or_default()
    }

    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.fragment.attribute(self.fragment.root(), key)
    }

    pub fn text_content(&self) -> String {
        self.fragment.text_content(self.fragment.root())
    }

    /// The fragment arena rooted at this element
    pub fn as_document(&self) -> &Document {
        &self.fragment
    }
}

impl PartialEq for Element {
    fn eq(&self, other: &Self) -> bool {
        self.fragment.to_string() == other.fragment.to_string()
    }
}

impl fmt::Display for Element {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.fragment.fmt(f)
    }
}
