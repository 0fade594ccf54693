//! Arena document tree
//!
//! All nodes of a parsed document live in one arena owned by the `Document`
//! and are addressed by `NodeId` indices; the five navigation links (parent,
//! first/last child, prev/next sibling) are indices too, which sidesteps
//! ownership cycles entirely. Names, payloads, and attributes are interned,
//! so node records are cheap to copy around and selectors compare symbols
//! instead of strings.

use lasso::{Spur, ThreadedRodeo};
use std::cell::RefCell;
use tracing::trace;

use crate::nodeset::QueryError;

/// Index of a node in its document's arena.
pub type NodeId = usize;

/// The kind of a document node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKind {
    /// The document root. Exactly one per `Document`.
    Document,
    /// A `<!DOCTYPE ...>` declaration.
    Doctype,
    /// An element, e.g. `<div class="x">`.
    Element,
    /// Character data.
    Text,
    /// A `<!-- ... -->` comment.
    Comment,
}

/// Storage for a single node.
///
/// `data` is the element or doctype name, or the text/comment payload.
#[derive(Debug, Clone)]
struct NodeData {
    kind: NodeKind,
    data: Spur,
    attrs: Vec<(Spur, Spur)>,
    parent: Option<NodeId>,
    first_child: Option<NodeId>,
    last_child: Option<NodeId>,
    prev_sibling: Option<NodeId>,
    next_sibling: Option<NodeId>,
}

/// A parsed document owning its node arena and string pool.
///
/// Navigation goes through `&Document`; the query engine only ever reads the
/// links, except for the single sanctioned write path used by
/// `children_as_text`. The arena sits behind a `RefCell` so that write path
/// can synthesize nodes through a shared reference; accessors copy link
/// fields out under a short borrow and never hand out a guard.
#[derive(Debug)]
pub struct Document {
    nodes: RefCell<Vec<NodeData>>,
    strings: ThreadedRodeo,
}

impl Document {
    /// Create a document containing only its root node.
    pub fn new() -> Self {
        let strings = ThreadedRodeo::new();
        let empty = strings.get_or_intern_static("");
        let root = NodeData {
            kind: NodeKind::Document,
            data: empty,
            attrs: Vec::new(),
            parent: None,
            first_child: None,
            last_child: None,
            prev_sibling: None,
            next_sibling: None,
        };
        Self {
            nodes: RefCell::new(vec![root]),
            strings,
        }
    }

    /// The document root node.
    pub fn root(&self) -> NodeId {
        0
    }

    /// Number of nodes in the arena, synthesized nodes included.
    pub fn len(&self) -> usize {
        self.nodes.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.borrow().is_empty()
    }

    pub fn kind(&self, id: NodeId) -> NodeKind {
        self.nodes.borrow()[id].kind
    }

    /// The node's name (elements, doctypes) or payload (text, comments).
    pub fn data(&self, id: NodeId) -> &str {
        let sym = self.nodes.borrow()[id].data;
        self.strings.resolve(&sym)
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes.borrow()[id].parent
    }

    pub fn first_child(&self, id: NodeId) -> Option<NodeId> {
        self.nodes.borrow()[id].first_child
    }

    pub fn last_child(&self, id: NodeId) -> Option<NodeId> {
        self.nodes.borrow()[id].last_child
    }

    pub fn prev_sibling(&self, id: NodeId) -> Option<NodeId> {
        self.nodes.borrow()[id].prev_sibling
    }

    pub fn next_sibling(&self, id: NodeId) -> Option<NodeId> {
        self.nodes.borrow()[id].next_sibling
    }

    /// Iterate over a node's children in document order.
    pub fn children(&self, id: NodeId) -> Children<'_> {
        Children {
            doc: self,
            next: self.first_child(id),
        }
    }

    /// Attribute `name`'s value on an element node.
    ///
    /// Fails with `InvalidNode` on non-elements and `NotFound` when the
    /// attribute is absent.
    pub fn attr(&self, id: NodeId, name: &str) -> Result<&str, QueryError> {
        if self.kind(id) != NodeKind::Element {
            return Err(QueryError::InvalidNode);
        }
        let key = self.strings.get(name).ok_or(QueryError::NotFound)?;
        match self.attr_sym(id, key) {
            Some(val) => Ok(self.strings.resolve(&val)),
            None => Err(QueryError::NotFound),
        }
    }

    /// Attribute pairs of an element, in document order.
    pub fn attr_pairs(&self, id: NodeId) -> Vec<(&str, &str)> {
        let pairs = self.nodes.borrow()[id].attrs.clone();
        pairs
            .into_iter()
            .map(|(k, v)| (self.strings.resolve(&k), self.strings.resolve(&v)))
            .collect()
    }

    /// First child of the given kind, scanning forward.
    pub fn first_child_of_kind(&self, id: NodeId, kind: NodeKind) -> Option<NodeId> {
        let mut cur = self.first_child(id);
        while let Some(c) = cur {
            if self.kind(c) == kind {
                return Some(c);
            }
            cur = self.next_sibling(c);
        }
        None
    }

    /// Last child of the given kind, scanning backward.
    pub fn last_child_of_kind(&self, id: NodeId, kind: NodeKind) -> Option<NodeId> {
        let mut cur = self.last_child(id);
        while let Some(c) = cur {
            if self.kind(c) == kind {
                return Some(c);
            }
            cur = self.prev_sibling(c);
        }
        None
    }

    /// Add an element node to the arena, unlinked.
    pub fn new_element<'a>(
        &self,
        name: &str,
        attrs: impl IntoIterator<Item = (&'a str, &'a str)>,
    ) -> NodeId {
        let attrs = attrs
            .into_iter()
            .map(|(k, v)| (self.strings.get_or_intern(k), self.strings.get_or_intern(v)))
            .collect();
        self.push(NodeKind::Element, name, attrs)
    }

    /// Add a text node to the arena, unlinked.
    pub fn new_text(&self, text: &str) -> NodeId {
        self.push(NodeKind::Text, text, Vec::new())
    }

    /// Add a comment node to the arena, unlinked.
    pub fn new_comment(&self, text: &str) -> NodeId {
        self.push(NodeKind::Comment, text, Vec::new())
    }

    /// Add a doctype node to the arena, unlinked.
    pub fn new_doctype(&self, name: &str) -> NodeId {
        self.push(NodeKind::Doctype, name, Vec::new())
    }

    /// Link `child` as the last child of `parent`.
    pub fn append_child(&self, parent: NodeId, child: NodeId) {
        let mut nodes = self.nodes.borrow_mut();
        let prev = nodes[parent].last_child;
        nodes[child].parent = Some(parent);
        nodes[child].prev_sibling = prev;
        match prev {
            Some(p) => nodes[p].next_sibling = Some(child),
            None => nodes[parent].first_child = Some(child),
        }
        nodes[parent].last_child = Some(child);
    }

    fn push(&self, kind: NodeKind, data: &str, attrs: Vec<(Spur, Spur)>) -> NodeId {
        let sym = self.strings.get_or_intern(data);
        let mut nodes = self.nodes.borrow_mut();
        let id = nodes.len();
        nodes.push(NodeData {
            kind,
            data: sym,
            attrs,
            parent: None,
            first_child: None,
            last_child: None,
            prev_sibling: None,
            next_sibling: None,
        });
        id
    }

    /// Create a text node linked to `parent` only; it is not inserted into
    /// the parent's child list.
    pub(crate) fn new_text_of(&self, parent: NodeId, text: &str) -> NodeId {
        let id = self.new_text(text);
        self.nodes.borrow_mut()[id].parent = Some(parent);
        id
    }

    /// Replace `parent`'s child list with exactly `child`.
    ///
    /// The single write path into an otherwise read-only tree. Must not run
    /// while another visitor is reading the same subtree.
    pub(crate) fn replace_children(&self, parent: NodeId, child: NodeId) {
        trace!(parent, child, "replacing children with synthesized text node");
        let mut nodes = self.nodes.borrow_mut();
        nodes[parent].first_child = Some(child);
        nodes[parent].last_child = Some(child);
        nodes[child].parent = Some(parent);
        nodes[child].prev_sibling = None;
        nodes[child].next_sibling = None;
    }

    pub(crate) fn data_sym(&self, id: NodeId) -> Spur {
        self.nodes.borrow()[id].data
    }

    /// Resolve a string to its pool symbol, if it was ever interned.
    pub(crate) fn lookup(&self, s: &str) -> Option<Spur> {
        self.strings.get(s)
    }

    /// Whether the node's name or payload equals `s`, by symbol compare.
    pub(crate) fn data_is(&self, id: NodeId, s: &str) -> bool {
        match self.lookup(s) {
            Some(sym) => self.data_sym(id) == sym,
            None => false,
        }
    }

    pub(crate) fn attr_sym(&self, id: NodeId, key: Spur) -> Option<Spur> {
        self.nodes.borrow()[id]
            .attrs
            .iter()
            .find(|(k, _)| *k == key)
            .map(|(_, v)| *v)
    }
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

/// Iterator over a node's children.
pub struct Children<'d> {
    doc: &'d Document,
    next: Option<NodeId>,
}

impl Iterator for Children<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<NodeId> {
        let id = self.next?;
        self.next = self.doc.next_sibling(id);
        Some(id)
    }
}
