//! Lazy node-set combinators
//!
//! A `NodeSet` pairs a combinator chain with a carried failure. Every
//! operator wraps its upstream chain and returns a new set; nothing touches
//! the tree until a collector drives the chain, and early termination
//! propagates through arbitrarily deep operator stacks. Chains are stateless
//! apart from the fixed-list variant: driving one twice re-derives the same
//! sequence from the tree.

use thiserror::Error;

use crate::text::render_text;
use crate::tree::{Document, NodeId, NodeKind};

/// Cap on the explicit stacks used by deep scans and level descents.
const MAX_WALK_STACK: usize = 1 << 16;

/// Failures carried on a node set and returned by collectors.
#[derive(Debug, Error)]
pub enum QueryError {
    /// A navigational step or predicate found nothing.
    #[error("no matching node")]
    NotFound,
    /// An exactly-one collection saw a second match.
    #[error("too many nodes")]
    TooManyNodes,
    /// An operation required a node kind it didn't get, e.g. reading an
    /// attribute off a non-element.
    #[error("operation not valid for this node kind")]
    InvalidNode,
    /// Text-only extraction on a non-text node.
    #[error("not a text node")]
    NotTextNode,
    /// A walk or render exceeded its depth bound.
    #[error("depth limit exceeded")]
    DepthLimit,
    #[error("empty text")]
    EmptyText,
    /// A scan format with no `%d`/`%v` hole.
    #[error("invalid scan format: {0}")]
    InvalidFormat(String),
    /// Text did not match the scan format's prefix and suffix.
    #[error("text does not match scan format")]
    UnmatchedFormat,
    #[error("invalid number: {0}")]
    Number(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Per-node signal returned by visitors driving a node set.
///
/// `Prune` stops deriving further nodes from the current derivation unit:
/// in a deep scan it skips the node's descendants but continues with its
/// siblings, in an all-siblings scan it ends one input node's run without
/// affecting the rest, and where a derivation yields a single node it is
/// the same as `Continue`. `Break` stops the entire enumeration.
#[derive(Debug)]
pub enum Flow {
    Continue,
    Prune,
    Break,
    /// Abort the enumeration; the error surfaces from the collector.
    Fail(QueryError),
}

impl Flow {
    /// Prune has no descendants to skip after a single derived node.
    fn absorb_prune(self) -> Flow {
        match self {
            Flow::Prune => Flow::Continue,
            other => other,
        }
    }
}

type Predicate<'d> = Box<dyn Fn(&Document, NodeId) -> bool + 'd>;

/// One combinator per variant, each owning its upstream chain.
enum Chain<'d> {
    /// A single node.
    One(NodeId),
    /// A materialized list with known length.
    Fixed(Vec<NodeId>),
    /// Pre-order walk of each input node's subtree, the node itself first.
    Deep(Box<Chain<'d>>),
    /// Descendants at exactly `level` below each input node.
    Descend { upstream: Box<Chain<'d>>, level: usize },
    /// Ancestor exactly `level` above each input node.
    Ascend { upstream: Box<Chain<'d>>, level: usize },
    /// Sibling exactly `delta` steps away (positive = next, negative = prev).
    Sibling { upstream: Box<Chain<'d>>, delta: i32 },
    /// All siblings before each input node, nearest first.
    PrevSiblings(Box<Chain<'d>>),
    /// All siblings after each input node, nearest first.
    NextSiblings(Box<Chain<'d>>),
    /// First child of the given kind per input node.
    FirstChildOf { upstream: Box<Chain<'d>>, kind: NodeKind },
    /// Last child of the given kind per input node.
    LastChildOf { upstream: Box<Chain<'d>>, kind: NodeKind },
    /// Forward only the nodes the predicate accepts.
    Filter { upstream: Box<Chain<'d>>, pred: Predicate<'d> },
    /// Synthesize a text node from each input node's rendered text.
    TextOf { upstream: Box<Chain<'d>>, replace: bool },
}

impl<'d> Chain<'d> {
    fn cached_len(&self) -> Option<usize> {
        match self {
            Chain::One(_) => Some(1),
            Chain::Fixed(nodes) => Some(nodes.len()),
            _ => None,
        }
    }

    /// Push every node this chain represents through `visit`.
    ///
    /// A non-`Continue` result from `visit` (or from an inner derivation)
    /// propagates to the caller; a node a filter rejects is simply not
    /// forwarded, so it can never terminate the enumeration.
    fn drive(&self, doc: &Document, visit: &mut dyn FnMut(NodeId) -> Flow) -> Flow {
        match self {
            Chain::One(id) => visit(*id).absorb_prune(),
            Chain::Fixed(nodes) => {
                for &id in nodes {
                    match visit(id) {
                        Flow::Continue | Flow::Prune => {}
                        stop => return stop,
                    }
                }
                Flow::Continue
            }
            Chain::Deep(upstream) => {
                upstream.drive(doc, &mut |id| deep_scan(doc, id, visit))
            }
            Chain::Descend { upstream, level } => {
                let level = *level;
                upstream.drive(doc, &mut |id| descend_level(doc, id, level, visit))
            }
            Chain::Ascend { upstream, level } => {
                let level = *level;
                upstream.drive(doc, &mut |id| {
                    let mut cur = id;
                    for _ in 0..level {
                        match doc.parent(cur) {
                            Some(p) => cur = p,
                            // Ran out of ancestors: contributes nothing.
                            None => return Flow::Continue,
                        }
                    }
                    visit(cur).absorb_prune()
                })
            }
            Chain::Sibling { upstream, delta } => {
                let delta = *delta;
                upstream.drive(doc, &mut |id| {
                    let mut cur = id;
                    let mut left = delta;
                    while left > 0 {
                        match doc.next_sibling(cur) {
                            Some(s) => cur = s,
                            None => return Flow::Continue,
                        }
                        left -= 1;
                    }
                    while left < 0 {
                        match doc.prev_sibling(cur) {
                            Some(s) => cur = s,
                            None => return Flow::Continue,
                        }
                        left += 1;
                    }
                    visit(cur).absorb_prune()
                })
            }
            Chain::PrevSiblings(upstream) => {
                upstream.drive(doc, &mut |id| {
                    let mut cur = doc.prev_sibling(id);
                    while let Some(s) = cur {
                        match visit(s) {
                            Flow::Continue => {}
                            Flow::Prune => return Flow::Continue,
                            stop => return stop,
                        }
                        cur = doc.prev_sibling(s);
                    }
                    Flow::Continue
                })
            }
            Chain::NextSiblings(upstream) => {
                upstream.drive(doc, &mut |id| {
                    let mut cur = doc.next_sibling(id);
                    while let Some(s) = cur {
                        match visit(s) {
                            Flow::Continue => {}
                            Flow::Prune => return Flow::Continue,
                            stop => return stop,
                        }
                        cur = doc.next_sibling(s);
                    }
                    Flow::Continue
                })
            }
            Chain::FirstChildOf { upstream, kind } => {
                let kind = *kind;
                upstream.drive(doc, &mut |id| match doc.first_child_of_kind(id, kind) {
                    Some(c) => visit(c).absorb_prune(),
                    None => Flow::Continue,
                })
            }
            Chain::LastChildOf { upstream, kind } => {
                let kind = *kind;
                upstream.drive(doc, &mut |id| match doc.last_child_of_kind(id, kind) {
                    Some(c) => visit(c).absorb_prune(),
                    None => Flow::Continue,
                })
            }
            Chain::Filter { upstream, pred } => {
                upstream.drive(doc, &mut |id| {
                    if pred(doc, id) {
                        visit(id)
                    } else {
                        Flow::Continue
                    }
                })
            }
            Chain::TextOf { upstream, replace } => {
                let replace = *replace;
                upstream.drive(doc, &mut |id| {
                    let text = match render_text(doc, id) {
                        Ok(text) => text,
                        Err(e) => return Flow::Fail(e),
                    };
                    let node = doc.new_text_of(id, &text);
                    if replace {
                        doc.replace_children(id, node);
                    }
                    visit(node).absorb_prune()
                })
            }
        }
    }
}

/// Pre-order subtree walk with an explicit stack, honoring `Prune`.
fn deep_scan(doc: &Document, root: NodeId, visit: &mut dyn FnMut(NodeId) -> Flow) -> Flow {
    let mut stack = vec![root];
    while let Some(id) = stack.pop() {
        match visit(id) {
            Flow::Continue => {
                if stack.len() > MAX_WALK_STACK {
                    return Flow::Fail(QueryError::DepthLimit);
                }
                // Children pushed in reverse so the leftmost pops first.
                let mut child = doc.last_child(id);
                while let Some(c) = child {
                    stack.push(c);
                    child = doc.prev_sibling(c);
                }
            }
            Flow::Prune => {}
            stop => return stop,
        }
    }
    Flow::Continue
}

/// Visit descendants at exactly `level` below `root`, in document order.
fn descend_level(
    doc: &Document,
    root: NodeId,
    level: usize,
    visit: &mut dyn FnMut(NodeId) -> Flow,
) -> Flow {
    let mut stack = vec![(root, level)];
    while let Some((id, left)) = stack.pop() {
        if left == 0 {
            match visit(id) {
                Flow::Continue | Flow::Prune => continue,
                stop => return stop,
            }
        }
        if stack.len() > MAX_WALK_STACK {
            return Flow::Fail(QueryError::DepthLimit);
        }
        let mut child = doc.last_child(id);
        while let Some(c) = child {
            stack.push((c, left - 1));
            child = doc.prev_sibling(c);
        }
    }
    Flow::Continue
}

/// A lazy selection of nodes plus a carried failure.
///
/// Operators on a failed set are pass-through no-ops; the original error
/// reaches the terminal collector unwrapped. Sets are ephemeral values:
/// every operator consumes its input and yields a new set.
pub struct NodeSet<'d> {
    doc: &'d Document,
    chain: Chain<'d>,
    err: Option<QueryError>,
}

impl Document {
    /// The document root as a one-node set, the usual chain entry point.
    pub fn query(&self) -> NodeSet<'_> {
        NodeSet {
            doc: self,
            chain: Chain::One(self.root()),
            err: None,
        }
    }
}

impl<'d> NodeSet<'d> {
    /// Wrap an already-materialized node list; reports a cached length.
    pub fn from_nodes(doc: &'d Document, nodes: Vec<NodeId>) -> Self {
        NodeSet {
            doc,
            chain: Chain::Fixed(nodes),
            err: None,
        }
    }

    /// The document this set selects from.
    pub fn doc(&self) -> &'d Document {
        self.doc
    }

    pub fn is_ok(&self) -> bool {
        self.err.is_none()
    }

    /// The carried failure, if the chain has already failed.
    pub fn error(&self) -> Option<&QueryError> {
        self.err.as_ref()
    }

    /// Known length of a materialized set; `None` while the set is lazy.
    ///
    /// Only consulted to decide whether [`cached`](Self::cached) needs to
    /// collect; never used to steer enumeration.
    pub fn cached_len(&self) -> Option<usize> {
        if self.err.is_some() {
            return None;
        }
        self.chain.cached_len()
    }

    fn wrap(self, make: impl FnOnce(Box<Chain<'d>>) -> Chain<'d>) -> Self {
        if self.err.is_some() {
            return self;
        }
        NodeSet {
            doc: self.doc,
            chain: make(Box::new(self.chain)),
            err: None,
        }
    }

    /// Descendants at exactly `level` below each node (positive), the
    /// ancestor exactly `|level|` above (negative), or the set itself (0).
    ///
    /// A node whose tree is too shallow for the requested ascent contributes
    /// nothing; an empty result surfaces as `NotFound` at collection.
    pub fn children_at(self, level: i32) -> Self {
        if self.err.is_some() || level == 0 {
            return self;
        }
        if level > 0 {
            self.wrap(|upstream| Chain::Descend {
                upstream,
                level: level as usize,
            })
        } else {
            self.wrap(|upstream| Chain::Ascend {
                upstream,
                level: level.unsigned_abs() as usize,
            })
        }
    }

    /// Direct children of each node.
    pub fn child(self) -> Self {
        self.children_at(1)
    }

    /// Parent of each node.
    pub fn parent(self) -> Self {
        self.children_at(-1)
    }

    /// Ancestor `level` links above each node.
    pub fn parents_at(self, level: i32) -> Self {
        self.children_at(-level)
    }

    /// Every node of each input node's subtree, in document order, the
    /// input node itself first.
    pub fn descendants_or_self(self) -> Self {
        self.wrap(Chain::Deep)
    }

    /// Sibling exactly `delta` next-steps (or `|delta|` prev-steps) away
    /// from each node; `delta == 0` is the identity.
    pub fn sibling(self, delta: i32) -> Self {
        if self.err.is_some() || delta == 0 {
            return self;
        }
        self.wrap(|upstream| Chain::Sibling { upstream, delta })
    }

    /// All siblings strictly before each node, nearest first.
    pub fn prev_siblings(self) -> Self {
        self.wrap(Chain::PrevSiblings)
    }

    /// All siblings strictly after each node, nearest first.
    pub fn next_siblings(self) -> Self {
        self.wrap(Chain::NextSiblings)
    }

    /// First child of the given kind per node.
    pub fn first_child_of(self, kind: NodeKind) -> Self {
        self.wrap(|upstream| Chain::FirstChildOf { upstream, kind })
    }

    /// Last child of the given kind per node.
    pub fn last_child_of(self, kind: NodeKind) -> Self {
        self.wrap(|upstream| Chain::LastChildOf { upstream, kind })
    }

    pub fn first_text_child(self) -> Self {
        self.first_child_of(NodeKind::Text)
    }

    pub fn first_element_child(self) -> Self {
        self.first_child_of(NodeKind::Element)
    }

    pub fn last_text_child(self) -> Self {
        self.last_child_of(NodeKind::Text)
    }

    pub fn last_element_child(self) -> Self {
        self.last_child_of(NodeKind::Element)
    }

    /// Keep only the nodes the predicate accepts, in upstream order.
    pub fn filter(self, pred: impl Fn(&Document, NodeId) -> bool + 'd) -> Self {
        self.wrap(|upstream| Chain::Filter {
            upstream,
            pred: Box::new(pred),
        })
    }

    /// Replace each node with a synthesized text node carrying the node's
    /// rendered text. The synthetic node is linked to its source through the
    /// parent relation only, unless `replace` is set, in which case the
    /// source node's child list becomes exactly the synthetic node — the one
    /// sanctioned write into the tree.
    pub fn children_as_text(self, replace: bool) -> Self {
        self.wrap(|upstream| Chain::TextOf { upstream, replace })
    }

    /// Drive the chain once, pushing every selected node through `visit`.
    pub fn walk(self, mut visit: impl FnMut(NodeId) -> Flow) -> Result<(), QueryError> {
        if let Some(e) = self.err {
            return Err(e);
        }
        match self.chain.drive(self.doc, &mut visit) {
            Flow::Fail(e) => Err(e),
            _ => Ok(()),
        }
    }

    /// Collect all selected nodes in order.
    pub fn collect(self) -> Result<Vec<NodeId>, QueryError> {
        let mut out = Vec::new();
        self.walk(|id| {
            out.push(id);
            Flow::Continue
        })?;
        Ok(out)
    }

    /// The first selected node; enumeration stops after it.
    pub fn first(self) -> Result<NodeId, QueryError> {
        let mut found = None;
        self.walk(|id| {
            found = Some(id);
            Flow::Break
        })?;
        found.ok_or(QueryError::NotFound)
    }

    /// The single selected node. Fails with `TooManyNodes` on a second
    /// emission, inspecting at most two nodes.
    pub fn only(self) -> Result<NodeId, QueryError> {
        let mut found = None;
        let mut extra = false;
        self.walk(|id| {
            if found.is_none() {
                found = Some(id);
                Flow::Continue
            } else {
                extra = true;
                Flow::Break
            }
        })?;
        if extra {
            return Err(QueryError::TooManyNodes);
        }
        found.ok_or(QueryError::NotFound)
    }

    /// Collapse the set to its first node, eagerly.
    ///
    /// Identity on a set that already holds exactly one node or has failed;
    /// a set that yields nothing becomes a failed set carrying `NotFound`.
    pub fn one(self) -> Self {
        if self.err.is_some() || matches!(&self.chain, Chain::One(_)) {
            return self;
        }
        let doc = self.doc;
        match self.first() {
            Ok(id) => NodeSet {
                doc,
                chain: Chain::One(id),
                err: None,
            },
            Err(e) => NodeSet {
                doc,
                chain: Chain::Fixed(Vec::new()),
                err: Some(e),
            },
        }
    }

    /// Materialize the set into a cached list, unless it already reports a
    /// cached length. An explicit opt-in against repeated tree walks when a
    /// set will be consumed more than once.
    pub fn cached(self) -> Self {
        if self.err.is_some() || self.chain.cached_len().is_some() {
            return self;
        }
        let doc = self.doc;
        match self.collect() {
            Ok(nodes) => NodeSet {
                doc,
                chain: Chain::Fixed(nodes),
                err: None,
            },
            Err(e) => NodeSet {
                doc,
                chain: Chain::Fixed(Vec::new()),
                err: Some(e),
            },
        }
    }
}
