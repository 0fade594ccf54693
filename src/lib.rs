//! Domsearch: lazy node-set querying over HTML document trees
//!
//! A fluent, composable way to select, filter, navigate, and extract data
//! from parsed HTML. Operators wrap one another into a combinator chain;
//! nothing walks the tree until a collector drives the chain, and early
//! termination propagates through arbitrarily deep operator stacks.
//!
//! ```
//! use domsearch::Document;
//!
//! let doc = Document::parse_str(
//!     r#"<ul id="menu"><li>alpha</li><li>beta</li></ul>"#,
//! );
//! let items = doc.query().descendants_or_self().li().collect().unwrap();
//! assert_eq!(items.len(), 2);
//!
//! let first = doc.query().descendants_or_self().id("menu").child().text();
//! assert_eq!(first.unwrap(), "alpha");
//! ```

pub mod html; // Parsing front end, sources, and HTML serialization
pub mod nodeset; // Lazy combinator chains, node sets, collectors
pub mod select; // Element/attribute/class/text selectors
pub mod text; // Text normalization and scalar extraction
pub mod tree; // Arena document tree

// Re-exports for convenience
pub use html::render_html;
pub use nodeset::{Flow, NodeSet, QueryError};
pub use select::contains_class;
pub use text::{exact_text, render_text};
pub use tree::{Document, NodeId, NodeKind};
