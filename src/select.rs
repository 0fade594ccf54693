//! Convenience selectors
//!
//! One-line applications of the generic filter operator: element names,
//! attribute equality, class containment, and text predicates. Queried
//! names are resolved to pool symbols once, when the selector is built, so
//! the per-node check is a symbol compare.

use memchr::memchr;

use crate::nodeset::NodeSet;
use crate::tree::NodeKind;

/// Whether `v` appears in a space-separated class list.
pub fn contains_class(list: &str, v: &str) -> bool {
    let mut rest = list.as_bytes();
    let target = v.as_bytes();
    loop {
        match memchr(b' ', rest) {
            None => return rest == target,
            Some(pos) => {
                if &rest[..pos] == target {
                    return true;
                }
                rest = &rest[pos + 1..];
            }
        }
    }
}

impl<'d> NodeSet<'d> {
    /// Elements with the given tag name.
    pub fn element(self, name: &str) -> Self {
        let sym = self.doc().lookup(name);
        self.filter(move |doc, id| {
            doc.kind(id) == NodeKind::Element && Some(doc.data_sym(id)) == sym
        })
    }

    /// Elements whose attribute `name` equals `value`.
    pub fn attr_eq(self, name: &str, value: &str) -> Self {
        let key = self.doc().lookup(name);
        let val = self.doc().lookup(value);
        self.filter(move |doc, id| {
            doc.kind(id) == NodeKind::Element
                && match (key, val) {
                    (Some(k), Some(v)) => doc.attr_sym(id, k) == Some(v),
                    _ => false,
                }
        })
    }

    /// Elements whose `class` attribute equals `v` exactly.
    pub fn class(self, v: &str) -> Self {
        self.attr_eq("class", v)
    }

    /// The element whose `id` attribute equals `v`, collapsed to one node.
    pub fn id(self, v: &str) -> Self {
        self.attr_eq("id", v).one()
    }

    /// Elements whose `href` attribute equals `v`.
    pub fn href(self, v: &str) -> Self {
        self.attr_eq("href", v)
    }

    /// Elements whose space-separated `class` list contains `v`.
    pub fn contains_class(self, v: &str) -> Self {
        let v = v.to_owned();
        self.filter(move |doc, id| match doc.attr(id, "class") {
            Ok(list) => contains_class(list, &v),
            Err(_) => false,
        })
    }

    /// Text nodes whose payload equals `text`.
    pub fn equal_text(self, text: &str) -> Self {
        let sym = self.doc().lookup(text);
        self.filter(move |doc, id| {
            doc.kind(id) == NodeKind::Text && Some(doc.data_sym(id)) == sym
        })
    }

    /// Text nodes whose payload contains `text`.
    pub fn contains_text(self, text: &str) -> Self {
        let text = text.to_owned();
        self.filter(move |doc, id| {
            doc.kind(id) == NodeKind::Text && doc.data(id).contains(&text)
        })
    }

    /// Nodes whose single child is a text node equal to `text`.
    pub fn child_equal_text(self, text: &str) -> Self {
        let sym = self.doc().lookup(text);
        self.filter(move |doc, id| {
            let Some(c) = doc.first_child(id) else {
                return false;
            };
            doc.next_sibling(c).is_none()
                && doc.kind(c) == NodeKind::Text
                && Some(doc.data_sym(c)) == sym
        })
    }

    pub fn div(self) -> Self {
        self.element("div")
    }

    pub fn span(self) -> Self {
        self.element("span")
    }

    pub fn a(self) -> Self {
        self.element("a")
    }

    pub fn img(self) -> Self {
        self.element("img")
    }

    pub fn ol(self) -> Self {
        self.element("ol")
    }

    pub fn ul(self) -> Self {
        self.element("ul")
    }

    pub fn li(self) -> Self {
        self.element("li")
    }

    pub fn td(self) -> Self {
        self.element("td")
    }

    pub fn nav(self) -> Self {
        self.element("nav")
    }

    pub fn h1(self) -> Self {
        self.element("h1")
    }

    pub fn h2(self) -> Self {
        self.element("h2")
    }

    pub fn h3(self) -> Self {
        self.element("h3")
    }

    pub fn h4(self) -> Self {
        self.element("h4")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nodeset::QueryError;
    use crate::tree::Document;

    const PAGE: &str = concat!(
        r#"<nav id="top"><a href="/home" class="link active">Home</a>"#,
        r#"<a href="/docs" class="link">Docs</a></nav>"#,
        r#"<div class="content"><h1>Title</h1><span>42</span></div>"#,
    );

    #[test]
    fn test_contains_class_scan() {
        assert!(contains_class("link", "link"));
        assert!(contains_class("link active", "link"));
        assert!(contains_class("link active", "active"));
        assert!(!contains_class("link active", "act"));
        assert!(!contains_class("linkactive", "link"));
        assert!(!contains_class("", "link"));
    }

    #[test]
    fn test_element_selector() {
        let doc = Document::parse_str(PAGE);
        let anchors = doc.query().descendants_or_self().a().collect().unwrap();
        assert_eq!(anchors.len(), 2);

        // A name absent from the whole document matches nothing.
        let none = doc
            .query()
            .descendants_or_self()
            .element("video")
            .collect()
            .unwrap();
        assert!(none.is_empty());
    }

    #[test]
    fn test_attr_and_class_selectors() {
        let doc = Document::parse_str(PAGE);
        let home = doc
            .query()
            .descendants_or_self()
            .href("/home")
            .only()
            .unwrap();
        assert_eq!(doc.data(home), "a");

        let content = doc
            .query()
            .descendants_or_self()
            .class("content")
            .only()
            .unwrap();
        assert_eq!(doc.data(content), "div");

        // Exact-match class selector does not split the list.
        let none = doc
            .query()
            .descendants_or_self()
            .class("link")
            .collect()
            .unwrap();
        assert!(none.is_empty());

        let links = doc
            .query()
            .descendants_or_self()
            .contains_class("link")
            .collect()
            .unwrap();
        assert_eq!(links.len(), 2);
    }

    #[test]
    fn test_id_collapses_to_one() {
        let doc = Document::parse_str(PAGE);
        let nav = doc.query().descendants_or_self().id("top");
        assert_eq!(nav.cached_len(), Some(1));
        assert_eq!(doc.data(nav.first().unwrap()), "nav");

        let missing = doc.query().descendants_or_self().id("absent");
        assert!(matches!(
            missing.collect(),
            Err(QueryError::NotFound)
        ));
    }

    #[test]
    fn test_text_predicates() {
        let doc = Document::parse_str(PAGE);
        let hit = doc
            .query()
            .descendants_or_self()
            .equal_text("Docs")
            .only()
            .unwrap();
        assert_eq!(doc.data(hit), "Docs");

        let partial = doc
            .query()
            .descendants_or_self()
            .contains_text("ocs")
            .only()
            .unwrap();
        assert_eq!(partial, hit);

        let title = doc
            .query()
            .descendants_or_self()
            .child_equal_text("Title")
            .only()
            .unwrap();
        assert_eq!(doc.data(title), "h1");
    }

    #[test]
    fn test_selector_chain() {
        let doc = Document::parse_str(PAGE);
        let value = doc
            .query()
            .descendants_or_self()
            .div()
            .child()
            .span()
            .int()
            .unwrap();
        assert_eq!(value, 42);
    }
}
