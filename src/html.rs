//! HTML parsing front end and sources
//!
//! Parsing itself is delegated to `scraper` (html5ever underneath); this
//! module converts the parsed tree into the arena `Document` the query
//! engine navigates, and provides the file/reader/bytes sources that feed
//! it. Gzip-compressed files are decompressed transparently.

use std::collections::VecDeque;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use flate2::read::GzDecoder;
use scraper::Html;
use scraper::node::Node as HtmlNode;
use tracing::debug;

use crate::nodeset::QueryError;
use crate::tree::{Document, NodeId, NodeKind};

impl Document {
    /// Parse an HTML string into a document tree.
    ///
    /// The parser is error-recovering: malformed markup yields the repaired
    /// tree a browser would build, never a failure.
    pub fn parse_str(input: &str) -> Document {
        let html = Html::parse_document(input);
        let doc = Document::new();
        let mut queue = VecDeque::new();
        queue.push_back((html.tree.root(), doc.root()));
        while let Some((node, parent)) = queue.pop_front() {
            for child in node.children() {
                match child.value() {
                    HtmlNode::Element(el) => {
                        let id = doc.new_element(el.name(), el.attrs());
                        doc.append_child(parent, id);
                        queue.push_back((child, id));
                    }
                    HtmlNode::Text(t) => {
                        let id = doc.new_text(&t.text);
                        doc.append_child(parent, id);
                    }
                    HtmlNode::Comment(c) => {
                        let id = doc.new_comment(&c.comment);
                        doc.append_child(parent, id);
                    }
                    HtmlNode::Doctype(d) => {
                        let id = doc.new_doctype(d.name());
                        doc.append_child(parent, id);
                    }
                    _ => {}
                }
            }
        }
        debug!(nodes = doc.len(), "parsed HTML document");
        doc
    }

    /// Parse raw bytes, decoding as UTF-8 with replacement.
    pub fn parse_bytes(bytes: &[u8]) -> Document {
        Document::parse_str(&String::from_utf8_lossy(bytes))
    }

    /// Parse everything a reader yields.
    pub fn parse_reader(mut reader: impl Read) -> Result<Document, QueryError> {
        let mut buf = Vec::new();
        reader.read_to_end(&mut buf)?;
        Ok(Document::parse_bytes(&buf))
    }

    /// Parse an HTML file; `.gz` files are decompressed transparently.
    pub fn parse_file(path: impl AsRef<Path>) -> Result<Document, QueryError> {
        let path = path.as_ref();
        let file = File::open(path)?;
        if path.extension().is_some_and(|ext| ext == "gz") {
            Document::parse_reader(GzDecoder::new(file))
        } else {
            Document::parse_reader(file)
        }
    }
}

/// Elements serialized without a closing tag.
const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta",
    "source", "track", "wbr",
];

/// Serialize a node's subtree back to HTML.
pub fn render_html(doc: &Document, id: NodeId) -> String {
    let mut out = String::new();
    write_node(doc, id, &mut out);
    out
}

fn write_node(doc: &Document, id: NodeId, out: &mut String) {
    match doc.kind(id) {
        NodeKind::Document => {
            for child in doc.children(id) {
                write_node(doc, child, out);
            }
        }
        NodeKind::Doctype => {
            out.push_str("<!DOCTYPE ");
            out.push_str(doc.data(id));
            out.push('>');
        }
        NodeKind::Element => {
            let name = doc.data(id);
            out.push('<');
            out.push_str(name);
            for (key, value) in doc.attr_pairs(id) {
                out.push(' ');
                out.push_str(key);
                out.push_str("=\"");
                escape_into(value, true, out);
                out.push('"');
            }
            out.push('>');
            if VOID_ELEMENTS.contains(&name) {
                return;
            }
            for child in doc.children(id) {
                write_node(doc, child, out);
            }
            out.push_str("</");
            out.push_str(doc.data(id));
            out.push('>');
        }
        NodeKind::Text => escape_into(doc.data(id), false, out),
        NodeKind::Comment => {
            out.push_str("<!--");
            out.push_str(doc.data(id));
            out.push_str("-->");
        }
    }
}

fn escape_into(text: &str, in_attr: bool, out: &mut String) {
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' if in_attr => out.push_str("&quot;"),
            _ => out.push(c),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render_text;
    use flate2::Compression;
    use flate2::write::GzEncoder;
    use std::io::Write;

    #[test]
    fn test_parse_builds_expected_shape() {
        let doc = Document::parse_str("<div><p>A</p><p>B</p></div>");
        // Recovering parser supplies html/head/body.
        let html = doc.first_child(doc.root()).unwrap();
        assert_eq!(doc.kind(html), NodeKind::Element);
        assert_eq!(doc.data(html), "html");

        let body = doc.last_child(html).unwrap();
        assert_eq!(doc.data(body), "body");
        let div = doc.first_child(body).unwrap();
        assert_eq!(doc.data(div), "div");
        assert_eq!(doc.children(div).count(), 2);
    }

    #[test]
    fn test_parse_keeps_attributes_and_comments() {
        let doc = Document::parse_str(r#"<div id="x" class="a b"><!--note-->hi</div>"#);
        let div = doc
            .query()
            .descendants_or_self()
            .element("div")
            .first()
            .unwrap();
        assert_eq!(doc.attr(div, "id").unwrap(), "x");
        assert_eq!(doc.attr(div, "class").unwrap(), "a b");

        let kinds: Vec<_> = doc.children(div).map(|c| doc.kind(c)).collect();
        assert_eq!(kinds, vec![NodeKind::Comment, NodeKind::Text]);
    }

    #[test]
    fn test_parse_doctype() {
        let doc = Document::parse_str("<!DOCTYPE html><p>x</p>");
        let first = doc.first_child(doc.root()).unwrap();
        assert_eq!(doc.kind(first), NodeKind::Doctype);
        assert_eq!(doc.data(first), "html");
    }

    #[test]
    fn test_parse_bytes_lossy() {
        let doc = Document::parse_bytes(b"<div>ok\xffzz</div>");
        let text = doc.query().descendants_or_self().element("div").text().unwrap();
        assert!(text.starts_with("ok"));
        assert!(text.ends_with("zz"));
    }

    #[test]
    fn test_parse_file_and_gzip() {
        let dir = tempfile::tempdir().unwrap();

        let plain = dir.path().join("page.html");
        std::fs::write(&plain, "<p>plain</p>").unwrap();
        let doc = Document::parse_file(&plain).unwrap();
        assert_eq!(render_text(&doc, doc.root()).unwrap(), "plain\n");

        let zipped = dir.path().join("page.html.gz");
        let file = File::create(&zipped).unwrap();
        let mut enc = GzEncoder::new(file, Compression::default());
        enc.write_all(b"<p>zipped</p>").unwrap();
        enc.finish().unwrap();
        let doc = Document::parse_file(&zipped).unwrap();
        assert_eq!(render_text(&doc, doc.root()).unwrap(), "zipped\n");
    }

    #[test]
    fn test_parse_file_missing() {
        let err = Document::parse_file("/definitely/not/here.html").unwrap_err();
        assert!(matches!(err, QueryError::Io(_)));
    }

    #[test]
    fn test_render_html_round_trip() {
        let doc = Document::parse_str(r#"<div id="x"><p>a &amp; b</p><br></div>"#);
        let div = doc
            .query()
            .descendants_or_self()
            .element("div")
            .first()
            .unwrap();
        assert_eq!(
            render_html(&doc, div),
            r#"<div id="x"><p>a &amp; b</p><br></div>"#
        );
    }
}
