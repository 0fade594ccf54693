//! Text rendering and scalar extraction
//!
//! Rendering is a normalization policy, not raw concatenation: every text
//! fragment is trimmed, consecutive non-empty fragments are joined by a
//! single space, and closing a `<p>` appends a newline and resets the
//! separator state. Whitespace-only fragments contribute nothing.

use atoi::FromRadix10Signed;

use crate::nodeset::{NodeSet, QueryError};
use crate::tree::{Document, NodeId, NodeKind};

/// Depth bound for the recursive renderer.
const MAX_TEXT_DEPTH: usize = 1024;

const TRIMMED: &[char] = &[' ', '\t', '\r', '\n'];

struct TextPrinter {
    out: String,
    midline: bool,
}

impl TextPrinter {
    fn fragment(&mut self, text: &str) {
        if text.is_empty() {
            return;
        }
        if self.midline {
            self.out.push(' ');
        } else {
            self.midline = true;
        }
        self.out.push_str(text);
    }

    fn node(&mut self, doc: &Document, id: NodeId, depth: usize) -> Result<(), QueryError> {
        if depth > MAX_TEXT_DEPTH {
            return Err(QueryError::DepthLimit);
        }
        if doc.kind(id) == NodeKind::Text {
            self.fragment(doc.data(id).trim_matches(TRIMMED));
            return Ok(());
        }
        let mut child = doc.first_child(id);
        while let Some(c) = child {
            self.node(doc, c, depth + 1)?;
            child = doc.next_sibling(c);
        }
        if doc.kind(id) == NodeKind::Element && doc.data_is(id, "p") {
            self.out.push('\n');
            self.midline = false;
        }
        Ok(())
    }
}

/// Render the normalized text of a node's subtree.
pub fn render_text(doc: &Document, id: NodeId) -> Result<String, QueryError> {
    let mut printer = TextPrinter {
        out: String::new(),
        midline: false,
    };
    printer.node(doc, id, 0)?;
    Ok(printer.out)
}

/// The raw payload of a text node; `NotTextNode` for anything else.
pub fn exact_text(doc: &Document, id: NodeId) -> Result<&str, QueryError> {
    if doc.kind(id) == NodeKind::Text {
        Ok(doc.data(id))
    } else {
        Err(QueryError::NotTextNode)
    }
}

impl<'d> NodeSet<'d> {
    /// Rendered text of the set's first node.
    pub fn text(self) -> Result<String, QueryError> {
        let doc = self.doc();
        let id = self.first()?;
        render_text(doc, id)
    }

    /// Raw payload of the set's first node, which must be a text node.
    pub fn exact_text(self) -> Result<&'d str, QueryError> {
        let doc = self.doc();
        let id = self.first()?;
        exact_text(doc, id)
    }

    /// Attribute `name`'s value on the set's first node.
    pub fn attr_val(self, name: &str) -> Result<&'d str, QueryError> {
        let doc = self.doc();
        let id = self.first()?;
        doc.attr(id, name)
    }

    /// The `href` attribute of the set's first node.
    pub fn href_val(self) -> Result<&'d str, QueryError> {
        self.attr_val("href")
    }

    /// Rendered text parsed as an integer; thousands separators tolerated.
    pub fn int(self) -> Result<i64, QueryError> {
        let text = self.text()?;
        parse_int(&text)
    }

    /// Rendered text matched against `format` and parsed as an integer.
    ///
    /// The format is a literal prefix and suffix around a single `%d` (or
    /// `%v`) hole, with `%%` escaping a percent sign: `scan_int("(%d)")` on
    /// `"(1,024)"` yields 1024. Text that doesn't carry the prefix and
    /// suffix fails with `UnmatchedFormat`.
    pub fn scan_int(self, format: &str) -> Result<i64, QueryError> {
        let (prefix, suffix) = parse_format(format)?;
        let text = self.text()?;
        match text
            .strip_prefix(&prefix)
            .and_then(|t| t.strip_suffix(&suffix))
        {
            Some(body) => parse_int(body),
            None => Err(QueryError::UnmatchedFormat),
        }
    }

    /// Rendered text parsed as a float with an optional `k`/`K` thousands
    /// suffix: `"1.5k"` yields 1500.0.
    pub fn united_float(self) -> Result<f64, QueryError> {
        let text = self.text()?;
        if text.is_empty() {
            return Err(QueryError::EmptyText);
        }
        let (body, unit) = match text.as_bytes()[text.len() - 1] {
            b'k' | b'K' => (&text[..text.len() - 1], 1000.0),
            _ => (text.as_str(), 1.0),
        };
        let value: f64 = body
            .parse()
            .map_err(|_| QueryError::Number(text.clone()))?;
        Ok(value * unit)
    }
}

fn parse_int(text: &str) -> Result<i64, QueryError> {
    let digits = text.replace(',', "");
    let (value, used) = i64::from_radix_10_signed(digits.as_bytes());
    let has_digit = digits.bytes().any(|b| b.is_ascii_digit());
    if !has_digit || used != digits.len() {
        return Err(QueryError::Number(text.to_string()));
    }
    Ok(value)
}

/// Split a scan format into the literal prefix and suffix around its hole.
fn parse_format(format: &str) -> Result<(String, String), QueryError> {
    let pos = format
        .find("%d")
        .or_else(|| format.find("%v"))
        .ok_or_else(|| QueryError::InvalidFormat(format.to_string()))?;
    let prefix = format[..pos].replace("%%", "%");
    let suffix = format[pos + 2..].replace("%%", "%");
    Ok((prefix, suffix))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_paragraphs() {
        let doc = Document::parse_str("<p>Hello</p><p>World</p>");
        assert_eq!(render_text(&doc, doc.root()).unwrap(), "Hello\nWorld\n");
    }

    #[test]
    fn test_render_joins_fragments_with_one_space() {
        let doc = Document::parse_str("<p>Hello <b>World</b></p>");
        assert_eq!(render_text(&doc, doc.root()).unwrap(), "Hello World\n");
    }

    #[test]
    fn test_render_skips_whitespace_only_fragments() {
        let doc = Document::parse_str("<div>  \n\t  <span>x</span>\n</div>");
        assert_eq!(render_text(&doc, doc.root()).unwrap(), "x");
    }

    #[test]
    fn test_render_resets_separator_after_paragraph() {
        // No spurious space before the fragment that follows a paragraph.
        let doc = Document::parse_str("<div><p>one</p>two</div>");
        assert_eq!(render_text(&doc, doc.root()).unwrap(), "one\ntwo");
    }

    #[test]
    fn test_render_depth_limit() {
        let doc = Document::new();
        let mut cur = doc.root();
        for _ in 0..1100 {
            let div = doc.new_element("div", []);
            doc.append_child(cur, div);
            cur = div;
        }
        doc.append_child(cur, doc.new_text("deep"));
        assert!(matches!(
            render_text(&doc, doc.root()),
            Err(QueryError::DepthLimit)
        ));
    }

    #[test]
    fn test_exact_text_polarity() {
        let doc = Document::parse_str("<span>payload</span>");
        let span = doc
            .query()
            .descendants_or_self()
            .element("span")
            .first()
            .unwrap();
        let text = doc.first_child(span).unwrap();

        assert_eq!(exact_text(&doc, text).unwrap(), "payload");
        assert!(matches!(
            exact_text(&doc, span),
            Err(QueryError::NotTextNode)
        ));
    }

    #[test]
    fn test_set_text_and_exact_text() {
        let doc = Document::parse_str("<table><tr><td>  padded  </td></tr></table>");
        let cells = doc.query().descendants_or_self().element("td");
        assert_eq!(cells.text().unwrap(), "padded");

        let raw = doc
            .query()
            .descendants_or_self()
            .element("td")
            .first_text_child()
            .exact_text()
            .unwrap();
        assert_eq!(raw, "  padded  ");
    }

    #[test]
    fn test_int_tolerates_commas() {
        let doc = Document::parse_str("<table><tr><td>1,234,567</td></tr></table>");
        let n = doc.query().descendants_or_self().element("td").int().unwrap();
        assert_eq!(n, 1_234_567);
    }

    #[test]
    fn test_int_rejects_garbage() {
        let doc = Document::parse_str("<table><tr><td>12 monkeys</td></tr></table>");
        let err = doc
            .query()
            .descendants_or_self()
            .element("td")
            .int()
            .unwrap_err();
        assert!(matches!(err, QueryError::Number(_)));
    }

    #[test]
    fn test_scan_int() {
        let doc = Document::parse_str("<table><tr><td>(1,024 results)</td></tr></table>");
        let n = doc
            .query()
            .descendants_or_self()
            .element("td")
            .scan_int("(%d results)")
            .unwrap();
        assert_eq!(n, 1024);
    }

    #[test]
    fn test_scan_int_unmatched_and_invalid() {
        let doc = Document::parse_str("<table><tr><td>42 items</td></tr></table>");
        let err = doc
            .query()
            .descendants_or_self()
            .element("td")
            .scan_int("%d results")
            .unwrap_err();
        assert!(matches!(err, QueryError::UnmatchedFormat));

        let doc = Document::parse_str("<table><tr><td>42</td></tr></table>");
        let err = doc
            .query()
            .descendants_or_self()
            .element("td")
            .scan_int("no hole")
            .unwrap_err();
        assert!(matches!(err, QueryError::InvalidFormat(_)));
    }

    #[test]
    fn test_scan_int_percent_escape() {
        let doc = Document::parse_str("<table><tr><td>97%</td></tr></table>");
        let n = doc
            .query()
            .descendants_or_self()
            .element("td")
            .scan_int("%d%%")
            .unwrap();
        assert_eq!(n, 97);
    }

    #[test]
    fn test_united_float() {
        let doc = Document::parse_str("<table><tr><td>1.5k</td></tr></table>");
        let v = doc
            .query()
            .descendants_or_self()
            .element("td")
            .united_float()
            .unwrap();
        assert_eq!(v, 1500.0);

        let doc = Document::parse_str("<table><tr><td>2.25</td></tr></table>");
        let v = doc
            .query()
            .descendants_or_self()
            .element("td")
            .united_float()
            .unwrap();
        assert_eq!(v, 2.25);
    }

    #[test]
    fn test_united_float_empty_text() {
        let doc = Document::parse_str("<table><tr><td></td></tr></table>");
        let err = doc
            .query()
            .descendants_or_self()
            .element("td")
            .united_float()
            .unwrap_err();
        assert!(matches!(err, QueryError::EmptyText));
    }

    #[test]
    fn test_attr_val() {
        let doc = Document::parse_str(r#"<a href="/docs">docs</a>"#);
        let href = doc
            .query()
            .descendants_or_self()
            .element("a")
            .href_val()
            .unwrap();
        assert_eq!(href, "/docs");
    }
}
