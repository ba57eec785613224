//! HTML5 serialization for arena documents and detached nodes.

use indextree::NodeId;

use crate::dom::{Document, NodeKind};
use crate::node::{Element, Node};

/// HTML5 void elements that never have closing tags
pub(crate) fn is_void_element(tag: &str) -> bool {
    matches!(
        tag,
        "area"
            | "base"
            | "br"
            | "col"
            | "embed"
            | "hr"
            | "img"
            | "input"
            | "link"
            | "meta"
            | "param"
            | "source"
            | "track"
            | "wbr"
    )
}

/// Elements whose text children are written verbatim
fn is_raw_text_element(tag: &str) -> bool {
    matches!(
        tag,
        "script" | "style" | "xmp" | "iframe" | "noembed" | "noframes" | "plaintext"
    )
}

fn escape_text(out: &mut String, text: &str) {
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '\u{a0}' => out.push_str("&nbsp;"),
            _ => out.push(c),
        }
    }
}

fn escape_attr(out: &mut String, value: &str) {
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '"' => out.push_str("&quot;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '\u{a0}' => out.push_str("&nbsp;"),
            _ => out.push(c),
        }
    }
}

fn open_tag<'a>(out: &mut String, tag: &str, attrs: impl Iterator<Item = (&'a String, &'a String)>) {
    out.push('<');
    out.push_str(tag);
    for (name, value) in attrs {
        out.push(' ');
        out.push_str(name);
        out.push_str("=\"");
        escape_attr(out, value);
        out.push('"');
    }
    out.push('>');
}

impl Document {
    /// Serialize the children of `<body>` (no doctype, no head).
    pub fn to_html(&self) -> String {
        let mut output = String::new();
        if let Some(body) = self.body() {
            for child in self.children(body) {
                self.serialize_node(&mut output, child, false);
            }
        }
        output
    }

    /// Serialize the whole document, doctype included.
    pub fn to_document_html(&self) -> String {
        let mut output = String::new();
        if let Some(doctype) = &self.doctype {
            output.push_str("<!DOCTYPE ");
            output.push_str(doctype);
            output.push('>');
        }
        for child in self.children(self.document) {
            self.serialize_node(&mut output, child, false);
        }
        output
    }

    /// Serialize one node and its subtree.
    pub fn outer_html(&self, id: NodeId) -> String {
        let mut output = String::new();
        self.serialize_node(&mut output, id, false);
        output
    }

    fn serialize_node(&self, out: &mut String, node_id: NodeId, raw: bool) {
        match &self.get(node_id).kind {
            NodeKind::Document => {
                for child in self.children(node_id) {
                    self.serialize_node(out, child, false);
                }
            }
            NodeKind::Element(elem) => {
                let tag = elem.tag.as_str();
                open_tag(out, tag, elem.attrs.iter());
                if is_void_element(tag) {
                    return;
                }
                let raw = is_raw_text_element(tag);
                for child in self.children(node_id) {
                    self.serialize_node(out, child, raw);
                }
                out.push_str("</");
                out.push_str(tag);
                out.push('>');
            }
            NodeKind::Text(text) if raw => out.push_str(text),
            NodeKind::Text(text) => escape_text(out, text),
            NodeKind::Comment(text) => {
                out.push_str("<!--");
                out.push_str(text);
                out.push_str("-->");
            }
        }
    }
}

impl Node {
    /// Serialize this node and its subtree.
    pub fn to_html(&self) -> String {
        let mut out = String::new();
        self.write_html(&mut out, false);
        out
    }

    fn write_html(&self, out: &mut String, raw: bool) {
        match self {
            Node::Element(e) => e.write_html(out),
            Node::Text(t) if raw => out.push_str(t),
            Node::Text(t) => escape_text(out, t),
            Node::Comment(t) => {
                out.push_str("<!--");
                out.push_str(t);
                out.push_str("-->");
            }
        }
    }
}

impl Element {
    /// Serialize this element and its subtree.
    pub fn to_html(&self) -> String {
        let mut out = String::new();
        self.write_html(&mut out);
        out
    }

    fn write_html(&self, out: &mut String) {
        open_tag(out, &self.tag, self.attrs.iter());
        if is_void_element(&self.tag) {
            return;
        }
        let raw = is_raw_text_element(&self.tag);
        for child in &self.children {
            child.write_html(out, raw);
        }
        out.push_str("</");
        out.push_str(&self.tag);
        out.push('>');
    }
}
