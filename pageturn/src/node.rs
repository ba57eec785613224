//! Owned, detached DOM subtrees.
//!
//! The differ deep-copies every node it wants inserted out of the fetched
//! document, which is thrown away right after the diff. These copies are the
//! payload of `Append`/`Replace` patches and get materialized into whatever
//! live document the patcher is driving.

use indexmap::IndexMap;

use crate::dom::Namespace;

/// DOM content - either an element, text, or comment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    /// An element node
    Element(Element),
    /// A text node
    Text(String),
    /// A comment node
    Comment(String),
}

impl Node {
    /// Get as element reference.
    pub fn as_element(&self) -> Option<&Element> {
        match self {
            Node::Element(e) => Some(e),
            _ => None,
        }
    }

    /// Get as text reference.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Node::Text(t) => Some(t),
            _ => None,
        }
    }

    /// True if this node is, or contains, an HTML `<script>` element.
    pub fn contains_script(&self) -> bool {
        match self {
            Node::Element(e) => e.is_script() || e.children.iter().any(Node::contains_script),
            _ => false,
        }
    }
}

/// An HTML/SVG/MathML element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
    /// The tag name (lowercase for HTML, case-preserved for SVG/MathML)
    pub tag: String,
    /// The namespace (Html, Svg, or MathMl)
    pub ns: Namespace,
    /// Attributes as key-value pairs (preserves insertion order)
    pub attrs: IndexMap<String, String>,
    /// Child nodes
    pub children: Vec<Node>,
}

impl Element {
    /// Create a new element with the given tag name in the HTML namespace.
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            ns: Namespace::Html,
            attrs: IndexMap::new(),
            children: Vec::new(),
        }
    }

    /// Builder-style child setter.
    pub fn with_child(mut self, child: Node) -> Self {
        self.children.push(child);
        self
    }

    pub fn is_script(&self) -> bool {
        self.ns == Namespace::Html && self.tag == "script"
    }

    /// Get text content of this element and all descendants.
    pub fn text_content(&self) -> String {
        let mut out = String::new();
        self.collect_text(&mut out);
        out
    }

    fn collect_text(&self, out: &mut String) {
        for child in &self.children {
            match child {
                Node::Text(t) => out.push_str(t),
                Node::Element(e) => e.collect_text(out),
                Node::Comment(_) => {}
            }
        }
    }
}
