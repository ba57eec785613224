//! Arena-based DOM.
//!
//! The same representation is used for the live document in host-side runs,
//! for documents parsed from fetched HTML, and for snapshots of the browser
//! DOM taken right before a diff.
//!
//! - **indextree Arena**: all nodes live in one contiguous allocation
//! - **Stable ids**: cloning a `Document` keeps every `NodeId` valid, so a
//!   snapshot and the live tree it was taken from share node identities

use indexmap::IndexMap;
use indextree::{Arena, NodeId};

use crate::node::{Element, Node};

/// Class added to `<body>` while a slow navigation is in flight.
pub const LOADING_CLASS: &str = "pageturn-loading";

/// A parsed or live HTML document.
#[derive(Debug, Clone)]
pub struct Document {
    /// THE tree - all nodes live here
    pub arena: Arena<NodeData>,

    /// Invisible document node, parent of the root element
    pub document: NodeId,

    /// Root element (usually `<html>`)
    pub root: NodeId,

    /// DOCTYPE if present (usually "html")
    pub doctype: Option<String>,

    focused: Option<NodeId>,
}

/// What goes in each arena slot
#[derive(Debug, Clone)]
pub struct NodeData {
    pub kind: NodeKind,
    pub ns: Namespace,
}

/// Node types
#[derive(Debug, Clone)]
pub enum NodeKind {
    /// Document root (invisible, parent of `<html>`)
    Document,
    /// Element with tag and attributes
    Element(ElementData),
    /// Text content
    Text(String),
    /// HTML comment
    Comment(String),
}

/// Element data (tag, attributes and the bits of live state the patcher touches)
#[derive(Debug, Clone, Default)]
pub struct ElementData {
    /// Lowercase local name for HTML, case-preserved for SVG/MathML
    pub tag: String,

    /// IndexMap preserves insertion order for consistent serialization
    pub attrs: IndexMap<String, String>,

    /// Live checkedness of a form control. `None` follows the `checked` attribute.
    pub checked: Option<bool>,

    /// The HTML "already started" flag of script elements. Scripts that came
    /// out of the parser or were imported wholesale never run again; scripts
    /// recreated by the patcher start out unset and are picked up by
    /// [`Document::take_pending_scripts`].
    pub already_started: bool,
}

impl ElementData {
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            ..Default::default()
        }
    }

    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs.get(name).map(String::as_str)
    }

    pub fn has_class(&self, class: &str) -> bool {
        self.attr("class")
            .is_some_and(|list| list.split_ascii_whitespace().any(|c| c == class))
    }
}

/// XML namespace
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Namespace {
    #[default]
    Html,
    Svg,
    MathMl,
}

impl Namespace {
    pub fn from_url(url: &str) -> Self {
        match url {
            "http://www.w3.org/2000/svg" => Namespace::Svg,
            "http://www.w3.org/1998/Math/MathML" => Namespace::MathMl,
            _ => Namespace::Html,
        }
    }

    pub fn url(&self) -> &'static str {
        match self {
            Namespace::Html => "http://www.w3.org/1999/xhtml",
            Namespace::Svg => "http://www.w3.org/2000/svg",
            Namespace::MathMl => "http://www.w3.org/1998/Math/MathML",
        }
    }
}

impl Document {
    /// An empty `<html><head></head><body></body></html>` document.
    pub fn new() -> Self {
        let mut arena = Arena::new();
        let document = arena.new_node(NodeData {
            kind: NodeKind::Document,
            ns: Namespace::Html,
        });
        let root = arena.new_node(NodeData::element(ElementData::new("html")));
        document.append(root, &mut arena);
        let head = arena.new_node(NodeData::element(ElementData::new("head")));
        let body = arena.new_node(NodeData::element(ElementData::new("body")));
        root.append(head, &mut arena);
        root.append(body, &mut arena);
        Self {
            arena,
            document,
            root,
            doctype: Some("html".to_string()),
            focused: None,
        }
    }

    pub(crate) fn from_parts(
        arena: Arena<NodeData>,
        document: NodeId,
        root: NodeId,
        doctype: Option<String>,
    ) -> Self {
        Self {
            arena,
            document,
            root,
            doctype,
            focused: None,
        }
    }

    /// Get immutable reference to node data
    pub fn get(&self, id: NodeId) -> &NodeData {
        self.arena[id].get()
    }

    /// Get mutable reference to node data
    pub fn get_mut(&mut self, id: NodeId) -> &mut NodeData {
        self.arena[id].get_mut()
    }

    /// Element data of `id`, if it is an element
    pub fn element(&self, id: NodeId) -> Option<&ElementData> {
        match &self.arena.get(id)?.get().kind {
            NodeKind::Element(elem) => Some(elem),
            _ => None,
        }
    }

    pub fn element_mut(&mut self, id: NodeId) -> Option<&mut ElementData> {
        match &mut self.arena.get_mut(id)?.get_mut().kind {
            NodeKind::Element(elem) => Some(elem),
            _ => None,
        }
    }

    /// Tag name of `id`, if it is an element
    pub fn tag(&self, id: NodeId) -> Option<&str> {
        self.element(id).map(|e| e.tag.as_str())
    }

    pub fn attr(&self, id: NodeId, name: &str) -> Option<&str> {
        self.element(id)?.attr(name)
    }

    /// Iterate children of a node
    pub fn children(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        id.children(&self.arena)
    }

    /// Element children only
    pub fn child_elements(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        self.children(id)
            .filter(move |&c| self.element(c).is_some())
    }

    fn root_child(&self, tag: &str) -> Option<NodeId> {
        self.child_elements(self.root)
            .find(|&id| self.tag(id) == Some(tag))
    }

    /// Get the `<head>` element if present
    pub fn head(&self) -> Option<NodeId> {
        self.root_child("head")
    }

    /// Get the `<body>` element if present
    pub fn body(&self) -> Option<NodeId> {
        self.root_child("body")
    }

    /// All attached nodes in document order, the document node excluded
    pub fn descendants(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.document.descendants(&self.arena).skip(1)
    }

    /// First attached element whose `id` attribute equals `id`
    pub fn get_element_by_id(&self, id: &str) -> Option<NodeId> {
        if id.is_empty() {
            return None;
        }
        self.descendants().find(|&n| self.attr(n, "id") == Some(id))
    }

    /// First element with the given tag, in document order
    pub fn find_tag(&self, tag: &str) -> Option<NodeId> {
        self.descendants().find(|&n| self.tag(n) == Some(tag))
    }

    /// Nearest inclusive ancestor with the given tag
    pub fn closest(&self, id: NodeId, tag: &str) -> Option<NodeId> {
        id.ancestors(&self.arena).find(|&n| self.tag(n) == Some(tag))
    }

    /// Form owner of a control: its `form` attribute target, else the nearest `<form>` ancestor
    pub fn parent_form(&self, id: NodeId) -> Option<NodeId> {
        if let Some(form_id) = self.attr(id, "form") {
            return self
                .get_element_by_id(form_id)
                .filter(|&f| self.tag(f) == Some("form"));
        }
        self.closest(id, "form")
    }

    /// True if `id` is reachable from the document node
    pub fn is_attached(&self, id: NodeId) -> bool {
        id.ancestors(&self.arena).any(|a| a == self.document)
    }

    /// Concatenated text of `id` and all its descendants
    pub fn text_content(&self, id: NodeId) -> String {
        let mut out = String::new();
        for n in id.descendants(&self.arena) {
            if let NodeKind::Text(t) = &self.get(n).kind {
                out.push_str(t);
            }
        }
        out
    }

    /// Current checkedness of a checkbox or radio button
    pub fn is_checked(&self, id: NodeId) -> bool {
        self.element(id)
            .map(|e| e.checked.unwrap_or_else(|| e.attrs.contains_key("checked")))
            .unwrap_or(false)
    }

    pub fn focus(&mut self, id: NodeId) {
        self.focused = Some(id);
    }

    pub fn focused(&self) -> Option<NodeId> {
        self.focused
    }

    pub fn blur(&mut self) {
        self.focused = None;
    }

    /// Deep copy of a subtree, detached from this document.
    pub fn clone_subtree(&self, id: NodeId) -> Node {
        let data = self.get(id);
        match &data.kind {
            NodeKind::Text(t) => Node::Text(t.clone()),
            NodeKind::Comment(t) => Node::Comment(t.clone()),
            NodeKind::Document => Node::Comment(String::new()),
            NodeKind::Element(elem) => Node::Element(Element {
                tag: elem.tag.clone(),
                ns: data.ns,
                attrs: elem.attrs.clone(),
                children: self.children(id).map(|c| self.clone_subtree(c)).collect(),
            }),
        }
    }

    /// Adopt a detached subtree into this arena. The new nodes are not attached yet.
    ///
    /// This is a plain import: scripts inside keep the "already started" flag
    /// a clone would carry and will not be reported as pending.
    pub fn materialize(&mut self, node: &Node) -> NodeId {
        match node {
            Node::Text(t) => self.new_text(t),
            Node::Comment(t) => self.arena.new_node(NodeData {
                kind: NodeKind::Comment(t.clone()),
                ns: Namespace::Html,
            }),
            Node::Element(elem) => {
                let id = self.new_element_from(elem);
                if elem.is_script()
                    && let Some(data) = self.element_mut(id)
                {
                    data.already_started = true;
                }
                for child in &elem.children {
                    let c = self.materialize(child);
                    id.append(c, &mut self.arena);
                }
                id
            }
        }
    }

    /// Shallow element node (tag, namespace, attributes) from a detached element.
    pub fn new_element_from(&mut self, elem: &Element) -> NodeId {
        let mut data = ElementData::new(elem.tag.clone());
        data.attrs = elem.attrs.clone();
        self.arena.new_node(NodeData {
            kind: NodeKind::Element(data),
            ns: elem.ns,
        })
    }

    pub fn new_text(&mut self, text: &str) -> NodeId {
        self.arena.new_node(NodeData {
            kind: NodeKind::Text(text.to_string()),
            ns: Namespace::Html,
        })
    }

    /// A fresh, runnable script element carrying `script`'s attributes and text.
    pub fn recreate_script(&mut self, script: &Element) -> NodeId {
        let id = self.new_element_from(script);
        let text = script.text_content();
        if !text.is_empty() {
            let t = self.new_text(&text);
            id.append(t, &mut self.arena);
        }
        id
    }

    /// Attached scripts that have not run yet. They are marked started on the way out.
    pub fn take_pending_scripts(&mut self) -> Vec<NodeId> {
        let pending: Vec<NodeId> = self
            .descendants()
            .filter(|&n| {
                self.element(n)
                    .is_some_and(|e| e.tag == "script" && !e.already_started)
                    && self.get(n).ns == Namespace::Html
            })
            .collect();
        for &id in &pending {
            if let Some(e) = self.element_mut(id) {
                e.already_started = true;
            }
        }
        pending
    }

    /// Toggle the loading class on `<body>`.
    pub fn set_body_class(&mut self, class: &str, on: bool) {
        let Some(body) = self.body() else { return };
        let Some(elem) = self.element_mut(body) else {
            return;
        };
        let mut classes: Vec<String> = elem
            .attr("class")
            .unwrap_or_default()
            .split_ascii_whitespace()
            .filter(|c| *c != class)
            .map(str::to_string)
            .collect();
        if on {
            classes.push(class.to_string());
        }
        if classes.is_empty() {
            elem.attrs.shift_remove("class");
        } else {
            elem.attrs.insert("class".to_string(), classes.join(" "));
        }
    }
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl NodeData {
    pub fn element(data: ElementData) -> Self {
        Self {
            kind: NodeKind::Element(data),
            ns: Namespace::Html,
        }
    }
}
