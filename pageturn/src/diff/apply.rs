//! Apply patches to a live document.
//!
//! Property: `apply(A, diff(A, B))` renders the same as `B`.

use std::collections::VecDeque;

use indextree::NodeId;

use super::{AttrValue, AttributePatch, NodePatch, Patch};
use crate::dom::{Document, LOADING_CLASS, Namespace, NodeKind};
use crate::node::{Element, Node};
use crate::tracing_macros::{debug, warn};

/// A mutable document the patcher can drive.
///
/// Implemented for the arena [`Document`] and, in the browser crate, for the
/// real DOM. Creation methods return `None` when the host refuses; the patcher
/// skips that position instead of failing.
pub trait LiveDom {
    type Handle: Clone;

    /// The document element (`<html>`)
    fn root_element(&self) -> Option<Self::Handle>;

    /// Child nodes of `parent`, all node types, in order
    fn child_nodes(&self, parent: &Self::Handle) -> Vec<Self::Handle>;

    /// Import a whole detached subtree in one step. Never called with a
    /// subtree containing scripts.
    fn import_node(&mut self, node: &Node) -> Option<Self::Handle>;

    /// A new element carrying `element`'s tag, namespace and attributes, no children
    fn create_element(&mut self, element: &Element) -> Option<Self::Handle>;

    /// A fresh script element that the host will execute once attached
    fn create_script(&mut self, script: &Element) -> Option<Self::Handle>;

    fn append_child(&mut self, parent: &Self::Handle, child: Self::Handle);
    fn replace_child(&mut self, old: &Self::Handle, new: Self::Handle);
    fn remove_node(&mut self, node: &Self::Handle);

    /// Set the data of a text or comment node
    fn set_text(&mut self, node: &Self::Handle, text: &str);
    fn set_attribute(&mut self, element: &Self::Handle, name: &str, value: &str);
    fn remove_attribute(&mut self, element: &Self::Handle, name: &str);

    /// Live checkedness, separate from the `checked` attribute
    fn set_checked(&mut self, element: &Self::Handle, checked: bool);

    /// True if `element` is an HTML element with the given local name
    fn has_tag(&self, element: &Self::Handle, tag: &str) -> bool;

    fn focused_element(&self) -> Option<Self::Handle>;
    fn blur(&mut self, element: &Self::Handle);

    /// Arena copy of the live tree whose child lists match the live ones
    /// position for position. Diffs are computed against it.
    fn snapshot(&self) -> Document;

    fn element_by_id(&self, id: &str) -> Option<Self::Handle>;

    /// Toggle the loading class on `<body>`
    fn set_loading_marker(&mut self, on: bool);
}

/// Apply `patch` to `dom`, top-down.
///
/// Each parent's live children are captured before its child patches run, so
/// removing one child never shifts the position of a later sibling.
pub fn apply<D: LiveDom>(dom: &mut D, patch: &Patch) {
    let Some(root) = dom.root_element() else {
        warn!("live document has no root element, nothing patched");
        return;
    };

    let mut queue: VecDeque<(NodeId, Option<D::Handle>, Option<D::Handle>)> =
        VecDeque::from([(patch.root(), Some(root), None)]);
    let mut _applied = 0usize;

    while let Some((id, live, parent)) = queue.pop_front() {
        match patch.op(id) {
            NodePatch::Preserve => continue,
            NodePatch::Remove => match live {
                Some(node) => dom.remove_node(&node),
                None => warn!("remove: live node missing"),
            },
            NodePatch::Append(node) => {
                let Some(parent) = parent else {
                    warn!("append: no parent");
                    continue;
                };
                if let Some(new) = materialize(dom, node) {
                    dom.append_child(&parent, new);
                }
            }
            NodePatch::Replace(node) => {
                let Some(old) = live else {
                    warn!("replace: live node missing");
                    continue;
                };
                if let Some(new) = materialize(dom, node) {
                    dom.replace_child(&old, new);
                }
            }
            NodePatch::UpdateText(text) => match live {
                Some(node) => dom.set_text(&node, text),
                None => warn!("update text: live node missing"),
            },
            NodePatch::UpdateElement { attributes } => {
                let Some(element) = live else {
                    warn!("update element: live node missing");
                    continue;
                };
                for attr in attributes {
                    apply_attribute(dom, &element, attr);
                }
                let children = dom.child_nodes(&element);
                for (i, child) in patch.children(id).enumerate() {
                    queue.push_back((child, children.get(i).cloned(), Some(element.clone())));
                }
            }
        }
        _applied += 1;
    }

    if let Some(focused) = dom.focused_element()
        && (dom.has_tag(&focused, "button") || dom.has_tag(&focused, "a"))
    {
        dom.blur(&focused);
    }

    debug!(applied = _applied, "patch applied");
}

fn apply_attribute<D: LiveDom>(dom: &mut D, element: &D::Handle, attr: &AttributePatch) {
    let checked = attr.name() == "checked" && dom.has_tag(element, "input");
    match attr {
        AttributePatch::Remove(name) | AttributePatch::Set(name, AttrValue::Flag(false)) => {
            dom.remove_attribute(element, name);
            if checked {
                dom.set_checked(element, false);
            }
        }
        AttributePatch::Set(name, value) => {
            dom.set_attribute(element, name, value.as_attribute());
            if checked {
                dom.set_checked(element, true);
            }
        }
    }
}

/// Turn a detached node into a live one.
///
/// Scripts are always recreated so the host runs them; a subtree holding
/// scripts is therefore built element by element, anything else in one import.
fn materialize<D: LiveDom>(dom: &mut D, node: &Node) -> Option<D::Handle> {
    match node {
        Node::Element(elem) if elem.is_script() => dom.create_script(elem),
        Node::Element(elem) if node.contains_script() => {
            let parent = dom.create_element(elem)?;
            for child in &elem.children {
                if let Some(child) = materialize(dom, child) {
                    dom.append_child(&parent, child);
                }
            }
            Some(parent)
        }
        _ => dom.import_node(node),
    }
}

impl LiveDom for Document {
    type Handle = NodeId;

    fn root_element(&self) -> Option<NodeId> {
        self.element(self.root).map(|_| self.root)
    }

    fn child_nodes(&self, parent: &NodeId) -> Vec<NodeId> {
        self.children(*parent).collect()
    }

    fn import_node(&mut self, node: &Node) -> Option<NodeId> {
        Some(self.materialize(node))
    }

    fn create_element(&mut self, element: &Element) -> Option<NodeId> {
        Some(self.new_element_from(element))
    }

    fn create_script(&mut self, script: &Element) -> Option<NodeId> {
        Some(self.recreate_script(script))
    }

    fn append_child(&mut self, parent: &NodeId, child: NodeId) {
        parent.append(child, &mut self.arena);
    }

    fn replace_child(&mut self, old: &NodeId, new: NodeId) {
        old.insert_before(new, &mut self.arena);
        old.detach(&mut self.arena);
        if *old == self.root {
            self.root = new;
        }
    }

    fn remove_node(&mut self, node: &NodeId) {
        node.detach(&mut self.arena);
        if self.focused().is_some_and(|f| !self.is_attached(f)) {
            self.blur();
        }
    }

    fn set_text(&mut self, node: &NodeId, text: &str) {
        match &mut self.get_mut(*node).kind {
            NodeKind::Text(t) | NodeKind::Comment(t) => *t = text.to_string(),
            _ => warn!("set_text on a non-text node"),
        }
    }

    fn set_attribute(&mut self, element: &NodeId, name: &str, value: &str) {
        if let Some(elem) = self.element_mut(*element) {
            elem.attrs.insert(name.to_string(), value.to_string());
        }
    }

    fn remove_attribute(&mut self, element: &NodeId, name: &str) {
        if let Some(elem) = self.element_mut(*element) {
            elem.attrs.shift_remove(name);
        }
    }

    fn set_checked(&mut self, element: &NodeId, checked: bool) {
        if let Some(elem) = self.element_mut(*element) {
            elem.checked = Some(checked);
        }
    }

    fn has_tag(&self, element: &NodeId, tag: &str) -> bool {
        self.tag(*element) == Some(tag) && self.get(*element).ns == Namespace::Html
    }

    fn focused_element(&self) -> Option<NodeId> {
        self.focused()
    }

    fn blur(&mut self, _element: &NodeId) {
        Document::blur(self);
    }

    fn snapshot(&self) -> Document {
        self.clone()
    }

    fn element_by_id(&self, id: &str) -> Option<NodeId> {
        self.get_element_by_id(id)
    }

    fn set_loading_marker(&mut self, on: bool) {
        self.set_body_class(LOADING_CLASS, on);
    }
}
