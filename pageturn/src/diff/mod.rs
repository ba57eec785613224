//! Document reconciliation.
//!
//! [`diff`] compares the live document against a freshly parsed one and
//! produces a [`Patch`]: one [`NodePatch`] per position compared, arranged as a
//! tree that mirrors the current document. [`apply`] walks that tree top-down
//! and mutates any [`LiveDom`] in place.
//!
//! Positional pairing is used everywhere except inside `<head>`, where children
//! are matched by identity key (see `head.rs`).

mod apply;
mod head;

use std::collections::VecDeque;

use indextree::{Arena, NodeId};
use smallvec::SmallVec;

use crate::dom::{Document, ElementData, Namespace, NodeKind};
use crate::node::Node;
use crate::tracing_macros::{debug, trace};

pub use apply::{LiveDom, apply};

/// What to do at one position of the current document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodePatch {
    /// Leave the node alone
    Preserve,
    /// Remove the node
    Remove,
    /// Insert a copy of this node after the existing children
    Append(Node),
    /// Swap the node for a copy of this one
    Replace(Node),
    /// Set the text of a text or comment node
    UpdateText(String),
    /// Patch attributes, then the children (the patch node's arena children, by position)
    UpdateElement {
        attributes: SmallVec<[AttributePatch; 2]>,
    },
}

/// Attribute change on an element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttributePatch {
    Remove(String),
    Set(String, AttrValue),
}

impl AttributePatch {
    pub fn name(&self) -> &str {
        match self {
            AttributePatch::Remove(name) | AttributePatch::Set(name, _) => name,
        }
    }
}

/// Value of a `Set` attribute patch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttrValue {
    Text(String),
    /// Boolean attribute marker. Present attributes are `Flag(true)`.
    Flag(bool),
}

impl AttrValue {
    /// The string written into the attribute list
    pub fn as_attribute(&self) -> &str {
        match self {
            AttrValue::Text(text) => text,
            AttrValue::Flag(_) => "",
        }
    }
}

/// A reconciliation plan from one `(current, target)` pair.
///
/// Consumed by [`apply`]; the shape of the tree follows the current document,
/// so it is only meaningful against the document it was computed from.
#[derive(Debug, Clone)]
pub struct Patch {
    tree: Arena<NodePatch>,
    root: NodeId,
}

impl Patch {
    /// Patch for the root element
    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn op(&self, id: NodeId) -> &NodePatch {
        self.tree[id].get()
    }

    /// Child patches of an `UpdateElement`, in position order
    pub fn children(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        id.children(&self.tree)
    }

    /// Every patch, breadth-first from the root
    pub fn ops(&self) -> impl Iterator<Item = &NodePatch> + '_ {
        let mut queue = VecDeque::from([self.root]);
        std::iter::from_fn(move || {
            let id = queue.pop_front()?;
            queue.extend(id.children(&self.tree));
            Some(self.tree[id].get())
        })
    }

    /// True when applying the patch changes nothing: only `Preserve` and
    /// attribute-free `UpdateElement` nodes.
    pub fn is_noop(&self) -> bool {
        self.ops().all(|op| match op {
            NodePatch::Preserve => true,
            NodePatch::UpdateElement { attributes } => attributes.is_empty(),
            _ => false,
        })
    }
}

/// Boolean attributes: presence means true, and the differ ignores their value.
pub fn is_boolean_attribute(name: &str) -> bool {
    matches!(
        name,
        "allowfullscreen"
            | "async"
            | "autofocus"
            | "autoplay"
            | "checked"
            | "controls"
            | "default"
            | "defer"
            | "disabled"
            | "formnovalidate"
            | "hidden"
            | "inert"
            | "ismap"
            | "itemscope"
            | "loop"
            | "multiple"
            | "muted"
            | "nomodule"
            | "novalidate"
            | "open"
            | "playsinline"
            | "readonly"
            | "required"
            | "reversed"
            | "selected"
    )
}

/// Normalized attribute value; `None` for falsy boolean attributes.
fn attr_value(name: &str, value: Option<&String>) -> Option<AttrValue> {
    let value = value?;
    if is_boolean_attribute(name) {
        if value.eq_ignore_ascii_case("false") {
            return None;
        }
        return Some(AttrValue::Flag(true));
    }
    Some(AttrValue::Text(value.clone()))
}

/// Attribute changes turning `current` into `target`. Removals come first.
pub fn diff_attributes(
    current: &ElementData,
    target: &ElementData,
) -> SmallVec<[AttributePatch; 2]> {
    let mut patches = SmallVec::new();

    for (name, value) in &current.attrs {
        if attr_value(name, Some(value)).is_some() && attr_value(name, target.attrs.get(name)).is_none()
        {
            patches.push(AttributePatch::Remove(name.clone()));
        }
    }

    for (name, value) in &target.attrs {
        let Some(new) = attr_value(name, Some(value)) else {
            continue;
        };
        if attr_value(name, current.attrs.get(name)).as_ref() != Some(&new) {
            patches.push(AttributePatch::Set(name.clone(), new));
        }
    }

    patches
}

/// One pending comparison: a current node, a target node, and the patch slot to fill.
struct Work {
    current: Option<NodeId>,
    target: Option<NodeId>,
    slot: NodeId,
}

struct Differ<'a> {
    current: &'a Document,
    target: &'a Document,
    tree: Arena<NodePatch>,
    queue: VecDeque<Work>,
}

/// Compute the patch that turns `current` into `target`.
///
/// Neither document is modified. The root elements are compared like any
/// other pair, so a root tag mismatch yields a root `Replace`.
pub fn diff(current: &Document, target: &Document) -> Patch {
    let mut tree = Arena::new();
    let root = tree.new_node(NodePatch::Preserve);
    let mut differ = Differ {
        current,
        target,
        tree,
        queue: VecDeque::new(),
    };
    differ.queue.push_back(Work {
        current: Some(current.root),
        target: Some(target.root),
        slot: root,
    });

    while let Some(work) = differ.queue.pop_front() {
        let op = differ.compare(work.current, work.target, work.slot);
        *differ.tree[work.slot].get_mut() = op;
    }

    let patch = Patch {
        tree: differ.tree,
        root,
    };
    debug!(nodes = patch.tree.count(), noop = patch.is_noop(), "diff done");
    patch
}

impl Differ<'_> {
    fn compare(&mut self, current: Option<NodeId>, target: Option<NodeId>, slot: NodeId) -> NodePatch {
        let (current_doc, target_doc) = (self.current, self.target);
        let (c, t) = match (current, target) {
            (None, None) => return NodePatch::Preserve,
            (Some(_), None) => return NodePatch::Remove,
            (None, Some(t)) => return NodePatch::Append(target_doc.clone_subtree(t)),
            (Some(c), Some(t)) => (c, t),
        };

        let cur = current_doc.get(c);
        let tgt = target_doc.get(t);
        match (&cur.kind, &tgt.kind) {
            (NodeKind::Text(a), NodeKind::Text(b)) | (NodeKind::Comment(a), NodeKind::Comment(b)) => {
                if a.trim() == b.trim() {
                    NodePatch::Preserve
                } else {
                    NodePatch::UpdateText(b.clone())
                }
            }
            (NodeKind::Element(a), NodeKind::Element(b)) => {
                if a.tag != b.tag || cur.ns != tgt.ns {
                    trace!(from = %a.tag, to = %b.tag, "tag mismatch, replacing");
                    return NodePatch::Replace(self.target.clone_subtree(t));
                }
                let attributes = diff_attributes(a, b);

                if a.tag == "head" && cur.ns == Namespace::Html {
                    head::match_children(self, c, t, slot);
                } else if self.current.children(c).next().is_none() {
                    // Nothing to pair with: append every target child directly
                    for child in self.target.children(t) {
                        let node = self.target.clone_subtree(child);
                        let id = self.tree.new_node(NodePatch::Append(node));
                        slot.append(id, &mut self.tree);
                    }
                } else {
                    self.pair_children(c, t, slot);
                }

                NodePatch::UpdateElement { attributes }
            }
            _ => NodePatch::Replace(self.target.clone_subtree(t)),
        }
    }

    /// Positional pairing, the shorter side padded with nothing.
    fn pair_children(&mut self, c: NodeId, t: NodeId, slot: NodeId) {
        let mut cur = self.current.children(c);
        let mut tgt = self.target.children(t);
        loop {
            let (a, b) = (cur.next(), tgt.next());
            if a.is_none() && b.is_none() {
                break;
            }
            self.enqueue(a, b, slot);
        }
    }

    fn enqueue(&mut self, current: Option<NodeId>, target: Option<NodeId>, parent: NodeId) {
        let child = self.tree.new_node(NodePatch::Preserve);
        parent.append(child, &mut self.tree);
        self.queue.push_back(Work {
            current,
            target,
            slot: child,
        });
    }

    /// A child patch that needs no further comparison
    fn push_op(&mut self, op: NodePatch, parent: NodeId) {
        let child = self.tree.new_node(op);
        parent.append(child, &mut self.tree);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse;

    fn body_patch(patch: &Patch) -> NodeId {
        // root <html> -> [head, body]
        patch
            .children(patch.root())
            .nth(1)
            .expect("html patch should have a body child")
    }

    #[test]
    fn test_identical_documents_are_noop() {
        let html = r#"<!DOCTYPE html><html><head><title>T</title><meta name="a" content="1"></head>
            <body class="x"><div id="main"><p>Hello <b>world</b></p><!-- c --></div></body></html>"#;
        let patch = diff(&parse(html), &parse(html));
        assert!(patch.is_noop(), "{patch:#?}");
    }

    #[test]
    fn test_attribute_patch_is_minimal() {
        let a = parse(r#"<html><body><div a="1" b="2"></div></body></html>"#);
        let b = parse(r#"<html><body><div a="1" b="3"></div></body></html>"#);
        let patch = diff(&a, &b);

        let body = body_patch(&patch);
        let div = patch.children(body).next().unwrap();
        assert_eq!(
            patch.op(div),
            &NodePatch::UpdateElement {
                attributes: SmallVec::from_vec(vec![AttributePatch::Set(
                    "b".into(),
                    AttrValue::Text("3".into())
                )])
            }
        );
    }

    #[test]
    fn test_boolean_attribute_set_and_remove() {
        let a = parse(r#"<html><body><input type="checkbox"></body></html>"#);
        let b = parse(r#"<html><body><input type="checkbox" checked></body></html>"#);

        let patch = diff(&a, &b);
        let sets: Vec<_> = patch
            .ops()
            .filter_map(|op| match op {
                NodePatch::UpdateElement { attributes } => Some(attributes.clone()),
                _ => None,
            })
            .flatten()
            .collect();
        assert_eq!(
            sets,
            vec![AttributePatch::Set("checked".into(), AttrValue::Flag(true))]
        );

        let back = diff(&b, &a);
        assert!(
            back.ops()
                .any(|op| matches!(op, NodePatch::UpdateElement { attributes } if attributes.as_slice() == [AttributePatch::Remove("checked".into())]))
        );
    }

    #[test]
    fn test_falsy_boolean_attributes_are_absent() {
        let a = parse(r#"<html><body><button></button></body></html>"#);
        let b = parse(r#"<html><body><button disabled="false"></button></body></html>"#);
        assert!(diff(&a, &b).is_noop());
    }

    #[test]
    fn test_boolean_attribute_value_is_ignored() {
        let a = parse(r#"<html><body><input disabled></body></html>"#);
        let b = parse(r#"<html><body><input disabled="disabled"></body></html>"#);
        assert!(diff(&a, &b).is_noop());
    }

    #[test]
    fn test_insertion_appends() {
        let a = parse("<html><body><div></div></body></html>");
        let b = parse("<html><body><div></div><span></span></body></html>");
        let patch = diff(&a, &b);

        let body = body_patch(&patch);
        let ops: Vec<_> = patch.children(body).map(|id| patch.op(id).clone()).collect();
        assert_eq!(ops.len(), 2);
        assert!(matches!(&ops[0], NodePatch::UpdateElement { attributes } if attributes.is_empty()));
        assert!(matches!(&ops[1], NodePatch::Append(Node::Element(e)) if e.tag == "span"));
    }

    #[test]
    fn test_removal() {
        let a = parse("<html><body><p>1</p><p>2</p></body></html>");
        let b = parse("<html><body><p>1</p></body></html>");
        let patch = diff(&a, &b);
        let body = body_patch(&patch);
        let ops: Vec<_> = patch.children(body).map(|id| patch.op(id)).collect();
        assert_eq!(ops[1], &NodePatch::Remove);
    }

    #[test]
    fn test_tag_mismatch_replaces() {
        let a = parse("<html><body><p>text</p></body></html>");
        let b = parse("<html><body><section>text</section></body></html>");
        let patch = diff(&a, &b);
        let body = body_patch(&patch);
        let first = patch.children(body).next().unwrap();
        assert!(matches!(patch.op(first), NodePatch::Replace(Node::Element(e)) if e.tag == "section"));
    }

    #[test]
    fn test_text_compared_trimmed() {
        let a = parse("<html><body><p>  hello </p></body></html>");
        let b = parse("<html><body><p>hello</p></body></html>");
        assert!(diff(&a, &b).is_noop());

        let c = parse("<html><body><p>bye</p></body></html>");
        assert!(
            diff(&a, &c)
                .ops()
                .any(|op| op == &NodePatch::UpdateText("bye".into()))
        );
    }

    #[test]
    fn test_text_vs_element_replaces() {
        let a = parse("<html><body><div>text</div></body></html>");
        let b = parse("<html><body><div><em>text</em></div></body></html>");
        assert!(
            diff(&a, &b)
                .ops()
                .any(|op| matches!(op, NodePatch::Replace(Node::Element(e)) if e.tag == "em"))
        );
    }

    #[test]
    fn test_empty_parent_appends_without_descending() {
        let a = parse("<html><body><ul></ul></body></html>");
        let b = parse("<html><body><ul class=\"list\"><li>1</li><li>2</li></ul></body></html>");
        let patch = diff(&a, &b);

        let body = body_patch(&patch);
        let ul = patch.children(body).next().unwrap();
        assert!(matches!(patch.op(ul), NodePatch::UpdateElement { attributes } if attributes.len() == 1));
        let children: Vec<_> = patch.children(ul).collect();
        assert_eq!(children.len(), 2);
        for id in children {
            assert!(matches!(patch.op(id), NodePatch::Append(_)));
            assert_eq!(patch.children(id).count(), 0);
        }
    }
}
