//! Keyed reconciliation of `<head>` children.
//!
//! Head content is order-insensitive, so children are matched by an identity
//! key instead of by position. A stylesheet that moved between two pages is
//! preserved rather than removed and re-inserted.

use std::collections::VecDeque;
use std::hash::{Hash, Hasher};

use indextree::NodeId;
use rapidhash::{RapidHashMap, RapidHasher};

use super::{Differ, NodePatch};
use crate::dom::{Document, NodeKind};
use crate::tracing_macros::trace;

/// Identity key of a head child.
///
/// - `title`, `base`: the tag alone
/// - `meta`: `name`, else `property`, else `http-equiv`, else full content
/// - `link`: `(rel, href)`
/// - anything else: full content
pub(crate) fn identity_key(doc: &Document, id: NodeId) -> u64 {
    let mut hasher = RapidHasher::default();
    match doc.element(id) {
        Some(elem) => {
            elem.tag.hash(&mut hasher);
            match elem.tag.as_str() {
                "title" | "base" => {}
                "meta" => {
                    let named = [("name", 0u8), ("property", 1), ("http-equiv", 2)]
                        .into_iter()
                        .find_map(|(attr, which)| elem.attr(attr).map(|v| (which, v)));
                    match named {
                        Some((which, value)) => {
                            which.hash(&mut hasher);
                            value.hash(&mut hasher);
                        }
                        None => content_hash(doc, id, &mut hasher),
                    }
                }
                "link" => {
                    elem.attr("rel").unwrap_or_default().hash(&mut hasher);
                    elem.attr("href").unwrap_or_default().hash(&mut hasher);
                }
                _ => content_hash(doc, id, &mut hasher),
            }
        }
        None => content_hash(doc, id, &mut hasher),
    }
    hasher.finish()
}

fn content_hash(doc: &Document, id: NodeId, hasher: &mut RapidHasher) {
    match &doc.get(id).kind {
        NodeKind::Text(t) => {
            0u8.hash(hasher);
            t.trim().hash(hasher);
        }
        NodeKind::Comment(t) => {
            1u8.hash(hasher);
            t.trim().hash(hasher);
        }
        _ => {
            2u8.hash(hasher);
            doc.outer_html(id).hash(hasher);
        }
    }
}

fn same_content(a: &Document, a_id: NodeId, b: &Document, b_id: NodeId) -> bool {
    match (&a.get(a_id).kind, &b.get(b_id).kind) {
        (NodeKind::Text(x), NodeKind::Text(y)) | (NodeKind::Comment(x), NodeKind::Comment(y)) => {
            x.trim() == y.trim()
        }
        (NodeKind::Element(_), NodeKind::Element(_)) => a.outer_html(a_id) == b.outer_html(b_id),
        _ => false,
    }
}

/// Fill `slot` with one patch per current head child (in live order),
/// followed by `Append`s for target children nobody matched.
pub(super) fn match_children(differ: &mut Differ<'_>, current: NodeId, target: NodeId, slot: NodeId) {
    let (current_doc, target_doc) = (differ.current, differ.target);

    // Duplicate keys (e.g. whitespace text) pair up in document order
    let mut unmatched: RapidHashMap<u64, VecDeque<NodeId>> = RapidHashMap::default();
    let target_children: Vec<NodeId> = target_doc.children(target).collect();
    for &t in &target_children {
        unmatched
            .entry(identity_key(target_doc, t))
            .or_default()
            .push_back(t);
    }

    let mut used = Vec::with_capacity(target_children.len());
    for c in current_doc.children(current) {
        let key = identity_key(current_doc, c);
        let matched = unmatched.get_mut(&key).and_then(VecDeque::pop_front);
        match matched {
            Some(t) if same_content(current_doc, c, target_doc, t) => {
                used.push(t);
                differ.push_op(NodePatch::Preserve, slot);
            }
            Some(t) => {
                trace!(tag = ?current_doc.tag(c), "head child changed in place");
                used.push(t);
                differ.enqueue(Some(c), Some(t), slot);
            }
            None => differ.push_op(NodePatch::Remove, slot),
        }
    }

    for t in target_children {
        if !used.contains(&t) {
            differ.push_op(NodePatch::Append(target_doc.clone_subtree(t)), slot);
        }
    }
}
