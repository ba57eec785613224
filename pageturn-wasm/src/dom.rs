//! The live browser document behind [`LiveDom`].

use pageturn::{Document, LOADING_CLASS, LiveDom, Namespace, Node};
use tracing::warn;
use wasm_bindgen::JsCast;
use web_sys::{Element, HtmlElement, HtmlInputElement, HtmlTemplateElement};

const ELEMENT_NODE: u16 = 1;
const TEXT_NODE: u16 = 3;
const COMMENT_NODE: u16 = 8;

pub struct BrowserDom {
    document: web_sys::Document,
}

impl BrowserDom {
    pub fn new(document: web_sys::Document) -> Self {
        Self { document }
    }

    pub fn document(&self) -> &web_sys::Document {
        &self.document
    }

    fn build_element(&self, elem: &pageturn::Element) -> Option<Element> {
        let created = match elem.ns {
            Namespace::Html => self.document.create_element(&elem.tag),
            ns => self.document.create_element_ns(Some(ns.url()), &elem.tag),
        };
        let element = match created {
            Ok(element) => element,
            Err(e) => {
                warn!(tag = %elem.tag, error = ?e, "createElement failed");
                return None;
            }
        };
        for (name, value) in &elem.attrs {
            if let Err(e) = element.set_attribute(name, value) {
                warn!(%name, error = ?e, "setAttribute failed");
            }
        }
        Some(element)
    }

    /// Element-by-element construction, for what a template cannot hold
    fn build(&mut self, node: &Node) -> Option<web_sys::Node> {
        match node {
            Node::Text(text) => Some(self.document.create_text_node(text).into()),
            Node::Comment(text) => Some(self.document.create_comment(text).into()),
            Node::Element(elem) => {
                let element = self.build_element(elem)?;
                for child in &elem.children {
                    if let Some(child) = self.build(child) {
                        let _ = element.append_child(&child);
                    }
                }
                Some(element.into())
            }
        }
    }

    /// Parse the serialized subtree in a `<template>`, which accepts any context
    fn import_via_template(&self, node: &Node) -> Option<web_sys::Node> {
        let template: HtmlTemplateElement = self.document.create_element("template").ok()?.dyn_into().ok()?;
        template.set_inner_html(&node.to_html());
        template.content().first_child()
    }
}

/// Copy of the live subtree at `node`, one entry per live child so patch
/// positions line up with `child_nodes`.
fn capture(node: &web_sys::Node) -> Node {
    match node.node_type() {
        ELEMENT_NODE => {
            let Some(element) = node.dyn_ref::<Element>() else {
                return Node::Comment(String::new());
            };
            let ns = element
                .namespace_uri()
                .map(|uri| Namespace::from_url(&uri))
                .unwrap_or_default();
            let mut captured = pageturn::Element::new(element.local_name());
            captured.ns = ns;
            let attributes = element.attributes();
            for i in 0..attributes.length() {
                if let Some(attr) = attributes.item(i) {
                    captured.attrs.insert(attr.name(), attr.value());
                }
            }
            let children = node.child_nodes();
            for i in 0..children.length() {
                if let Some(child) = children.item(i) {
                    captured.children.push(capture(&child));
                }
            }
            Node::Element(captured)
        }
        TEXT_NODE => Node::Text(node.text_content().unwrap_or_default()),
        COMMENT_NODE => Node::Comment(node.text_content().unwrap_or_default()),
        // processing instructions and the like only hold a slot
        _ => Node::Comment(String::new()),
    }
}

impl LiveDom for BrowserDom {
    type Handle = web_sys::Node;

    fn root_element(&self) -> Option<web_sys::Node> {
        self.document.document_element().map(Into::into)
    }

    fn child_nodes(&self, parent: &web_sys::Node) -> Vec<web_sys::Node> {
        let list = parent.child_nodes();
        (0..list.length()).filter_map(|i| list.item(i)).collect()
    }

    fn import_node(&mut self, node: &Node) -> Option<web_sys::Node> {
        match node {
            Node::Element(elem)
                if elem.ns == Namespace::Html && !matches!(elem.tag.as_str(), "html" | "head" | "body") =>
            {
                self.import_via_template(node).or_else(|| self.build(node))
            }
            _ => self.build(node),
        }
    }

    fn create_element(&mut self, element: &pageturn::Element) -> Option<web_sys::Node> {
        self.build_element(element).map(Into::into)
    }

    fn create_script(&mut self, script: &pageturn::Element) -> Option<web_sys::Node> {
        let element = self.build_element(script)?;
        let text = script.text_content();
        if !text.is_empty() {
            element.set_text_content(Some(&text));
        }
        Some(element.into())
    }

    fn append_child(&mut self, parent: &web_sys::Node, child: web_sys::Node) {
        if let Err(e) = parent.append_child(&child) {
            warn!(error = ?e, "appendChild failed");
        }
    }

    fn replace_child(&mut self, old: &web_sys::Node, new: web_sys::Node) {
        if let Some(parent) = old.parent_node() {
            if let Err(e) = parent.replace_child(&new, old) {
                warn!(error = ?e, "replaceChild failed");
            }
        } else {
            warn!("replace: live node is detached");
        }
    }

    fn remove_node(&mut self, node: &web_sys::Node) {
        if let Some(parent) = node.parent_node() {
            let _ = parent.remove_child(node);
        }
    }

    fn set_text(&mut self, node: &web_sys::Node, text: &str) {
        node.set_text_content(Some(text));
    }

    fn set_attribute(&mut self, element: &web_sys::Node, name: &str, value: &str) {
        if let Some(element) = element.dyn_ref::<Element>()
            && let Err(e) = element.set_attribute(name, value)
        {
            warn!(%name, error = ?e, "setAttribute failed");
        }
    }

    fn remove_attribute(&mut self, element: &web_sys::Node, name: &str) {
        if let Some(element) = element.dyn_ref::<Element>() {
            let _ = element.remove_attribute(name);
        }
    }

    fn set_checked(&mut self, element: &web_sys::Node, checked: bool) {
        if let Some(input) = element.dyn_ref::<HtmlInputElement>() {
            input.set_checked(checked);
        }
    }

    fn has_tag(&self, element: &web_sys::Node, tag: &str) -> bool {
        element.dyn_ref::<Element>().is_some_and(|e| {
            e.local_name() == tag && e.namespace_uri().as_deref() == Some(Namespace::Html.url())
        })
    }

    fn focused_element(&self) -> Option<web_sys::Node> {
        self.document.active_element().map(Into::into)
    }

    fn blur(&mut self, element: &web_sys::Node) {
        if let Some(element) = element.dyn_ref::<HtmlElement>() {
            let _ = element.blur();
        }
    }

    fn snapshot(&self) -> Document {
        let mut doc = Document::new();
        doc.doctype = self.document.doctype().map(|d| d.name());
        let Some(root) = self.root_element() else {
            return doc;
        };
        let live_root = doc.materialize(&capture(&root));
        doc.root.remove_subtree(&mut doc.arena);
        doc.document.append(live_root, &mut doc.arena);
        doc.root = live_root;
        doc
    }

    fn element_by_id(&self, id: &str) -> Option<web_sys::Node> {
        self.document.get_element_by_id(id).map(Into::into)
    }

    fn set_loading_marker(&mut self, on: bool) {
        let Some(body) = self.document.body() else {
            return;
        };
        let classes = body.class_list();
        let result = if on {
            classes.add_1(LOADING_CLASS)
        } else {
            classes.remove_1(LOADING_CLASS)
        };
        if let Err(e) = result {
            warn!(error = ?e, "loading marker not toggled");
        }
    }
}
