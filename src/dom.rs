//! Markup query/mutate provider built on html5ever.
//!
//! Wraps an rcdom tree behind the small surface the pipeline needs:
//! document-order select-all, attribute read/write, inner text extraction
//! and element serialization. Attribute writes mutate the shared tree, so
//! later queries and serializations observe them.
//!
//! html5ever parses `<template>` children into a separate content fragment;
//! every traversal here descends through that boundary so template content
//! participates in selection, text extraction and containment checks.

use html5ever::tendril::TendrilSink;
use html5ever::{ns, namespace_url, parse_document, Attribute, LocalName, QualName};
use markup5ever_rcdom::{Handle, NodeData, RcDom};
use std::rc::Rc;
use tendril::ByteTendril;

use crate::selector::Selector;

/// Elements serialized without children or a closing tag.
const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "param", "source",
    "track", "wbr",
];

/// Elements whose text children are serialized verbatim.
const RAW_TEXT_ELEMENTS: &[&str] = &["script", "style"];

/// A parsed markup document. Cloning is cheap: the tree is shared.
#[derive(Clone)]
pub struct Document {
    root: Handle,
}

impl Document {
    /// Parse markup text into a document handle.
    pub fn parse(text: &str) -> Document {
        let dom: RcDom = parse_document(RcDom::default(), Default::default())
            .from_utf8()
            .one(ByteTendril::from(text.as_bytes()));
        Document { root: dom.document }
    }

    pub fn root(&self) -> &Handle {
        &self.root
    }

    /// All elements matching `selector`, in document order.
    pub fn select(&self, selector: &Selector) -> Vec<Handle> {
        let mut hits = Vec::new();
        walk_children(&self.root, &mut |node| {
            if selector.matches(node) {
                hits.push(node.clone());
            }
        });
        hits
    }

    /// All elements matching `selector` within the subtree rooted at
    /// `context`, excluding `context` itself, in document order.
    pub fn select_in(context: &Handle, selector: &Selector) -> Vec<Handle> {
        let mut hits = Vec::new();
        walk_children(context, &mut |node| {
            if selector.matches(node) {
                hits.push(node.clone());
            }
        });
        hits
    }
}

/// Visit every node below `handle` (not `handle` itself) in document order,
/// descending through template content fragments.
fn walk_children(handle: &Handle, visit: &mut impl FnMut(&Handle)) {
    if let NodeData::Element {
        template_contents, ..
    } = &handle.data
    {
        if let Some(contents) = template_contents.borrow().as_ref() {
            for child in contents.children.borrow().iter() {
                visit(child);
                walk_children(child, visit);
            }
        }
    }
    for child in handle.children.borrow().iter() {
        visit(child);
        walk_children(child, visit);
    }
}

/// Element tag name, when the node is an element.
pub fn local_name(handle: &Handle) -> Option<String> {
    match &handle.data {
        NodeData::Element { name, .. } => Some(name.local.to_string()),
        _ => None,
    }
}

/// Read an attribute value.
pub fn attr(handle: &Handle, name: &str) -> Option<String> {
    match &handle.data {
        NodeData::Element { attrs, .. } => attrs
            .borrow()
            .iter()
            .find(|a| a.name.local.as_ref() == name)
            .map(|a| a.value.to_string()),
        _ => None,
    }
}

/// Write an attribute value, creating the attribute if absent.
pub fn set_attr(handle: &Handle, name: &str, value: &str) {
    if let NodeData::Element { attrs, .. } = &handle.data {
        let mut attrs = attrs.borrow_mut();
        match attrs.iter_mut().find(|a| a.name.local.as_ref() == name) {
            Some(existing) => existing.value = value.into(),
            None => attrs.push(Attribute {
                name: QualName::new(None, ns!(), LocalName::from(name)),
                value: value.into(),
            }),
        }
    }
}

/// Concatenated text content of the subtree, in document order.
pub fn text(handle: &Handle) -> String {
    let mut out = String::new();
    if let NodeData::Text { contents } = &handle.data {
        out.push_str(&contents.borrow());
    }
    walk_children(handle, &mut |node| {
        if let NodeData::Text { contents } = &node.data {
            out.push_str(&contents.borrow());
        }
    });
    out
}

/// True when `node` lies inside the subtree rooted at `ancestor`
/// (strict containment, template content included).
pub fn contains(ancestor: &Handle, node: &Handle) -> bool {
    let mut found = false;
    walk_children(ancestor, &mut |candidate| {
        if Rc::ptr_eq(candidate, node) {
            found = true;
        }
    });
    found
}

/// Serialize a node (outer markup) to text.
pub fn serialize(handle: &Handle) -> String {
    let mut out = String::new();
    write_node(handle, false, &mut out);
    out
}

fn write_node(handle: &Handle, raw_text: bool, out: &mut String) {
    match &handle.data {
        NodeData::Document => {
            for child in handle.children.borrow().iter() {
                write_node(child, false, out);
            }
        }
        NodeData::Doctype { name, .. } => {
            out.push_str("<!DOCTYPE ");
            out.push_str(name);
            out.push('>');
        }
        NodeData::Text { contents } => {
            let text = contents.borrow();
            if raw_text {
                out.push_str(&text);
            } else {
                out.push_str(&escape_text(&text));
            }
        }
        NodeData::Comment { contents } => {
            out.push_str("<!--");
            out.push_str(contents);
            out.push_str("-->");
        }
        NodeData::Element {
            name,
            attrs,
            template_contents,
            ..
        } => {
            let tag = name.local.as_ref();
            out.push('<');
            out.push_str(tag);
            for attr in attrs.borrow().iter() {
                out.push(' ');
                out.push_str(attr.name.local.as_ref());
                out.push_str("=\"");
                out.push_str(&escape_attr(&attr.value));
                out.push('"');
            }
            out.push('>');
            if VOID_ELEMENTS.contains(&tag) {
                return;
            }
            let raw = RAW_TEXT_ELEMENTS.contains(&tag);
            if let Some(contents) = template_contents.borrow().as_ref() {
                for child in contents.children.borrow().iter() {
                    write_node(child, raw, out);
                }
            }
            for child in handle.children.borrow().iter() {
                write_node(child, raw, out);
            }
            out.push_str("</");
            out.push_str(tag);
            out.push('>');
        }
        NodeData::ProcessingInstruction { .. } => {}
    }
}

fn escape_text(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

fn escape_attr(value: &str) -> String {
    value.replace('&', "&amp;").replace('"', "&quot;")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn select_one(doc: &Document, selector: &str) -> Handle {
        let sel = Selector::parse(selector).unwrap();
        doc.select(&sel).into_iter().next().unwrap()
    }

    #[test]
    fn test_select_document_order() {
        let doc = Document::parse(
            "<dom-module id=\"x-a\"></dom-module><dom-module id=\"x-b\"></dom-module>",
        );
        let sel = Selector::parse("dom-module").unwrap();
        let ids: Vec<_> = doc
            .select(&sel)
            .iter()
            .map(|el| attr(el, "id").unwrap())
            .collect();
        assert_eq!(ids, vec!["x-a", "x-b"]);
    }

    #[test]
    fn test_select_descends_into_template_content() {
        let doc = Document::parse(
            "<dom-module id=\"x-a\"><template><style>.a{}</style></template></dom-module>",
        );
        let sel = Selector::parse("style").unwrap();
        assert_eq!(doc.select(&sel).len(), 1);
    }

    #[test]
    fn test_attr_write_reflected_in_serialization() {
        let doc = Document::parse("<template></template>");
        let tpl = select_one(&doc, "template");
        assert_eq!(attr(&tpl, "id"), None);
        set_attr(&tpl, "id", "x-foo");
        assert_eq!(attr(&tpl, "id").as_deref(), Some("x-foo"));
        assert!(serialize(&tpl).starts_with("<template id=\"x-foo\">"));
    }

    #[test]
    fn test_text_extraction() {
        let doc = Document::parse("<style>.x { color: red; }</style>");
        let style = select_one(&doc, "style");
        assert_eq!(text(&style), ".x { color: red; }");
    }

    #[test]
    fn test_serialize_template_with_content() {
        let doc = Document::parse("<template id=\"t\"><span>hi</span></template>");
        let tpl = select_one(&doc, "template");
        assert_eq!(
            serialize(&tpl),
            "<template id=\"t\"><span>hi</span></template>"
        );
    }

    #[test]
    fn test_serialize_void_element() {
        let doc = Document::parse("<link rel=\"import\" href=\"a.html\">");
        let link = select_one(&doc, "link");
        assert_eq!(serialize(&link), "<link rel=\"import\" href=\"a.html\">");
    }

    #[test]
    fn test_contains_through_template_boundary() {
        let doc = Document::parse(
            "<dom-module id=\"x\"><template><style>.a{}</style></template>\
             <style>.b{}</style></dom-module>",
        );
        let tpl = select_one(&doc, "template");
        let styles = doc.select(&Selector::parse("style").unwrap());
        assert_eq!(styles.len(), 2);
        assert!(contains(&tpl, &styles[0]));
        assert!(!contains(&tpl, &styles[1]));
    }

    #[test]
    fn test_raw_text_not_escaped() {
        let doc = Document::parse("<script>if (a && b) { go(); }</script>");
        let script = select_one(&doc, "script");
        assert_eq!(serialize(&script), "<script>if (a && b) { go(); }</script>");
    }
}
