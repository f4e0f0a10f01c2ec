// ABOUTME: Markup serializer for Document nodes: outer markup, inner markup and escaping rules.
// ABOUTME: Void elements lose their end tag, raw-text elements are written verbatim.

use std::borrow::Cow;

use ego_tree::{NodeId, NodeRef};

use super::{Document, Node};

const NBSP: char = '\u{a0}';

/// Outer markup of a node (the node itself plus its subtree).
pub fn outer_html(doc: &Document, id: NodeId) -> String {
    let mut out = String::new();
    if let Some(node) = doc.get(id) {
        write_node(node, &mut out, false);
    }
    out
}

/// Markup of a node's children, concatenated.
pub fn inner_html(doc: &Document, id: NodeId) -> String {
    let mut out = String::new();
    if let Some(node) = doc.get(id) {
        let raw = node
            .value()
            .as_element()
            .is_some_and(|el| is_raw_text_element(&el.name));
        for child in node.children() {
            write_node(child, &mut out, raw);
        }
    }
    out
}

fn write_node(node: NodeRef<'_, Node>, out: &mut String, raw_text: bool) {
    match node.value() {
        Node::Document => {
            for child in node.children() {
                write_node(child, out, false);
            }
        }
        Node::Text(text) => {
            if raw_text {
                out.push_str(text);
            } else {
                out.push_str(&escape_text(text));
            }
        }
        Node::Comment(comment) => {
            out.push_str("<!--");
            out.push_str(comment);
            out.push_str("-->");
        }
        Node::Element(el) => {
            out.push('<');
            out.push_str(&el.name);
            for (name, value) in &el.attrs {
                out.push(' ');
                out.push_str(name);
                out.push_str("=\"");
                out.push_str(&html_escape::encode_double_quoted_attribute(value));
                out.push('"');
            }
            out.push('>');

            if is_void_element(&el.name) {
                return;
            }

            let raw = is_raw_text_element(&el.name);
            for child in node.children() {
                write_node(child, out, raw);
            }
            out.push_str("</");
            out.push_str(&el.name);
            out.push('>');
        }
    }
}

/// Escapes text content. Non-breaking spaces are written as `&nbsp;` so they
/// stay visible in the markup.
pub fn escape_text(text: &str) -> Cow<'_, str> {
    let escaped = html_escape::encode_text(text);
    if escaped.contains(NBSP) {
        Cow::Owned(escaped.replace(NBSP, "&nbsp;"))
    } else {
        escaped
    }
}

/// Elements that never have an end tag.
pub fn is_void_element(name: &str) -> bool {
    matches!(
        name.to_ascii_lowercase().as_str(),
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

fn is_raw_text_element(name: &str) -> bool {
    matches!(name.to_ascii_lowercase().as_str(), "script" | "style")
}
