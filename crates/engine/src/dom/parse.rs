// ABOUTME: Markup parser: runs html5ever (via scraper) and copies the repaired tree into a Document.
// ABOUTME: Parse errors become Diagnostics; empty input yields an empty body, never a failure.

use ego_tree::NodeId;
use scraper::{ElementRef, Html};

use super::{Document, Element, Node, BODY};
use crate::error::Diagnostic;

/// Result of parsing one markup string.
#[derive(Debug, Clone)]
pub struct Parsed {
    pub document: Document,
    pub diagnostics: Vec<Diagnostic>,
}

/// Parses a markup string into a [`Document`].
///
/// Fragments are parsed in a `body` context. Input that starts with a
/// doctype or an `<html>` tag is parsed as a full document and its body is
/// used. Malformed markup is repaired the way a browser would; every issue
/// html5ever reports is returned as a [`Diagnostic`].
pub fn parse(source: &str) -> Parsed {
    let trimmed = source.trim();
    if trimmed.is_empty() {
        return Parsed {
            document: Document::empty(),
            diagnostics: Vec::new(),
        };
    }

    let html = match document_kind(trimmed) {
        Some(Kind::WithDoctype) => Html::parse_document(trimmed),
        // html5ever flags a missing doctype as an error
        Some(Kind::HtmlOnly) => Html::parse_document(&format!("<!DOCTYPE html>{trimmed}")),
        None => Html::parse_fragment(trimmed),
    };

    let diagnostics: Vec<Diagnostic> = html
        .errors
        .iter()
        .map(|err| Diagnostic::new(err.to_string()))
        .collect();
    if !diagnostics.is_empty() {
        tracing::debug!(count = diagnostics.len(), "markup parsed with diagnostics");
    }

    let mut document = Document::empty();
    let body = document.body_id();
    let container = find_body(html.root_element());
    for child in container.children() {
        copy_node(child, &mut document, body);
    }

    Parsed {
        document,
        diagnostics,
    }
}

enum Kind {
    WithDoctype,
    HtmlOnly,
}

fn document_kind(source: &str) -> Option<Kind> {
    let head: String = source
        .chars()
        .take(9)
        .collect::<String>()
        .to_ascii_lowercase();
    if head.starts_with("<!doctype") {
        Some(Kind::WithDoctype)
    } else if head.starts_with("<html") {
        Some(Kind::HtmlOnly)
    } else {
        None
    }
}

/// Fragments hang off the synthetic `html` root; documents have a `body`.
fn find_body(root: ElementRef<'_>) -> ElementRef<'_> {
    root.children()
        .filter_map(ElementRef::wrap)
        .find(|el| el.value().name().eq_ignore_ascii_case(BODY))
        .unwrap_or(root)
}

fn copy_node(source: ego_tree::NodeRef<'_, scraper::Node>, document: &mut Document, parent: NodeId) {
    let value = match source.value() {
        scraper::Node::Text(text) => Node::Text(String::from(&**text)),
        scraper::Node::Comment(comment) => Node::Comment(String::from(&**comment)),
        scraper::Node::Element(el) => Node::Element(Element {
            name: el.name().to_string(),
            attrs: el
                .attrs()
                .map(|(name, value)| (name.to_string(), value.to_string()))
                .collect(),
        }),
        _ => return,
    };

    let Some(mut parent_mut) = document.tree_mut().get_mut(parent) else {
        return;
    };
    let id = parent_mut.append(value).id();

    for child in source.children() {
        copy_node(child, document, id);
    }
}
