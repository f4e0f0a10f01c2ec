// ABOUTME: Tree engine: owns one parsed Document, a query Cursor and the fluent selection API.
// ABOUTME: Serializes the current selection (or the body) as markup, inner markup or text.

//! The fluent query-and-transform engine.
//!
//! A [`Tree`] is built from a markup string. Selection calls narrow a running
//! path query held in a [`Cursor`]; transforms (see the `transform` module)
//! mutate the document in place; output methods serialize either the current
//! selection or the body's children.
//!
//! ```
//! use treekit_engine::Tree;
//!
//! let mut tree = Tree::new("<p>Hello world</p><p>Bye</p>");
//! assert_eq!(tree.select("p").last().text(false), "Bye");
//! ```

use std::collections::HashMap;
use std::fmt;

use ego_tree::NodeId;

use crate::dom::parse::parse;
use crate::dom::serialize::{inner_html, outer_html};
use crate::dom::Document;
use crate::error::{Diagnostic, Result};
use crate::options::{FallbackPolicy, Options, Output, TreeBuilder};
use crate::query::Query;
use crate::source::{self, MarkupSource};

/// Root of every running query.
const QUERY_ROOT: &str = "/body";

/// An evaluated query result, tagged with the document generation it was
/// computed at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selection {
    ids: Vec<NodeId>,
    generation: u64,
}

impl Selection {
    pub fn ids(&self) -> &[NodeId] {
        &self.ids
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// A selection is stale once the document structure changed after it
    /// was evaluated.
    pub fn is_stale(&self, doc: &Document) -> bool {
        self.generation != doc.generation()
    }
}

/// Query state: the running path string and its last evaluation.
///
/// The cursor is a plain value. Chaining produces a new cursor from the old
/// one, and probing (see [`Tree::has`]) works on a clone, so the live chain
/// is never disturbed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Cursor {
    query: Option<String>,
    selection: Option<Selection>,
}

impl Cursor {
    /// The running query, `None` when no filter is active.
    pub fn query(&self) -> Option<&str> {
        self.query.as_deref()
    }

    pub fn selection(&self) -> Option<&Selection> {
        self.selection.as_ref()
    }

    pub fn is_active(&self) -> bool {
        self.query.is_some()
    }

    /// Appends a fragment to the running query and evaluates it.
    ///
    /// Without an active query the path starts at `/body`. Relative fragments
    /// are joined with `/`; fragments starting with `/` (such as `//p`) are
    /// appended verbatim.
    pub fn select(self, doc: &Document, fragment: &str) -> Cursor {
        let query = self.joined(fragment);
        Cursor::evaluate(doc, query)
    }

    /// The query `select(fragment)` would run.
    fn joined(&self, fragment: &str) -> String {
        let mut query = self.query.clone().unwrap_or_else(|| QUERY_ROOT.to_string());
        if !fragment.starts_with('/') {
            query.push('/');
        }
        query.push_str(fragment);
        query
    }

    /// Narrows the current scope with a predicate such as
    /// `position() = 1`. Without an active query the predicate applies to
    /// the body's child elements.
    pub fn narrow(self, doc: &Document, predicate: &str) -> Cursor {
        match self.query {
            Some(mut query) => {
                query.push('[');
                query.push_str(predicate);
                query.push(']');
                Cursor::evaluate(doc, query)
            }
            None => Cursor::default().select(doc, &format!("*[{predicate}]")),
        }
    }

    /// Re-evaluates the running query against the current document.
    pub fn refresh(self, doc: &Document) -> Cursor {
        match self.query {
            Some(query) => Cursor::evaluate(doc, query),
            None => Cursor::default(),
        }
    }

    fn evaluate(doc: &Document, query: String) -> Cursor {
        let ids = evaluate_query(doc, &query);
        Cursor {
            query: Some(query),
            selection: Some(Selection {
                ids,
                generation: doc.generation(),
            }),
        }
    }

    /// Selected ids, re-evaluated when the stored selection is stale.
    fn current_ids(&self, doc: &Document) -> Vec<NodeId> {
        match (&self.query, &self.selection) {
            (_, Some(selection)) if !selection.is_stale(doc) => selection.ids.clone(),
            (Some(query), _) => evaluate_query(doc, query),
            (None, _) => Vec::new(),
        }
    }

    /// Empty-ness as seen by `is_empty`: the body's children when nothing was
    /// selected yet, the selection otherwise.
    pub fn is_empty(&self, doc: &Document) -> bool {
        if self.selection.is_none() {
            return doc.body_children().is_empty();
        }
        self.current_ids(doc).is_empty()
    }
}

fn evaluate_query(doc: &Document, query: &str) -> Vec<NodeId> {
    match Query::parse(query) {
        Ok(compiled) => {
            let ids = compiled.evaluate_root(doc);
            if ids.is_empty() {
                tracing::debug!(%query, "query matched nothing");
            }
            ids
        }
        Err(err) => {
            tracing::debug!(error = %err, "query failed to compile, selection is empty");
            Vec::new()
        }
    }
}

/// One parsed markup block plus its query state.
#[derive(Debug, Clone)]
pub struct Tree {
    pub(crate) source: String,
    pub(crate) document: Document,
    pub(crate) diagnostics: Vec<Diagnostic>,
    pub(crate) cursor: Cursor,
    pub(crate) options: Options,
}

impl Tree {
    /// Parse `source` with default options.
    pub fn new(source: impl Into<String>) -> Self {
        Self::with_options(source, Options::default())
    }

    /// Create a TreeBuilder for custom configuration.
    pub fn builder() -> TreeBuilder {
        TreeBuilder::new()
    }

    pub fn with_options(source: impl Into<String>, options: Options) -> Self {
        let mut tree = Self {
            source: String::new(),
            document: Document::empty(),
            diagnostics: Vec::new(),
            cursor: Cursor::default(),
            options,
        };
        tree.set(source);
        tree.load();
        tree
    }

    /// Pull markup from a host source through `formatter` (or the
    /// process-wide default formatter).
    pub fn from_source(source: &dyn MarkupSource, formatter: Option<&str>) -> Self {
        Self::new(source::resolve(source, formatter))
    }

    /// Replaces the source string. The tree is rebuilt by [`Tree::load`].
    pub fn set(&mut self, source: impl Into<String>) -> &mut Self {
        self.source = source.into().trim().to_string();
        self.clear()
    }

    /// Parses the current source, replacing the document and diagnostics.
    pub fn load(&mut self) -> &mut Self {
        let parsed = parse(&self.source);
        self.document = parsed.document;
        self.diagnostics = parsed.diagnostics;
        self.clear()
    }

    /// The trimmed source string the tree was built from.
    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    pub fn has_diagnostics(&self) -> bool {
        !self.diagnostics.is_empty()
    }

    pub fn options(&self) -> &Options {
        &self.options
    }

    pub fn cursor(&self) -> &Cursor {
        &self.cursor
    }

    /// Restores a previously saved cursor. Its selection is re-evaluated if
    /// the document changed since.
    pub fn set_cursor(&mut self, cursor: Cursor) -> &mut Self {
        self.cursor = cursor.refresh(&self.document);
        self
    }

    // ------------------------------------------------------------------
    // Selections
    // ------------------------------------------------------------------

    pub fn first(&mut self) -> &mut Self {
        self.narrow("position() = 1")
    }

    pub fn last(&mut self) -> &mut Self {
        self.narrow("position() = last()")
    }

    /// 1-based; out of range gives an empty selection.
    pub fn nth(&mut self, index: usize) -> &mut Self {
        self.narrow(&format!("position() = {index}"))
    }

    pub fn limit(&mut self, limit: usize) -> &mut Self {
        self.narrow(&format!("position() <= {limit}"))
    }

    pub fn offset(&mut self, offset: usize) -> &mut Self {
        self.narrow(&format!("position() > {offset}"))
    }

    pub fn select(&mut self, fragment: &str) -> &mut Self {
        self.cursor = std::mem::take(&mut self.cursor).select(&self.document, fragment);
        self
    }

    /// Like [`Tree::select`], but a fragment that does not compile is
    /// returned as an error and the running query is left unchanged.
    pub fn try_select(&mut self, fragment: &str) -> Result<&mut Self> {
        Query::parse(&self.cursor.joined(fragment))?;
        Ok(self.select(fragment))
    }

    fn narrow(&mut self, predicate: &str) -> &mut Self {
        self.cursor = std::mem::take(&mut self.cursor).narrow(&self.document, predicate);
        self
    }

    /// Drops query and selection; the default view applies again.
    pub fn clear(&mut self) -> &mut Self {
        self.cursor = Cursor::default();
        self
    }

    pub fn is_empty(&self) -> bool {
        self.cursor.is_empty(&self.document)
    }

    pub fn is_not_empty(&self) -> bool {
        !self.is_empty()
    }

    /// Would `select(fragment)` match anything? The live cursor is left
    /// untouched.
    pub fn has(&self, fragment: &str) -> bool {
        !self
            .cursor
            .clone()
            .select(&self.document, fragment)
            .is_empty(&self.document)
    }

    /// Re-evaluates the running query after a structural change.
    pub(crate) fn refresh(&mut self) {
        if self.cursor.is_active() {
            self.cursor = std::mem::take(&mut self.cursor).refresh(&self.document);
        }
    }

    /// The raw selection: ids of the explicit query result, empty when no
    /// query is active.
    pub(crate) fn selected(&self) -> Vec<NodeId> {
        self.cursor.current_ids(&self.document)
    }

    /// The default view: the selection if non-empty, else the body's
    /// children. `clear` forces the body's children.
    pub(crate) fn scope(&self, clear: bool) -> Vec<NodeId> {
        if !clear {
            let selected = self.selected();
            if !selected.is_empty() {
                return selected;
            }
        }
        self.document.body_children()
    }

    // ------------------------------------------------------------------
    // Output
    // ------------------------------------------------------------------

    /// The original source, when the fallback policy says diagnostics
    /// should suppress serialization.
    pub(crate) fn fallback(&self) -> Option<&str> {
        if self.options.fallback == FallbackPolicy::RawSource && self.has_diagnostics() {
            tracing::debug!(
                diagnostics = self.diagnostics.len(),
                "returning raw source because parsing reported diagnostics"
            );
            return Some(&self.source);
        }
        None
    }

    /// Outer markup of every node in scope.
    pub fn html(&self, clear: bool) -> String {
        if let Some(raw) = self.fallback() {
            return raw.to_string();
        }
        self.scope(clear)
            .into_iter()
            .map(|id| outer_html(&self.document, id))
            .collect()
    }

    /// Inner markup of the node in scope. With several nodes in scope only
    /// the last one's inner markup is returned.
    pub fn content(&self, clear: bool) -> String {
        if let Some(raw) = self.fallback() {
            return raw.to_string();
        }
        let mut content = String::new();
        for id in self.scope(clear) {
            content = inner_html(&self.document, id);
        }
        content
    }

    /// Text content of every node in scope, concatenated.
    pub fn text(&self, clear: bool) -> String {
        if let Some(raw) = self.fallback() {
            return raw.to_string();
        }
        self.scope(clear)
            .into_iter()
            .map(|id| self.document.text_content(id))
            .collect()
    }

    /// 1-based position (counting elements only) of the first element in
    /// scope matching `selector`.
    ///
    /// The selector is evaluated from each scope node's parent, so for the
    /// body's children `p[2]` means the result of `/body/p[2]`.
    pub fn position(&self, selector: &str) -> Option<usize> {
        let matcher = match Query::parse(selector.trim()) {
            Ok(matcher) => matcher,
            Err(err) => {
                tracing::debug!(error = %err, "position selector failed to compile");
                return None;
            }
        };
        let mut matched: HashMap<NodeId, Vec<NodeId>> = HashMap::new();
        self.scope(false)
            .into_iter()
            .filter(|&id| self.document.element(id).is_some())
            .position(|id| {
                let Some(parent) = self.document.parent(id) else {
                    return false;
                };
                matched
                    .entry(parent)
                    .or_insert_with(|| matcher.evaluate(&self.document, parent))
                    .contains(&id)
            })
            .map(|index| index + 1)
    }

    pub fn convert(&self, output: Output) -> String {
        match output {
            Output::Html => self.html(false),
            Output::Content => self.content(false),
            Output::Text => self.text(false),
        }
    }

    /// Read-only access to the parsed document.
    pub fn to_document(&self) -> &Document {
        &self.document
    }

    /// The current selection, `None` when no query is active.
    pub fn to_selection(&self) -> Option<&Selection> {
        self.cursor.selection()
    }
}

impl fmt::Display for Tree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.html(false))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn select_then_last_narrows_the_selection() {
        let mut tree = Tree::new("<p>Hello world</p><p>Bye</p>");
        assert_eq!(tree.select("p").last().text(false), "Bye");
        assert_eq!(
            tree.cursor().query(),
            Some("/body/p[position() = last()]")
        );
    }

    #[test]
    fn positional_helpers_without_query_use_body_children() {
        let mut tree = Tree::new("<h1>A</h1><p>B</p><p>C</p>");
        assert_eq!(tree.first().html(false), "<h1>A</h1>");
        assert_eq!(tree.clear().nth(2).html(false), "<p>B</p>");
        assert_eq!(tree.clear().limit(2).text(false), "AB");
        assert_eq!(tree.clear().offset(1).text(false), "BC");
        assert_eq!(tree.clear().offset(1).limit(1).text(false), "B");
    }

    #[test]
    fn relative_and_absolute_fragments() {
        let mut tree = Tree::new("<div><p>inner</p></div><p>outer</p>");
        assert_eq!(tree.select("p").text(false), "outer");
        assert_eq!(tree.clear().select("//p").text(false), "innerouter");
        assert_eq!(tree.clear().select("div").select("p").text(false), "inner");
        assert_eq!(tree.cursor().query(), Some("/body/div/p"));
        assert_eq!(tree.clear().select("div/p").text(false), "inner");
        assert_eq!(tree.clear().select("/div/p").text(false), "inner");
    }

    #[test]
    fn empty_selection_falls_back_to_body_for_output() {
        let mut tree = Tree::new("<p>a</p><p>b</p>");
        tree.select("table");
        assert!(tree.is_empty());
        assert_eq!(tree.html(false), "<p>a</p><p>b</p>");
    }

    #[test]
    fn is_empty_before_any_selection_looks_at_body() {
        assert!(Tree::new("").is_empty());
        assert!(Tree::new("<p>x</p>").is_not_empty());
    }

    #[test]
    fn has_does_not_touch_the_live_chain() {
        let mut tree = Tree::new("<h2>A</h2><p>B <b>x</b></p>");
        tree.select("p");
        let before = tree.cursor().clone();
        assert!(tree.has("b"));
        assert!(!tree.has("h2"));
        assert_eq!(tree.cursor(), &before);
        assert_eq!(tree.text(false), "B x");
    }

    #[test]
    fn has_from_a_fresh_tree() {
        let tree = Tree::new("<h2>A</h2><p>B</p>");
        assert!(tree.has("h2"));
        assert!(!tree.has("h3"));
        assert!(tree.cursor().query().is_none());
    }

    #[test]
    fn content_keeps_only_the_last_node() {
        let mut tree = Tree::new("<p>a <b>1</b></p><p>b <i>2</i></p>");
        assert_eq!(tree.content(false), "b <i>2</i>");
        assert_eq!(tree.select("p").first().content(false), "a <b>1</b>");
        assert_eq!(tree.content(true), "b <i>2</i>");
    }

    #[test]
    fn html_clear_ignores_selection() {
        let mut tree = Tree::new("<p>a</p><p>b</p>");
        tree.select("p").first();
        assert_eq!(tree.html(false), "<p>a</p>");
        assert_eq!(tree.html(true), "<p>a</p><p>b</p>");
    }

    #[test]
    fn position_counts_elements_in_scope() {
        let tree = Tree::new("<h1>A</h1>\n<p>B</p>\n<ul><li>C</li></ul>");
        assert_eq!(tree.position("p"), Some(2));
        assert_eq!(tree.position("ul"), Some(3));
        assert_eq!(tree.position("table"), None);
        assert_eq!(Tree::new("").position("p"), None);
    }

    #[test]
    fn position_honours_positional_predicates() {
        let tree = Tree::new("<p>a</p><p>b</p>");
        assert_eq!(tree.position("p[2]"), Some(2));
        assert_eq!(tree.position("p[last()]"), Some(2));
        assert_eq!(tree.position("p[3]"), None);

        let mut tree = Tree::new("<ul><li>1</li><li>2</li></ul>");
        assert_eq!(tree.select("ul").select("li").position("li[2]"), Some(2));
    }

    #[test]
    fn predicates_after_parent_step() {
        let mut tree = Tree::new("<p>x <b>1</b></p><p>y</p>");
        tree.select("//b").select("..").last();
        assert_eq!(tree.cursor().query(), Some("/body//b/..[position() = last()]"));
        assert!(tree.is_not_empty());
        assert_eq!(tree.html(false), "<p>x <b>1</b></p>");
    }

    #[test]
    fn try_select_reports_bad_fragments() {
        let mut tree = Tree::new("<p>a</p><p>b</p>");
        tree.select("p");
        let err = tree.try_select("b[").unwrap_err();
        assert!(err.is_query());
        assert_eq!(tree.cursor().query(), Some("/body/p"));

        assert_eq!(tree.try_select("..").unwrap().text(false), "ab");
    }

    #[test]
    fn invalid_query_selects_nothing() {
        let mut tree = Tree::new("<p>a</p>");
        tree.select("p[");
        assert!(tree.is_empty());
        assert_eq!(tree.to_selection().map(Selection::len), Some(0));
    }

    #[test]
    fn raw_source_fallback_on_diagnostics() {
        let source = "<p>Hello</p></div>";
        let mut tree = Tree::new(source);
        assert!(tree.has_diagnostics());
        tree.select("p").set_attribute("class", "x");
        assert_eq!(tree.html(false), source);
        assert_eq!(tree.text(false), source);
    }

    #[test]
    fn serialize_policy_ignores_diagnostics() {
        let mut tree = Tree::builder()
            .fallback(FallbackPolicy::Serialize)
            .build("<p>Hello</p></div>");
        tree.select("p").set_attribute("class", "x");
        assert_eq!(tree.html(true), r#"<p class="x">Hello</p>"#);
    }

    #[test]
    fn set_and_load_reparse() {
        let mut tree = Tree::new("<p>a</p>");
        tree.select("p");
        tree.set("  <h1>b</h1>  ").load();
        assert_eq!(tree.source(), "<h1>b</h1>");
        assert!(tree.cursor().query().is_none());
        assert_eq!(tree.html(false), "<h1>b</h1>");
    }

    #[test]
    fn display_and_convert() {
        let tree = Tree::new("<p>a <b>b</b></p>");
        assert_eq!(tree.to_string(), "<p>a <b>b</b></p>");
        assert_eq!(tree.convert(Output::Text), "a b");
        assert_eq!(tree.convert(Output::Content), "a <b>b</b>");
    }

    #[test]
    fn saved_cursor_is_refreshed_on_restore() {
        let mut tree = Tree::new("<p>a</p><p>b</p>");
        let saved = tree.select("p").cursor().clone();
        tree.clear().select("p").first().set_name("div");
        tree.set_cursor(saved);
        assert_eq!(tree.text(false), "b");
        assert!(!tree.to_selection().unwrap().is_stale(tree.to_document()));
    }
}
