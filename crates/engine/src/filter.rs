// ABOUTME: Text filter hooks: the engine finds the text node to rewrite, the filter rewrites the string.
// ABOUTME: Provides the TextFilter trait, a named closure adapter and the widont traversal.

use std::any::type_name;

use ego_tree::NodeId;

use crate::dom::Node;
use crate::tree::Tree;

const NBSP: char = '\u{a0}';

/// A pure string transform supplied by the host (widow prevention, smart
/// punctuation, inline markup ...). Output may contain HTML entities; they
/// are decoded before the text is stored back.
pub trait TextFilter {
    fn apply(&self, text: &str) -> String;

    fn name(&self) -> &str {
        type_name::<Self>()
    }
}

impl<F> TextFilter for F
where
    F: Fn(&str) -> String,
{
    fn apply(&self, text: &str) -> String {
        self(text)
    }
}

/// A closure with a name, for logs.
pub struct FnFilter<F> {
    name: String,
    f: F,
}

impl<F> FnFilter<F>
where
    F: Fn(&str) -> String,
{
    pub fn new(name: impl Into<String>, f: F) -> Self {
        Self {
            name: name.into(),
            f,
        }
    }
}

impl<F> TextFilter for FnFilter<F>
where
    F: Fn(&str) -> String,
{
    fn apply(&self, text: &str) -> String {
        (self.f)(text)
    }

    fn name(&self) -> &str {
        &self.name
    }
}

impl Tree {
    /// Runs `filter` on the last spaced text node of every node in the
    /// default view.
    pub fn filter(&mut self, filter: &dyn TextFilter) -> &mut Self {
        self.rewrite_last_text(filter.name(), |text| decode(&filter.apply(text)))
    }

    /// Widow prevention around a host filter.
    ///
    /// Text that already ends in whitespace gets a single non-breaking space
    /// instead and skips the filter. Slashes between words are bound on both
    /// sides.
    pub fn widont(&mut self, filter: &dyn TextFilter) -> &mut Self {
        self.rewrite_last_text(filter.name(), |text| {
            if text.ends_with(char::is_whitespace) {
                let mut bound = text.trim_end().to_string();
                bound.push(NBSP);
                return bound;
            }
            let text = text.replace(" /\u{a0}", " / ").replace("\u{a0}/ ", " / ");
            decode(&filter.apply(&text))
                .replace(" /\u{a0}", "\u{a0}/\u{a0}")
                .replace("\u{a0}/ ", "\u{a0}/\u{a0}")
        })
    }

    fn rewrite_last_text<F>(&mut self, filter: &str, rewrite: F) -> &mut Self
    where
        F: Fn(&str) -> String,
    {
        let targets: Vec<NodeId> = self
            .scope(false)
            .into_iter()
            .filter_map(|id| self.last_spaced_text(id))
            .collect();
        for id in &targets {
            if let Some(mut node) = self.document.tree_mut().get_mut(*id) {
                if let Node::Text(text) = node.value() {
                    *text = rewrite(text);
                }
            }
        }
        tracing::trace!(filter, rewritten = targets.len(), "applied text filter");
        self
    }

    /// Last text node in document order under `id` (or `id` itself) that
    /// contains a space.
    fn last_spaced_text(&self, id: NodeId) -> Option<NodeId> {
        self.document
            .get(id)?
            .descendants()
            .filter(|node| node.value().as_text().is_some_and(|text| text.contains(' ')))
            .last()
            .map(|node| node.id())
    }
}

fn decode(text: &str) -> String {
    html_escape::decode_html_entities(text).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn upper(text: &str) -> String {
        text.to_uppercase()
    }

    #[test]
    fn filter_rewrites_last_spaced_text_per_node() {
        let mut tree = Tree::new("<p>one two <b>three four</b> five</p><p>nospace</p>");
        tree.filter(&upper);
        assert_eq!(
            tree.html(false),
            "<p>one two <b>three four</b> FIVE</p><p>nospace</p>"
        );
    }

    #[test]
    fn filter_respects_selection() {
        let mut tree = Tree::new("<p>a b</p><p>c d</p>");
        tree.select("p").last().filter(&upper);
        assert_eq!(tree.html(true), "<p>a b</p><p>C D</p>");
    }

    #[test]
    fn filter_output_entities_are_decoded() {
        let mut tree = Tree::new("<p>a b</p>");
        tree.filter(&FnFilter::new("nbsp", |text: &str| text.replace(' ', "&nbsp;")));
        assert_eq!(tree.text(false), "a\u{a0}b");
        assert_eq!(tree.html(false), "<p>a&nbsp;b</p>");
    }

    #[test]
    fn named_filters_report_their_name() {
        let filter = FnFilter::new("shout", upper);
        assert_eq!(filter.name(), "shout");
        assert_eq!(filter.apply("x"), "X");
    }

    #[test]
    fn widont_binds_trailing_space_without_filtering() {
        let mut tree = Tree::new("<p>a b </p>");
        tree.widont(&upper);
        assert_eq!(tree.text(false), "a b\u{a0}");
    }

    #[test]
    fn widont_binds_slashes() {
        let bind_last = |text: &str| match text.rfind(' ') {
            Some(i) => format!("{}&nbsp;{}", &text[..i], &text[i + 1..]),
            None => text.to_string(),
        };
        let mut tree = Tree::new("<p>this or that / other</p>");
        tree.widont(&bind_last);
        assert_eq!(tree.text(false), "this or that\u{a0}/\u{a0}other");
    }
}
