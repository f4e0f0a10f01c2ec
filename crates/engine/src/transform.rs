// ABOUTME: Structural mutators on a Tree: rename, attributes, unwrap, heading levels and wrapping.
// ABOUTME: Every mutation works on the raw selection or the body's top level and never raises.

use ego_tree::NodeId;
use regex::Regex;

use crate::dom::{Element, Node};
use crate::query::{self, Query};
use crate::tree::Tree;

/// Highest heading rank.
const MAX_HEADING: usize = 6;

impl Tree {
    /// Renames every selected element, keeping attributes and children in
    /// order. The running query is re-evaluated afterwards.
    pub fn set_name(&mut self, name: &str) -> &mut Self {
        let ids = self.selected();
        if ids.is_empty() {
            return self;
        }
        let mut renamed = 0;
        for id in ids {
            if self.document.rename(id, name).is_some() {
                renamed += 1;
            }
        }
        tracing::trace!(name, renamed, "renamed selection");
        if renamed > 0 {
            self.document.touch();
            self.refresh();
        }
        self
    }

    /// Sets `name` on every selected element. Existing attributes keep
    /// their position, new ones are appended.
    pub fn set_attribute(&mut self, name: &str, value: &str) -> &mut Self {
        for id in self.selected() {
            if let Some(mut node) = self.document.tree_mut().get_mut(id) {
                if let Some(element) = node.value().as_element_mut() {
                    element.set_attr(name, value);
                }
            }
        }
        self
    }

    pub fn remove_attribute(&mut self, name: &str) -> &mut Self {
        for id in self.selected() {
            if let Some(mut node) = self.document.tree_mut().get_mut(id) {
                if let Some(element) = node.value().as_element_mut() {
                    element.remove_attr(name);
                }
            }
        }
        self
    }

    /// Replaces every selected element by its children.
    pub fn unwrap(&mut self) -> &mut Self {
        let mut changed = false;
        for id in self.selected() {
            changed |= self.document.unwrap_element(id);
        }
        if changed {
            self.document.touch();
            self.refresh();
        }
        self
    }

    /// Demotes top-level headings so that `h1` becomes `h{n}`.
    ///
    /// Ranks are processed from 6 down to 1 and clamped at 6. Values below 2
    /// leave the tree alone. The cursor is cleared afterwards.
    pub fn level(&mut self, n: usize) -> &mut Self {
        if n < 2 {
            return self;
        }
        let mut renamed = 0;
        for rank in (1..=MAX_HEADING).rev() {
            let target = rank.saturating_add(n - 1).min(MAX_HEADING);
            if target == rank {
                continue;
            }
            let from = format!("h{rank}");
            let to = format!("h{target}");
            let headings: Vec<NodeId> = self
                .document
                .body_children()
                .into_iter()
                .filter(|&id| self.document.element(id).is_some_and(|el| el.is(&from)))
                .collect();
            for id in headings {
                if self.document.rename(id, &to).is_some() {
                    renamed += 1;
                }
            }
        }
        tracing::trace!(n, renamed, "shifted heading levels");
        if renamed > 0 {
            self.document.touch();
        }
        self.clear()
    }

    /// Wraps runs of top-level siblings in a new `name` element.
    ///
    /// A run starts at each element of `/body/{from}`. With an
    /// explicit `to`, following siblings are absorbed until one matches `to`
    /// (absorbed, then stop) or `from` (not absorbed). Without `to`, the run
    /// is the sequence of consecutive `from` matches.
    pub fn wrap(
        &mut self,
        name: &str,
        from: &str,
        to: Option<&str>,
        attrs: &[(&str, &str)],
    ) -> &mut Self {
        let Some(from) = top_level(from) else {
            return self;
        };
        let to = match to {
            Some(to) => match boundary(to) {
                Some(to) => Some(to),
                None => return self,
            },
            None => None,
        };

        let body = self.document.body_id();
        let starters: Vec<NodeId> = from
            .evaluate_root(&self.document)
            .into_iter()
            .filter(|&id| self.document.element(id).is_some())
            .collect();
        let is_starter = |id: NodeId| starters.contains(&id);

        let mut wrapped = 0;
        for &starter in &starters {
            if self.document.parent(starter) != Some(body) {
                continue;
            }
            let wrapper = Element::with_attrs(name, attrs.iter().copied());
            let Some(wrapper) = self.insert_before(starter, Node::Element(wrapper)) else {
                continue;
            };
            self.absorb(wrapper, starter);
            wrapped += 1;

            match &to {
                Some(to) => {
                    if self.is_match(to, starter) {
                        continue;
                    }
                    while let Some(next) = self.document.next_sibling(wrapper) {
                        if is_starter(next) {
                            break;
                        }
                        self.absorb(wrapper, next);
                        if self.is_match(to, next) {
                            break;
                        }
                    }
                }
                None => {
                    while let Some(next) = self.document.next_sibling(wrapper) {
                        if is_starter(next) {
                            self.absorb(wrapper, next);
                        } else if self.is_blank_text(next)
                            && self
                                .document
                                .next_sibling(next)
                                .is_some_and(is_starter)
                        {
                            self.absorb(wrapper, next);
                        } else {
                            break;
                        }
                    }
                }
            }
        }

        tracing::trace!(name, wrapped, "wrapped sibling runs");
        if wrapped > 0 {
            self.document.touch();
            self.refresh();
        }
        self
    }

    /// Wraps every occurrence of `needle` in text under body with a `name`
    /// element, using the configured word-boundary mode.
    pub fn wrap_text(&mut self, needle: &str, name: &str, attrs: &[(&str, &str)]) -> &mut Self {
        let whole_word = self.options.whole_word;
        self.wrap_text_with(needle, name, attrs, whole_word)
    }

    pub fn wrap_text_with(
        &mut self,
        needle: &str,
        name: &str,
        attrs: &[(&str, &str)],
        whole_word: bool,
    ) -> &mut Self {
        if needle.is_empty() {
            return self;
        }
        let pattern = if whole_word {
            match Regex::new(&format!(r"\b{}\b", regex::escape(needle))) {
                Ok(re) => Some(re),
                Err(err) => {
                    tracing::debug!(error = %err, needle, "could not build needle pattern");
                    return self;
                }
            }
        } else {
            None
        };

        let candidates: Vec<(NodeId, String)> = match self.document.get(self.document.body_id()) {
            Some(body) => body
                .descendants()
                .filter(|node| node.parent().is_some_and(|p| p.value().is_element()))
                .filter_map(|node| {
                    let text = node.value().as_text()?;
                    text.contains(needle).then(|| (node.id(), text.to_string()))
                })
                .collect(),
            None => Vec::new(),
        };

        let mut changed = 0;
        for (id, text) in candidates {
            let spans: Vec<(usize, usize)> = match &pattern {
                Some(re) => re.find_iter(&text).map(|m| (m.start(), m.end())).collect(),
                None => text
                    .match_indices(needle)
                    .map(|(start, found)| (start, start + found.len()))
                    .collect(),
            };
            if spans.is_empty() {
                continue;
            }

            let mut cursor = 0;
            for (start, end) in spans {
                if start > cursor {
                    self.insert_before(id, Node::Text(text[cursor..start].to_string()));
                }
                let wrapper = Element::with_attrs(name, attrs.iter().copied());
                if let Some(wrapper) = self.insert_before(id, Node::Element(wrapper)) {
                    if let Some(mut node) = self.document.tree_mut().get_mut(wrapper) {
                        node.append(Node::Text(text[start..end].to_string()));
                    }
                }
                cursor = end;
            }
            if cursor < text.len() {
                self.insert_before(id, Node::Text(text[cursor..].to_string()));
            }
            if let Some(mut node) = self.document.tree_mut().get_mut(id) {
                node.detach();
            }
            changed += 1;
        }

        tracing::trace!(needle, name, changed, "wrapped text occurrences");
        if changed > 0 {
            self.document.touch();
            self.refresh();
        }
        self
    }

    fn is_match(&self, matcher: &Query, id: NodeId) -> bool {
        self.document.element(id).is_some() && matcher.matches(&self.document, id)
    }

    fn is_blank_text(&self, id: NodeId) -> bool {
        self.document
            .get(id)
            .and_then(|node| node.value().as_text())
            .is_some_and(|text| text.trim().is_empty())
    }

    fn insert_before(&mut self, sibling: NodeId, node: Node) -> Option<NodeId> {
        let mut sibling = self.document.tree_mut().get_mut(sibling)?;
        Some(sibling.insert_before(node).id())
    }

    fn absorb(&mut self, wrapper: NodeId, child: NodeId) {
        if let Some(mut wrapper) = self.document.tree_mut().get_mut(wrapper) {
            wrapper.append_id(child);
        }
    }
}

/// Compiles `selector` against the body's top level, so positional
/// predicates such as `h2[2]` count among the body's children.
fn top_level(selector: &str) -> Option<Query> {
    match Query::parse(&format!("/body/{}", selector.trim())) {
        Ok(query) => Some(query),
        Err(err) => {
            tracing::debug!(error = %err, "wrap selector failed to compile");
            None
        }
    }
}

/// Compiles a boundary selector as a single `self::` step.
fn boundary(selector: &str) -> Option<Query> {
    match query::self_step(selector) {
        Ok(query) => Some(query),
        Err(err) => {
            tracing::debug!(error = %err, "boundary selector failed to compile");
            None
        }
    }
}
