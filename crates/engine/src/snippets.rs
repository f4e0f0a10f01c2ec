// ABOUTME: Per-node renderer dispatch: resolves `namespace/tag` renderers and feeds them SnippetData.
// ABOUTME: Nodes without a renderer are emitted as their own outer markup.

use std::collections::HashMap;

use ego_tree::NodeId;
use serde::{Serialize, Serializer};
use serde_json::Value;

use crate::dom::serialize::{inner_html, outer_html};
use crate::error::{Result, TreeError};
use crate::tree::Tree;

/// Renderer used when no tag-specific one is registered.
pub const DEFAULT_RENDERER: &str = "default";

/// Renders one top-level element.
pub trait Renderer {
    fn render(&self, data: &SnippetData) -> anyhow::Result<String>;
}

impl<F> Renderer for F
where
    F: Fn(&SnippetData) -> anyhow::Result<String>,
{
    fn render(&self, data: &SnippetData) -> anyhow::Result<String> {
        self(data)
    }
}

/// Resolves renderer names to renderers. The host decides how names map to
/// templates.
pub trait RendererRegistry {
    fn lookup(&self, name: &str) -> Option<&dyn Renderer>;
}

/// Registry of renderers keyed by qualified name (`blocks/h2`,
/// `blocks/default`).
#[derive(Default)]
pub struct SnippetRegistry {
    map: HashMap<String, Box<dyn Renderer>>,
}

impl SnippetRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a renderer under `name`, replacing any previous one.
    pub fn register(&mut self, name: impl Into<String>, renderer: impl Renderer + 'static) {
        self.map.insert(name.into(), Box::new(renderer));
    }

    /// Registers a closure renderer.
    pub fn register_fn<F>(&mut self, name: impl Into<String>, f: F)
    where
        F: Fn(&SnippetData) -> anyhow::Result<String> + 'static,
    {
        self.register(name, f);
    }

    pub fn contains(&self, name: &str) -> bool {
        self.map.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

impl RendererRegistry for SnippetRegistry {
    fn lookup(&self, name: &str) -> Option<&dyn Renderer> {
        self.map.get(name).map(Box::as_ref)
    }
}

/// A neighbouring element in scope.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Sibling {
    #[serde(skip)]
    pub id: NodeId,
    pub tag: String,
    pub html: String,
}

/// Everything a renderer gets to see about one element.
#[derive(Debug, Clone, Serialize)]
pub struct SnippetData {
    /// Renderer name that resolved.
    pub name: String,
    pub tag: String,
    /// Inner markup.
    pub content: String,
    #[serde(serialize_with = "ordered_attrs")]
    pub attrs: Vec<(String, String)>,
    /// 1-based among all elements in scope.
    pub position: usize,
    /// 1-based among elements with the same tag seen so far.
    pub type_position: usize,
    pub prev: Option<Sibling>,
    pub next: Option<Sibling>,
    /// Host data passed through untouched.
    pub extra: Value,
    #[serde(skip)]
    pub node: NodeId,
}

impl SnippetData {
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

fn ordered_attrs<S>(attrs: &[(String, String)], serializer: S) -> std::result::Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.collect_map(attrs.iter().map(|(key, value)| (key, value)))
}

/// Candidate renderer names for `tag`, most specific first.
fn renderer_names(namespace: &str, tag: &str) -> [String; 2] {
    let namespace = namespace.trim_end_matches('/');
    if namespace.is_empty() {
        [tag.to_string(), DEFAULT_RENDERER.to_string()]
    } else {
        [
            format!("{namespace}/{tag}"),
            format!("{namespace}/{DEFAULT_RENDERER}"),
        ]
    }
}

impl Tree {
    /// Renders every node in the default view through `registry`.
    ///
    /// Elements resolve `namespace/tag`, then `namespace/default`; without a
    /// renderer they are emitted as outer markup. Text and comments are
    /// emitted as they are and do not count towards positions.
    pub fn snippets(
        &self,
        namespace: &str,
        extra: &Value,
        registry: &dyn RendererRegistry,
    ) -> Result<String> {
        if let Some(raw) = self.fallback() {
            return Ok(raw.to_string());
        }

        let doc = &self.document;
        let scope = self.scope(false);
        let elements: Vec<NodeId> = scope
            .iter()
            .copied()
            .filter(|&id| doc.element(id).is_some())
            .collect();
        let sibling = |index: Option<usize>| -> Option<Sibling> {
            let id = *elements.get(index?)?;
            Some(Sibling {
                id,
                tag: doc.tag_name(id)?,
                html: outer_html(doc, id),
            })
        };

        let mut output = String::new();
        let mut position = 0;
        let mut type_positions: HashMap<String, usize> = HashMap::new();
        for id in scope {
            let Some(element) = doc.element(id) else {
                output.push_str(&outer_html(doc, id));
                continue;
            };
            let index = position;
            position += 1;
            let tag = element.name.to_ascii_lowercase();
            let type_position = {
                let seen = type_positions.entry(tag.clone()).or_insert(0);
                *seen += 1;
                *seen
            };

            let resolved = renderer_names(namespace, &tag)
                .into_iter()
                .find_map(|name| registry.lookup(&name).map(|renderer| (name, renderer)));
            let Some((name, renderer)) = resolved else {
                tracing::trace!(%tag, namespace, "no renderer, emitting markup");
                output.push_str(&outer_html(doc, id));
                continue;
            };

            let data = SnippetData {
                name: name.clone(),
                tag,
                content: inner_html(doc, id),
                attrs: element.attrs.clone(),
                position,
                type_position,
                prev: sibling(index.checked_sub(1)),
                next: sibling(Some(index + 1)),
                extra: extra.clone(),
                node: id,
            };
            let rendered = renderer
                .render(&data)
                .map_err(|err| TreeError::render(name, err))?;
            output.push_str(&rendered);
        }
        Ok(output)
    }
}
