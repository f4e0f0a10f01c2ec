// ABOUTME: Node model for parsed markup: an ego_tree arena of elements, text and comments.
// ABOUTME: Document owns the tree, addresses the body container and tracks a structural generation.

//! DOM model used by every higher component.
//!
//! The tree is an [`ego_tree::Tree`] whose root is a [`Node::Document`] marker
//! holding exactly one `body` element. Nodes are addressed by [`NodeId`]
//! handles; ids stay valid after a node is detached, so callers that keep ids
//! around compare [`Document::generation`] to find out whether the structure
//! changed since they looked.

pub mod parse;
pub mod serialize;

use ego_tree::{NodeId, NodeRef, Tree};

/// Tag name of the single top-level container.
pub const BODY: &str = "body";

/// A node in the document tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    /// The tree root. Never serialized.
    Document,
    Element(Element),
    Text(String),
    Comment(String),
}

impl Node {
    pub fn as_element(&self) -> Option<&Element> {
        match self {
            Node::Element(el) => Some(el),
            _ => None,
        }
    }

    pub fn as_element_mut(&mut self) -> Option<&mut Element> {
        match self {
            Node::Element(el) => Some(el),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Node::Text(text) => Some(text),
            _ => None,
        }
    }

    pub fn is_element(&self) -> bool {
        matches!(self, Node::Element(_))
    }

    pub fn is_text(&self) -> bool {
        matches!(self, Node::Text(_))
    }
}

/// An element: tag name plus attributes in source order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
    pub name: String,
    pub attrs: Vec<(String, String)>,
}

impl Element {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            attrs: Vec::new(),
        }
    }

    /// Builds an element with the given attributes, keeping their order.
    pub fn with_attrs<I, K, V>(name: impl Into<String>, attrs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let mut element = Self::new(name);
        for (key, value) in attrs {
            element.set_attr(key, value);
        }
        element
    }

    /// Case-insensitive tag comparison.
    pub fn is(&self, name: &str) -> bool {
        self.name.eq_ignore_ascii_case(name)
    }

    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    /// Sets an attribute. An existing attribute keeps its position.
    pub fn set_attr(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        match self
            .attrs
            .iter_mut()
            .find(|(key, _)| key.eq_ignore_ascii_case(&name))
        {
            Some((_, existing)) => *existing = value,
            None => self.attrs.push((name, value)),
        }
    }

    pub fn remove_attr(&mut self, name: &str) -> Option<String> {
        let index = self
            .attrs
            .iter()
            .position(|(key, _)| key.eq_ignore_ascii_case(name))?;
        Some(self.attrs.remove(index).1)
    }
}

/// Owns the node graph for one engine instance.
#[derive(Debug, Clone)]
pub struct Document {
    tree: Tree<Node>,
    body: NodeId,
    generation: u64,
}

impl Document {
    /// A document whose body has no children.
    pub fn empty() -> Self {
        let mut tree = Tree::new(Node::Document);
        let body = tree.root_mut().append(Node::Element(Element::new(BODY))).id();
        Self {
            tree,
            body,
            generation: 0,
        }
    }

    pub fn tree(&self) -> &Tree<Node> {
        &self.tree
    }

    /// Mutable access to the tree. Structural changes must be followed by
    /// [`Document::touch`].
    pub(crate) fn tree_mut(&mut self) -> &mut Tree<Node> {
        &mut self.tree
    }

    pub fn root_id(&self) -> NodeId {
        self.tree.root().id()
    }

    pub fn body_id(&self) -> NodeId {
        self.body
    }

    pub fn get(&self, id: NodeId) -> Option<NodeRef<'_, Node>> {
        self.tree.get(id)
    }

    pub fn element(&self, id: NodeId) -> Option<&Element> {
        self.tree.get(id).and_then(|node| node.value().as_element())
    }

    /// Lower-cased tag name of an element, `None` for other nodes.
    pub fn tag_name(&self, id: NodeId) -> Option<String> {
        self.element(id).map(|el| el.name.to_ascii_lowercase())
    }

    /// Structural generation; bumped by every operation that inserts,
    /// removes or replaces nodes.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub(crate) fn touch(&mut self) {
        self.generation += 1;
    }

    pub fn children(&self, id: NodeId) -> Vec<NodeId> {
        self.tree
            .get(id)
            .map(|node| node.children().map(|child| child.id()).collect())
            .unwrap_or_default()
    }

    /// All direct children of body, text nodes included.
    pub fn body_children(&self) -> Vec<NodeId> {
        self.children(self.body)
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.tree.get(id)?.parent().map(|parent| parent.id())
    }

    pub fn next_sibling(&self, id: NodeId) -> Option<NodeId> {
        self.tree.get(id)?.next_sibling().map(|sibling| sibling.id())
    }

    /// True while the node is still reachable from the root.
    pub fn is_attached(&self, id: NodeId) -> bool {
        let root = self.root_id();
        let mut current = Some(id);
        while let Some(node) = current {
            if node == root {
                return true;
            }
            current = self.parent(node);
        }
        false
    }

    /// Concatenated text of the node and all its descendants.
    pub fn text_content(&self, id: NodeId) -> String {
        let Some(node) = self.tree.get(id) else {
            return String::new();
        };
        node.descendants()
            .filter_map(|descendant| descendant.value().as_text())
            .collect()
    }

    /// Replaces an element by a new one named `name`, carrying over the
    /// attributes (in order) and children (in order). Returns the id of the
    /// replacement, or `None` when `id` is not an attached element.
    pub(crate) fn rename(&mut self, id: NodeId, name: &str) -> Option<NodeId> {
        let element = self.element(id)?;
        let replacement = Element {
            name: name.to_string(),
            attrs: element.attrs.clone(),
        };
        self.parent(id)?;

        let new_id = self
            .tree
            .get_mut(id)?
            .insert_before(Node::Element(replacement))
            .id();
        for child in self.children(id) {
            self.tree.get_mut(new_id)?.append_id(child);
        }
        self.tree.get_mut(id)?.detach();
        Some(new_id)
    }

    /// Replaces an element by its children.
    pub(crate) fn unwrap_element(&mut self, id: NodeId) -> bool {
        if self.element(id).is_none() || self.parent(id).is_none() {
            return false;
        }
        for child in self.children(id) {
            if let Some(mut node) = self.tree.get_mut(id) {
                node.insert_id_before(child);
            }
        }
        match self.tree.get_mut(id) {
            Some(mut node) => {
                node.detach();
                true
            }
            None => false,
        }
    }
}

impl Default for Document {
    fn default() -> Self {
        Self::empty()
    }
}
