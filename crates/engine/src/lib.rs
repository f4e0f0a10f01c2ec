// ABOUTME: Main library entry point for the treekit markup engine.
// ABOUTME: Re-exports the public API: Tree, Cursor, Options, TreeBuilder, TreeError, filters and snippets.

//! Treekit - query and transform rendered HTML fragments.
//!
//! A [`Tree`] parses a block of markup, narrows it with path queries
//! (`select("p").last()`), mutates it in place (rename, wrap, heading levels,
//! text wrapping) and serializes the result as markup, inner markup, text or
//! per-node snippets.
//!
//! # Example
//!
//! ```
//! use treekit_engine::Tree;
//!
//! let mut tree = Tree::new("<h1>Title</h1><p>the cat sat</p>");
//! tree.level(2).wrap_text("cat", "em", &[]);
//! assert_eq!(tree.html(false), "<h2>Title</h2><p>the <em>cat</em> sat</p>");
//! ```

pub mod dom;
pub mod error;
pub mod filter;
pub mod options;
pub mod query;
pub mod snippets;
pub mod source;
mod transform;
pub mod tree;

pub use crate::dom::{Document, Element, Node};
pub use crate::error::{Diagnostic, QueryError, Result, TreeError};
pub use crate::filter::{FnFilter, TextFilter};
pub use crate::options::{FallbackPolicy, Options, Output, TreeBuilder};
pub use crate::query::Query;
pub use crate::snippets::{Renderer, RendererRegistry, Sibling, SnippetData, SnippetRegistry};
pub use crate::source::{default_formatter, set_default_formatter, MarkupSource};
pub use crate::tree::{Cursor, Selection, Tree};
