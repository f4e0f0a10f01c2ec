// ABOUTME: Stock text filters for treekit: widow prevention and smart punctuation.
// ABOUTME: Both emit HTML entities, which the engine decodes before storing text back.

//! Ready-made [`TextFilter`]s.
//!
//! ```
//! use treekit_engine::Tree;
//! use treekit_filters::Widont;
//!
//! let mut tree = Tree::new("<p>no more widows</p>");
//! tree.widont(&Widont);
//! assert_eq!(tree.html(false), "<p>no more&nbsp;widows</p>");
//! ```

mod smart;
mod widont;

pub use crate::smart::{smartypants, SmartPunctuation};
pub use crate::widont::{widont, Widont};

pub use treekit_engine::TextFilter;
