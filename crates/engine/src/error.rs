// ABOUTME: Error types for the tree engine: TreeError, QueryError and parser Diagnostics.
// ABOUTME: Only query compilation and renderer execution can fail; everything else degrades to a no-op.

use std::fmt;

/// A well-formedness issue reported while parsing markup.
///
/// Diagnostics never abort parsing. They are kept on the [`crate::Tree`] so
/// callers (and the fallback policy) can decide what to do with them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub message: String,
}

impl Diagnostic {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

/// A path query that could not be compiled.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid query {query:?} at offset {offset}: {message}")]
pub struct QueryError {
    pub query: String,
    pub offset: usize,
    pub message: String,
}

impl QueryError {
    pub(crate) fn new(query: &str, offset: usize, message: impl Into<String>) -> Self {
        Self {
            query: query.to_string(),
            offset,
            message: message.into(),
        }
    }
}

/// The main error type for tree operations.
#[derive(Debug, thiserror::Error)]
pub enum TreeError {
    /// A query string failed to compile.
    #[error(transparent)]
    Query(#[from] QueryError),

    /// A snippet renderer was found but failed while rendering.
    #[error("renderer {name} failed: {source}")]
    Render {
        name: String,
        #[source]
        source: anyhow::Error,
    },
}

impl TreeError {
    /// Create a Render error for the renderer registered under `name`.
    pub fn render(name: impl Into<String>, source: anyhow::Error) -> Self {
        TreeError::Render {
            name: name.into(),
            source,
        }
    }

    /// Returns true if this is a Query error.
    pub fn is_query(&self) -> bool {
        matches!(self, TreeError::Query(_))
    }

    /// Returns true if this is a Render error.
    pub fn is_render(&self) -> bool {
        matches!(self, TreeError::Render { .. })
    }
}

pub type Result<T> = std::result::Result<T, TreeError>;
