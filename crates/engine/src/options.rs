// ABOUTME: Configuration for the tree engine: FallbackPolicy, Output, Options and TreeBuilder.
// ABOUTME: TreeBuilder provides a fluent API for constructing Tree instances with custom settings.

use std::fmt;
use std::str::FromStr;

use crate::source::MarkupSource;
use crate::tree::Tree;

/// What serialization does when the parser reported diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FallbackPolicy {
    /// Return the original (trimmed) source unchanged. Any mutation made on
    /// the tree is not visible in the output.
    #[default]
    RawSource,
    /// Serialize the repaired tree regardless of diagnostics.
    Serialize,
}

/// Output representation used by [`Tree::convert`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Output {
    #[default]
    Html,
    Content,
    Text,
}

impl fmt::Display for Output {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Output::Html => "html",
            Output::Content => "content",
            Output::Text => "text",
        };
        write!(f, "{}", s)
    }
}

impl FromStr for Output {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "html" => Ok(Output::Html),
            "content" | "inner" => Ok(Output::Content),
            "text" | "txt" => Ok(Output::Text),
            other => Err(format!("unknown output '{other}'")),
        }
    }
}

/// Configuration options for a [`Tree`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Options {
    pub fallback: FallbackPolicy,
    /// Default for [`Tree::wrap_text`]: match the needle only on word
    /// boundaries.
    pub whole_word: bool,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            fallback: FallbackPolicy::RawSource,
            whole_word: true,
        }
    }
}

/// Builder for constructing Tree instances with custom configuration.
#[derive(Debug, Clone, Default)]
pub struct TreeBuilder {
    opts: Options,
}

impl TreeBuilder {
    /// Create a new TreeBuilder with default options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the policy applied when parsing produced diagnostics.
    pub fn fallback(mut self, fallback: FallbackPolicy) -> Self {
        self.opts.fallback = fallback;
        self
    }

    /// Set the default word-boundary mode for `wrap_text`.
    pub fn whole_word(mut self, whole_word: bool) -> Self {
        self.opts.whole_word = whole_word;
        self
    }

    /// Replace all options at once.
    pub fn options(mut self, opts: Options) -> Self {
        self.opts = opts;
        self
    }

    /// Parse `source` into a Tree with the configured options.
    pub fn build(self, source: impl Into<String>) -> Tree {
        Tree::with_options(source, self.opts)
    }

    /// Pull markup from a [`MarkupSource`], rendered with `formatter` or the
    /// process-wide default formatter.
    pub fn build_from(self, source: &dyn MarkupSource, formatter: Option<&str>) -> Tree {
        Tree::with_options(crate::source::resolve(source, formatter), self.opts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn output_parses_from_str() {
        assert_eq!("TEXT".parse::<Output>(), Ok(Output::Text));
        assert_eq!("content".parse::<Output>(), Ok(Output::Content));
        assert!("whatever".parse::<Output>().is_err());
        assert_eq!(Output::Content.to_string(), "content");
    }

    #[test]
    fn builder_sets_options() {
        let tree = TreeBuilder::new()
            .fallback(FallbackPolicy::Serialize)
            .whole_word(false)
            .build("<p>x</p>");
        assert_eq!(tree.options().fallback, FallbackPolicy::Serialize);
        assert!(!tree.options().whole_word);
    }

    #[test]
    fn default_options() {
        let opts = Options::default();
        assert_eq!(opts.fallback, FallbackPolicy::RawSource);
        assert!(opts.whole_word);
    }
}
