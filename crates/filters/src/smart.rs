// ABOUTME: Smart punctuation: curly quotes, en and em dashes, ellipsis.
// ABOUTME: Output uses numeric entities.

use treekit_engine::TextFilter;

/// Typographic punctuation filter.
#[derive(Debug, Clone, Copy, Default)]
pub struct SmartPunctuation;

impl TextFilter for SmartPunctuation {
    fn apply(&self, text: &str) -> String {
        smartypants(text)
    }

    fn name(&self) -> &str {
        "smartypants"
    }
}

pub fn smartypants(text: &str) -> String {
    let text = text
        .replace("---", "&#8212;")
        .replace("--", "&#8211;")
        .replace("...", "&#8230;");

    let mut out = String::with_capacity(text.len());
    let mut prev = None;
    for c in text.chars() {
        match c {
            '"' if opens_quote(prev) => out.push_str("&#8220;"),
            '"' => out.push_str("&#8221;"),
            '\'' if opens_quote(prev) => out.push_str("&#8216;"),
            '\'' => out.push_str("&#8217;"),
            _ => out.push(c),
        }
        prev = Some(c);
    }
    out
}

/// A quote opens at the start of the text or after whitespace or an
/// opening bracket.
fn opens_quote(prev: Option<char>) -> bool {
    match prev {
        None => true,
        Some(c) => c.is_whitespace() || matches!(c, '(' | '[' | '{' | ';'),
    }
}
