// ABOUTME: Widow prevention: binds the last two words of a text with a non-breaking space.
// ABOUTME: Hyphenated last words get non-breaking hyphens instead.

use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use treekit_engine::TextFilter;

/// A lone character (usually punctuation) after the final space.
static TRAILING_FRAGMENT: Lazy<Regex> = Lazy::new(|| Regex::new(r"(\S)\s(\S?)$").unwrap());
static LAST_WORD: Lazy<Regex> = Lazy::new(|| Regex::new(r"(\s)(\S+)$").unwrap());

/// Widow prevention filter.
#[derive(Debug, Clone, Copy, Default)]
pub struct Widont;

impl TextFilter for Widont {
    fn apply(&self, text: &str) -> String {
        widont(text)
    }

    fn name(&self) -> &str {
        "widont"
    }
}

/// Binds the last word to the one before it.
pub fn widont(text: &str) -> String {
    let text = TRAILING_FRAGMENT.replace(text, "${1}&nbsp;${2}");
    LAST_WORD
        .replace(&text, |caps: &Captures| {
            let word = &caps[2];
            if word.contains('-') {
                format!("{}{}", &caps[1], word.replace('-', "&#8209;"))
            } else {
                format!("&nbsp;{word}")
            }
        })
        .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn binds_last_two_words() {
        assert_eq!(widont("one two three"), "one two&nbsp;three");
        assert_eq!(widont("a b"), "a&nbsp;b");
    }

    #[test]
    fn single_word_is_unchanged() {
        assert_eq!(widont("word"), "word");
        assert_eq!(widont(""), "");
    }

    #[test]
    fn trailing_punctuation_sticks_to_its_word() {
        assert_eq!(widont("are you there ?"), "are you&nbsp;there&nbsp;?");
    }

    #[test]
    fn hyphenated_last_word_uses_non_breaking_hyphens() {
        assert_eq!(widont("a well-known"), "a well&#8209;known");
    }
}
