// ABOUTME: Markup source seam: hosts supply markup, optionally rendered through a named formatter.
// ABOUTME: Holds the process-wide default formatter name behind a RwLock.

use std::sync::RwLock;

use once_cell::sync::Lazy;

/// Formatter used when neither the caller nor the host configured one.
pub const DEFAULT_FORMATTER: &str = "html";

static DEFAULT_FORMATTER_NAME: Lazy<RwLock<String>> =
    Lazy::new(|| RwLock::new(DEFAULT_FORMATTER.to_string()));

/// Something that can hand the engine a block of markup.
///
/// `render` runs the value through a named formatter (an inline-markup
/// renderer, a block renderer, ...). Returning `None` means the source does
/// not know that formatter, in which case the raw value is used.
pub trait MarkupSource {
    fn raw(&self) -> String;

    fn render(&self, formatter: &str) -> Option<String> {
        let _ = formatter;
        None
    }
}

impl MarkupSource for &str {
    fn raw(&self) -> String {
        self.to_string()
    }
}

impl MarkupSource for String {
    fn raw(&self) -> String {
        self.clone()
    }
}

/// Current process-wide default formatter name.
pub fn default_formatter() -> String {
    match DEFAULT_FORMATTER_NAME.read() {
        Ok(name) => name.clone(),
        Err(poisoned) => poisoned.into_inner().clone(),
    }
}

/// Changes the process-wide default formatter name.
pub fn set_default_formatter(name: impl Into<String>) {
    let name = name.into();
    match DEFAULT_FORMATTER_NAME.write() {
        Ok(mut current) => *current = name,
        Err(poisoned) => *poisoned.into_inner() = name,
    }
}

/// Markup for `source`, using `formatter` or the default formatter.
pub(crate) fn resolve(source: &dyn MarkupSource, formatter: Option<&str>) -> String {
    let name = formatter
        .map(str::to_string)
        .unwrap_or_else(default_formatter);
    match source.render(&name) {
        Some(markup) => markup,
        None => {
            tracing::debug!(formatter = %name, "formatter not supported by source, using raw value");
            source.raw()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Field {
        value: String,
    }

    impl MarkupSource for Field {
        fn raw(&self) -> String {
            self.value.clone()
        }

        fn render(&self, formatter: &str) -> Option<String> {
            match formatter {
                "shout" => Some(format!("<p>{}</p>", self.value.to_uppercase())),
                _ => None,
            }
        }
    }

    #[test]
    fn explicit_formatter_is_used() {
        let field = Field {
            value: "hi".into(),
        };
        assert_eq!(resolve(&field, Some("shout")), "<p>HI</p>");
    }

    #[test]
    fn unknown_formatter_falls_back_to_raw() {
        let field = Field {
            value: "<p>hi</p>".into(),
        };
        assert_eq!(resolve(&field, Some("markdown")), "<p>hi</p>");
    }

    #[test]
    fn strings_are_sources() {
        assert_eq!(resolve(&"<b>x</b>", None), "<b>x</b>");
        assert_eq!(resolve(&String::from("y"), Some("html")), "y");
    }
}
