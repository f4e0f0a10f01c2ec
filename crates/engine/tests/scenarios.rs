// ABOUTME: Integration tests for end-to-end Tree usage through the public API.
// ABOUTME: Covers parse edge cases, selection chains, transforms and serialization round-trips.

use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use treekit_engine::{
    FallbackPolicy, FnFilter, MarkupSource, Output, Query, SnippetData, SnippetRegistry, Tree,
};

#[test]
fn last_paragraph_text() {
    let mut tree = Tree::new("<p>Hello world</p><p>Bye</p>");
    assert_eq!(tree.select("p").last().text(false), "Bye");
}

#[test]
fn heading_shift_by_two() {
    let mut tree = Tree::new("<h2>Title</h2>");
    assert_eq!(tree.level(2).html(false), "<h3>Title</h3>");
}

#[test]
fn wrap_consecutive_divs_in_one_section() {
    let mut tree = Tree::new("<div>a</div><div>b</div><div>c</div>");
    tree.wrap("section", "div", None, &[]);

    let doc = tree.to_document();
    let top = doc.body_children();
    assert_eq!(top.len(), 1);
    assert_eq!(doc.tag_name(top[0]).as_deref(), Some("section"));
    let texts: Vec<String> = doc
        .children(top[0])
        .into_iter()
        .map(|id| doc.text_content(id))
        .collect();
    assert_eq!(texts, ["a", "b", "c"]);
}

#[test]
fn wrap_text_produces_alternating_nodes() {
    let mut tree = Tree::new("<p>the cat sat</p>");
    tree.wrap_text("cat", "em", &[]);
    assert_eq!(tree.html(false), "<p>the <em>cat</em> sat</p>");
}

#[test]
fn empty_and_blank_input_give_empty_body() {
    for source in ["", "   \n\t "] {
        let tree = Tree::new(source);
        assert!(tree.to_document().body_children().is_empty());
        assert!(!tree.has_diagnostics());
        assert!(tree.is_empty());
        assert_eq!(tree.html(false), "");
        assert_eq!(tree.text(false), "");
    }
}

#[test]
fn round_trip_of_a_well_formed_paragraph() {
    let source = r#"<p class="lead" data-x="1">Hello <a href="/x?a=1&amp;b=2">link</a><br>done</p>"#;
    let tree = Tree::new(source);
    assert!(!tree.has_diagnostics());
    assert_eq!(tree.html(false), source);
}

#[test]
fn nth_beyond_range_makes_transforms_no_ops() {
    let source = "<p>a</p><p>b</p>";
    let mut tree = Tree::new(source);
    tree.select("p").nth(3);
    assert!(tree.is_empty());
    tree.set_name("div").set_attribute("id", "x");
    assert_eq!(tree.html(true), source);
}

#[test]
fn rename_preserves_attributes_and_subtree() {
    let mut tree = Tree::new(r#"<blockquote cite="x" class="q"><p>a</p><p>b</p></blockquote>"#);
    let doc = tree.to_document();
    let original = doc.body_children()[0];
    let children = doc.children(original);

    tree.select("blockquote").set_name("aside");

    let doc = tree.to_document();
    let renamed = doc.body_children()[0];
    assert_eq!(doc.children(renamed), children);
    let attrs = &doc.element(renamed).unwrap().attrs;
    assert_eq!(attrs[0], ("cite".to_string(), "x".to_string()));
    assert_eq!(attrs[1], ("class".to_string(), "q".to_string()));
    // the running query no longer matches; outputs fall back to the body
    assert_eq!(
        tree.html(false),
        r#"<aside cite="x" class="q"><p>a</p><p>b</p></aside>"#
    );
}

#[test]
fn levels_never_exceed_six() {
    let mut tree = Tree::new("<h1>1</h1><h2>2</h2><h3>3</h3><h4>4</h4><h5>5</h5><h6>6</h6>");
    tree.level(4);
    assert_eq!(
        tree.html(false),
        "<h4>1</h4><h5>2</h5><h6>3</h6><h6>4</h6><h6>5</h6><h6>6</h6>"
    );
}

#[test]
fn chained_selection_and_positional_helpers() {
    let source = "<ul><li>1</li><li>2</li><li>3</li><li>4</li></ul><ol><li>x</li></ol>";
    let mut tree = Tree::new(source);
    assert_eq!(tree.select("ul").select("li").offset(1).limit(2).text(false), "23");
    // positional predicates apply per parent, as in XPath
    assert_eq!(tree.clear().select("//li").last().text(false), "4x");
    assert_eq!(tree.clear().select("/ul/li[2]").text(false), "2");
    assert_eq!(
        tree.clear().select("ul").select("li[contains(., '3')]").html(false),
        "<li>3</li>"
    );
}

#[test]
fn content_and_convert() {
    let mut tree = Tree::new("<div><p>a</p></div><div><p>b</p></div>");
    assert_eq!(tree.convert(Output::Content), "<p>b</p>");
    tree.select("div").first();
    assert_eq!(tree.convert(Output::Content), "<p>a</p>");
    assert_eq!(tree.convert(Output::Html), "<div><p>a</p></div>");
    assert_eq!(tree.convert(Output::Text), "a");
}

#[test]
fn position_of_first_match_in_scope() {
    let mut tree = Tree::new("<h1>t</h1><p>a</p><figure></figure><p>b</p>");
    assert_eq!(tree.position("figure"), Some(3));
    assert_eq!(tree.select("p").position("p"), Some(1));
    assert_eq!(tree.position("figure"), None);
}

#[test]
fn full_documents_use_their_body() {
    let tree = Tree::new("<!DOCTYPE html><html><head><title>x</title></head><body><p>hi</p></body></html>");
    assert_eq!(tree.html(false), "<p>hi</p>");
}

#[test]
fn malformed_input_returns_the_source_by_default() {
    let source = "<p>open <b>bold</p></span>";
    let mut tree = Tree::new(source);
    assert!(tree.has_diagnostics());
    tree.select("p").set_name("div");
    assert_eq!(tree.html(false), source);

    let mut tree = Tree::builder()
        .fallback(FallbackPolicy::Serialize)
        .build(source);
    tree.select("p").set_name("div");
    assert!(tree.html(true).starts_with("<div>open <b>bold</b></div>"));
}

#[test]
fn query_validation_is_available_to_callers() {
    assert!(Query::parse("/body/p[position() = last()]").is_ok());
    let err = Query::parse("/body/p[").unwrap_err();
    assert_eq!(err.query, "/body/p[");
}

#[test]
fn filters_and_snippets_together() {
    let mut tree = Tree::new("<h2>One two</h2><p>three four five</p>");
    tree.filter(&FnFilter::new("bind", |text: &str| match text.rfind(' ') {
        Some(i) => format!("{}&nbsp;{}", &text[..i], &text[i + 1..]),
        None => text.to_string(),
    }));

    let mut registry = SnippetRegistry::new();
    registry.register_fn("blocks/p", |data: &SnippetData| {
        Ok(format!(
            "<p data-prev=\"{}\">{}</p>",
            data.prev.as_ref().map(|sibling| sibling.tag.as_str()).unwrap_or(""),
            data.content
        ))
    });
    let html = tree
        .snippets("blocks", &json!({}), &registry)
        .unwrap();
    assert_eq!(
        html,
        "<h2>One&nbsp;two</h2><p data-prev=\"h2\">three four&nbsp;five</p>"
    );
}

struct Field(&'static str);

impl MarkupSource for Field {
    fn raw(&self) -> String {
        self.0.to_string()
    }

    fn render(&self, formatter: &str) -> Option<String> {
        (formatter == "paragraphs").then(|| format!("<p>{}</p>", self.0))
    }
}

#[test]
fn trees_from_markup_sources() {
    let tree = Tree::from_source(&Field("hi"), Some("paragraphs"));
    assert_eq!(tree.html(false), "<p>hi</p>");

    let tree = Tree::from_source(&Field("<b>raw</b>"), Some("unknown"));
    assert_eq!(tree.html(false), "<b>raw</b>");

    let tree = Tree::builder()
        .whole_word(false)
        .build_from(&Field("x"), Some("paragraphs"));
    assert_eq!(tree.text(false), "x");
    assert_eq!(tree.snippets("", &Value::Null, &SnippetRegistry::new()).unwrap(), "<p>x</p>");
}
