// ABOUTME: Evaluates compiled path queries against a Document.
// ABOUTME: Implements axes, node tests, predicate positions and XPath 1.0 value comparisons.

use std::collections::HashMap;

use ego_tree::NodeId;

use super::{Axis, BinaryOp, Expr, LocationPath, NodeTest, Step};
use crate::dom::{Document, Node};

/// Query evaluator bound to one document snapshot.
///
/// Holds a document-order index so that every step result can be sorted and
/// de-duplicated, as XPath node-sets are.
pub struct Evaluator<'a> {
    doc: &'a Document,
    order: HashMap<NodeId, usize>,
}

#[derive(Debug, Clone, Copy)]
struct Context {
    node: NodeId,
    position: usize,
    size: usize,
}

#[derive(Debug, Clone)]
enum Value {
    Nodes(Vec<NodeId>),
    /// Attribute values selected with `@name` / `@*`.
    Attrs(Vec<String>),
    Str(String),
    Num(f64),
    Bool(bool),
}

impl Value {
    fn is_set(&self) -> bool {
        matches!(self, Value::Nodes(_) | Value::Attrs(_))
    }
}

impl<'a> Evaluator<'a> {
    pub fn new(doc: &'a Document) -> Self {
        let order = doc
            .tree()
            .root()
            .descendants()
            .enumerate()
            .map(|(index, node)| (node.id(), index))
            .collect();
        Self { doc, order }
    }

    pub(crate) fn select(&self, path: &LocationPath, context: NodeId) -> Vec<NodeId> {
        let mut current = if path.absolute {
            vec![self.doc.root_id()]
        } else {
            vec![context]
        };

        for step in &path.steps {
            let mut next = Vec::new();
            for &node in &current {
                next.extend(self.step(step, node));
            }
            current = self.in_document_order(next);
            if current.is_empty() {
                break;
            }
        }

        current
    }

    fn in_document_order(&self, mut nodes: Vec<NodeId>) -> Vec<NodeId> {
        nodes.sort_by_key(|id| self.order.get(id).copied().unwrap_or(usize::MAX));
        nodes.dedup();
        nodes
    }

    fn step(&self, step: &Step, node: NodeId) -> Vec<NodeId> {
        let mut nodes: Vec<NodeId> = self
            .axis(step.axis, node)
            .into_iter()
            .filter(|&id| self.node_test(&step.test, id))
            .collect();

        for predicate in &step.predicates {
            let size = nodes.len();
            nodes = nodes
                .iter()
                .enumerate()
                .filter(|&(index, &id)| {
                    let ctx = Context {
                        node: id,
                        position: index + 1,
                        size,
                    };
                    self.predicate(predicate, ctx)
                })
                .map(|(_, &id)| id)
                .collect();
        }

        nodes
    }

    fn axis(&self, axis: Axis, node: NodeId) -> Vec<NodeId> {
        let Some(node_ref) = self.doc.get(node) else {
            return Vec::new();
        };
        match axis {
            Axis::Child => node_ref.children().map(|n| n.id()).collect(),
            Axis::SelfAxis => vec![node],
            Axis::Descendant => node_ref.descendants().skip(1).map(|n| n.id()).collect(),
            Axis::DescendantOrSelf => node_ref.descendants().map(|n| n.id()).collect(),
            Axis::Parent => node_ref.parent().map(|n| n.id()).into_iter().collect(),
        }
    }

    fn node_test(&self, test: &NodeTest, id: NodeId) -> bool {
        let Some(node) = self.doc.get(id) else {
            return false;
        };
        match (test, node.value()) {
            (NodeTest::Node, _) => true,
            (NodeTest::AnyElement, Node::Element(_)) => true,
            (NodeTest::Name(name), Node::Element(el)) => el.is(name),
            (NodeTest::Text, Node::Text(_)) => true,
            (NodeTest::Comment, Node::Comment(_)) => true,
            _ => false,
        }
    }

    fn predicate(&self, expr: &Expr, ctx: Context) -> bool {
        match self.eval(expr, ctx) {
            Value::Num(n) => (ctx.position as f64) == n,
            other => self.boolean(&other),
        }
    }

    fn eval(&self, expr: &Expr, ctx: Context) -> Value {
        match expr {
            Expr::Number(n) => Value::Num(*n),
            Expr::Literal(s) => Value::Str(s.clone()),
            Expr::Path(path) => Value::Nodes(self.select(path, ctx.node)),
            Expr::Attribute(name) => {
                let values = self
                    .doc
                    .element(ctx.node)
                    .map(|el| {
                        el.attrs
                            .iter()
                            .filter(|(key, _)| {
                                name.as_deref()
                                    .map_or(true, |wanted| key.eq_ignore_ascii_case(wanted))
                            })
                            .map(|(_, value)| value.clone())
                            .collect()
                    })
                    .unwrap_or_default();
                Value::Attrs(values)
            }
            Expr::Negate(inner) => Value::Num(-self.number(&self.eval(inner, ctx))),
            Expr::Binary(lhs, op, rhs) => match op {
                BinaryOp::Or => Value::Bool(
                    self.boolean(&self.eval(lhs, ctx)) || self.boolean(&self.eval(rhs, ctx)),
                ),
                BinaryOp::And => Value::Bool(
                    self.boolean(&self.eval(lhs, ctx)) && self.boolean(&self.eval(rhs, ctx)),
                ),
                BinaryOp::Add => Value::Num(
                    self.number(&self.eval(lhs, ctx)) + self.number(&self.eval(rhs, ctx)),
                ),
                BinaryOp::Sub => Value::Num(
                    self.number(&self.eval(lhs, ctx)) - self.number(&self.eval(rhs, ctx)),
                ),
                _ => Value::Bool(self.compare(&self.eval(lhs, ctx), *op, &self.eval(rhs, ctx))),
            },
            Expr::Function(name, args) => self.function(name, args, ctx),
        }
    }

    fn function(&self, name: &str, args: &[Expr], ctx: Context) -> Value {
        let arg = |index: usize| args.get(index).map(|expr| self.eval(expr, ctx));
        let context_value = || Value::Nodes(vec![ctx.node]);

        match name {
            "position" => Value::Num(ctx.position as f64),
            "last" => Value::Num(ctx.size as f64),
            "true" => Value::Bool(true),
            "false" => Value::Bool(false),
            "count" => Value::Num(match arg(0) {
                Some(Value::Nodes(nodes)) => nodes.len() as f64,
                Some(Value::Attrs(values)) => values.len() as f64,
                _ => 0.0,
            }),
            "not" => Value::Bool(!arg(0).is_some_and(|v| self.boolean(&v))),
            "boolean" => Value::Bool(arg(0).is_some_and(|v| self.boolean(&v))),
            "number" => Value::Num(arg(0).map_or(f64::NAN, |v| self.number(&v))),
            "string" => Value::Str(self.string(&arg(0).unwrap_or_else(context_value))),
            "string-length" => Value::Num(
                self.string(&arg(0).unwrap_or_else(context_value))
                    .chars()
                    .count() as f64,
            ),
            "normalize-space" => Value::Str(
                self.string(&arg(0).unwrap_or_else(context_value))
                    .split_whitespace()
                    .collect::<Vec<_>>()
                    .join(" "),
            ),
            "contains" | "starts-with" => {
                let haystack = arg(0).map(|v| self.string(&v)).unwrap_or_default();
                let needle = arg(1).map(|v| self.string(&v)).unwrap_or_default();
                Value::Bool(if name == "contains" {
                    haystack.contains(&needle)
                } else {
                    haystack.starts_with(&needle)
                })
            }
            "name" | "local-name" => {
                let node = match arg(0) {
                    Some(Value::Nodes(nodes)) => nodes.first().copied(),
                    Some(_) => None,
                    None => Some(ctx.node),
                };
                Value::Str(
                    node.and_then(|id| self.doc.tag_name(id))
                        .unwrap_or_default(),
                )
            }
            _ => Value::Bool(false),
        }
    }

    fn compare(&self, lhs: &Value, op: BinaryOp, rhs: &Value) -> bool {
        match (lhs.is_set(), rhs.is_set()) {
            (true, true) => {
                let right = self.atoms(rhs);
                self.atoms(lhs).iter().any(|l| {
                    right
                        .iter()
                        .any(|r| self.compare_atomic(&Value::Str(l.clone()), op, &Value::Str(r.clone())))
                })
            }
            (true, false) => {
                if let Value::Bool(b) = rhs {
                    return self.compare_atomic(&Value::Bool(self.boolean(lhs)), op, &Value::Bool(*b));
                }
                self.atoms(lhs)
                    .into_iter()
                    .any(|l| self.compare_atomic(&Value::Str(l), op, rhs))
            }
            (false, true) => {
                if let Value::Bool(b) = lhs {
                    return self.compare_atomic(&Value::Bool(*b), op, &Value::Bool(self.boolean(rhs)));
                }
                self.atoms(rhs)
                    .into_iter()
                    .any(|r| self.compare_atomic(lhs, op, &Value::Str(r)))
            }
            (false, false) => self.compare_atomic(lhs, op, rhs),
        }
    }

    fn compare_atomic(&self, lhs: &Value, op: BinaryOp, rhs: &Value) -> bool {
        match op {
            BinaryOp::Eq | BinaryOp::NotEq => {
                let equal = if matches!(lhs, Value::Bool(_)) || matches!(rhs, Value::Bool(_)) {
                    self.boolean(lhs) == self.boolean(rhs)
                } else if matches!(lhs, Value::Num(_)) || matches!(rhs, Value::Num(_)) {
                    self.number(lhs) == self.number(rhs)
                } else {
                    self.string(lhs) == self.string(rhs)
                };
                if op == BinaryOp::Eq {
                    equal
                } else {
                    !equal
                }
            }
            BinaryOp::Lt => self.number(lhs) < self.number(rhs),
            BinaryOp::LtEq => self.number(lhs) <= self.number(rhs),
            BinaryOp::Gt => self.number(lhs) > self.number(rhs),
            BinaryOp::GtEq => self.number(lhs) >= self.number(rhs),
            _ => false,
        }
    }

    fn atoms(&self, value: &Value) -> Vec<String> {
        match value {
            Value::Nodes(nodes) => nodes.iter().map(|&id| self.string_value(id)).collect(),
            Value::Attrs(values) => values.clone(),
            other => vec![self.string(other)],
        }
    }

    fn string_value(&self, id: NodeId) -> String {
        match self.doc.get(id).map(|node| node.value()) {
            Some(Node::Comment(comment)) => comment.clone(),
            Some(_) => self.doc.text_content(id),
            None => String::new(),
        }
    }

    fn string(&self, value: &Value) -> String {
        match value {
            Value::Nodes(nodes) => nodes
                .first()
                .map(|&id| self.string_value(id))
                .unwrap_or_default(),
            Value::Attrs(values) => values.first().cloned().unwrap_or_default(),
            Value::Str(s) => s.clone(),
            Value::Num(n) => format_number(*n),
            Value::Bool(b) => b.to_string(),
        }
    }

    fn number(&self, value: &Value) -> f64 {
        match value {
            Value::Num(n) => *n,
            Value::Bool(b) => f64::from(u8::from(*b)),
            other => self.string(other).trim().parse().unwrap_or(f64::NAN),
        }
    }

    fn boolean(&self, value: &Value) -> bool {
        match value {
            Value::Nodes(nodes) => !nodes.is_empty(),
            Value::Attrs(values) => !values.is_empty(),
            Value::Str(s) => !s.is_empty(),
            Value::Num(n) => *n != 0.0 && !n.is_nan(),
            Value::Bool(b) => *b,
        }
    }
}

fn format_number(n: f64) -> String {
    if n.is_nan() {
        "NaN".to_string()
    } else if n.is_finite() && n.fract() == 0.0 {
        format!("{}", n as i64)
    } else {
        n.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::super::Query;
    use crate::dom::parse::parse;
    use crate::dom::Document;
    use pretty_assertions::assert_eq;

    const SAMPLE: &str = r#"<h1>Title</h1><p class="lead">One <em>cat</em></p><p>Two</p><div><p>Nested</p></div><p data-n="3">Three</p>"#;

    fn texts(doc: &Document, query: &str) -> Vec<String> {
        Query::parse(query)
            .unwrap()
            .evaluate_root(doc)
            .into_iter()
            .map(|id| doc.text_content(id))
            .collect()
    }

    fn doc() -> Document {
        parse(SAMPLE).document
    }

    #[test]
    fn child_steps_only_see_direct_children() {
        assert_eq!(texts(&doc(), "/body/p"), vec!["One cat", "Two", "Three"]);
    }

    #[test]
    fn descendant_steps_reach_nested_nodes_in_document_order() {
        assert_eq!(
            texts(&doc(), "/body//p"),
            vec!["One cat", "Two", "Nested", "Three"]
        );
    }

    #[test]
    fn positional_predicates_are_one_based() {
        let doc = doc();
        assert_eq!(texts(&doc, "/body/p[1]"), vec!["One cat"]);
        assert_eq!(texts(&doc, "/body/p[position() = last()]"), vec!["Three"]);
        assert_eq!(texts(&doc, "/body/*[position() <= 2]"), vec!["Title", "One cat"]);
        assert_eq!(texts(&doc, "/body/*[position() > 3]"), vec!["Nested", "Three"]);
        assert!(texts(&doc, "/body/p[9]").is_empty());
    }

    #[test]
    fn chained_predicates_renumber_positions() {
        assert_eq!(
            texts(&doc(), "/body/p[position() <= 2][position() > 1]"),
            vec!["Two"]
        );
    }

    #[test]
    fn attribute_predicates() {
        let doc = doc();
        assert_eq!(texts(&doc, "/body/p[@class='lead']"), vec!["One cat"]);
        assert_eq!(texts(&doc, "/body/p[@data-n > 2]"), vec!["Three"]);
        assert_eq!(texts(&doc, "/body/p[not(@class)]"), vec!["Two", "Three"]);
        assert_eq!(texts(&doc, "/body/*[@*]"), vec!["One cat", "Three"]);
    }

    #[test]
    fn text_functions() {
        let doc = doc();
        assert_eq!(texts(&doc, "/body/p[contains(., 'cat')]"), vec!["One cat"]);
        assert_eq!(texts(&doc, "/body/*[starts-with(name(), 'h')]"), vec!["Title"]);
        assert_eq!(texts(&doc, "/body/p[text() = 'Two']"), vec!["Two"]);
        assert_eq!(texts(&doc, "/body/*[count(p) = 1]"), vec!["Nested"]);
        assert_eq!(texts(&doc, "//em/text()"), vec!["cat"]);
    }

    #[test]
    fn self_and_parent_axes() {
        let doc = doc();
        assert_eq!(texts(&doc, "//em/.."), vec!["One cat"]);
        assert_eq!(texts(&doc, "/body/*[self::div or self::h1]"), vec!["Title", "Nested"]);
    }

    #[test]
    fn matches_tests_a_single_node() {
        let doc = doc();
        let query = super::super::self_step("p[@class]").unwrap();
        let children = doc.body_children();
        let matched: Vec<bool> = children.iter().map(|&id| query.matches(&doc, id)).collect();
        assert_eq!(matched, vec![false, true, false, false, false]);
    }

    #[test]
    fn names_match_case_insensitively() {
        assert_eq!(texts(&doc(), "/BODY/H1"), vec!["Title"]);
    }
}
