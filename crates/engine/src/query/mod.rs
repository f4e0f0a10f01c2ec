// ABOUTME: Restricted XPath 1.0 dialect: tokenizer, AST and recursive-descent parser.
// ABOUTME: Compiled queries are evaluated against a Document by the eval module.

//! Path queries.
//!
//! Supported subset:
//! - location paths: `/a/b`, `//b`, `a/b`, `.`, `..`
//! - axes: `child::`, `self::`, `descendant::`, `descendant-or-self::`, `parent::`
//! - node tests: names (case-insensitive), `*`, `text()`, `node()`, `comment()`
//! - predicates with numbers, string literals, `@attr`, `@*`, comparisons,
//!   `and`/`or`, `+`/`-`, and the functions `position()`, `last()`,
//!   `count()`, `contains()`, `starts-with()`, `not()`, `string()`,
//!   `normalize-space()`, `string-length()`, `name()`, `true()`, `false()`

mod eval;

use std::fmt;

use ego_tree::NodeId;

use crate::dom::Document;
use crate::error::QueryError;

pub use eval::Evaluator;

/// A compiled location path.
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    source: String,
    path: LocationPath,
}

impl Query {
    /// Compiles a query string.
    pub fn parse(source: &str) -> Result<Self, QueryError> {
        let tokens = tokenize(source)?;
        let mut parser = Parser {
            source,
            tokens,
            pos: 0,
        };
        let path = parser.location_path()?;
        if let Some((offset, token)) = parser.peek_with_offset() {
            return Err(QueryError::new(
                source,
                offset,
                format!("unexpected {token}"),
            ));
        }
        Ok(Self {
            source: source.to_string(),
            path,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// Evaluates the query with `context` as the context node. Absolute
    /// queries ignore the context. Results are in document order.
    pub fn evaluate(&self, doc: &Document, context: NodeId) -> Vec<NodeId> {
        Evaluator::new(doc).select(&self.path, context)
    }

    /// Evaluates from the document root.
    pub fn evaluate_root(&self, doc: &Document) -> Vec<NodeId> {
        self.evaluate(doc, doc.root_id())
    }

    /// True if `node` is part of the result when `node` itself is the
    /// context. Used with `self::` queries to test a single node.
    pub fn matches(&self, doc: &Document, node: NodeId) -> bool {
        self.evaluate(doc, node).contains(&node)
    }
}

impl fmt::Display for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

/// Compiles `self::<step>`, the form used to test one node against a
/// single-step selector such as `div` or `h2[@class='x']`.
pub fn self_step(step: &str) -> Result<Query, QueryError> {
    Query::parse(&format!("self::{}", step.trim()))
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct LocationPath {
    pub absolute: bool,
    pub steps: Vec<Step>,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Step {
    pub axis: Axis,
    pub test: NodeTest,
    pub predicates: Vec<Expr>,
}

impl Step {
    fn descendant_or_self() -> Self {
        Self {
            axis: Axis::DescendantOrSelf,
            test: NodeTest::Node,
            predicates: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Axis {
    Child,
    SelfAxis,
    Descendant,
    DescendantOrSelf,
    Parent,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum NodeTest {
    Name(String),
    AnyElement,
    Text,
    Comment,
    Node,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum BinaryOp {
    Or,
    And,
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
    Add,
    Sub,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Expr {
    Number(f64),
    Literal(String),
    Path(LocationPath),
    /// `@name`, or `@*` when `None`.
    Attribute(Option<String>),
    Function(String, Vec<Expr>),
    Negate(Box<Expr>),
    Binary(Box<Expr>, BinaryOp, Box<Expr>),
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Slash,
    DoubleSlash,
    LBracket,
    RBracket,
    LParen,
    RParen,
    At,
    Comma,
    Dot,
    DotDot,
    Star,
    AxisSep,
    Name(String),
    Literal(String),
    Number(f64),
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
    Plus,
    Minus,
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Name(name) => write!(f, "name {name:?}"),
            Token::Literal(lit) => write!(f, "literal {lit:?}"),
            Token::Number(n) => write!(f, "number {n}"),
            other => {
                let s = match other {
                    Token::Slash => "/",
                    Token::DoubleSlash => "//",
                    Token::LBracket => "[",
                    Token::RBracket => "]",
                    Token::LParen => "(",
                    Token::RParen => ")",
                    Token::At => "@",
                    Token::Comma => ",",
                    Token::Dot => ".",
                    Token::DotDot => "..",
                    Token::Star => "*",
                    Token::AxisSep => "::",
                    Token::Eq => "=",
                    Token::NotEq => "!=",
                    Token::Lt => "<",
                    Token::LtEq => "<=",
                    Token::Gt => ">",
                    Token::GtEq => ">=",
                    Token::Plus => "+",
                    Token::Minus => "-",
                    _ => "?",
                };
                write!(f, "'{s}'")
            }
        }
    }
}

fn is_name_start(c: char) -> bool {
    c.is_alphabetic() || c == '_'
}

fn is_name_char(c: char) -> bool {
    c.is_alphanumeric() || matches!(c, '_' | '-' | '.' | ':')
}

fn tokenize(source: &str) -> Result<Vec<(usize, Token)>, QueryError> {
    let chars: Vec<(usize, char)> = source.char_indices().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let (offset, c) = chars[i];
        let next = chars.get(i + 1).map(|&(_, c)| c);

        let (token, width) = match c {
            c if c.is_whitespace() => {
                i += 1;
                continue;
            }
            '/' if next == Some('/') => (Token::DoubleSlash, 2),
            '/' => (Token::Slash, 1),
            '[' => (Token::LBracket, 1),
            ']' => (Token::RBracket, 1),
            '(' => (Token::LParen, 1),
            ')' => (Token::RParen, 1),
            '@' => (Token::At, 1),
            ',' => (Token::Comma, 1),
            '*' => (Token::Star, 1),
            '+' => (Token::Plus, 1),
            '-' => (Token::Minus, 1),
            '=' => (Token::Eq, 1),
            '!' if next == Some('=') => (Token::NotEq, 2),
            '<' if next == Some('=') => (Token::LtEq, 2),
            '<' => (Token::Lt, 1),
            '>' if next == Some('=') => (Token::GtEq, 2),
            '>' => (Token::Gt, 1),
            ':' if next == Some(':') => (Token::AxisSep, 2),
            '.' if next == Some('.') => (Token::DotDot, 2),
            '.' if !next.is_some_and(|n| n.is_ascii_digit()) => (Token::Dot, 1),
            '"' | '\'' => {
                let quote = c;
                let start = i + 1;
                let mut end = start;
                while end < chars.len() && chars[end].1 != quote {
                    end += 1;
                }
                if end >= chars.len() {
                    return Err(QueryError::new(source, offset, "unterminated string literal"));
                }
                let literal: String = chars[start..end].iter().map(|&(_, c)| c).collect();
                tokens.push((offset, Token::Literal(literal)));
                i = end + 1;
                continue;
            }
            c if c.is_ascii_digit() || c == '.' => {
                let mut end = i;
                while end < chars.len() && (chars[end].1.is_ascii_digit() || chars[end].1 == '.') {
                    end += 1;
                }
                let text: String = chars[i..end].iter().map(|&(_, c)| c).collect();
                let value = text
                    .parse::<f64>()
                    .map_err(|_| QueryError::new(source, offset, format!("bad number {text:?}")))?;
                tokens.push((offset, Token::Number(value)));
                i = end;
                continue;
            }
            c if is_name_start(c) => {
                let mut end = i + 1;
                while end < chars.len() && is_name_char(chars[end].1) {
                    // `::` is the axis separator, not part of the name
                    if chars[end].1 == ':' && chars.get(end + 1).map(|&(_, c)| c) == Some(':') {
                        break;
                    }
                    end += 1;
                }
                let name: String = chars[i..end].iter().map(|&(_, c)| c).collect();
                tokens.push((offset, Token::Name(name)));
                i = end;
                continue;
            }
            other => {
                return Err(QueryError::new(
                    source,
                    offset,
                    format!("unexpected character {other:?}"),
                ))
            }
        };

        tokens.push((offset, token));
        i += width;
    }

    Ok(tokens)
}

struct Parser<'a> {
    source: &'a str,
    tokens: Vec<(usize, Token)>,
    pos: usize,
}

impl Parser<'_> {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|(_, token)| token)
    }

    fn peek_at(&self, ahead: usize) -> Option<&Token> {
        self.tokens.get(self.pos + ahead).map(|(_, token)| token)
    }

    fn peek_with_offset(&self) -> Option<(usize, &Token)> {
        self.tokens.get(self.pos).map(|(offset, token)| (*offset, token))
    }

    fn offset(&self) -> usize {
        self.tokens
            .get(self.pos)
            .map(|(offset, _)| *offset)
            .unwrap_or(self.source.len())
    }

    fn advance(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).map(|(_, token)| token.clone());
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn eat(&mut self, expected: &Token) -> bool {
        if self.peek() == Some(expected) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, expected: Token) -> Result<(), QueryError> {
        if self.eat(&expected) {
            Ok(())
        } else {
            Err(self.error(format!("expected {expected}")))
        }
    }

    fn error(&self, message: impl Into<String>) -> QueryError {
        QueryError::new(self.source, self.offset(), message)
    }

    fn eat_keyword(&mut self, keyword: &str) -> bool {
        if matches!(self.peek(), Some(Token::Name(name)) if name == keyword) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn location_path(&mut self) -> Result<LocationPath, QueryError> {
        let mut steps = Vec::new();
        let absolute = match self.peek() {
            Some(Token::Slash) => {
                self.pos += 1;
                if !self.starts_step() {
                    return Ok(LocationPath {
                        absolute: true,
                        steps,
                    });
                }
                true
            }
            Some(Token::DoubleSlash) => {
                self.pos += 1;
                steps.push(Step::descendant_or_self());
                true
            }
            _ => false,
        };

        steps.push(self.step()?);
        loop {
            if self.eat(&Token::Slash) {
                steps.push(self.step()?);
            } else if self.eat(&Token::DoubleSlash) {
                steps.push(Step::descendant_or_self());
                steps.push(self.step()?);
            } else {
                break;
            }
        }

        Ok(LocationPath { absolute, steps })
    }

    fn starts_step(&self) -> bool {
        matches!(
            self.peek(),
            Some(Token::Name(_) | Token::Star | Token::Dot | Token::DotDot)
        )
    }

    /// One step. The abbreviations `.` and `..` stand for `self::node()`
    /// and `parent::node()` and accept predicates like any other step.
    fn step(&mut self) -> Result<Step, QueryError> {
        let (axis, test) = if self.eat(&Token::Dot) {
            (Axis::SelfAxis, NodeTest::Node)
        } else if self.eat(&Token::DotDot) {
            (Axis::Parent, NodeTest::Node)
        } else {
            self.axis_and_test()?
        };

        let mut predicates = Vec::new();
        while self.eat(&Token::LBracket) {
            predicates.push(self.expr()?);
            self.expect(Token::RBracket)?;
        }

        Ok(Step {
            axis,
            test,
            predicates,
        })
    }

    fn axis_and_test(&mut self) -> Result<(Axis, NodeTest), QueryError> {
        let mut axis = Axis::Child;
        if let (Some(Token::Name(name)), Some(Token::AxisSep)) = (self.peek(), self.peek_at(1)) {
            axis = match name.as_str() {
                "child" => Axis::Child,
                "self" => Axis::SelfAxis,
                "descendant" => Axis::Descendant,
                "descendant-or-self" => Axis::DescendantOrSelf,
                "parent" => Axis::Parent,
                other => return Err(self.error(format!("unsupported axis {other:?}"))),
            };
            self.pos += 2;
        }

        let test = match self.advance() {
            Some(Token::Star) => NodeTest::AnyElement,
            Some(Token::Name(name)) => {
                if self.peek() == Some(&Token::LParen) {
                    let test = match name.as_str() {
                        "text" => NodeTest::Text,
                        "node" => NodeTest::Node,
                        "comment" => NodeTest::Comment,
                        other => {
                            return Err(self.error(format!("{other}() is not a node test")))
                        }
                    };
                    self.pos += 1;
                    self.expect(Token::RParen)?;
                    test
                } else {
                    NodeTest::Name(name.to_ascii_lowercase())
                }
            }
            Some(Token::At) => {
                return Err(self.error("attribute steps are only supported inside predicates"))
            }
            Some(other) => return Err(self.error(format!("unexpected {other}"))),
            None => return Err(self.error("unexpected end of query")),
        };
        Ok((axis, test))
    }

    fn expr(&mut self) -> Result<Expr, QueryError> {
        self.or_expr()
    }

    fn or_expr(&mut self) -> Result<Expr, QueryError> {
        let mut lhs = self.and_expr()?;
        while self.eat_keyword("or") {
            let rhs = self.and_expr()?;
            lhs = Expr::Binary(Box::new(lhs), BinaryOp::Or, Box::new(rhs));
        }
        Ok(lhs)
    }

    fn and_expr(&mut self) -> Result<Expr, QueryError> {
        let mut lhs = self.equality_expr()?;
        while self.eat_keyword("and") {
            let rhs = self.equality_expr()?;
            lhs = Expr::Binary(Box::new(lhs), BinaryOp::And, Box::new(rhs));
        }
        Ok(lhs)
    }

    fn equality_expr(&mut self) -> Result<Expr, QueryError> {
        let mut lhs = self.relational_expr()?;
        loop {
            let op = match self.peek() {
                Some(Token::Eq) => BinaryOp::Eq,
                Some(Token::NotEq) => BinaryOp::NotEq,
                _ => return Ok(lhs),
            };
            self.pos += 1;
            let rhs = self.relational_expr()?;
            lhs = Expr::Binary(Box::new(lhs), op, Box::new(rhs));
        }
    }

    fn relational_expr(&mut self) -> Result<Expr, QueryError> {
        let mut lhs = self.additive_expr()?;
        loop {
            let op = match self.peek() {
                Some(Token::Lt) => BinaryOp::Lt,
                Some(Token::LtEq) => BinaryOp::LtEq,
                Some(Token::Gt) => BinaryOp::Gt,
                Some(Token::GtEq) => BinaryOp::GtEq,
                _ => return Ok(lhs),
            };
            self.pos += 1;
            let rhs = self.additive_expr()?;
            lhs = Expr::Binary(Box::new(lhs), op, Box::new(rhs));
        }
    }

    fn additive_expr(&mut self) -> Result<Expr, QueryError> {
        let mut lhs = self.unary_expr()?;
        loop {
            let op = match self.peek() {
                Some(Token::Plus) => BinaryOp::Add,
                Some(Token::Minus) => BinaryOp::Sub,
                _ => return Ok(lhs),
            };
            self.pos += 1;
            let rhs = self.unary_expr()?;
            lhs = Expr::Binary(Box::new(lhs), op, Box::new(rhs));
        }
    }

    fn unary_expr(&mut self) -> Result<Expr, QueryError> {
        if self.eat(&Token::Minus) {
            return Ok(Expr::Negate(Box::new(self.unary_expr()?)));
        }
        self.primary_expr()
    }

    fn primary_expr(&mut self) -> Result<Expr, QueryError> {
        match self.peek() {
            Some(Token::Number(n)) => {
                let n = *n;
                self.pos += 1;
                Ok(Expr::Number(n))
            }
            Some(Token::Literal(lit)) => {
                let lit = lit.clone();
                self.pos += 1;
                Ok(Expr::Literal(lit))
            }
            Some(Token::LParen) => {
                self.pos += 1;
                let inner = self.expr()?;
                self.expect(Token::RParen)?;
                Ok(inner)
            }
            Some(Token::At) => {
                self.pos += 1;
                match self.advance() {
                    Some(Token::Star) => Ok(Expr::Attribute(None)),
                    Some(Token::Name(name)) => Ok(Expr::Attribute(Some(name.to_ascii_lowercase()))),
                    _ => Err(self.error("expected attribute name after '@'")),
                }
            }
            Some(Token::Name(name))
                if self.peek_at(1) == Some(&Token::LParen)
                    && !matches!(name.as_str(), "text" | "node" | "comment") =>
            {
                let name = name.clone();
                self.pos += 2;
                let mut args = Vec::new();
                if !self.eat(&Token::RParen) {
                    loop {
                        args.push(self.expr()?);
                        if self.eat(&Token::Comma) {
                            continue;
                        }
                        self.expect(Token::RParen)?;
                        break;
                    }
                }
                check_function(&name, args.len()).map_err(|message| self.error(message))?;
                Ok(Expr::Function(name, args))
            }
            Some(_) => Ok(Expr::Path(self.location_path()?)),
            None => Err(self.error("unexpected end of query")),
        }
    }
}

fn check_function(name: &str, arity: usize) -> Result<(), String> {
    let (min, max) = match name {
        "position" | "last" | "true" | "false" => (0, 0),
        "name" | "local-name" | "string" | "normalize-space" | "string-length" => (0, 1),
        "count" | "not" | "boolean" | "number" => (1, 1),
        "contains" | "starts-with" => (2, 2),
        other => return Err(format!("unknown function {other}()")),
    };
    if arity < min || arity > max {
        return Err(format!("{name}() takes {min}..={max} arguments, got {arity}"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_absolute_child_path() {
        let query = Query::parse("/body/p").unwrap();
        assert!(query.path.absolute);
        assert_eq!(query.path.steps.len(), 2);
        assert_eq!(query.path.steps[1].test, NodeTest::Name("p".into()));
    }

    #[test]
    fn double_slash_expands_to_descendant_or_self() {
        let query = Query::parse("/body//em").unwrap();
        let axes: Vec<Axis> = query.path.steps.iter().map(|s| s.axis).collect();
        assert_eq!(axes, vec![Axis::Child, Axis::DescendantOrSelf, Axis::Child]);
    }

    #[test]
    fn parses_positional_predicates() {
        let query = Query::parse("/body/*[position() = last()]").unwrap();
        let step = &query.path.steps[1];
        assert_eq!(step.test, NodeTest::AnyElement);
        assert!(matches!(
            &step.predicates[0],
            Expr::Binary(_, BinaryOp::Eq, rhs) if matches!(**rhs, Expr::Function(ref f, _) if f == "last")
        ));
    }

    #[test]
    fn parses_axis_and_attribute_predicate() {
        let query = Query::parse("self::h2[@class='title' and contains(., \"x\")]").unwrap();
        let step = &query.path.steps[0];
        assert_eq!(step.axis, Axis::SelfAxis);
        assert_eq!(step.predicates.len(), 1);
    }

    #[test]
    fn hyphenated_names_stay_whole() {
        let query = Query::parse("my-widget[starts-with(@data-id, 'a')]").unwrap();
        assert_eq!(query.path.steps[0].test, NodeTest::Name("my-widget".into()));
    }

    #[test]
    fn rejects_malformed_queries() {
        for bad in ["", "p[", "p[1", "/body/@class", "p[foo()]", "p[\"x]", "p)", "ancestor::p"] {
            assert!(Query::parse(bad).is_err(), "{bad:?} should not parse");
        }
    }

    #[test]
    fn abbreviated_steps_take_predicates() {
        let query = Query::parse("/body//p/..[position() = last()]").unwrap();
        let step = query.path.steps.last().unwrap();
        assert_eq!(step.axis, Axis::Parent);
        assert_eq!(step.test, NodeTest::Node);
        assert_eq!(step.predicates.len(), 1);
        assert!(Query::parse("./p[1]/.[@class]").is_ok());
    }

    #[test]
    fn self_step_prefixes_axis() {
        let query = self_step("div").unwrap();
        assert_eq!(query.as_str(), "self::div");
    }
}
