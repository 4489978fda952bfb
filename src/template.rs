//! Small Django-flavoured template engine for the server-rendered pages
//! (public verification page, certificate overlay previews).
//!
//! Source is split into tokens, parsed into a tree of [`Node`]s, child
//! `{% block %}`s are spliced into the `{% extends %}` parent, and the tree
//! is rendered against a context of [`TemplateValue`]s.
//!
//! Supported syntax: `{{ a.b }}` (HTML-escaped, `{{ a|safe }}` for raw),
//! `{% if [not] a %}..{% else %}..{% endif %}`, `{% for x in xs %}`,
//! `{% extends "base.html" %}`, `{% block name %}` and `{% tailwind %}`.
//!
//! Runtime logging is controlled via `set_display_logs`.

use log::debug;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::error::AppError;
use crate::router::Response;

pub type Context = HashMap<String, TemplateValue>;

/// Global switch for enabling/disabling internal template logs
static DISPLAY_LOGS: Lazy<AtomicBool> = Lazy::new(|| AtomicBool::new(false));

static TOKEN_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)\{\{(.*?)\}\}|\{%(.*?)%\}").unwrap());

const TAILWIND_CDN: &str = r#"<script src="https://cdn.tailwindcss.com"></script>"#;

/// Enable or disable internal debug logs for the template engine
pub fn set_display_logs(enabled: bool) {
    DISPLAY_LOGS.store(enabled, Ordering::Relaxed);
}

macro_rules! tdebug {
    ($($arg:tt)+) => {
        if DISPLAY_LOGS.load(Ordering::Relaxed) {
            debug!($($arg)+);
        }
    }
}

/// Values a template can read.
#[derive(Clone, Debug, PartialEq)]
pub enum TemplateValue {
    String(String),
    Bool(bool),
    Number(f64),
    List(Vec<TemplateValue>),
    Object(HashMap<String, TemplateValue>),
}

impl TemplateValue {
    /// Text form used by `{{ }}`. Containers render as nothing.
    pub fn as_string(&self) -> String {
        match self {
            TemplateValue::String(s) => s.clone(),
            TemplateValue::Bool(b) => b.to_string(),
            TemplateValue::Number(n) => n.to_string(),
            TemplateValue::List(_) | TemplateValue::Object(_) => String::new(),
        }
    }

    /// `if` semantics: false, zero and anything empty are falsy.
    pub fn is_truthy(&self) -> bool {
        match self {
            TemplateValue::String(s) => !s.is_empty(),
            TemplateValue::Bool(b) => *b,
            TemplateValue::Number(n) => *n != 0.0,
            TemplateValue::List(l) => !l.is_empty(),
            TemplateValue::Object(o) => !o.is_empty(),
        }
    }

    pub fn object<K: Into<String>, V: Into<TemplateValue>>(
        pairs: impl IntoIterator<Item = (K, V)>,
    ) -> Self {
        TemplateValue::Object(
            pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }

    fn field(&self, key: &str) -> Option<&TemplateValue> {
        match self {
            TemplateValue::Object(map) => map.get(key),
            _ => None,
        }
    }
}

impl fmt::Display for TemplateValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.as_string())
    }
}

impl From<String> for TemplateValue {
    fn from(s: String) -> Self {
        TemplateValue::String(s)
    }
}

impl From<&str> for TemplateValue {
    fn from(s: &str) -> Self {
        TemplateValue::String(s.to_string())
    }
}

impl From<bool> for TemplateValue {
    fn from(b: bool) -> Self {
        TemplateValue::Bool(b)
    }
}

impl From<f64> for TemplateValue {
    fn from(n: f64) -> Self {
        TemplateValue::Number(n)
    }
}

impl From<i64> for TemplateValue {
    fn from(n: i64) -> Self {
        TemplateValue::Number(n as f64)
    }
}

impl<T: Into<TemplateValue>> From<Option<T>> for TemplateValue {
    fn from(v: Option<T>) -> Self {
        v.map_or_else(|| TemplateValue::String(String::new()), Into::into)
    }
}

impl<T: Into<TemplateValue>> From<Vec<T>> for TemplateValue {
    fn from(v: Vec<T>) -> Self {
        TemplateValue::List(v.into_iter().map(Into::into).collect())
    }
}

/// Lexical pieces of a template source. Delimiters are stripped and the
/// inner text trimmed.
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    Text(String),
    Variable(String),
    Tag(String),
}

/// A dotted lookup such as `student.userId`, optionally marked `|safe`.
#[derive(Debug, Clone, PartialEq)]
pub struct Expr {
    pub path: Vec<String>,
    pub safe: bool,
}

impl Expr {
    pub fn parse(source: &str) -> Self {
        let (path, filter) = match source.split_once('|') {
            Some((path, filter)) => (path, Some(filter.trim())),
            None => (source, None),
        };
        if let Some(other) = filter.filter(|f| *f != "safe") {
            tdebug!("ignoring unknown filter '{}'", other);
        }
        Expr {
            path: path.trim().split('.').map(str::to_string).collect(),
            safe: filter == Some("safe"),
        }
    }

    pub fn dotted(&self) -> String {
        self.path.join(".")
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Text(String),
    Output(Expr),
    If {
        negate: bool,
        test: Expr,
        then_body: Vec<Node>,
        else_body: Vec<Node>,
    },
    For {
        binding: String,
        source: Expr,
        body: Vec<Node>,
    },
    Block {
        name: String,
        body: Vec<Node>,
    },
    Extends(String),
    Tailwind,
}

pub fn tokenize_template(content: &str) -> Vec<Token> {
    let mut tokens = Vec::new();
    let mut cursor = 0;
    for caps in TOKEN_RE.captures_iter(content) {
        let Some(whole) = caps.get(0) else { continue };
        if whole.start() > cursor {
            tokens.push(Token::Text(content[cursor..whole.start()].to_string()));
        }
        match (caps.get(1), caps.get(2)) {
            (Some(var), _) => tokens.push(Token::Variable(var.as_str().trim().to_string())),
            (_, Some(tag)) => tokens.push(Token::Tag(tag.as_str().trim().to_string())),
            _ => {}
        }
        cursor = whole.end();
    }
    if cursor < content.len() {
        tokens.push(Token::Text(content[cursor..].to_string()));
    }
    tdebug!("tokenized {} tokens", tokens.len());
    tokens
}

pub fn parse_tokens(tokens: &[Token]) -> Vec<Node> {
    Parser { tokens, pos: 0 }.parse_until(&[]).0
}

struct Parser<'t> {
    tokens: &'t [Token],
    pos: usize,
}

impl<'t> Parser<'t> {
    fn next(&mut self) -> Option<&'t Token> {
        let token = self.tokens.get(self.pos);
        self.pos += 1;
        token
    }

    /// Parse nodes until one of `stops` is reached. Returns the nodes and
    /// the stop tag that ended the run (consumed), or `None` at end of input.
    fn parse_until(&mut self, stops: &[&str]) -> (Vec<Node>, Option<&'t str>) {
        let mut nodes = Vec::new();
        while let Some(token) = self.next() {
            let tag = match token {
                Token::Text(text) => {
                    nodes.push(Node::Text(text.clone()));
                    continue;
                }
                Token::Variable(expr) => {
                    nodes.push(Node::Output(Expr::parse(expr)));
                    continue;
                }
                Token::Tag(tag) => tag.as_str(),
            };
            if stops.contains(&tag) {
                return (nodes, Some(tag));
            }
            if let Some(node) = self.parse_tag(tag) {
                nodes.push(node);
            }
        }
        (nodes, None)
    }

    fn parse_tag(&mut self, tag: &'t str) -> Option<Node> {
        let (keyword, rest) = tag.split_once(char::is_whitespace).unwrap_or((tag, ""));
        let rest = rest.trim();
        match keyword {
            "extends" => Some(Node::Extends(rest.trim_matches('"').to_string())),
            "block" => {
                let (body, _) = self.parse_until(&["endblock"]);
                Some(Node::Block {
                    name: rest.to_string(),
                    body,
                })
            }
            "if" => {
                let (negate, test) = match rest.strip_prefix("not ") {
                    Some(inner) => (true, inner),
                    None => (false, rest),
                };
                let (then_body, stop) = self.parse_until(&["else", "endif"]);
                let else_body = if stop == Some("else") {
                    self.parse_until(&["endif"]).0
                } else {
                    Vec::new()
                };
                Some(Node::If {
                    negate,
                    test: Expr::parse(test),
                    then_body,
                    else_body,
                })
            }
            "for" => match rest.split_whitespace().collect::<Vec<_>>().as_slice() {
                &[binding, "in", source] => {
                    let (body, _) = self.parse_until(&["endfor"]);
                    Some(Node::For {
                        binding: binding.to_string(),
                        source: Expr::parse(source),
                        body,
                    })
                }
                _ => {
                    tdebug!("parse: malformed for tag '{}'", tag);
                    None
                }
            },
            "tailwind" => Some(Node::Tailwind),
            _ => {
                tdebug!("parse: skipping unknown tag '{}'", tag);
                None
            }
        }
    }
}

/// Escape text for safe inclusion in HTML/SVG markup.
pub fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// Replace the body of every block that the child overrides, wherever it sits
/// in the parent tree.
fn fill_blocks(nodes: &mut [Node], overrides: &HashMap<String, Vec<Node>>) {
    for node in nodes {
        match node {
            Node::Block { name, body } => match overrides.get(name.as_str()) {
                Some(child) => *body = child.clone(),
                None => fill_blocks(body, overrides),
            },
            Node::If {
                then_body,
                else_body,
                ..
            } => {
                fill_blocks(then_body, overrides);
                fill_blocks(else_body, overrides);
            }
            Node::For { body, .. } => fill_blocks(body, overrides),
            _ => {}
        }
    }
}

/// Variable lookup: loop bindings shadow the root context, innermost first.
struct Scope<'a> {
    root: &'a Context,
    locals: Vec<(&'a str, &'a TemplateValue)>,
}

impl<'a> Scope<'a> {
    fn lookup(&self, expr: &Expr) -> Option<&'a TemplateValue> {
        let (head, tail) = expr.path.split_first()?;
        let mut value = self
            .locals
            .iter()
            .rev()
            .find(|(name, _)| *name == head.as_str())
            .map(|(_, v)| *v)
            .or_else(|| self.root.get(head.as_str()))?;
        for key in tail {
            value = value.field(key)?;
        }
        Some(value)
    }

    fn render(&mut self, nodes: &'a [Node], out: &mut String) {
        for node in nodes {
            match node {
                Node::Text(text) => out.push_str(text),
                Node::Output(expr) => match self.lookup(expr) {
                    Some(value) if expr.safe => out.push_str(&value.as_string()),
                    Some(value) => out.push_str(&escape_html(&value.as_string())),
                    None => tdebug!("render: '{}' is undefined", expr.dotted()),
                },
                Node::If {
                    negate,
                    test,
                    then_body,
                    else_body,
                } => {
                    let truthy = self.lookup(test).is_some_and(TemplateValue::is_truthy);
                    let branch = if truthy != *negate { then_body } else { else_body };
                    self.render(branch, out);
                }
                Node::For {
                    binding,
                    source,
                    body,
                } => {
                    if let Some(TemplateValue::List(items)) = self.lookup(source) {
                        for item in items {
                            self.locals.push((binding.as_str(), item));
                            self.render(body, out);
                            self.locals.pop();
                        }
                    }
                }
                Node::Block { body, .. } => self.render(body, out),
                Node::Extends(_) => {}
                Node::Tailwind => out.push_str(TAILWIND_CDN),
            }
        }
    }
}

pub fn render_nodes(nodes: &[Node], context: &Context) -> String {
    let mut out = String::new();
    Scope {
        root: context,
        locals: Vec::new(),
    }
    .render(nodes, &mut out);
    out
}

/// Render template source that may extend a base loaded from `dir`.
pub fn render_source(dir: &str, source: &str, context: &Context) -> Result<String, AppError> {
    let child = parse_tokens(&tokenize_template(source));

    let mut parent = None;
    let mut overrides = HashMap::new();
    for node in &child {
        match node {
            Node::Extends(base) => parent = Some(base.clone()),
            Node::Block { name, body } => {
                overrides.insert(name.clone(), body.clone());
            }
            _ => {}
        }
    }

    let mut tree = match parent {
        Some(base) => {
            tdebug!("extending '{}' with {} block(s)", base, overrides.len());
            parse_tokens(&tokenize_template(&load(dir, &base)?))
        }
        None => child,
    };
    fill_blocks(&mut tree, &overrides);
    Ok(render_nodes(&tree, context))
}

fn load(dir: &str, name: &str) -> Result<String, AppError> {
    let path = Path::new(dir).join(name);
    std::fs::read_to_string(&path)
        .map_err(|e| AppError::Template(format!("Template '{}' not found: {}", name, e)))
}

/// Load `template_name` from `dir` and render it.
pub fn render_template(
    dir: &str,
    template_name: &str,
    context: &Context,
) -> Result<String, AppError> {
    let source = load(dir, template_name)?;
    render_source(dir, &source, context)
}

/// Render a template into an HTML response with the given status.
pub fn render_page(
    dir: &str,
    template_name: &str,
    context: &Context,
    status_code: u16,
) -> Result<Response, AppError> {
    let html = render_template(dir, template_name, context)?;
    Ok(Response::html(html, status_code))
}
