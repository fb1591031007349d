#![forbid(unsafe_code)]

//! A small host expression language.
//!
//! # Grammar
//!
//! ```text
//! expression := primary ('=' expression)?
//! primary    := number | string | keyword | path | array | object
//! keyword    := true | false | null | undefined | NaN
//! path       := ident ('.' ident)*
//! array      := '[' (expression (',' expression)*)? ']'
//! object     := '{' (key ':' expression (',' key ':' expression)*)? '}'
//! ```
//!
//! An empty expression evaluates to `undefined`. Paths resolve their first
//! segment against the locals, then the scope. Assignment is only valid on a
//! path. Templates embed expressions as `{{expr}}`; `undefined` and `null`
//! render as the empty string.

use std::rc::Rc;

use scopebind::{BindingError, Expression, Interpolation, Locals, Parser, Result, Scope, Value};

// ---------------------------------------------------------------------------
// Tokens
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Number(f64),
    Text(String),
    Ident(String),
    Punct(char),
}

fn tokenize(source: &str) -> Result<Vec<Token>> {
    let chars: Vec<char> = source.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        if c.is_whitespace() {
            i += 1;
        } else if c.is_ascii_digit() || (c == '-' && chars.get(i + 1).is_some_and(char::is_ascii_digit)) {
            let start = i;
            i += 1;
            while i < chars.len() && (chars[i].is_ascii_digit() || chars[i] == '.') {
                i += 1;
            }
            let text: String = chars[start..i].iter().collect();
            let number = text
                .parse::<f64>()
                .map_err(|_| syntax_error(source, format!("bad number `{text}`")))?;
            tokens.push(Token::Number(number));
        } else if c == '\'' || c == '"' {
            let start = i + 1;
            let end = chars[start..]
                .iter()
                .position(|&q| q == c)
                .map(|offset| start + offset)
                .ok_or_else(|| syntax_error(source, "unterminated string".into()))?;
            tokens.push(Token::Text(chars[start..end].iter().collect()));
            i = end + 1;
        } else if c.is_alphabetic() || c == '_' || c == '$' {
            let start = i;
            while i < chars.len() && (chars[i].is_alphanumeric() || chars[i] == '_' || chars[i] == '$') {
                i += 1;
            }
            tokens.push(Token::Ident(chars[start..i].iter().collect()));
        } else if ".[]{},:=".contains(c) {
            tokens.push(Token::Punct(c));
            i += 1;
        } else {
            return Err(syntax_error(source, format!("unexpected character `{c}`")));
        }
    }
    Ok(tokens)
}

fn syntax_error(source: &str, message: String) -> BindingError {
    BindingError::Evaluation {
        expression: source.to_owned(),
        message,
    }
}

// ---------------------------------------------------------------------------
// Syntax tree
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
enum Node {
    Empty,
    Constant(Value),
    Array(Vec<Node>),
    Object(Vec<(String, Node)>),
    Path(Vec<String>),
    Assign(Vec<String>, Box<Node>),
}

struct NodeParser<'a> {
    source: &'a str,
    tokens: Vec<Token>,
    pos: usize,
}

impl NodeParser<'_> {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        self.pos += 1;
        token
    }

    fn eat(&mut self, punct: char) -> bool {
        if self.peek() == Some(&Token::Punct(punct)) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, punct: char) -> Result<()> {
        if self.eat(punct) {
            Ok(())
        } else {
            Err(self.error(format!("expected `{punct}`")))
        }
    }

    fn error(&self, message: String) -> BindingError {
        syntax_error(self.source, message)
    }

    fn parse(mut self) -> Result<Node> {
        if self.tokens.is_empty() {
            return Ok(Node::Empty);
        }
        let node = self.expression()?;
        if let Some(token) = self.peek() {
            return Err(self.error(format!("unexpected trailing token {token:?}")));
        }
        Ok(node)
    }

    fn expression(&mut self) -> Result<Node> {
        let left = self.primary()?;
        if !self.eat('=') {
            return Ok(left);
        }
        match left {
            Node::Path(path) => Ok(Node::Assign(path, Box::new(self.expression()?))),
            _ => Err(self.error("left side of `=` is not assignable".into())),
        }
    }

    fn primary(&mut self) -> Result<Node> {
        match self.next() {
            Some(Token::Number(n)) => Ok(Node::Constant(Value::Number(n))),
            Some(Token::Text(s)) => Ok(Node::Constant(Value::from(s))),
            Some(Token::Ident(ident)) => Ok(match ident.as_str() {
                "true" => Node::Constant(Value::Bool(true)),
                "false" => Node::Constant(Value::Bool(false)),
                "null" => Node::Constant(Value::Null),
                "undefined" => Node::Constant(Value::Undefined),
                "NaN" => Node::Constant(Value::Number(f64::NAN)),
                _ => self.path(ident)?,
            }),
            Some(Token::Punct('[')) => self.array(),
            Some(Token::Punct('{')) => self.object(),
            Some(token) => Err(self.error(format!("unexpected token {token:?}"))),
            None => Err(self.error("unexpected end of expression".into())),
        }
    }

    fn path(&mut self, first: String) -> Result<Node> {
        let mut segments = vec![first];
        while self.eat('.') {
            match self.next() {
                Some(Token::Ident(ident)) => segments.push(ident),
                _ => return Err(self.error("expected a name after `.`".into())),
            }
        }
        Ok(Node::Path(segments))
    }

    fn array(&mut self) -> Result<Node> {
        let mut items = Vec::new();
        if self.eat(']') {
            return Ok(Node::Array(items));
        }
        loop {
            items.push(self.expression()?);
            if self.eat(']') {
                return Ok(Node::Array(items));
            }
            self.expect(',')?;
        }
    }

    fn object(&mut self) -> Result<Node> {
        let mut entries = Vec::new();
        if self.eat('}') {
            return Ok(Node::Object(entries));
        }
        loop {
            let key = match self.next() {
                Some(Token::Ident(key) | Token::Text(key)) => key,
                _ => return Err(self.error("expected an object key".into())),
            };
            self.expect(':')?;
            entries.push((key, self.expression()?));
            if self.eat('}') {
                return Ok(Node::Object(entries));
            }
            self.expect(',')?;
        }
    }
}

// ---------------------------------------------------------------------------
// Evaluation
// ---------------------------------------------------------------------------

fn evaluate(node: &Node, scope: &dyn Scope, locals: Option<&Locals>) -> Result<Value> {
    Ok(match node {
        Node::Empty => Value::Undefined,
        Node::Constant(value) => value.clone(),
        Node::Array(items) => Value::list(
            items
                .iter()
                .map(|item| evaluate(item, scope, locals))
                .collect::<Result<Vec<_>>>()?,
        ),
        Node::Object(entries) => {
            let mut map = scopebind::ValueMap::new();
            for (key, item) in entries {
                map.insert(key.clone(), evaluate(item, scope, locals)?);
            }
            Value::map(map)
        }
        Node::Path(path) => resolve(path, scope, locals),
        Node::Assign(path, rhs) => {
            let value = evaluate(rhs, scope, locals)?;
            assign_path(path, scope, value.clone());
            value
        }
    })
}

fn resolve(path: &[String], scope: &dyn Scope, locals: Option<&Locals>) -> Value {
    let Some((first, rest)) = path.split_first() else {
        return Value::Undefined;
    };
    let base = locals
        .and_then(|locals| locals.get(first).cloned())
        .unwrap_or_else(|| scope.get(first));
    rest.iter().fold(base, |value, segment| {
        value.get(segment).cloned().unwrap_or(Value::Undefined)
    })
}

fn assign_path(path: &[String], scope: &dyn Scope, value: Value) {
    let Some((first, rest)) = path.split_first() else {
        return;
    };
    scope.set(first, with_nested(scope.get(first), rest, value));
}

/// Copy of `base` with `value` stored at `path`; missing levels become maps.
fn with_nested(base: Value, path: &[String], value: Value) -> Value {
    match path.split_first() {
        None => value,
        Some((key, rest)) => {
            let nested = base.get(key).cloned().unwrap_or(Value::Undefined);
            let child = with_nested(nested, rest, value);
            base.with_entry(key, child)
        }
    }
}

// ---------------------------------------------------------------------------
// Expression / Interpolation / Parser
// ---------------------------------------------------------------------------

/// A compiled expression.
#[derive(Debug, Clone)]
pub struct HarnessExpression {
    source: String,
    node: Node,
}

impl HarnessExpression {
    pub fn compile(source: &str) -> Result<Self> {
        let node = NodeParser {
            source,
            tokens: tokenize(source)?,
            pos: 0,
        }
        .parse()?;
        Ok(Self {
            source: source.to_owned(),
            node,
        })
    }
}

impl Expression for HarnessExpression {
    fn source(&self) -> &str {
        &self.source
    }

    fn is_literal(&self) -> bool {
        matches!(
            self.node,
            Node::Constant(_) | Node::Array(_) | Node::Object(_)
        )
    }

    fn is_assignable(&self) -> bool {
        matches!(self.node, Node::Path(_))
    }

    fn evaluate(&self, scope: &dyn Scope, locals: Option<&Locals>) -> Result<Value> {
        evaluate(&self.node, scope, locals)
    }

    fn assign(&self, scope: &dyn Scope, value: Value) -> Result<()> {
        match &self.node {
            Node::Path(path) => {
                assign_path(path, scope, value);
                Ok(())
            }
            _ => Err(syntax_error(&self.source, "expression is not assignable".into())),
        }
    }
}

#[derive(Debug, Clone)]
enum Part {
    Text(String),
    Expr(HarnessExpression),
}

/// A compiled `{{expr}}` template.
#[derive(Debug, Clone)]
pub struct HarnessTemplate {
    parts: Vec<Part>,
}

impl HarnessTemplate {
    pub fn compile(template: &str) -> Result<Self> {
        let mut parts = Vec::new();
        let mut rest = template;
        while let Some(open) = rest.find("{{") {
            if open > 0 {
                parts.push(Part::Text(rest[..open].to_owned()));
            }
            let after = &rest[open + 2..];
            let close = after.find("}}").ok_or_else(|| BindingError::Interpolation {
                template: template.to_owned(),
                message: "unclosed `{{`".into(),
            })?;
            let expression =
                HarnessExpression::compile(after[..close].trim()).map_err(|err| {
                    BindingError::Interpolation {
                        template: template.to_owned(),
                        message: err.to_string(),
                    }
                })?;
            parts.push(Part::Expr(expression));
            rest = &after[close + 2..];
        }
        if !rest.is_empty() {
            parts.push(Part::Text(rest.to_owned()));
        }
        Ok(Self { parts })
    }
}

impl Interpolation for HarnessTemplate {
    fn render(&self, scope: &dyn Scope) -> Result<String> {
        let mut out = String::new();
        for part in &self.parts {
            match part {
                Part::Text(text) => out.push_str(text),
                Part::Expr(expression) => match expression.evaluate(scope, None)? {
                    Value::Undefined | Value::Null => {}
                    value => out.push_str(&value.to_string()),
                },
            }
        }
        Ok(out)
    }
}

/// [`Parser`] for the harness expression language.
#[derive(Debug, Clone, Copy, Default)]
pub struct HarnessParser;

impl Parser for HarnessParser {
    fn parse(&self, text: &str) -> Result<Rc<dyn Expression>> {
        Ok(Rc::new(HarnessExpression::compile(text)?))
    }

    fn interpolate(&self, template: &str) -> Result<Rc<dyn Interpolation>> {
        Ok(Rc::new(HarnessTemplate::compile(template)?))
    }
}
