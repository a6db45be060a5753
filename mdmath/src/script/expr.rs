//! Snippet expression lexer, AST, parser, and evaluator.
//!
//! The expression language is a small Python subset: numbers, strings
//! (with `r`/`f` prefixes), `True`/`False`/`None`, names, attribute access,
//! calls with positional and keyword arguments, and the usual operators.
//!
//! Operator precedence (lowest → highest):
//!   or  →  and  →  not  →  comparison  →  additive  →  multiplicative  →
//!   unary sign  →  power  →  postfix (call, attribute)  →  primary

use super::builtins;
use super::value::{EvalError, Value};
use crate::symbolic::Symbolic;

// ── EvalContext ───────────────────────────────────────────────────────────────

/// Dependency-injection interface used by the expression evaluator.
///
/// The snippet [`Interpreter`](super::interp::Interpreter) implements this
/// to expose its working scope and the engine's symbolic backend.
pub trait EvalContext {
    /// Look up a name in the working scope (builtins are resolved by the
    /// evaluator after this returns `None`).
    fn get_var(&self, name: &str) -> Option<Value>;

    /// Reassign a name whose value a call replaced (`e.bind(…)`, `e(x=1)`).
    fn rebind(&mut self, name: &str, value: Value);

    /// Backend for `Expr` evaluation and solving.
    fn symbolic(&self) -> &dyn Symbolic;

    /// Fractional digits used when formatting numbers.
    fn precision(&self) -> usize;
}

// ── Token ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    // Literals
    Int(i64),
    Float(f64),
    Str(String),
    /// Body of an f-string, escapes not yet processed.
    FStr { body: String, raw: bool },
    Ident(String),

    // Keywords
    True,
    False,
    None,
    And,
    Or,
    Not,

    // Operators
    Plus,
    Minus,
    Star,
    DoubleStar,
    Slash,
    DoubleSlash,
    Percent,

    // Comparison
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,

    // Misc
    Assign,
    Comma,
    Dot,
    LParen,
    RParen,
    Unknown(char),
    /// Lexing failed (unterminated string and the like).
    Error(String),
    Eof,
}

// ── Lexer ─────────────────────────────────────────────────────────────────────

struct Lexer {
    src: Vec<char>,
    pos: usize,
}

impl Lexer {
    fn new(src: &str) -> Self {
        Lexer { src: src.chars().collect(), pos: 0 }
    }

    fn peek(&self) -> Option<char> {
        self.src.get(self.pos).copied()
    }

    fn peek2(&self) -> Option<char> {
        self.src.get(self.pos + 1).copied()
    }

    fn advance(&mut self) -> Option<char> {
        let c = self.peek();
        if c.is_some() {
            self.pos += 1;
        }
        c
    }

    fn eat(&mut self, c: char) -> bool {
        if self.peek() == Some(c) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn skip_ws(&mut self) {
        while matches!(self.peek(), Some(c) if c.is_whitespace()) {
            self.pos += 1;
        }
    }

    fn digits(&mut self, s: &mut String) {
        while let Some(c) = self.peek() {
            if c.is_ascii_digit() {
                s.push(c);
            } else if c != '_' {
                break;
            }
            self.pos += 1;
        }
    }

    fn read_number(&mut self, first: char) -> Token {
        let mut s = String::from(first);
        let mut is_float = first == '.';
        self.digits(&mut s);
        if !is_float && self.peek() == Some('.') && matches!(self.peek2(), Some(c) if c.is_ascii_digit())
        {
            is_float = true;
            self.pos += 1;
            s.push('.');
            self.digits(&mut s);
        }
        if matches!(self.peek(), Some('e' | 'E'))
            && matches!(self.peek2(), Some(c) if c.is_ascii_digit() || c == '+' || c == '-')
        {
            is_float = true;
            s.push('e');
            self.pos += 1;
            if let Some(sign @ ('+' | '-')) = self.peek() {
                s.push(sign);
                self.pos += 1;
            }
            self.digits(&mut s);
        }

        if !is_float {
            if let Ok(n) = s.parse() {
                return Token::Int(n);
            }
        }
        match s.parse() {
            Ok(x) => Token::Float(x),
            Err(_) => Token::Error(format!("invalid number literal '{s}'")),
        }
    }

    /// Read a quoted body.  A backslash always keeps the next character in
    /// the body, so `\'` never ends the string, even in raw strings.
    fn read_string(&mut self, quote: char, raw: bool, formatted: bool) -> Token {
        let mut body = String::new();
        loop {
            match self.advance() {
                None => return Token::Error("unterminated string literal".into()),
                Some('\\') => {
                    body.push('\\');
                    match self.advance() {
                        Some(c) => body.push(c),
                        None => return Token::Error("unterminated string literal".into()),
                    }
                }
                Some(c) if c == quote => break,
                Some(c) => body.push(c),
            }
        }
        if formatted {
            Token::FStr { body, raw }
        } else if raw {
            Token::Str(body)
        } else {
            Token::Str(unescape(&body))
        }
    }

    fn read_word(&mut self, first: char) -> Token {
        let mut s = String::from(first);
        while let Some(c) = self.peek().filter(|c| c.is_alphanumeric() || *c == '_') {
            s.push(c);
            self.pos += 1;
        }
        if let Some(quote @ ('\'' | '"')) = self.peek() {
            let prefix = s.to_ascii_lowercase();
            if matches!(prefix.as_str(), "r" | "f" | "rf" | "fr") {
                self.pos += 1;
                return self.read_string(quote, prefix.contains('r'), prefix.contains('f'));
            }
        }
        match s.as_str() {
            "True" => Token::True,
            "False" => Token::False,
            "None" => Token::None,
            "and" => Token::And,
            "or" => Token::Or,
            "not" => Token::Not,
            _ => Token::Ident(s),
        }
    }

    fn next_token(&mut self) -> Token {
        self.skip_ws();
        let Some(c) = self.advance() else { return Token::Eof };

        match c {
            '0'..='9' => self.read_number(c),
            '.' if matches!(self.peek(), Some(d) if d.is_ascii_digit()) => self.read_number(c),
            '\'' | '"' => self.read_string(c, false, false),
            c if c.is_alphabetic() || c == '_' => self.read_word(c),
            '+' => Token::Plus,
            '-' => Token::Minus,
            '*' => {
                if self.eat('*') {
                    Token::DoubleStar
                } else {
                    Token::Star
                }
            }
            '/' => {
                if self.eat('/') {
                    Token::DoubleSlash
                } else {
                    Token::Slash
                }
            }
            '%' => Token::Percent,
            '=' => {
                if self.eat('=') {
                    Token::Eq
                } else {
                    Token::Assign
                }
            }
            '!' => {
                if self.eat('=') {
                    Token::Ne
                } else {
                    Token::Unknown('!')
                }
            }
            '<' => {
                if self.eat('=') {
                    Token::Le
                } else {
                    Token::Lt
                }
            }
            '>' => {
                if self.eat('=') {
                    Token::Ge
                } else {
                    Token::Gt
                }
            }
            ',' => Token::Comma,
            '.' => Token::Dot,
            '(' => Token::LParen,
            ')' => Token::RParen,
            c => Token::Unknown(c),
        }
    }

    fn tokenize(mut self) -> Vec<Token> {
        let mut tokens = Vec::new();
        loop {
            let t = self.next_token();
            let done = matches!(t, Token::Eof);
            tokens.push(t);
            if done {
                break;
            }
        }
        tokens
    }
}

/// Process the escapes a non-raw string understands.  Other backslash
/// sequences stay as written, so LaTeX like `'\frac'` survives.
pub fn unescape(body: &str) -> String {
    let mut out = String::with_capacity(body.len());
    let mut chars = body.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('\\') => out.push('\\'),
            Some('\'') => out.push('\''),
            Some('"') => out.push('"'),
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some(other) => {
                out.push('\\');
                out.push(other);
            }
            None => out.push('\\'),
        }
    }
    out
}

// ── AST ───────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    FloorDiv,
    Rem,
    Pow,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CmpOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl CmpOp {
    fn symbol(self) -> &'static str {
        match self {
            CmpOp::Eq => "==",
            CmpOp::Ne => "!=",
            CmpOp::Lt => "<",
            CmpOp::Le => "<=",
            CmpOp::Gt => ">",
            CmpOp::Ge => ">=",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum UnaryOp {
    Neg,
    Pos,
    Not,
}

/// One piece of an f-string.
#[derive(Debug, Clone)]
pub enum FSegment {
    Text(String),
    Field { expr: Node, conversion: Option<char>, spec: String },
}

#[derive(Debug, Clone)]
pub enum Node {
    Literal(Value),
    FString(Vec<FSegment>),
    Name(String),
    Attr(Box<Node>, String),
    Call { callee: Box<Node>, args: Vec<Node>, kwargs: Vec<(String, Node)> },
    Unary(UnaryOp, Box<Node>),
    Binary(BinOp, Box<Node>, Box<Node>),
    /// `a < b <= c`: each link is checked against the previous operand.
    Compare(Box<Node>, Vec<(CmpOp, Node)>),
    And(Box<Node>, Box<Node>),
    Or(Box<Node>, Box<Node>),
}

// ── Parser ────────────────────────────────────────────────────────────────────

/// Deepest expression tree the parser builds.  Nested parentheses,
/// unary operators, and operator chains all count towards it.
const MAX_DEPTH: usize = 200;

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    depth: usize,
}

fn syntax(msg: impl Into<String>) -> EvalError {
    EvalError::Syntax(msg.into())
}

impl Parser {
    fn new(tokens: Vec<Token>) -> Self {
        Parser { tokens, pos: 0, depth: 0 }
    }

    /// One level deeper.  On error the parse is abandoned, so only
    /// successful paths need to restore `depth`.
    fn enter(&mut self) -> Result<(), EvalError> {
        self.depth += 1;
        if self.depth > MAX_DEPTH {
            return Err(syntax("too many nested parentheses"));
        }
        Ok(())
    }

    fn peek(&self) -> &Token {
        self.tokens.get(self.pos).unwrap_or(&Token::Eof)
    }

    fn peek_at(&self, offset: usize) -> &Token {
        self.tokens.get(self.pos + offset).unwrap_or(&Token::Eof)
    }

    fn advance(&mut self) -> Token {
        let t = self.tokens.get(self.pos).cloned().unwrap_or(Token::Eof);
        self.pos += 1;
        t
    }

    fn eat(&mut self, expected: &Token) -> bool {
        if self.peek() == expected {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    // ── Grammar ───────────────────────────────────────────────────────────────

    fn parse_or(&mut self) -> Result<Node, EvalError> {
        let mark = self.depth;
        let mut lhs = self.parse_and()?;
        while self.eat(&Token::Or) {
            self.enter()?;
            let rhs = self.parse_and()?;
            lhs = Node::Or(Box::new(lhs), Box::new(rhs));
        }
        self.depth = mark;
        Ok(lhs)
    }

    fn parse_and(&mut self) -> Result<Node, EvalError> {
        let mark = self.depth;
        let mut lhs = self.parse_not()?;
        while self.eat(&Token::And) {
            self.enter()?;
            let rhs = self.parse_not()?;
            lhs = Node::And(Box::new(lhs), Box::new(rhs));
        }
        self.depth = mark;
        Ok(lhs)
    }

    fn parse_not(&mut self) -> Result<Node, EvalError> {
        if self.eat(&Token::Not) {
            self.enter()?;
            let inner = self.parse_not()?;
            self.depth -= 1;
            return Ok(Node::Unary(UnaryOp::Not, Box::new(inner)));
        }
        self.parse_comparison()
    }

    fn parse_comparison(&mut self) -> Result<Node, EvalError> {
        let first = self.parse_additive()?;
        let mut links = Vec::new();
        loop {
            let op = match self.peek() {
                Token::Eq => CmpOp::Eq,
                Token::Ne => CmpOp::Ne,
                Token::Lt => CmpOp::Lt,
                Token::Le => CmpOp::Le,
                Token::Gt => CmpOp::Gt,
                Token::Ge => CmpOp::Ge,
                _ => break,
            };
            self.pos += 1;
            links.push((op, self.parse_additive()?));
        }
        if links.is_empty() {
            Ok(first)
        } else {
            Ok(Node::Compare(Box::new(first), links))
        }
    }

    fn parse_additive(&mut self) -> Result<Node, EvalError> {
        let mark = self.depth;
        let mut lhs = self.parse_multiplicative()?;
        loop {
            let op = match self.peek() {
                Token::Plus => BinOp::Add,
                Token::Minus => BinOp::Sub,
                _ => break,
            };
            self.pos += 1;
            self.enter()?;
            let rhs = self.parse_multiplicative()?;
            lhs = Node::Binary(op, Box::new(lhs), Box::new(rhs));
        }
        self.depth = mark;
        Ok(lhs)
    }

    fn parse_multiplicative(&mut self) -> Result<Node, EvalError> {
        let mark = self.depth;
        let mut lhs = self.parse_unary()?;
        loop {
            let op = match self.peek() {
                Token::Star => BinOp::Mul,
                Token::Slash => BinOp::Div,
                Token::DoubleSlash => BinOp::FloorDiv,
                Token::Percent => BinOp::Rem,
                _ => break,
            };
            self.pos += 1;
            self.enter()?;
            let rhs = self.parse_unary()?;
            lhs = Node::Binary(op, Box::new(lhs), Box::new(rhs));
        }
        self.depth = mark;
        Ok(lhs)
    }

    /// Every operand passes through here, so each level of parentheses,
    /// call arguments, signs, and `**` exponents is counted once.
    fn parse_unary(&mut self) -> Result<Node, EvalError> {
        self.enter()?;
        let node = match self.peek() {
            Token::Minus => {
                self.pos += 1;
                Node::Unary(UnaryOp::Neg, Box::new(self.parse_unary()?))
            }
            Token::Plus => {
                self.pos += 1;
                Node::Unary(UnaryOp::Pos, Box::new(self.parse_unary()?))
            }
            _ => self.parse_power()?,
        };
        self.depth -= 1;
        Ok(node)
    }

    /// `**` binds tighter than a unary sign on its left and is
    /// right-associative: `-2**2 == -4`, `2**3**2 == 512`.
    fn parse_power(&mut self) -> Result<Node, EvalError> {
        let base = self.parse_postfix()?;
        if self.eat(&Token::DoubleStar) {
            let exp = self.parse_unary()?;
            return Ok(Node::Binary(BinOp::Pow, Box::new(base), Box::new(exp)));
        }
        Ok(base)
    }

    fn parse_postfix(&mut self) -> Result<Node, EvalError> {
        let mark = self.depth;
        let mut node = self.parse_primary()?;
        loop {
            if matches!(self.peek(), Token::Dot | Token::LParen) {
                self.enter()?;
            }
            if self.eat(&Token::Dot) {
                match self.advance() {
                    Token::Ident(attr) => node = Node::Attr(Box::new(node), attr),
                    other => return Err(syntax(format!("expected attribute name, found {other:?}"))),
                }
            } else if self.eat(&Token::LParen) {
                let (args, kwargs) = self.parse_arguments()?;
                node = Node::Call { callee: Box::new(node), args, kwargs };
            } else {
                self.depth = mark;
                return Ok(node);
            }
        }
    }

    /// Argument list after `(`, up to and including `)`.
    #[allow(clippy::type_complexity)]
    fn parse_arguments(&mut self) -> Result<(Vec<Node>, Vec<(String, Node)>), EvalError> {
        let mut args = Vec::new();
        let mut kwargs: Vec<(String, Node)> = Vec::new();
        while self.peek() != &Token::RParen {
            let keyword = match (self.peek(), self.peek_at(1)) {
                (Token::Ident(name), Token::Assign) => Some(name.clone()),
                _ => None,
            };
            match keyword {
                Some(name) => {
                    self.pos += 2;
                    if kwargs.iter().any(|(k, _)| *k == name) {
                        return Err(syntax(format!("keyword argument repeated: {name}")));
                    }
                    kwargs.push((name, self.parse_or()?));
                }
                None => {
                    if !kwargs.is_empty() {
                        return Err(syntax("positional argument follows keyword argument"));
                    }
                    args.push(self.parse_or()?);
                }
            }
            if !self.eat(&Token::Comma) {
                break;
            }
        }
        if !self.eat(&Token::RParen) {
            return Err(syntax("'(' was never closed"));
        }
        Ok((args, kwargs))
    }

    fn parse_primary(&mut self) -> Result<Node, EvalError> {
        match self.advance() {
            Token::Int(n) => Ok(Node::Literal(Value::Int(n))),
            Token::Float(x) => Ok(Node::Literal(Value::Float(x))),
            Token::Str(s) => Ok(Node::Literal(Value::Str(s))),
            Token::FStr { body, raw } => Ok(Node::FString(parse_fstring(&body, raw)?)),
            Token::True => Ok(Node::Literal(Value::Bool(true))),
            Token::False => Ok(Node::Literal(Value::Bool(false))),
            Token::None => Ok(Node::Literal(Value::None)),
            Token::Ident(name) => Ok(Node::Name(name)),
            Token::LParen => {
                let inner = self.parse_or()?;
                if !self.eat(&Token::RParen) {
                    return Err(syntax("'(' was never closed"));
                }
                Ok(inner)
            }
            Token::Error(msg) => Err(syntax(msg)),
            Token::Unknown(c) => Err(syntax(format!("invalid character '{c}'"))),
            Token::Eof => Err(syntax("unexpected end of expression")),
            _ => Err(syntax("invalid syntax")),
        }
    }
}

// ── f-strings ─────────────────────────────────────────────────────────────────

fn parse_fstring(body: &str, raw: bool) -> Result<Vec<FSegment>, EvalError> {
    let chars: Vec<char> = body.chars().collect();
    let mut segments = Vec::new();
    let mut text = String::new();
    let flush = |text: &mut String, segments: &mut Vec<FSegment>| {
        if !text.is_empty() {
            let t = if raw { std::mem::take(text) } else { unescape(&std::mem::take(text)) };
            segments.push(FSegment::Text(t));
        }
    };

    let mut i = 0;
    while i < chars.len() {
        match chars[i] {
            '{' if chars.get(i + 1) == Some(&'{') => {
                text.push('{');
                i += 2;
            }
            '}' if chars.get(i + 1) == Some(&'}') => {
                text.push('}');
                i += 2;
            }
            '{' => {
                let end = field_end(&chars, i + 1)
                    .ok_or_else(|| syntax("f-string: expecting '}'"))?;
                flush(&mut text, &mut segments);
                let field: String = chars[i + 1..end].iter().collect();
                segments.push(parse_field(&field)?);
                i = end + 1;
            }
            '}' => return Err(syntax("f-string: single '}' is not allowed")),
            c => {
                text.push(c);
                i += 1;
            }
        }
    }
    flush(&mut text, &mut segments);
    Ok(segments)
}

/// Index of the `}` closing a replacement field that starts at `start`.
fn field_end(chars: &[char], start: usize) -> Option<usize> {
    let mut depth = 0i32;
    let mut quote: Option<char> = None;
    for (i, &c) in chars.iter().enumerate().skip(start) {
        if let Some(q) = quote {
            if c == q && chars[i - 1] != '\\' {
                quote = None;
            }
            continue;
        }
        match c {
            '\'' | '"' => quote = Some(c),
            '(' | '[' | '{' => depth += 1,
            ')' | ']' => depth -= 1,
            '}' if depth == 0 => return Some(i),
            '}' => depth -= 1,
            _ => {}
        }
    }
    None
}

/// Split `expr!conv:spec` and parse the expression part.
fn parse_field(field: &str) -> Result<FSegment, EvalError> {
    let chars: Vec<char> = field.chars().collect();
    let mut depth = 0i32;
    let mut quote: Option<char> = None;
    let mut expr_end = chars.len();
    let mut conversion = None;
    let mut spec = String::new();

    for (i, &c) in chars.iter().enumerate() {
        if let Some(q) = quote {
            if c == q && (i == 0 || chars[i - 1] != '\\') {
                quote = None;
            }
            continue;
        }
        match c {
            '\'' | '"' => quote = Some(c),
            '(' | '[' | '{' => depth += 1,
            ')' | ']' | '}' => depth -= 1,
            '!' if depth == 0
                && matches!(chars.get(i + 1), Some('r' | 's' | 'a'))
                && matches!(chars.get(i + 2), None | Some(':')) =>
            {
                expr_end = i;
                conversion = chars.get(i + 1).copied();
                if chars.get(i + 2).is_some() {
                    spec = chars[i + 3..].iter().collect();
                }
                break;
            }
            ':' if depth == 0 => {
                expr_end = i;
                spec = chars[i + 1..].iter().collect();
                break;
            }
            _ => {}
        }
    }

    let src: String = chars[..expr_end].iter().collect();
    if src.trim().is_empty() {
        return Err(syntax("f-string: empty expression not allowed"));
    }
    Ok(FSegment::Field { expr: parse_expr(&src)?, conversion, spec })
}

/// Apply a format spec: empty, `d`, or `.Nf`.
fn format_field(v: &Value, spec: &str) -> Result<String, EvalError> {
    let unknown = |code: &str| {
        EvalError::Value(format!(
            "Unknown format code '{code}' for object of type '{}'",
            v.type_name()
        ))
    };
    if spec.is_empty() {
        return Ok(v.to_string());
    }
    if spec == "d" {
        return match v {
            Value::Int(n) => Ok(n.to_string()),
            Value::Bool(b) => Ok(i64::from(*b).to_string()),
            _ => Err(unknown("d")),
        };
    }
    if let Some(digits) = spec.strip_suffix('f') {
        let precision = match digits.strip_prefix('.') {
            Some(n) => n
                .parse::<usize>()
                .map_err(|_| EvalError::Value(format!("Invalid format specifier '{spec}'")))?,
            None if digits.is_empty() => 6,
            None => return Err(EvalError::Value(format!("Invalid format specifier '{spec}'"))),
        };
        let x = v.as_f64().ok_or_else(|| unknown("f"))?;
        return Ok(format!("{x:.precision$}"));
    }
    Err(EvalError::Value(format!("Invalid format specifier '{spec}'")))
}

/// Parse a snippet expression into an AST.
pub fn parse_expr(src: &str) -> Result<Node, EvalError> {
    let tokens = Lexer::new(src).tokenize();
    let mut parser = Parser::new(tokens);
    let node = parser.parse_or()?;
    match parser.peek() {
        Token::Eof => Ok(node),
        Token::Error(msg) => Err(syntax(msg.clone())),
        _ => Err(syntax("invalid syntax")),
    }
}

// ── Evaluator ─────────────────────────────────────────────────────────────────

/// Evaluate a [`Node`] against the given context.
pub fn eval_node(node: &Node, ctx: &mut dyn EvalContext) -> Result<Value, EvalError> {
    match node {
        Node::Literal(v) => Ok(v.clone()),

        Node::FString(segments) => {
            let mut out = String::new();
            for seg in segments {
                match seg {
                    FSegment::Text(t) => out.push_str(t),
                    FSegment::Field { expr, conversion, spec } => {
                        let v = eval_node(expr, ctx)?;
                        let v = match conversion {
                            Some('r' | 'a') => Value::Str(v.repr()),
                            Some(_) => Value::Str(v.to_string()),
                            None => v,
                        };
                        out.push_str(&format_field(&v, spec)?);
                    }
                }
            }
            Ok(Value::Str(out))
        }

        Node::Name(name) => ctx
            .get_var(name)
            .or_else(|| builtins::lookup(name).map(Value::Builtin))
            .ok_or_else(|| EvalError::undefined(name)),

        Node::Attr(recv, attr) => {
            let v = eval_node(recv, ctx)?;
            builtins::get_attr(&v, attr)
        }

        Node::Call { callee, args, kwargs } => eval_call(callee, args, kwargs, ctx),

        Node::Unary(op, inner) => {
            let v = eval_node(inner, ctx)?;
            match op {
                UnaryOp::Neg => v.arith_neg(),
                UnaryOp::Pos => v.arith_pos(),
                UnaryOp::Not => Ok(Value::Bool(!v.truthy())),
            }
        }

        Node::Binary(op, lhs, rhs) => {
            let l = eval_node(lhs, ctx)?;
            let r = eval_node(rhs, ctx)?;
            match op {
                BinOp::Add => l.arith_add(&r),
                BinOp::Sub => l.arith_sub(&r),
                BinOp::Mul => l.arith_mul(&r),
                BinOp::Div => l.arith_div(&r),
                BinOp::FloorDiv => l.arith_floordiv(&r),
                BinOp::Rem => l.arith_rem(&r),
                BinOp::Pow => l.arith_pow(&r),
            }
        }

        Node::Compare(first, links) => {
            let mut left = eval_node(first, ctx)?;
            for (op, node) in links {
                let right = eval_node(node, ctx)?;
                if !compare(*op, &left, &right)? {
                    return Ok(Value::Bool(false));
                }
                left = right;
            }
            Ok(Value::Bool(true))
        }

        // Short-circuit, yielding the deciding operand as Python does.
        Node::And(lhs, rhs) => {
            let l = eval_node(lhs, ctx)?;
            if !l.truthy() {
                return Ok(l);
            }
            eval_node(rhs, ctx)
        }
        Node::Or(lhs, rhs) => {
            let l = eval_node(lhs, ctx)?;
            if l.truthy() {
                return Ok(l);
            }
            eval_node(rhs, ctx)
        }
    }
}

fn compare(op: CmpOp, l: &Value, r: &Value) -> Result<bool, EvalError> {
    use std::cmp::Ordering;
    Ok(match op {
        CmpOp::Eq => l.py_eq(r),
        CmpOp::Ne => !l.py_eq(r),
        CmpOp::Lt => l.py_cmp(r, op.symbol())? == Ordering::Less,
        CmpOp::Le => l.py_cmp(r, op.symbol())? != Ordering::Greater,
        CmpOp::Gt => l.py_cmp(r, op.symbol())? == Ordering::Greater,
        CmpOp::Ge => l.py_cmp(r, op.symbol())? != Ordering::Less,
    })
}

fn eval_call(
    callee: &Node,
    arg_nodes: &[Node],
    kwarg_nodes: &[(String, Node)],
    ctx: &mut dyn EvalContext,
) -> Result<Value, EvalError> {
    // The receiver (or callee) is evaluated before the arguments.
    let (target, method) = match callee {
        Node::Attr(recv, method) => (eval_node(recv, ctx)?, Some(method.as_str())),
        _ => (eval_node(callee, ctx)?, None),
    };

    let mut args = Vec::with_capacity(arg_nodes.len());
    for a in arg_nodes {
        args.push(eval_node(a, ctx)?);
    }
    let mut kwargs = Vec::with_capacity(kwarg_nodes.len());
    for (k, n) in kwarg_nodes {
        kwargs.push((k.clone(), eval_node(n, ctx)?));
    }

    let call = match method {
        Some(m) => builtins::call_method(&target, m, args, kwargs, &*ctx)?,
        None => builtins::call_value(&target, args, kwargs, &*ctx)?,
    };

    // A call that produced a new receiver updates the name it came from.
    let receiver_name = match callee {
        Node::Attr(recv, _) => match recv.as_ref() {
            Node::Name(name) => Some(name),
            _ => None,
        },
        Node::Name(name) => Some(name),
        _ => None,
    };
    if let (Some(name), Some(updated)) = (receiver_name, call.receiver) {
        ctx.rebind(name, updated);
    }
    Ok(call.value)
}

/// Convenience: parse and evaluate a snippet expression.
pub fn eval_str(src: &str, ctx: &mut dyn EvalContext) -> Result<Value, EvalError> {
    let node = parse_expr(src)?;
    eval_node(&node, ctx)
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::formula::Expr;
    use crate::format::DEFAULT_PRECISION;
    use crate::symbolic::Builtin;
    use std::collections::HashMap;

    // ── Minimal EvalContext for tests ─────────────────────────────────────────

    struct TestCtx {
        vars: HashMap<String, Value>,
    }

    impl TestCtx {
        fn new() -> Self {
            TestCtx { vars: HashMap::new() }
        }
        fn with(mut self, k: &str, v: Value) -> Self {
            self.vars.insert(k.into(), v);
            self
        }
    }

    impl EvalContext for TestCtx {
        fn get_var(&self, name: &str) -> Option<Value> {
            self.vars.get(name).cloned()
        }
        fn rebind(&mut self, name: &str, value: Value) {
            self.vars.insert(name.into(), value);
        }
        fn symbolic(&self) -> &dyn Symbolic {
            &Builtin
        }
        fn precision(&self) -> usize {
            DEFAULT_PRECISION
        }
    }

    fn eval(src: &str) -> Value {
        eval_str(src, &mut TestCtx::new()).expect("eval failed")
    }

    fn eval_ctx(src: &str, ctx: &mut TestCtx) -> Value {
        eval_str(src, ctx).expect("eval failed")
    }

    fn err(src: &str) -> String {
        eval_str(src, &mut TestCtx::new()).expect_err("expected failure").to_string()
    }

    fn s(v: &str) -> Value {
        Value::Str(v.into())
    }

    #[test]
    fn literals() {
        assert_eq!(eval("42"), Value::Int(42));
        assert_eq!(eval("2.5"), Value::Float(2.5));
        assert_eq!(eval("1e3"), Value::Float(1000.0));
        assert_eq!(eval(".5"), Value::Float(0.5));
        assert_eq!(eval("1_000"), Value::Int(1000));
        assert_eq!(eval("True"), Value::Bool(true));
        assert_eq!(eval("None"), Value::None);
        assert_eq!(eval("'hi'"), s("hi"));
        assert_eq!(eval("\"hi\""), s("hi"));
    }

    #[test]
    fn string_escapes() {
        assert_eq!(eval(r"'a\nb'"), s("a\nb"));
        assert_eq!(eval(r"'it\'s'"), s("it's"));
        assert_eq!(eval(r"'\frac{1}{2}'"), s(r"\frac{1}{2}"));
        assert_eq!(eval(r"'\\'"), s("\\"));
        assert_eq!(eval(r"r'\n'"), s(r"\n"));
        assert_eq!(eval(r"R'\t'"), s(r"\t"));
    }

    #[test]
    fn arithmetic_and_precedence() {
        assert_eq!(eval("2 + 3 * 4"), Value::Int(14));
        assert_eq!(eval("(2 + 3) * 4"), Value::Int(20));
        assert_eq!(eval("7 / 2"), Value::Float(3.5));
        assert_eq!(eval("7 // 2"), Value::Int(3));
        assert_eq!(eval("7 % 3"), Value::Int(1));
        assert_eq!(eval("-2 ** 2"), Value::Int(-4));
        assert_eq!(eval("2 ** 3 ** 2"), Value::Int(512));
        assert_eq!(eval("2 ** -1"), Value::Float(0.5));
        assert_eq!(eval("--3"), Value::Int(3));
    }

    #[test]
    fn comparisons_and_logic() {
        assert_eq!(eval("1 < 2 < 3"), Value::Bool(true));
        assert_eq!(eval("1 < 2 > 3"), Value::Bool(false));
        assert_eq!(eval("2 == 2.0"), Value::Bool(true));
        assert_eq!(eval("'a' != 'b'"), Value::Bool(true));
        assert_eq!(eval("not 1 == 2"), Value::Bool(true));
        assert_eq!(eval("0 or 'x'"), s("x"));
        assert_eq!(eval("1 and 0"), Value::Int(0));
        assert_eq!(eval("None or 3 and 4"), Value::Int(4));
    }

    #[test]
    fn short_circuit_skips_rhs() {
        assert_eq!(eval("0 and undefined_name"), Value::Int(0));
        assert_eq!(eval("1 or undefined_name"), Value::Int(1));
    }

    #[test]
    fn fstrings() {
        let mut ctx = TestCtx::new().with("x", Value::Float(2.0 / 3.0)).with("n", Value::Int(7));
        assert_eq!(eval_ctx("f'n={n}'", &mut ctx), s("n=7"));
        assert_eq!(eval_ctx("f'{x:.2f}'", &mut ctx), s("0.67"));
        assert_eq!(eval_ctx("f'{n:d}!'", &mut ctx), s("7!"));
        assert_eq!(eval_ctx("f'{{{n}}}'", &mut ctx), s("{7}"));
        assert_eq!(eval_ctx("f'{n + 1}'", &mut ctx), s("8"));
        assert_eq!(eval_ctx("f'{\"q\"!r}'", &mut ctx), s("'q'"));
        assert_eq!(eval_ctx("f'{n != 7}'", &mut ctx), s("False"));
        assert_eq!(eval_ctx(r"rf'\frac{{{n}}}{{2}}'", &mut ctx), s(r"\frac{7}{2}"));
    }

    #[test]
    fn fstring_errors() {
        assert!(err("f'{'").contains("expecting '}'"));
        assert!(err("f'}'").contains("single '}'"));
        assert!(err("f'{}'").contains("empty expression"));
        assert!(err("f'{1:x}'").contains("Invalid format specifier"));
        assert!(err("f'{\"a\":d}'").contains("Unknown format code 'd'"));
    }

    #[test]
    fn names_and_builtins() {
        let mut ctx = TestCtx::new().with("x", Value::Int(7));
        assert_eq!(eval_ctx("x + 1", &mut ctx), Value::Int(8));
        assert_eq!(eval_ctx("str(x)", &mut ctx), s("7"));
        assert_eq!(err("y"), "name 'y' is not defined");
    }

    #[test]
    fn scope_shadows_builtins() {
        let mut ctx = TestCtx::new().with("str", Value::Int(1));
        assert_eq!(eval_ctx("str", &mut ctx), Value::Int(1));
    }

    #[test]
    fn method_call_rebinds_receiver_name() {
        let mut ctx = TestCtx::new().with("e", Value::Expr(Expr::new("param(a)+1")));
        assert_eq!(eval_ctx("str(e.bind(a=2))", &mut ctx), s("2+1"));
        assert_eq!(eval_ctx("e()", &mut ctx), s("3"));
        assert_eq!(eval_ctx("e.unbind().latex", &mut ctx), s("param(a)+1"));
        assert_eq!(eval_ctx("e.latex", &mut ctx), s("2+1"));
    }

    #[test]
    fn call_with_kwargs_rebinds_callee_name() {
        let mut ctx = TestCtx::new().with("add", Value::Expr(Expr::new("param(x) + param(y)")));
        assert_eq!(eval_ctx("add(x=10, y=5)", &mut ctx), s("15"));
        assert_eq!(eval_ctx("add.latex", &mut ctx), s("10 + 5"));
    }

    #[test]
    fn syntax_errors() {
        assert!(err("1 +").contains("unexpected end"));
        assert!(err("(1").contains("never closed"));
        assert!(err("'abc").contains("unterminated string"));
        assert!(err("1 2").contains("invalid syntax"));
        assert!(err("f(a=1, 2)").contains("positional argument follows keyword"));
        assert!(err("x = 1").contains("invalid syntax"));
    }

    #[test]
    fn moderate_nesting_evaluates() {
        let src = format!("{}1{}", "(".repeat(50), ")".repeat(50));
        assert_eq!(eval(&src), Value::Int(1));
        assert_eq!(eval(&format!("{}3", "-".repeat(40))), Value::Int(3));
    }

    #[test]
    fn deep_nesting_is_a_syntax_error() {
        let parens = format!("{}1{}", "(".repeat(100_000), ")".repeat(100_000));
        assert!(err(&parens).contains("too many nested parentheses"));
        assert!(err(&format!("{}1", "-".repeat(100_000))).contains("too many nested"));
        assert!(err(&format!("{}True", "not ".repeat(10_000))).contains("too many nested"));
        assert!(err(&format!("{}1{}", "f(".repeat(10_000), ")".repeat(10_000)))
            .contains("too many nested"));
    }

    #[test]
    fn long_operator_chain_is_bounded() {
        assert_eq!(eval(&vec!["1"; 150].join(" + ")), Value::Int(150));
        assert!(err(&vec!["1"; 10_000].join(" + ")).contains("too many nested"));
    }
}
