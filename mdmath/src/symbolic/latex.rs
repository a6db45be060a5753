//! LaTeX math → [`Sym`] parser.
//!
//! Covers the arithmetic subset that shows up in worked examples:
//! numbers, single-letter symbols (with subscripts), implicit
//! multiplication, `+ - * / ^ !`, `\cdot`, `\times`, `\div`, `\frac`,
//! `\sqrt[n]{…}`, `|…|`, bracket groups, `\left`/`\right`, common
//! functions and the constants `\pi`, `e`, `\infty`.
//!
//! Precedence (lowest → highest):
//!   additive  →  multiplicative/implicit  →  unary sign  →  power  →
//!   postfix `!`  →  primary

use super::{Constant, Func, Sym, SymbolicError};

// ── Token ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Num(String),
    Letter(char),
    Command(String),
    Plus,
    Minus,
    Star,
    Slash,
    Caret,
    Underscore,
    Bang,
    Pipe,
    LParen,
    RParen,
    LBracket,
    RBracket,
    LBrace,
    RBrace,
    Unknown(char),
    Eof,
}

/// Commands that only affect spacing or sizing and carry no meaning.
const IGNORED_COMMANDS: &[&str] = &[
    ",", ";", ":", "!", " ", "quad", "qquad", "left", "right", "big", "Big", "bigg", "Bigg",
    "displaystyle", "textstyle",
];

/// Greek letters usable as plain symbols (`\pi` is the constant).
const GREEK: &[&str] = &[
    "alpha", "beta", "gamma", "delta", "epsilon", "varepsilon", "zeta", "eta", "theta",
    "vartheta", "kappa", "lambda", "mu", "nu", "xi", "rho", "sigma", "tau", "phi", "varphi",
    "chi", "psi", "omega", "Gamma", "Delta", "Theta", "Lambda", "Sigma", "Phi", "Psi", "Omega",
];

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

    fn next_token(&mut self) -> Token {
        while matches!(self.peek(), Some(c) if c.is_whitespace()) {
            self.pos += 1;
        }
        let Some(c) = self.peek() else { return Token::Eof };
        self.pos += 1;
        match c {
            '0'..='9' | '.' => {
                let mut s = String::from(c);
                while let Some(d @ ('0'..='9' | '.')) = self.peek() {
                    s.push(d);
                    self.pos += 1;
                }
                Token::Num(s)
            }
            '\\' => {
                let mut name = String::new();
                while let Some(l) = self.peek().filter(|l| l.is_ascii_alphabetic()) {
                    name.push(l);
                    self.pos += 1;
                }
                if name.is_empty() {
                    if let Some(sym) = self.peek() {
                        name.push(sym);
                        self.pos += 1;
                    }
                }
                Token::Command(name)
            }
            '+' => Token::Plus,
            '-' => Token::Minus,
            '*' => Token::Star,
            '/' => Token::Slash,
            '^' => Token::Caret,
            '_' => Token::Underscore,
            '!' => Token::Bang,
            '|' => Token::Pipe,
            '(' => Token::LParen,
            ')' => Token::RParen,
            '[' => Token::LBracket,
            ']' => Token::RBracket,
            '{' => Token::LBrace,
            '}' => Token::RBrace,
            c if c.is_alphabetic() => Token::Letter(c),
            c => Token::Unknown(c),
        }
    }

    fn tokenize(mut self) -> Vec<Token> {
        let mut tokens = Vec::new();
        loop {
            let t = self.next_token();
            match &t {
                Token::Eof => break,
                Token::Command(name) if IGNORED_COMMANDS.contains(&name.as_str()) => continue,
                Token::Command(name) if name == "{" => tokens.push(Token::LParen),
                Token::Command(name) if name == "}" => tokens.push(Token::RParen),
                Token::Command(name) if name == "|" => tokens.push(Token::Pipe),
                _ => tokens.push(t),
            }
        }
        tokens.push(Token::Eof);
        tokens
    }
}

// ── Parser ────────────────────────────────────────────────────────────────────

/// Deepest tree the parser builds: groups, commands, signs, and operator
/// chains all count.
const MAX_DEPTH: usize = 200;

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    depth: usize,
}

impl Parser {
    fn peek(&self) -> &Token {
        self.tokens.get(self.pos).unwrap_or(&Token::Eof)
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

    fn enter(&mut self) -> Result<(), SymbolicError> {
        self.depth += 1;
        if self.depth > MAX_DEPTH {
            return Err(SymbolicError::Parse("expression nested too deeply".into()));
        }
        Ok(())
    }

    fn expect(&mut self, expected: &Token, what: &str) -> Result<(), SymbolicError> {
        if self.eat(expected) {
            Ok(())
        } else {
            Err(SymbolicError::Parse(format!("expected {what}, found {:?}", self.peek())))
        }
    }

    fn parse_additive(&mut self) -> Result<Sym, SymbolicError> {
        let mark = self.depth;
        let mut lhs = self.parse_multiplicative()?;
        loop {
            if self.eat(&Token::Plus) {
                self.enter()?;
                let rhs = self.parse_multiplicative()?;
                lhs = Sym::Add(Box::new(lhs), Box::new(rhs));
            } else if self.eat(&Token::Minus) {
                self.enter()?;
                let rhs = self.parse_multiplicative()?;
                lhs = Sym::Sub(Box::new(lhs), Box::new(rhs));
            } else {
                self.depth = mark;
                return Ok(lhs);
            }
        }
    }

    fn parse_multiplicative(&mut self) -> Result<Sym, SymbolicError> {
        let mark = self.depth;
        let mut lhs = self.parse_unary()?;
        loop {
            let divide = match self.peek() {
                Token::Star => false,
                Token::Slash => true,
                Token::Command(c) if c == "cdot" || c == "times" || c == "ast" => false,
                Token::Command(c) if c == "div" => true,
                _ if self.starts_primary() => {
                    self.enter()?;
                    let rhs = self.parse_power()?;
                    lhs = Sym::Mul(Box::new(lhs), Box::new(rhs));
                    continue;
                }
                _ => {
                    self.depth = mark;
                    return Ok(lhs);
                }
            };
            self.pos += 1;
            self.enter()?;
            let rhs = self.parse_unary()?;
            lhs = if divide {
                Sym::Div(Box::new(lhs), Box::new(rhs))
            } else {
                Sym::Mul(Box::new(lhs), Box::new(rhs))
            };
        }
    }

    /// Can the next token begin an implicitly multiplied factor?
    fn starts_primary(&self) -> bool {
        match self.peek() {
            Token::Num(_) | Token::Letter(_) | Token::LParen | Token::LBracket | Token::LBrace => {
                true
            }
            Token::Command(c) => !matches!(c.as_str(), "cdot" | "times" | "ast" | "div"),
            _ => false,
        }
    }

    fn parse_unary(&mut self) -> Result<Sym, SymbolicError> {
        self.enter()?;
        let e = if self.eat(&Token::Minus) {
            Sym::Neg(Box::new(self.parse_unary()?))
        } else if self.eat(&Token::Plus) {
            self.parse_unary()?
        } else {
            self.parse_power()?
        };
        self.depth -= 1;
        Ok(e)
    }

    fn parse_power(&mut self) -> Result<Sym, SymbolicError> {
        let base = self.parse_postfix()?;
        if self.eat(&Token::Caret) {
            let exp = self.parse_script_arg()?;
            let exp = self.parse_bangs(exp)?;
            return Ok(Sym::Pow(Box::new(base), Box::new(exp)));
        }
        Ok(base)
    }

    /// Argument of `^`: a braced group, a sign-prefixed argument, or one
    /// atom.
    fn parse_script_arg(&mut self) -> Result<Sym, SymbolicError> {
        self.enter()?;
        let e = if self.eat(&Token::Minus) {
            Sym::Neg(Box::new(self.parse_script_arg()?))
        } else {
            let atom = self.parse_group_arg()?;
            if self.eat(&Token::Caret) {
                let exp = self.parse_script_arg()?;
                Sym::Pow(Box::new(atom), Box::new(exp))
            } else {
                atom
            }
        };
        self.depth -= 1;
        Ok(e)
    }

    fn parse_postfix(&mut self) -> Result<Sym, SymbolicError> {
        let p = self.parse_primary()?;
        self.parse_bangs(p)
    }

    fn parse_bangs(&mut self, mut e: Sym) -> Result<Sym, SymbolicError> {
        let mark = self.depth;
        while self.eat(&Token::Bang) {
            self.enter()?;
            e = Sym::Factorial(Box::new(e));
        }
        self.depth = mark;
        Ok(e)
    }

    /// A `{…}` group or a single-token argument, as taken by `\frac`,
    /// `\sqrt`, `^` and `_`.  Multi-digit numbers donate only their first
    /// digit (`\frac12` is ½).
    fn parse_group_arg(&mut self) -> Result<Sym, SymbolicError> {
        if self.eat(&Token::LBrace) {
            let inner = self.parse_additive()?;
            self.expect(&Token::RBrace, "'}'")?;
            return Ok(inner);
        }
        if let Token::Num(s) = self.peek().clone() {
            let mut chars = s.chars();
            if let Some(first) = chars.next() {
                let rest: String = chars.collect();
                if !rest.is_empty() && first != '.' {
                    self.tokens[self.pos] = Token::Num(rest);
                    return number(&first.to_string());
                }
            }
        }
        self.parse_primary()
    }

    /// Groups and commands recurse through here, so each level is counted.
    fn parse_primary(&mut self) -> Result<Sym, SymbolicError> {
        self.enter()?;
        let e = self.parse_atom()?;
        self.depth -= 1;
        Ok(e)
    }

    fn parse_atom(&mut self) -> Result<Sym, SymbolicError> {
        match self.advance() {
            Token::Num(s) => number(&s),
            Token::Letter(c) => {
                let mut name = c.to_string();
                if self.eat(&Token::Underscore) {
                    name.push('_');
                    name.push_str(&self.parse_subscript()?);
                }
                Ok(if name == "e" { Sym::Const(Constant::E) } else { Sym::Var(name) })
            }
            Token::LParen => self.parse_closed(Token::RParen, "')'"),
            Token::LBracket => self.parse_closed(Token::RBracket, "']'"),
            Token::LBrace => self.parse_closed(Token::RBrace, "'}'"),
            // `|` never starts an implicit product, so the inner expression
            // stops at the closing bar.
            Token::Pipe => {
                let inner = self.parse_additive()?;
                self.expect(&Token::Pipe, "closing '|'")?;
                Ok(Sym::Abs(Box::new(inner)))
            }
            Token::Command(name) => self.parse_command(&name),
            other => Err(SymbolicError::Parse(format!("unexpected {other:?}"))),
        }
    }

    fn parse_closed(&mut self, close: Token, what: &str) -> Result<Sym, SymbolicError> {
        let inner = self.parse_additive()?;
        self.expect(&close, what)?;
        Ok(inner)
    }

    /// Subscript text, kept verbatim as part of the symbol name.
    fn parse_subscript(&mut self) -> Result<String, SymbolicError> {
        if self.eat(&Token::LBrace) {
            let mut name = String::new();
            loop {
                match self.advance() {
                    Token::RBrace => return Ok(name),
                    Token::Num(s) => name.push_str(&s),
                    Token::Letter(c) => name.push(c),
                    other => {
                        return Err(SymbolicError::Parse(format!("bad subscript token {other:?}")));
                    }
                }
            }
        }
        match self.advance() {
            Token::Num(s) => {
                let mut chars = s.chars();
                let first = chars.next().map(String::from).unwrap_or_default();
                let rest: String = chars.collect();
                if !rest.is_empty() {
                    self.pos -= 1;
                    self.tokens[self.pos] = Token::Num(rest);
                }
                Ok(first)
            }
            Token::Letter(c) => Ok(c.to_string()),
            other => Err(SymbolicError::Parse(format!("bad subscript token {other:?}"))),
        }
    }

    fn parse_command(&mut self, name: &str) -> Result<Sym, SymbolicError> {
        match name {
            "frac" | "dfrac" | "tfrac" => {
                let num = self.parse_group_arg()?;
                let den = self.parse_group_arg()?;
                Ok(Sym::Div(Box::new(num), Box::new(den)))
            }
            "sqrt" => {
                let index = if self.eat(&Token::LBracket) {
                    let n = self.parse_additive()?;
                    self.expect(&Token::RBracket, "']'")?;
                    Some(n)
                } else {
                    None
                };
                let radicand = self.parse_group_arg()?;
                Ok(match index {
                    None => Sym::Func(Func::Sqrt, Box::new(radicand)),
                    Some(n) => Sym::Pow(
                        Box::new(radicand),
                        Box::new(Sym::Div(Box::new(Sym::Num(1.0)), Box::new(n))),
                    ),
                })
            }
            "pi" => Ok(Sym::Const(Constant::Pi)),
            g if GREEK.contains(&g) => Ok(Sym::Var(g.to_owned())),
            "infty" => Ok(Sym::Const(Constant::Infinity)),
            "mathrm" | "mathit" | "operatorname" | "mathbf" => self.parse_group_arg(),
            _ => match Func::from_command(name) {
                Some(func) => self.parse_function(func),
                None => Err(SymbolicError::Parse(format!("unsupported command \\{name}"))),
            },
        }
    }

    /// `\sin x`, `\sin(x)`, `\sin^2 x`.
    fn parse_function(&mut self, func: Func) -> Result<Sym, SymbolicError> {
        let power = if self.eat(&Token::Caret) { Some(self.parse_script_arg()?) } else { None };
        let arg = match self.peek() {
            Token::LParen | Token::LBrace | Token::LBracket => self.parse_primary()?,
            _ => self.parse_power()?,
        };
        let applied = Sym::Func(func, Box::new(arg));
        Ok(match power {
            Some(p) => Sym::Pow(Box::new(applied), Box::new(p)),
            None => applied,
        })
    }
}

fn number(s: &str) -> Result<Sym, SymbolicError> {
    s.parse::<f64>()
        .map(Sym::Num)
        .map_err(|_| SymbolicError::Parse(format!("bad number {s:?}")))
}

/// Parse a complete LaTeX math fragment.
pub fn parse(src: &str) -> Result<Sym, SymbolicError> {
    let tokens = Lexer::new(src).tokenize();
    if tokens.len() == 1 {
        return Err(SymbolicError::Parse("empty expression".into()));
    }
    let mut parser = Parser { tokens, pos: 0, depth: 0 };
    let expr = parser.parse_additive()?;
    match parser.peek() {
        Token::Eof => Ok(expr),
        other => Err(SymbolicError::Parse(format!("unexpected {other:?}"))),
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
