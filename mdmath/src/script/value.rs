//! Runtime values of the snippet language.
//!
//! Snippets are dynamically typed with Python-like rules: integers and
//! floats mix in arithmetic, strings concatenate and repeat, and `Expr`
//! values concatenate with anything as text.

use std::cmp::Ordering;
use std::fmt;

use crate::formula::Expr;

/// Longest string `*` repetition will build.
const MAX_STR_LEN: usize = 1 << 24;

// ── Errors ────────────────────────────────────────────────────────────────────

/// A snippet statement failed.  `Display` gives the message that ends up
/// inside `[Error: …]`.
#[derive(Debug, Clone, PartialEq)]
pub enum EvalError {
    Syntax(String),
    Name(String),
    Type(String),
    Attribute(String),
    ZeroDivision(String),
    Value(String),
}

impl EvalError {
    pub fn undefined(name: &str) -> Self {
        EvalError::Name(format!("name '{name}' is not defined"))
    }

    fn unsupported(op: &str, a: &Value, b: &Value) -> Self {
        EvalError::Type(format!(
            "unsupported operand type(s) for {op}: '{}' and '{}'",
            a.type_name(),
            b.type_name()
        ))
    }
}

impl fmt::Display for EvalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EvalError::Syntax(m)
            | EvalError::Name(m)
            | EvalError::Type(m)
            | EvalError::Attribute(m)
            | EvalError::ZeroDivision(m)
            | EvalError::Value(m) => f.write_str(m),
        }
    }
}

impl std::error::Error for EvalError {}

// ── Value ─────────────────────────────────────────────────────────────────────

/// A snippet runtime value.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    #[default]
    None,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    Expr(Expr),
    /// Result of `ReplaceThis(v)`: splice this text over the span.
    ReplaceThis(String),
    /// Result of `ReplaceAll(v)`: use this text for the whole block.
    ReplaceAll(String),
    /// A builtin function referenced by name.
    Builtin(&'static str),
}

/// Numeric view of a value; `bool` counts as an integer.
#[derive(Clone, Copy)]
enum Num {
    Int(i64),
    Float(f64),
}

impl Num {
    fn as_f64(self) -> f64 {
        match self {
            Num::Int(n) => n as f64,
            Num::Float(x) => x,
        }
    }
}

/// Python's `repr()` for floats: shortest round-trip digits, `.0` for
/// integral values, exponent form outside `[1e-4, 1e16)`.
pub fn float_repr(x: f64) -> String {
    if x.is_nan() {
        return "nan".to_owned();
    }
    if x.is_infinite() {
        return if x > 0.0 { "inf".to_owned() } else { "-inf".to_owned() };
    }
    let abs = x.abs();
    if abs != 0.0 && !(1e-4..1e16).contains(&abs) {
        let s = format!("{x:e}");
        return match s.split_once('e') {
            Some((mantissa, exp)) => {
                let exp: i32 = exp.parse().unwrap_or(0);
                let sign = if exp < 0 { '-' } else { '+' };
                format!("{mantissa}e{sign}{:02}", exp.abs())
            }
            None => s,
        };
    }
    if x == x.trunc() {
        format!("{x:.1}")
    } else {
        format!("{x}")
    }
}

fn str_repr(s: &str) -> String {
    let quote = if s.contains('\'') && !s.contains('"') { '"' } else { '\'' };
    let mut out = String::with_capacity(s.len() + 2);
    out.push(quote);
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            '\r' => out.push_str("\\r"),
            c if c == quote => {
                out.push('\\');
                out.push(c);
            }
            c => out.push(c),
        }
    }
    out.push(quote);
    out
}

/// `str()` of a value.
impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::None => f.write_str("None"),
            Value::Bool(true) => f.write_str("True"),
            Value::Bool(false) => f.write_str("False"),
            Value::Int(n) => write!(f, "{n}"),
            Value::Float(x) => f.write_str(&float_repr(*x)),
            Value::Str(s) => f.write_str(s),
            Value::Expr(e) => f.write_str(e.latex()),
            Value::ReplaceThis(s) => write!(f, "ReplaceThis({})", str_repr(s)),
            Value::ReplaceAll(s) => write!(f, "ReplaceAll({})", str_repr(s)),
            Value::Builtin(name) => write!(f, "<built-in function {name}>"),
        }
    }
}

impl Value {
    /// `repr()` of a value.
    pub fn repr(&self) -> String {
        match self {
            Value::Str(s) => str_repr(s),
            other => other.to_string(),
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::None => "NoneType",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Str(_) => "str",
            Value::Expr(_) => "Expr",
            Value::ReplaceThis(_) => "ReplaceThis",
            Value::ReplaceAll(_) => "ReplaceAll",
            Value::Builtin(_) => "builtin_function_or_method",
        }
    }

    pub fn truthy(&self) -> bool {
        match self {
            Value::None => false,
            Value::Bool(b) => *b,
            Value::Int(n) => *n != 0,
            Value::Float(x) => *x != 0.0,
            Value::Str(s) => !s.is_empty(),
            _ => true,
        }
    }

    fn as_num(&self) -> Option<Num> {
        match self {
            Value::Bool(b) => Some(Num::Int(i64::from(*b))),
            Value::Int(n) => Some(Num::Int(*n)),
            Value::Float(x) => Some(Num::Float(*x)),
            _ => None,
        }
    }

    /// Numeric value as `f64`, for builtins that accept any number.
    pub fn as_f64(&self) -> Option<f64> {
        self.as_num().map(Num::as_f64)
    }

    // ── Arithmetic helpers ────────────────────────────────────────────────────

    pub fn arith_add(&self, rhs: &Value) -> Result<Value, EvalError> {
        match (self, rhs) {
            (Value::Expr(e), other) => Ok(Value::Str(format!("{}{other}", e.latex()))),
            (other, Value::Expr(e)) => Ok(Value::Str(format!("{other}{}", e.latex()))),
            (Value::Str(a), Value::Str(b)) => Ok(Value::Str(format!("{a}{b}"))),
            _ => match (self.as_num(), rhs.as_num()) {
                (Some(Num::Int(a)), Some(Num::Int(b))) => checked(a.checked_add(b)),
                (Some(a), Some(b)) => Ok(Value::Float(a.as_f64() + b.as_f64())),
                _ => Err(EvalError::unsupported("+", self, rhs)),
            },
        }
    }

    pub fn arith_sub(&self, rhs: &Value) -> Result<Value, EvalError> {
        match (self.as_num(), rhs.as_num()) {
            (Some(Num::Int(a)), Some(Num::Int(b))) => checked(a.checked_sub(b)),
            (Some(a), Some(b)) => Ok(Value::Float(a.as_f64() - b.as_f64())),
            _ => Err(EvalError::unsupported("-", self, rhs)),
        }
    }

    pub fn arith_mul(&self, rhs: &Value) -> Result<Value, EvalError> {
        match (self, rhs) {
            (Value::Str(s), n) | (n, Value::Str(s)) if matches!(n.as_num(), Some(Num::Int(_))) => {
                let times = match n.as_num() {
                    Some(Num::Int(k)) => usize::try_from(k).unwrap_or(0),
                    _ => 0,
                };
                match s.len().checked_mul(times) {
                    Some(len) if len <= MAX_STR_LEN => Ok(Value::Str(s.repeat(times))),
                    _ => Err(EvalError::Value("repeated string is too long".into())),
                }
            }
            _ => match (self.as_num(), rhs.as_num()) {
                (Some(Num::Int(a)), Some(Num::Int(b))) => checked(a.checked_mul(b)),
                (Some(a), Some(b)) => Ok(Value::Float(a.as_f64() * b.as_f64())),
                _ => Err(EvalError::unsupported("*", self, rhs)),
            },
        }
    }

    /// True division; always a float.
    pub fn arith_div(&self, rhs: &Value) -> Result<Value, EvalError> {
        match (self.as_num(), rhs.as_num()) {
            (Some(a), Some(b)) => {
                if b.as_f64() == 0.0 {
                    return Err(EvalError::ZeroDivision("division by zero".into()));
                }
                Ok(Value::Float(a.as_f64() / b.as_f64()))
            }
            _ => Err(EvalError::unsupported("/", self, rhs)),
        }
    }

    pub fn arith_floordiv(&self, rhs: &Value) -> Result<Value, EvalError> {
        match (self.as_num(), rhs.as_num()) {
            (Some(Num::Int(a)), Some(Num::Int(b))) => {
                if b == 0 {
                    return Err(EvalError::ZeroDivision(
                        "integer division or modulo by zero".into(),
                    ));
                }
                let q = checked_value(a.checked_div(b))?;
                let adjust = a % b != 0 && ((a < 0) != (b < 0));
                Ok(Value::Int(if adjust { q - 1 } else { q }))
            }
            (Some(a), Some(b)) => {
                let (a, b) = (a.as_f64(), b.as_f64());
                if b == 0.0 {
                    return Err(EvalError::ZeroDivision("float floor division by zero".into()));
                }
                Ok(Value::Float((a / b).floor()))
            }
            _ => Err(EvalError::unsupported("//", self, rhs)),
        }
    }

    /// Remainder with the sign of the divisor.
    pub fn arith_rem(&self, rhs: &Value) -> Result<Value, EvalError> {
        match (self.as_num(), rhs.as_num()) {
            (Some(Num::Int(a)), Some(Num::Int(b))) => {
                if b == 0 {
                    return Err(EvalError::ZeroDivision("integer modulo by zero".into()));
                }
                let r = checked_value(a.checked_rem(b))?;
                Ok(Value::Int(if r != 0 && ((r < 0) != (b < 0)) { r + b } else { r }))
            }
            (Some(a), Some(b)) => {
                let (a, b) = (a.as_f64(), b.as_f64());
                if b == 0.0 {
                    return Err(EvalError::ZeroDivision("float modulo".into()));
                }
                let r = a % b;
                Ok(Value::Float(if r != 0.0 && ((r < 0.0) != (b < 0.0)) { r + b } else { r }))
            }
            _ => Err(EvalError::unsupported("%", self, rhs)),
        }
    }

    pub fn arith_pow(&self, rhs: &Value) -> Result<Value, EvalError> {
        match (self.as_num(), rhs.as_num()) {
            (Some(Num::Int(a)), Some(Num::Int(b))) if b >= 0 => {
                let exp = u32::try_from(b)
                    .map_err(|_| EvalError::Value("exponent too large".into()))?;
                checked(a.checked_pow(exp))
            }
            (Some(a), Some(b)) => {
                let (a, b) = (a.as_f64(), b.as_f64());
                if a == 0.0 && b < 0.0 {
                    return Err(EvalError::ZeroDivision(
                        "0.0 cannot be raised to a negative power".into(),
                    ));
                }
                if a < 0.0 && b != b.trunc() {
                    return Err(EvalError::Value("complex results are not supported".into()));
                }
                Ok(Value::Float(a.powf(b)))
            }
            _ => Err(EvalError::unsupported("**", self, rhs)),
        }
    }

    pub fn arith_neg(&self) -> Result<Value, EvalError> {
        match self.as_num() {
            Some(Num::Int(n)) => checked(n.checked_neg()),
            Some(Num::Float(x)) => Ok(Value::Float(-x)),
            None => Err(EvalError::Type(format!(
                "bad operand type for unary -: '{}'",
                self.type_name()
            ))),
        }
    }

    pub fn arith_pos(&self) -> Result<Value, EvalError> {
        match self.as_num() {
            Some(Num::Int(n)) => Ok(Value::Int(n)),
            Some(Num::Float(x)) => Ok(Value::Float(x)),
            None => Err(EvalError::Type(format!(
                "bad operand type for unary +: '{}'",
                self.type_name()
            ))),
        }
    }

    /// `==`: numbers compare by value across int/float, other types only
    /// equal their own kind.
    pub fn py_eq(&self, rhs: &Value) -> bool {
        match (self.as_num(), rhs.as_num()) {
            (Some(Num::Int(a)), Some(Num::Int(b))) => a == b,
            (Some(a), Some(b)) => a.as_f64() == b.as_f64(),
            _ => self == rhs,
        }
    }

    /// Ordering for `< <= > >=`.
    pub fn py_cmp(&self, rhs: &Value, op: &str) -> Result<Ordering, EvalError> {
        match (self, rhs) {
            (Value::Str(a), Value::Str(b)) => Ok(a.cmp(b)),
            _ => match (self.as_num(), rhs.as_num()) {
                (Some(Num::Int(a)), Some(Num::Int(b))) => Ok(a.cmp(&b)),
                (Some(a), Some(b)) => a
                    .as_f64()
                    .partial_cmp(&b.as_f64())
                    .ok_or_else(|| EvalError::Value("cannot order nan".into())),
                _ => Err(EvalError::Type(format!(
                    "'{op}' not supported between instances of '{}' and '{}'",
                    self.type_name(),
                    rhs.type_name()
                ))),
            },
        }
    }
}

fn checked_value(n: Option<i64>) -> Result<i64, EvalError> {
    n.ok_or_else(|| EvalError::Value("integer overflow".into()))
}

fn checked(n: Option<i64>) -> Result<Value, EvalError> {
    checked_value(n).map(Value::Int)
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Int(n)
    }
}

impl From<f64> for Value {
    fn from(x: f64) -> Self {
        Value::Float(x)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_owned())
    }
}

impl From<Expr> for Value {
    fn from(e: Expr) -> Self {
        Value::Expr(e)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
