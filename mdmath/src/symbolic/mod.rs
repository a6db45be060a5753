//! Symbolic math service.
//!
//! The engine only needs three things from a computer-algebra backend:
//! turn LaTeX into a [`Sym`] tree, reduce a tree to a number, and solve a
//! tree (read as `tree = 0`) for one unknown.  [`Symbolic`] is that seam;
//! [`Builtin`] is the in-crate implementation used by default.

pub mod latex;
pub mod solve;

use std::fmt;

use crate::format::{format_number, DEFAULT_PRECISION};

// ── Errors ────────────────────────────────────────────────────────────────────

/// Failure reported by a [`Symbolic`] backend.
#[derive(Debug, Clone, PartialEq)]
pub enum SymbolicError {
    /// The LaTeX could not be parsed.
    Parse(String),
    /// The tree has no real numeric value (free symbols, domain errors).
    Evaluate(String),
    /// The equation is outside what the solver handles.
    Solve(String),
}

impl fmt::Display for SymbolicError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SymbolicError::Parse(m) => write!(f, "cannot parse LaTeX: {m}"),
            SymbolicError::Evaluate(m) => write!(f, "cannot evaluate: {m}"),
            SymbolicError::Solve(m) => write!(f, "cannot solve: {m}"),
        }
    }
}

impl std::error::Error for SymbolicError {}

// ── Expression tree ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Constant {
    Pi,
    E,
    Infinity,
    I,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Func {
    Sin,
    Cos,
    Tan,
    Asin,
    Acos,
    Atan,
    Sinh,
    Cosh,
    Tanh,
    Ln,
    Log,
    Exp,
    Sqrt,
}

impl Func {
    pub fn from_command(name: &str) -> Option<Func> {
        Some(match name {
            "sin" => Func::Sin,
            "cos" => Func::Cos,
            "tan" => Func::Tan,
            "arcsin" => Func::Asin,
            "arccos" => Func::Acos,
            "arctan" => Func::Atan,
            "sinh" => Func::Sinh,
            "cosh" => Func::Cosh,
            "tanh" => Func::Tanh,
            "ln" => Func::Ln,
            "log" => Func::Log,
            "exp" => Func::Exp,
            _ => return None,
        })
    }

    fn name(self) -> &'static str {
        match self {
            Func::Sin => "sin",
            Func::Cos => "cos",
            Func::Tan => "tan",
            Func::Asin => "asin",
            Func::Acos => "acos",
            Func::Atan => "atan",
            Func::Sinh => "sinh",
            Func::Cosh => "cosh",
            Func::Tanh => "tanh",
            Func::Ln | Func::Log => "log",
            Func::Exp => "exp",
            Func::Sqrt => "sqrt",
        }
    }

    fn apply(self, x: f64) -> f64 {
        match self {
            Func::Sin => x.sin(),
            Func::Cos => x.cos(),
            Func::Tan => x.tan(),
            Func::Asin => x.asin(),
            Func::Acos => x.acos(),
            Func::Atan => x.atan(),
            Func::Sinh => x.sinh(),
            Func::Cosh => x.cosh(),
            Func::Tanh => x.tanh(),
            // `\log` is the natural logarithm, as in most CAS front ends.
            Func::Ln | Func::Log => x.ln(),
            Func::Exp => x.exp(),
            Func::Sqrt => x.sqrt(),
        }
    }
}

/// A parsed symbolic expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Sym {
    Num(f64),
    Var(String),
    Const(Constant),
    Neg(Box<Sym>),
    Add(Box<Sym>, Box<Sym>),
    Sub(Box<Sym>, Box<Sym>),
    Mul(Box<Sym>, Box<Sym>),
    Div(Box<Sym>, Box<Sym>),
    Pow(Box<Sym>, Box<Sym>),
    Func(Func, Box<Sym>),
    Abs(Box<Sym>),
    Factorial(Box<Sym>),
}

impl Sym {
    pub fn var(name: impl Into<String>) -> Sym {
        Sym::Var(name.into())
    }

    /// `true` if `name` occurs anywhere in the tree.
    pub fn contains_var(&self, name: &str) -> bool {
        match self {
            Sym::Var(v) => v == name,
            Sym::Num(_) | Sym::Const(_) => false,
            Sym::Neg(a) | Sym::Func(_, a) | Sym::Abs(a) | Sym::Factorial(a) => {
                a.contains_var(name)
            }
            Sym::Add(a, b) | Sym::Sub(a, b) | Sym::Mul(a, b) | Sym::Div(a, b) | Sym::Pow(a, b) => {
                a.contains_var(name) || b.contains_var(name)
            }
        }
    }

    /// Reduce to a real number.  Fails on free symbols and on results that
    /// are not real (`\sqrt{-1}`, `\frac{1}{0}`).
    pub fn eval(&self) -> Result<f64, SymbolicError> {
        let v = match self {
            Sym::Num(n) => *n,
            Sym::Var(v) => {
                return Err(SymbolicError::Evaluate(format!("free symbol {v}")));
            }
            Sym::Const(Constant::Pi) => std::f64::consts::PI,
            Sym::Const(Constant::E) => std::f64::consts::E,
            Sym::Const(Constant::Infinity) => f64::INFINITY,
            Sym::Const(Constant::I) => {
                return Err(SymbolicError::Evaluate("imaginary unit".into()));
            }
            Sym::Neg(a) => -a.eval()?,
            Sym::Add(a, b) => a.eval()? + b.eval()?,
            Sym::Sub(a, b) => a.eval()? - b.eval()?,
            Sym::Mul(a, b) => a.eval()? * b.eval()?,
            Sym::Div(a, b) => {
                let d = b.eval()?;
                if d == 0.0 {
                    return Err(SymbolicError::Evaluate("division by zero".into()));
                }
                a.eval()? / d
            }
            Sym::Pow(a, b) => a.eval()?.powf(b.eval()?),
            Sym::Func(f, a) => f.apply(a.eval()?),
            Sym::Abs(a) => a.eval()?.abs(),
            Sym::Factorial(a) => factorial(a.eval()?)?,
        };
        if v.is_nan() {
            return Err(SymbolicError::Evaluate(format!("{self} is not a real number")));
        }
        Ok(v)
    }

    fn precedence(&self) -> u8 {
        match self {
            Sym::Add(..) | Sym::Sub(..) => 1,
            Sym::Mul(..) | Sym::Div(..) | Sym::Neg(_) => 2,
            Sym::Pow(..) => 3,
            Sym::Num(n) if *n < 0.0 => 2,
            _ => 4,
        }
    }

    fn write_child(&self, f: &mut fmt::Formatter<'_>, min: u8) -> fmt::Result {
        if self.precedence() < min {
            write!(f, "({self})")
        } else {
            write!(f, "{self}")
        }
    }
}

fn factorial(n: f64) -> Result<f64, SymbolicError> {
    if !n.is_finite() || n < 0.0 || n != n.trunc() || n > 170.0 {
        return Err(SymbolicError::Evaluate(format!("factorial of {n}")));
    }
    Ok((1..=n as u64).fold(1.0, |acc, k| acc * k as f64))
}

/// Prints in the plain `a*b**2 + c` style CAS tools use for results.
impl fmt::Display for Sym {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Sym::Num(n) => f.write_str(&format_number(*n, DEFAULT_PRECISION)),
            Sym::Var(v) => f.write_str(v),
            Sym::Const(c) => f.write_str(match c {
                Constant::Pi => "pi",
                Constant::E => "E",
                Constant::Infinity => "oo",
                Constant::I => "I",
            }),
            Sym::Neg(a) => {
                f.write_str("-")?;
                a.write_child(f, 3)
            }
            Sym::Add(a, b) => {
                a.write_child(f, 1)?;
                f.write_str(" + ")?;
                b.write_child(f, 1)
            }
            Sym::Sub(a, b) => {
                a.write_child(f, 1)?;
                f.write_str(" - ")?;
                b.write_child(f, 2)
            }
            Sym::Mul(a, b) => {
                a.write_child(f, 2)?;
                f.write_str("*")?;
                b.write_child(f, 3)
            }
            Sym::Div(a, b) => {
                a.write_child(f, 2)?;
                f.write_str("/")?;
                b.write_child(f, 3)
            }
            Sym::Pow(a, b) => {
                a.write_child(f, 4)?;
                f.write_str("**")?;
                b.write_child(f, 3)
            }
            Sym::Func(func, a) => write!(f, "{}({a})", func.name()),
            Sym::Abs(a) => write!(f, "Abs({a})"),
            Sym::Factorial(a) => write!(f, "factorial({a})"),
        }
    }
}

// ── Service trait ─────────────────────────────────────────────────────────────

/// Computer-algebra backend used by `Expr` evaluation and solving.
pub trait Symbolic {
    /// Parse a LaTeX fragment.
    fn parse_latex(&self, src: &str) -> Result<Sym, SymbolicError>;

    /// Numeric value of a parsed expression.
    fn evaluate(&self, expr: &Sym) -> Result<f64, SymbolicError>;

    /// Solutions of `expr = 0` for `symbol`, in presentation order.
    fn solve(&self, expr: &Sym, symbol: &str) -> Result<Vec<Sym>, SymbolicError>;
}

/// The in-crate backend: [`latex`] parser, `f64` evaluation, and the
/// polynomial solver in [`solve`].
#[derive(Debug, Default, Clone, Copy)]
pub struct Builtin;

impl Symbolic for Builtin {
    fn parse_latex(&self, src: &str) -> Result<Sym, SymbolicError> {
        latex::parse(src)
    }

    fn evaluate(&self, expr: &Sym) -> Result<f64, SymbolicError> {
        expr.eval()
    }

    fn solve(&self, expr: &Sym, symbol: &str) -> Result<Vec<Sym>, SymbolicError> {
        solve::solve(expr, symbol)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn b(s: Sym) -> Box<Sym> {
        Box::new(s)
    }

    #[test]
    fn eval_arithmetic() {
        let e = Sym::Add(b(Sym::Num(1.0)), b(Sym::Mul(b(Sym::Num(2.0)), b(Sym::Num(3.0)))));
        assert_eq!(e.eval(), Ok(7.0));
    }

    #[test]
    fn eval_free_symbol_fails() {
        let e = Sym::Add(b(Sym::var("x")), b(Sym::Num(1.0)));
        assert!(matches!(e.eval(), Err(SymbolicError::Evaluate(_))));
    }

    #[test]
    fn eval_division_by_zero_fails() {
        let e = Sym::Div(b(Sym::Num(1.0)), b(Sym::Num(0.0)));
        assert!(e.eval().is_err());
    }

    #[test]
    fn eval_domain_error_fails() {
        let e = Sym::Func(Func::Sqrt, b(Sym::Num(-1.0)));
        assert!(e.eval().is_err());
    }

    #[test]
    fn factorials() {
        assert_eq!(Sym::Factorial(b(Sym::Num(5.0))).eval(), Ok(120.0));
        assert_eq!(Sym::Factorial(b(Sym::Num(0.0))).eval(), Ok(1.0));
        assert!(Sym::Factorial(b(Sym::Num(2.5))).eval().is_err());
        assert!(Sym::Factorial(b(Sym::Num(171.0))).eval().is_err());
        assert!(factorial(f64::NAN).is_err());
        assert!(factorial(f64::INFINITY).is_err());
        assert!(factorial(f64::NEG_INFINITY).is_err());
    }

    #[test]
    fn display() {
        let e = Sym::Sub(
            b(Sym::Mul(b(Sym::Num(2.0)), b(Sym::Pow(b(Sym::var("x")), b(Sym::Num(2.0)))))),
            b(Sym::Add(b(Sym::var("y")), b(Sym::Num(0.5)))),
        );
        assert_eq!(e.to_string(), "2*x**2 - (y + 0.5)");
        assert_eq!(Sym::Func(Func::Sqrt, b(Sym::Num(2.0))).to_string(), "sqrt(2)");
        assert_eq!(Sym::Neg(b(Sym::Const(Constant::I))).to_string(), "-I");
    }

    #[test]
    fn contains_var() {
        let e = Sym::Func(Func::Sin, b(Sym::Mul(b(Sym::Num(2.0)), b(Sym::var("t")))));
        assert!(e.contains_var("t"));
        assert!(!e.contains_var("x"));
    }
}
