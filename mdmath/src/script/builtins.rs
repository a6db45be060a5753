//! Built-in snippet functions and `Expr` methods.
//!
//! Functions receive already-evaluated arguments.  Calls that replace their
//! receiver (`e.bind(…)`, `e(x=…)`) report the new value in
//! [`CallResult::receiver`] so the evaluator can reassign the name.

use super::expr::EvalContext;
use super::value::{EvalError, Value};
use crate::format::{format_number, format_text};
use crate::formula::Expr;

/// Names resolvable as builtins when the working scope lacks them.
pub const BUILTINS: &[&str] = &[
    "ReplaceThis",
    "ReplaceAll",
    "str",
    "repr",
    "abs",
    "float",
    "int",
    "round",
    "len",
    "min",
    "max",
    "fmt",
    "Expr",
];

/// Outcome of a call.
#[derive(Debug, Clone, PartialEq)]
pub struct CallResult {
    pub value: Value,
    /// New value for the receiver, when the call rebinds it.
    pub receiver: Option<Value>,
}

impl CallResult {
    fn value(value: Value) -> Self {
        CallResult { value, receiver: None }
    }
}

pub fn lookup(name: &str) -> Option<&'static str> {
    BUILTINS.iter().copied().find(|b| *b == name)
}

/// Dispatch a built-in function call.
///
/// Returns `None` if `name` is not a builtin.
pub fn call_builtin(
    name: &str,
    args: Vec<Value>,
    precision: usize,
) -> Option<Result<Value, EvalError>> {
    fn inner(name: &str, args: Vec<Value>, precision: usize) -> Result<Option<Value>, EvalError> {
        Ok(Some(match name {
            // ── Outcome constructors ─────────────────────────────────────────
            "ReplaceThis" => {
                arity(name, &args, 1, 1)?;
                Value::ReplaceThis(args[0].to_string())
            }
            "ReplaceAll" => {
                arity(name, &args, 1, 1)?;
                Value::ReplaceAll(args[0].to_string())
            }

            // ── Conversions ──────────────────────────────────────────────────
            "str" => {
                arity(name, &args, 0, 1)?;
                Value::Str(args.first().map(Value::to_string).unwrap_or_default())
            }
            "repr" => {
                arity(name, &args, 1, 1)?;
                Value::Str(args[0].repr())
            }
            "float" => {
                arity(name, &args, 0, 1)?;
                match args.first() {
                    None => Value::Float(0.0),
                    Some(Value::Str(s)) => Value::Float(s.trim().parse().map_err(|_| {
                        EvalError::Value(format!("could not convert string to float: '{s}'"))
                    })?),
                    Some(v) => Value::Float(v.as_f64().ok_or_else(|| {
                        EvalError::Type(format!(
                            "float() argument must be a string or a real number, not '{}'",
                            v.type_name()
                        ))
                    })?),
                }
            }
            "int" => {
                arity(name, &args, 0, 1)?;
                match args.first() {
                    None => Value::Int(0),
                    Some(Value::Int(n)) => Value::Int(*n),
                    Some(Value::Bool(b)) => Value::Int(i64::from(*b)),
                    Some(Value::Float(x)) => Value::Int(float_to_int(*x)?),
                    Some(Value::Str(s)) => Value::Int(s.trim().parse().map_err(|_| {
                        EvalError::Value(format!("invalid literal for int() with base 10: '{s}'"))
                    })?),
                    Some(v) => {
                        return Err(EvalError::Type(format!(
                            "int() argument must be a string or a real number, not '{}'",
                            v.type_name()
                        )))
                    }
                }
            }
            "Expr" => {
                arity(name, &args, 0, 1)?;
                Value::Expr(Expr::new(args.first().map(Value::to_string).unwrap_or_default()))
            }
            "fmt" => {
                arity(name, &args, 1, 1)?;
                Value::Str(match &args[0] {
                    Value::Str(s) => format_text(s, precision),
                    v => match v.as_f64() {
                        Some(x) => format_number(x, precision),
                        None => v.to_string(),
                    },
                })
            }

            // ── Math ─────────────────────────────────────────────────────────
            "abs" => {
                arity(name, &args, 1, 1)?;
                match &args[0] {
                    Value::Int(n) => Value::Int(
                        n.checked_abs()
                            .ok_or_else(|| EvalError::Value("integer overflow".into()))?,
                    ),
                    Value::Bool(b) => Value::Int(i64::from(*b)),
                    Value::Float(x) => Value::Float(x.abs()),
                    v => {
                        return Err(EvalError::Type(format!(
                            "bad operand type for abs(): '{}'",
                            v.type_name()
                        )))
                    }
                }
            }
            "round" => {
                arity(name, &args, 1, 2)?;
                let ndigits = match args.get(1) {
                    None | Some(Value::None) => None,
                    Some(Value::Int(n)) => Some(*n),
                    Some(v) => {
                        return Err(EvalError::Type(format!(
                            "'{}' object cannot be interpreted as an integer",
                            v.type_name()
                        )))
                    }
                };
                round(&args[0], ndigits)?
            }
            "min" | "max" => {
                if args.is_empty() {
                    return Err(EvalError::Type(format!(
                        "{name} expected at least 1 argument, got 0"
                    )));
                }
                if args.len() == 1 {
                    return Err(EvalError::Type(format!(
                        "'{}' object is not iterable",
                        args[0].type_name()
                    )));
                }
                let want = if name == "min" {
                    std::cmp::Ordering::Less
                } else {
                    std::cmp::Ordering::Greater
                };
                let op = if name == "min" { "<" } else { ">" };
                let mut iter = args.into_iter();
                let mut best = iter.next().unwrap_or_default();
                for v in iter {
                    if v.py_cmp(&best, op)? == want {
                        best = v;
                    }
                }
                best
            }

            // ── Strings ──────────────────────────────────────────────────────
            "len" => {
                arity(name, &args, 1, 1)?;
                match &args[0] {
                    Value::Str(s) => Value::Int(s.chars().count() as i64),
                    v => {
                        return Err(EvalError::Type(format!(
                            "object of type '{}' has no len()",
                            v.type_name()
                        )))
                    }
                }
            }

            _ => return Ok(None),
        }))
    }

    inner(name, args, precision).transpose()
}

/// Call a value: a builtin or an `Expr` (evaluation).
pub fn call_value(
    f: &Value,
    args: Vec<Value>,
    kwargs: Vec<(String, Value)>,
    ctx: &dyn EvalContext,
) -> Result<CallResult, EvalError> {
    match f {
        Value::Builtin(name) => {
            if let Some((k, _)) = kwargs.first() {
                return Err(EvalError::Type(format!(
                    "{name}() got an unexpected keyword argument '{k}'"
                )));
            }
            call_builtin(name, args, ctx.precision())
                .unwrap_or_else(|| Err(EvalError::undefined(name)))
                .map(CallResult::value)
        }
        Value::Expr(e) => call_expr(e, args, kwargs, ctx),
        other => Err(EvalError::Type(format!(
            "'{}' object is not callable",
            other.type_name()
        ))),
    }
}

/// `e()` evaluates; `e(x=…)` binds first and rebinds the receiver.
fn call_expr(
    e: &Expr,
    args: Vec<Value>,
    kwargs: Vec<(String, Value)>,
    ctx: &dyn EvalContext,
) -> Result<CallResult, EvalError> {
    if !args.is_empty() {
        return Err(EvalError::Type(format!(
            "Expr call takes only keyword arguments ({} positional given)",
            args.len()
        )));
    }
    if kwargs.is_empty() {
        return Ok(CallResult::value(Value::Str(
            e.evaluate(ctx.symbolic(), ctx.precision()),
        )));
    }
    let bound = bind(e, kwargs, ctx.precision());
    Ok(CallResult {
        value: Value::Str(bound.evaluate(ctx.symbolic(), ctx.precision())),
        receiver: Some(Value::Expr(bound)),
    })
}

/// `recv.method(…)`.
pub fn call_method(
    recv: &Value,
    method: &str,
    args: Vec<Value>,
    kwargs: Vec<(String, Value)>,
    ctx: &dyn EvalContext,
) -> Result<CallResult, EvalError> {
    let Value::Expr(e) = recv else {
        let attr = get_attr(recv, method)?;
        return call_value(&attr, args, kwargs, ctx);
    };
    match method {
        "bind" => {
            if !args.is_empty() {
                return Err(EvalError::Type("bind() takes only keyword arguments".into()));
            }
            let bound = Value::Expr(bind(e, kwargs, ctx.precision()));
            Ok(CallResult { value: bound.clone(), receiver: Some(bound) })
        }
        "unbind" => {
            if let Some((k, _)) = kwargs.first() {
                return Err(EvalError::Type(format!(
                    "unbind() got an unexpected keyword argument '{k}'"
                )));
            }
            let names: Vec<String> = args.iter().map(Value::to_string).collect();
            Ok(CallResult::value(Value::Expr(e.unbind_names(&names))))
        }
        "solve" => {
            let mut name = args.into_iter().next();
            for (k, v) in kwargs {
                if k != "var_name" || name.is_some() {
                    return Err(EvalError::Type(format!(
                        "solve() got an unexpected keyword argument '{k}'"
                    )));
                }
                name = Some(v);
            }
            let name = name.ok_or_else(|| {
                EvalError::Type("solve() missing 1 required positional argument: 'var_name'".into())
            })?;
            Ok(CallResult::value(Value::Str(e.solve(&name.to_string(), ctx.symbolic()))))
        }
        _ => {
            let attr = get_attr(recv, method)?;
            call_value(&attr, args, kwargs, ctx)
        }
    }
}

/// Attribute access without a call.
pub fn get_attr(v: &Value, attr: &str) -> Result<Value, EvalError> {
    match (v, attr) {
        (Value::Expr(e), "latex") => Ok(Value::Str(e.latex().to_owned())),
        (Value::Expr(e), "original") => Ok(Value::Str(e.original().to_owned())),
        (Value::Expr(_), "bind" | "unbind" | "solve") => Err(EvalError::Type(format!(
            "Expr.{attr} can only be called, not referenced"
        ))),
        (Value::ReplaceThis(s) | Value::ReplaceAll(s), "value") => Ok(Value::Str(s.clone())),
        _ => Err(EvalError::Attribute(format!(
            "'{}' object has no attribute '{attr}'",
            v.type_name()
        ))),
    }
}

fn bind(e: &Expr, kwargs: Vec<(String, Value)>, precision: usize) -> Expr {
    e.bind(kwargs.into_iter().map(|(k, v)| (k, bind_text(&v, precision))))
}

/// Text substituted for a placeholder: floats follow the numeric display
/// rule, everything else its `str()`.
fn bind_text(v: &Value, precision: usize) -> String {
    match v {
        Value::Float(x) => format_number(*x, precision),
        other => other.to_string(),
    }
}

fn float_to_int(x: f64) -> Result<i64, EvalError> {
    if x.is_nan() {
        return Err(EvalError::Value("cannot convert float NaN to integer".into()));
    }
    if x.is_infinite() || x.trunc().abs() >= 9.2e18 {
        return Err(EvalError::Value("cannot convert float infinity to integer".into()));
    }
    Ok(x.trunc() as i64)
}

/// Python's `round`: ties go to the even neighbour.
fn round(v: &Value, ndigits: Option<i64>) -> Result<Value, EvalError> {
    match (v, ndigits) {
        (Value::Int(n), _) => Ok(Value::Int(*n)),
        (Value::Bool(b), _) => Ok(Value::Int(i64::from(*b))),
        (Value::Float(x), None) => Ok(Value::Int(float_to_int(x.round_ties_even())?)),
        (Value::Float(x), Some(n)) => {
            let n = n.clamp(-308, 308) as i32;
            let scale = 10f64.powi(n);
            Ok(Value::Float((x * scale).round_ties_even() / scale))
        }
        (v, _) => Err(EvalError::Type(format!(
            "type {} doesn't define __round__ method",
            v.type_name()
        ))),
    }
}

fn arity(name: &str, args: &[Value], min: usize, max: usize) -> Result<(), EvalError> {
    let got = args.len();
    if got < min || got > max {
        let expected = if min == max {
            format!("exactly {min}")
        } else if got < min {
            format!("at least {min}")
        } else {
            format!("at most {max}")
        };
        let plural = if (if got < min { min } else { max }) == 1 { "" } else { "s" };
        return Err(EvalError::Type(format!(
            "{name}() takes {expected} argument{plural} ({got} given)"
        )));
    }
    Ok(())
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::DEFAULT_PRECISION;
    use crate::symbolic::{Builtin, Symbolic};

    struct Ctx;

    impl EvalContext for Ctx {
        fn get_var(&self, _name: &str) -> Option<Value> {
            None
        }
        fn rebind(&mut self, _name: &str, _value: Value) {}
        fn symbolic(&self) -> &dyn Symbolic {
            &Builtin
        }
        fn precision(&self) -> usize {
            DEFAULT_PRECISION
        }
    }

    fn call(name: &str, args: Vec<Value>) -> Result<Value, EvalError> {
        call_builtin(name, args, DEFAULT_PRECISION).expect("not a builtin")
    }

    fn s(v: &str) -> Value {
        Value::Str(v.into())
    }

    #[test]
    fn unknown_name_is_none() {
        assert!(call_builtin("nope", vec![], DEFAULT_PRECISION).is_none());
        assert_eq!(lookup("fmt"), Some("fmt"));
        assert_eq!(lookup("eval"), None);
    }

    #[test]
    fn outcome_constructors_stringify() {
        assert_eq!(call("ReplaceThis", vec![s("hello")]), Ok(Value::ReplaceThis("hello".into())));
        assert_eq!(call("ReplaceThis", vec![Value::Int(42)]), Ok(Value::ReplaceThis("42".into())));
        assert_eq!(
            call("ReplaceAll", vec![Value::Float(2.75)]),
            Ok(Value::ReplaceAll("2.75".into()))
        );
        assert!(call("ReplaceAll", vec![]).is_err());
    }

    #[test]
    fn conversions() {
        assert_eq!(call("str", vec![Value::Expr(Expr::new("1+2"))]), Ok(s("1+2")));
        assert_eq!(call("str", vec![]), Ok(s("")));
        assert_eq!(call("repr", vec![s("x")]), Ok(s("'x'")));
        assert_eq!(call("float", vec![s(" 2.5 ")]), Ok(Value::Float(2.5)));
        assert_eq!(call("int", vec![Value::Float(-3.9)]), Ok(Value::Int(-3)));
        assert_eq!(call("int", vec![s("12")]), Ok(Value::Int(12)));
        assert!(call("int", vec![s("1.5")]).is_err());
        assert!(call("float", vec![s("abc")]).is_err());
    }

    #[test]
    fn fmt_rule() {
        assert_eq!(call("fmt", vec![Value::Float(2.5)]), Ok(s("2.5")));
        assert_eq!(call("fmt", vec![Value::Float(5.0)]), Ok(s("5")));
        assert_eq!(call("fmt", vec![Value::Int(5)]), Ok(s("5")));
        assert_eq!(call("fmt", vec![s("hello")]), Ok(s("hello")));
        assert_eq!(call("fmt", vec![s("0.500")]), Ok(s("0.5")));
        assert_eq!(call("fmt", vec![Value::Expr(Expr::new("x"))]), Ok(s("x")));
    }

    #[test]
    fn math() {
        assert_eq!(call("abs", vec![Value::Int(-5)]), Ok(Value::Int(5)));
        assert_eq!(call("abs", vec![Value::Float(-0.5)]), Ok(Value::Float(0.5)));
        assert_eq!(call("round", vec![Value::Float(2.5)]), Ok(Value::Int(2)));
        assert_eq!(call("round", vec![Value::Float(3.5)]), Ok(Value::Int(4)));
        assert_eq!(
            call("round", vec![Value::Float(1.23456), Value::Int(2)]),
            Ok(Value::Float(1.23))
        );
        assert_eq!(call("min", vec![Value::Int(3), Value::Float(1.5)]), Ok(Value::Float(1.5)));
        assert_eq!(call("max", vec![s("a"), s("b")]), Ok(s("b")));
        assert!(call("max", vec![Value::Int(1)]).is_err());
        assert!(call("abs", vec![s("x")]).is_err());
    }

    #[test]
    fn len_counts_chars() {
        assert_eq!(call("len", vec![s("größe")]), Ok(Value::Int(5)));
        assert!(call("len", vec![Value::Int(1)]).is_err());
    }

    #[test]
    fn arity_message() {
        let err = call("repr", vec![]).unwrap_err();
        assert_eq!(err.to_string(), "repr() takes exactly 1 argument (0 given)");
    }

    #[test]
    fn bind_method_reports_receiver() {
        let e = Value::Expr(Expr::new(r"\frac{param(a)}{param(b)}"));
        let kwargs = vec![("a".to_owned(), Value::Int(3)), ("b".to_owned(), Value::Float(4.0))];
        let r = call_method(&e, "bind", vec![], kwargs, &Ctx).unwrap();
        assert_eq!(r.value.to_string(), r"\frac{3}{4}");
        assert_eq!(r.receiver, Some(r.value.clone()));
    }

    #[test]
    fn unbind_method_leaves_receiver() {
        let e = Value::Expr(Expr::new("param(a)").bind([("a", "1")]));
        let r = call_method(&e, "unbind", vec![], vec![], &Ctx).unwrap();
        assert_eq!(r.value.to_string(), "param(a)");
        assert_eq!(r.receiver, None);
    }

    #[test]
    fn solve_method() {
        let e = Value::Expr(Expr::new("y = x^2 - 9"));
        let r = call_method(&e, "solve", vec![s("x")], vec![], &Ctx).unwrap();
        assert_eq!(r.value, s("x = -3, 3"));
        assert!(call_method(&e, "solve", vec![], vec![], &Ctx).is_err());
    }

    #[test]
    fn calling_expr() {
        let e = Value::Expr(Expr::new(r"\frac{param(x)}{2}"));
        let plain = call_value(&Value::Expr(Expr::new("5+5")), vec![], vec![], &Ctx).unwrap();
        assert_eq!(plain.value, s("10"));
        let r = call_value(&e, vec![], vec![("x".into(), Value::Int(4))], &Ctx).unwrap();
        assert_eq!(r.value, s("2"));
        assert_eq!(r.receiver.map(|v| v.to_string()), Some(r"\frac{4}{2}".to_owned()));
        assert!(call_value(&e, vec![Value::Int(1)], vec![], &Ctx).is_err());
    }

    #[test]
    fn attributes() {
        let e = Value::Expr(Expr::new("param(a)").bind([("a", "2")]));
        assert_eq!(get_attr(&e, "latex"), Ok(s("2")));
        assert_eq!(get_attr(&e, "original"), Ok(s("param(a)")));
        assert_eq!(get_attr(&Value::ReplaceThis("t".into()), "value"), Ok(s("t")));
        let err = get_attr(&Value::Int(1), "foo").unwrap_err();
        assert_eq!(err.to_string(), "'int' object has no attribute 'foo'");
    }

    #[test]
    fn non_callables() {
        let err = call_value(&Value::Int(1), vec![], vec![], &Ctx).unwrap_err();
        assert_eq!(err.to_string(), "'int' object is not callable");
        let e = Value::Expr(Expr::new("x"));
        assert!(call_method(&e, "latex", vec![], vec![], &Ctx).is_err());
    }
}
