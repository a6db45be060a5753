//! Snippet interpreter.
//!
//! An [`Interpreter`] runs one `py(...)` snippet against a working scope
//! seeded from the engine's [`Store`].  It implements [`EvalContext`] so the
//! expression evaluator can look names up and write back rebinds.

use std::collections::HashMap;

use super::{
    expr::{eval_str, EvalContext},
    stmt::{parse_snippet, Stmt},
    value::{EvalError, Value},
};
use crate::engine::Engine;
use crate::formula::Expr;
use crate::store::Store;
use crate::symbolic::Symbolic;

// ── Outcome ───────────────────────────────────────────────────────────────────

/// What a snippet asks the block resolver to do with its span.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Nothing to splice; the span is removed.
    NoOutput,
    /// Splice the text in place of the span.
    ReplaceThis(String),
    /// Replace the whole enclosing block.
    ReplaceAll(String),
    /// Textual form of the last value, spliced like `ReplaceThis`.
    Implicit(String),
}

impl Outcome {
    /// Map a statement's final value onto an outcome.
    pub fn from_value(v: Value) -> Outcome {
        match v {
            Value::None => Outcome::NoOutput,
            Value::ReplaceThis(s) => Outcome::ReplaceThis(s),
            Value::ReplaceAll(s) => Outcome::ReplaceAll(s),
            other => Outcome::Implicit(other.to_string()),
        }
    }

    fn error(e: &EvalError) -> Outcome {
        Outcome::Implicit(format!("[Error: {e}]"))
    }
}

// ── Interpreter ───────────────────────────────────────────────────────────────

pub struct Interpreter<'a> {
    scope: HashMap<String, Value>,
    store: &'a mut Store,
    symbolic: &'a dyn Symbolic,
    precision: usize,
}

impl<'a> Interpreter<'a> {
    /// Build the working scope: `THIS` first, then every stored name, so a
    /// stored `THIS` shadows the context.
    pub fn new(engine: &'a mut Engine, this: &str) -> Self {
        let (store, symbolic, precision) = engine.parts();
        let mut scope = HashMap::with_capacity(store.len() + 1);
        scope.insert("THIS".to_owned(), Value::Expr(Expr::new(this)));
        for (name, value) in store.iter() {
            scope.insert(name.clone(), value.clone());
        }
        Interpreter { scope, store, symbolic, precision }
    }

    /// Value of a name in the working scope.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.scope.get(name)
    }

    /// Run every statement in order.  Each one overwrites the outcome, so
    /// the last statement decides; a failing statement records an inline
    /// error and execution continues.
    pub fn run(&mut self, code: &str) -> Outcome {
        let mut outcome = Outcome::NoOutput;
        for stmt in parse_snippet(code) {
            outcome = match self.exec(&stmt) {
                Ok(o) => o,
                Err(e) => {
                    log::debug!("snippet statement {stmt:?} failed: {e}");
                    Outcome::error(&e)
                }
            };
        }
        outcome
    }

    fn exec(&mut self, stmt: &Stmt) -> Result<Outcome, EvalError> {
        match stmt {
            Stmt::Assign { name, src } => {
                let value = eval_str(src, self)?;
                log::trace!("{name} = {value:?}");
                self.scope.insert(name.clone(), value.clone());
                self.store.set(name.clone(), value);
                Ok(Outcome::NoOutput)
            }
            Stmt::Expr { src } => Ok(Outcome::from_value(eval_str(src, self)?)),
        }
    }
}

impl EvalContext for Interpreter<'_> {
    fn get_var(&self, name: &str) -> Option<Value> {
        self.scope.get(name).cloned()
    }

    fn rebind(&mut self, name: &str, value: Value) {
        if self.store.contains(name) {
            self.store.set(name, value.clone());
        }
        self.scope.insert(name.to_owned(), value);
    }

    fn symbolic(&self) -> &dyn Symbolic {
        self.symbolic
    }

    fn precision(&self) -> usize {
        self.precision
    }
}

/// Run `code` with `THIS` bound to `this` against the engine's store.
pub fn execute(engine: &mut Engine, code: &str, this: &str) -> Outcome {
    Interpreter::new(engine, this).run(code)
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn run(engine: &mut Engine, code: &str, this: &str) -> Outcome {
        execute(engine, code, this)
    }

    fn implicit(s: &str) -> Outcome {
        Outcome::Implicit(s.to_owned())
    }

    #[test]
    fn assignment_stores_this() {
        let mut engine = Engine::new();
        assert_eq!(run(&mut engine, "x = THIS", "1+2"), Outcome::NoOutput);
        assert_eq!(engine.store().get("x"), Some(&Value::Expr(Expr::new("1+2"))));
    }

    #[test]
    fn replace_this_and_all() {
        let mut engine = Engine::new();
        assert_eq!(
            run(&mut engine, "ReplaceThis('hello')", ""),
            Outcome::ReplaceThis("hello".into())
        );
        assert_eq!(
            run(&mut engine, "ReplaceAll('world')", ""),
            Outcome::ReplaceAll("world".into())
        );
    }

    #[test]
    fn stored_expr_converts_with_str() {
        let mut engine = Engine::new();
        engine.store_mut().set("x", Expr::new("1+2"));
        assert_eq!(
            run(&mut engine, "ReplaceThis(str(x))", ""),
            Outcome::ReplaceThis("1+2".into())
        );
    }

    #[test]
    fn builtin_abs() {
        let mut engine = Engine::new();
        assert_eq!(run(&mut engine, "ReplaceThis(str(abs(-5)))", ""), Outcome::ReplaceThis("5".into()));
    }

    #[test]
    fn statements_see_earlier_assignments() {
        let mut engine = Engine::new();
        assert_eq!(
            run(&mut engine, "a = THIS; ReplaceThis(str(a))", "test"),
            Outcome::ReplaceThis("test".into())
        );
        assert!(engine.store().contains("a"));
    }

    #[test]
    fn last_statement_wins() {
        let mut engine = Engine::new();
        assert_eq!(run(&mut engine, "ReplaceThis('a'); b = 1", ""), Outcome::NoOutput);
        assert_eq!(run(&mut engine, "ReplaceAll('a'); 1 + 1", ""), implicit("2"));
    }

    #[test]
    fn error_does_not_stop_later_statements() {
        let mut engine = Engine::new();
        assert_eq!(
            run(&mut engine, "y = undefined; ReplaceThis('ok')", ""),
            Outcome::ReplaceThis("ok".into())
        );
        assert!(!engine.store().contains("y"));
    }

    #[test]
    fn trailing_error_is_inline() {
        let mut engine = Engine::new();
        assert_eq!(
            run(&mut engine, "ReplaceThis('a'); 1/0", ""),
            implicit("[Error: division by zero]")
        );
        assert_eq!(
            run(&mut engine, "missing", ""),
            implicit("[Error: name 'missing' is not defined]")
        );
    }

    #[test]
    fn empty_and_none_are_no_output() {
        let mut engine = Engine::new();
        assert_eq!(run(&mut engine, "", "x"), Outcome::NoOutput);
        assert_eq!(run(&mut engine, "None", "x"), Outcome::NoOutput);
    }

    #[test]
    fn implicit_output_is_str_form() {
        let mut engine = Engine::new();
        assert_eq!(run(&mut engine, "1 + 1", ""), implicit("2"));
        assert_eq!(run(&mut engine, "'a' + 'b'", ""), implicit("ab"));
        assert_eq!(run(&mut engine, "THIS", r"\alpha"), implicit(r"\alpha"));
    }

    #[test]
    fn stored_this_shadows_context() {
        let mut engine = Engine::new();
        engine.store_mut().set("THIS", 5i64);
        assert_eq!(run(&mut engine, "THIS", "ignored"), implicit("5"));
    }

    #[test]
    fn bind_on_stored_name_updates_store() {
        let mut engine = Engine::new();
        engine.store_mut().set("e", Expr::new("param(a) + 1"));
        run(&mut engine, "e.bind(a=1)", "");
        assert_eq!(engine.store().get("e").map(Value::to_string), Some("1 + 1".to_owned()));
    }

    #[test]
    fn bind_on_this_stays_local() {
        let mut engine = Engine::new();
        assert_eq!(
            run(&mut engine, "THIS.bind(a=2); ReplaceThis(THIS())", "param(a) * 3"),
            Outcome::ReplaceThis("6".into())
        );
        assert!(!engine.store().contains("THIS"));
    }

    #[test]
    fn scope_reflects_assignments() {
        let mut engine = Engine::new();
        let mut interp = Interpreter::new(&mut engine, "q");
        interp.run("n = 2 ** 10");
        assert_eq!(interp.get("n"), Some(&Value::Int(1024)));
        assert_eq!(interp.get("THIS"), Some(&Value::Expr(Expr::new("q"))));
    }
}
