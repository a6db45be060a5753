//! The `py(...)` snippet language.
//!
//! Snippets are flat `;`-separated statements written in a small Python
//! subset:
//!
//! - `name = expr` assignments, persisted in the engine's store
//! - arithmetic, comparisons, `and`/`or`/`not`, strings and f-strings
//! - `Expr` values with `.bind(…)`, `.unbind(…)`, `.solve(…)` and calls
//! - `ReplaceThis(…)` / `ReplaceAll(…)` output directives
//!
//! # Quick start
//!
//! ```rust
//! use mdmath::script::{execute, Outcome};
//! use mdmath::Engine;
//!
//! let mut engine = Engine::new();
//! let out = execute(&mut engine, "ReplaceThis(str(THIS()))", r"\frac{1}{4}");
//! assert_eq!(out, Outcome::ReplaceThis("0.25".into()));
//! ```

pub mod builtins;
pub mod expr;
pub mod interp;
pub mod scan;
pub mod stmt;
pub mod value;

// Re-exports for convenience.
pub use expr::EvalContext;
pub use interp::{execute, Interpreter, Outcome};
pub use scan::{find_span, strip_spans, Span};
pub use value::{EvalError, Value};
