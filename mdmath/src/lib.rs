//! Expand `py(...)` snippets embedded in the LaTeX math of Markdown text.
//!
//! A document is scanned for `$…$` and `$$…$$` blocks; each `py(...)` span
//! inside a block is run by the snippet interpreter in [`script`], with the
//! surrounding LaTeX available as `THIS`, and its result is spliced back.

pub mod block;
pub mod cli;
pub mod document;
pub mod engine;
pub mod format;
pub mod formula;
pub mod script;
pub mod store;
pub mod symbolic;

pub use block::Resolution;
pub use engine::{Engine, EngineConfig};
pub use formula::Expr;
pub use script::Outcome;
pub use store::Store;
