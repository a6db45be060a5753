//! The processing engine: one variable store, one symbolic backend, and the
//! formatting settings, threaded through every block of every document.

use crate::block::{self, Resolution};
use crate::document;
use crate::format::DEFAULT_PRECISION;
use crate::script::{self, Outcome};
use crate::store::Store;
use crate::symbolic::{Builtin, Symbolic};

/// Tunables applied while expanding snippets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// Fractional digits kept when numbers are formatted.
    pub precision: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig { precision: DEFAULT_PRECISION }
    }
}

/// Owns the state that persists between snippets.
///
/// ```
/// use mdmath::Engine;
///
/// let mut engine = Engine::new();
/// assert_eq!(engine.process("$1+2 py(ReplaceAll(str(THIS())))$"), "$3$");
/// ```
pub struct Engine {
    store: Store,
    symbolic: Box<dyn Symbolic>,
    config: EngineConfig,
}

impl Default for Engine {
    fn default() -> Self {
        Engine::with_config(EngineConfig::default())
    }
}

impl Engine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: EngineConfig) -> Self {
        Engine { store: Store::new(), symbolic: Box::new(Builtin), config }
    }

    /// Replace the symbolic backend.
    pub fn with_symbolic(mut self, symbolic: impl Symbolic + 'static) -> Self {
        self.symbolic = Box::new(symbolic);
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut Store {
        &mut self.store
    }

    pub fn symbolic(&self) -> &dyn Symbolic {
        self.symbolic.as_ref()
    }

    /// Split borrow used by the snippet interpreter.
    pub(crate) fn parts(&mut self) -> (&mut Store, &dyn Symbolic, usize) {
        (&mut self.store, self.symbolic.as_ref(), self.config.precision)
    }

    /// Expand every math block of a Markdown document.
    pub fn process(&mut self, text: &str) -> String {
        document::process(self, text)
    }

    /// Resolve the body of a single math block (delimiters excluded).
    pub fn resolve_block(&mut self, block: &str) -> Resolution {
        block::resolve_block(self, block)
    }

    /// Run one snippet with `this` as its `THIS` context.
    pub fn execute(&mut self, code: &str, this: &str) -> Outcome {
        script::execute(self, code, this)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
