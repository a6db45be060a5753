//! `Expr`: a LaTeX fragment with `param(name)` placeholders.
//!
//! An `Expr` remembers the text it was created from, so binding values into
//! its placeholders can always be undone.  Values are immutable: `bind` and
//! `unbind` return new expressions.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::OnceLock;

use regex::Regex;

use crate::format::format_number;
use crate::symbolic::Symbolic;

/// A LaTeX expression value.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Expr {
    latex: String,
    original: String,
    bindings: BTreeMap<String, String>,
}

impl Expr {
    pub fn new(latex: impl Into<String>) -> Self {
        let latex = latex.into();
        Expr {
            original: latex.clone(),
            latex,
            bindings: BTreeMap::new(),
        }
    }

    /// Current text, with any bound placeholders substituted.
    pub fn latex(&self) -> &str {
        &self.latex
    }

    /// Text at construction time.
    pub fn original(&self) -> &str {
        &self.original
    }

    /// Placeholder name → text that replaced it.
    pub fn bindings(&self) -> &BTreeMap<String, String> {
        &self.bindings
    }

    /// Replace every `param(k)` with `v` for each pair, recording the
    /// binding.  Pairs whose placeholder does not occur are still recorded.
    pub fn bind<I, K, V>(&self, pairs: I) -> Expr
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let mut out = self.clone();
        for (k, v) in pairs {
            let (k, v) = (k.into(), v.into());
            out.latex = out.latex.replace(&format!("param({k})"), &v);
            out.bindings.insert(k, v);
        }
        out
    }

    /// Back to the original text with no bindings.
    pub fn unbind(&self) -> Expr {
        Expr::new(self.original.clone())
    }

    /// Restore `param(name)` for each named binding.  The bound text is
    /// replaced wherever it occurs in the current text, not only where the
    /// placeholder used to be.  Names that were never bound are ignored.
    pub fn unbind_names<S: AsRef<str>>(&self, names: &[S]) -> Expr {
        if names.is_empty() {
            return self.unbind();
        }
        let mut out = self.clone();
        for name in names {
            let name = name.as_ref();
            if let Some(value) = out.bindings.remove(name) {
                out.latex = out.latex.replace(&value, &format!("param({name})"));
            }
        }
        out
    }

    /// The string handed to the symbolic backend: `\text{…}` removed,
    /// `param(x)` turned into `x`, only the part after the last `=`, trimmed.
    pub fn canonical(&self) -> String {
        let stripped = strip_text_commands(&self.latex);
        let resolved = param_pattern().replace_all(&stripped, "${1}");
        after_last_equals(&resolved).trim().to_owned()
    }

    /// Numeric value of the expression, formatted.  An empty expression is
    /// `0`; anything the backend cannot evaluate comes back as the canonical
    /// text.
    pub fn evaluate(&self, symbolic: &dyn Symbolic, precision: usize) -> String {
        let clean = self.canonical();
        if clean.is_empty() {
            return "0".to_owned();
        }
        match symbolic.parse_latex(&clean).and_then(|e| symbolic.evaluate(&e)) {
            Ok(x) => format_number(x, precision),
            Err(e) => {
                log::trace!("keeping {clean:?} as text: {e}");
                clean
            }
        }
    }

    /// Solve the right-hand side of the last `=` for `name`:
    /// `"x = 1, 2"` on success, `"[Error: …]"` otherwise.
    pub fn solve(&self, name: &str, symbolic: &dyn Symbolic) -> String {
        let target = after_last_equals(&self.latex).trim();
        match symbolic.parse_latex(target).and_then(|e| symbolic.solve(&e, name)) {
            Ok(sols) => {
                let sols: Vec<String> = sols.iter().map(ToString::to_string).collect();
                format!("{name} = {}", sols.join(", "))
            }
            Err(e) => format!("[Error: {e}]"),
        }
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.latex)
    }
}

fn param_pattern() -> &'static Regex {
    static PARAM: OnceLock<Regex> = OnceLock::new();
    PARAM.get_or_init(|| Regex::new(r"param\((\w+)\)").expect("static pattern"))
}

/// Remove every `\text{…}` group, honouring nested braces.  An unclosed
/// group runs to the end of the string.
fn strip_text_commands(s: &str) -> String {
    const OPEN: &str = "\\text{";
    let mut out = s.to_owned();
    while let Some(start) = out.find(OPEN) {
        let bytes = out.as_bytes();
        let mut depth = 1;
        let mut end = start + OPEN.len();
        while depth > 0 && end < bytes.len() {
            match bytes[end] {
                b'{' => depth += 1,
                b'}' => depth -= 1,
                _ => {}
            }
            end += 1;
        }
        out.replace_range(start..end, "");
    }
    out
}

/// The text after the last `=` outside braces, or all of `s`.
fn after_last_equals(s: &str) -> &str {
    let mut depth = 0i32;
    let mut last = None;
    for (i, c) in s.char_indices() {
        match c {
            '{' => depth += 1,
            '}' => depth -= 1,
            '=' if depth <= 0 => last = Some(i),
            _ => {}
        }
    }
    match last {
        Some(i) => &s[i + 1..],
        None => s,
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
