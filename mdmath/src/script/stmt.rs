//! Snippet statements.
//!
//! A snippet is a flat sequence of statements separated by `;` at paren
//! depth 0 and outside quotes.  Each statement is either `name = expr` or a
//! bare expression; there are no block constructs.

/// A classified snippet statement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Stmt {
    /// `name = expr`
    Assign { name: String, src: String },
    /// Anything else, evaluated for its value.
    Expr { src: String },
}

/// Depth/quote tracker shared by the splitter and the classifier.
#[derive(Default)]
struct Nesting {
    depth: i32,
    quote: Option<char>,
}

impl Nesting {
    /// Feed one character; `prev` is the character before it, if any.
    /// Returns `true` if `c` sits at depth 0 outside a string and is not
    /// itself a quote or paren.
    fn feed(&mut self, c: char, prev: Option<char>) -> bool {
        if let Some(q) = self.quote {
            if c == q && prev != Some('\\') {
                self.quote = None;
            }
            return false;
        }
        match c {
            '"' | '\'' => {
                self.quote = Some(c);
                false
            }
            '(' => {
                self.depth += 1;
                false
            }
            ')' => {
                self.depth -= 1;
                false
            }
            _ => self.depth == 0,
        }
    }
}

/// Split snippet text into trimmed, non-empty statements.
pub fn split_statements(src: &str) -> Vec<String> {
    let mut stmts = Vec::new();
    let mut current = String::new();
    let mut nesting = Nesting::default();
    let mut prev = None;

    for c in src.chars() {
        if nesting.feed(c, prev) && c == ';' {
            push_trimmed(&mut stmts, &current);
            current.clear();
        } else {
            current.push(c);
        }
        prev = Some(c);
    }
    push_trimmed(&mut stmts, &current);
    stmts
}

fn push_trimmed(stmts: &mut Vec<String>, s: &str) {
    let s = s.trim();
    if !s.is_empty() {
        stmts.push(s.to_owned());
    }
}

/// Decide whether `src` is an assignment.
///
/// The first `=` at depth 0 outside quotes is the delimiter unless it is
/// half of `==`, `!=`, `<=` or `>=`.  The text before it must be an
/// identifier, otherwise the whole statement is an expression.
pub fn classify(src: &str) -> Stmt {
    let src = src.trim();
    if let Some(eq) = assignment_eq(src) {
        let name = src[..eq].trim();
        if is_identifier(name) {
            return Stmt::Assign {
                name: name.to_owned(),
                src: src[eq + 1..].trim().to_owned(),
            };
        }
    }
    Stmt::Expr { src: src.to_owned() }
}

/// Parse a whole snippet into classified statements.
pub fn parse_snippet(src: &str) -> Vec<Stmt> {
    split_statements(src).iter().map(|s| classify(s)).collect()
}

fn assignment_eq(src: &str) -> Option<usize> {
    let mut nesting = Nesting::default();
    let mut prev = None;
    let mut iter = src.char_indices().peekable();
    while let Some((i, c)) = iter.next() {
        let top = nesting.feed(c, prev);
        if top && c == '=' && i > 0 {
            let next = iter.peek().map(|&(_, n)| n);
            let joined = matches!(prev, Some('!' | '=' | '<' | '>')) || next == Some('=');
            if !joined {
                return Some(i);
            }
        }
        prev = Some(c);
    }
    None
}

/// Letters, digits and `_`, not starting with a digit.
pub fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_alphanumeric() || c == '_')
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn assign(name: &str, src: &str) -> Stmt {
        Stmt::Assign { name: name.into(), src: src.into() }
    }

    fn expr(src: &str) -> Stmt {
        Stmt::Expr { src: src.into() }
    }

    #[test]
    fn split_basic() {
        assert_eq!(split_statements("a = THIS; ReplaceThis(str(a))"), vec![
            "a = THIS",
            "ReplaceThis(str(a))"
        ]);
    }

    #[test]
    fn split_drops_empty() {
        assert_eq!(split_statements("x = 1;;  ; "), vec!["x = 1"]);
        assert!(split_statements("   ").is_empty());
    }

    #[test]
    fn split_respects_parens_and_quotes() {
        assert_eq!(split_statements("f(a; b); 'x;y'; \"p\\\";q\""), vec![
            "f(a; b)",
            "'x;y'",
            "\"p\\\";q\""
        ]);
    }

    #[test]
    fn classify_assignment() {
        assert_eq!(classify("x = THIS"), assign("x", "THIS"));
        assert_eq!(classify("total=1+2"), assign("total", "1+2"));
    }

    #[test]
    fn classify_comparisons_are_expressions() {
        assert_eq!(classify("a == b"), expr("a == b"));
        assert_eq!(classify("a != b"), expr("a != b"));
        assert_eq!(classify("a <= b"), expr("a <= b"));
        assert_eq!(classify("a >= b"), expr("a >= b"));
    }

    #[test]
    fn classify_nested_equals_ignored() {
        assert_eq!(
            classify("THIS.bind(a=3, b=4)"),
            expr("THIS.bind(a=3, b=4)")
        );
        assert_eq!(classify("ReplaceThis('a = b')"), expr("ReplaceThis('a = b')"));
    }

    #[test]
    fn classify_non_identifier_target() {
        assert_eq!(classify("a.b = 3"), expr("a.b = 3"));
        assert_eq!(classify("1x = 3"), expr("1x = 3"));
    }

    #[test]
    fn classify_assignment_with_comparison_value() {
        assert_eq!(classify("same = a == b"), assign("same", "a == b"));
    }

    #[test]
    fn classify_leading_equals_is_expression() {
        assert_eq!(classify("= 3"), expr("= 3"));
    }

    #[test]
    fn identifiers() {
        assert!(is_identifier("x"));
        assert!(is_identifier("_tmp1"));
        assert!(is_identifier("größe"));
        assert!(!is_identifier("1x"));
        assert!(!is_identifier(""));
        assert!(!is_identifier("a b"));
    }
}
