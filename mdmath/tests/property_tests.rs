use proptest::prelude::*;
use mdmath::script::scan::{find_span, strip_spans};
use mdmath::script::stmt::parse_snippet;
use mdmath::{Engine, Expr, Resolution};

proptest! {
    /// The span scanner should never panic, whatever the text and offset.
    #[test]
    fn scanner_does_not_panic(s in "\\PC*", from in 0usize..64) {
        let _ = find_span(&s, from);
        let _ = strip_spans(&s);
    }
}

proptest! {
    /// A located span covers `py(` … `)` and its content is the interior.
    #[test]
    fn span_bounds_consistent(prefix in "[a-z ]{0,8}", body in "[a-z0-9+ ]{0,12}") {
        let text = format!("{prefix} py({body}) tail");
        let span = find_span(&text, 0).expect("span expected");
        prop_assert_eq!(&text[span.start..span.start + 3], "py(");
        prop_assert_eq!(&text[span.end - 1..span.end], ")");
        prop_assert_eq!(span.content, body);
    }
}

proptest! {
    /// After stripping, nothing locatable is left.
    #[test]
    fn strip_leaves_no_span(s in "[a-z()py' ]{0,40}") {
        prop_assert!(find_span(&strip_spans(&s), 0).is_none());
    }
}

proptest! {
    /// Blocks without `py(` are left alone, and so are documents.
    #[test]
    fn text_without_snippets_unchanged(s in "\\PC*") {
        prop_assume!(!s.contains("py("));
        let mut engine = Engine::new();
        prop_assert_eq!(engine.resolve_block(&s), Resolution::Unchanged);
        prop_assert_eq!(engine.process(&s), s);
    }
}

proptest! {
    /// `unbind()` undoes any sequence of binds.
    #[test]
    fn unbind_is_left_inverse_of_bind(
        latex in "[a-z0-9+ ]{0,10}(param\\([a-c]\\)[a-z0-9+ ]{0,6}){0,3}",
        first in proptest::collection::vec(("[a-c]", "[0-9]{1,3}"), 0..3),
        second in proptest::collection::vec(("[a-c]", "[a-z0-9]{1,3}"), 0..3),
    ) {
        let e = Expr::new(latex.clone());
        let bound = e.bind(first).bind(second);
        let unbound = bound.unbind();
        prop_assert_eq!(unbound.latex(), latex.as_str());
        prop_assert!(bound.unbind().bindings().is_empty());
    }
}

proptest! {
    /// Statement splitting never panics and never invents statements from
    /// blank input.
    #[test]
    fn splitter_does_not_panic(s in "\\PC{0,64}") {
        let stmts = parse_snippet(&s);
        if s.trim().is_empty() {
            prop_assert!(stmts.is_empty());
        }
    }
}

proptest! {
    /// Arbitrary snippet text yields an outcome rather than a panic.
    #[test]
    fn execute_does_not_panic(code in "[a-z0-9+*/%()'=;., _-]{0,40}") {
        let mut engine = Engine::new();
        let _ = engine.execute(&code, "x + 1");
    }
}
