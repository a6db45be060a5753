//! Document pass: find `$…$` and `$$…$$` blocks and resolve each one.
//!
//! Text outside math blocks is copied through untouched.  `$$` is checked
//! before `$`, and a delimiter with no closing partner ends the scan with
//! the remainder copied verbatim.

use crate::block::{resolve_block, Resolution};
use crate::engine::Engine;

/// Rewrite every math block of `text`.
pub fn process(engine: &mut Engine, text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;

    while let Some(open) = rest.find('$') {
        out.push_str(&rest[..open]);
        let delim = if rest[open..].starts_with("$$") { "$$" } else { "$" };
        let body_start = open + delim.len();
        let Some(len) = rest[body_start..].find(delim) else {
            log::debug!("unterminated {delim} at byte {}", text.len() - rest.len() + open);
            out.push_str(&rest[open..]);
            return out;
        };
        let body = &rest[body_start..body_start + len];

        match resolve_block(engine, body) {
            Resolution::Delete => {}
            Resolution::Unchanged => {
                out.push_str(delim);
                out.push_str(body);
                out.push_str(delim);
            }
            Resolution::Text(replacement) => {
                out.push_str(delim);
                out.push_str(&replacement);
                out.push_str(delim);
            }
        }
        rest = &rest[body_start + len + delim.len()..];
    }

    out.push_str(rest);
    out
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn run(text: &str) -> String {
        process(&mut Engine::new(), text)
    }

    #[test]
    fn plain_text_passes_through() {
        assert_eq!(run("no math here"), "no math here");
        assert_eq!(run(""), "");
    }

    #[test]
    fn math_without_snippets_is_untouched() {
        assert_eq!(run("a $x^2$ b $$\\int f$$ c"), "a $x^2$ b $$\\int f$$ c");
    }

    #[test]
    fn inline_block() {
        assert_eq!(run("Sum: $1+2 = py(ReplaceThis('3'))$."), "Sum: $1+2 = 3$.");
    }

    #[test]
    fn display_block() {
        assert_eq!(run("$$py(ReplaceAll('x'))$$"), "$$x$$");
    }

    #[test]
    fn deleted_block_leaves_surroundings() {
        assert_eq!(run("before $py(ReplaceAll(''))$ after"), "before  after");
    }

    #[test]
    fn unterminated_inline_is_kept() {
        assert_eq!(run("cost $5 py(1)"), "cost $5 py(1)");
    }

    #[test]
    fn unterminated_display_is_kept() {
        assert_eq!(run("$a$ then $$py(1)$"), "$a$ then $$py(1)$");
    }

    #[test]
    fn multiple_blocks_share_store() {
        assert_eq!(
            run("$py(v = 5)$A $py(ReplaceThis(str(v * 3)))$ B"),
            "A $15$ B"
        );
    }

    #[test]
    fn multibyte_text_around_blocks() {
        assert_eq!(run("é $py(ReplaceAll('ü'))$ ß"), "é $ü$ ß");
    }
}
