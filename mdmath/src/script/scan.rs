//! Locating `py(...)` spans inside math text.
//!
//! A span starts at a literal `py(` that is not glued onto a preceding
//! identifier, number, or `:` and runs to the `)` that balances it.
//! Parentheses inside `'…'` / `"…"` strings do not count towards the
//! balance.  An unterminated candidate is skipped, never reported.

const OPENER: &str = "py(";

/// A located `py(...)` region.
///
/// `start..end` are byte offsets into the buffer that was scanned and go
/// stale as soon as that buffer is edited.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Span {
    pub start: usize,
    pub end: usize,
    pub content: String,
}

/// Find the first acceptable span at or after byte offset `from`.
pub fn find_span(text: &str, from: usize) -> Option<Span> {
    let mut idx = from;
    while idx < text.len() {
        let pos = idx + text.get(idx..)?.find(OPENER)?;
        if glued_to_previous(text, pos) {
            idx = pos + 1;
            continue;
        }
        let open = pos + OPENER.len() - 1;
        match matching_paren(text, open) {
            Some(close) => {
                return Some(Span {
                    start: pos,
                    end: close + 1,
                    content: text[open + 1..close].to_owned(),
                });
            }
            None => idx = pos + 1,
        }
    }
    None
}

/// Remove every span from `text`, re-scanning after each cut.
pub fn strip_spans(text: &str) -> String {
    let mut out = text.to_owned();
    while out.contains(OPENER) {
        match find_span(&out, 0) {
            Some(span) => out.replace_range(span.start..span.end, ""),
            None => break,
        }
    }
    out
}

/// `true` if the character just before `pos` makes `py(` part of a longer
/// token (`entropy(`, `100py(`, `x:py(`).  A preceding `)` is fine.
fn glued_to_previous(text: &str, pos: usize) -> bool {
    match text[..pos].chars().next_back() {
        Some(c) => c.is_alphanumeric() || c == '_' || c == ':',
        None => false,
    }
}

/// Byte offset of the `)` closing the `(` at `open`, or `None` if the text
/// ends first.
fn matching_paren(text: &str, open: usize) -> Option<usize> {
    let bytes = text.as_bytes();
    let mut depth = 1usize;
    let mut quote: Option<u8> = None;
    let mut i = open + 1;
    while i < bytes.len() {
        let b = bytes[i];
        match quote {
            Some(q) => {
                if b == q && bytes[i - 1] != b'\\' {
                    quote = None;
                }
            }
            None => match b {
                b'"' | b'\'' => quote = Some(b),
                b'(' => depth += 1,
                b')' => {
                    depth -= 1;
                    if depth == 0 {
                        return Some(i);
                    }
                }
                _ => {}
            },
        }
        i += 1;
    }
    None
}

// ── Tests ─────────────────────────────────────────────────────────────────────
