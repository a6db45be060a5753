//! Resolving one math block.
//!
//! Every `py(...)` span in the block body is executed left to right and its
//! [`Outcome`] applied to a working copy of the body.  Spans are re-located
//! after each edit, so offsets never refer to stale text.

use crate::engine::Engine;
use crate::script::{execute, find_span, strip_spans, Outcome, Span};

/// What the document pass should do with a block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// Keep the block exactly as written, delimiters included.
    Unchanged,
    /// Drop the block and its delimiters.
    Delete,
    /// Re-wrap this text in the original delimiters.
    Text(String),
}

/// Execute the snippets of `block` and decide how the block is rewritten.
pub fn resolve_block(engine: &mut Engine, block: &str) -> Resolution {
    if !block.contains("py(") {
        return Resolution::Unchanged;
    }

    let mut buf = block.to_owned();
    let mut offset = 0;
    let mut replace_all: Option<String> = None;

    while let Some(span) = find_span(&buf, offset) {
        let this = this_context(&buf, &span);
        let outcome = execute(engine, &span.content, &this);
        log::debug!("py({}) with THIS={this:?} -> {outcome:?}", span.content);
        match outcome {
            Outcome::ReplaceAll(text) => {
                replace_all = Some(text);
                buf.replace_range(span.start..span.end, "");
            }
            Outcome::NoOutput => buf.replace_range(span.start..span.end, ""),
            Outcome::ReplaceThis(text) | Outcome::Implicit(text) => {
                buf.replace_range(span.start..span.end, &text);
                offset = span.start + text.len();
            }
        }
    }

    if let Some(text) = replace_all {
        return if text.trim().is_empty() {
            Resolution::Delete
        } else {
            Resolution::Text(text)
        };
    }

    let result = buf.trim();
    if result.is_empty() {
        Resolution::Delete
    } else if result != block.trim() {
        Resolution::Text(result.to_owned())
    } else {
        Resolution::Unchanged
    }
}

/// `THIS` for a span: the text before it, or failing that the text after
/// it with every other span removed.
fn this_context(buf: &str, span: &Span) -> String {
    let before = buf[..span.start].trim();
    if !before.is_empty() {
        return before.to_owned();
    }
    strip_spans(&buf[span.end..]).trim().to_owned()
}

// ── Tests ─────────────────────────────────────────────────────────────────────
