//! Numeric display rule shared by `Expr` evaluation, `fmt()` and solver
//! output.

/// Fractional digits kept when a number is not integral.
pub const DEFAULT_PRECISION: usize = 6;

/// Render `x` as a plain integer when it is integral, otherwise with
/// `precision` fractional digits and trailing zeros (and a bare trailing
/// `.`) removed.  Non-finite values keep their natural spelling.
pub fn format_number(x: f64, precision: usize) -> String {
    if !x.is_finite() {
        return if x.is_nan() {
            "nan".to_owned()
        } else if x > 0.0 {
            "inf".to_owned()
        } else {
            "-inf".to_owned()
        };
    }
    if x == x.trunc() {
        if x == 0.0 {
            return "0".to_owned();
        }
        return format!("{x:.0}");
    }
    let s = format!("{x:.precision$}");
    if s.contains('.') {
        s.trim_end_matches('0').trim_end_matches('.').to_owned()
    } else {
        s
    }
}

/// Coerce text to a number the way `float()` would, then format it; text
/// that is not numeric comes back unchanged.
pub fn format_text(s: &str, precision: usize) -> String {
    match s.trim().parse::<f64>() {
        Ok(x) if x.is_finite() => format_number(x, precision),
        _ => s.to_owned(),
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
