//! Free-text cell coercion. Pasted and uploaded cells carry currency symbols,
//! thousands separators and yes/no variants; everything here degrades to
//! `None`/defaults instead of failing.

/// Parse a cell as a number. Strips currency symbols, commas and whitespace
/// first; empty or unparseable input is `None`, never an error.
pub fn coerce_number(raw: &str) -> Option<f64> {
    let cleaned: String = raw
        .chars()
        .filter(|c| !matches!(c, '$' | '€' | '£' | '¥' | ',') && !c.is_whitespace())
        .collect();
    if cleaned.is_empty() {
        return None;
    }
    match cleaned.parse::<f64>() {
        Ok(v) if v.is_finite() => Some(v),
        _ => None,
    }
}

/// Parse a cell as a boolean, falling back to `default` for empty or
/// unrecognized input. Never fails.
pub fn coerce_bool(raw: &str, default: bool) -> bool {
    match raw.trim().to_lowercase().as_str() {
        "" => default,
        "true" | "1" | "yes" | "y" => true,
        "false" | "0" | "no" | "n" => false,
        _ => default,
    }
}

/// Parse a quantity cell. Anything that does not coerce to a finite value
/// strictly greater than zero is clamped to 1; the caller gets told whether a
/// clamp happened so it can emit exactly one warning per offending row.
pub fn coerce_quantity(raw: &str) -> (u32, bool) {
    match coerce_number(raw) {
        Some(v) if v > 0.0 => (v as u32, false),
        _ => (1, true),
    }
}

/// Integer parse used by paste classification: the qty cell must hold a finite
/// integer > 0 for the row to count as data at all.
pub fn parse_positive_int(raw: &str) -> Option<u32> {
    let v = coerce_number(raw)?;
    if v > 0.0 && v.fract() == 0.0 {
        Some(v as u32)
    } else {
        None
    }
}
