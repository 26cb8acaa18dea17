//! Header text to canonical snake-case identifiers.

use crate::Cell;

/// Normalize raw header text: every run of characters outside `[0-9A-Za-z]` becomes a
/// single `_`, boundary underscores are stripped and the result is lowercased.
///
/// Total: symbol-only or empty input yields an empty string.
pub fn normalize_column(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut pending_sep = false;
    for ch in raw.trim().chars() {
        if ch.is_ascii_alphanumeric() {
            if pending_sep && !out.is_empty() {
                out.push('_');
            }
            pending_sep = false;
            out.push(ch.to_ascii_lowercase());
        } else {
            pending_sep = true;
        }
    }
    out
}

/// Normalize a header cell of any type through its string form.
pub fn normalize_header(cell: &Cell) -> String {
    normalize_column(&cell.to_string())
}
