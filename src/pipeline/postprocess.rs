//! Post-processing: deterministic cleanup of model-generated LaTeX.
//!
//! Even when told to output raw LaTeX, models regularly wrap the document in
//! a ` ```latex ... ``` ` fence, prepend a byte-order mark, or answer with
//! Windows line endings. These rules undo that without touching content:
//! invisible characters are only trimmed at the edges of the answer, never
//! inside it, since ZWNJ and ZWJ are meaningful in many scripts.
//!
//! ## Rule Order
//!
//! Leading invisible characters go first (a BOM in front of a fence hides the
//! fence), then line endings (so the fence patterns only deal with `\n`),
//! then fences.
//! Every rule is idempotent and no rule reintroduces what an earlier one
//! removed, so [`clean_latex`] is idempotent as a whole.

use once_cell::sync::Lazy;
use regex::Regex;

/// Apply all post-processing rules to the raw model output.
///
/// 1. Strip invisible Unicode (zero-width spaces, BOM, word joiner) at the edges
/// 2. Normalise line endings (CRLF → LF)
/// 3. Strip leading/trailing code fences, with or without a language tag
pub fn clean_latex(input: &str) -> String {
    let s = remove_invisible_chars(input);
    let s = normalise_line_endings(&s);
    strip_code_fences(&s)
}

// ── Rule 1: Strip invisible Unicode ──────────────────────────────────────────

fn is_invisible(c: char) -> bool {
    matches!(c, '\u{200B}' | '\u{200C}' | '\u{200D}' | '\u{2060}' | '\u{FEFF}')
}

fn remove_invisible_chars(input: &str) -> String {
    trim_edges(input).to_string()
}

/// Trim whitespace and invisible characters from both ends only.
fn trim_edges(input: &str) -> &str {
    input.trim_matches(|c: char| c.is_whitespace() || is_invisible(c))
}

// ── Rule 2: Normalise line endings ───────────────────────────────────────────

fn normalise_line_endings(input: &str) -> String {
    input.replace("\r\n", "\n").replace('\r', "\n")
}

// ── Rule 3: Strip code fences ────────────────────────────────────────────────

/// Opening fence line: three backticks plus an optional language tag.
static RE_LEADING_FENCE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\A```[^`\n]*(?:\n|\z)").unwrap());

/// Closing fence line at the very end.
static RE_TRAILING_FENCE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?:\A|\n)```[ \t]*\z").unwrap());

/// Remove a leading and/or trailing fence marker.
///
/// The leading and trailing markers are handled independently, so output
/// that only opens a fence is still cleaned. Layers are peeled until nothing
/// changes, which makes the function idempotent even for doubly-wrapped
/// output. Surrounding whitespace and invisible characters are trimmed.
pub fn strip_code_fences(input: &str) -> String {
    let mut current = trim_edges(input).to_string();
    loop {
        let without_leading = RE_LEADING_FENCE.replace(&current, "");
        let without_trailing = RE_TRAILING_FENCE.replace(&without_leading, "");
        let next = trim_edges(&without_trailing);
        if next == current {
            return current;
        }
        current = next.to_string();
    }
}
