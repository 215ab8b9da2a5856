//! String Utilities
//!
//! Copy-on-write helpers for bounding text that ends up in persisted records
//! or outbound messages.

use std::borrow::Cow;

/// Copy-on-write string type
pub type CowStr<'a> = Cow<'a, str>;

/// Marker appended when text is cut
pub const ELLIPSIS: &str = "…";

/// Bound `text` to at most `limit` characters (not bytes).
///
/// Returns the input untouched when it already fits; otherwise the cut text
/// ends with [`ELLIPSIS`] and still counts `limit` characters in total.
pub fn truncate_chars(text: &str, limit: usize) -> CowStr<'_> {
    if text.chars().count() <= limit {
        return Cow::Borrowed(text);
    }
    if limit == 0 {
        return Cow::Borrowed("");
    }

    let keep = limit - 1;
    let end = text
        .char_indices()
        .nth(keep)
        .map(|(idx, _)| idx)
        .unwrap_or(text.len());
    Cow::Owned(format!("{}{}", &text[..end], ELLIPSIS))
}

/// Last `n` non-empty lines, joined with `\n`
pub fn tail_lines(text: &str, n: usize) -> String {
    let lines: Vec<&str> = text.lines().filter(|l| !l.trim().is_empty()).collect();
    let start = lines.len().saturating_sub(n);
    lines[start..].join("\n")
}

/// Encode an identifier as a single file-name component.
///
/// ASCII letters, digits, `-` and `_` pass through; every other byte becomes
/// `%XX`. Distinct inputs always give distinct outputs, and the result never
/// contains a separator or starts with `.`. The empty string encodes as `%`.
pub fn path_component(raw: &str) -> CowStr<'_> {
    let plain = |b: u8| b.is_ascii_alphanumeric() || b == b'-' || b == b'_';
    if raw.is_empty() {
        return Cow::Borrowed("%");
    }
    if raw.bytes().all(plain) {
        return Cow::Borrowed(raw);
    }

    let mut out = String::with_capacity(raw.len() * 3);
    for b in raw.bytes() {
        if plain(b) {
            out.push(b as char);
        } else {
            out.push_str(&format!("%{:02X}", b));
        }
    }
    Cow::Owned(out)
}
