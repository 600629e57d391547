//! Keyed object literals embedded in page text
//!
//! Pages embed their data either as plain JSON (`"monthlyReturns":{...}`) or as JSON
//! serialized a second time inside a JS string (`\"monthlyReturns\":{...}`).
//! [`locate`] accepts either spelling of each quote around the label and captures the
//! object that follows it with a brace counter that skips over quoted strings, so nested
//! objects come back whole.
//!
//! Usage:
//! ```
//! use yieldbook::fragment::{locate, normalize_quotes};
//!
//! let page = r#"<script>self.push("{\"monthlyReturns\":{\"2023-1\":5.4}}")</script>"#;
//! let fragment = locate(page, "monthlyReturns").unwrap();
//! assert_eq!(normalize_quotes(fragment), r#"{"2023-1":5.4}"#);
//! ```

use std::borrow::Cow;

/// How the label, and every string inside the object after it, is quoted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Quoting {
    Bare,
    Escaped,
}

impl Quoting {
    // inside an escaped object every backslash of the inner JSON is doubled and the
    // quote itself carries one more, so inner escapes come in pairs of two
    fn closes_string(self, backslashes: usize) -> bool {
        match self {
            Quoting::Bare => backslashes % 2 == 0,
            Quoting::Escaped => backslashes % 4 == 1,
        }
    }
}

/// Returns the first object literal labelled with `key`, braces included.
///
/// Either quote around the key may be escaped. The quote right before the colon
/// decides how strings inside the object are read.
///
/// `None` means no label was followed by a complete object, which is an ordinary
/// outcome for pages that carry their data elsewhere.
pub fn locate<'a>(text: &'a str, key: &str) -> Option<&'a str> {
    let opening = format!("\"{key}");
    text.match_indices(opening.as_str()).find_map(|(start, m)| {
        let after = &text[start + m.len()..];
        let (quoting, after) = match after.strip_prefix('"') {
            Some(after) => (Quoting::Bare, after),
            None => (Quoting::Escaped, after.strip_prefix("\\\"")?),
        };
        let rest = after.trim_start().strip_prefix(':')?.trim_start();
        if !rest.starts_with('{') {
            return None;
        }
        let open = text.len() - rest.len();
        let close = object_end(text.as_bytes(), open, quoting)?;
        Some(&text[open..=close])
    })
}

// index of the brace closing the object opened at `open`
fn object_end(bytes: &[u8], open: usize, quoting: Quoting) -> Option<usize> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut backslashes = 0usize;
    for (i, &b) in bytes.iter().enumerate().skip(open) {
        match b {
            b'\\' => {
                backslashes += 1;
                continue;
            }
            b'"' if quoting.closes_string(backslashes) => in_string = !in_string,
            b'{' if !in_string => depth += 1,
            b'}' if !in_string => {
                depth -= 1;
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }
        backslashes = 0;
    }
    None
}

/// Turns escaped quotes back into plain quotes.
///
/// Any run of backslashes directly in front of a `"` is dropped, so `\"` and `\\\"`
/// both become `"`. Backslashes before anything else, and apostrophes, are kept.
/// Applying it twice gives the same result as applying it once.
pub fn normalize_quotes(fragment: &str) -> Cow<'_, str> {
    if !fragment.contains("\\\"") {
        return Cow::Borrowed(fragment);
    }
    let mut normalized = String::with_capacity(fragment.len());
    let mut pending = 0usize;
    for c in fragment.chars() {
        match c {
            '\\' => pending += 1,
            '"' => {
                pending = 0;
                normalized.push('"');
            }
            _ => {
                normalized.extend(std::iter::repeat('\\').take(pending));
                pending = 0;
                normalized.push(c);
            }
        }
    }
    normalized.extend(std::iter::repeat('\\').take(pending));
    Cow::Owned(normalized)
}
