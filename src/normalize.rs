//! Input canonicalization.
//!
//! Every downstream coordinate (token line spans, section boundaries, scanner
//! offsets) is computed against the normalized buffer. The raw input is kept
//! only for display.

use std::borrow::Cow;
use unicode_normalization::{is_nfc, UnicodeNormalization};

/// Convert CRLF and lone CR to LF, then apply Unicode NFC.
///
/// Borrows when `raw` is already normalized.
///
/// ```
/// # use markpass::normalize;
/// assert_eq!(normalize("a\r\nb\rc"), "a\nb\nc");
/// assert_eq!(normalize("e\u{301}"), "\u{e9}");
/// ```
pub fn normalize(raw: &str) -> Cow<'_, str> {
    let unified = unify_line_endings(raw);
    if is_nfc(&unified) {
        unified
    } else {
        Cow::Owned(unified.nfc().collect())
    }
}

fn unify_line_endings(raw: &str) -> Cow<'_, str> {
    let bytes = raw.as_bytes();
    let matcher = jetscii::bytes!(b'\r');

    let mut first = match matcher.find(bytes) {
        Some(ix) => ix,
        None => return Cow::Borrowed(raw),
    };

    let mut out = String::with_capacity(raw.len());
    let mut ix = 0;
    loop {
        out.push_str(&raw[ix..first]);
        out.push('\n');
        ix = first + 1;
        if bytes.get(ix) == Some(&b'\n') {
            ix += 1;
        }
        first = match matcher.find(&bytes[ix..]) {
            Some(offset) => ix + offset,
            None => break,
        };
    }
    out.push_str(&raw[ix..]);
    Cow::Owned(out)
}

/// Number of lines in normalized text; a trailing newline does not start a
/// new line.
pub fn line_count(text: &str) -> usize {
    if text.is_empty() {
        return 0;
    }
    let newlines = text.bytes().filter(|&b| b == b'\n').count();
    if text.ends_with('\n') {
        newlines
    } else {
        newlines + 1
    }
}

/// Raw input alongside its normalized form.
#[derive(Debug, Clone)]
pub struct Source {
    original: String,
    normalized: String,
}

impl Source {
    /// Normalize `raw`, keeping a copy of it for provenance.
    pub fn new(raw: &str) -> Self {
        Source {
            normalized: normalize(raw).into_owned(),
            original: raw.to_owned(),
        }
    }

    /// The text all offsets refer to.
    pub fn text(&self) -> &str {
        &self.normalized
    }

    /// The unmodified input. Display only; never index into it.
    pub fn original(&self) -> &str {
        &self.original
    }

    /// Lines in the normalized text.
    pub fn line_count(&self) -> usize {
        line_count(&self.normalized)
    }
}
