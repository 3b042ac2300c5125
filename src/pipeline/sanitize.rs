//! Text sanitisation for XML-backed output formats.
//!
//! Word documents are XML inside a zip; a single control character or
//! non-character in a run makes the whole file unreadable. Offending
//! characters are removed rather than replaced with U+FFFD.

use std::borrow::Cow;

/// Remove characters that are not allowed in XML 1.0 text.
///
/// Tab, newline and carriage return survive; every other C0 control, DEL,
/// U+FFFD and the U+FFFE/U+FFFF non-characters are dropped.
pub fn sanitize_text(text: &str) -> Cow<'_, str> {
    if text.chars().all(is_allowed) {
        Cow::Borrowed(text)
    } else {
        Cow::Owned(text.chars().filter(|&c| is_allowed(c)).collect())
    }
}

fn is_allowed(c: char) -> bool {
    match c {
        '\t' | '\n' | '\r' => true,
        '\u{0}'..='\u{1F}' | '\u{7F}' => false,
        '\u{FFFD}' | '\u{FFFE}' | '\u{FFFF}' => false,
        _ => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clean_text_is_borrowed() {
        assert!(matches!(sanitize_text("hello\tworld\n"), Cow::Borrowed(_)));
    }

    #[test]
    fn strips_controls() {
        assert_eq!(sanitize_text("a\u{0}b\u{8}c\u{B}d\u{1F}e\u{7F}f"), "abcdef");
    }

    #[test]
    fn keeps_non_ascii() {
        assert_eq!(sanitize_text("café — 第一页"), "café — 第一页");
    }

    #[test]
    fn replacement_char_is_dropped() {
        assert_eq!(sanitize_text("x\u{FFFD}y"), "xy");
    }
}
