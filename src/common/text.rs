//! Text helpers for bounded-length Discord output.

/// Keep at most `max_chars` characters from the start, appending `...` when cut.
pub fn preview(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}

/// Keep at most `max_chars` characters from the end.
///
/// Error traces carry the interesting part last, so diagnostics keep the tail.
pub fn tail(text: &str, max_chars: usize) -> &str {
    let count = text.chars().count();
    if count <= max_chars {
        return text;
    }
    let skip = count - max_chars;
    match text.char_indices().nth(skip) {
        Some((idx, _)) => &text[idx..],
        None => text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_preview_short_text_untouched() {
        assert_eq!(preview("hello", 50), "hello");
    }

    #[test]
    fn test_preview_cuts_and_marks() {
        assert_eq!(preview("abcdefgh", 3), "abc...");
    }

    #[test]
    fn test_preview_multibyte() {
        // Must cut on a char boundary, not a byte offset
        assert_eq!(preview("ééééé", 2), "éé...");
    }

    #[test]
    fn test_tail_keeps_end() {
        assert_eq!(tail("0123456789", 4), "6789");
        assert_eq!(tail("short", 10), "short");
        assert_eq!(tail("ñandú", 3), "ndú");
    }
}
