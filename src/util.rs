/// Truncate a string to `max` characters, appending "…" if truncated.
/// Handles multi-byte (CJK) correctly via char boundary.
pub fn truncate_chars(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let truncated: String = s.chars().take(max).collect();
        format!("{truncated}…")
    }
}

/// One-line preview of handoff content for list summaries: first line only,
/// truncated to `max` characters.
pub fn preview(content: &str, max: usize) -> String {
    let first_line = content.lines().next().unwrap_or("").trim();
    truncate_chars(first_line, max)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ascii_no_truncate() {
        assert_eq!(truncate_chars("hello", 10), "hello");
    }

    #[test]
    fn ascii_truncate() {
        assert_eq!(truncate_chars("hello world", 5), "hello…");
    }

    #[test]
    fn cjk_truncate() {
        assert_eq!(truncate_chars("회의록 정리본", 3), "회의록…");
    }

    #[test]
    fn preview_takes_first_line() {
        assert_eq!(preview("[HANDOFF] deploy notes\nsecond line", 40), "[HANDOFF] deploy notes");
    }

    #[test]
    fn preview_empty() {
        assert_eq!(preview("", 10), "");
    }
}
