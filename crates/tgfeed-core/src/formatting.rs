//! Text helpers shared by the feed renderers.

/// Longest title (in chars) emitted as-is; longer first lines are cut.
pub const TITLE_MAX_CHARS: usize = 100;

/// Escape XML special characters for element text and attribute values.
pub fn escape_xml(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            // Control characters are not allowed in XML 1.0.
            c if c.is_control() && !matches!(c, '\n' | '\r' | '\t') => {}
            c => out.push(c),
        }
    }
    out
}

/// Cut `s` to at most `max_chars` characters, replacing the tail with `...`.
pub fn truncate_chars(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        return s.to_string();
    }
    let keep = max_chars.saturating_sub(3);
    let mut out = s.chars().take(keep).collect::<String>();
    out.push_str("...");
    out
}

/// Item title: the first line of the body, at most 100 chars.
pub fn generate_title(body: &str) -> String {
    let first_line = body.split('\n').next().unwrap_or_default();
    truncate_chars(first_line, TITLE_MAX_CHARS)
}
