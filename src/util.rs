// src/util.rs
use once_cell::sync::OnceCell;

/// Producer-local capture timestamp, `YYYY-MM-DD HH:MM:SS`.
pub fn now_datetime() -> String {
    chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string()
}

/// Normalize scraped text: decode HTML entities, strip tags, collapse
/// whitespace, trim. `max_chars` of 0 means no length cap.
pub fn normalize_text(s: &str, max_chars: usize) -> String {
    // 1) HTML entity decode
    let mut out = html_escape::decode_html_entities(s).to_string();

    // 2) Strip HTML tags
    static RE_TAGS: OnceCell<regex::Regex> = OnceCell::new();
    let re_tags = RE_TAGS.get_or_init(|| regex::Regex::new(r"(?is)</?[^>]+>").unwrap());
    out = re_tags.replace_all(&out, " ").to_string();

    // 3) Collapse whitespace
    static RE_WS: OnceCell<regex::Regex> = OnceCell::new();
    let re_ws = RE_WS.get_or_init(|| regex::Regex::new(r"\s+").unwrap());
    out = re_ws.replace_all(&out, " ").to_string();
    out = out.trim().to_string();

    // 4) Length cap
    if max_chars > 0 && out.chars().count() > max_chars {
        out = out.chars().take(max_chars).collect();
    }

    out
}

/// Truncate on a char boundary. 0 means unlimited.
pub fn truncate_chars(s: &str, max_chars: usize) -> String {
    if max_chars > 0 && s.chars().count() > max_chars {
        s.chars().take(max_chars).collect()
    } else {
        s.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_strips_tags_and_collapses_ws() {
        let s = "  <p>Hello,&nbsp;&nbsp;<b>world</b></p>  ";
        assert_eq!(normalize_text(s, 0), "Hello, world");
    }

    #[test]
    fn normalize_caps_length_on_char_boundary() {
        let s = "饕餮饕餮饕餮";
        assert_eq!(normalize_text(s, 4), "饕餮饕餮");
    }

    #[test]
    fn truncate_zero_means_unlimited() {
        assert_eq!(truncate_chars("abcdef", 0), "abcdef");
        assert_eq!(truncate_chars("abcdef", 3), "abc");
    }
}
