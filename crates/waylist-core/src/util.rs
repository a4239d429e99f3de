//! Text and clock helpers shared by the config, transport and queue layers.

use chrono::{DateTime, Utc};

const COMPACT_TEXT_LIMIT: usize = 180;

/// Trimmed text, or `None` when nothing but whitespace is left.
pub fn normalize_text_option(value: Option<String>) -> Option<String> {
    value
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

/// Whether `value` is an absolute `http(s)` URL with a host part.
pub fn is_http_url(value: &str) -> bool {
    ["http://", "https://"]
        .iter()
        .filter_map(|scheme| value.strip_prefix(scheme))
        .any(|rest| !rest.is_empty() && !rest.starts_with('/'))
}

/// Single-line excerpt of a response body for log fields.
pub fn compact_text(value: &str) -> String {
    value
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .chars()
        .take(COMPACT_TEXT_LIMIT)
        .collect()
}

pub fn now() -> DateTime<Utc> {
    Utc::now()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_text_normalizes_to_none() {
        assert_eq!(normalize_text_option(None), None);
        assert_eq!(normalize_text_option(Some(" \n ".to_string())), None);
        assert_eq!(
            normalize_text_option(Some(" token ".to_string())),
            Some("token".to_string())
        );
    }

    #[test]
    fn http_urls_need_a_host() {
        assert!(is_http_url("http://localhost:8080"));
        assert!(is_http_url("https://api.waylist.app"));
        assert!(!is_http_url("https://"));
        assert!(!is_http_url("ftp://api.waylist.app"));
        assert!(!is_http_url("api.waylist.app"));
    }

    #[test]
    fn compact_text_is_one_bounded_line() {
        assert_eq!(compact_text("  {\"error\":\n  \"nope\"}  "), "{\"error\": \"nope\"}");
        assert_eq!(compact_text(&"x".repeat(400)).len(), COMPACT_TEXT_LIMIT);
    }
}
