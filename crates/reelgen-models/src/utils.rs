//! Caption, date and count formatting helpers.
//!
//! These are shared by the metadata normalizer, the overlay builder and the
//! caller-facing summary, so they live next to the models they format.

use std::sync::OnceLock;

use chrono::{Local, NaiveDate};
use regex::Regex;

/// Maximum caption length in characters before truncation.
pub const MAX_CAPTION_LENGTH: usize = 150;

/// Marker appended to truncated captions.
pub const ELLIPSIS: &str = "...";

/// Display format for post dates, e.g. `Jan 25, 2026`.
pub const DATE_DISPLAY_FORMAT: &str = "%b %d, %Y";

/// Compact upload date format produced by the metadata tool.
const UPLOAD_DATE_FORMAT: &str = "%Y%m%d";

/// Hosts whose post URLs the pipeline accepts.
const SUPPORTED_POST_HOSTS: &[&str] = &[
    "x.com",
    "www.x.com",
    "mobile.x.com",
    "twitter.com",
    "www.twitter.com",
    "mobile.twitter.com",
];

static URL_PATTERN: OnceLock<Regex> = OnceLock::new();

fn url_pattern() -> &'static Regex {
    URL_PATTERN.get_or_init(|| {
        Regex::new(r"(?i)\b(?:https?://|www\.)\S+").expect("URL pattern is a valid regex")
    })
}

/// Remove URL-shaped substrings (`http://`, `https://`, `www.`) from text.
///
/// Surrounding whitespace is left untouched; callers trim afterwards.
pub fn strip_urls(text: &str) -> String {
    url_pattern().replace_all(text, "").into_owned()
}

/// Truncate a caption to `max_len` characters on a word boundary.
///
/// Captions at or under the limit are returned unchanged. Longer captions are
/// cut at `max_len`, backed off to the last whitespace so no word is split,
/// and suffixed with [`ELLIPSIS`]. A single word longer than the limit is
/// hard-cut since there is no boundary to back off to.
pub fn truncate_caption(caption: &str, max_len: usize) -> String {
    if caption.chars().count() <= max_len {
        return caption.to_string();
    }

    let byte_cut = caption
        .char_indices()
        .nth(max_len)
        .map(|(idx, _)| idx)
        .unwrap_or(caption.len());
    let head = &caption[..byte_cut];

    // The cut already sits on a boundary when the next character is whitespace.
    let next_is_space = caption[byte_cut..]
        .chars()
        .next()
        .is_some_and(char::is_whitespace);

    let kept = if next_is_space {
        head.trim_end()
    } else {
        match head.rfind(char::is_whitespace) {
            Some(idx) => head[..idx].trim_end(),
            None => head,
        }
    };

    let kept = if kept.is_empty() { head } else { kept };
    format!("{}{}", kept, ELLIPSIS)
}

/// Normalize a raw post description into an overlay caption.
///
/// Strips URLs, trims outer whitespace (internal spacing is preserved) and
/// truncates to [`MAX_CAPTION_LENGTH`].
pub fn normalize_caption(raw: &str) -> String {
    let stripped = strip_urls(raw);
    truncate_caption(stripped.trim(), MAX_CAPTION_LENGTH)
}

/// Format a compact `YYYYMMDD` upload date as `Mon DD, YYYY`.
///
/// Anything that is not an 8-digit valid date falls back to today's date.
pub fn format_upload_date(upload_date: &str) -> String {
    format_upload_date_or(upload_date, Local::now().date_naive())
}

/// Same as [`format_upload_date`] with an explicit fallback date.
pub fn format_upload_date_or(upload_date: &str, fallback: NaiveDate) -> String {
    let trimmed = upload_date.trim();
    let parsed = if trimmed.len() == 8 && trimmed.bytes().all(|b| b.is_ascii_digit()) {
        NaiveDate::parse_from_str(trimmed, UPLOAD_DATE_FORMAT).ok()
    } else {
        None
    };

    parsed
        .unwrap_or(fallback)
        .format(DATE_DISPLAY_FORMAT)
        .to_string()
}

/// Format an engagement count with K/M notation.
///
/// `999 -> "999"`, `1500 -> "1.5K"`, `2300000 -> "2.3M"`.
pub fn format_count(count: u64) -> String {
    if count >= 1_000_000 {
        format!("{:.1}M", count as f64 / 1_000_000.0)
    } else if count >= 1_000 {
        format!("{:.1}K", count as f64 / 1_000.0)
    } else {
        count.to_string()
    }
}

/// Check whether a URL points at a post on a supported platform.
pub fn is_supported_post_url(post_url: &str) -> bool {
    let Ok(parsed) = url::Url::parse(post_url.trim()) else {
        return false;
    };

    if parsed.scheme() != "https" {
        return false;
    }

    parsed
        .host_str()
        .map(|host| {
            let host = host.to_ascii_lowercase();
            SUPPORTED_POST_HOSTS.iter().any(|h| *h == host)
        })
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_caption_unchanged() {
        assert_eq!(normalize_caption("Short caption"), "Short caption");
        assert_eq!(normalize_caption(""), "");
    }

    #[test]
    fn test_caption_trim_keeps_internal_spacing() {
        assert_eq!(normalize_caption("  two  spaces\nhere  "), "two  spaces\nhere");
    }

    #[test]
    fn test_caption_strips_urls() {
        assert_eq!(
            normalize_caption("Watch this https://t.co/AbC123 now"),
            "Watch this  now"
        );
        assert_eq!(normalize_caption("www.example.com/path"), "");
        assert_eq!(normalize_caption("Link: http://x.co"), "Link:");
    }

    #[test]
    fn test_long_caption_truncates_on_word_boundary() {
        let words = "alpha beta gamma delta ".repeat(20);
        let result = normalize_caption(&words);

        assert!(result.chars().count() <= MAX_CAPTION_LENGTH + 3);
        assert!(result.ends_with(ELLIPSIS));

        let body = result.trim_end_matches(ELLIPSIS);
        for word in body.split_whitespace() {
            assert!(
                ["alpha", "beta", "gamma", "delta"].contains(&word),
                "split inside a word: {word}"
            );
        }
    }

    #[test]
    fn test_long_single_word_is_hard_cut() {
        let caption = "a".repeat(200);
        let result = normalize_caption(&caption);
        assert_eq!(result.chars().count(), MAX_CAPTION_LENGTH + 3);
        assert!(result.ends_with(ELLIPSIS));
    }

    #[test]
    fn test_truncate_at_exact_boundary() {
        // Cut lands right before a space: keep the whole last word.
        let caption = format!("{} tail", "x".repeat(10));
        assert_eq!(truncate_caption(&caption, 10), format!("{}...", "x".repeat(10)));
    }

    #[test]
    fn test_truncate_counts_characters_not_bytes() {
        let caption = "é".repeat(20);
        let result = truncate_caption(&caption, 10);
        assert_eq!(result.chars().count(), 13);
    }

    #[test]
    fn test_format_upload_date_valid() {
        assert_eq!(format_upload_date("20260125"), "Jan 25, 2026");
        assert_eq!(format_upload_date("20240305"), "Mar 05, 2024");
    }

    #[test]
    fn test_format_upload_date_invalid_uses_fallback() {
        let fallback = NaiveDate::from_ymd_opt(2025, 12, 1).unwrap();
        assert_eq!(format_upload_date_or("invalid", fallback), "Dec 01, 2025");
        assert_eq!(format_upload_date_or("", fallback), "Dec 01, 2025");
        assert_eq!(format_upload_date_or("20261341", fallback), "Dec 01, 2025");

        let today = format_upload_date("invalid");
        assert!(!today.is_empty());
        assert!(today.contains(','));
    }

    #[test]
    fn test_format_count() {
        assert_eq!(format_count(0), "0");
        assert_eq!(format_count(999), "999");
        assert_eq!(format_count(1_000), "1.0K");
        assert_eq!(format_count(1_500), "1.5K");
        assert_eq!(format_count(999_999), "1000.0K");
        assert_eq!(format_count(1_000_000), "1.0M");
        assert_eq!(format_count(1_500_000), "1.5M");
        assert_eq!(format_count(2_300_000), "2.3M");
    }

    #[test]
    fn test_is_supported_post_url() {
        assert!(is_supported_post_url("https://x.com/user/status/123"));
        assert!(is_supported_post_url("https://twitter.com/user/status/123"));
        assert!(is_supported_post_url("https://mobile.twitter.com/user/status/1"));
        assert!(!is_supported_post_url("http://x.com/user/status/123"));
        assert!(!is_supported_post_url("https://example.com/x.com"));
        assert!(!is_supported_post_url("not a url"));
    }
}
