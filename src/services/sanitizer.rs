//! Tag sanitization shared by the tag store and the content suggester.
//!
//! A raw tag is reduced to a safe token: markup-like substrings are removed,
//! only ASCII letters, digits, underscore and hyphen survive, and the result
//! is capped at [`MAX_TAG_LENGTH`] characters. Anything that reduces to an
//! empty string is rejected.

use once_cell::sync::Lazy;
use regex::Regex;

/// Longest tag the service accepts.
pub const MAX_TAG_LENGTH: usize = 50;

static RE_MARKUP: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]*>").expect("valid markup regex"));

/// Returns the safe form of `raw`, or `None` when nothing usable remains.
pub fn sanitize_tag(raw: &str) -> Option<String> {
    let without_markup = RE_MARKUP.replace_all(raw, "");
    let sanitized: String = without_markup
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '_' || *c == '-')
        .take(MAX_TAG_LENGTH)
        .collect();

    if sanitized.is_empty() {
        None
    } else {
        Some(sanitized)
    }
}

/// Whether `tag` is already in its sanitized form.
pub fn is_valid_tag(tag: &str) -> bool {
    sanitize_tag(tag).as_deref() == Some(tag)
}
