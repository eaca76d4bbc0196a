//! Property-based tests for tag sanitization.
//!
//! Whatever text a user or a page hands us, a sanitized tag is short,
//! non-empty, markup-free and stable under a second pass.

use pinmark::services::sanitizer::{is_valid_tag, sanitize_tag, MAX_TAG_LENGTH};
use proptest::prelude::*;

/// Mixes plain words with markup fragments and arbitrary unicode.
fn arb_raw_tag() -> impl Strategy<Value = String> {
    prop_oneof![
        "[a-zA-Z0-9_-]{0,80}",
        "(<[a-z/ =\"]{0,10}>)?[a-zA-Z0-9 .#+]{0,20}(</[a-z]{1,5}>)?",
        any::<String>(),
    ]
}

// **Property 1: Sanitized tags are safe**
//
// *For any* input, a sanitized tag contains only ASCII letters, digits,
// `_` and `-`, is non-empty and at most MAX_TAG_LENGTH characters long.
proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    #[test]
    fn sanitized_tags_use_only_safe_characters(raw in arb_raw_tag()) {
        if let Some(tag) = sanitize_tag(&raw) {
            prop_assert!(!tag.is_empty());
            prop_assert!(tag.len() <= MAX_TAG_LENGTH, "tag too long: {}", tag.len());
            prop_assert!(
                tag.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-'),
                "unsafe character in {:?}", tag
            );
        }
    }

    // **Property 2: Sanitization is idempotent**
    #[test]
    fn sanitizing_twice_changes_nothing(raw in arb_raw_tag()) {
        if let Some(tag) = sanitize_tag(&raw) {
            prop_assert!(is_valid_tag(&tag));
            prop_assert_eq!(sanitize_tag(&tag), Some(tag));
        }
    }

    // **Property 3: Clean input passes through**
    #[test]
    fn clean_tags_are_kept_verbatim(tag in "[a-zA-Z0-9_-]{1,50}") {
        prop_assert!(is_valid_tag(&tag));
        prop_assert_eq!(sanitize_tag(&tag), Some(tag));
    }
}
