//! Content-derived tag suggestions.
//!
//! Tokenizes page texts, drops noise, counts words case-insensitively while
//! keeping the first-seen casing, ranks by frequency and sanitizes the result
//! with the same rules the tag store applies.

use std::collections::{HashMap, HashSet};

use once_cell::sync::Lazy;
use regex::Regex;

use crate::services::page_extractor;
use crate::services::sanitizer::sanitize_tag;
use crate::types::tag::SuggestionCandidate;

static RE_TOKEN_SPLIT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"[\s.,;:!?\-_()\[\]{}"']+"#).expect("valid token regex"));

/// Common English words that never make useful tags.
pub const NOISE_WORDS: &[&str] = &[
    "a", "an", "and", "are", "as", "at", "be", "by", "for", "from", "has", "he", "in", "is", "it",
    "its", "of", "on", "that", "the", "to", "was", "will", "with", "this", "but", "they", "have",
    "had", "what", "said", "each", "which", "their", "time", "if", "up", "out", "many", "then",
    "them", "these", "so", "some", "her", "would", "make", "like", "into", "him", "two", "more",
    "very", "after", "words", "long", "than", "first", "been", "call", "who", "oil", "sit", "now",
    "find", "down", "day", "did", "get", "come", "made", "may", "part", "over", "new", "sound",
    "take", "only", "little", "work", "know", "place", "year", "live", "me", "back", "give",
    "most", "thing", "our", "just", "name", "good", "sentence", "man", "think", "say", "great",
    "where", "help", "through", "much", "before", "line", "right", "too", "mean", "old", "any",
    "same", "tell", "boy", "follow", "came", "want", "show", "also", "around", "form", "three",
    "small", "set", "put", "end", "does", "another", "well", "large", "must", "big", "even",
    "such", "because", "turn", "here", "why", "ask", "went", "men", "read", "need", "land",
    "different", "home", "us", "move", "try", "kind", "hand", "picture", "again", "change", "off",
    "play", "spell", "air", "away", "animal", "house", "point", "page", "letter", "mother",
    "answer", "found", "study", "still", "learn", "should", "america", "world", "high", "every",
    "near", "add", "food", "between", "own", "below", "country", "plant", "last", "school",
    "father", "keep", "tree", "never", "start", "city", "earth", "eye", "light", "thought",
    "head", "under", "story", "saw", "left", "don't", "few", "while", "along", "might", "close",
    "something", "seem", "next", "hard", "open", "example", "begin", "life", "always", "those",
    "both", "paper", "together", "got", "group", "often", "run", "important", "until", "children",
    "side", "feet", "car", "mile", "night", "walk", "white", "sea", "began", "grow", "took",
    "river", "four", "carry", "state", "once", "book", "hear", "stop", "without", "second",
    "later", "miss", "idea", "enough", "eat", "face", "watch", "far", "indian", "really",
    "almost", "let", "above", "girl", "sometimes", "mountain", "cut", "young", "talk", "soon",
    "list", "song", "leave", "family", "it's",
];

static NOISE: Lazy<HashSet<&'static str>> = Lazy::new(|| NOISE_WORDS.iter().copied().collect());

/// Tokens that may become tags, in document order.
pub fn tokenize(text: &str) -> Vec<&str> {
    RE_TOKEN_SPLIT
        .split(text)
        .filter(|word| word.chars().count() >= 2)
        .filter(|word| !word.chars().all(|c| c.is_ascii_digit()))
        .filter(|word| !NOISE.contains(word.to_lowercase().as_str()))
        .collect()
}

/// Frequency-ranked candidates. A word first seen with uppercase letters yields
/// its original casing and its lowercase form, both with the same frequency.
pub fn rank_candidates(texts: &[String]) -> Vec<SuggestionCandidate> {
    let mut order: Vec<String> = Vec::new();
    let mut frequency: HashMap<String, usize> = HashMap::new();
    let mut first_seen: HashMap<String, String> = HashMap::new();

    for text in texts {
        for word in tokenize(text) {
            let lower = word.to_lowercase();
            let count = frequency.entry(lower.clone()).or_insert(0);
            if *count == 0 {
                order.push(lower.clone());
                first_seen.insert(lower.clone(), word.to_string());
            }
            *count += 1;
        }
    }

    let mut candidates = Vec::with_capacity(order.len() * 2);
    for lower in order {
        let count = frequency.get(&lower).copied().unwrap_or(0);
        let original = first_seen.remove(&lower).unwrap_or_else(|| lower.clone());
        let needs_lower = original != lower;
        candidates.push(SuggestionCandidate {
            tag: original,
            lower: lower.clone(),
            frequency: count,
        });
        if needs_lower {
            candidates.push(SuggestionCandidate {
                tag: lower.clone(),
                lower,
                frequency: count,
            });
        }
    }

    candidates.sort_by(|a, b| b.frequency.cmp(&a.frequency).then_with(|| a.lower.cmp(&b.lower)));
    candidates
}

/// Suggested tags from already extracted page texts.
pub fn suggest_from_texts(texts: &[String], limit: usize) -> Vec<String> {
    let mut seen = HashSet::new();
    rank_candidates(texts)
        .into_iter()
        .take(limit.saturating_mul(2))
        .filter_map(|candidate| sanitize_tag(&candidate.tag))
        .filter(|tag| seen.insert(tag.clone()))
        .take(limit)
        .collect()
}

/// Suggested tags for the page `html` served from `page_url`.
pub fn suggest_tags(html: &str, page_url: &str, limit: usize) -> Vec<String> {
    let texts = page_extractor::extract_texts(html, page_url);
    let suggestions = suggest_from_texts(&texts, limit);
    tracing::debug!(url = %page_url, count = suggestions.len(), "content_tags_suggested");
    suggestions
}

/// Drops suggestions already present among `current_tags`, ignoring case.
pub fn filter_existing(suggestions: Vec<String>, current_tags: &[String]) -> Vec<String> {
    let current: HashSet<String> = current_tags.iter().map(|t| t.to_lowercase()).collect();
    suggestions
        .into_iter()
        .filter(|s| !current.contains(&s.to_lowercase()))
        .collect()
}
