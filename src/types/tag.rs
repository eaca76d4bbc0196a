use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A bookmark a tag was seen on. Kept for statistics only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TagBookmarkRef {
    pub url: String,
    pub description: String,
    pub time: String,
}

/// Usage metadata for one tag string.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TagRecord {
    pub name: String,
    pub count: u64,
    pub last_used: Option<DateTime<Utc>>,
    #[serde(default)]
    pub bookmarks: Vec<TagBookmarkRef>,
}

impl TagRecord {
    pub fn new(name: &str, count: u64, last_used: Option<DateTime<Utc>>) -> Self {
        Self {
            name: name.to_string(),
            count,
            last_used,
            bookmarks: Vec::new(),
        }
    }
}

/// A timestamped snapshot of the recent-tags view.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub tags: Vec<TagRecord>,
    /// Creation time in epoch milliseconds.
    pub timestamp: i64,
}

impl CacheEntry {
    pub fn age_ms(&self, now_ms: i64) -> i64 {
        now_ms - self.timestamp
    }

    pub fn is_valid(&self, now_ms: i64, timeout_ms: i64) -> bool {
        self.age_ms(now_ms) < timeout_ms
    }
}

/// A tag ready to be shown to the user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DisplayTag {
    pub name: String,
    pub display_name: String,
    pub count: u64,
    pub last_used: Option<DateTime<Utc>>,
    pub is_recent: bool,
    pub is_frequent: bool,
    pub tooltip: String,
}

/// Options for reading the recent-tags view.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RecentTagOptions {
    /// Tags already on the current bookmark; these are left out.
    pub exclude: Vec<String>,
    /// Limits the view to tags remembered for this site's origin.
    pub site_url: Option<String>,
}

/// One row of the site-scoped shared recent-tag memory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecentTagEntry {
    pub name: String,
    pub last_used: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MostUsedTag {
    pub tag: String,
    pub count: u64,
}

/// State of the cached recent-tags entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum CacheStatus {
    Empty,
    Valid {
        age_ms: i64,
        tag_count: usize,
        last_updated: String,
    },
    Expired {
        age_ms: i64,
        tag_count: usize,
        last_updated: String,
    },
}

/// Aggregate view over tag usage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TagStatistics {
    pub total_unique_tags: usize,
    pub total_usage_count: u64,
    pub most_used_tag: Option<MostUsedTag>,
    pub average_tags_per_bookmark: f64,
    pub cache_status: CacheStatus,
}

/// A token mined from page content together with its in-document frequency.
#[derive(Debug, Clone, PartialEq)]
pub struct SuggestionCandidate {
    pub tag: String,
    pub lower: String,
    pub frequency: usize,
}
