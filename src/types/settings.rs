use serde::{Deserialize, Serialize};

/// Top-level settings container.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PinmarkSettings {
    pub api: ApiSettings,
    pub tags: TagSettings,
    pub suggestions: SuggestionSettings,
}

impl PinmarkSettings {
    /// Checks the invariants serde cannot express.
    pub fn validate(&self) -> Result<(), String> {
        if !(self.api.base_url.starts_with("https://") || self.api.base_url.starts_with("http://")) {
            return Err(format!("api.base_url must be an http(s) URL: {}", self.api.base_url));
        }
        if self.api.max_retries == 0 {
            return Err("api.max_retries must be at least 1".to_string());
        }
        if self.tags.recent_tags_count_max == 0 {
            return Err("tags.recent_tags_count_max must be at least 1".to_string());
        }
        if self.suggestions.limit == 0 {
            return Err("suggestions.limit must be at least 1".to_string());
        }
        Ok(())
    }
}

/// Remote API and retry policy.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ApiSettings {
    pub base_url: String,
    /// Hard ceiling on attempts per request, first attempt included.
    pub max_retries: u32,
    /// Delay used once `retry_delays_ms` is exhausted.
    pub retry_delay_ms: u64,
    pub retry_delays_ms: Vec<u64>,
    pub request_timeout_secs: u64,
    /// `user:TOKEN`; `PINMARK_AUTH_TOKEN` overrides it.
    pub auth_token: Option<String>,
    pub strip_url_hash: bool,
}

impl Default for ApiSettings {
    fn default() -> Self {
        Self {
            base_url: "https://api.pinboard.in/v1/".to_string(),
            max_retries: 2,
            retry_delay_ms: 1000,
            retry_delays_ms: vec![1000, 2000, 5000],
            request_timeout_secs: 30,
            auth_token: None,
            strip_url_hash: false,
        }
    }
}

/// Recent-tag cache and frequency tracking.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TagSettings {
    pub recent_tags_count_max: usize,
    pub init_recent_posts_count: u32,
    pub cache_timeout_secs: u64,
    /// A tag used within this many days is shown as recent.
    pub recent_days: i64,
}

impl Default for TagSettings {
    fn default() -> Self {
        Self {
            recent_tags_count_max: 32,
            init_recent_posts_count: 15,
            cache_timeout_secs: 300,
            recent_days: 7,
        }
    }
}

/// Content-derived suggestions.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SuggestionSettings {
    pub limit: usize,
}

impl Default for SuggestionSettings {
    fn default() -> Self {
        Self { limit: 30 }
    }
}
