//! Tag Store for pinmark.
//!
//! Tracks how often each tag is used and maintains a ranked, TTL-cached view
//! of recent tags. Both the frequency map and the cache entries live in the
//! persisted key-value store; the recent view is recomputed from the shared
//! recent-tag memory once its cache entry expires.
//!
//! The profile-wide view has one cache entry. A view scoped to a site reads
//! only that site's memory and is cached under the site origin.

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use reqwest::Url;
use serde_json::{Map, Value};
use tokio::sync::Mutex;

use crate::managers::kv_store::KeyValueStore;
use crate::managers::recent_tag_memory::{site_origin, SharedRecentTagStore};
use crate::services::sanitizer::{is_valid_tag, sanitize_tag};
use crate::types::bookmark::BookmarkRecord;
use crate::types::errors::TagStoreError;
use crate::types::settings::TagSettings;
use crate::types::tag::{
    CacheEntry, CacheStatus, DisplayTag, MostUsedTag, RecentTagOptions, TagBookmarkRef, TagRecord,
    TagStatistics,
};

/// Key of the persisted `{tag: count}` map.
pub const TAG_FREQUENCY_KEY: &str = "pinmark_tag_frequency";
/// Key of the persisted recent-tags cache entry.
pub const RECENT_TAGS_CACHE_KEY: &str = "pinmark_recent_tags_cache";
/// Key of the per-site cache entries, by site origin.
pub const SITE_RECENT_TAGS_CACHE_KEY: &str = "pinmark_site_recent_tags_cache";

const MS_PER_DAY: i64 = 24 * 60 * 60 * 1000;

type FrequencyMap = BTreeMap<String, u64>;
type SiteCaches = BTreeMap<String, CacheEntry>;

/// The part of the tag store the API client drives after writes.
#[async_trait]
pub trait TagUsageRecorder: Send + Sync {
    /// Counts one use of `tag` and moves it into the cached recent view.
    async fn record_tag_usage(&self, tag: &str) -> Result<(), TagStoreError>;
    /// Remembers `tag` for the site of `site_url` in the shared memory.
    async fn add_tag_to_recent(&self, tag: &str, site_url: &str) -> Result<bool, TagStoreError>;
}

/// Tag frequency and recent-view store.
pub struct TagStore {
    kv: Arc<dyn KeyValueStore>,
    recent_memory: Arc<dyn SharedRecentTagStore>,
    settings: TagSettings,
    cache_lock: Mutex<()>,
}

impl TagStore {
    pub fn new(
        kv: Arc<dyn KeyValueStore>,
        recent_memory: Arc<dyn SharedRecentTagStore>,
        settings: TagSettings,
    ) -> Self {
        Self {
            kv,
            recent_memory,
            settings,
            cache_lock: Mutex::new(()),
        }
    }

    fn now_ms() -> i64 {
        Utc::now().timestamp_millis()
    }

    fn timeout_ms(&self) -> i64 {
        (self.settings.cache_timeout_secs as i64).saturating_mul(1000)
    }

    // --- persisted state ---

    async fn load_frequency(&self) -> Result<FrequencyMap, TagStoreError> {
        match self.kv.get(TAG_FREQUENCY_KEY).await? {
            Some(value) => Ok(serde_json::from_value(value).unwrap_or_else(|e| {
                tracing::warn!(error = %e, "tag_frequency_corrupt");
                FrequencyMap::new()
            })),
            None => Ok(FrequencyMap::new()),
        }
    }

    async fn load_cache(&self) -> Result<Option<CacheEntry>, TagStoreError> {
        match self.kv.get(RECENT_TAGS_CACHE_KEY).await? {
            Some(value) => match Self::decode_cache(value) {
                Ok(entry) => Ok(Some(entry)),
                Err(e) => {
                    tracing::warn!(error = %e, "recent_tags_cache_discarded");
                    Ok(None)
                }
            },
            None => Ok(None),
        }
    }

    fn decode_cache(value: Value) -> Result<CacheEntry, TagStoreError> {
        serde_json::from_value(value).map_err(|e| TagStoreError::CorruptCache(e.to_string()))
    }

    async fn load_site_caches(&self) -> Result<SiteCaches, TagStoreError> {
        match self.kv.get(SITE_RECENT_TAGS_CACHE_KEY).await? {
            Some(value) => Ok(serde_json::from_value(value).unwrap_or_else(|e| {
                tracing::warn!(error = %e, "site_tags_cache_discarded");
                SiteCaches::new()
            })),
            None => Ok(SiteCaches::new()),
        }
    }

    async fn store_site_caches(&self, caches: &SiteCaches) -> Result<(), TagStoreError> {
        let value = serde_json::to_value(caches)
            .map_err(|e| TagStoreError::Storage(e.to_string()))?;
        self.store(SITE_RECENT_TAGS_CACHE_KEY, value).await
    }

    /// Origin of an `http`/`https` site URL.
    fn parse_site(site_url: &str) -> Result<String, TagStoreError> {
        let invalid = || TagStoreError::InvalidSiteUrl(site_url.to_string());
        let url = Url::parse(site_url).map_err(|_| invalid())?;
        if url.scheme() != "http" && url.scheme() != "https" {
            return Err(invalid());
        }
        site_origin(site_url).map_err(|_| invalid())
    }

    async fn store(&self, key: &str, value: Value) -> Result<(), TagStoreError> {
        let mut items = Map::new();
        items.insert(key.to_string(), value);
        self.kv.set(items).await?;
        Ok(())
    }

    async fn store_cache(&self, entry: &CacheEntry) -> Result<(), TagStoreError> {
        let value = serde_json::to_value(entry)
            .map_err(|e| TagStoreError::Storage(e.to_string()))?;
        self.store(RECENT_TAGS_CACHE_KEY, value).await
    }

    /// Sorts by count desc, then most recently used, then name.
    fn sort_by_usage(tags: &mut [TagRecord]) {
        tags.sort_by(|a, b| {
            b.count
                .cmp(&a.count)
                .then_with(|| b.last_used.cmp(&a.last_used))
                .then_with(|| a.name.cmp(&b.name))
        });
    }

    /// Sorts, truncates to the configured maximum and stamps with the current time.
    fn fresh_entry(&self, mut tags: Vec<TagRecord>) -> CacheEntry {
        Self::sort_by_usage(&mut tags);
        tags.truncate(self.settings.recent_tags_count_max);
        CacheEntry {
            tags,
            timestamp: Self::now_ms(),
        }
    }

    async fn process_and_cache(&self, tags: Vec<TagRecord>) -> Result<Vec<TagRecord>, TagStoreError> {
        let entry = self.fresh_entry(tags);
        self.store_cache(&entry).await?;
        Ok(entry.tags)
    }

    async fn process_and_cache_site(
        &self,
        origin: &str,
        tags: Vec<TagRecord>,
    ) -> Result<Vec<TagRecord>, TagStoreError> {
        let entry = self.fresh_entry(tags);
        let mut caches = self.load_site_caches().await?;
        caches.insert(origin.to_string(), entry.clone());
        self.store_site_caches(&caches).await?;
        Ok(entry.tags)
    }

    /// The recent view from `memory` joined with the frequency map. Names that
    /// are not valid tags are skipped. Frequency-only names are added when
    /// `with_frequency_only` is set.
    async fn recompute(
        &self,
        memory: &dyn SharedRecentTagStore,
        with_frequency_only: bool,
    ) -> Result<Vec<TagRecord>, TagStoreError> {
        let remembered = memory.get_recent_tags().await?;
        let frequency = self.load_frequency().await?;

        let mut seen = HashSet::new();
        let mut tags = Vec::new();
        for entry in remembered {
            if !is_valid_tag(&entry.name) || !seen.insert(entry.name.clone()) {
                continue;
            }
            let count = frequency.get(&entry.name).copied().unwrap_or(1);
            tags.push(TagRecord::new(&entry.name, count, Some(entry.last_used)));
        }
        for (name, count) in frequency.iter().filter(|_| with_frequency_only) {
            if is_valid_tag(name) && seen.insert(name.clone()) {
                tags.push(TagRecord::new(name, *count, None));
            }
        }

        tracing::debug!(tag_count = tags.len(), "recent_tags_recomputed");
        Ok(tags)
    }

    /// Returns the valid cached view, recomputing and re-caching it when needed.
    /// With `site_url` the view covers only tags remembered for that site.
    async fn recent_view(&self, site_url: Option<&str>) -> Result<Vec<TagRecord>, TagStoreError> {
        let site = match site_url {
            Some(url) => Some((url, Self::parse_site(url)?)),
            None => None,
        };

        let _guard = self.cache_lock.lock().await;
        let cached = match &site {
            Some((_, origin)) => self.load_site_caches().await?.remove(origin),
            None => self.load_cache().await?,
        };
        if let Some(entry) = cached {
            if entry.is_valid(Self::now_ms(), self.timeout_ms()) {
                return Ok(entry.tags);
            }
        }

        match site {
            Some((url, origin)) => {
                let memory = self.recent_memory.for_site(url)?;
                let tags = self.recompute(memory.as_ref(), false).await?;
                self.process_and_cache_site(&origin, tags).await
            }
            None => {
                let tags = self.recompute(self.recent_memory.as_ref(), true).await?;
                self.process_and_cache(tags).await
            }
        }
    }

    // --- display ---

    fn is_recent(&self, last_used: Option<DateTime<Utc>>, now: DateTime<Utc>) -> bool {
        match last_used {
            Some(at) => {
                let days = (now - at).num_milliseconds() as f64 / MS_PER_DAY as f64;
                days <= self.settings.recent_days as f64
            }
            None => false,
        }
    }

    fn to_display(&self, tag: TagRecord, now: DateTime<Utc>) -> DisplayTag {
        let mut parts = vec![format!("Tag: {}", tag.name)];
        if tag.count > 1 {
            parts.push(format!("Used {} times", tag.count));
        }
        if let Some(at) = tag.last_used {
            parts.push(format!("Last used {}", time_ago(at, now)));
        }

        DisplayTag {
            display_name: tag.name.clone(),
            is_recent: self.is_recent(tag.last_used, now),
            is_frequent: tag.count > 1,
            tooltip: parts.join(" | "),
            name: tag.name,
            count: tag.count,
            last_used: tag.last_used,
        }
    }

    fn annotate(&self, tags: Vec<TagRecord>) -> Vec<DisplayTag> {
        let now = Utc::now();
        tags.into_iter().map(|t| self.to_display(t, now)).collect()
    }

    // --- public operations ---

    /// The recent view annotated for display, minus `options.exclude` (exact match).
    pub async fn get_recent_tags(&self, options: &RecentTagOptions) -> Result<Vec<DisplayTag>, TagStoreError> {
        let tags = self
            .recent_view(options.site_url.as_deref())
            .await?
            .into_iter()
            .filter(|t| !options.exclude.contains(&t.name))
            .collect();
        Ok(self.annotate(tags))
    }

    /// The recent view minus `current`, compared case-insensitively after sanitization.
    pub async fn get_recent_tags_excluding_current(
        &self,
        current: &[String],
        site_url: Option<&str>,
    ) -> Result<Vec<DisplayTag>, TagStoreError> {
        let normalized: HashSet<String> = current
            .iter()
            .filter_map(|t| sanitize_tag(t))
            .map(|t| t.to_lowercase())
            .collect();

        let tags = self
            .recent_view(site_url)
            .await?
            .into_iter()
            .filter(|t| !normalized.contains(&t.name.to_lowercase()))
            .collect();
        Ok(self.annotate(tags))
    }

    /// Recent tags starting with `prefix` (any case), most frequent first.
    pub async fn get_tag_suggestions(&self, prefix: &str, limit: usize) -> Result<Vec<String>, TagStoreError> {
        let view = self.recent_view(None).await?;
        let frequency = self.load_frequency().await?;
        let prefix = prefix.to_lowercase();

        let mut matches: Vec<(String, u64)> = view
            .into_iter()
            .filter(|t| t.name.to_lowercase().starts_with(&prefix))
            .map(|t| {
                let count = frequency.get(&t.name).copied().unwrap_or(0);
                (t.name, count)
            })
            .collect();
        matches.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));

        Ok(matches.into_iter().take(limit).map(|(name, _)| name).collect())
    }

    /// Names from the frequency map, highest count first.
    pub async fn get_frequent_tags(&self, limit: usize) -> Result<Vec<String>, TagStoreError> {
        let mut entries: Vec<(String, u64)> = self.load_frequency().await?.into_iter().collect();
        entries.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        Ok(entries.into_iter().take(limit).map(|(name, _)| name).collect())
    }

    pub async fn cache_status(&self) -> Result<CacheStatus, TagStoreError> {
        let entry = match self.load_cache().await? {
            Some(entry) => entry,
            None => return Ok(CacheStatus::Empty),
        };

        let now = Self::now_ms();
        let age_ms = entry.age_ms(now);
        let tag_count = entry.tags.len();
        let last_updated = Utc
            .timestamp_millis_opt(entry.timestamp)
            .single()
            .map(|t| t.to_rfc3339())
            .unwrap_or_default();

        if entry.is_valid(now, self.timeout_ms()) {
            Ok(CacheStatus::Valid {
                age_ms,
                tag_count,
                last_updated,
            })
        } else {
            Ok(CacheStatus::Expired {
                age_ms,
                tag_count,
                last_updated,
            })
        }
    }

    pub async fn get_tag_statistics(&self) -> Result<TagStatistics, TagStoreError> {
        let view = self.recent_view(None).await?;
        let frequency = self.load_frequency().await?;

        let mut most_used: Option<MostUsedTag> = None;
        for (tag, count) in &frequency {
            if most_used.as_ref().map_or(true, |m| *count > m.count) {
                most_used = Some(MostUsedTag {
                    tag: tag.clone(),
                    count: *count,
                });
            }
        }

        let associations: usize = view.iter().map(|t| t.bookmarks.len()).sum();
        let urls: HashSet<&str> = view
            .iter()
            .flat_map(|t| t.bookmarks.iter().map(|b| b.url.as_str()))
            .collect();
        let average_tags_per_bookmark = if urls.is_empty() {
            0.0
        } else {
            associations as f64 / urls.len() as f64
        };

        Ok(TagStatistics {
            total_unique_tags: view.len(),
            total_usage_count: frequency.values().sum(),
            most_used_tag: most_used,
            average_tags_per_bookmark,
            cache_status: self.cache_status().await?,
        })
    }

    /// Truncates an oversized cache entry. Returns how many tags were dropped.
    pub async fn cleanup_old_tags(&self) -> Result<usize, TagStoreError> {
        let _guard = self.cache_lock.lock().await;
        let mut entry = match self.load_cache().await? {
            Some(entry) => entry,
            None => return Ok(0),
        };

        let max = self.settings.recent_tags_count_max;
        if entry.tags.len() <= max {
            return Ok(0);
        }

        let removed = entry.tags.len() - max;
        Self::sort_by_usage(&mut entry.tags);
        entry.tags.truncate(max);
        self.store_cache(&entry).await?;
        tracing::info!(removed, "recent_tags_cleaned_up");
        Ok(removed)
    }

    /// Builds the recent view from bookmarks and caches it.
    pub async fn cache_tags_from_bookmarks(
        &self,
        bookmarks: &[BookmarkRecord],
    ) -> Result<Vec<TagRecord>, TagStoreError> {
        let mut order: Vec<String> = Vec::new();
        let mut by_name: BTreeMap<String, TagRecord> = BTreeMap::new();

        for bookmark in bookmarks {
            let time = DateTime::parse_from_rfc3339(&bookmark.time)
                .ok()
                .map(|t| t.with_timezone(&Utc));
            for name in bookmark.tags.iter().map(|t| t.trim()).filter(|t| !t.is_empty()) {
                let record = by_name.entry(name.to_string()).or_insert_with(|| {
                    order.push(name.to_string());
                    TagRecord::new(name, 0, None)
                });
                record.count += 1;
                record.bookmarks.push(TagBookmarkRef {
                    url: bookmark.url.clone(),
                    description: bookmark.description.clone(),
                    time: bookmark.time.clone(),
                });
                if time.is_some() && (record.last_used.is_none() || time > record.last_used) {
                    record.last_used = time;
                }
            }
        }

        let tags = order
            .iter()
            .filter_map(|name| by_name.remove(name))
            .collect();

        let _guard = self.cache_lock.lock().await;
        self.process_and_cache(tags).await
    }

    /// Drops the profile-wide and every per-site cache entry.
    pub async fn clear_cache(&self) -> Result<(), TagStoreError> {
        let _guard = self.cache_lock.lock().await;
        self.kv.remove(RECENT_TAGS_CACHE_KEY).await?;
        self.kv.remove(SITE_RECENT_TAGS_CACHE_KEY).await?;
        Ok(())
    }

    pub async fn reset_tag_frequency(&self) -> Result<(), TagStoreError> {
        let _guard = self.cache_lock.lock().await;
        self.kv.remove(TAG_FREQUENCY_KEY).await?;
        Ok(())
    }
}

#[async_trait]
impl TagUsageRecorder for TagStore {
    async fn record_tag_usage(&self, tag: &str) -> Result<(), TagStoreError> {
        let tag = sanitize_tag(tag).ok_or_else(|| TagStoreError::InvalidTag(tag.to_string()))?;
        let tag = tag.as_str();

        let _guard = self.cache_lock.lock().await;

        let mut frequency = self.load_frequency().await?;
        let count = frequency.entry(tag.to_string()).or_insert(0);
        *count += 1;
        let count = *count;
        let value = serde_json::to_value(&frequency)
            .map_err(|e| TagStoreError::Storage(e.to_string()))?;
        self.store(TAG_FREQUENCY_KEY, value).await?;

        let mut tags = match self.load_cache().await? {
            Some(entry) if entry.is_valid(Self::now_ms(), self.timeout_ms()) => entry.tags,
            _ => self.recompute(self.recent_memory.as_ref(), true).await?,
        };

        let now = Utc::now();
        match tags.iter_mut().find(|t| t.name == tag) {
            Some(existing) => {
                existing.count = count;
                existing.last_used = Some(now);
            }
            None => tags.push(TagRecord::new(tag, count, Some(now))),
        }

        self.process_and_cache(tags).await?;
        tracing::debug!(tag, count, "tag_usage_recorded");
        Ok(())
    }

    async fn add_tag_to_recent(&self, tag: &str, site_url: &str) -> Result<bool, TagStoreError> {
        let sanitized = sanitize_tag(tag).ok_or_else(|| TagStoreError::InvalidTag(tag.to_string()))?;
        let origin = Self::parse_site(site_url)?;

        let _guard = self.cache_lock.lock().await;
        let added = self.recent_memory.add_tag(&sanitized, site_url).await?;

        let mut caches = self.load_site_caches().await?;
        if caches.remove(&origin).is_some() {
            self.store_site_caches(&caches).await?;
        }
        tracing::debug!(tag = %sanitized, site = %site_url, added, "tag_added_to_recent");
        Ok(added)
    }
}

/// Human-readable distance from `at` to `now`: today, yesterday, days, weeks or months.
pub fn time_ago(at: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let days = (now - at).num_milliseconds().div_euclid(MS_PER_DAY);
    match days {
        d if d <= 0 => "today".to_string(),
        1 => "yesterday".to_string(),
        d if d < 7 => format!("{} days ago", d),
        d if d < 30 => format!("{} weeks ago", d / 7),
        d => format!("{} months ago", d / 30),
    }
}
