//! Pinboard-style API client.
//!
//! Issues authenticated GET requests against the XML API, retries transient
//! failures, maps responses into [`BookmarkRecord`]s and feeds tags of
//! successful writes into the tag store.
//!
//! Reads never fail: without a credential or on any error they return the
//! documented empty shapes. Writes return errors, except for the missing
//! credential case which yields [`SaveResult::no_auth`].

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use crate::managers::tag_store::TagUsageRecorder;
use crate::services::credentials::CredentialProvider;
use crate::services::http_transport::HttpTransport;
use crate::services::sanitizer::sanitize_tag;
use crate::types::bookmark::{BookmarkRecord, SaveResult, TagData};
use crate::types::errors::ApiError;
use crate::types::settings::PinmarkSettings;

/// Parses every `post` element of a response, in document order.
pub fn parse_posts(xml: &str) -> Result<Vec<BookmarkRecord>, ApiError> {
    let doc = roxmltree::Document::parse(xml)
        .map_err(|e| ApiError::MalformedResponse(e.to_string()))?;

    let records = doc
        .descendants()
        .filter(|node| node.has_tag_name("post"))
        .map(|post| {
            let attr = |name: &str| post.attribute(name).unwrap_or_default().to_string();
            BookmarkRecord {
                url: attr("href"),
                description: attr("description"),
                extended: attr("extended"),
                tags: post
                    .attribute("tag")
                    .unwrap_or_default()
                    .split_whitespace()
                    .map(str::to_string)
                    .collect(),
                time: attr("time"),
                shared: attr("shared"),
                toread: attr("toread"),
                hash: attr("hash"),
            }
        })
        .collect();
    Ok(records)
}

/// Parses the `result` element of a write response. A document without one
/// counts as a completed write.
pub fn parse_result(xml: &str) -> Result<SaveResult, ApiError> {
    let doc = roxmltree::Document::parse(xml)
        .map_err(|e| ApiError::MalformedResponse(e.to_string()))?;

    let result = match doc.descendants().find(|node| node.has_tag_name("result")) {
        Some(result) => result,
        None => return Ok(SaveResult::from_code(SaveResult::DONE, "")),
    };

    let text = result.text().unwrap_or_default().trim();
    let code = result.attribute("code").unwrap_or(text);
    Ok(SaveResult::from_code(code, text))
}

/// Client for the remote bookmarking API.
pub struct PinboardClient {
    transport: Arc<dyn HttpTransport>,
    credentials: Arc<dyn CredentialProvider>,
    tag_store: Arc<dyn TagUsageRecorder>,
    settings: PinmarkSettings,
}

impl PinboardClient {
    pub fn new(
        transport: Arc<dyn HttpTransport>,
        credentials: Arc<dyn CredentialProvider>,
        tag_store: Arc<dyn TagUsageRecorder>,
        settings: PinmarkSettings,
    ) -> Self {
        Self {
            transport,
            credentials,
            tag_store,
            settings,
        }
    }

    /// Trims, optionally drops the `#fragment`, then strips trailing slashes.
    pub fn normalize_url(&self, url: &str) -> String {
        let mut url = url.trim();
        if self.settings.api.strip_url_hash {
            if let Some(idx) = url.find('#') {
                url = &url[..idx];
            }
        }
        url.trim_end_matches('/').to_string()
    }

    /// Full request URL with percent-encoded parameters and the auth fragment.
    fn request_url(&self, endpoint: &str, params: &[(&str, &str)]) -> Result<String, ApiError> {
        let auth = self.credentials.credential_param().ok_or(ApiError::NoCredential)?;

        let mut url = format!("{}/{}", self.settings.api.base_url.trim_end_matches('/'), endpoint);
        let query: Vec<String> = params
            .iter()
            .map(|(key, value)| format!("{}={}", key, urlencoding::encode(value)))
            .collect();
        if !query.is_empty() {
            url.push('?');
            url.push_str(&query.join("&"));
        }

        url.push(if url.contains('?') { '&' } else { '?' });
        url.push_str(&auth);
        Ok(url)
    }

    /// Delay before the retry following attempt number `attempt` (zero-based).
    pub fn retry_delay(&self, attempt: usize) -> Duration {
        let ms = self
            .settings
            .api
            .retry_delays_ms
            .get(attempt)
            .copied()
            .unwrap_or(self.settings.api.retry_delay_ms);
        Duration::from_millis(ms)
    }

    /// Sanitized tags of a saved record, unusable ones dropped, each once in first-seen order.
    fn trackable_tags(tags: &[String]) -> Vec<String> {
        let mut seen = HashSet::new();
        tags.iter()
            .filter_map(|t| sanitize_tag(t))
            .filter(|t| seen.insert(t.clone()))
            .collect()
    }

    async fn send_once(&self, url: &str) -> Result<String, ApiError> {
        let response = self.transport.get(url).await?;
        if response.status == 401 {
            return Err(ApiError::AuthFailed);
        }
        if !response.is_success() {
            return Err(ApiError::Http {
                status: response.status,
                reason: response.reason,
            });
        }
        Ok(response.body)
    }

    /// Sends a request, retrying retryable failures up to `max_retries` attempts in total.
    async fn request(&self, endpoint: &str, params: &[(&str, &str)]) -> Result<String, ApiError> {
        let url = self.request_url(endpoint, params)?;
        let max_attempts = self.settings.api.max_retries.max(1) as usize;

        let mut attempt = 0;
        loop {
            match self.send_once(&url).await {
                Ok(body) => return Ok(body),
                Err(e) if e.is_retryable() && attempt + 1 < max_attempts => {
                    let delay = self.retry_delay(attempt);
                    tracing::warn!(
                        endpoint,
                        attempt = attempt + 1,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "api_request_retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => {
                    tracing::debug!(endpoint, attempts = attempt + 1, error = %e, "api_request_failed");
                    return Err(e);
                }
            }
        }
    }

    // --- reads ---

    /// The bookmark stored for `url`, or an empty record titled `title`.
    pub async fn get_bookmark_for_url(&self, url: &str, title: &str) -> BookmarkRecord {
        if !self.credentials.has_credential() {
            return BookmarkRecord::empty(url, title);
        }

        let clean = self.normalize_url(url);
        let fetched = match self.request("posts/get", &[("url", clean.as_str())]).await {
            Ok(body) => parse_posts(&body),
            Err(e) => Err(e),
        };

        match fetched {
            Ok(posts) => posts
                .into_iter()
                .next()
                .unwrap_or_else(|| BookmarkRecord::empty(url, title)),
            Err(e) => {
                tracing::warn!(url = %clean, error = %e, "bookmark_fetch_failed");
                BookmarkRecord::empty(url, title)
            }
        }
    }

    /// The most recent bookmarks; `None` uses the configured count.
    pub async fn get_recent_bookmarks(&self, count: Option<u32>) -> Vec<BookmarkRecord> {
        if !self.credentials.has_credential() {
            return Vec::new();
        }

        let count = count
            .unwrap_or(self.settings.tags.init_recent_posts_count)
            .to_string();
        let fetched = match self.request("posts/recent", &[("count", count.as_str())]).await {
            Ok(body) => parse_posts(&body),
            Err(e) => Err(e),
        };

        fetched.unwrap_or_else(|e| {
            tracing::warn!(error = %e, "recent_bookmarks_fetch_failed");
            Vec::new()
        })
    }

    /// Whether the configured credential is accepted.
    pub async fn test_connection(&self) -> bool {
        if !self.credentials.has_credential() {
            return false;
        }
        match self.request("user/api_token", &[]).await {
            Ok(_) => true,
            Err(e) => {
                tracing::info!(error = %e, "connection_test_failed");
                false
            }
        }
    }

    // --- writes ---

    /// Saves `record`, replacing any bookmark stored for its URL.
    pub async fn save_bookmark(&self, record: &BookmarkRecord) -> Result<SaveResult, ApiError> {
        if !self.credentials.has_credential() {
            return Ok(SaveResult::no_auth());
        }

        let url = self.normalize_url(&record.url);
        let tags = record.tag_string();
        let mut params: Vec<(&str, &str)> = vec![("url", url.as_str())];
        for (key, value) in [
            ("description", record.description.as_str()),
            ("extended", record.extended.as_str()),
            ("tags", tags.as_str()),
            ("shared", record.shared.as_str()),
            ("toread", record.toread.as_str()),
        ] {
            if !value.is_empty() {
                params.push((key, value));
            }
        }
        params.push(("replace", "yes"));
        if !record.time.is_empty() {
            params.push(("dt", record.time.as_str()));
        }

        let body = self.request("posts/add", &params).await?;
        let result = parse_result(&body)?;

        if result.success {
            tracing::info!(url = %url, tag_count = record.tags.len(), "bookmark_saved");
            for tag in Self::trackable_tags(&record.tags) {
                if let Err(e) = self.tag_store.record_tag_usage(&tag).await {
                    tracing::warn!(tag = %tag, error = %e, "tag_usage_record_failed");
                }
            }
        } else {
            tracing::warn!(url = %url, code = %result.code, "bookmark_save_rejected");
        }
        Ok(result)
    }

    /// Adds `tag_data.value` to the bookmark at `tag_data.url`.
    pub async fn save_tag(&self, tag_data: &TagData) -> Result<SaveResult, ApiError> {
        let tag = sanitize_tag(&tag_data.value)
            .ok_or_else(|| ApiError::Validation(format!("unusable tag value '{}'", tag_data.value)))?;
        if !self.credentials.has_credential() {
            return Ok(SaveResult::no_auth());
        }

        let title = tag_data.description.clone().unwrap_or_default();
        let current = self.get_bookmark_for_url(&tag_data.url, &title).await;
        let updated = tag_data.merge_into(current.with_tag(&tag));

        if let Err(e) = self.tag_store.add_tag_to_recent(&tag, &tag_data.url).await {
            tracing::warn!(tag = %tag, url = %tag_data.url, error = %e, "recent_tag_add_failed");
        }

        self.save_bookmark(&updated).await
    }

    /// Removes every exact match of `tag_data.value` from the bookmark at `tag_data.url`.
    pub async fn delete_tag(&self, tag_data: &TagData) -> Result<SaveResult, ApiError> {
        let tag = tag_data.value.trim();
        if tag.is_empty() {
            return Err(ApiError::Validation("tag value is empty".to_string()));
        }
        if !self.credentials.has_credential() {
            return Ok(SaveResult::no_auth());
        }

        let title = tag_data.description.clone().unwrap_or_default();
        let current = self.get_bookmark_for_url(&tag_data.url, &title).await;
        let updated = tag_data.merge_into(current.without_tag(tag));
        self.save_bookmark(&updated).await
    }

    pub async fn delete_bookmark(&self, url: &str) -> Result<SaveResult, ApiError> {
        if !self.credentials.has_credential() {
            return Ok(SaveResult::no_auth());
        }

        let clean = self.normalize_url(url);
        let body = self.request("posts/delete", &[("url", clean.as_str())]).await?;
        let result = parse_result(&body)?;
        tracing::info!(url = %clean, code = %result.code, "bookmark_deleted");
        Ok(result)
    }
}
