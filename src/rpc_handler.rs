//! RPC method handler for the pinmark JSON-RPC protocol.
//!
//! Kept apart from `rpc_server.rs` so it can be tested without stdin/stdout.
//! `handle_method` dispatches a method call to the services of an [`App`].

use serde::de::DeserializeOwned;
use serde_json::{json, Value};

use crate::app::App;
use crate::managers::tag_store::TagUsageRecorder;
use crate::services::tag_suggester;
use crate::types::bookmark::{BookmarkRecord, TagData};
use crate::types::settings::PinmarkSettings;
use crate::types::tag::RecentTagOptions;

const DEFAULT_SUGGESTION_LIMIT: usize = 10;
const DEFAULT_FREQUENT_LIMIT: usize = 20;
const REDACTED: &str = "********";

fn str_param<'a>(params: &'a Value, key: &str) -> Result<&'a str, String> {
    params
        .get(key)
        .and_then(|v| v.as_str())
        .ok_or_else(|| format!("missing {}", key))
}

fn http_url_param<'a>(params: &'a Value, key: &str) -> Result<&'a str, String> {
    let url = str_param(params, key)?;
    if !url.starts_with("http://") && !url.starts_with("https://") {
        return Err(format!("invalid {}: must start with http:// or https://", key));
    }
    Ok(url)
}

fn usize_param(params: &Value, key: &str) -> Option<usize> {
    params.get(key).and_then(|v| v.as_u64()).map(|n| n as usize)
}

/// An optional count that must fit in `u32`.
fn count_param(params: &Value, key: &str) -> Result<Option<u32>, String> {
    match params.get(key).and_then(|v| v.as_u64()) {
        Some(n) => u32::try_from(n)
            .map(Some)
            .map_err(|_| format!("invalid {}: {} is out of range", key, n)),
        None => Ok(None),
    }
}

fn strings_param(params: &Value, key: &str) -> Vec<String> {
    params
        .get(key)
        .and_then(|v| v.as_array())
        .map(|items| {
            items
                .iter()
                .filter_map(|v| v.as_str().map(str::to_string))
                .collect()
        })
        .unwrap_or_default()
}

fn from_params<T: DeserializeOwned>(params: &Value) -> Result<T, String> {
    serde_json::from_value(params.clone()).map_err(|e| format!("invalid params: {}", e))
}

/// Settings as shown to the UI; the token never leaves the process.
fn redacted(mut settings: PinmarkSettings) -> PinmarkSettings {
    if settings.api.auth_token.is_some() {
        settings.api.auth_token = Some(REDACTED.to_string());
    }
    settings
}

fn to_json<T: serde::Serialize>(value: &T) -> Result<Value, String> {
    serde_json::to_value(value).map_err(|e| e.to_string())
}

/// Dispatch a JSON-RPC method call.
///
/// Returns `Ok(Value)` on success or `Err(String)` with an error message.
pub async fn handle_method(app: &App, method: &str, params: &Value) -> Result<Value, String> {
    let services = app.services();
    let client = &services.client;
    let tag_store = &services.tag_store;

    match method {
        // ─── Bookmarks ───
        "bookmark.get" => {
            let url = http_url_param(params, "url")?;
            let title = params.get("title").and_then(|v| v.as_str()).unwrap_or("");
            to_json(&client.get_bookmark_for_url(url, title).await)
        }
        "bookmark.recent" => {
            let count = count_param(params, "count")?;
            to_json(&client.get_recent_bookmarks(count).await)
        }
        "bookmark.save" => {
            let record: BookmarkRecord = from_params(params)?;
            http_url_param(params, "url")?;
            to_json(&client.save_bookmark(&record).await.map_err(|e| e.to_string())?)
        }
        "bookmark.delete" => {
            let url = http_url_param(params, "url")?;
            to_json(&client.delete_bookmark(url).await.map_err(|e| e.to_string())?)
        }

        // ─── Tags on a bookmark ───
        "tag.save" => {
            let tag_data: TagData = from_params(params)?;
            http_url_param(params, "url")?;
            to_json(&client.save_tag(&tag_data).await.map_err(|e| e.to_string())?)
        }
        "tag.delete" => {
            let tag_data: TagData = from_params(params)?;
            http_url_param(params, "url")?;
            to_json(&client.delete_tag(&tag_data).await.map_err(|e| e.to_string())?)
        }

        // ─── Tag store ───
        "tags.recent" => {
            let options: RecentTagOptions = from_params(params)?;
            to_json(&tag_store.get_recent_tags(&options).await.map_err(|e| e.to_string())?)
        }
        "tags.recent_excluding" => {
            let current = strings_param(params, "current");
            let site_url = params.get("site_url").and_then(|v| v.as_str());
            to_json(
                &tag_store
                    .get_recent_tags_excluding_current(&current, site_url)
                    .await
                    .map_err(|e| e.to_string())?,
            )
        }
        "tags.suggest" => {
            let prefix = params.get("prefix").and_then(|v| v.as_str()).unwrap_or("");
            let limit = usize_param(params, "limit").unwrap_or(DEFAULT_SUGGESTION_LIMIT);
            to_json(&tag_store.get_tag_suggestions(prefix, limit).await.map_err(|e| e.to_string())?)
        }
        "tags.frequent" => {
            let limit = usize_param(params, "limit").unwrap_or(DEFAULT_FREQUENT_LIMIT);
            to_json(&tag_store.get_frequent_tags(limit).await.map_err(|e| e.to_string())?)
        }
        "tags.record" => {
            let tag = str_param(params, "tag")?;
            tag_store.record_tag_usage(tag).await.map_err(|e| e.to_string())?;
            Ok(json!({"ok": true}))
        }
        "tags.stats" => to_json(&tag_store.get_tag_statistics().await.map_err(|e| e.to_string())?),
        "tags.cleanup" => {
            let removed = tag_store.cleanup_old_tags().await.map_err(|e| e.to_string())?;
            Ok(json!({"removed": removed}))
        }
        "tags.clear_cache" => {
            tag_store.clear_cache().await.map_err(|e| e.to_string())?;
            Ok(json!({"ok": true}))
        }
        "tags.reset_frequency" => {
            tag_store.reset_tag_frequency().await.map_err(|e| e.to_string())?;
            Ok(json!({"ok": true}))
        }
        "tags.refresh" => {
            let count = count_param(params, "count")?;
            let bookmarks = client.get_recent_bookmarks(count).await;
            to_json(
                &tag_store
                    .cache_tags_from_bookmarks(&bookmarks)
                    .await
                    .map_err(|e| e.to_string())?,
            )
        }

        // ─── Content suggestions ───
        "content.suggest" => {
            let html = str_param(params, "html")?;
            let url = params.get("url").and_then(|v| v.as_str()).unwrap_or("");
            let limit = usize_param(params, "limit").unwrap_or(services.settings.suggestions.limit);
            let current = strings_param(params, "current_tags");
            let suggestions = tag_suggester::suggest_tags(html, url, limit);
            Ok(json!(tag_suggester::filter_existing(suggestions, &current)))
        }

        // ─── Connection ───
        "connection.test" => Ok(json!({"ok": client.test_connection().await})),

        // ─── Settings ───
        "settings.get" => to_json(&redacted(app.settings())),
        "settings.set" => {
            let key = str_param(params, "key")?;
            let value = params.get("value").cloned().ok_or("missing value")?;
            let settings = app.update_setting(key, value).map_err(|e| e.to_string())?;
            to_json(&redacted(settings))
        }

        _ => Err(format!("unknown method: {}", method)),
    }
}
