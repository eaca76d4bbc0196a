//! Unit tests for the API client: request shapes, credential handling,
//! retry behavior and the tag store side effects of writes.

#[path = "../support/mod.rs"]
mod support;

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;

use pinmark::database::Database;
use pinmark::managers::kv_store::{KeyValueStore, SqliteKeyValueStore};
use pinmark::managers::recent_tag_memory::SqliteRecentTagMemory;
use pinmark::managers::tag_store::{TagStore, TAG_FREQUENCY_KEY};
use pinmark::services::credentials::TokenCredentials;
use pinmark::services::http_transport::HttpTransport;
use pinmark::services::pinboard_client::PinboardClient;
use pinmark::types::bookmark::{BookmarkRecord, SaveResult, TagData};
use pinmark::types::errors::ApiError;
use pinmark::types::settings::{PinmarkSettings, TagSettings};

use support::{fast_settings, ok, status, EchoServer, RecordingTagStore, ScriptedTransport, DONE_XML};

const TOKEN: &str = "alice:ABC123";
const PAGE: &str = "https://example.com/page";

fn client_with(
    transport: Arc<dyn HttpTransport>,
    token: Option<&str>,
    tag_store: Arc<RecordingTagStore>,
    settings: PinmarkSettings,
) -> PinboardClient {
    PinboardClient::new(
        transport,
        Arc::new(TokenCredentials::new(token.map(str::to_string))),
        tag_store,
        settings,
    )
}

fn client(transport: Arc<dyn HttpTransport>) -> (PinboardClient, Arc<RecordingTagStore>) {
    let tag_store = RecordingTagStore::new();
    let client = client_with(transport, Some(TOKEN), tag_store.clone(), fast_settings(2));
    (client, tag_store)
}

fn record(url: &str, tags: &[&str]) -> BookmarkRecord {
    BookmarkRecord {
        url: url.to_string(),
        description: "Example".to_string(),
        tags: tags.iter().map(|t| t.to_string()).collect(),
        ..BookmarkRecord::default()
    }
}

const TWO_POSTS: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<posts user="alice">
  <post href="https://first.example/" description="First" extended="notes" tag="rust async" time="2024-05-02T10:00:00Z" shared="yes" toread="no" hash="h1"/>
  <post href="https://second.example/" description="Second" tag="" time="2024-05-01T10:00:00Z"/>
</posts>"#;

// ─── Without a credential ───

#[tokio::test]
async fn test_without_credential_nothing_is_sent() {
    let transport = ScriptedTransport::always(ok(DONE_XML));
    let tag_store = RecordingTagStore::new();
    let client = client_with(transport.clone(), None, tag_store.clone(), fast_settings(2));

    assert_eq!(
        client.get_bookmark_for_url(PAGE, "Title").await,
        BookmarkRecord::empty(PAGE, "Title")
    );
    assert!(client.get_recent_bookmarks(None).await.is_empty());
    assert!(!client.test_connection().await);
    assert_eq!(client.save_bookmark(&record(PAGE, &["a"])).await.unwrap(), SaveResult::no_auth());
    assert_eq!(client.delete_bookmark(PAGE).await.unwrap(), SaveResult::no_auth());
    assert_eq!(client.save_tag(&TagData::new(PAGE, "rust")).await.unwrap(), SaveResult::no_auth());
    assert_eq!(client.delete_tag(&TagData::new(PAGE, "rust")).await.unwrap(), SaveResult::no_auth());

    assert_eq!(transport.calls(), 0);
    assert!(tag_store.recorded().is_empty());
    assert!(tag_store.recent().is_empty());
}

// ─── Request shapes ───

#[tokio::test]
async fn test_auth_fragment_joins_with_question_mark_without_params() {
    let transport = ScriptedTransport::always(ok("<result>ok</result>"));
    let (client, _) = client(transport.clone());

    assert!(client.test_connection().await);

    assert_eq!(
        transport.requests(),
        vec!["https://api.pinboard.in/v1/user/api_token?auth_token=alice%3AABC123"]
    );
}

#[tokio::test]
async fn test_auth_fragment_joins_with_ampersand_after_params() {
    let transport = ScriptedTransport::always(ok(TWO_POSTS));
    let (client, _) = client(transport.clone());

    client.get_recent_bookmarks(None).await;

    assert_eq!(
        transport.requests(),
        vec!["https://api.pinboard.in/v1/posts/recent?count=15&auth_token=alice%3AABC123"]
    );
}

#[tokio::test]
async fn test_save_bookmark_omits_empty_fields() {
    let transport = ScriptedTransport::always(ok(DONE_XML));
    let (client, _) = client(transport.clone());
    let mut bookmark = record("https://example.com/a b/", &["x", "y"]);
    bookmark.time = "2024-05-01T10:00:00Z".to_string();

    client.save_bookmark(&bookmark).await.unwrap();

    assert_eq!(
        transport.requests()[0],
        "https://api.pinboard.in/v1/posts/add?url=https%3A%2F%2Fexample.com%2Fa%20b\
         &description=Example&tags=x%20y&replace=yes&dt=2024-05-01T10%3A00%3A00Z\
         &auth_token=alice%3AABC123"
    );
}

#[tokio::test]
async fn test_strip_url_hash_setting() {
    let transport = ScriptedTransport::always(ok("<posts/>"));
    let mut settings = fast_settings(1);
    settings.api.strip_url_hash = true;
    let stripping = client_with(transport.clone(), Some(TOKEN), RecordingTagStore::new(), settings);
    let (keeping, _) = client(transport.clone());

    stripping.get_bookmark_for_url("https://example.com/a/#frag", "").await;
    keeping.get_bookmark_for_url("https://example.com/a#frag", "").await;

    let requests = transport.requests();
    assert!(requests[0].contains("url=https%3A%2F%2Fexample.com%2Fa&"));
    assert!(requests[1].contains("url=https%3A%2F%2Fexample.com%2Fa%23frag&"));
}

#[test]
fn test_normalize_url_trims_whitespace_and_slashes() {
    let (client, _) = client(ScriptedTransport::always(ok(DONE_XML)));
    assert_eq!(client.normalize_url("  https://example.com/a//  "), "https://example.com/a");
    assert_eq!(client.normalize_url("https://example.com/a#x/"), "https://example.com/a#x");
}

// ─── Reads ───

#[tokio::test]
async fn test_recent_bookmarks_keep_document_order() {
    let transport = ScriptedTransport::always(ok(TWO_POSTS));
    let (client, _) = client(transport.clone());

    let bookmarks = client.get_recent_bookmarks(Some(2)).await;

    assert!(transport.requests()[0].contains("posts/recent?count=2&"));
    assert_eq!(bookmarks.len(), 2);
    let first = &bookmarks[0];
    assert_eq!(first.url, "https://first.example/");
    assert_eq!(first.description, "First");
    assert_eq!(first.extended, "notes");
    assert_eq!(first.tags, vec!["rust", "async"]);
    assert_eq!(first.shared, "yes");
    assert_eq!(first.hash, "h1");
    let second = &bookmarks[1];
    assert_eq!(second.url, "https://second.example/");
    assert!(second.tags.is_empty());
    assert_eq!(second.toread, "");
}

#[tokio::test]
async fn test_read_failures_degrade_to_empty_shapes() {
    let transport = ScriptedTransport::always(ok("<html><body>maintenance"));
    let (client, _) = client(transport.clone());

    assert_eq!(client.get_bookmark_for_url(PAGE, "T").await, BookmarkRecord::empty(PAGE, "T"));
    assert!(client.get_recent_bookmarks(None).await.is_empty());
}

#[tokio::test]
async fn test_unknown_bookmark_returns_titled_empty_record() {
    let (client, _) = client(EchoServer::new());

    let bookmark = client.get_bookmark_for_url(PAGE, "Page title").await;

    assert_eq!(bookmark.url, PAGE);
    assert_eq!(bookmark.description, "Page title");
    assert!(bookmark.tags.is_empty());
}

// ─── Writes against a stateful server ───

#[tokio::test]
async fn test_save_get_delete_round_trip() {
    let server = EchoServer::new();
    let (client, tag_store) = client(server.clone());

    let result = client.save_bookmark(&record("https://example.com/page/", &["a", "b"])).await.unwrap();
    assert!(result.success);
    assert!(server.requests()[0].contains("tags=a%20b"));
    assert_eq!(tag_store.recorded(), vec!["a", "b"]);

    let fetched = client.get_bookmark_for_url("https://example.com/page/", "").await;
    assert_eq!(fetched.url, PAGE);
    assert_eq!(fetched.description, "Example");
    assert_eq!(fetched.tags, vec!["a", "b"]);
    assert_eq!(fetched.time, "2024-05-01T10:00:00Z");

    assert!(client.delete_bookmark(PAGE).await.unwrap().success);
    assert!(client.get_bookmark_for_url(PAGE, "").await.tags.is_empty());
}

#[tokio::test]
async fn test_save_tag_appends_and_remembers_tag() {
    let server = EchoServer::new();
    let (seeder, _) = client(server.clone());
    seeder.save_bookmark(&record(PAGE, &["a"])).await.unwrap();

    let (client, tag_store) = client(server.clone());
    let mut tag_data = TagData::new(PAGE, "<b>rust</b>");
    tag_data.description = Some("Renamed".to_string());

    let result = client.save_tag(&tag_data).await.unwrap();

    assert!(result.success);
    assert_eq!(tag_store.recent(), vec![("rust".to_string(), PAGE.to_string())]);
    assert_eq!(tag_store.recorded(), vec!["a", "rust"]);
    let saved = client.get_bookmark_for_url(PAGE, "").await;
    assert_eq!(saved.tags, vec!["a", "rust"]);
    assert_eq!(saved.description, "Renamed");
}

#[tokio::test]
async fn test_save_tag_does_not_duplicate_existing_tag() {
    let server = EchoServer::new();
    let (client, _) = client(server.clone());
    client.save_bookmark(&record(PAGE, &["rust"])).await.unwrap();

    client.save_tag(&TagData::new(PAGE, "rust")).await.unwrap();

    assert_eq!(client.get_bookmark_for_url(PAGE, "").await.tags, vec!["rust"]);
}

#[tokio::test]
async fn test_save_tag_rejects_unusable_value_before_any_request() {
    let transport = ScriptedTransport::always(ok(DONE_XML));
    let tag_store = RecordingTagStore::new();
    let client = client_with(transport.clone(), None, tag_store, fast_settings(2));

    let err = client.save_tag(&TagData::new(PAGE, "!!!")).await.unwrap_err();

    assert!(matches!(err, ApiError::Validation(_)));
    assert_eq!(transport.calls(), 0);
}

#[tokio::test]
async fn test_delete_tag_removes_exact_matches() {
    let server = EchoServer::new();
    let (client, _) = client(server.clone());
    client.save_bookmark(&record(PAGE, &["a", "b", "A"])).await.unwrap();

    client.delete_tag(&TagData::new(PAGE, " a ")).await.unwrap();

    assert_eq!(client.get_bookmark_for_url(PAGE, "").await.tags, vec!["b", "A"]);
    assert!(matches!(
        client.delete_tag(&TagData::new(PAGE, "  ")).await,
        Err(ApiError::Validation(_))
    ));
}

#[tokio::test]
async fn test_tag_store_failures_do_not_fail_the_write() {
    let server = EchoServer::new();
    let tag_store = RecordingTagStore::failing();
    let client = client_with(server, Some(TOKEN), tag_store.clone(), fast_settings(2));

    assert!(client.save_bookmark(&record(PAGE, &["a", "b"])).await.unwrap().success);
    assert!(client.save_tag(&TagData::new(PAGE, "c")).await.unwrap().success);

    assert_eq!(tag_store.recorded(), vec!["a", "b", "a", "b", "c"]);
    assert_eq!(tag_store.recent().len(), 1);
}

#[tokio::test]
async fn test_saved_tags_are_recorded_sanitized_and_once() {
    let (client, tag_store) = client(EchoServer::new());

    let bookmark = record(PAGE, &["<b>rust</b>", "rust", "rust", "a&b", "<i></i>"]);
    assert!(client.save_bookmark(&bookmark).await.unwrap().success);

    assert_eq!(tag_store.recorded(), vec!["rust", "ab"]);
}

#[tokio::test]
async fn test_saved_tags_reach_the_frequency_map_once_each() {
    let db = Arc::new(Database::open_in_memory().expect("open_in_memory failed"));
    let kv = Arc::new(SqliteKeyValueStore::new(db.clone()));
    let memory = Arc::new(SqliteRecentTagMemory::new(db));
    let tag_store = Arc::new(TagStore::new(kv.clone(), memory, TagSettings::default()));
    let client = PinboardClient::new(
        ScriptedTransport::always(ok(DONE_XML)),
        Arc::new(TokenCredentials::new(Some(TOKEN.to_string()))),
        tag_store.clone(),
        fast_settings(2),
    );

    let bookmark = record(PAGE, &["<b>rust</b>", "rust", "rust", "a&b"]);
    assert!(client.save_bookmark(&bookmark).await.unwrap().success);

    let frequency = kv.get(TAG_FREQUENCY_KEY).await.unwrap().unwrap();
    assert_eq!(frequency, json!({"ab": 1, "rust": 1}));
    assert_eq!(tag_store.get_frequent_tags(10).await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_rejected_save_records_nothing() {
    let transport = ScriptedTransport::always(ok(r#"<result code="item already exists"/>"#));
    let (client, tag_store) = client(transport);

    let result = client.save_bookmark(&record(PAGE, &["a"])).await.unwrap();

    assert!(!result.success);
    assert_eq!(result.code, "item already exists");
    assert!(tag_store.recorded().is_empty());
}

#[tokio::test]
async fn test_malformed_write_response_is_an_error() {
    let (client, _) = client(ScriptedTransport::always(ok("<<<")));

    assert!(matches!(
        client.delete_bookmark(PAGE).await,
        Err(ApiError::MalformedResponse(_))
    ));
}

// ─── Errors and retries ───

#[tokio::test]
async fn test_unauthorized_is_not_retried() {
    let transport = ScriptedTransport::always(status(401, "Unauthorized"));
    let tag_store = RecordingTagStore::new();
    let client = client_with(transport.clone(), Some(TOKEN), tag_store, fast_settings(3));

    let err = client.save_bookmark(&record(PAGE, &["a"])).await.unwrap_err();

    assert_eq!(err, ApiError::AuthFailed);
    assert_eq!(transport.calls(), 1);
    assert!(!client.test_connection().await);
    assert_eq!(transport.calls(), 2);
}

#[tokio::test]
async fn test_unclassified_failure_makes_one_attempt() {
    let transport = ScriptedTransport::always(Err(ApiError::Network("invalid token".to_string())));
    let tag_store = RecordingTagStore::new();
    let client = client_with(transport.clone(), Some(TOKEN), tag_store.clone(), fast_settings(3));

    let err = client.save_bookmark(&record(PAGE, &["a"])).await.unwrap_err();

    assert_eq!(err, ApiError::Network("invalid token".to_string()));
    assert_eq!(transport.calls(), 1);
    assert!(tag_store.recorded().is_empty());
}

#[tokio::test]
async fn test_transient_failures_are_retried_until_success() {
    let transport = ScriptedTransport::new(
        vec![
            Err(ApiError::Network("failed to fetch: connection reset".to_string())),
            status(503, "Service Unavailable"),
        ],
        ok(DONE_XML),
    );
    let tag_store = RecordingTagStore::new();
    let client = client_with(transport.clone(), Some(TOKEN), tag_store, fast_settings(3));

    assert!(client.delete_bookmark(PAGE).await.unwrap().success);
    assert_eq!(transport.calls(), 3);
}

#[tokio::test]
async fn test_retries_stop_at_max_retries() {
    let transport = ScriptedTransport::always(status(502, "Bad Gateway"));
    let (client, _) = client(transport.clone());

    let err = client.delete_bookmark(PAGE).await.unwrap_err();

    assert_eq!(
        err,
        ApiError::Http {
            status: 502,
            reason: "Bad Gateway".to_string()
        }
    );
    assert_eq!(transport.calls(), 2);
}

#[tokio::test]
async fn test_non_retryable_status_fails_fast() {
    let transport = ScriptedTransport::always(status(404, "Not Found"));
    let (client, _) = client(transport.clone());

    assert!(client.delete_bookmark(PAGE).await.is_err());
    assert_eq!(transport.calls(), 1);
}

#[tokio::test]
async fn test_timeouts_are_retried() {
    let transport = ScriptedTransport::new(vec![Err(ApiError::Timeout)], ok(DONE_XML));
    let (client, _) = client(transport.clone());

    assert!(client.test_connection().await);
    assert_eq!(transport.calls(), 2);
}

#[test]
fn test_retry_delay_schedule_falls_back_to_base_delay() {
    let client = client_with(
        ScriptedTransport::always(ok(DONE_XML)),
        Some(TOKEN),
        RecordingTagStore::new(),
        PinmarkSettings::default(),
    );

    assert_eq!(client.retry_delay(0), Duration::from_millis(1000));
    assert_eq!(client.retry_delay(1), Duration::from_millis(2000));
    assert_eq!(client.retry_delay(2), Duration::from_millis(5000));
    assert_eq!(client.retry_delay(3), Duration::from_millis(1000));
}
