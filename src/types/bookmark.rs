use serde::{Deserialize, Serialize};

/// One bookmark as the remote service knows it.
///
/// `url` is the identity key. Every other field defaults to an empty string
/// when the service omits it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BookmarkRecord {
    pub url: String,
    pub description: String,
    pub extended: String,
    pub tags: Vec<String>,
    pub time: String,
    pub shared: String,
    pub toread: String,
    pub hash: String,
}

impl BookmarkRecord {
    /// The record returned when there is nothing to report for `url`.
    pub fn empty(url: &str, title: &str) -> Self {
        Self {
            url: url.to_string(),
            description: title.to_string(),
            ..Self::default()
        }
    }

    /// Returns a copy with `tag` appended unless an identical tag is present.
    pub fn with_tag(&self, tag: &str) -> Self {
        let mut tags = self.tags.clone();
        if !tags.iter().any(|t| t == tag) {
            tags.push(tag.to_string());
        }
        Self { tags, ..self.clone() }
    }

    /// Returns a copy with every exact match of `tag` removed.
    pub fn without_tag(&self, tag: &str) -> Self {
        let tags = self.tags.iter().filter(|t| *t != tag).cloned().collect();
        Self { tags, ..self.clone() }
    }

    /// Tags in wire form: one space-joined string.
    pub fn tag_string(&self) -> String {
        self.tags.join(" ")
    }
}

/// Outcome of a write against the remote service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SaveResult {
    pub success: bool,
    pub code: String,
    pub message: String,
}

impl SaveResult {
    /// Result code the service uses for a completed write.
    pub const DONE: &'static str = "done";
    /// Result code for a write skipped because no credential is configured.
    pub const NO_AUTH: &'static str = "no_auth";

    pub fn from_code(code: &str, message: &str) -> Self {
        Self {
            success: code == Self::DONE,
            code: code.to_string(),
            message: message.to_string(),
        }
    }

    pub fn no_auth() -> Self {
        Self {
            success: false,
            code: Self::NO_AUTH.to_string(),
            message: "No authentication token configured".to_string(),
        }
    }
}

/// A tag change requested for the bookmark at `url`.
///
/// The optional fields override the fetched bookmark before it is saved.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TagData {
    pub url: String,
    pub value: String,
    pub description: Option<String>,
    pub extended: Option<String>,
    pub shared: Option<String>,
    pub toread: Option<String>,
}

impl TagData {
    pub fn new(url: &str, value: &str) -> Self {
        Self {
            url: url.to_string(),
            value: value.to_string(),
            ..Self::default()
        }
    }

    /// Applies the overrides carried by this request to `record`.
    pub fn merge_into(&self, record: BookmarkRecord) -> BookmarkRecord {
        BookmarkRecord {
            description: self.description.clone().unwrap_or(record.description),
            extended: self.extended.clone().unwrap_or(record.extended),
            shared: self.shared.clone().unwrap_or(record.shared),
            toread: self.toread.clone().unwrap_or(record.toread),
            ..record
        }
    }
}
