use std::fmt;

// === ApiError ===

/// Message fragments that mark a failure as transient.
const RETRYABLE_MARKERS: [&str; 6] = ["fetch", "timeout", "429", "500", "502", "503"];

/// Errors raised while talking to the remote bookmarking API.
#[derive(Debug, Clone, PartialEq)]
pub enum ApiError {
    /// No authentication token is configured.
    NoCredential,
    /// The request never produced a response (DNS, connect, reset, ...).
    Network(String),
    /// The request did not complete within the transport timeout.
    Timeout,
    /// The service rejected the token.
    AuthFailed,
    /// The service answered with a non-success status.
    Http { status: u16, reason: String },
    /// The response body was not the XML document we expected.
    MalformedResponse(String),
    /// The input was rejected before any request was made.
    Validation(String),
}

impl ApiError {
    /// Whether another attempt may succeed, judged by the message text.
    pub fn is_retryable(&self) -> bool {
        let message = self.to_string().to_lowercase();
        RETRYABLE_MARKERS.iter().any(|marker| message.contains(marker))
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiError::NoCredential => write!(f, "No authentication token configured"),
            ApiError::Network(msg) => write!(f, "API network error: {}", msg),
            ApiError::Timeout => write!(f, "Request timeout"),
            ApiError::AuthFailed => write!(f, "Authentication failed - check API token"),
            ApiError::Http { status, reason } => write!(f, "HTTP {}: {}", status, reason),
            ApiError::MalformedResponse(msg) => {
                write!(f, "Failed to parse XML response: {}", msg)
            }
            ApiError::Validation(msg) => write!(f, "Invalid request: {}", msg),
        }
    }
}

impl std::error::Error for ApiError {}

// === StorageError ===

/// Errors raised by the persisted key-value store and the recent-tag memory.
#[derive(Debug)]
pub enum StorageError {
    /// Database operation failed.
    DatabaseError(String),
    /// A stored value could not be encoded or decoded.
    SerializationError(String),
    /// The site URL has no usable origin.
    InvalidSite(String),
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageError::DatabaseError(msg) => write!(f, "Storage database error: {}", msg),
            StorageError::SerializationError(msg) => {
                write!(f, "Storage serialization error: {}", msg)
            }
            StorageError::InvalidSite(url) => write!(f, "Invalid site URL: {}", url),
        }
    }
}

impl std::error::Error for StorageError {}

// === TagStoreError ===

/// Errors related to tag tracking and the recent-tags cache.
#[derive(Debug)]
pub enum TagStoreError {
    /// The underlying storage failed.
    Storage(String),
    /// The tag sanitizes to nothing usable.
    InvalidTag(String),
    /// The site URL is not a well-formed http(s) URL.
    InvalidSiteUrl(String),
    /// A cached value had an unexpected shape.
    CorruptCache(String),
}

impl fmt::Display for TagStoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TagStoreError::Storage(msg) => write!(f, "Tag storage error: {}", msg),
            TagStoreError::InvalidTag(tag) => write!(f, "Invalid tag: {}", tag),
            TagStoreError::InvalidSiteUrl(url) => write!(f, "Invalid site URL: {}", url),
            TagStoreError::CorruptCache(msg) => write!(f, "Corrupt tag cache: {}", msg),
        }
    }
}

impl std::error::Error for TagStoreError {}

impl From<StorageError> for TagStoreError {
    fn from(err: StorageError) -> Self {
        TagStoreError::Storage(err.to_string())
    }
}

// === SettingsError ===

/// Errors related to settings management.
#[derive(Debug)]
pub enum SettingsError {
    /// An I/O error occurred while reading or writing settings.
    IoError(String),
    /// Failed to serialize or deserialize settings.
    SerializationError(String),
    /// The provided settings key is invalid.
    InvalidKey(String),
    /// The provided settings value is invalid.
    InvalidValue(String),
}

impl fmt::Display for SettingsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SettingsError::IoError(msg) => write!(f, "Settings I/O error: {}", msg),
            SettingsError::SerializationError(msg) => {
                write!(f, "Settings serialization error: {}", msg)
            }
            SettingsError::InvalidKey(key) => write!(f, "Invalid settings key: {}", key),
            SettingsError::InvalidValue(msg) => {
                write!(f, "Invalid settings value: {}", msg)
            }
        }
    }
}

impl std::error::Error for SettingsError {}
