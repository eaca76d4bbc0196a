//! Site-scoped recent tag memory.
//!
//! Remembers which tags were recently added on which site origin. A memory
//! handle is either profile-wide (reads every site) or scoped to one origin.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use reqwest::Url;
use rusqlite::params;

use crate::database::Database;
use crate::types::errors::StorageError;
use crate::types::tag::RecentTagEntry;

/// Oldest entries beyond this count are pruned per site.
pub const MAX_TAGS_PER_SITE: i64 = 100;

/// `https://example.com/a/b?c` becomes `https://example.com`.
pub fn site_origin(site_url: &str) -> Result<String, StorageError> {
    let url = Url::parse(site_url)
        .map_err(|e| StorageError::InvalidSite(format!("{} ({})", site_url, e)))?;
    Ok(url.origin().ascii_serialization())
}

/// Trait defining the shared recent-tag memory.
#[async_trait]
pub trait SharedRecentTagStore: Send + Sync {
    /// Most recent first, one entry per tag name.
    async fn get_recent_tags(&self) -> Result<Vec<RecentTagEntry>, StorageError>;
    /// Returns `true` when the tag was not yet remembered for that site.
    async fn add_tag(&self, name: &str, site_url: &str) -> Result<bool, StorageError>;
    /// A handle whose reads only cover the origin of `site_url`.
    fn for_site(&self, site_url: &str) -> Result<Arc<dyn SharedRecentTagStore>, StorageError>;
}

/// Recent tag memory backed by the `recent_tags` table.
pub struct SqliteRecentTagMemory {
    db: Arc<Database>,
    scope: Option<String>,
}

impl SqliteRecentTagMemory {
    /// A profile-wide handle.
    pub fn new(db: Arc<Database>) -> Self {
        Self { db, scope: None }
    }

    /// A handle that only reads tags remembered for the origin of `site_url`.
    pub fn scoped_to(db: Arc<Database>, site_url: &str) -> Result<Self, StorageError> {
        let origin = site_origin(site_url)?;
        Ok(Self {
            db,
            scope: Some(origin),
        })
    }

    fn to_datetime(millis: i64) -> DateTime<Utc> {
        Utc.timestamp_millis_opt(millis).single().unwrap_or_default()
    }
}

#[async_trait]
impl SharedRecentTagStore for SqliteRecentTagMemory {
    async fn get_recent_tags(&self) -> Result<Vec<RecentTagEntry>, StorageError> {
        let conn = self.db.connection();
        let mut stmt = match self.scope {
            Some(_) => conn.prepare(
                "SELECT name, MAX(last_used) FROM recent_tags WHERE site = ?1 \
                 GROUP BY name ORDER BY MAX(last_used) DESC, name ASC",
            ),
            None => conn.prepare(
                "SELECT name, MAX(last_used) FROM recent_tags \
                 GROUP BY name ORDER BY MAX(last_used) DESC, name ASC",
            ),
        }
        .map_err(|e| StorageError::DatabaseError(e.to_string()))?;

        let map_row = |row: &rusqlite::Row| -> rusqlite::Result<RecentTagEntry> {
            Ok(RecentTagEntry {
                name: row.get(0)?,
                last_used: Self::to_datetime(row.get(1)?),
            })
        };

        let rows = match &self.scope {
            Some(site) => stmt.query_map(params![site], map_row),
            None => stmt.query_map([], map_row),
        }
        .map_err(|e| StorageError::DatabaseError(e.to_string()))?;

        let mut results = Vec::new();
        for row in rows {
            results.push(row.map_err(|e| StorageError::DatabaseError(e.to_string()))?);
        }
        Ok(results)
    }

    async fn add_tag(&self, name: &str, site_url: &str) -> Result<bool, StorageError> {
        let site = site_origin(site_url)?;
        let now = Utc::now().timestamp_millis();
        let conn = self.db.connection();

        let existing: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM recent_tags WHERE site = ?1 AND name = ?2",
                params![site, name],
                |row| row.get(0),
            )
            .map_err(|e| StorageError::DatabaseError(e.to_string()))?;

        conn.execute(
            "INSERT OR REPLACE INTO recent_tags (site, name, last_used) VALUES (?1, ?2, ?3)",
            params![site, name, now],
        )
        .map_err(|e| StorageError::DatabaseError(e.to_string()))?;

        conn.execute(
            "DELETE FROM recent_tags WHERE site = ?1 AND name NOT IN (\
                SELECT name FROM recent_tags WHERE site = ?1 \
                ORDER BY last_used DESC, name ASC LIMIT ?2)",
            params![site, MAX_TAGS_PER_SITE],
        )
        .map_err(|e| StorageError::DatabaseError(e.to_string()))?;

        Ok(existing == 0)
    }

    fn for_site(&self, site_url: &str) -> Result<Arc<dyn SharedRecentTagStore>, StorageError> {
        Ok(Arc::new(Self::scoped_to(self.db.clone(), site_url)?))
    }
}
