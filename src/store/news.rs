//! News cache table. The news feed worker is the only writer; read paths
//! open their own short-lived connections.

use super::{ensure_parent_dir, with_conn};
use crate::core::types::CachedArticle;
use crate::priority::PINNED_TOKENS;
use anyhow::Result;
use rusqlite::{params, Connection, Row};
use std::path::PathBuf;

/// Non-pinned rows older than this are cleaned up.
const RETENTION_SECS: f64 = 3.0 * 24.0 * 3600.0;
/// Pinned rows get the extended horizon.
const PINNED_RETENTION_SECS: f64 = 7.0 * 24.0 * 3600.0;

#[derive(Clone)]
pub struct NewsStore {
    path: PathBuf,
}

fn row_to_article(row: &Row<'_>) -> rusqlite::Result<CachedArticle> {
    Ok(CachedArticle {
        id: row.get("id")?,
        title: row.get("title")?,
        url: row.get("url")?,
        published: row.get::<_, Option<String>>("published")?.unwrap_or_default(),
        source: row.get::<_, Option<String>>("source")?.unwrap_or_default(),
        image: row.get("image")?,
        guid: row.get::<_, Option<String>>("guid")?.unwrap_or_default(),
        timestamp: row.get("timestamp")?,
        snippet: row.get::<_, Option<String>>("snippet")?.unwrap_or_default(),
        is_approved: row.get::<_, i64>("is_approved")? != 0,
    })
}

impl NewsStore {
    pub async fn open(path: PathBuf) -> Result<Self> {
        ensure_parent_dir(&path)?;
        let store = Self { path };
        store.init_schema().await?;
        Ok(store)
    }

    async fn init_schema(&self) -> Result<()> {
        with_conn(&self.path, |conn: &Connection| {
            conn.execute_batch(
                "CREATE TABLE IF NOT EXISTS news (
                    id TEXT PRIMARY KEY,
                    title TEXT,
                    url TEXT,
                    published TEXT,
                    source TEXT,
                    image TEXT,
                    guid TEXT,
                    timestamp REAL,
                    snippet TEXT,
                    is_approved INTEGER DEFAULT 1
                )",
            )
        })
        .await
    }

    /// Batched upsert: one transaction, minimal lock window. Replaces
    /// title/url/image/snippet/timestamp when an id reappears.
    pub async fn upsert_batch(&self, articles: Vec<CachedArticle>) -> Result<usize> {
        with_conn(&self.path, move |conn| {
            let tx = conn.unchecked_transaction()?;
            let mut count = 0usize;
            {
                let mut stmt = tx.prepare(
                    "INSERT OR REPLACE INTO news
                     (id, title, url, published, source, image, guid, timestamp, snippet, is_approved)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9,
                             COALESCE((SELECT is_approved FROM news WHERE id = ?1), 1))",
                )?;
                for a in &articles {
                    stmt.execute(params![
                        a.id, a.title, a.url, a.published, a.source, a.image, a.guid,
                        a.timestamp, a.snippet,
                    ])?;
                    count += 1;
                }
            }
            tx.commit()?;
            Ok(count)
        })
        .await
    }

    /// Insert-if-new, used by the live search path to warm the cache.
    /// Returns how many rows were actually new.
    pub async fn insert_ignore_batch(&self, articles: Vec<CachedArticle>) -> Result<usize> {
        with_conn(&self.path, move |conn| {
            let tx = conn.unchecked_transaction()?;
            let mut count = 0usize;
            {
                let mut stmt = tx.prepare(
                    "INSERT OR IGNORE INTO news
                     (id, title, url, published, source, image, guid, timestamp, snippet, is_approved)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, 1)",
                )?;
                for a in &articles {
                    count += stmt.execute(params![
                        a.id, a.title, a.url, a.published, a.source, a.image, a.guid,
                        a.timestamp, a.snippet,
                    ])?;
                }
            }
            tx.commit()?;
            Ok(count)
        })
        .await
    }

    /// Approved rows, newest first.
    pub async fn approved_recent(&self, limit: usize) -> Result<Vec<CachedArticle>> {
        with_conn(&self.path, move |conn| {
            let mut stmt = conn.prepare(
                "SELECT * FROM news WHERE is_approved = 1 ORDER BY timestamp DESC LIMIT ?1",
            )?;
            let rows = stmt.query_map([limit as i64], row_to_article)?;
            rows.collect()
        })
        .await
    }

    /// Admin read: everything, newest first.
    pub async fn all(&self) -> Result<Vec<CachedArticle>> {
        with_conn(&self.path, |conn| {
            let mut stmt = conn.prepare("SELECT * FROM news ORDER BY timestamp DESC")?;
            let rows = stmt.query_map([], row_to_article)?;
            rows.collect()
        })
        .await
    }

    /// Delete stale rows: 3 days for ordinary articles, 7 for pinned ones.
    pub async fn cleanup(&self, now: f64) -> Result<usize> {
        with_conn(&self.path, move |conn| {
            let pinned_clause = PINNED_TOKENS
                .iter()
                .map(|t| format!("title LIKE '%{}%'", t.replace('\'', "''")))
                .collect::<Vec<_>>()
                .join(" OR ");

            let normal = conn.execute(
                &format!(
                    "DELETE FROM news WHERE timestamp < ?1 AND NOT ({})",
                    pinned_clause
                ),
                [now - RETENTION_SECS],
            )?;
            let pinned = conn.execute(
                &format!(
                    "DELETE FROM news WHERE timestamp < ?1 AND ({})",
                    pinned_clause
                ),
                [now - PINNED_RETENTION_SECS],
            )?;
            Ok(normal + pinned)
        })
        .await
    }

    pub async fn set_approval(&self, id: String, approved: bool) -> Result<()> {
        with_conn(&self.path, move |conn| {
            conn.execute(
                "UPDATE news SET is_approved = ?1 WHERE id = ?2",
                params![approved as i64, id],
            )?;
            Ok(())
        })
        .await
    }

    pub async fn count(&self) -> Result<usize> {
        with_conn(&self.path, |conn| {
            conn.query_row("SELECT COUNT(*) FROM news", [], |r| r.get::<_, i64>(0))
                .map(|n| n as usize)
        })
        .await
    }

    pub async fn is_empty(&self) -> Result<bool> {
        Ok(self.count().await? == 0)
    }
}
