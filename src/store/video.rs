//! Video cache table. Exact-id and fuzzy-title dedupe happen at insert
//! time; the row cap evicts oldest-first.

use super::{ensure_parent_dir, with_conn};
use crate::core::types::CachedVideo;
use crate::priority::is_pinned;
use anyhow::Result;
use rusqlite::{params, Row};
use std::path::PathBuf;
use tracing::info;

/// Hard cap on cached rows; oldest beyond this are evicted.
const MAX_ROWS: usize = 200;
/// Similarity at or above this means "same video, re-listed".
const FUZZY_THRESHOLD: f64 = 0.85;

#[derive(Clone)]
pub struct VideoStore {
    path: PathBuf,
}

fn row_to_video(row: &Row<'_>) -> rusqlite::Result<CachedVideo> {
    Ok(CachedVideo {
        id: row.get("id")?,
        title: row.get("title")?,
        url: row.get("url")?,
        thumbnail: row.get::<_, Option<String>>("thumbnail")?.unwrap_or_default(),
        channel: row.get::<_, Option<String>>("channel")?.unwrap_or_default(),
        views: row.get::<_, Option<String>>("views")?.unwrap_or_default(),
        published: row.get::<_, Option<String>>("published")?.unwrap_or_default(),
        timestamp: row.get("timestamp")?,
        is_approved: row.get::<_, i64>("is_approved")? != 0,
    })
}

/// Lowercase alphanumerics only; punctuation and spacing differences do not
/// make two titles distinct.
fn normalize_title(title: &str) -> String {
    title
        .to_lowercase()
        .chars()
        .filter(|c| c.is_alphanumeric())
        .collect()
}

/// Near-duplicate test against the already-cached titles.
pub fn is_fuzzy_duplicate(title: &str, existing: &[String]) -> bool {
    let norm = normalize_title(title);
    if norm.is_empty() {
        return false;
    }
    for other in existing {
        let norm_other = normalize_title(other);
        if norm_other.is_empty() {
            continue;
        }
        if norm == norm_other {
            return true;
        }
        if strsim::normalized_levenshtein(&norm, &norm_other) >= FUZZY_THRESHOLD {
            return true;
        }
    }
    false
}

impl VideoStore {
    pub async fn open(path: PathBuf) -> Result<Self> {
        ensure_parent_dir(&path)?;
        let store = Self { path };
        store.init_schema().await?;
        Ok(store)
    }

    async fn init_schema(&self) -> Result<()> {
        with_conn(&self.path, |conn| {
            conn.execute_batch(
                "CREATE TABLE IF NOT EXISTS videos (
                    id TEXT PRIMARY KEY,
                    title TEXT,
                    url TEXT,
                    thumbnail TEXT,
                    channel TEXT,
                    views TEXT,
                    published TEXT,
                    timestamp REAL,
                    is_approved INTEGER DEFAULT 1
                )",
            )
        })
        .await
    }

    /// Insert candidates with strict dedupe: known ids are skipped (their
    /// moderation state untouched), near-duplicate titles are skipped, and
    /// the row cap evicts oldest-first afterwards. Returns inserted count.
    pub async fn insert_new(&self, videos: Vec<CachedVideo>) -> Result<usize> {
        with_conn(&self.path, move |conn| {
            let mut existing_titles: Vec<String> = {
                let mut stmt = conn.prepare("SELECT title FROM videos")?;
                let rows = stmt.query_map([], |r| r.get::<_, String>(0))?;
                rows.collect::<rusqlite::Result<Vec<_>>>()?
            };

            let tx = conn.unchecked_transaction()?;
            let mut saved = 0usize;
            {
                let mut id_check = tx.prepare("SELECT 1 FROM videos WHERE id = ?1")?;
                let mut insert = tx.prepare(
                    "INSERT INTO videos
                     (id, title, url, thumbnail, channel, views, published, timestamp, is_approved)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, 1)",
                )?;
                for v in &videos {
                    if id_check.exists(params![v.id])? {
                        continue;
                    }
                    if is_fuzzy_duplicate(&v.title, &existing_titles) {
                        continue;
                    }
                    insert.execute(params![
                        v.id, v.title, v.url, v.thumbnail, v.channel, v.views, v.published,
                        v.timestamp,
                    ])?;
                    existing_titles.push(v.title.clone());
                    saved += 1;
                }
            }
            tx.commit()?;

            // Retention: hard cap, oldest out first.
            let count: i64 = conn.query_row("SELECT COUNT(*) FROM videos", [], |r| r.get(0))?;
            if count as usize > MAX_ROWS {
                let overflow = count as usize - MAX_ROWS;
                conn.execute(
                    "DELETE FROM videos WHERE id IN
                     (SELECT id FROM videos ORDER BY timestamp ASC LIMIT ?1)",
                    [overflow as i64],
                )?;
            }
            Ok(saved)
        })
        .await
    }

    pub async fn approved_recent(&self, limit: usize) -> Result<Vec<CachedVideo>> {
        with_conn(&self.path, move |conn| {
            let mut stmt = conn.prepare(
                "SELECT * FROM videos WHERE is_approved = 1 ORDER BY timestamp DESC LIMIT ?1",
            )?;
            let rows = stmt.query_map([limit as i64], row_to_video)?;
            rows.collect()
        })
        .await
    }

    pub async fn all(&self) -> Result<Vec<CachedVideo>> {
        with_conn(&self.path, |conn| {
            let mut stmt = conn.prepare("SELECT * FROM videos ORDER BY timestamp DESC")?;
            let rows = stmt.query_map([], row_to_video)?;
            rows.collect()
        })
        .await
    }

    /// Strict topic cleanup: drop rows matching neither the active topics
    /// nor the extra term list; pinned rows always survive.
    pub async fn cleanup_off_topic(
        &self,
        active_topics: Vec<String>,
        extra_terms: Vec<String>,
    ) -> Result<usize> {
        if active_topics.is_empty() {
            return Ok(0);
        }
        let removed = with_conn(&self.path, move |conn| {
            let mut stmt = conn.prepare("SELECT id, title, channel FROM videos")?;
            let rows = stmt.query_map([], |r| {
                Ok((
                    r.get::<_, String>(0)?,
                    r.get::<_, String>(1)?,
                    r.get::<_, Option<String>>(2)?.unwrap_or_default(),
                ))
            })?;

            let mut doomed: Vec<String> = Vec::new();
            for row in rows {
                let (id, title, channel) = row?;
                let text = format!("{} {}", title, channel).to_lowercase();
                if is_pinned(&text) {
                    continue;
                }
                let matches_topic = active_topics.iter().any(|t| text.contains(&t.to_lowercase()));
                let matches_extra = extra_terms.iter().any(|t| text.contains(&t.to_lowercase()));
                if !matches_topic && !matches_extra {
                    doomed.push(id);
                }
            }

            // Chunked deletes keep statements small.
            for chunk in doomed.chunks(50) {
                let placeholders = vec!["?"; chunk.len()].join(",");
                let sql = format!("DELETE FROM videos WHERE id IN ({})", placeholders);
                let mut del = conn.prepare(&sql)?;
                del.execute(rusqlite::params_from_iter(chunk.iter()))?;
            }
            Ok(doomed.len())
        })
        .await?;
        if removed > 0 {
            info!("video cleanup removed {} off-topic rows", removed);
        }
        Ok(removed)
    }

    pub async fn set_approval(&self, id: String, approved: bool) -> Result<()> {
        with_conn(&self.path, move |conn| {
            conn.execute(
                "UPDATE videos SET is_approved = ?1 WHERE id = ?2",
                params![approved as i64, id],
            )?;
            Ok(())
        })
        .await
    }

    pub async fn count(&self) -> Result<usize> {
        with_conn(&self.path, |conn| {
            conn.query_row("SELECT COUNT(*) FROM videos", [], |r| r.get::<_, i64>(0))
                .map(|n| n as usize)
        })
        .await
    }

    pub async fn is_empty(&self) -> Result<bool> {
        Ok(self.count().await? == 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn video(id: &str, title: &str, timestamp: f64) -> CachedVideo {
        CachedVideo {
            id: id.into(),
            title: title.into(),
            url: format!("https://www.youtube.com/watch?v={}", id),
            thumbnail: format!("https://i.ytimg.com/vi/{}/hqdefault.jpg", id),
            channel: "Test Channel".into(),
            views: "1K views".into(),
            published: "1 day ago".into(),
            timestamp,
            is_approved: true,
        }
    }

    async fn store() -> (tempfile::TempDir, VideoStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = VideoStore::open(dir.path().join("videos.db")).await.unwrap();
        (dir, store)
    }

    #[test]
    fn fuzzy_duplicate_threshold() {
        let existing = vec!["Sunday Worship Service - LIVE!".to_string()];
        assert!(is_fuzzy_duplicate("Sunday Worship Service LIVE", &existing));
        assert!(is_fuzzy_duplicate("sunday worship service,  live", &existing));
        assert!(!is_fuzzy_duplicate("Wednesday Bible study recap", &existing));
        assert!(!is_fuzzy_duplicate("", &existing));
    }

    #[tokio::test]
    async fn insert_skips_id_and_fuzzy_duplicates() {
        let (_dir, store) = store().await;
        let saved = store
            .insert_new(vec![
                video("v1", "Sunday Worship Service - LIVE!", 100.0),
                video("v1", "Different title, same id", 101.0),
                video("v2", "Sunday Worship Service LIVE", 102.0),
                video("v3", "Testimony hour with the choir", 103.0),
            ])
            .await
            .unwrap();
        assert_eq!(saved, 2);
        assert_eq!(store.count().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn approval_survives_reingest() {
        let (_dir, store) = store().await;
        store.insert_new(vec![video("v1", "Choir practice session", 100.0)]).await.unwrap();
        store.set_approval("v1".into(), false).await.unwrap();
        store.insert_new(vec![video("v1", "Choir practice session", 500.0)]).await.unwrap();
        let all = store.all().await.unwrap();
        assert_eq!(all.len(), 1);
        assert!(!all[0].is_approved);
        assert_eq!(all[0].timestamp, 100.0);
    }

    #[tokio::test]
    async fn row_cap_evicts_oldest() {
        let (_dir, store) = store().await;
        // Titles must be distinct enough to dodge the fuzzy dedupe.
        let batch: Vec<CachedVideo> = (0..210)
            .map(|i| {
                let scrambled = format!("{:x}", md5::compute(format!("title-{}", i)));
                video(&format!("vid{:03}", i), &scrambled, i as f64)
            })
            .collect();
        store.insert_new(batch).await.unwrap();
        assert_eq!(store.count().await.unwrap(), 200);
        let remaining = store.all().await.unwrap();
        assert!(remaining.iter().all(|v| v.timestamp >= 10.0));
    }

    #[tokio::test]
    async fn off_topic_cleanup_spares_pinned() {
        let (_dir, store) = store().await;
        store
            .insert_new(vec![
                video("v1", "Jesus Redeems convention highlights", 1.0),
                video("v2", "Cooking pasta at home", 2.0),
                video("v3", "Technology review of the year", 3.0),
            ])
            .await
            .unwrap();
        store
            .cleanup_off_topic(vec!["Technology".into()], vec![])
            .await
            .unwrap();
        let ids: Vec<String> = store.all().await.unwrap().into_iter().map(|v| v.id).collect();
        assert!(ids.contains(&"v1".to_string()));
        assert!(!ids.contains(&"v2".to_string()));
        assert!(ids.contains(&"v3".to_string()));
    }
}
