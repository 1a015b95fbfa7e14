//! Embedded SQLite stores for the two feed caches.
//!
//! Connections are short-lived and scoped: every operation opens, runs
//! inside `spawn_blocking`, and closes. WAL journaling plus a jittered
//! retry loop absorbs writer contention; after the retry budget the
//! operation is skipped with a warning and the next cycle tries again.

pub mod news;
pub mod video;

use anyhow::{anyhow, Result};
use rusqlite::Connection;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::warn;

const CONTENTION_RETRIES: usize = 10;
const BUSY_TIMEOUT: Duration = Duration::from_secs(60);

fn open_configured(path: &Path) -> rusqlite::Result<Connection> {
    let conn = Connection::open(path)?;
    conn.busy_timeout(BUSY_TIMEOUT)?;
    conn.pragma_update(None, "journal_mode", "WAL")?;
    Ok(conn)
}

fn is_locked(err: &rusqlite::Error) -> bool {
    matches!(
        err.sqlite_error_code(),
        Some(rusqlite::ErrorCode::DatabaseBusy) | Some(rusqlite::ErrorCode::DatabaseLocked)
    )
}

/// Run one store operation on the blocking pool with contention retries.
pub(crate) async fn with_conn<T, F>(path: &Path, op: F) -> Result<T>
where
    F: Fn(&Connection) -> rusqlite::Result<T> + Send + 'static,
    T: Send + 'static,
{
    let path: PathBuf = path.to_path_buf();
    tokio::task::spawn_blocking(move || {
        let mut last: Option<rusqlite::Error> = None;
        for attempt in 0..CONTENTION_RETRIES {
            let conn = match open_configured(&path) {
                Ok(c) => c,
                Err(e) if is_locked(&e) => {
                    last = Some(e);
                    sleep_jittered(attempt);
                    continue;
                }
                Err(e) => return Err(anyhow!("store open failed: {}", e)),
            };
            match op(&conn) {
                Ok(v) => return Ok(v),
                Err(e) if is_locked(&e) => {
                    last = Some(e);
                    sleep_jittered(attempt);
                }
                Err(e) => return Err(anyhow!("store operation failed: {}", e)),
            }
        }
        let detail = last.map(|e| e.to_string()).unwrap_or_default();
        warn!("store contended after {} retries, skipping: {}", CONTENTION_RETRIES, detail);
        Err(crate::core::error::CoreError::StoreContention(detail).into())
    })
    .await
    .map_err(|e| anyhow!("store task join failed: {}", e))?
}

fn sleep_jittered(_attempt: usize) {
    use rand::RngExt;
    let millis = rand::rng().random_range(500..=2000);
    std::thread::sleep(Duration::from_millis(millis));
}

pub(crate) fn ensure_parent_dir(path: &Path) -> Result<()> {
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir)?;
    }
    Ok(())
}
