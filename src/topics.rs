//! Admin-owned topic switchboard. A small `{topic: bool}` map persisted as
//! JSON; the active subset constrains every search and feed read in the
//! system.
//!
//! Single writer by convention (the admin endpoint); readers take the map
//! lock briefly and tolerate a stale-by-one-generation view.

use anyhow::{Context, Result};
use std::collections::BTreeMap;
use std::io::Write;
use std::path::PathBuf;
use std::sync::RwLock;
use tracing::{info, warn};

fn default_topics() -> BTreeMap<String, bool> {
    [
        ("Christianity", true),
        ("Science", true),
        ("Global News", true),
        ("Sports", true),
        ("Technology", true),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v))
    .collect()
}

pub struct TopicManager {
    path: PathBuf,
    topics: RwLock<BTreeMap<String, bool>>,
}

impl TopicManager {
    /// Load from disk, seeding the default set when the file is missing or
    /// unreadable.
    pub fn load(path: PathBuf) -> Self {
        let topics = match std::fs::read_to_string(&path) {
            Ok(raw) => match serde_json::from_str::<BTreeMap<String, bool>>(&raw) {
                Ok(map) => map,
                Err(e) => {
                    warn!("topic file unreadable ({}), seeding defaults", e);
                    default_topics()
                }
            },
            Err(_) => {
                let defaults = default_topics();
                if let Err(e) = write_atomic(&path, &defaults) {
                    warn!("could not seed topic file: {}", e);
                }
                defaults
            }
        };
        info!(
            "topic manager loaded ({} topics, {} active)",
            topics.len(),
            topics.values().filter(|v| **v).count()
        );
        Self {
            path,
            topics: RwLock::new(topics),
        }
    }

    pub fn get_all(&self) -> BTreeMap<String, bool> {
        self.topics.read().expect("topic lock poisoned").clone()
    }

    /// Flip one topic and persist. Unknown topics are rejected so the admin
    /// surface cannot grow the vocabulary by typo.
    pub fn set_topic(&self, name: &str, enabled: bool) -> Result<bool> {
        let mut topics = self.topics.write().expect("topic lock poisoned");
        let Some(slot) = topics.get_mut(name) else {
            return Ok(false);
        };
        *slot = enabled;
        let snapshot = topics.clone();
        drop(topics);
        write_atomic(&self.path, &snapshot)?;
        Ok(true)
    }

    /// Names of enabled topics.
    pub fn active_keywords(&self) -> Vec<String> {
        self.topics
            .read()
            .expect("topic lock poisoned")
            .iter()
            .filter(|(_, v)| **v)
            .map(|(k, _)| k.clone())
            .collect()
    }

    /// OR-joined quoted form for appending to provider queries, or `None`
    /// when nothing is active.
    pub fn active_topic_query(&self) -> Option<String> {
        let active = self.active_keywords();
        if active.is_empty() {
            return None;
        }
        Some(
            active
                .iter()
                .map(|t| format!("\"{}\"", t))
                .collect::<Vec<_>>()
                .join(" OR "),
        )
    }
}

/// Temp-file-plus-rename so a crash mid-write can never leave a truncated
/// topic file behind.
fn write_atomic(path: &PathBuf, topics: &BTreeMap<String, bool>) -> Result<()> {
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir).context("creating topic data dir")?;
    }
    let tmp = path.with_extension("json.tmp");
    {
        let mut f = std::fs::File::create(&tmp).context("creating temp topic file")?;
        f.write_all(serde_json::to_string_pretty(topics)?.as_bytes())?;
        f.sync_all()?;
    }
    std::fs::rename(&tmp, path).context("committing topic file")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seeds_defaults_when_missing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("active_topics.json");
        let mgr = TopicManager::load(path.clone());
        assert!(mgr.get_all().contains_key("Christianity"));
        assert!(path.exists());
    }

    #[test]
    fn toggle_round_trips_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("active_topics.json");

        let mgr = TopicManager::load(path.clone());
        assert!(mgr.set_topic("Sports", false).unwrap());
        assert!(!mgr.set_topic("NoSuchTopic", true).unwrap());

        let reloaded = TopicManager::load(path);
        let all = reloaded.get_all();
        assert_eq!(all.get("Sports"), Some(&false));
        assert_eq!(all.get("Technology"), Some(&true));
        assert!(!reloaded.active_keywords().contains(&"Sports".to_string()));
    }

    #[test]
    fn topic_query_is_or_joined_and_quoted() {
        let dir = tempfile::tempdir().unwrap();
        let mgr = TopicManager::load(dir.path().join("t.json"));
        for t in ["Science", "Global News", "Sports", "Technology"] {
            mgr.set_topic(t, false).unwrap();
        }
        assert_eq!(
            mgr.active_topic_query().as_deref(),
            Some("\"Christianity\"")
        );
        mgr.set_topic("Christianity", false).unwrap();
        assert_eq!(mgr.active_topic_query(), None);
    }
}
