//! Video feed worker: channel scrapes with search fallback, multilingual
//! topic rounds, fuzzy dedupe, and the capped SQLite cache behind the
//! video read paths.

use super::now_ts;
use crate::core::app_state::build_http_client;
use crate::core::types::CachedVideo;
use crate::geo::GeoSorter;
use crate::priority::{humanize_channel, is_pinned, priority_score};
use crate::search::engines::youtube::{self, VideoResult};
use crate::store::video::VideoStore;
use crate::topics::TopicManager;
use anyhow::Result;
use futures::future::join_all;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{info, warn};

const FETCH_INTERVAL: Duration = Duration::from_secs(45 * 60);
const CHANNEL_LIMIT: usize = 3;

/// Channel bundles per admin topic.
fn topic_channels(topic: &str) -> &'static [&'static str] {
    match topic {
        "Christianity" => &[
            "jesusredeems",
            "vaticannews",
            "thebibleproject",
            "desiringGod",
            "gospelcoalition",
            "CBNNews",
            "CatholicNewsAgency",
        ],
        "Technology" => &[
            "mkbhd",
            "veritasium",
            "LinusTechTips",
            "ColdFusion",
            "Computerphile",
            "TwoMinutePapers",
            "Fireship",
        ],
        "Science" => &[
            "Kurzgesagt",
            "scishow",
            "smartereveryday",
            "nasa",
            "PBSspaceTime",
            "minutephysics",
        ],
        "Sports" => &[
            "ESPN", "NBA", "ICC", "olympics", "FIFA", "SkySports", "StarSports",
        ],
        "Global News" => &[
            "BBCNews",
            "AlJazeeraEnglish",
            "DWNews",
            "Reuters",
            "WION",
            "Euronews",
        ],
        _ => &[],
    }
}

/// Always fetched so pinned content is never starved.
const PRIORITY_CHANNELS: [&str; 1] = ["jesusredeems"];

/// Extra match terms honored by the strict cleanup when Christianity is the
/// active topic (channel names rarely contain the literal topic word).
const CHRISTIAN_TERMS: [&str; 7] =
    ["church", "jesus", "christ", "gospel", "worship", "pastor", "bible"];

fn to_cached(v: VideoResult, now: f64) -> CachedVideo {
    CachedVideo {
        id: v.id,
        title: v.title,
        url: v.url,
        thumbnail: v.thumbnail,
        channel: v.channel,
        views: v.views,
        published: v.published,
        timestamp: now,
        is_approved: true,
    }
}

pub struct VideoFeed {
    store: VideoStore,
    topics: Arc<TopicManager>,
    client: reqwest::Client,
    geo: GeoSorter,
}

impl VideoFeed {
    pub fn new(store: VideoStore, topics: Arc<TopicManager>) -> Arc<Self> {
        Arc::new(Self {
            store,
            topics,
            client: build_http_client(),
            geo: GeoSorter::new(),
        })
    }

    /// Worker loop: immediate fetch when the store is empty, then a cycle
    /// every 45 minutes with a strict cleanup sweep before each round.
    pub async fn run(self: Arc<Self>, mut stop: watch::Receiver<bool>) {
        info!("video feed worker started");
        if self.store.is_empty().await.unwrap_or(true) {
            info!("video store empty, triggering initial fetch");
            if let Err(e) = self.fetch_cycle().await {
                warn!("initial video fetch failed: {}", e);
            }
        }
        loop {
            tokio::select! {
                _ = tokio::time::sleep(FETCH_INTERVAL) => {}
                _ = stop.changed() => {
                    info!("video feed worker stopping");
                    break;
                }
            }
            self.cleanup_irrelevant().await;
            if let Err(e) = self.fetch_cycle().await {
                warn!("video fetch cycle failed: {}", e);
            }
        }
    }

    pub async fn cleanup_irrelevant(&self) {
        let active = self.topics.active_keywords();
        if active.is_empty() {
            return;
        }
        let extra = if active.iter().any(|t| t == "Christianity") {
            CHRISTIAN_TERMS.iter().map(|s| s.to_string()).collect()
        } else {
            Vec::new()
        };
        if let Err(e) = self.store.cleanup_off_topic(active, extra).await {
            warn!("video cleanup skipped: {}", e);
        }
    }

    /// One cycle: channel scrapes (search fallback per channel), then
    /// localized topic-search rounds, then deduped insert.
    pub async fn fetch_cycle(&self) -> Result<()> {
        let active = self.topics.active_keywords();

        let mut channels: Vec<String> = Vec::new();
        for topic in &active {
            for ch in topic_channels(topic) {
                if !channels.iter().any(|c| c == ch) {
                    channels.push(ch.to_string());
                }
            }
        }
        if channels.is_empty() && active.is_empty() {
            info!("no topics active, defaulting to the Christianity bundle");
            channels.extend(topic_channels("Christianity").iter().map(|s| s.to_string()));
        }
        for ch in PRIORITY_CHANNELS {
            if !channels.iter().any(|c| c == ch) {
                channels.push(ch.to_string());
            }
        }

        info!("fetching {} channels (topics: {:?})", channels.len(), active);

        let channel_tasks = channels.iter().map(|ch| self.fetch_channel(ch.clone()));
        let mut candidates: Vec<VideoResult> =
            join_all(channel_tasks).await.into_iter().flatten().collect();

        // Topic rounds, three localized variants each.
        let base_topics = if active.is_empty() {
            vec!["Christianity".to_string()]
        } else {
            active
        };
        for topic in &base_topics {
            for (suffix, limit, latin) in
                [("latest", 5usize, true), ("Tamil", 3, false), ("Hindi", 3, false)]
            {
                let query = format!("{} {}", topic, suffix);
                match youtube::search(&self.client, &query, limit, latin).await {
                    Ok(videos) => candidates.extend(videos),
                    Err(e) => warn!("topic search '{}' failed: {}", query, e),
                }
            }
        }

        if candidates.is_empty() {
            warn!("no videos found this cycle");
            return Ok(());
        }

        let now = now_ts();
        let total = candidates.len();
        let cached: Vec<CachedVideo> = candidates.into_iter().map(|v| to_cached(v, now)).collect();
        let saved = self.store.insert_new(cached).await?;
        info!("video cycle complete, saved {}/{} candidates", saved, total);
        Ok(())
    }

    /// Direct channel scrape with a search fallback when the channel page
    /// is empty or blocked.
    async fn fetch_channel(&self, channel: String) -> Vec<VideoResult> {
        match youtube::channel_videos(&self.client, &channel, CHANNEL_LIMIT).await {
            Ok(videos) if !videos.is_empty() => videos,
            _ => {
                let query = humanize_channel(&channel);
                match youtube::search(&self.client, query, CHANNEL_LIMIT, false).await {
                    Ok(videos) => videos,
                    Err(e) => {
                        warn!("channel fallback search '{}' failed: {}", query, e);
                        Vec::new()
                    }
                }
            }
        }
    }

    /// Cached feed: approved rows, pinned first, geo tiered.
    pub async fn get_trending(&self, limit: usize) -> Vec<CachedVideo> {
        let mut rows = self.store.approved_recent(limit).await.unwrap_or_default();
        sort_pinned_first(&mut rows, 100);
        let mut tiered = self.geo.sort_with(rows, |v| {
            (format!("{} {}", v.title, v.channel), v.url.clone())
        });
        // Pinned rows outrank geo tiers too.
        pin_front(&mut tiered);
        tiered
    }

    /// Live provider search with relevance ranking: exact phrase beats
    /// token matches beats channel matches, and pinned rows beat them all.
    pub async fn search(
        &self,
        query: &str,
        limit: usize,
        lang: &str,
        apply_strict: bool,
    ) -> Vec<CachedVideo> {
        let mut query = query.to_string();

        if apply_strict {
            let active = self.topics.active_keywords();
            if !active.is_empty() {
                let q_lower = query.to_lowercase();
                if !active.iter().any(|t| q_lower.contains(&t.to_lowercase())) {
                    if let Some(clause) = self.topics.active_topic_query() {
                        query = format!("{} ({})", query, clause);
                        info!("strict topic applied to video search: {}", query);
                    }
                }
            }
        }

        // Language hint: ASCII queries get a locale suffix; native-script
        // queries already carry their language.
        let search_query = match lang {
            "ta" if query.is_ascii() => format!("{} Tamil", query),
            "hi" if query.is_ascii() => format!("{} Hindi", query),
            _ => query.clone(),
        };
        let latin_only = lang == "en";

        let fetched =
            match youtube::search(&self.client, &search_query, (limit * 2).min(100), latin_only)
                .await
            {
                Ok(videos) => videos,
                Err(e) => {
                    warn!("video search failed: {}", e);
                    return Vec::new();
                }
            };

        let now = now_ts();
        let query_lower = query.to_lowercase();
        let mut scored: Vec<(i64, CachedVideo)> = fetched
            .into_iter()
            .map(|v| {
                let title_lower = v.title.to_lowercase();
                let channel_lower = v.channel.to_lowercase();

                let mut relevance: i64 = 0;
                if title_lower.contains(&query_lower) {
                    relevance += 50;
                }
                for word in query_lower.split_whitespace() {
                    if word.len() > 2 && title_lower.contains(word) {
                        relevance += 10;
                    }
                }
                if channel_lower.contains(&query_lower) {
                    relevance += 20;
                }

                // Pinned content overrides relevance outright.
                if is_pinned(&format!("{} {}", title_lower, channel_lower)) {
                    relevance += 1_000;
                }
                (relevance, to_cached(v, now))
            })
            .collect();

        scored.sort_by(|a, b| b.0.cmp(&a.0));
        scored.into_iter().map(|(_, v)| v).take(limit).collect()
    }

    /// Unified master video search mixed across languages, with pinned
    /// injection from the cache so pinned entities are present even when
    /// the live search misses them.
    pub async fn get_videos_by_language(
        &self,
        _lang: &str,
        limit: usize,
        topic_query: Option<&str>,
    ) -> Vec<CachedVideo> {
        let searches: [(String, &str); 3] = [
            (
                topic_query.unwrap_or("Christian Gospel").to_string(),
                "en",
            ),
            (
                topic_query
                    .map(|t| format!("{} Tamil", t))
                    .unwrap_or_else(|| "தமிழ் கிறிஸ்தவ பாடல்கள்".to_string()),
                "ta",
            ),
            (
                topic_query
                    .map(|t| format!("{} Hindi", t))
                    .unwrap_or_else(|| "यीशु मसीह के गीत और संदेश".to_string()),
                "hi",
            ),
        ];

        let tasks = searches.iter().map(|(q, lang)| self.search(q, 20, lang, true));
        let batches = join_all(tasks).await;

        let mut seen = std::collections::HashSet::new();
        let mut unique: Vec<CachedVideo> = Vec::new();
        for video in batches.into_iter().flatten() {
            if seen.insert(video.id.clone()) {
                unique.push(video);
            }
        }

        // Cached pinned rows fill any gaps the live searches left.
        for video in self.get_trending(5).await {
            if seen.insert(video.id.clone()) {
                unique.push(video);
            }
        }

        sort_pinned_first(&mut unique, 1_000);
        let mut tiered = self.geo.sort_with(unique, |v| {
            (format!("{} {}", v.title, v.channel), v.url.clone())
        });
        pin_front(&mut tiered);
        tiered.into_iter().take(limit).collect()
    }

    pub async fn get_all(&self) -> Vec<CachedVideo> {
        self.store.all().await.unwrap_or_default()
    }

    pub async fn toggle_approval(&self, id: &str, approved: bool) -> Result<()> {
        self.store.set_approval(id.to_string(), approved).await
    }
}

/// Stable final pass: pinned rows precede every non-pinned row regardless
/// of tier or timestamp.
fn pin_front(rows: &mut [CachedVideo]) {
    rows.sort_by_key(|v| !is_pinned(&format!("{} {}", v.title, v.channel)));
}

fn sort_pinned_first(rows: &mut [CachedVideo], boost: i64) {
    rows.sort_by(|a, b| {
        let score_a = priority_score(&format!("{} {}", a.title, a.channel), boost);
        let score_b = priority_score(&format!("{} {}", b.title, b.channel), boost);
        score_b
            .cmp(&score_a)
            .then_with(|| b.timestamp.partial_cmp(&a.timestamp).unwrap_or(std::cmp::Ordering::Equal))
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    fn video(id: &str, title: &str, channel: &str, timestamp: f64) -> CachedVideo {
        CachedVideo {
            id: id.into(),
            title: title.into(),
            url: format!("https://www.youtube.com/watch?v={}", id),
            thumbnail: String::new(),
            channel: channel.into(),
            views: "1K views".into(),
            published: "1 day ago".into(),
            timestamp,
            is_approved: true,
        }
    }

    #[test]
    fn pinned_videos_sort_above_everything() {
        let mut rows = vec![
            video("a", "Worship night highlights", "Hillsong", 5_000.0),
            video("b", "Convention recap", "Jesus Redeems", 10.0),
            video("c", "Morning devotion", "Vatican News", 4_000.0),
        ];
        sort_pinned_first(&mut rows, 1_000);
        assert_eq!(rows[0].id, "b");
        assert_eq!(rows[1].id, "a");
        assert_eq!(rows[2].id, "c");
    }

    #[test]
    fn christianity_bundle_includes_priority_channel() {
        assert!(topic_channels("Christianity").contains(&"jesusredeems"));
        assert!(topic_channels("Unknown Topic").is_empty());
    }
}
