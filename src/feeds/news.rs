//! News feed worker: periodic RSS ingest with URL resolution, image
//! recovery, topic gating, and the SQLite cache behind the news read paths.

use super::{format_relative, now_ts};
use crate::core::app_state::build_http_client;
use crate::core::types::CachedArticle;
use crate::enrich;
use crate::geo::GeoSorter;
use crate::priority::{is_pinned, priority_score};
use crate::search::engines::{duckduckgo, rss, Region};
use crate::store::news::NewsStore;
use crate::topics::TopicManager;
use anyhow::Result;
use feed_rs::model::Entry;
use futures::future::join_all;
use regex::Regex;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Mutex, Semaphore};
use tracing::{info, warn};

const FETCH_INTERVAL: Duration = Duration::from_secs(60);
const FEED_POOL: usize = 10;
const ENTRIES_PER_FEED: usize = 10;
const SNIPPET_MAX: usize = 200;
const LANGUAGE_POOL_QUERIES: usize = 3;

/// Feed bundles per admin topic.
fn topic_feeds(topic: &str) -> &'static [&'static str] {
    match topic {
        "Technology" => &[
            "https://techcrunch.com/feed/",
            "https://www.theverge.com/rss/index.xml",
            "https://www.wired.com/feed/rss",
            "https://feeds.arstechnica.com/arstechnica/index",
        ],
        "Science" => &[
            "https://www.sciencedaily.com/rss/all.xml",
            "https://science.nasa.gov/feed",
            "https://www.livescience.com/feeds/all",
        ],
        "Sports" => &[
            "https://www.espn.com/espn/rss/news",
            "https://sports.yahoo.com/rss/",
            "https://feeds.bbci.co.uk/sport/rss.xml",
        ],
        "Global News" => &[
            "https://feeds.bbci.co.uk/news/rss.xml",
            "https://www.aljazeera.com/xml/rss/all.xml",
            "https://rss.cnn.com/rss/edition.rss",
            "https://www.dw.com/api/rss/en",
        ],
        "Christianity" => &[
            "https://www.christianitytoday.com/feed",
            "https://www.persecution.org/feed/",
            "https://morningstarnews.org/feed/",
            "https://www.catholicnewsagency.com/rss/news.xml",
            "https://www.christianpost.com/rss/all",
            "https://premierchristian.news/feed",
            "https://religionnews.com/feed/",
            "https://www.vaticannews.va/en.rss.xml",
            "https://matterindia.com/feed/",
            "https://www.indiancatholicmatters.org/feed/",
            "https://www.ucanews.com/rss/india",
            "https://christiantoday.co.in/feed",
            "https://news.google.com/rss/search?q=Tamil+Nadu+Christian+News&hl=en-IN&gl=IN&ceid=IN:en",
            "https://news.google.com/rss/search?q=Christian+Persecution+India&hl=en-IN&gl=IN&ceid=IN:en",
            "https://news.google.com/rss/search?q=Catholic+Church+Kerala+Tamil+Nadu&hl=en-IN&gl=IN&ceid=IN:en",
        ],
        _ => &[],
    }
}

/// Always fetched so pinned content is never starved, whatever topics the
/// admin has active.
const PRIORITY_FEEDS: [&str; 3] = [
    "https://jesusredeems.com/feed",
    "https://news.google.com/rss/search?q=Jesus+Redeems+Ministries&hl=en-IN&gl=IN&ceid=IN:en",
    "https://news.google.com/rss/search?q=site:jesusredeems.com&hl=en-IN&gl=IN&ceid=IN:en",
];

/// Gate applied to the Christianity bundle: an entry must mention one of
/// these in title+summary to be cached.
const CHRISTIAN_KEYWORDS: [&str; 22] = [
    "church", "christian", "christ", "jesus", "mohan", "bishop", "pastor", "ministry",
    "diocese", "vatican", "catholic", "protestant", "csi", "gospel", "prayer", "worship",
    "faith", "bible", "persecution", "redeems", "lazarus", "jrm",
];

fn lang_params(lang: &str) -> (&'static str, &'static str, &'static str) {
    match lang {
        "hi" => ("hi", "IN", "IN:hi"),
        "ta" => ("ta", "IN", "IN:ta"),
        _ => ("en-IN", "IN", "IN:en"),
    }
}

pub struct NewsFeed {
    store: NewsStore,
    topics: Arc<TopicManager>,
    client: reqwest::Client,
    geo: GeoSorter,
    /// Single-flight guard for the synchronous seed on first read.
    seed_lock: Mutex<()>,
}

impl NewsFeed {
    pub fn new(store: NewsStore, topics: Arc<TopicManager>) -> Arc<Self> {
        Arc::new(Self {
            store,
            topics,
            client: build_http_client(),
            geo: GeoSorter::new(),
            seed_lock: Mutex::new(()),
        })
    }

    /// Worker loop. Seeds immediately when the store is empty, then cycles
    /// every minute. The stop signal is honored between cycles only.
    pub async fn run(self: Arc<Self>, mut stop: watch::Receiver<bool>) {
        info!("news feed worker started");
        loop {
            if let Err(e) = self.fetch_cycle().await {
                warn!("news fetch cycle failed: {}", e);
            }
            if let Err(e) = self.store.cleanup(now_ts()).await {
                warn!("news cleanup skipped: {}", e);
            }
            tokio::select! {
                _ = tokio::time::sleep(FETCH_INTERVAL) => {}
                _ = stop.changed() => {
                    info!("news feed worker stopping");
                    break;
                }
            }
        }
    }

    /// One cycle: pick feeds by active topics, fetch in a bounded pool,
    /// process entries, batch-upsert.
    pub async fn fetch_cycle(&self) -> Result<()> {
        let active = self.topics.active_keywords();

        let mut targets: Vec<(String, String)> = Vec::new();
        for topic in &active {
            for url in topic_feeds(topic) {
                targets.push((url.to_string(), topic.clone()));
            }
        }
        if targets.is_empty() {
            for url in topic_feeds("Christianity") {
                targets.push((url.to_string(), "Christianity".to_string()));
            }
        }
        for url in PRIORITY_FEEDS {
            if !targets.iter().any(|(u, _)| u == url) {
                targets.push((url.to_string(), "Christianity".to_string()));
            }
        }

        info!("fetching {} feeds", targets.len());

        let sem = Arc::new(Semaphore::new(FEED_POOL));
        let mut tasks = Vec::with_capacity(targets.len());
        for (url, category) in targets {
            let sem = Arc::clone(&sem);
            let client = self.client.clone();
            tasks.push(async move {
                let _permit = sem.acquire().await.expect("semaphore closed");
                match rss::fetch(&client, &url).await {
                    Ok(feed) => {
                        let source = rss::feed_title(&feed);
                        let entries: Vec<Entry> =
                            feed.entries.into_iter().take(ENTRIES_PER_FEED).collect();
                        Some((entries, source, category))
                    }
                    // Per-feed failures drop silently; the bundle is large.
                    Err(_) => None,
                }
            });
        }

        let mut prepared: Vec<CachedArticle> = Vec::new();
        for fetched in join_all(tasks).await.into_iter().flatten() {
            let (entries, source, category) = fetched;
            for entry in entries {
                if let Some(article) = self.process_entry(entry, &source, &category).await {
                    prepared.push(article);
                }
            }
        }

        if prepared.is_empty() {
            warn!("no items prepared this cycle (all filtered out?)");
            return Ok(());
        }

        let count = self.store.upsert_batch(prepared).await?;
        info!("saved {} news items", count);
        Ok(())
    }

    async fn process_entry(
        &self,
        entry: Entry,
        source: &str,
        category: &str,
    ) -> Option<CachedArticle> {
        let title = rss::entry_title(&entry);
        let url = rss::entry_link(&entry)?;
        if title.is_empty() {
            return None;
        }

        let summary = rss::entry_summary(&entry);
        if category == "Christianity" {
            let gate_text = format!("{} {}", title, summary).to_lowercase();
            if !CHRISTIAN_KEYWORDS.iter().any(|k| gate_text.contains(k)) {
                return None;
            }
        }

        let real_url = crate::safety::resolve_redirect(&self.client, &url).await;
        let image = self.recover_image(&entry, &real_url, &title).await;

        let timestamp = entry
            .published
            .or(entry.updated)
            .map(|dt| dt.timestamp() as f64)
            .unwrap_or_else(now_ts);

        let snippet: String = rss::strip_html(&summary).chars().take(SNIPPET_MAX).collect();

        Some(CachedArticle {
            id: format!("{:x}", md5::compute(&real_url)),
            title,
            url: real_url,
            published: rss::entry_published(&entry),
            source: source.to_string(),
            image,
            guid: entry.id.clone(),
            timestamp,
            snippet,
            is_approved: true,
        })
    }

    /// Image recovery chain: RSS media tags, then the page's own metadata,
    /// then a live image search. `None` beats a placeholder.
    async fn recover_image(&self, entry: &Entry, real_url: &str, title: &str) -> Option<String> {
        if let Some(img) = rss::entry_image(entry) {
            return Some(img);
        }
        if let Some(meta) = enrich::fetch_page_meta(&self.client, real_url).await {
            if let Some(img) = meta.image {
                return Some(img);
            }
        }
        let clean_title = Regex::new(r"[^\w\s]")
            .ok()?
            .replace_all(title, "")
            .to_string();
        enrich::fallback_image_search(&self.client, &clean_title).await
    }

    /// Feed read: approved rows newest-first with pinned boost and geo
    /// tiering. An empty store triggers exactly one synchronous fetch.
    pub async fn get_news(&self, limit: usize) -> Vec<CachedArticle> {
        let mut rows = self
            .store
            .approved_recent(limit * 2)
            .await
            .unwrap_or_default();

        if rows.is_empty() {
            let _guard = self.seed_lock.lock().await;
            // Another reader may have seeded while we waited on the lock.
            if self.store.is_empty().await.unwrap_or(false) {
                info!("store empty on read, seeding synchronously");
                if let Err(e) = self.fetch_cycle().await {
                    warn!("synchronous seed failed: {}", e);
                }
            }
            rows = self
                .store
                .approved_recent(limit * 2)
                .await
                .unwrap_or_default();
        }

        let now = now_ts();
        for row in &mut rows {
            row.published = format_relative(row.timestamp, now);
        }

        sort_pinned_first(&mut rows, 100);
        let mut tiered = self.geo.sort_with(rows, |a| {
            (
                format!("{} {} {}", a.title, a.snippet, a.url),
                a.url.clone(),
            )
        });
        // Pinned rows outrank geo tiers too; the stable pass keeps tier
        // order intact within each class.
        pin_front(&mut tiered);
        tiered.into_iter().take(limit).collect()
    }

    /// Live search over the aggregator's localized RSS endpoint. New rows
    /// warm the cache; the free news adapter covers aggregator outages.
    pub async fn search(&self, query: &str, limit: usize, lang: &str) -> Vec<CachedArticle> {
        let mut query = query.to_string();

        // Strict topic control, with pinned content exempt by construction.
        let active = self.topics.active_keywords();
        if !active.is_empty() {
            let q_lower = query.to_lowercase();
            if !active.iter().any(|t| q_lower.contains(&t.to_lowercase())) {
                if let Some(clause) = self.topics.active_topic_query() {
                    query = format!("{} AND ({})", query, clause);
                    info!("strict topic applied to news search: {}", query);
                }
            }
        }

        let (hl, gl, ceid) = lang_params(lang);
        let mut rss_url =
            match reqwest::Url::parse("https://news.google.com/rss/search") {
                Ok(u) => u,
                Err(_) => return Vec::new(),
            };
        rss_url
            .query_pairs_mut()
            .append_pair("q", &query)
            .append_pair("hl", hl)
            .append_pair("gl", gl)
            .append_pair("ceid", ceid);

        let feed = match rss::fetch(&self.client, rss_url.as_str()).await {
            Ok(feed) => feed,
            Err(e) => {
                warn!("aggregator search failed ({}), falling back to web news", e);
                return self.fallback_news_search(&query, limit).await;
            }
        };

        let source_default = rss::feed_title(&feed);
        let mut results = Vec::new();
        for entry in feed.entries.into_iter().take(limit) {
            let title = rss::entry_title(&entry);
            let Some(link) = rss::entry_link(&entry) else {
                continue;
            };
            if title.is_empty() {
                continue;
            }
            let real_url = crate::safety::resolve_redirect(&self.client, &link).await;
            let image = self.recover_image(&entry, &real_url, &title).await;
            let snippet: String = rss::strip_html(&rss::entry_summary(&entry))
                .chars()
                .take(180)
                .collect();

            results.push(CachedArticle {
                id: format!("{:x}", md5::compute(&real_url)),
                title,
                url: real_url,
                published: rss::entry_published(&entry),
                source: source_default.clone(),
                image,
                guid: entry.id.clone(),
                timestamp: now_ts(),
                snippet,
                is_approved: true,
            });
        }

        let tiered = self.geo.sort_with(results, |a| {
            (
                format!("{} {} {}", a.title, a.snippet, a.url),
                a.url.clone(),
            )
        });

        // Live searches warm the cache without clobbering moderation.
        if !tiered.is_empty() {
            match self.store.insert_ignore_batch(tiered.clone()).await {
                Ok(saved) if saved > 0 => info!("saved {} new items from search", saved),
                Ok(_) => {}
                Err(e) => warn!("failed to persist search results: {}", e),
            }
        }

        tiered
    }

    async fn fallback_news_search(&self, query: &str, limit: usize) -> Vec<CachedArticle> {
        match duckduckgo::search_news(&self.client, query, Region::Global, limit).await {
            Ok(hits) => hits
                .into_iter()
                .map(|h| CachedArticle {
                    id: format!("{:x}", md5::compute(&h.url)),
                    title: h.title,
                    url: h.url,
                    published: h.published_at.unwrap_or_default(),
                    source: h.engine.unwrap_or_else(|| "news".into()),
                    image: h.image,
                    guid: String::new(),
                    timestamp: now_ts(),
                    snippet: h.snippet,
                    is_approved: true,
                })
                .collect(),
            Err(e) => {
                warn!("fallback news search also failed: {}", e);
                Vec::new()
            }
        }
    }

    /// Unified master feed mixed across languages (en/ta/hi), with strict
    /// topic filtering and the dominant pinned boost.
    pub async fn get_news_by_language(
        &self,
        _lang: &str,
        limit: usize,
        topic_query: Option<&str>,
    ) -> Vec<CachedArticle> {
        let searches: [(String, &str); LANGUAGE_POOL_QUERIES] = [
            (
                topic_query.unwrap_or("Christian News").to_string(),
                "en",
            ),
            (
                topic_query
                    .map(|t| format!("{} OR கிறிஸ்தவம்", t))
                    .unwrap_or_else(|| "கிறிஸ்தவ செய்திகள்".to_string()),
                "ta",
            ),
            (
                topic_query
                    .map(|t| format!("{} OR ईसाई", t))
                    .unwrap_or_else(|| "ईसाई समाचार".to_string()),
                "hi",
            ),
        ];

        let tasks = searches
            .iter()
            .map(|(q, lang)| self.search(q, 15, lang));
        let batches = join_all(tasks).await;

        let mut seen = std::collections::HashSet::new();
        let mut unique: Vec<CachedArticle> = Vec::new();
        for article in batches.into_iter().flatten() {
            if seen.insert(article.url.clone()) {
                unique.push(article);
            }
        }

        // Strict topic filter: keep topical rows and pinned rows, drop the
        // rest entirely.
        let active = self.topics.active_keywords();
        if !active.is_empty() {
            unique.retain(|a| {
                let text = format!("{} {}", a.title, a.snippet).to_lowercase();
                active.iter().any(|t| text.contains(&t.to_lowercase())) || is_pinned(&text)
            });
        }

        sort_pinned_first(&mut unique, 10_000);
        let mut tiered = self.geo.sort_with(unique, |a| {
            (
                format!("{} {} {}", a.title, a.snippet, a.url),
                a.url.clone(),
            )
        });
        pin_front(&mut tiered);
        tiered.into_iter().take(limit).collect()
    }

    pub async fn get_all(&self) -> Vec<CachedArticle> {
        self.store.all().await.unwrap_or_default()
    }

    pub async fn toggle_approval(&self, id: &str, approved: bool) -> Result<()> {
        self.store.set_approval(id.to_string(), approved).await
    }
}

/// Stable final pass: pinned rows precede every non-pinned row regardless
/// of tier or timestamp.
fn pin_front(rows: &mut [CachedArticle]) {
    rows.sort_by_key(|a| {
        !is_pinned(&format!("{} {} {}", a.title, a.source, a.snippet))
    });
}

/// Stable sort: pinned rows first (their boost dwarfs everything), then by
/// recency within each class.
fn sort_pinned_first(rows: &mut [CachedArticle], boost: i64) {
    rows.sort_by(|a, b| {
        let score_a = priority_score(
            &format!("{} {} {}", a.title, a.source, a.snippet),
            boost,
        );
        let score_b = priority_score(
            &format!("{} {} {}", b.title, b.source, b.snippet),
            boost,
        );
        score_b
            .cmp(&score_a)
            .then_with(|| b.timestamp.partial_cmp(&a.timestamp).unwrap_or(std::cmp::Ordering::Equal))
    });
}
