//! The orchestrator: fan-out over expanded queries, collect, dedupe,
//! filter, rank, enrich, geo-tier. Per-source failures accumulate in an
//! error list and never abort the request.

pub mod engines;
pub mod intents;

use crate::core::error::SearchError;
use crate::core::types::Hit;
use crate::core::AppState;
use crate::enrich;
use crate::geo::GeoSorter;
use crate::nlp::filter::ContentFilter;
use crate::nlp::rank::HybridRanker;
use engines::{Recency, Region};
use futures::future::join_all;
use intents::Intent;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Workers per fan-out round.
const FAN_OUT_POOL: usize = 10;
/// Per-adapter call budget.
const ADAPTER_TIMEOUT: Duration = Duration::from_secs(30);
/// Relevance threshold for the content filter.
const FILTER_MIN_SCORE: i32 = 5;
/// Below this many ranked hits, a broader second round fires.
const LOW_RESULTS: usize = 10;
/// Hard cap on query length after sanitization.
const MAX_QUERY_LEN: usize = 500;

/// Strip control and shell-hostile characters, collapse whitespace, cap the
/// length. An empty return means the query was unusable.
pub fn sanitize_query(query: &str) -> String {
    let cleaned: String = query
        .chars()
        .filter(|c| !c.is_control() && !matches!(c, '<' | '>' | '{' | '}' | '\\' | '|' | '^' | '~' | '[' | ']' | '`'))
        .collect();
    cleaned
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .chars()
        .take(MAX_QUERY_LEN)
        .collect::<String>()
        .trim()
        .to_string()
}

/// Canonical dedupe key: scheme+host lowered, fragment gone, tracking
/// params gone (remainder sorted), trailing slash trimmed. Applying it
/// twice is a no-op.
pub fn normalize_url(raw: &str) -> String {
    let trimmed = raw.trim();
    let Ok(mut parsed) = url::Url::parse(trimmed) else {
        return trimmed.to_string();
    };

    parsed.set_fragment(None);

    if parsed.query().is_some() {
        let mut kept: Vec<(String, String)> = Vec::new();
        for (k, v) in parsed.query_pairs() {
            let k_lower = k.to_ascii_lowercase();
            if k_lower.starts_with("utm_")
                || matches!(
                    k_lower.as_str(),
                    "gclid" | "fbclid" | "yclid" | "mc_cid" | "mc_eid" | "ref" | "ref_src"
                )
            {
                continue;
            }
            kept.push((k.to_string(), v.to_string()));
        }
        kept.sort();
        parsed.set_query(None);
        if !kept.is_empty() {
            let mut qp = parsed.query_pairs_mut();
            for (k, v) in kept {
                qp.append_pair(&k, &v);
            }
        }
    }

    parsed.to_string().trim_end_matches('/').to_string()
}

/// Two-pass dedupe: normalized URL first, then exact lowercase title.
/// Short "archives" stubs are dropped outright.
pub fn dedupe_hits(hits: Vec<Hit>) -> Vec<Hit> {
    let mut seen_urls: HashSet<String> = HashSet::new();
    let mut seen_titles: HashSet<String> = HashSet::new();
    let mut unique = Vec::new();

    for hit in hits {
        let norm_title = hit.title.trim().to_lowercase();
        if norm_title.len() < 20 && norm_title.contains("archives") {
            continue;
        }
        let norm_url = normalize_url(&hit.url);
        if seen_urls.contains(&norm_url) || seen_titles.contains(&norm_title) {
            continue;
        }
        seen_urls.insert(norm_url);
        seen_titles.insert(norm_title);
        unique.push(hit);
    }
    unique
}

pub struct Orchestrator {
    state: Arc<AppState>,
    filter: ContentFilter,
    ranker: HybridRanker,
    geo: GeoSorter,
}

impl Orchestrator {
    pub fn new(state: Arc<AppState>) -> Self {
        let ranker = HybridRanker::new(state.embedder.clone());
        Self {
            state,
            filter: ContentFilter::new(),
            ranker,
            geo: GeoSorter::new(),
        }
    }

    /// Run the full pipeline for one topic. Returns the tiered hits plus
    /// every per-source failure encountered along the way.
    pub async fn run(
        &self,
        topic: &str,
        active_intents: &[Intent],
        limit: usize,
        time_filter: Option<Recency>,
        serp_key: Option<&str>,
    ) -> (Vec<Hit>, Vec<SearchError>) {
        let mut errors: Vec<SearchError> = Vec::new();

        let topic = sanitize_query(topic);
        if topic.is_empty() {
            return (
                Vec::new(),
                vec![SearchError::new("validation", "empty query after sanitization")],
            );
        }

        // Topic constraint: if the admin has topics active and the query
        // doesn't already mention one, append them as an AND clause.
        let mut effective = topic.clone();
        let active_topics = self.state.topics.active_keywords();
        if !active_topics.is_empty() {
            let topic_lower = topic.to_lowercase();
            if !active_topics
                .iter()
                .any(|t| topic_lower.contains(&t.to_lowercase()))
            {
                if let Some(clause) = self.state.topics.active_topic_query() {
                    effective = format!("{} AND ({})", topic, clause);
                    info!("strict topic applied: {}", effective);
                }
            }
        }

        let engine = if serp_key.is_some() { "google" } else { "duckduckgo" };
        info!("orchestrating '{}' via {}", effective, engine);

        let cache_key = format!(
            "q={}|eng={}|time={}|limit={}",
            effective,
            engine,
            time_filter.map(|t| t.code()).unwrap_or("-"),
            limit
        );
        if let Some(cached) = self.state.search_cache.get(&cache_key).await {
            return (cached, errors);
        }

        let queries = intents::expand(&effective, active_intents);
        let raw = self
            .fan_out(&queries, limit, time_filter, serp_key, &mut errors)
            .await;

        let unique = dedupe_hits(raw);
        let filtered = self.filter.filter_batch(unique, &topic, FILTER_MIN_SCORE);
        let mut ranked = self.rank_blocking(filtered, &topic).await;

        // Low-results rule: one broader round (all-purpose intents, double
        // budget, no recency pinning) before giving up on depth.
        if ranked.len() < LOW_RESULTS {
            info!("only {} hits survived ranking, deep discovery round", ranked.len());
            let deep_intents = [Intent::General, Intent::News, Intent::Social];
            let deep_queries = intents::expand(&effective, &deep_intents);
            let extra = self
                .fan_out(&deep_queries, limit * 2, None, serp_key, &mut errors)
                .await;

            let mut merged = ranked;
            merged.extend(extra);
            let merged = dedupe_hits(merged);
            let filtered = self.filter.filter_batch(merged, &topic, FILTER_MIN_SCORE);
            ranked = self.rank_blocking(filtered, &topic).await;
        }

        enrich::enrich_hits(&self.state.http_client, &mut ranked).await;

        let mut final_hits = self.geo.sort_results(ranked);
        final_hits.truncate(limit);

        self.state
            .search_cache
            .insert(cache_key, final_hits.clone())
            .await;

        info!("pipeline complete, {} hits, {} errors", final_hits.len(), errors.len());
        (final_hits, errors)
    }

    /// Bounded-parallel dispatch of the expanded queries to the selected
    /// engine. Failures become `(intent, message)` entries.
    async fn fan_out(
        &self,
        queries: &[(String, Intent)],
        per_query_limit: usize,
        time_filter: Option<Recency>,
        serp_key: Option<&str>,
        errors: &mut Vec<SearchError>,
    ) -> Vec<Hit> {
        let sem = Arc::new(tokio::sync::Semaphore::new(FAN_OUT_POOL));
        let mut tasks = Vec::with_capacity(queries.len());

        for (query, intent) in queries.iter().cloned() {
            let sem = Arc::clone(&sem);
            let client = self.state.http_client.clone();
            let key = serp_key.map(|k| k.to_string());
            tasks.push(async move {
                let _permit = sem.acquire().await.expect("semaphore closed");
                let fut = async {
                    match &key {
                        Some(k) => {
                            engines::serp::search(&client, &query, per_query_limit, time_filter, k)
                                .await
                        }
                        None => {
                            engines::duckduckgo::search(
                                &client,
                                &query,
                                Region::Global,
                                time_filter,
                                per_query_limit,
                                true,
                            )
                            .await
                        }
                    }
                };
                match tokio::time::timeout(ADAPTER_TIMEOUT, fut).await {
                    Ok(Ok(hits)) => Ok(hits),
                    Ok(Err(e)) => Err((intent, e.to_string())),
                    Err(_) => Err((intent, "adapter timed out".to_string())),
                }
            });
        }

        let mut out = Vec::new();
        for result in join_all(tasks).await {
            match result {
                Ok(hits) => out.extend(hits),
                Err((intent, message)) => {
                    warn!("agent failed ({}): {}", intent.as_str(), message);
                    errors.push(SearchError::new(intent.as_str(), message));
                }
            }
        }
        out
    }

    /// Ranking embeds documents when a model is loaded, so it runs on the
    /// blocking pool.
    async fn rank_blocking(&self, hits: Vec<Hit>, query: &str) -> Vec<Hit> {
        let ranker = self.ranker.clone();
        let query = query.to_string();
        match tokio::task::spawn_blocking(move || ranker.rank(hits, &query)).await {
            Ok(ranked) => ranked,
            Err(e) => {
                warn!("ranking task failed: {}", e);
                Vec::new()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::Hit;

    fn hit(title: &str, url: &str) -> Hit {
        Hit {
            title: title.into(),
            url: url.into(),
            ..Default::default()
        }
    }

    #[test]
    fn sanitize_strips_hostile_chars_and_caps_length() {
        assert_eq!(sanitize_query("  hello   world  "), "hello world");
        assert_eq!(sanitize_query("a<b>c{d}e|f^g~h[i]j`k\\l"), "abcdefghijkl");
        assert_eq!(sanitize_query(""), "");
        assert_eq!(sanitize_query("<>{}"), "");

        let long = "x".repeat(501);
        assert_eq!(sanitize_query(&long).len(), 500);
        let exact = "y".repeat(500);
        assert_eq!(sanitize_query(&exact).len(), 500);
    }

    #[test]
    fn normalize_url_is_idempotent() {
        let cases = [
            "https://Example.COM/Path/?utm_source=x&b=2&a=1#frag",
            "http://site.in/news/",
            "not a url at all",
        ];
        for c in cases {
            let once = normalize_url(c);
            assert_eq!(normalize_url(&once), once, "double-normalizing {}", c);
        }
    }

    #[test]
    fn normalize_url_strips_tracking_and_fragment() {
        let n = normalize_url("https://example.com/story?utm_campaign=a&gclid=xyz&id=7#top");
        assert!(!n.contains("utm_"));
        assert!(!n.contains("gclid"));
        assert!(!n.contains('#'));
        assert!(n.contains("id=7"));
    }

    #[test]
    fn dedupe_is_idempotent_and_counts_unique_urls() {
        let hits = vec![
            hit("Story one about churches", "https://a.com/x?utm_source=rss"),
            hit("Story one about churches (dup title)", "https://a.com/x"),
            hit("A different second story", "https://b.com/y"),
            hit("Archives", "https://c.com/arch"),
        ];
        let once = dedupe_hits(hits.clone());
        let urls: HashSet<String> = once.iter().map(|h| normalize_url(&h.url)).collect();
        assert_eq!(once.len(), urls.len());
        assert_eq!(once.len(), 2);

        let twice = dedupe_hits(once.clone());
        assert_eq!(twice.len(), once.len());
    }

    #[test]
    fn dedupe_drops_short_archive_stubs_only() {
        let hits = vec![
            hit("Archives", "https://a.com/1"),
            hit("Archives of the cathedral restoration project", "https://a.com/2"),
        ];
        let kept = dedupe_hits(hits);
        assert_eq!(kept.len(), 1);
        assert!(kept[0].title.contains("cathedral"));
    }
}
