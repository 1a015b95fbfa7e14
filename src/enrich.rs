//! Best-effort preview enrichment: Open Graph / Twitter metadata, image
//! block-listing, and the last-resort image search used by the feed workers.
//!
//! Enrichment never fails a request and never changes ranking — a hit that
//! cannot be enriched goes out exactly as the adapter produced it.

use crate::core::types::Hit;
use crate::safety::{is_safe_url, BROWSER_UA};
use aho_corasick::AhoCorasick;
use scraper::{Html, Selector};
use std::sync::Arc;
use std::sync::OnceLock;
use std::time::Duration;
use tokio::sync::Semaphore;

/// How many of the top-ranked hits get a preview fetch.
const ENRICH_TOP: usize = 30;
/// Concurrent preview fetches.
const ENRICH_POOL: usize = 15;
/// Per-page fetch budget.
const META_TIMEOUT: Duration = Duration::from_secs(3);
/// Per-item overall budget (fetch + parse).
const ITEM_TIMEOUT: Duration = Duration::from_secs(5);

/// Known junk assets the aggregator hands out instead of article art.
const BLOCKED_IMAGE_URLS: [&str; 4] = [
    "https://ssl.gstatic.com/gnews/logo/google_news_192.png",
    "https://www.gstatic.com/images/branding/product/1x/gnews_512dp.png",
    "https://lh3.googleusercontent.com/-FzM2e4gQ7pQ/AAAAAAAAAAI/AAAAAAAAAAA/ACHi3re7r_B7oH8k9lg/s96-c/photo.jpg",
    "https://lh3.googleusercontent.com/J6_coFbogxhRI9iM864NL_liGXvsQp2AupsKei7z0cNNfDvGUmWUy20nuUhkREQyrp54bTT=w300",
];

const BLOCKED_IMAGE_TOKENS: [&str; 8] = [
    "logo",
    "icon",
    "branding",
    "placeholder",
    "pixel",
    "default",
    "favicon",
    "avatar",
];

fn blocked_token_matcher() -> &'static AhoCorasick {
    static MATCHER: OnceLock<AhoCorasick> = OnceLock::new();
    MATCHER.get_or_init(|| {
        AhoCorasick::new(BLOCKED_IMAGE_TOKENS).expect("static pattern set")
    })
}

/// Whether an image URL is usable as article art. Placeholder assets are
/// worse than no image at all — callers must store `None` instead.
pub fn image_allowed(url: &str) -> bool {
    if url.trim().is_empty() {
        return false;
    }
    if BLOCKED_IMAGE_URLS.iter().any(|b| url.contains(b)) {
        return false;
    }
    let lower = url.to_ascii_lowercase();
    if lower.contains("gstatic.com") {
        return false;
    }
    !blocked_token_matcher().is_match(&lower)
}

#[derive(Debug, Clone, Default)]
pub struct PageMeta {
    pub image: Option<String>,
    pub description: Option<String>,
    pub published: Option<String>,
}

fn meta_content(doc: &Html, css: &str) -> Option<String> {
    let sel = Selector::parse(css).ok()?;
    doc.select(&sel)
        .next()
        .and_then(|el| el.value().attr("content"))
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

/// Fetch a page and pull its preview metadata. Returns `None` on any
/// failure — enrichment is silent by contract.
pub async fn fetch_page_meta(client: &reqwest::Client, url: &str) -> Option<PageMeta> {
    if !is_safe_url(url) {
        return None;
    }

    let resp = client
        .get(url)
        .header("User-Agent", BROWSER_UA)
        .timeout(META_TIMEOUT)
        .send()
        .await
        .ok()?;
    if !resp.status().is_success() {
        return None;
    }
    let body = resp.text().await.ok()?;

    let doc = Html::parse_document(&body);

    let image = meta_content(&doc, "meta[property=\"og:image\"]")
        .or_else(|| meta_content(&doc, "meta[name=\"twitter:image\"]"))
        .filter(|img| image_allowed(img));

    let description = meta_content(&doc, "meta[property=\"og:description\"]");

    let published = meta_content(&doc, "meta[property=\"article:published_time\"]")
        .or_else(|| meta_content(&doc, "meta[property=\"og:updated_time\"]"))
        .or_else(|| meta_content(&doc, "meta[name=\"pubdate\"]"));

    Some(PageMeta {
        image,
        description,
        published,
    })
}

/// Enrich the top hits in place: real article image, a fuller description,
/// and a publication time when the page exposes one.
pub async fn enrich_hits(client: &reqwest::Client, hits: &mut [Hit]) {
    let top = hits.len().min(ENRICH_TOP);
    if top == 0 {
        return;
    }

    let sem = Arc::new(Semaphore::new(ENRICH_POOL));
    let mut tasks = Vec::with_capacity(top);
    for (idx, hit) in hits.iter().enumerate().take(top) {
        let url = hit.url.clone();
        let client = client.clone();
        let sem = Arc::clone(&sem);
        tasks.push(tokio::spawn(async move {
            let _permit = sem.acquire_owned().await.ok()?;
            let meta = tokio::time::timeout(ITEM_TIMEOUT, fetch_page_meta(&client, &url))
                .await
                .ok()??;
            Some((idx, meta))
        }));
    }

    for task in tasks {
        let Ok(Some((idx, meta))) = task.await else {
            continue;
        };
        let hit = &mut hits[idx];
        if let Some(img) = meta.image {
            hit.image = Some(img);
        }
        if let Some(desc) = meta.description {
            if desc.len() > 10 {
                hit.snippet = desc;
            }
        }
        if hit.published_at.is_none() {
            hit.published_at = meta.published;
        }
    }
}

/// Last-resort image recovery: a real-time image search, safe-search on,
/// medium photos only. Returns the first candidate that clears the block
/// list. Used only when neither the feed entry nor the page itself carried
/// a usable image.
pub async fn fallback_image_search(client: &reqwest::Client, query: &str) -> Option<String> {
    let vqd = crate::search::engines::fetch_vqd(client, query).await?;

    let resp = client
        .get("https://duckduckgo.com/i.js")
        .header("User-Agent", BROWSER_UA)
        .header("Referer", "https://duckduckgo.com/")
        .query(&[
            ("q", query),
            ("o", "json"),
            ("vqd", vqd.as_str()),
            ("p", "1"),
            ("f", "size:Medium,type:photo"),
        ])
        .timeout(Duration::from_secs(8))
        .send()
        .await
        .ok()?;

    let payload: serde_json::Value = resp.json().await.ok()?;
    let results = payload.get("results")?.as_array()?;
    for r in results.iter().take(3) {
        if let Some(img) = r.get("image").and_then(|v| v.as_str()) {
            if image_allowed(img) {
                return Some(img.to_string());
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn block_list_rejects_placeholder_assets() {
        assert!(!image_allowed(
            "https://ssl.gstatic.com/gnews/logo/google_news_192.png"
        ));
        assert!(!image_allowed("https://cdn.site.com/assets/logo-small.png"));
        assert!(!image_allowed("https://cdn.site.com/favicon.ico"));
        assert!(!image_allowed("https://cdn.site.com/img/default.jpg"));
        assert!(!image_allowed(""));
    }

    #[test]
    fn block_list_passes_article_art() {
        assert!(image_allowed(
            "https://images.example.com/2026/02/story-lead.jpg"
        ));
        assert!(image_allowed(
            "https://media.publisher.in/uploads/flood-relief-camp.webp"
        ));
    }

    #[test]
    fn meta_extraction_reads_og_tags() {
        let html = r#"
            <html><head>
            <meta property="og:image" content="https://pub.example/art.jpg">
            <meta property="og:description" content="A longer description of the story.">
            <meta property="article:published_time" content="2026-01-15T08:00:00Z">
            </head><body></body></html>
        "#;
        let doc = Html::parse_document(html);
        assert_eq!(
            meta_content(&doc, "meta[property=\"og:image\"]").as_deref(),
            Some("https://pub.example/art.jpg")
        );
        assert_eq!(
            meta_content(&doc, "meta[property=\"article:published_time\"]").as_deref(),
            Some("2026-01-15T08:00:00Z")
        );
    }
}
