//! RSS/Atom adapter. One hit per entry; image extraction walks the media
//! extensions before falling back to a best-effort `<img>` scan over the
//! summary HTML.

use super::EngineError;
use crate::enrich::image_allowed;
use feed_rs::model::{Entry, Feed};
use regex::Regex;
use scraper::Html;
use std::sync::OnceLock;
use std::time::Duration;

pub async fn fetch(client: &reqwest::Client, url: &str) -> Result<Feed, EngineError> {
    let resp = client
        .get(url)
        .header("User-Agent", crate::safety::BROWSER_UA)
        .timeout(Duration::from_secs(15))
        .send()
        .await
        .map_err(|e| EngineError::Transient(e.to_string()))?;

    if !resp.status().is_success() {
        return Err(EngineError::Transient(format!(
            "http_{}",
            resp.status().as_u16()
        )));
    }

    let bytes = resp
        .bytes()
        .await
        .map_err(|e| EngineError::Transient(e.to_string()))?;

    feed_rs::parser::parse(&bytes[..]).map_err(|e| EngineError::Fatal(e.to_string()))
}

pub fn feed_title(feed: &Feed) -> String {
    feed.title
        .as_ref()
        .map(|t| t.content.clone())
        .unwrap_or_else(|| "RSS".to_string())
}

pub fn entry_link(entry: &Entry) -> Option<String> {
    entry.links.first().map(|l| l.href.clone())
}

pub fn entry_title(entry: &Entry) -> String {
    entry
        .title
        .as_ref()
        .map(|t| t.content.clone())
        .unwrap_or_default()
}

pub fn entry_summary(entry: &Entry) -> String {
    entry
        .summary
        .as_ref()
        .map(|t| t.content.clone())
        .unwrap_or_default()
}

/// Publication string in the form it will be shown; feeds that omit a date
/// yield an empty string.
pub fn entry_published(entry: &Entry) -> String {
    entry
        .published
        .or(entry.updated)
        .map(|dt| dt.to_rfc2822())
        .unwrap_or_default()
}

fn img_src_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#"<img[^>]+src="([^">]+)""#).expect("static regex"))
}

/// Extraction order: media content, media thumbnail, image-typed enclosure
/// link, then an `<img src>` scan over the summary. Block-listed assets are
/// treated as absent.
pub fn entry_image(entry: &Entry) -> Option<String> {
    let mut candidate: Option<String> = None;

    for media in &entry.media {
        for content in &media.content {
            if let Some(url) = &content.url {
                let is_image = content
                    .content_type
                    .as_ref()
                    .map(|t| t.to_string().starts_with("image/"))
                    .unwrap_or(true);
                if is_image {
                    candidate = Some(url.to_string());
                    break;
                }
            }
        }
        if candidate.is_some() {
            break;
        }
        if let Some(thumb) = media.thumbnails.first() {
            candidate = Some(thumb.image.uri.clone());
            break;
        }
    }

    if candidate.is_none() {
        candidate = entry
            .links
            .iter()
            .find(|l| {
                l.rel.as_deref() == Some("enclosure")
                    && l.media_type
                        .as_deref()
                        .map(|t| t.starts_with("image/"))
                        .unwrap_or(false)
            })
            .map(|l| l.href.clone());
    }

    if candidate.is_none() {
        let summary = entry_summary(entry);
        candidate = img_src_re()
            .captures(&summary)
            .and_then(|cap| cap.get(1))
            .map(|m| m.as_str().to_string());
    }

    candidate.filter(|img| image_allowed(img))
}

/// Tag-stripped plain text, whitespace collapsed. Used for cached snippets.
pub fn strip_html(html: &str) -> String {
    let fragment = Html::parse_fragment(html);
    let text: String = fragment.root_element().text().collect::<Vec<_>>().join(" ");
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
