//! Video search and channel listings, parsed out of the embedded
//! `ytInitialData` state blob on the provider's HTML pages.

use super::{contains_non_latin, fetch_html, EngineError};
use percent_encoding::{utf8_percent_encode, NON_ALPHANUMERIC};
use serde_json::Value;
use tracing::debug;

#[derive(Debug, Clone)]
pub struct VideoResult {
    pub id: String,
    pub title: String,
    pub url: String,
    pub thumbnail: String,
    pub channel: String,
    pub views: String,
    pub published: String,
    pub duration: String,
}

/// Provider search. `latin_only` drops CJK/Arabic titles unless the caller
/// passed a language hint upstream.
pub async fn search(
    client: &reqwest::Client,
    query: &str,
    max_results: usize,
    latin_only: bool,
) -> Result<Vec<VideoResult>, EngineError> {
    let encoded = utf8_percent_encode(query, NON_ALPHANUMERIC).to_string();
    let url = reqwest::Url::parse(&format!(
        "https://www.youtube.com/results?search_query={}",
        encoded
    ))
    .map_err(|e| EngineError::Fatal(e.to_string()))?;

    let (_status, body) = fetch_html(client, url).await?;
    Ok(parse_listing(&body, max_results, latin_only))
}

/// Direct channel scrape (`/@handle/videos`). Used by the feed worker with a
/// small limit; empty results make the caller fall back to search.
pub async fn channel_videos(
    client: &reqwest::Client,
    handle: &str,
    max_results: usize,
) -> Result<Vec<VideoResult>, EngineError> {
    let url = reqwest::Url::parse(&format!(
        "https://www.youtube.com/@{}/videos",
        handle.trim_start_matches('@')
    ))
    .map_err(|e| EngineError::Fatal(e.to_string()))?;

    let (_status, body) = fetch_html(client, url).await?;
    let mut videos = parse_listing(&body, max_results, false);
    // Channel pages omit the owner on each tile; carry the handle through.
    for v in &mut videos {
        if v.channel == "Unknown" {
            v.channel = handle.to_string();
        }
    }
    Ok(videos)
}

fn parse_listing(html: &str, max_results: usize, latin_only: bool) -> Vec<VideoResult> {
    let Some(data) = extract_initial_data(html) else {
        debug!("no ytInitialData blob found in listing page");
        return Vec::new();
    };

    let mut renderers = Vec::new();
    collect_video_renderers(&data, &mut renderers);

    let mut out = Vec::new();
    for v in renderers {
        if out.len() >= max_results {
            break;
        }
        let Some(video) = parse_video_renderer(v) else {
            continue;
        };
        if latin_only && contains_non_latin(&video.title) {
            continue;
        }
        out.push(video);
    }
    out
}

/// Find the embedded state blob and parse exactly one JSON value out of it.
/// The stream deserializer stops at the value boundary, so the trailing
/// `;</script>` noise never matters.
fn extract_initial_data(html: &str) -> Option<Value> {
    let marker = html.find("ytInitialData")?;
    let start = html[marker..].find('{')? + marker;
    serde_json::Deserializer::from_str(&html[start..])
        .into_iter::<Value>()
        .next()?
        .ok()
}

fn collect_video_renderers<'a>(value: &'a Value, out: &mut Vec<&'a Value>) {
    match value {
        Value::Object(map) => {
            for (k, v) in map {
                if k == "videoRenderer" {
                    out.push(v);
                } else {
                    collect_video_renderers(v, out);
                }
            }
        }
        Value::Array(items) => {
            for v in items {
                collect_video_renderers(v, out);
            }
        }
        _ => {}
    }
}

fn parse_video_renderer(v: &Value) -> Option<VideoResult> {
    let id = v.get("videoId")?.as_str()?.to_string();
    let title = v
        .pointer("/title/runs/0/text")?
        .as_str()?
        .to_string();

    // Last thumbnail candidate is the highest quality; the canonical
    // `hqdefault` form is more reliable than maxres for older uploads.
    let thumbnail = v
        .pointer("/thumbnail/thumbnails")
        .and_then(|t| t.as_array())
        .and_then(|arr| arr.last())
        .and_then(|t| t.get("url"))
        .and_then(|u| u.as_str())
        .map(|u| {
            if u.contains("mqdefault") || u.contains("sddefault") || u.contains("hqdefault") {
                format!("https://i.ytimg.com/vi/{}/hqdefault.jpg", id)
            } else {
                u.to_string()
            }
        })
        .unwrap_or_else(|| format!("https://i.ytimg.com/vi/{}/hqdefault.jpg", id));

    let text_at = |ptr: &str, fallback: &str| {
        v.pointer(ptr)
            .and_then(|t| t.as_str())
            .unwrap_or(fallback)
            .to_string()
    };

    Some(VideoResult {
        url: format!("https://www.youtube.com/watch?v={}", id),
        title,
        thumbnail,
        channel: text_at("/ownerText/runs/0/text", "Unknown"),
        views: text_at("/viewCountText/simpleText", "0 views"),
        published: text_at("/publishedTimeText/simpleText", "Recently"),
        duration: text_at("/lengthText/simpleText", "00:00"),
        id,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_page() -> String {
        let data = serde_json::json!({
            "contents": {
                "sectionListRenderer": {
                    "contents": [
                        {"itemSectionRenderer": {"contents": [
                            {"videoRenderer": {
                                "videoId": "abc123def45",
                                "title": {"runs": [{"text": "Sunday service live"}]},
                                "thumbnail": {"thumbnails": [
                                    {"url": "https://i.ytimg.com/vi/abc123def45/mqdefault.jpg"},
                                    {"url": "https://i.ytimg.com/vi/abc123def45/sddefault.jpg"}
                                ]},
                                "ownerText": {"runs": [{"text": "Jesus Redeems"}]},
                                "viewCountText": {"simpleText": "12K views"},
                                "publishedTimeText": {"simpleText": "2 days ago"},
                                "lengthText": {"simpleText": "1:02:33"}
                            }},
                            {"videoRenderer": {
                                "videoId": "zzz999yyy88",
                                "title": {"runs": [{"text": "最新视频"}]},
                                "thumbnail": {"thumbnails": []}
                            }}
                        ]}}
                    ]
                }
            }
        });
        format!(
            "<html><script>var ytInitialData = {};</script></html>",
            data
        )
    }

    #[test]
    fn parses_video_renderers_from_initial_data() {
        let page = sample_page();
        let videos = parse_listing(&page, 10, false);
        assert_eq!(videos.len(), 2);
        let first = &videos[0];
        assert_eq!(first.id, "abc123def45");
        assert_eq!(first.title, "Sunday service live");
        assert_eq!(first.channel, "Jesus Redeems");
        assert_eq!(
            first.thumbnail,
            "https://i.ytimg.com/vi/abc123def45/hqdefault.jpg"
        );
        assert_eq!(first.duration, "1:02:33");
        assert_eq!(first.url, "https://www.youtube.com/watch?v=abc123def45");
    }

    #[test]
    fn latin_filter_drops_cjk_titles() {
        let page = sample_page();
        let videos = parse_listing(&page, 10, true);
        assert_eq!(videos.len(), 1);
        assert_eq!(videos[0].id, "abc123def45");
    }

    #[test]
    fn missing_blob_yields_empty() {
        assert!(parse_listing("<html><body>nope</body></html>", 5, false).is_empty());
    }
}
