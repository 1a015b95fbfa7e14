//! Free web + news search (the primary engine when no paid key is passed).

use super::{contains_non_latin, fetch_html, EngineError, Recency, Region};
use crate::core::types::{Hit, SourceType};
use scraper::{Html, Selector};
use tracing::warn;

fn normalize_ddg_href(href: &str) -> Option<String> {
    let href = href.trim();
    if href.is_empty() {
        return None;
    }

    // Protocol-relative URLs.
    let candidate = if href.starts_with("//") {
        format!("https:{}", href)
    } else if href.starts_with('/') {
        format!("https://duckduckgo.com{}", href)
    } else {
        href.to_string()
    };

    // Redirect links carry the destination in the `uddg` param.
    if let Ok(url) = url::Url::parse(&candidate) {
        if matches!(url.host_str(), Some("duckduckgo.com")) && url.path().starts_with("/l/") {
            for (k, v) in url.query_pairs() {
                if k == "uddg" && !v.trim().is_empty() {
                    return Some(v.to_string());
                }
            }
        }
    }

    if candidate.starts_with("http://") || candidate.starts_with("https://") {
        return Some(candidate);
    }

    None
}

fn valid_url(raw: &str) -> bool {
    url::Url::parse(raw)
        .map(|u| u.host_str().is_some() && matches!(u.scheme(), "http" | "https"))
        .unwrap_or(false)
}

pub fn parse_results(
    html: &str,
    max_results: usize,
    latin_only: bool,
    source_type: SourceType,
) -> Vec<Hit> {
    let doc = Html::parse_document(html);
    let sel_item = Selector::parse("div.results_links, div.result").unwrap();
    let sel_link = Selector::parse("a.result__a").unwrap();
    let sel_snip = Selector::parse("a.result__snippet, div.result__snippet").unwrap();

    let mut out = Vec::new();
    for item in doc.select(&sel_item) {
        if out.len() >= max_results {
            break;
        }

        let Some(link) = item.select(&sel_link).next() else {
            continue;
        };
        let href_raw = link.value().attr("href").unwrap_or("").to_string();
        let Some(href) = normalize_ddg_href(&href_raw) else {
            continue;
        };
        if !valid_url(&href) {
            continue;
        }

        let title = link.text().collect::<Vec<_>>().join(" ");
        let title = title.split_whitespace().collect::<Vec<_>>().join(" ");
        if title.is_empty() {
            continue;
        }

        let snippet = item
            .select(&sel_snip)
            .next()
            .map(|n| n.text().collect::<Vec<_>>().join(" "))
            .unwrap_or_default();
        let snippet = snippet.split_whitespace().collect::<Vec<_>>().join(" ");

        if latin_only && (contains_non_latin(&title) || contains_non_latin(&snippet)) {
            continue;
        }

        out.push(Hit {
            title,
            url: href,
            snippet,
            source_type,
            engine: Some("duckduckgo".to_string()),
            ..Default::default()
        });
    }

    out
}

/// Broad web search over the HTML endpoint.
pub async fn search(
    client: &reqwest::Client,
    query: &str,
    region: Region,
    recency: Option<Recency>,
    max_results: usize,
    latin_only: bool,
) -> Result<Vec<Hit>, EngineError> {
    let mut url = reqwest::Url::parse("https://html.duckduckgo.com/html/")
        .map_err(|e| EngineError::Fatal(e.to_string()))?;
    {
        let mut qp = url.query_pairs_mut();
        qp.append_pair("q", query);
        qp.append_pair("kl", region.code());
        if let Some(r) = recency {
            qp.append_pair("df", r.code());
        }
    }

    let (_status, body) = fetch_html(client, url).await?;
    Ok(parse_results(&body, max_results, latin_only, SourceType::Web))
}

/// News search via the JSON endpoint. Carries `published_at`; retries once
/// globally when a regioned query comes back empty.
pub async fn search_news(
    client: &reqwest::Client,
    query: &str,
    region: Region,
    max_results: usize,
) -> Result<Vec<Hit>, EngineError> {
    let first = news_once(client, query, region, max_results).await?;
    if !first.is_empty() || region == Region::Global {
        return Ok(first);
    }
    warn!("news search empty for region {}, retrying globally", region.code());
    news_once(client, query, Region::Global, max_results).await
}

async fn news_once(
    client: &reqwest::Client,
    query: &str,
    region: Region,
    max_results: usize,
) -> Result<Vec<Hit>, EngineError> {
    let vqd = super::fetch_vqd(client, query)
        .await
        .ok_or_else(|| EngineError::Transient("vqd token unavailable".into()))?;

    let resp = client
        .get("https://duckduckgo.com/news.js")
        .header("User-Agent", crate::safety::BROWSER_UA)
        .header("Referer", "https://duckduckgo.com/")
        .query(&[
            ("q", query),
            ("o", "json"),
            ("vqd", vqd.as_str()),
            ("l", region.code()),
            ("p", "1"),
        ])
        .send()
        .await
        .map_err(|e| EngineError::Transient(e.to_string()))?;

    let payload: serde_json::Value = resp
        .json()
        .await
        .map_err(|e| EngineError::Transient(e.to_string()))?;

    let mut out = Vec::new();
    let Some(items) = payload.get("results").and_then(|v| v.as_array()) else {
        return Ok(out);
    };
    for item in items {
        if out.len() >= max_results {
            break;
        }
        let title = item.get("title").and_then(|v| v.as_str()).unwrap_or("");
        let link = item.get("url").and_then(|v| v.as_str()).unwrap_or("");
        if title.is_empty() || !valid_url(link) || contains_non_latin(title) {
            continue;
        }

        // Dates arrive as epoch seconds; keep a readable form.
        let published_at = item
            .get("date")
            .and_then(|v| v.as_i64())
            .and_then(|secs| chrono::DateTime::from_timestamp(secs, 0))
            .map(|dt| dt.to_rfc3339());

        out.push(Hit {
            title: title.to_string(),
            url: link.to_string(),
            snippet: item
                .get("excerpt")
                .and_then(|v| v.as_str())
                .unwrap_or("")
                .to_string(),
            source_type: SourceType::News,
            engine: Some("duckduckgo".to_string()),
            image: item
                .get("image")
                .and_then(|v| v.as_str())
                .map(|s| s.to_string())
                .filter(|s| crate::enrich::image_allowed(s)),
            published_at,
            ..Default::default()
        });
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn href_normalization_unwraps_redirect_links() {
        assert_eq!(
            normalize_ddg_href("//duckduckgo.com/l/?uddg=https%3A%2F%2Fexample.com%2Fpage"),
            Some("https://example.com/page".to_string())
        );
        assert_eq!(
            normalize_ddg_href("https://example.com/direct"),
            Some("https://example.com/direct".to_string())
        );
        assert_eq!(normalize_ddg_href("javascript:void(0)"), None);
        assert_eq!(normalize_ddg_href(""), None);
    }

    #[test]
    fn parse_skips_non_latin_when_requested() {
        let html = r##"
        <div class="results_links">
          <a class="result__a" href="https://example.com/en">English headline</a>
          <a class="result__snippet" href="#">A snippet</a>
        </div>
        <div class="results_links">
          <a class="result__a" href="https://example.cn/zh">最新新闻</a>
          <a class="result__snippet" href="#">新闻摘要</a>
        </div>
        "##;
        let latin = parse_results(html, 10, true, SourceType::Web);
        assert_eq!(latin.len(), 1);
        assert_eq!(latin[0].url, "https://example.com/en");

        let all = parse_results(html, 10, false, SourceType::Web);
        assert_eq!(all.len(), 2);
    }

    #[test]
    fn parse_respects_limit() {
        let mut html = String::new();
        for i in 0..20 {
            html.push_str(&format!(
                r#"<div class="results_links"><a class="result__a" href="https://example.com/{}">Title {}</a></div>"#,
                i, i
            ));
        }
        assert_eq!(parse_results(&html, 5, false, SourceType::Web).len(), 5);
    }
}
