//! Paid web search. Preferred per-request whenever the caller passes an API
//! key; vendor-side errors degrade to an empty result set plus log lines so
//! a bad key never fails a whole request.

use super::{EngineError, Recency};
use crate::core::types::{Hit, SourceType};
use std::time::Duration;
use tracing::warn;

/// Vendor page-size ceiling.
const MAX_PAGE: usize = 100;

pub async fn search(
    client: &reqwest::Client,
    query: &str,
    max_results: usize,
    recency: Option<Recency>,
    api_key: &str,
) -> Result<Vec<Hit>, EngineError> {
    if api_key.trim().is_empty() {
        return Err(EngineError::Fatal("missing api key".into()));
    }

    let num = max_results.min(MAX_PAGE).to_string();
    let mut params: Vec<(&str, String)> = vec![
        ("engine", "google".to_string()),
        ("q", query.to_string()),
        ("num", num),
        ("api_key", api_key.to_string()),
    ];
    if let Some(r) = recency {
        params.push(("tbs", format!("qdr:{}", r.code())));
    }

    let resp = client
        .get("https://serpapi.com/search.json")
        .query(&params)
        .timeout(Duration::from_secs(30))
        .send()
        .await
        .map_err(|e| EngineError::Transient(e.to_string()))?;

    if !resp.status().is_success() {
        warn!("paid search http error: {}", resp.status());
        return Ok(Vec::new());
    }

    let data: serde_json::Value = resp
        .json()
        .await
        .map_err(|e| EngineError::Transient(e.to_string()))?;

    if let Some(err) = data.get("error").and_then(|v| v.as_str()) {
        warn!("paid search vendor error: {}", err);
        return Ok(Vec::new());
    }

    Ok(parse_organic(&data, max_results))
}

fn parse_organic(data: &serde_json::Value, max_results: usize) -> Vec<Hit> {
    let mut out = Vec::new();
    let Some(organic) = data.get("organic_results").and_then(|v| v.as_array()) else {
        return out;
    };
    for r in organic {
        if out.len() >= max_results {
            break;
        }
        let title = r.get("title").and_then(|v| v.as_str()).unwrap_or("");
        let link = r.get("link").and_then(|v| v.as_str()).unwrap_or("");
        if title.is_empty() || url::Url::parse(link).is_err() {
            continue;
        }
        out.push(Hit {
            title: title.to_string(),
            url: link.to_string(),
            snippet: r
                .get("snippet")
                .and_then(|v| v.as_str())
                .unwrap_or("")
                .to_string(),
            source_type: SourceType::Web,
            engine: Some("google".to_string()),
            image: r
                .get("thumbnail")
                .and_then(|v| v.as_str())
                .map(|s| s.to_string()),
            published_at: r
                .get("date")
                .and_then(|v| v.as_str())
                .map(|s| s.to_string()),
            ..Default::default()
        });
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn page_size_is_capped() {
        assert_eq!(500usize.min(MAX_PAGE), 100);
    }

    #[test]
    fn organic_results_map_to_hits() {
        let data = json!({
            "organic_results": [
                {
                    "title": "Renewable capacity crosses milestone",
                    "link": "https://example.in/energy",
                    "snippet": "India added record capacity",
                    "date": "Jan 10, 2026",
                    "thumbnail": "https://serpcdn.example/t.jpg"
                },
                {"title": "No link, dropped"},
                {"title": "", "link": "https://example.com/empty-title"}
            ]
        });
        let hits = parse_organic(&data, 10);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].engine.as_deref(), Some("google"));
        assert_eq!(hits[0].published_at.as_deref(), Some("Jan 10, 2026"));
    }

    #[test]
    fn missing_organic_block_is_empty_not_error() {
        let hits = parse_organic(&json!({"search_metadata": {}}), 10);
        assert!(hits.is_empty());
    }
}
