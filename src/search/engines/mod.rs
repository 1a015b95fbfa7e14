pub mod duckduckgo;
pub mod rss;
pub mod serp;
pub mod youtube;

use crate::safety::BROWSER_UA;
use regex::Regex;
use reqwest::StatusCode;

#[derive(Debug)]
pub enum EngineError {
    Blocked { reason: String },
    Transient(String),
    Fatal(String),
}

impl std::fmt::Display for EngineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EngineError::Blocked { reason } => write!(f, "blocked: {}", reason),
            EngineError::Transient(e) => write!(f, "transient: {}", e),
            EngineError::Fatal(e) => write!(f, "fatal: {}", e),
        }
    }
}

impl std::error::Error for EngineError {}

/// Search region. The service defaults to global and narrows to India for
/// the legal and feed paths.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Region {
    #[default]
    Global,
    IndiaEn,
}

impl Region {
    pub fn code(self) -> &'static str {
        match self {
            Region::Global => "wt-wt",
            Region::IndiaEn => "in-en",
        }
    }
}

/// Recency window for providers that support one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Recency {
    Day,
    Week,
    Month,
    Year,
}

impl Recency {
    pub fn code(self) -> &'static str {
        match self {
            Recency::Day => "d",
            Recency::Week => "w",
            Recency::Month => "m",
            Recency::Year => "y",
        }
    }
}

/// CJK or Arabic codepoints anywhere in the text. Providers leak regional
/// results into global queries; callers preferring Latin output drop these.
pub fn contains_non_latin(text: &str) -> bool {
    text.chars().any(|c| {
        ('\u{4e00}'..='\u{9fff}').contains(&c) || ('\u{0600}'..='\u{06ff}').contains(&c)
    })
}

pub fn detect_block_reason(status: StatusCode, body: &str) -> Option<String> {
    if status == StatusCode::TOO_MANY_REQUESTS {
        return Some("http_429".to_string());
    }
    if status == StatusCode::FORBIDDEN {
        return Some("http_403".to_string());
    }
    if status == StatusCode::SERVICE_UNAVAILABLE {
        return Some("http_503".to_string());
    }

    let lower = body.to_lowercase();
    let maybe = [
        ("unusual traffic", "unusual_traffic"),
        ("captcha", "captcha"),
        ("verify you are human", "captcha"),
        ("enable javascript", "js_required"),
        ("access denied", "access_denied"),
    ];
    for (needle, label) in maybe {
        if lower.contains(needle) {
            return Some(label.to_string());
        }
    }
    None
}

pub async fn fetch_html(
    client: &reqwest::Client,
    url: reqwest::Url,
) -> Result<(StatusCode, String), EngineError> {
    let mut req = client
        .get(url)
        .header("User-Agent", crate::stealth::random_user_agent());
    for (k, v) in crate::stealth::navigation_headers() {
        req = req.header(k, v);
    }
    let resp = req
        .send()
        .await
        .map_err(|e| EngineError::Transient(e.to_string()))?;

    let status = resp.status();
    let body = resp.text().await.unwrap_or_default();

    if let Some(reason) = detect_block_reason(status, &body) {
        return Err(EngineError::Blocked { reason });
    }
    if !status.is_success() {
        return Err(EngineError::Transient(format!("http_{}", status.as_u16())));
    }
    Ok((status, body))
}

/// Several provider JSON endpoints require a per-query token embedded in
/// the HTML search page; one extra round trip fetches it.
pub(crate) async fn fetch_vqd(client: &reqwest::Client, query: &str) -> Option<String> {
    let body = client
        .get("https://duckduckgo.com/")
        .header("User-Agent", BROWSER_UA)
        .query(&[("q", query)])
        .timeout(std::time::Duration::from_secs(5))
        .send()
        .await
        .ok()?
        .text()
        .await
        .ok()?;

    let re = Regex::new(r#"vqd=['"]?([\d-]+)['"]?"#).ok()?;
    Some(re.captures(&body)?.get(1)?.as_str().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn non_latin_detection() {
        assert!(contains_non_latin("最新新闻报道"));
        assert!(contains_non_latin("أخبار اليوم"));
        assert!(!contains_non_latin("Chennai flood relief"));
        // Indic scripts are fine — the filter only targets CJK and Arabic.
        assert!(!contains_non_latin("கிறிஸ்தவ செய்திகள்"));
    }

    #[test]
    fn block_detection_by_status() {
        assert_eq!(
            detect_block_reason(StatusCode::TOO_MANY_REQUESTS, ""),
            Some("http_429".into())
        );
        assert_eq!(detect_block_reason(StatusCode::OK, "all fine"), None);
    }
}
