//! Outbound URL safety plus aggregator redirect resolution.
//!
//! Every fetcher in the crate goes through [`is_safe_url`] before touching
//! the network. The resolver turns Google-News article links into the real
//! publisher URL so downstream metadata scraping sees the actual page.

use regex::Regex;
use scraper::{Html, Selector};
use std::net::IpAddr;
use std::time::Duration;
use tracing::debug;

pub const BROWSER_UA: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// Total wall-clock budget for a full resolve attempt (all strategies).
const RESOLVE_BUDGET: Duration = Duration::from_secs(10);

/// Hosts that never count as a resolved landing page.
const TRACKING_HOSTS: [&str; 6] = [
    "google.com",
    "googleusercontent.com",
    "gstatic.com",
    "doubleclick.net",
    "googletagmanager.com",
    "googlesyndication.com",
];

/// Reject anything that could reach internal infrastructure.
///
/// Scheme must be http(s); localhost aliases, private/loopback/link-local/
/// reserved addresses, RFC-1918 hostname prefixes, and internal-looking
/// domain suffixes are all refused.
pub fn is_safe_url(raw: &str) -> bool {
    let Ok(parsed) = url::Url::parse(raw) else {
        return false;
    };

    if !matches!(parsed.scheme(), "http" | "https") {
        return false;
    }

    let Some(host) = parsed.host_str() else {
        return false;
    };
    let host = host.trim_start_matches('[').trim_end_matches(']');
    let lower = host.to_ascii_lowercase();

    if matches!(lower.as_str(), "localhost" | "127.0.0.1" | "0.0.0.0" | "::1") {
        return false;
    }

    if let Ok(ip) = lower.parse::<IpAddr>() {
        if !ip_is_public(ip) {
            return false;
        }
    }

    if lower.starts_with("10.") || lower.starts_with("192.168.") {
        return false;
    }
    if let Some(rest) = lower.strip_prefix("172.") {
        if let Some(second) = rest.split('.').next().and_then(|s| s.parse::<u8>().ok()) {
            if (16..=31).contains(&second) {
                return false;
            }
        }
    }

    const INTERNAL_SUFFIXES: [&str; 4] = [".local", ".internal", ".corp", ".localdomain"];
    if INTERNAL_SUFFIXES.iter().any(|s| lower.ends_with(s)) {
        return false;
    }

    true
}

fn ip_is_public(ip: IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => {
            !(v4.is_private()
                || v4.is_loopback()
                || v4.is_link_local()
                || v4.is_unspecified()
                || v4.is_broadcast()
                || v4.is_documentation()
                // 240.0.0.0/4 (reserved) and 100.64.0.0/10 (CGNAT)
                || v4.octets()[0] >= 240
                || (v4.octets()[0] == 100 && (64..128).contains(&v4.octets()[1])))
        }
        IpAddr::V6(v6) => {
            !(v6.is_loopback()
                || v6.is_unspecified()
                // fc00::/7 unique-local, fe80::/10 link-local
                || (v6.segments()[0] & 0xfe00) == 0xfc00
                || (v6.segments()[0] & 0xffc0) == 0xfe80)
        }
    }
}

/// Whether this URL belongs to the news aggregator and needs resolving.
pub fn is_aggregator_url(url: &str) -> bool {
    url.contains("news.google.com") || url.contains("google.com/rss")
}

fn is_resolved_host(url: &reqwest::Url) -> bool {
    let Some(host) = url.host_str() else {
        return false;
    };
    let lower = host.to_ascii_lowercase();
    !(lower == "google.com"
        || lower.ends_with(".google.com")
        || lower == "googleusercontent.com"
        || lower.ends_with(".googleusercontent.com"))
}

fn is_tracking_host(candidate: &str) -> bool {
    TRACKING_HOSTS.iter().any(|h| candidate.contains(h))
}

/// Resolve an aggregator article URL to the publisher URL.
///
/// Strategy order: HEAD with redirects, GET with redirects, body scan for an
/// absolute off-aggregator link, then the `window.location.replace` pattern.
/// Anything else (including the 10s budget running out) returns the original
/// URL unchanged.
pub async fn resolve_redirect(client: &reqwest::Client, url: &str) -> String {
    if !is_aggregator_url(url) {
        return url.to_string();
    }

    match tokio::time::timeout(RESOLVE_BUDGET, resolve_inner(client, url)).await {
        Ok(Some(resolved)) => resolved,
        _ => {
            debug!("redirect resolution fell through for {}", url);
            url.to_string()
        }
    }
}

async fn resolve_inner(client: &reqwest::Client, url: &str) -> Option<String> {
    let request = |method: reqwest::Method| {
        client
            .request(method, url)
            .header("User-Agent", BROWSER_UA)
            .header("Referer", "https://news.google.com/")
            .header("Connection", "close")
    };

    // 1. HEAD follows redirects without pulling a body.
    if let Ok(resp) = request(reqwest::Method::HEAD).send().await {
        if is_resolved_host(resp.url()) {
            return Some(resp.url().to_string());
        }
    }

    // 2. GET — some publishers only redirect on a real page load.
    let resp = request(reqwest::Method::GET).send().await.ok()?;
    if is_resolved_host(resp.url()) {
        return Some(resp.url().to_string());
    }

    let body = resp.text().await.ok()?;

    // 3. First absolute link in the landing body that leaves the aggregator.
    if let Some(found) = extract_external_link(&body) {
        return Some(found);
    }

    // 4. Consent/interstitial pages sometimes carry a JS bounce.
    let re = Regex::new(r#"window\.location\.replace\("([^"]+)"\)"#).ok()?;
    re.captures(&body)
        .and_then(|cap| cap.get(1))
        .map(|m| m.as_str().to_string())
}

/// Pull the best external candidate out of an aggregator landing page.
/// Prefers URLs that look like articles (dated paths, `.html`, `article`,
/// `news` segments) over arbitrary outbound links.
fn extract_external_link(body: &str) -> Option<String> {
    let doc = Html::parse_document(body);
    let sel = Selector::parse("a[href]").ok()?;

    let mut fallback: Option<String> = None;
    for a in doc.select(&sel) {
        let Some(href) = a.value().attr("href") else {
            continue;
        };
        if !href.starts_with("http") || is_tracking_host(href) {
            continue;
        }

        let lower = href.to_ascii_lowercase();
        if lower.contains("/20")
            || lower.contains(".html")
            || lower.contains("article")
            || lower.contains("news")
        {
            return Some(href.to_string());
        }
        if fallback.is_none() {
            fallback = Some(href.to_string());
        }
    }
    fallback
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blocks_ssrf_targets() {
        let blocked = [
            "http://localhost/admin",
            "http://127.0.0.1:8080/",
            "https://0.0.0.0/",
            "http://[::1]/metrics",
            "http://10.0.0.5/",
            "http://172.16.4.1/",
            "http://172.31.255.1/",
            "http://192.168.1.1/router",
            "http://internal-box.corp/",
            "http://db.internal/",
            "http://printer.local/",
            "http://host.localdomain/",
            "http://169.254.169.254/latest/meta-data/",
            "ftp://example.com/file",
            "file:///etc/passwd",
            "http://100.64.0.1/",
        ];
        for url in blocked {
            assert!(!is_safe_url(url), "{} should be rejected", url);
        }
    }

    #[test]
    fn allows_public_hosts() {
        let allowed = [
            "https://example.com/page",
            "http://news.google.com/rss/articles/abc",
            "https://www.thehindu.com/news/national/",
            "https://172.15.0.1/",
            "https://8.8.8.8/",
        ];
        for url in allowed {
            assert!(is_safe_url(url), "{} should pass", url);
        }
    }

    #[test]
    fn aggregator_detection() {
        assert!(is_aggregator_url(
            "https://news.google.com/rss/articles/CBMi"
        ));
        assert!(is_aggregator_url("https://google.com/rss/search?q=x"));
        assert!(!is_aggregator_url("https://example.com/news"));
    }

    #[test]
    fn body_scan_prefers_article_shaped_links() {
        let body = r#"
            <html><body>
            <a href="https://www.gstatic.com/x.png">asset</a>
            <a href="https://example.org/about">about</a>
            <a href="https://publisher.in/2026/02/01/flood-relief.html">story</a>
            </body></html>
        "#;
        assert_eq!(
            extract_external_link(body).as_deref(),
            Some("https://publisher.in/2026/02/01/flood-relief.html")
        );
    }

    #[test]
    fn body_scan_falls_back_to_any_external_link() {
        let body = r#"<a href="https://example.org/about">about</a>"#;
        assert_eq!(
            extract_external_link(body).as_deref(),
            Some("https://example.org/about")
        );
    }
}
