use serde::{Deserialize, Serialize};

/// Geographic tier assigned by the geo sorter. Serialized with the display
/// labels the clients render ("Tamil Nadu" / "India" / "Global").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GeoTier {
    #[serde(rename = "Tamil Nadu")]
    Local,
    #[serde(rename = "India")]
    National,
    #[serde(rename = "Global")]
    Global,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SourceType {
    Web,
    News,
    Video,
    Paper,
    Social,
    LegalAct,
    LegalProcedure,
    LegalNews,
}

impl Default for SourceType {
    fn default() -> Self {
        SourceType::Web
    }
}

/// Internal scoring scratchpad. Never serialized; the only externally
/// visible trace is `Hit::debug_score` (the final hybrid value).
#[derive(Debug, Clone, Copy, Default)]
pub struct Scores {
    pub relevance: i32,
    pub bm25: f64,
    pub vector: f64,
    pub quality: f64,
    pub penalty: f64,
    pub hybrid: f64,
}

/// One atomic search result. Exists only within a request; never persisted.
///
/// Identity: two hits are the same entity iff their normalized URLs match
/// (see [`crate::search::normalize_url`]). Feed workers additionally apply a
/// fuzzy title dedupe, but that is their policy, not part of hit identity.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Hit {
    pub title: String,
    pub url: String,
    #[serde(default)]
    pub snippet: String,
    #[serde(rename = "source", default)]
    pub source_type: SourceType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub engine: Option<String>,
    /// Absolute image URL, or `null`. Never a placeholder asset.
    #[serde(default)]
    pub image: Option<String>,
    /// Publication date in whatever form the source gave us (ISO, RFC-2822,
    /// or a relative string). Preserved verbatim.
    #[serde(rename = "published", default, skip_serializing_if = "Option::is_none")]
    pub published_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub geo_tier: Option<GeoTier>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub debug_score: Option<f64>,
    #[serde(skip)]
    pub scores: Scores,
}

impl Hit {
    /// Content-addressed identifier: md5 of the normalized URL.
    pub fn id(&self) -> String {
        format!(
            "{:x}",
            md5::compute(crate::search::normalize_url(&self.url))
        )
    }
}

/// A cached news article row. Written exclusively by the news feed worker.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CachedArticle {
    /// md5 of the resolved (publisher) URL — never the aggregator URL.
    pub id: String,
    pub title: String,
    pub url: String,
    /// Publication string as the feed reported it; replaced by a relative
    /// form ("2 hours ago") on read paths.
    pub published: String,
    /// Feed title.
    pub source: String,
    pub image: Option<String>,
    pub guid: String,
    /// Ingest time, Unix seconds.
    pub timestamp: f64,
    /// Plain-text summary, ≤ 200 chars.
    pub snippet: String,
    pub is_approved: bool,
}

/// A cached video row. Written exclusively by the video feed worker.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CachedVideo {
    /// Provider video id.
    pub id: String,
    pub title: String,
    pub url: String,
    pub thumbnail: String,
    pub channel: String,
    pub views: String,
    /// Relative string as the provider reported it ("3 weeks ago").
    pub published: String,
    pub timestamp: f64,
    pub is_approved: bool,
}

impl CachedArticle {
    pub fn into_hit(self) -> Hit {
        Hit {
            title: self.title,
            url: self.url,
            snippet: self.snippet,
            source_type: SourceType::News,
            engine: Some(self.source),
            image: self.image,
            published_at: Some(self.published),
            ..Default::default()
        }
    }
}

impl CachedVideo {
    pub fn into_hit(self) -> Hit {
        Hit {
            title: self.title,
            url: self.url,
            snippet: String::new(),
            source_type: SourceType::Video,
            engine: Some(self.channel),
            image: Some(self.thumbnail),
            published_at: Some(self.published),
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hit_round_trips_with_null_image() {
        let hit = Hit {
            title: "Flood relief in Chennai".into(),
            url: "https://example.in/news/flood".into(),
            snippet: "Volunteers mobilize".into(),
            source_type: SourceType::News,
            engine: Some("duckduckgo".into()),
            image: None,
            published_at: Some("2026-02-01".into()),
            geo_tier: Some(GeoTier::Local),
            debug_score: Some(0.73),
            scores: Scores::default(),
        };

        let json = serde_json::to_value(&hit).unwrap();
        assert!(json.get("image").unwrap().is_null());
        assert_eq!(json["source"], "news");
        assert_eq!(json["geo_tier"], "Tamil Nadu");
        assert_eq!(json["published"], "2026-02-01");

        let back: Hit = serde_json::from_value(json).unwrap();
        assert_eq!(back.title, hit.title);
        assert_eq!(back.image, None);
        assert_eq!(back.geo_tier, Some(GeoTier::Local));
        assert_eq!(back.debug_score, Some(0.73));
    }

    #[test]
    fn hit_id_is_stable_across_tracking_params() {
        let a = Hit {
            url: "https://example.com/story?utm_source=rss".into(),
            ..Default::default()
        };
        let b = Hit {
            url: "https://Example.com/story/".into(),
            ..Default::default()
        };
        assert_eq!(a.id(), b.id());
    }
}
