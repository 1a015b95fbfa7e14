//! Geographic tiering: Tamil Nadu first, then India, then the rest of the
//! world. Runs after ranking and only regroups — order inside each tier is
//! whatever the ranker produced.

use crate::core::types::{GeoTier, Hit};
use tracing::debug;

/// Tier-1 vocabulary: state, cities, districts.
const LOCAL_KEYWORDS: [&str; 26] = [
    "tamil nadu", "tamilnadu", "chennai", "madurai", "coimbatore", "salem",
    "tiruchirappalli", "trichy", "tirunelveli", "vellore", "erode",
    "thoothukudi", "thanjavur", "dindigul", "kanyakumari", "nagercoil",
    "kanchipuram", "cuddalore", "tiruppur", "sivakasi", "karur", "hosur",
    "virudhunagar", "theni", "ramanathapuram", "sivaganga",
];

/// Tier-2 vocabulary: country tokens not already caught by tier 1.
const NATIONAL_KEYWORDS: [&str; 12] = [
    "india", "indian", "delhi", "mumbai", "bangalore", "bengaluru",
    "kerala", "hyderabad", "kolkata", "rupee", "inr", "dalit",
];

#[derive(Default, Clone)]
pub struct GeoSorter;

impl GeoSorter {
    pub fn new() -> Self {
        Self
    }

    /// Tier from a free-text searchable context (title + snippet + url).
    pub fn classify_context(&self, context: &str, url: &str) -> GeoTier {
        let context = context.to_lowercase();

        if LOCAL_KEYWORDS.iter().any(|kw| context.contains(kw)) {
            return GeoTier::Local;
        }

        // Country TLD counts as a national signal even without keywords.
        if url.to_lowercase().contains(".in/")
            || NATIONAL_KEYWORDS.iter().any(|kw| context.contains(kw))
        {
            return GeoTier::National;
        }

        GeoTier::Global
    }

    pub fn classify(&self, hit: &Hit) -> GeoTier {
        let context = format!("{} {} {}", hit.title, hit.snippet, hit.url);
        self.classify_context(&context, &hit.url)
    }

    /// Regroup arbitrary items into contiguous Local → National → Global
    /// tiers, preserving per-tier order. The closure supplies each item's
    /// `(context, url)` pair.
    pub fn sort_with<T, F>(&self, items: Vec<T>, ctx: F) -> Vec<T>
    where
        F: Fn(&T) -> (String, String),
    {
        let total = items.len();
        let mut local = Vec::new();
        let mut national = Vec::new();
        let mut global = Vec::new();

        for item in items {
            let (context, url) = ctx(&item);
            match self.classify_context(&context, &url) {
                GeoTier::Local => local.push(item),
                GeoTier::National => national.push(item),
                GeoTier::Global => global.push(item),
            }
        }

        debug!(
            "geo sorted {} results -> local: {}, national: {}, global: {}",
            total,
            local.len(),
            national.len(),
            global.len()
        );

        local.extend(national);
        local.extend(global);
        local
    }

    /// Hit-specific sort that also tags each hit's `geo_tier` field.
    pub fn sort_results(&self, hits: Vec<Hit>) -> Vec<Hit> {
        let mut hits = hits;
        for hit in &mut hits {
            hit.geo_tier = Some(self.classify(hit));
        }
        self.sort_with(hits, |h| {
            (
                format!("{} {} {}", h.title, h.snippet, h.url),
                h.url.clone(),
            )
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hit(title: &str, url: &str) -> Hit {
        Hit {
            title: title.into(),
            url: url.into(),
            ..Default::default()
        }
    }

    #[test]
    fn tiers_are_contiguous_and_tagged() {
        let sorter = GeoSorter::new();
        let hits = vec![
            hit("World council meets", "https://example.com/world"),
            hit("Chennai diocese announcement", "https://example.com/chennai"),
            hit("Parliament passes bill in India", "https://example.com/delhi"),
            hit("Global summit roundup", "https://example.org/summit"),
        ];
        let sorted = sorter.sort_results(hits);
        assert_eq!(sorted[0].geo_tier, Some(GeoTier::Local));
        assert_eq!(sorted[1].geo_tier, Some(GeoTier::National));
        assert_eq!(sorted[2].geo_tier, Some(GeoTier::Global));
        assert_eq!(sorted[3].geo_tier, Some(GeoTier::Global));
    }

    #[test]
    fn country_tld_implies_national() {
        let sorter = GeoSorter::new();
        let h = hit("State budget coverage", "https://www.thehindu.in/budget");
        assert_eq!(sorter.classify(&h), GeoTier::National);
    }

    #[test]
    fn per_tier_order_is_preserved() {
        let sorter = GeoSorter::new();
        let hits = vec![
            hit("global one", "https://a.com/1"),
            hit("madurai story", "https://a.com/2"),
            hit("global two", "https://a.com/3"),
            hit("trichy story", "https://a.com/4"),
        ];
        let sorted = sorter.sort_results(hits);
        let urls: Vec<&str> = sorted.iter().map(|h| h.url.as_str()).collect();
        assert_eq!(
            urls,
            vec!["https://a.com/2", "https://a.com/4", "https://a.com/1", "https://a.com/3"]
        );
    }
}
