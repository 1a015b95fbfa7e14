//! Lexical relevance gate. Runs before the hybrid ranker and throws out
//! blacklisted domains and off-topic noise so the ranker only pays for
//! plausible candidates.

use crate::core::types::Hit;
use std::collections::HashSet;
use tracing::debug;

/// Pure-noise words stripped from the topic before keyword matching.
const STOP_WORDS: [&str; 33] = [
    "the", "a", "an", "in", "on", "at", "for", "to", "of", "and", "or", "with", "about",
    "updates", "details", "info", "information", "find", "search", "query", "what", "is",
    "how", "where", "when", "who", "verify", "check", "list", "show", "give", "me", "any",
];

/// Weak context words — they match almost anything, so a match is only worth
/// a small boost and they never count as core keywords.
const GENERIC_WORDS: [&str; 25] = [
    "conference", "meeting", "video", "news", "report", "paper", "research", "study",
    "analysis", "global", "trends", "updates", "daily", "weekly", "forum", "discussion",
    "prices", "shop", "store", "online", "watch", "live", "data", "results", "announcements",
];

/// Low-quality aggregators and commerce noise. Always filtered.
const BLACKLIST_DOMAINS: [&str; 11] = [
    "10times.com",
    "eventbrite.com",
    "allconferencealert.com",
    "waaset.org",
    "conferencealerts.com",
    "waset.org",
    "researchgate.net",
    "pinterest.com",
    "ebay.com",
    "amazon.com",
    "temu.com",
];

/// Default topical vocabulary: a match anywhere in title+snippet earns a
/// strong boost. Swappable via [`ContentFilter::with_topical_keywords`].
const FAITH_KEYWORDS: [&str; 36] = [
    "christian", "christ", "jesus", "church", "bible", "gospel", "faith", "worship",
    "prayer", "ministry", "missionary", "pastor", "bishop", "catholic", "protestant",
    "evangelical", "pentecostal", "baptist", "methodist", "presbyterian", "anglican",
    "vatican", "pope", "scripture", "theology", "sermon", "disciples", "apostle",
    "trinity", "salvation", "grace", "holy spirit", "resurrection", "persecution",
    "martyr", "testament",
];

const TECH_TOPIC_TERMS: [&str; 7] = [
    "windows", "microsoft", "update", "android", "software", "linux", "code",
];

const SPAM_TERMS: [&str; 6] = [
    "windows update", "android", "software download", "crack", "serial", "hack",
];

pub struct ContentFilter {
    stop_words: HashSet<&'static str>,
    generic_words: HashSet<&'static str>,
    topical_keywords: Vec<String>,
}

impl Default for ContentFilter {
    fn default() -> Self {
        Self::new()
    }
}

impl ContentFilter {
    pub fn new() -> Self {
        Self {
            stop_words: STOP_WORDS.iter().copied().collect(),
            generic_words: GENERIC_WORDS.iter().copied().collect(),
            topical_keywords: FAITH_KEYWORDS.iter().map(|s| s.to_string()).collect(),
        }
    }

    pub fn with_topical_keywords(mut self, keywords: Vec<String>) -> Self {
        self.topical_keywords = keywords;
        self
    }

    /// Relevance score for one hit against the topic. `-1` means the domain
    /// is blacklisted and the hit must always be dropped.
    pub fn relevance(&self, topic: &str, hit: &Hit) -> i32 {
        let title = hit.title.to_lowercase();
        let snippet = hit.snippet.to_lowercase();
        let url = hit.url.to_lowercase();

        if BLACKLIST_DOMAINS.iter().any(|b| url.contains(b)) {
            return -1;
        }

        let full_text = format!("{} {}", title, snippet);

        let raw_keywords: Vec<String> = topic
            .to_lowercase()
            .split_whitespace()
            .filter(|w| w.len() > 2 && !self.stop_words.contains(*w))
            .map(|w| w.to_string())
            .collect();
        if raw_keywords.is_empty() {
            // Topic was all stop words; nothing meaningful to gate on.
            return 50;
        }

        let core_keywords: Vec<&String> = raw_keywords
            .iter()
            .filter(|k| !self.generic_words.contains(k.as_str()))
            .collect();

        let mut score = 0i32;

        let mut missing_core = 0i32;
        for k in &core_keywords {
            if title.contains(k.as_str()) {
                score += 40;
            } else if snippet.contains(k.as_str()) {
                score += 15;
            } else {
                missing_core += 1;
            }
        }
        score -= missing_core * 5;

        for k in raw_keywords
            .iter()
            .filter(|k| self.generic_words.contains(k.as_str()))
        {
            if full_text.contains(k.as_str()) {
                score += 10;
            }
        }

        for k in &self.topical_keywords {
            if full_text.contains(k.as_str()) {
                score += 25;
            }
        }

        // Software-update spam pollutes almost every broad query; only a
        // genuinely tech-flavored topic is allowed to match those terms.
        let topic_lower = topic.to_lowercase();
        let is_tech_topic = TECH_TOPIC_TERMS.iter().any(|t| topic_lower.contains(t));
        if !is_tech_topic && SPAM_TERMS.iter().any(|s| full_text.contains(s)) {
            score -= 100;
        }

        score
    }

    /// Keep hits at or above `min_score`, annotate their relevance, and
    /// order best-first.
    pub fn filter_batch(&self, hits: Vec<Hit>, topic: &str, min_score: i32) -> Vec<Hit> {
        let before = hits.len();
        let mut kept: Vec<Hit> = hits
            .into_iter()
            .filter_map(|mut hit| {
                let score = self.relevance(topic, &hit);
                if score >= min_score {
                    hit.scores.relevance = score;
                    Some(hit)
                } else {
                    None
                }
            })
            .collect();
        kept.sort_by(|a, b| b.scores.relevance.cmp(&a.scores.relevance));
        debug!(
            "content filter kept {}/{} hits (min_score {})",
            kept.len(),
            before,
            min_score
        );
        kept
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hit(title: &str, snippet: &str, url: &str) -> Hit {
        Hit {
            title: title.into(),
            snippet: snippet.into(),
            url: url.into(),
            ..Default::default()
        }
    }

    #[test]
    fn blacklisted_domain_is_always_dropped() {
        let f = ContentFilter::new();
        let h = hit("Church conference tickets", "buy now", "https://eventbrite.com/e/1");
        assert_eq!(f.relevance("church conference", &h), -1);
        assert!(f.filter_batch(vec![h], "church conference", 5).is_empty());
    }

    #[test]
    fn title_match_beats_snippet_match() {
        let f = ContentFilter::new();
        let in_title = hit("Persecution report released", "", "https://a.org/1");
        let in_snippet = hit("Weekly digest", "persecution report released", "https://b.org/1");
        assert!(f.relevance("persecution", &in_title) > f.relevance("persecution", &in_snippet));
    }

    #[test]
    fn spam_terms_sink_non_tech_topics() {
        let f = ContentFilter::new();
        let spam = hit(
            "Best software download crack serial",
            "free hack",
            "https://sketchy.example/dl",
        );
        assert!(f.relevance("church choir", &spam) < 0);
        // A tech topic is allowed to talk about software.
        assert!(f.relevance("linux software", &spam) > f.relevance("church choir", &spam));
    }

    #[test]
    fn all_stopword_topic_scores_neutral() {
        let f = ContentFilter::new();
        let h = hit("Anything", "at all", "https://x.example/");
        assert_eq!(f.relevance("the what is", &h), 50);
    }

    #[test]
    fn topical_vocabulary_boosts_matches() {
        let f = ContentFilter::new();
        let faith = hit("Gospel outreach in Madurai", "church ministry", "https://a.in/1");
        let neutral = hit("Outreach in Madurai", "city ministry drive", "https://b.in/1");
        assert!(f.relevance("outreach madurai", &faith) > f.relevance("outreach madurai", &neutral));
    }
}
