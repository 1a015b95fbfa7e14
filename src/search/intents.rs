//! Query-expansion layer: each active intent contributes a set of
//! site-operator templates formatted with the topic. Not an adapter — the
//! expanded queries all dispatch to whichever web engine is selected.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    General,
    Academic,
    FaithData,
    Social,
    Video,
    Commerce,
    News,
}

impl Intent {
    pub fn as_str(self) -> &'static str {
        match self {
            Intent::General => "general",
            Intent::Academic => "academic",
            Intent::FaithData => "faith_data",
            Intent::Social => "social",
            Intent::Video => "video",
            Intent::Commerce => "commerce",
            Intent::News => "news",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "general" => Some(Intent::General),
            "academic" => Some(Intent::Academic),
            "faith_data" | "christ_data" => Some(Intent::FaithData),
            "social" => Some(Intent::Social),
            "video" => Some(Intent::Video),
            "commerce" => Some(Intent::Commerce),
            "news" => Some(Intent::News),
            _ => None,
        }
    }
}

pub fn templates(intent: Intent) -> &'static [&'static str] {
    match intent {
        Intent::General => &["{topic}"],
        Intent::Academic => &["{topic} research", "{topic} site:.edu"],
        Intent::FaithData => &[
            // Global Christian news & media
            "{topic} site:christianpost.com OR site:cbn.com OR site:christianitytoday.com",
            "{topic} site:godreports.com OR site:religionnews.com OR site:premierchristian.news",
            // Theology & resources
            "{topic} site:biblegateway.com OR site:crosswalk.com OR site:biblestudytools.com",
            "{topic} site:desiringgod.org OR site:thegospelcoalition.org OR site:ligonier.org",
            // Persecution & missions
            "{topic} site:opendoors.org OR site:persecution.org OR site:vom.org",
            "{topic} site:missionnetworknews.org OR site:barnabasfund.org",
            // Research
            "{topic} site:pewresearch.org \"christian\"",
            "{topic} \"christian perspective\" OR \"biblical view\"",
        ],
        Intent::Social => &["{topic} forum", "{topic} reddit"],
        Intent::Video => &["{topic} youtube", "{topic} site:tbn.org", "{topic} site:godtube.com"],
        Intent::Commerce => &["{topic} price", "{topic} buy"],
        Intent::News => &[
            "{topic} news",
            "{topic} site:reuters.com OR site:apnews.com OR site:bbc.com",
            "{topic} site:cnn.com OR site:foxnews.com OR site:aljazeera.com",
        ],
    }
}

/// Expand the topic into per-intent queries. Faith sources always lead and
/// a plain general query always closes, regardless of what the caller
/// activated.
pub fn expand(topic: &str, active: &[Intent]) -> Vec<(String, Intent)> {
    let mut order: Vec<Intent> = Vec::new();
    if !active.contains(&Intent::FaithData) {
        order.push(Intent::FaithData);
    }
    order.extend(active.iter().copied());
    if !order.contains(&Intent::General) {
        order.push(Intent::General);
    }

    let mut out = Vec::new();
    for intent in order {
        for template in templates(intent) {
            out.push((template.replace("{topic}", topic), intent));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expansion_always_brackets_with_faith_and_general() {
        let queries = expand("youth rally", &[Intent::News]);
        assert_eq!(queries.first().unwrap().1, Intent::FaithData);
        assert_eq!(queries.last().unwrap().1, Intent::General);
        assert!(queries.iter().any(|(q, _)| q == "youth rally news"));
        assert!(queries.iter().all(|(q, _)| q.contains("youth rally")));
    }

    #[test]
    fn no_duplicate_intents_when_caller_passes_them() {
        let queries = expand("t", &[Intent::FaithData, Intent::General]);
        let general_count = queries.iter().filter(|(_, i)| *i == Intent::General).count();
        assert_eq!(general_count, templates(Intent::General).len());
    }

    #[test]
    fn parse_accepts_wire_names() {
        assert_eq!(Intent::parse("christ_data"), Some(Intent::FaithData));
        assert_eq!(Intent::parse("NEWS"), Some(Intent::News));
        assert_eq!(Intent::parse("bogus"), None);
    }
}
