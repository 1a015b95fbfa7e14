//! Pinned-entity policy. A short configured token list whose presence in a
//! title/source/snippet/channel overrides relevance in every read path and
//! extends cleanup retention. This is product policy, not a relevance
//! signal — its weight dominates every other score.

use aho_corasick::AhoCorasick;
use std::sync::OnceLock;

/// Ministry/brand tokens that always surface first.
pub const PINNED_TOKENS: [&str; 4] = [
    "jesus redeems",
    "mohan c lazarus",
    "mohan c. lazarus",
    "jrm",
];

/// Human-readable search queries for pinned channel handles, used when a
/// direct channel scrape fails and we fall back to provider search.
pub fn humanize_channel(handle: &str) -> &str {
    match handle {
        "jesusredeems" => "Jesus Redeems Ministries",
        other => other,
    }
}

fn matcher() -> &'static AhoCorasick {
    static MATCHER: OnceLock<AhoCorasick> = OnceLock::new();
    MATCHER.get_or_init(|| {
        AhoCorasick::builder()
            .ascii_case_insensitive(true)
            .build(PINNED_TOKENS)
            .expect("static pattern set")
    })
}

pub fn is_pinned(text: &str) -> bool {
    matcher().is_match(text)
}

/// Read-path ordering score: `boost` when pinned, otherwise 1.
pub fn priority_score(text: &str, boost: i64) -> i64 {
    if is_pinned(text) {
        boost
    } else {
        1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pinned_matching_is_case_insensitive() {
        assert!(is_pinned("Jesus Redeems convention in Nalumavadi"));
        assert!(is_pinned("Interview with MOHAN C LAZARUS"));
        assert!(is_pinned("JRM outreach gallery"));
        assert!(!is_pinned("Morning devotion roundup"));
    }

    #[test]
    fn priority_score_dominates() {
        assert_eq!(priority_score("jesus redeems live", 10_000), 10_000);
        assert_eq!(priority_score("weather update", 10_000), 1);
    }
}
