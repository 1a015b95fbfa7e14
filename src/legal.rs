//! Legal query fan-out: three bounded-parallel source classes (statute
//! registries, procedural guides, rights news) with region fallback, then a
//! structured LLM synthesis. The core enforces the section contract, never
//! the prose.

use crate::core::types::{Hit, SourceType};
use crate::core::AppState;
use crate::search::engines::{duckduckgo, Region};
use crate::search::normalize_url;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{info, warn};

const ACTS_TOP: usize = 5;
const PROCEDURES_TOP: usize = 5;
const NEWS_TOP: usize = 3;

/// A news hit must carry at least one of these to count as legal context.
const LEGAL_VOCABULARY: [&str; 15] = [
    "court", "judgement", "law", "act", "bill", "rights", "constitution", "freedom",
    "religion", "minority", "justice", "petition", "verdict", "bench", "tribunal",
];

const APOLOGY: &str = "I'm sorry, I encountered an error while synthesizing the legal data. \
Please check the API quota or connection and try again.";

/// Static language → voice map for the optional speech handoff.
fn voice_for(lang: &str) -> &'static str {
    match lang {
        "hi" => "nova",
        "ta" => "echo",
        _ => "alloy",
    }
}

#[derive(Debug, serde::Serialize)]
pub struct LegalAnswer {
    pub answer: String,
    pub acts: Vec<Hit>,
    pub procedures: Vec<Hit>,
    pub news: Vec<Hit>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Set only when the caller opted into speech synthesis.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub voice: Option<String>,
}

pub struct LegalAssistant {
    state: Arc<AppState>,
}

impl LegalAssistant {
    pub fn new(state: Arc<AppState>) -> Self {
        Self { state }
    }

    pub async fn ask(&self, query: &str, lang: &str, speak: bool) -> LegalAnswer {
        info!("legal assistant analyzing '{}' (lang: {})", query, lang);

        // English-indexed registries need an English query.
        let mut english_query = query.to_string();
        if lang != "en" {
            if let Some(llm) = &self.state.llm {
                english_query = llm.translate(query, "English").await;
                info!("translated query: '{}'", english_query);
            }
        }

        // Topic tokens appended plainly — registry operators choke on
        // nested boolean clauses.
        let active = self.state.topics.active_keywords();
        if !active.is_empty() {
            let q_lower = english_query.to_lowercase();
            if !active.iter().any(|t| q_lower.contains(&t.to_lowercase())) {
                english_query = format!("{} {}", english_query, active.join(" "));
                info!("strict topic applied to legal query: {}", english_query);
            }
        }

        let (acts, procedures, news) = tokio::join!(
            self.search_acts(&english_query),
            self.search_procedures(&english_query),
            self.search_news(&english_query),
        );

        let (answer, error) = self.synthesize(query, lang, &acts, &procedures, &news).await;

        LegalAnswer {
            answer,
            acts,
            procedures,
            news,
            error,
            voice: speak.then(|| voice_for(lang).to_string()),
        }
    }

    /// Statute registries via site operators, regioned with global retry.
    async fn search_acts(&self, query: &str) -> Vec<Hit> {
        let exclusions = "-site:google.com -site:youtube.com -site:facebook.com";
        let queries = [
            format!("\"{}\" Indian Act Section site:indiankanoon.org", query),
            format!(
                "\"{}\" act text site:indiacode.nic.in OR site:legislative.gov.in",
                query
            ),
            format!("\"{}\" legal provision India {}", query, exclusions),
        ];

        let mut results: Vec<Hit> = Vec::new();

        // The canonical text always belongs in constitutional answers.
        if query.to_lowercase().contains("constitution") {
            results.push(Hit {
                title: "The Constitution of India (Official PDF)".into(),
                url: "https://indiacode.nic.in/bitstream/123456789/19151/1/constitution_of_india.pdf".into(),
                snippet: "Full text of the Constitution of India including all amendments up to date. Source: India Code.".into(),
                source_type: SourceType::LegalAct,
                ..Default::default()
            });
        }

        let tasks = queries.iter().map(|q| self.regioned_search(q.clone(), 2));
        for batch in futures::future::join_all(tasks).await {
            results.extend(batch.into_iter().map(|mut h| {
                h.source_type = SourceType::LegalAct;
                h
            }));
        }

        dedupe_by_url(results, ACTS_TOP)
    }

    async fn search_procedures(&self, query: &str) -> Vec<Hit> {
        let queries = [
            format!("{} procedure step by step India official guide", query),
            format!("{} required documents checklist India legal compliance", query),
        ];

        let tasks = queries.iter().map(|q| self.regioned_search(q.clone(), 2));
        let mut results: Vec<Hit> = Vec::new();
        for batch in futures::future::join_all(tasks).await {
            results.extend(batch.into_iter().map(|mut h| {
                h.source_type = SourceType::LegalProcedure;
                h
            }));
        }

        dedupe_by_url(results, PROCEDURES_TOP)
    }

    /// Compound rights query through the news adapter, filtered down to
    /// genuinely legal coverage.
    async fn search_news(&self, query: &str) -> Vec<Hit> {
        let news_query = format!("{} (court OR law OR rights OR persecution) India news", query);

        let mut raw = duckduckgo::search_news(
            &self.state.http_client,
            &news_query,
            Region::IndiaEn,
            10,
        )
        .await
        .unwrap_or_default();
        if raw.len() < 2 {
            warn!("low regional news results, retrying globally: {}", news_query);
            raw = duckduckgo::search_news(&self.state.http_client, &news_query, Region::Global, 10)
                .await
                .unwrap_or_default();
        }

        raw.retain(|h| {
            let text = format!("{} {}", h.title, h.snippet).to_lowercase();
            LEGAL_VOCABULARY.iter().any(|k| text.contains(k))
        });

        raw.into_iter()
            .take(NEWS_TOP)
            .map(|mut h| {
                h.source_type = SourceType::LegalNews;
                h
            })
            .collect()
    }

    /// Region `in-en` first; the same query retried globally when empty.
    async fn regioned_search(&self, query: String, limit: usize) -> Vec<Hit> {
        let client = &self.state.http_client;
        match duckduckgo::search(client, &query, Region::IndiaEn, None, limit, true).await {
            Ok(hits) if !hits.is_empty() => hits,
            Ok(_) => duckduckgo::search(client, &query, Region::Global, None, limit, true)
                .await
                .unwrap_or_default(),
            Err(e) => {
                warn!("legal search failed ({}): {}", query, e);
                Vec::new()
            }
        }
    }

    async fn synthesize(
        &self,
        query: &str,
        lang: &str,
        acts: &[Hit],
        procedures: &[Hit],
        news: &[Hit],
    ) -> (String, Option<String>) {
        let Some(llm) = &self.state.llm else {
            return (
                APOLOGY.to_string(),
                Some("llm unavailable: no API key configured".to_string()),
            );
        };

        let mut context = String::from("--- RELEVANT ACTS & STATUTES ---\n");
        for (i, item) in acts.iter().enumerate() {
            context.push_str(&format!(
                "Source {}: {} ({})\nSnippet: {}\n\n",
                i + 1,
                item.title,
                item.url,
                item.snippet.chars().take(300).collect::<String>()
            ));
        }
        context.push_str("--- PROCEDURAL GUIDES & FORMS ---\n");
        for (i, item) in procedures.iter().enumerate() {
            context.push_str(&format!(
                "Source {}: {} ({})\nSnippet: {}\n\n",
                i + 1,
                item.title,
                item.url,
                item.snippet.chars().take(300).collect::<String>()
            ));
        }

        let mut system_prompt = build_system_prompt(lang, &self.state.topics.active_keywords());
        if acts.is_empty() && procedures.is_empty() && news.is_empty() {
            warn!("legal search yielded 0 results. SEARCH FAILED. ANSWER FROM GENERAL KNOWLEDGE.");
            system_prompt.push_str(
                "\n\n**CRITICAL: SEARCH FAILED. IGNORE MISSING CONTEXT. ANSWER FROM GENERAL KNOWLEDGE.**",
            );
        }

        let user = format!("User Query: {}\n\nContext Found:\n{}", query, context);
        match llm.chat(Some(&system_prompt), &user, 0.2).await {
            Ok(answer) => (answer, None),
            Err(e) => {
                warn!("legal synthesis failed: {}", e);
                (APOLOGY.to_string(), Some(e.to_string()))
            }
        }
    }
}

fn dedupe_by_url(hits: Vec<Hit>, top: usize) -> Vec<Hit> {
    let mut seen: HashSet<String> = HashSet::new();
    let mut out = Vec::new();
    for hit in hits {
        if seen.insert(normalize_url(&hit.url)) {
            out.push(hit);
        }
        if out.len() >= top {
            break;
        }
    }
    out
}

/// Seven labeled sections are the contract; everything else is the model's
/// business.
fn build_system_prompt(lang: &str, active_topics: &[String]) -> String {
    let lang_name = match lang {
        "ta" => "Tamil",
        "hi" => "Hindi",
        "ml" => "Malayalam",
        "te" => "Telugu",
        _ => "English",
    };
    let lang_instruction = if lang != "en" {
        format!(
            "\nCRITICAL: respond ENTIRELY in {} script, including all section headers.",
            lang_name
        )
    } else {
        String::new()
    };
    let topic_context = if active_topics.is_empty() {
        String::new()
    } else {
        format!(
            "\nAdmin-controlled topics: {}. Keep the legal interpretation strictly within these areas.",
            active_topics.join(", ")
        )
    };

    format!(
        "You are an expert Indian legal assistant specializing in constitutional law, \
religious freedom, and minority rights (Articles 25-30).\n\
Structure EVERY response as Markdown with exactly these seven labeled sections:\n\
**1. RELEVANT CONSTITUTIONAL ARTICLES** — quote applicable article text and explain its bearing.\n\
**2. STEP-BY-STEP PROCEDURE** — numbered steps in sequence.\n\
**3. REQUIRED DOCUMENTS** — complete list with format requirements.\n\
**4. AUTHORITIES INVOLVED** — departments and the order to approach them.\n\
**5. TIMELINES** — expected processing time per step.\n\
**6. REAL-WORLD CONSIDERATIONS** — common obstacles and practical alternatives.\n\
**7. LEGAL DISCLAIMER** — end with: \"This is general legal information. For specific cases, consult a qualified lawyer.\"\n\
Cite specific articles; stay within Indian jurisdiction; never refuse for lack of context.{}{}",
        lang_instruction, topic_context
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn voice_map_is_static() {
        assert_eq!(voice_for("en"), "alloy");
        assert_eq!(voice_for("hi"), "nova");
        assert_eq!(voice_for("ta"), "echo");
        assert_eq!(voice_for("de"), "alloy");
    }

    #[test]
    fn dedupe_by_url_caps_and_dedupes() {
        let hits = vec![
            Hit { url: "https://a.in/x".into(), title: "one".into(), ..Default::default() },
            Hit { url: "https://a.in/x/".into(), title: "dup".into(), ..Default::default() },
            Hit { url: "https://b.in/y".into(), title: "two".into(), ..Default::default() },
            Hit { url: "https://c.in/z".into(), title: "three".into(), ..Default::default() },
        ];
        let out = dedupe_by_url(hits, 2);
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].title, "one");
        assert_eq!(out[1].title, "two");
    }

    #[test]
    fn system_prompt_carries_seven_sections() {
        let prompt = build_system_prompt("en", &[]);
        for n in 1..=7 {
            assert!(prompt.contains(&format!("**{}.", n)), "missing section {}", n);
        }
        let tamil = build_system_prompt("ta", &["Christianity".to_string()]);
        assert!(tamil.contains("Tamil"));
        assert!(tamil.contains("Christianity"));
    }
}
