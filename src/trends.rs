//! Trend miner: query-expanded web mining, LLM numeric extraction with a
//! defensive JSON repair, and the forecast handoff. When no numeric signal
//! exists the report says so explicitly — a trend is never invented.

use crate::core::types::{Hit, SourceType};
use crate::core::AppState;
use crate::forecast::{self, Forecast, ForecastStats, SeriesPoint};
use crate::llm::repair_json_array;
use crate::search::engines::{duckduckgo, Region};
use crate::search::normalize_url;
use chrono::Datelike;
use futures::future::join_all;
use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::{info, warn};

const MINING_POOL: usize = 5;
const CONTEXT_LINES: usize = 300;
const NO_DATA_ERROR: &str = "No numerical data found";

/// Statistical intents, each formatted per scanned year.
const STAT_INTENTS: [&str; 4] = [
    "{topic} statistics incidents report {year}",
    "{topic} annual report {year} numbers",
    "{topic} incident count data {year}",
    "{topic} survey figures {year}",
];

/// Registry sources mined additionally for India/faith-related topics.
const REGISTRY_INTENTS: [&str; 3] = [
    "United Christian Forum violence against christians {year} report",
    "Evangelical Fellowship of India persecution report {year}",
    "{topic} national statistics data",
];

#[derive(Debug, Serialize, Default)]
pub struct TrendReport {
    pub historical: Vec<SeriesPoint>,
    pub forecast: Vec<forecast::ForecastPoint>,
    pub stats: ForecastStats,
    pub context: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

pub struct TrendAnalyzer {
    state: Arc<AppState>,
}

impl TrendAnalyzer {
    pub fn new(state: Arc<AppState>) -> Self {
        Self { state }
    }

    pub async fn analyze_trend(&self, topic: &str, horizon_days: u32) -> TrendReport {
        info!("mining history for '{}'", topic);

        let results = self.mine(topic).await;
        let context = build_context(&results);

        let Some(llm) = &self.state.llm else {
            return TrendReport {
                context,
                error: Some("llm unavailable: no API key configured".to_string()),
                ..Default::default()
            };
        };

        let series = match llm
            .chat(None, &extraction_prompt(topic, &context), 0.1)
            .await
        {
            Ok(raw) => parse_series(&raw),
            Err(e) => {
                warn!("time-series extraction failed: {}", e);
                Vec::new()
            }
        };

        if series.is_empty() {
            warn!("no time-series data extracted, returning empty set");
            return TrendReport {
                context,
                error: Some(NO_DATA_ERROR.to_string()),
                ..Default::default()
            };
        }

        info!("forecasting {} data points over {} days", series.len(), horizon_days);
        let current_year = chrono::Utc::now().year();
        let Forecast {
            historical,
            forecast,
            stats,
        } = forecast::generate_forecast(&series, Some(topic), horizon_days, current_year);

        TrendReport {
            historical,
            forecast,
            stats,
            context,
            error: None,
        }
    }

    /// Parallel mining rounds: statistical intents across three years,
    /// registry extras for India/faith topics, and a news backstop when the
    /// haul is thin.
    async fn mine(&self, topic: &str) -> Vec<Hit> {
        let current_year = chrono::Utc::now().year();
        let years = [current_year, current_year - 1, current_year - 2];

        let mut queries: Vec<String> = Vec::new();
        for year in years {
            for intent in STAT_INTENTS {
                queries.push(
                    intent
                        .replace("{topic}", topic)
                        .replace("{year}", &year.to_string()),
                );
            }
        }

        let topic_lower = topic.to_lowercase();
        if topic_lower.contains("india")
            || topic_lower.contains("christian")
            || topic_lower.contains("church")
        {
            for intent in REGISTRY_INTENTS {
                queries.push(
                    intent
                        .replace("{topic}", topic)
                        .replace("{year}", &current_year.to_string()),
                );
            }
        }

        let sem = Arc::new(Semaphore::new(MINING_POOL));
        let tasks = queries.into_iter().map(|q| {
            let sem = Arc::clone(&sem);
            let client = self.state.http_client.clone();
            async move {
                let _permit = sem.acquire().await.expect("semaphore closed");
                duckduckgo::search(&client, &q, Region::Global, None, 10, true)
                    .await
                    .unwrap_or_default()
            }
        });

        let mut results: Vec<Hit> = join_all(tasks).await.into_iter().flatten().collect();

        if results.len() < 10 {
            let news_query = format!("{} news", topic);
            if let Ok(news) = duckduckgo::search_news(
                &self.state.http_client,
                &news_query,
                Region::Global,
                30,
            )
            .await
            {
                results.extend(news);
            }
        }

        // Dedupe by URL before context assembly.
        let mut seen: HashSet<String> = HashSet::new();
        results.retain(|h| seen.insert(normalize_url(&h.url)));
        results.iter_mut().for_each(|h| {
            if h.source_type != SourceType::News {
                h.source_type = SourceType::Web;
            }
        });
        results
    }
}

fn build_context(results: &[Hit]) -> String {
    results
        .iter()
        .take(CONTEXT_LINES)
        .map(|h| {
            format!(
                "[{}] {} | {}",
                h.published_at.as_deref().unwrap_or("Unknown Date"),
                h.title,
                h.snippet
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn extraction_prompt(topic: &str, context: &str) -> String {
    format!(
        "You are a data extraction engine. From the snippets below, extract every \
explicit numeric data point about \"{}\" as a JSON array of objects \
{{\"date\": \"YYYY-MM\", \"count\": N, \"summary\": \"...\"}}.\n\
Rules: counts must appear in the text (never estimate), dates may be year-only, \
return ONLY the JSON array with no prose and no code fences. Return [] if the \
snippets contain no numeric data.\n\nSNIPPETS:\n{}",
        topic, context
    )
}

/// Normalize the LLM's output into a clean yearly/monthly series: dates to
/// `YYYY-MM`, counts to integers, malformed entries dropped.
fn parse_series(raw: &str) -> Vec<SeriesPoint> {
    let mut series = Vec::new();
    for item in repair_json_array(raw) {
        let Some(date_raw) = item.get("date").and_then(|v| v.as_str()) else {
            continue;
        };
        let Some(date) = normalize_date(date_raw) else {
            continue;
        };
        let count = match item.get("count") {
            Some(v) if v.is_i64() || v.is_u64() => v.as_i64(),
            Some(v) if v.is_f64() => v.as_f64().map(|f| f as i64),
            Some(v) if v.is_string() => v.as_str().and_then(|s| s.trim().parse::<i64>().ok()),
            _ => None,
        };
        let Some(count) = count else { continue };
        series.push(SeriesPoint { date, count });
    }
    series
}

fn normalize_date(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    let year: i32 = trimmed.get(..4)?.parse().ok()?;
    if !(1900..=2100).contains(&year) {
        return None;
    }
    let month = trimmed
        .get(5..7)
        .and_then(|m| m.parse::<u32>().ok())
        .filter(|m| (1..=12).contains(m))
        .unwrap_or(1);
    Some(format!("{:04}-{:02}", year, month))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn date_normalization_handles_partial_dates() {
        assert_eq!(normalize_date("2024"), Some("2024-01".into()));
        assert_eq!(normalize_date("2024-07"), Some("2024-07".into()));
        assert_eq!(normalize_date("2024-07-15"), Some("2024-07".into()));
        assert_eq!(normalize_date("2024-13"), Some("2024-01".into()));
        assert_eq!(normalize_date("garbage"), None);
        assert_eq!(normalize_date("9999"), None);
    }

    #[test]
    fn series_parsing_is_defensive() {
        let raw = r#"```json
        [
          {"date": "2024-03", "count": 161, "summary": "quarterly report"},
          {"date": "2025", "count": "187", "summary": "annual total"},
          {"date": "bogus", "count": 5},
          {"date": "2025-06", "count": null},
          {"date": "2025-07", "count": 12.9}
        ]
        ```"#;
        let series = parse_series(raw);
        assert_eq!(series.len(), 3);
        assert_eq!(series[0], SeriesPoint { date: "2024-03".into(), count: 161 });
        assert_eq!(series[1], SeriesPoint { date: "2025-01".into(), count: 187 });
        assert_eq!(series[2], SeriesPoint { date: "2025-07".into(), count: 12 });
    }

    #[test]
    fn empty_extraction_yields_empty_series() {
        assert!(parse_series("[]").is_empty());
        assert!(parse_series("I could not find any data.").is_empty());
    }

    #[test]
    fn context_lines_carry_date_title_snippet() {
        let hits = vec![Hit {
            title: "Persecution report".into(),
            snippet: "161 incidents recorded".into(),
            published_at: Some("2025-01-02".into()),
            ..Default::default()
        }];
        let ctx = build_context(&hits);
        assert_eq!(ctx, "[2025-01-02] Persecution report | 161 incidents recorded");
    }
}
