//! Analytics chart generation: live web context handed to the LLM, which
//! returns a chart descriptor the dashboard renders directly. The shape is
//! parsed leniently — downstream consumers must tolerate missing optional
//! fields — and the latest descriptor is persisted as a JSON snapshot.

use crate::core::AppState;
use crate::search::engines::{duckduckgo, Region};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{info, warn};

const CONTEXT_CHAR_CAP: usize = 15_000;

pub struct AnalyticsEngine {
    state: Arc<AppState>,
}

impl AnalyticsEngine {
    pub fn new(state: Arc<AppState>) -> Self {
        Self { state }
    }

    /// Produce a chart descriptor for a query. `direct_context` skips the
    /// web round (callers that already mined snippets pass them through).
    pub async fn analyze_and_graph(
        &self,
        query: &str,
        lang: &str,
        direct_context: Option<String>,
    ) -> Value {
        let context = match direct_context {
            Some(ctx) if !ctx.trim().is_empty() => ctx,
            _ => self.live_context(query).await,
        };

        if context.trim().is_empty() {
            return json!({
                "error": "No relevant statistics or trend data found for this query."
            });
        }

        let Some(llm) = &self.state.llm else {
            return json!({"error": "llm unavailable: no API key configured"});
        };

        let capped: String = context.chars().take(CONTEXT_CHAR_CAP).collect();
        let raw = match llm.chat(None, &graph_prompt(query, lang, &capped), 0.1).await {
            Ok(text) => text,
            Err(e) => return json!({"error": e.to_string()}),
        };

        let cleaned = raw.replace("```json", "").replace("```", "");
        let mut descriptor: Value = match serde_json::from_str(cleaned.trim()) {
            Ok(v) => v,
            Err(e) => {
                warn!("chart descriptor unparsable: {}", e);
                return json!({"error": format!("analytics generation failed: {}", e)});
            }
        };

        // Chart libraries want numeric y values; coerce or zero them.
        if let Some(points) = descriptor.get_mut("data").and_then(|d| d.as_array_mut()) {
            for p in points {
                let y = p
                    .get("y")
                    .and_then(|v| {
                        v.as_f64()
                            .or_else(|| v.as_str().and_then(|s| s.trim().parse().ok()))
                    })
                    .unwrap_or(0.0);
                p["y"] = json!(y);
            }
        }

        self.persist_snapshot(&descriptor);
        descriptor
    }

    async fn live_context(&self, query: &str) -> String {
        let hits =
            duckduckgo::search(&self.state.http_client, query, Region::Global, None, 15, true)
                .await
                .unwrap_or_default();
        hits.iter()
            .map(|h| format!("Source: {}\nContent: {}", h.url, h.snippet))
            .collect::<Vec<_>>()
            .join("\n\n")
    }

    fn persist_snapshot(&self, descriptor: &Value) {
        let path = &self.state.config.analytics_snapshot_path;
        if let Some(dir) = path.parent() {
            let _ = std::fs::create_dir_all(dir);
        }
        match serde_json::to_string_pretty(descriptor)
            .map_err(anyhow::Error::from)
            .and_then(|body| std::fs::write(path, body).map_err(Into::into))
        {
            Ok(()) => info!("analytics snapshot written to {}", path.display()),
            Err(e) => warn!("analytics snapshot not written: {}", e),
        }
    }
}

fn graph_prompt(query: &str, lang: &str, context: &str) -> String {
    let lang_instruction = match lang {
        "ta" => "IMPORTANT: Generate all text fields in Tamil.",
        "hi" => "IMPORTANT: Generate all text fields in Hindi.",
        _ => "",
    };
    format!(
        "You are a data analyst. User query: {}\nContext:\n{}\n\n\
Analyze the context and return a JSON object describing one chart. {}\n\
Prefer trends and timelines; use \"bar\" or \"line\" for trends, \"pie\" only \
for current-year composition. Schema:\n\
{{\"graph_type\": \"bar\"|\"line\"|\"pie\", \"title\": \"...\", \
\"xaxis_label\": \"...\", \"yaxis_label\": \"...\", \
\"data\": [{{\"x\": \"2024\", \"y\": 150.0}}], \"insight\": \"...\", \
\"suggestions\": [\"...\"], \"sentiment_score\": 0.0, \
\"key_entities\": [\"...\"], \"sources\": [\"...\"], \"summary\": \"...\"}}\n\
Make y values numeric. Return only the JSON object.",
        query, context, lang_instruction
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn graph_prompt_includes_language_directive() {
        assert!(graph_prompt("q", "ta", "ctx").contains("Tamil"));
        assert!(!graph_prompt("q", "en", "ctx").contains("IMPORTANT"));
    }
}
