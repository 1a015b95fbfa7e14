//! OpenAI-compatible chat client with an explicit two-arm model choice:
//! primary first, one downgrade to the fallback model, then a structured
//! error. Transport failures retry with jittered exponential backoff; a
//! dead endpoint never produces fabricated data.

use crate::core::config::Config;
use crate::core::error::CoreError;
use anyhow::{anyhow, Result};
use backoff::future::retry;
use backoff::ExponentialBackoffBuilder;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{info, warn};

pub struct LlmClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
    fallback_model: String,
}

impl LlmClient {
    /// `None` when no key is configured — callers degrade explicitly.
    pub fn from_config(config: &Config) -> Option<Self> {
        let api_key = config.llm_api_key.clone()?;
        Some(Self {
            client: reqwest::Client::builder()
                .timeout(Duration::from_secs(90))
                .build()
                .expect("reqwest client construction"),
            base_url: config.llm_base_url.trim_end_matches('/').to_string(),
            api_key,
            model: config.llm_model.clone(),
            fallback_model: config.llm_fallback_model.clone(),
        })
    }

    /// One chat completion. Primary model, then the fallback once; both
    /// failing surfaces `CoreError::LlmFailure`.
    pub async fn chat(
        &self,
        system: Option<&str>,
        user: &str,
        temperature: f32,
    ) -> Result<String, CoreError> {
        match self.chat_with_model(&self.model, system, user, temperature).await {
            Ok(text) => Ok(text),
            Err(primary_err) => {
                warn!(
                    "model '{}' failed ({}), downgrading to '{}'",
                    self.model, primary_err, self.fallback_model
                );
                self.chat_with_model(&self.fallback_model, system, user, temperature)
                    .await
                    .map_err(|fallback_err| {
                        CoreError::LlmFailure(format!(
                            "primary: {}; fallback: {}",
                            primary_err, fallback_err
                        ))
                    })
            }
        }
    }

    async fn chat_with_model(
        &self,
        model: &str,
        system: Option<&str>,
        user: &str,
        temperature: f32,
    ) -> Result<String> {
        let mut messages = Vec::new();
        if let Some(sys) = system {
            messages.push(json!({"role": "system", "content": sys}));
        }
        messages.push(json!({"role": "user", "content": user}));
        let body = json!({
            "model": model,
            "messages": messages,
            "temperature": temperature,
        });

        let url = format!("{}/chat/completions", self.base_url);
        let response: Value = retry(
            ExponentialBackoffBuilder::new()
                .with_initial_interval(Duration::from_millis(1_500))
                .with_max_interval(Duration::from_millis(7_500))
                .with_max_elapsed_time(Some(Duration::from_secs(25)))
                .build(),
            || async {
                let resp = self
                    .client
                    .post(&url)
                    .bearer_auth(&self.api_key)
                    .json(&body)
                    .send()
                    .await
                    .map_err(|e| backoff::Error::transient(anyhow!("{}", e)))?;

                let status = resp.status();
                if status == reqwest::StatusCode::TOO_MANY_REQUESTS
                    || status.is_server_error()
                {
                    return Err(backoff::Error::transient(anyhow!("http_{}", status)));
                }
                if !status.is_success() {
                    return Err(backoff::Error::permanent(anyhow!("http_{}", status)));
                }
                resp.json::<Value>()
                    .await
                    .map_err(|e| backoff::Error::permanent(anyhow!("{}", e)))
            },
        )
        .await?;

        response
            .pointer("/choices/0/message/content")
            .and_then(|v| v.as_str())
            .map(|s| s.to_string())
            .ok_or_else(|| anyhow!("response carried no message content"))
    }

    /// Translate free text; used to push non-English queries through
    /// English-indexed sources. Failure returns the original text.
    pub async fn translate(&self, text: &str, target: &str) -> String {
        let prompt = format!(
            "Translate the following text to {}. Return only the translation, no commentary.\n\n{}",
            target, text
        );
        match self.chat(None, &prompt, 0.0).await {
            Ok(translated) => translated.trim().to_string(),
            Err(e) => {
                warn!("translation failed, using original text: {}", e);
                text.to_string()
            }
        }
    }
}

/// Defensive parse of an LLM-produced JSON array.
///
/// Steps: strip code fences, cut to the outermost `[` … `]`, parse; on
/// failure close the array at the last complete `}` and re-parse once;
/// anything else yields an empty vec. Never invents entries.
pub fn repair_json_array(raw: &str) -> Vec<Value> {
    let mut text = raw.trim().to_string();
    text = text
        .replace("```json", "")
        .replace("```", "")
        .trim()
        .to_string();

    let Some(start) = text.find('[') else {
        return Vec::new();
    };
    let end = text.rfind(']').map(|i| i + 1).unwrap_or(text.len());
    let slice = &text[start..end.max(start)];

    if let Ok(Value::Array(items)) = serde_json::from_str::<Value>(slice) {
        return items;
    }

    // Truncated output: close at the last complete object and retry once.
    if let Some(last_obj) = slice.rfind('}') {
        let repaired = format!("{}]", &slice[..=last_obj]);
        if let Ok(Value::Array(items)) = serde_json::from_str::<Value>(&repaired) {
            info!("repaired truncated JSON array ({} items)", items.len());
            return items;
        }
    }

    Vec::new()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repair_handles_clean_arrays() {
        let items = repair_json_array(r#"[{"date":"2025-01","count":4}]"#);
        assert_eq!(items.len(), 1);
    }

    #[test]
    fn repair_strips_code_fences() {
        let raw = "```json\n[{\"date\":\"2025-01\",\"count\":4},{\"date\":\"2025-02\",\"count\":6}]\n```";
        assert_eq!(repair_json_array(raw).len(), 2);
    }

    #[test]
    fn repair_closes_truncated_arrays() {
        let raw = r#"[{"date":"2025-01","count":4},{"date":"2025-02","count":6},{"date":"2025-03","cou"#;
        let items = repair_json_array(raw);
        assert_eq!(items.len(), 2);
        assert_eq!(items[1]["count"], 6);
    }

    #[test]
    fn repair_returns_empty_on_garbage() {
        assert!(repair_json_array("no data here").is_empty());
        assert!(repair_json_array("").is_empty());
        assert!(repair_json_array("[{{{{").is_empty());
    }

    #[test]
    fn repair_ignores_surrounding_prose() {
        let raw = "Here is the data you asked for:\n[{\"date\":\"2024-05\",\"count\":1}]\nHope that helps!";
        assert_eq!(repair_json_array(raw).len(), 1);
    }
}
