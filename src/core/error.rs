use thiserror::Error;

/// Error taxonomy for the discovery core.
///
/// Per-source failures never abort a request — they are collected as
/// [`SearchError`] entries alongside results. `CoreError` is reserved for
/// failures the caller must handle (bad input, blocked URLs, a dead LLM).
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("validation: {0}")]
    Validation(String),

    #[error("unsafe url rejected: {0}")]
    SafetyViolation(String),

    #[error("adapter '{intent}' failed: {message}")]
    AdapterFailure { intent: String, message: String },

    #[error("store contention: {0}")]
    StoreContention(String),

    #[error("llm failure: {0}")]
    LlmFailure(String),

    #[error("no numerical data found")]
    NoData,
}

/// A single isolated adapter failure, reported next to the results that the
/// healthy adapters still produced.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct SearchError {
    pub intent: String,
    pub message: String,
}

impl SearchError {
    pub fn new(intent: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            intent: intent.into(),
            message: message.into(),
        }
    }
}
