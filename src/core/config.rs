use std::path::PathBuf;

fn env_str(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

/// Process configuration, resolved once at startup from environment
/// variables and passed down explicitly — no globals.
///
/// A missing LLM key degrades the trend miner and legal synthesis but never
/// search; a missing paid-search key falls back to the free provider.
#[derive(Debug, Clone)]
pub struct Config {
    /// Paid web-search provider API key (`SERP_API_KEY`). Optional.
    pub serp_api_key: Option<String>,

    /// LLM endpoint settings (`LLM_API_KEY`, `LLM_BASE_URL`, `LLM_MODEL`,
    /// `LLM_FALLBACK_MODEL`). Key optional; endpoint defaults to the
    /// OpenAI-compatible public API.
    pub llm_api_key: Option<String>,
    pub llm_base_url: String,
    pub llm_model: String,
    pub llm_fallback_model: String,

    /// SMTP relay used by the (external) mail collaborator. Carried here so
    /// the façade reads one config object.
    pub smtp_host: String,
    pub smtp_port: u16,
    pub smtp_user: Option<String>,
    pub smtp_password: Option<String>,

    /// Admin credentials and the token-signing secret, consumed by the
    /// external auth layer.
    pub admin_user: String,
    pub admin_password: Option<String>,
    pub super_admin_user: String,
    pub super_admin_password: Option<String>,
    pub token_secret: String,

    /// Data locations.
    pub news_db_path: PathBuf,
    pub video_db_path: PathBuf,
    pub topics_path: PathBuf,
    pub analytics_snapshot_path: PathBuf,

    /// Optional model2vec model id/path for the dense half of the ranker
    /// (`EMBED_MODEL`). Absent ⇒ keyword-only mode.
    pub embed_model: Option<String>,
}

impl Config {
    pub fn from_env() -> Self {
        let data_dir = env_str("DRISHTI_DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("data"));

        Self {
            serp_api_key: env_str("SERP_API_KEY"),
            llm_api_key: env_str("LLM_API_KEY").or_else(|| env_str("OPENAI_API_KEY")),
            llm_base_url: env_str("LLM_BASE_URL")
                .unwrap_or_else(|| "https://api.openai.com/v1".to_string()),
            llm_model: env_str("LLM_MODEL").unwrap_or_else(|| "gpt-4o-mini".to_string()),
            llm_fallback_model: env_str("LLM_FALLBACK_MODEL")
                .unwrap_or_else(|| "gpt-3.5-turbo".to_string()),
            smtp_host: env_str("SMTP_HOST").unwrap_or_else(|| "smtp.gmail.com".to_string()),
            smtp_port: env_str("SMTP_PORT")
                .and_then(|v| v.parse().ok())
                .unwrap_or(587),
            smtp_user: env_str("SMTP_USER"),
            smtp_password: env_str("SMTP_PASSWORD"),
            admin_user: env_str("ADMIN_USER").unwrap_or_else(|| "admin".to_string()),
            admin_password: env_str("ADMIN_PASSWORD"),
            super_admin_user: env_str("SUPER_ADMIN_USER")
                .unwrap_or_else(|| "superadmin".to_string()),
            super_admin_password: env_str("SUPER_ADMIN_PASSWORD"),
            token_secret: env_str("TOKEN_SECRET").unwrap_or_else(|| "change-me".to_string()),
            news_db_path: env_str("NEWS_DB_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|| data_dir.join("news.db")),
            video_db_path: env_str("VIDEO_DB_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|| data_dir.join("videos.db")),
            topics_path: env_str("TOPICS_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|| data_dir.join("active_topics.json")),
            analytics_snapshot_path: env_str("ANALYTICS_SNAPSHOT_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|| data_dir.join("analytics_snapshot.json")),
            embed_model: env_str("EMBED_MODEL"),
        }
    }
}
