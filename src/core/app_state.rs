use crate::core::config::Config;
use crate::core::types::Hit;
use crate::llm::LlmClient;
use crate::store::news::NewsStore;
use crate::store::video::VideoStore;
use crate::topics::TopicManager;
use anyhow::Result;
use model2vec_rs::model::StaticModel;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Everything a request needs, constructed once at startup and passed by
/// `Arc`. No process-wide globals.
pub struct AppState {
    pub config: Arc<Config>,
    /// Request-path HTTP client. Feed workers build their own sessions and
    /// never share this one.
    pub http_client: reqwest::Client,
    pub topics: Arc<TopicManager>,
    pub news_store: NewsStore,
    pub video_store: VideoStore,
    pub search_cache: moka::future::Cache<String, Vec<Hit>>,
    /// Optional dense embedder; absent ⇒ keyword-only ranking.
    pub embedder: Option<Arc<StaticModel>>,
    /// Optional LLM endpoint; absent ⇒ trend mining and legal synthesis
    /// degrade, search is unaffected.
    pub llm: Option<Arc<LlmClient>>,
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("embedder_enabled", &self.embedder.is_some())
            .field("llm_enabled", &self.llm.is_some())
            .finish()
    }
}

/// Fresh per-component HTTP session with sane defaults.
pub fn build_http_client() -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(30))
        .build()
        .expect("reqwest client construction")
}

impl AppState {
    pub async fn new(config: Config) -> Result<Arc<Self>> {
        let config = Arc::new(config);
        let topics = Arc::new(TopicManager::load(config.topics_path.clone()));
        let news_store = NewsStore::open(config.news_db_path.clone()).await?;
        let video_store = VideoStore::open(config.video_db_path.clone()).await?;

        let embedder = match &config.embed_model {
            Some(model_id) => {
                let model_id = model_id.clone();
                match tokio::task::spawn_blocking(move || {
                    crate::nlp::embed::load_embedder(&model_id)
                })
                .await
                {
                    Ok(Ok(model)) => Some(model),
                    Ok(Err(e)) => {
                        warn!("embedder unavailable, keyword-only mode: {}", e);
                        None
                    }
                    Err(e) => {
                        warn!("embedder load task failed: {}", e);
                        None
                    }
                }
            }
            None => None,
        };

        let llm = LlmClient::from_config(&config).map(Arc::new);
        if llm.is_none() {
            info!("no LLM key configured; trend mining and legal synthesis degraded");
        }

        Ok(Arc::new(Self {
            config,
            http_client: build_http_client(),
            topics,
            news_store,
            video_store,
            search_cache: moka::future::Cache::builder()
                .max_capacity(10_000)
                .time_to_live(Duration::from_secs(60 * 10))
                .build(),
            embedder,
            llm,
        }))
    }
}
