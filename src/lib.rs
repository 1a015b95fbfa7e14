pub mod analytics;
pub mod core;
pub mod enrich;
pub mod feeds;
pub mod forecast;
pub mod geo;
pub mod legal;
pub mod llm;
pub mod nlp;
pub mod priority;
pub mod safety;
pub mod search;
pub mod stealth;
pub mod store;
pub mod topics;
pub mod trends;

// --- Primary exports ---
pub use crate::core::types;
pub use crate::core::types::*;
pub use crate::core::{AppState, Config};
pub use crate::feeds::{news::NewsFeed, video::VideoFeed};
pub use crate::legal::LegalAssistant;
pub use crate::search::Orchestrator;
pub use crate::trends::TrendAnalyzer;
