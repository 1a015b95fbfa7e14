use anyhow::Result;
use drishti::feeds::{news::NewsFeed, video::VideoFeed};
use drishti::{AppState, Config};
use tokio::sync::watch;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Boots the two feed workers and blocks until ctrl-c. The HTTP façade is
/// a separate deployment that consumes this crate as a library.
#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("drishti=info")),
        )
        .init();

    let config = Config::from_env();
    let state = AppState::new(config).await?;
    info!("state initialized: {:?}", state);

    let (stop_tx, stop_rx) = watch::channel(false);

    let news = NewsFeed::new(state.news_store.clone(), state.topics.clone());
    let video = VideoFeed::new(state.video_store.clone(), state.topics.clone());

    let news_task = tokio::spawn(news.run(stop_rx.clone()));
    let video_task = tokio::spawn(video.run(stop_rx));

    info!("feed workers running; ctrl-c to stop");
    tokio::signal::ctrl_c().await?;
    info!("shutdown signal received, stopping workers at the next cycle boundary");

    let _ = stop_tx.send(true);
    let _ = tokio::join!(news_task, video_task);

    Ok(())
}
