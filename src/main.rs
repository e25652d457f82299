use std::sync::Arc;

use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use homework_bot::bot::handlers::Handler;
use homework_bot::bot::updater;
use homework_bot::config::Config;
use homework_bot::services::submissions::{CaptionCache, CAPTION_TTL};
use homework_bot::services::{eraser, summary};
use homework_bot::store::HomeworkStore;
use homework_bot::telegram::client::Client;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env()?;

    let store = Arc::new(HomeworkStore::open(&config.store_path).await?);
    let client = Client::new(config.telegram_token.clone());

    let me = client.get_me().await?;
    info!(bot = me.username.as_deref().unwrap_or("?"), "authorized");

    let handler = Arc::new(Handler::new(
        client.clone(),
        Arc::clone(&store),
        CaptionCache::new(CAPTION_TTL),
    ));
    if let Err(e) = handler.register_commands().await {
        warn!("failed to register bot commands: {e}");
    }

    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
    let summary_task = summary::spawn(
        Arc::clone(&store),
        client.clone(),
        config.summary_hour,
        shutdown_rx.clone(),
    );
    let eraser_task = eraser::spawn(Arc::clone(&store), config.retention_days, shutdown_rx.clone());

    info!("bot is running");
    tokio::select! {
        _ = updater::run(client, handler, shutdown_rx) => {}
        result = tokio::signal::ctrl_c() => {
            if let Err(e) = result {
                error!("failed to listen for shutdown signal: {e}");
            }
            info!("shutting down");
        }
    }

    let _ = shutdown_tx.send(true);
    let _ = tokio::join!(summary_task, eraser_task);

    Ok(())
}
