//! Long-poll dispatch loop: fetch updates and hand each message to its own
//! task, so one user's slow photo download never blocks another's events.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tracing::{error, info};

use super::handlers::Handler;
use crate::telegram::client::Client;

pub async fn run(client: Client, handler: Arc<Handler>, mut shutdown: watch::Receiver<bool>) {
    let mut offset = 0i64;
    loop {
        let updates = tokio::select! {
            result = client.get_updates(offset) => result,
            _ = shutdown.changed() => {
                info!("updater stopping");
                return;
            }
        };
        let updates = match updates {
            Ok(updates) => updates,
            Err(e) => {
                error!("failed to fetch updates: {e}");
                tokio::time::sleep(Duration::from_secs(3)).await;
                continue;
            }
        };

        for update in updates {
            offset = offset.max(update.update_id + 1);
            let Some(message) = update.message else {
                continue;
            };
            if let Some(from) = &message.from {
                info!(
                    from = from.username.as_deref().unwrap_or(""),
                    text = message.text.as_deref().unwrap_or(""),
                    "message received"
                );
            }
            let handler = Arc::clone(&handler);
            tokio::spawn(async move { handler.handle_message(message).await });
        }
    }
}
