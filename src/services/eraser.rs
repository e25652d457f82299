//! Retention: submissions older than the configured window are erased once
//! a day, at local midnight.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Local, Timelike, Utc};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{error, info};

use crate::store::HomeworkStore;

/// Spawn the eraser task: wake at every local midnight and erase anything
/// uploaded more than `retention_days` ago. The cutoff is an absolute
/// timestamp, so a missed cycle is caught up by the next one.
pub fn spawn(
    store: Arc<HomeworkStore>,
    retention_days: i64,
    mut shutdown: watch::Receiver<bool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            let sleep_secs = seconds_until_midnight(&Local::now());
            tokio::select! {
                _ = tokio::time::sleep(Duration::from_secs(sleep_secs)) => {}
                _ = shutdown.changed() => {
                    info!("eraser stopping");
                    return;
                }
            }
            let cutoff = Utc::now() - chrono::Duration::days(retention_days);
            erase_expired(&store, cutoff).await;
        }
    })
}

fn seconds_until_midnight(now: &DateTime<Local>) -> u64 {
    u64::from(86_400 - (now.hour() * 3600 + now.minute() * 60 + now.second()))
}

/// One erasure sweep. Per-user failures are logged and never stop the rest
/// of the sweep.
async fn erase_expired(store: &HomeworkStore, cutoff: DateTime<Utc>) {
    for user in store.all_users().await {
        match store.erase_older_than(&user.user_id, cutoff).await {
            Ok(0) => {}
            Ok(erased) => info!(user = %user.user_id, erased, "expired homework erased"),
            Err(e) => error!(user = %user.user_id, "failed to erase expired homework: {e}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn midnight_is_always_in_the_future() {
        let evening = Local.with_ymd_and_hms(2025, 3, 3, 23, 59, 30).unwrap();
        assert_eq!(seconds_until_midnight(&evening), 30);

        let midnight = Local.with_ymd_and_hms(2025, 3, 3, 0, 0, 0).unwrap();
        assert_eq!(seconds_until_midnight(&midnight), 86_400);
    }

    #[tokio::test]
    async fn sweep_erases_expired_submissions_for_every_user() {
        let store = HomeworkStore::in_memory();
        for (id, handle) in [("1", "alice"), ("2", "bob")] {
            store.ensure_user(id, handle).await.unwrap();
            store.ensure_schedule(id).await.unwrap();
            store
                .record_submission(id, "Monday", "Русский", vec![1])
                .await
                .unwrap();
        }

        erase_expired(&store, Utc::now() + chrono::Duration::seconds(1)).await;

        for id in ["1", "2"] {
            let monday = store.schedule_for_day(id, "Monday").await.unwrap();
            assert!(monday.subjects.iter().all(|s| s.submissions.is_empty()));
        }
    }
}
