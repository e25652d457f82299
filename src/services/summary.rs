//! Nightly guardian summaries: at a fixed local hour, every guardian gets a
//! status report for every watched student, photos included.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Local, Timelike};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::models::schedule::{is_rest_day, next_day_name, Submission};
use crate::services::status::{status_for, DayStatus};
use crate::store::HomeworkStore;
use crate::telegram::client::Client;

/// Spawn the summary task: wake daily at `hour`:00 local and report on the
/// next school day. Stops when `shutdown` fires.
pub fn spawn(
    store: Arc<HomeworkStore>,
    client: Client,
    hour: u32,
    mut shutdown: watch::Receiver<bool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            let sleep_secs = seconds_until(&Local::now(), hour);
            tokio::select! {
                _ = tokio::time::sleep(Duration::from_secs(sleep_secs)) => {}
                _ = shutdown.changed() => {
                    info!("summary scheduler stopping");
                    return;
                }
            }
            send_daily_summaries(&store, &client).await;
        }
    })
}

/// Seconds until the next local occurrence of `hour`:00.
fn seconds_until(now: &DateTime<Local>, hour: u32) -> u64 {
    let secs_today = now.hour() * 3600 + now.minute() * 60 + now.second();
    let target = hour * 3600;
    if secs_today < target {
        u64::from(target - secs_today)
    } else {
        u64::from(86_400 - secs_today + target)
    }
}

/// One summary sweep over every guardian. Per-student failures are logged
/// and never stop the rest of the sweep.
async fn send_daily_summaries(store: &HomeworkStore, client: &Client) {
    let next_day = next_day_name();
    if is_rest_day(next_day) {
        info!(day = next_day, "rest day tomorrow, skipping summaries");
        return;
    }

    for guardian in store.all_users().await {
        if !guardian.is_guardian {
            continue;
        }
        let Ok(chat_id) = guardian.user_id.parse::<i64>() else {
            warn!(user = %guardian.user_id, "guardian id is not a chat id");
            continue;
        };
        for student in &guardian.contacts {
            if let Err(e) = send_student_summary(store, client, chat_id, student, next_day).await {
                error!(
                    guardian = %guardian.user_id,
                    student = %student,
                    "summary failed: {e:#}"
                );
            }
        }
    }
}

async fn send_student_summary(
    store: &HomeworkStore,
    client: &Client,
    chat_id: i64,
    student: &str,
    day: &str,
) -> anyhow::Result<()> {
    let status = status_for(store, student, day).await?;
    client.send_message(chat_id, &format_status(student, &status)).await?;

    for (subject, submissions) in &status.submissions {
        client
            .send_message(chat_id, &format!("\n📚 Сегодняшняя домашка по {subject}:"))
            .await?;
        for submission in submissions {
            // One photo failing must not abort its siblings.
            if let Err(e) = client
                .send_photo(chat_id, submission.photo.clone(), &photo_caption(subject, submission))
                .await
            {
                error!(student = %student, id = %submission.id, "failed to send homework photo: {e}");
            }
        }
    }
    Ok(())
}

/// Text summary shared by the nightly dispatch and `/checkhw`.
pub fn format_status(student: &str, status: &DayStatus) -> String {
    let mut text = format!("Статус домашнего задания для {student}:\n\n");
    if !status.completed.is_empty() {
        text.push_str("✅ Начата домашка:\n");
        for subject in &status.completed {
            text.push_str(&format!("- {subject}\n"));
        }
    }
    if !status.incomplete.is_empty() {
        text.push_str("\n❌ Не начата домашка:\n");
        for subject in &status.incomplete {
            text.push_str(&format!("- {subject}\n"));
        }
    }
    text
}

pub fn photo_caption(subject: &str, submission: &Submission) -> String {
    format!(
        "Предмет: {subject}\nЗагружено в: {}",
        submission
            .uploaded_at
            .with_timezone(&Local)
            .format("%H:%M %d.%m.%Y")
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn fire_time_is_the_next_occurrence_of_the_hour() {
        let before = Local.with_ymd_and_hms(2025, 3, 3, 20, 0, 0).unwrap();
        assert_eq!(seconds_until(&before, 21), 3600);

        let after = Local.with_ymd_and_hms(2025, 3, 3, 22, 15, 30).unwrap();
        assert_eq!(seconds_until(&after, 21), 86_400 - 80_130 + 75_600);

        let exactly = Local.with_ymd_and_hms(2025, 3, 3, 21, 0, 0).unwrap();
        assert_eq!(seconds_until(&exactly, 21), 86_400);
    }

    #[test]
    fn summary_lists_started_and_missing_subjects() {
        let status = DayStatus {
            completed: vec!["Физика".into()],
            incomplete: vec!["Алгебра".into(), "Русский".into()],
            submissions: Default::default(),
        };
        let text = format_status("@alice", &status);
        assert!(text.contains("@alice"));
        assert!(text.contains("✅"));
        assert!(text.contains("- Физика\n"));
        assert!(text.contains("❌"));
        assert!(text.contains("- Алгебра\n"));
        assert!(text.contains("- Русский\n"));
    }
}
