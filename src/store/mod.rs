//! Per-user weekly schedule store: one document per user, snapshotted to a
//! JSON file after every mutation so restarts keep the collected homework.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{info, warn};

use crate::models::schedule::{weekly_template, DaySchedule, Submission};
use crate::models::user::User;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("user {0} not found")]
    UserNotFound(String),
    #[error("student with username {0} not found")]
    StudentNotFound(String),
    #[error("day {0} not found in schedule")]
    DayNotFound(String),
    #[error("subject {subject} not found for day {day}")]
    SubjectNotFound { day: String, subject: String },
    #[error("homework {0} not found")]
    SubmissionNotFound(String),
    #[error("store i/o failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("store encoding failed: {0}")]
    Encoding(#[from] serde_json::Error),
}

impl StoreError {
    /// Absence of the referenced entity, as opposed to the store itself
    /// being unavailable. Callers word user-visible replies off this split.
    pub fn is_not_found(&self) -> bool {
        !matches!(self, StoreError::Io(_) | StoreError::Encoding(_))
    }
}

pub struct HomeworkStore {
    users: RwLock<HashMap<String, User>>,
    path: Option<PathBuf>,
}

impl HomeworkStore {
    /// Volatile store with no snapshot file. Used by tests.
    pub fn in_memory() -> Self {
        Self {
            users: RwLock::new(HashMap::new()),
            path: None,
        }
    }

    /// Open the store backed by a JSON snapshot at `path`, loading whatever
    /// a previous run left there.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();
        let users: HashMap<String, User> = match tokio::fs::read(&path).await {
            Ok(raw) => serde_json::from_slice::<Vec<User>>(&raw)?
                .into_iter()
                .map(|u| (u.user_id.clone(), u))
                .collect(),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => HashMap::new(),
            Err(e) => return Err(e.into()),
        };
        info!(path = %path.display(), users = users.len(), "homework store opened");
        Ok(Self {
            users: RwLock::new(users),
            path: Some(path),
        })
    }

    /// Write the whole collection out atomically (temp file + rename).
    /// Called with the write lock held, so snapshots are totally ordered.
    async fn persist(&self, users: &HashMap<String, User>) -> Result<(), StoreError> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        let mut docs: Vec<&User> = users.values().collect();
        docs.sort_by(|a, b| a.user_id.cmp(&b.user_id));
        let raw = serde_json::to_vec(&docs)?;
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, &raw).await?;
        tokio::fs::rename(&tmp, path).await?;
        Ok(())
    }

    /// Create the user record if absent; for an existing user only reconcile
    /// the stored handle. A failed handle reconcile is logged and swallowed
    /// (the record exists and the interaction must not be blocked); creation
    /// failures propagate.
    pub async fn ensure_user(&self, user_id: &str, username: &str) -> Result<(), StoreError> {
        let mut users = self.users.write().await;
        match users.get_mut(user_id) {
            Some(user) => {
                if user.username != username {
                    user.username = username.to_string();
                    if let Err(e) = self.persist(&users).await {
                        warn!(user = user_id, "failed to persist handle change: {e}");
                    }
                }
                Ok(())
            }
            None => {
                users.insert(
                    user_id.to_string(),
                    User {
                        user_id: user_id.to_string(),
                        username: username.to_string(),
                        created_at: Utc::now(),
                        schedule: Vec::new(),
                        contacts: Vec::new(),
                        is_guardian: false,
                    },
                );
                self.persist(&users).await
            }
        }
    }

    /// Install the fixed weekly template iff the user's schedule is empty.
    /// Repeat calls are a true no-op.
    pub async fn ensure_schedule(&self, user_id: &str) -> Result<(), StoreError> {
        let mut users = self.users.write().await;
        let user = users
            .get_mut(user_id)
            .ok_or_else(|| StoreError::UserNotFound(user_id.to_string()))?;
        if !user.schedule.is_empty() {
            return Ok(());
        }
        user.schedule = weekly_template();
        self.persist(&users).await
    }

    pub async fn get_user(&self, user_id: &str) -> Result<User, StoreError> {
        let users = self.users.read().await;
        users
            .get(user_id)
            .cloned()
            .ok_or_else(|| StoreError::UserNotFound(user_id.to_string()))
    }

    /// Look a user up by display handle, with or without the `@` marker.
    pub async fn find_by_handle(&self, handle: &str) -> Result<User, StoreError> {
        let bare = handle.trim_start_matches('@');
        let users = self.users.read().await;
        users
            .values()
            .find(|u| u.username == bare)
            .cloned()
            .ok_or_else(|| StoreError::StudentNotFound(handle.to_string()))
    }

    pub async fn schedule_for_day(&self, user_id: &str, day: &str) -> Result<DaySchedule, StoreError> {
        let user = self.get_user(user_id).await?;
        user.schedule
            .into_iter()
            .find(|d| d.day == day)
            .ok_or_else(|| StoreError::DayNotFound(day.to_string()))
    }

    /// Append a submission under the subject of `day` whose name matches
    /// `subject_query` (trimmed, case-folded equality). Returns the new
    /// submission's id.
    pub async fn record_submission(
        &self,
        user_id: &str,
        day: &str,
        subject_query: &str,
        photo: Vec<u8>,
    ) -> Result<String, StoreError> {
        let uploaded_at = Utc::now();
        let mut users = self.users.write().await;
        let user = users
            .get_mut(user_id)
            .ok_or_else(|| StoreError::UserNotFound(user_id.to_string()))?;
        let entry = user
            .schedule
            .iter_mut()
            .find(|d| d.day == day)
            .ok_or_else(|| StoreError::DayNotFound(day.to_string()))?;
        let subject = entry
            .subjects
            .iter_mut()
            .find(|s| subject_matches(&s.name, subject_query))
            .ok_or_else(|| StoreError::SubjectNotFound {
                day: day.to_string(),
                subject: subject_query.to_string(),
            })?;

        let id = format!(
            "{}-{}-{}-{}",
            user_id,
            day,
            subject.name,
            uploaded_at.timestamp()
        );
        subject.submissions.push(Submission {
            id: id.clone(),
            photo,
            uploaded_at,
            uploaded_by: user_id.to_string(),
        });
        self.persist(&users).await?;
        Ok(id)
    }

    /// Fetch one submission back by the id `record_submission` returned.
    pub async fn submission(
        &self,
        user_id: &str,
        day: &str,
        subject_query: &str,
        submission_id: &str,
    ) -> Result<Submission, StoreError> {
        let users = self.users.read().await;
        let user = users
            .get(user_id)
            .ok_or_else(|| StoreError::UserNotFound(user_id.to_string()))?;
        let entry = user
            .schedule
            .iter()
            .find(|d| d.day == day)
            .ok_or_else(|| StoreError::DayNotFound(day.to_string()))?;
        let subject = entry
            .subjects
            .iter()
            .find(|s| subject_matches(&s.name, subject_query))
            .ok_or_else(|| StoreError::SubjectNotFound {
                day: day.to_string(),
                subject: subject_query.to_string(),
            })?;
        subject
            .submissions
            .iter()
            .find(|s| s.id == submission_id)
            .cloned()
            .ok_or_else(|| StoreError::SubmissionNotFound(submission_id.to_string()))
    }

    /// Set-add a watched handle on the guardian's contact list and mark the
    /// guardian flag, in one document update. Callers normalize the handle
    /// first; the flag, once set, is never reset.
    pub async fn add_contact(&self, guardian_id: &str, handle: &str) -> Result<(), StoreError> {
        let mut users = self.users.write().await;
        let user = users
            .get_mut(guardian_id)
            .ok_or_else(|| StoreError::UserNotFound(guardian_id.to_string()))?;
        let mut changed = !user.is_guardian;
        user.is_guardian = true;
        if !user.contacts.iter().any(|c| c == handle) {
            user.contacts.push(handle.to_string());
            changed = true;
        }
        if changed {
            self.persist(&users).await?;
        }
        Ok(())
    }

    /// Clear every submission under the named day, leaving the subject
    /// entries intact. A user without that day in their schedule is logged,
    /// not an error.
    pub async fn erase_day(&self, user_id: &str, day: &str) -> Result<(), StoreError> {
        let mut users = self.users.write().await;
        let user = users
            .get_mut(user_id)
            .ok_or_else(|| StoreError::UserNotFound(user_id.to_string()))?;
        let Some(entry) = user.schedule.iter_mut().find(|d| d.day == day) else {
            warn!(user = user_id, day, "no schedule entry to erase");
            return Ok(());
        };
        let mut erased = 0;
        for subject in &mut entry.subjects {
            erased += subject.submissions.len();
            subject.submissions.clear();
        }
        if erased > 0 {
            self.persist(&users).await?;
        }
        Ok(())
    }

    /// Erase every submission uploaded strictly before `cutoff`, across all
    /// days. Returns how many were removed; repeat calls with the same
    /// cutoff remove nothing.
    pub async fn erase_older_than(
        &self,
        user_id: &str,
        cutoff: DateTime<Utc>,
    ) -> Result<usize, StoreError> {
        let mut users = self.users.write().await;
        let user = users
            .get_mut(user_id)
            .ok_or_else(|| StoreError::UserNotFound(user_id.to_string()))?;
        let mut erased = 0;
        for day in &mut user.schedule {
            for subject in &mut day.subjects {
                let before = subject.submissions.len();
                subject.submissions.retain(|s| s.uploaded_at >= cutoff);
                erased += before - subject.submissions.len();
            }
        }
        if erased > 0 {
            self.persist(&users).await?;
        }
        Ok(erased)
    }

    /// Snapshot of every user document. Background loops only; request
    /// paths address users by id or handle.
    pub async fn all_users(&self) -> Vec<User> {
        self.users.read().await.values().cloned().collect()
    }
}

fn subject_matches(name: &str, query: &str) -> bool {
    name.trim().to_lowercase() == query.trim().to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn store_with_user(user_id: &str, handle: &str) -> HomeworkStore {
        let store = HomeworkStore::in_memory();
        store.ensure_user(user_id, handle).await.unwrap();
        store.ensure_schedule(user_id).await.unwrap();
        store
    }

    #[tokio::test]
    async fn schedule_init_is_idempotent() {
        let store = HomeworkStore::in_memory();
        store.ensure_user("1", "alice").await.unwrap();
        store.ensure_schedule("1").await.unwrap();
        let first = store.get_user("1").await.unwrap().schedule;
        store.ensure_schedule("1").await.unwrap();
        let second = store.get_user("1").await.unwrap().schedule;
        assert!(!first.is_empty());
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn reinit_preserves_recorded_homework() {
        let store = store_with_user("1", "alice").await;
        store
            .record_submission("1", "Monday", "Русский", vec![1])
            .await
            .unwrap();
        store.ensure_schedule("1").await.unwrap();
        let day = store.schedule_for_day("1", "Monday").await.unwrap();
        assert_eq!(day.subjects[0].submissions.len(), 1);
    }

    #[tokio::test]
    async fn ensure_user_reconciles_handle() {
        let store = HomeworkStore::in_memory();
        store.ensure_user("1", "alice").await.unwrap();
        store.ensure_user("1", "alice_renamed").await.unwrap();
        let user = store.get_user("1").await.unwrap();
        assert_eq!(user.username, "alice_renamed");
    }

    #[tokio::test]
    async fn unknown_subject_or_day_is_rejected_without_side_effects() {
        let store = store_with_user("1", "alice").await;
        let before = store.get_user("1").await.unwrap();

        let err = store
            .record_submission("1", "Monday", "Химия", vec![1, 2])
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::SubjectNotFound { .. }));

        let err = store
            .record_submission("1", "Sunday", "Русский", vec![1, 2])
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::DayNotFound(_)));

        assert_eq!(store.get_user("1").await.unwrap(), before);
    }

    #[tokio::test]
    async fn subject_match_is_normalized_equality_not_substring() {
        let store = store_with_user("1", "alice").await;
        store
            .record_submission("1", "Monday", " русский ", vec![1])
            .await
            .unwrap();
        let err = store
            .record_submission("1", "Monday", "Рус", vec![1])
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::SubjectNotFound { .. }));
    }

    #[tokio::test]
    async fn submission_round_trips_by_id() {
        let store = store_with_user("1", "alice").await;
        let bytes = vec![0xFF, 0xD8, 0xFF, 0xE0];
        let id = store
            .record_submission("1", "Wednesday", "Физика", bytes.clone())
            .await
            .unwrap();
        let stored = store.submission("1", "Wednesday", "Физика", &id).await.unwrap();
        assert_eq!(stored.photo, bytes);
        assert_eq!(stored.uploaded_by, "1");
        assert_eq!(stored.id, id);
    }

    #[tokio::test]
    async fn erase_day_clears_submissions_but_keeps_subjects() {
        let store = store_with_user("1", "alice").await;
        store
            .record_submission("1", "Monday", "Русский", vec![1])
            .await
            .unwrap();
        store
            .record_submission("1", "Monday", "История", vec![2])
            .await
            .unwrap();
        store
            .record_submission("1", "Friday", "Труд", vec![3])
            .await
            .unwrap();

        let subjects_before = store.schedule_for_day("1", "Monday").await.unwrap().subjects.len();
        store.erase_day("1", "Monday").await.unwrap();

        let monday = store.schedule_for_day("1", "Monday").await.unwrap();
        assert_eq!(monday.subjects.len(), subjects_before);
        assert!(monday.subjects.iter().all(|s| s.submissions.is_empty()));

        let friday = store.schedule_for_day("1", "Friday").await.unwrap();
        assert_eq!(friday.subjects[0].submissions.len(), 1);

        // A day the user does not have is logged, not an error.
        store.erase_day("1", "Sunday").await.unwrap();
    }

    #[tokio::test]
    async fn erase_older_than_is_idempotent_and_keeps_the_boundary() {
        let store = store_with_user("1", "alice").await;
        let id = store
            .record_submission("1", "Monday", "Русский", vec![1])
            .await
            .unwrap();
        let uploaded_at = store
            .submission("1", "Monday", "Русский", &id)
            .await
            .unwrap()
            .uploaded_at;

        // A submission uploaded exactly at the cutoff is kept.
        assert_eq!(store.erase_older_than("1", uploaded_at).await.unwrap(), 0);
        let cutoff = uploaded_at + chrono::Duration::seconds(1);
        assert_eq!(store.erase_older_than("1", cutoff).await.unwrap(), 1);
        assert_eq!(store.erase_older_than("1", cutoff).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn contacts_are_a_set() {
        let store = store_with_user("9", "dad").await;
        store.add_contact("9", "@alice").await.unwrap();
        store.add_contact("9", "@alice").await.unwrap();
        let guardian = store.get_user("9").await.unwrap();
        assert_eq!(guardian.contacts, vec!["@alice".to_string()]);
        assert!(guardian.is_guardian);
    }

    #[tokio::test]
    async fn find_by_handle_ignores_the_marker() {
        let store = store_with_user("1", "alice").await;
        assert_eq!(store.find_by_handle("@alice").await.unwrap().user_id, "1");
        assert_eq!(store.find_by_handle("alice").await.unwrap().user_id, "1");
        let err = store.find_by_handle("@bob").await.unwrap_err();
        assert!(matches!(err, StoreError::StudentNotFound(_)));
    }

    #[tokio::test]
    async fn snapshot_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("homework.json");
        {
            let store = HomeworkStore::open(&path).await.unwrap();
            store.ensure_user("1", "alice").await.unwrap();
            store.ensure_schedule("1").await.unwrap();
            store
                .record_submission("1", "Friday", "Труд", vec![7])
                .await
                .unwrap();
        }
        let store = HomeworkStore::open(&path).await.unwrap();
        let friday = store.schedule_for_day("1", "Friday").await.unwrap();
        assert_eq!(friday.subjects[0].submissions.len(), 1);
        assert_eq!(store.get_user("1").await.unwrap().username, "alice");
    }
}
