//! Per-day homework status: which subjects have something submitted and
//! which are still empty.

use std::collections::HashMap;

use crate::models::schedule::Submission;
use crate::models::user::User;
use crate::store::{HomeworkStore, StoreError};

#[derive(Debug, Default)]
pub struct DayStatus {
    /// Subjects with at least one submission, in schedule order.
    pub completed: Vec<String>,
    /// Subjects with none, in schedule order.
    pub incomplete: Vec<String>,
    /// Submissions of the completed subjects, grouped by subject name.
    pub submissions: HashMap<String, Vec<Submission>>,
}

/// Partition the subjects of `day` by whether anything was submitted. Only
/// the first matching day entry is considered; an unknown day yields empty
/// collections ("nothing to show"), not an error.
pub fn day_status(user: &User, day: &str) -> DayStatus {
    let mut status = DayStatus::default();
    let Some(entry) = user.schedule.iter().find(|d| d.day == day) else {
        return status;
    };
    for subject in &entry.subjects {
        if subject.submissions.is_empty() {
            status.incomplete.push(subject.name.clone());
        } else {
            status.completed.push(subject.name.clone());
            status
                .submissions
                .insert(subject.name.clone(), subject.submissions.clone());
        }
    }
    status
}

/// Resolve a student by handle and compute their status for `day`. An
/// unknown student is an error; an unknown day is not.
pub async fn status_for(
    store: &HomeworkStore,
    student_handle: &str,
    day: &str,
) -> Result<DayStatus, StoreError> {
    let student = store.find_by_handle(student_handle).await?;
    Ok(day_status(&student, day))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::schedule::{DaySchedule, Subject};
    use chrono::Utc;

    fn student(subjects: &[(&str, usize)]) -> User {
        let subjects = subjects
            .iter()
            .map(|(name, count)| Subject {
                name: name.to_string(),
                submissions: (0..*count)
                    .map(|i| Submission {
                        id: format!("{name}-{i}"),
                        photo: vec![i as u8],
                        uploaded_at: Utc::now(),
                        uploaded_by: "1".into(),
                    })
                    .collect(),
            })
            .collect();
        User {
            user_id: "1".into(),
            username: "alice".into(),
            created_at: Utc::now(),
            schedule: vec![DaySchedule {
                day: "Monday".into(),
                subjects,
            }],
            contacts: Vec::new(),
            is_guardian: false,
        }
    }

    #[test]
    fn partitions_by_submission_presence() {
        let user = student(&[("Физика", 1), ("Алгебра", 0)]);
        let status = day_status(&user, "Monday");
        assert_eq!(status.completed, vec!["Физика".to_string()]);
        assert_eq!(status.incomplete, vec!["Алгебра".to_string()]);
        assert_eq!(status.submissions.len(), 1);
        assert_eq!(status.submissions["Физика"].len(), 1);
    }

    #[test]
    fn unknown_day_is_empty_not_an_error() {
        let user = student(&[("Физика", 1)]);
        let status = day_status(&user, "Friday");
        assert!(status.completed.is_empty());
        assert!(status.incomplete.is_empty());
        assert!(status.submissions.is_empty());
    }

    #[tokio::test]
    async fn unknown_student_is_an_error() {
        let store = HomeworkStore::in_memory();
        let err = status_for(&store, "@ghost", "Monday").await.unwrap_err();
        assert!(matches!(err, StoreError::StudentNotFound(_)));
    }
}
