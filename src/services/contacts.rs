//! Guardian watch lists: a guardian may watch any student already known to
//! the bot.

use crate::store::{HomeworkStore, StoreError};

/// Canonical form of a student handle: always `@`-prefixed.
pub fn normalize_handle(handle: &str) -> String {
    let trimmed = handle.trim();
    if trimmed.starts_with('@') {
        trimmed.to_string()
    } else {
        format!("@{trimmed}")
    }
}

/// Register `student_handle` on the guardian's watch list and flag the
/// guardian. The student must already exist; watching an unknown handle is
/// refused before the guardian record is touched. Returns the canonical
/// handle for the confirmation reply.
pub async fn add_student(
    store: &HomeworkStore,
    guardian_id: &str,
    student_handle: &str,
) -> Result<String, StoreError> {
    let handle = normalize_handle(student_handle);
    store.find_by_handle(&handle).await?;
    store.add_contact(guardian_id, &handle).await?;
    Ok(handle)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn handles_are_at_prefixed() {
        assert_eq!(normalize_handle("alice"), "@alice");
        assert_eq!(normalize_handle("@alice"), "@alice");
        assert_eq!(normalize_handle("  alice "), "@alice");
    }

    #[tokio::test]
    async fn unknown_student_is_refused_and_guardian_stays_unflagged() {
        let store = HomeworkStore::in_memory();
        store.ensure_user("9", "dad").await.unwrap();

        let err = add_student(&store, "9", "alice").await.unwrap_err();
        assert!(matches!(err, StoreError::StudentNotFound(_)));

        let guardian = store.get_user("9").await.unwrap();
        assert!(!guardian.is_guardian);
        assert!(guardian.contacts.is_empty());
    }

    #[tokio::test]
    async fn watching_a_known_student_flags_the_guardian() {
        let store = HomeworkStore::in_memory();
        store.ensure_user("9", "dad").await.unwrap();
        store.ensure_user("1", "alice").await.unwrap();

        let handle = add_student(&store, "9", "alice").await.unwrap();
        assert_eq!(handle, "@alice");
        // Re-adding is a no-op.
        add_student(&store, "9", "@alice").await.unwrap();

        let guardian = store.get_user("9").await.unwrap();
        assert!(guardian.is_guardian);
        assert_eq!(guardian.contacts, vec!["@alice".to_string()]);
    }
}
