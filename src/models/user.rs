use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::schedule::DaySchedule;

/// One user document. Students and guardians share the same shape; a
/// guardian is any user whose `is_guardian` flag was ever set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    /// Platform-assigned id, stable for the lifetime of the account.
    pub user_id: String,
    /// Display handle, reconciled to the latest observed value on every
    /// interaction.
    pub username: String,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub schedule: Vec<DaySchedule>,
    /// Watched student handles, `@`-prefixed, deduplicated.
    #[serde(default)]
    pub contacts: Vec<String>,
    #[serde(default)]
    pub is_guardian: bool,
}
