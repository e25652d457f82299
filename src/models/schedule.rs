use chrono::{DateTime, Datelike, Duration, Local, Utc, Weekday};
use serde::{Deserialize, Serialize};

/// One filed homework photo.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Submission {
    /// Deterministic id: `{user_id}-{day}-{subject}-{unix_seconds}`.
    pub id: String,
    pub photo: Vec<u8>,
    pub uploaded_at: DateTime<Utc>,
    pub uploaded_by: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Subject {
    pub name: String,
    #[serde(default)]
    pub submissions: Vec<Submission>,
}

/// One weekday of the schedule. Subject order is display order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DaySchedule {
    pub day: String,
    pub subjects: Vec<Subject>,
}

/// Days with no lessons: they carry no template entry and the nightly
/// summary skips them.
pub const REST_DAYS: [&str; 2] = ["Sunday", "Tuesday"];

pub fn is_rest_day(day: &str) -> bool {
    REST_DAYS.contains(&day)
}

/// English weekday name, used as the day key throughout the store.
pub fn weekday_name(weekday: Weekday) -> &'static str {
    match weekday {
        Weekday::Mon => "Monday",
        Weekday::Tue => "Tuesday",
        Weekday::Wed => "Wednesday",
        Weekday::Thu => "Thursday",
        Weekday::Fri => "Friday",
        Weekday::Sat => "Saturday",
        Weekday::Sun => "Sunday",
    }
}

/// Submissions and status views always target the next calendar day.
pub fn next_day_name() -> &'static str {
    weekday_name((Local::now() + Duration::days(1)).weekday())
}

/// The fixed weekly template every user starts with.
pub fn weekly_template() -> Vec<DaySchedule> {
    fn day(name: &str, subjects: &[&str]) -> DaySchedule {
        DaySchedule {
            day: name.to_string(),
            subjects: subjects
                .iter()
                .map(|s| Subject {
                    name: s.to_string(),
                    submissions: Vec::new(),
                })
                .collect(),
        }
    }

    vec![
        day(
            "Monday",
            &["Русский", "История", "Геометрия", "Английский", "ИЗО", "Литература"],
        ),
        day(
            "Wednesday",
            &["Физика", "Информатика", "Физкультура", "Алгебра", "Английский", "Общество"],
        ),
        day(
            "Thursday",
            &[
                "География",
                "Алгебра",
                "Биология",
                "Вероятность и статистика",
                "История",
                "Русский",
                "Литература",
                "Россия мои горизонты",
            ],
        ),
        day(
            "Friday",
            &["Труд", "Физкультура", "Алгебра", "Геометрия", "Английский"],
        ),
        day(
            "Saturday",
            &["Физика", "Алгебра", "Русский", "Английский", "Русский", "География", "Музыка"],
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn template_has_no_rest_days() {
        let template = weekly_template();
        assert_eq!(template.len(), 5);
        for day in &template {
            assert!(!is_rest_day(&day.day), "{} is a rest day", day.day);
            assert!(!day.subjects.is_empty());
        }
    }

    #[test]
    fn template_starts_empty() {
        for day in weekly_template() {
            for subject in day.subjects {
                assert!(subject.submissions.is_empty());
            }
        }
    }

    #[test]
    fn weekday_names_are_full_english() {
        assert_eq!(weekday_name(Weekday::Mon), "Monday");
        assert_eq!(weekday_name(Weekday::Sun), "Sunday");
    }
}
