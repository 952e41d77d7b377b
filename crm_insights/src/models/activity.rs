//! Activity records: the raw CRM shape and the canonical typed entity.

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};

use crate::models::{serde_lenient, user::UserId};

/// Named activity buckets, keyed by the CRM `TYPE_ID`.
///
/// The mapping is fixed: `1` meeting, `2` call, `4` task, `6` comment.
/// Every other code is [`ActivityKind::Other`] and only counts toward totals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityKind {
    Meeting,
    Call,
    Task,
    Comment,
    Other,
}

impl ActivityKind {
    pub fn from_code(code: &str) -> Self {
        match code.trim() {
            "1" => ActivityKind::Meeting,
            "2" => ActivityKind::Call,
            "4" => ActivityKind::Task,
            "6" => ActivityKind::Comment,
            _ => ActivityKind::Other,
        }
    }

    /// The CRM code for named kinds.
    pub fn code(&self) -> Option<&'static str> {
        match self {
            ActivityKind::Meeting => Some("1"),
            ActivityKind::Call => Some("2"),
            ActivityKind::Task => Some("4"),
            ActivityKind::Comment => Some("6"),
            ActivityKind::Other => None,
        }
    }

    /// Label used by the dashboard.
    pub fn display_name(&self) -> &'static str {
        match self {
            ActivityKind::Meeting => "Встреча",
            ActivityKind::Call => "Звонок",
            ActivityKind::Task => "Задача",
            ActivityKind::Comment => "Комментарий",
            ActivityKind::Other => "Другое",
        }
    }
}

/// An activity exactly as the CRM lists it (`crm.activity.list` field names).
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct RawActivity {
    #[serde(rename = "ID", deserialize_with = "serde_lenient::string_or_number")]
    pub id: String,
    #[serde(rename = "TYPE_ID", default, deserialize_with = "serde_lenient::opt_string_or_number")]
    pub type_id: Option<String>,
    #[serde(rename = "CREATED", default)]
    pub created: Option<String>,
    #[serde(rename = "AUTHOR_ID", alias = "RESPONSIBLE_ID", default)]
    pub author_id: Option<UserId>,
    #[serde(rename = "DESCRIPTION", default)]
    pub description: Option<String>,
    #[serde(rename = "SUBJECT", default)]
    pub subject: Option<String>,
}

/// A normalized activity. Immutable once built by the normalizer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActivityRecord {
    pub id: String,
    pub type_code: String,
    pub kind: ActivityKind,
    /// Creation time in the offset the CRM reported it in.
    pub created_at: DateTime<FixedOffset>,
    pub owner_user_id: UserId,
    /// Free text as received (description, or subject when the description is empty).
    pub raw_text: String,
    /// `raw_text` with markup removed, ready for display.
    pub description: String,
}

impl ActivityRecord {
    /// Calendar day in the record's own offset.
    pub fn local_date(&self) -> NaiveDate {
        self.created_at.date_naive()
    }

    pub fn local_time(&self) -> NaiveTime {
        self.created_at.time()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed_type_map() {
        assert_eq!(ActivityKind::from_code("1"), ActivityKind::Meeting);
        assert_eq!(ActivityKind::from_code("2"), ActivityKind::Call);
        assert_eq!(ActivityKind::from_code("4"), ActivityKind::Task);
        assert_eq!(ActivityKind::from_code(" 6 "), ActivityKind::Comment);
        assert_eq!(ActivityKind::from_code("3"), ActivityKind::Other);
        assert_eq!(ActivityKind::from_code(""), ActivityKind::Other);
        assert_eq!(ActivityKind::Call.code(), Some("2"));
    }

    #[test]
    fn raw_activity_accepts_numeric_ids() {
        let raw: RawActivity = serde_json::from_str(
            r#"{"ID": 101, "TYPE_ID": 2, "CREATED": "2024-01-01T10:00:00+03:00", "AUTHOR_ID": 8860, "DESCRIPTION": null}"#,
        )
        .unwrap();
        assert_eq!(raw.id, "101");
        assert_eq!(raw.type_id.as_deref(), Some("2"));
        assert_eq!(raw.author_id, Some(UserId::from("8860")));
        assert!(raw.description.is_none());
    }
}
