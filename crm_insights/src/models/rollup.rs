use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::models::{serde_lenient, user::UserId};

/// Per-user activity counts over a filtered record set.
///
/// The same shape is used for rollups precomputed by the cache tiers
/// (`user_stats` in the response envelope) and for rollups aggregated
/// locally, so a cached rollup can be passed through untouched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserActivityRollup {
    pub user_id: UserId,
    #[serde(default)]
    pub user_name: String,
    #[serde(default, deserialize_with = "serde_lenient::count")]
    pub calls: u64,
    #[serde(default, deserialize_with = "serde_lenient::count")]
    pub comments: u64,
    #[serde(default, deserialize_with = "serde_lenient::count")]
    pub tasks: u64,
    #[serde(default, deserialize_with = "serde_lenient::count")]
    pub meetings: u64,
    #[serde(default, deserialize_with = "serde_lenient::count")]
    pub total: u64,
    #[serde(default, alias = "days_count", deserialize_with = "serde_lenient::count")]
    pub distinct_active_days: u64,
    #[serde(default, deserialize_with = "serde_lenient::lenient_date")]
    pub last_activity_date: Option<NaiveDate>,
}

impl UserActivityRollup {
    pub fn empty(user_id: UserId, user_name: String) -> Self {
        Self {
            user_id,
            user_name,
            calls: 0,
            comments: 0,
            tasks: 0,
            meetings: 0,
            total: 0,
            distinct_active_days: 0,
            last_activity_date: None,
        }
    }

    /// Sum of the four named buckets.
    pub fn named_total(&self) -> u64 {
        self.calls + self.comments + self.tasks + self.meetings
    }

    /// Records whose type code is outside the fixed map.
    pub fn other(&self) -> u64 {
        self.total.saturating_sub(self.named_total())
    }

    /// `total` may never be below the named buckets.
    pub fn is_consistent(&self) -> bool {
        self.named_total() <= self.total
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_cached_rollup_with_legacy_keys() {
        let r: UserActivityRollup = serde_json::from_str(
            r#"{"user_id": 8860, "user_name": "Ольга Безина", "calls": 3, "comments": "1",
                "tasks": 0, "meetings": null, "total": 5, "days_count": 2,
                "last_activity_date": "2024-01-01 17:45", "activities": []}"#,
        )
        .unwrap();
        assert_eq!(r.user_id.as_str(), "8860");
        assert_eq!(r.named_total(), 4);
        assert_eq!(r.other(), 1);
        assert_eq!(r.distinct_active_days, 2);
        assert_eq!(r.last_activity_date, NaiveDate::from_ymd_opt(2024, 1, 1));
        assert!(r.is_consistent());
    }

    #[test]
    fn placeholder_last_activity_is_none() {
        let r: UserActivityRollup =
            serde_json::from_str(r#"{"user_id": "1", "last_activity_date": "Нет данных"}"#).unwrap();
        assert!(r.last_activity_date.is_none());
        assert_eq!(r.total, 0);
    }
}
