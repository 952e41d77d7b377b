//! Deal records and the fixed outcome buckets their stages map to.

use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};

use crate::models::{serde_lenient, user::UserId};

/// Where a deal's stage sits, independent of upstream stage metadata.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeBucket {
    Won,
    Lost,
    Postponed,
    InProgress,
    New,
}

impl OutcomeBucket {
    pub const ALL: [OutcomeBucket; 5] = [
        OutcomeBucket::Won,
        OutcomeBucket::Lost,
        OutcomeBucket::Postponed,
        OutcomeBucket::InProgress,
        OutcomeBucket::New,
    ];

    /// Fixed dashboard palette. Upstream stage colours are never used.
    pub fn color(&self) -> &'static str {
        match self {
            OutcomeBucket::Won => "#28a745",
            OutcomeBucket::Lost => "#dc3545",
            OutcomeBucket::Postponed => "#6c757d",
            OutcomeBucket::InProgress => "#ffc107",
            OutcomeBucket::New => "#17a2b8",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            OutcomeBucket::Won => "won",
            OutcomeBucket::Lost => "lost",
            OutcomeBucket::Postponed => "postponed",
            OutcomeBucket::InProgress => "in_progress",
            OutcomeBucket::New => "new",
        }
    }
}

/// A deal exactly as `crm.deal.list` returns it.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct RawDeal {
    #[serde(rename = "ID", deserialize_with = "serde_lenient::string_or_number")]
    pub id: String,
    #[serde(rename = "TITLE", default)]
    pub title: Option<String>,
    #[serde(rename = "STAGE_ID", default, deserialize_with = "serde_lenient::opt_string_or_number")]
    pub stage_id: Option<String>,
    #[serde(rename = "STAGE_NAME", default)]
    pub stage_name: Option<String>,
    #[serde(rename = "OPPORTUNITY", default, deserialize_with = "serde_lenient::amount")]
    pub opportunity: f64,
    #[serde(rename = "ASSIGNED_BY_ID", default)]
    pub assigned_by_id: Option<UserId>,
    #[serde(rename = "DATE_CREATE", default)]
    pub date_create: Option<String>,
    #[serde(rename = "DATE_MODIFY", default)]
    pub date_modify: Option<String>,
}

/// A normalized deal.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DealRecord {
    pub id: String,
    pub title: String,
    pub stage_id: String,
    pub stage_name: String,
    /// Always finite and `>= 0`.
    pub opportunity_value: f64,
    pub assigned_user_id: Option<UserId>,
    pub created_at: Option<DateTime<FixedOffset>>,
    pub modified_at: Option<DateTime<FixedOffset>>,
}

/// One row of the per-stage breakdown.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StageAggregate {
    pub stage_id: String,
    pub stage_name: String,
    pub count: u64,
    pub total_value: f64,
    /// Share of all deals, 0–100.
    pub percent_of_deals: f64,
    /// Share of the total value, 0–100 (0 when the total value is 0).
    pub percent_of_value: f64,
    pub outcome_bucket: OutcomeBucket,
    pub display_color: &'static str,
}

/// Deal counts per outcome bucket.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BucketCounts {
    pub won: u64,
    pub lost: u64,
    pub postponed: u64,
    pub in_progress: u64,
    pub new: u64,
}

impl BucketCounts {
    pub fn add(&mut self, bucket: OutcomeBucket, n: u64) {
        match bucket {
            OutcomeBucket::Won => self.won += n,
            OutcomeBucket::Lost => self.lost += n,
            OutcomeBucket::Postponed => self.postponed += n,
            OutcomeBucket::InProgress => self.in_progress += n,
            OutcomeBucket::New => self.new += n,
        }
    }

    pub fn get(&self, bucket: OutcomeBucket) -> u64 {
        match bucket {
            OutcomeBucket::Won => self.won,
            OutcomeBucket::Lost => self.lost,
            OutcomeBucket::Postponed => self.postponed,
            OutcomeBucket::InProgress => self.in_progress,
            OutcomeBucket::New => self.new,
        }
    }

    pub fn total(&self) -> u64 {
        self.won + self.lost + self.postponed + self.in_progress + self.new
    }

    /// Deals that are neither won nor lost.
    pub fn open(&self) -> u64 {
        self.postponed + self.in_progress + self.new
    }
}

/// Result of aggregating a deal list.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DealsSummary {
    pub stages: Vec<StageAggregate>,
    pub total_deals: u64,
    pub total_value: f64,
    pub buckets: BucketCounts,
}

/// Per-user deal breakdown, the deals side of the comparison view.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DealsByUser {
    pub user_id: UserId,
    pub user_name: String,
    pub total: u64,
    pub total_value: f64,
    pub buckets: BucketCounts,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn palette_is_distinct() {
        let mut colors: Vec<_> = OutcomeBucket::ALL.iter().map(OutcomeBucket::color).collect();
        colors.sort();
        colors.dedup();
        assert_eq!(colors.len(), 5);
    }

    #[test]
    fn raw_deal_parses_string_amounts() {
        let raw: RawDeal = serde_json::from_str(
            r##"{"ID": "7", "TITLE": "Поставка", "STAGE_ID": "WON", "STAGE_NAME": "Выигран",
                "OPPORTUNITY": "1000.00", "ASSIGNED_BY_ID": "8860", "STAGE_COLOR": "#00ff00"}"##,
        )
        .unwrap();
        assert_eq!(raw.opportunity, 1000.0);
        assert_eq!(raw.stage_name.as_deref(), Some("Выигран"));
    }

    #[test]
    fn bucket_counts_open_excludes_closed() {
        let mut c = BucketCounts::default();
        c.add(OutcomeBucket::Won, 2);
        c.add(OutcomeBucket::Lost, 1);
        c.add(OutcomeBucket::New, 3);
        c.add(OutcomeBucket::Postponed, 1);
        assert_eq!(c.total(), 7);
        assert_eq!(c.open(), 4);
        assert_eq!(c.get(OutcomeBucket::New), 3);
    }
}
