use chrono::NaiveDate;

use crate::models::{
    filter::{DateRange, QueryFilter},
    user::UserId,
};

/// Query parameters shared by the statistics, deals and ingestion endpoints.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StatsQuery {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub user_ids: Vec<UserId>,
    /// `None` is every type; the parameter is then omitted.
    pub activity_type: Option<String>,
    pub force_refresh: bool,
    pub limit: Option<u32>,
}

impl StatsQuery {
    pub fn new(range: DateRange, filter: &QueryFilter) -> Self {
        Self {
            start_date: range.start(),
            end_date: range.end(),
            user_ids: filter.user_ids.iter().cloned().collect(),
            activity_type: filter.activity_type.clone(),
            force_refresh: false,
            limit: None,
        }
    }

    pub fn with_force_refresh(mut self) -> Self {
        self.force_refresh = true;
        self
    }

    pub fn with_limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Dates only, for endpoints scoped by path (the per-user drill-down).
    pub fn dates_only(range: DateRange) -> Self {
        Self {
            start_date: range.start(),
            end_date: range.end(),
            user_ids: Vec::new(),
            activity_type: None,
            force_refresh: false,
            limit: None,
        }
    }

    /// Serializes into URL query pairs. `user_ids` is comma-joined.
    pub fn to_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = vec![
            ("start_date", self.start_date.format("%Y-%m-%d").to_string()),
            ("end_date", self.end_date.format("%Y-%m-%d").to_string()),
        ];
        if !self.user_ids.is_empty() {
            let joined = self.user_ids.iter().map(UserId::as_str).collect::<Vec<_>>().join(",");
            pairs.push(("user_ids", joined));
        }
        if let Some(code) = &self.activity_type {
            pairs.push(("activity_type", code.clone()));
        }
        if self.force_refresh {
            pairs.push(("force_refresh", "true".to_string()));
        }
        if let Some(limit) = self.limit {
            pairs.push(("limit", limit.to_string()));
        }
        pairs
    }
}
