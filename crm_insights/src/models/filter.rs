use std::collections::BTreeSet;

use chrono::{Days, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::{errors::RetrievalError, models::user::UserId};

/// What the dashboard asks for: a date range, an optional user subset and an
/// optional activity type.
///
/// Dates stay optional here because the form may be submitted half-filled;
/// [`QueryFilter::date_range`] is the validation point.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryFilter {
    /// First requested calendar day (inclusive).
    pub start_date: Option<NaiveDate>,

    /// Last requested calendar day (inclusive).
    pub end_date: Option<NaiveDate>,

    /// Users to include. Empty means every user.
    #[serde(default)]
    pub user_ids: BTreeSet<UserId>,

    /// CRM activity type code. `None` means every type.
    #[serde(default)]
    pub activity_type: Option<String>,
}

impl QueryFilter {
    pub fn new(start_date: NaiveDate, end_date: NaiveDate) -> Self {
        Self {
            start_date: Some(start_date),
            end_date: Some(end_date),
            ..Default::default()
        }
    }

    pub fn with_users<I, U>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = U>,
        U: Into<UserId>,
    {
        self.user_ids = ids
            .into_iter()
            .map(Into::into)
            .filter(|id: &UserId| !id.as_str().is_empty())
            .collect();
        self
    }

    /// `"all"` and blank codes are the same as no type restriction.
    pub fn with_activity_type(mut self, code: Option<&str>) -> Self {
        self.activity_type = code
            .map(str::trim)
            .filter(|c| !c.is_empty() && !c.eq_ignore_ascii_case("all"))
            .map(str::to_string);
        self
    }

    /// Validates the date bounds.
    pub fn date_range(&self) -> Result<DateRange, RetrievalError> {
        match (self.start_date, self.end_date) {
            (Some(start), Some(end)) => DateRange::new(start, end),
            (None, _) => Err(RetrievalError::Validation("start date is missing".into())),
            (_, None) => Err(RetrievalError::Validation("end date is missing".into())),
        }
    }

    pub fn includes_user(&self, id: &UserId) -> bool {
        self.user_ids.is_empty() || self.user_ids.contains(id)
    }

    /// Checks whichever bounds are set; an unset bound does not restrict.
    pub fn includes_date(&self, date: NaiveDate) -> bool {
        self.start_date.is_none_or(|start| start <= date) && self.end_date.is_none_or(|end| date <= end)
    }

    pub fn includes_type(&self, type_code: &str) -> bool {
        self.activity_type
            .as_deref()
            .is_none_or(|wanted| wanted == type_code)
    }
}

/// A validated, inclusive calendar range (`start <= end`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DateRange {
    start: NaiveDate,
    end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self, RetrievalError> {
        if start > end {
            return Err(RetrievalError::Validation(format!(
                "start date {start} is after end date {end}"
            )));
        }
        Ok(Self { start, end })
    }

    pub fn start(&self) -> NaiveDate {
        self.start
    }

    pub fn end(&self) -> NaiveDate {
        self.end
    }

    /// Number of calendar days covered, both ends included.
    pub fn period_days(&self) -> i64 {
        (self.end - self.start).num_days() + 1
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }

    /// Every day of the range in ascending order.
    pub fn days(&self) -> impl Iterator<Item = NaiveDate> + '_ {
        (0..self.period_days() as u64).filter_map(move |i| self.start.checked_add_days(Days::new(i)))
    }
}
