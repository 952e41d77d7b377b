//! Chart series for the activity view: weekday and hour histograms, the
//! type distribution and a per-day series.

use std::collections::{BTreeMap, HashMap};

use chrono::{Datelike, NaiveDate, Timelike, Weekday};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::models::activity::{ActivityKind, ActivityRecord};

/// First and last hour of the working-hours chart (inclusive).
pub const WORKING_HOURS: (usize, usize) = (6, 19);

const WEEKDAY_NAMES: [&str; 7] = ["Monday", "Tuesday", "Wednesday", "Thursday", "Friday", "Saturday", "Sunday"];

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct KindCounts {
    pub calls: u64,
    pub comments: u64,
    pub tasks: u64,
    pub meetings: u64,
    pub other: u64,
}

impl KindCounts {
    pub fn add(&mut self, kind: ActivityKind) {
        match kind {
            ActivityKind::Call => self.calls += 1,
            ActivityKind::Comment => self.comments += 1,
            ActivityKind::Task => self.tasks += 1,
            ActivityKind::Meeting => self.meetings += 1,
            ActivityKind::Other => self.other += 1,
        }
    }

    pub fn total(&self) -> u64 {
        self.calls + self.comments + self.tasks + self.meetings + self.other
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DailyCount {
    pub date: NaiveDate,
    pub total: u64,
}

/// Histogram view of an activity set. Every record lands in exactly one
/// weekday bucket, one hour bucket and one kind bucket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ActivityStatistics {
    pub total: u64,
    /// Monday first.
    pub weekday: [u64; 7],
    pub hourly: [u64; 24],
    pub by_kind: KindCounts,
    /// Ascending by date; days without activity are absent.
    pub daily: Vec<DailyCount>,
}

impl Default for ActivityStatistics {
    fn default() -> Self {
        Self {
            total: 0,
            weekday: [0; 7],
            hourly: [0; 24],
            by_kind: KindCounts::default(),
            daily: Vec::new(),
        }
    }
}

impl ActivityStatistics {
    pub fn from_records<'a>(records: impl IntoIterator<Item = &'a ActivityRecord>) -> Self {
        let mut stats = Self::default();
        let mut daily: BTreeMap<NaiveDate, u64> = BTreeMap::new();

        for record in records {
            stats.total += 1;
            stats.weekday[record.created_at.weekday().num_days_from_monday() as usize] += 1;
            stats.hourly[record.created_at.hour() as usize] += 1;
            stats.by_kind.add(record.kind);
            *daily.entry(record.local_date()).or_default() += 1;
        }

        stats.daily = daily
            .into_iter()
            .map(|(date, total)| DailyCount { date, total })
            .collect();
        stats
    }

    /// Hourly buckets 06:00 through 19:00.
    pub fn working_hours(&self) -> &[u64] {
        &self.hourly[WORKING_HOURS.0..=WORKING_HOURS.1]
    }

    pub fn weekday_count(&self, day: Weekday) -> u64 {
        self.weekday[day.num_days_from_monday() as usize]
    }

    /// Reads the backend's precomputed chart statistics
    /// (`weekday_stats`, `hourly_stats`, `type_stats`, `total_activities`).
    ///
    /// The backend sends no per-day series, so `daily` stays empty.
    pub fn from_server(value: &Value) -> Option<Self> {
        let server: ServerStatistics = serde_json::from_value(value.clone()).ok()?;

        let mut stats = Self::default();
        for (i, name) in WEEKDAY_NAMES.iter().enumerate() {
            stats.weekday[i] = server.weekday_stats.get(*name).copied().unwrap_or(0);
        }
        for (hour, count) in &server.hourly_stats {
            if let Some(h) = hour.trim().parse::<usize>().ok().filter(|h| *h < 24) {
                stats.hourly[h] += count;
            }
        }
        let kind_total = |code: &str| server.type_stats.get(code).copied().unwrap_or(0);
        stats.by_kind = KindCounts {
            calls: kind_total("2"),
            comments: kind_total("6"),
            tasks: kind_total("4"),
            meetings: kind_total("1"),
            other: 0,
        };
        stats.total = server.total_activities.max(stats.by_kind.total());
        stats.by_kind.other = stats.total - stats.by_kind.total();
        Some(stats)
    }
}

#[derive(Deserialize)]
struct ServerStatistics {
    #[serde(default)]
    weekday_stats: HashMap<String, u64>,
    #[serde(default)]
    hourly_stats: HashMap<String, u64>,
    #[serde(default)]
    type_stats: HashMap<String, u64>,
    #[serde(default)]
    total_activities: u64,
}
