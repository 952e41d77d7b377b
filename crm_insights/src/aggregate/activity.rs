use std::collections::{BTreeMap, BTreeSet};

use chrono::NaiveDate;
use serde::Serialize;

use crate::models::{
    activity::{ActivityKind, ActivityRecord},
    filter::QueryFilter,
    rollup::UserActivityRollup,
    user::{UserDirectory, UserId},
};

/// Builds per-user rollups from normalized activities.
pub struct ActivityAggregator<'a> {
    directory: &'a UserDirectory,
}

#[derive(Default)]
struct Accumulator {
    calls: u64,
    comments: u64,
    tasks: u64,
    meetings: u64,
    total: u64,
    days: BTreeSet<NaiveDate>,
}

impl<'a> ActivityAggregator<'a> {
    pub fn new(directory: &'a UserDirectory) -> Self {
        Self { directory }
    }

    /// One rollup per user that owns at least one matching record, ordered by
    /// user id ascending.
    ///
    /// Records outside the filter's date bounds, user set or activity type
    /// are skipped. Unknown type codes count toward `total` only.
    pub fn aggregate(&self, records: &[ActivityRecord], filter: &QueryFilter) -> Vec<UserActivityRollup> {
        let mut by_user: BTreeMap<&UserId, Accumulator> = BTreeMap::new();

        let matching = records.iter().filter(|r| {
            filter.includes_user(&r.owner_user_id)
                && filter.includes_type(&r.type_code)
                && filter.includes_date(r.local_date())
        });

        for record in matching {
            let acc = by_user.entry(&record.owner_user_id).or_default();
            match record.kind {
                ActivityKind::Call => acc.calls += 1,
                ActivityKind::Comment => acc.comments += 1,
                ActivityKind::Task => acc.tasks += 1,
                ActivityKind::Meeting => acc.meetings += 1,
                ActivityKind::Other => {}
            }
            acc.total += 1;
            acc.days.insert(record.local_date());
        }

        by_user
            .into_iter()
            .map(|(user_id, acc)| UserActivityRollup {
                user_name: self.directory.display_name(user_id),
                user_id: user_id.clone(),
                calls: acc.calls,
                comments: acc.comments,
                tasks: acc.tasks,
                meetings: acc.meetings,
                total: acc.total,
                distinct_active_days: acc.days.len() as u64,
                last_activity_date: acc.days.last().copied(),
            })
            .collect()
    }
}

/// One calendar day of a user's activity feed.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DayGroup {
    pub date: NaiveDate,
    /// Latest first.
    pub records: Vec<ActivityRecord>,
}

/// Activities partitioned by local calendar day, most recent day first.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct DayGroups(Vec<DayGroup>);

impl DayGroups {
    pub fn iter(&self) -> std::slice::Iter<'_, DayGroup> {
        self.0.iter()
    }

    /// Number of days.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn record_count(&self) -> usize {
        self.0.iter().map(|g| g.records.len()).sum()
    }
}

impl IntoIterator for DayGroups {
    type Item = DayGroup;
    type IntoIter = std::vec::IntoIter<DayGroup>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

/// Groups records by local calendar day.
///
/// Days are enumerated most recent first; inside a day records run from the
/// latest time of day to the earliest, ties broken by id.
pub fn group_by_day(records: impl IntoIterator<Item = ActivityRecord>) -> DayGroups {
    let mut days: BTreeMap<NaiveDate, Vec<ActivityRecord>> = BTreeMap::new();
    for record in records {
        days.entry(record.local_date()).or_default().push(record);
    }

    let groups = days
        .into_iter()
        .rev()
        .map(|(date, mut records)| {
            records.sort_by(|a, b| {
                b.local_time()
                    .cmp(&a.local_time())
                    .then_with(|| a.id.cmp(&b.id))
            });
            DayGroup { date, records }
        })
        .collect();
    DayGroups(groups)
}
