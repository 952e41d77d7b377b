//! JSON documents printed by the binary.

use serde::Serialize;

use crate::{
    aggregate::{
        activity::DayGroups,
        deals::{aggregate, deals_by_user},
        statistics::ActivityStatistics,
    },
    models::{
        deal::{DealsByUser, DealsSummary},
        filter::QueryFilter,
        retrieval::{RetrievalResult, StatsPayload},
        rollup::UserActivityRollup,
        user::UserId,
    },
    projector::{ComparisonSeries, project},
    session::QueryContext,
};

#[derive(Debug, Serialize)]
pub struct RetrievalReport {
    pub status: &'static str,
    pub tier: Option<u8>,
    pub tier_name: Option<String>,
    pub completeness: Option<u8>,
    pub error: Option<String>,
    pub retry_allowed: bool,
}

impl From<&RetrievalResult> for RetrievalReport {
    fn from(result: &RetrievalResult) -> Self {
        Self {
            status: result.status.label(),
            tier: result.tier_used.map(|t| t.number()),
            tier_name: result.tier_used.map(|t| t.to_string()),
            completeness: result.completeness.map(|c| c.percent_complete),
            error: result.error().map(ToString::to_string),
            retry_allowed: result.retry_allowed(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ActivityReport {
    pub retrieval: RetrievalReport,
    pub rollups: Vec<UserActivityRollup>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub statistics: Option<ActivityStatistics>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comparison: Option<ComparisonSeries>,
}

/// Chart statistics: the server's precomputed set when present, otherwise
/// histograms over the filtered raw activities.
fn statistics(payload: &StatsPayload, ctx: &QueryContext, filter: &QueryFilter) -> ActivityStatistics {
    if let Some(stats) = payload.statistics.as_ref().and_then(ActivityStatistics::from_server) {
        return stats;
    }
    let records = payload.activity_records(ctx);
    ActivityStatistics::from_records(records.iter().filter(|r| {
        filter.includes_user(&r.owner_user_id)
            && filter.includes_type(&r.type_code)
            && filter.includes_date(r.local_date())
    }))
}

pub fn activity_report(
    result: &RetrievalResult,
    ctx: &QueryContext,
    filter: &QueryFilter,
    with_statistics: bool,
    compare: bool,
) -> ActivityReport {
    let payload = result.payload.as_ref();
    let rollups = payload.map(|p| p.rollups(ctx, filter)).unwrap_or_default();
    ActivityReport {
        retrieval: result.into(),
        statistics: payload
            .filter(|_| with_statistics)
            .map(|p| statistics(p, ctx, filter)),
        comparison: if compare { project(&rollups) } else { None },
        rollups,
    }
}

#[derive(Debug, Serialize)]
pub struct DealsReport {
    pub retrieval: RetrievalReport,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<DealsSummary>,
    pub by_user: Vec<DealsByUser>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comparison: Option<ComparisonSeries>,
}

pub fn deals_report(result: &RetrievalResult, ctx: &QueryContext, compare: bool) -> DealsReport {
    let records = result
        .payload
        .as_ref()
        .map(|p| p.deal_records(ctx))
        .unwrap_or_default();
    let by_user = deals_by_user(&records, &ctx.directory());
    DealsReport {
        retrieval: result.into(),
        summary: result.payload.as_ref().map(|_| aggregate(&records)),
        comparison: if compare { project(&by_user) } else { None },
        by_user,
    }
}

#[derive(Debug, Serialize)]
pub struct UserReport {
    pub user_id: UserId,
    pub user_name: String,
    pub total: usize,
    pub days: DayGroups,
}

pub fn user_report(user_id: UserId, ctx: &QueryContext, days: DayGroups) -> UserReport {
    UserReport {
        user_name: ctx.directory().display_name(&user_id),
        total: days.record_count(),
        user_id,
        days,
    }
}
