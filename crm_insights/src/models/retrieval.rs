//! Outcome types of the tiered retrieval.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{
    aggregate::activity::ActivityAggregator,
    errors::RetrievalError,
    models::{
        activity::{ActivityRecord, RawActivity},
        deal::{DealRecord, RawDeal},
        filter::QueryFilter,
        rollup::UserActivityRollup,
    },
    normalize::RecordNormalizer,
    session::QueryContext,
};

/// One retrieval strategy, tried in this fixed order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tier {
    InstantCache = 1,
    DegradedCache = 2,
    LiveFetch = 3,
    ProgressiveIngestion = 4,
}

impl Tier {
    pub fn number(&self) -> u8 {
        *self as u8
    }

    /// Only the two cache tiers report completeness.
    pub fn is_cache(&self) -> bool {
        matches!(self, Tier::InstantCache | Tier::DegradedCache)
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Tier::InstantCache => "instant cache",
            Tier::DegradedCache => "degraded cache",
            Tier::LiveFetch => "live fetch",
            Tier::ProgressiveIngestion => "progressive ingestion",
        };
        write!(f, "tier {} ({name})", self.number())
    }
}

/// Which dashboard view a retrieval feeds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatsKind {
    Activity,
    Deals,
}

#[derive(Debug, Clone, PartialEq)]
pub enum RetrievalStatus {
    Ok,
    /// A cache tier answered with `0 < completeness < 100`.
    PartialOk,
    Failed(RetrievalError),
}

impl RetrievalStatus {
    pub fn label(&self) -> &'static str {
        match self {
            RetrievalStatus::Ok => "ok",
            RetrievalStatus::PartialOk => "partial_ok",
            RetrievalStatus::Failed(_) => "failed",
        }
    }
}

/// Share of the requested days a cache tier had precomputed data for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CacheCompletenessReport {
    /// 0–100.
    pub percent_complete: u8,
    pub source_tier: Tier,
}

impl CacheCompletenessReport {
    pub fn is_complete(&self) -> bool {
        self.percent_complete >= 100
    }
}

/// The validated contents of a successful response envelope.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StatsPayload {
    /// Rollups precomputed by the backend, if it sent any.
    pub user_stats: Option<Vec<UserActivityRollup>>,
    pub activities: Vec<RawActivity>,
    pub deals: Vec<RawDeal>,
    /// Opaque chart statistics as computed server-side.
    pub statistics: Option<Value>,
    pub activities_count: Option<u64>,
    pub cache_used: bool,
}

impl StatsPayload {
    /// Per-user rollups for the table view.
    ///
    /// Precomputed rollups are returned unchanged; raw activities are only
    /// aggregated when the backend sent no rollups.
    pub fn rollups(&self, ctx: &QueryContext, filter: &QueryFilter) -> Vec<UserActivityRollup> {
        match &self.user_stats {
            Some(stats) if !stats.is_empty() || self.activities.is_empty() => stats.clone(),
            _ => {
                let records = self.activity_records(ctx);
                let directory = ctx.directory();
                ActivityAggregator::new(&directory).aggregate(&records, filter)
            }
        }
    }

    pub fn activity_records(&self, ctx: &QueryContext) -> Vec<ActivityRecord> {
        RecordNormalizer::new(ctx.timezone())
            .activities(&self.activities)
            .records
    }

    pub fn deal_records(&self, ctx: &QueryContext) -> Vec<DealRecord> {
        RecordNormalizer::new(ctx.timezone()).deals(&self.deals).records
    }
}

/// What [`fetch_statistics`](crate::orchestrator::TieredRetrievalOrchestrator::fetch_statistics)
/// hands back to the caller.
#[derive(Debug, Clone, PartialEq)]
pub struct RetrievalResult {
    pub status: RetrievalStatus,
    pub payload: Option<StatsPayload>,
    pub completeness: Option<CacheCompletenessReport>,
    pub tier_used: Option<Tier>,
    /// Request generation this result belongs to.
    pub generation: u64,
}

impl RetrievalResult {
    pub fn failed(error: RetrievalError, generation: u64) -> Self {
        Self {
            status: RetrievalStatus::Failed(error),
            payload: None,
            completeness: None,
            tier_used: None,
            generation,
        }
    }

    pub fn is_success(&self) -> bool {
        !matches!(self.status, RetrievalStatus::Failed(_))
    }

    pub fn error(&self) -> Option<&RetrievalError> {
        match &self.status {
            RetrievalStatus::Failed(err) => Some(err),
            _ => None,
        }
    }

    /// Whether the caller should offer a manual retry.
    pub fn retry_allowed(&self) -> bool {
        self.error().is_some_and(RetrievalError::retry_allowed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tier_display_and_number() {
        assert_eq!(Tier::InstantCache.to_string(), "tier 1 (instant cache)");
        assert_eq!(Tier::ProgressiveIngestion.to_string(), "tier 4 (progressive ingestion)");
        assert_eq!(Tier::LiveFetch.number(), 3);
        assert!(Tier::DegradedCache.is_cache());
        assert!(!Tier::LiveFetch.is_cache());
    }

    #[test]
    fn failed_result_exposes_retry() {
        let r = RetrievalResult::failed(RetrievalError::Http { status: 502 }, 3);
        assert!(!r.is_success());
        assert!(r.retry_allowed());
        assert_eq!(r.status.label(), "failed");

        let r = RetrievalResult::failed(RetrievalError::Auth { status: 401 }, 3);
        assert!(!r.retry_allowed());
    }
}
