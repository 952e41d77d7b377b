use std::collections::BTreeMap;

use indexmap::IndexMap;

use crate::models::{
    deal::{BucketCounts, DealRecord, DealsByUser, DealsSummary, OutcomeBucket, StageAggregate},
    user::{UserDirectory, UserId},
};

// Lost is checked before won so "неуспешно" / "unsuccessful" stay lost.
const LOST_TERMS: &[&str] = &[
    "проигр", "неуспеш", "не успеш", "отказ", "конкурент", "lost", "reject", "competitor", "unsuccess", "fail",
];
const WON_TERMS: &[&str] = &["выигр", "успеш", "заключ", "оплач", "заверш", "won", "success", "complet"];
const POSTPONED_TERMS: &[&str] = &[
    "отлож", "перенес", "нет ответа", "не отвеча", "пауза", "postpon", "defer", "no answer", "no response", "on hold",
];
const IN_PROGRESS_TERMS: &[&str] = &["работ", "предлож", "переговор", "согласов", "in progress", "proposal", "negotiat", "quote"];
const NEW_TERMS: &[&str] = &["нов", "первичн", "лид", "входящ", "new", "initial", "lead"];

const RULES: [(OutcomeBucket, &[&str]); 5] = [
    (OutcomeBucket::Lost, LOST_TERMS),
    (OutcomeBucket::Won, WON_TERMS),
    (OutcomeBucket::Postponed, POSTPONED_TERMS),
    (OutcomeBucket::InProgress, IN_PROGRESS_TERMS),
    (OutcomeBucket::New, NEW_TERMS),
];

/// Maps a stage name to its outcome bucket. Names matching nothing are
/// treated as in progress.
pub fn classify_stage_name(stage_name: &str) -> OutcomeBucket {
    let name = stage_name.to_lowercase();
    RULES
        .iter()
        .find(|(_, terms)| terms.iter().any(|t| name.contains(t)))
        .map(|(bucket, _)| *bucket)
        .unwrap_or(OutcomeBucket::InProgress)
}

/// One display name and bucket per `stage_id`.
///
/// Deals of the same stage can carry different names (a real name on one,
/// the id fallback on another). The stage takes the first name that differs
/// from its id, or the id when no deal names it, and every deal of the stage
/// is classified by that name.
#[derive(Debug, Default)]
pub struct StageCatalog<'a> {
    names: IndexMap<&'a str, &'a str>,
}

impl<'a> StageCatalog<'a> {
    /// Stages in first-appearance order.
    pub fn from_deals(deals: &'a [DealRecord]) -> Self {
        let mut names: IndexMap<&str, &str> = IndexMap::new();
        for deal in deals {
            let id = deal.stage_id.as_str();
            let name = deal.stage_name.as_str();
            let named = !name.trim().is_empty() && name != id;
            let current = names.entry(id).or_insert(id);
            if *current == id && named {
                *current = name;
            }
        }
        Self { names }
    }

    pub fn name(&self, stage_id: &str) -> Option<&'a str> {
        self.names.get(stage_id).copied()
    }

    pub fn bucket(&self, stage_id: &str) -> Option<OutcomeBucket> {
        self.name(stage_id).map(classify_stage_name)
    }
}

/// Bucket of `deal`'s stage. Deals outside the catalog fall back to their
/// own stage name.
pub fn classify_deal(deal: &DealRecord, catalog: &StageCatalog<'_>) -> OutcomeBucket {
    catalog
        .bucket(&deal.stage_id)
        .unwrap_or_else(|| classify_stage_name(&deal.stage_name))
}

struct StageAcc {
    count: u64,
    value: f64,
}

fn percent(part: f64, whole: f64) -> f64 {
    if whole > 0.0 { part / whole * 100.0 } else { 0.0 }
}

/// Groups deals by stage, in the order stages first appear.
///
/// Names and buckets come from the [`StageCatalog`], never from upstream
/// stage metadata.
pub fn aggregate(deals: &[DealRecord]) -> DealsSummary {
    let catalog = StageCatalog::from_deals(deals);
    let mut stages: IndexMap<&str, StageAcc> = IndexMap::new();
    for deal in deals {
        let acc = stages
            .entry(deal.stage_id.as_str())
            .or_insert(StageAcc { count: 0, value: 0.0 });
        acc.count += 1;
        acc.value += deal.opportunity_value;
    }

    let total_deals = deals.len() as u64;
    let total_value: f64 = stages.values().map(|s| s.value).sum();
    let mut buckets = BucketCounts::default();

    let stages = stages
        .into_iter()
        .map(|(stage_id, acc)| {
            let name = catalog.name(stage_id).unwrap_or(stage_id);
            let bucket = classify_stage_name(name);
            buckets.add(bucket, acc.count);
            StageAggregate {
                stage_id: stage_id.to_string(),
                stage_name: name.to_string(),
                count: acc.count,
                total_value: acc.value,
                percent_of_deals: percent(acc.count as f64, total_deals as f64),
                percent_of_value: percent(acc.value, total_value),
                outcome_bucket: bucket,
                display_color: bucket.color(),
            }
        })
        .collect();

    DealsSummary {
        stages,
        total_deals,
        total_value,
        buckets,
    }
}

/// Per-user bucket breakdown, ordered by user id. Unassigned deals are left out.
pub fn deals_by_user(deals: &[DealRecord], directory: &UserDirectory) -> Vec<DealsByUser> {
    let catalog = StageCatalog::from_deals(deals);
    let mut by_user: BTreeMap<&UserId, (BucketCounts, f64)> = BTreeMap::new();
    for deal in deals {
        let Some(user_id) = deal.assigned_user_id.as_ref() else {
            continue;
        };
        let (counts, value) = by_user.entry(user_id).or_default();
        counts.add(classify_deal(deal, &catalog), 1);
        *value += deal.opportunity_value;
    }

    by_user
        .into_iter()
        .map(|(user_id, (buckets, total_value))| DealsByUser {
            user_id: user_id.clone(),
            user_name: directory.display_name(user_id),
            total: buckets.total(),
            total_value,
            buckets,
        })
        .collect()
}
