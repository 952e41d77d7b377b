//! Side-by-side comparison series for two or more users.

use serde::Serialize;

use crate::models::{deal::DealsByUser, rollup::UserActivityRollup, user::UserId};

/// An entity the comparison chart can show.
pub trait ComparisonSource {
    fn entity_id(&self) -> &UserId;

    fn label(&self) -> &str;

    /// Ordering key, compared descending.
    fn primary(&self) -> f64;

    /// Names of the tracked metrics, in chart order.
    fn metric_names() -> &'static [&'static str];

    /// Values in the order of [`ComparisonSource::metric_names`].
    fn metric_values(&self) -> Vec<f64>;
}

impl ComparisonSource for UserActivityRollup {
    fn entity_id(&self) -> &UserId {
        &self.user_id
    }

    fn label(&self) -> &str {
        &self.user_name
    }

    fn primary(&self) -> f64 {
        self.total as f64
    }

    fn metric_names() -> &'static [&'static str] {
        &["calls", "comments", "tasks", "meetings"]
    }

    fn metric_values(&self) -> Vec<f64> {
        vec![self.calls as f64, self.comments as f64, self.tasks as f64, self.meetings as f64]
    }
}

impl ComparisonSource for DealsByUser {
    fn entity_id(&self) -> &UserId {
        &self.user_id
    }

    fn label(&self) -> &str {
        &self.user_name
    }

    fn primary(&self) -> f64 {
        self.total as f64
    }

    fn metric_names() -> &'static [&'static str] {
        &["total", "in_progress", "won", "lost", "postponed"]
    }

    fn metric_values(&self) -> Vec<f64> {
        let b = &self.buckets;
        vec![
            self.total as f64,
            b.in_progress as f64,
            b.won as f64,
            b.lost as f64,
            b.postponed as f64,
        ]
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricSeries {
    pub name: &'static str,
    /// One value per entity, aligned with [`ComparisonSeries::entity_ids`].
    pub values: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComparisonSeries {
    pub entity_ids: Vec<UserId>,
    pub labels: Vec<String>,
    pub series: Vec<MetricSeries>,
}

/// Builds parallel series, one per tracked metric.
///
/// Returns `None` below two entities. Entities are ordered by descending
/// primary metric, ties by id ascending.
pub fn project<T: ComparisonSource>(entities: &[T]) -> Option<ComparisonSeries> {
    if entities.len() < 2 {
        return None;
    }

    let mut ordered: Vec<&T> = entities.iter().collect();
    ordered.sort_by(|a, b| {
        b.primary()
            .total_cmp(&a.primary())
            .then_with(|| a.entity_id().cmp(b.entity_id()))
    });

    let rows: Vec<Vec<f64>> = ordered.iter().map(|e| e.metric_values()).collect();
    let series = T::metric_names()
        .iter()
        .enumerate()
        .map(|(i, &name)| MetricSeries {
            name,
            values: rows.iter().map(|row| row.get(i).copied().unwrap_or(0.0)).collect(),
        })
        .collect();

    Some(ComparisonSeries {
        entity_ids: ordered.iter().map(|e| e.entity_id().clone()).collect(),
        labels: ordered.iter().map(|e| e.label().to_string()).collect(),
        series,
    })
}
