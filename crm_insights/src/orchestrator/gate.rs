//! Caller-facing hooks: the yes/no gate in front of expensive tiers and the
//! status notifications emitted on every tier transition.

use std::fmt;

use async_trait::async_trait;
use tokio::sync::mpsc::UnboundedSender;
use tracing::{info, warn};

use crate::models::retrieval::Tier;

/// A question the caller must answer before an expensive request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfirmationPrompt {
    LiveFetch { period_days: i64, budget_ms: u64 },
    ProgressiveLoad { period_days: i64 },
}

impl fmt::Display for ConfirmationPrompt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfirmationPrompt::LiveFetch { period_days, budget_ms } => write!(
                f,
                "No cached data for {period_days} day(s). Load directly from the CRM? This may take up to {} s.",
                budget_ms / 1000
            ),
            ConfirmationPrompt::ProgressiveLoad { period_days } => write!(
                f,
                "Direct loading did not finish. Start background loading of {period_days} days into the cache?"
            ),
        }
    }
}

#[async_trait]
pub trait ConfirmationGate: Send + Sync {
    /// `true` to proceed.
    async fn confirm(&self, prompt: &ConfirmationPrompt) -> bool;
}

/// Answers every prompt the same way.
#[derive(Debug, Clone, Copy)]
pub struct AutoConfirm(pub bool);

#[async_trait]
impl ConfirmationGate for AutoConfirm {
    async fn confirm(&self, _prompt: &ConfirmationPrompt) -> bool {
        self.0
    }
}

/// Progress notifications. Informational; failures also arrive as a
/// [`RetrievalResult`](crate::models::retrieval::RetrievalResult).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatusUpdate {
    TierStarted { tier: Tier, budget_ms: u64 },
    TierFellThrough { tier: Tier, reason: String },
    AwaitingConfirmation(ConfirmationPrompt),
    IngestionProgress { job_id: String, percent: Option<u8> },
    Finished { tier: Tier, completeness: Option<u8> },
    Failed { reason: String },
}

pub trait StatusSink: Send + Sync {
    fn notify(&self, update: StatusUpdate);
}

/// Writes status updates to the `tracing` log.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingStatus;

impl StatusSink for TracingStatus {
    fn notify(&self, update: StatusUpdate) {
        match update {
            StatusUpdate::TierStarted { tier, budget_ms } => info!(%tier, budget_ms, "Querying"),
            StatusUpdate::TierFellThrough { tier, reason } => warn!(%tier, %reason, "Falling back"),
            StatusUpdate::AwaitingConfirmation(prompt) => info!(%prompt, "Awaiting confirmation"),
            StatusUpdate::IngestionProgress { job_id, percent } => {
                info!(%job_id, percent = percent.unwrap_or(0), "Progressive load running")
            }
            StatusUpdate::Finished { tier, completeness } => match completeness {
                Some(c) => info!(%tier, completeness = c, "Data loaded"),
                None => info!(%tier, "Data loaded"),
            },
            StatusUpdate::Failed { reason } => warn!(%reason, "Retrieval failed"),
        }
    }
}

/// Forwards updates to a channel; a closed receiver is ignored.
impl StatusSink for UnboundedSender<StatusUpdate> {
    fn notify(&self, update: StatusUpdate) {
        let _ = self.send(update);
    }
}
