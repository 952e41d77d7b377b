//! Tiered data retrieval.
//!
//! [`TieredRetrievalOrchestrator::fetch_statistics`] walks the tier chain:
//!
//! 1. instant cache (`/api/stats/super-fast`, short fixed budget)
//! 2. degraded cache (`/api/stats/fast`), only when tier 1 gave no answer
//! 3. live fetch (`/api/stats/main`, budget scaled to the period), behind a
//!    confirmation
//! 4. progressive ingestion for periods over 30 days, behind a second
//!    confirmation, followed by a fresh instant-cache read
//!
//! Tiers run one after another, never in parallel. Each request races its
//! budget through `tokio::time::timeout`; a late response is dropped with
//! the losing future. Transitions are decided by the pure
//! [`state::TierMachine`]; this module only performs the I/O and reports
//! progress to the [`StatusSink`].

pub mod budget;
pub mod gate;
pub mod state;

use std::{future::Future, sync::Arc, time::Duration};

use tracing::debug;

pub use budget::{live_fetch_budget, live_fetch_budget_ms};
pub use gate::{AutoConfirm, ConfirmationGate, ConfirmationPrompt, StatusSink, StatusUpdate, TracingStatus};
pub use state::{TierEvent, TierMachine, TierState};

use crate::{
    aggregate::activity::{DayGroups, group_by_day},
    backend::{BackendError, Endpoint, StatsBackend, StatsQuery, ValidatedEnvelope, validate_envelope},
    config::{ClientConfig, ProgressiveSettings, TierBudgets},
    errors::RetrievalError,
    models::{
        filter::QueryFilter,
        retrieval::{CacheCompletenessReport, RetrievalResult, RetrievalStatus, StatsKind, Tier},
        user::{UserDirectory, UserId},
    },
    normalize::RecordNormalizer,
    session::QueryContext,
};

/// Budgets and limits the orchestrator runs with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct OrchestratorSettings {
    pub tiers: TierBudgets,
    pub progressive: ProgressiveSettings,
    pub deals_limit: u32,
}

impl From<&ClientConfig> for OrchestratorSettings {
    fn from(config: &ClientConfig) -> Self {
        Self {
            tiers: config.tiers,
            progressive: config.progressive,
            deals_limit: config.deals.limit,
        }
    }
}

pub struct TieredRetrievalOrchestrator<B> {
    backend: B,
    settings: OrchestratorSettings,
    gate: Arc<dyn ConfirmationGate>,
    status: Arc<dyn StatusSink>,
}

async fn timed<T>(
    tier: Tier,
    budget_ms: u64,
    request: impl Future<Output = Result<T, BackendError>>,
) -> Result<T, RetrievalError> {
    match tokio::time::timeout(Duration::from_millis(budget_ms), request).await {
        Ok(result) => result.map_err(RetrievalError::from),
        Err(_) => Err(RetrievalError::Timeout { tier, budget_ms }),
    }
}

fn failure_event(err: RetrievalError) -> TierEvent {
    match err {
        RetrievalError::Timeout { budget_ms, .. } => TierEvent::TimedOut { budget_ms },
        other => TierEvent::Errored(other),
    }
}

impl<B: StatsBackend> TieredRetrievalOrchestrator<B> {
    /// Declines every confirmation and logs status through `tracing` until
    /// a gate and a sink are supplied.
    pub fn new(backend: B, settings: OrchestratorSettings) -> Self {
        Self {
            backend,
            settings,
            gate: Arc::new(AutoConfirm(false)),
            status: Arc::new(TracingStatus),
        }
    }

    pub fn with_gate(mut self, gate: Arc<dyn ConfirmationGate>) -> Self {
        self.gate = gate;
        self
    }

    pub fn with_status(mut self, status: Arc<dyn StatusSink>) -> Self {
        self.status = status;
        self
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn settings(&self) -> &OrchestratorSettings {
        &self.settings
    }

    /// Runs the tier chain for `filter`.
    ///
    /// Starts a new request generation in `ctx`, which supersedes any
    /// retrieval still in flight. Successful results are committed to the
    /// dashboard state of `ctx` as long as they are still current.
    pub async fn fetch_statistics(&self, ctx: &QueryContext, filter: &QueryFilter, kind: StatsKind) -> RetrievalResult {
        let generation = ctx.begin_request();
        let range = match filter.date_range() {
            Ok(range) => range,
            Err(err) => return self.fail(err, generation),
        };
        let period_days = range.period_days();
        let live_budget_ms = live_fetch_budget_ms(period_days);
        let query = StatsQuery::new(range, filter);
        debug!(generation, period_days, ?kind, "Starting retrieval");

        let mut machine = TierMachine::new(kind, period_days);
        let mut answer: Option<ValidatedEnvelope> = None;

        loop {
            let event = match machine.state().clone() {
                TierState::Done(tier) => {
                    let result = self.finish(tier, answer, generation);
                    ctx.commit(kind, filter, &result);
                    return result;
                }
                TierState::Failed(err) => return self.fail(err, generation),
                TierState::TryCache1 => {
                    let budget_ms = self.settings.tiers.instant_cache_ms;
                    self.query_cache(Tier::InstantCache, Endpoint::SuperFast, budget_ms, &query, &mut answer)
                        .await
                }
                TierState::TryCache2 => {
                    let budget_ms = self.settings.tiers.degraded_cache_ms;
                    self.query_cache(Tier::DegradedCache, Endpoint::Fast, budget_ms, &query, &mut answer)
                        .await
                }
                TierState::ConfirmLiveFetch => {
                    self.ask(ConfirmationPrompt::LiveFetch {
                        period_days,
                        budget_ms: live_budget_ms,
                    })
                    .await
                }
                TierState::LiveFetch => {
                    let (endpoint, query) = match kind {
                        StatsKind::Activity => (Endpoint::Main, query.clone().with_force_refresh()),
                        StatsKind::Deals => (Endpoint::DealsList, query.clone().with_limit(self.settings.deals_limit)),
                    };
                    match self.request(Tier::LiveFetch, &endpoint, live_budget_ms, &query).await {
                        Ok(validated) => {
                            answer = Some(validated);
                            TierEvent::Fetched
                        }
                        Err(err) => failure_event(err),
                    }
                }
                TierState::ConfirmProgressive => self.ask(ConfirmationPrompt::ProgressiveLoad { period_days }).await,
                TierState::ProgressiveLoad => self.progressive_load(ctx, generation, live_budget_ms, &query).await,
            };

            let event = if ctx.is_current(generation) {
                event
            } else {
                TierEvent::Errored(RetrievalError::Superseded)
            };
            if let (Some(tier), TierEvent::TimedOut { .. } | TierEvent::Errored(_)) = (machine.state().tier(), &event) {
                let reason = match &event {
                    TierEvent::TimedOut { budget_ms } => format!("no answer within {budget_ms} ms"),
                    TierEvent::Errored(err) => err.to_string(),
                    _ => String::new(),
                };
                self.status.notify(StatusUpdate::TierFellThrough { tier, reason });
            }
            machine.advance(event);
        }
    }

    /// Replaces the user directory of `ctx` with the CRM user list and
    /// returns how many names it holds. The directory is left untouched on
    /// failure.
    pub async fn load_directory(&self, ctx: &QueryContext) -> Result<usize, RetrievalError> {
        let budget_ms = self.settings.tiers.degraded_cache_ms;
        let users = timed(Tier::LiveFetch, budget_ms, self.backend.users()).await?;
        let directory = UserDirectory::from_users(users);
        let named = directory.len();
        ctx.set_directory(directory);
        debug!(named, "Loaded user directory");
        Ok(named)
    }

    /// Loads one user's activities for the drill-down panel, grouped by day.
    ///
    /// Does not start a new generation: a filter change while the panel is
    /// loading yields [`RetrievalError::Superseded`].
    pub async fn fetch_user_activities(
        &self,
        ctx: &QueryContext,
        user_id: &UserId,
        filter: &QueryFilter,
    ) -> Result<DayGroups, RetrievalError> {
        let generation = ctx.current_generation();
        let range = filter.date_range()?;
        let budget_ms = live_fetch_budget_ms(range.period_days());
        let endpoint = Endpoint::UserActivities(user_id.clone());

        let validated = self
            .request(Tier::LiveFetch, &endpoint, budget_ms, &StatsQuery::dates_only(range))
            .await?;
        if !ctx.is_current(generation) {
            return Err(RetrievalError::Superseded);
        }

        let normalized = RecordNormalizer::new(ctx.timezone()).activities(&validated.payload.activities);
        debug!(
            user = %user_id,
            records = normalized.records.len(),
            rejected = normalized.rejected.len(),
            "Loaded user activities"
        );
        Ok(group_by_day(
            normalized.records.into_iter().filter(|r| range.contains(r.local_date())),
        ))
    }

    async fn request(
        &self,
        tier: Tier,
        endpoint: &Endpoint,
        budget_ms: u64,
        query: &StatsQuery,
    ) -> Result<ValidatedEnvelope, RetrievalError> {
        self.status.notify(StatusUpdate::TierStarted { tier, budget_ms });
        debug!(%tier, path = %endpoint.path(), budget_ms, "Requesting");
        timed(tier, budget_ms, self.backend.fetch(endpoint, query))
            .await
            .and_then(validate_envelope)
    }

    async fn query_cache(
        &self,
        tier: Tier,
        endpoint: Endpoint,
        budget_ms: u64,
        query: &StatsQuery,
        answer: &mut Option<ValidatedEnvelope>,
    ) -> TierEvent {
        match self.request(tier, &endpoint, budget_ms, query).await {
            Ok(validated) => {
                let completeness = validated.effective_completeness();
                if completeness > 0 {
                    *answer = Some(validated);
                }
                TierEvent::Answered { completeness }
            }
            Err(err) => failure_event(err),
        }
    }

    async fn ask(&self, prompt: ConfirmationPrompt) -> TierEvent {
        self.status.notify(StatusUpdate::AwaitingConfirmation(prompt.clone()));
        if self.gate.confirm(&prompt).await {
            TierEvent::Confirmed
        } else {
            TierEvent::Declined
        }
    }

    /// Triggers the ingestion job and polls it until it reports completion.
    async fn progressive_load(
        &self,
        ctx: &QueryContext,
        generation: u64,
        request_budget_ms: u64,
        query: &StatsQuery,
    ) -> TierEvent {
        let tier = Tier::ProgressiveIngestion;
        let progressive = self.settings.progressive;
        self.status.notify(StatusUpdate::TierStarted {
            tier,
            budget_ms: progressive.total_budget_ms(),
        });

        let started = match timed(tier, request_budget_ms, self.backend.start_ingestion(query)).await {
            Ok(status) => status,
            Err(err) => return failure_event(err),
        };
        if !started.success {
            let reason = started.error.unwrap_or_else(|| "ingestion job was not started".to_string());
            return TierEvent::Errored(RetrievalError::MalformedResponse(reason));
        }
        if started.completed {
            return TierEvent::IngestionCompleted;
        }
        let Some(job_id) = started.job_id else {
            return TierEvent::Errored(RetrievalError::MalformedResponse("ingestion job has no job_id".to_string()));
        };

        for _ in 0..progressive.max_polls {
            tokio::time::sleep(progressive.poll_interval()).await;
            if !ctx.is_current(generation) {
                return TierEvent::Errored(RetrievalError::Superseded);
            }
            match timed(tier, request_budget_ms, self.backend.ingestion_status(&job_id)).await {
                Ok(status) if !status.success => {
                    let reason = status.error.unwrap_or_else(|| format!("ingestion job {job_id} failed"));
                    return TierEvent::Errored(RetrievalError::MalformedResponse(reason));
                }
                Ok(status) if status.completed => return TierEvent::IngestionCompleted,
                Ok(status) => self.status.notify(StatusUpdate::IngestionProgress {
                    job_id: job_id.clone(),
                    percent: status.percent(),
                }),
                Err(err) => return failure_event(err),
            }
        }

        TierEvent::TimedOut {
            budget_ms: progressive.total_budget_ms(),
        }
    }

    fn finish(&self, tier: Tier, answer: Option<ValidatedEnvelope>, generation: u64) -> RetrievalResult {
        let Some(validated) = answer else {
            return self.fail(RetrievalError::Unavailable, generation);
        };

        let completeness = tier.is_cache().then(|| CacheCompletenessReport {
            percent_complete: validated.effective_completeness(),
            source_tier: tier,
        });
        let status = match completeness {
            Some(report) if !report.is_complete() => RetrievalStatus::PartialOk,
            _ => RetrievalStatus::Ok,
        };
        self.status.notify(StatusUpdate::Finished {
            tier,
            completeness: completeness.map(|c| c.percent_complete),
        });

        RetrievalResult {
            status,
            payload: Some(validated.payload),
            completeness,
            tier_used: Some(tier),
            generation,
        }
    }

    fn fail(&self, err: RetrievalError, generation: u64) -> RetrievalResult {
        self.status.notify(StatusUpdate::Failed { reason: err.to_string() });
        RetrievalResult::failed(err, generation)
    }
}
