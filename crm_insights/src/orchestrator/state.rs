//! The tier fallback chain as a pure state machine.
//!
//! The orchestrator performs the I/O for the current state and feeds the
//! outcome back as a [`TierEvent`]; [`TierMachine::advance`] decides where
//! to go next. Nothing in here awaits, sleeps or logs.

use crate::{
    errors::RetrievalError,
    models::retrieval::{StatsKind, Tier},
    orchestrator::budget::is_long_period,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TierState {
    TryCache1,
    TryCache2,
    ConfirmLiveFetch,
    LiveFetch,
    ConfirmProgressive,
    ProgressiveLoad,
    /// Finished with data from this tier.
    Done(Tier),
    Failed(RetrievalError),
}

impl TierState {
    pub fn is_final(&self) -> bool {
        matches!(self, TierState::Done(_) | TierState::Failed(_))
    }

    /// Tier whose request this state issues, if any.
    pub fn tier(&self) -> Option<Tier> {
        match self {
            TierState::TryCache1 => Some(Tier::InstantCache),
            TierState::TryCache2 => Some(Tier::DegradedCache),
            TierState::LiveFetch => Some(Tier::LiveFetch),
            TierState::ProgressiveLoad => Some(Tier::ProgressiveIngestion),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TierEvent {
    /// A cache tier answered with this completeness (0–100).
    Answered { completeness: u8 },
    /// The live fetch delivered data.
    Fetched,
    /// The ingestion job reported completion.
    IngestionCompleted,
    /// The current tier exceeded its budget.
    TimedOut { budget_ms: u64 },
    Errored(RetrievalError),
    Confirmed,
    Declined,
}

/// Drives one retrieval through the tier chain.
#[derive(Debug, Clone)]
pub struct TierMachine {
    state: TierState,
    long_period: bool,
    progressive_allowed: bool,
    instant_cache_runs: u8,
    last_error: Option<RetrievalError>,
}

impl TierMachine {
    /// Activity statistics start at the instant cache. Deals skip the cache
    /// tiers and go to live fetch, behind a confirmation for long periods.
    pub fn new(kind: StatsKind, period_days: i64) -> Self {
        let long_period = is_long_period(period_days);
        let (state, progressive_allowed, instant_cache_runs) = match kind {
            StatsKind::Activity => (TierState::TryCache1, true, 1),
            StatsKind::Deals if long_period => (TierState::ConfirmLiveFetch, false, 0),
            StatsKind::Deals => (TierState::LiveFetch, false, 0),
        };
        Self {
            state,
            long_period,
            progressive_allowed,
            instant_cache_runs,
            last_error: None,
        }
    }

    pub fn state(&self) -> &TierState {
        &self.state
    }

    pub fn long_period(&self) -> bool {
        self.long_period
    }

    fn offers_progressive(&self) -> bool {
        self.long_period && self.progressive_allowed
    }

    /// Whether the instant cache has already been re-run after ingestion.
    fn is_retry_of_instant_cache(&self) -> bool {
        self.instant_cache_runs > 1
    }

    fn timeout(&self, budget_ms: u64) -> Option<RetrievalError> {
        self.state.tier().map(|tier| RetrievalError::Timeout { tier, budget_ms })
    }

    /// Applies `event` and returns the new state. Events that make no sense
    /// in the current state leave it unchanged.
    pub fn advance(&mut self, event: TierEvent) -> &TierState {
        if self.state.is_final() {
            return &self.state;
        }

        // failure of the current tier, with timeouts made concrete
        let failure = match &event {
            TierEvent::TimedOut { budget_ms } => self.timeout(*budget_ms),
            TierEvent::Errored(err) => Some(err.clone()),
            _ => None,
        };
        if let Some(err) = failure.as_ref().filter(|e| e.is_terminal()) {
            self.state = TierState::Failed(err.clone());
            return &self.state;
        }

        let next = match (&self.state, event) {
            (TierState::TryCache1, TierEvent::Answered { completeness }) if completeness > 0 => {
                TierState::Done(Tier::InstantCache)
            }
            (TierState::TryCache1, TierEvent::Answered { .. }) if self.is_retry_of_instant_cache() => {
                TierState::Failed(RetrievalError::Unavailable)
            }
            // a definitive empty answer skips the degraded cache
            (TierState::TryCache1, TierEvent::Answered { .. }) => TierState::ConfirmLiveFetch,
            (TierState::TryCache1, TierEvent::TimedOut { .. } | TierEvent::Errored(_)) => match failure {
                Some(err) if self.is_retry_of_instant_cache() => TierState::Failed(err),
                err => {
                    self.last_error = err;
                    TierState::TryCache2
                }
            },

            (TierState::TryCache2, TierEvent::Answered { completeness }) if completeness > 0 => {
                TierState::Done(Tier::DegradedCache)
            }
            (TierState::TryCache2, TierEvent::Answered { .. }) => TierState::ConfirmLiveFetch,
            (TierState::TryCache2, TierEvent::TimedOut { .. } | TierEvent::Errored(_)) => {
                self.last_error = failure;
                TierState::ConfirmLiveFetch
            }

            (TierState::ConfirmLiveFetch, TierEvent::Confirmed) => TierState::LiveFetch,
            (TierState::ConfirmLiveFetch, TierEvent::Declined) if self.offers_progressive() => {
                TierState::ConfirmProgressive
            }
            (TierState::ConfirmLiveFetch, TierEvent::Declined) => TierState::Failed(RetrievalError::Cancelled),

            (TierState::LiveFetch, TierEvent::Fetched) => TierState::Done(Tier::LiveFetch),
            (TierState::LiveFetch, TierEvent::TimedOut { .. } | TierEvent::Errored(_)) => match failure {
                Some(err) if self.offers_progressive() => {
                    self.last_error = Some(err);
                    TierState::ConfirmProgressive
                }
                Some(err) => TierState::Failed(err),
                None => TierState::Failed(RetrievalError::Unavailable),
            },

            (TierState::ConfirmProgressive, TierEvent::Confirmed) => TierState::ProgressiveLoad,
            (TierState::ConfirmProgressive, TierEvent::Declined) => {
                TierState::Failed(self.last_error.take().unwrap_or(RetrievalError::Cancelled))
            }

            (TierState::ProgressiveLoad, TierEvent::IngestionCompleted) => {
                self.instant_cache_runs += 1;
                TierState::TryCache1
            }
            (TierState::ProgressiveLoad, TierEvent::TimedOut { .. } | TierEvent::Errored(_)) => {
                TierState::Failed(failure.unwrap_or(RetrievalError::Unavailable))
            }

            (state, _) => state.clone(),
        };
        self.state = next;
        &self.state
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use TierEvent::*;

    fn run(kind: StatsKind, days: i64, events: Vec<TierEvent>) -> TierState {
        let mut m = TierMachine::new(kind, days);
        for e in events {
            m.advance(e);
        }
        m.state().clone()
    }

    fn timeout(tier: Tier, budget_ms: u64) -> RetrievalError {
        RetrievalError::Timeout { tier, budget_ms }
    }

    #[test]
    fn complete_or_partial_instant_cache_finishes() {
        assert_eq!(run(StatsKind::Activity, 1, vec![Answered { completeness: 100 }]), TierState::Done(Tier::InstantCache));
        assert_eq!(run(StatsKind::Activity, 1, vec![Answered { completeness: 40 }]), TierState::Done(Tier::InstantCache));
    }

    #[test]
    fn empty_instant_cache_skips_degraded_cache() {
        let mut m = TierMachine::new(StatsKind::Activity, 7);
        assert_eq!(m.advance(Answered { completeness: 0 }), &TierState::ConfirmLiveFetch);
    }

    #[test]
    fn instant_cache_timeout_falls_to_degraded_cache() {
        let mut m = TierMachine::new(StatsKind::Activity, 7);
        assert_eq!(m.advance(TimedOut { budget_ms: 3_000 }), &TierState::TryCache2);
        assert_eq!(m.advance(Answered { completeness: 80 }), &TierState::Done(Tier::DegradedCache));
    }

    #[test]
    fn transport_errors_fall_through_but_auth_stops() {
        let mut m = TierMachine::new(StatsKind::Activity, 7);
        m.advance(Errored(RetrievalError::Http { status: 502 }));
        assert_eq!(m.state(), &TierState::TryCache2);
        m.advance(Errored(RetrievalError::Auth { status: 401 }));
        assert_eq!(m.state(), &TierState::Failed(RetrievalError::Auth { status: 401 }));
    }

    #[test]
    fn short_period_declined_live_fetch_is_cancelled() {
        let end = run(StatsKind::Activity, 7, vec![Answered { completeness: 0 }, Declined]);
        assert_eq!(end, TierState::Failed(RetrievalError::Cancelled));
    }

    #[test]
    fn live_fetch_timeout_surfaces_for_short_periods() {
        let end = run(
            StatsKind::Activity,
            7,
            vec![Answered { completeness: 0 }, Confirmed, TimedOut { budget_ms: 45_000 }],
        );
        assert_eq!(end, TierState::Failed(timeout(Tier::LiveFetch, 45_000)));
    }

    #[test]
    fn long_period_failure_offers_progressive_then_reenters_cache() {
        let mut m = TierMachine::new(StatsKind::Activity, 60);
        m.advance(TimedOut { budget_ms: 3_000 });
        m.advance(TimedOut { budget_ms: 5_000 });
        assert_eq!(m.state(), &TierState::ConfirmLiveFetch);
        m.advance(Confirmed);
        m.advance(Errored(RetrievalError::Http { status: 504 }));
        assert_eq!(m.state(), &TierState::ConfirmProgressive);
        m.advance(Confirmed);
        assert_eq!(m.state(), &TierState::ProgressiveLoad);
        m.advance(IngestionCompleted);
        assert_eq!(m.state(), &TierState::TryCache1);
        m.advance(Answered { completeness: 100 });
        assert_eq!(m.state(), &TierState::Done(Tier::InstantCache));
    }

    #[test]
    fn instant_cache_is_retried_only_once() {
        let prefix = vec![Answered { completeness: 0 }, Declined, Confirmed, IngestionCompleted];

        let mut events = prefix.clone();
        events.push(Answered { completeness: 0 });
        assert_eq!(run(StatsKind::Activity, 45, events), TierState::Failed(RetrievalError::Unavailable));

        let mut events = prefix;
        events.push(TimedOut { budget_ms: 3_000 });
        assert_eq!(run(StatsKind::Activity, 45, events), TierState::Failed(timeout(Tier::InstantCache, 3_000)));
    }

    #[test]
    fn declined_progressive_surfaces_live_fetch_error() {
        let end = run(
            StatsKind::Activity,
            45,
            vec![Answered { completeness: 0 }, Confirmed, TimedOut { budget_ms: 120_000 }, Declined],
        );
        assert_eq!(end, TierState::Failed(timeout(Tier::LiveFetch, 120_000)));
    }

    #[test]
    fn deals_never_touch_cache_or_progressive() {
        let m = TierMachine::new(StatsKind::Deals, 7);
        assert_eq!(m.state(), &TierState::LiveFetch);

        let end = run(StatsKind::Deals, 45, vec![Confirmed, TimedOut { budget_ms: 120_000 }]);
        assert_eq!(end, TierState::Failed(timeout(Tier::LiveFetch, 120_000)));

        let end = run(StatsKind::Deals, 45, vec![Declined]);
        assert_eq!(end, TierState::Failed(RetrievalError::Cancelled));
    }

    #[test]
    fn final_states_absorb_events() {
        let mut m = TierMachine::new(StatsKind::Deals, 1);
        m.advance(Fetched);
        assert_eq!(m.advance(Errored(RetrievalError::Superseded)), &TierState::Done(Tier::LiveFetch));
    }

    #[test]
    fn superseded_is_terminal_everywhere() {
        for days in [1, 45] {
            let mut m = TierMachine::new(StatsKind::Activity, days);
            m.advance(Answered { completeness: 0 });
            m.advance(Errored(RetrievalError::Superseded));
            assert_eq!(m.state(), &TierState::Failed(RetrievalError::Superseded));
        }
    }
}
