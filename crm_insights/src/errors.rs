use thiserror::Error;

use crate::models::retrieval::Tier;

/// The classified failure of a retrieval, as surfaced to the dashboard.
///
/// Transport-level details are flattened into plain data so the error can be
/// cloned into a [`RetrievalResult`](crate::models::retrieval::RetrievalResult)
/// and compared in tests.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RetrievalError {
    /// The filter was rejected before any request was issued.
    #[error("Invalid query: {0}")]
    Validation(String),

    /// A tier did not answer within its budget.
    #[error("{tier} did not answer within {budget_ms} ms")]
    Timeout { tier: Tier, budget_ms: u64 },

    /// The request never produced an HTTP response (connection refused, reset, DNS).
    #[error("Backend unreachable: {0}")]
    Transport(String),

    /// The backend answered with a non-2xx status.
    #[error("Backend returned HTTP {status}")]
    Http { status: u16 },

    /// The session token is missing, expired or rejected (401/403).
    #[error("Authentication required (HTTP {status})")]
    Auth { status: u16 },

    /// The body could not be parsed or failed the envelope contract.
    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    /// The user declined the confirmation and nothing else was left to try.
    #[error("Retrieval cancelled by user")]
    Cancelled,

    /// A newer request was started; this result must not be displayed.
    #[error("Request superseded by a newer filter")]
    Superseded,

    /// Every permitted tier ran and none of them had data.
    #[error("No data available for the requested period")]
    Unavailable,
}

impl RetrievalError {
    /// Terminal errors stop the tier chain immediately.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            RetrievalError::Validation(_) | RetrievalError::Auth { .. } | RetrievalError::Superseded
        )
    }

    /// Whether the dashboard should offer a manual "try again".
    pub fn retry_allowed(&self) -> bool {
        matches!(
            self,
            RetrievalError::Timeout { .. }
                | RetrievalError::Transport(_)
                | RetrievalError::Http { .. }
                | RetrievalError::MalformedResponse(_)
                | RetrievalError::Unavailable
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_and_retry_are_disjoint_for_taxonomy() {
        let all = [
            RetrievalError::Validation("x".into()),
            RetrievalError::Timeout { tier: Tier::LiveFetch, budget_ms: 30_000 },
            RetrievalError::Transport("connection refused".into()),
            RetrievalError::Http { status: 502 },
            RetrievalError::Auth { status: 401 },
            RetrievalError::MalformedResponse("x".into()),
            RetrievalError::Cancelled,
            RetrievalError::Superseded,
            RetrievalError::Unavailable,
        ];
        for err in &all {
            assert!(!(err.is_terminal() && err.retry_allowed()), "{err:?}");
        }
        assert!(RetrievalError::Auth { status: 403 }.is_terminal());
        assert!(RetrievalError::Http { status: 500 }.retry_allowed());
    }

    #[test]
    fn timeout_message_names_the_tier() {
        let err = RetrievalError::Timeout { tier: Tier::InstantCache, budget_ms: 3_000 };
        assert_eq!(err.to_string(), "tier 1 (instant cache) did not answer within 3000 ms");
    }
}
