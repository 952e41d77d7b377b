//! Response envelopes and the boundary that validates them.

use serde::Deserialize;
use serde_json::Value;

use crate::{
    errors::RetrievalError,
    models::{
        activity::RawActivity, deal::RawDeal, retrieval::StatsPayload, rollup::UserActivityRollup, serde_lenient,
        user::CrmUser,
    },
};

use super::BackendError;

/// The envelope every statistics, deals and drill-down endpoint answers with.
#[derive(Deserialize, Debug, Clone, Default, PartialEq)]
pub struct StatsEnvelope {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub user_stats: Option<Vec<UserActivityRollup>>,
    #[serde(default)]
    pub statistics: Option<Value>,
    #[serde(default)]
    pub deals: Option<Vec<RawDeal>>,
    #[serde(default)]
    pub activities: Option<Vec<RawActivity>>,
    #[serde(default)]
    pub activities_count: Option<u64>,
    /// Percentage of requested days present in the cache, 0–100.
    #[serde(default)]
    pub cache_completeness: Option<f64>,
    #[serde(default)]
    pub cache_used: Option<bool>,
}

/// An envelope that passed [`validate_envelope`].
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedEnvelope {
    pub payload: StatsPayload,
    pub completeness: Option<u8>,
}

impl ValidatedEnvelope {
    /// Completeness as reported, or inferred when a cache tier omitted it:
    /// any rollup means a complete answer, none means an empty cache.
    pub fn effective_completeness(&self) -> u8 {
        self.completeness.unwrap_or_else(|| {
            let has_rollups = self.payload.user_stats.as_ref().is_some_and(|s| !s.is_empty());
            if has_rollups { 100 } else { 0 }
        })
    }
}

/// The single point where a raw envelope becomes a typed result.
///
/// Rejects `success: false`, out-of-range completeness and rollups whose
/// total is below their named counts.
pub fn validate_envelope(envelope: StatsEnvelope) -> Result<ValidatedEnvelope, RetrievalError> {
    if !envelope.success {
        let reason = envelope
            .error
            .filter(|e| !e.trim().is_empty())
            .unwrap_or_else(|| "success flag is false".to_string());
        return Err(RetrievalError::MalformedResponse(reason));
    }

    let completeness = match envelope.cache_completeness {
        None => None,
        Some(c) if c.is_finite() && (0.0..=100.0).contains(&c) => Some(completeness_percent(c)),
        Some(c) => {
            return Err(RetrievalError::MalformedResponse(format!(
                "cache_completeness {c} is outside 0..=100"
            )));
        }
    };

    if let Some(bad) = envelope
        .user_stats
        .iter()
        .flatten()
        .find(|r| !r.is_consistent())
    {
        return Err(RetrievalError::MalformedResponse(format!(
            "rollup for user {} has total {} below its named counts {}",
            bad.user_id,
            bad.total,
            bad.named_total()
        )));
    }

    Ok(ValidatedEnvelope {
        payload: StatsPayload {
            user_stats: envelope.user_stats,
            activities: envelope.activities.unwrap_or_default(),
            deals: envelope.deals.unwrap_or_default(),
            statistics: envelope.statistics.filter(|v| !v.is_null()),
            activities_count: envelope.activities_count,
            cache_used: envelope.cache_used.unwrap_or(false),
        },
        completeness,
    })
}

/// Answer of the users endpoint. A CRM outage comes back as a 200 with
/// `error` set and no `users`.
#[derive(Deserialize, Debug, Clone, Default)]
pub struct UsersEnvelope {
    #[serde(default)]
    pub users: Option<Vec<CrmUser>>,
    #[serde(default)]
    pub error: Option<String>,
}

impl UsersEnvelope {
    pub fn into_users(self) -> Result<Vec<CrmUser>, BackendError> {
        match (self.users, self.error) {
            (Some(users), _) => Ok(users),
            (None, Some(error)) if !error.trim().is_empty() => Err(BackendError::Api(error)),
            (None, _) => Err(BackendError::Api("users missing from response".to_string())),
        }
    }
}

/// Rounds a reported completeness to a whole percent. A partial cache never
/// rounds to 0 or 100: only an exact 0 means empty and only an exact 100
/// means complete.
fn completeness_percent(c: f64) -> u8 {
    if c > 0.0 && c < 1.0 {
        1
    } else if c > 99.0 && c < 100.0 {
        99
    } else {
        c.round() as u8
    }
}

/// State of a progressive ingestion job, from both the trigger and the poll.
#[derive(Deserialize, Debug, Clone, Default, PartialEq)]
pub struct IngestionStatus {
    #[serde(default)]
    pub success: bool,
    #[serde(default, deserialize_with = "serde_lenient::opt_string_or_number")]
    pub job_id: Option<String>,
    #[serde(default)]
    pub completed: bool,
    /// 0–100 when the backend reports it.
    #[serde(default)]
    pub progress: Option<f64>,
    #[serde(default)]
    pub error: Option<String>,
}

impl IngestionStatus {
    pub fn percent(&self) -> Option<u8> {
        self.progress
            .filter(|p| p.is_finite())
            .map(|p| p.clamp(0.0, 100.0).round() as u8)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(json: &str) -> StatsEnvelope {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn cached_rollups_pass_through() {
        let v = validate_envelope(parse(
            r#"{"success": true, "cache_completeness": 100,
                "user_stats": [{"user_id": "8860", "calls": 3, "comments": 1, "tasks": 0, "meetings": 0, "total": 4}]}"#,
        ))
        .unwrap();
        assert_eq!(v.completeness, Some(100));
        let stats = v.payload.user_stats.unwrap();
        assert_eq!(stats[0].calls, 3);
        assert_eq!(stats[0].total, 4);
    }

    #[test]
    fn unsuccessful_envelope_is_malformed() {
        let err = validate_envelope(parse(r#"{"success": false, "error": "Bitrix24 недоступен"}"#)).unwrap_err();
        assert_eq!(err, RetrievalError::MalformedResponse("Bitrix24 недоступен".into()));
        assert!(validate_envelope(parse("{}")).is_err());
    }

    #[test]
    fn inconsistent_rollup_is_malformed() {
        let err = validate_envelope(parse(
            r#"{"success": true, "user_stats": [{"user_id": "1", "calls": 5, "total": 2}]}"#,
        ))
        .unwrap_err();
        assert!(matches!(err, RetrievalError::MalformedResponse(_)));
    }

    #[test]
    fn completeness_bounds_and_inference() {
        assert!(validate_envelope(parse(r#"{"success": true, "cache_completeness": 140}"#)).is_err());

        let v = validate_envelope(parse(r#"{"success": true, "cache_completeness": 62.6}"#)).unwrap();
        assert_eq!(v.effective_completeness(), 63);

        let v = validate_envelope(parse(r#"{"success": true, "user_stats": []}"#)).unwrap();
        assert_eq!(v.effective_completeness(), 0);

        let v = validate_envelope(parse(r#"{"success": true, "user_stats": [{"user_id": "1", "total": 1}]}"#)).unwrap();
        assert_eq!(v.effective_completeness(), 100);
    }

    #[test]
    fn partial_completeness_never_rounds_to_the_ends() {
        let percent = |json: &str| validate_envelope(parse(json)).unwrap().effective_completeness();

        assert_eq!(percent(r#"{"success": true, "cache_completeness": 0.4}"#), 1);
        assert_eq!(percent(r#"{"success": true, "cache_completeness": 99.6}"#), 99);
        assert_eq!(percent(r#"{"success": true, "cache_completeness": 99.2}"#), 99);
        assert_eq!(percent(r#"{"success": true, "cache_completeness": 0}"#), 0);
        assert_eq!(percent(r#"{"success": true, "cache_completeness": 100}"#), 100);
        assert_eq!(percent(r#"{"success": true, "cache_completeness": 1.4}"#), 1);
    }

    #[test]
    fn users_envelope_shapes() {
        let users: UsersEnvelope = serde_json::from_str(
            r#"{"active_users": 2, "total_users": 2, "users": [{"ID": "8860", "NAME": "Ольга", "LAST_NAME": "Безина", "ACTIVE": true}]}"#,
        )
        .unwrap();
        let users = users.into_users().unwrap();
        assert_eq!(users[0].full_name(), "Ольга Безина");

        let outage: UsersEnvelope = serde_json::from_str(
            r#"{"error": "Не удалось подключиться к Bitrix24", "setup_required": true, "total_users": 0}"#,
        )
        .unwrap();
        assert!(matches!(outage.into_users(), Err(BackendError::Api(e)) if e.contains("Bitrix24")));
    }

    #[test]
    fn ingestion_status_shapes() {
        let s: IngestionStatus = serde_json::from_str(r#"{"success": true, "job_id": 17, "progress": 41.6}"#).unwrap();
        assert_eq!(s.job_id.as_deref(), Some("17"));
        assert!(!s.completed);
        assert_eq!(s.percent(), Some(42));
    }
}
