//! Backend abstraction for the dashboard's statistics API.
//!
//! [`StatsBackend`] is the seam between the retrieval orchestrator and the
//! transport. [`HttpBackend`] talks to the real HTTP API; tests plug in
//! scripted backends to drive the tier chain without a network.
//!
//! Implementations return the raw [`StatsEnvelope`]; turning it into a typed
//! result is left to [`validate_envelope`] so every backend is held to the
//! same contract.

pub mod errors;
pub mod http;
pub mod params;
pub mod response;

use async_trait::async_trait;

pub use errors::BackendError;
pub use http::HttpBackend;
pub use params::StatsQuery;
pub use response::{IngestionStatus, StatsEnvelope, UsersEnvelope, ValidatedEnvelope, validate_envelope};

use crate::models::user::{CrmUser, UserId};

/// Endpoints answering with a [`StatsEnvelope`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Endpoint {
    /// Tier 1: precomputed cache.
    SuperFast,
    /// Tier 2: secondary cache.
    Fast,
    /// Tier 3: live fetch from the CRM.
    Main,
    DealsList,
    UserActivities(UserId),
}

impl Endpoint {
    /// URL path segments below the base URL.
    pub fn segments(&self) -> Vec<&str> {
        match self {
            Endpoint::SuperFast => vec!["api", "stats", "super-fast"],
            Endpoint::Fast => vec!["api", "stats", "fast"],
            Endpoint::Main => vec!["api", "stats", "main"],
            Endpoint::DealsList => vec!["api", "deals", "list"],
            Endpoint::UserActivities(id) => vec!["api", "user-activities", id.as_str()],
        }
    }

    pub fn path(&self) -> String {
        format!("/{}", self.segments().join("/"))
    }
}

/// Path of the progressive ingestion trigger and poll.
pub const PROGRESSIVE_SEGMENTS: [&str; 2] = ["api", "load-progressive"];

/// Path of the CRM user list.
pub const USERS_SEGMENTS: [&str; 2] = ["api", "users"];

#[async_trait]
pub trait StatsBackend: Send + Sync {
    async fn fetch(&self, endpoint: &Endpoint, query: &StatsQuery) -> Result<StatsEnvelope, BackendError>;

    /// Starts a progressive ingestion job for the query's range and users.
    async fn start_ingestion(&self, query: &StatsQuery) -> Result<IngestionStatus, BackendError>;

    async fn ingestion_status(&self, job_id: &str) -> Result<IngestionStatus, BackendError>;

    /// CRM users, for the id → name directory.
    async fn users(&self) -> Result<Vec<CrmUser>, BackendError>;
}
