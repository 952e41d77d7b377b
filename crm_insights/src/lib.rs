//! Client-side data layer of a CRM analytics dashboard.
//!
//! Retrieval goes through [`orchestrator::TieredRetrievalOrchestrator`],
//! which falls back from fast caches to a live fetch and finally to a
//! background ingestion job. Payloads are normalized by [`normalize`],
//! rolled up by [`aggregate`] and shaped for side-by-side charts by
//! [`projector`].

pub mod aggregate;
pub mod backend;
#[cfg(feature = "cli")]
pub mod cli;
pub mod config;
pub mod errors;
pub mod models;
pub mod normalize;
pub mod orchestrator;
pub mod projector;
pub mod session;
pub mod tz;

pub use errors::RetrievalError;
pub use orchestrator::TieredRetrievalOrchestrator;
pub use session::QueryContext;
