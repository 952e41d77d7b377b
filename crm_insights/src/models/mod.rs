pub mod activity;
pub mod deal;
pub mod filter;
pub mod retrieval;
pub mod rollup;
pub(crate) mod serde_lenient;
pub mod user;
