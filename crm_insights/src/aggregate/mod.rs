//! Pure aggregation over normalized records.
//!
//! Nothing in here performs I/O or touches shared state; every function is a
//! deterministic mapping from records (plus a filter or user directory) to
//! rollups, which keeps the table, chart and comparison views reproducible.

pub mod activity;
pub mod deals;
pub mod statistics;
