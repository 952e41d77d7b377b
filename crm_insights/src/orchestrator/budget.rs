use std::time::Duration;

/// Live-fetch budget in milliseconds for a period of `period_days`
/// (inclusive day count).
///
/// | days   | budget  |
/// |--------|---------|
/// | ≤ 1    | 30 s    |
/// | ≤ 7    | 45 s    |
/// | ≤ 30   | 60 s    |
/// | ≤ 90   | 120 s   |
/// | longer | 180 s   |
pub fn live_fetch_budget_ms(period_days: i64) -> u64 {
    match period_days {
        ..=1 => 30_000,
        2..=7 => 45_000,
        8..=30 => 60_000,
        31..=90 => 120_000,
        _ => 180_000,
    }
}

pub fn live_fetch_budget(period_days: i64) -> Duration {
    Duration::from_millis(live_fetch_budget_ms(period_days))
}

/// Periods longer than this need a confirmation for live fetch and may
/// fall back to progressive ingestion.
pub const LONG_PERIOD_DAYS: i64 = 30;

pub fn is_long_period(period_days: i64) -> bool {
    period_days > LONG_PERIOD_DAYS
}
