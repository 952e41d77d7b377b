//! Timestamp parsing for CRM payloads.
//!
//! The CRM usually sends ISO-8601 timestamps with an offset
//! (`2024-01-01T10:30:00+03:00`). Some endpoints drop the offset; those are
//! read as wall-clock time in the configured portal time zone.
//!
//! Local wall times near DST transitions resolve through a [`DstPolicy`]:
//! - ambiguous ("fall back", the wall time occurs twice)
//! - nonexistent ("spring forward", the wall time is skipped)
//!
//! Records keep the offset they were resolved in, so calendar-day grouping
//! follows the day the record was created on locally.

use chrono::{DateTime, Duration, FixedOffset, LocalResult, NaiveDateTime, TimeZone};
use chrono_tz::Tz;

const NAIVE_FORMATS: [&str; 4] = [
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
];

/// Policy for local wall times that do not map to exactly one instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DstPolicy {
    /// Reject both ambiguous and nonexistent times.
    Strict,
    /// Ambiguous: the earlier instant. Nonexistent: shift forward minute by
    /// minute to the first valid instant (capped at 2 hours).
    #[default]
    EarliestThenShift,
}

/// Resolves a naive wall time in `tz` to an instant carrying the local offset.
pub fn from_local_naive(naive: NaiveDateTime, tz: Tz, policy: DstPolicy) -> Option<DateTime<FixedOffset>> {
    match tz.from_local_datetime(&naive) {
        LocalResult::Single(dt) => Some(dt.fixed_offset()),
        LocalResult::Ambiguous(earliest, _) => match policy {
            DstPolicy::EarliestThenShift => Some(earliest.fixed_offset()),
            DstPolicy::Strict => None,
        },
        LocalResult::None => match policy {
            DstPolicy::EarliestThenShift => {
                // minimal nudge forward, capped at 2 hours
                let mut t = naive;
                for _ in 0..120 {
                    t += Duration::minutes(1);
                    if let LocalResult::Single(dt) = tz.from_local_datetime(&t) {
                        return Some(dt.fixed_offset());
                    }
                }
                None
            }
            DstPolicy::Strict => None,
        },
    }
}

/// Parses a CRM timestamp. Offsets present in the text win over `tz`.
pub fn parse_timestamp(raw: &str, tz: Tz, policy: DstPolicy) -> Option<DateTime<FixedOffset>> {
    let s = raw.trim();
    if s.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt);
    }
    if let Ok(dt) = DateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%z") {
        return Some(dt);
    }
    NAIVE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
        .and_then(|naive| from_local_naive(naive, tz, policy))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, Timelike, Utc};

    fn naive(y: i32, m: u32, d: u32, h: u32, min: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d).unwrap().and_hms_opt(h, min, 0).unwrap()
    }

    #[test]
    fn offset_in_text_is_kept() {
        let dt = parse_timestamp("2024-01-01T23:30:00+03:00", chrono_tz::UTC, DstPolicy::Strict).unwrap();
        assert_eq!(dt.offset().local_minus_utc(), 3 * 3600);
        assert_eq!(dt.date_naive(), NaiveDate::from_ymd_opt(2024, 1, 1).unwrap());
    }

    #[test]
    fn bitrix_style_offset_without_colon() {
        let dt = parse_timestamp("2024-01-01T10:00:00+0300", chrono_tz::UTC, DstPolicy::Strict).unwrap();
        assert_eq!(dt.hour(), 10);
    }

    #[test]
    fn naive_time_uses_configured_zone() {
        let tz: Tz = "Europe/Moscow".parse().unwrap();
        let dt = parse_timestamp("2024-01-01 10:30:00", tz, DstPolicy::Strict).unwrap();
        assert_eq!(dt.with_timezone(&Utc).hour(), 7);
        assert_eq!(dt.hour(), 10);
    }

    #[test]
    fn spring_forward_gap_shifts_forward() {
        let tz: Tz = "America/New_York".parse().unwrap();
        let dt = from_local_naive(naive(2024, 3, 10, 2, 30), tz, DstPolicy::EarliestThenShift).unwrap();
        assert_eq!((dt.hour(), dt.minute()), (3, 0));
        assert!(from_local_naive(naive(2024, 3, 10, 2, 30), tz, DstPolicy::Strict).is_none());
    }

    #[test]
    fn fall_back_picks_earliest() {
        let tz: Tz = "America/New_York".parse().unwrap();
        let dt = from_local_naive(naive(2024, 11, 3, 1, 30), tz, DstPolicy::EarliestThenShift).unwrap();
        assert_eq!(dt.with_timezone(&Utc).hour(), 5);
    }

    #[test]
    fn garbage_is_none() {
        assert!(parse_timestamp("вчера", chrono_tz::UTC, DstPolicy::default()).is_none());
        assert!(parse_timestamp("  ", chrono_tz::UTC, DstPolicy::default()).is_none());
    }
}
