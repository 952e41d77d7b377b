use chrono::NaiveDate;

use crate::{
    errors::RetrievalError,
    models::{filter::QueryFilter, user::UserId},
};

use super::commands::{FilterArgs, PeriodArgs};

pub fn parse_date(raw: &str) -> Result<NaiveDate, RetrievalError> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|e| RetrievalError::Validation(format!("invalid date {raw:?}: {e}")))
}

/// Splits a comma-separated id list, skipping blanks.
pub fn parse_user_ids(raw: &str) -> Vec<UserId> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(UserId::from)
        .collect()
}

pub fn period_filter(period: &PeriodArgs) -> Result<QueryFilter, RetrievalError> {
    let filter = QueryFilter::new(parse_date(&period.start)?, parse_date(&period.end)?);
    filter.date_range()?;
    Ok(filter)
}

/// Builds the query filter. Date order is checked here so a bad range never
/// reaches the network.
pub fn build_filter(args: &FilterArgs) -> Result<QueryFilter, RetrievalError> {
    let users = args.users.as_deref().map(parse_user_ids).unwrap_or_default();
    Ok(period_filter(&args.period)?
        .with_users(users)
        .with_activity_type(args.activity_type.as_deref()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(start: &str, end: &str, users: Option<&str>, kind: Option<&str>) -> FilterArgs {
        FilterArgs {
            period: PeriodArgs {
                start: start.into(),
                end: end.into(),
            },
            users: users.map(Into::into),
            activity_type: kind.map(Into::into),
            yes: false,
            compare: false,
        }
    }

    #[test]
    fn user_ids_skip_blanks() {
        let ids = parse_user_ids(" 8860, ,1,");
        assert_eq!(ids, vec![UserId::from("8860"), UserId::from("1")]);
    }

    #[test]
    fn filter_from_args() {
        let filter = build_filter(&args("2024-03-01", "2024-03-31", Some("8860"), Some("2"))).unwrap();
        assert_eq!(filter.start_date, NaiveDate::from_ymd_opt(2024, 3, 1));
        assert!(filter.includes_user(&UserId::from("8860")));
        assert!(!filter.includes_user(&UserId::from("1")));
        assert!(filter.includes_type("2"));
        assert!(!filter.includes_type("4"));
    }

    #[test]
    fn bad_dates_are_validation_errors() {
        assert!(matches!(
            build_filter(&args("2024-13-01", "2024-03-31", None, None)),
            Err(RetrievalError::Validation(_))
        ));
        assert!(matches!(
            build_filter(&args("2024-03-31", "2024-03-01", None, None)),
            Err(RetrievalError::Validation(_))
        ));
    }
}
