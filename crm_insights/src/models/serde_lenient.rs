//! Deserializers for CRM payload fields whose JSON type drifts between
//! endpoints (ids sent as numbers or strings, amounts sent as `"1500.00"`,
//! dates sent as `"2024-01-01 10:30"` or a placeholder word).

use chrono::NaiveDate;
use serde::{Deserialize, Deserializer, de};

#[derive(Deserialize)]
#[serde(untagged)]
enum StrOrNum {
    Str(String),
    Int(i64),
    Float(f64),
}

/// Accepts `"42"`, `42` or `42.0` and yields the textual form.
pub fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match StrOrNum::deserialize(deserializer)? {
        StrOrNum::Str(s) => s.trim().to_string(),
        StrOrNum::Int(i) => i.to_string(),
        StrOrNum::Float(f) => f.to_string(),
    })
}

/// Like [`string_or_number`] but tolerates `null` / absent fields.
pub fn opt_string_or_number<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<StrOrNum>::deserialize(deserializer)?.map(|v| match v {
        StrOrNum::Str(s) => s.trim().to_string(),
        StrOrNum::Int(i) => i.to_string(),
        StrOrNum::Float(f) => f.to_string(),
    }))
}

/// Monetary amount: number, numeric string, blank string or `null` (→ 0).
pub fn amount<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<StrOrNum>::deserialize(deserializer)? {
        None => Ok(0.0),
        Some(StrOrNum::Int(i)) => Ok(i as f64),
        Some(StrOrNum::Float(f)) => Ok(f),
        Some(StrOrNum::Str(s)) => {
            let s = s.trim().replace(' ', "").replace(',', ".");
            if s.is_empty() {
                return Ok(0.0);
            }
            s.parse::<f64>()
                .map_err(|_| de::Error::custom(format!("invalid amount: {s}")))
        }
    }
}

/// Calendar date from the leading `YYYY-MM-DD` of any string; placeholders
/// such as `"Нет данных"` become `None`.
pub fn lenient_date<'de, D>(deserializer: D) -> Result<Option<NaiveDate>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<String>::deserialize(deserializer)?;
    Ok(raw.and_then(|s| {
        let head = s.trim().get(..10)?;
        NaiveDate::parse_from_str(head, "%Y-%m-%d").ok()
    }))
}

/// Counter that may arrive as a number, numeric string or `null`.
pub fn count<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<StrOrNum>::deserialize(deserializer)? {
        None => Ok(0),
        Some(StrOrNum::Int(i)) if i >= 0 => Ok(i as u64),
        Some(StrOrNum::Float(f)) if f >= 0.0 && f.fract() == 0.0 => Ok(f as u64),
        Some(StrOrNum::Str(s)) => s
            .trim()
            .parse::<u64>()
            .map_err(|_| de::Error::custom(format!("invalid counter: {s}"))),
        Some(_) => Err(de::Error::custom("counter must be a non-negative integer")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Deserialize)]
    struct Probe {
        #[serde(deserialize_with = "string_or_number")]
        id: String,
        #[serde(default, deserialize_with = "amount")]
        value: f64,
        #[serde(default, deserialize_with = "lenient_date")]
        date: Option<NaiveDate>,
        #[serde(default, deserialize_with = "count")]
        n: u64,
    }

    #[test]
    fn accepts_drifting_shapes() {
        let a: Probe =
            serde_json::from_str(r#"{"id": 8860, "value": "1 500,50", "date": "2024-01-03 10:30", "n": "4"}"#)
                .unwrap();
        assert_eq!(a.id, "8860");
        assert!((a.value - 1500.5).abs() < 1e-9);
        assert_eq!(a.date, NaiveDate::from_ymd_opt(2024, 1, 3));
        assert_eq!(a.n, 4);

        let b: Probe =
            serde_json::from_str(r#"{"id": " 12 ", "value": null, "date": "Нет данных", "n": null}"#).unwrap();
        assert_eq!(b.id, "12");
        assert_eq!(b.value, 0.0);
        assert_eq!(b.date, None);
        assert_eq!(b.n, 0);
    }

    #[test]
    fn rejects_garbage_amounts_and_negative_counts() {
        assert!(serde_json::from_str::<Probe>(r#"{"id": 1, "value": "abc"}"#).is_err());
        assert!(serde_json::from_str::<Probe>(r#"{"id": 1, "n": -3}"#).is_err());
    }
}
