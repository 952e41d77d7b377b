//! Raw CRM records → typed records.
//!
//! Normalization never fails as a whole: a record that cannot be typed is
//! set aside in [`Normalized::rejected`] with a reason and logged, and the
//! rest of the batch goes through.

use chrono_tz::Tz;
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::warn;

use crate::{
    models::{
        activity::{ActivityKind, ActivityRecord, RawActivity},
        deal::{DealRecord, RawDeal},
    },
    tz::{DstPolicy, parse_timestamp},
};

/// Shown when an activity carries neither a description nor a subject.
pub const EMPTY_DESCRIPTION: &str = "Без описания";

static LINE_BREAK: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)<br\s*/?>").expect("static regex"));
static TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]*>").expect("static regex"));
static HSPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^\S\n]+").expect("static regex"));
static BLANK_LINES: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s*\n\s*").expect("static regex"));

/// Turns CRM rich text into plain display text.
///
/// `<br>` variants become newlines, all other tags are dropped, the common
/// HTML entities are decoded, runs of spaces collapse to one space and runs
/// of line breaks to one newline. The result is trimmed.
pub fn sanitize_text(raw: &str) -> String {
    let text = LINE_BREAK.replace_all(raw, "\n");
    let text = TAG.replace_all(&text, "");
    let text = decode_entities(&text);
    let text = HSPACE.replace_all(&text, " ");
    let text = BLANK_LINES.replace_all(&text, "\n");
    text.trim().to_string()
}

fn decode_entities(s: &str) -> String {
    if !s.contains('&') {
        return s.to_string();
    }
    // &amp; last so "&amp;lt;" stays "&lt;"
    s.replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&amp;", "&")
}

/// A record left out of a normalized batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RejectedRecord {
    pub id: String,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Normalized<T> {
    pub records: Vec<T>,
    pub rejected: Vec<RejectedRecord>,
}

impl<T> Default for Normalized<T> {
    fn default() -> Self {
        Self {
            records: Vec::new(),
            rejected: Vec::new(),
        }
    }
}

impl<T> Normalized<T> {
    fn reject(&mut self, id: &str, reason: impl Into<String>) {
        let reason = reason.into();
        warn!(record_id = id, %reason, "Skipping CRM record");
        self.rejected.push(RejectedRecord {
            id: id.to_string(),
            reason,
        });
    }
}

/// Converts raw CRM payload records into [`ActivityRecord`]s and [`DealRecord`]s.
#[derive(Debug, Clone, Copy)]
pub struct RecordNormalizer {
    tz: Tz,
    policy: DstPolicy,
}

impl RecordNormalizer {
    /// `tz` is applied to timestamps that arrive without an offset.
    pub fn new(tz: Tz) -> Self {
        Self {
            tz,
            policy: DstPolicy::default(),
        }
    }

    pub fn with_policy(mut self, policy: DstPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn activities(&self, raw: &[RawActivity]) -> Normalized<ActivityRecord> {
        let mut out = Normalized::default();
        for item in raw {
            match self.activity(item) {
                Ok(record) => out.records.push(record),
                Err(reason) => out.reject(&item.id, reason),
            }
        }
        out
    }

    pub fn activity(&self, raw: &RawActivity) -> Result<ActivityRecord, String> {
        let created = raw.created.as_deref().ok_or("missing CREATED")?;
        let created_at = parse_timestamp(created, self.tz, self.policy)
            .ok_or_else(|| format!("unparseable CREATED {created:?}"))?;
        let owner_user_id = raw
            .author_id
            .clone()
            .filter(|id| !id.as_str().is_empty())
            .ok_or("missing AUTHOR_ID")?;

        let type_code = raw.type_id.clone().unwrap_or_default();
        let raw_text = [raw.description.as_deref(), raw.subject.as_deref()]
            .into_iter()
            .flatten()
            .find(|s| !s.trim().is_empty())
            .unwrap_or_default()
            .to_string();
        let mut description = sanitize_text(&raw_text);
        if description.is_empty() {
            description = EMPTY_DESCRIPTION.to_string();
        }

        Ok(ActivityRecord {
            id: raw.id.clone(),
            kind: ActivityKind::from_code(&type_code),
            type_code,
            created_at,
            owner_user_id,
            raw_text,
            description,
        })
    }

    pub fn deals(&self, raw: &[RawDeal]) -> Normalized<DealRecord> {
        let mut out = Normalized::default();
        for item in raw {
            match self.deal(item) {
                Ok(record) => out.records.push(record),
                Err(reason) => out.reject(&item.id, reason),
            }
        }
        out
    }

    pub fn deal(&self, raw: &RawDeal) -> Result<DealRecord, String> {
        if !raw.opportunity.is_finite() || raw.opportunity < 0.0 {
            return Err(format!("invalid OPPORTUNITY {}", raw.opportunity));
        }
        let stage_id = raw
            .stage_id
            .clone()
            .filter(|s| !s.is_empty())
            .ok_or("missing STAGE_ID")?;
        let stage_name = raw
            .stage_name
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .unwrap_or(&stage_id)
            .to_string();

        let ts = |v: &Option<String>| v.as_deref().and_then(|s| parse_timestamp(s, self.tz, self.policy));

        Ok(DealRecord {
            id: raw.id.clone(),
            title: raw.title.as_deref().map(sanitize_text).unwrap_or_default(),
            stage_id,
            stage_name,
            opportunity_value: raw.opportunity,
            assigned_user_id: raw.assigned_by_id.clone().filter(|id| !id.as_str().is_empty()),
            created_at: ts(&raw.date_create),
            modified_at: ts(&raw.date_modify),
        })
    }
}
