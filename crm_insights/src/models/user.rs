//! CRM user identity and the id → display-name directory.

use std::{cmp::Ordering, collections::HashMap, fmt};

use serde::{Deserialize, Deserializer, Serialize};

/// A CRM user id.
///
/// The CRM sends ids both as JSON strings and numbers; both deserialize to
/// the same textual id. Ordering is numeric for numeric ids (so `"8860"`
/// sorts before `"17087"`), and numeric ids sort before non-numeric ones.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct UserId(String);

impl UserId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into().trim().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    fn numeric(&self) -> Option<u64> {
        self.0.parse().ok()
    }
}

impl Ord for UserId {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self.numeric(), other.numeric()) {
            (Some(a), Some(b)) => a.cmp(&b).then_with(|| self.0.cmp(&other.0)),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => self.0.cmp(&other.0),
        }
    }
}

impl PartialOrd for UserId {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for UserId {
    fn from(value: &str) -> Self {
        UserId::new(value)
    }
}

impl From<String> for UserId {
    fn from(value: String) -> Self {
        UserId::new(value)
    }
}

impl<'de> Deserialize<'de> for UserId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Text(String),
            Number(u64),
        }
        Ok(match Raw::deserialize(deserializer)? {
            Raw::Text(s) => UserId::new(s),
            Raw::Number(n) => UserId::new(n.to_string()),
        })
    }
}

/// A user as listed by the CRM (`ID`, `NAME`, `LAST_NAME`).
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CrmUser {
    #[serde(rename = "ID")]
    pub id: UserId,
    #[serde(rename = "NAME", default)]
    pub name: Option<String>,
    #[serde(rename = "LAST_NAME", default)]
    pub last_name: Option<String>,
}

impl CrmUser {
    pub fn full_name(&self) -> String {
        let first = self.name.as_deref().unwrap_or("").trim();
        let last = self.last_name.as_deref().unwrap_or("").trim();
        format!("{first} {last}").trim().to_string()
    }
}

/// Maps user ids to display names for rollups and comparison labels.
#[derive(Debug, Clone, Default)]
pub struct UserDirectory {
    names: HashMap<UserId, String>,
}

impl UserDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_users(users: impl IntoIterator<Item = CrmUser>) -> Self {
        let mut dir = Self::new();
        for user in users {
            let name = user.full_name();
            dir.insert(user.id, name);
        }
        dir
    }

    /// Blank names are ignored so the id fallback stays visible.
    pub fn insert(&mut self, id: UserId, name: impl Into<String>) {
        let name = name.into();
        if !name.trim().is_empty() {
            self.names.insert(id, name);
        }
    }

    pub fn name(&self, id: &UserId) -> Option<&str> {
        self.names.get(id).map(String::as_str)
    }

    /// Name to show for `id`; unknown users render as `ID: <id>`.
    pub fn display_name(&self, id: &UserId) -> String {
        self.name(id)
            .map(str::to_string)
            .unwrap_or_else(|| format!("ID: {id}"))
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}
