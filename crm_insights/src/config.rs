//! Client configuration: TOML file plus environment overrides.
//!
//! Every key has a default, so an empty file (or no file) is a valid
//! configuration pointing at a local dashboard backend:
//!
//! ```toml
//! base_url = "https://crm-insights.example.com"
//! timezone = "Europe/Moscow"
//! token_store = "~/.config/crm_insights/session.json"
//!
//! [tiers]
//! instant_cache_ms = 3000
//! degraded_cache_ms = 5000
//!
//! [progressive]
//! poll_interval_ms = 2000
//! max_polls = 90
//!
//! [deals]
//! limit = 500
//! ```
//!
//! Entrypoints:
//! - Parse from a TOML string: [`load_config_str`]
//! - Parse from a file path, then apply `CRM_INSIGHTS_*` overrides: [`load_config_path`]

use std::{fs, path::{Path, PathBuf}, time::Duration};

use chrono_tz::Tz;
use reqwest::Url;
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use shared_utils::env::get_env_var_opt;
use thiserror::Error;

pub const ENV_BASE_URL: &str = "CRM_INSIGHTS_BASE_URL";
pub const ENV_TOKEN: &str = "CRM_INSIGHTS_TOKEN";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Could not read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Unknown time zone: {0}")]
    TimeZone(String),

    #[error("Invalid value for {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields, default)]
pub struct ClientConfig {
    /// Root of the dashboard backend API.
    pub base_url: String,
    /// IANA zone for timestamps the CRM sends without an offset.
    pub timezone: String,
    /// JSON file holding the session token. `None` keeps it in memory only.
    pub token_store: Option<PathBuf>,
    pub tiers: TierBudgets,
    pub progressive: ProgressiveSettings,
    pub deals: DealsSettings,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8000".to_string(),
            timezone: "Europe/Moscow".to_string(),
            token_store: None,
            tiers: TierBudgets::default(),
            progressive: ProgressiveSettings::default(),
            deals: DealsSettings::default(),
        }
    }
}

/// Fixed budgets of the two cache tiers. The live-fetch budget is derived
/// from the period length instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields, default)]
pub struct TierBudgets {
    pub instant_cache_ms: u64,
    pub degraded_cache_ms: u64,
}

impl Default for TierBudgets {
    fn default() -> Self {
        Self {
            instant_cache_ms: 3_000,
            degraded_cache_ms: 5_000,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields, default)]
pub struct ProgressiveSettings {
    pub poll_interval_ms: u64,
    pub max_polls: u32,
}

impl Default for ProgressiveSettings {
    fn default() -> Self {
        Self {
            poll_interval_ms: 2_000,
            max_polls: 90,
        }
    }
}

impl ProgressiveSettings {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Longest a job may run before it counts as timed out.
    pub fn total_budget_ms(&self) -> u64 {
        self.poll_interval_ms.saturating_mul(u64::from(self.max_polls))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields, default)]
pub struct DealsSettings {
    /// Upper bound on deals per request.
    pub limit: u32,
}

impl Default for DealsSettings {
    fn default() -> Self {
        Self { limit: 500 }
    }
}

impl ClientConfig {
    pub fn tz(&self) -> Result<Tz, ConfigError> {
        self.timezone
            .trim()
            .parse()
            .map_err(|_| ConfigError::TimeZone(self.timezone.clone()))
    }

    /// Layers `CRM_INSIGHTS_BASE_URL` over the file value.
    pub fn apply_env_overrides(&mut self) {
        if let Some(url) = get_env_var_opt(ENV_BASE_URL) {
            self.base_url = url.trim().to_string();
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let url = Url::parse(&self.base_url).map_err(|e| ConfigError::Invalid {
            field: "base_url",
            reason: e.to_string(),
        })?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(ConfigError::Invalid {
                field: "base_url",
                reason: format!("unsupported scheme {}", url.scheme()),
            });
        }
        self.tz()?;
        let positive = [
            ("tiers.instant_cache_ms", self.tiers.instant_cache_ms),
            ("tiers.degraded_cache_ms", self.tiers.degraded_cache_ms),
            ("progressive.poll_interval_ms", self.progressive.poll_interval_ms),
            ("progressive.max_polls", u64::from(self.progressive.max_polls)),
            ("deals.limit", u64::from(self.deals.limit)),
        ];
        if let Some(&(field, _)) = positive.iter().find(|(_, v)| *v == 0) {
            return Err(ConfigError::Invalid {
                field,
                reason: "must be greater than zero".to_string(),
            });
        }
        Ok(())
    }
}

/// Session token supplied through `CRM_INSIGHTS_TOKEN`, if any.
pub fn token_from_env() -> Option<SecretString> {
    get_env_var_opt(ENV_TOKEN).map(|t| SecretString::new(t.trim().into()))
}

/// Parses and validates a TOML document. No environment overrides.
pub fn load_config_str(toml_str: &str) -> Result<ClientConfig, ConfigError> {
    let config: ClientConfig = toml::from_str(toml_str)?;
    config.validate()?;
    Ok(config)
}

/// Reads `path`, applies environment overrides and validates the result.
pub fn load_config_path(path: impl AsRef<Path>) -> Result<ClientConfig, ConfigError> {
    let path = path.as_ref();
    let text = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let mut config: ClientConfig = toml::from_str(&text)?;
    config.apply_env_overrides();
    config.validate()?;
    Ok(config)
}
