//! Configuration management
//!
//! Settings live in settings.json in the data directory:
//! ```json
//! {
//!   "session": { "ttlHours": 336, "sliding": true },
//!   "password": { "timeCost": 3, "memoryCost": 65536, "parallelism": 4, "hashLen": 32 },
//!   "dashboard": { "recentLimit": 5 }
//! }
//! ```
//! Keys this crate doesn't manage are preserved on save.

use std::collections::HashMap;
use std::path::Path;

use anyhow::{Context, Result};
use chrono::Duration;
use serde::{Deserialize, Serialize};

use crate::domain::Argon2Params;
use crate::services::DEFAULT_RECENT_LIMIT;

/// Two weeks
pub const DEFAULT_SESSION_TTL_HOURS: i64 = 336;

/// Ten years
pub const MAX_SESSION_TTL_HOURS: i64 = 87_600;

const SETTINGS_FILE: &str = "settings.json";

/// Raw settings.json structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SettingsFile {
    #[serde(default)]
    session: SessionSettings,
    #[serde(default)]
    password: Argon2Params,
    #[serde(default)]
    dashboard: DashboardSettings,
    #[serde(flatten)]
    other: HashMap<String, serde_json::Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SessionSettings {
    #[serde(default = "default_ttl_hours")]
    ttl_hours: i64,
    #[serde(default = "default_true")]
    sliding: bool,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            ttl_hours: DEFAULT_SESSION_TTL_HOURS,
            sliding: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DashboardSettings {
    #[serde(default = "default_recent_limit")]
    recent_limit: usize,
}

impl Default for DashboardSettings {
    fn default() -> Self {
        Self {
            recent_limit: DEFAULT_RECENT_LIMIT,
        }
    }
}

fn default_ttl_hours() -> i64 {
    DEFAULT_SESSION_TTL_HOURS
}

fn default_true() -> bool {
    true
}

fn default_recent_limit() -> usize {
    DEFAULT_RECENT_LIMIT
}

/// Tally configuration (typed view of settings.json)
#[derive(Debug, Clone)]
pub struct Config {
    pub session_ttl: Duration,
    pub sliding_sessions: bool,
    pub password_params: Argon2Params,
    pub recent_limit: usize,
    // Keep the raw settings for preservation when saving
    _raw_settings: SettingsFile,
}

impl Default for Config {
    fn default() -> Self {
        let raw = SettingsFile::default();
        Self {
            session_ttl: Duration::hours(DEFAULT_SESSION_TTL_HOURS),
            sliding_sessions: raw.session.sliding,
            password_params: raw.password.clone(),
            recent_limit: raw.dashboard.recent_limit,
            _raw_settings: raw,
        }
    }
}

/// Session lifetime from a whole number of hours, within
/// `1..=MAX_SESSION_TTL_HOURS`
fn session_ttl(hours: i64) -> Result<Duration> {
    if !(1..=MAX_SESSION_TTL_HOURS).contains(&hours) {
        anyhow::bail!(
            "Session lifetime must be between 1 and {} hours, got {}",
            MAX_SESSION_TTL_HOURS,
            hours
        );
    }
    Duration::try_hours(hours).context("Session lifetime out of range")
}

impl Config {
    fn from_settings(raw: SettingsFile) -> Result<Self> {
        Ok(Self {
            session_ttl: session_ttl(raw.session.ttl_hours)?,
            sliding_sessions: raw.session.sliding,
            password_params: raw.password.clone(),
            recent_limit: raw.dashboard.recent_limit,
            _raw_settings: raw,
        })
    }

    /// Load config from the data directory
    ///
    /// A missing file means defaults; a malformed one is an error. Two
    /// environment variables override the file:
    /// `TALLY_SESSION_TTL_HOURS` and `TALLY_SLIDING_SESSIONS`.
    pub fn load(data_dir: &Path) -> Result<Self> {
        let settings_path = data_dir.join(SETTINGS_FILE);

        let raw: SettingsFile = if settings_path.exists() {
            let content = std::fs::read_to_string(&settings_path)
                .with_context(|| format!("Failed to read {}", settings_path.display()))?;
            serde_json::from_str(&content)
                .with_context(|| format!("Invalid settings in {}", settings_path.display()))?
        } else {
            SettingsFile::default()
        };

        let mut config = Self::from_settings(raw)
            .with_context(|| format!("Invalid settings in {}", settings_path.display()))?;

        if let Ok(value) = std::env::var("TALLY_SESSION_TTL_HOURS") {
            let hours: i64 = value
                .trim()
                .parse()
                .with_context(|| format!("TALLY_SESSION_TTL_HOURS is not a number: {}", value))?;
            config.session_ttl =
                session_ttl(hours).context("Invalid TALLY_SESSION_TTL_HOURS")?;
        }

        match std::env::var("TALLY_SLIDING_SESSIONS").ok().as_deref() {
            Some("true" | "1" | "yes" | "TRUE" | "YES") => config.sliding_sessions = true,
            Some("false" | "0" | "no" | "FALSE" | "NO") => config.sliding_sessions = false,
            _ => {}
        }

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.session_ttl <= Duration::zero()
            || self.session_ttl > Duration::hours(MAX_SESSION_TTL_HOURS)
        {
            anyhow::bail!(
                "Session lifetime must be between 1 and {} hours",
                MAX_SESSION_TTL_HOURS
            );
        }
        if self.recent_limit == 0 {
            anyhow::bail!("dashboard.recentLimit must be at least 1");
        }
        Ok(())
    }

    /// Save config to the data directory
    ///
    /// Preserves other settings that this crate doesn't manage.
    pub fn save(&self, data_dir: &Path) -> Result<()> {
        let settings_path = data_dir.join(SETTINGS_FILE);

        let mut settings = self._raw_settings.clone();
        settings.session.ttl_hours = self.session_ttl.num_hours();
        settings.session.sliding = self.sliding_sessions;
        settings.password = self.password_params.clone();
        settings.dashboard.recent_limit = self.recent_limit;

        let content = serde_json::to_string_pretty(&settings)?;
        std::fs::write(&settings_path, content)?;
        Ok(())
    }
}
