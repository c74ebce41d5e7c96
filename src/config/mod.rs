//! Configuration loaded from the environment (and `.env`) via figment.

use anyhow::Context;
use chrono_tz::Tz;
use figment::{Figment, providers::Env};
use fundu::{DurationParser, TimeUnit};
use serde::{Deserialize, Deserializer};
use std::path::PathBuf;
use std::time::Duration;

#[derive(custom_debug_derive::Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default = "default_port")]
    pub port: u16,

    /// Portal subdomain, i.e. `<ps_base>.powerschool.com`.
    #[serde(rename = "ps_base", default = "default_portal_subdomain")]
    pub portal_subdomain: String,
    /// Guardian portal (`/public`, `/guardian`) instead of the staff portal (`/teachers`).
    #[serde(rename = "ps_guardian", default)]
    pub guardian: bool,
    /// Full origin overriding the hosted `powerschool.com` tenant, for self-hosted portals.
    #[serde(rename = "ps_origin", default, deserialize_with = "deserialize_non_empty")]
    pub portal_origin: Option<String>,
    /// Faculty resource number used for the schedule matrix when callers don't pass one.
    #[serde(rename = "ps_frn", default = "default_faculty_resource_id")]
    pub faculty_resource_id: String,
    #[serde(rename = "ps_username", default, deserialize_with = "deserialize_non_empty")]
    pub default_username: Option<String>,
    #[serde(rename = "ps_password", default, deserialize_with = "deserialize_non_empty")]
    #[debug(with = "crate::fmt::redacted_opt")]
    pub default_password: Option<String>,

    #[serde(default)]
    pub calendar_source: CalendarSource,
    /// Base URL of the upcoming-events feed, or the calendar page itself for `html`.
    #[serde(default = "default_calendar_url")]
    pub calendar_url: String,
    /// Timezone the school operates in; decides what "today" is.
    #[serde(default = "default_timezone", deserialize_with = "deserialize_timezone")]
    pub timezone: Tz,

    #[serde(default = "default_renewal_interval", deserialize_with = "deserialize_duration")]
    pub renewal_interval: Duration,
    #[serde(default = "default_navigation_timeout", deserialize_with = "deserialize_duration")]
    pub navigation_timeout: Duration,
    #[serde(default = "default_shutdown_timeout", deserialize_with = "deserialize_duration")]
    pub shutdown_timeout: Duration,
    /// Maximum number of client identities kept warm at once.
    #[serde(default = "default_identity_capacity")]
    pub identity_capacity: usize,

    #[serde(default)]
    pub chrome_executable: Option<PathBuf>,
    #[serde(default = "default_schedule_output_path")]
    pub schedule_output_path: PathBuf,
}

/// Where the day-type events come from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CalendarSource {
    /// JSON `upcoming-events` feed service.
    #[default]
    Feed,
    /// The school's public calendar page, parsed directly.
    Html,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn load() -> anyhow::Result<Self> {
        Self::from_figment(Figment::new().merge(Env::raw()))
    }

    pub fn from_figment(figment: Figment) -> anyhow::Result<Self> {
        figment.extract().context("Failed to load config")
    }

    /// Default credentials for unattended operation, if both halves are configured.
    pub fn default_credentials(&self) -> Option<(String, String)> {
        match (&self.default_username, &self.default_password) {
            (Some(user), Some(pass)) => Some((user.clone(), pass.clone())),
            _ => None,
        }
    }
}

fn default_log_level() -> String {
    "info".to_owned()
}

fn default_port() -> u16 {
    8080
}

fn default_portal_subdomain() -> String {
    "holyghostprep".to_owned()
}

fn default_faculty_resource_id() -> String {
    "0052052".to_owned()
}

fn default_calendar_url() -> String {
    "http://localhost:8000".to_owned()
}

fn default_timezone() -> Tz {
    chrono_tz::America::New_York
}

fn default_renewal_interval() -> Duration {
    Duration::from_secs(5 * 60)
}

fn default_navigation_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_shutdown_timeout() -> Duration {
    Duration::from_secs(8)
}

fn default_identity_capacity() -> usize {
    256
}

fn default_schedule_output_path() -> PathBuf {
    PathBuf::from("./schedule.json")
}

/// Parse a human duration such as `5m`, `30s`, `1500ms` or a bare number of seconds.
pub fn parse_duration(input: &str) -> Result<Duration, String> {
    let parser = DurationParser::with_time_units(&[
        TimeUnit::MilliSecond,
        TimeUnit::Second,
        TimeUnit::Minute,
        TimeUnit::Hour,
        TimeUnit::Day,
    ]);

    let parsed = parser
        .parse(input.trim())
        .map_err(|e| format!("invalid duration '{input}': {e}"))?;
    Duration::try_from(parsed).map_err(|e| format!("invalid duration '{input}': {e}"))
}

fn deserialize_duration<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Seconds(u64),
        Text(String),
    }

    match Raw::deserialize(deserializer)? {
        Raw::Seconds(secs) => Ok(Duration::from_secs(secs)),
        Raw::Text(text) => parse_duration(&text).map_err(serde::de::Error::custom),
    }
}

fn deserialize_timezone<'de, D>(deserializer: D) -> Result<Tz, D::Error>
where
    D: Deserializer<'de>,
{
    let name = String::deserialize(deserializer)?;
    name.parse::<Tz>()
        .map_err(|e| serde::de::Error::custom(format!("unknown timezone '{name}': {e}")))
}

fn deserialize_non_empty<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<String>::deserialize(deserializer)?;
    Ok(value.filter(|s| !s.trim().is_empty()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use figment::providers::Serialized;

    fn config_from(pairs: &[(&str, &str)]) -> anyhow::Result<Config> {
        let mut figment = Figment::new();
        for (key, value) in pairs {
            figment = figment.merge(Serialized::default(key, value));
        }
        Config::from_figment(figment)
    }

    #[test]
    fn test_defaults() {
        let config = config_from(&[]).unwrap();
        assert_eq!(config.portal_subdomain, "holyghostprep");
        assert!(!config.guardian);
        assert_eq!(config.renewal_interval, Duration::from_secs(300));
        assert_eq!(config.calendar_source, CalendarSource::Feed);
        assert_eq!(config.timezone, chrono_tz::America::New_York);
        assert!(config.default_credentials().is_none());
    }

    #[test]
    fn test_parse_duration_units() {
        assert_eq!(parse_duration("5m"), Ok(Duration::from_secs(300)));
        assert_eq!(parse_duration("30s"), Ok(Duration::from_secs(30)));
        assert_eq!(parse_duration("1500ms"), Ok(Duration::from_millis(1500)));
        assert_eq!(parse_duration("90"), Ok(Duration::from_secs(90)));
        assert!(parse_duration("soon").is_err());
    }

    #[test]
    fn test_overrides() {
        let config = config_from(&[
            ("renewal_interval", "90s"),
            ("timezone", "America/Chicago"),
            ("calendar_source", "html"),
            ("ps_username", "student"),
            ("ps_password", "secret"),
        ])
        .unwrap();
        assert_eq!(config.renewal_interval, Duration::from_secs(90));
        assert_eq!(config.timezone, chrono_tz::America::Chicago);
        assert_eq!(config.calendar_source, CalendarSource::Html);
        assert_eq!(
            config.default_credentials(),
            Some(("student".to_owned(), "secret".to_owned()))
        );
    }

    #[test]
    fn test_blank_password_is_unset() {
        let config = config_from(&[("ps_username", "student"), ("ps_password", "  ")]).unwrap();
        assert!(config.default_credentials().is_none());
    }

    #[test]
    fn test_bad_timezone_rejected() {
        assert!(config_from(&[("timezone", "Mars/Olympus")]).is_err());
    }
}
