use std::time::Duration;

use chrono::{FixedOffset, NaiveDate, Offset, Utc};
use serde::Deserialize;
use uuid::Uuid;

use crate::aggregator::TimelinePolicy;

const MAX_OFFSET_MINUTES: i32 = 14 * 60;

#[derive(Debug, Clone, Deserialize)]
struct RawSettings {
    #[serde(rename = "REDIS_URL")]
    redis_url: String,
    #[serde(rename = "INSTANCE_ID")]
    instance_id: Option<String>,
    #[serde(rename = "HTTP_PORT", default = "default_http_port")]
    http_port: u16,
    #[serde(rename = "PROMETHEUS_PORT", default = "default_prometheus_port")]
    prometheus_port: u16,
    #[serde(rename = "LOG_LEVEL", default = "default_log_level")]
    log_level: String,
    #[serde(rename = "LOG_FORMAT", default = "default_log_format")]
    log_format: String,
    #[serde(rename = "CACHE_KEY", default = "default_cache_key")]
    cache_key: String,
    #[serde(rename = "BACKEND_PREFIX", default = "default_backend_prefix")]
    backend_prefix: String,
    #[serde(rename = "EXTERNAL_DATA_URL")]
    external_data_url: Option<String>,
    #[serde(rename = "EXTERNAL_DATA_TOKEN")]
    external_data_token: Option<String>,
    #[serde(rename = "EXTERNAL_TIMEOUT_SEC", default = "default_external_timeout")]
    external_timeout_sec: u64,
    #[serde(rename = "CACHE_POLL_INTERVAL_SEC", default = "default_cache_poll_interval")]
    cache_poll_interval_sec: u64,
    #[serde(rename = "REPORT_UTC_OFFSET_MINUTES", default)]
    report_utc_offset_minutes: i32,
    #[serde(rename = "TIMELINE_START_DATE")]
    timeline_start_date: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Pretty,
    Json,
}

#[derive(Debug, Clone)]
pub struct Settings {
    pub redis_url: String,
    pub instance_id: String,
    pub http_port: u16,
    pub prometheus_port: u16,
    pub log_level: String,
    pub log_format: LogFormat,
    pub cache_key: String,
    pub backend_prefix: String,
    pub external_data_url: Option<String>,
    pub external_data_token: Option<String>,
    pub external_timeout: Duration,
    pub cache_poll_interval: Duration,
    pub report_offset: FixedOffset,
    pub timeline_policy: TimelinePolicy,
    /// Unparseable `TIMELINE_START_DATE`, reported once logging is up.
    pub invalid_timeline_start: Option<String>,
}

impl Settings {
    pub fn from_env() -> Result<Self, envy::Error> {
        let raw: RawSettings = envy::from_env()?;
        Ok(Self::from_raw(raw))
    }

    fn from_raw(raw: RawSettings) -> Self {
        let instance_id = raw
            .instance_id
            .filter(|id| !id.trim().is_empty())
            .unwrap_or_else(|| format!("insights-{}", Uuid::new_v4()))
            .to_lowercase();

        let log_format = match raw.log_format.to_ascii_lowercase().as_str() {
            "json" => LogFormat::Json,
            _ => LogFormat::Pretty,
        };

        let (timeline_policy, invalid_timeline_start) =
            match parse_timeline_policy(raw.timeline_start_date.as_deref()) {
                Ok(policy) => (policy, None),
                Err(value) => (TimelinePolicy::Sparse, Some(value)),
            };

        let offset_minutes = raw
            .report_utc_offset_minutes
            .clamp(-MAX_OFFSET_MINUTES, MAX_OFFSET_MINUTES);
        let report_offset = FixedOffset::east_opt(offset_minutes * 60).unwrap_or(Utc.fix());

        Self {
            redis_url: raw.redis_url,
            instance_id,
            http_port: raw.http_port,
            prometheus_port: raw.prometheus_port,
            log_level: raw.log_level.to_ascii_lowercase(),
            log_format,
            cache_key: raw.cache_key,
            backend_prefix: raw.backend_prefix,
            external_data_url: raw.external_data_url.filter(|s| !s.trim().is_empty()),
            external_data_token: raw.external_data_token.filter(|s| !s.trim().is_empty()),
            external_timeout: Duration::from_secs(raw.external_timeout_sec.max(1)),
            cache_poll_interval: Duration::from_secs(raw.cache_poll_interval_sec.max(1)),
            report_offset,
            timeline_policy,
            invalid_timeline_start,
        }
    }
}

fn parse_timeline_policy(start: Option<&str>) -> Result<TimelinePolicy, String> {
    let Some(start) = start.map(str::trim).filter(|s| !s.is_empty()) else {
        return Ok(TimelinePolicy::Sparse);
    };
    NaiveDate::parse_from_str(start, "%Y-%m-%d")
        .map(|start| TimelinePolicy::GapFilled { start })
        .map_err(|_| start.to_string())
}

fn default_http_port() -> u16 {
    8000
}

fn default_prometheus_port() -> u16 {
    8001
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

fn default_cache_key() -> String {
    "chatAnalytics".to_string()
}

fn default_backend_prefix() -> String {
    "chat_interactions".to_string()
}

fn default_external_timeout() -> u64 {
    10
}

fn default_cache_poll_interval() -> u64 {
    5
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw() -> RawSettings {
        serde_json::from_value(serde_json::json!({ "REDIS_URL": "redis://localhost:6379" })).unwrap()
    }

    #[test]
    fn defaults_apply_when_unset() {
        let settings = Settings::from_raw(raw());
        assert_eq!(settings.http_port, 8000);
        assert_eq!(settings.prometheus_port, 8001);
        assert_eq!(settings.cache_key, "chatAnalytics");
        assert_eq!(settings.backend_prefix, "chat_interactions");
        assert_eq!(settings.log_format, LogFormat::Pretty);
        assert_eq!(settings.cache_poll_interval, Duration::from_secs(5));
        assert_eq!(settings.report_offset.local_minus_utc(), 0);
        assert_eq!(settings.timeline_policy, TimelinePolicy::Sparse);
        assert!(settings.instance_id.starts_with("insights-"));
        assert!(settings.external_data_url.is_none());
        assert!(settings.invalid_timeline_start.is_none());
    }

    #[test]
    fn values_are_normalised() {
        let mut raw = raw();
        raw.instance_id = Some("  ".into());
        raw.log_format = "JSON".into();
        raw.external_data_url = Some(" ".into());
        raw.cache_poll_interval_sec = 0;
        raw.report_utc_offset_minutes = 120;
        raw.timeline_start_date = Some("2025-07-01".into());

        let settings = Settings::from_raw(raw);
        assert!(settings.instance_id.starts_with("insights-"));
        assert_eq!(settings.log_format, LogFormat::Json);
        assert!(settings.external_data_url.is_none());
        assert_eq!(settings.cache_poll_interval, Duration::from_secs(1));
        assert_eq!(settings.report_offset.local_minus_utc(), 7200);
        assert_eq!(
            settings.timeline_policy,
            TimelinePolicy::GapFilled {
                start: NaiveDate::from_ymd_opt(2025, 7, 1).unwrap()
            }
        );
    }

    #[test]
    fn invalid_timeline_start_falls_back_to_sparse() {
        assert_eq!(parse_timeline_policy(Some("")), Ok(TimelinePolicy::Sparse));

        let mut raw = raw();
        raw.timeline_start_date = Some(" July 1st ".into());
        let settings = Settings::from_raw(raw);
        assert_eq!(settings.timeline_policy, TimelinePolicy::Sparse);
        assert_eq!(settings.invalid_timeline_start.as_deref(), Some("July 1st"));
    }
}
