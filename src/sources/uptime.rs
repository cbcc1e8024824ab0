//! UptimeRobot adapter.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use log::warn;
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;

use super::snapshot::{
    Incident, IncidentKind, ResponseTimeSample, SslCertificate, SslStatus, UptimeSnapshot,
    UptimeStatus, INCIDENT_LIMIT, RESPONSE_TIME_SAMPLES,
};
use super::{SourceError, UptimeSource};
use crate::config::MetricsConfig;
use crate::types::Clock;

pub const NO_MONITOR_MESSAGE: &str = "No monitor configured";
pub const FETCH_FAILED_MESSAGE: &str = "Failed to fetch uptime data";
pub const INVALID_RESPONSE_MESSAGE: &str = "Invalid response from UptimeRobot";

/// Log entry types reported by the monitor.
const LOG_TYPE_DOWN: i64 = 1;
const LOG_TYPE_UP: i64 = 2;

// ================================================================================================
// RAW RESPONSE
// ================================================================================================

#[derive(Debug, Deserialize)]
struct MonitorsResponse {
    stat: String,
    #[serde(default)]
    monitors: Vec<RawMonitor>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawMonitor {
    status: Option<i64>,
    custom_uptime_ratio: Option<String>,
    #[serde(default)]
    response_times: Vec<RawResponseTime>,
    ssl: Option<RawSsl>,
    #[serde(default)]
    logs: Vec<RawLog>,
}

#[derive(Debug, Deserialize)]
struct RawResponseTime {
    datetime: i64,
    value: f64,
}

#[derive(Debug, Deserialize)]
struct RawSsl {
    brand: Option<String>,
    expires: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct RawLog {
    #[serde(rename = "type")]
    kind: i64,
    datetime: i64,
    duration: Option<u64>,
    reason: Option<RawReason>,
}

#[derive(Debug, Deserialize)]
struct RawReason {
    detail: Option<Value>,
}

// ================================================================================================
// CLIENT
// ================================================================================================

/// HTTP client for the UptimeRobot `getMonitors` endpoint.
pub struct UptimeRobotClient {
    http: Client,
    api_url: String,
    api_key: Option<String>,
    clock: Arc<dyn Clock>,
}

impl UptimeRobotClient {
    pub fn new(config: &MetricsConfig, clock: Arc<dyn Clock>) -> Result<Self, reqwest::Error> {
        let http = Client::builder().timeout(config.uptime_timeout).build()?;
        Ok(Self {
            http,
            api_url: config.uptimerobot_url.clone(),
            api_key: config.uptimerobot_api_key.clone(),
            clock,
        })
    }

    async fn request(&self, monitor_id: &str) -> Result<RawMonitor, SourceError> {
        let api_key = self.api_key.as_deref().unwrap_or_default();
        let response = self
            .http
            .post(&self.api_url)
            .form(&[
                ("api_key", api_key),
                ("format", "json"),
                ("monitors", monitor_id),
                ("custom_uptime_ratios", "1-7-30-90"),
                ("response_times", "1"),
                ("response_times_limit", "24"),
                ("logs", "1"),
                ("logs_limit", "10"),
                ("ssl", "1"),
            ])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(SourceError::Status(status.as_u16()));
        }

        let body = response.text().await?;
        let parsed: MonitorsResponse =
            serde_json::from_str(&body).map_err(|e| SourceError::Malformed(e.to_string()))?;

        if parsed.stat != "ok" {
            return Err(SourceError::Malformed(format!("stat = {}", parsed.stat)));
        }

        parsed
            .monitors
            .into_iter()
            .next()
            .ok_or_else(|| SourceError::Malformed("no monitors in response".to_string()))
    }
}

#[async_trait]
impl UptimeSource for UptimeRobotClient {
    async fn fetch(&self, monitor_id: Option<&str>) -> UptimeSnapshot {
        let monitor_id = match monitor_id.map(str::trim).filter(|id| !id.is_empty()) {
            Some(id) => id,
            None => return UptimeSnapshot::unavailable(NO_MONITOR_MESSAGE),
        };

        match self.request(monitor_id).await {
            Ok(monitor) => normalize_monitor(monitor, self.clock.now()),
            Err(e) => {
                warn!("Uptime fetch for monitor {} failed: {}", monitor_id, e);
                let message = match e {
                    SourceError::Malformed(_) => INVALID_RESPONSE_MESSAGE,
                    SourceError::Transport(_) | SourceError::Status(_) => FETCH_FAILED_MESSAGE,
                };
                UptimeSnapshot::unavailable(message)
            }
        }
    }
}

// ================================================================================================
// NORMALIZATION
// ================================================================================================

/// Convert a raw monitor record into a snapshot, evaluated at `now`.
pub(crate) fn normalize_monitor(monitor: RawMonitor, now: DateTime<Utc>) -> UptimeSnapshot {
    let ratios = parse_uptime_ratios(monitor.custom_uptime_ratio.as_deref());

    let samples: Vec<&RawResponseTime> = monitor
        .response_times
        .iter()
        .take(RESPONSE_TIME_SAMPLES)
        .collect();
    let response_time_avg = if samples.is_empty() {
        0
    } else {
        let total: f64 = samples.iter().map(|rt| rt.value).sum();
        (total / samples.len() as f64).round().max(0.0) as u64
    };
    // Source lists newest first; the graph wants oldest first.
    let response_time_history = samples
        .iter()
        .rev()
        .filter_map(|rt| {
            unix_seconds(rt.datetime).map(|time| ResponseTimeSample {
                time,
                value: rt.value.max(0.0) as u64,
            })
        })
        .collect();

    let ssl = monitor
        .ssl
        .filter(|ssl| ssl.brand.is_some() || ssl.expires.is_some())
        .map(|ssl| normalize_ssl(ssl, now));

    let incidents = monitor
        .logs
        .iter()
        .take(INCIDENT_LIMIT)
        .filter_map(normalize_log)
        .collect();

    UptimeSnapshot {
        status: map_status(monitor.status),
        uptime_1d: ratios[0],
        uptime_7d: ratios[1],
        uptime_30d: ratios[2],
        uptime_90d: ratios[3],
        response_time_avg,
        response_time_history,
        ssl,
        incidents,
        last_check: Some(now),
        available: true,
        message: None,
    }
}

/// Monitor status codes: 0 paused, 1 not checked yet, 2 up, 8 seems down, 9 down.
pub fn map_status(code: Option<i64>) -> UptimeStatus {
    match code {
        Some(0) => UptimeStatus::Paused,
        Some(1) => UptimeStatus::Pending,
        Some(2) => UptimeStatus::Up,
        Some(8) | Some(9) => UptimeStatus::Down,
        _ => UptimeStatus::Unknown,
    }
}

/// Parse "1d-7d-30d-90d" ratios, e.g. "99.95-99.87-99.90-99.85".
pub fn parse_uptime_ratios(raw: Option<&str>) -> [f64; 4] {
    let mut ratios = [0.0; 4];
    if let Some(raw) = raw {
        for (slot, part) in ratios.iter_mut().zip(raw.split('-')) {
            *slot = part.trim().parse::<f64>().unwrap_or(0.0);
        }
    }
    ratios
}

fn normalize_ssl(ssl: RawSsl, now: DateTime<Utc>) -> SslCertificate {
    let expires = ssl.expires.as_ref().and_then(parse_expiry);
    let days_until_expiry = expires.map(|at| days_until(at, now));
    SslCertificate {
        issuer: ssl.brand.unwrap_or_else(|| "Unknown".to_string()),
        expires,
        days_until_expiry,
        status: SslStatus::from_days(days_until_expiry),
    }
}

/// Whole days remaining, rounded up.
pub fn days_until(expires: DateTime<Utc>, now: DateTime<Utc>) -> i64 {
    let secs = (expires - now).num_seconds() as f64;
    (secs / 86_400.0).ceil() as i64
}

/// Expiry arrives either as a unix timestamp or a date string.
fn parse_expiry(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::Number(n) => n.as_i64().and_then(unix_seconds),
        Value::String(s) => parse_date_string(s),
        _ => None,
    }
}

fn parse_date_string(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(secs) = raw.parse::<i64>() {
        return unix_seconds(secs);
    }
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }
    if let Ok(ts) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S") {
        return Some(Utc.from_utc_datetime(&ts));
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|ts| Utc.from_utc_datetime(&ts))
}

fn normalize_log(log: &RawLog) -> Option<Incident> {
    let kind = match log.kind {
        LOG_TYPE_DOWN => IncidentKind::Down,
        LOG_TYPE_UP => IncidentKind::Up,
        _ => return None,
    };
    let reason = log
        .reason
        .as_ref()
        .and_then(|r| r.detail.as_ref())
        .and_then(|detail| match detail {
            Value::Null => None,
            Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        });

    Some(Incident {
        kind,
        datetime: unix_seconds(log.datetime)?,
        duration_secs: log.duration,
        duration: log.duration.map(format_duration),
        reason,
    })
}

/// Human-readable duration: seconds, rounded minutes, then hours/days to one decimal.
pub fn format_duration(seconds: u64) -> String {
    let secs = seconds as f64;
    if seconds < 60 {
        format!("{}s", seconds)
    } else if seconds < 3_600 {
        format!("{}m", (secs / 60.0).round())
    } else if seconds < 86_400 {
        format!("{}h", round_to(secs / 3_600.0, 1))
    } else {
        format!("{}d", round_to(secs / 86_400.0, 1))
    }
}

fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

fn unix_seconds(secs: i64) -> Option<DateTime<Utc>> {
    Utc.timestamp_opt(secs, 0).single()
}
