//! Normalized snapshots produced by the metric sources.
//!
//! These are the payloads stored in the metric cache and returned to the
//! dashboard. Each source validates its raw response into one of these
//! shapes at the adapter boundary.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::types::MetricKind;

/// Most recent response-time samples kept per uptime snapshot.
pub const RESPONSE_TIME_SAMPLES: usize = 24;

/// Most recent monitor log entries considered for incidents.
pub const INCIDENT_LIMIT: usize = 10;

// ================================================================================================
// UPTIME
// ================================================================================================

/// Monitor state reported by the uptime source.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UptimeStatus {
    Up,
    Down,
    Paused,
    Pending,
    Unknown,
}

/// Certificate health derived from days until expiry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SslStatus {
    Valid,
    Warning,
    Critical,
    Expired,
    Unknown,
}

impl SslStatus {
    /// Bucket days-until-expiry at the 0/7/30 day thresholds.
    pub fn from_days(days: Option<i64>) -> Self {
        match days {
            None => SslStatus::Unknown,
            Some(d) if d <= 0 => SslStatus::Expired,
            Some(d) if d <= 7 => SslStatus::Critical,
            Some(d) if d <= 30 => SslStatus::Warning,
            Some(_) => SslStatus::Valid,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SslCertificate {
    pub issuer: String,
    pub expires: Option<DateTime<Utc>>,
    pub days_until_expiry: Option<i64>,
    pub status: SslStatus,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IncidentKind {
    Up,
    Down,
}

/// An up/down transition from the monitor log.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Incident {
    #[serde(rename = "type")]
    pub kind: IncidentKind,
    pub datetime: DateTime<Utc>,
    pub duration_secs: Option<u64>,
    /// Human-readable duration, e.g. "45s", "12m", "1.5h", "2d"
    pub duration: Option<String>,
    pub reason: Option<String>,
}

/// One response-time measurement.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ResponseTimeSample {
    pub time: DateTime<Utc>,
    /// Milliseconds
    pub value: u64,
}

/// Uptime, response time, SSL and incident data for one monitor.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct UptimeSnapshot {
    pub status: UptimeStatus,
    pub uptime_1d: f64,
    pub uptime_7d: f64,
    pub uptime_30d: f64,
    pub uptime_90d: f64,
    /// Mean of the recent samples, milliseconds
    pub response_time_avg: u64,
    /// Oldest first
    pub response_time_history: Vec<ResponseTimeSample>,
    pub ssl: Option<SslCertificate>,
    /// Source order (most recent first)
    pub incidents: Vec<Incident>,
    pub last_check: Option<DateTime<Utc>>,
    pub available: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl UptimeSnapshot {
    /// Zeroed placeholder carrying a diagnostic message.
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self {
            status: UptimeStatus::Unknown,
            uptime_1d: 0.0,
            uptime_7d: 0.0,
            uptime_30d: 0.0,
            uptime_90d: 0.0,
            response_time_avg: 0,
            response_time_history: Vec::new(),
            ssl: None,
            incidents: Vec::new(),
            last_check: None,
            available: false,
            message: Some(message.into()),
        }
    }
}

// ================================================================================================
// PERFORMANCE
// ================================================================================================

/// Device profile used by the performance analyzer.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Strategy {
    #[default]
    Mobile,
    Desktop,
}

impl Strategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Strategy::Mobile => "mobile",
            Strategy::Desktop => "desktop",
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Strategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "mobile" => Ok(Strategy::Mobile),
            "desktop" => Ok(Strategy::Desktop),
            other => Err(format!("Unknown strategy: {}", other)),
        }
    }
}

/// Lighthouse-style timings. Time metrics are seconds once normalized; CLS is unitless.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct CoreWebVitals {
    /// First contentful paint
    pub fcp: f64,
    /// Largest contentful paint
    pub lcp: f64,
    /// Cumulative layout shift
    pub cls: f64,
    /// Total blocking time
    pub tbt: f64,
    /// Speed index
    pub si: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PerformanceSnapshot {
    /// 0-100
    pub score: u8,
    pub metrics: CoreWebVitals,
    pub strategy: Strategy,
    pub available: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl PerformanceSnapshot {
    /// Zeroed placeholder carrying a diagnostic message.
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self {
            score: 0,
            metrics: CoreWebVitals::default(),
            strategy: Strategy::Mobile,
            available: false,
            message: Some(message.into()),
        }
    }
}

// ================================================================================================
// CACHE PAYLOAD
// ================================================================================================

/// A snapshot of either kind, as persisted in the metric cache.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum MetricSnapshot {
    Uptime(UptimeSnapshot),
    Performance(PerformanceSnapshot),
}

impl MetricSnapshot {
    pub fn kind(&self) -> MetricKind {
        match self {
            MetricSnapshot::Uptime(_) => MetricKind::Uptime,
            MetricSnapshot::Performance(_) => MetricKind::Performance,
        }
    }

    pub fn is_available(&self) -> bool {
        match self {
            MetricSnapshot::Uptime(s) => s.available,
            MetricSnapshot::Performance(s) => s.available,
        }
    }
}

impl From<UptimeSnapshot> for MetricSnapshot {
    fn from(s: UptimeSnapshot) -> Self {
        MetricSnapshot::Uptime(s)
    }
}

impl From<PerformanceSnapshot> for MetricSnapshot {
    fn from(s: PerformanceSnapshot) -> Self {
        MetricSnapshot::Performance(s)
    }
}

/// Conversion from the cache payload back to a typed snapshot.
pub trait KindedSnapshot: Sized + Clone + Into<MetricSnapshot> {
    const KIND: MetricKind;

    fn from_metric(snapshot: MetricSnapshot) -> Option<Self>;
    fn is_available(&self) -> bool;
}

impl KindedSnapshot for UptimeSnapshot {
    const KIND: MetricKind = MetricKind::Uptime;

    fn from_metric(snapshot: MetricSnapshot) -> Option<Self> {
        match snapshot {
            MetricSnapshot::Uptime(s) => Some(s),
            MetricSnapshot::Performance(_) => None,
        }
    }

    fn is_available(&self) -> bool {
        self.available
    }
}

impl KindedSnapshot for PerformanceSnapshot {
    const KIND: MetricKind = MetricKind::Performance;

    fn from_metric(snapshot: MetricSnapshot) -> Option<Self> {
        match snapshot {
            MetricSnapshot::Performance(s) => Some(s),
            MetricSnapshot::Uptime(_) => None,
        }
    }

    fn is_available(&self) -> bool {
        self.available
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ssl_status_thresholds() {
        assert_eq!(SslStatus::from_days(None), SslStatus::Unknown);
        assert_eq!(SslStatus::from_days(Some(-3)), SslStatus::Expired);
        assert_eq!(SslStatus::from_days(Some(0)), SslStatus::Expired);
        assert_eq!(SslStatus::from_days(Some(1)), SslStatus::Critical);
        assert_eq!(SslStatus::from_days(Some(7)), SslStatus::Critical);
        assert_eq!(SslStatus::from_days(Some(8)), SslStatus::Warning);
        assert_eq!(SslStatus::from_days(Some(30)), SslStatus::Warning);
        assert_eq!(SslStatus::from_days(Some(31)), SslStatus::Valid);
    }

    #[test]
    fn test_unavailable_placeholders_are_zeroed() {
        let uptime = UptimeSnapshot::unavailable("No monitor configured");
        assert!(!uptime.available);
        assert_eq!(uptime.status, UptimeStatus::Unknown);
        assert_eq!(uptime.uptime_90d, 0.0);
        assert_eq!(uptime.message.as_deref(), Some("No monitor configured"));

        let perf = PerformanceSnapshot::unavailable("No URL provided");
        assert!(!perf.available);
        assert_eq!(perf.score, 0);
        assert_eq!(perf.strategy, Strategy::Mobile);
    }

    #[test]
    fn test_metric_snapshot_is_tagged_by_kind() {
        let snapshot = MetricSnapshot::from(PerformanceSnapshot::unavailable("x"));
        let json = serde_json::to_value(&snapshot).unwrap();
        assert_eq!(json["kind"], "performance");
        assert_eq!(snapshot.kind(), MetricKind::Performance);
    }

    #[test]
    fn test_incident_serializes_type_field() {
        let incident = Incident {
            kind: IncidentKind::Down,
            datetime: Utc::now(),
            duration_secs: Some(90),
            duration: Some("2m".to_string()),
            reason: None,
        };
        let json = serde_json::to_value(&incident).unwrap();
        assert_eq!(json["type"], "down");
    }
}
