//! Shared identifiers, metric kinds and the injectable clock.

use chrono::{DateTime, Duration, TimeZone, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Website identifier (the unit of caching and rate limiting).
pub type WebsiteId = i64;

/// Portal client (account) identifier.
pub type ClientId = i64;

// ================================================================================================
// METRIC KINDS
// ================================================================================================

/// The independently cached and fetched metric families.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MetricKind {
    Uptime,
    Performance,
}

impl MetricKind {
    /// Every tracked kind, in the order they are reported.
    pub fn all() -> [MetricKind; 2] {
        [MetricKind::Uptime, MetricKind::Performance]
    }

    /// Column value used by the cache table.
    pub fn as_str(&self) -> &'static str {
        match self {
            MetricKind::Uptime => "uptime",
            MetricKind::Performance => "performance",
        }
    }
}

impl fmt::Display for MetricKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MetricKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "uptime" => Ok(MetricKind::Uptime),
            "performance" => Ok(MetricKind::Performance),
            other => Err(format!("Unknown metric kind: {}", other)),
        }
    }
}

// ================================================================================================
// TIME
// ================================================================================================

/// Source of "now" for staleness and rate-limit decisions.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall-clock time.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Manually driven clock, used to simulate TTL expiry and window ageing.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    /// Move the clock forward.
    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock();
        *now += by;
    }

    pub fn set(&self, to: DateTime<Utc>) {
        *self.now.lock() = to;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock()
    }
}

/// Convert a timestamp to the INTEGER column representation.
#[inline]
pub fn to_millis(ts: DateTime<Utc>) -> i64 {
    ts.timestamp_millis()
}

/// Convert a stored INTEGER column back to a timestamp.
pub fn from_millis(ms: i64) -> Option<DateTime<Utc>> {
    Utc.timestamp_millis_opt(ms).single()
}
