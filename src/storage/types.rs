//! Storage data structures.
//!
//! Rows of the metric cache, the refresh log and the website registry.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::sources::MetricSnapshot;
use crate::types::{ClientId, MetricKind, WebsiteId};

/// The last successful snapshot for one (website, kind) pair.
#[derive(Clone, Debug, PartialEq)]
pub struct CachedMetric {
    pub website_id: WebsiteId,
    pub kind: MetricKind,
    pub payload: MetricSnapshot,
    pub fetched_at: DateTime<Utc>,
    /// `fetched_at` plus the kind's TTL
    pub expires_at: DateTime<Utc>,
}

impl CachedMetric {
    /// Derived at read time; never stored.
    #[inline]
    pub fn is_stale(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }
}

/// One accepted explicit refresh.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct RefreshLogEntry {
    pub id: i64,
    pub website_id: WebsiteId,
    pub triggered_by: ClientId,
    pub created_at: DateTime<Utc>,
}

/// Refresh quota for a website at a point in time.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuotaStatus {
    pub allowed: bool,
    pub remaining: u32,
    /// When the oldest entry in the window ages out; set only when denied
    #[serde(rename = "next_available")]
    pub next_available_at: Option<DateTime<Utc>>,
}

impl QuotaStatus {
    /// Status reported when the refresh log cannot be read.
    pub fn closed() -> Self {
        Self {
            allowed: false,
            remaining: 0,
            next_available_at: None,
        }
    }
}

/// A monitored website owned by one client.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Website {
    pub id: WebsiteId,
    pub client_id: ClientId,
    pub name: String,
    pub url: String,
    pub uptime_monitor_id: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

/// Website fields to register.
#[derive(Clone, Debug)]
pub struct NewWebsite {
    pub client_id: ClientId,
    pub name: String,
    pub url: String,
    pub uptime_monitor_id: Option<String>,
}

/// Listing entry returned to the website's owner.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct WebsiteSummary {
    pub id: WebsiteId,
    pub name: String,
    pub url: String,
    pub has_uptime_monitor: bool,
    pub created_at: DateTime<Utc>,
}

impl From<Website> for WebsiteSummary {
    fn from(site: Website) -> Self {
        Self {
            id: site.id,
            has_uptime_monitor: site
                .uptime_monitor_id
                .as_deref()
                .map(|m| !m.is_empty())
                .unwrap_or(false),
            name: site.name,
            url: site.url,
            created_at: site.created_at,
        }
    }
}
