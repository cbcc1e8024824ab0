//! Response shapes returned to the dashboard.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::sources::{PerformanceSnapshot, UptimeSnapshot};
use crate::storage::QuotaStatus;
use crate::types::{MetricKind, WebsiteId};

pub const QUOTA_EXCEEDED_MESSAGE: &str =
    "Rate limit exceeded. Please wait before refreshing again.";

/// A snapshot annotated with its cache provenance.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct MetricView<S> {
    #[serde(flatten)]
    pub snapshot: S,
    /// When the served row was cached; `None` for placeholders and uncached live data
    pub cached_at: Option<DateTime<Utc>>,
    pub is_stale: bool,
}

impl<S> MetricView<S> {
    pub fn fresh(snapshot: S, cached_at: DateTime<Utc>) -> Self {
        Self {
            snapshot,
            cached_at: Some(cached_at),
            is_stale: false,
        }
    }

    pub fn stale(snapshot: S, cached_at: DateTime<Utc>) -> Self {
        Self {
            snapshot,
            cached_at: Some(cached_at),
            is_stale: true,
        }
    }

    /// Result of a failed fetch with nothing cached to fall back on.
    pub fn placeholder(snapshot: S) -> Self {
        Self {
            snapshot,
            cached_at: None,
            is_stale: false,
        }
    }

    /// Live data that could not be written to the cache.
    pub fn uncached(snapshot: S) -> Self {
        Self {
            snapshot,
            cached_at: None,
            is_stale: false,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct MetricsBundle {
    pub uptime: MetricView<UptimeSnapshot>,
    pub performance: MetricView<PerformanceSnapshot>,
}

/// Lazy dashboard read.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct DashboardView {
    pub website_id: WebsiteId,
    pub metrics: MetricsBundle,
    pub refresh: QuotaStatus,
}

/// Accepted explicit refresh.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct RefreshReport {
    pub website_id: WebsiteId,
    /// Kinds whose live fetch succeeded and were written to the cache
    pub refreshed: Vec<MetricKind>,
    pub metrics: MetricsBundle,
    pub refresh: QuotaStatus,
}

/// Explicit refresh rejected by the rate limiter.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct QuotaRejection {
    pub website_id: WebsiteId,
    pub error: String,
    pub remaining: u32,
    #[serde(rename = "next_available")]
    pub next_available_at: Option<DateTime<Utc>>,
    /// Seconds until `next_available_at`, or the whole window when unknown
    pub retry_after: u64,
}

impl QuotaRejection {
    pub fn new(
        website_id: WebsiteId,
        status: &QuotaStatus,
        now: DateTime<Utc>,
        window: chrono::Duration,
    ) -> Self {
        let retry_after = match status.next_available_at {
            Some(at) => (at - now).num_seconds().max(0) as u64,
            None => window.num_seconds().max(0) as u64,
        };
        Self {
            website_id,
            error: QUOTA_EXCEEDED_MESSAGE.to_string(),
            remaining: 0,
            next_available_at: status.next_available_at,
            retry_after,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum RefreshOutcome {
    Refreshed(RefreshReport),
    QuotaExceeded(QuotaRejection),
}
