//! External metric sources.
//!
//! Two independent providers:
//! 1. **Uptime** (UptimeRobot): status, uptime ratios, response times, SSL, incidents
//! 2. **Performance** (PageSpeed Insights): Lighthouse score and Core Web Vitals
//!
//! Adapters never fail past their boundary. Transport, status and parse
//! errors become an `available = false` snapshot with a diagnostic message.

pub mod performance;
pub mod snapshot;
pub mod uptime;

use async_trait::async_trait;
use thiserror::Error;

pub use performance::PageSpeedClient;
pub use snapshot::{
    CoreWebVitals, Incident, IncidentKind, KindedSnapshot, MetricSnapshot, PerformanceSnapshot,
    ResponseTimeSample, SslCertificate, SslStatus, Strategy, UptimeSnapshot, UptimeStatus,
};
pub use uptime::UptimeRobotClient;

/// Uptime/incident monitor, queried by monitor identifier.
#[async_trait]
pub trait UptimeSource: Send + Sync {
    /// `None` means no monitor is configured for the website.
    async fn fetch(&self, monitor_id: Option<&str>) -> UptimeSnapshot;
}

/// Page-performance analyzer, queried by URL.
#[async_trait]
pub trait PerformanceSource: Send + Sync {
    async fn fetch(&self, url: &str, strategy: Strategy) -> PerformanceSnapshot;
}

/// Internal failure of a source fetch, converted to a snapshot message.
#[derive(Error, Debug)]
pub(crate) enum SourceError {
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("unexpected HTTP status {0}")]
    Status(u16),

    #[error("malformed response: {0}")]
    Malformed(String),
}
