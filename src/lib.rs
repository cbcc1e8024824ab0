//! # Portal Metrics
//!
//! Cached, rate-limited uptime and performance metrics for client websites.
//!
//! - `sources`: UptimeRobot and PageSpeed adapters that always return a snapshot
//! - `storage`: SQLite metric cache, refresh log and website registry
//! - `refresh`: the orchestrator deciding between cache, live fetch and fallback

pub mod config;
pub mod error;
pub mod refresh;
pub mod sources;
pub mod storage;
pub mod types;

pub use config::MetricsConfig;
pub use error::{MetricsError, StorageError};
pub use refresh::{DashboardView, MetricView, MetricsService, RefreshOutcome, RefreshReport};
pub use types::{ClientId, Clock, ManualClock, MetricKind, SystemClock, WebsiteId};
