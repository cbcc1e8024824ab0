//! Persistence for the metrics subsystem.
//!
//! Three SQLite-backed stores sharing one `Database` handle:
//! - **Metric cache**: last snapshot per (website, kind) with expiry
//! - **Refresh log**: append-only record of accepted explicit refreshes
//! - **Website registry**: websites and their owning clients

pub mod database;
pub mod metric_cache;
pub mod refresh_log;
pub mod types;
pub mod websites;

pub use database::Database;
pub use metric_cache::MetricCache;
pub use refresh_log::{RefreshLimiter, Reservation};
pub use types::{CachedMetric, NewWebsite, QuotaStatus, RefreshLogEntry, Website, WebsiteSummary};
pub use websites::WebsiteRegistry;
