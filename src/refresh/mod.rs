//! Metrics orchestration for the dashboard.
//!
//! Provides two read paths:
//! 1. **Lazy read** (`MetricsService::dashboard`): serve cache when fresh, fetch when stale
//! 2. **Explicit refresh** (`MetricsService::refresh`): rate-limited forced fetch of every kind

pub mod service;
pub mod view;

pub use service::MetricsService;
pub use view::{
    DashboardView, MetricView, MetricsBundle, QuotaRejection, RefreshOutcome, RefreshReport,
};
