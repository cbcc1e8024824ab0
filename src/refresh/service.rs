//! Metrics orchestration: lazy cached reads and rate-limited explicit refreshes.
//!
//! Per (website, kind) the cache is in one of three states:
//! - **Fresh**: served as-is
//! - **Stale**: a live fetch is attempted; on failure the stale row is served
//! - **Absent**: a live fetch is attempted; on failure its placeholder is served
//!
//! Explicit refreshes reserve quota first, then fetch every kind regardless of
//! freshness and report each fetch's own outcome.

use chrono::{DateTime, Utc};
use log::{info, warn};
use std::future::Future;
use std::sync::Arc;

use super::view::{
    DashboardView, MetricView, MetricsBundle, QuotaRejection, RefreshOutcome, RefreshReport,
};
use crate::config::MetricsConfig;
use crate::error::Result;
use crate::sources::{
    KindedSnapshot, PageSpeedClient, PerformanceSource, Strategy, UptimeRobotClient, UptimeSource,
};
use crate::storage::{
    Database, MetricCache, QuotaStatus, RefreshLimiter, Reservation, Website, WebsiteRegistry,
};
use crate::types::{ClientId, Clock, MetricKind, SystemClock, WebsiteId};
use crate::MetricsError;

/// Entry point for dashboard reads and explicit refreshes.
///
/// Store calls are synchronous SQLite statements run on the calling task.
/// Each one holds the connection lock for a single statement or transaction
/// and waits at most `storage_busy_timeout` on a locked file. Only source
/// fetches yield to the runtime. The service is usable from both
/// current-thread and multi-thread runtimes.
pub struct MetricsService {
    websites: WebsiteRegistry,
    cache: MetricCache,
    limiter: RefreshLimiter,
    uptime: Arc<dyn UptimeSource>,
    performance: Arc<dyn PerformanceSource>,
    clock: Arc<dyn Clock>,
    strategy: Strategy,
}

impl MetricsService {
    /// Assemble the service from an open database and explicit collaborators.
    pub fn new(
        db: Database,
        config: &MetricsConfig,
        uptime: Arc<dyn UptimeSource>,
        performance: Arc<dyn PerformanceSource>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            websites: WebsiteRegistry::new(db.clone(), clock.clone()),
            cache: MetricCache::new(db.clone(), config, clock.clone()),
            limiter: RefreshLimiter::new(db, config, clock.clone()),
            uptime,
            performance,
            clock,
            strategy: config.performance_strategy,
        }
    }

    /// Open the configured database and build the HTTP-backed sources.
    pub fn from_config(config: &MetricsConfig) -> Result<Self> {
        config.validate()?;
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        let db = Database::open(&config.database_path, config.storage_busy_timeout)?;

        let uptime = UptimeRobotClient::new(config, clock.clone())
            .map_err(|e| MetricsError::Config(format!("uptime client: {}", e)))?;
        let performance = PageSpeedClient::new(config)
            .map_err(|e| MetricsError::Config(format!("performance client: {}", e)))?;

        if config.uptimerobot_api_key.is_none() {
            warn!("UPTIMEROBOT_API_KEY is not set; uptime fetches will fail");
        }

        Ok(Self::new(
            db,
            config,
            Arc::new(uptime),
            Arc::new(performance),
            clock,
        ))
    }

    pub fn websites(&self) -> &WebsiteRegistry {
        &self.websites
    }

    pub fn cache(&self) -> &MetricCache {
        &self.cache
    }

    pub fn limiter(&self) -> &RefreshLimiter {
        &self.limiter
    }

    /// Lazy read for the dashboard.
    ///
    /// Never surfaces source or cache failures; the worst case is an
    /// `available = false` placeholder.
    pub async fn dashboard(
        &self,
        client_id: ClientId,
        website_id: WebsiteId,
    ) -> Result<DashboardView> {
        let website = self.websites.authorize(client_id, website_id)?;

        let (uptime, performance) = tokio::join!(
            self.read_through(website.id, self.uptime.fetch(website.uptime_monitor_id.as_deref())),
            self.read_through(website.id, self.performance.fetch(&website.url, self.strategy)),
        );

        Ok(DashboardView {
            website_id: website.id,
            metrics: MetricsBundle {
                uptime,
                performance,
            },
            refresh: self.quota(website.id),
        })
    }

    /// Explicit, rate-limited refresh of every metric kind.
    ///
    /// A storage failure while reserving quota fails closed: the refresh is
    /// denied with an error and no fetch is attempted.
    pub async fn refresh(
        &self,
        client_id: ClientId,
        website_id: WebsiteId,
    ) -> Result<RefreshOutcome> {
        let website = self.websites.authorize(client_id, website_id)?;

        match self.limiter.try_acquire(website.id, client_id) {
            Ok(Reservation::Granted { status, .. }) => {
                info!(
                    "Refresh accepted for website {} by client {} ({} remaining)",
                    website.id, client_id, status.remaining
                );
            }
            Ok(Reservation::Denied(status)) => {
                info!(
                    "Refresh rejected for website {} by client {}: quota exhausted",
                    website.id, client_id
                );
                return Ok(RefreshOutcome::QuotaExceeded(QuotaRejection::new(
                    website.id,
                    &status,
                    self.clock.now(),
                    self.limiter.window(),
                )));
            }
            Err(e) => {
                warn!("Refresh quota check failed for website {}: {}", website.id, e);
                return Err(e.into());
            }
        }

        Ok(RefreshOutcome::Refreshed(self.force_refresh(&website).await))
    }

    /// Current refresh quota; reports exhausted when the log is unreadable.
    pub fn quota(&self, website_id: WebsiteId) -> QuotaStatus {
        match self.limiter.can_refresh(website_id) {
            Ok(status) => status,
            Err(e) => {
                warn!("Refresh quota unavailable for website {}: {}", website_id, e);
                QuotaStatus::closed()
            }
        }
    }

    async fn force_refresh(&self, website: &Website) -> RefreshReport {
        let (uptime, performance) = tokio::join!(
            self.uptime.fetch(website.uptime_monitor_id.as_deref()),
            self.performance.fetch(&website.url, self.strategy),
        );

        let mut refreshed = Vec::new();
        let uptime = self.write_through(website.id, uptime, &mut refreshed);
        let performance = self.write_through(website.id, performance, &mut refreshed);

        RefreshReport {
            website_id: website.id,
            refreshed,
            metrics: MetricsBundle {
                uptime,
                performance,
            },
            refresh: self.quota(website.id),
        }
    }

    /// Serve a fresh row, otherwise fetch and reconcile with whatever is cached.
    async fn read_through<S, F>(&self, website_id: WebsiteId, fetch: F) -> MetricView<S>
    where
        S: KindedSnapshot,
        F: Future<Output = S>,
    {
        let cached = match self.cache.get(website_id, S::KIND) {
            Ok(row) => row.and_then(|row| {
                let fetched_at = row.fetched_at;
                let stale = row.is_stale(self.clock.now());
                S::from_metric(row.payload).map(|snapshot| (snapshot, fetched_at, stale))
            }),
            Err(e) => {
                warn!("Cache read for {} of website {} failed: {}", S::KIND, website_id, e);
                None
            }
        };

        if let Some((snapshot, fetched_at, false)) = cached {
            return MetricView::fresh(snapshot, fetched_at);
        }

        let fresh = fetch.await;
        if fresh.is_available() {
            return match self.store(website_id, &fresh) {
                Some(cached_at) => MetricView::fresh(fresh, cached_at),
                None => MetricView::uncached(fresh),
            };
        }

        match cached {
            Some((snapshot, fetched_at, _)) => {
                warn!(
                    "Serving stale {} metrics for website {} after failed fetch",
                    S::KIND,
                    website_id
                );
                MetricView::stale(snapshot, fetched_at)
            }
            None => MetricView::placeholder(fresh),
        }
    }

    /// Persist a successful explicit-refresh fetch; failures leave the cache untouched.
    ///
    /// Only kinds whose write landed are added to `refreshed`.
    fn write_through<S: KindedSnapshot>(
        &self,
        website_id: WebsiteId,
        snapshot: S,
        refreshed: &mut Vec<MetricKind>,
    ) -> MetricView<S> {
        if !snapshot.is_available() {
            return MetricView::placeholder(snapshot);
        }
        match self.store(website_id, &snapshot) {
            Some(cached_at) => {
                refreshed.push(S::KIND);
                MetricView::fresh(snapshot, cached_at)
            }
            None => MetricView::uncached(snapshot),
        }
    }

    /// Write a snapshot to the cache, returning its fetch time on success.
    fn store<S: KindedSnapshot>(
        &self,
        website_id: WebsiteId,
        snapshot: &S,
    ) -> Option<DateTime<Utc>> {
        match self.cache.set(website_id, &snapshot.clone().into()) {
            Ok(row) => Some(row.fetched_at),
            Err(e) => {
                warn!("Cache write for {} of website {} failed: {}", S::KIND, website_id, e);
                None
            }
        }
    }
}
