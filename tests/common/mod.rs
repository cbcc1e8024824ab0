//! Shared fixtures: stub sources, snapshots and a service on a manual clock.

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use parking_lot::Mutex;
use portal_metrics::sources::{
    CoreWebVitals, PerformanceSnapshot, PerformanceSource, Strategy, UptimeSnapshot, UptimeSource,
    UptimeStatus,
};
use portal_metrics::storage::{Database, NewWebsite, Website};
use portal_metrics::{ManualClock, MetricsConfig, MetricsService};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

pub const OWNER: i64 = 1;
pub const STRANGER: i64 = 2;

pub fn start_time() -> chrono::DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 4, 14, 10, 0, 0).unwrap()
}

pub fn uptime_ok(ratio: f64) -> UptimeSnapshot {
    UptimeSnapshot {
        status: UptimeStatus::Up,
        uptime_1d: ratio,
        uptime_7d: ratio - 0.013,
        uptime_30d: ratio - 0.021,
        uptime_90d: ratio - 0.107,
        response_time_avg: 231,
        response_time_history: Vec::new(),
        ssl: None,
        incidents: Vec::new(),
        last_check: Some(start_time()),
        available: true,
        message: None,
    }
}

pub fn performance_ok(score: u8) -> PerformanceSnapshot {
    PerformanceSnapshot {
        score,
        metrics: CoreWebVitals {
            fcp: 1.21,
            lcp: 2.43,
            cls: 0.013,
            tbt: 0.18,
            si: 3.05,
        },
        strategy: Strategy::Mobile,
        available: true,
        message: None,
    }
}

/// Uptime source returning a programmable snapshot and counting calls.
pub struct StubUptime {
    next: Mutex<UptimeSnapshot>,
    calls: AtomicUsize,
}

impl StubUptime {
    pub fn new(next: UptimeSnapshot) -> Self {
        Self {
            next: Mutex::new(next),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn respond_with(&self, next: UptimeSnapshot) {
        *self.next.lock() = next;
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl UptimeSource for StubUptime {
    async fn fetch(&self, _monitor_id: Option<&str>) -> UptimeSnapshot {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.next.lock().clone()
    }
}

/// Performance source returning a programmable snapshot and counting calls.
pub struct StubPerformance {
    next: Mutex<PerformanceSnapshot>,
    calls: AtomicUsize,
}

impl StubPerformance {
    pub fn new(next: PerformanceSnapshot) -> Self {
        Self {
            next: Mutex::new(next),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn respond_with(&self, next: PerformanceSnapshot) {
        *self.next.lock() = next;
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PerformanceSource for StubPerformance {
    async fn fetch(&self, _url: &str, _strategy: Strategy) -> PerformanceSnapshot {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.next.lock().clone()
    }
}

pub struct Fixture {
    pub service: MetricsService,
    pub clock: Arc<ManualClock>,
    pub uptime: Arc<StubUptime>,
    pub performance: Arc<StubPerformance>,
    pub website: Website,
}

impl Fixture {
    pub fn new() -> Self {
        Self::with_db(Database::open_in_memory().expect("in-memory db"))
    }

    pub fn with_db(db: Database) -> Self {
        let clock = Arc::new(ManualClock::new(start_time()));
        let uptime = Arc::new(StubUptime::new(uptime_ok(99.98)));
        let performance = Arc::new(StubPerformance::new(performance_ok(91)));
        let service = MetricsService::new(
            db,
            &MetricsConfig::default(),
            uptime.clone(),
            performance.clone(),
            clock.clone(),
        );
        let website = service
            .websites()
            .insert(NewWebsite {
                client_id: OWNER,
                name: "Bakery".to_string(),
                url: "https://bakery.example".to_string(),
                uptime_monitor_id: Some("778812".to_string()),
            })
            .expect("website registered");

        Self {
            service,
            clock,
            uptime,
            performance,
            website,
        }
    }
}
