//! Metric cache store properties.
//!
//! Tests verify:
//! - Freshness immediately after a write, staleness once the TTL elapses
//! - Payload round-trip through the cache
//! - Upserts across kinds and websites stay independent
//! - Rows survive reopening the database file

mod common;

use chrono::Duration;
use portal_metrics::Clock;
use common::{performance_ok, start_time, uptime_ok};
use portal_metrics::sources::{
    Incident, IncidentKind, MetricSnapshot, ResponseTimeSample, SslCertificate, SslStatus,
};
use portal_metrics::storage::{Database, MetricCache};
use portal_metrics::{ManualClock, MetricKind, MetricsConfig, StorageError};
use std::sync::Arc;

fn cache_on(db: Database) -> (MetricCache, Arc<ManualClock>) {
    let clock = Arc::new(ManualClock::new(start_time()));
    let cache = MetricCache::new(db, &MetricsConfig::default(), clock.clone());
    (cache, clock)
}

fn detailed_uptime() -> MetricSnapshot {
    let mut snapshot = uptime_ok(99.953);
    snapshot.response_time_history = vec![
        ResponseTimeSample {
            time: start_time() - Duration::minutes(10),
            value: 212,
        },
        ResponseTimeSample {
            time: start_time() - Duration::minutes(5),
            value: 250,
        },
    ];
    snapshot.ssl = Some(SslCertificate {
        issuer: "Let's Encrypt".to_string(),
        expires: Some(start_time() + Duration::days(45)),
        days_until_expiry: Some(45),
        status: SslStatus::Valid,
    });
    snapshot.incidents = vec![Incident {
        kind: IncidentKind::Down,
        datetime: start_time() - Duration::hours(3),
        duration_secs: Some(420),
        duration: Some("7m".to_string()),
        reason: Some("Connection Timeout".to_string()),
    }];
    snapshot.into()
}

// ============================================================================
// FRESHNESS
// ============================================================================

#[test]
fn test_get_after_set_is_fresh_until_ttl() -> Result<(), StorageError> {
    let (cache, clock) = cache_on(Database::open_in_memory()?);
    let payload: MetricSnapshot = uptime_ok(99.9).into();
    cache.set(11, &payload)?;

    let row = cache.get(11, MetricKind::Uptime)?.expect("row present");
    assert!(!row.is_stale(clock.now()));
    assert_eq!(row.payload, payload);

    // Exactly at expiry the row is still fresh.
    clock.advance(Duration::minutes(5));
    assert!(!cache.get(11, MetricKind::Uptime)?.unwrap().is_stale(clock.now()));

    clock.advance(Duration::seconds(1));
    assert!(cache.get(11, MetricKind::Uptime)?.unwrap().is_stale(clock.now()));
    Ok(())
}

#[test]
fn test_staleness_needs_no_write() -> Result<(), StorageError> {
    let (cache, clock) = cache_on(Database::open_in_memory()?);
    cache.set(11, &performance_ok(77).into())?;
    let before = cache.get(11, MetricKind::Performance)?.unwrap();

    clock.advance(Duration::hours(2));
    let after = cache.get(11, MetricKind::Performance)?.unwrap();

    assert_eq!(before, after);
    assert!(after.is_stale(clock.now()));
    Ok(())
}

// ============================================================================
// ROUND TRIP
// ============================================================================

#[test]
fn test_payload_round_trips_exactly() -> Result<(), StorageError> {
    let (cache, _) = cache_on(Database::open_in_memory()?);
    let payload = detailed_uptime();
    cache.set(21, &payload)?;

    let row = cache.get(21, MetricKind::Uptime)?.unwrap();
    assert_eq!(row.payload, payload);
    Ok(())
}

#[test]
fn test_kinds_and_websites_are_independent() -> Result<(), StorageError> {
    let (cache, _) = cache_on(Database::open_in_memory()?);
    cache.set(1, &uptime_ok(99.0).into())?;
    cache.set(1, &performance_ok(50).into())?;
    cache.set(2, &performance_ok(60).into())?;

    assert!(cache.get(2, MetricKind::Uptime)?.is_none());
    assert_eq!(
        cache.get(1, MetricKind::Performance)?.unwrap().payload,
        MetricSnapshot::from(performance_ok(50))
    );
    assert_eq!(
        cache.get(2, MetricKind::Performance)?.unwrap().payload,
        MetricSnapshot::from(performance_ok(60))
    );
    Ok(())
}

// ============================================================================
// PERSISTENCE
// ============================================================================

#[test]
fn test_rows_survive_reopen() -> Result<(), StorageError> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("portal.db");
    let busy = std::time::Duration::from_millis(500);

    let written = {
        let (cache, _) = cache_on(Database::open(&path, busy)?);
        cache.set(5, &detailed_uptime())?
    };

    let (cache, _) = cache_on(Database::open(&path, busy)?);
    let read = cache.get(5, MetricKind::Uptime)?.expect("row persisted");
    assert_eq!(read, written);
    Ok(())
}
