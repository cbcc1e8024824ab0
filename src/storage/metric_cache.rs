//! Metric cache store.
//!
//! One row per (website, metric kind) holding the last successful snapshot,
//! when it was fetched and when it expires. Writes are upserts on that key.

use log::debug;
use rusqlite::{params, OptionalExtension};
use std::sync::Arc;

use super::database::Database;
use super::types::CachedMetric;
use crate::config::MetricsConfig;
use crate::error::StorageError;
use crate::sources::MetricSnapshot;
use crate::types::{from_millis, to_millis, Clock, MetricKind, WebsiteId};

/// Persistent cache of the latest snapshot per website and kind.
pub struct MetricCache {
    db: Database,
    clock: Arc<dyn Clock>,
    uptime_ttl: chrono::Duration,
    performance_ttl: chrono::Duration,
}

impl MetricCache {
    pub fn new(db: Database, config: &MetricsConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            db,
            clock,
            uptime_ttl: config.ttl_for(MetricKind::Uptime),
            performance_ttl: config.ttl_for(MetricKind::Performance),
        }
    }

    fn ttl(&self, kind: MetricKind) -> chrono::Duration {
        match kind {
            MetricKind::Uptime => self.uptime_ttl,
            MetricKind::Performance => self.performance_ttl,
        }
    }

    /// Read the cached row, fresh or not. Never mutates.
    pub fn get(
        &self,
        website_id: WebsiteId,
        kind: MetricKind,
    ) -> Result<Option<CachedMetric>, StorageError> {
        let row = self.db.with_conn(|conn| {
            Ok(conn
                .query_row(
                    "SELECT data, fetched_at, expires_at
                     FROM website_metrics_cache
                     WHERE website_id = ?1 AND metric_type = ?2",
                    params![website_id, kind.as_str()],
                    |row| {
                        Ok((
                            row.get::<_, String>(0)?,
                            row.get::<_, i64>(1)?,
                            row.get::<_, i64>(2)?,
                        ))
                    },
                )
                .optional()?)
        })?;

        let (data, fetched_at, expires_at) = match row {
            Some(row) => row,
            None => return Ok(None),
        };

        let payload: MetricSnapshot = serde_json::from_str(&data)?;
        if payload.kind() != kind {
            return Err(StorageError::KindMismatch {
                expected: kind,
                found: payload.kind(),
            });
        }

        Ok(Some(CachedMetric {
            website_id,
            kind,
            payload,
            fetched_at: from_millis(fetched_at).ok_or(StorageError::Timestamp("fetched_at"))?,
            expires_at: from_millis(expires_at).ok_or(StorageError::Timestamp("expires_at"))?,
        }))
    }

    /// Store a snapshot under its own kind with `expires_at = now + TTL(kind)`.
    ///
    /// Payload, fetch time and expiry are written by one upsert statement;
    /// concurrent writers to the same key resolve last-writer-wins.
    pub fn set(
        &self,
        website_id: WebsiteId,
        payload: &MetricSnapshot,
    ) -> Result<CachedMetric, StorageError> {
        let kind = payload.kind();
        let fetched_at = self.clock.now();
        let expires_at = fetched_at + self.ttl(kind);
        let data = serde_json::to_string(payload)?;

        self.db.with_conn(|conn| {
            conn.execute(
                "INSERT INTO website_metrics_cache
                    (website_id, metric_type, data, fetched_at, expires_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)
                 ON CONFLICT (website_id, metric_type) DO UPDATE SET
                    data = excluded.data,
                    fetched_at = excluded.fetched_at,
                    expires_at = excluded.expires_at",
                params![
                    website_id,
                    kind.as_str(),
                    data,
                    to_millis(fetched_at),
                    to_millis(expires_at)
                ],
            )?;
            Ok(())
        })?;

        debug!("Cached {} metrics for website {} until {}", kind, website_id, expires_at);

        Ok(CachedMetric {
            website_id,
            kind,
            payload: payload.clone(),
            fetched_at,
            expires_at,
        })
    }

    /// True when a row exists and has not expired.
    pub fn is_valid(&self, website_id: WebsiteId, kind: MetricKind) -> Result<bool, StorageError> {
        let now = to_millis(self.clock.now());
        self.db.with_conn(|conn| {
            Ok(conn
                .query_row(
                    "SELECT 1 FROM website_metrics_cache
                     WHERE website_id = ?1 AND metric_type = ?2 AND expires_at >= ?3",
                    params![website_id, kind.as_str(), now],
                    |_| Ok(()),
                )
                .optional()?
                .is_some())
        })
    }

    /// Administrative removal of one kind, or every kind when `kind` is `None`.
    pub fn delete(
        &self,
        website_id: WebsiteId,
        kind: Option<MetricKind>,
    ) -> Result<usize, StorageError> {
        self.db.with_conn(|conn| {
            let removed = match kind {
                Some(kind) => conn.execute(
                    "DELETE FROM website_metrics_cache WHERE website_id = ?1 AND metric_type = ?2",
                    params![website_id, kind.as_str()],
                )?,
                None => conn.execute(
                    "DELETE FROM website_metrics_cache WHERE website_id = ?1",
                    params![website_id],
                )?,
            };
            Ok(removed)
        })
    }
}
