//! Sliding-window refresh limiter backed by the append-only refresh log.
//!
//! Each accepted explicit refresh occupies the window for exactly one window
//! length from the moment it was logged. Counting uses entries with
//! `created_at > now - window`.

use chrono::{DateTime, Utc};
use log::debug;
use rusqlite::{params, Connection, TransactionBehavior};
use std::sync::Arc;

use super::database::Database;
use super::types::{QuotaStatus, RefreshLogEntry};
use crate::config::MetricsConfig;
use crate::error::StorageError;
use crate::types::{from_millis, to_millis, ClientId, Clock, WebsiteId};

/// Result of an atomic check-and-log.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Reservation {
    /// A log entry was written; `status` reflects the quota after it.
    Granted {
        entry: RefreshLogEntry,
        status: QuotaStatus,
    },
    /// Nothing was written.
    Denied(QuotaStatus),
}

/// Per-website refresh quota over a trailing window.
pub struct RefreshLimiter {
    db: Database,
    clock: Arc<dyn Clock>,
    limit: u32,
    window: chrono::Duration,
}

impl RefreshLimiter {
    pub fn new(db: Database, config: &MetricsConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            db,
            clock,
            limit: config.refresh_limit,
            window: config.window(),
        }
    }

    pub fn limit(&self) -> u32 {
        self.limit
    }

    pub fn window(&self) -> chrono::Duration {
        self.window
    }

    /// Current quota for a website.
    pub fn can_refresh(&self, website_id: WebsiteId) -> Result<QuotaStatus, StorageError> {
        let now = self.clock.now();
        self.db
            .with_conn(|conn| window_status(conn, website_id, now, self.limit, self.window))
    }

    /// Append one entry stamped with the current time.
    ///
    /// Does not consult the quota; pair with `can_refresh` or use `try_acquire`.
    pub fn log_refresh(
        &self,
        website_id: WebsiteId,
        triggered_by: ClientId,
    ) -> Result<RefreshLogEntry, StorageError> {
        let now = self.clock.now();
        self.db
            .with_conn(|conn| insert_entry(conn, website_id, triggered_by, now))
    }

    /// Check the quota and log an entry in one IMMEDIATE transaction.
    ///
    /// Concurrent callers serialize on the write lock, so the limit is never
    /// exceeded.
    pub fn try_acquire(
        &self,
        website_id: WebsiteId,
        triggered_by: ClientId,
    ) -> Result<Reservation, StorageError> {
        let now = self.clock.now();
        let reservation = self.db.with_conn(|conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
            let before = window_status(&tx, website_id, now, self.limit, self.window)?;
            if !before.allowed {
                tx.rollback()?;
                return Ok(Reservation::Denied(before));
            }

            let entry = insert_entry(&tx, website_id, triggered_by, now)?;
            let status = window_status(&tx, website_id, now, self.limit, self.window)?;
            tx.commit()?;
            Ok(Reservation::Granted { entry, status })
        })?;

        if let Reservation::Granted { ref status, .. } = reservation {
            debug!(
                "Refresh reserved for website {} by client {} ({} remaining)",
                website_id, triggered_by, status.remaining
            );
        }
        Ok(reservation)
    }

    /// Entries inside the current window, oldest first.
    pub fn entries_in_window(
        &self,
        website_id: WebsiteId,
    ) -> Result<Vec<RefreshLogEntry>, StorageError> {
        let since = to_millis(self.clock.now() - self.window);
        self.db.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, website_id, triggered_by, created_at
                 FROM metric_refresh_log
                 WHERE website_id = ?1 AND created_at > ?2
                 ORDER BY created_at ASC, id ASC",
            )?;
            let rows = stmt.query_map(params![website_id, since], |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, i64>(1)?,
                    row.get::<_, i64>(2)?,
                    row.get::<_, i64>(3)?,
                ))
            })?;

            let mut entries = Vec::new();
            for row in rows {
                let (id, website_id, triggered_by, created_at) = row?;
                entries.push(RefreshLogEntry {
                    id,
                    website_id,
                    triggered_by,
                    created_at: from_millis(created_at)
                        .ok_or(StorageError::Timestamp("created_at"))?,
                });
            }
            Ok(entries)
        })
    }

    /// Prune entries older than `age`, never reaching inside the current window.
    ///
    /// Ages shorter than the window are raised to it, so quota is never
    /// restored by pruning. Ages beyond the representable range clamp the
    /// cutoff to the earliest representable time.
    pub fn prune_expired(&self, age: chrono::Duration) -> Result<usize, StorageError> {
        let age = age.max(self.window);
        let cutoff = self
            .clock
            .now()
            .checked_sub_signed(age)
            .unwrap_or(DateTime::<Utc>::MIN_UTC);
        let removed = self.prune_older_than(cutoff)?;
        debug!("Pruned {} refresh-log entries at or before {}", removed, cutoff);
        Ok(removed)
    }

    /// Operational pruning of entries older than `cutoff`.
    pub fn prune_older_than(&self, cutoff: DateTime<Utc>) -> Result<usize, StorageError> {
        self.db.with_conn(|conn| {
            Ok(conn.execute(
                "DELETE FROM metric_refresh_log WHERE created_at <= ?1",
                params![to_millis(cutoff)],
            )?)
        })
    }
}

fn insert_entry(
    conn: &Connection,
    website_id: WebsiteId,
    triggered_by: ClientId,
    now: DateTime<Utc>,
) -> Result<RefreshLogEntry, StorageError> {
    conn.execute(
        "INSERT INTO metric_refresh_log (website_id, triggered_by, created_at)
         VALUES (?1, ?2, ?3)",
        params![website_id, triggered_by, to_millis(now)],
    )?;
    Ok(RefreshLogEntry {
        id: conn.last_insert_rowid(),
        website_id,
        triggered_by,
        created_at: now,
    })
}

fn window_status(
    conn: &Connection,
    website_id: WebsiteId,
    now: DateTime<Utc>,
    limit: u32,
    window: chrono::Duration,
) -> Result<QuotaStatus, StorageError> {
    let since = to_millis(now - window);
    let (count, oldest): (i64, Option<i64>) = conn.query_row(
        "SELECT COUNT(*), MIN(created_at)
         FROM metric_refresh_log
         WHERE website_id = ?1 AND created_at > ?2",
        params![website_id, since],
        |row| Ok((row.get(0)?, row.get(1)?)),
    )?;

    let count = count.max(0) as u64;
    let allowed = count < limit as u64;
    let remaining = (limit as u64).saturating_sub(count) as u32;

    let next_available_at = if allowed {
        None
    } else {
        match oldest {
            Some(ms) => Some(
                from_millis(ms).ok_or(StorageError::Timestamp("created_at"))? + window,
            ),
            None => None,
        }
    };

    Ok(QuotaStatus {
        allowed,
        remaining,
        next_available_at,
    })
}
