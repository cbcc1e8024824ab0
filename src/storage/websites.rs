//! Website registry and ownership checks.

use rusqlite::{params, OptionalExtension, Row};
use std::sync::Arc;

use super::database::Database;
use super::types::{NewWebsite, Website, WebsiteSummary};
use crate::error::{MetricsError, Result, StorageError};
use crate::types::{from_millis, to_millis, ClientId, Clock, WebsiteId};

const WEBSITE_COLUMNS: &str =
    "id, client_id, name, url, uptime_monitor_id, is_active, created_at";

pub struct WebsiteRegistry {
    db: Database,
    clock: Arc<dyn Clock>,
}

impl WebsiteRegistry {
    pub fn new(db: Database, clock: Arc<dyn Clock>) -> Self {
        Self { db, clock }
    }

    /// Register a website for a client. New websites are active.
    pub fn insert(&self, website: NewWebsite) -> std::result::Result<Website, StorageError> {
        let created_at = self.clock.now();
        let monitor = website.uptime_monitor_id.filter(|m| !m.trim().is_empty());
        let id = self.db.with_conn(|conn| {
            conn.execute(
                "INSERT INTO websites (client_id, name, url, uptime_monitor_id, is_active, created_at)
                 VALUES (?1, ?2, ?3, ?4, 1, ?5)",
                params![
                    website.client_id,
                    website.name,
                    website.url,
                    monitor,
                    to_millis(created_at)
                ],
            )?;
            Ok(conn.last_insert_rowid())
        })?;

        Ok(Website {
            id,
            client_id: website.client_id,
            name: website.name,
            url: website.url,
            uptime_monitor_id: monitor,
            is_active: true,
            created_at,
        })
    }

    pub fn get(&self, website_id: WebsiteId) -> std::result::Result<Option<Website>, StorageError> {
        self.db.with_conn(|conn| {
            let raw = conn
                .query_row(
                    &format!("SELECT {} FROM websites WHERE id = ?1", WEBSITE_COLUMNS),
                    params![website_id],
                    read_row,
                )
                .optional()?;
            raw.map(RawWebsite::into_website).transpose()
        })
    }

    /// Resolve a website the client may view.
    ///
    /// Missing or inactive websites are `WebsiteNotFound`; websites owned by
    /// another client are `NotAuthorized`.
    pub fn authorize(&self, client_id: ClientId, website_id: WebsiteId) -> Result<Website> {
        let website = self
            .get(website_id)?
            .filter(|w| w.is_active)
            .ok_or(MetricsError::WebsiteNotFound(website_id))?;

        if website.client_id != client_id {
            return Err(MetricsError::NotAuthorized {
                website_id,
                client_id,
            });
        }
        Ok(website)
    }

    /// Active websites of a client, sorted by name.
    pub fn list_for_client(
        &self,
        client_id: ClientId,
    ) -> std::result::Result<Vec<WebsiteSummary>, StorageError> {
        self.db.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {} FROM websites
                 WHERE client_id = ?1 AND is_active = 1
                 ORDER BY name ASC",
                WEBSITE_COLUMNS
            ))?;
            let rows = stmt.query_map(params![client_id], read_row)?;

            let mut sites = Vec::new();
            for row in rows {
                sites.push(WebsiteSummary::from(row?.into_website()?));
            }
            Ok(sites)
        })
    }

    /// Activate or deactivate a website. Returns false when it does not exist.
    pub fn set_active(
        &self,
        website_id: WebsiteId,
        active: bool,
    ) -> std::result::Result<bool, StorageError> {
        self.db.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE websites SET is_active = ?1 WHERE id = ?2",
                params![active, website_id],
            )?;
            Ok(changed > 0)
        })
    }
}

struct RawWebsite {
    id: i64,
    client_id: i64,
    name: String,
    url: String,
    uptime_monitor_id: Option<String>,
    is_active: bool,
    created_at: i64,
}

impl RawWebsite {
    fn into_website(self) -> std::result::Result<Website, StorageError> {
        Ok(Website {
            id: self.id,
            client_id: self.client_id,
            name: self.name,
            url: self.url,
            uptime_monitor_id: self.uptime_monitor_id,
            is_active: self.is_active,
            created_at: from_millis(self.created_at).ok_or(StorageError::Timestamp("created_at"))?,
        })
    }
}

fn read_row(row: &Row<'_>) -> rusqlite::Result<RawWebsite> {
    Ok(RawWebsite {
        id: row.get(0)?,
        client_id: row.get(1)?,
        name: row.get(2)?,
        url: row.get(3)?,
        uptime_monitor_id: row.get(4)?,
        is_active: row.get(5)?,
        created_at: row.get(6)?,
    })
}
