//! Whitelist registry database operations.

use chrono::Utc;
use sqlx::sqlite::SqliteRow;
use sqlx::Row;
use tracing::{debug, error, info};

use super::records::{NewWhitelistEntry, WhitelistEntry, WhitelistUpdate};
use super::{Database, DbResult};
use crate::constants::restart::{DEFAULT_INTERVAL_HOURS, MIN_INTERVAL_HOURS};
use crate::errors::DatabaseError;

/// Values below the floor fall back to the default interval
pub fn normalize_interval(hours: i64) -> i64 {
    if hours < MIN_INTERVAL_HOURS {
        DEFAULT_INTERVAL_HOURS
    } else {
        hours
    }
}

impl Database {
    pub async fn get_all_whitelist(&self) -> DbResult<Vec<WhitelistEntry>> {
        let rows = sqlx::query(
            r#"
            SELECT id, resource_id, resource_name, node, enabled, restart_interval_hours,
                   created_at, created_by, notes
            FROM whitelist
            ORDER BY resource_id ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(Self::row_to_whitelist_entry).collect()
    }

    pub async fn get_enabled_whitelist(&self) -> DbResult<Vec<WhitelistEntry>> {
        let rows = sqlx::query(
            r#"
            SELECT id, resource_id, resource_name, node, enabled, restart_interval_hours,
                   created_at, created_by, notes
            FROM whitelist
            WHERE enabled = 1
            ORDER BY resource_id ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        debug!("Found {} enabled whitelist entries", rows.len());
        rows.iter().map(Self::row_to_whitelist_entry).collect()
    }

    pub async fn get_whitelist_entry(&self, id: i64) -> DbResult<Option<WhitelistEntry>> {
        let row = sqlx::query(
            r#"
            SELECT id, resource_id, resource_name, node, enabled, restart_interval_hours,
                   created_at, created_by, notes
            FROM whitelist
            WHERE id = ?
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(Self::row_to_whitelist_entry).transpose()
    }

    /// Insert a new enabled entry; a second entry for the same (resource_id, node) is rejected
    pub async fn add_whitelist_entry(&self, entry: &NewWhitelistEntry) -> DbResult<WhitelistEntry> {
        let interval = normalize_interval(entry.restart_interval_hours);
        let created_at = Utc::now();

        let result = sqlx::query(
            r#"
            INSERT INTO whitelist (resource_id, resource_name, node, enabled,
                                   restart_interval_hours, created_at, created_by, notes)
            VALUES (?, ?, ?, 1, ?, ?, ?, ?)
            "#,
        )
        .bind(entry.resource_id)
        .bind(&entry.resource_name)
        .bind(&entry.node)
        .bind(interval)
        .bind(created_at)
        .bind(&entry.created_by)
        .bind(&entry.notes)
        .execute(&self.pool)
        .await;

        let result = match result {
            Ok(result) => result,
            Err(sqlx::Error::Database(db_err)) if db_err.is_unique_violation() => {
                return Err(DatabaseError::Duplicate {
                    resource_id: entry.resource_id,
                    node: entry.node.clone(),
                });
            }
            Err(e) => {
                error!(
                    "Failed to whitelist resource {} on {}: {}",
                    entry.resource_id, entry.node, e
                );
                return Err(e.into());
            }
        };

        info!(
            "Whitelisted resource {} ({}) on {} every {}h",
            entry.resource_id, entry.resource_name, entry.node, interval
        );

        Ok(WhitelistEntry {
            id: result.last_insert_rowid(),
            resource_id: entry.resource_id,
            resource_name: entry.resource_name.clone(),
            node: entry.node.clone(),
            enabled: true,
            restart_interval_hours: interval,
            created_by: entry.created_by.clone(),
            notes: entry.notes.clone(),
            created_at,
        })
    }

    pub async fn update_whitelist_entry(&self, id: i64, update: &WhitelistUpdate) -> DbResult<()> {
        let interval = normalize_interval(update.restart_interval_hours);

        let result = sqlx::query(
            "UPDATE whitelist SET enabled = ?, notes = ?, restart_interval_hours = ? WHERE id = ?",
        )
        .bind(update.enabled)
        .bind(&update.notes)
        .bind(interval)
        .bind(id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DatabaseError::NotFound {
                entity: "Whitelist entry",
                id,
            });
        }
        debug!("Updated whitelist entry {}", id);
        Ok(())
    }

    pub async fn delete_whitelist_entry(&self, id: i64) -> DbResult<bool> {
        let result = sqlx::query("DELETE FROM whitelist WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Remove every whitelist row for a resource id, whatever the node
    pub async fn delete_whitelist_by_resource(&self, resource_id: i64) -> DbResult<u64> {
        let result = sqlx::query("DELETE FROM whitelist WHERE resource_id = ?")
            .bind(resource_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    fn row_to_whitelist_entry(row: &SqliteRow) -> DbResult<WhitelistEntry> {
        let notes: Option<String> = row.try_get("notes")?;
        Ok(WhitelistEntry {
            id: row.try_get("id")?,
            resource_id: row.try_get("resource_id")?,
            resource_name: row.try_get("resource_name")?,
            node: row.try_get("node")?,
            enabled: row.try_get("enabled")?,
            restart_interval_hours: row.try_get("restart_interval_hours")?,
            created_by: row.try_get("created_by")?,
            notes: notes.unwrap_or_default(),
            created_at: row.try_get("created_at")?,
        })
    }
}
