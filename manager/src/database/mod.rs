//! Database layer for the auto-restart manager.
//!
//! This module provides SQLite persistence for:
//! - Whitelist entries (resources opted into periodic restart)
//! - Audit log records (every state-changing lifecycle action)
//! - Container service installs (what a deploy put on a container)
//!
//! The module is organized into submodules:
//! - `records` - All record types (entities)
//! - `whitelist` - Whitelist registry CRUD
//! - `audit` - Audit log create/complete/query and aggregates
//! - `services` - Service install records and the resource purge cascade

mod audit;
mod records;
mod services;
mod whitelist;

pub use records::*;

use crate::errors::DatabaseError;
use chrono::{Duration, Utc};
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::{Pool, Row, Sqlite};
use std::path::Path;
use tracing::{debug, error, info, warn};

pub type DbResult<T> = std::result::Result<T, DatabaseError>;

const IN_MEMORY: &str = ":memory:";

pub struct Database {
    pool: Pool<Sqlite>,
}

impl Database {
    /// Expose pool for integration test queries
    #[allow(dead_code)]
    pub fn pool(&self) -> &Pool<Sqlite> {
        &self.pool
    }

    pub async fn new(database_path: &str) -> DbResult<Self> {
        info!("Opening database: {}", database_path);

        let in_memory = database_path == IN_MEMORY;
        if !in_memory {
            if let Some(parent) = Path::new(database_path).parent() {
                if !parent.as_os_str().is_empty() {
                    if let Err(e) = tokio::fs::create_dir_all(parent).await {
                        error!("FAILED to create parent directory {:?}: {}", parent, e);
                        return Err(e.into());
                    }
                }
            }
        }

        let database_url = format!("sqlite:{}?mode=rwc", database_path);

        // An in-memory database lives only as long as its connection
        let pool_options = if in_memory {
            SqlitePoolOptions::new()
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
        } else {
            SqlitePoolOptions::new().max_connections(5)
        };

        let pool = match pool_options.connect(&database_url).await {
            Ok(pool) => pool,
            Err(e) => {
                error!("FAILED to connect to database {}: {}", database_url, e);
                return Err(e.into());
            }
        };

        let database = Self { pool };
        database.initialize_tables().await?;
        database.verify_tables().await?;

        info!("Database initialized at {}", database_path);
        Ok(database)
    }

    async fn initialize_tables(&self) -> DbResult<()> {
        let statements: [(&str, &str); 9] = [
            (
                "whitelist table",
                r#"
                CREATE TABLE IF NOT EXISTS whitelist (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    resource_id INTEGER NOT NULL,
                    resource_name TEXT NOT NULL,
                    node TEXT NOT NULL,
                    enabled BOOLEAN NOT NULL DEFAULT 1,
                    restart_interval_hours INTEGER NOT NULL DEFAULT 6,
                    created_at DATETIME NOT NULL,
                    created_by TEXT NOT NULL,
                    notes TEXT,
                    UNIQUE(resource_id, node)
                )
                "#,
            ),
            (
                "whitelist resource index",
                "CREATE INDEX IF NOT EXISTS idx_whitelist_resource ON whitelist(resource_id)",
            ),
            (
                "whitelist enabled index",
                "CREATE INDEX IF NOT EXISTS idx_whitelist_enabled ON whitelist(enabled)",
            ),
            (
                "audit_logs table",
                r#"
                CREATE TABLE IF NOT EXISTS audit_logs (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    resource_id INTEGER NOT NULL,
                    resource_name TEXT NOT NULL,
                    node TEXT NOT NULL,
                    action TEXT NOT NULL,
                    trigger_type TEXT NOT NULL,
                    triggered_by TEXT NOT NULL,
                    status TEXT NOT NULL,
                    error_message TEXT,
                    output TEXT,
                    started_at DATETIME NOT NULL,
                    completed_at DATETIME,
                    duration_seconds INTEGER
                )
                "#,
            ),
            (
                "audit_logs resource index",
                "CREATE INDEX IF NOT EXISTS idx_audit_logs_resource ON audit_logs(resource_id)",
            ),
            (
                "audit_logs status index",
                "CREATE INDEX IF NOT EXISTS idx_audit_logs_status ON audit_logs(status)",
            ),
            (
                "audit_logs started_at index",
                "CREATE INDEX IF NOT EXISTS idx_audit_logs_started_at ON audit_logs(started_at DESC)",
            ),
            (
                "container_services table",
                r#"
                CREATE TABLE IF NOT EXISTS container_services (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    resource_id INTEGER NOT NULL,
                    node TEXT NOT NULL,
                    service_name TEXT NOT NULL,
                    service_type TEXT NOT NULL,
                    install_commands TEXT,
                    installed_at DATETIME NOT NULL,
                    UNIQUE(resource_id, node, service_name)
                )
                "#,
            ),
            (
                "container_services resource index",
                "CREATE INDEX IF NOT EXISTS idx_container_services_resource ON container_services(resource_id, node)",
            ),
        ];

        for (name, sql) in statements {
            if let Err(e) = sqlx::query(sql).execute(&self.pool).await {
                error!("FAILED to create {}: {}", name, e);
                return Err(e.into());
            }
            debug!("{} ready", name);
        }

        info!("All database tables and indexes created successfully");
        Ok(())
    }

    async fn verify_tables(&self) -> DbResult<()> {
        let tables: Vec<String> = sqlx::query_scalar(
            "SELECT name FROM sqlite_master WHERE type='table' AND name IN ('whitelist', 'audit_logs', 'container_services')"
        )
        .fetch_all(&self.pool)
        .await?;

        if tables.len() != 3 {
            error!("Expected 3 tables, found {}: {:?}", tables.len(), tables);
            return Err(DatabaseError::Schema(format!(
                "database tables not properly created, found {:?}",
                tables
            )));
        }
        debug!("Required tables exist: {:?}", tables);
        Ok(())
    }

    /// Fail audit records stuck in `pending` for longer than `max_minutes`.
    ///
    /// A pending record that old means the process died between dispatching an
    /// action and recording its outcome.
    pub async fn cleanup_stuck_pending_records(&self, max_minutes: i64) -> DbResult<u64> {
        let cutoff = Utc::now() - Duration::minutes(max_minutes);

        let rows = sqlx::query(
            r#"
            SELECT id, resource_id, action, started_at
            FROM audit_logs
            WHERE status = ? AND started_at < ?
            ORDER BY started_at ASC
            "#,
        )
        .bind(ActionStatus::Pending)
        .bind(cutoff)
        .fetch_all(&self.pool)
        .await?;

        if rows.is_empty() {
            debug!("No stuck pending audit records found");
            return Ok(0);
        }

        let cleanup_time = Utc::now();
        let mut cleaned = 0u64;

        for row in &rows {
            let id: i64 = row.try_get("id")?;
            let resource_id: i64 = row.try_get("resource_id")?;
            let action: LifecycleAction = row.try_get("action")?;

            warn!(
                "Failing stuck {} record {} for resource {}",
                action, id, resource_id
            );

            let result = sqlx::query(
                r#"
                UPDATE audit_logs
                SET status = ?,
                    completed_at = ?,
                    error_message = 'Marked as failed during startup cleanup - record was stuck in pending state'
                WHERE id = ? AND status = ?
                "#,
            )
            .bind(ActionStatus::Failed)
            .bind(cleanup_time)
            .bind(id)
            .bind(ActionStatus::Pending)
            .execute(&self.pool)
            .await;

            match result {
                Ok(done) => cleaned += done.rows_affected(),
                Err(e) => error!("Failed to clean up audit record {}: {}", id, e),
            }
        }

        if cleaned > 0 {
            warn!("Cleaned up {} stuck pending audit records", cleaned);
        }
        Ok(cleaned)
    }
}
