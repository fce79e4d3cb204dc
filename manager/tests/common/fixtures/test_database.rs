//! Test database utilities for in-memory SQLite testing

use anyhow::Result;
use chrono::{DateTime, Duration, Utc};
use pve_autorestart::database::{
    ActionStatus, AuditLogRecord, Database, LifecycleAction, TriggerType,
};
use sqlx::SqlitePool;
use std::sync::Arc;

/// Test database wrapper around an in-memory [`Database`]
pub struct TestDatabase {
    database: Arc<Database>,
}

impl TestDatabase {
    /// Create a new in-memory test database with the full schema
    pub async fn new() -> Result<Self> {
        let database = Database::new(":memory:").await?;
        Ok(Self {
            database: Arc::new(database),
        })
    }

    pub fn database(&self) -> Arc<Database> {
        self.database.clone()
    }

    /// Get the database pool
    pub fn pool(&self) -> &SqlitePool {
        self.database.pool()
    }

    /// Insert an already-completed record, bypassing the executor
    pub async fn seed_record(
        &self,
        resource_id: i64,
        node: &str,
        action: LifecycleAction,
        trigger_type: TriggerType,
        status: ActionStatus,
        completed_at: DateTime<Utc>,
    ) -> Result<i64> {
        let mut record = AuditLogRecord::pending(
            resource_id,
            &format!("ct-{}", resource_id),
            node,
            action,
            trigger_type,
            "seed",
        );
        record.status = status;
        record.started_at = completed_at - Duration::seconds(30);
        if status.is_terminal() {
            record.completed_at = Some(completed_at);
            record.duration_seconds = Some(30);
        }
        Ok(self.database.create_audit_record(&record).await?)
    }

    /// Shorthand for a successful automatic restart that completed at `completed_at`
    pub async fn seed_restart(&self, resource_id: i64, node: &str, completed_at: DateTime<Utc>) -> Result<i64> {
        self.seed_record(
            resource_id,
            node,
            LifecycleAction::Restart,
            TriggerType::Auto,
            ActionStatus::Success,
            completed_at,
        )
        .await
    }

    pub async fn count_records(&self) -> Result<i64> {
        Ok(sqlx::query_scalar("SELECT COUNT(*) FROM audit_logs")
            .fetch_one(self.pool())
            .await?)
    }
}
