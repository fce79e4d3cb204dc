//! Audit log database operations.
//!
//! Records are inserted in `pending` state, completed exactly once, and never
//! deleted here. Filtered queries are assembled with `QueryBuilder` so every
//! caller-supplied value travels as a bound parameter.

use chrono::{DateTime, Duration, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{QueryBuilder, Row, Sqlite};
use tracing::{debug, error};

use super::records::{
    ActionStatus, AuditLogFilter, AuditLogRecord, LifecycleAction, SystemStatus, TriggerType,
};
use super::{Database, DbResult};
use crate::constants::limits::DEFAULT_LOG_LIMIT;
use crate::constants::restart::DEFAULT_INTERVAL_HOURS;
use crate::errors::DatabaseError;

const AUDIT_COLUMNS: &str = "id, resource_id, resource_name, node, action, trigger_type, \
     triggered_by, status, error_message, output, started_at, completed_at, duration_seconds";

impl Database {
    /// Insert a record and return its id
    pub async fn create_audit_record(&self, record: &AuditLogRecord) -> DbResult<i64> {
        debug!(
            "Creating {} audit record for resource {}",
            record.action, record.resource_id
        );

        let result = sqlx::query(
            r#"
            INSERT INTO audit_logs (
                resource_id, resource_name, node, action, trigger_type, triggered_by,
                status, error_message, output, started_at, completed_at, duration_seconds
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(record.resource_id)
        .bind(&record.resource_name)
        .bind(&record.node)
        .bind(record.action)
        .bind(record.trigger_type)
        .bind(&record.triggered_by)
        .bind(record.status)
        .bind(&record.error_message)
        .bind(&record.output)
        .bind(record.started_at)
        .bind(record.completed_at)
        .bind(record.duration_seconds)
        .execute(&self.pool)
        .await;

        match result {
            Ok(result) => Ok(result.last_insert_rowid()),
            Err(e) => {
                error!(
                    "Failed to create audit record for resource {}: {}",
                    record.resource_id, e
                );
                Err(e.into())
            }
        }
    }

    /// Write the terminal state of a pending record.
    ///
    /// Only a row still in `pending` is touched, so a record completes at most once.
    pub async fn complete_audit_record(&self, record: &AuditLogRecord) -> DbResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE audit_logs
            SET status = ?, error_message = ?, output = ?, completed_at = ?, duration_seconds = ?
            WHERE id = ? AND status = ?
            "#,
        )
        .bind(record.status)
        .bind(&record.error_message)
        .bind(&record.output)
        .bind(record.completed_at)
        .bind(record.duration_seconds)
        .bind(record.id)
        .bind(ActionStatus::Pending)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DatabaseError::NotFound {
                entity: "Pending audit record",
                id: record.id,
            });
        }
        debug!("Completed audit record {} as {}", record.id, record.status);
        Ok(())
    }

    pub async fn get_audit_record(&self, id: i64) -> DbResult<Option<AuditLogRecord>> {
        let mut query: QueryBuilder<Sqlite> =
            QueryBuilder::new(format!("SELECT {} FROM audit_logs WHERE id = ", AUDIT_COLUMNS));
        query.push_bind(id);

        let row = query.build().fetch_optional(&self.pool).await?;
        row.as_ref().map(Self::row_to_audit_record).transpose()
    }

    /// Filtered, paginated listing ordered newest-first by `started_at`
    pub async fn query_audit_logs(&self, filter: &AuditLogFilter) -> DbResult<Vec<AuditLogRecord>> {
        let mut query: QueryBuilder<Sqlite> =
            QueryBuilder::new(format!("SELECT {} FROM audit_logs WHERE 1=1", AUDIT_COLUMNS));

        if let Some(resource_id) = filter.resource_id {
            query.push(" AND resource_id = ").push_bind(resource_id);
        }
        if let Some(name) = filter.resource_name.as_deref().filter(|n| !n.is_empty()) {
            query
                .push(" AND resource_name LIKE ")
                .push_bind(format!("%{}%", name));
        }
        if let Some(node) = filter.node.as_deref().filter(|n| !n.is_empty()) {
            query.push(" AND node = ").push_bind(node.to_string());
        }
        if let Some(action) = filter.action {
            query.push(" AND action = ").push_bind(action);
        }
        if let Some(trigger_type) = filter.trigger_type {
            query.push(" AND trigger_type = ").push_bind(trigger_type);
        }
        if let Some(status) = filter.status {
            query.push(" AND status = ").push_bind(status);
        }
        if let Some(start) = filter.start_date {
            query.push(" AND started_at >= ").push_bind(start);
        }
        if let Some(end) = filter.end_date {
            query.push(" AND started_at <= ").push_bind(end);
        }

        let limit = filter
            .limit
            .filter(|limit| *limit > 0)
            .unwrap_or(DEFAULT_LOG_LIMIT);
        let offset = filter.offset.unwrap_or(0).max(0);

        query.push(" ORDER BY started_at DESC, id DESC");
        query.push(" LIMIT ").push_bind(limit);
        query.push(" OFFSET ").push_bind(offset);

        let rows = query.build().fetch_all(&self.pool).await?;
        debug!("Audit query returned {} records", rows.len());
        rows.iter().map(Self::row_to_audit_record).collect()
    }

    /// Completion time of the newest successful restart of a resource, on any node
    pub async fn last_successful_restart(&self, resource_id: i64) -> DbResult<Option<DateTime<Utc>>> {
        let row = sqlx::query(
            r#"
            SELECT completed_at
            FROM audit_logs
            WHERE resource_id = ? AND action = ? AND status = ? AND completed_at IS NOT NULL
            ORDER BY completed_at DESC
            LIMIT 1
            "#,
        )
        .bind(resource_id)
        .bind(LifecycleAction::Restart)
        .bind(ActionStatus::Success)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => Ok(row.try_get("completed_at")?),
            None => Ok(None),
        }
    }

    /// Fail every pending record of one action on one resource.
    ///
    /// Used when the task driving an action died before it could complete its record.
    pub async fn fail_pending_records(
        &self,
        resource_id: i64,
        node: &str,
        action: LifecycleAction,
        error_message: &str,
    ) -> DbResult<u64> {
        let result = sqlx::query(
            r#"
            UPDATE audit_logs
            SET status = ?, error_message = ?, completed_at = ?
            WHERE resource_id = ? AND node = ? AND action = ? AND status = ?
            "#,
        )
        .bind(ActionStatus::Failed)
        .bind(error_message)
        .bind(Utc::now())
        .bind(resource_id)
        .bind(node)
        .bind(action)
        .bind(ActionStatus::Pending)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    /// Store-side aggregate; live inventory counts are filled in by the status service
    pub async fn system_status(&self) -> DbResult<SystemStatus> {
        let whitelisted_count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM whitelist WHERE enabled = 1")
                .fetch_one(&self.pool)
                .await?;

        let counts = sqlx::query(
            r#"
            SELECT COUNT(*) AS total,
                   COUNT(CASE WHEN status = ? THEN 1 END) AS failed
            FROM audit_logs
            "#,
        )
        .bind(ActionStatus::Failed)
        .fetch_one(&self.pool)
        .await?;

        let last_auto = sqlx::query(
            r#"
            SELECT started_at
            FROM audit_logs
            WHERE trigger_type = ?
            ORDER BY started_at DESC
            LIMIT 1
            "#,
        )
        .bind(TriggerType::Auto)
        .fetch_optional(&self.pool)
        .await?;

        let last_auto_action_at: Option<DateTime<Utc>> = match last_auto {
            Some(row) => Some(row.try_get("started_at")?),
            None => None,
        };

        let next_restart_time =
            last_auto_action_at.unwrap_or_else(Utc::now) + Duration::hours(DEFAULT_INTERVAL_HOURS);

        Ok(SystemStatus {
            total_resources: 0,
            running_resources: 0,
            whitelisted_count,
            total_actions: counts.try_get("total")?,
            failed_actions: counts.try_get("failed")?,
            last_auto_action_at,
            next_restart_time,
        })
    }

    fn row_to_audit_record(row: &SqliteRow) -> DbResult<AuditLogRecord> {
        Ok(AuditLogRecord {
            id: row.try_get("id")?,
            resource_id: row.try_get("resource_id")?,
            resource_name: row.try_get("resource_name")?,
            node: row.try_get("node")?,
            action: row.try_get("action")?,
            trigger_type: row.try_get("trigger_type")?,
            triggered_by: row.try_get("triggered_by")?,
            status: row.try_get("status")?,
            error_message: row.try_get("error_message")?,
            output: row.try_get("output")?,
            started_at: row.try_get("started_at")?,
            completed_at: row.try_get("completed_at")?,
            duration_seconds: row.try_get("duration_seconds")?,
        })
    }
}
