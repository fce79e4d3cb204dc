//! Container service install records and the resource purge cascade.

use chrono::Utc;
use sqlx::sqlite::SqliteRow;
use sqlx::Row;
use tracing::{debug, info};

use super::records::{ContainerService, ServiceType};
use super::{Database, DbResult};

impl Database {
    /// Record what a deploy installed; re-deploying the same service refreshes the row
    pub async fn upsert_container_service(
        &self,
        resource_id: i64,
        node: &str,
        service_name: &str,
        service_type: ServiceType,
        install_commands: Option<&str>,
    ) -> DbResult<()> {
        sqlx::query(
            r#"
            INSERT INTO container_services (resource_id, node, service_name, service_type,
                                            install_commands, installed_at)
            VALUES (?, ?, ?, ?, ?, ?)
            ON CONFLICT(resource_id, node, service_name) DO UPDATE SET
                service_type = excluded.service_type,
                install_commands = excluded.install_commands,
                installed_at = excluded.installed_at
            "#,
        )
        .bind(resource_id)
        .bind(node)
        .bind(service_name)
        .bind(service_type)
        .bind(install_commands)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        debug!(
            "Recorded service '{}' on resource {} ({})",
            service_name, resource_id, node
        );
        Ok(())
    }

    pub async fn services_for_resource(
        &self,
        resource_id: i64,
        node: &str,
    ) -> DbResult<Vec<ContainerService>> {
        let rows = sqlx::query(
            r#"
            SELECT id, resource_id, node, service_name, service_type, install_commands, installed_at
            FROM container_services
            WHERE resource_id = ? AND node = ?
            ORDER BY installed_at DESC, id DESC
            "#,
        )
        .bind(resource_id)
        .bind(node)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(Self::row_to_container_service).collect()
    }

    pub async fn delete_services_for_resource(&self, resource_id: i64, node: &str) -> DbResult<u64> {
        let result = sqlx::query("DELETE FROM container_services WHERE resource_id = ? AND node = ?")
            .bind(resource_id)
            .bind(node)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    /// Drop the whitelist rows and service installs of a destroyed resource.
    ///
    /// Both deletes commit together. Audit rows are left as they are.
    /// Returns `(whitelist_removed, services_removed)`.
    pub async fn purge_resource_records(&self, resource_id: i64, node: &str) -> DbResult<(u64, u64)> {
        let mut tx = self.pool.begin().await?;

        let whitelist = sqlx::query("DELETE FROM whitelist WHERE resource_id = ?")
            .bind(resource_id)
            .execute(&mut *tx)
            .await?;

        let services =
            sqlx::query("DELETE FROM container_services WHERE resource_id = ? AND node = ?")
                .bind(resource_id)
                .bind(node)
                .execute(&mut *tx)
                .await?;

        tx.commit().await?;

        info!(
            "Purged records of resource {} on {}: {} whitelist, {} services",
            resource_id,
            node,
            whitelist.rows_affected(),
            services.rows_affected()
        );
        Ok((whitelist.rows_affected(), services.rows_affected()))
    }

    fn row_to_container_service(row: &SqliteRow) -> DbResult<ContainerService> {
        Ok(ContainerService {
            id: row.try_get("id")?,
            resource_id: row.try_get("resource_id")?,
            node: row.try_get("node")?,
            service_name: row.try_get("service_name")?,
            service_type: row.try_get("service_type")?,
            install_commands: row.try_get("install_commands")?,
            installed_at: row.try_get("installed_at")?,
        })
    }
}
