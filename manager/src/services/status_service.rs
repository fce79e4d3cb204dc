// File: manager/src/services/status_service.rs
use std::sync::Arc;
use tracing::warn;

use crate::control_plane::{ControlPlane, Resource};
use crate::database::{AuditLogFilter, AuditLogRecord, Database, SystemStatus};
use crate::errors::ManagerError;

/// Read-side views over the audit log and the live inventory
#[derive(Clone)]
pub struct StatusService {
    database: Arc<Database>,
    control_plane: Arc<dyn ControlPlane>,
}

impl StatusService {
    pub fn new(database: Arc<Database>, control_plane: Arc<dyn ControlPlane>) -> Self {
        Self {
            database,
            control_plane,
        }
    }

    /// Store aggregate plus live resource counts; an unreachable control plane leaves the counts at zero
    pub async fn system_status(&self) -> Result<SystemStatus, ManagerError> {
        let mut status = self.database.system_status().await?;

        match self.control_plane.list_resources().await {
            Ok(resources) => {
                status.total_resources = resources.len();
                status.running_resources = resources.iter().filter(|r| r.is_running()).count();
            }
            Err(e) => warn!("Inventory unavailable for status: {}", e),
        }

        Ok(status)
    }

    pub async fn audit_logs(&self, filter: &AuditLogFilter) -> Result<Vec<AuditLogRecord>, ManagerError> {
        Ok(self.database.query_audit_logs(filter).await?)
    }

    pub async fn resources(&self) -> Result<Vec<Resource>, ManagerError> {
        Ok(self.control_plane.list_resources().await?)
    }

    pub async fn resource(&self, node: &str, resource_id: i64) -> Result<Resource, ManagerError> {
        self.control_plane
            .get_resource(node, resource_id)
            .await?
            .ok_or_else(|| ManagerError::ResourceNotFound {
                resource_id,
                node: node.to_string(),
            })
    }
}
