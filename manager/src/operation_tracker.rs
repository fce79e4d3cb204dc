//! Per-resource advisory locking for lifecycle actions
//!
//! The scheduler and manual triggers share one tracker so that two actions
//! never run against the same resource at once.
//!
//! # Key Features
//!
//! - **Concurrent action prevention**: Only one action per `node/resource_id`
//! - **Visibility**: What's running, since when, who initiated it
//! - **Automatic cleanup**: Stuck entries evicted after 24 hours by the binary
//!
//! # Usage
//!
//! ```ignore
//! tracker.try_start_operation("nodeA", 103, "restart", Some("system".into())).await?;
//!
//! // Perform action...
//!
//! tracker.finish_operation("nodeA", 103).await;
//! ```

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{info, instrument, warn};

use crate::errors::ManagerError;

/// Lock key shared by every component that acts on a resource
pub fn resource_key(node: &str, resource_id: i64) -> String {
    format!("{}/{}", node, resource_id)
}

#[derive(Debug, Clone, Serialize)]
pub struct ActiveOperation {
    pub operation_type: String,
    pub resource_id: i64,
    pub node: String,
    pub started_at: DateTime<Utc>,
    pub user_info: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct OperationStatus {
    pub busy_resources: HashMap<String, ActiveOperation>,
    pub total_active: usize,
}

#[derive(Clone, Default)]
pub struct SimpleOperationTracker {
    active_operations: Arc<RwLock<HashMap<String, ActiveOperation>>>, // node/resource_id -> operation
}

impl SimpleOperationTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim a resource; fails with [`ManagerError::ResourceBusy`] while another action holds it
    #[instrument(skip(self, user_info))]
    pub async fn try_start_operation(
        &self,
        node: &str,
        resource_id: i64,
        operation_type: &str,
        user_info: Option<String>,
    ) -> Result<(), ManagerError> {
        let key = resource_key(node, resource_id);
        let mut active = self.active_operations.write().await;

        if let Some(current_op) = active.get(&key) {
            let duration = Utc::now().signed_duration_since(current_op.started_at);
            warn!(
                "Resource {} is busy with '{}' (started {}m ago)",
                key,
                current_op.operation_type,
                duration.num_minutes()
            );
            return Err(ManagerError::ResourceBusy {
                resource_id,
                node: node.to_string(),
                operation: current_op.operation_type.clone(),
            });
        }

        active.insert(
            key.clone(),
            ActiveOperation {
                operation_type: operation_type.to_string(),
                resource_id,
                node: node.to_string(),
                started_at: Utc::now(),
                user_info,
            },
        );
        info!("Started operation '{}' on {}", operation_type, key);
        Ok(())
    }

    /// Release a resource
    #[instrument(skip(self))]
    pub async fn finish_operation(&self, node: &str, resource_id: i64) {
        let key = resource_key(node, resource_id);
        let mut active = self.active_operations.write().await;
        if let Some(op) = active.remove(&key) {
            let duration = Utc::now().signed_duration_since(op.started_at);
            info!(
                "Finished operation '{}' on {} (took {}s)",
                op.operation_type,
                key,
                duration.num_seconds()
            );
        }
    }

    pub async fn get_operation_status(&self) -> OperationStatus {
        let active = self.active_operations.read().await;
        OperationStatus {
            busy_resources: active.clone(),
            total_active: active.len(),
        }
    }

    pub async fn is_busy(&self, node: &str, resource_id: i64) -> bool {
        let active = self.active_operations.read().await;
        active.contains_key(&resource_key(node, resource_id))
    }

    pub async fn get_active_operation(&self, node: &str, resource_id: i64) -> Option<ActiveOperation> {
        let active = self.active_operations.read().await;
        active.get(&resource_key(node, resource_id)).cloned()
    }

    /// Evict entries older than `max_hours` (an action whose task died without releasing)
    pub async fn cleanup_old_operations(&self, max_hours: i64) -> u32 {
        let mut active = self.active_operations.write().await;
        let cutoff = Utc::now() - chrono::Duration::hours(max_hours);
        let initial_count = active.len();

        active.retain(|key, operation| {
            let should_keep = operation.started_at > cutoff;
            if !should_keep {
                warn!(
                    "Cleaned up stuck operation '{}' on {} (held for {}h)",
                    operation.operation_type,
                    key,
                    Utc::now()
                        .signed_duration_since(operation.started_at)
                        .num_hours()
                );
            }
            should_keep
        });

        let cleaned_count = initial_count - active.len();
        if cleaned_count > 0 {
            warn!(
                "Removed {} stuck operations older than {}h",
                cleaned_count, max_hours
            );
        }

        cleaned_count as u32
    }

    #[cfg(test)]
    async fn backdate(&self, node: &str, resource_id: i64, hours: i64) {
        let mut active = self.active_operations.write().await;
        if let Some(op) = active.get_mut(&resource_key(node, resource_id)) {
            op.started_at = op.started_at - chrono::Duration::hours(hours);
        }
    }
}
