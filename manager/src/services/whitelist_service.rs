// File: manager/src/services/whitelist_service.rs
use std::sync::Arc;
use tracing::info;

use crate::constants::restart::DEFAULT_MANUAL_ACTOR;
use crate::database::{Database, NewWhitelistEntry, WhitelistEntry, WhitelistUpdate};
use crate::errors::{DatabaseError, ManagerError};

/// Validated access to the whitelist registry
#[derive(Clone)]
pub struct WhitelistService {
    database: Arc<Database>,
}

impl WhitelistService {
    pub fn new(database: Arc<Database>) -> Self {
        Self { database }
    }

    pub async fn list_all(&self) -> Result<Vec<WhitelistEntry>, ManagerError> {
        Ok(self.database.get_all_whitelist().await?)
    }

    pub async fn list_enabled(&self) -> Result<Vec<WhitelistEntry>, ManagerError> {
        Ok(self.database.get_enabled_whitelist().await?)
    }

    /// Register a resource for periodic restart
    pub async fn add(&self, entry: NewWhitelistEntry) -> Result<WhitelistEntry, ManagerError> {
        if entry.resource_id <= 0 {
            return Err(ManagerError::validation("resource_id", "must be positive"));
        }
        if entry.resource_name.trim().is_empty() {
            return Err(ManagerError::validation("resource_name", "must not be empty"));
        }
        if entry.node.trim().is_empty() {
            return Err(ManagerError::validation("node", "must not be empty"));
        }

        let entry = NewWhitelistEntry {
            resource_name: entry.resource_name.trim().to_string(),
            node: entry.node.trim().to_string(),
            created_by: match entry.created_by.trim() {
                "" => DEFAULT_MANUAL_ACTOR.to_string(),
                actor => actor.to_string(),
            },
            ..entry
        };

        Ok(self.database.add_whitelist_entry(&entry).await?)
    }

    pub async fn update(&self, id: i64, update: WhitelistUpdate) -> Result<(), ManagerError> {
        self.database.update_whitelist_entry(id, &update).await?;
        info!("Updated whitelist entry {} (enabled={})", id, update.enabled);
        Ok(())
    }

    pub async fn delete(&self, id: i64) -> Result<(), ManagerError> {
        if !self.database.delete_whitelist_entry(id).await? {
            return Err(DatabaseError::NotFound {
                entity: "Whitelist entry",
                id,
            }
            .into());
        }
        info!("Removed whitelist entry {}", id);
        Ok(())
    }

    /// Remove every entry for a resource id regardless of node; returns how many went
    pub async fn delete_by_resource(&self, resource_id: i64) -> Result<u64, ManagerError> {
        let removed = self.database.delete_whitelist_by_resource(resource_id).await?;
        info!("Removed {} whitelist entries for resource {}", removed, resource_id);
        Ok(removed)
    }
}
