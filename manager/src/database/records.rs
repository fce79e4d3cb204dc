//! Database record types (entities).
//!
//! This module contains all the record structs and enums used by the database layer.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Error)]
#[error("Unknown {kind} '{value}'")]
pub struct UnknownVariant {
    pub kind: &'static str,
    pub value: String,
}

// ============================================================================
// Enumerations stored as TEXT
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum LifecycleAction {
    Restart,
    Stop,
    Start,
    Deploy,
    Clone,
}

impl LifecycleAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            LifecycleAction::Restart => "restart",
            LifecycleAction::Stop => "stop",
            LifecycleAction::Start => "start",
            LifecycleAction::Deploy => "deploy",
            LifecycleAction::Clone => "clone",
        }
    }

    /// Actions a caller may trigger against an existing resource
    pub fn is_power_action(&self) -> bool {
        !matches!(self, LifecycleAction::Deploy | LifecycleAction::Clone)
    }
}

impl FromStr for LifecycleAction {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "restart" => Ok(LifecycleAction::Restart),
            "stop" => Ok(LifecycleAction::Stop),
            "start" => Ok(LifecycleAction::Start),
            "deploy" => Ok(LifecycleAction::Deploy),
            "clone" => Ok(LifecycleAction::Clone),
            _ => Err(UnknownVariant {
                kind: "action",
                value: s.to_string(),
            }),
        }
    }
}

impl fmt::Display for LifecycleAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum TriggerType {
    Auto,
    Manual,
}

impl TriggerType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TriggerType::Auto => "auto",
            TriggerType::Manual => "manual",
        }
    }
}

impl fmt::Display for TriggerType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// pending -> success | failed; both completions are terminal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum ActionStatus {
    Pending,
    Success,
    Failed,
}

impl ActionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionStatus::Pending => "pending",
            ActionStatus::Success => "success",
            ActionStatus::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, ActionStatus::Pending)
    }
}

impl fmt::Display for ActionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum ServiceType {
    Grow,
    Connect,
    Custom,
}

impl ServiceType {
    /// Infer the service flavour from the first deploy command
    pub fn from_command(command: &str) -> Self {
        if command.contains("growblockchain") {
            ServiceType::Grow
        } else if command.contains("connectblockchain") {
            ServiceType::Connect
        } else {
            ServiceType::Custom
        }
    }
}

// ============================================================================
// Whitelist entities
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WhitelistEntry {
    pub id: i64,
    pub resource_id: i64,
    pub resource_name: String,
    pub node: String,
    pub enabled: bool,
    pub restart_interval_hours: i64,
    pub created_by: String,
    pub notes: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewWhitelistEntry {
    pub resource_id: i64,
    pub resource_name: String,
    pub node: String,
    pub created_by: String,
    pub notes: String,
    pub restart_interval_hours: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WhitelistUpdate {
    pub enabled: bool,
    pub notes: String,
    pub restart_interval_hours: i64,
}

// ============================================================================
// Audit log entities
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditLogRecord {
    pub id: i64,
    pub resource_id: i64,
    pub resource_name: String,
    pub node: String,
    pub action: LifecycleAction,
    pub trigger_type: TriggerType,
    pub triggered_by: String,
    pub status: ActionStatus,
    pub error_message: Option<String>,
    pub output: Option<String>,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub duration_seconds: Option<i64>,
}

impl AuditLogRecord {
    /// A fresh `pending` record stamped with the current time; `id` is assigned on insert
    pub fn pending(
        resource_id: i64,
        resource_name: &str,
        node: &str,
        action: LifecycleAction,
        trigger_type: TriggerType,
        triggered_by: &str,
    ) -> Self {
        Self {
            id: 0,
            resource_id,
            resource_name: resource_name.to_string(),
            node: node.to_string(),
            action,
            trigger_type,
            triggered_by: triggered_by.to_string(),
            status: ActionStatus::Pending,
            error_message: None,
            output: None,
            started_at: Utc::now(),
            completed_at: None,
            duration_seconds: None,
        }
    }
}

/// Conjunctive optional predicates over the audit log
#[derive(Debug, Clone, Default)]
pub struct AuditLogFilter {
    pub resource_id: Option<i64>,
    /// Substring match on the display name
    pub resource_name: Option<String>,
    pub node: Option<String>,
    pub action: Option<LifecycleAction>,
    pub trigger_type: Option<TriggerType>,
    pub status: Option<ActionStatus>,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemStatus {
    pub total_resources: usize,
    pub running_resources: usize,
    pub whitelisted_count: i64,
    pub total_actions: i64,
    pub failed_actions: i64,
    pub last_auto_action_at: Option<DateTime<Utc>>,
    pub next_restart_time: DateTime<Utc>,
}

// ============================================================================
// Service install entities
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContainerService {
    pub id: i64,
    pub resource_id: i64,
    pub node: String,
    pub service_name: String,
    pub service_type: ServiceType,
    pub install_commands: Option<String>,
    pub installed_at: DateTime<Utc>,
}
