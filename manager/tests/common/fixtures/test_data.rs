//! Common test data and constants

use chrono::{DateTime, Duration, Utc};
use pve_autorestart::control_plane::{Resource, ResourceKind};
use pve_autorestart::database::NewWhitelistEntry;

/// Get current timestamp for testing
pub fn now() -> DateTime<Utc> {
    Utc::now()
}

pub fn hours_ago(hours: i64) -> DateTime<Utc> {
    Utc::now() - Duration::hours(hours)
}

/// Common cluster node names
pub mod nodes {
    pub const NODE_A: &str = "nodeA";
    pub const NODE_B: &str = "nodeB";
}

/// Common resource ids
pub mod resources {
    pub const CONTAINER_103: i64 = 103;
    pub const CONTAINER_104: i64 = 104;
    pub const CONTAINER_105: i64 = 105;
    pub const VM_200: i64 = 200;
    pub const TEMPLATE_900: i64 = 900;
}

/// Common actors
pub mod actors {
    pub const OPERATOR: &str = "alice@example.com";
}

pub fn container(resource_id: i64, name: &str, node: &str, status: &str) -> Resource {
    Resource {
        resource_id,
        name: name.to_string(),
        kind: ResourceKind::Container,
        node: node.to_string(),
        status: status.to_string(),
        uptime: 3600,
        cpu_usage: 0.05,
        memory_used: 512,
        memory_total: 2048,
        disk_used: 1024,
        disk_total: 8192,
    }
}

pub fn vm(resource_id: i64, name: &str, node: &str, status: &str) -> Resource {
    Resource {
        kind: ResourceKind::VirtualMachine,
        ..container(resource_id, name, node, status)
    }
}

pub fn whitelist_entry(resource_id: i64, name: &str, node: &str, interval_hours: i64) -> NewWhitelistEntry {
    NewWhitelistEntry {
        resource_id,
        resource_name: name.to_string(),
        node: node.to_string(),
        created_by: "tests".to_string(),
        notes: String::new(),
        restart_interval_hours: interval_hours,
    }
}
