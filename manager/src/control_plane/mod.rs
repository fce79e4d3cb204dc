//! Hypervisor control-plane boundary.
//!
//! The [`ControlPlane`] trait is the only way the manager touches the cluster.
//! [`PveshControlPlane`] drives the local `pvesh`/`pct` CLIs; tests plug in
//! their own implementation.

mod pvesh;

pub use pvesh::PveshControlPlane;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::database::{LifecycleAction, UnknownVariant};
use crate::errors::ControlPlaneError;

pub type ControlPlaneResult<T> = Result<T, ControlPlaneError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ResourceKind {
    #[serde(rename = "qemu")]
    VirtualMachine,
    #[serde(rename = "lxc")]
    Container,
}

impl ResourceKind {
    /// Path segment used by the control plane
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceKind::VirtualMachine => "qemu",
            ResourceKind::Container => "lxc",
        }
    }
}

impl FromStr for ResourceKind {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "qemu" | "vm" => Ok(ResourceKind::VirtualMachine),
            "lxc" | "container" => Ok(ResourceKind::Container),
            _ => Err(UnknownVariant {
                kind: "resource type",
                value: s.to_string(),
            }),
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One VM or container as reported by the live inventory
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Resource {
    pub resource_id: i64,
    pub name: String,
    pub kind: ResourceKind,
    pub node: String,
    pub status: String,
    pub uptime: i64,
    pub cpu_usage: f64,
    pub memory_used: i64,
    pub memory_total: i64,
    pub disk_used: i64,
    pub disk_total: i64,
}

impl Resource {
    pub fn is_running(&self) -> bool {
        self.status == "running"
    }
}

/// Result of a command the control plane accepted and ran.
///
/// `failure` is set when the command ran but reported an error; `output` holds
/// whatever text it produced either way.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActionOutput {
    pub output: String,
    pub failure: Option<String>,
}

impl ActionOutput {
    pub fn success(output: impl Into<String>) -> Self {
        Self {
            output: output.into(),
            failure: None,
        }
    }

    pub fn failed(output: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            output: output.into(),
            failure: Some(reason.into()),
        }
    }

    pub fn is_success(&self) -> bool {
        self.failure.is_none()
    }
}

/// A start rejected because the resource already runs reached the desired state anyway
pub fn is_already_running(output: &str) -> bool {
    output.to_ascii_lowercase().contains("already running")
}

#[async_trait]
pub trait ControlPlane: Send + Sync {
    /// Every VM and container in the cluster
    async fn list_resources(&self) -> ControlPlaneResult<Vec<Resource>>;

    /// Look up one resource on one node; `Ok(None)` when it does not exist
    async fn get_resource(&self, node: &str, resource_id: i64) -> ControlPlaneResult<Option<Resource>> {
        Ok(self
            .list_resources()
            .await?
            .into_iter()
            .find(|r| r.resource_id == resource_id && r.node == node))
    }

    /// Run a power action (restart, stop, start)
    async fn perform_action(
        &self,
        node: &str,
        resource_id: i64,
        kind: ResourceKind,
        action: LifecycleAction,
    ) -> ControlPlaneResult<ActionOutput>;

    async fn clone_container(
        &self,
        source_id: i64,
        new_id: i64,
        target_node: &str,
        hostname: Option<&str>,
    ) -> ControlPlaneResult<ActionOutput>;

    async fn destroy_container(&self, resource_id: i64) -> ControlPlaneResult<ActionOutput>;

    /// Run a shell command inside a container
    async fn exec_in_container(&self, resource_id: i64, command: &str) -> ControlPlaneResult<ActionOutput>;
}
